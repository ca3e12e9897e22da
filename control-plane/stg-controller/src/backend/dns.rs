use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use stg_models::{BackendSpec, DesiredMember, DnsTarget, ObservedMember};
use tracing::{debug, info};

use super::{Backend, BackendResult, DnsApi, Observed, RecordSet};

/// Short TTL so resolvers follow membership changes quickly.
pub const DNS_RECORD_TTL: i64 = 1;

/// Publishes the member addresses as one A record. The record is always
/// written whole: additions carry the complete desired list, removals rewrite
/// whatever is left or delete the record when nothing is.
pub struct DnsRecordAdapter {
    api: Arc<dyn DnsApi>,
    spec: BackendSpec,
    target: DnsTarget,
}

impl DnsRecordAdapter {
    pub fn new(api: Arc<dyn DnsApi>, target: DnsTarget) -> Self {
        Self {
            api,
            spec: BackendSpec::Dns(target.clone()),
            target,
        }
    }

    pub async fn current_record(&self) -> BackendResult<Option<RecordSet>> {
        self.api
            .current_record(&self.target.zone, &self.target.domain)
            .await
    }

    pub async fn upsert(&self, values: Vec<String>) -> BackendResult<()> {
        info!(zone = %self.target.zone, domain = %self.target.domain, ?values, "upserting A record");
        let record = RecordSet {
            ttl: DNS_RECORD_TTL,
            values,
        };
        self.api
            .upsert_record(&self.target.zone, &self.target.domain, &record)
            .await
    }
}

#[async_trait]
impl Backend for DnsRecordAdapter {
    fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    async fn fetch_observed(&self) -> BackendResult<Observed> {
        let Some(record) = self.current_record().await? else {
            debug!(zone = %self.target.zone, domain = %self.target.domain, "no A record");
            return Ok(Observed::default());
        };
        let drifted = record.ttl != DNS_RECORD_TTL;
        debug!(zone = %self.target.zone, domain = %self.target.domain, ttl = record.ttl, drifted, "read A record");
        Ok(Observed {
            members: record
                .values
                .into_iter()
                .map(ObservedMember::record_value)
                .collect(),
            drifted,
        })
    }

    async fn apply_add(&self, members: &[DesiredMember]) -> BackendResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let values: BTreeSet<String> =
            members.iter().map(|m| m.address.clone()).collect();
        self.upsert(values.into_iter().collect()).await
    }

    async fn apply_remove(
        &self,
        members: &[ObservedMember],
    ) -> BackendResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let Some(current) = self.current_record().await? else {
            return Ok(());
        };
        let removed: BTreeSet<&str> =
            members.iter().map(|m| m.address.as_str()).collect();
        let remaining: Vec<String> = current
            .values
            .iter()
            .filter(|v| !removed.contains(v.as_str()))
            .cloned()
            .collect();
        if remaining.len() == current.values.len() {
            return Ok(());
        }
        if remaining.is_empty() {
            info!(zone = %self.target.zone, domain = %self.target.domain, "deleting A record");
            return self
                .api
                .delete_record(&self.target.zone, &self.target.domain, &current)
                .await;
        }
        self.upsert(remaining).await
    }
}
