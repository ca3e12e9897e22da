use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_elasticloadbalancingv2 as elb;
use aws_sdk_route53 as route53;
use elb::error::DisplayErrorContext;
use elb::types::{TargetDescription, TargetHealthDescription};
use route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet,
    RrType,
};
use stg_models::annotations::same_domain;
use stg_models::{HealthState, ObservedMember, TargetGroupArn};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    BackendError, BackendResult, DnsApi, RecordSet, Target, TargetGroupApi,
};

fn call_err<E: std::error::Error>(op: &'static str, e: E) -> BackendError {
    BackendError::Call {
        op,
        message: DisplayErrorContext(&e).to_string(),
    }
}

fn invalid<E: std::fmt::Display>(e: E) -> BackendError {
    BackendError::InvalidRequest(e.to_string())
}

/// ELBv2 target groups. Clients are region-scoped, so one is built lazily per
/// region named in a target group ARN.
pub struct ElbTargetGroups {
    base: SdkConfig,
    endpoint_url: Option<String>,
    clients: RwLock<HashMap<String, elb::Client>>,
}

impl ElbTargetGroups {
    pub fn new(base: &SdkConfig, endpoint_url: Option<String>) -> Self {
        Self {
            base: base.clone(),
            endpoint_url,
            clients: RwLock::new(HashMap::new()),
        }
    }

    async fn client(&self, region: &str) -> elb::Client {
        if let Some(c) = self.clients.read().await.get(region) {
            return c.clone();
        }
        let mut conf = elb::config::Builder::from(&self.base)
            .region(elb::config::Region::new(region.to_string()));
        if let Some(url) = &self.endpoint_url {
            conf = conf.endpoint_url(url);
        }
        let client = elb::Client::from_conf(conf.build());
        debug!(%region, "built elbv2 client");
        self.clients
            .write()
            .await
            .entry(region.to_string())
            .or_insert(client)
            .clone()
    }

    fn descriptions(targets: &[Target]) -> Vec<TargetDescription> {
        targets
            .iter()
            .map(|t| TargetDescription::builder().id(&t.id).set_port(t.port).build())
            .collect()
    }
}

pub(crate) fn observed_member(
    d: &TargetHealthDescription,
) -> Option<ObservedMember> {
    let target = d.target()?;
    let address = target.id()?.to_string();
    let health = d
        .target_health()
        .and_then(|h| h.state())
        .map(|s| HealthState::parse(s.as_str()))
        .unwrap_or(HealthState::Unavailable);
    Some(ObservedMember {
        address,
        port: target.port(),
        health: Some(health),
    })
}

#[async_trait]
impl TargetGroupApi for ElbTargetGroups {
    async fn describe_target_health(
        &self,
        target_group: &TargetGroupArn,
    ) -> BackendResult<Vec<ObservedMember>> {
        let out = self
            .client(target_group.region())
            .await
            .describe_target_health()
            .target_group_arn(target_group.as_str())
            .send()
            .await
            .map_err(|e| call_err("DescribeTargetHealth", e))?;
        Ok(out
            .target_health_descriptions()
            .iter()
            .filter_map(observed_member)
            .collect())
    }

    async fn register_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[Target],
    ) -> BackendResult<()> {
        let targets = Self::descriptions(targets);
        self.client(target_group.region())
            .await
            .register_targets()
            .target_group_arn(target_group.as_str())
            .set_targets(Some(targets))
            .send()
            .await
            .map_err(|e| call_err("RegisterTargets", e))?;
        Ok(())
    }

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[Target],
    ) -> BackendResult<()> {
        let targets = Self::descriptions(targets);
        self.client(target_group.region())
            .await
            .deregister_targets()
            .target_group_arn(target_group.as_str())
            .set_targets(Some(targets))
            .send()
            .await
            .map_err(|e| call_err("DeregisterTargets", e))?;
        Ok(())
    }
}

/// Route 53 A records. Route 53 is a global service; when the provider chain
/// yields no region the client signs for us-east-1.
pub struct Route53Records {
    client: route53::Client,
}

impl Route53Records {
    pub fn new(base: &SdkConfig, endpoint_url: Option<String>) -> Self {
        let mut conf = route53::config::Builder::from(base);
        if base.region().is_none() {
            conf = conf.region(route53::config::Region::new("us-east-1"));
        }
        if let Some(url) = endpoint_url {
            conf = conf.endpoint_url(url);
        }
        Self {
            client: route53::Client::from_conf(conf.build()),
        }
    }

    async fn change(
        &self,
        op: &'static str,
        action: ChangeAction,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()> {
        let records = record
            .values
            .iter()
            .map(|v| ResourceRecord::builder().value(v).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        let set = ResourceRecordSet::builder()
            .name(domain)
            .r#type(RrType::A)
            .ttl(record.ttl)
            .set_resource_records(Some(records))
            .build()
            .map_err(invalid)?;
        let change = Change::builder()
            .action(action)
            .resource_record_set(set)
            .build()
            .map_err(invalid)?;
        let batch = ChangeBatch::builder()
            .changes(change)
            .build()
            .map_err(invalid)?;
        self.client
            .change_resource_record_sets()
            .hosted_zone_id(zone)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| call_err(op, e))?;
        Ok(())
    }
}

pub(crate) fn find_a_record(
    sets: &[ResourceRecordSet],
    domain: &str,
) -> Option<RecordSet> {
    sets.iter()
        .find(|rs| *rs.r#type() == RrType::A && same_domain(rs.name(), domain))
        .map(|rs| RecordSet {
            ttl: rs.ttl().unwrap_or_default(),
            values: rs
                .resource_records()
                .iter()
                .map(|r| r.value().to_string())
                .collect(),
        })
}

#[async_trait]
impl DnsApi for Route53Records {
    async fn current_record(
        &self,
        zone: &str,
        domain: &str,
    ) -> BackendResult<Option<RecordSet>> {
        let out = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone)
            .start_record_name(domain)
            .start_record_type(RrType::A)
            .max_items(1)
            .send()
            .await
            .map_err(|e| call_err("ListResourceRecordSets", e))?;
        Ok(find_a_record(out.resource_record_sets(), domain))
    }

    async fn upsert_record(
        &self,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()> {
        self.change(
            "ChangeResourceRecordSets(UPSERT)",
            ChangeAction::Upsert,
            zone,
            domain,
            record,
        )
        .await
    }

    async fn delete_record(
        &self,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()> {
        self.change(
            "ChangeResourceRecordSets(DELETE)",
            ChangeAction::Delete,
            zone,
            domain,
            record,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elb::types::{TargetHealth, TargetHealthStateEnum};

    fn description(
        id: &str,
        port: i32,
        state: Option<TargetHealthStateEnum>,
    ) -> TargetHealthDescription {
        TargetHealthDescription::builder()
            .target(TargetDescription::builder().id(id).port(port).build())
            .target_health(TargetHealth::builder().set_state(state).build())
            .build()
    }

    #[test]
    fn maps_target_health_descriptions() {
        let m = observed_member(&description(
            "10.0.0.1",
            80,
            Some(TargetHealthStateEnum::Draining),
        ))
        .unwrap();
        assert_eq!(m.key(), "10.0.0.1:80");
        assert!(m.is_draining());

        let m = observed_member(&description(
            "10.0.0.2",
            8080,
            Some(TargetHealthStateEnum::Healthy),
        ))
        .unwrap();
        assert_eq!(m.health, Some(HealthState::Healthy));

        let m = observed_member(&description("10.0.0.3", 80, None)).unwrap();
        assert_eq!(m.health, Some(HealthState::Unavailable));
    }

    #[test]
    fn description_without_target_is_skipped() {
        let d = TargetHealthDescription::builder().build();
        assert!(observed_member(&d).is_none());
    }

    #[test]
    fn description_without_target_id_is_skipped() {
        let d = TargetHealthDescription::builder()
            .target(TargetDescription::builder().port(80).build())
            .build();
        assert!(observed_member(&d).is_none());
    }

    #[test]
    fn request_targets_carry_id_and_port() {
        let out = ElbTargetGroups::descriptions(&[
            Target {
                id: "10.0.0.1".into(),
                port: Some(80),
            },
            Target {
                id: "10.0.0.2".into(),
                port: None,
            },
        ]);
        assert_eq!(out[0].id(), Some("10.0.0.1"));
        assert_eq!(out[0].port(), Some(80));
        assert_eq!(out[1].port(), None);
    }

    fn a_record(name: &str, kind: RrType, values: &[&str]) -> ResourceRecordSet {
        ResourceRecordSet::builder()
            .name(name)
            .r#type(kind)
            .ttl(1)
            .set_resource_records(Some(
                values
                    .iter()
                    .map(|v| ResourceRecord::builder().value(*v).build().unwrap())
                    .collect(),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn finds_only_matching_a_record() {
        let sets = vec![
            a_record("web.example.com.", RrType::Aaaa, &["::1"]),
            a_record("web.example.com.", RrType::A, &["10.0.0.1", "10.0.0.2"]),
        ];
        let found = find_a_record(&sets, "web.example.com").unwrap();
        assert_eq!(found.ttl, 1);
        assert_eq!(found.values, vec!["10.0.0.1", "10.0.0.2"]);

        // ListResourceRecordSets starts at the name, so the next name can come back.
        let sets = vec![a_record("x.example.com.", RrType::A, &["10.0.0.9"])];
        assert!(find_a_record(&sets, "web.example.com").is_none());
    }
}
