//! Backend adapters.
//!
//! [`Backend`] is the capability the dispatcher drives: read what the backend
//! currently holds, add members, remove members. The two adapters translate
//! that into calls on [`TargetGroupApi`] and [`DnsApi`], which are implemented
//! against AWS in [`aws`] and by in-memory fakes in tests.

pub mod aws;
pub mod dns;
pub mod target_group;

use std::sync::Arc;

use async_trait::async_trait;
use stg_models::{
    BackendSpec, DesiredMember, ObservedMember, TargetGroupArn,
};

pub use dns::{DNS_RECORD_TTL, DnsRecordAdapter};
pub use target_group::TargetGroupAdapter;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("{op} failed: {message}")]
    Call { op: &'static str, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// What a backend currently holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observed {
    pub members: Vec<ObservedMember>,
    /// The members match what was read but an attribute published with them
    /// (the A record TTL) does not; the full member list must be rewritten.
    pub drifted: bool,
}

impl From<Vec<ObservedMember>> for Observed {
    fn from(members: Vec<ObservedMember>) -> Self {
        Self {
            members,
            drifted: false,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn spec(&self) -> &BackendSpec;

    async fn fetch_observed(&self) -> BackendResult<Observed>;

    /// No-op for an empty list.
    async fn apply_add(&self, members: &[DesiredMember]) -> BackendResult<()>;

    /// No-op for an empty list.
    async fn apply_remove(
        &self,
        members: &[ObservedMember],
    ) -> BackendResult<()>;
}

/// A target as the load balancer API addresses it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Target {
    pub id: String,
    pub port: Option<i32>,
}

#[async_trait]
pub trait TargetGroupApi: Send + Sync {
    async fn describe_target_health(
        &self,
        target_group: &TargetGroupArn,
    ) -> BackendResult<Vec<ObservedMember>>;

    async fn register_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[Target],
    ) -> BackendResult<()>;

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[Target],
    ) -> BackendResult<()>;
}

/// A published A record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSet {
    pub ttl: i64,
    pub values: Vec<String>,
}

#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn current_record(
        &self,
        zone: &str,
        domain: &str,
    ) -> BackendResult<Option<RecordSet>>;

    async fn upsert_record(
        &self,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()>;

    /// `record` must match the published record exactly.
    async fn delete_record(
        &self,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()>;
}

/// API handles shared by every pass; turns a [`BackendSpec`] into the adapter
/// bound to that target.
#[derive(Clone)]
pub struct Backends {
    target_groups: Arc<dyn TargetGroupApi>,
    dns: Arc<dyn DnsApi>,
}

impl Backends {
    pub fn new(
        target_groups: Arc<dyn TargetGroupApi>,
        dns: Arc<dyn DnsApi>,
    ) -> Self {
        Self { target_groups, dns }
    }

    pub fn resolve(&self, spec: &BackendSpec) -> Box<dyn Backend> {
        match spec {
            BackendSpec::TargetGroup(arn) => Box::new(TargetGroupAdapter::new(
                self.target_groups.clone(),
                arn.clone(),
            )),
            BackendSpec::Dns(target) => Box::new(DnsRecordAdapter::new(
                self.dns.clone(),
                target.clone(),
            )),
        }
    }
}
