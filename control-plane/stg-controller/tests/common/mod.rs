#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use serde_json::json;
use tokio::sync::Notify;
use stg_controller::backend::{
    BackendError, BackendResult, Backends, DnsApi, RecordSet, Target,
    TargetGroupApi,
};
use stg_controller::dispatcher::Dispatcher;
use stg_controller::source::ResourceSource;
use stg_models::annotations::{
    DNS_DOMAIN_ANNOTATION, DNS_ZONE_ANNOTATION, TARGET_GROUP_ANNOTATION,
};
use stg_models::{HealthState, ObservedMember, ResourceIdentity, TargetGroupArn};

pub const ARN: &str =
    "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/web/73e2d6bc24d8a067";
pub const OTHER_ARN: &str =
    "arn:aws:elasticloadbalancing:eu-west-1:123456789012:targetgroup/web/0f1e2d3c4b5a6978";
pub const ZONE: &str = "Z0123456789ABC";
pub const DOMAIN: &str = "web.example.com";

/// Every backend API call, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Describe(String),
    Register(String, Vec<String>),
    Deregister(String, Vec<String>),
    ReadRecord(String),
    Upsert(String, i64, Vec<String>),
    Delete(String, Vec<String>),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

fn target_key(t: &Target) -> String {
    stg_models::member_key(&t.id, t.port)
}

#[derive(Default)]
pub struct FakeSource {
    services: Mutex<HashMap<ResourceIdentity, Service>>,
    endpoints: Mutex<HashMap<ResourceIdentity, Endpoints>>,
}

impl FakeSource {
    pub fn put_service(&self, id: &ResourceIdentity, annotations: &[(&str, &str)]) {
        let annotations: BTreeMap<String, String> = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let svc: Service = serde_json::from_value(json!({
            "metadata": {
                "name": id.name,
                "namespace": id.namespace,
                "annotations": annotations,
            }
        }))
        .unwrap();
        self.services.lock().unwrap().insert(id.clone(), svc);
    }

    /// Marks the Service as terminating, as a held finalizer leaves it.
    pub fn mark_deleting(&self, id: &ResourceIdentity) {
        if let Some(svc) = self.services.lock().unwrap().get_mut(id) {
            svc.metadata.deletion_timestamp = serde_json::from_value(json!("2026-01-01T00:00:00Z")).ok();
        }
    }

    pub fn remove_service(&self, id: &ResourceIdentity) {
        self.services.lock().unwrap().remove(id);
    }

    /// One subset with every address on every port.
    pub fn put_endpoints(&self, id: &ResourceIdentity, ips: &[&str], ports: &[i32]) {
        let subsets = if ips.is_empty() {
            json!([])
        } else {
            json!([{
                "addresses": ips.iter().map(|ip| json!({"ip": ip})).collect::<Vec<_>>(),
                "ports": ports.iter().map(|p| json!({"port": p})).collect::<Vec<_>>(),
            }])
        };
        let ep: Endpoints = serde_json::from_value(json!({
            "metadata": {"name": id.name, "namespace": id.namespace},
            "subsets": subsets,
        }))
        .unwrap();
        self.endpoints.lock().unwrap().insert(id.clone(), ep);
    }

    pub fn remove_endpoints(&self, id: &ResourceIdentity) {
        self.endpoints.lock().unwrap().remove(id);
    }
}

#[async_trait]
impl ResourceSource for FakeSource {
    async fn service(
        &self,
        id: &ResourceIdentity,
    ) -> Result<Option<Service>, kube::Error> {
        Ok(self.services.lock().unwrap().get(id).cloned())
    }

    async fn endpoints(
        &self,
        id: &ResourceIdentity,
    ) -> Result<Option<Endpoints>, kube::Error> {
        Ok(self.endpoints.lock().unwrap().get(id).cloned())
    }
}

/// Target groups keyed by ARN, members keyed by `address:port`.
pub struct FakeTargetGroups {
    calls: CallLog,
    groups: Mutex<HashMap<String, BTreeMap<String, ObservedMember>>>,
    pub fail_describe: AtomicBool,
    pub fail_register: AtomicBool,
    /// When set, describe calls wait for a notification before answering.
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeTargetGroups {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            groups: Mutex::new(HashMap::new()),
            fail_describe: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            gate: Mutex::new(None),
        }
    }

    pub fn seed(&self, arn: &str, address: &str, port: i32, health: HealthState) {
        let m = ObservedMember::target(address, port, health);
        self.groups
            .lock()
            .unwrap()
            .entry(arn.to_string())
            .or_default()
            .insert(m.key(), m);
    }

    pub fn members(&self, arn: &str) -> Vec<String> {
        self.groups
            .lock()
            .unwrap()
            .get(arn)
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn health(&self, arn: &str, key: &str) -> Option<HealthState> {
        self.groups
            .lock()
            .unwrap()
            .get(arn)
            .and_then(|g| g.get(key))
            .and_then(|m| m.health)
    }
}

#[async_trait]
impl TargetGroupApi for FakeTargetGroups {
    async fn describe_target_health(
        &self,
        target_group: &TargetGroupArn,
    ) -> BackendResult<Vec<ObservedMember>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Describe(target_group.to_string()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_describe.load(Ordering::SeqCst) {
            return Err(BackendError::Call {
                op: "DescribeTargetHealth",
                message: "throttled".into(),
            });
        }
        Ok(self
            .groups
            .lock()
            .unwrap()
            .get(target_group.as_str())
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn register_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[Target],
    ) -> BackendResult<()> {
        self.calls.lock().unwrap().push(Call::Register(
            target_group.to_string(),
            targets.iter().map(target_key).collect(),
        ));
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(BackendError::Call {
                op: "RegisterTargets",
                message: "limit exceeded".into(),
            });
        }
        let mut groups = self.groups.lock().unwrap();
        let group = groups.entry(target_group.to_string()).or_default();
        for t in targets {
            let m = ObservedMember::target(
                &t.id,
                t.port.unwrap_or_default(),
                HealthState::Initial,
            );
            group.insert(m.key(), m);
        }
        Ok(())
    }

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[Target],
    ) -> BackendResult<()> {
        self.calls.lock().unwrap().push(Call::Deregister(
            target_group.to_string(),
            targets.iter().map(target_key).collect(),
        ));
        let mut groups = self.groups.lock().unwrap();
        if let Some(group) = groups.get_mut(target_group.as_str()) {
            for t in targets {
                group.remove(&target_key(t));
            }
        }
        Ok(())
    }
}

/// A records keyed by `zone/domain`.
pub struct FakeDns {
    calls: CallLog,
    records: Mutex<HashMap<String, RecordSet>>,
}

impl FakeDns {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Record names match the way Route 53 matches them.
    fn key(zone: &str, domain: &str) -> String {
        format!("{}/{}", zone, domain.trim_end_matches('.').to_ascii_lowercase())
    }

    pub fn seed(&self, zone: &str, domain: &str, values: &[&str]) {
        self.seed_with_ttl(zone, domain, 1, values);
    }

    pub fn seed_with_ttl(&self, zone: &str, domain: &str, ttl: i64, values: &[&str]) {
        self.records.lock().unwrap().insert(
            Self::key(zone, domain),
            RecordSet {
                ttl,
                values: values.iter().map(|v| v.to_string()).collect(),
            },
        );
    }

    pub fn record(&self, zone: &str, domain: &str) -> Option<RecordSet> {
        self.records
            .lock()
            .unwrap()
            .get(&Self::key(zone, domain))
            .cloned()
    }
}

#[async_trait]
impl DnsApi for FakeDns {
    async fn current_record(
        &self,
        zone: &str,
        domain: &str,
    ) -> BackendResult<Option<RecordSet>> {
        let key = Self::key(zone, domain);
        self.calls.lock().unwrap().push(Call::ReadRecord(key.clone()));
        Ok(self.records.lock().unwrap().get(&key).cloned())
    }

    async fn upsert_record(
        &self,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()> {
        let key = Self::key(zone, domain);
        self.calls.lock().unwrap().push(Call::Upsert(
            key.clone(),
            record.ttl,
            record.values.clone(),
        ));
        self.records.lock().unwrap().insert(key, record.clone());
        Ok(())
    }

    async fn delete_record(
        &self,
        zone: &str,
        domain: &str,
        record: &RecordSet,
    ) -> BackendResult<()> {
        let key = Self::key(zone, domain);
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(key.clone(), record.values.clone()));
        let mut records = self.records.lock().unwrap();
        match records.get(&key) {
            Some(current) if current == record => {
                records.remove(&key);
                Ok(())
            }
            _ => Err(BackendError::Call {
                op: "ChangeResourceRecordSets(DELETE)",
                message: "record does not match".into(),
            }),
        }
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub target_groups: Arc<FakeTargetGroups>,
    pub dns: Arc<FakeDns>,
    pub dispatcher: Dispatcher,
    calls: CallLog,
}

impl Harness {
    pub fn new(cleanup_on_delete: bool) -> Self {
        let calls: CallLog = Arc::default();
        let source = Arc::new(FakeSource::default());
        let target_groups = Arc::new(FakeTargetGroups::new(calls.clone()));
        let dns = Arc::new(FakeDns::new(calls.clone()));
        let dispatcher = Dispatcher::new(
            source.clone(),
            Backends::new(target_groups.clone(), dns.clone()),
            cleanup_on_delete,
        );
        Self {
            source,
            target_groups,
            dns,
            dispatcher,
            calls,
        }
    }

    /// Returns and clears the recorded calls.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

pub fn web() -> ResourceIdentity {
    ResourceIdentity::new("default", "web")
}

pub fn tg_annotations(arn: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![(TARGET_GROUP_ANNOTATION, arn)]
}

pub fn dns_annotations() -> Vec<(&'static str, &'static str)> {
    vec![(DNS_ZONE_ANNOTATION, ZONE), (DNS_DOMAIN_ANNOTATION, DOMAIN)]
}

pub fn all_annotations() -> Vec<(&'static str, &'static str)> {
    let mut a = tg_annotations(ARN);
    a.extend(dns_annotations());
    a
}

pub fn record_key() -> String {
    format!("{}/{}", ZONE, DOMAIN)
}

pub fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
