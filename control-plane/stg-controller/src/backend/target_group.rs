use std::sync::Arc;

use async_trait::async_trait;
use stg_models::{
    BackendSpec, DesiredMember, ObservedMember, TargetGroupArn,
};
use tracing::{debug, info};

use super::{Backend, BackendResult, Observed, Target, TargetGroupApi};

/// Registers and deregisters `address:port` targets in one target group.
pub struct TargetGroupAdapter {
    api: Arc<dyn TargetGroupApi>,
    spec: BackendSpec,
    arn: TargetGroupArn,
}

impl TargetGroupAdapter {
    pub fn new(api: Arc<dyn TargetGroupApi>, arn: TargetGroupArn) -> Self {
        Self {
            api,
            spec: BackendSpec::TargetGroup(arn.clone()),
            arn,
        }
    }
}

#[async_trait]
impl Backend for TargetGroupAdapter {
    fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    async fn fetch_observed(&self) -> BackendResult<Observed> {
        let observed = self.api.describe_target_health(&self.arn).await?;
        debug!(target_group = %self.arn, count = observed.len(), "described target health");
        Ok(observed.into())
    }

    async fn apply_add(&self, members: &[DesiredMember]) -> BackendResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let targets: Vec<Target> = members
            .iter()
            .map(|m| Target {
                id: m.address.clone(),
                port: m.port,
            })
            .collect();
        let keys: Vec<String> = members.iter().map(|m| m.key()).collect();
        info!(target_group = %self.arn, targets = ?keys, "registering");
        self.api.register_targets(&self.arn, &targets).await
    }

    async fn apply_remove(
        &self,
        members: &[ObservedMember],
    ) -> BackendResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let targets: Vec<Target> = members
            .iter()
            .map(|m| Target {
                id: m.address.clone(),
                port: m.port,
            })
            .collect();
        let keys: Vec<String> = members.iter().map(|m| m.key()).collect();
        info!(target_group = %self.arn, targets = ?keys, "deregistering");
        self.api.deregister_targets(&self.arn, &targets).await
    }
}
