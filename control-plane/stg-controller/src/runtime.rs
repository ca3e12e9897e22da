use std::sync::Arc;

use aws_config::BehaviorVersion;
use kube::Client;

use crate::{
    backend::{
        Backends,
        aws::{ElbTargetGroups, Route53Records},
    },
    config::StgConfig,
    controller::run_controller,
};

/// Build the AWS-backed adapters from the default provider chain.
pub async fn build_backends(cfg: &StgConfig) -> Backends {
    let sdk = aws_config::defaults(BehaviorVersion::latest()).load().await;
    Backends::new(
        Arc::new(ElbTargetGroups::new(&sdk, cfg.aws.elb_endpoint_url.clone())),
        Arc::new(Route53Records::new(
            &sdk,
            cfg.aws.route53_endpoint_url.clone(),
        )),
    )
}

/// Start the controller and wait until it stops.
pub async fn run(client: Client, cfg: StgConfig) -> anyhow::Result<()> {
    let backends = build_backends(&cfg).await;
    run_controller(client, cfg, backends).await
}
