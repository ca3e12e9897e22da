use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct StgConfig {
    /// Restrict the Service/Endpoints watch to one namespace.
    /// Env: STG_WATCH_NAMESPACE (unset = all namespaces)
    #[envconfig(from = "STG_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Deregister/unpublish members when their Service is deleted.
    /// Env: STG_CLEANUP_ON_DELETE
    #[envconfig(from = "STG_CLEANUP_ON_DELETE", default = "true")]
    pub cleanup_on_delete: bool,

    /// Requeue every Service after a successful pass. Unset waits for changes.
    /// Env: STG_RESYNC_SECS
    #[envconfig(from = "STG_RESYNC_SECS")]
    pub resync_secs: Option<u64>,

    /// Requeue delay after a Kubernetes read error.
    /// Env: STG_ERROR_REQUEUE_SECS
    #[envconfig(from = "STG_ERROR_REQUEUE_SECS", default = "60")]
    pub error_requeue_secs: u64,

    #[envconfig(nested)]
    pub aws: AwsEndpointConfig,
}

/// Endpoint overrides, mostly for localstack-style test setups. Credentials
/// and region always come from the default provider chain.
#[derive(Envconfig, Clone, Debug, Default)]
pub struct AwsEndpointConfig {
    #[envconfig(from = "STG_ELB_ENDPOINT_URL")]
    pub elb_endpoint_url: Option<String>,

    #[envconfig(from = "STG_ROUTE53_ENDPOINT_URL")]
    pub route53_endpoint_url: Option<String>,
}

impl StgConfig {
    pub fn resync_interval(&self) -> Option<Duration> {
        self.resync_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
