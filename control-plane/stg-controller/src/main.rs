use envconfig::Envconfig;
use kube::Client;
use stg_controller::{config::StgConfig, init_tracing, runtime};
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    // kube's rustls stack needs a process-wide crypto provider.
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cfg = StgConfig::init_from_env()?;
    info!(?cfg, "Starting stg-controller");

    let client = Client::try_default().await?;
    runtime::run(client, cfg).await
}
