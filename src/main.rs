use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use electrix::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "electrix",
        "electrix starting: RUST_LOG='{}', http_port={}, backend='{}', provisioning={:?}",
        rust_log, config.http_port, config.backend_url, config.provisioning
    );

    electrix::server::run(config).await
}
