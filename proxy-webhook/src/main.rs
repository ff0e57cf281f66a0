//! Entrypoint of the kubeconfig proxy admission webhook.
use clap::Parser;
use proxy_webhook::{server, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    server::run(config).await?;
    Ok(())
}
