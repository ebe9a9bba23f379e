use std::sync::Arc;

use anyhow::Context;
use lantern::channel::TcpSwitch;
use lantern::config::Config;
use lantern::server::Server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let switch = TcpSwitch::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("cannot listen on {}", cfg.server.listen_addr))?;
    tracing::info!("Serving {}", cfg.static_files.document_root.display());

    let server = Arc::new(Server::new(cfg)?);

    tokio::select! {
        res = server.serve(switch) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
