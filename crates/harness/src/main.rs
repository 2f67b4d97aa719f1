//! Remote UI Harness - Main entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_ui_harness::config::load_dotenv_from_repo_root;
use remote_ui_harness::{CommandTable, HarnessConfig, HarnessHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "remote_ui_harness=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Remote UI Harness");

    let config = HarnessConfig::from_env()?;
    let mut harness = HarnessHandle::spawn(config.addr, CommandTable::with_defaults()).await?;
    tracing::info!(ws_url = %harness.ws_url(), info_url = %harness.info_url(), "Harness ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
        _ = harness.wait() => {
            anyhow::bail!("harness server exited unexpectedly");
        }
    }

    harness.shutdown();
    Ok(())
}
