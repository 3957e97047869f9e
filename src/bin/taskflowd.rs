//! Taskflow service daemon.
//!
//! Loads configuration, opens the task store, and serves the HTTP API until
//! interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use taskflow::advisor::{CompletionClient, SchedulingAdvisor};
use taskflow::config::AppConfig;
use taskflow::server::{ApiServer, AppState};
use taskflow::store::TaskStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = config_path();
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let data_dir = config.database.resolved_data_dir();
    let store = Arc::new(TaskStore::open(&data_dir).context("opening task store")?);
    tracing::info!("task store at {}", data_dir.display());

    let client = CompletionClient::from_config(&config.advisor)
        .context("configuring scheduling advisor")?;
    let advisor = Arc::new(SchedulingAdvisor::new(Arc::clone(&store), client));

    let state = AppState {
        store,
        advisor,
        auth: config.auth.clone(),
    };
    let server = ApiServer::start(state, &config.server)
        .await
        .context("starting API server")?;
    tracing::info!("listening on {}", server.addr());

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    server.shutdown();
    Ok(())
}

/// Config file path: `TASKFLOW_CONFIG`, first CLI argument, or
/// `taskflow.toml` in the working directory.
fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TASKFLOW_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(arg) = std::env::args().nth(1) {
        return PathBuf::from(arg);
    }
    PathBuf::from("taskflow.toml")
}
