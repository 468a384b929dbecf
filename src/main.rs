use calorie_ledger::models::ResetOutcome;
use calorie_ledger::remote::{GistHistoryStore, HistoryStore};
use calorie_ledger::sync;
use calorie_ledger::{router, AppConfig, AppState, DailyLedger, FileDocumentStore};
use chrono::Local;
use std::{net::SocketAddr, sync::Arc};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env();
    if let Some(parent) = config.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let store = FileDocumentStore::open(&config.data_path).await;
    info!(path = %store.path().display(), "opened ledger store");
    let ledger = DailyLedger::new(Arc::new(store), config.policy.clone());

    let remote: Option<Arc<dyn HistoryStore>> = if config.remote_history {
        Some(Arc::new(GistHistoryStore::new(config.gist_api_base.clone())?))
    } else {
        info!("remote history disabled, keeping history locally");
        None
    };

    match ledger.check_and_apply_reset(Local::now()).await {
        Ok(ResetOutcome::Applied { finalized, .. }) if !finalized.is_empty() => {
            if let Some(remote) = remote.as_deref() {
                if let Err(err) = sync::push_finalized(&ledger, remote, &finalized).await {
                    warn!("failed to queue startup notice: {err}");
                }
            }
        }
        Ok(outcome) => info!(?outcome, "startup reset check"),
        Err(err) => warn!("startup reset check failed: {err}"),
    }

    let state = AppState::new(ledger, remote, config.view_options());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
