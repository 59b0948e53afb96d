use accrual_client::AccrualApi;
use log::*;
use loyalty_engine::SqliteDatabase;

use crate::{
    accrual_worker::start_accrual_worker,
    config::ServerConfig,
    errors::ServerError,
    integrations::accrual::AccrualOracleClient,
};

/// Connects to the ledger, runs the accrual worker, and waits for a shutdown signal.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    let api = AccrualApi::new(config.accrual.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    info!("🚀️ Querying the accrual system at {}", config.accrual.base_url);
    let (worker, shutdown) = start_accrual_worker(db.clone(), AccrualOracleClient::new(api), config.worker);

    wait_for_shutdown_signal().await?;
    info!("🚀️ Shutting down");
    if shutdown.send(true).is_err() {
        warn!("🚀️ The accrual worker had already stopped");
    }
    worker.await.map_err(|e| ServerError::BackendError(format!("Accrual worker failed. {e}")))?;
    db.close().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<(), ServerError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<(), ServerError> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
