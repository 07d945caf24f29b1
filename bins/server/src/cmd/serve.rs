use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ServeArgs, ServerConfig, StoreConfig};
use crate::error::ServerError;
use relay_api::KvStore;
use relay_engine::{KeySpace, Relay, SystemClock};
use storage_memory::MemoryStore;
use storage_resp::RespStore;

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>, ServerError> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("using in-memory store, state is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreConfig::Resp(resp) => {
            tracing::info!(addr = %resp.addr(), "connecting to store");
            Ok(Arc::new(RespStore::connect(resp.clone()).await?))
        }
    }
}

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("relay-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Store ---
    let store = open_store(&config.store).await?;
    let keys = KeySpace::with_prefix(config.key_prefix.clone());
    let relay = Relay::new(store, Arc::new(SystemClock::new()), keys);

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- API server (HTTP) ---
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(relay_api_server::run(
        config.api_port,
        relay,
        config.body_limit,
        api_token,
    ));
    tracing::info!("server ready");

    // --- Ожидание Ctrl+C ---
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
        }
        // bind failure or serve error before any signal
        result = &mut api_handle => {
            return Ok(result??);
        }
    }

    token.cancel();

    // Drain: wait up to 5s for in-flight requests
    match tokio::time::timeout(Duration::from_secs(5), &mut api_handle).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => tracing::error!(error = %e, "api server task failed"),
        Err(_) => {
            tracing::warn!("api server did not drain in time, aborting");
            api_handle.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
