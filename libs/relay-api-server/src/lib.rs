mod http;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tokio_util::sync::CancellationToken;

use relay_engine::Relay;

pub use http::ApiError;

/// Request bodies above this are rejected with 413.
pub const DEFAULT_BODY_LIMIT: usize = 128_000;

#[derive(Clone)]
pub(crate) struct AppState {
    relay: Relay,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("bind api :{port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("axum serve: {0}")]
    Serve(std::io::Error),
}

/// Routes of the relay HTTP API.
pub fn router(relay: Relay, body_limit: usize) -> Router {
    Router::new()
        .route("/topic/register/{topic}", post(http::handle_register_publisher))
        .route("/topic/subscribe/{topic}", post(http::handle_subscribe))
        .route("/message/publish/{topic}", post(http::handle_publish))
        .route("/message/get/{topic}", get(http::handle_get_message))
        .route("/message/ack/{topic}", delete(http::handle_ack_message))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState { relay })
}

/// HTTP API сервер. Returns once `shutdown` fires and in-flight requests drain.
pub async fn run(
    port: u16,
    relay: Relay,
    body_limit: usize,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let app = router(relay, body_limit);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| ServeError::Bind { port, source })?;
    tracing::info!(port, "api server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ServeError::Serve)?;

    Ok(())
}
