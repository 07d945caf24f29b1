use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use relay_api::{PublisherId, SubscriberId};
use relay_engine::RelayError;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  Wire types
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct PublishRequest {
    #[serde(rename = "pubId")]
    pub_id: PublisherId,
    message: String,
}

#[derive(Deserialize)]
pub(crate) struct SubscriberRequest {
    #[serde(rename = "subId")]
    sub_id: SubscriberId,
}

#[derive(Serialize)]
struct RegisterPublisherResponse {
    #[serde(rename = "pubId")]
    pub_id: PublisherId,
}

#[derive(Serialize)]
struct SubscribeResponse {
    #[serde(rename = "subId")]
    sub_id: SubscriberId,
    topic: String,
}

#[derive(Serialize)]
struct GetMessageResponse {
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    #[serde(rename = "errorMessage")]
    error_message: &'a str,
}

// ═══════════════════════════════════════════════════════════════
//  Errors → HTTP
// ═══════════════════════════════════════════════════════════════

/// Client errors carry their description; infrastructure failures are
/// logged and answered with a fixed message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Relay(e) => match e {
                RelayError::TopicAlreadyBound(_) => StatusCode::BAD_REQUEST,
                RelayError::TopicNotFound(_) => StatusCode::NOT_FOUND,
                RelayError::UnauthorizedPublisher { .. } => StatusCode::UNAUTHORIZED,
                RelayError::UnknownSubscriber(_) => StatusCode::NOT_FOUND,
                RelayError::SubscriberNotBoundToTopic { .. } => StatusCode::NOT_FOUND,
                RelayError::Store(_) | RelayError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = self.to_string();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %description, "request failed");
            "Something went wrong"
        } else {
            tracing::warn!(status = status.as_u16(), error = %description, "request rejected");
            description.as_str()
        };
        (status, Json(ErrorResponse { error_message: message })).into_response()
    }
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "unreadable request body");
        ApiError::BadRequest("Couldn't read request body".to_string())
    })
}

fn message_response(payload: Option<String>) -> Response {
    match payload {
        Some(message) => Json(GetMessageResponse { message }).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  POST /topic/register/{topic}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_register_publisher(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Response, ApiError> {
    let pub_id = state.relay.register_publisher(&topic).await?;
    Ok(Json(RegisterPublisherResponse { pub_id }).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  POST /message/publish/{topic}   {"pubId","message"}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_publish(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: PublishRequest = parse_body(&body)?;
    state
        .relay
        .publish(&topic, &request.pub_id, &request.message)
        .await?;
    Ok("Message sent".into_response())
}

// ═══════════════════════════════════════════════════════════════
//  POST /topic/subscribe/{topic}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_subscribe(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Response, ApiError> {
    let sub_id = state.relay.subscribe(&topic).await?;
    Ok(Json(SubscribeResponse { sub_id, topic }).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  GET /message/get/{topic}   {"subId"}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_get_message(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: SubscriberRequest = parse_body(&body)?;
    let payload = state.relay.get_message(&request.sub_id, &topic).await?;
    Ok(message_response(payload))
}

// ═══════════════════════════════════════════════════════════════
//  DELETE /message/ack/{topic}   {"subId"}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ack_message(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: SubscriberRequest = parse_body(&body)?;
    let payload = state.relay.ack_message(&request.sub_id, &topic).await?;
    Ok(message_response(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use relay_api::{KvStore, StoreError, StoreFuture};
    use relay_engine::{KeySpace, ManualClock, Relay};
    use storage_memory::MemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::{DEFAULT_BODY_LIMIT, router};

    fn app() -> Router {
        let relay = Relay::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_000)),
            KeySpace::default(),
        );
        router(relay, DEFAULT_BODY_LIMIT)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json(body: &str) -> serde_json::Value {
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_orders_flow() {
        let app = app();

        let (status, body) = call(&app, Method::POST, "/topic/register/orders", "").await;
        assert_eq!(status, StatusCode::OK);
        let pub_id = json(&body)["pubId"].as_str().unwrap().to_string();

        let publish = serde_json::json!({"pubId": pub_id, "message": "{\"order\":1}"}).to_string();
        let (status, body) = call(&app, Method::POST, "/message/publish/orders", &publish).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message sent");

        let (status, body) = call(&app, Method::POST, "/topic/subscribe/orders", "").await;
        assert_eq!(status, StatusCode::OK);
        let sub = json(&body);
        assert_eq!(sub["topic"], "orders");
        let request = serde_json::json!({"subId": sub["subId"]}).to_string();

        let (status, body) = call(&app, Method::GET, "/message/get/orders", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["message"], "{\"order\":1}");

        let (status, body) = call(&app, Method::DELETE, "/message/ack/orders", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["message"], "{\"order\":1}");

        let (status, body) = call(&app, Method::GET, "/message/get/orders", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_client_error_statuses() {
        let app = app();

        let (status, body) = call(&app, Method::POST, "/topic/register/t", "").await;
        assert_eq!(status, StatusCode::OK);
        let pub_id = json(&body)["pubId"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::POST, "/topic/register/t", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json(&body)["errorMessage"].as_str().unwrap().contains("already has"));

        let wrong = r#"{"pubId":"wrong-id","message":"x"}"#;
        let (status, _) = call(&app, Method::POST, "/message/publish/t", wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let ok = serde_json::json!({"pubId": pub_id, "message": "x"}).to_string();
        let (status, _) = call(&app, Method::POST, "/message/publish/missing", &ok).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::POST, "/topic/subscribe/missing", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::POST, "/message/publish/t", "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["errorMessage"], "Couldn't read request body");

        let unknown = r#"{"subId":"does-not-exist"}"#;
        let (status, _) = call(&app, Method::GET, "/message/get/t", unknown).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(&app, Method::POST, "/topic/register/other", "").await;
        let (_, body) = call(&app, Method::POST, "/topic/subscribe/other", "").await;
        let request = serde_json::json!({"subId": json(&body)["subId"]}).to_string();
        let (status, _) = call(&app, Method::DELETE, "/message/ack/t", &request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let relay = Relay::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
            KeySpace::default(),
        );
        let app = router(relay, 64);
        call(&app, Method::POST, "/topic/register/t", "").await;

        let big = format!(r#"{{"pubId":"x","message":"{}"}}"#, "a".repeat(128));
        let (status, _) = call(&app, Method::POST, "/message/publish/t", &big).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    struct BrokenStore;

    impl KvStore for BrokenStore {
        fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
            Box::pin(async { Err(StoreError::io("connection reset by peer")) })
        }

        fn set<'a>(&'a self, _key: &'a str, _value: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(StoreError::io("connection reset by peer")) })
        }

        fn append_to_list<'a>(&'a self, _key: &'a str, _value: &'a str) -> StoreFuture<'a, ()> {
            Box::pin(async { Err(StoreError::io("connection reset by peer")) })
        }

        fn pop_front<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
            Box::pin(async { Err(StoreError::io("connection reset by peer")) })
        }

        fn range_of_list<'a>(
            &'a self,
            _key: &'a str,
            _start: i64,
            _stop: i64,
        ) -> StoreFuture<'a, Vec<String>> {
            Box::pin(async { Err(StoreError::io("connection reset by peer")) })
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_opaque() {
        let relay = Relay::new(
            Arc::new(BrokenStore),
            Arc::new(ManualClock::new(0)),
            KeySpace::default(),
        );
        let app = router(relay, DEFAULT_BODY_LIMIT);

        let (status, body) = call(&app, Method::POST, "/topic/register/t", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body)["errorMessage"], "Something went wrong");
        assert!(!body.contains("reset"));
    }
}
