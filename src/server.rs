//! HTTP surface - carrier webhook, drain-on-poll, outbound send
//!
//! Routes:
//! - `POST /api/receive-sms` carrier callback (form: `From`, `Body`, `MessageSid`)
//! - `GET  /api/receive-sms?poll=true` drain all buffered messages
//! - `POST /api/send-sms` JSON `{to, body}` dispatched through the carrier
//! - `GET  /health`

use crate::carrier::CarrierClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::InboundSms;
use crate::phone::{is_e164, strip_whitespace};
use crate::relay::RelayBuffer;
use axum::{
    extract::{Form, Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub const RECEIVE_PATH: &str = "/api/receive-sms";
pub const SEND_PATH: &str = "/api/send-sms";

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayBuffer>,
    pub carrier: Arc<CarrierClient>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            relay: Arc::new(RelayBuffer::new(config.relay_capacity)),
            carrier: Arc::new(CarrierClient::new(config)?),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    poll: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    to: Option<String>,
    body: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    success: bool,
    message_id: String,
    status: String,
    to: String,
    from: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    buffered: usize,
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(RECEIVE_PATH, post(receive_sms).get(poll_messages))
        .route(SEND_PATH, post(send_sms))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
    match state.relay.len() {
        Ok(buffered) => Json(HealthResponse {
            status: "ok".to_string(),
            buffered,
        })
        .into_response(),
        Err(e) => {
            error!("Health check could not read relay: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Relay buffer unavailable")
        }
    }
}

async fn receive_sms(State(state): State<AppState>, Form(inbound): Form<InboundSms>) -> Response {
    let Some(msg) = inbound.into_message() else {
        debug!("Rejected inbound callback with missing From or Body");
        return (StatusCode::BAD_REQUEST, "Missing required fields").into_response();
    };

    info!(
        "Received SMS {} from {}: {}",
        msg.id,
        msg.sender,
        msg.body.chars().take(50).collect::<String>()
    );

    match state.relay.append(msg) {
        Ok(_) => (StatusCode::OK, "Message received").into_response(),
        Err(e) => {
            error!("Error processing incoming SMS: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing message").into_response()
        }
    }
}

async fn poll_messages(State(state): State<AppState>, Query(query): Query<PollQuery>) -> Response {
    if query.poll.as_deref() != Some("true") {
        return error_json(StatusCode::BAD_REQUEST, "Invalid request");
    }

    match state.relay.drain_all() {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => {
            error!("Failed to drain relay: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Relay buffer unavailable")
        }
    }
}

async fn send_sms(State(state): State<AppState>, Json(payload): Json<SendRequest>) -> Response {
    let to = payload.to.unwrap_or_default();
    let body = payload.body.unwrap_or_default();

    if to.is_empty() || body.is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Missing required fields: to and body",
        );
    }

    if !is_e164(&to) {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Invalid phone number format. Please use E.164 format (e.g., +1234567890)",
        );
    }

    let sms = state.carrier.compose(&strip_whitespace(&to), &body);
    match state.carrier.send(&sms).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(SendResponse {
                success: true,
                message_id: receipt.sid,
                status: receipt.status,
                to: receipt.to,
                from: receipt.from,
            }),
        )
            .into_response(),
        Err(Error::Provider {
            status,
            code,
            message,
        }) => {
            let status = status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(json!({
                    "error": format!("Carrier error: {}", message),
                    "code": code,
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Send to {} failed: {}", sms.to, e);
            error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send message. Please check your carrier credentials and try again.",
            )
        }
    }
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn run_with_shutdown<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    if !config.has_carrier_credentials() {
        warn!("Carrier credentials not set; outbound sends will be rejected by the carrier");
    }

    let state = AppState::new(config)?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        "SMS relay listening on {} (capacity {})",
        listener.local_addr()?,
        config.relay_capacity
    );

    serve(listener, state, shutdown).await
}

/// Run until Ctrl-C
pub async fn run(config: &Config) -> Result<()> {
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn poisoned_app() -> Router {
        let config = Config::for_test("http://127.0.0.1:9");
        let state = AppState::new(&config).unwrap();
        state.relay.poison();
        build_router(state)
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn test_inbound_with_unavailable_relay_is_server_error() {
        let app = poisoned_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(RECEIVE_PATH)
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("From=%2B15551234567&Body=hello&MessageSid=SM1"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Error processing message");
    }

    #[tokio::test]
    async fn test_poll_with_unavailable_relay_is_server_error() {
        let app = poisoned_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/receive-sms?poll=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "Relay buffer unavailable");
    }

    #[tokio::test]
    async fn test_health_with_unavailable_relay_is_server_error() {
        let app = poisoned_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
