use crate::state::AppState;
use async_stream::stream;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use oktsec_types::{EvalMode, Message, PolicyDecision};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

/// Streamable HTTP gateway router: a POST endpoint for tool calls,
/// `/healthz`, and an SSE audit tail.
pub fn router(state: AppState, endpoint_path: &str) -> Router {
    Router::new()
        .route(endpoint_path, post(handle_tool_call))
        .route("/healthz", get(health))
        .route("/audit/stream", get(audit_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `tools/call` request body: the Streamable HTTP gateway feeds each call
/// through `Evaluate`.
#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    from: String,
    to: String,
    content: String,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuarantinedResponse {
    quarantine_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

/// POST handler: block -> 403, quarantine -> 202 + id, rejected -> 401/403
/// depending on the reason, everything else -> 200.
async fn handle_tool_call(
    State(state): State<AppState>,
    Json(req): Json<ToolCallRequest>,
) -> Response {
    let message = Message {
        from: req.from,
        to: req.to,
        content: req.content,
        timestamp: Utc::now(),
        signature: req.signature,
    };
    let verdict = state.pipeline.evaluate(&message, EvalMode::Enforce).await;

    match verdict.decision {
        PolicyDecision::Block => {
            let rule = verdict
                .rules_triggered
                .first()
                .map(|r| r.rule_id.clone())
                .unwrap_or_else(|| "policy".to_string());
            (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: ErrorBody {
                        message: format!("blocked by oktsec-gateway: {rule}"),
                    },
                }),
            )
                .into_response()
        }
        PolicyDecision::Quarantine => (
            StatusCode::ACCEPTED,
            Json(QuarantinedResponse {
                quarantine_id: verdict.quarantine_id.unwrap_or_default(),
            }),
        )
            .into_response(),
        PolicyDecision::SignatureRequired
        | PolicyDecision::SignatureInvalid
        | PolicyDecision::KeyMissing
        | PolicyDecision::KeyRevoked => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: ErrorBody {
                    message: format!("rejected: {}", verdict.decision.as_str()),
                },
            }),
        )
            .into_response(),
        PolicyDecision::RateLimited
        | PolicyDecision::AclDenied
        | PolicyDecision::AgentSuspended
        | PolicyDecision::RecipientSuspended => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: ErrorBody {
                    message: format!("rejected: {}", verdict.decision.as_str()),
                },
            }),
        )
            .into_response(),
        PolicyDecision::Allow | PolicyDecision::AllowAndFlag | PolicyDecision::ScanError => {
            StatusCode::OK.into_response()
        }
    }
}

/// `GET /audit/stream`: live tail of the Hub as server-sent events, with a
/// periodic keepalive comment event.
async fn audit_stream(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.hub.subscribe();
    let out = stream! {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(entry) => {
                        let payload = serde_json::to_string(&entry).unwrap_or_default();
                        yield Ok(Event::default().data(payload));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        yield Ok(Event::default().data(format!("{{\"lagged\":{n}}}")));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("keepalive"));
                }
            }
        }
    };
    Sse::new(out).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keepalive"))
}
