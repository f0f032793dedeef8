//! Upstream relay endpoint.
//!
//! `POST /api/chat-openai`: authenticate, validate, open exactly one upstream
//! streaming call, and forward its bytes verbatim. Failures before the call
//! is established come back as a JSON error envelope; once the 200 is
//! committed the relay can only end the byte stream, and the client detects a
//! missing `response.completed` as the failure signal.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tracing::{debug, warn};

use crate::auth::SessionAuth;
use crate::envelope::ErrorEnvelope;
use crate::error::ChatProxyError;
use crate::titles::{TitleSink, generate_chat_title};
use crate::upstream::{ResponsesClient, ResponsesRequest};
use crate::validate::parse_chat_payload;

#[derive(Clone)]
pub struct RelayState {
    pub auth: Arc<dyn SessionAuth>,
    pub upstream: ResponsesClient,
    pub default_model: String,
    pub title_model: String,
    /// Where best-effort conversation titles go; None disables the side task.
    pub titles: Option<Arc<dyn TitleSink>>,
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/api/chat-openai", post(chat_openai))
        .with_state(state)
}

fn envelope_response(err: &ChatProxyError) -> Response {
    let env = ErrorEnvelope::from_error(err);
    (err.http_status(), axum::Json(env)).into_response()
}

async fn chat_openai(State(state): State<RelayState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.auth.authenticate(&headers).await {
        return envelope_response(&ChatProxyError::Unauthorized);
    }

    if body.is_empty() {
        return envelope_response(&ChatProxyError::Validation("Missing body".into()));
    }
    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return envelope_response(&ChatProxyError::Validation(format!(
                "Invalid JSON body: {e}"
            )));
        }
    };
    let payload = match parse_chat_payload(&raw) {
        Ok(p) => p,
        Err(e) => return envelope_response(&e),
    };

    let model = payload
        .model
        .clone()
        .unwrap_or_else(|| state.default_model.clone());
    let request = ResponsesRequest {
        model: &model,
        input: &payload.input,
        previous_response_id: payload.previous_response_id.as_deref(),
        instructions: None,
        stream: true,
    };

    let upstream_bytes = match state.upstream.stream(&request).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "upstream call failed to establish");
            return envelope_response(&e);
        }
    };

    // First turn of a conversation: kick off the title side task. Its
    // failure must never fail or delay the relay.
    if payload.previous_response_id.is_none()
        && let Some(sink) = state.titles.clone()
    {
        let client = state.upstream.clone();
        let title_model = state.title_model.clone();
        let input = payload.input.clone();
        tokio::spawn(async move {
            match generate_chat_title(&client, &title_model, &input).await {
                Ok(title) => sink.store(title).await,
                Err(e) => warn!(error = %e, "title generation failed"),
            }
        });
    }

    debug!(model = %model, "relaying upstream stream");
    // Client disconnect drops this body stream, which drops the upstream
    // response, cancelling the upstream call.
    Response::builder()
        .status(200)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(upstream_bytes))
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build relay response");
            envelope_response(&ChatProxyError::Other(anyhow::anyhow!(
                "response build failed"
            )))
        })
}
