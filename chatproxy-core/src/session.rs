//! Client-side stream session.
//!
//! One `StreamSession` is bound to one logical conversation. One request is
//! in flight at a time (`submit` takes `&mut self`), so events from a
//! superseded request can never mutate newer state.
//!
//! Contract:
//! - The continuation id is committed only when `response.completed` arrives;
//!   an aborted or failed request never overwrites the last committed id.
//! - Abort is a success, not an error: the request resolves with
//!   `aborted: true` and whatever text had streamed.
//! - Decode failures, transport drops, and a stream that ends without a
//!   `response.completed` reject the request; the partial text stays readable
//!   through `streamed_text()` for recovery display.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{StreamExt, TryStreamExt};
use tokio::sync::Notify;

use crate::decode::FrameDecoder;
use crate::envelope::ErrorEnvelope;
use crate::error::{ChatProxyError, CoreResult, map_upstream_error};
use crate::event::{StreamEvent, classify};
use crate::validate::ChatPayload;

/// Request lifecycle. `Completed`, `Aborted` and `Failed` are terminal for
/// the request; the session itself is reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
    Completed,
    Aborted,
    Failed,
}

/// Final outcome exposed to the caller. Both natural completion and abort
/// resolve here; callers branch on `aborted`, not on catching an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub continuation_id: Option<String>,
    pub final_text: String,
    pub aborted: bool,
    pub abort_reason: Option<String>,
}

#[derive(Default)]
struct AbortShared {
    fired: AtomicBool,
    settled: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

/// Cancellation handle for the request it was taken for. Cheap to clone.
/// Aborting twice, or aborting after the request settled, is a no-op.
#[derive(Clone)]
pub struct AbortHandle {
    shared: Arc<AbortShared>,
}

impl AbortHandle {
    pub fn abort(&self, reason: Option<&str>) {
        if self.shared.settled.load(Ordering::SeqCst) {
            return;
        }
        if self.shared.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shared.reason.lock().unwrap() = reason.map(str::to_string);
        self.shared.notify.notify_one();
    }
}

enum RunEnd {
    Completed { pending_id: Option<String> },
    Aborted,
}

pub struct StreamSession {
    http: reqwest::Client,
    endpoint: String,
    committed_id: Option<String>,
    last_text: String,
    phase: Phase,
    shared: Arc<AbortShared>,
    on_delta: Option<Box<dyn FnMut(&str) + Send>>,
}

impl StreamSession {
    /// `endpoint` is the full relay URL, e.g.
    /// `http://127.0.0.1:8787/api/chat-openai`. Auth material (cookies,
    /// bearer headers) belongs on the `reqwest::Client`.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            committed_id: None,
            last_text: String::new(),
            phase: Phase::Idle,
            shared: Arc::new(AbortShared::default()),
            on_delta: None,
        }
    }

    /// Observer invoked synchronously on every text delta with the full
    /// accumulated text so far.
    pub fn set_delta_observer(&mut self, f: impl FnMut(&str) + Send + 'static) {
        self.on_delta = Some(Box::new(f));
    }

    /// Handle for the current (or next) request. Inert once that request
    /// settles.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            shared: self.shared.clone(),
        }
    }

    /// Side-channel getter: the latest partial text, retained across failure
    /// so the UI can show what had streamed.
    pub fn streamed_text(&self) -> &str {
        &self.last_text
    }

    /// The last committed continuation id. Only a request that reached
    /// `response.completed` updates this.
    pub fn committed_continuation_id(&self) -> Option<&str> {
        self.committed_id.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one request to a terminal state.
    ///
    /// The session's own committed id is authoritative as the continuation
    /// parameter; a `previous_response_id` on the payload only seeds the
    /// first request of a session.
    pub async fn submit(&mut self, payload: ChatPayload) -> CoreResult<StreamOutcome> {
        self.last_text.clear();
        self.phase = Phase::Sending;
        // A handle fired while idle belongs to a request that never started.
        if self.shared.fired.load(Ordering::SeqCst) || self.shared.settled.load(Ordering::SeqCst) {
            self.shared = Arc::new(AbortShared::default());
        }
        let shared = self.shared.clone();

        let previous = self
            .committed_id
            .clone()
            .or(payload.previous_response_id.clone());
        let body = ChatPayload {
            input: payload.input,
            previous_response_id: previous,
            model: payload.model,
        };

        let result = self.run(&body, &shared).await;

        // Settle: release the handle, arm a fresh one for the next request.
        shared.settled.store(true, Ordering::SeqCst);
        self.shared = Arc::new(AbortShared::default());

        match result {
            Ok(RunEnd::Completed { pending_id }) => {
                if let Some(id) = pending_id {
                    self.committed_id = Some(id);
                }
                self.phase = Phase::Completed;
                Ok(StreamOutcome {
                    continuation_id: self.committed_id.clone(),
                    final_text: self.last_text.clone(),
                    aborted: false,
                    abort_reason: None,
                })
            }
            Ok(RunEnd::Aborted) => {
                self.phase = Phase::Aborted;
                let reason = shared
                    .reason
                    .lock()
                    .unwrap()
                    .clone()
                    .or_else(|| Some("Aborted by user".to_string()));
                Ok(StreamOutcome {
                    continuation_id: self.committed_id.clone(),
                    final_text: self.last_text.clone(),
                    aborted: true,
                    abort_reason: reason,
                })
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    async fn run(&mut self, body: &ChatPayload, shared: &AbortShared) -> CoreResult<RunEnd> {
        let send_fut = self.http.post(&self.endpoint).json(body).send();
        tokio::pin!(send_fut);

        let resp = tokio::select! {
            biased;
            _ = shared.notify.notified() => return Ok(RunEnd::Aborted),
            r = &mut send_fut => r.map_err(|e| ChatProxyError::Network(e.to_string()))?,
        };

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&text) {
                return Err(ChatProxyError::Upstream {
                    status: env.error_code,
                    message: env.error_message,
                });
            }
            return Err(map_upstream_error(Some(status), &text));
        }

        let bytes = resp
            .bytes_stream()
            .map_err(|e| ChatProxyError::Network(e.to_string()));
        let mut frames = FrameDecoder::new(Box::pin(bytes));
        let mut pending_id: Option<String> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = shared.notify.notified() => return Ok(RunEnd::Aborted),
                f = frames.next() => f,
            };
            let Some(frame) = next else {
                // Stream ended without a completed event: truncated.
                return Err(ChatProxyError::Network(
                    "stream ended before completion".to_string(),
                ));
            };
            self.phase = Phase::Streaming;
            match classify(&frame?) {
                Some(StreamEvent::TextDelta { delta }) => {
                    self.last_text.push_str(&delta);
                    if let Some(cb) = self.on_delta.as_mut() {
                        cb(&self.last_text);
                    }
                }
                Some(StreamEvent::Created { id }) => {
                    pending_id = Some(id);
                }
                Some(StreamEvent::Completed) => {
                    return Ok(RunEnd::Completed { pending_id });
                }
                None => {}
            }
        }
    }
}
