//! Semantic stream events.
//!
//! Contract:
//! - The upstream may emit 0..n `TextDelta` events, at most one `Created`
//!   (always before `Completed`), and at most one terminal `Completed`.
//! - Any other record kind the upstream emits is ignored, not an error.
//! - A recognized discriminant with an unusable shape (e.g. `response.created`
//!   without an id) is also ignored; the session must not die over it.

/// Closed set of event kinds this core consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Upstream allocated a provisional identifier for this generation.
    Created { id: String },
    /// Partial generated text. Empty string is allowed.
    TextDelta { delta: String },
    /// Generation finished successfully. Terminal.
    Completed,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Map one decoded JSON record to an event, or `None` for ignored records.
pub fn classify(frame: &serde_json::Value) -> Option<StreamEvent> {
    match frame.get("type").and_then(|t| t.as_str())? {
        "response.created" => {
            let id = frame
                .get("response")
                .and_then(|r| r.get("id"))
                .and_then(|id| id.as_str())?;
            Some(StreamEvent::Created { id: id.to_string() })
        }
        "response.output_text.delta" => {
            let delta = frame
                .get("delta")
                .and_then(|d| d.as_str())
                .unwrap_or_default();
            Some(StreamEvent::TextDelta {
                delta: delta.to_string(),
            })
        }
        "response.completed" => Some(StreamEvent::Completed),
        _ => None,
    }
}
