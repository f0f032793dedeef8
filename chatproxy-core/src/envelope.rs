use serde::{Deserialize, Serialize};

use crate::error::ChatProxyError;

/// Caller-facing JSON error envelope, returned whenever the relay fails
/// before committing a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub status: String,
    #[serde(rename = "errorCode")]
    pub error_code: u16,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(error_code: u16, error_message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error_code,
            error_message: error_message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn from_error(err: &ChatProxyError) -> Self {
        let message = match err {
            ChatProxyError::Unauthorized => "Unauthorized".to_string(),
            ChatProxyError::Validation(detail) => detail.clone(),
            ChatProxyError::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self::new(err.http_status().as_u16(), message)
    }
}
