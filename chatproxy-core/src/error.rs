use http::StatusCode;
use thiserror::Error;

/// Core error type for chatproxy.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum ChatProxyError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Upstream failure already mapped to a caller-facing status + message.
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// A non-empty stream line failed JSON parse. Fatal for the session;
    /// carries the raw offending line for diagnostics.
    #[error("malformed stream frame: {line}")]
    MalformedFrame { line: String },

    /// Transport-level failure (connect failure, mid-stream drop, truncated
    /// stream). Distinct from an explicit abort, which is not an error.
    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = std::result::Result<T, ChatProxyError>;

impl ChatProxyError {
    /// HTTP status the relay answers with when this error is raised before
    /// any bytes have streamed.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Recognized upstream failure categories, matched by substring against the
/// cleaned error text. Friendly messages replace raw provider strings.
const CATEGORY_MAP: [(&str, u16, &str); 7] = [
    ("rate_limit", 429, "Rate limit exceeded. Please try again later."),
    (
        "quota_exceeded",
        402,
        "Quota exceeded. Please check your provider account.",
    ),
    (
        "insufficient_quota",
        402,
        "Quota exceeded. Please check your provider account.",
    ),
    ("invalid_api_key", 401, "Invalid API configuration."),
    (
        "model_not_found",
        400,
        "Specified model not found or not available.",
    ),
    (
        "context_length_exceeded",
        400,
        "Context length exceeded. Please reduce input size.",
    ),
    (
        "organization must be verified",
        403,
        "Your organization must be verified to use this model. Please contact your administrator.",
    ),
];

/// If the message starts with a bare 3-digit HTTP status ("429 You exceeded
/// ..."), split it off and return `(Some(status), rest)`.
pub fn extract_status_code(message: &str) -> (Option<u16>, &str) {
    let mut parts = message.splitn(2, ' ');
    let first = parts.next().unwrap_or("");
    if first.len() == 3
        && let Ok(code) = first.parse::<u16>()
        && (100..600).contains(&code)
    {
        return (Some(code), parts.next().unwrap_or("").trim_start());
    }
    (None, message)
}

/// Map an upstream failure to a caller-facing `Upstream` error.
///
/// Precedence: an explicit status embedded in the error text wins, then the
/// category table, then the transport status with the (truncated) raw body,
/// then a plain 500.
pub fn map_upstream_error(http_status: Option<StatusCode>, body: &str) -> ChatProxyError {
    let (extracted, clean) = extract_status_code(body.trim());

    if let Some(code) = extracted {
        return ChatProxyError::Upstream {
            status: code,
            message: clean.to_string(),
        };
    }

    for (needle, code, friendly) in CATEGORY_MAP {
        if clean.contains(needle) {
            return ChatProxyError::Upstream {
                status: code,
                message: friendly.to_string(),
            };
        }
    }

    let status = http_status
        .filter(|s| !s.is_success())
        .map(|s| s.as_u16())
        .unwrap_or(500);
    let message = if clean.is_empty() {
        "Unknown error occurred".to_string()
    } else {
        truncate(clean, 300)
    };
    ChatProxyError::Upstream { status, message }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        let mut t = s[..cut].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}
