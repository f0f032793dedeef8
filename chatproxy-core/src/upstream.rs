//! Client for the provider's Responses API.
//!
//! The relay forwards the streaming body verbatim, so the streaming call
//! returns raw bytes; only the non-streaming call (title side task) parses a
//! reply.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::decode::ByteStream;
use crate::error::{CoreResult, map_upstream_error};
use crate::http_client::HttpClient;
use crate::validate::ChatInput;

#[derive(Clone)]
pub struct ResponsesClient {
    http: HttpClient,
    base: String,
    api_key: SecretString,
}

impl ResponsesClient {
    pub fn new(http: HttpClient, api_key: SecretString, base: String) -> Self {
        Self {
            http,
            api_key,
            base,
        }
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str) -> Self {
        ResponsesClient::new(
            HttpClient::new_default().unwrap(),
            SecretString::new("test-key".into()),
            server_base.to_string(),
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    fn url(&self) -> String {
        format!("{}/v1/responses", self.base)
    }

    /// Open a streaming generation call; the returned bytes are the
    /// provider's line-delimited event stream, untouched.
    pub async fn stream(&self, req: &ResponsesRequest<'_>) -> CoreResult<ByteStream> {
        let owned = self.headers();
        let hdrs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.http.post_stream(&self.url(), req, &hdrs).await
    }

    /// Non-streaming generation call, used by the title side task.
    pub async fn create(&self, req: &ResponsesRequest<'_>) -> CoreResult<ResponsesReply> {
        let owned = self.headers();
        let hdrs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let reply: ResponsesReply = self.http.post_json(&self.url(), req, &hdrs).await?;
        if let Some(err) = &reply.error {
            return Err(map_upstream_error(None, &err.message));
        }
        Ok(reply)
    }
}

// ---- Wire structs (minimal) ----

#[derive(Serialize)]
pub struct ResponsesRequest<'a> {
    pub model: &'a str,
    pub input: &'a ChatInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<&'a str>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesReply {
    pub id: String,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    message: String,
}

impl ResponsesReply {
    /// Concatenated text of all output content parts.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|o| o.content.iter())
            .filter_map(|c| c.text.as_deref())
            .collect()
    }
}
