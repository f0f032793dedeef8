//! Best-effort conversation title generation.
//!
//! Runs as a side task on the first turn of a conversation. Failure here must
//! never fail or delay the relay; the caller spawns this and logs errors.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ChatProxyError, CoreResult};
use crate::upstream::{ResponsesClient, ResponsesRequest};
use crate::validate::ChatInput;

const TITLE_INSTRUCTIONS: &str = "Summarize the user's message as a short conversation title. \
Respond with a JSON object of the form {\"title\": \"...\"}. \
The title must be 1 to 80 characters, plain text, no quotes around the whole reply.";

const MAX_TITLE_LEN: usize = 80;

/// Where a generated title goes. Persistence is the collaborator's job.
#[async_trait]
pub trait TitleSink: Send + Sync {
    async fn store(&self, title: String);
}

#[derive(Deserialize)]
struct TitleReply {
    title: String,
}

/// Ask the upstream for a short human-readable title for this input.
pub async fn generate_chat_title(
    client: &ResponsesClient,
    model: &str,
    input: &ChatInput,
) -> CoreResult<String> {
    let req = ResponsesRequest {
        model,
        input,
        previous_response_id: None,
        instructions: Some(TITLE_INSTRUCTIONS),
        stream: false,
    };
    let reply = client.create(&req).await?;
    let text = reply.output_text();

    let parsed: TitleReply = serde_json::from_str(text.trim()).map_err(|_| {
        ChatProxyError::Other(anyhow::anyhow!(
            "structured title output missing or malformed"
        ))
    })?;

    let title = parsed.title.trim().to_string();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ChatProxyError::Other(anyhow::anyhow!(
            "generated title out of bounds ({} chars)",
            title.chars().count()
        )));
    }
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    fn title_body(text: &str) -> serde_json::Value {
        json!({
            "id": "resp_t",
            "output": [{"content": [{"type": "output_text", "text": text}]}]
        })
    }

    #[tokio::test]
    async fn parses_structured_title() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/v1/responses");
            then.status(200)
                .json_body(title_body("{\"title\": \"Trip planning\"}"));
        });
        let client = ResponsesClient::new_for_tests(&server.base_url());
        let input = ChatInput::Text("help me plan a trip".into());
        let title = generate_chat_title(&client, "gpt-5-nano", &input)
            .await
            .unwrap();
        assert_eq!(title, "Trip planning");
    }

    #[tokio::test]
    async fn unstructured_output_is_an_error() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/v1/responses");
            then.status(200).json_body(title_body("Trip planning"));
        });
        let client = ResponsesClient::new_for_tests(&server.base_url());
        let input = ChatInput::Text("hi".into());
        let err = generate_chat_title(&client, "gpt-5-nano", &input)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatProxyError::Other(_)));
    }

    #[tokio::test]
    async fn oversize_title_is_an_error() {
        let server = MockServer::start();
        let long = "x".repeat(81);
        let body = title_body(&format!("{{\"title\": \"{long}\"}}"));
        let _m = server.mock(|when, then| {
            when.method(POST).path("/v1/responses");
            then.status(200).json_body(body);
        });
        let client = ResponsesClient::new_for_tests(&server.base_url());
        let input = ChatInput::Text("hi".into());
        assert!(
            generate_chat_title(&client, "gpt-5-nano", &input)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/v1/responses");
            then.status(500).body("boom");
        });
        let client = ResponsesClient::new_for_tests(&server.base_url());
        let input = ChatInput::Text("hi".into());
        assert!(
            generate_chat_title(&client, "gpt-5-nano", &input)
                .await
                .is_err()
        );
    }
}
