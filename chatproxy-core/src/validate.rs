//! Request payload validation.
//!
//! Validation happens against a raw `serde_json::Value` rather than through
//! derived deserialization so failures carry the field-level message the
//! caller sees in the 400 envelope, not a serde path dump.

use serde::{Deserialize, Serialize};

use crate::error::{ChatProxyError, CoreResult};

const UNION_MESSAGE: &str =
    "Input must be either a non-empty string or an array of message objects";
const ROLE_MESSAGE: &str = "Role must be one of: user, system, developer, or assistant";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Developer,
    Assistant,
}

impl Role {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "system" => Some(Self::System),
            "developer" => Some(Self::Developer),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputMessage {
    pub role: Role,
    pub content: String,
}

/// Either free text or a structured message list, as the wire union.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ChatInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatPayload {
    pub input: ChatInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Validate a raw request body into a typed payload, or fail with the
/// specific violation text.
pub fn parse_chat_payload(value: &serde_json::Value) -> CoreResult<ChatPayload> {
    let Some(obj) = value.as_object() else {
        return Err(ChatProxyError::Validation(UNION_MESSAGE.to_string()));
    };

    for key in obj.keys() {
        if !matches!(key.as_str(), "input" | "previous_response_id" | "model") {
            return Err(ChatProxyError::Validation(format!("Unknown field: {key}")));
        }
    }

    let input = match obj.get("input") {
        Some(serde_json::Value::String(s)) => {
            if s.is_empty() {
                return Err(ChatProxyError::Validation("Input cannot be empty".into()));
            }
            ChatInput::Text(s.clone())
        }
        Some(serde_json::Value::Array(items)) => {
            let mut messages = Vec::with_capacity(items.len());
            for item in items {
                messages.push(parse_message(item)?);
            }
            ChatInput::Messages(messages)
        }
        _ => return Err(ChatProxyError::Validation(UNION_MESSAGE.to_string())),
    };

    let previous_response_id = match obj.get("previous_response_id") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(ChatProxyError::Validation(
                "previous_response_id must be a string".into(),
            ));
        }
    };

    let model = match obj.get("model") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(ChatProxyError::Validation("model must be a string".into())),
    };

    Ok(ChatPayload {
        input,
        previous_response_id,
        model,
    })
}

fn parse_message(item: &serde_json::Value) -> CoreResult<InputMessage> {
    let Some(obj) = item.as_object() else {
        return Err(ChatProxyError::Validation(UNION_MESSAGE.to_string()));
    };

    // Optional "type" discriminator; only the "message" literal is accepted.
    if let Some(kind) = obj.get("type")
        && kind.as_str() != Some("message")
    {
        return Err(ChatProxyError::Validation(UNION_MESSAGE.to_string()));
    }

    let role = obj
        .get("role")
        .and_then(|r| r.as_str())
        .and_then(Role::from_str)
        .ok_or_else(|| ChatProxyError::Validation(ROLE_MESSAGE.to_string()))?;

    let content = obj
        .get("content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ChatProxyError::Validation("Message content cannot be empty".into()))?;

    Ok(InputMessage {
        role,
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expect_validation(value: serde_json::Value, needle: &str) {
        match parse_chat_payload(&value) {
            Err(ChatProxyError::Validation(msg)) => {
                assert!(msg.contains(needle), "message {msg:?} missing {needle:?}")
            }
            other => panic!("expected Validation error, got: {:?}", other),
        }
    }

    #[test]
    fn plain_text_input_parses() {
        let payload = parse_chat_payload(&json!({"input": "hi"})).unwrap();
        assert_eq!(payload.input, ChatInput::Text("hi".into()));
        assert_eq!(payload.previous_response_id, None);
        assert_eq!(payload.model, None);
    }

    #[test]
    fn message_list_input_parses() {
        let payload = parse_chat_payload(&json!({
            "input": [
                {"role": "system", "content": "be brief"},
                {"type": "message", "role": "user", "content": "hi"}
            ],
            "previous_response_id": "r-99",
            "model": "gpt-5-mini"
        }))
        .unwrap();
        match payload.input {
            ChatInput::Messages(msgs) => {
                assert_eq!(msgs.len(), 2);
                assert_eq!(msgs[0].role, Role::System);
                assert_eq!(msgs[1].role, Role::User);
            }
            other => panic!("expected message list, got: {:?}", other),
        }
        assert_eq!(payload.previous_response_id.as_deref(), Some("r-99"));
        assert_eq!(payload.model.as_deref(), Some("gpt-5-mini"));
    }

    #[test]
    fn empty_body_reports_union_mismatch() {
        expect_validation(json!({}), "Input must be either");
    }

    #[test]
    fn empty_string_input_is_rejected() {
        expect_validation(json!({"input": ""}), "Input cannot be empty");
    }

    #[test]
    fn invalid_role_names_allowed_values() {
        expect_validation(
            json!({"input": [{"role": "invalid", "content": "x"}]}),
            "user, system, developer, or assistant",
        );
    }

    #[test]
    fn missing_role_reports_role_message() {
        expect_validation(
            json!({"input": [{"content": "x"}]}),
            "Role must be one of",
        );
    }

    #[test]
    fn empty_message_content_is_rejected() {
        expect_validation(
            json!({"input": [{"role": "user", "content": ""}]}),
            "Message content cannot be empty",
        );
    }

    #[test]
    fn wrong_type_literal_is_a_union_mismatch() {
        expect_validation(
            json!({"input": [{"type": "tool_call", "role": "user", "content": "x"}]}),
            "Input must be either",
        );
    }

    #[test]
    fn unknown_top_level_field_is_named() {
        expect_validation(json!({"input": "hi", "temperature": 1.0}), "temperature");
    }

    #[test]
    fn non_object_body_is_a_union_mismatch() {
        expect_validation(json!([1, 2, 3]), "Input must be either");
    }

    #[test]
    fn non_string_continuation_id_is_rejected() {
        expect_validation(
            json!({"input": "hi", "previous_response_id": 7}),
            "previous_response_id",
        );
    }

    #[test]
    fn empty_message_array_is_accepted() {
        // The upstream rejects it; the schema does not invent a rule.
        let payload = parse_chat_payload(&json!({"input": []})).unwrap();
        assert_eq!(payload.input, ChatInput::Messages(vec![]));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = InputMessage {
            role: Role::Developer,
            content: "x".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"developer\""));
    }

    #[test]
    fn payload_roundtrip() {
        let payload = ChatPayload {
            input: ChatInput::Text("hi".into()),
            previous_response_id: Some("r1".into()),
            model: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("model"));
        let de: ChatPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(de, payload);
    }
}
