use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for the relay's streaming endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// SSE frame received from the relay.
/// Matches the backend `StreamEvent` enum (internally tagged).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Start,
    Chunk { content: String },
    End,
    Error {
        #[serde(default)]
        error: String,
        message: String,
    },
    /// Any frame type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One bubble of the conversation as the UI sees it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub mid: Uuid,
    pub role: Role,
    /// Raw text; for assistant entries this accumulates across chunks.
    pub content: String,
    /// Rendered Markdown, derived from `content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl ConversationEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            mid: Uuid::new_v4(),
            role,
            content: content.into(),
            html: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_missing_system_prompt() {
        let req = ChatRequest {
            message: "hi".into(),
            system_prompt: None,
        };
        assert_eq!(serde_json::to_string(&req).unwrap(), r#"{"message":"hi"}"#);

        let req = ChatRequest {
            message: "hi".into(),
            system_prompt: Some("be brief".into()),
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"message":"hi","systemPrompt":"be brief"}"#
        );
    }

    #[test]
    fn frames_decode_by_type() {
        let parse = |s: &str| serde_json::from_str::<StreamEvent>(s).unwrap();
        assert_eq!(parse(r#"{"type": "start"}"#), StreamEvent::Start);
        assert_eq!(
            parse(r#"{"type":"chunk","content":"4"}"#),
            StreamEvent::Chunk { content: "4".into() }
        );
        assert_eq!(parse(r#"{"type":"end"}"#), StreamEvent::End);
        assert_eq!(
            parse(r#"{"type":"error","error":"Internal server error","message":"down"}"#),
            StreamEvent::Error {
                error: "Internal server error".into(),
                message: "down".into()
            }
        );
        assert_eq!(parse(r#"{"type":"ping"}"#), StreamEvent::Unknown);
    }

    #[test]
    fn terminal_frames() {
        assert!(StreamEvent::End.is_terminal());
        assert!(!StreamEvent::Start.is_terminal());
        assert!(!StreamEvent::Unknown.is_terminal());
    }
}
