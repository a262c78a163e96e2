use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the message array sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }
}

/// Body of `POST /ai/chat/stream-sse`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Application-level frame written as the `data:` payload of each SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Start,
    Chunk { content: String },
    End,
    Error { error: String, message: String },
}

impl StreamEvent {
    pub fn chunk(content: impl Into<String>) -> Self {
        StreamEvent::Chunk {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_events_serialize_with_type_tag() {
        let frames = [
            (StreamEvent::Start, r#"{"type":"start"}"#),
            (StreamEvent::chunk("4"), r#"{"type":"chunk","content":"4"}"#),
            (StreamEvent::End, r#"{"type":"end"}"#),
            (
                StreamEvent::Error {
                    error: "Internal server error".into(),
                    message: "boom".into(),
                },
                r#"{"type":"error","error":"Internal server error","message":"boom"}"#,
            ),
        ];
        for (event, expected) in frames {
            assert_eq!(serde_json::to_string(&event).unwrap(), expected);
        }
    }

    #[test]
    fn chat_request_accepts_camel_case_and_optional_prompt() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","systemPrompt":"be brief"}"#).unwrap();
        assert_eq!(req.message, "hi");
        assert_eq!(req.system_prompt.as_deref(), Some("be brief"));

        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.system_prompt.is_none());
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let json = serde_json::to_value(Message::system("s")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "s");
    }
}
