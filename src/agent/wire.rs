//! Wire types of the upstream chat-completions stream and decoding of its
//! `data:` payloads.

use serde::{Deserialize, Serialize};

use crate::errors::UpstreamError;
use crate::models::Message;

/// Longest slice of an upstream payload kept in error details.
const MAX_DETAIL_CHARS: usize = 512;

#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// One decoded `data:` payload of the upstream stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// `data: [DONE]`
    Done,
    /// A completion chunk; `None` when it carries no text (role-only deltas,
    /// usage reports, finish markers).
    Delta(Option<String>),
}

pub fn parse_data(data: &str) -> Result<Frame, UpstreamError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Frame::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(data)
        .map_err(|e| UpstreamError::malformed(format!("{e} in payload {}", truncate(data))))?;

    if let Some(error) = chunk.error {
        let detail = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(UpstreamError::UpstreamRejected {
            status: None,
            detail: truncate(&detail),
        });
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());

    Ok(Frame::Delta(text))
}

pub fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_DETAIL_CHARS {
        format!("{}…", text.chars().take(MAX_DETAIL_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
