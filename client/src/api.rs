use async_stream::try_stream;
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;

use crate::errors::TransportError;
use crate::models::{ChatRequest, StreamEvent};

/// Default base URL of the relay server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Path of the relay's streaming chat endpoint.
pub const STREAM_PATH: &str = "/ai/chat/stream-sse";

pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// HTTP side of the hook: posts a chat request and decodes the SSE reply.
#[derive(Clone, Debug)]
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{STREAM_PATH}", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Opens the stream for `request`. Yields frames in arrival order; the
    /// stream simply ends when the body does, terminal frame or not.
    /// Dropping it closes the connection.
    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, TransportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        Ok(decode_frames(response.bytes_stream()).boxed())
    }
}

/// Turns a body byte stream into relay frames.
///
/// Comments and the `event`, `id` and `retry` fields are ignored. A frame still
/// open when the body ends is discarded.
pub fn decode_frames<S, B, E>(
    body: S,
) -> impl Stream<Item = Result<StreamEvent, TransportError>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportError> + std::fmt::Display + Send + 'static,
{
    try_stream! {
        let events = body.eventsource();
        futures_util::pin_mut!(events);

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| -> TransportError {
                match e {
                    EventStreamError::Transport(e) => e.into(),
                    other => TransportError::EventStream(other.to_string()),
                }
            })?;
            if event.data.is_empty() {
                continue;
            }

            let frame = event.data;
            let decoded = serde_json::from_str::<StreamEvent>(&frame)
                .map_err(|source| TransportError::Decode { frame, source })?;
            yield decoded;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    async fn decode(reads: Vec<&'static str>) -> Vec<Result<StreamEvent, TransportError>> {
        let body = stream::iter(reads.into_iter().map(Ok::<_, TransportError>));
        decode_frames(body).collect().await
    }

    #[tokio::test]
    async fn frames_are_decoded_across_reads() {
        let events = decode(vec![
            "data: {\"type\":\"start\"}\n\ndata: {\"type\":\"chu",
            "nk\",\"content\":\"hi\"}\n\n",
            "data: {\"type\":\"end\"}\n\n",
        ])
        .await;
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::Chunk { content: "hi".into() },
                StreamEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn undecodable_frame_ends_the_stream_with_an_error() {
        let events = decode(vec!["data: {\"type\":\"start\"}\n\ndata: oops\n\ndata: {\"type\":\"end\"}\n\n"]).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            Err(TransportError::Decode { frame, .. }) if frame == "oops"
        ));
    }

    #[tokio::test]
    async fn several_frames_in_one_read_and_a_trailing_partial_one() {
        let events = decode(vec![
            "data: {\"type\":\"start\"}\n\ndata: {\"type\":\"end\"}\n\ndata: {\"type\":\"chunk\"",
        ])
        .await;
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(events, vec![StreamEvent::Start, StreamEvent::End]);
    }

    #[tokio::test]
    async fn crlf_comments_and_other_fields_are_ignored() {
        let events = decode(vec![
            ": keep-alive\r\n\r\nevent: message\r\nid: 7\r\ndata: {\"type\":\"start\"}\r\nretry: 10\r\n\r\n",
        ])
        .await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Start);
    }

    #[tokio::test]
    async fn multi_line_data_is_joined_with_newlines() {
        let events = decode(vec![
            "data: {\"type\":\"chunk\",\ndata: \"content\":\"a\"}\n\n",
        ])
        .await;
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Chunk { content: "a".into() }
        );
    }

    #[tokio::test]
    async fn utf8_split_mid_character_is_preserved() {
        let bytes = "data: {\"type\":\"chunk\",\"content\":\"服务\"}\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let body = stream::iter(vec![
            Ok::<_, TransportError>(bytes[..split].to_vec()),
            Ok(bytes[split..].to_vec()),
        ]);
        let events: Vec<_> = decode_frames(body).collect().await;
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Chunk { content: "服务".into() }
        );
    }

    #[test]
    fn endpoint_joins_base_url_and_path() {
        assert_eq!(
            RelayClient::new("http://localhost:3000/").endpoint(),
            "http://localhost:3000/ai/chat/stream-sse"
        );
        assert_eq!(
            RelayClient::new(DEFAULT_BASE_URL).endpoint(),
            "http://localhost:3000/ai/chat/stream-sse"
        );
    }
}
