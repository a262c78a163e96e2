mod wire;

use async_stream::try_stream;
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::errors::{AppError, UpstreamError};
use crate::models::Message;
use wire::{CompletionRequest, Frame, parse_data, truncate};

/// Streaming client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Clone)]
pub struct CompletionAgent {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompletionAgent {
    pub fn new(config: &UpstreamConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(AppError::HttpClient)?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Opens a streaming completion for `messages` and yields every non-empty
    /// text delta in the order the upstream produces it.
    ///
    /// The stream ends after `data: [DONE]` or when the upstream closes the body.
    /// The first error terminates it. Dropping the stream drops the upstream
    /// response and with it the HTTP connection.
    pub fn stream_chat(
        &self,
        messages: Vec<Message>,
    ) -> impl Stream<Item = Result<String, UpstreamError>> + Send + 'static {
        let client = self.client.clone();
        let url = format!("{}/chat/completions", self.base_url);
        let host = self.base_url.clone();
        let api_key = self.api_key.clone();
        let model = self.model.clone();

        try_stream! {
            let request = CompletionRequest {
                model: &model,
                messages: &messages,
                stream: true,
            };

            let response = client
                .post(&url)
                .bearer_auth(&api_key)
                .header(ACCEPT, "text/event-stream")
                .json(&request)
                .send()
                .await
                .map_err(|source| UpstreamError::UpstreamUnavailable {
                    host: host.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                Err::<(), _>(UpstreamError::UpstreamRejected {
                    status: Some(status.as_u16()),
                    detail: truncate(&detail),
                })?;
                return;
            }
            debug!(%status, model = %model, "upstream stream opened");

            let deltas = decode_deltas(response.bytes_stream(), host);
            futures_util::pin_mut!(deltas);
            while let Some(delta) = deltas.next().await {
                yield delta?;
            }
        }
    }
}

/// Decodes an upstream `text/event-stream` body into text deltas.
///
/// Ends at `data: [DONE]` or at the end of the body. An event still open when
/// the body ends is discarded.
fn decode_deltas<S, B>(
    body: S,
    host: String,
) -> impl Stream<Item = Result<String, UpstreamError>> + Send + 'static
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    try_stream! {
        let events = body.eventsource();
        futures_util::pin_mut!(events);

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| match e {
                EventStreamError::Transport(source) => UpstreamError::UpstreamUnavailable {
                    host: host.clone(),
                    source,
                },
                other => UpstreamError::malformed(other.to_string()),
            })?;
            if event.data.trim().is_empty() {
                continue;
            }

            match parse_data(&event.data)? {
                Frame::Done => break,
                Frame::Delta(Some(text)) => yield text,
                Frame::Delta(None) => {}
            }
        }
    }
}
