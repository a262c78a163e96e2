use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::agent::CompletionAgent;
use crate::errors::UpstreamError;
use crate::models::{ChatRequest, Message, StreamEvent};

/// Generic label placed in the `error` field of every error frame.
pub const GENERIC_ERROR: &str = "Internal server error";

#[derive(Clone)]
pub struct ChatService {
    agent: CompletionAgent,
    default_system_prompt: Arc<str>,
}

/// How a relayed stream ended before its terminal frame was written.
#[derive(Debug)]
enum Outcome {
    Completed { chunks: usize },
    ClientGone,
    Failed(UpstreamError),
}

impl ChatService {
    pub fn new(agent: CompletionAgent, default_system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            agent,
            default_system_prompt: default_system_prompt.into(),
        }
    }

    /// The upstream message array: system prompt first, raw user text second.
    pub fn build_messages(&self, request: &ChatRequest) -> Vec<Message> {
        let system_prompt = request
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(&*self.default_system_prompt);

        vec![
            Message::system(system_prompt),
            Message::user(request.message.clone()),
        ]
    }

    /// Runs one chat turn, writing `start`, every upstream chunk, and exactly
    /// one terminal frame into `sink`.
    ///
    /// Returns early without a terminal frame once `cancel` fires or the
    /// receiving side of `sink` is dropped; the upstream stream is dropped with it.
    pub async fn relay(
        &self,
        request: ChatRequest,
        sink: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) {
        let messages = self.build_messages(&request);

        if sink.send(StreamEvent::Start).await.is_err() {
            debug!("client went away before the stream started");
            return;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Outcome::ClientGone,
            outcome = self.forward(messages, &sink) => outcome,
        };

        let terminal = match outcome {
            Outcome::Completed { chunks } => {
                info!(chunks, model = self.agent.model(), "chat stream completed");
                StreamEvent::End
            }
            Outcome::ClientGone => {
                info!("client disconnected, upstream stream dropped");
                return;
            }
            Outcome::Failed(e) => {
                error!(kind = %e.kind(), "SSE chat stream failed: {e}");
                StreamEvent::Error {
                    error: GENERIC_ERROR.to_string(),
                    message: e.user_message().to_string(),
                }
            }
        };

        if sink.send(terminal).await.is_err() {
            debug!("client went away before the terminal frame");
        }
    }

    async fn forward(&self, messages: Vec<Message>, sink: &mpsc::Sender<StreamEvent>) -> Outcome {
        let upstream = self.agent.stream_chat(messages);
        futures_util::pin_mut!(upstream);

        let mut chunks = 0;
        while let Some(delta) = upstream.next().await {
            match delta {
                Ok(text) => {
                    if sink.send(StreamEvent::chunk(text)).await.is_err() {
                        return Outcome::ClientGone;
                    }
                    chunks += 1;
                }
                Err(e) => return Outcome::Failed(e),
            }
        }
        Outcome::Completed { chunks }
    }
}
