use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::RelayClient;
use crate::errors::TransportError;
use crate::markdown::{MarkdownRenderer, Render};
use crate::models::{ChatRequest, ConversationEntry, StreamEvent};
use crate::state::{Conversation, SERVICE_UNAVAILABLE, Turn};

/// Streaming chat hook: owns the conversation, talks to the relay, and lets a
/// UI observe both.
///
/// Clones share the same conversation.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

struct Inner {
    client: RelayClient,
    renderer: Arc<dyn Render>,
    shared: Mutex<Shared>,
    revision: watch::Sender<u64>,
}

struct Shared {
    conversation: Conversation,
    inflight: Option<(Turn, CancellationToken)>,
}

impl ChatSession {
    pub fn new(client: RelayClient) -> Self {
        Self::with_renderer(client, Arc::new(MarkdownRenderer::new()))
    }

    pub fn with_renderer(client: RelayClient, renderer: Arc<dyn Render>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                client,
                renderer,
                shared: Mutex::new(Shared {
                    conversation: Conversation::new(),
                    inflight: None,
                }),
                revision,
            }),
        }
    }

    /// Snapshot of the conversation, oldest entry first.
    pub fn messages(&self) -> Vec<ConversationEntry> {
        self.inner.shared.lock().conversation.messages().to_vec()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.shared.lock().conversation.is_streaming()
    }

    /// Receiver whose value is bumped after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Sends `text` to the relay and streams the answer into the conversation.
    ///
    /// Blank input is ignored and returns `None` without touching the network.
    /// Otherwise the user entry is appended before this returns and the stream
    /// runs on a spawned task, so this must be called inside a Tokio runtime.
    pub fn send_message(&self, text: &str) -> Option<JoinHandle<()>> {
        let cancel = CancellationToken::new();
        let (turn, message) = {
            let mut shared = self.inner.shared.lock();
            let (turn, message) = shared.conversation.begin_turn(text)?;
            if let Some((_, previous)) = shared.inflight.replace((turn, cancel.clone())) {
                previous.cancel();
            }
            (turn, message)
        };
        self.notify();

        let request = ChatRequest {
            message,
            system_prompt: None,
        };
        let session = self.clone();
        Some(tokio::spawn(async move {
            session.run_turn(turn, request, cancel).await
        }))
    }

    /// Aborts the turn in flight, closing its connection. Returns `false` when
    /// nothing was streaming.
    pub fn stop_conversation(&self) -> bool {
        let stopped = {
            let mut shared = self.inner.shared.lock();
            if let Some((_, cancel)) = shared.inflight.take() {
                cancel.cancel();
            }
            shared.conversation.stop()
        };
        if stopped {
            self.notify();
        }
        stopped
    }

    async fn run_turn(&self, turn: Turn, request: ChatRequest, cancel: CancellationToken) {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.pump(turn, &request) => result,
        };

        if let Err(e) = result {
            log::warn!("Chat stream failed: {e}");
            let changed = self
                .inner
                .shared
                .lock()
                .conversation
                .fail(turn, SERVICE_UNAVAILABLE)
                .is_some();
            if changed {
                self.notify();
            }
        }

        let mut shared = self.inner.shared.lock();
        if matches!(shared.inflight, Some((active, _)) if active == turn) {
            shared.inflight = None;
        }
    }

    async fn pump(&self, turn: Turn, request: &ChatRequest) -> Result<(), TransportError> {
        let mut events = self.inner.client.stream_chat(request).await?;
        while let Some(event) = events.next().await {
            let event = event?;
            let terminal = event.is_terminal();
            self.apply(turn, event);
            if terminal {
                return Ok(());
            }
        }
        Err(TransportError::Incomplete)
    }

    fn apply(&self, turn: Turn, event: StreamEvent) {
        {
            let mut shared = self.inner.shared.lock();
            if let Some(index) = shared.conversation.apply(turn, event) {
                shared
                    .conversation
                    .refresh_view(index, self.inner.renderer.as_ref());
            }
        }
        self.notify();
    }

    fn notify(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }
}
