use std::convert::Infallible;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use crate::models::{ChatRequest, StreamEvent};
use crate::service::chat_service::{ChatService, GENERIC_ERROR};

/// Frames buffered between the relay task and the response body.
const EVENT_BUFFER: usize = 64;

/// POST `/ai/chat/stream-sse`: relays one chat turn as Server-Sent Events.
///
/// Protocol (one JSON object per `data:` line):
///   1. `{"type":"start"}`
///   2. `{"type":"chunk","content":"..."}` (repeated)
///   3. `{"type":"end"}`
///   or `{"type":"error","error":"...","message":"..."}` on failure.
///
/// The relay runs on its own task. The response body owns the drop guard of
/// the turn's cancellation token, so a client disconnect tears down the
/// upstream request too.
pub async fn stream_chat_handler(
    State(svc): State<ChatService>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<StreamEvent>(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let span = info_span!("chat_stream", request_id = %Uuid::new_v4());
    tokio::spawn(async move { svc.relay(request, tx, cancel).await }.instrument(span));

    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(event_stream(rx, guard)),
    )
}

fn event_stream<G: Send + 'static>(
    rx: mpsc::Receiver<StreamEvent>,
    guard: G,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse(&event)), (rx, guard)))
    })
}

fn to_sse(event: &StreamEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        error!("Failed to serialize stream event: {e}");
        format!(r#"{{"type":"error","error":"{GENERIC_ERROR}","message":"Failed to encode the response."}}"#)
    });
    Event::default().data(json)
}
