//! Conversation state driven by relay frames.
//!
//! [`Conversation`] is a plain data model with no I/O: `ChatSession` owns it,
//! feeds it frames, and runs the derive-view step after each mutation.

use crate::markdown::Render;
use crate::models::{ConversationEntry, Role, StreamEvent};

/// Text of the entry shown when the relay connection fails locally.
pub const SERVICE_UNAVAILABLE: &str = "Service unavailable";

/// Identifies one `send_message` call. Frames tagged with an older turn are
/// discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Turn(u64);

#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
    /// Index of the assistant entry currently receiving chunks.
    current: Option<usize>,
    streaming: bool,
    turn: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Starts a turn for `text`. Blank input is ignored and returns `None`;
    /// otherwise the trimmed text is appended as a user entry.
    ///
    /// A turn still streaming is frozen first, as if stopped.
    pub fn begin_turn(&mut self, text: &str) -> Option<(Turn, String)> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.stop();
        self.entries.push(ConversationEntry::user(text));
        self.streaming = true;
        self.turn += 1;
        Some((Turn(self.turn), text.to_string()))
    }

    fn accepts(&self, turn: Turn) -> bool {
        self.streaming && turn == Turn(self.turn)
    }

    /// Applies one frame of `turn`. Returns the index of the entry whose text
    /// changed and needs the derive-view step; an empty entry has no view yet.
    pub fn apply(&mut self, turn: Turn, event: StreamEvent) -> Option<usize> {
        if !self.accepts(turn) {
            log::debug!("Dropping frame for inactive turn {turn:?}: {event:?}");
            return None;
        }

        match event {
            StreamEvent::Start => {
                self.entries.push(ConversationEntry::assistant(""));
                self.current = Some(self.entries.len() - 1);
                None
            }
            StreamEvent::Chunk { content } => {
                let Some(index) = self.current else {
                    log::warn!("Chunk received before start, dropping it");
                    return None;
                };
                self.entries[index].content.push_str(&content);
                Some(index)
            }
            StreamEvent::End => {
                self.current = None;
                self.streaming = false;
                None
            }
            StreamEvent::Error { message, .. } => Some(self.finish_with_error(&message)),
            StreamEvent::Unknown => None,
        }
    }

    /// Ends `turn` after a transport failure.
    pub fn fail(&mut self, turn: Turn, message: &str) -> Option<usize> {
        if !self.accepts(turn) {
            return None;
        }
        Some(self.finish_with_error(message))
    }

    /// The in-progress assistant entry, if any, is replaced by `message`;
    /// otherwise a new assistant entry carries it.
    fn finish_with_error(&mut self, message: &str) -> usize {
        self.streaming = false;
        match self.current.take() {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.content = message.to_string();
                entry.html = None;
                index
            }
            None => {
                self.entries.push(ConversationEntry::assistant(message));
                self.entries.len() - 1
            }
        }
    }

    /// Freezes the current turn. Returns `false` if nothing was streaming.
    pub fn stop(&mut self) -> bool {
        if !self.streaming {
            return false;
        }
        self.streaming = false;
        self.current = None;
        true
    }

    /// Derive-view step: re-renders the HTML of an assistant entry from its content.
    pub fn refresh_view(&mut self, index: usize, renderer: &dyn Render) {
        let Some(entry) = self.entries.get_mut(index) else {
            return;
        };
        if entry.role == Role::Assistant && self.current == Some(index) {
            entry.html = Some(renderer.render(&entry.content));
        }
    }
}
