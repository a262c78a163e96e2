use thiserror::Error;

/// Failure of the client-side SSE connection to the relay.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Relay responded with status {status}")]
    Status { status: u16 },

    #[error("Malformed event stream: {0}")]
    EventStream(String),

    #[error("Could not decode frame {frame:?}: {source}")]
    Decode {
        frame: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stream closed before a terminal frame")]
    Incomplete,
}
