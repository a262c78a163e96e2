use thiserror::Error;

/// Top-level application error: everything that can stop the relay from starting.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Environment variable '{name}' must be set")]
    MissingEnv { name: &'static str },

    #[error("Environment variable '{name}' has an invalid value '{value}': {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    // ── Upstream client errors ───────────────────────────────────────────────
    #[error("Failed to build the upstream HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl AppError {
    pub fn invalid_env(name: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        AppError::InvalidEnv {
            name,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Closed set of failures the upstream completion API can produce while a
/// chat stream is being opened or read.
///
/// The `Display` text is for logs only. Clients receive [`UpstreamError::user_message`].
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream service unavailable at {host}: {source}")]
    UpstreamUnavailable {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream rejected the request{}: {detail}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    UpstreamRejected { status: Option<u16>, detail: String },

    #[error("Malformed upstream response: {message}")]
    MalformedResponse { message: String },
}

/// Discriminant of [`UpstreamError`], used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Unavailable,
    Rejected,
    Malformed,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamErrorKind::Unavailable => "upstream_unavailable",
            UpstreamErrorKind::Rejected => "upstream_rejected",
            UpstreamErrorKind::Malformed => "malformed_response",
        }
    }
}

impl std::fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UpstreamError {
    pub fn malformed(message: impl Into<String>) -> Self {
        UpstreamError::MalformedResponse { message: message.into() }
    }

    pub fn kind(&self) -> UpstreamErrorKind {
        match self {
            UpstreamError::UpstreamUnavailable { .. } => UpstreamErrorKind::Unavailable,
            UpstreamError::UpstreamRejected { .. } => UpstreamErrorKind::Rejected,
            UpstreamError::MalformedResponse { .. } => UpstreamErrorKind::Malformed,
        }
    }

    /// Stable text shown to end users. Never includes upstream error details.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            UpstreamErrorKind::Unavailable => {
                "The AI service is currently unreachable. Please try again later."
            }
            UpstreamErrorKind::Rejected => "The AI service rejected the request.",
            UpstreamErrorKind::Malformed => "The AI service returned an unexpected response.",
        }
    }
}
