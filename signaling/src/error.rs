use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to (de)serialize signaling message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signaling service returned {status}: {description}")]
    Service { status: u16, description: String },

    #[error("credentials expired or rejected (401)")]
    Unauthorized,

    #[error("inbound message queue overflowed (capacity {0})")]
    QueueOverflow(usize),

    #[error("duplicate outbound message (correlation id already in flight)")]
    DuplicateCorrelation,

    #[error("message payload exceeds the 10 KB limit")]
    PayloadTooLarge,

    #[error("operation invalid in state {0}")]
    InvalidState(&'static str),

    #[error("retry budget ({0}) exhausted")]
    RetryBudgetExhausted(u32),

    #[error("{0}")]
    Other(String),
}
