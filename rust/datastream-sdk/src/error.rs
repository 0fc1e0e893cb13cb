use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid stream schema: {0}")]
    Schema(String),

    #[error("Can't query a stream both by index and by timestamp")]
    AddressingConflict,

    #[error("API error ({status}): {message}")]
    Transport { status: u16, message: String },

    #[error("No datapoint at index {index}")]
    EmptyResult { index: i64 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Missing DataStream URL")]
    MissingUrl,

    #[error("No push connection configured")]
    PushUnavailable,

    #[error("Connection closed")]
    ConnectionClosed,
}

impl StreamError {
    /// HTTP status of a failed request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Transport { status, .. } => Some(*status),
            StreamError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
