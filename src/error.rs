use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transport error: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("socket not connected")]
    NotConnected,
    #[error("rate limited by backend")]
    RateLimited,
    #[error("unauthorized")]
    Unauthorized,
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json decode error: {0}")]
    Decode(#[from] simd_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(Box::new(value))
    }
}

impl Error {
    /// Rate-limit responses are expected under load and are skipped by
    /// callers instead of logged at error level.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
