use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Rate limited by mailbox API")]
    RateLimited,
    #[error("Mailbox API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Gave up after {attempts} rate-limited attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("Fatal error while processing message {message_id}: {source}")]
    Fatal {
        message_id: String,
        #[source]
        source: Box<AppError>,
    },
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    /// True for the one failure the fetch path recovers from.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited)
    }

    pub fn fatal(message_id: &str, source: AppError) -> Self {
        AppError::Fatal {
            message_id: message_id.to_string(),
            source: Box::new(source),
        }
    }
}
