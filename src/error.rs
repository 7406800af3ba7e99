use thiserror::Error;

/// Startup failures. Anything raised here ends the process before the
/// scheduler runs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Kafka/Redpanda error: {0}")]
    Kafka(String),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Decode,
}

/// A station read that produced no reading.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("station transport error: {0}")]
    Transport(String),
    #[error("station decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport(_) => FetchErrorKind::Transport,
            FetchError::Decode(_) => FetchErrorKind::Decode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishErrorKind {
    Encode,
    BrokerWrite,
}

/// A message that did not reach the broker. It is dropped, never retried.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("broker write error: {0}")]
    BrokerWrite(String),
}

impl PublishError {
    pub fn kind(&self) -> PublishErrorKind {
        match self {
            PublishError::Encode(_) => PublishErrorKind::Encode,
            PublishError::BrokerWrite(_) => PublishErrorKind::BrokerWrite,
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(e: serde_json::Error) -> Self {
        PublishError::Encode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
