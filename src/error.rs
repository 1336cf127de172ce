use crate::engine::Engine;
use thiserror::Error;

/// Errors raised before a request ever reaches an engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TtsError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported engine: {0}")]
    UnsupportedEngine(String),
}

/// Failure reported by a backend adapter while talking to its engine.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{engine} is not available - {reason}")]
    NotConfigured { engine: Engine, reason: String },

    #[error("{engine} request failed: {source}")]
    Http {
        engine: Engine,
        #[source]
        source: reqwest::Error,
    },

    #[error("{engine} returned HTTP {status}: {body}")]
    Status {
        engine: Engine,
        status: u16,
        body: String,
    },

    #[error("{engine} error: {message}")]
    Process { engine: Engine, message: String },

    #[error("{engine} returned an unexpected response: {message}")]
    InvalidResponse { engine: Engine, message: String },

    #[error("{engine} I/O error: {source}")]
    Io {
        engine: Engine,
        #[source]
        source: std::io::Error,
    },
}

impl BackendError {
    pub fn not_configured(engine: Engine, reason: impl Into<String>) -> Self {
        BackendError::NotConfigured {
            engine,
            reason: reason.into(),
        }
    }

    pub fn io(engine: Engine, source: std::io::Error) -> Self {
        BackendError::Io { engine, source }
    }

    pub fn http(engine: Engine, source: reqwest::Error) -> Self {
        BackendError::Http { engine, source }
    }
}

/// History writes and reads. The only error that surfaces as a server error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("history storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("history record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("history store lock poisoned")]
    Poisoned,

    #[error("history flush task failed: {0}")]
    Flush(#[from] tokio::task::JoinError),
}
