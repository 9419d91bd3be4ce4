// ================================================================
// File: shiftbot-common/src/error.rs
// ================================================================

use thiserror::Error;

/// How the poll loop reacts to an error once it reaches the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Skip this cycle, try again on the next interval.
    Transient,
    /// Stop the scheduler and surface the condition to the operator.
    Fatal,
    /// Reported back to whoever asked; no wider effect.
    Local,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Feed schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("Failed to persist history: {0}")]
    PersistFailed(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Unrecognized command format: {0}")]
    CommandFormatInvalid(String),

    #[error("Message {0} does not exist")]
    MessageNotFound(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::FeedUnavailable(_) | Error::Http(_) => Severity::Transient,
            Error::SchemaInvalid(_)
            | Error::PersistFailed(_)
            | Error::ConfigInvalid(_)
            | Error::Json(_)
            | Error::Io(_) => Severity::Fatal,
            Error::CommandFormatInvalid(_)
            | Error::MessageNotFound(_)
            | Error::Platform(_) => Severity::Local,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
