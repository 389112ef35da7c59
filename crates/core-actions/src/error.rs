//! Error kinds a dispatch can surface. None are fatal; every one travels to
//! the caller inside the result value and is never retried by the core.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("no handler for action: {0}")]
    NoHandler(String),
    #[error("cancelled by hook")]
    HandlerCancelled,
    #[error("handler timeout")]
    HandlerTimeout,
    #[error("handler panic for {action}: {message}")]
    HandlerPanic {
        action: String,
        message: String,
        /// Captured stack trace, truncated to 4 KiB.
        trace: String,
    },
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("missing subsystem: {0}")]
    MissingSubsystem(&'static str),
    #[error("engine edit failed: {0}")]
    EngineEdit(String),
}

impl From<core_text::EngineError> for ActionError {
    fn from(e: core_text::EngineError) -> Self {
        ActionError::EngineEdit(e.to_string())
    }
}
