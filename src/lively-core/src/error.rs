//! Error types for the lively scheduler.
//!
//! Nothing here is fatal to a running debate: the evaluator converts every
//! completion failure into "no interruption", and persistence failures are
//! only logged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivelyError {
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Completion failed: {0}")]
    CompletionError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Unknown pacing mode: {0}")]
    UnknownPacingMode(String),
}
