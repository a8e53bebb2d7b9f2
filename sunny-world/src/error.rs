//! Error types for the orchestration layer.

use sunny_core::CoreError;
use sunny_llm::GenerationError;
use thiserror::Error;

use crate::session::PlayerId;

/// Top-level error type for session operations.
#[derive(Error, Debug)]
pub enum WorldError {
    /// A cognition-core operation failed.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The generation pipeline could not be built.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// No connected player has this id.
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    /// The village layout is inconsistent with the roster.
    #[error("Layout error: {0}")]
    Layout(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, WorldError>;
