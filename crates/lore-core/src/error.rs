//! Error taxonomy for the indexing and context assembly pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoreError {
    /// Two vectors of different lengths were compared. This is a provider
    /// contract violation and is never coerced to a score.
    #[error("embedding dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("segmentation failed: {0}")]
    Segmentation(String),

    #[error("embedding provider error: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("completion provider error: {0}")]
    Completion(#[source] anyhow::Error),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}

pub type LoreResult<T> = Result<T, LoreError>;
