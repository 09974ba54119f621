//! Completion provider trait.
//!
//! Generation quality is out of scope for the core; it only hands the
//! assembled context and the query to the provider and stores what comes
//! back.

use anyhow::Result;
use async_trait::async_trait;

/// Text-in, text-out language model backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Generate an answer to `query` grounded in `context`.
    async fn complete(&self, context: &str, query: &str) -> Result<String>;
}
