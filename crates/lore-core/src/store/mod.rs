//! Storage abstraction for Lore.
//!
//! The [`Store`] trait defines every persistence operation the indexer,
//! context assembly and conversation exchange need, enabling pluggable
//! backends (SQLite in the app crate, in-memory here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Document replacement is `remove` followed by inserts and is not atomic
//! across those calls; concurrent indexing passes against one store must be
//! serialized by the caller.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Conversation, ConversationTurn, Document, Section, Tag};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`exists`](Store::exists) | Is a document stored for this path? |
/// | [`is_modified`](Store::is_modified) | Stored checksum differs from this one? |
/// | [`remove`](Store::remove) | Delete a document, its sections and tag links |
/// | [`insert_document`](Store::insert_document) | Insert a document row |
/// | [`insert_section`](Store::insert_section) | Insert a section with its embedding |
/// | [`insert_tag`](Store::insert_tag) | Insert a tag, or return the existing one |
/// | [`insert_document_tag`](Store::insert_document_tag) | Link a tag to a document (idempotent) |
/// | [`all_sections`](Store::all_sections) | All sections, optionally by tag |
/// | [`all_turns`](Store::all_turns) | Turns of a conversation, oldest first |
#[async_trait]
pub trait Store: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;

    /// True when a document is stored for `path` with a different checksum.
    async fn is_modified(&self, path: &str, checksum: &str) -> Result<bool>;

    async fn get_document(&self, path: &str) -> Result<Option<Document>>;

    /// Paths of all stored documents, sorted.
    async fn document_paths(&self) -> Result<Vec<String>>;

    /// Remove the document at `path` together with its sections and tag
    /// associations. Tags themselves are kept. Returns whether a document
    /// was removed.
    async fn remove(&self, path: &str) -> Result<bool>;

    async fn insert_document(&self, doc: &Document) -> Result<()>;

    async fn insert_section(&self, section: &Section) -> Result<()>;

    /// Insert a tag by name. Inserting an existing name returns the stored
    /// tag and is not an error.
    async fn insert_tag(&self, name: &str) -> Result<Tag>;

    /// Associate a tag with a document. Existing pairs are a no-op.
    async fn insert_document_tag(&self, document_id: &str, tag_id: &str) -> Result<()>;

    /// All sections in document order, restricted to documents carrying
    /// `tag` when given.
    async fn all_sections(&self, tag: Option<&str>) -> Result<Vec<Section>>;

    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Tag names of one document, sorted.
    async fn document_tags(&self, document_id: &str) -> Result<Vec<String>>;

    async fn create_conversation(&self, conversation: &Conversation) -> Result<()>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>>;

    /// Conversations, newest first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    async fn update_conversation_details(
        &self,
        id: &str,
        title: &str,
        description: &str,
    ) -> Result<()>;

    async fn insert_turn(&self, turn: &ConversationTurn) -> Result<()>;

    async fn update_turn_embedding(&self, turn_id: &str, embedding: &[f32]) -> Result<()>;

    /// Turns of a conversation ordered by creation time, ascending.
    async fn all_turns(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>>;
}
