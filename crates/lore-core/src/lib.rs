//! # Lore Core
//!
//! Runtime-agnostic logic for Lore: data models, document segmentation,
//! incremental indexing, similarity ranking, context assembly, and the
//! conversation exchange flow, plus the store and provider traits they run
//! against.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The `lore`
//! app crate supplies the SQLite store, the HTTP providers, and the CLI.
//!
//! ```text
//! RawDocument ─▶ segment ─▶ SectionDraft ─▶ EmbeddingProvider ─▶ IncrementalIndexer ─▶ Store
//!
//! query ─▶ EmbeddingProvider ─▶ ContextAssembler (similarity + budget) ─▶ CompletionProvider
//! ```

pub mod completion;
pub mod context;
pub mod embedding;
pub mod error;
pub mod exchange;
pub mod front_matter;
pub mod index;
pub mod models;
pub mod segment;
pub mod similarity;
pub mod store;
