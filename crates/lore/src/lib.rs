//! # Lore
//!
//! **Retrieval-augmented context assembly over a directory of documents.**
//!
//! Lore indexes Markdown and text files into heading-aware sections with
//! embeddings, then assembles bounded context strings for a language model
//! from the most similar sections and from earlier turns of a conversation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │  Source dir  │──▶│ IncrementalIndexer│──▶│  SQLite  │
//! │ walk + globs │   │ segment + embed   │   │ sections │
//! └─────────────┘   └──────────────────┘   └────┬─────┘
//!                                                │
//!                         ┌──────────────────────┤
//!                         ▼                      ▼
//!                  ┌─────────────┐        ┌─────────────┐
//!                  │ lore context│        │  lore ask   │
//!                  │  (assemble) │        │ (exchange)  │
//!                  └─────────────┘        └─────────────┘
//! ```
//!
//! The algorithms live in [`lore_core`]; this crate supplies the SQLite
//! store, HTTP providers, filesystem source, configuration and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Idempotent schema migrations |
//! | [`sqlite_store`] | `Store` implementation over SQLite |
//! | [`source_fs`] | Filesystem document source |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`completion`] | OpenAI / Ollama completion providers |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`index_cmd`] | `lore index` |
//! | [`query`] | `lore context` and `lore ask` |
//! | [`stats`] | `lore stats` and `lore conversations` |

pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod index_cmd;
pub mod migrate;
pub mod query;
pub mod source_fs;
pub mod sqlite_store;
pub mod stats;

pub use lore_core::store;
