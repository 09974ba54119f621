//! Core data models used throughout Lore.
//!
//! These types represent the documents, sections, tags, and conversation
//! turns that flow through the indexing and context assembly pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Raw document handed to the indexer by a document source.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Source path, relative to the source root. Identifies the document.
    pub path: String,
    /// Full, unsegmented content.
    pub content: String,
    /// Last modification time reported by the source.
    pub modified_at: DateTime<Utc>,
}

/// Indexed document row.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub path: String,
    /// SHA-256 of the full raw content, computed before segmentation.
    pub checksum: String,
    pub title: Option<String>,
    /// Authored time: front-matter `date`, else the source's modified time.
    /// Unix seconds.
    pub authored_at: i64,
    /// Starts at 1; incremented each time the document at this path is replaced.
    pub refresh_version: i64,
    pub refreshed_at: i64,
}

/// Section descriptor produced by the segmenter.
///
/// `content` is the rendered text: ancestor heading lines followed by the
/// run's own blocks. `body` is the run's own blocks only; the indexer stores
/// and embeds `body` and keeps `breadcrumb` alongside it for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDraft {
    pub content: String,
    pub body: String,
    /// The run's own leading heading line, e.g. `## Install`.
    pub heading: Option<String>,
    /// Ancestor heading lines joined with `\n`.
    pub breadcrumb: Option<String>,
    pub breadcrumb_slug: Option<String>,
}

/// Stored retrieval unit owned by exactly one [`Document`].
#[derive(Debug, Clone)]
pub struct Section {
    pub id: String,
    pub document_id: String,
    pub section_index: i64,
    /// Section body. The embedding is computed over exactly this text.
    pub content: String,
    pub heading: Option<String>,
    pub breadcrumb: Option<String>,
    pub breadcrumb_slug: Option<String>,
    pub token_count: i64,
    pub embedding: Vec<f32>,
}

impl Section {
    /// Text used when the section is placed into an assembled context.
    pub fn rendered(&self) -> String {
        match &self.breadcrumb {
            Some(crumb) if !crumb.is_empty() => format!("{}\n\n{}", crumb, self.content),
            _ => self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Milliseconds since the epoch, like turn timestamps.
    pub created_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Milliseconds since the epoch; turns are ordered by this value.
    pub created_at_ms: i64,
}
