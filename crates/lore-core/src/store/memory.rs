//! In-memory [`Store`] implementation for testing and embedding in other
//! hosts.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock`. Sections keep their
//! insertion order, which is document order for a single indexing pass.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Conversation, ConversationTurn, Document, Section, Tag};

use super::Store;

#[derive(Default)]
struct Tables {
    documents: Vec<Document>,
    sections: Vec<Section>,
    tags: Vec<Tag>,
    document_tags: BTreeSet<(String, String)>,
    conversations: HashMap<String, Conversation>,
    turns: Vec<ConversationTurn>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    /// Number of stored sections; handy for assertions.
    pub fn section_count(&self) -> Result<usize> {
        Ok(self.read()?.sections.len())
    }

    /// Number of document-tag links.
    pub fn document_tag_count(&self) -> Result<usize> {
        Ok(self.read()?.document_tags.len())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.read()?.documents.iter().any(|d| d.path == path))
    }

    async fn is_modified(&self, path: &str, checksum: &str) -> Result<bool> {
        Ok(self
            .read()?
            .documents
            .iter()
            .any(|d| d.path == path && d.checksum != checksum))
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>> {
        Ok(self
            .read()?
            .documents
            .iter()
            .find(|d| d.path == path)
            .cloned())
    }

    async fn document_paths(&self) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .read()?
            .documents
            .iter()
            .map(|d| d.path.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn remove(&self, path: &str) -> Result<bool> {
        let mut tables = self.write()?;
        let ids: Vec<String> = tables
            .documents
            .iter()
            .filter(|d| d.path == path)
            .map(|d| d.id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(false);
        }
        tables.sections.retain(|s| !ids.contains(&s.document_id));
        tables
            .document_tags
            .retain(|(doc_id, _)| !ids.contains(doc_id));
        tables.documents.retain(|d| d.path != path);
        Ok(true)
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut tables = self.write()?;
        if tables.documents.iter().any(|d| d.id == doc.id) {
            bail!("document {} already exists", doc.id);
        }
        tables.documents.push(doc.clone());
        Ok(())
    }

    async fn insert_section(&self, section: &Section) -> Result<()> {
        let mut tables = self.write()?;
        if !tables
            .documents
            .iter()
            .any(|d| d.id == section.document_id)
        {
            bail!("section {} references unknown document", section.id);
        }
        tables.sections.push(section.clone());
        Ok(())
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag> {
        let mut tables = self.write()?;
        if let Some(tag) = tables.tags.iter().find(|t| t.name == name) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        tables.tags.push(tag.clone());
        Ok(tag)
    }

    async fn insert_document_tag(&self, document_id: &str, tag_id: &str) -> Result<()> {
        self.write()?
            .document_tags
            .insert((document_id.to_string(), tag_id.to_string()));
        Ok(())
    }

    async fn all_sections(&self, tag: Option<&str>) -> Result<Vec<Section>> {
        let tables = self.read()?;
        let allowed: Option<Vec<&String>> = tag.map(|name| {
            let tag_id = tables.tags.iter().find(|t| t.name == name).map(|t| &t.id);
            tables
                .document_tags
                .iter()
                .filter(|(_, tid)| Some(tid) == tag_id)
                .map(|(doc_id, _)| doc_id)
                .collect()
        });

        Ok(tables
            .sections
            .iter()
            .filter(|s| match &allowed {
                Some(ids) => ids.contains(&&s.document_id),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut tags = self.read()?.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn document_tags(&self, document_id: &str) -> Result<Vec<String>> {
        let tables = self.read()?;
        let mut names: Vec<String> = tables
            .document_tags
            .iter()
            .filter(|(doc_id, _)| doc_id == document_id)
            .filter_map(|(_, tag_id)| tables.tags.iter().find(|t| &t.id == tag_id))
            .map(|t| t.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.write()?
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.read()?.conversations.get(id).cloned())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut all: Vec<Conversation> = self.read()?.conversations.values().cloned().collect();
        all.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn update_conversation_details(
        &self,
        id: &str,
        title: &str,
        description: &str,
    ) -> Result<()> {
        let mut tables = self.write()?;
        let conversation = tables
            .conversations
            .get_mut(id)
            .ok_or_else(|| anyhow!("conversation {} not found", id))?;
        conversation.title = Some(title.to_string());
        conversation.description = Some(description.to_string());
        Ok(())
    }

    async fn insert_turn(&self, turn: &ConversationTurn) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.conversations.contains_key(&turn.conversation_id) {
            bail!("conversation {} not found", turn.conversation_id);
        }
        tables.turns.push(turn.clone());
        Ok(())
    }

    async fn update_turn_embedding(&self, turn_id: &str, embedding: &[f32]) -> Result<()> {
        let mut tables = self.write()?;
        let turn = tables
            .turns
            .iter_mut()
            .find(|t| t.id == turn_id)
            .ok_or_else(|| anyhow!("turn {} not found", turn_id))?;
        turn.embedding = embedding.to_vec();
        Ok(())
    }

    async fn all_turns(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let mut turns: Vec<ConversationTurn> = self
            .read()?
            .turns
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.created_at_ms);
        Ok(turns)
    }
}
