//! SQLite-backed [`Store`] implementation.
//!
//! Embeddings are stored as little-endian `f32` BLOBs. Removing a document
//! deletes its sections and tag links in one transaction; the tags
//! themselves are shared and stay.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use lore_core::embedding::{blob_to_vec, vec_to_blob};
use lore_core::models::{Conversation, ConversationTurn, Document, Role, Section, Tag};
use lore_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        path: row.get("path"),
        checksum: row.get("checksum"),
        title: row.get("title"),
        authored_at: row.get("authored_at"),
        refresh_version: row.get("refresh_version"),
        refreshed_at: row.get("refreshed_at"),
    }
}

fn section_from_row(row: &SqliteRow) -> Section {
    let blob: Vec<u8> = row.get("embedding");
    Section {
        id: row.get("id"),
        document_id: row.get("document_id"),
        section_index: row.get("section_index"),
        content: row.get("content"),
        heading: row.get("heading"),
        breadcrumb: row.get("breadcrumb"),
        breadcrumb_slug: row.get("breadcrumb_slug"),
        token_count: row.get("token_count"),
        embedding: blob_to_vec(&blob),
    }
}

fn conversation_from_row(row: &SqliteRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at_ms: row.get("created_at_ms"),
    }
}

fn turn_from_row(row: &SqliteRow) -> Result<ConversationTurn> {
    let role: String = row.get("role");
    let blob: Vec<u8> = row.get("embedding");
    Ok(ConversationTurn {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        role: Role::parse(&role).ok_or_else(|| anyhow!("unknown turn role: {}", role))?,
        content: row.get("content"),
        embedding: blob_to_vec(&blob),
        created_at_ms: row.get("created_at_ms"),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn is_modified(&self, path: &str, checksum: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE path = ? AND checksum != ?",
        )
        .bind(path)
        .bind(checksum)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn get_document(&self, path: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, path, checksum, title, authored_at, refresh_version, refreshed_at \
             FROM documents WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(document_from_row))
    }

    async fn document_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT path FROM documents ORDER BY path")
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }

    async fn remove(&self, path: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let id: Option<String> = sqlx::query_scalar("SELECT id FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(id) = id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM sections WHERE document_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM document_tags WHERE document_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, path, checksum, title, authored_at, refresh_version, refreshed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.path)
        .bind(&doc.checksum)
        .bind(&doc.title)
        .bind(doc.authored_at)
        .bind(doc.refresh_version)
        .bind(doc.refreshed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_section(&self, section: &Section) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sections (id, document_id, section_index, content, heading,
                                  breadcrumb, breadcrumb_slug, token_count, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&section.id)
        .bind(&section.document_id)
        .bind(section.section_index)
        .bind(&section.content)
        .bind(&section.heading)
        .bind(&section.breadcrumb)
        .bind(&section.breadcrumb_slug)
        .bind(section.token_count)
        .bind(vec_to_blob(&section.embedding))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_tag(&self, name: &str) -> Result<Tag> {
        sqlx::query("INSERT INTO tags (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Tag {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn insert_document_tag(&self, document_id: &str, tag_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO document_tags (document_id, tag_id) VALUES (?, ?) \
             ON CONFLICT(document_id, tag_id) DO NOTHING",
        )
        .bind(document_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all_sections(&self, tag: Option<&str>) -> Result<Vec<Section>> {
        let rows = match tag {
            Some(name) => {
                sqlx::query(
                    r#"
                    SELECT s.* FROM sections s
                    JOIN documents d ON d.id = s.document_id
                    JOIN document_tags dt ON dt.document_id = d.id
                    JOIN tags t ON t.id = dt.tag_id
                    WHERE t.name = ?
                    ORDER BY d.path, s.section_index
                    "#,
                )
                .bind(name)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT s.* FROM sections s
                    JOIN documents d ON d.id = s.document_id
                    ORDER BY d.path, s.section_index
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(section_from_row).collect())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| Tag {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn document_tags(&self, document_id: &str) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name FROM tags t
            JOIN document_tags dt ON dt.tag_id = t.id
            WHERE dt.document_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<()> {
        sqlx::query(
            "INSERT INTO conversations (id, title, description, created_at_ms) VALUES (?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.title)
        .bind(&conversation.description)
        .bind(conversation.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, title, description, created_at_ms FROM conversations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(conversation_from_row))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, title, description, created_at_ms FROM conversations \
             ORDER BY created_at_ms DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(conversation_from_row).collect())
    }

    async fn update_conversation_details(
        &self,
        id: &str,
        title: &str,
        description: &str,
    ) -> Result<()> {
        let result =
            sqlx::query("UPDATE conversations SET title = ?, description = ? WHERE id = ?")
                .bind(title)
                .bind(description)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("conversation {} not found", id);
        }
        Ok(())
    }

    async fn insert_turn(&self, turn: &ConversationTurn) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO turns (id, conversation_id, role, content, embedding, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.conversation_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(vec_to_blob(&turn.embedding))
        .bind(turn.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_turn_embedding(&self, turn_id: &str, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query("UPDATE turns SET embedding = ? WHERE id = ?")
            .bind(vec_to_blob(embedding))
            .bind(turn_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("turn {} not found", turn_id);
        }
        Ok(())
    }

    async fn all_turns(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, embedding, created_at_ms FROM turns \
             WHERE conversation_id = ? ORDER BY created_at_ms ASC, rowid ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(turn_from_row).collect()
    }
}
