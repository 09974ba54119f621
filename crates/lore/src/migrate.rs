//! Database schema migrations. Every statement is idempotent, so
//! `lore init` can run against an existing database.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::debug;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        checksum TEXT NOT NULL,
        title TEXT,
        authored_at INTEGER NOT NULL,
        refresh_version INTEGER NOT NULL DEFAULT 1,
        refreshed_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sections (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        section_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        heading TEXT,
        breadcrumb TEXT,
        breadcrumb_slug TEXT,
        token_count INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        UNIQUE(document_id, section_index),
        FOREIGN KEY (document_id) REFERENCES documents(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS document_tags (
        document_id TEXT NOT NULL,
        tag_id TEXT NOT NULL,
        PRIMARY KEY (document_id, tag_id),
        FOREIGN KEY (document_id) REFERENCES documents(id),
        FOREIGN KEY (tag_id) REFERENCES tags(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT,
        description TEXT,
        created_at_ms INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS turns (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        created_at_ms INTEGER NOT NULL,
        FOREIGN KEY (conversation_id) REFERENCES conversations(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sections_document_id ON sections(document_id)",
    "CREATE INDEX IF NOT EXISTS idx_document_tags_tag_id ON document_tags(tag_id)",
    "CREATE INDEX IF NOT EXISTS idx_turns_conversation ON turns(conversation_id, created_at_ms)",
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = SCHEMA.len(), "schema up to date");
    Ok(())
}

/// `lore init`: create the database file and schema.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    run_migrations(&pool).await?;
    pool.close().await;
    Ok(())
}
