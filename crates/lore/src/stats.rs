//! `lore stats` and `lore conversations`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use lore_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Print row counts, database size and a per-tag breakdown.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let documents = count_rows(&pool, "documents").await?;
    let sections = count_rows(&pool, "sections").await?;
    let tags = count_rows(&pool, "tags").await?;
    let conversations = count_rows(&pool, "conversations").await?;
    let turns = count_rows(&pool, "turns").await?;
    let tokens: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(token_count), 0) FROM sections")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Lore — Database Stats");
    println!("=====================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Documents:     {}", documents);
    println!("  Sections:      {}", sections);
    println!("  Tokens (est):  {}", tokens);
    println!("  Tags:          {}", tags);
    println!("  Conversations: {}", conversations);
    println!("  Turns:         {}", turns);

    let tag_rows = sqlx::query(
        r#"
        SELECT
            t.name,
            COUNT(DISTINCT dt.document_id) AS doc_count,
            COUNT(s.id) AS section_count
        FROM tags t
        LEFT JOIN document_tags dt ON dt.tag_id = t.id
        LEFT JOIN sections s ON s.document_id = dt.document_id
        GROUP BY t.name
        ORDER BY doc_count DESC, t.name ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !tag_rows.is_empty() {
        println!();
        println!("  By tag:");
        println!("  {:<24} {:>6} {:>9}", "TAG", "DOCS", "SECTIONS");
        println!("  {}", "-".repeat(41));
        for row in &tag_rows {
            let name: String = row.get("name");
            let doc_count: i64 = row.get("doc_count");
            let section_count: i64 = row.get("section_count");
            println!("  {:<24} {:>6} {:>9}", name, doc_count, section_count);
        }
    }

    println!();
    pool.close().await;
    Ok(())
}

async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    Ok(sqlx::query_scalar(&sql).fetch_one(pool).await?)
}

/// List conversations, newest first.
pub async fn run_conversations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let conversations = store.list_conversations().await?;
    if conversations.is_empty() {
        println!("No conversations.");
    } else {
        println!("{:<36}  {:<16}  TITLE", "ID", "CREATED");
        for c in &conversations {
            println!(
                "{:<36}  {:<16}  {}",
                c.id,
                format_ts_ms(c.created_at_ms),
                c.title.as_deref().unwrap_or("(untitled)")
            );
        }
    }

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}
