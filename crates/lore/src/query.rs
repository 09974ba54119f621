//! `lore context` and `lore ask`.
//!
//! `context` prints the assembled context for a query without calling a
//! completion model, which makes the selection rules easy to inspect.
//! `ask` runs a full [`Exchange`].

use anyhow::{Context as _, Result};
use clap::ValueEnum;

use lore_core::context::ContextAssembler;
use lore_core::error::{LoreError, LoreResult};
use lore_core::exchange::Exchange;
use lore_core::models::{ConversationTurn, Role};
use lore_core::store::Store;

use crate::completion;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Which selection policy `lore context` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContextKind {
    /// Indexed documentation sections.
    Knowledge,
    /// Turns of one conversation.
    Chat,
}

pub async fn run_context(
    config: &Config,
    query: &str,
    kind: ContextKind,
    tag: Option<&str>,
    conversation: Option<&str>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder = embedding::create_provider(&config.embedding)?;
    let assembler = ContextAssembler::new(config.context);

    let query_vec = embedder
        .embed_one(query)
        .await
        .map_err(LoreError::Embedding)?;

    let context = match kind {
        ContextKind::Knowledge => {
            let sections = store.all_sections(tag).await?;
            assembler.assemble_knowledge_context(&sections, &query_vec)?
        }
        ContextKind::Chat => {
            let id = conversation.context("--conversation is required for chat context")?;
            if store.get_conversation(id).await?.is_none() {
                return Err(LoreError::ConversationNotFound(id.to_string()).into());
            }
            let turns = store.all_turns(id).await?;
            chat_preview(&assembler, turns, id, query, &query_vec)?
        }
    };

    if context.is_empty() {
        eprintln!("No context above the similarity threshold.");
    } else {
        println!("{}", context);
    }

    pool.close().await;
    Ok(())
}

/// Chat context as [`Exchange::ask`] would assemble it for `query`: the
/// query is appended as a pending user turn, so the policy drops it rather
/// than the last stored turn. Nothing is written.
pub fn chat_preview(
    assembler: &ContextAssembler,
    mut turns: Vec<ConversationTurn>,
    conversation_id: &str,
    query: &str,
    query_vec: &[f32],
) -> LoreResult<String> {
    let created_at_ms = turns.last().map_or(0, |t| t.created_at_ms + 1);
    turns.push(ConversationTurn {
        id: String::new(),
        conversation_id: conversation_id.to_string(),
        role: Role::User,
        content: query.to_string(),
        embedding: query_vec.to_vec(),
        created_at_ms,
    });
    assembler.assemble_chat_context(&turns, query_vec)
}

pub async fn run_ask(
    config: &Config,
    query: &str,
    conversation: Option<&str>,
    tag: Option<&str>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let embedder = embedding::create_provider(&config.embedding)?;
    let completer = completion::create_provider(&config.completion)?;

    let exchange = Exchange::new(
        &store,
        embedder.as_ref(),
        completer.as_ref(),
        ContextAssembler::new(config.context),
    );
    let answer = exchange.ask(conversation, query, tag).await?;

    println!("{}", answer.answer);
    println!();
    println!("conversation: {}", answer.conversation_id);

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lore_core::context::ContextParams;

    fn turn(n: i64, role: Role, content: &str, embedding: Vec<f32>) -> ConversationTurn {
        ConversationTurn {
            id: format!("t{n}"),
            conversation_id: "c1".into(),
            role,
            content: content.into(),
            embedding,
            created_at_ms: n,
        }
    }

    #[test]
    fn test_chat_preview_keeps_last_stored_turn() {
        let turns = vec![
            turn(1, Role::User, "How do I deploy?", vec![1.0, 0.0]),
            turn(2, Role::Assistant, "Run the deploy script.", vec![1.0, 0.0]),
        ];
        let context = chat_preview(
            &ContextAssembler::default(),
            turns,
            "c1",
            "And rollback?",
            &[0.0, 1.0],
        )
        .unwrap();
        assert_eq!(context, "How do I deploy?\n---\nRun the deploy script.");
    }

    #[test]
    fn test_chat_preview_ranks_turns_past_the_window() {
        let params = ContextParams {
            recent_count: 2,
            ..ContextParams::default()
        };
        let turns = vec![
            turn(1, Role::User, "first", vec![0.0, 1.0]),
            turn(2, Role::Assistant, "second", vec![0.0, 1.0]),
            turn(3, Role::User, "deploy notes", vec![1.0, 0.0]),
        ];
        let context = chat_preview(
            &ContextAssembler::new(params),
            turns,
            "c1",
            "deploy?",
            &[1.0, 0.0],
        )
        .unwrap();
        assert_eq!(context, "first\n---\ndeploy notes\n---\ndeploy?");
    }

    #[test]
    fn test_chat_preview_of_empty_conversation() {
        let context =
            chat_preview(&ContextAssembler::default(), Vec::new(), "c1", "hi", &[1.0]).unwrap();
        assert!(context.is_empty());
    }
}
