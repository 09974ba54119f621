//! One question/answer exchange within a conversation.
//!
//! ```text
//! query ──embed──▶ user turn (own embedding) ──store──▶ turns
//!                                                        │
//!            chat context ◀── assemble_chat_context ◀────┘
//!       knowledge context ◀── assemble_knowledge_context ◀── sections
//!                                   │
//!                             complete(context, query)
//!                                   │
//!       assistant turn + combined embedding written back to both turns
//! ```
//!
//! A completion failure leaves the user turn stored with its own embedding.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::completion::CompletionProvider;
use crate::context::{ContextAssembler, SEPARATOR};
use crate::embedding::EmbeddingProvider;
use crate::error::{LoreError, LoreResult};
use crate::models::{Conversation, ConversationTurn, Role};
use crate::store::Store;

const TITLE_CHARS: usize = 60;
const DESCRIPTION_CHARS: usize = 200;

/// Result of [`Exchange::ask`].
#[derive(Debug, Clone)]
pub struct Answer {
    pub conversation_id: String,
    pub answer: String,
    pub chat_context: String,
    pub knowledge_context: String,
}

/// Drives question/answer exchanges against a store and two providers.
pub struct Exchange<'a, S: Store + ?Sized> {
    store: &'a S,
    embedder: &'a dyn EmbeddingProvider,
    completer: &'a dyn CompletionProvider,
    assembler: ContextAssembler,
}

impl<'a, S: Store + ?Sized> Exchange<'a, S> {
    pub fn new(
        store: &'a S,
        embedder: &'a dyn EmbeddingProvider,
        completer: &'a dyn CompletionProvider,
        assembler: ContextAssembler,
    ) -> Self {
        Self {
            store,
            embedder,
            completer,
            assembler,
        }
    }

    /// Ask `query` in the conversation `conversation_id`, or in a new
    /// conversation when `None`. Knowledge candidates are restricted to
    /// documents tagged `tag` when given.
    pub async fn ask(
        &self,
        conversation_id: Option<&str>,
        query: &str,
        tag: Option<&str>,
    ) -> LoreResult<Answer> {
        let conversation = self.open_conversation(conversation_id).await?;

        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(LoreError::Embedding)?;

        let user_turn = ConversationTurn {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            role: Role::User,
            content: query.to_string(),
            embedding: query_vec.clone(),
            created_at_ms: self.next_turn_time(&conversation.id).await?,
        };
        self.store
            .insert_turn(&user_turn)
            .await
            .map_err(LoreError::Store)?;

        let turns = self
            .store
            .all_turns(&conversation.id)
            .await
            .map_err(LoreError::Store)?;
        let chat_context = self.assembler.assemble_chat_context(&turns, &query_vec)?;

        let sections = self
            .store
            .all_sections(tag)
            .await
            .map_err(LoreError::Store)?;
        let knowledge_context = self
            .assembler
            .assemble_knowledge_context(&sections, &query_vec)?;

        debug!(
            conversation = %conversation.id,
            turns = turns.len(),
            sections = sections.len(),
            "contexts assembled"
        );

        let context = [knowledge_context.as_str(), chat_context.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(SEPARATOR);

        let answer = self
            .completer
            .complete(&context, query)
            .await
            .map_err(LoreError::Completion)?;

        let combined = self
            .embedder
            .embed_one(&format!("{}\n{}", query, answer))
            .await
            .map_err(LoreError::Embedding)?;

        let assistant_turn = ConversationTurn {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            role: Role::Assistant,
            content: answer.clone(),
            embedding: combined.clone(),
            created_at_ms: (user_turn.created_at_ms + 1).max(Utc::now().timestamp_millis()),
        };
        self.store
            .insert_turn(&assistant_turn)
            .await
            .map_err(LoreError::Store)?;
        self.store
            .update_turn_embedding(&user_turn.id, &combined)
            .await
            .map_err(LoreError::Store)?;

        if conversation.title.is_none() {
            self.store
                .update_conversation_details(
                    &conversation.id,
                    &truncate(query, TITLE_CHARS),
                    &truncate(&answer, DESCRIPTION_CHARS),
                )
                .await
                .map_err(LoreError::Store)?;
        }

        info!(conversation = %conversation.id, "exchange completed");

        Ok(Answer {
            conversation_id: conversation.id,
            answer,
            chat_context,
            knowledge_context,
        })
    }

    async fn open_conversation(&self, id: Option<&str>) -> LoreResult<Conversation> {
        if let Some(id) = id {
            return self
                .store
                .get_conversation(id)
                .await
                .map_err(LoreError::Store)?
                .ok_or_else(|| LoreError::ConversationNotFound(id.to_string()));
        }

        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            title: None,
            description: None,
            created_at_ms: Utc::now().timestamp_millis(),
        };
        self.store
            .create_conversation(&conversation)
            .await
            .map_err(LoreError::Store)?;
        debug!(conversation = %conversation.id, "conversation created");
        Ok(conversation)
    }

    /// Creation time for a new turn: now, but strictly after the latest
    /// stored turn so chronological order is total.
    async fn next_turn_time(&self, conversation_id: &str) -> LoreResult<i64> {
        let latest = self
            .store
            .all_turns(conversation_id)
            .await
            .map_err(LoreError::Store)?
            .last()
            .map(|t| t.created_at_ms + 1)
            .unwrap_or(0);
        Ok(latest.max(Utc::now().timestamp_millis()))
    }
}

/// First `max` characters of the first non-empty line, with an ellipsis
/// when shortened.
fn truncate(text: &str, max: usize) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if line.chars().count() <= max {
        return line.to_string();
    }
    let mut out: String = line.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextParams;
    use crate::models::{Document, Section};
    use crate::store::memory::InMemoryStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Two-axis embedder: "deploy" texts point along x, everything else along y.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains('\n') {
                        vec![0.6, 0.8]
                    } else if t.to_lowercase().contains("deploy") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    struct RecordingCompleter {
        contexts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingCompleter {
        fn new(fail: bool) -> Self {
            Self {
                contexts: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for RecordingCompleter {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn complete(&self, context: &str, query: &str) -> Result<String> {
            self.contexts.lock().unwrap().push(context.to_string());
            if self.fail {
                bail!("upstream unavailable");
            }
            Ok(format!("answer to {query}"))
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let doc = Document {
            id: "d1".into(),
            path: "deploy.md".into(),
            checksum: "x".into(),
            title: None,
            authored_at: 0,
            refresh_version: 1,
            refreshed_at: 0,
        };
        store.insert_document(&doc).await.unwrap();
        for (i, (content, embedding)) in [
            ("Deploy with helm.", vec![1.0f32, 0.0]),
            ("Unrelated gardening.", vec![0.0, 1.0]),
        ]
        .into_iter()
        .enumerate()
        {
            store
                .insert_section(&Section {
                    id: format!("s{i}"),
                    document_id: "d1".into(),
                    section_index: i as i64,
                    content: content.into(),
                    heading: None,
                    breadcrumb: None,
                    breadcrumb_slug: None,
                    token_count: 4,
                    embedding,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_ask_stores_both_turns_with_shared_embedding() {
        let store = seeded_store().await;
        let completer = RecordingCompleter::new(false);
        let exchange = Exchange::new(
            &store,
            &KeywordEmbedder,
            &completer,
            ContextAssembler::default(),
        );

        let answer = exchange.ask(None, "How do I deploy?", None).await.unwrap();
        assert_eq!(answer.answer, "answer to How do I deploy?");
        assert_eq!(answer.knowledge_context, "Deploy with helm.");
        assert!(answer.chat_context.is_empty());

        let turns = store.all_turns(&answer.conversation_id).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[0].embedding, vec![0.6, 0.8]);
        assert_eq!(turns[0].embedding, turns[1].embedding);

        let contexts = completer.contexts.lock().unwrap();
        assert_eq!(contexts[0], "Deploy with helm.");
    }

    #[tokio::test]
    async fn test_first_exchange_backfills_details_once() {
        let store = seeded_store().await;
        let completer = RecordingCompleter::new(false);
        let exchange = Exchange::new(
            &store,
            &KeywordEmbedder,
            &completer,
            ContextAssembler::default(),
        );

        let first = exchange.ask(None, "How do I deploy?", None).await.unwrap();
        exchange
            .ask(Some(&first.conversation_id), "And rollback?", None)
            .await
            .unwrap();

        let conversation = store
            .get_conversation(&first.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.title.as_deref(), Some("How do I deploy?"));
        assert_eq!(
            conversation.description.as_deref(),
            Some("answer to How do I deploy?")
        );
        assert_eq!(store.all_turns(&first.conversation_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_chat_context_includes_earlier_turns() {
        let store = seeded_store().await;
        let completer = RecordingCompleter::new(false);
        let exchange = Exchange::new(
            &store,
            &KeywordEmbedder,
            &completer,
            ContextAssembler::default(),
        );

        let first = exchange.ask(None, "How do I deploy?", None).await.unwrap();
        let second = exchange
            .ask(Some(&first.conversation_id), "And rollback?", None)
            .await
            .unwrap();
        assert_eq!(
            second.chat_context,
            "How do I deploy?\n---\nanswer to How do I deploy?"
        );
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let store = InMemoryStore::new();
        let completer = RecordingCompleter::new(false);
        let exchange = Exchange::new(
            &store,
            &KeywordEmbedder,
            &completer,
            ContextAssembler::default(),
        );
        let err = exchange.ask(Some("missing"), "hi", None).await.unwrap_err();
        assert!(matches!(err, LoreError::ConversationNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_completion_failure_keeps_user_turn() {
        let store = seeded_store().await;
        let completer = RecordingCompleter::new(true);
        let exchange = Exchange::new(
            &store,
            &KeywordEmbedder,
            &completer,
            ContextAssembler::new(ContextParams::default()),
        );

        let err = exchange.ask(None, "deploy now", None).await.unwrap_err();
        assert!(matches!(err, LoreError::Completion(_)));

        let conversations = store.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 1);
        let turns = store.all_turns(&conversations[0].id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].embedding, vec![1.0, 0.0]);
        assert!(conversations[0].title.is_none());
    }

    #[tokio::test]
    async fn test_conversation_and_turn_times_share_units() {
        let store = seeded_store().await;
        let completer = RecordingCompleter::new(false);
        let exchange = Exchange::new(
            &store,
            &KeywordEmbedder,
            &completer,
            ContextAssembler::default(),
        );

        let before = Utc::now().timestamp_millis();
        let answer = exchange.ask(None, "How do I deploy?", None).await.unwrap();

        let conversation = store
            .get_conversation(&answer.conversation_id)
            .await
            .unwrap()
            .unwrap();
        let turns = store.all_turns(&answer.conversation_id).await.unwrap();
        assert!(conversation.created_at_ms >= before);
        assert!(turns[0].created_at_ms >= conversation.created_at_ms);
        assert!(turns[1].created_at_ms > turns[0].created_at_ms);
        assert!(turns[1].created_at_ms - conversation.created_at_ms < 60_000);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("\n  first line\nsecond", 20), "first line");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
