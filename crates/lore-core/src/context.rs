//! Context assembly for the knowledge base and the conversation history.
//!
//! Both policies rank candidates by similarity to the query vector and accept
//! them while they beat the similarity threshold and the match budget has room.
//! The accepted texts are joined with [`SEPARATOR`].
//!
//! | Policy | Candidates | Guaranteed | Ranked |
//! |--------|------------|------------|--------|
//! | knowledge | all sections | none | up to `match_count` |
//! | chat | turns, chronological | first `recent_count - 1` | `match_count` minus the guaranteed block |

use serde::Deserialize;

use crate::error::LoreResult;
use crate::models::{ConversationTurn, Section};
use crate::similarity::rank;

/// Joins the selected texts of an assembled context.
pub const SEPARATOR: &str = "\n---\n";

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.3;
pub const DEFAULT_MATCH_COUNT: usize = 10;
pub const DEFAULT_RECENT_COUNT: usize = 10;

/// Selection tunables shared by both policies.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ContextParams {
    /// Candidates must score strictly above this value.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Cap on the number of items joined into one context.
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    /// Number of leading turns the chat policy takes before ranking.
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_match_count() -> usize {
    DEFAULT_MATCH_COUNT
}
fn default_recent_count() -> usize {
    DEFAULT_RECENT_COUNT
}

impl Default for ContextParams {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            match_count: DEFAULT_MATCH_COUNT,
            recent_count: DEFAULT_RECENT_COUNT,
        }
    }
}

/// Builds bounded context strings from ranked candidates. Read-only.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    params: ContextParams,
}

impl ContextAssembler {
    pub fn new(params: ContextParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ContextParams {
        &self.params
    }

    /// Knowledge policy: the most similar sections above the threshold, most
    /// similar first, at most `match_count` of them.
    pub fn assemble_knowledge_context(
        &self,
        sections: &[Section],
        query_vec: &[f32],
    ) -> LoreResult<String> {
        let accepted = self.select_relevant(
            sections.iter().collect(),
            query_vec,
            self.params.match_count,
            |s| s.embedding.as_slice(),
        )?;

        Ok(accepted
            .iter()
            .map(|s| s.rendered())
            .collect::<Vec<_>>()
            .join(SEPARATOR))
    }

    /// Chat policy.
    ///
    /// Takes the first `recent_count` turns and drops the last of them (the
    /// triggering query), keeping the rest in order. The turns after that
    /// window are ranked against the query with the budget left over from
    /// `match_count`. Recent turns come first in the output.
    pub fn assemble_chat_context(
        &self,
        turns: &[ConversationTurn],
        query_vec: &[f32],
    ) -> LoreResult<String> {
        let window = self.params.recent_count.min(turns.len());
        let (head, older) = turns.split_at(window);
        let recent = &head[..window.saturating_sub(1)];

        let budget = self.params.match_count.saturating_sub(recent.len());
        let relevant =
            self.select_relevant(older.iter().collect(), query_vec, budget, |t| {
                t.embedding.as_slice()
            })?;

        Ok(recent
            .iter()
            .chain(relevant)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join(SEPARATOR))
    }

    /// Rank `candidates` and accept them in order while they beat the
    /// threshold and fewer than `budget` are accepted. Ranking is
    /// non-increasing with NaN last, so the scan stops at the first rejection
    /// and never accepts a NaN score.
    fn select_relevant<T, F>(
        &self,
        candidates: Vec<T>,
        query_vec: &[f32],
        budget: usize,
        vector_of: F,
    ) -> LoreResult<Vec<T>>
    where
        F: Fn(&T) -> &[f32],
    {
        if budget == 0 || candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut accepted = Vec::new();
        for scored in rank(candidates, query_vec, vector_of)? {
            if scored.score.is_nan()
                || scored.score <= self.params.similarity_threshold
                || accepted.len() >= budget
            {
                break;
            }
            accepted.push(scored.item);
        }
        Ok(accepted)
    }
}
