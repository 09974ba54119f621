//! Checksum-based incremental indexing.
//!
//! A pass takes the current set of [`RawDocument`]s and brings the store in
//! line with them without re-embedding documents that did not change.
//!
//! # Per-document flow
//!
//! 1. Hash the full raw content (SHA-256, before segmentation).
//! 2. Decide [`Action::Skip`], [`Action::Replace`] or [`Action::Insert`]
//!    according to the configured [`ChangePolicy`].
//! 3. Prepare: parse front matter, segment, embed every section body.
//!    Preparation of distinct documents runs concurrently, bounded by
//!    `concurrency`.
//! 4. Write: for a replace, remove the old row (cascading to sections and
//!    tag links), then insert document, sections and tags.
//!
//! A document whose embedding fails is abandoned for the pass with nothing
//! written. A store failure while writing is logged, the partial document is
//! removed again, and the pass moves on. Front matter that does not parse is
//! dropped: the document is indexed with its sections but without title,
//! date or tags.

use std::collections::HashSet;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::{LoreError, LoreResult};
use crate::front_matter::{parse_front_matter, FrontMatter};
use crate::models::{Document, RawDocument, Section, SectionDraft};
use crate::segment::{estimate_tokens, segment};
use crate::store::Store;

/// How an already-indexed path is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangePolicy {
    /// Any stored record for the path means "unchanged". The checksum branch
    /// is only consulted for paths that are not stored, so edits to indexed
    /// documents are never picked up.
    PathExists,
    /// Stored paths are compared by checksum: equal is skipped, different is
    /// removed and reinserted.
    #[default]
    Checksum,
}

/// Decision for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    Replace,
    Insert,
}

/// A document that could not be indexed in this pass.
#[derive(Debug, Clone, Serialize)]
pub struct IndexFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of an indexing pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub unchanged_count: usize,
    /// Documents inserted or replaced.
    pub changed_count: usize,
    /// Paths counted in `changed_count`, sorted.
    pub modified: Vec<String>,
    pub failed: Vec<IndexFailure>,
    /// Paths removed because their source disappeared, sorted.
    pub removed: Vec<String>,
}

/// Tunables for [`IncrementalIndexer`].
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub policy: ChangePolicy,
    /// Documents prepared concurrently.
    pub concurrency: usize,
    /// Section bodies per embedding call.
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            policy: ChangePolicy::default(),
            concurrency: 4,
            batch_size: 64,
        }
    }
}

/// A document ready to be written: everything durable is computed up front.
struct Prepared {
    action: Action,
    document: Document,
    sections: Vec<Section>,
    tags: Vec<String>,
}

/// Compute the content checksum (SHA-256, lowercase hex).
pub fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Decides skip/replace/insert per document and persists the result.
pub struct IncrementalIndexer<'a, S: Store + ?Sized> {
    store: &'a S,
    embedder: &'a dyn EmbeddingProvider,
    options: IndexOptions,
}

impl<'a, S: Store + ?Sized> IncrementalIndexer<'a, S> {
    pub fn new(store: &'a S, embedder: &'a dyn EmbeddingProvider, options: IndexOptions) -> Self {
        Self {
            store,
            embedder,
            options,
        }
    }

    /// Index every document in `docs`. Per-document failures are collected
    /// in the report; nothing is rolled back across documents.
    pub async fn index_all(&self, docs: Vec<RawDocument>) -> IndexReport {
        let mut report = IndexReport::default();
        let mut pending = Vec::new();

        for doc in docs {
            let sum = checksum(&doc.content);
            match self.decide(&doc.path, &sum).await {
                Ok(Action::Skip) => {
                    debug!(path = %doc.path, "unchanged, skipping");
                    report.unchanged_count += 1;
                }
                Ok(action) => {
                    debug!(path = %doc.path, ?action, "queued for indexing");
                    pending.push((action, doc, sum));
                }
                Err(e) => {
                    warn!(path = %doc.path, error = %e, "change detection failed");
                    report.failed.push(IndexFailure {
                        path: doc.path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let now = Utc::now().timestamp();
        let prepared: Vec<(String, LoreResult<Prepared>)> = stream::iter(pending)
            .map(|(action, doc, sum)| async move {
                let path = doc.path.clone();
                let result = self.prepare(action, doc, sum, now).await;
                (path, result)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for (path, result) in prepared {
            let outcome = match result {
                Ok(prepared) => self.write(prepared).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => {
                    report.changed_count += 1;
                    report.modified.push(path);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "document abandoned for this pass");
                    report.failed.push(IndexFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.modified.sort();
        report.failed.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            unchanged = report.unchanged_count,
            changed = report.changed_count,
            failed = report.failed.len(),
            "indexing pass finished"
        );
        report
    }

    /// Run [`index_all`](Self::index_all), then [`prune`](Self::prune) every
    /// stored path that is not in `docs`.
    pub async fn sync(&self, docs: Vec<RawDocument>) -> LoreResult<IndexReport> {
        let present: HashSet<String> = docs.iter().map(|d| d.path.clone()).collect();
        let mut report = self.index_all(docs).await;
        report.removed = self.prune(&present).await?;
        Ok(report)
    }

    /// Remove stored documents whose path is not in `present`.
    pub async fn prune(&self, present: &HashSet<String>) -> LoreResult<Vec<String>> {
        let stored = self
            .store
            .document_paths()
            .await
            .map_err(LoreError::Store)?;

        let mut removed = Vec::new();
        for path in stored.into_iter().filter(|p| !present.contains(p)) {
            match self.store.remove(&path).await {
                Ok(true) => {
                    debug!(path = %path, "source disappeared, removed");
                    removed.push(path);
                }
                Ok(false) => {}
                Err(e) => warn!(path = %path, error = %e, "failed to remove stale document"),
            }
        }
        Ok(removed)
    }

    /// Decide what to do with the document at `path`.
    pub async fn decide(&self, path: &str, checksum: &str) -> LoreResult<Action> {
        let exists = self.store.exists(path).await.map_err(LoreError::Store)?;

        if self.options.policy == ChangePolicy::PathExists && exists {
            return Ok(Action::Skip);
        }

        let modified = self
            .store
            .is_modified(path, checksum)
            .await
            .map_err(LoreError::Store)?;

        Ok(match (exists, modified) {
            (_, true) => Action::Replace,
            (true, false) => Action::Skip,
            (false, false) => Action::Insert,
        })
    }

    async fn prepare(
        &self,
        action: Action,
        doc: RawDocument,
        sum: String,
        now: i64,
    ) -> LoreResult<Prepared> {
        let refresh_version = match action {
            Action::Replace => self
                .store
                .get_document(&doc.path)
                .await
                .map_err(LoreError::Store)?
                .map(|old| old.refresh_version + 1)
                .unwrap_or(1),
            _ => 1,
        };

        let front_matter = parse_front_matter(&doc.content).unwrap_or_else(|e| {
            warn!(path = %doc.path, error = %e, "ignoring front matter");
            FrontMatter::default()
        });
        let drafts = segment(&doc.content);

        let document = Document {
            id: Uuid::new_v4().to_string(),
            path: doc.path.clone(),
            checksum: sum,
            title: front_matter.title,
            authored_at: front_matter
                .date
                .unwrap_or_else(|| doc.modified_at.timestamp()),
            refresh_version,
            refreshed_at: now,
        };

        let embeddings = self.embed_bodies(&drafts).await?;
        let sections = drafts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (draft, embedding))| Section {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                section_index: i as i64,
                token_count: estimate_tokens(&draft.body),
                content: draft.body,
                heading: draft.heading,
                breadcrumb: draft.breadcrumb,
                breadcrumb_slug: draft.breadcrumb_slug,
                embedding,
            })
            .collect();

        Ok(Prepared {
            action,
            document,
            sections,
            tags: front_matter.tags,
        })
    }

    /// Embed every draft body. Fails as a whole if any batch fails.
    async fn embed_bodies(&self, drafts: &[SectionDraft]) -> LoreResult<Vec<Vec<f32>>> {
        let bodies: Vec<String> = drafts.iter().map(|d| d.body.clone()).collect();
        let mut vectors = Vec::with_capacity(bodies.len());

        for batch in bodies.chunks(self.options.batch_size.max(1)) {
            let embedded = self
                .embedder
                .embed(batch)
                .await
                .map_err(LoreError::Embedding)?;
            if embedded.len() != batch.len() {
                return Err(LoreError::Embedding(anyhow::anyhow!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }

        if let Some(first) = vectors.first() {
            let dims = first.len();
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(LoreError::DimensionMismatch {
                    left: dims,
                    right: bad.len(),
                });
            }
        }

        Ok(vectors)
    }

    async fn write(&self, prepared: Prepared) -> LoreResult<()> {
        let path = prepared.document.path.clone();

        if prepared.action == Action::Replace {
            self.store.remove(&path).await.map_err(LoreError::Store)?;
        }

        if let Err(e) = self.write_rows(&prepared).await {
            if let Err(cleanup) = self.store.remove(&path).await {
                warn!(path = %path, error = %cleanup, "failed to clean up partial document");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn write_rows(&self, prepared: &Prepared) -> LoreResult<()> {
        self.store
            .insert_document(&prepared.document)
            .await
            .map_err(LoreError::Store)?;

        for section in &prepared.sections {
            self.store
                .insert_section(section)
                .await
                .map_err(LoreError::Store)?;
        }

        for name in &prepared.tags {
            let tag = self.store.insert_tag(name).await.map_err(LoreError::Store)?;
            self.store
                .insert_document_tag(&prepared.document.id, &tag.id)
                .await
                .map_err(LoreError::Store)?;
        }

        Ok(())
    }
}
