//! Per-query scoring context
//!
//! One `ScoringContext` is created per query evaluation and passed by
//! reference into every `has_match`/`count`/`extents`/`score` call. Nodes
//! never keep their own copy.
//!
//! Extent-producing nodes cache their output keyed on [`ScoringContext::cache_key`]:
//! the pair (context id, epoch). The id is unique per context instance and the
//! epoch moves every time the document or passage window changes, so two
//! contexts that happen to point at the same document never share a cache entry.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{DocId, TERMINATED};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Cache key identifying one (context, document, passage) state
pub type ContextKey = (u64, u64);

/// Mutable evaluation state shared by every node of one query tree
#[derive(Debug)]
pub struct ScoringContext {
    id: u64,
    epoch: u64,
    document: DocId,
    /// Passage window `[begin, end)` for passage-restricted evaluation
    passage: Option<(u32, u32)>,
}

impl ScoringContext {
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            epoch: 0,
            document: TERMINATED,
            passage: None,
        }
    }

    /// Document currently under evaluation
    #[inline]
    pub fn document(&self) -> DocId {
        self.document
    }

    /// Point the context at a new document. Clears any passage window.
    pub fn set_document(&mut self, document: DocId) {
        self.document = document;
        self.passage = None;
        self.epoch += 1;
    }

    /// Restrict evaluation to `[begin, end)` within the current document
    pub fn set_passage(&mut self, begin: u32, end: u32) {
        self.passage = Some((begin, end.max(begin)));
        self.epoch += 1;
    }

    pub fn clear_passage(&mut self) {
        if self.passage.take().is_some() {
            self.epoch += 1;
        }
    }

    #[inline]
    pub fn passage(&self) -> Option<(u32, u32)> {
        self.passage
    }

    #[inline]
    pub fn cache_key(&self) -> ContextKey {
        (self.id, self.epoch)
    }
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self::new()
    }
}
