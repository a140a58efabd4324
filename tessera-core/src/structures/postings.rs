//! Posting cursors
//!
//! `DocSet` is the forward-only cursor over sorted document ids that every
//! posting source implements. `PostingReader` adds the per-document term
//! frequency and positions the extent leaves need.

use std::sync::Arc;

use crate::{DocId, TERMINATED};

// ── DocSet trait ─────────────────────────────────────────────────────────

/// Forward-only cursor over sorted document IDs.
pub trait DocSet: Send {
    /// Current document ID, or [`TERMINATED`] if exhausted.
    fn doc(&self) -> DocId;

    /// Advance to the next document. Returns the new doc ID or [`TERMINATED`].
    fn advance(&mut self) -> DocId;

    /// Seek to the first document >= `target`. Returns doc ID or [`TERMINATED`].
    fn seek(&mut self, target: DocId) -> DocId {
        let mut doc = self.doc();
        while doc < target {
            doc = self.advance();
        }
        doc
    }

    /// Estimated number of remaining documents.
    fn size_hint(&self) -> u64;
}

// ── PostingReader ────────────────────────────────────────────────────────

/// Posting list of one term: documents, frequencies and token positions
pub trait PostingReader: DocSet {
    /// Occurrences of the term in the current document
    fn term_freq(&self) -> u32;

    /// Sorted token positions in the current document
    fn positions(&self) -> &[u32];

    /// Rewind to the first posting
    fn reset(&mut self);

    /// Number of documents in the whole list
    fn doc_count(&self) -> u64;
}

// ── MemoryPostingList ────────────────────────────────────────────────────

/// One document's entry in an in-memory posting list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc: DocId,
    pub positions: Vec<u32>,
}

/// Immutable posting data shared between readers
#[derive(Debug, Default)]
pub struct PostingData {
    docs: Vec<DocId>,
    postings: Vec<Posting>,
}

impl PostingData {
    /// Build from postings in any order; positions are sorted per document
    pub fn new(mut postings: Vec<Posting>) -> Self {
        postings.sort_by_key(|p| p.doc);
        postings.dedup_by(|b, a| {
            if a.doc == b.doc {
                a.positions.append(&mut b.positions);
                true
            } else {
                false
            }
        });
        for p in &mut postings {
            p.positions.sort_unstable();
        }
        let docs = postings.iter().map(|p| p.doc).collect();
        Self { docs, postings }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Total occurrences across all documents
    pub fn total_frequency(&self) -> u64 {
        self.postings.iter().map(|p| p.positions.len() as u64).sum()
    }

    pub fn max_frequency(&self) -> u64 {
        self.postings
            .iter()
            .map(|p| p.positions.len() as u64)
            .max()
            .unwrap_or(0)
    }
}

/// Posting cursor over shared [`PostingData`]. Binary search for seek.
pub struct MemoryPostingList {
    data: Arc<PostingData>,
    pos: usize,
}

impl MemoryPostingList {
    pub fn new(data: Arc<PostingData>) -> Self {
        Self { data, pos: 0 }
    }
}

impl DocSet for MemoryPostingList {
    #[inline]
    fn doc(&self) -> DocId {
        self.data.docs.get(self.pos).copied().unwrap_or(TERMINATED)
    }

    #[inline]
    fn advance(&mut self) -> DocId {
        if self.pos < self.data.docs.len() {
            self.pos += 1;
        }
        self.doc()
    }

    fn seek(&mut self, target: DocId) -> DocId {
        if self.pos >= self.data.docs.len() {
            return TERMINATED;
        }
        let remaining = &self.data.docs[self.pos..];
        match remaining.binary_search(&target) {
            Ok(offset) | Err(offset) => self.pos += offset,
        }
        self.doc()
    }

    fn size_hint(&self) -> u64 {
        self.data.docs.len().saturating_sub(self.pos) as u64
    }
}

impl PostingReader for MemoryPostingList {
    #[inline]
    fn term_freq(&self) -> u32 {
        self.data
            .postings
            .get(self.pos)
            .map(|p| p.positions.len() as u32)
            .unwrap_or(0)
    }

    #[inline]
    fn positions(&self) -> &[u32] {
        self.data
            .postings
            .get(self.pos)
            .map(|p| p.positions.as_slice())
            .unwrap_or(&[])
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn doc_count(&self) -> u64 {
        self.data.docs.len() as u64
    }
}

/// Posting source that never yields a document
pub struct EmptyPostings;

impl DocSet for EmptyPostings {
    fn doc(&self) -> DocId {
        TERMINATED
    }

    fn advance(&mut self) -> DocId {
        TERMINATED
    }

    fn size_hint(&self) -> u64 {
        0
    }
}

impl PostingReader for EmptyPostings {
    fn term_freq(&self) -> u32 {
        0
    }

    fn positions(&self) -> &[u32] {
        &[]
    }

    fn reset(&mut self) {}

    fn doc_count(&self) -> u64 {
        0
    }
}
