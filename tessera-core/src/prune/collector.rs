//! Top-K score accumulator

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{DocId, Score};

/// Entry for the top-k min-heap
#[derive(Debug, Clone, Copy)]
pub struct HeapEntry {
    pub doc: DocId,
    pub score: Score,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.doc == other.doc
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on score; among equal scores the later document is evicted first
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fixed-capacity best-K accumulator.
///
/// The lowest retained score sits at the top of the heap, so the threshold is
/// O(1) and eviction O(log k). A score must be strictly greater than the
/// threshold to displace an entry, so ties favor documents seen first.
/// Callers insert each document at most once.
#[derive(Debug, Clone)]
pub struct ScoreCollector {
    heap: BinaryHeap<HeapEntry>,
    k: usize,
}

impl ScoreCollector {
    pub fn new(k: usize) -> Self {
        // Cap capacity to avoid allocation overflow for very large k
        let capacity = k.saturating_add(1).min(1_000_000);
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            k,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// K-th best score once full, `-inf` before
    #[inline]
    pub fn threshold(&self) -> Score {
        if self.is_full() {
            self.heap.peek().map(|e| e.score).unwrap_or(Score::NEG_INFINITY)
        } else {
            Score::NEG_INFINITY
        }
    }

    /// Returns true if the document entered the top-k
    #[inline]
    pub fn insert(&mut self, doc: DocId, score: Score) -> bool {
        if self.k == 0 || score.is_nan() {
            return false;
        }
        if self.heap.len() < self.k {
            self.heap.push(HeapEntry { doc, score });
            true
        } else if score > self.threshold() {
            self.heap.push(HeapEntry { doc, score });
            self.heap.pop();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Sorted by score descending, then document ascending
    pub fn into_sorted_results(self) -> Vec<(DocId, Score)> {
        let mut results: Vec<_> = self
            .heap
            .into_vec()
            .into_iter()
            .map(|e| (e.doc, e.score))
            .collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results
    }
}
