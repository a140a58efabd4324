//! Iterator capability traits
//!
//! Every node of a query tree is a [`DocIterator`]: a forward-only cursor over
//! candidate documents. On top of movement a node provides one data
//! capability, read for the document named by the [`ScoringContext`]:
//!
//! - [`CountIterator`]: occurrences in the document
//! - [`ExtentIterator`]: positional extents (and therefore counts)
//! - [`ScoreIterator`]: a score, with bounds used for pruning
//! - [`IndicatorIterator`]: a boolean
//! - [`LengthsIterator`]: document length
//!
//! Movement flows top-down: the caller moves the root and the root moves its
//! children. Values flow bottom-up once the context names a document.

use crate::context::ScoringContext;
use crate::structures::ExtentArray;
use crate::{DocId, Result, Score, TERMINATED};

use super::annotation::Annotation;

// ── Movement ─────────────────────────────────────────────────────────────

/// Forward-only cursor over candidate documents.
///
/// Candidate sequences are non-decreasing and [`TERMINATED`] is absorbing.
/// Calls with a target at or behind the current candidate are no-ops.
pub trait DocIterator: Send {
    /// Current candidate, or [`TERMINATED`] once done.
    fn doc(&self) -> DocId;

    fn is_done(&self) -> bool {
        self.doc() == TERMINATED
    }

    /// Move to `target` if it is a candidate, else to the next candidate after it.
    fn sync_to(&mut self, target: DocId) -> DocId;

    /// Move to the first candidate strictly greater than `id`.
    fn move_past(&mut self, id: DocId) -> DocId {
        self.sync_to(id.saturating_add(1))
    }

    /// Not done, positioned on the context document, and holding data for it.
    fn has_match(&mut self, ctx: &ScoringContext) -> bool;

    /// Background nodes (lengths, priors, field values) have a value for
    /// every document and never drive iteration.
    fn has_all_candidates(&self) -> bool {
        false
    }

    /// Rewind to the first candidate, recursively.
    fn reset(&mut self);

    /// Overestimate of the number of candidates, used only for cost ordering.
    fn total_entries(&self) -> u64;

    fn operator(&self) -> &str;

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        Annotation::new(self.operator(), self.doc(), matched)
    }
}

// ── Data capabilities ────────────────────────────────────────────────────

pub trait CountIterator: DocIterator {
    /// Occurrences in the context document; 0 when not positioned on it.
    fn count(&mut self, ctx: &ScoringContext) -> u32;
}

pub trait ExtentIterator: CountIterator {
    /// Extents in the context document; empty when not positioned on it.
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray;
}

pub trait ScoreIterator: DocIterator {
    /// Score of the context document. Documents the node does not match
    /// still receive a score (e.g. a smoothed background estimate).
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score>;

    /// Upper bound over every reachable document
    fn max_score(&self) -> Score;

    /// Lower bound over every reachable document
    fn min_score(&self) -> Score;

    /// Upper bound for a document this node does not match
    fn background_max(&self) -> Score {
        self.max_score()
    }
}

pub trait IndicatorIterator: DocIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> bool;
}

pub trait LengthsIterator: DocIterator {
    fn length(&mut self, ctx: &ScoringContext) -> u64;
}

// ── Delegation ───────────────────────────────────────────────────────────

/// Implements the movement half of [`DocIterator`] by forwarding to a field
/// (usually a `Conjunction` or `Disjunction` base).
macro_rules! delegate_movement {
    ($field:ident) => {
        #[inline]
        fn doc(&self) -> $crate::DocId {
            self.$field.doc()
        }

        #[inline]
        fn is_done(&self) -> bool {
            self.$field.is_done()
        }

        fn sync_to(&mut self, target: $crate::DocId) -> $crate::DocId {
            self.$field.sync_to(target)
        }

        fn move_past(&mut self, id: $crate::DocId) -> $crate::DocId {
            self.$field.move_past(id)
        }

        fn has_all_candidates(&self) -> bool {
            self.$field.has_all_candidates()
        }

        fn reset(&mut self) {
            self.$field.reset()
        }

        fn total_entries(&self) -> u64 {
            self.$field.total_entries()
        }
    };
}

pub(crate) use delegate_movement;
