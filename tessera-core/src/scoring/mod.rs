//! Retrieval models
//!
//! A [`ScoringFunction`] maps `(count, length)` to a score and knows its own
//! bounds over every pair reachable under the collection statistics:
//! `0 <= count <= maximumCount` and `max(count, minLength) <= length <= maxLength`.
//! [`ScoringFunctionIterator`] binds a function to a counts child and a
//! (background) lengths child.
//!
//! Natural log everywhere except the DFR family, which is base 2.

mod bm25;
mod dfr;
mod dirichlet;
mod field;
mod jelinek_mercer;
mod stats;

use std::fmt;

pub use bm25::{BM25_B, BM25_K1, Bm25Scorer, bm25_idf, bm25_score};
pub use dfr::{InL2Scorer, Pl2Curve, Pl2Scorer, tfn};
pub use dirichlet::DirichletScorer;
pub use field::{FieldCombinationIterator, FieldComponent, FieldStatisticKind};
pub use jelinek_mercer::JelinekMercerScorer;
pub use stats::CollectionStatistics;

use crate::context::ScoringContext;
use crate::query::{Annotation, CountIterator, DocIterator, LengthsIterator, ScoreIterator};
use crate::{DocId, Result, Score};

pub trait ScoringFunction: Send + Sync + fmt::Debug {
    fn score(&self, count: u32, length: u64) -> Score;

    fn max_score(&self) -> Score;

    fn min_score(&self) -> Score;

    /// Upper bound for documents without an occurrence
    fn background_max(&self) -> Score;

    fn name(&self) -> &'static str;

    /// `key=value` rendering for annotations
    fn parameters(&self) -> String;
}

/// Bounds of a model that increases with count and decreases with length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonotoneBounds {
    pub max: Score,
    pub min: Score,
    pub background_max: Score,
}

impl MonotoneBounds {
    pub fn compute(stats: &CollectionStatistics, f: impl Fn(u32, u64) -> Score) -> Self {
        let m = stats.maximum_count;
        let top = u32::try_from(m).unwrap_or(u32::MAX);
        Self {
            max: f(top, stats.shortest_length(m)),
            min: f(0, stats.max_length),
            background_max: f(0, stats.min_length),
        }
    }
}

// ── ScoringFunctionIterator ──────────────────────────────────────────────

/// Score node: counts child + lengths child + model
pub struct ScoringFunctionIterator {
    counts: Box<dyn CountIterator>,
    lengths: Box<dyn LengthsIterator>,
    function: Box<dyn ScoringFunction>,
}

impl ScoringFunctionIterator {
    pub fn new(
        counts: Box<dyn CountIterator>,
        lengths: Box<dyn LengthsIterator>,
        function: Box<dyn ScoringFunction>,
    ) -> Self {
        Self {
            counts,
            lengths,
            function,
        }
    }

    pub fn function(&self) -> &dyn ScoringFunction {
        self.function.as_ref()
    }
}

impl DocIterator for ScoringFunctionIterator {
    #[inline]
    fn doc(&self) -> DocId {
        self.counts.doc()
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        self.lengths.sync_to(target);
        self.counts.sync_to(target)
    }

    fn move_past(&mut self, id: DocId) -> DocId {
        self.counts.move_past(id)
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.counts.has_match(ctx)
    }

    fn has_all_candidates(&self) -> bool {
        self.counts.has_all_candidates()
    }

    fn reset(&mut self) {
        self.counts.reset();
        self.lengths.reset();
    }

    fn total_entries(&self) -> u64 {
        self.counts.total_entries()
    }

    fn operator(&self) -> &str {
        self.function.name()
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let count = self.counts.count(ctx);
        let length = self.lengths.length(ctx);
        let score = self.function.score(count, length);
        Annotation::new(self.function.name(), self.doc(), matched)
            .with_parameters(self.function.parameters())
            .with_value(score)
            .with_children(vec![self.counts.annotate(ctx), self.lengths.annotate(ctx)])
    }
}

impl ScoreIterator for ScoringFunctionIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let count = self.counts.count(ctx);
        let length = self.lengths.length(ctx);
        Ok(self.function.score(count, length))
    }

    fn max_score(&self) -> Score {
        self.function.max_score()
    }

    fn min_score(&self) -> Score {
        self.function.min_score()
    }

    fn background_max(&self) -> Score {
        self.function.background_max()
    }
}
