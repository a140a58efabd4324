//! Leaf iterators: term postings, lengths, priors, and the empty node

use std::sync::Arc;

use crate::context::{ContextKey, ScoringContext};
use crate::structures::{DocValueReader, ExtentArray, PostingReader};
use crate::{DocId, Result, Score, TERMINATED};

use super::annotation::Annotation;
use super::traits::{
    CountIterator, DocIterator, ExtentIterator, IndicatorIterator, LengthsIterator, ScoreIterator,
};

// ── Term postings ────────────────────────────────────────────────────────

/// Term leaf over a posting reader. Each occurrence at position `p` is the
/// extent `(p, p + 1)`.
pub struct TermIterator {
    operator: &'static str,
    label: String,
    reader: Box<dyn PostingReader>,
    extents: ExtentArray,
    cached: Option<ContextKey>,
}

impl TermIterator {
    pub fn new(operator: &'static str, label: String, reader: Box<dyn PostingReader>) -> Self {
        Self {
            operator,
            label,
            reader,
            extents: ExtentArray::new(),
            cached: None,
        }
    }

    fn load(&mut self, ctx: &ScoringContext) {
        let key = ctx.cache_key();
        if self.cached == Some(key) {
            return;
        }
        self.cached = Some(key);
        self.extents.reset(ctx.document());
        if self.reader.doc() == ctx.document() {
            for &p in self.reader.positions() {
                self.extents.push(p, p.saturating_add(1));
            }
        }
    }
}

impl DocIterator for TermIterator {
    #[inline]
    fn doc(&self) -> DocId {
        self.reader.doc()
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        if target > self.reader.doc() {
            self.reader.seek(target)
        } else {
            self.reader.doc()
        }
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        let doc = self.reader.doc();
        doc != TERMINATED && doc == ctx.document()
    }

    fn reset(&mut self) {
        self.reader.reset();
        self.cached = None;
    }

    fn total_entries(&self) -> u64 {
        self.reader.doc_count()
    }

    fn operator(&self) -> &str {
        self.operator
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let count = self.count(ctx);
        Annotation::new(self.operator, self.doc(), matched)
            .with_parameters(self.label.clone())
            .with_value(count)
    }
}

impl CountIterator for TermIterator {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        if self.reader.doc() == ctx.document() {
            self.reader.term_freq()
        } else {
            0
        }
    }
}

impl ExtentIterator for TermIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        self.load(ctx);
        &self.extents
    }
}

// ── Background cursor ────────────────────────────────────────────────────

/// Candidate cursor of a background node: every document below `max_doc`
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackgroundCursor {
    doc: DocId,
    max_doc: DocId,
}

impl BackgroundCursor {
    pub(crate) fn new(max_doc: DocId) -> Self {
        Self {
            doc: if max_doc == 0 { TERMINATED } else { 0 },
            max_doc,
        }
    }

    #[inline]
    pub(crate) fn doc(&self) -> DocId {
        self.doc
    }

    pub(crate) fn sync_to(&mut self, target: DocId) -> DocId {
        if target > self.doc {
            self.doc = if target < self.max_doc { target } else { TERMINATED };
        }
        self.doc
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.max_doc);
    }

    #[inline]
    pub(crate) fn is_on(&self, ctx: &ScoringContext) -> bool {
        self.doc != TERMINATED && self.doc == ctx.document()
    }

    pub(crate) fn max_doc(&self) -> DocId {
        self.max_doc
    }
}

// ── Lengths ──────────────────────────────────────────────────────────────

/// Per-document field lengths (background)
pub struct FieldLengths {
    field: String,
    column: Arc<dyn DocValueReader<u64>>,
    cursor: BackgroundCursor,
}

impl FieldLengths {
    pub fn new(field: &str, column: Arc<dyn DocValueReader<u64>>) -> Self {
        let cursor = BackgroundCursor::new(column.max_doc());
        Self {
            field: field.to_string(),
            column,
            cursor,
        }
    }
}

impl DocIterator for FieldLengths {
    fn doc(&self) -> DocId {
        self.cursor.doc()
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        self.cursor.sync_to(target)
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.cursor.is_on(ctx)
    }

    fn has_all_candidates(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn total_entries(&self) -> u64 {
        self.cursor.max_doc()
    }

    fn operator(&self) -> &str {
        "lengths"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let length = self.length(ctx);
        Annotation::new("lengths", self.doc(), matched)
            .with_parameters(self.field.clone())
            .with_value(length)
    }
}

impl LengthsIterator for FieldLengths {
    /// Random access: reads the context document regardless of the cursor
    fn length(&mut self, ctx: &ScoringContext) -> u64 {
        self.column.get(ctx.document()).unwrap_or(0)
    }
}

// ── Prior ────────────────────────────────────────────────────────────────

/// Per-document log-domain prior (background score)
pub struct PriorIterator {
    name: String,
    column: Arc<dyn DocValueReader<f64>>,
    cursor: BackgroundCursor,
    default: Score,
    max: Score,
    min: Score,
}

impl PriorIterator {
    /// `default` scores documents without a value. Bounds are taken from
    /// the column unless supplied.
    pub fn new(
        name: &str,
        column: Arc<dyn DocValueReader<f64>>,
        default: Score,
        bounds: Option<(Score, Score)>,
    ) -> Self {
        let (min, max) = bounds.unwrap_or_else(|| {
            let mut min = default;
            let mut max = default;
            for doc in 0..column.max_doc() {
                if let Some(v) = column.get(doc) {
                    min = min.min(v);
                    max = max.max(v);
                }
            }
            (min, max)
        });
        let cursor = BackgroundCursor::new(column.max_doc());
        Self {
            name: name.to_string(),
            column,
            cursor,
            default,
            max,
            min,
        }
    }
}

impl DocIterator for PriorIterator {
    fn doc(&self) -> DocId {
        self.cursor.doc()
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        self.cursor.sync_to(target)
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.cursor.is_on(ctx) && self.column.get(ctx.document()).is_some()
    }

    fn has_all_candidates(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn total_entries(&self) -> u64 {
        self.cursor.max_doc()
    }

    fn operator(&self) -> &str {
        "prior"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let score = self.column.get(ctx.document()).unwrap_or(self.default);
        Annotation::new("prior", self.doc(), matched)
            .with_parameters(self.name.clone())
            .with_value(score)
    }
}

impl ScoreIterator for PriorIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        Ok(self.column.get(ctx.document()).unwrap_or(self.default))
    }

    fn max_score(&self) -> Score {
        self.max
    }

    fn min_score(&self) -> Score {
        self.min
    }
}

// ── Null ─────────────────────────────────────────────────────────────────

/// Node with no candidates. Stands in for terms missing from the index.
pub struct NullIterator {
    extents: ExtentArray,
}

impl NullIterator {
    pub fn new() -> Self {
        Self {
            extents: ExtentArray::new(),
        }
    }
}

impl Default for NullIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl DocIterator for NullIterator {
    fn doc(&self) -> DocId {
        TERMINATED
    }

    fn sync_to(&mut self, _target: DocId) -> DocId {
        TERMINATED
    }

    fn has_match(&mut self, _ctx: &ScoringContext) -> bool {
        false
    }

    fn reset(&mut self) {}

    fn total_entries(&self) -> u64 {
        0
    }

    fn operator(&self) -> &str {
        "null"
    }
}

impl CountIterator for NullIterator {
    fn count(&mut self, _ctx: &ScoringContext) -> u32 {
        0
    }
}

impl ExtentIterator for NullIterator {
    fn extents(&mut self, _ctx: &ScoringContext) -> &ExtentArray {
        &self.extents
    }
}

impl IndicatorIterator for NullIterator {
    fn indicator(&mut self, _ctx: &ScoringContext) -> bool {
        false
    }
}

impl ScoreIterator for NullIterator {
    fn score(&mut self, _ctx: &ScoringContext) -> Result<Score> {
        Ok(0.0)
    }

    fn max_score(&self) -> Score {
        0.0
    }

    fn min_score(&self) -> Score {
        0.0
    }
}
