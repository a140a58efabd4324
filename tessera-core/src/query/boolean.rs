//! Boolean operators: `any`, `all`, `bool`, and the `require`/`reject` filters

use crate::context::ScoringContext;
use crate::structures::ExtentArray;
use crate::{DocId, Result, Score, TERMINATED};

use super::annotation::Annotation;
use super::conjunction::Conjunction;
use super::disjunction::Disjunction;
use super::traits::{
    CountIterator, DocIterator, ExtentIterator, IndicatorIterator, LengthsIterator, ScoreIterator,
    delegate_movement,
};

#[inline]
fn holds(child: &mut dyn IndicatorIterator, ctx: &ScoringContext) -> bool {
    child.has_match(ctx) && child.indicator(ctx)
}

// ── any / all ────────────────────────────────────────────────────────────

/// True when at least one child indicator holds
pub struct AnyIterator {
    base: Disjunction<dyn IndicatorIterator>,
}

impl AnyIterator {
    pub fn new(children: Vec<Box<dyn IndicatorIterator>>) -> Self {
        Self {
            base: Disjunction::new(children),
        }
    }
}

impl DocIterator for AnyIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "any"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = self.indicator(ctx);
        Annotation::new("any", self.doc(), matched)
            .with_value(value)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl IndicatorIterator for AnyIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> bool {
        let mut result = false;
        for child in self.base.children_mut() {
            result |= holds(child.as_mut(), ctx);
        }
        result
    }
}

/// True when every child indicator holds
pub struct AllIterator {
    base: Conjunction<dyn IndicatorIterator>,
}

impl AllIterator {
    pub fn new(children: Vec<Box<dyn IndicatorIterator>>, shared: bool) -> Self {
        Self {
            base: Conjunction::new(children, shared),
        }
    }
}

impl DocIterator for AllIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "all"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = self.indicator(ctx);
        Annotation::new("all", self.doc(), matched)
            .with_value(value)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl IndicatorIterator for AllIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> bool {
        if self.base.is_empty() {
            return false;
        }
        self.base
            .children_mut()
            .iter_mut()
            .all(|child| holds(child.as_mut(), ctx))
    }
}

// ── bool ─────────────────────────────────────────────────────────────────

/// Count node read as an indicator: true when the count is positive
pub struct CountIndicator {
    inner: Box<dyn CountIterator>,
}

impl CountIndicator {
    pub fn new(inner: Box<dyn CountIterator>) -> Self {
        Self { inner }
    }
}

impl DocIterator for CountIndicator {
    delegate_movement!(inner);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "bool"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = self.indicator(ctx);
        Annotation::new("bool", self.doc(), matched)
            .with_value(value)
            .with_children(vec![self.inner.annotate(ctx)])
    }
}

impl IndicatorIterator for CountIndicator {
    fn indicator(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.count(ctx) > 0
    }
}

// ── require / reject ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Require,
    Reject,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Require => "require",
            FilterMode::Reject => "reject",
        }
    }
}

/// Passes the body's data through for documents where the condition holds
/// (`require`) or does not hold (`reject`).
///
/// A `require` condition with its own postings also drives candidates,
/// like a two-way conjunction. Background conditions and `reject` leave
/// candidate generation to the body.
pub struct FilteredIterator<T: ?Sized + DocIterator> {
    mode: FilterMode,
    condition: Box<dyn IndicatorIterator>,
    body: Box<T>,
    condition_drives: bool,
    shared: bool,
    empty: ExtentArray,
}

impl<T: ?Sized + DocIterator> FilteredIterator<T> {
    pub fn new(
        mode: FilterMode,
        condition: Box<dyn IndicatorIterator>,
        body: Box<T>,
        shared: bool,
    ) -> Self {
        let condition_drives = mode == FilterMode::Require && !condition.has_all_candidates();
        let mut filter = Self {
            mode,
            condition,
            body,
            condition_drives,
            shared,
            empty: ExtentArray::new(),
        };
        if !shared {
            filter.align();
        }
        filter
    }

    fn align(&mut self) {
        if !self.condition_drives {
            return;
        }
        loop {
            let target = self.doc();
            if target == TERMINATED {
                return;
            }
            let body = self.body.sync_to(target);
            let condition = self.condition.sync_to(target);
            if body == target && condition == target {
                return;
            }
        }
    }

    fn passes(&mut self, ctx: &ScoringContext) -> bool {
        self.condition.sync_to(ctx.document());
        let held = holds(self.condition.as_mut(), ctx);
        match self.mode {
            FilterMode::Require => held,
            FilterMode::Reject => !held,
        }
    }
}

impl<T: ?Sized + DocIterator> DocIterator for FilteredIterator<T> {
    fn doc(&self) -> DocId {
        let body = self.body.doc();
        if !self.condition_drives {
            return body;
        }
        let condition = self.condition.doc();
        if body == TERMINATED || condition == TERMINATED {
            TERMINATED
        } else {
            body.max(condition)
        }
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        self.body.sync_to(target);
        self.condition.sync_to(target);
        if !self.shared {
            self.align();
        }
        self.doc()
    }

    fn move_past(&mut self, id: DocId) -> DocId {
        self.body.move_past(id);
        if self.condition_drives {
            self.condition.move_past(id);
        }
        if !self.shared {
            self.align();
        }
        self.doc()
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.doc() == ctx.document() && self.body.has_match(ctx) && self.passes(ctx)
    }

    fn has_all_candidates(&self) -> bool {
        self.body.has_all_candidates() && !self.condition_drives
    }

    fn reset(&mut self) {
        self.body.reset();
        self.condition.reset();
        if !self.shared {
            self.align();
        }
    }

    fn total_entries(&self) -> u64 {
        if self.condition_drives {
            self.body.total_entries().min(self.condition.total_entries())
        } else {
            self.body.total_entries()
        }
    }

    fn operator(&self) -> &str {
        self.mode.as_str()
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        Annotation::new(self.mode.as_str(), self.doc(), matched)
            .with_children(vec![self.condition.annotate(ctx), self.body.annotate(ctx)])
    }
}

impl<T: ?Sized + CountIterator> CountIterator for FilteredIterator<T> {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        if self.has_match(ctx) {
            self.body.count(ctx)
        } else {
            0
        }
    }
}

impl<T: ?Sized + ExtentIterator> ExtentIterator for FilteredIterator<T> {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        if self.has_match(ctx) {
            self.body.extents(ctx)
        } else {
            self.empty.reset(ctx.document());
            &self.empty
        }
    }
}

/// Scores pass through: filtered-out documents are never candidates of a
/// ranked root, and other parents still need a score for every document.
impl<T: ?Sized + ScoreIterator> ScoreIterator for FilteredIterator<T> {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        self.body.score(ctx)
    }

    fn max_score(&self) -> Score {
        self.body.max_score()
    }

    fn min_score(&self) -> Score {
        self.body.min_score()
    }

    fn background_max(&self) -> Score {
        self.body.background_max()
    }
}

impl<T: ?Sized + IndicatorIterator> IndicatorIterator for FilteredIterator<T> {
    fn indicator(&mut self, ctx: &ScoringContext) -> bool {
        self.has_match(ctx) && self.body.indicator(ctx)
    }
}

impl<T: ?Sized + LengthsIterator> LengthsIterator for FilteredIterator<T> {
    fn length(&mut self, ctx: &ScoringContext) -> u64 {
        self.body.length(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::term;

    fn indicator(ids: &[DocId]) -> Box<dyn IndicatorIterator> {
        let postings: Vec<(DocId, Vec<u32>)> = ids.iter().map(|&d| (d, vec![0])).collect();
        Box::new(CountIndicator::new(Box::new(term(&postings))))
    }

    fn matches(it: &mut dyn IndicatorIterator) -> Vec<DocId> {
        let mut ctx = ScoringContext::new();
        let mut out = Vec::new();
        while !it.is_done() {
            let doc = it.doc();
            ctx.set_document(doc);
            it.sync_to(doc);
            if it.has_match(&ctx) && it.indicator(&ctx) {
                out.push(doc);
            }
            it.move_past(doc);
        }
        out
    }

    #[test]
    fn test_any_all() {
        let mut any = AnyIterator::new(vec![indicator(&[1, 4]), indicator(&[2, 4])]);
        assert_eq!(matches(&mut any), vec![1, 2, 4]);
        let mut all = AllIterator::new(vec![indicator(&[1, 4, 6]), indicator(&[2, 4, 6])], false);
        assert_eq!(matches(&mut all), vec![4, 6]);
    }

    #[test]
    fn test_require_and_reject() {
        let mut require = FilteredIterator::new(
            FilterMode::Require,
            indicator(&[2, 3, 9]),
            Box::new(CountIndicator::new(Box::new(term(&[
                (1, vec![0]),
                (3, vec![0]),
                (9, vec![0]),
            ])))),
            false,
        );
        assert_eq!(matches(&mut require), vec![3, 9]);

        let mut reject = FilteredIterator::new(
            FilterMode::Reject,
            indicator(&[3]),
            Box::new(CountIndicator::new(Box::new(term(&[
                (1, vec![0]),
                (3, vec![0]),
                (9, vec![0]),
            ])))),
            false,
        );
        assert_eq!(matches(&mut reject), vec![1, 9]);
    }

    #[test]
    fn test_filtered_counts_are_gated() {
        let body: Box<dyn CountIterator> = Box::new(term(&[(1, vec![0, 3]), (5, vec![2])]));
        let mut reject = FilteredIterator::new(FilterMode::Reject, indicator(&[5]), body, false);
        let mut ctx = ScoringContext::new();
        ctx.set_document(1);
        reject.sync_to(1);
        assert_eq!(reject.count(&ctx), 2);
        ctx.set_document(5);
        reject.sync_to(5);
        assert_eq!(reject.count(&ctx), 0);
    }

    #[test]
    fn test_bool_of_empty_document() {
        let mut b = CountIndicator::new(Box::new(term(&[(2, vec![1])])));
        let mut ctx = ScoringContext::new();
        ctx.set_document(1);
        assert!(!b.indicator(&ctx));
    }
}
