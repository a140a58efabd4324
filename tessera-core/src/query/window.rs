//! Ordered (`od`) and unordered (`uw`) window operators
//!
//! Both are conjunctions over extent children that derive new extents per
//! document. A width of `-1` means no positional constraint.
//!
//! Ordered: for each occurrence of the first child, every following child
//! contributes its first extent beginning at or after the previous end. The
//! match spans `[begin(first), end(last))` and is rejected as soon as a gap
//! `next.begin - prev.end` reaches the width (width 1 means adjacent).
//!
//! Unordered: one cursor per child; the window spans the smallest begin to
//! the largest end among the current occurrences and matches when that span
//! fits the width. The child holding the smallest begin then advances.

use crate::context::{ContextKey, ScoringContext};
use crate::structures::{Extent, ExtentArray};

use super::annotation::Annotation;
use super::conjunction::Conjunction;
use super::traits::{CountIterator, DocIterator, ExtentIterator, delegate_movement};

/// Sentinel width for "no positional constraint"
pub const UNLIMITED_WIDTH: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Ordered,
    Unordered,
}

pub struct WindowIterator {
    kind: WindowKind,
    width: i64,
    base: Conjunction<dyn ExtentIterator>,
    extents: ExtentArray,
    cached: Option<ContextKey>,
}

impl WindowIterator {
    pub fn new(
        kind: WindowKind,
        width: i64,
        children: Vec<Box<dyn ExtentIterator>>,
        shared: bool,
    ) -> Self {
        Self {
            kind,
            width,
            base: Conjunction::new(children, shared),
            extents: ExtentArray::new(),
            cached: None,
        }
    }

    pub fn ordered(width: i64, children: Vec<Box<dyn ExtentIterator>>, shared: bool) -> Self {
        Self::new(WindowKind::Ordered, width, children, shared)
    }

    pub fn unordered(width: i64, children: Vec<Box<dyn ExtentIterator>>, shared: bool) -> Self {
        Self::new(WindowKind::Unordered, width, children, shared)
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    fn load(&mut self, ctx: &ScoringContext) {
        let key = ctx.cache_key();
        if self.cached == Some(key) {
            return;
        }
        self.cached = Some(key);
        self.extents.reset(ctx.document());

        if self.base.is_empty() || self.base.doc() != ctx.document() {
            return;
        }
        let arrays: Vec<&[Extent]> = self
            .base
            .children_mut()
            .iter_mut()
            .map(|c| c.extents(ctx).as_slice())
            .collect();
        if arrays.iter().any(|a| a.is_empty()) {
            return;
        }
        match self.kind {
            WindowKind::Ordered => ordered_matches(&arrays, self.width, &mut self.extents),
            WindowKind::Unordered => unordered_matches(&arrays, self.width, &mut self.extents),
        }
    }
}

/// Ordered-window extents. Cursors never move backwards.
pub(crate) fn ordered_matches(arrays: &[&[Extent]], width: i64, out: &mut ExtentArray) {
    let mut cursors = vec![0usize; arrays.len()];
    'outer: for first in arrays[0] {
        let mut end = first.end;
        for (i, array) in arrays.iter().enumerate().skip(1) {
            while cursors[i] < array.len() && array[cursors[i]].begin < end {
                cursors[i] += 1;
            }
            let Some(next) = array.get(cursors[i]) else {
                break 'outer;
            };
            if width >= 0 && i64::from(next.begin - end) >= width {
                continue 'outer;
            }
            end = next.end;
        }
        out.push(first.begin, end);
    }
}

/// Unordered-window extents
pub(crate) fn unordered_matches(arrays: &[&[Extent]], width: i64, out: &mut ExtentArray) {
    let mut cursors = vec![0usize; arrays.len()];
    loop {
        let mut min_begin = u32::MAX;
        let mut max_end = 0u32;
        let mut min_child = 0;
        for (i, array) in arrays.iter().enumerate() {
            let e = array[cursors[i]];
            if e.begin < min_begin {
                min_begin = e.begin;
                min_child = i;
            }
            max_end = max_end.max(e.end);
        }
        if width < 0 || i64::from(max_end - min_begin) <= width {
            out.push(min_begin, max_end);
        }
        cursors[min_child] += 1;
        if cursors[min_child] == arrays[min_child].len() {
            return;
        }
    }
}

impl DocIterator for WindowIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx) && {
            self.load(ctx);
            !self.extents.is_empty()
        }
    }

    fn operator(&self) -> &str {
        match self.kind {
            WindowKind::Ordered => "od",
            WindowKind::Unordered => "uw",
        }
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let count = self.count(ctx);
        Annotation::new(self.operator(), self.doc(), matched)
            .with_parameters(format!("width={}", self.width))
            .with_value(count)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl CountIterator for WindowIterator {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        self.load(ctx);
        self.extents.len() as u32
    }
}

impl ExtentIterator for WindowIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        self.load(ctx);
        &self.extents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::extents;

    fn at(node: &mut WindowIterator, doc: u64) -> (ScoringContext, Vec<(u32, u32)>) {
        let mut ctx = ScoringContext::new();
        ctx.set_document(doc);
        node.sync_to(doc);
        let pairs = node.extents(&ctx).pairs();
        (ctx, pairs)
    }

    #[test]
    fn test_phrase_adjacent() {
        let mut od = WindowIterator::ordered(
            1,
            vec![extents(&[(0, vec![0, 5])]), extents(&[(0, vec![1, 6])])],
            false,
        );
        let (ctx, pairs) = at(&mut od, 0);
        assert_eq!(pairs, vec![(0, 2), (5, 7)]);
        assert!(od.has_match(&ctx));
        assert_eq!(od.count(&ctx), 2);
    }

    #[test]
    fn test_ordered_rejects_gap() {
        // a b . a . . b  -> only the first pair is within width 2
        let mut od = WindowIterator::ordered(
            2,
            vec![extents(&[(3, vec![0, 3])]), extents(&[(3, vec![1, 6])])],
            false,
        );
        let (_, pairs) = at(&mut od, 3);
        assert_eq!(pairs, vec![(0, 2)]);
    }

    #[test]
    fn test_ordered_three_terms() {
        let mut od = WindowIterator::ordered(
            1,
            vec![
                extents(&[(1, vec![2, 10])]),
                extents(&[(1, vec![3, 11])]),
                extents(&[(1, vec![4, 20])]),
            ],
            false,
        );
        let (_, pairs) = at(&mut od, 1);
        assert_eq!(pairs, vec![(2, 5)]);
    }

    #[test]
    fn test_ordered_unlimited() {
        let mut od = WindowIterator::ordered(
            UNLIMITED_WIDTH,
            vec![extents(&[(0, vec![0])]), extents(&[(0, vec![90])])],
            false,
        );
        let (_, pairs) = at(&mut od, 0);
        assert_eq!(pairs, vec![(0, 91)]);
    }

    #[test]
    fn test_ordered_wrong_order_no_match() {
        let mut od = WindowIterator::ordered(
            1,
            vec![extents(&[(0, vec![5])]), extents(&[(0, vec![4])])],
            false,
        );
        let (ctx, pairs) = at(&mut od, 0);
        assert!(pairs.is_empty());
        assert!(!od.has_match(&ctx));
    }

    #[test]
    fn test_unordered_window() {
        let mut uw = WindowIterator::unordered(
            4,
            vec![extents(&[(2, vec![7, 20])]), extents(&[(2, vec![5, 30])])],
            false,
        );
        let (_, pairs) = at(&mut uw, 2);
        // (5..8) spans 3 <= 4; later pairs are too far apart
        assert_eq!(pairs, vec![(5, 8)]);
    }

    #[test]
    fn test_unordered_unlimited_counts_every_step() {
        let mut uw = WindowIterator::unordered(
            UNLIMITED_WIDTH,
            vec![extents(&[(0, vec![1, 3])]), extents(&[(0, vec![2])])],
            false,
        );
        let (_, pairs) = at(&mut uw, 0);
        assert_eq!(pairs, vec![(1, 3), (2, 4)]);
    }

    #[test]
    fn test_candidates_are_intersection() {
        let mut od = WindowIterator::ordered(
            1,
            vec![
                extents(&[(1, vec![0]), (2, vec![0]), (4, vec![0])]),
                extents(&[(2, vec![1]), (3, vec![1]), (4, vec![5])]),
            ],
            false,
        );
        assert_eq!(od.doc(), 2);
        od.move_past(2);
        assert_eq!(od.doc(), 4);
        let mut ctx = ScoringContext::new();
        ctx.set_document(4);
        assert!(!od.has_match(&ctx));
    }
}
