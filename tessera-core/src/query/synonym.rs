//! Synonym merge (`syn`)
//!
//! A disjunction over extent children whose extents are the position-ordered
//! union of every matching child's extents. Duplicate extents are kept, so
//! the count is the sum of the children's counts.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::context::{ContextKey, ScoringContext};
use crate::structures::{Extent, ExtentArray};

use super::annotation::Annotation;
use super::disjunction::Disjunction;
use super::traits::{CountIterator, DocIterator, ExtentIterator, delegate_movement};

pub struct SynonymIterator {
    base: Disjunction<dyn ExtentIterator>,
    extents: ExtentArray,
    cached: Option<ContextKey>,
}

impl SynonymIterator {
    pub fn new(children: Vec<Box<dyn ExtentIterator>>) -> Self {
        Self {
            base: Disjunction::new(children),
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

        let arrays: Vec<&[Extent]> = self
            .base
            .children_mut()
            .iter_mut()
            .filter(|c| c.doc() == ctx.document())
            .map(|c| c.extents(ctx).as_slice())
            .filter(|a| !a.is_empty())
            .collect();

        // (begin, end, child, index) min-heap
        let mut heap: BinaryHeap<Reverse<(u32, u32, usize, usize)>> = arrays
            .iter()
            .enumerate()
            .map(|(child, a)| Reverse((a[0].begin, a[0].end, child, 0)))
            .collect();
        while let Some(Reverse((begin, end, child, idx))) = heap.pop() {
            self.extents.push(begin, end);
            if let Some(next) = arrays[child].get(idx + 1) {
                heap.push(Reverse((next.begin, next.end, child, idx + 1)));
            }
        }
    }
}

impl DocIterator for SynonymIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "syn"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let count = self.count(ctx);
        Annotation::new("syn", self.doc(), matched)
            .with_value(count)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl CountIterator for SynonymIterator {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        self.load(ctx);
        self.extents.len() as u32
    }
}

impl ExtentIterator for SynonymIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        self.load(ctx);
        &self.extents
    }
}
