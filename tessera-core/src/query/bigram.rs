//! Two-term window operators: `bigram` (ordered) and `ubigram` (unordered)
//!
//! Same semantics as `od`/`uw` restricted to exactly two children, with a
//! two-cursor scan instead of the general per-child cursor vectors.

use crate::context::{ContextKey, ScoringContext};
use crate::error::{Error, Result};
use crate::structures::{Extent, ExtentArray};

use super::annotation::Annotation;
use super::conjunction::Conjunction;
use super::traits::{CountIterator, DocIterator, ExtentIterator, delegate_movement};

pub const BIGRAM_DEFAULT_WIDTH: i64 = 1;
pub const UBIGRAM_DEFAULT_WIDTH: i64 = 8;

pub struct BigramIterator {
    ordered: bool,
    width: i64,
    base: Conjunction<dyn ExtentIterator>,
    extents: ExtentArray,
    cached: Option<ContextKey>,
}

impl BigramIterator {
    pub fn new(
        ordered: bool,
        width: i64,
        children: Vec<Box<dyn ExtentIterator>>,
        shared: bool,
    ) -> Result<Self> {
        if children.len() != 2 {
            return Err(Error::invalid(
                if ordered { "bigram" } else { "ubigram" },
                "children",
                format!("expected exactly 2 children, got {}", children.len()),
            ));
        }
        Ok(Self {
            ordered,
            width,
            base: Conjunction::new(children, shared),
            extents: ExtentArray::new(),
            cached: None,
        })
    }

    fn load(&mut self, ctx: &ScoringContext) {
        let key = ctx.cache_key();
        if self.cached == Some(key) {
            return;
        }
        self.cached = Some(key);
        self.extents.reset(ctx.document());
        if self.base.doc() != ctx.document() {
            return;
        }

        let [first, second] = self.base.children_mut() else {
            return;
        };
        let a = first.extents(ctx).as_slice();
        let b = second.extents(ctx).as_slice();
        if self.ordered {
            scan_ordered(a, b, self.width, &mut self.extents);
        } else {
            scan_unordered(a, b, self.width, &mut self.extents);
        }
    }
}

fn within(width: i64, span: u32) -> bool {
    width < 0 || i64::from(span) <= width
}

fn scan_ordered(a: &[Extent], b: &[Extent], width: i64, out: &mut ExtentArray) {
    let mut j = 0;
    for first in a {
        while j < b.len() && b[j].begin < first.end {
            j += 1;
        }
        let Some(next) = b.get(j) else {
            return;
        };
        if width < 0 || i64::from(next.begin - first.end) < width {
            out.push(first.begin, next.end);
        }
    }
}

fn scan_unordered(a: &[Extent], b: &[Extent], width: i64, out: &mut ExtentArray) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        let begin = x.begin.min(y.begin);
        let end = x.end.max(y.end);
        if within(width, end - begin) {
            out.push(begin, end);
        }
        if x.begin <= y.begin {
            i += 1;
        } else {
            j += 1;
        }
    }
}

impl DocIterator for BigramIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx) && {
            self.load(ctx);
            !self.extents.is_empty()
        }
    }

    fn operator(&self) -> &str {
        if self.ordered { "bigram" } else { "ubigram" }
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

impl CountIterator for BigramIterator {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        self.load(ctx);
        self.extents.len() as u32
    }
}

impl ExtentIterator for BigramIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        self.load(ctx);
        &self.extents
    }
}
