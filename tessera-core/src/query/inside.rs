//! Field containment (`inside`)
//!
//! Children are `[inner, outer]`: typically a term and a field's extents
//! (e.g. the title span). Output is every inner extent that lies entirely
//! within some outer extent. Both lists are ordered by begin; inner ends may
//! drop (nested windows under `syn`), so the outer cursor follows begins.

use crate::context::{ContextKey, ScoringContext};
use crate::error::{Error, Result};
use crate::structures::{Extent, ExtentArray};

use super::annotation::Annotation;
use super::conjunction::Conjunction;
use super::traits::{CountIterator, DocIterator, ExtentIterator, delegate_movement};

pub struct InsideIterator {
    base: Conjunction<dyn ExtentIterator>,
    extents: ExtentArray,
    cached: Option<ContextKey>,
}

impl InsideIterator {
    pub fn new(inner: Box<dyn ExtentIterator>, outer: Box<dyn ExtentIterator>, shared: bool) -> Self {
        Self {
            base: Conjunction::new(vec![inner, outer], shared),
            extents: ExtentArray::new(),
            cached: None,
        }
    }

    pub fn from_children(children: Vec<Box<dyn ExtentIterator>>, shared: bool) -> Result<Self> {
        let mut children = children.into_iter();
        match (children.next(), children.next(), children.next()) {
            (Some(inner), Some(outer), None) => Ok(Self::new(inner, outer, shared)),
            _ => Err(Error::invalid(
                "inside",
                "children",
                "expected [inner, outer]",
            )),
        }
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
        let [inner, outer] = self.base.children_mut() else {
            return;
        };
        contained(
            inner.extents(ctx).as_slice(),
            outer.extents(ctx).as_slice(),
            &mut self.extents,
        );
    }
}

fn contained(inner: &[Extent], outer: &[Extent], out: &mut ExtentArray) {
    let mut j = 0;
    for e in inner {
        // inner begins never decrease, so an outer ending before this begin is spent
        while j < outer.len() && outer[j].end < e.begin {
            j += 1;
        }
        if j == outer.len() {
            return;
        }
        let within = outer[j..]
            .iter()
            .take_while(|field| field.begin <= e.begin)
            .any(|field| field.contains(e));
        if within {
            out.push(e.begin, e.end);
        }
    }
}

impl DocIterator for InsideIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx) && {
            self.load(ctx);
            !self.extents.is_empty()
        }
    }

    fn operator(&self) -> &str {
        "inside"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let count = self.count(ctx);
        Annotation::new("inside", self.doc(), matched)
            .with_value(count)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl CountIterator for InsideIterator {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        self.load(ctx);
        self.extents.len() as u32
    }
}

impl ExtentIterator for InsideIterator {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        self.load(ctx);
        &self.extents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::{extents, spans};

    #[test]
    fn test_inner_within_outer() {
        // title spans [0,3) and [10,12)
        let mut inside = InsideIterator::new(
            extents(&[(5, vec![1, 4, 11, 12])]),
            spans(5, &[(0, 3), (10, 12)]),
            false,
        );
        let mut ctx = ScoringContext::new();
        ctx.set_document(5);
        assert!(inside.has_match(&ctx));
        assert_eq!(inside.extents(&ctx).pairs(), vec![(1, 2), (11, 12)]);
    }

    #[test]
    fn test_nested_inner_extents() {
        // the long inner extent must not move the cursor past [0,4)
        let mut inside = InsideIterator::new(
            spans(5, &[(1, 12), (2, 3)]),
            spans(5, &[(0, 4), (10, 14)]),
            false,
        );
        let mut ctx = ScoringContext::new();
        ctx.set_document(5);
        assert!(inside.has_match(&ctx));
        assert_eq!(inside.extents(&ctx).pairs(), vec![(2, 3)]);
    }

    #[test]
    fn test_no_containment_no_match() {
        let mut inside =
            InsideIterator::new(extents(&[(5, vec![4])]), spans(5, &[(0, 3)]), false);
        let mut ctx = ScoringContext::new();
        ctx.set_document(5);
        assert!(!inside.has_match(&ctx));
    }

    #[test]
    fn test_wrong_arity() {
        assert!(InsideIterator::from_children(vec![extents(&[(0, vec![0])])], false).is_err());
    }
}
