//! Passage restriction
//!
//! When the context carries a passage window `[begin, end)`, term data is
//! clipped to that window: [`PassageFilter`] keeps only extents lying inside
//! it and [`PassageLengths`] reports the window's length within the document.
//! Without a window both wrappers are transparent.

use crate::context::{ContextKey, ScoringContext};
use crate::structures::ExtentArray;

use super::annotation::Annotation;
use super::traits::{
    CountIterator, DocIterator, ExtentIterator, LengthsIterator, delegate_movement,
};

pub struct PassageFilter {
    inner: Box<dyn ExtentIterator>,
    extents: ExtentArray,
    cached: Option<ContextKey>,
}

impl PassageFilter {
    pub fn new(inner: Box<dyn ExtentIterator>) -> Self {
        Self {
            inner,
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
        let source = self.inner.extents(ctx);
        match ctx.passage() {
            Some((begin, end)) => {
                for e in source.iter().filter(|e| e.begin >= begin && e.end <= end) {
                    self.extents.push(e.begin, e.end);
                }
            }
            None => {
                for e in source.iter() {
                    self.extents.push(e.begin, e.end);
                }
            }
        }
    }
}

impl DocIterator for PassageFilter {
    delegate_movement!(inner);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.has_match(ctx) && {
            self.load(ctx);
            !self.extents.is_empty()
        }
    }

    fn operator(&self) -> &str {
        self.inner.operator()
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let count = self.count(ctx);
        let window = ctx
            .passage()
            .map(|(b, e)| format!("passage={}..{}", b, e))
            .unwrap_or_default();
        Annotation::new("passagefilter", self.doc(), matched)
            .with_parameters(window)
            .with_value(count)
            .with_children(vec![self.inner.annotate(ctx)])
    }
}

impl CountIterator for PassageFilter {
    fn count(&mut self, ctx: &ScoringContext) -> u32 {
        self.load(ctx);
        self.extents.len() as u32
    }
}

impl ExtentIterator for PassageFilter {
    fn extents(&mut self, ctx: &ScoringContext) -> &ExtentArray {
        self.load(ctx);
        &self.extents
    }
}

pub struct PassageLengths {
    inner: Box<dyn LengthsIterator>,
}

impl PassageLengths {
    pub fn new(inner: Box<dyn LengthsIterator>) -> Self {
        Self { inner }
    }
}

impl DocIterator for PassageLengths {
    delegate_movement!(inner);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "passagelengths"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let length = self.length(ctx);
        Annotation::new("passagelengths", self.doc(), matched)
            .with_value(length)
            .with_children(vec![self.inner.annotate(ctx)])
    }
}

impl LengthsIterator for PassageLengths {
    fn length(&mut self, ctx: &ScoringContext) -> u64 {
        let full = self.inner.length(ctx);
        match ctx.passage() {
            Some((begin, end)) => u64::from(end).min(full).saturating_sub(u64::from(begin)),
            None => full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::{extents, lengths};

    #[test]
    fn test_filter_clips_to_window() {
        let mut f = PassageFilter::new(extents(&[(0, vec![1, 5, 9, 12])]));
        let mut ctx = ScoringContext::new();
        ctx.set_document(0);
        assert_eq!(f.count(&ctx), 4);

        ctx.set_passage(4, 10);
        assert_eq!(f.extents(&ctx).pairs(), vec![(5, 6), (9, 10)]);
        assert!(f.has_match(&ctx));

        ctx.set_passage(13, 20);
        assert!(!f.has_match(&ctx));
    }

    #[test]
    fn test_lengths_clip_to_document() {
        let mut l = PassageLengths::new(Box::new(lengths(&[30])));
        let mut ctx = ScoringContext::new();
        ctx.set_document(0);
        assert_eq!(l.length(&ctx), 30);
        ctx.set_passage(0, 10);
        assert_eq!(l.length(&ctx), 10);
        ctx.set_passage(25, 35);
        assert_eq!(l.length(&ctx), 5);
        ctx.set_passage(40, 50);
        assert_eq!(l.length(&ctx), 0);
    }
}
