//! Disjunction base: union of the driving children's candidates

use crate::context::ScoringContext;
use crate::{DocId, TERMINATED};

use super::annotation::Annotation;
use super::conjunction::driving_indices;
use super::traits::DocIterator;

pub struct Disjunction<T: ?Sized + DocIterator> {
    children: Vec<Box<T>>,
    driving: Vec<usize>,
    all_background: bool,
}

impl<T: ?Sized + DocIterator> Disjunction<T> {
    pub fn new(children: Vec<Box<T>>) -> Self {
        let (driving, all_background) = driving_indices(&children);
        Self {
            children,
            driving,
            all_background,
        }
    }

    #[inline]
    pub fn children(&self) -> &[Box<T>] {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut [Box<T>] {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<Box<T>> {
        self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Smallest driving candidate
    pub fn doc(&self) -> DocId {
        self.driving
            .iter()
            .map(|&i| self.children[i].doc())
            .min()
            .unwrap_or(TERMINATED)
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.doc() == TERMINATED
    }

    /// Syncs every child, background ones included, so values can be read
    pub fn sync_to(&mut self, target: DocId) -> DocId {
        for child in &mut self.children {
            child.sync_to(target);
        }
        self.doc()
    }

    pub fn move_past(&mut self, id: DocId) -> DocId {
        for &i in &self.driving {
            self.children[i].move_past(id);
        }
        self.doc()
    }

    pub fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        if self.doc() != ctx.document() {
            return false;
        }
        let mut matched = false;
        for &i in &self.driving {
            matched |= self.children[i].has_match(ctx);
        }
        matched
    }

    #[inline]
    pub fn has_all_candidates(&self) -> bool {
        self.all_background
    }

    pub fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
    }

    pub fn total_entries(&self) -> u64 {
        self.driving
            .iter()
            .map(|&i| self.children[i].total_entries())
            .fold(0u64, |acc, n| acc.saturating_add(n))
    }

    pub fn annotate_children(&mut self, ctx: &ScoringContext) -> Vec<Annotation> {
        self.children.iter_mut().map(|c| c.annotate(ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::{background, docs};

    fn drain(disj: &mut Disjunction<dyn DocIterator>) -> Vec<DocId> {
        let mut seen = Vec::new();
        while !disj.is_done() {
            let d = disj.doc();
            seen.push(d);
            disj.move_past(d);
        }
        seen
    }

    #[test]
    fn test_union() {
        let mut disj: Disjunction<dyn DocIterator> =
            Disjunction::new(vec![docs(&[1, 5, 9]), docs(&[2, 5, 6]), docs(&[])]);
        assert_eq!(drain(&mut disj), vec![1, 2, 5, 6, 9]);
    }

    #[test]
    fn test_has_match_any_child() {
        let mut disj: Disjunction<dyn DocIterator> =
            Disjunction::new(vec![docs(&[3]), docs(&[4])]);
        let mut ctx = ScoringContext::new();
        ctx.set_document(3);
        disj.sync_to(3);
        assert!(disj.has_match(&ctx));
        ctx.set_document(4);
        disj.sync_to(4);
        assert!(disj.has_match(&ctx));
    }

    #[test]
    fn test_background_ignored_for_candidates() {
        let mut disj: Disjunction<dyn DocIterator> =
            Disjunction::new(vec![background(50), docs(&[7, 8])]);
        assert_eq!(drain(&mut disj), vec![7, 8]);
        assert_eq!(disj.total_entries(), 2);
    }
}
