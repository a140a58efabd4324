//! Conjunction base: candidates every driving child agrees on
//!
//! Driving children are the ones without `has_all_candidates`. If every child
//! is a background node, all of them drive and the conjunction itself
//! becomes a background node.
//!
//! Alignment takes the largest driving candidate as a trial target and syncs
//! every driving child to it, repeating until they agree or one is done. In
//! shared mode the subtree may also be moved by another parent, so movement
//! goes no further than the requested target and `doc()` may report the
//! largest driving candidate before the children agree on it.

use crate::context::ScoringContext;
use crate::{DocId, TERMINATED};

use super::annotation::Annotation;
use super::traits::DocIterator;

pub struct Conjunction<T: ?Sized + DocIterator> {
    children: Vec<Box<T>>,
    driving: Vec<usize>,
    all_background: bool,
    shared: bool,
}

pub(crate) fn driving_indices<T: ?Sized + DocIterator>(children: &[Box<T>]) -> (Vec<usize>, bool) {
    let driving: Vec<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.has_all_candidates())
        .map(|(i, _)| i)
        .collect();
    if driving.is_empty() {
        ((0..children.len()).collect(), true)
    } else {
        (driving, false)
    }
}

impl<T: ?Sized + DocIterator> Conjunction<T> {
    pub fn new(children: Vec<Box<T>>, shared: bool) -> Self {
        let (driving, all_background) = driving_indices(&children);
        let mut conj = Self {
            children,
            driving,
            all_background,
            shared,
        };
        if !conj.shared {
            conj.align();
        }
        conj
    }

    #[inline]
    pub fn children(&self) -> &[Box<T>] {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut [Box<T>] {
        &mut self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Largest driving candidate; `TERMINATED` if any driving child is done
    /// or there are no children at all.
    pub fn doc(&self) -> DocId {
        if self.driving.is_empty() {
            return TERMINATED;
        }
        let mut max = 0;
        for &i in &self.driving {
            let d = self.children[i].doc();
            if d == TERMINATED {
                return TERMINATED;
            }
            max = max.max(d);
        }
        max
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.doc() == TERMINATED
    }

    /// True once every driving child sits on the same candidate
    pub fn is_aligned(&self) -> bool {
        let doc = self.doc();
        doc != TERMINATED && self.driving.iter().all(|&i| self.children[i].doc() == doc)
    }

    pub fn sync_to(&mut self, target: DocId) -> DocId {
        for child in &mut self.children {
            child.sync_to(target);
        }
        if !self.shared {
            self.align();
        }
        self.doc()
    }

    pub fn move_past(&mut self, id: DocId) -> DocId {
        for &i in &self.driving {
            self.children[i].move_past(id);
        }
        if !self.shared {
            self.align();
        }
        self.doc()
    }

    fn align(&mut self) {
        loop {
            let target = self.doc();
            if target == TERMINATED {
                return;
            }
            let mut agreed = true;
            for &i in &self.driving {
                if self.children[i].sync_to(target) != target {
                    agreed = false;
                }
            }
            if agreed {
                return;
            }
        }
    }

    pub fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        if self.doc() != ctx.document() {
            return false;
        }
        for &i in &self.driving {
            if !self.children[i].has_match(ctx) {
                return false;
            }
        }
        true
    }

    #[inline]
    pub fn has_all_candidates(&self) -> bool {
        self.all_background
    }

    pub fn reset(&mut self) {
        for child in &mut self.children {
            child.reset();
        }
        if !self.shared {
            self.align();
        }
    }

    pub fn total_entries(&self) -> u64 {
        self.driving
            .iter()
            .map(|&i| self.children[i].total_entries())
            .min()
            .unwrap_or(0)
    }

    pub fn annotate_children(&mut self, ctx: &ScoringContext) -> Vec<Annotation> {
        self.children.iter_mut().map(|c| c.annotate(ctx)).collect()
    }
}
