//! Positional extents
//!
//! An extent is a half-open token interval `[begin, end)` within one document.
//! A single term occurrence at position `p` is the extent `(p, p + 1)`; a
//! matched phrase spans from the first term's begin to the last term's end.

use serde::Serialize;

use crate::{DocId, TERMINATED};

/// Half-open token interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Extent {
    pub begin: u32,
    pub end: u32,
}

impl Extent {
    #[inline]
    pub fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    /// Extent of a single token occurrence
    #[inline]
    pub fn single(position: u32) -> Self {
        Self {
            begin: position,
            end: position.saturating_add(1),
        }
    }

    /// True if `other` lies entirely within this extent
    #[inline]
    pub fn contains(&self, other: &Extent) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.end.saturating_sub(self.begin)
    }
}

/// Extents of one document, ordered by non-decreasing `begin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtentArray {
    document: DocId,
    extents: Vec<Extent>,
}

impl Default for ExtentArray {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtentArray {
    pub fn new() -> Self {
        Self {
            document: TERMINATED,
            extents: Vec::new(),
        }
    }

    pub fn from_extents(document: DocId, extents: Vec<Extent>) -> Self {
        debug_assert!(extents.windows(2).all(|w| w[0].begin <= w[1].begin));
        Self { document, extents }
    }

    /// Clear and retag for `document`, keeping the allocation
    pub fn reset(&mut self, document: DocId) {
        self.document = document;
        self.extents.clear();
    }

    #[inline]
    pub fn push(&mut self, begin: u32, end: u32) {
        debug_assert!(self.extents.last().is_none_or(|e| e.begin <= begin));
        self.extents.push(Extent { begin, end });
    }

    #[inline]
    pub fn document(&self) -> DocId {
        self.document
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.extents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Extent] {
        &self.extents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Extent> {
        self.extents.iter()
    }

    /// Extent pairs, handy in assertions
    pub fn pairs(&self) -> Vec<(u32, u32)> {
        self.extents.iter().map(|e| (e.begin, e.end)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_occurrence() {
        let e = Extent::single(4);
        assert_eq!((e.begin, e.end), (4, 5));
        assert_eq!(e.width(), 1);
    }

    #[test]
    fn test_contains() {
        let field = Extent::new(10, 20);
        assert!(field.contains(&Extent::new(10, 11)));
        assert!(field.contains(&Extent::new(19, 20)));
        assert!(!field.contains(&Extent::new(19, 21)));
        assert!(!field.contains(&Extent::new(9, 12)));
    }

    #[test]
    fn test_reset_retags() {
        let mut arr = ExtentArray::new();
        arr.reset(3);
        arr.push(1, 2);
        arr.push(4, 6);
        assert_eq!(arr.document(), 3);
        assert_eq!(arr.pairs(), vec![(1, 2), (4, 6)]);

        arr.reset(9);
        assert!(arr.is_empty());
        assert_eq!(arr.document(), 9);
    }
}
