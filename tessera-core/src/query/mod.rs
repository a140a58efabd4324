//! Query operator tree
//!
//! A query is a tree of document-ordered iterators built by [`NodeFactory`]
//! from a [`QueryNode`] description. Each built node is one variant of
//! [`Node`], tagged with the data capability it produces.

mod annotation;
mod bigram;
mod boolean;
mod combination;
mod conjunction;
mod disjunction;
mod factory;
mod field_compare;
mod inside;
pub(crate) mod leaf;
mod passage;
mod synonym;
mod traits;
mod transform;
mod window;

#[cfg(test)]
mod eval_tests;

pub use annotation::Annotation;
pub use bigram::{BIGRAM_DEFAULT_WIDTH, BigramIterator, UBIGRAM_DEFAULT_WIDTH};
pub use boolean::{AllIterator, AnyIterator, CountIndicator, FilterMode, FilteredIterator};
pub use combination::{
    LogWeightedSum, WeightedSum, child_weights, normalize_weights, resolve_weights,
};
pub use conjunction::Conjunction;
pub use disjunction::Disjunction;
pub use factory::{NodeFactory, QueryNode};
pub use field_compare::{Comparison, FieldComparisonIterator};
pub use inside::InsideIterator;
pub use leaf::{FieldLengths, NullIterator, PriorIterator, TermIterator};
pub use passage::{PassageFilter, PassageLengths};
pub use synonym::SynonymIterator;
pub(crate) use traits::delegate_movement;
pub use traits::{
    CountIterator, DocIterator, ExtentIterator, IndicatorIterator, LengthsIterator, ScoreIterator,
};
pub use transform::{LogNotIterator, ScaleIterator};
pub use window::{UNLIMITED_WIDTH, WindowIterator, WindowKind};

use crate::error::{Error, Result};
use crate::scoring::FieldComponent;

/// A built operator, tagged with the data it produces.
///
/// Conversions follow the capability hierarchy: extents can be read as
/// counts, and a field component can be read as a score. Anything else is
/// a capability error naming the offending operator.
pub enum Node {
    Extents(Box<dyn ExtentIterator>),
    Counts(Box<dyn CountIterator>),
    Indicator(Box<dyn IndicatorIterator>),
    Scores(Box<dyn ScoreIterator>),
    Lengths(Box<dyn LengthsIterator>),
    /// Per-field statistic of a field combination (`bm25-field`, `dirichlet-prob`, ...)
    Statistic(Box<FieldComponent>),
}

impl Node {
    pub fn mover(&self) -> &dyn DocIterator {
        match self {
            Node::Extents(n) => n.as_ref(),
            Node::Counts(n) => n.as_ref(),
            Node::Indicator(n) => n.as_ref(),
            Node::Scores(n) => n.as_ref(),
            Node::Lengths(n) => n.as_ref(),
            Node::Statistic(n) => n.as_ref(),
        }
    }

    pub fn mover_mut(&mut self) -> &mut dyn DocIterator {
        match self {
            Node::Extents(n) => n.as_mut(),
            Node::Counts(n) => n.as_mut(),
            Node::Indicator(n) => n.as_mut(),
            Node::Scores(n) => n.as_mut(),
            Node::Lengths(n) => n.as_mut(),
            Node::Statistic(n) => n.as_mut(),
        }
    }

    pub fn operator(&self) -> &str {
        self.mover().operator()
    }

    /// Name of the capability this node produces
    pub fn capability(&self) -> &'static str {
        match self {
            Node::Extents(_) => "extents",
            Node::Counts(_) => "counts",
            Node::Indicator(_) => "indicator",
            Node::Scores(_) => "scores",
            Node::Lengths(_) => "lengths",
            Node::Statistic(_) => "statistic",
        }
    }

    pub fn into_mover(self) -> Box<dyn DocIterator> {
        match self {
            Node::Extents(n) => n,
            Node::Counts(n) => n,
            Node::Indicator(n) => n,
            Node::Scores(n) => n,
            Node::Lengths(n) => n,
            Node::Statistic(n) => n,
        }
    }

    pub fn into_extents(self) -> Result<Box<dyn ExtentIterator>> {
        match self {
            Node::Extents(n) => Ok(n),
            other => Err(Error::capability(other.operator(), "extents")),
        }
    }

    pub fn into_counts(self) -> Result<Box<dyn CountIterator>> {
        match self {
            Node::Extents(n) => Ok(n),
            Node::Counts(n) => Ok(n),
            other => Err(Error::capability(other.operator(), "counts")),
        }
    }

    pub fn into_indicator(self) -> Result<Box<dyn IndicatorIterator>> {
        match self {
            Node::Indicator(n) => Ok(n),
            other => Err(Error::capability(other.operator(), "indicator")),
        }
    }

    pub fn into_scores(self) -> Result<Box<dyn ScoreIterator>> {
        match self {
            Node::Scores(n) => Ok(n),
            Node::Statistic(n) => Ok(n),
            other => Err(Error::capability(other.operator(), "scores")),
        }
    }

    pub fn into_lengths(self) -> Result<Box<dyn LengthsIterator>> {
        match self {
            Node::Lengths(n) => Ok(n),
            other => Err(Error::capability(other.operator(), "lengths")),
        }
    }

    pub fn into_statistic(self) -> Result<Box<FieldComponent>> {
        match self {
            Node::Statistic(n) => Ok(n),
            other => Err(Error::capability(other.operator(), "field statistic")),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node::{}({})", self.capability(), self.operator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::term;

    #[test]
    fn test_capability_conversions() {
        let node = Node::Extents(Box::new(term(&[(1, vec![0])])));
        assert_eq!(node.capability(), "extents");
        assert!(node.into_counts().is_ok());

        let node = Node::Counts(Box::new(term(&[(1, vec![0])])));
        let err = node.into_extents().err().unwrap();
        assert!(matches!(
            err,
            Error::UnsupportedCapability { ref operator, capability: "extents" } if operator == "extents"
        ));
    }
}
