//! Index-reader boundary
//!
//! The evaluation core never touches storage directly. Everything it needs
//! from an index goes through [`IndexSource`]: posting readers per term,
//! per-field document lengths, priors, typed metadata columns and the corpus
//! statistics scorers are parameterized with.
//!
//! Statistics are returned as [`NodeParameters`] using the keys scoring nodes
//! read (`collectionLength`, `documentCount`, `nodeFrequency`, ...), so the
//! factory can merge them under whatever the query already specifies.

mod memory;

use std::sync::Arc;

pub use memory::{MemoryIndex, MemoryIndexBuilder};

use crate::Result;
use crate::params::NodeParameters;
use crate::structures::{DocValueReader, FieldColumn, PostingReader};

/// Read-only view of an index shared by concurrent queries
pub trait IndexSource: Send + Sync {
    /// Posting reader for `term` in `field`; an empty reader if the term is absent
    fn postings(&self, field: &str, term: &str) -> Result<Box<dyn PostingReader>>;

    /// Document lengths of `field`
    fn lengths(&self, field: &str) -> Result<Arc<dyn DocValueReader<u64>>>;

    /// Named per-document prior (log-domain score)
    fn prior(&self, name: &str) -> Result<Arc<dyn DocValueReader<f64>>>;

    /// Typed metadata column
    fn field_values(&self, name: &str) -> Result<FieldColumn>;

    /// `collectionLength`, `documentCount`, `maxLength`, `minLength`, `avgLength`
    fn field_statistics(&self, field: &str) -> Result<NodeParameters>;

    /// Field statistics plus `nodeFrequency`, `nodeDocumentCount`, `maximumCount`
    fn term_statistics(&self, field: &str, term: &str) -> Result<NodeParameters>;
}
