//! Tessera - query evaluation core for full-text retrieval
//!
//! This library evaluates an already-parsed operator tree over posting lists:
//! - Document-ordered iterator tree with driving/background children
//! - Extent algebra for phrase, window, synonym and field-inside operators
//! - BM25, BM25F, Dirichlet, Jelinek-Mercer and DFR (PL2/PL2F/InL2) scoring
//!   with sound max/min score bounds
//! - Weighted-sum and log-domain combination
//! - Delta-scoring / MaxScore early termination that preserves the top-K

pub mod config;
pub mod context;
pub mod error;
pub mod eval;
pub mod index;
pub mod params;
pub mod prune;
pub mod query;
pub mod scoring;
pub mod structures;

pub use config::{EvalConfig, MovementPolicy, PassageConfig, ProcessingModel, QuorumOrdering};
pub use context::ScoringContext;
pub use error::{Error, Result};
pub use eval::{Evaluator, ScoredDocument, ScoredPassage};
pub use index::{IndexSource, MemoryIndex, MemoryIndexBuilder};
pub use params::{NodeParameters, ParamValue};
pub use query::{Annotation, Node, NodeFactory, QueryNode};
pub use structures::{Extent, ExtentArray, FieldType, FieldValue};

pub type DocId = u64;
pub type Score = f64;

/// Sentinel candidate reported by any exhausted iterator
pub const TERMINATED: DocId = u64::MAX;
