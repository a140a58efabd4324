//! Core data structures: extents, posting cursors, per-document columns

mod doc_values;
mod extents;
mod postings;

pub use doc_values::{
    Date, DenseDocValues, DocValueReader, FieldColumn, FieldType, FieldValue,
};
pub use extents::{Extent, ExtentArray};
pub use postings::{
    DocSet, EmptyPostings, MemoryPostingList, Posting, PostingData, PostingReader,
};
