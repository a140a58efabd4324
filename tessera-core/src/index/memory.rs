//! In-memory index
//!
//! A complete [`IndexSource`] built from tokenized documents. Used by tests
//! and by embedders that keep small collections resident.
//!
//! Statistics are computed lazily on first request and cached, the same way
//! per-term IDF values are cached for a searcher snapshot.

use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::IndexSource;
use crate::error::{Error, Result};
use crate::params::NodeParameters;
use crate::structures::{
    DenseDocValues, DocValueReader, EmptyPostings, FieldColumn, FieldType, FieldValue,
    MemoryPostingList, Posting, PostingData, PostingReader,
};
use crate::DocId;

/// Accumulates documents, then freezes into a [`MemoryIndex`]
#[derive(Default)]
pub struct MemoryIndexBuilder {
    /// field -> term -> postings
    postings: FxHashMap<String, FxHashMap<String, Vec<Posting>>>,
    lengths: FxHashMap<String, Vec<Option<u64>>>,
    priors: FxHashMap<String, Vec<Option<f64>>>,
    fields: FxHashMap<String, (FieldType, Vec<Option<FieldValue>>)>,
}

fn slot<T: Clone>(column: &mut Vec<Option<T>>, doc: DocId) -> Result<&mut Option<T>> {
    let i = usize::try_from(doc).map_err(|_| Error::Index(format!("doc id {} out of range", doc)))?;
    if column.len() <= i {
        column.resize(i + 1, None);
    }
    Ok(&mut column[i])
}

impl MemoryIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `tokens` to `field` of `doc`. Positions continue after any
    /// tokens already added to the same field of the same document.
    pub fn add_tokens<I, S>(&mut self, doc: DocId, field: &str, tokens: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lengths = self.lengths.entry(field.to_string()).or_default();
        let length = slot(lengths, doc)?;
        let start = length.unwrap_or(0);
        let mut position = start;

        let terms = self.postings.entry(field.to_string()).or_default();
        for token in tokens {
            let pos = u32::try_from(position)
                .map_err(|_| Error::Index(format!("doc {} field {} too long", doc, field)))?;
            let list = terms.entry(token.as_ref().to_string()).or_default();
            match list.last_mut() {
                Some(last) if last.doc == doc => last.positions.push(pos),
                _ => list.push(Posting {
                    doc,
                    positions: vec![pos],
                }),
            }
            position += 1;
        }
        *length = Some(position);
        Ok(self)
    }

    /// Whitespace-split convenience over [`add_tokens`](Self::add_tokens)
    pub fn add_text(&mut self, doc: DocId, field: &str, text: &str) -> Result<&mut Self> {
        self.add_tokens(doc, field, text.split_whitespace())
    }

    pub fn add_prior(&mut self, name: &str, doc: DocId, value: f64) -> Result<&mut Self> {
        let column = self.priors.entry(name.to_string()).or_default();
        *slot(column, doc)? = Some(value);
        Ok(self)
    }

    /// Set a typed metadata value; every value of one field must share a type
    pub fn add_field_value(&mut self, name: &str, doc: DocId, value: FieldValue) -> Result<&mut Self> {
        let (field_type, column) = self
            .fields
            .entry(name.to_string())
            .or_insert_with(|| (value.field_type(), Vec::new()));
        if *field_type != value.field_type() {
            return Err(Error::Index(format!(
                "field '{}' holds {} values, got {}",
                name,
                field_type.as_str(),
                value.field_type().as_str()
            )));
        }
        *slot(column, doc)? = Some(value);
        Ok(self)
    }

    pub fn build(self) -> MemoryIndex {
        let postings: FxHashMap<_, _> = self
            .postings
            .into_iter()
            .map(|(field, terms)| {
                let terms: FxHashMap<_, _> = terms
                    .into_iter()
                    .map(|(term, list)| (term, Arc::new(PostingData::new(list))))
                    .collect();
                (field, terms)
            })
            .collect();

        // a document is any id with a length in some field
        let mut documents: Vec<bool> = Vec::new();
        for column in self.lengths.values() {
            if documents.len() < column.len() {
                documents.resize(column.len(), false);
            }
            for (present, length) in documents.iter_mut().zip(column) {
                *present |= length.is_some();
            }
        }

        debug!(
            "MemoryIndex built: documents={}, fields={}, terms={}",
            documents.iter().filter(|&&d| d).count(),
            postings.len(),
            postings.values().map(|t| t.len()).sum::<usize>()
        );

        MemoryIndex {
            postings,
            documents,
            lengths: self
                .lengths
                .into_iter()
                .map(|(k, v)| (k, DenseDocValues::new(v)))
                .collect(),
            priors: self
                .priors
                .into_iter()
                .map(|(k, v)| (k, DenseDocValues::new(v)))
                .collect(),
            fields: self
                .fields
                .into_iter()
                .map(|(k, (t, v))| (k, (t, DenseDocValues::new(v))))
                .collect(),
            field_stats_cache: RwLock::new(FxHashMap::default()),
            term_stats_cache: RwLock::new(FxHashMap::default()),
        }
    }
}

/// Frozen in-memory index
pub struct MemoryIndex {
    postings: FxHashMap<String, FxHashMap<String, Arc<PostingData>>>,
    /// Collection membership by document id
    documents: Vec<bool>,
    lengths: FxHashMap<String, DenseDocValues<u64>>,
    priors: FxHashMap<String, DenseDocValues<f64>>,
    fields: FxHashMap<String, (FieldType, DenseDocValues<FieldValue>)>,
    /// Cached field statistics: field -> params
    field_stats_cache: RwLock<FxHashMap<String, NodeParameters>>,
    /// Cached term statistics: (field, term) -> params
    term_stats_cache: RwLock<FxHashMap<(String, String), NodeParameters>>,
}

impl MemoryIndex {
    pub fn builder() -> MemoryIndexBuilder {
        MemoryIndexBuilder::new()
    }

    fn posting_data(&self, field: &str, term: &str) -> Option<&Arc<PostingData>> {
        self.postings.get(field)?.get(term)
    }

    fn compute_field_statistics(&self, field: &str) -> Result<NodeParameters> {
        let lengths = self
            .lengths
            .get(field)
            .ok_or_else(|| Error::Index(format!("unknown field '{}'", field)))?;

        let mut collection_length = 0u64;
        let mut document_count = 0u64;
        let mut max_length = 0u64;
        let mut min_length = u64::MAX;
        for &len in lengths.iter_present() {
            collection_length += len;
            document_count += 1;
            max_length = max_length.max(len);
            min_length = min_length.min(len);
        }
        // documents without the field are read as length 0
        let missing = self
            .documents
            .iter()
            .enumerate()
            .filter(|&(doc, &present)| present && lengths.get(doc as DocId).is_none())
            .count() as u64;
        document_count += missing;
        if missing > 0 || document_count == 0 {
            min_length = 0;
        }
        let avg_length = if document_count > 0 {
            collection_length as f64 / document_count as f64
        } else {
            0.0
        };

        Ok(NodeParameters::new()
            .with("collectionLength", collection_length)
            .with("documentCount", document_count)
            .with("maxLength", max_length)
            .with("minLength", min_length)
            .with("avgLength", avg_length))
    }
}

impl IndexSource for MemoryIndex {
    fn postings(&self, field: &str, term: &str) -> Result<Box<dyn PostingReader>> {
        if !self.lengths.contains_key(field) {
            return Err(Error::Index(format!("unknown field '{}'", field)));
        }
        Ok(match self.posting_data(field, term) {
            Some(data) => Box::new(MemoryPostingList::new(Arc::clone(data))),
            None => Box::new(EmptyPostings),
        })
    }

    fn lengths(&self, field: &str) -> Result<Arc<dyn DocValueReader<u64>>> {
        self.lengths
            .get(field)
            .map(|c| Arc::new(c.clone()) as Arc<dyn DocValueReader<u64>>)
            .ok_or_else(|| Error::Index(format!("unknown field '{}'", field)))
    }

    fn prior(&self, name: &str) -> Result<Arc<dyn DocValueReader<f64>>> {
        self.priors
            .get(name)
            .map(|c| Arc::new(c.clone()) as Arc<dyn DocValueReader<f64>>)
            .ok_or_else(|| Error::Index(format!("unknown prior '{}'", name)))
    }

    fn field_values(&self, name: &str) -> Result<FieldColumn> {
        self.fields
            .get(name)
            .map(|(field_type, column)| FieldColumn {
                field_type: *field_type,
                values: Arc::new(column.clone()),
            })
            .ok_or_else(|| Error::Index(format!("unknown metadata field '{}'", name)))
    }

    fn field_statistics(&self, field: &str) -> Result<NodeParameters> {
        // Fast path: check cache
        {
            let cache = self.field_stats_cache.read();
            if let Some(stats) = cache.get(field) {
                return Ok(stats.clone());
            }
        }

        // Slow path: compute and cache
        let stats = self.compute_field_statistics(field)?;
        self.field_stats_cache
            .write()
            .insert(field.to_string(), stats.clone());
        Ok(stats)
    }

    fn term_statistics(&self, field: &str, term: &str) -> Result<NodeParameters> {
        let key = (field.to_string(), term.to_string());
        {
            let cache = self.term_stats_cache.read();
            if let Some(stats) = cache.get(&key) {
                return Ok(stats.clone());
            }
        }

        let mut stats = self.field_statistics(field)?;
        let (frequency, doc_count, max_count) = match self.posting_data(field, term) {
            Some(data) => (data.total_frequency(), data.len() as u64, data.max_frequency()),
            None => (0, 0, 0),
        };
        stats.set("nodeFrequency", frequency);
        stats.set("nodeDocumentCount", doc_count);
        stats.set("maximumCount", max_count);

        self.term_stats_cache.write().insert(key, stats.clone());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::DocSet;

    fn index() -> MemoryIndex {
        let mut b = MemoryIndex::builder();
        b.add_text(0, "document", "the quick brown fox").unwrap();
        b.add_text(1, "document", "the lazy dog the end").unwrap();
        b.add_text(3, "document", "fox").unwrap();
        b.add_prior("pagerank", 1, -0.5).unwrap();
        b.add_field_value("year", 0, FieldValue::Int(1999)).unwrap();
        b.build()
    }

    #[test]
    fn test_postings_and_positions() {
        let idx = index();
        let mut the = idx.postings("document", "the").unwrap();
        assert_eq!(the.doc(), 0);
        assert_eq!(the.positions(), &[0]);
        assert_eq!(the.advance(), 1);
        assert_eq!(the.positions(), &[0, 3]);

        let missing = idx.postings("document", "zebra").unwrap();
        assert_eq!(missing.doc(), crate::TERMINATED);
        assert!(idx.postings("title", "fox").is_err());
    }

    #[test]
    fn test_field_statistics() {
        let idx = index();
        let stats = idx.field_statistics("document").unwrap();
        assert_eq!(stats.get_i64("collectionLength"), Some(10));
        assert_eq!(stats.get_i64("documentCount"), Some(3));
        assert_eq!(stats.get_i64("maxLength"), Some(5));
        assert_eq!(stats.get_i64("minLength"), Some(1));
        assert!((stats.get_f64("avgLength").unwrap() - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_documents_without_field_have_zero_length() {
        let mut b = MemoryIndex::builder();
        b.add_text(0, "document", "a b").unwrap();
        b.add_text(1, "document", "c d e").unwrap();
        b.add_text(1, "title", "a").unwrap();
        b.add_text(2, "document", "f").unwrap();
        let idx = b.build();

        let title = idx.field_statistics("title").unwrap();
        assert_eq!(title.get_i64("minLength"), Some(0));
        assert_eq!(title.get_i64("maxLength"), Some(1));
        assert_eq!(title.get_i64("documentCount"), Some(3));
        assert!((title.get_f64("avgLength").unwrap() - 1.0 / 3.0).abs() < 1e-12);

        let body = idx.field_statistics("document").unwrap();
        assert_eq!(body.get_i64("minLength"), Some(1));
        assert_eq!(body.get_i64("documentCount"), Some(3));
    }

    #[test]
    fn test_term_statistics_cached() {
        let idx = index();
        let first = idx.term_statistics("document", "the").unwrap();
        assert_eq!(first.get_i64("nodeFrequency"), Some(3));
        assert_eq!(first.get_i64("nodeDocumentCount"), Some(2));
        assert_eq!(first.get_i64("maximumCount"), Some(2));
        let second = idx.term_statistics("document", "the").unwrap();
        assert_eq!(first, second);

        let absent = idx.term_statistics("document", "zebra").unwrap();
        assert_eq!(absent.get_i64("nodeFrequency"), Some(0));
    }

    #[test]
    fn test_columns() {
        let idx = index();
        let lengths = idx.lengths("document").unwrap();
        assert_eq!(lengths.get(1), Some(5));
        assert_eq!(lengths.get(2), None);
        assert_eq!(idx.prior("pagerank").unwrap().get(1), Some(-0.5));

        let year = idx.field_values("year").unwrap();
        assert_eq!(year.field_type, FieldType::Int);
        assert_eq!(year.values.get(0), Some(FieldValue::Int(1999)));
    }

    #[test]
    fn test_mixed_field_types_rejected() {
        let mut b = MemoryIndex::builder();
        b.add_field_value("year", 0, FieldValue::Int(1)).unwrap();
        assert!(b.add_field_value("year", 1, FieldValue::Text("x".into())).is_err());
    }
}
