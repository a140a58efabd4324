//! BM25 scoring
//!
//! `idf · c(k+1) / (c + k(1 - b + b·l/avgLength))`
//! with `idf = ln(1 + (N - df + 0.5)/(df + 0.5))`.

use crate::Score;
use crate::error::{Error, Result};
use crate::params::NodeParameters;

use super::{CollectionStatistics, MonotoneBounds, ScoringFunction};

/// BM25 k1 parameter - controls term frequency saturation
/// Higher values give more weight to term frequency
pub const BM25_K1: f64 = 1.2;

/// BM25 b parameter - controls length normalization
/// 0 = no length normalization, 1 = full normalization
pub const BM25_B: f64 = 0.75;

/// Compute IDF (Inverse Document Frequency) using BM25 variant
///
/// # Arguments
/// * `doc_freq` - Number of documents containing the term
/// * `total_docs` - Total number of documents in collection
#[inline]
pub fn bm25_idf(doc_freq: f64, total_docs: f64) -> f64 {
    ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
}

/// Compute BM25 score for a term occurrence
///
/// # Arguments
/// * `tf` - Term frequency in document
/// * `idf` - Inverse document frequency
/// * `doc_len` - Document length (or field length)
/// * `avg_doc_len` - Average document length
/// * `k`, `b` - Saturation and length normalization
#[inline]
pub fn bm25_score(tf: f64, idf: f64, doc_len: f64, avg_doc_len: f64, k: f64, b: f64) -> f64 {
    if tf <= 0.0 {
        return 0.0;
    }
    let length_norm = 1.0 - b + b * (doc_len / avg_doc_len);
    idf * (tf * (k + 1.0)) / (tf + k * length_norm)
}

/// Validated `b` (in [0, 1]) and `k` (non-negative) from node parameters
pub(crate) fn bm25_params(operator: &str, params: &NodeParameters) -> Result<(f64, f64)> {
    let b = params.f64_or("b", BM25_B);
    let k = params.f64_or("k", BM25_K1);
    if !(0.0..=1.0).contains(&b) {
        return Err(Error::invalid(operator, "b", format!("must be in [0, 1], got {}", b)));
    }
    if !(k >= 0.0 && k.is_finite()) {
        return Err(Error::invalid(operator, "k", format!("must be non-negative, got {}", k)));
    }
    Ok((b, k))
}

/// Length normalization guarded against an empty collection
#[inline]
pub(crate) fn average_length(stats: &CollectionStatistics) -> f64 {
    if stats.avg_length > 0.0 { stats.avg_length } else { 1.0 }
}

#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    b: f64,
    k: f64,
    idf: f64,
    avg_length: f64,
    bounds: MonotoneBounds,
}

impl Bm25Scorer {
    pub fn from_params(params: &NodeParameters) -> Result<Self> {
        let (b, k) = bm25_params("bm25", params)?;
        let stats = CollectionStatistics::from_params("bm25", params)?;
        Ok(Self::new(b, k, &stats))
    }

    pub fn new(b: f64, k: f64, stats: &CollectionStatistics) -> Self {
        let idf = bm25_idf(stats.node_document_count, stats.document_count);
        let avg_length = average_length(stats);
        let bounds = MonotoneBounds::compute(stats, |c, l| {
            bm25_score(f64::from(c), idf, l as f64, avg_length, k, b)
        });
        Self {
            b,
            k,
            idf,
            avg_length,
            bounds,
        }
    }

    pub fn idf(&self) -> f64 {
        self.idf
    }
}

impl ScoringFunction for Bm25Scorer {
    #[inline]
    fn score(&self, count: u32, length: u64) -> Score {
        bm25_score(f64::from(count), self.idf, length as f64, self.avg_length, self.k, self.b)
    }

    fn max_score(&self) -> Score {
        self.bounds.max
    }

    fn min_score(&self) -> Score {
        self.bounds.min
    }

    fn background_max(&self) -> Score {
        self.bounds.background_max
    }

    fn name(&self) -> &'static str {
        "bm25"
    }

    fn parameters(&self) -> String {
        format!("b={},k={},idf={:.4}", self.b, self.k, self.idf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_rare_terms_weigh_more() {
        let rare = bm25_idf(1.0, 1000.0);
        let common = bm25_idf(500.0, 1000.0);
        assert!(rare > common);
        assert!(common > 0.0);
    }

    #[test]
    fn test_zero_count_scores_zero() {
        assert_eq!(bm25_score(0.0, 2.0, 10.0, 5.0, 0.0, 0.75), 0.0);
    }

    #[test]
    fn test_length_normalization() {
        let idf = 1.0;
        let short = bm25_score(2.0, idf, 5.0, 10.0, BM25_K1, BM25_B);
        let long = bm25_score(2.0, idf, 20.0, 10.0, BM25_K1, BM25_B);
        assert!(short > long);
        let flat_short = bm25_score(2.0, idf, 5.0, 10.0, BM25_K1, 0.0);
        let flat_long = bm25_score(2.0, idf, 20.0, 10.0, BM25_K1, 0.0);
        assert!((flat_short - flat_long).abs() < 1e-12);
    }

    #[test]
    fn test_param_validation() {
        let stats = NodeParameters::new()
            .with("collectionLength", 100i64)
            .with("documentCount", 10i64)
            .with("nodeFrequency", 4i64)
            .with("nodeDocumentCount", 2i64);
        assert!(Bm25Scorer::from_params(&stats.clone().with("b", 1.5)).is_err());
        assert!(Bm25Scorer::from_params(&stats.clone().with("k", -0.1)).is_err());
        assert!(Bm25Scorer::from_params(&stats).is_ok());
    }
}
