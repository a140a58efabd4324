//! Corpus statistics read from node parameters
//!
//! Keys and fallbacks:
//!
//! | key                 | required | fallback                           |
//! |---------------------|----------|------------------------------------|
//! | `collectionLength`  | yes      |                                    |
//! | `documentCount`     | yes      |                                    |
//! | `nodeFrequency`     | yes      |                                    |
//! | `nodeDocumentCount` | yes      |                                    |
//! | `maximumCount`      | no       | `nodeFrequency`                    |
//! | `maxLength`         | no       | `collectionLength`                 |
//! | `minLength`         | no       | 0                                  |
//! | `avgLength`         | no       | `collectionLength / documentCount` |

use crate::error::{Error, Result};
use crate::params::NodeParameters;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionStatistics {
    /// Total tokens in the field across the collection (|C|)
    pub collection_length: f64,
    /// Documents in the collection (N)
    pub document_count: f64,
    /// Occurrences of the node across the collection (cf)
    pub node_frequency: f64,
    /// Documents containing the node (df)
    pub node_document_count: f64,
    /// Largest per-document count of the node
    pub maximum_count: u64,
    pub max_length: u64,
    pub min_length: u64,
    pub avg_length: f64,
}

fn non_negative(operator: &str, key: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::invalid(operator, key, format!("must be a non-negative number, got {}", value)))
    }
}

impl CollectionStatistics {
    pub fn from_params(operator: &str, params: &NodeParameters) -> Result<Self> {
        let required = |key: &str| -> Result<f64> {
            non_negative(operator, key, params.require_f64(operator, key)?)
        };
        let optional = |key: &str, fallback: f64| -> Result<f64> {
            non_negative(operator, key, params.get_f64(key).unwrap_or(fallback))
        };

        let collection_length = required("collectionLength")?;
        let document_count = required("documentCount")?;
        let node_frequency = required("nodeFrequency")?;
        let node_document_count = required("nodeDocumentCount")?;

        let maximum_count = optional("maximumCount", node_frequency)?;
        let max_length = optional("maxLength", collection_length)?;
        let min_length = optional("minLength", 0.0)?;
        let fallback_avg = if document_count > 0.0 {
            collection_length / document_count
        } else {
            0.0
        };
        let avg_length = optional("avgLength", fallback_avg)?;

        if min_length > max_length {
            return Err(Error::invalid(
                operator,
                "minLength",
                format!("minLength {} exceeds maxLength {}", min_length, max_length),
            ));
        }

        Ok(Self {
            collection_length,
            document_count,
            node_frequency,
            node_document_count,
            maximum_count: maximum_count as u64,
            max_length: max_length as u64,
            min_length: min_length as u64,
            avg_length,
        })
    }

    /// Shortest length a document with `count` occurrences can have
    #[inline]
    pub fn shortest_length(&self, count: u64) -> u64 {
        count.max(self.min_length)
    }

    /// Background probability P(t|C); `0.5 / |C|` for unseen nodes
    pub fn background_probability(&self, operator: &str) -> Result<f64> {
        if self.collection_length <= 0.0 {
            return Err(Error::invalid(
                operator,
                "collectionLength",
                "must be positive for smoothed models",
            ));
        }
        let cf = if self.node_frequency > 0.0 {
            self.node_frequency
        } else {
            0.5
        };
        Ok(cf / self.collection_length)
    }
}
