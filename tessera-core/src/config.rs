//! Evaluation configuration
//!
//! Every knob has a default, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the root of a ranked query is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingModel {
    /// Score every candidate of the root
    #[default]
    Ranked,
    /// Delta-scoring with a shrinking quorum of essential children
    MaxScore,
}

/// Order in which the MaxScore engine resolves its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumOrdering {
    /// Shortest posting lists first
    #[default]
    TotalEntries,
    /// Largest potential impact first
    Weight,
}

/// When non-essential MaxScore children are moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPolicy {
    /// Only when they are about to be scored
    #[default]
    Lazy,
    /// Together with the essential children on every candidate
    Aggressive,
}

/// Sliding passage window used by passage-restricted evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageConfig {
    pub size: u32,
    pub shift: u32,
}

impl PassageConfig {
    /// Both the window and its step must be at least one token
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::invalid("passage", "size", "must be at least 1"));
        }
        if self.shift == 0 {
            return Err(Error::invalid("passage", "shift", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Number of results to keep (K)
    pub requested: usize,
    pub processing: ProcessingModel,
    pub ordering: QuorumOrdering,
    pub movement: MovementPolicy,
    /// Conservative movement in combinators whose subtrees may be shared
    pub share_nodes: bool,
    pub passage: Option<PassageConfig>,
    /// Field used for term leaves and lengths when a node names none
    pub default_field: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            requested: 1000,
            processing: ProcessingModel::Ranked,
            ordering: QuorumOrdering::TotalEntries,
            movement: MovementPolicy::Lazy,
            share_nodes: false,
            passage: None,
            default_field: "document".to_string(),
        }
    }
}

impl EvalConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if let Some(passage) = &config.passage {
            passage.validate()?;
        }
        Ok(config)
    }

    pub fn with_requested(mut self, requested: usize) -> Self {
        self.requested = requested;
        self
    }

    pub fn with_processing(mut self, processing: ProcessingModel) -> Self {
        self.processing = processing;
        self
    }

    pub fn with_ordering(mut self, ordering: QuorumOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_movement(mut self, movement: MovementPolicy) -> Self {
        self.movement = movement;
        self
    }

    pub fn with_share_nodes(mut self, share_nodes: bool) -> Self {
        self.share_nodes = share_nodes;
        self
    }

    pub fn with_passage(mut self, size: u32, shift: u32) -> Self {
        self.passage = Some(PassageConfig {
            size: size.max(1),
            shift: shift.max(1),
        });
        self
    }

    pub fn with_default_field(mut self, field: &str) -> Self {
        self.default_field = field.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = EvalConfig::from_json("{}").unwrap();
        assert_eq!(config, EvalConfig::default());
        assert_eq!(config.requested, 1000);
        assert_eq!(config.default_field, "document");
    }

    #[test]
    fn test_from_json_overrides() {
        let config = EvalConfig::from_json(
            r#"{"requested": 10, "processing": "max_score", "ordering": "weight",
                "movement": "aggressive", "passage": {"size": 50, "shift": 25}}"#,
        )
        .unwrap();
        assert_eq!(config.requested, 10);
        assert_eq!(config.processing, ProcessingModel::MaxScore);
        assert_eq!(config.ordering, QuorumOrdering::Weight);
        assert_eq!(config.movement, MovementPolicy::Aggressive);
        assert_eq!(config.passage, Some(PassageConfig { size: 50, shift: 25 }));
    }

    #[test]
    fn test_zero_passage_step_rejected() {
        let err = EvalConfig::from_json(r#"{"passage": {"size": 3, "shift": 0}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref key, .. } if key == "shift"));
        assert!(EvalConfig::from_json(r#"{"passage": {"size": 0, "shift": 2}}"#).is_err());

        let clamped = EvalConfig::default().with_passage(0, 0);
        assert_eq!(clamped.passage, Some(PassageConfig { size: 1, shift: 1 }));
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(EvalConfig::from_json(r#"{"processing": "bogus"}"#).is_err());
    }
}
