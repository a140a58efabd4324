//! Error types for tessera

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{operator}: missing required parameter '{key}'")]
    MissingParameter { operator: String, key: String },

    #[error("{operator}: invalid parameter '{key}': {reason}")]
    InvalidParameter {
        operator: String,
        key: String,
        reason: String,
    },

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("{operator}: node does not produce {capability}")]
    UnsupportedCapability {
        operator: String,
        capability: &'static str,
    },

    #[error("{operator}: value '{value}' is not a valid {expected} for field '{field}'")]
    UnsupportedValueFormat {
        operator: String,
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("{operator}: evaluation failed: {message}")]
    Evaluation { operator: String, message: String },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn missing(operator: &str, key: &str) -> Self {
        Error::MissingParameter {
            operator: operator.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid(operator: &str, key: &str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            operator: operator.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn capability(operator: &str, capability: &'static str) -> Self {
        Error::UnsupportedCapability {
            operator: operator.to_string(),
            capability,
        }
    }

    pub fn evaluation(operator: &str, message: impl Into<String>) -> Self {
        Error::Evaluation {
            operator: operator.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
