//! Node parameters supplied by the query compiler
//!
//! Every operator node receives a `NodeParameters` map at construction time:
//! weights, smoothing constants and corpus statistics. The map is read-only
//! once the node is built.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Key → value configuration attached to one operator node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeParameters {
    values: FxHashMap<String, ParamValue>,
}

impl NodeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Copy every entry of `other` that is not already present
    pub fn merge_missing(&mut self, other: &NodeParameters) {
        for (k, v) in &other.values {
            self.values.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric lookup; integers widen to floats, numeric strings are parsed
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            ParamValue::Float(x) => Some(*x),
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Str(s) => s.trim().parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Float(x) if x.fract() == 0.0 => Some(*x as i64),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            ParamValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Required numeric parameter; absence is a construction error naming `operator`
    pub fn require_f64(&self, operator: &str, key: &str) -> Result<f64> {
        match self.values.get(key) {
            None => Err(Error::missing(operator, key)),
            Some(v) => self
                .get_f64(key)
                .ok_or_else(|| Error::invalid(operator, key, format!("expected a number, got '{}'", v))),
        }
    }

    pub fn require_str(&self, operator: &str, key: &str) -> Result<&str> {
        match self.values.get(key) {
            None => Err(Error::missing(operator, key)),
            Some(ParamValue::Str(s)) => Ok(s.as_str()),
            Some(v) => Err(Error::invalid(operator, key, format!("expected a string, got '{}'", v))),
        }
    }

    /// Sorted `key=value` rendering, used by annotations
    pub fn describe(&self) -> String {
        let mut entries: Vec<_> = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        entries.sort();
        entries.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        let p = NodeParameters::new()
            .with("mu", 1500i64)
            .with("lambda", 0.4)
            .with("c", "7.5");
        assert_eq!(p.get_f64("mu"), Some(1500.0));
        assert_eq!(p.get_f64("lambda"), Some(0.4));
        assert_eq!(p.get_f64("c"), Some(7.5));
        assert_eq!(p.get_f64("missing"), None);
    }

    #[test]
    fn test_require_reports_operator() {
        let p = NodeParameters::new().with("mu", "abc");
        let err = p.require_f64("dirichlet", "collectionLength").unwrap_err();
        assert!(err.to_string().contains("dirichlet"));
        assert!(err.to_string().contains("collectionLength"));

        let err = p.require_f64("dirichlet", "mu").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_deserialize_untagged() {
        let p: NodeParameters =
            serde_json::from_str(r#"{"0": 2, "norm": false, "term": "fox", "b": 0.75}"#).unwrap();
        assert_eq!(p.get_f64("0"), Some(2.0));
        assert_eq!(p.get_bool("norm"), Some(false));
        assert_eq!(p.get_str("term"), Some("fox"));
        assert_eq!(p.get_f64("b"), Some(0.75));
    }

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut p = NodeParameters::new().with("mu", 100.0);
        p.merge_missing(&NodeParameters::new().with("mu", 2500.0).with("documentCount", 4i64));
        assert_eq!(p.get_f64("mu"), Some(100.0));
        assert_eq!(p.get_i64("documentCount"), Some(4));
    }
}
