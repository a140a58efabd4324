//! Per-document value columns and typed field values
//!
//! Lengths, priors and metadata fields are random-access columns keyed by
//! document id. Iterators over them are background nodes: they have a value
//! (or a well-defined absence) for every document.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DocId;

/// Random-access per-document column
pub trait DocValueReader<T>: Send + Sync {
    fn get(&self, doc: DocId) -> Option<T>;

    /// One past the largest document id with a slot in this column
    fn max_doc(&self) -> DocId;
}

/// Column backed by a vector indexed by document id
#[derive(Debug, Clone)]
pub struct DenseDocValues<T> {
    values: Arc<Vec<Option<T>>>,
}

impl<T> DenseDocValues<T> {
    pub fn new(values: Vec<Option<T>>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    pub fn iter_present(&self) -> impl Iterator<Item = &T> {
        self.values.iter().flatten()
    }
}

impl<T: Clone + Send + Sync> DocValueReader<T> for DenseDocValues<T> {
    #[inline]
    fn get(&self, doc: DocId) -> Option<T> {
        usize::try_from(doc)
            .ok()
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.clone())
    }

    fn max_doc(&self) -> DocId {
        self.values.len() as DocId
    }
}

// ── Typed field values ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    Text,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Date => "date",
        }
    }

    /// Parse `raw` as a value of this type
    pub fn parse(&self, raw: &str) -> Option<FieldValue> {
        let raw = raw.trim();
        match self {
            FieldType::Int => raw.parse().ok().map(FieldValue::Int),
            FieldType::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(FieldValue::Float),
            FieldType::Text => Some(FieldValue::Text(raw.to_string())),
            FieldType::Date => Date::parse(raw).map(FieldValue::Date),
        }
    }
}

/// Calendar date, `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '-');
        let year: i32 = parts.next()?.parse().ok()?;
        let month: u8 = parts.next()?.parse().ok()?;
        let day: u8 = parts.next()?.parse().ok()?;
        if !(1..=12).contains(&month) || !(1..=days_in_month(year, month)).contains(&day) {
            return None;
        }
        Some(Self { year, month, day })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Date(Date),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Date(_) => FieldType::Date,
        }
    }

    /// Ordering between values of the same type; `None` across types
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Date(d) => write!(f, "{}", d),
        }
    }
}

/// A typed metadata column
#[derive(Clone)]
pub struct FieldColumn {
    pub field_type: FieldType,
    pub values: Arc<dyn DocValueReader<FieldValue>>,
}
