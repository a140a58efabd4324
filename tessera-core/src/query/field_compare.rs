//! Typed field comparisons: `greater`, `less`, `equals`, `between`
//!
//! The operand is given as a parameter string and parsed in the field's own
//! type, so `"2024-01-31"` is a date for a date field and text for a text
//! field. `between` is inclusive at both ends.

use std::cmp::Ordering;

use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::params::NodeParameters;
use crate::structures::{FieldColumn, FieldValue};
use crate::DocId;

use super::annotation::Annotation;
use super::leaf::BackgroundCursor;
use super::traits::{DocIterator, IndicatorIterator};

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Greater(FieldValue),
    Less(FieldValue),
    Equals(FieldValue),
    Between(FieldValue, FieldValue),
}

impl Comparison {
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Greater(_) => "greater",
            Comparison::Less(_) => "less",
            Comparison::Equals(_) => "equals",
            Comparison::Between(..) => "between",
        }
    }

    pub fn test(&self, value: &FieldValue) -> bool {
        match self {
            Comparison::Greater(v) => value.compare(v) == Some(Ordering::Greater),
            Comparison::Less(v) => value.compare(v) == Some(Ordering::Less),
            Comparison::Equals(v) => value.compare(v) == Some(Ordering::Equal),
            Comparison::Between(lo, hi) => {
                matches!(value.compare(lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(value.compare(hi), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Comparison::Greater(v) | Comparison::Less(v) | Comparison::Equals(v) => v.to_string(),
            Comparison::Between(lo, hi) => format!("{}..{}", lo, hi),
        }
    }
}

pub struct FieldComparisonIterator {
    field: String,
    column: FieldColumn,
    comparison: Comparison,
    cursor: BackgroundCursor,
}

fn operand(
    operator: &str,
    field: &str,
    column: &FieldColumn,
    params: &NodeParameters,
    key: &str,
) -> Result<FieldValue> {
    let raw = params
        .get(key)
        .ok_or_else(|| Error::missing(operator, key))?
        .to_string();
    column
        .field_type
        .parse(&raw)
        .ok_or_else(|| Error::UnsupportedValueFormat {
            operator: operator.to_string(),
            field: field.to_string(),
            value: raw,
            expected: column.field_type.as_str(),
        })
}

impl FieldComparisonIterator {
    pub fn new(field: &str, column: FieldColumn, comparison: Comparison) -> Self {
        let cursor = BackgroundCursor::new(column.values.max_doc());
        Self {
            field: field.to_string(),
            column,
            comparison,
            cursor,
        }
    }

    /// `value` for the single-operand comparisons, `low` and `high` for `between`
    pub fn from_params(
        operator: &str,
        field: &str,
        column: FieldColumn,
        params: &NodeParameters,
    ) -> Result<Self> {
        let comparison = match operator {
            "greater" => Comparison::Greater(operand(operator, field, &column, params, "value")?),
            "less" => Comparison::Less(operand(operator, field, &column, params, "value")?),
            "equals" => Comparison::Equals(operand(operator, field, &column, params, "value")?),
            "between" => Comparison::Between(
                operand(operator, field, &column, params, "low")?,
                operand(operator, field, &column, params, "high")?,
            ),
            other => return Err(Error::UnknownOperator(other.to_string())),
        };
        Ok(Self::new(field, column, comparison))
    }

    fn value(&self, ctx: &ScoringContext) -> Option<FieldValue> {
        self.column.values.get(ctx.document())
    }
}

impl DocIterator for FieldComparisonIterator {
    fn doc(&self) -> DocId {
        self.cursor.doc()
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        self.cursor.sync_to(target)
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.cursor.is_on(ctx) && self.value(ctx).is_some()
    }

    fn has_all_candidates(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }

    fn total_entries(&self) -> u64 {
        self.cursor.max_doc()
    }

    fn operator(&self) -> &str {
        self.comparison.operator()
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = self.indicator(ctx);
        Annotation::new(self.comparison.operator(), self.doc(), matched)
            .with_parameters(format!("{}:{}", self.field, self.comparison.describe()))
            .with_value(value)
    }
}

impl IndicatorIterator for FieldComparisonIterator {
    fn indicator(&mut self, ctx: &ScoringContext) -> bool {
        self.value(ctx).is_some_and(|v| self.comparison.test(&v))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::structures::{Date, DenseDocValues, FieldType};

    fn dates() -> FieldColumn {
        let values = ["2020-01-01", "2021-06-15", "2022-12-31"]
            .iter()
            .map(|d| Date::parse(d).map(FieldValue::Date))
            .chain(std::iter::once(None))
            .collect();
        FieldColumn {
            field_type: FieldType::Date,
            values: Arc::new(DenseDocValues::new(values)),
        }
    }

    fn passing(it: &mut FieldComparisonIterator) -> Vec<DocId> {
        let mut ctx = ScoringContext::new();
        let mut out = Vec::new();
        while !it.is_done() {
            let doc = it.doc();
            ctx.set_document(doc);
            if it.has_match(&ctx) && it.indicator(&ctx) {
                out.push(doc);
            }
            it.move_past(doc);
        }
        out
    }

    #[test]
    fn test_date_comparisons() {
        let params = NodeParameters::new().with("value", "2021-06-15");
        let mut greater =
            FieldComparisonIterator::from_params("greater", "published", dates(), &params).unwrap();
        assert_eq!(passing(&mut greater), vec![2]);

        let mut equals =
            FieldComparisonIterator::from_params("equals", "published", dates(), &params).unwrap();
        assert_eq!(passing(&mut equals), vec![1]);

        let range = NodeParameters::new()
            .with("low", "2020-01-01")
            .with("high", "2021-12-31");
        let mut between =
            FieldComparisonIterator::from_params("between", "published", dates(), &range).unwrap();
        assert_eq!(passing(&mut between), vec![0, 1]);
    }

    #[test]
    fn test_unparsable_operand() {
        let params = NodeParameters::new().with("value", "last tuesday");
        let err = FieldComparisonIterator::from_params("less", "published", dates(), &params)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::UnsupportedValueFormat { expected: "date", .. }
        ));
    }

    #[test]
    fn test_numeric_operand_from_int_param() {
        let column = FieldColumn {
            field_type: FieldType::Float,
            values: Arc::new(DenseDocValues::new(vec![
                Some(FieldValue::Float(0.5)),
                Some(FieldValue::Float(3.0)),
            ])),
        };
        let params = NodeParameters::new().with("value", 1i64);
        let mut less = FieldComparisonIterator::from_params("less", "ratio", column, &params).unwrap();
        assert_eq!(passing(&mut less), vec![0]);
    }
}
