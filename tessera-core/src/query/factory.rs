//! Operator factory
//!
//! [`NodeFactory`] turns a resolved [`QueryNode`] description into a tree of
//! iterators bound to an [`IndexSource`]. Operators are keyed by name:
//!
//! | operator                                      | children                   | produces  |
//! |-----------------------------------------------|----------------------------|-----------|
//! | `extents`, `counts`                           | none (`term`, `field`)     | extents   |
//! | `lengths`                                     | none (`field`)             | lengths   |
//! | `prior`                                       | none (`name`, `default`)   | scores    |
//! | `null`                                        | none                       | extents   |
//! | `od`, `uw`, `bigram`, `ubigram`               | extents                    | extents   |
//! | `syn`, `inside`                               | extents                    | extents   |
//! | `bm25`, `dirichlet`, `jm`, `pl2`, `inl2`      | counts [, lengths]         | scores    |
//! | `bm25-field`, `pl2-field`, `dirichlet-prob`, `jm-prob` | counts [, lengths] | statistic |
//! | `bm25f`, `pl2f`, `prms`                       | field statistics           | scores    |
//! | `combine`, `wsum`                             | scores                     | scores    |
//! | `lognot`, `scale`                             | scores                     | scores    |
//! | `any`, `all`                                  | indicators                 | indicator |
//! | `bool`                                        | counts                     | indicator |
//! | `require`, `reject`                           | indicator, any             | as body   |
//! | `greater`, `less`, `equals`, `between`        | none (`field`, operands)   | indicator |
//!
//! Scorers read corpus statistics from their parameters. Whatever the query
//! does not supply is filled in from the index: term statistics for a term
//! child, or statistics gathered by a single pass over any other counts child.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{EvalConfig, MovementPolicy, ProcessingModel};
use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::index::IndexSource;
use crate::params::{NodeParameters, ParamValue};
use crate::prune::{DeltaGroup, MaxScoreCombination};
use crate::scoring::{
    Bm25Scorer, DirichletScorer, FieldCombinationIterator, FieldComponent, InL2Scorer,
    JelinekMercerScorer, Pl2Scorer, ScoringFunction, ScoringFunctionIterator,
};
use crate::structures::DocValueReader;

use super::Node;
use super::bigram::{BIGRAM_DEFAULT_WIDTH, BigramIterator, UBIGRAM_DEFAULT_WIDTH};
use super::boolean::{AllIterator, AnyIterator, CountIndicator, FilterMode, FilteredIterator};
use super::combination::{LogWeightedSum, WeightedSum, resolve_weights};
use super::field_compare::FieldComparisonIterator;
use super::inside::InsideIterator;
use super::leaf::{FieldLengths, NullIterator, PriorIterator, TermIterator};
use super::passage::{PassageFilter, PassageLengths};
use super::synonym::SynonymIterator;
use super::traits::{CountIterator, LengthsIterator};
use super::window::{UNLIMITED_WIDTH, WindowIterator, WindowKind};

/// Resolved query tree: operator name, parameters and children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    pub operator: String,
    #[serde(default)]
    pub params: NodeParameters,
    #[serde(default)]
    pub children: Vec<QueryNode>,
}

impl QueryNode {
    pub fn new(operator: &str) -> Self {
        Self {
            operator: operator.to_string(),
            params: NodeParameters::new(),
            children: Vec::new(),
        }
    }

    /// `extents` leaf for `term` in the default field
    pub fn term(term: &str) -> Self {
        Self::new("extents").with_param("term", term)
    }

    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.params.set(key, value);
        self
    }

    pub fn with_child(mut self, child: QueryNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<QueryNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn is_term_leaf(&self) -> bool {
        matches!(self.operator.as_str(), "extents" | "counts")
    }
}

fn term_text(q: &QueryNode) -> Result<&str> {
    q.params
        .get_str("term")
        .or_else(|| q.params.get_str("default"))
        .ok_or_else(|| Error::missing(&q.operator, "term"))
}

fn only_child(q: &QueryNode) -> Result<&QueryNode> {
    match q.children.as_slice() {
        [child] => Ok(child),
        other => Err(Error::invalid(
            &q.operator,
            "children",
            format!("expected exactly 1 child, got {}", other.len()),
        )),
    }
}

fn non_empty(q: &QueryNode) -> Result<()> {
    if q.children.is_empty() {
        return Err(Error::invalid(&q.operator, "children", "needs at least one child"));
    }
    Ok(())
}

fn column_min(column: &dyn DocValueReader<f64>) -> f64 {
    (0..column.max_doc())
        .filter_map(|doc| column.get(doc))
        .fold(f64::INFINITY, f64::min)
        .min(0.0)
}

/// Statistics of a multi-field node from its per-field statistics.
/// Frequencies and lengths add up; document counts take the largest field.
fn merged_statistics(fields: &[NodeParameters]) -> NodeParameters {
    let sum = |key: &str| fields.iter().map(|p| p.f64_or(key, 0.0)).sum::<f64>();
    let max = |key: &str| {
        fields
            .iter()
            .map(|p| p.f64_or(key, 0.0))
            .fold(0.0, f64::max)
    };
    NodeParameters::new()
        .with("collectionLength", sum("collectionLength"))
        .with("documentCount", max("documentCount"))
        .with("nodeFrequency", sum("nodeFrequency"))
        .with("nodeDocumentCount", max("nodeDocumentCount"))
        .with("maximumCount", sum("maximumCount"))
        .with("maxLength", sum("maxLength"))
        .with("minLength", sum("minLength"))
}

/// Counts and lengths children of a scorer plus its statistics-complete parameters
struct ScorerParts {
    counts: Box<dyn CountIterator>,
    lengths: Box<dyn LengthsIterator>,
    params: NodeParameters,
}

pub struct NodeFactory {
    index: Arc<dyn IndexSource>,
    config: EvalConfig,
}

impl NodeFactory {
    pub fn new(index: Arc<dyn IndexSource>, config: EvalConfig) -> Self {
        Self { index, config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn IndexSource> {
        &self.index
    }

    /// Builds the whole tree. The root `combine` runs as a MaxScore engine
    /// when the configuration asks for it.
    pub fn build(&self, query: &QueryNode) -> Result<Node> {
        let node = self.build_node(query, true)?;
        debug!(
            "built query: root={} ({}), processing={:?}, k={}",
            node.operator(),
            node.capability(),
            self.config.processing,
            self.config.requested
        );
        Ok(node)
    }

    fn build_node(&self, q: &QueryNode, root: bool) -> Result<Node> {
        match q.operator.as_str() {
            "extents" | "counts" => self.term_leaf(q),
            "lengths" => self.lengths_leaf(q),
            "prior" => self.prior_leaf(q),
            "null" => Ok(Node::Extents(Box::new(NullIterator::new()))),
            "od" | "ordered" => self.window(q, WindowKind::Ordered, 1),
            "uw" | "unordered" => self.window(q, WindowKind::Unordered, UNLIMITED_WIDTH),
            "bigram" => self.bigram(q, true, BIGRAM_DEFAULT_WIDTH),
            "ubigram" => self.bigram(q, false, UBIGRAM_DEFAULT_WIDTH),
            "syn" | "synonym" => {
                non_empty(q)?;
                let children = self.extent_children(q)?;
                Ok(Node::Extents(Box::new(SynonymIterator::new(children))))
            }
            "inside" => {
                let children = self.extent_children(q)?;
                Ok(Node::Extents(Box::new(InsideIterator::from_children(
                    children,
                    self.config.share_nodes,
                )?)))
            }
            "bm25" | "dirichlet" | "jm" | "pl2" | "inl2" => self.scorer(q),
            "bm25-field" | "pl2-field" | "dirichlet-prob" | "jm-prob" => {
                let (component, _) = self.component(q, None)?;
                Ok(Node::Statistic(Box::new(component)))
            }
            "bm25f" | "pl2f" | "prms" => Ok(Node::Scores(Box::new(self.field_combination(q)?))),
            "combine" => self.combine(q, root),
            "wsum" => {
                non_empty(q)?;
                let children = self.score_children(q)?;
                Ok(Node::Scores(Box::new(LogWeightedSum::from_params(&q.params, children)?)))
            }
            "lognot" => {
                let child = self.build_node(only_child(q)?, false)?.into_scores()?;
                Ok(Node::Scores(Box::new(super::LogNotIterator::new(child))))
            }
            "scale" => {
                let child = self.build_node(only_child(q)?, false)?.into_scores()?;
                Ok(Node::Scores(Box::new(super::ScaleIterator::from_params(&q.params, child)?)))
            }
            "any" => {
                non_empty(q)?;
                Ok(Node::Indicator(Box::new(AnyIterator::new(self.indicator_children(q)?))))
            }
            "all" => {
                non_empty(q)?;
                Ok(Node::Indicator(Box::new(AllIterator::new(
                    self.indicator_children(q)?,
                    self.config.share_nodes,
                ))))
            }
            "bool" => {
                let child = self.build_node(only_child(q)?, false)?.into_counts()?;
                Ok(Node::Indicator(Box::new(CountIndicator::new(child))))
            }
            "require" => self.filter(q, FilterMode::Require),
            "reject" => self.filter(q, FilterMode::Reject),
            "greater" | "less" | "equals" | "between" => {
                let field = q.params.require_str(&q.operator, "field")?;
                let column = self.index.field_values(field)?;
                Ok(Node::Indicator(Box::new(FieldComparisonIterator::from_params(
                    &q.operator,
                    field,
                    column,
                    &q.params,
                )?)))
            }
            other => Err(Error::UnknownOperator(other.to_string())),
        }
    }

    // ── Children ─────────────────────────────────────────────────────────

    fn extent_children(&self, q: &QueryNode) -> Result<Vec<Box<dyn super::ExtentIterator>>> {
        q.children
            .iter()
            .map(|c| self.build_node(c, false)?.into_extents())
            .collect()
    }

    fn score_children(&self, q: &QueryNode) -> Result<Vec<Box<dyn super::ScoreIterator>>> {
        q.children
            .iter()
            .map(|c| self.build_node(c, false)?.into_scores())
            .collect()
    }

    fn indicator_children(&self, q: &QueryNode) -> Result<Vec<Box<dyn super::IndicatorIterator>>> {
        q.children
            .iter()
            .map(|c| self.build_node(c, false)?.into_indicator())
            .collect()
    }

    // ── Leaves ───────────────────────────────────────────────────────────

    fn field_of<'a>(&'a self, q: &'a QueryNode) -> &'a str {
        q.params.str_or("field", &self.config.default_field)
    }

    fn term_leaf(&self, q: &QueryNode) -> Result<Node> {
        let term = term_text(q)?;
        let field = self.field_of(q);
        let operator = if q.operator == "counts" { "counts" } else { "extents" };
        let leaf = TermIterator::new(
            operator,
            format!("{}:{}", field, term),
            self.index.postings(field, term)?,
        );
        let leaf: Box<dyn super::ExtentIterator> = match self.config.passage {
            Some(_) => Box::new(PassageFilter::new(Box::new(leaf))),
            None => Box::new(leaf),
        };
        Ok(if operator == "counts" {
            Node::Counts(leaf)
        } else {
            Node::Extents(leaf)
        })
    }

    fn lengths_of(&self, field: &str) -> Result<Box<dyn LengthsIterator>> {
        let lengths = FieldLengths::new(field, self.index.lengths(field)?);
        Ok(match self.config.passage {
            Some(_) => Box::new(PassageLengths::new(Box::new(lengths))),
            None => Box::new(lengths),
        })
    }

    fn lengths_leaf(&self, q: &QueryNode) -> Result<Node> {
        Ok(Node::Lengths(self.lengths_of(self.field_of(q))?))
    }

    /// Documents without a value score `default`, or the column minimum
    /// (capped at 0) when none is given.
    fn prior_leaf(&self, q: &QueryNode) -> Result<Node> {
        let name = q.params.require_str("prior", "name")?;
        let column = self.index.prior(name)?;
        let default = match q.params.get_f64("default") {
            Some(d) => d,
            None => column_min(column.as_ref()),
        };
        Ok(Node::Scores(Box::new(PriorIterator::new(name, column, default, None))))
    }

    // ── Proximity ────────────────────────────────────────────────────────

    fn width(q: &QueryNode, default: i64) -> i64 {
        q.params
            .get_i64("default")
            .or_else(|| q.params.get_i64("width"))
            .unwrap_or(default)
    }

    fn window(&self, q: &QueryNode, kind: WindowKind, default: i64) -> Result<Node> {
        non_empty(q)?;
        let children = self.extent_children(q)?;
        Ok(Node::Extents(Box::new(WindowIterator::new(
            kind,
            Self::width(q, default),
            children,
            self.config.share_nodes,
        ))))
    }

    fn bigram(&self, q: &QueryNode, ordered: bool, default: i64) -> Result<Node> {
        let children = self.extent_children(q)?;
        Ok(Node::Extents(Box::new(BigramIterator::new(
            ordered,
            Self::width(q, default),
            children,
            self.config.share_nodes,
        )?)))
    }

    // ── Scoring ──────────────────────────────────────────────────────────

    /// Field whose lengths and statistics a scorer uses: `lengths`, else
    /// the field of a term child, else the default field
    fn scoring_field<'a>(&'a self, q: &'a QueryNode, counts: &'a QueryNode) -> &'a str {
        if let Some(field) = q.params.get_str("lengths") {
            return field;
        }
        if counts.is_term_leaf() {
            return self.field_of(counts);
        }
        &self.config.default_field
    }

    fn scorer_parts(&self, q: &QueryNode, weight: Option<f64>) -> Result<ScorerParts> {
        let (first, rest) = q.children.split_first().ok_or_else(|| {
            Error::invalid(&q.operator, "children", "expected a counts child")
        })?;
        if rest.len() > 1 {
            return Err(Error::invalid(
                &q.operator,
                "children",
                format!("expected counts and optional lengths, got {} children", q.children.len()),
            ));
        }
        let field = self.scoring_field(q, first);
        let mut counts = self.build_node(first, false)?.into_counts()?;
        let lengths = match rest.first() {
            Some(l) => self.build_node(l, false)?.into_lengths()?,
            None => self.lengths_of(field)?,
        };

        let mut params = q.params.clone();
        if let Some(w) = weight {
            params.set("weight", w);
        }
        if !(params.contains("nodeFrequency") && params.contains("nodeDocumentCount")) {
            let stats = self.count_statistics(first, field, counts.as_mut())?;
            params.merge_missing(&stats);
        }
        params.merge_missing(&self.index.field_statistics(field)?);
        Ok(ScorerParts {
            counts,
            lengths,
            params,
        })
    }

    /// Term statistics from the index for a term leaf; otherwise one pass
    /// over the built counts node, which is rewound afterwards.
    fn count_statistics(
        &self,
        node: &QueryNode,
        field: &str,
        counts: &mut dyn CountIterator,
    ) -> Result<NodeParameters> {
        if node.is_term_leaf() {
            return self.index.term_statistics(self.field_of(node), term_text(node)?);
        }
        let mut stats = self.index.field_statistics(field)?;
        let mut ctx = ScoringContext::new();
        let (mut frequency, mut documents, mut maximum) = (0u64, 0u64, 0u64);
        while !counts.is_done() {
            let doc = counts.doc();
            ctx.set_document(doc);
            if counts.has_match(&ctx) {
                let c = u64::from(counts.count(&ctx));
                if c > 0 {
                    frequency += c;
                    documents += 1;
                    maximum = maximum.max(c);
                }
            }
            counts.move_past(doc);
        }
        counts.reset();
        debug!(
            "{}: gathered statistics cf={}, df={}, max={} over field '{}'",
            node.operator, frequency, documents, maximum, field
        );
        stats.set("nodeFrequency", frequency);
        stats.set("nodeDocumentCount", documents);
        stats.set("maximumCount", maximum);
        Ok(stats)
    }

    fn scorer(&self, q: &QueryNode) -> Result<Node> {
        let parts = self.scorer_parts(q, None)?;
        let params = &parts.params;
        let function: Box<dyn ScoringFunction> = match q.operator.as_str() {
            "bm25" => Box::new(Bm25Scorer::from_params(params)?),
            "dirichlet" => Box::new(DirichletScorer::from_params(params)?),
            "jm" => Box::new(JelinekMercerScorer::from_params(params)?),
            "pl2" => Box::new(Pl2Scorer::from_params(params)?),
            "inl2" => Box::new(InL2Scorer::from_params(params)?),
            other => return Err(Error::UnknownOperator(other.to_string())),
        };
        Ok(Node::Scores(Box::new(ScoringFunctionIterator::new(
            parts.counts,
            parts.lengths,
            function,
        ))))
    }

    fn component(&self, q: &QueryNode, weight: Option<f64>) -> Result<(FieldComponent, NodeParameters)> {
        let parts = self.scorer_parts(q, weight)?;
        let component =
            FieldComponent::from_params(&q.operator, &parts.params, parts.counts, parts.lengths)?;
        Ok((component, parts.params))
    }

    fn field_combination(&self, q: &QueryNode) -> Result<FieldCombinationIterator> {
        let operator = q.operator.as_str();
        non_empty(q)?;
        if let Some(c) = q.children.iter().find(|c| {
            !matches!(
                c.operator.as_str(),
                "bm25-field" | "pl2-field" | "dirichlet-prob" | "jm-prob"
            )
        }) {
            return Err(Error::invalid(
                operator,
                "children",
                format!("'{}' is not a field component", c.operator),
            ));
        }

        // mixture weights are renormalized to sum to one
        let mixture: Option<Vec<f64>> = (operator == "prms").then(|| {
            let mut weights: Vec<f64> = q.children.iter().map(|c| c.params.f64_or("weight", 1.0)).collect();
            super::normalize_weights(&mut weights);
            weights
        });

        let mut components = Vec::with_capacity(q.children.len());
        let mut field_stats = Vec::with_capacity(q.children.len());
        for (i, child) in q.children.iter().enumerate() {
            let weight = mixture.as_ref().map(|w| w[i]);
            let (component, stats) = self.component(child, weight)?;
            components.push(Box::new(component));
            field_stats.push(stats);
        }

        let mut params = q.params.clone();
        params.merge_missing(&merged_statistics(&field_stats));
        match operator {
            "bm25f" => FieldCombinationIterator::bm25f(&params, components),
            "pl2f" => FieldCombinationIterator::pl2f(&params, components),
            "prms" => FieldCombinationIterator::prms(components),
            other => Err(Error::UnknownOperator(other.to_string())),
        }
    }

    // ── Combination ──────────────────────────────────────────────────────

    fn combine(&self, q: &QueryNode, root: bool) -> Result<Node> {
        non_empty(q)?;
        let weights = resolve_weights("combine", &q.params, q.children.len())?;
        if root && self.config.processing == ProcessingModel::MaxScore {
            if self.config.passage.is_some() {
                debug!("combine: passage evaluation scores every window, MaxScore disabled");
            } else if let Some(w) = weights.iter().find(|w| **w < 0.0) {
                debug!("combine: negative weight {} cannot be delta-scored, using the plain sum", w);
            } else {
                return self.max_score(q, weights);
            }
        }
        let children = self.score_children(q)?;
        Ok(Node::Scores(Box::new(WeightedSum::new(
            children,
            weights,
            q.params.bool_or("print", false),
        ))))
    }

    fn max_score(&self, q: &QueryNode, weights: Vec<f64>) -> Result<Node> {
        let mut groups = Vec::with_capacity(q.children.len());
        for (child, weight) in q.children.iter().zip(weights) {
            let group = match child.operator.as_str() {
                "bm25f" | "pl2f" | "prms" => self.field_combination(child)?.into_group(),
                _ => DeltaGroup::independent(self.build_node(child, false)?.into_scores()?),
            };
            groups.push((weight, group));
        }
        // aggressive movement needs exclusive ownership of the children
        let movement = if self.config.share_nodes {
            MovementPolicy::Lazy
        } else {
            self.config.movement
        };
        Ok(Node::Scores(Box::new(MaxScoreCombination::new(
            groups,
            self.config.requested,
            self.config.ordering,
            movement,
        )?)))
    }

    // ── Filters ──────────────────────────────────────────────────────────

    fn filter(&self, q: &QueryNode, mode: FilterMode) -> Result<Node> {
        let [condition, body] = q.children.as_slice() else {
            return Err(Error::invalid(
                mode.as_str(),
                "children",
                format!("expected [condition, body], got {} children", q.children.len()),
            ));
        };
        let condition = self.build_node(condition, false)?.into_indicator()?;
        let shared = self.config.share_nodes;
        Ok(match self.build_node(body, false)? {
            Node::Extents(b) => Node::Extents(Box::new(FilteredIterator::new(mode, condition, b, shared))),
            Node::Counts(b) => Node::Counts(Box::new(FilteredIterator::new(mode, condition, b, shared))),
            Node::Indicator(b) => {
                Node::Indicator(Box::new(FilteredIterator::new(mode, condition, b, shared)))
            }
            Node::Scores(b) => Node::Scores(Box::new(FilteredIterator::new(mode, condition, b, shared))),
            Node::Lengths(b) => Node::Lengths(Box::new(FilteredIterator::new(mode, condition, b, shared))),
            Node::Statistic(b) => Node::Scores(Box::new(FilteredIterator::new(mode, condition, b, shared))),
        })
    }
}
