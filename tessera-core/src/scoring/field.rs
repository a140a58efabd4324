//! Field-combined models: BM25F, PL2F and probabilistic field mixtures
//!
//! Each field contributes a [`FieldComponent`] producing a weighted
//! statistic. The combination sums them and applies a shared transform:
//!
//! - `bm25f`: `x_f = w_f·c_f / (1 - b_f + b_f·l_f/avg_f)`, score `idf·x/(K + x)`
//! - `pl2f`: `x_f = w_f·tfn_f`, score PL2 at `x`
//! - `prms`: `x_f = w_f·P_f` (`dirichlet-prob` or `jm-prob`), score `ln x`
//!
//! The same components are the delta slots of the MaxScore engine, which is
//! why a combination can be taken apart with [`FieldCombinationIterator::into_group`].

use std::sync::Arc;

use log::debug;

use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::params::NodeParameters;
use crate::prune::{
    Bm25Saturation, DeltaGroup, DeltaScoringIterator, GroupBounds, Log, Pl2Transform,
    PotentialTransform,
};
use crate::query::{Disjunction, delegate_movement};
use crate::{DocId, Score};

use super::bm25::average_length;
use super::dfr::dfr_c;
use super::dirichlet::{dirichlet_mu, dirichlet_probability};
use super::jelinek_mercer::{jm_lambda, jm_probability};
use super::{
    Annotation, BM25_B, BM25_K1, CollectionStatistics, CountIterator, DocIterator, LengthsIterator,
    Pl2Curve, ScoreIterator, bm25_idf, tfn,
};

// ── Per-field statistic ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldStatisticKind {
    Bm25 { weight: f64, b: f64, avg_length: f64 },
    Pl2 { weight: f64, c: f64, avg_length: f64 },
    DirichletProb { weight: f64, mu: f64, background: f64 },
    JmProb { weight: f64, lambda: f64, background: f64 },
}

impl FieldStatisticKind {
    /// Operator names: `bm25-field`, `pl2-field`, `dirichlet-prob`, `jm-prob`
    pub fn from_params(
        operator: &str,
        params: &NodeParameters,
        stats: &CollectionStatistics,
    ) -> Result<Self> {
        let weight = params.f64_or("weight", 1.0);
        if !(weight >= 0.0 && weight.is_finite()) {
            return Err(Error::invalid(
                operator,
                "weight",
                format!("must be non-negative, got {}", weight),
            ));
        }
        match operator {
            "bm25-field" => {
                let b = params.f64_or("b", BM25_B);
                if !(0.0..=1.0).contains(&b) {
                    return Err(Error::invalid(operator, "b", format!("must be in [0, 1], got {}", b)));
                }
                Ok(Self::Bm25 {
                    weight,
                    b,
                    avg_length: average_length(stats),
                })
            }
            "pl2-field" => Ok(Self::Pl2 {
                weight,
                c: dfr_c(operator, params)?,
                avg_length: average_length(stats),
            }),
            "dirichlet-prob" => Ok(Self::DirichletProb {
                weight,
                mu: dirichlet_mu(operator, params)?,
                background: stats.background_probability(operator)?,
            }),
            "jm-prob" => Ok(Self::JmProb {
                weight,
                lambda: jm_lambda(operator, params)?,
                background: stats.background_probability(operator)?,
            }),
            other => Err(Error::UnknownOperator(other.to_string())),
        }
    }

    pub fn statistic(&self, count: u32, length: u64) -> f64 {
        let c = f64::from(count);
        let l = length as f64;
        match *self {
            Self::Bm25 {
                weight,
                b,
                avg_length,
            } => {
                if count == 0 {
                    return 0.0;
                }
                weight * c / (1.0 - b + b * l / avg_length)
            }
            Self::Pl2 {
                weight,
                c: c_param,
                avg_length,
            } => weight * tfn(c, l, c_param, avg_length),
            Self::DirichletProb {
                weight,
                mu,
                background,
            } => weight * dirichlet_probability(c, l, mu, background),
            Self::JmProb {
                weight,
                lambda,
                background,
            } => weight * jm_probability(c, l, lambda, background),
        }
    }

    pub fn weight(&self) -> f64 {
        match *self {
            Self::Bm25 { weight, .. }
            | Self::Pl2 { weight, .. }
            | Self::DirichletProb { weight, .. }
            | Self::JmProb { weight, .. } => weight,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bm25 { .. } => "bm25-field",
            Self::Pl2 { .. } => "pl2-field",
            Self::DirichletProb { .. } => "dirichlet-prob",
            Self::JmProb { .. } => "jm-prob",
        }
    }

    fn is_probability(&self) -> bool {
        matches!(self, Self::DirichletProb { .. } | Self::JmProb { .. })
    }

    fn parameters(&self) -> String {
        match *self {
            Self::Bm25 { weight, b, .. } => format!("weight={},b={}", weight, b),
            Self::Pl2 { weight, c, .. } => format!("weight={},c={}", weight, c),
            Self::DirichletProb { weight, mu, .. } => format!("weight={},mu={}", weight, mu),
            Self::JmProb { weight, lambda, .. } => format!("weight={},lambda={}", weight, lambda),
        }
    }
}

// ── Component ────────────────────────────────────────────────────────────

/// One field of a combined model: counts and lengths in that field
pub struct FieldComponent {
    counts: Box<dyn CountIterator>,
    lengths: Box<dyn LengthsIterator>,
    kind: FieldStatisticKind,
    max: f64,
    min: f64,
    min_positive: f64,
    background_max: f64,
}

impl FieldComponent {
    pub fn new(
        counts: Box<dyn CountIterator>,
        lengths: Box<dyn LengthsIterator>,
        kind: FieldStatisticKind,
        stats: &CollectionStatistics,
    ) -> Self {
        // every statistic grows with count and shrinks with length
        let m = stats.maximum_count;
        let top = u32::try_from(m).unwrap_or(u32::MAX);
        let min = kind.statistic(0, stats.max_length);
        let min_positive = if m > 0 {
            kind.statistic(1, stats.max_length.max(1))
        } else {
            min
        };
        Self {
            counts,
            lengths,
            kind,
            max: kind.statistic(top, stats.shortest_length(m)),
            min,
            min_positive,
            background_max: kind.statistic(0, stats.min_length),
        }
    }

    pub fn from_params(
        operator: &str,
        params: &NodeParameters,
        counts: Box<dyn CountIterator>,
        lengths: Box<dyn LengthsIterator>,
    ) -> Result<Self> {
        let stats = CollectionStatistics::from_params(operator, params)?;
        let kind = FieldStatisticKind::from_params(operator, params, &stats)?;
        Ok(Self::new(counts, lengths, kind, &stats))
    }

    pub fn kind(&self) -> &FieldStatisticKind {
        &self.kind
    }

    fn current(&mut self, ctx: &ScoringContext) -> f64 {
        let count = self.counts.count(ctx);
        let length = self.lengths.length(ctx);
        self.kind.statistic(count, length)
    }
}

impl DocIterator for FieldComponent {
    #[inline]
    fn doc(&self) -> DocId {
        self.counts.doc()
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        self.lengths.sync_to(target);
        self.counts.sync_to(target)
    }

    fn move_past(&mut self, id: DocId) -> DocId {
        self.counts.move_past(id)
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.counts.has_match(ctx)
    }

    fn has_all_candidates(&self) -> bool {
        self.counts.has_all_candidates()
    }

    fn reset(&mut self) {
        self.counts.reset();
        self.lengths.reset();
    }

    fn total_entries(&self) -> u64 {
        self.counts.total_entries()
    }

    fn operator(&self) -> &str {
        self.kind.name()
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = self.current(ctx);
        Annotation::new(self.kind.name(), self.doc(), matched)
            .with_parameters(self.kind.parameters())
            .with_value(value)
            .with_children(vec![self.counts.annotate(ctx), self.lengths.annotate(ctx)])
    }
}

impl DeltaScoringIterator for FieldComponent {
    fn max_statistic(&self) -> f64 {
        self.max
    }

    fn min_statistic(&self) -> f64 {
        self.min
    }

    fn min_positive_statistic(&self) -> f64 {
        self.min_positive
    }

    fn background_max_statistic(&self) -> f64 {
        self.background_max
    }

    fn statistic(&mut self, ctx: &ScoringContext) -> Result<f64> {
        Ok(self.current(ctx))
    }
}

/// A component on its own scores its statistic (`dirichlet-prob` as a plain
/// probability, for instance).
impl ScoreIterator for FieldComponent {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        Ok(self.current(ctx))
    }

    fn max_score(&self) -> Score {
        self.max
    }

    fn min_score(&self) -> Score {
        self.min
    }

    fn background_max(&self) -> Score {
        self.background_max
    }
}

// ── Combination ──────────────────────────────────────────────────────────

pub struct FieldCombinationIterator {
    operator: &'static str,
    base: Disjunction<dyn DeltaScoringIterator>,
    transform: Arc<dyn PotentialTransform>,
    parameters: String,
    max: Score,
    min: Score,
    background_max: Score,
}

fn require_kinds(
    operator: &str,
    components: &[Box<FieldComponent>],
    accept: impl Fn(&FieldStatisticKind) -> bool,
) -> Result<()> {
    if components.is_empty() {
        return Err(Error::invalid(operator, "children", "needs at least one field"));
    }
    match components.iter().find(|c| !accept(c.kind())) {
        Some(c) => Err(Error::invalid(
            operator,
            "children",
            format!("unexpected {} component", c.kind().name()),
        )),
        None => Ok(()),
    }
}

impl FieldCombinationIterator {
    pub fn new(
        operator: &'static str,
        transform: Arc<dyn PotentialTransform>,
        components: Vec<Box<dyn DeltaScoringIterator>>,
        parameters: String,
    ) -> Self {
        let bounds = GroupBounds::of(&components);
        let max = bounds.max_score(transform.as_ref());
        let min = bounds.min_score(transform.as_ref());
        let background_max = bounds.background_max(transform.as_ref());
        debug!(
            "{}: {} fields, transform={}, bounds=[{:.4}, {:.4}], background_max={:.4}",
            operator,
            components.len(),
            transform.name(),
            min,
            max,
            background_max
        );
        Self {
            operator,
            base: Disjunction::new(components),
            transform,
            parameters,
            max,
            min,
            background_max,
        }
    }

    /// `idf·x/(K + x)`; `idf` from `nodeDocumentCount` and `documentCount`
    pub fn bm25f(params: &NodeParameters, components: Vec<Box<FieldComponent>>) -> Result<Self> {
        require_kinds("bm25f", &components, |k| matches!(k, FieldStatisticKind::Bm25 { .. }))?;
        let k = params.f64_or("k", BM25_K1);
        if !(k > 0.0 && k.is_finite()) {
            return Err(Error::invalid("bm25f", "k", format!("must be positive, got {}", k)));
        }
        let df = params.require_f64("bm25f", "nodeDocumentCount")?;
        let n = params.require_f64("bm25f", "documentCount")?;
        let idf = bm25_idf(df, n);
        Ok(Self::new(
            "bm25f",
            Arc::new(Bm25Saturation { idf, k }),
            components.into_iter().map(|c| c as Box<dyn DeltaScoringIterator>).collect(),
            format!("k={},idf={:.4}", k, idf),
        ))
    }

    /// PL2 with `λ = cf/N` over the weighted sum of per-field `tfn`
    pub fn pl2f(params: &NodeParameters, components: Vec<Box<FieldComponent>>) -> Result<Self> {
        require_kinds("pl2f", &components, |k| matches!(k, FieldStatisticKind::Pl2 { .. }))?;
        let stats = CollectionStatistics::from_params("pl2f", params)?;
        let curve = Pl2Curve::from_stats("pl2f", &stats)?;
        Ok(Self::new(
            "pl2f",
            Arc::new(Pl2Transform::new(curve)),
            components.into_iter().map(|c| c as Box<dyn DeltaScoringIterator>).collect(),
            format!("lambda={:.4e}", curve.lambda()),
        ))
    }

    /// `ln Σ w_f·P_f`; the weights are expected to sum to 1
    pub fn prms(components: Vec<Box<FieldComponent>>) -> Result<Self> {
        require_kinds("prms", &components, FieldStatisticKind::is_probability)?;
        let total: f64 = components.iter().map(|c| c.kind().weight()).sum();
        if total <= 0.0 {
            return Err(Error::invalid("prms", "weight", "field weights sum to zero"));
        }
        Ok(Self::new(
            "prms",
            Arc::new(Log),
            components.into_iter().map(|c| c as Box<dyn DeltaScoringIterator>).collect(),
            format!("fields={}", total),
        ))
    }

    pub fn transform(&self) -> &Arc<dyn PotentialTransform> {
        &self.transform
    }

    /// Hands the components to a MaxScore slot
    pub fn into_group(self) -> DeltaGroup {
        DeltaGroup::new(self.transform, self.base.into_children())
    }

    fn total(&mut self, ctx: &ScoringContext) -> Result<f64> {
        let mut total = 0.0;
        for child in self.base.children_mut() {
            total += child.statistic(ctx)?;
        }
        Ok(total)
    }
}

impl DocIterator for FieldCombinationIterator {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx)
    }

    fn operator(&self) -> &str {
        self.operator
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = match self.score(ctx) {
            Ok(s) => s.to_string(),
            Err(e) => e.to_string(),
        };
        Annotation::new(self.operator, self.doc(), matched)
            .with_parameters(self.parameters.clone())
            .with_value(value)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl ScoreIterator for FieldCombinationIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let total = self.total(ctx)?;
        Ok(self.transform.apply(total))
    }

    fn max_score(&self) -> Score {
        self.max
    }

    fn min_score(&self) -> Score {
        self.min
    }

    fn background_max(&self) -> Score {
        self.background_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::test_support::{lengths, term};

    fn field_stats() -> NodeParameters {
        NodeParameters::new()
            .with("collectionLength", 40i64)
            .with("documentCount", 4i64)
            .with("nodeFrequency", 5i64)
            .with("nodeDocumentCount", 2i64)
            .with("maximumCount", 3i64)
            .with("maxLength", 20i64)
            .with("minLength", 4i64)
    }

    fn component(operator: &str, params: NodeParameters) -> Box<FieldComponent> {
        let counts = Box::new(term(&[(0, vec![1, 3, 5]), (2, vec![0, 2])]));
        let lens = Box::new(lengths(&[10, 4, 20, 6]));
        Box::new(FieldComponent::from_params(operator, &params, counts, lens).unwrap())
    }

    fn scores(it: &mut FieldCombinationIterator) -> Vec<(DocId, Score)> {
        let mut ctx = ScoringContext::new();
        let mut out = Vec::new();
        for doc in 0..4 {
            ctx.set_document(doc);
            it.sync_to(doc);
            out.push((doc, it.score(&ctx).unwrap()));
        }
        out
    }

    #[test]
    fn test_bm25f_formula() {
        let a = component("bm25-field", field_stats().with("weight", 2.0).with("b", 0.5));
        let b = component("bm25-field", field_stats().with("weight", 1.0).with("b", 0.0));
        let params = field_stats().with("k", 1.5);
        let mut it = FieldCombinationIterator::bm25f(&params, vec![a, b]).unwrap();
        let idf = bm25_idf(2.0, 4.0);
        // doc 0: c=3, l=10, avg=10
        let x = 2.0 * 3.0 / (1.0 - 0.5 + 0.5 * 10.0 / 10.0) + 3.0;
        let got = scores(&mut it);
        assert!((got[0].1 - idf * x / (1.5 + x)).abs() < 1e-12);
        assert_eq!(got[1].1, 0.0);
        for (_, s) in got {
            assert!(s <= it.max_score() + 1e-12);
            assert!(s >= it.min_score() - 1e-12);
        }
    }

    #[test]
    fn test_prms_is_log_of_mixture() {
        let a = component("dirichlet-prob", field_stats().with("weight", 0.25).with("mu", 10.0));
        let b = component("jm-prob", field_stats().with("weight", 0.75).with("lambda", 0.4));
        let mut it = FieldCombinationIterator::prms(vec![a, b]).unwrap();
        let p: f64 = 5.0 / 40.0;
        let expected =
            (0.25 * (3.0 + 10.0 * p) / (10.0 + 10.0) + 0.75 * (0.6 * 3.0 / 10.0 + 0.4 * p)).ln();
        let got = scores(&mut it);
        assert!((got[0].1 - expected).abs() < 1e-12);
        // documents without the term are still smoothed
        assert!(got[1].1.is_finite());
        for (_, s) in got {
            assert!(s <= it.max_score() + 1e-12);
            assert!(s >= it.min_score() - 1e-12);
        }
    }

    #[test]
    fn test_pl2f_bounds_hold() {
        let a = component("pl2-field", field_stats().with("weight", 1.0));
        let b = component("pl2-field", field_stats().with("weight", 0.5).with("c", 2.0));
        let mut it = FieldCombinationIterator::pl2f(&field_stats(), vec![a, b]).unwrap();
        let got = scores(&mut it);
        assert_eq!(got[1].1, 0.0);
        for (_, s) in got {
            assert!(s <= it.max_score() + 1e-9);
            assert!(s >= it.min_score() - 1e-9);
        }
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let a = component("pl2-field", field_stats());
        assert!(FieldCombinationIterator::bm25f(&field_stats(), vec![a]).is_err());
        assert!(FieldCombinationIterator::prms(Vec::new()).is_err());
    }

    #[test]
    fn test_into_group_keeps_bounds() {
        let a = component("bm25-field", field_stats());
        let it = FieldCombinationIterator::bm25f(&field_stats(), vec![a]).unwrap();
        let max = it.max_score();
        let group = it.into_group();
        let bounds = group.bounds();
        assert!((bounds.max_score(group.transform.as_ref()) - max).abs() < 1e-12);
    }
}
