//! Score combinations: `combine` (weighted sum) and `wsum` (log-domain)
//!
//! Child weights are read from the numbered parameters `"0"`, `"1"`, ...
//! and default to 1.0. With `norm` (the default) they are rescaled to sum
//! to one.

use log::{info, warn};

use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::params::NodeParameters;
use crate::Score;

use super::annotation::Annotation;
use super::disjunction::Disjunction;
use super::traits::{DocIterator, ScoreIterator, delegate_movement};

/// Weights for `n` children from the numbered parameters
pub fn child_weights(params: &NodeParameters, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| params.f64_or(&i.to_string(), 1.0))
        .collect()
}

/// Rescales `weights` in place to sum to one. Returns false (weights
/// untouched) when the sum is not positive.
pub fn normalize_weights(weights: &mut [f64]) -> bool {
    let sum: f64 = weights.iter().sum();
    if !(sum > 0.0) || !sum.is_finite() {
        return false;
    }
    for w in weights.iter_mut() {
        *w /= sum;
    }
    true
}

/// `child_weights`, normalized unless `norm=false`
pub fn resolve_weights(operator: &str, params: &NodeParameters, n: usize) -> Result<Vec<f64>> {
    let mut weights = child_weights(params, n);
    if let Some(bad) = weights.iter().position(|w| !w.is_finite()) {
        return Err(Error::invalid(operator, &bad.to_string(), "weight must be finite"));
    }
    if params.bool_or("norm", true) && !normalize_weights(&mut weights) {
        warn!(
            "{}: weights sum to {} (not positive), using them unnormalized",
            operator,
            weights.iter().sum::<f64>()
        );
    }
    Ok(weights)
}

fn describe_weights(weights: &[f64]) -> String {
    weights
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

// ── combine ──────────────────────────────────────────────────────────────

/// `Σ wᵢ·scoreᵢ` over a disjunction of scorers
pub struct WeightedSum {
    base: Disjunction<dyn ScoreIterator>,
    weights: Vec<f64>,
    print: bool,
    max: Score,
    min: Score,
    background_max: Score,
}

impl WeightedSum {
    pub fn new(children: Vec<Box<dyn ScoreIterator>>, weights: Vec<f64>, print: bool) -> Self {
        debug_assert_eq!(children.len(), weights.len());
        let (mut max, mut min, mut background_max) = (0.0, 0.0, 0.0);
        for (child, &w) in children.iter().zip(&weights) {
            if w >= 0.0 {
                max += w * child.max_score();
                min += w * child.min_score();
                background_max += w * child.background_max();
            } else {
                max += w * child.min_score();
                min += w * child.max_score();
                background_max += w * child.min_score();
            }
        }
        Self {
            base: Disjunction::new(children),
            weights,
            print,
            max,
            min,
            background_max,
        }
    }

    pub fn from_params(params: &NodeParameters, children: Vec<Box<dyn ScoreIterator>>) -> Result<Self> {
        let weights = resolve_weights("combine", params, children.len())?;
        Ok(Self::new(children, weights, params.bool_or("print", false)))
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl DocIterator for WeightedSum {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "combine"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = match self.score(ctx) {
            Ok(s) => s.to_string(),
            Err(e) => e.to_string(),
        };
        Annotation::new("combine", self.doc(), matched)
            .with_parameters(format!("weights={}", describe_weights(&self.weights)))
            .with_value(value)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl ScoreIterator for WeightedSum {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let mut sum = 0.0;
        for (child, &w) in self.base.children_mut().iter_mut().zip(&self.weights) {
            sum += w * child.score(ctx)?;
        }
        if self.print {
            info!("combine: doc {} score {}", ctx.document(), sum);
        }
        Ok(sum)
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

// ── wsum ─────────────────────────────────────────────────────────────────

/// `ln Σ wᵢ·exp(sᵢ)`, shifted by the largest term
fn log_sum_exp(weights: &[f64], scores: &[Score]) -> Score {
    let shift = weights
        .iter()
        .zip(scores)
        .filter(|&(&w, _)| w > 0.0)
        .map(|(_, &s)| s)
        .fold(Score::NEG_INFINITY, f64::max);
    if shift == Score::NEG_INFINITY {
        return Score::NEG_INFINITY;
    }
    if shift == Score::INFINITY {
        return Score::INFINITY;
    }
    let mut sum = 0.0;
    for (&w, &s) in weights.iter().zip(scores) {
        if w > 0.0 {
            sum += w * (s - shift).exp();
        }
    }
    shift + sum.ln()
}

/// Log-domain weighted mixture of log-probability scorers
pub struct LogWeightedSum {
    base: Disjunction<dyn ScoreIterator>,
    weights: Vec<f64>,
    scores: Vec<Score>,
    max: Score,
    min: Score,
    background_max: Score,
}

impl LogWeightedSum {
    /// Weights must be non-negative
    pub fn new(children: Vec<Box<dyn ScoreIterator>>, weights: Vec<f64>) -> Result<Self> {
        if let Some(bad) = weights.iter().position(|&w| w < 0.0) {
            return Err(Error::invalid(
                "wsum",
                &bad.to_string(),
                format!("log-domain weights must be non-negative, got {}", weights[bad]),
            ));
        }
        let bound = |f: fn(&dyn ScoreIterator) -> Score| -> Score {
            let values: Vec<Score> = children.iter().map(|c| f(c.as_ref())).collect();
            log_sum_exp(&weights, &values)
        };
        let max = bound(|c| c.max_score());
        let min = bound(|c| c.min_score());
        let background_max = bound(|c| c.background_max());
        let n = children.len();
        Ok(Self {
            base: Disjunction::new(children),
            weights,
            scores: vec![0.0; n],
            max,
            min,
            background_max,
        })
    }

    pub fn from_params(params: &NodeParameters, children: Vec<Box<dyn ScoreIterator>>) -> Result<Self> {
        let weights = resolve_weights("wsum", params, children.len())?;
        Self::new(children, weights)
    }
}

impl DocIterator for LogWeightedSum {
    delegate_movement!(base);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.base.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "wsum"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = match self.score(ctx) {
            Ok(s) => s.to_string(),
            Err(e) => e.to_string(),
        };
        Annotation::new("wsum", self.doc(), matched)
            .with_parameters(format!("weights={}", describe_weights(&self.weights)))
            .with_value(value)
            .with_children(self.base.annotate_children(ctx))
    }
}

impl ScoreIterator for LogWeightedSum {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        for (slot, child) in self.scores.iter_mut().zip(self.base.children_mut()) {
            *slot = child.score(ctx)?;
        }
        Ok(log_sum_exp(&self.weights, &self.scores))
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
    use std::sync::Arc;

    use super::*;
    use crate::query::leaf::PriorIterator;
    use crate::structures::DenseDocValues;

    fn prior(values: &[f64]) -> Box<dyn ScoreIterator> {
        let column = DenseDocValues::new(values.iter().map(|&v| Some(v)).collect());
        Box::new(PriorIterator::new("p", Arc::new(column), values[0], None))
    }

    #[test]
    fn test_normalize_weights() {
        let mut weights = vec![1.0, 1.0, 2.0];
        assert!(normalize_weights(&mut weights));
        let expected = [0.25, 0.25, 0.5];
        for (w, e) in weights.iter().zip(expected) {
            assert!((w - e).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_positive_sum_skips_normalization() {
        let params = NodeParameters::new().with("0", 1.0).with("1", -1.0);
        let weights = resolve_weights("combine", &params, 2).unwrap();
        assert_eq!(weights, vec![1.0, -1.0]);
    }

    #[test]
    fn test_weighted_sum() {
        let params = NodeParameters::new().with("0", 1.0).with("1", 3.0);
        let mut sum = WeightedSum::from_params(&params, vec![prior(&[2.0, 0.0]), prior(&[4.0, 8.0])])
            .unwrap();
        assert_eq!(sum.weights(), &[0.25, 0.75]);
        let mut ctx = ScoringContext::new();
        ctx.set_document(1);
        sum.sync_to(1);
        assert!(sum.has_match(&ctx));
        assert!((sum.score(&ctx).unwrap() - 6.0).abs() < 1e-12);
        assert!((sum.max_score() - 6.5).abs() < 1e-12);
        assert!((sum.min_score() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unnormalized_negative_weight_bounds() {
        let params = NodeParameters::new().with("1", -1.0).with("norm", false);
        let sum = WeightedSum::from_params(&params, vec![prior(&[1.0, 2.0]), prior(&[0.0, 5.0])])
            .unwrap();
        assert_eq!(sum.max_score(), 2.0);
        assert_eq!(sum.min_score(), -4.0);
    }

    #[test]
    fn test_wsum_is_stable_in_log_space() {
        let mut wsum =
            LogWeightedSum::from_params(&NodeParameters::new(), vec![prior(&[-1000.0]), prior(&[-1000.0])])
                .unwrap();
        let mut ctx = ScoringContext::new();
        ctx.set_document(0);
        let s = wsum.score(&ctx).unwrap();
        assert!((s + 1000.0).abs() < 1e-9, "got {}", s);

        let mixed = log_sum_exp(&[0.5, 0.5], &[0.5f64.ln(), 0.25f64.ln()]);
        assert!((mixed - 0.375f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_wsum_rejects_negative_weights() {
        let params = NodeParameters::new().with("0", -1.0).with("norm", false);
        assert!(LogWeightedSum::from_params(&params, vec![prior(&[-1.0])]).is_err());
    }
}
