//! Jelinek-Mercer smoothed query likelihood
//!
//! `ln((1 - λ)·c/l + λ·P(t|C))`; `c/l` is taken as 0 for empty documents.

use crate::Score;
use crate::error::{Error, Result};
use crate::params::NodeParameters;

use super::{CollectionStatistics, MonotoneBounds, ScoringFunction};

pub const DEFAULT_LAMBDA: f64 = 0.5;

pub(crate) fn jm_lambda(operator: &str, params: &NodeParameters) -> Result<f64> {
    let lambda = params.f64_or("lambda", DEFAULT_LAMBDA);
    if !(lambda > 0.0 && lambda <= 1.0) {
        return Err(Error::invalid(
            operator,
            "lambda",
            format!("must be in (0, 1], got {}", lambda),
        ));
    }
    Ok(lambda)
}

/// Mixture probability `(1 - λ)·c/l + λP`
#[inline]
pub(crate) fn jm_probability(count: f64, length: f64, lambda: f64, background: f64) -> f64 {
    let foreground = if length > 0.0 { count / length } else { 0.0 };
    (1.0 - lambda) * foreground + lambda * background
}

#[derive(Debug, Clone)]
pub struct JelinekMercerScorer {
    lambda: f64,
    background: f64,
    bounds: MonotoneBounds,
}

impl JelinekMercerScorer {
    pub fn from_params(params: &NodeParameters) -> Result<Self> {
        let lambda = jm_lambda("jm", params)?;
        let stats = CollectionStatistics::from_params("jm", params)?;
        Self::new(lambda, &stats)
    }

    pub fn new(lambda: f64, stats: &CollectionStatistics) -> Result<Self> {
        let background = stats.background_probability("jm")?;
        let bounds = MonotoneBounds::compute(stats, |c, l| {
            jm_probability(f64::from(c), l as f64, lambda, background).ln()
        });
        Ok(Self {
            lambda,
            background,
            bounds,
        })
    }
}

impl ScoringFunction for JelinekMercerScorer {
    #[inline]
    fn score(&self, count: u32, length: u64) -> Score {
        jm_probability(f64::from(count), length as f64, self.lambda, self.background).ln()
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
        "jm"
    }

    fn parameters(&self) -> String {
        format!("lambda={},p={:.3e}", self.lambda, self.background)
    }
}
