//! Dirichlet-smoothed query likelihood
//!
//! `ln((c + μ·P(t|C)) / (l + μ))`

use crate::Score;
use crate::error::{Error, Result};
use crate::params::NodeParameters;

use super::{CollectionStatistics, MonotoneBounds, ScoringFunction};

pub const DEFAULT_MU: f64 = 1500.0;

pub(crate) fn dirichlet_mu(operator: &str, params: &NodeParameters) -> Result<f64> {
    let mu = params.f64_or("mu", DEFAULT_MU);
    if !(mu > 0.0 && mu.is_finite()) {
        return Err(Error::invalid(operator, "mu", format!("must be positive, got {}", mu)));
    }
    Ok(mu)
}

/// Smoothed probability `(c + μP) / (l + μ)`
#[inline]
pub(crate) fn dirichlet_probability(count: f64, length: f64, mu: f64, background: f64) -> f64 {
    (count + mu * background) / (length + mu)
}

#[derive(Debug, Clone)]
pub struct DirichletScorer {
    mu: f64,
    background: f64,
    bounds: MonotoneBounds,
}

impl DirichletScorer {
    pub fn from_params(params: &NodeParameters) -> Result<Self> {
        let mu = dirichlet_mu("dirichlet", params)?;
        let stats = CollectionStatistics::from_params("dirichlet", params)?;
        Self::new(mu, &stats)
    }

    pub fn new(mu: f64, stats: &CollectionStatistics) -> Result<Self> {
        let background = stats.background_probability("dirichlet")?;
        let bounds = MonotoneBounds::compute(stats, |c, l| {
            dirichlet_probability(f64::from(c), l as f64, mu, background).ln()
        });
        Ok(Self {
            mu,
            background,
            bounds,
        })
    }
}

impl ScoringFunction for DirichletScorer {
    #[inline]
    fn score(&self, count: u32, length: u64) -> Score {
        dirichlet_probability(f64::from(count), length as f64, self.mu, self.background).ln()
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
        "dirichlet"
    }

    fn parameters(&self) -> String {
        format!("mu={},p={:.3e}", self.mu, self.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> NodeParameters {
        NodeParameters::new()
            .with("collectionLength", 10_000i64)
            .with("documentCount", 100i64)
            .with("nodeFrequency", 50i64)
            .with("nodeDocumentCount", 20i64)
            .with("maximumCount", 6i64)
            .with("minLength", 3i64)
            .with("maxLength", 400i64)
    }

    #[test]
    fn test_formula() {
        let s = DirichletScorer::from_params(&stats().with("mu", 100.0)).unwrap();
        let expected = ((2.0 + 100.0 * 0.005) / (50.0 + 100.0) as f64).ln();
        assert!((s.score(2, 50) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_mu() {
        assert!(DirichletScorer::from_params(&stats().with("mu", 0.0)).is_err());
        assert!(DirichletScorer::from_params(&stats().with("mu", -5.0)).is_err());
    }

    #[test]
    fn test_background_bound_between() {
        let s = DirichletScorer::from_params(&stats()).unwrap();
        assert!(s.min_score() <= s.background_max());
        assert!(s.background_max() <= s.max_score());
        assert!((s.background_max() - s.score(0, 3)).abs() < 1e-12);
        assert!((s.min_score() - s.score(0, 400)).abs() < 1e-12);
    }
}
