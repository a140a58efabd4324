//! Divergence from randomness: PL2 and InL2 (base 2)
//!
//! Both use normalization 2, `tfn = c·log₂(1 + cParam·avgLength/l)`.
//!
//! PL2 is not monotone in `tfn`. With `h(t)` the PL2 value at `tfn = t`,
//! `h'(t)` has the sign of
//!
//! `k(t) = ½ln t + t + ½/t + ½ - ½ln(2π) - ln λ - λ`
//!
//! which is convex with its minimum at `t = ½`. So `h` rises, falls between
//! the two roots of `k` (if `k(½) < 0`), then rises again. Bounds over an
//! interval only need the endpoints and those two critical points.

use std::f64::consts::{LOG2_E, PI};

use crate::Score;
use crate::error::{Error, Result};
use crate::params::NodeParameters;

use super::bm25::average_length;
use super::{CollectionStatistics, ScoringFunction};

pub const DEFAULT_C: f64 = 1.0;

/// Normalization 2
#[inline]
pub fn tfn(count: f64, length: f64, c: f64, avg_length: f64) -> f64 {
    if count <= 0.0 {
        return 0.0;
    }
    count * (1.0 + c * avg_length / length.max(1.0)).log2()
}

pub(crate) fn dfr_c(operator: &str, params: &NodeParameters) -> Result<f64> {
    let c = params.f64_or("c", DEFAULT_C);
    if !(c > 0.0 && c.is_finite()) {
        return Err(Error::invalid(operator, "c", format!("must be positive, got {}", c)));
    }
    Ok(c)
}

/// Range of positive `tfn` values: `(tfn(1, maxLength), tfn(M, shortest))`,
/// or `None` when no document can contain the node.
pub(crate) fn positive_tfn_range(stats: &CollectionStatistics, c: f64) -> Option<(f64, f64)> {
    if stats.maximum_count == 0 {
        return None;
    }
    let avg = average_length(stats);
    let m = stats.maximum_count;
    let lo = tfn(1.0, stats.max_length.max(1) as f64, c, avg);
    let hi = tfn(m as f64, stats.shortest_length(m) as f64, c, avg);
    Some((lo.min(hi), hi))
}

// ── PL2 curve ────────────────────────────────────────────────────────────

/// `h(t)`, the PL2 value as a function of normalized frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pl2Curve {
    lambda: f64,
    /// Local maximum and local minimum of `h`, if it has any
    critical: Option<(f64, f64)>,
}

impl Pl2Curve {
    pub fn new(lambda: f64) -> Self {
        let mut curve = Self {
            lambda,
            critical: None,
        };
        if curve.slope_sign(0.5) < 0.0 {
            let left = curve.root(0.5, true);
            let right = curve.root(0.5, false);
            curve.critical = Some((left, right));
        }
        curve
    }

    /// From collection statistics: `λ = cf/N`, with half an occurrence for unseen nodes
    pub fn from_stats(operator: &str, stats: &CollectionStatistics) -> Result<Self> {
        if stats.document_count <= 0.0 {
            return Err(Error::invalid(operator, "documentCount", "must be positive"));
        }
        let cf = if stats.node_frequency > 0.0 {
            stats.node_frequency
        } else {
            0.5
        };
        Ok(Self::new(cf / stats.document_count))
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// End of the first rising branch: the local maximum, or infinity when
    /// `h` increases everywhere
    pub fn rising_until(&self) -> f64 {
        self.critical.map_or(f64::INFINITY, |(peak, _)| peak)
    }

    /// `h(t)`; zero at `t = 0`
    #[inline]
    pub fn value(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let l = self.lambda;
        (t * (t / l).log2() + (l - t) * LOG2_E + 0.5 * (2.0 * PI * t).log2()) / (t + 1.0)
    }

    /// `k(t)`, which has the sign of `h'(t)`
    fn slope_sign(&self, t: f64) -> f64 {
        0.5 * t.ln() + t + 0.5 / t + 0.5 - 0.5 * (2.0 * PI).ln() - self.lambda.ln() - self.lambda
    }

    /// Bisection for the root of `k` left or right of `pivot` (where `k < 0`)
    fn root(&self, pivot: f64, left: bool) -> f64 {
        // bracket: k(pivot) < 0, find the other side with k > 0
        let mut outer = pivot;
        for _ in 0..200 {
            outer = if left { outer * 0.5 } else { outer * 2.0 };
            if self.slope_sign(outer) > 0.0 {
                break;
            }
        }
        let (mut neg, mut pos) = (pivot, outer);
        for _ in 0..200 {
            let mid = 0.5 * (neg + pos);
            if self.slope_sign(mid) < 0.0 {
                neg = mid;
            } else {
                pos = mid;
            }
            if (pos - neg).abs() <= 1e-12 * mid.abs().max(1e-300) {
                break;
            }
        }
        0.5 * (neg + pos)
    }

    fn candidates(&self, lo: f64, hi: f64) -> impl Iterator<Item = f64> {
        let interior = self
            .critical
            .map(|(a, b)| [a, b])
            .unwrap_or([f64::NAN, f64::NAN]);
        [lo, hi]
            .into_iter()
            .chain(interior.into_iter().filter(move |t| *t > lo && *t < hi))
    }

    /// Supremum of `h` over `[lo, hi]`
    pub fn sup(&self, lo: f64, hi: f64) -> f64 {
        self.candidates(lo, hi)
            .map(|t| self.value(t))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Infimum of `h` over `[lo, hi]`; `lo` should be positive
    pub fn inf(&self, lo: f64, hi: f64) -> f64 {
        self.candidates(lo, hi)
            .map(|t| self.value(t))
            .fold(f64::INFINITY, f64::min)
    }
}

// ── PL2 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pl2Scorer {
    c: f64,
    avg_length: f64,
    curve: Pl2Curve,
    max: Score,
    min: Score,
}

impl Pl2Scorer {
    pub fn from_params(params: &NodeParameters) -> Result<Self> {
        let c = dfr_c("pl2", params)?;
        let stats = CollectionStatistics::from_params("pl2", params)?;
        Self::new(c, &stats)
    }

    pub fn new(c: f64, stats: &CollectionStatistics) -> Result<Self> {
        let curve = Pl2Curve::from_stats("pl2", stats)?;
        let (max, min) = match positive_tfn_range(stats, c) {
            Some((lo, hi)) => (curve.sup(lo, hi).max(0.0), curve.inf(lo, hi).min(0.0)),
            None => (0.0, 0.0),
        };
        Ok(Self {
            c,
            avg_length: average_length(stats),
            curve,
            max,
            min,
        })
    }
}

impl ScoringFunction for Pl2Scorer {
    #[inline]
    fn score(&self, count: u32, length: u64) -> Score {
        self.curve
            .value(tfn(f64::from(count), length as f64, self.c, self.avg_length))
    }

    fn max_score(&self) -> Score {
        self.max
    }

    fn min_score(&self) -> Score {
        self.min
    }

    fn background_max(&self) -> Score {
        0.0
    }

    fn name(&self) -> &'static str {
        "pl2"
    }

    fn parameters(&self) -> String {
        format!("c={},lambda={:.4e}", self.c, self.curve.lambda())
    }
}

// ── InL2 ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct InL2Scorer {
    c: f64,
    avg_length: f64,
    idf: f64,
    max: Score,
    min: Score,
}

impl InL2Scorer {
    pub fn from_params(params: &NodeParameters) -> Result<Self> {
        let c = dfr_c("inl2", params)?;
        let stats = CollectionStatistics::from_params("inl2", params)?;
        Ok(Self::new(c, &stats))
    }

    pub fn new(c: f64, stats: &CollectionStatistics) -> Self {
        let idf = ((stats.document_count + 1.0) / (stats.node_document_count + 0.5)).log2();
        let top = positive_tfn_range(stats, c)
            .map(|(_, hi)| hi / (hi + 1.0) * idf)
            .unwrap_or(0.0);
        Self {
            c,
            avg_length: average_length(stats),
            idf,
            max: top.max(0.0),
            min: top.min(0.0),
        }
    }
}

impl ScoringFunction for InL2Scorer {
    #[inline]
    fn score(&self, count: u32, length: u64) -> Score {
        let t = tfn(f64::from(count), length as f64, self.c, self.avg_length);
        t / (t + 1.0) * self.idf
    }

    fn max_score(&self) -> Score {
        self.max
    }

    fn min_score(&self) -> Score {
        self.min
    }

    fn background_max(&self) -> Score {
        0.0
    }

    fn name(&self) -> &'static str {
        "inl2"
    }

    fn parameters(&self) -> String {
        format!("c={},idf={:.4}", self.c, self.idf)
    }
}
