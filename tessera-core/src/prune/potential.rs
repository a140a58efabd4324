//! Potentials for delta scoring
//!
//! A combined score is `Σ_s w_s · T_s(x_s)` where each slot `s` sums the
//! statistics of its components (`x_s = Σ stat_i`) and `T_s` is the slot's
//! transform: identity for an independent scorer, BM25 saturation for BM25F,
//! the PL2 curve for PL2F, `ln` for a probabilistic field mixture.
//!
//! Before a document is scored every slot's potential `φ` sits at its
//! ceiling (the sum of component maxima). Resolving a component with its
//! actual statistic moves `φ` down to `ψ = φ - (max - actual)` and changes
//! the slot's upper bound by `w·(sup T(ψ) - sup T(φ))`. Once the summed bound
//! falls below the top-K threshold the document cannot enter the results.

use std::f64::consts::{LOG2_E, PI};
use std::fmt;
use std::sync::Arc;

use crate::context::ScoringContext;
use crate::query::{Annotation, DocIterator, ScoreIterator, delegate_movement};
use crate::scoring::Pl2Curve;
use crate::{Result, Score};

// ── Transforms ───────────────────────────────────────────────────────────

pub trait PotentialTransform: Send + Sync + fmt::Debug {
    fn apply(&self, x: f64) -> f64;

    /// Supremum over `[lo, hi]`
    fn sup(&self, lo: f64, hi: f64) -> f64 {
        let _ = lo;
        self.apply(hi)
    }

    /// Infimum over `[lo, hi]`
    fn inf(&self, lo: f64, hi: f64) -> f64 {
        let _ = hi;
        self.apply(lo)
    }

    /// Change of the slot bound when the potential moves from `phi` to `psi`
    fn change(&self, floor: f64, phi: f64, psi: f64) -> f64 {
        self.sup(floor, psi) - self.sup(floor, phi)
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PotentialTransform for Identity {
    #[inline]
    fn apply(&self, x: f64) -> f64 {
        x
    }

    #[inline]
    fn change(&self, _floor: f64, phi: f64, psi: f64) -> f64 {
        psi - phi
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// `ln x`, for probabilistic mixtures (always positive)
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

impl PotentialTransform for Log {
    #[inline]
    fn apply(&self, x: f64) -> f64 {
        x.ln()
    }

    #[inline]
    fn change(&self, _floor: f64, phi: f64, psi: f64) -> f64 {
        (psi / phi).ln()
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// `idf · x / (K + x)`
#[derive(Debug, Clone, Copy)]
pub struct Bm25Saturation {
    pub idf: f64,
    pub k: f64,
}

impl PotentialTransform for Bm25Saturation {
    #[inline]
    fn apply(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        self.idf * x / (self.k + x)
    }

    fn change(&self, _floor: f64, phi: f64, psi: f64) -> f64 {
        if psi <= 0.0 || phi <= 0.0 {
            return self.apply(psi) - self.apply(phi);
        }
        self.idf * self.k * (psi - phi) / ((self.k + psi) * (self.k + phi))
    }

    fn name(&self) -> &'static str {
        "bm25-saturation"
    }
}

/// PL2 applied to a summed normalized frequency
///
/// `h(t) = N(t)/(t + 1)` with `N(t) = t·(log₂t − β) + (λ − t)·log₂e + ½·log₂(2πt)`,
/// where `β = log₂λ` is fixed by the node's collection frequency.
#[derive(Debug, Clone, Copy)]
pub struct Pl2Transform {
    curve: Pl2Curve,
    beta: f64,
    /// `h` rises on `(0, peak]`
    peak: f64,
}

impl Pl2Transform {
    pub fn new(curve: Pl2Curve) -> Self {
        Self {
            curve,
            beta: curve.lambda().log2(),
            peak: curve.rising_until(),
        }
    }

    #[inline]
    fn numerator(&self, t: f64) -> f64 {
        t * (t.log2() - self.beta)
            + (self.curve.lambda() - t) * LOG2_E
            + 0.5 * (2.0 * PI * t).log2()
    }

    /// `h(ψ) − h(φ)` over the common denominator `(ψ + 1)(φ + 1)`
    #[inline]
    fn difference(&self, phi: f64, psi: f64) -> f64 {
        (self.numerator(psi) * (phi + 1.0) - self.numerator(phi) * (psi + 1.0))
            / ((psi + 1.0) * (phi + 1.0))
    }
}

impl PotentialTransform for Pl2Transform {
    #[inline]
    fn apply(&self, x: f64) -> f64 {
        self.curve.value(x)
    }

    fn sup(&self, lo: f64, hi: f64) -> f64 {
        self.curve.sup(lo, hi)
    }

    fn inf(&self, lo: f64, hi: f64) -> f64 {
        self.curve.inf(lo, hi)
    }

    /// On the first rising branch both suprema sit at the right end, so the
    /// change is `h(ψ) − h(φ)`, clipped at `h(0) = 0` when the floor is 0.
    /// Past the local maximum the suprema are taken explicitly.
    fn change(&self, floor: f64, phi: f64, psi: f64) -> f64 {
        if psi == phi {
            return 0.0;
        }
        if psi <= 0.0 || phi.max(psi) > self.peak {
            return self.sup(floor, psi) - self.sup(floor, phi);
        }
        let delta = self.difference(phi, psi);
        if floor > 0.0 {
            return delta;
        }
        let at_phi = self.curve.value(phi);
        let at_psi = at_phi + delta;
        at_psi.max(0.0) - at_phi.max(0.0)
    }

    fn name(&self) -> &'static str {
        "pl2"
    }
}

// ── Slots ────────────────────────────────────────────────────────────────

/// Running potential of one weighted slot
#[derive(Debug, Clone)]
pub struct PotentialSlot {
    pub weight: f64,
    pub transform: Arc<dyn PotentialTransform>,
    /// Sum of component maxima
    pub ceiling: f64,
    /// Sum of component minima
    pub floor: f64,
    phi: f64,
}

impl PotentialSlot {
    pub fn new(weight: f64, transform: Arc<dyn PotentialTransform>, ceiling: f64, floor: f64) -> Self {
        Self {
            weight,
            transform,
            ceiling,
            floor,
            phi: ceiling,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.phi = self.ceiling;
    }

    #[inline]
    pub fn potential(&self) -> f64 {
        self.phi
    }

    /// Upper bound on this slot's weighted contribution
    pub fn bound(&self) -> f64 {
        self.weight * self.transform.sup(self.floor, self.phi)
    }

    /// Resolve one component at `actual` (its bound was `max_stat`); returns
    /// the change in [`bound`](Self::bound).
    pub fn resolve(&mut self, max_stat: f64, actual: f64) -> f64 {
        let psi = (self.phi - (max_stat - actual)).max(self.floor);
        let change = self.weight * self.transform.change(self.floor, self.phi, psi);
        self.phi = psi;
        change
    }
}

// ── Delta-scoring iterators ──────────────────────────────────────────────

/// A component contributing a statistic to a slot
pub trait DeltaScoringIterator: DocIterator {
    fn max_statistic(&self) -> f64;

    fn min_statistic(&self) -> f64;

    /// Smallest statistic of a document that contains the node
    fn min_positive_statistic(&self) -> f64 {
        self.min_statistic()
    }

    /// Largest statistic of a document that does not contain the node
    fn background_max_statistic(&self) -> f64;

    fn statistic(&mut self, ctx: &ScoringContext) -> Result<f64>;
}

/// Independent scorer used as a single-component identity slot
pub struct ScoreDelta {
    inner: Box<dyn ScoreIterator>,
}

impl ScoreDelta {
    pub fn new(inner: Box<dyn ScoreIterator>) -> Self {
        Self { inner }
    }
}

impl DocIterator for ScoreDelta {
    delegate_movement!(inner);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.has_match(ctx)
    }

    fn operator(&self) -> &str {
        self.inner.operator()
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        self.inner.annotate(ctx)
    }
}

impl DeltaScoringIterator for ScoreDelta {
    fn max_statistic(&self) -> f64 {
        self.inner.max_score()
    }

    fn min_statistic(&self) -> f64 {
        self.inner.min_score()
    }

    fn background_max_statistic(&self) -> f64 {
        self.inner.background_max()
    }

    fn statistic(&mut self, ctx: &ScoringContext) -> Result<f64> {
        self.inner.score(ctx)
    }
}

// ── Groups ───────────────────────────────────────────────────────────────

/// Components sharing one transform, before they are weighted into a slot
pub struct DeltaGroup {
    pub transform: Arc<dyn PotentialTransform>,
    pub components: Vec<Box<dyn DeltaScoringIterator>>,
}

impl DeltaGroup {
    pub fn new(
        transform: Arc<dyn PotentialTransform>,
        components: Vec<Box<dyn DeltaScoringIterator>>,
    ) -> Self {
        Self {
            transform,
            components,
        }
    }

    /// An independent scorer as an identity group
    pub fn independent(scorer: Box<dyn ScoreIterator>) -> Self {
        Self::new(Arc::new(Identity), vec![Box::new(ScoreDelta::new(scorer))])
    }

    pub fn bounds(&self) -> GroupBounds {
        GroupBounds::of(&self.components)
    }
}

/// Aggregate statistic ranges of a group of components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupBounds {
    /// Sum of component maxima
    pub ceiling: f64,
    /// Sum of component minima
    pub floor: f64,
    /// Smallest total when at least one component holds the node
    pub positive_floor: f64,
    /// Largest total when no component holds the node
    pub background_ceiling: f64,
}

impl GroupBounds {
    pub fn of<T: ?Sized + DeltaScoringIterator>(components: &[Box<T>]) -> Self {
        let floor: f64 = components.iter().map(|c| c.min_statistic()).sum();
        let positive_floor = components
            .iter()
            .map(|c| floor - c.min_statistic() + c.min_positive_statistic())
            .fold(f64::INFINITY, f64::min);
        Self {
            ceiling: components.iter().map(|c| c.max_statistic()).sum(),
            floor,
            positive_floor,
            background_ceiling: components
                .iter()
                .map(|c| c.background_max_statistic())
                .sum(),
        }
    }

    pub fn max_score(&self, transform: &dyn PotentialTransform) -> Score {
        transform.sup(self.floor, self.ceiling)
    }

    /// The total is either the floor (nothing matched) or at least the
    /// positive floor, which keeps PL2's pole at zero out of the range.
    pub fn min_score(&self, transform: &dyn PotentialTransform) -> Score {
        let at_floor = transform.apply(self.floor);
        if self.positive_floor.is_finite() && self.positive_floor <= self.ceiling {
            at_floor.min(transform.inf(self.positive_floor, self.ceiling))
        } else {
            at_floor
        }
    }

    pub fn background_max(&self, transform: &dyn PotentialTransform) -> Score {
        transform.sup(self.floor, self.background_ceiling.max(self.floor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bespoke_changes_match_direct_difference() {
        let transforms: Vec<Arc<dyn PotentialTransform>> = vec![
            Arc::new(Identity),
            Arc::new(Log),
            Arc::new(Bm25Saturation { idf: 2.3, k: 1.2 }),
            Arc::new(Pl2Transform::new(Pl2Curve::new(0.01))),
        ];
        for t in transforms {
            let (floor, phi, psi) = (0.2, 5.0, 1.7);
            let direct = t.sup(floor, psi) - t.sup(floor, phi);
            assert!(
                (t.change(floor, phi, psi) - direct).abs() < 1e-12,
                "{}",
                t.name()
            );
        }
    }

    #[test]
    fn test_pl2_change_matches_suprema_on_every_branch() {
        // 0.01: h rises everywhere; 3.0: h rises, falls, rises again
        for lambda in [0.01, 0.5, 3.0] {
            let t = Pl2Transform::new(Pl2Curve::new(lambda));
            let cases = [
                (0.0, 5.0, 1.7),
                (0.0, 0.3, 0.05),
                (0.0, 0.02, 0.001),
                (0.0, 2.0, 0.0),
                (0.2, 5.0, 1.7),
                (0.2, 40.0, 0.4),
                (1.0, 1.0, 1.0),
            ];
            for (floor, phi, psi) in cases {
                let direct = t.sup(floor, psi) - t.sup(floor, phi);
                let change = t.change(floor, phi, psi);
                assert!(
                    (change - direct).abs() <= 1e-9 * direct.abs().max(1.0),
                    "lambda={} floor={} phi={} psi={}: {} vs {}",
                    lambda,
                    floor,
                    phi,
                    psi,
                    change,
                    direct
                );
            }
        }
        assert_eq!(Pl2Curve::new(0.01).rising_until(), f64::INFINITY);
        assert!(Pl2Curve::new(3.0).rising_until().is_finite());
    }

    #[test]
    fn test_slot_resolution() {
        let mut slot = PotentialSlot::new(0.5, Arc::new(Identity), 10.0, 0.0);
        assert!((slot.bound() - 5.0).abs() < 1e-12);
        // component with max 4 resolved at 1: potential 7
        let change = slot.resolve(4.0, 1.0);
        assert!((change + 1.5).abs() < 1e-12);
        assert!((slot.potential() - 7.0).abs() < 1e-12);
        assert!((slot.bound() - 3.5).abs() < 1e-12);
        slot.reset();
        assert!((slot.potential() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_slot_never_below_floor() {
        let mut slot = PotentialSlot::new(1.0, Arc::new(Log), 0.9, 0.1);
        slot.resolve(0.8, -0.5);
        assert!((slot.potential() - 0.1).abs() < 1e-12);
        assert!(slot.bound().is_finite());
    }
}
