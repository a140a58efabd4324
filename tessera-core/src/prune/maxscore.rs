//! MaxScore combination over delta-scoring components
//!
//! The root `combine` of a ranked query can run as a delta-scoring engine:
//!
//! 1. Until K documents have been scored every candidate is fully evaluated.
//! 2. Once the accumulator is full its K-th score is the threshold θ. The
//!    quorum is the shortest prefix of the resolution order such that a
//!    document matching none of it is bounded below θ: starting from the full
//!    potential, each child in turn is resolved at its background maximum
//!    until the potential drops under θ.
//! 3. Only quorum children generate candidates. Each candidate resolves its
//!    children in order and is abandoned (reported at the node's minimum)
//!    as soon as the potential falls below θ.
//!
//! A fully resolved document is re-scored slot by slot in the original child
//! order, so its score is bit-for-bit the score of the plain weighted sum.

use log::{debug, trace};

use crate::config::{MovementPolicy, QuorumOrdering};
use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::query::{Annotation, DocIterator, ScoreIterator};
use crate::{DocId, Score, TERMINATED};

use super::collector::ScoreCollector;
use super::potential::{DeltaGroup, DeltaScoringIterator, PotentialSlot};

/// Pruning counters for one evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruningStats {
    pub scored: u64,
    pub pruned: u64,
    pub quorum: usize,
}

pub struct MaxScoreCombination {
    /// Components flattened across groups, in original order
    components: Vec<Box<dyn DeltaScoringIterator>>,
    slot_of: Vec<usize>,
    slots: Vec<PotentialSlot>,
    /// Resolution order (indices into `components`), background children last
    order: Vec<usize>,
    background: Vec<bool>,
    all_background: bool,
    /// Length of the essential prefix of `order`
    quorum: usize,
    collector: ScoreCollector,
    threshold: Score,
    movement: MovementPolicy,
    statistics: Vec<f64>,
    ceiling: Score,
    max: Score,
    min: Score,
    background_max: Score,
    scored: u64,
    pruned: u64,
    reported: bool,
}

#[inline]
fn tolerance(threshold: Score) -> Score {
    1e-9 * threshold.abs().max(1.0)
}

impl MaxScoreCombination {
    /// `groups` pairs each child's (non-negative) weight with its delta group
    pub fn new(
        groups: Vec<(f64, DeltaGroup)>,
        requested: usize,
        ordering: QuorumOrdering,
        movement: MovementPolicy,
    ) -> Result<Self> {
        let mut components = Vec::new();
        let mut slot_of = Vec::new();
        let mut slots = Vec::with_capacity(groups.len());
        let (mut max, mut min, mut background_max) = (0.0, 0.0, 0.0);

        for (slot, (weight, group)) in groups.into_iter().enumerate() {
            if !(weight >= 0.0 && weight.is_finite()) {
                return Err(Error::invalid(
                    "combine",
                    &slot.to_string(),
                    format!("delta scoring needs a non-negative weight, got {}", weight),
                ));
            }
            let bounds = group.bounds();
            let transform = group.transform.as_ref();
            max += weight * bounds.max_score(transform);
            min += weight * bounds.min_score(transform);
            background_max += weight * bounds.background_max(transform);
            slots.push(PotentialSlot::new(
                weight,
                group.transform.clone(),
                bounds.ceiling,
                bounds.floor,
            ));
            for component in group.components {
                components.push(component);
                slot_of.push(slot);
            }
        }

        let background: Vec<bool> = components.iter().map(|c| c.has_all_candidates()).collect();
        let all_background = background.iter().all(|&b| b);
        let ceiling = slots.iter().map(|s| s.bound()).sum();
        let n = components.len();

        let mut combination = Self {
            components,
            slot_of,
            slots,
            order: (0..n).collect(),
            background,
            all_background,
            quorum: n,
            collector: ScoreCollector::new(requested),
            threshold: Score::NEG_INFINITY,
            movement,
            statistics: vec![0.0; n],
            ceiling,
            max,
            min,
            background_max,
            scored: 0,
            pruned: 0,
            reported: false,
        };
        combination.sort_children(ordering);

        debug!(
            "MaxScore: {} slots, {} components, k={}, ordering={:?}, movement={:?}, bounds=[{:.4}, {:.4}]",
            combination.slots.len(),
            n,
            requested,
            ordering,
            movement,
            min,
            max
        );
        Ok(combination)
    }

    fn sort_children(&mut self, ordering: QuorumOrdering) {
        let impact: Vec<f64> = (0..self.components.len())
            .map(|i| {
                let mut slot = self.slots[self.slot_of[i]].clone();
                slot.reset();
                let c = &self.components[i];
                -slot.resolve(c.max_statistic(), c.background_max_statistic())
            })
            .collect();
        let entries: Vec<u64> = self.components.iter().map(|c| c.total_entries()).collect();
        let background = &self.background;
        match ordering {
            QuorumOrdering::TotalEntries => self
                .order
                .sort_by_key(|&i| (background[i], entries[i], i)),
            QuorumOrdering::Weight => self.order.sort_by(|&a, &b| {
                background[a]
                    .cmp(&background[b])
                    .then_with(|| impact[b].total_cmp(&impact[a]))
                    .then_with(|| a.cmp(&b))
            }),
        }
    }

    pub fn stats(&self) -> PruningStats {
        PruningStats {
            scored: self.scored,
            pruned: self.pruned,
            quorum: self.quorum,
        }
    }

    pub fn threshold(&self) -> Score {
        self.threshold
    }

    /// Shrinks the quorum for the current threshold
    fn update_quorum(&mut self) {
        let threshold = self.collector.threshold();
        if threshold <= self.threshold {
            return;
        }
        self.threshold = threshold;
        let limit = threshold - tolerance(threshold);

        for slot in &mut self.slots {
            slot.reset();
        }
        let mut potential = self.ceiling;
        let mut quorum = self.order.len();
        for (pos, &i) in self.order.iter().enumerate() {
            let c = &self.components[i];
            potential += self.slots[self.slot_of[i]]
                .resolve(c.max_statistic(), c.background_max_statistic());
            if potential < limit {
                quorum = pos + 1;
                break;
            }
        }
        if quorum < self.quorum {
            debug!(
                "MaxScore: threshold={:.6}, quorum {} -> {}",
                threshold, self.quorum, quorum
            );
            self.quorum = quorum;
        }
    }

    fn drivers(&self) -> impl Iterator<Item = usize> + '_ {
        let all_background = self.all_background;
        self.order[..self.quorum]
            .iter()
            .copied()
            .filter(move |&i| all_background || !self.background[i])
    }

    /// Score of every slot from the collected statistics, in original order
    fn exact(&self) -> Score {
        let mut sums = vec![0.0; self.slots.len()];
        for (i, stat) in self.statistics.iter().enumerate() {
            sums[self.slot_of[i]] += *stat;
        }
        let mut score = 0.0;
        for (slot, sum) in self.slots.iter().zip(sums) {
            score += slot.weight * slot.transform.apply(sum);
        }
        score
    }

    /// Full evaluation without touching the accumulator
    fn evaluate(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let doc = ctx.document();
        for (i, c) in self.components.iter_mut().enumerate() {
            c.sync_to(doc);
            self.statistics[i] = c.statistic(ctx)?;
        }
        Ok(self.exact())
    }
}

impl DocIterator for MaxScoreCombination {
    fn doc(&self) -> DocId {
        self.drivers()
            .map(|i| self.components[i].doc())
            .min()
            .unwrap_or(TERMINATED)
    }

    fn sync_to(&mut self, target: DocId) -> DocId {
        match self.movement {
            MovementPolicy::Lazy => {
                let drivers: Vec<usize> = self.drivers().collect();
                for i in drivers {
                    self.components[i].sync_to(target);
                }
            }
            MovementPolicy::Aggressive => {
                for c in &mut self.components {
                    c.sync_to(target);
                }
            }
        }
        self.doc()
    }

    fn move_past(&mut self, id: DocId) -> DocId {
        let drivers: Vec<usize> = self.drivers().collect();
        for i in drivers {
            self.components[i].move_past(id);
        }
        if self.movement == MovementPolicy::Aggressive {
            let next = id.saturating_add(1);
            for c in &mut self.components {
                c.sync_to(next);
            }
        }
        let doc = self.doc();
        if doc == TERMINATED && !self.reported {
            self.reported = true;
            debug!(
                "MaxScore done: scored={}, pruned={}, quorum={}/{}, threshold={:.6}",
                self.scored,
                self.pruned,
                self.quorum,
                self.order.len(),
                self.threshold
            );
        }
        doc
    }

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        if self.doc() != ctx.document() {
            return false;
        }
        let drivers: Vec<usize> = self.drivers().collect();
        let mut matched = false;
        for i in drivers {
            matched |= self.components[i].has_match(ctx);
        }
        matched
    }

    fn has_all_candidates(&self) -> bool {
        self.all_background
    }

    fn reset(&mut self) {
        for c in &mut self.components {
            c.reset();
        }
        for slot in &mut self.slots {
            slot.reset();
        }
        self.collector = ScoreCollector::new(self.collector.capacity());
        self.threshold = Score::NEG_INFINITY;
        self.quorum = self.order.len();
        self.scored = 0;
        self.pruned = 0;
        self.reported = false;
    }

    fn total_entries(&self) -> u64 {
        self.drivers()
            .map(|i| self.components[i].total_entries())
            .fold(0u64, |acc, n| acc.saturating_add(n))
    }

    fn operator(&self) -> &str {
        "combine"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = match self.evaluate(ctx) {
            Ok(s) => s.to_string(),
            Err(e) => e.to_string(),
        };
        let weights: Vec<String> = self.slots.iter().map(|s| s.weight.to_string()).collect();
        let children = self.components.iter_mut().map(|c| c.annotate(ctx)).collect();
        Annotation::new("combine", self.doc(), matched)
            .with_parameters(format!(
                "maxscore,quorum={},weights={}",
                self.quorum,
                weights.join(":")
            ))
            .with_value(value)
            .with_children(children)
    }
}

impl ScoreIterator for MaxScoreCombination {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let doc = ctx.document();
        let full = self.collector.is_full();
        let limit = self.threshold - tolerance(self.threshold);

        for slot in &mut self.slots {
            slot.reset();
        }
        let mut potential = self.ceiling;
        for pos in 0..self.order.len() {
            let i = self.order[pos];
            let component = &mut self.components[i];
            component.sync_to(doc);
            let actual = component.statistic(ctx)?;
            let max = component.max_statistic();
            self.statistics[i] = actual;
            potential += self.slots[self.slot_of[i]].resolve(max, actual);
            if full && pos + 1 >= self.quorum && potential < limit {
                self.pruned += 1;
                trace!(
                    "doc {}: pruned after {}/{} children, potential={:.6} < threshold={:.6}",
                    doc,
                    pos + 1,
                    self.order.len(),
                    potential,
                    self.threshold
                );
                return Ok(self.min);
            }
        }

        let score = self.exact();
        self.scored += 1;
        if self.collector.insert(doc, score) && self.collector.is_full() {
            self.update_quorum();
        }
        trace!("doc {}: scored {:.6}", doc, score);
        Ok(score)
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
    use crate::query::leaf::PriorIterator;
    use crate::structures::DenseDocValues;
    use std::sync::Arc;

    /// Background prior over `values`, used as an independent scorer
    fn prior(values: &[f64]) -> DeltaGroup {
        let column = DenseDocValues::new(values.iter().map(|&v| Some(v)).collect());
        DeltaGroup::independent(Box::new(PriorIterator::new("prior", Arc::new(column), 0.0, None)))
    }

    /// Sparse scorer: `score` on listed documents, 0 elsewhere
    fn sparse(docs: &[(DocId, f64)], n: usize) -> DeltaGroup {
        let mut values = vec![None; n];
        for &(d, s) in docs {
            values[d as usize] = Some(s);
        }
        let column = DenseDocValues::new(values);
        DeltaGroup::independent(Box::new(crate::query::leaf::test_support::SparseScores::new(
            Arc::new(column),
        )))
    }

    fn run(root: &mut MaxScoreCombination, k: usize) -> Vec<(DocId, Score)> {
        let mut ctx = ScoringContext::new();
        let mut best = ScoreCollector::new(k);
        while !root.is_done() {
            let doc = root.doc();
            ctx.set_document(doc);
            root.sync_to(doc);
            if root.has_match(&ctx) {
                let s = root.score(&ctx).unwrap();
                best.insert(doc, s);
            }
            root.move_past(doc);
        }
        best.into_sorted_results()
    }

    #[test]
    fn test_quorum_shrinks_and_results_match_full() {
        let n = 12;
        let a: Vec<(DocId, f64)> = (0..n as u64).map(|d| (d, 0.1 * (d % 3) as f64 + 0.05)).collect();
        let b = vec![(2, 5.0), (7, 4.0)];
        let groups = || vec![(1.0, sparse(&a, n)), (1.0, sparse(&b, n))];

        let mut pruned = MaxScoreCombination::new(
            groups(),
            2,
            QuorumOrdering::TotalEntries,
            MovementPolicy::Lazy,
        )
        .unwrap();
        let mut full = MaxScoreCombination::new(
            groups(),
            usize::MAX,
            QuorumOrdering::TotalEntries,
            MovementPolicy::Lazy,
        )
        .unwrap();

        let got = run(&mut pruned, 2);
        let mut expected = run(&mut full, usize::MAX);
        expected.truncate(2);
        assert_eq!(got, expected);
        assert_eq!(got[0].0, 2);
        assert!(pruned.stats().quorum < 2);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let result = MaxScoreCombination::new(
            vec![(-1.0, prior(&[1.0, 2.0]))],
            10,
            QuorumOrdering::Weight,
            MovementPolicy::Lazy,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_all_background_iterates_everything() {
        let mut root = MaxScoreCombination::new(
            vec![(1.0, prior(&[1.0, 3.0, 2.0]))],
            1,
            QuorumOrdering::Weight,
            MovementPolicy::Aggressive,
        )
        .unwrap();
        assert!(root.has_all_candidates());
        let got = run(&mut root, 1);
        assert_eq!(got, vec![(1, 3.0)]);
    }
}
