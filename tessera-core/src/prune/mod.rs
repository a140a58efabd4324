//! Delta scoring and MaxScore early termination

mod collector;
mod maxscore;
mod potential;

pub use collector::{HeapEntry, ScoreCollector};
pub use maxscore::{MaxScoreCombination, PruningStats};
pub use potential::{
    Bm25Saturation, DeltaGroup, DeltaScoringIterator, GroupBounds, Identity, Log, Pl2Transform,
    PotentialSlot, PotentialTransform, ScoreDelta,
};
