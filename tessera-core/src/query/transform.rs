//! Score transforms: `lognot` and `scale`

use crate::context::ScoringContext;
use crate::error::{Error, Result};
use crate::params::NodeParameters;
use crate::Score;

use super::annotation::Annotation;
use super::traits::{DocIterator, ScoreIterator, delegate_movement};

/// `ln(1 - exp(s))`
#[inline]
fn log_not(s: Score) -> Score {
    (-s.exp()).ln_1p()
}

/// Log-space complement of a log-probability. Inputs must be non-positive.
pub struct LogNotIterator {
    inner: Box<dyn ScoreIterator>,
}

impl LogNotIterator {
    pub fn new(inner: Box<dyn ScoreIterator>) -> Self {
        Self { inner }
    }
}

impl DocIterator for LogNotIterator {
    delegate_movement!(inner);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "lognot"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = match self.score(ctx) {
            Ok(s) => s.to_string(),
            Err(e) => e.to_string(),
        };
        Annotation::new("lognot", self.doc(), matched)
            .with_value(value)
            .with_children(vec![self.inner.annotate(ctx)])
    }
}

impl ScoreIterator for LogNotIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        let s = self.inner.score(ctx)?;
        if s > 0.0 {
            return Err(Error::evaluation(
                "lognot",
                format!("input {} is not a log-probability (must be <= 0)", s),
            ));
        }
        Ok(log_not(s))
    }

    // decreasing in the input
    fn max_score(&self) -> Score {
        log_not(self.inner.min_score().min(0.0))
    }

    fn min_score(&self) -> Score {
        log_not(self.inner.max_score().min(0.0))
    }
}

/// Constant multiplier
pub struct ScaleIterator {
    inner: Box<dyn ScoreIterator>,
    weight: f64,
}

impl ScaleIterator {
    pub fn new(inner: Box<dyn ScoreIterator>, weight: f64) -> Self {
        Self { inner, weight }
    }

    /// `weight`, or `default` as the shorter spelling; 1.0 if neither is set
    pub fn from_params(params: &NodeParameters, inner: Box<dyn ScoreIterator>) -> Result<Self> {
        let weight = params
            .get_f64("weight")
            .or_else(|| params.get_f64("default"))
            .unwrap_or(1.0);
        if !weight.is_finite() {
            return Err(Error::invalid("scale", "weight", "must be finite"));
        }
        Ok(Self::new(inner, weight))
    }
}

impl DocIterator for ScaleIterator {
    delegate_movement!(inner);

    fn has_match(&mut self, ctx: &ScoringContext) -> bool {
        self.inner.has_match(ctx)
    }

    fn operator(&self) -> &str {
        "scale"
    }

    fn annotate(&mut self, ctx: &ScoringContext) -> Annotation {
        let matched = self.has_match(ctx);
        let value = match self.score(ctx) {
            Ok(s) => s.to_string(),
            Err(e) => e.to_string(),
        };
        Annotation::new("scale", self.doc(), matched)
            .with_parameters(format!("weight={}", self.weight))
            .with_value(value)
            .with_children(vec![self.inner.annotate(ctx)])
    }
}

impl ScoreIterator for ScaleIterator {
    fn score(&mut self, ctx: &ScoringContext) -> Result<Score> {
        Ok(self.weight * self.inner.score(ctx)?)
    }

    fn max_score(&self) -> Score {
        if self.weight >= 0.0 {
            self.weight * self.inner.max_score()
        } else {
            self.weight * self.inner.min_score()
        }
    }

    fn min_score(&self) -> Score {
        if self.weight >= 0.0 {
            self.weight * self.inner.min_score()
        } else {
            self.weight * self.inner.max_score()
        }
    }

    fn background_max(&self) -> Score {
        if self.weight >= 0.0 {
            self.weight * self.inner.background_max()
        } else {
            self.weight * self.inner.min_score()
        }
    }
}
