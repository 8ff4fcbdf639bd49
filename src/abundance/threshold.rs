use log::{debug, warn};
use rand::Rng;
use serde::Serialize;

use super::resample::{BootstrapEnsemble, BootstrapEnsembleBuilder};
use super::types::{FrequencyDistribution, SequenceId};
use crate::error::{FilterError, Result};

/// Lower and upper quantiles of the two-sided 99% bootstrap interval
pub const LOWER_QUANTILE: f64 = 0.005;
pub const UPPER_QUANTILE: f64 = 0.995;

/// Quantile of sorted values, interpolating linearly between order statistics
/// at position `(len - 1) * q`.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let h = (len - 1) as f64 * q.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = (lo + 1).min(len - 1);
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

/// Bias-corrected bootstrap interval for one sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceBounds {
    pub id: SequenceId,
    pub observed: u64,
    pub mean: f64,
    pub q005: f64,
    pub q995: f64,
    pub adjusted: f64,
    pub lower: f64,
    pub upper: f64,
}

impl SequenceBounds {
    fn new(id: SequenceId, observed: u64, mut replicate_counts: Vec<f64>) -> Self {
        replicate_counts.sort_by(|a, b| a.total_cmp(b));
        let n = replicate_counts.len().max(1) as f64;
        let mean = replicate_counts.iter().fold(0.0, |acc, c| acc + c) / n;
        let q005 = quantile(&replicate_counts, LOWER_QUANTILE);
        let q995 = quantile(&replicate_counts, UPPER_QUANTILE);

        let adjusted = 2.0 * observed as f64 - mean;
        SequenceBounds {
            id,
            observed,
            mean,
            q005,
            q995,
            adjusted,
            lower: adjusted - (mean - q005),
            upper: adjusted + (q995 - mean),
        }
    }

    /// The observed count cannot be told apart from zero at the 99% level
    pub fn is_unreliable(&self) -> bool {
        self.lower <= 0.0
    }
}

/// Result of a threshold estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOutcome {
    /// Largest observed count among the unreliable sequences
    Estimated { threshold: u64, n_unreliable: usize },
    /// Every sequence was reliable; resolves to threshold 0 (keep everything)
    NoUnreliableSequences,
}

impl ThresholdOutcome {
    /// Sequences with a count strictly above this value are kept
    pub fn threshold(&self) -> u64 {
        match self {
            ThresholdOutcome::Estimated { threshold, .. } => *threshold,
            ThresholdOutcome::NoUnreliableSequences => 0,
        }
    }
}

/// Bias-corrected bootstrap abundance threshold (Wang et al.)
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEstimator {
    builder: BootstrapEnsembleBuilder,
}

impl ThresholdEstimator {
    pub fn new(replicates: usize) -> Result<Self> {
        Ok(ThresholdEstimator {
            builder: BootstrapEnsembleBuilder::new(replicates)?,
        })
    }

    pub fn replicates(&self) -> usize {
        self.builder.replicates()
    }

    /// Per-sequence intervals from an ensemble drawn over `observed`
    pub fn bounds(
        &self,
        observed: &FrequencyDistribution,
        ensemble: &BootstrapEnsemble,
    ) -> Result<Vec<SequenceBounds>> {
        if !ensemble.aligned_with(observed) {
            return Err(FilterError::InvalidInput(
                "bootstrap ensemble was not drawn from the observed distribution".to_string(),
            ));
        }
        if ensemble.is_empty() {
            return Err(FilterError::InvalidInput(
                "bootstrap ensemble has no replicates".to_string(),
            ));
        }

        Ok(observed
            .iter()
            .enumerate()
            .map(|(i, (id, count))| SequenceBounds::new(id.clone(), count, ensemble.column(i)))
            .collect())
    }

    /// Threshold from precomputed intervals
    pub fn select(bounds: &[SequenceBounds]) -> ThresholdOutcome {
        let (n_unreliable, max_unreliable) = bounds
            .iter()
            .filter(|b| b.is_unreliable())
            .fold((0usize, None::<u64>), |(n, max), b| {
                (n + 1, Some(max.map_or(b.observed, |m| m.max(b.observed))))
            });

        match max_unreliable {
            Some(threshold) => ThresholdOutcome::Estimated {
                threshold,
                n_unreliable,
            },
            None => ThresholdOutcome::NoUnreliableSequences,
        }
    }

    /// Threshold for `observed` against a given ensemble
    pub fn estimate(
        &self,
        observed: &FrequencyDistribution,
        ensemble: &BootstrapEnsemble,
    ) -> Result<ThresholdOutcome> {
        let bounds = self.bounds(observed, ensemble)?;
        Ok(Self::select(&bounds))
    }

    /// Build an ensemble from `rng` and estimate; returns the intervals as well
    pub fn estimate_with_bounds<R: Rng>(
        &self,
        observed: &FrequencyDistribution,
        rng: &mut R,
    ) -> Result<(ThresholdOutcome, Vec<SequenceBounds>)> {
        let ensemble = self.builder.build(observed, rng)?;
        let bounds = self.bounds(observed, &ensemble)?;
        let outcome = Self::select(&bounds);

        match outcome {
            ThresholdOutcome::Estimated {
                threshold,
                n_unreliable,
            } => debug!(
                "{} of {} sequences unreliable, threshold {}",
                n_unreliable,
                observed.len(),
                threshold
            ),
            ThresholdOutcome::NoUnreliableSequences if !observed.is_empty() => warn!(
                "No unreliable sequences among {}; keeping every sequence",
                observed.len()
            ),
            ThresholdOutcome::NoUnreliableSequences => {}
        }
        Ok((outcome, bounds))
    }

    /// Build an ensemble from `rng` and estimate the threshold
    pub fn estimate_with_rng<R: Rng>(
        &self,
        observed: &FrequencyDistribution,
        rng: &mut R,
    ) -> Result<ThresholdOutcome> {
        self.estimate_with_bounds(observed, rng).map(|(outcome, _)| outcome)
    }
}
