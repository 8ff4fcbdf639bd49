use log::debug;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::FrequencyDistribution;
use crate::error::{FilterError, Result};

/// Draws bootstrap replicates from a frequency distribution, weighting each
/// identifier by its count (sampling with replacement).
pub struct WeightedResampler<'a> {
    source: &'a FrequencyDistribution,
    index: Option<WeightedIndex<u64>>,
}

impl<'a> WeightedResampler<'a> {
    pub fn new(source: &'a FrequencyDistribution) -> Result<Self> {
        let index = if source.total() == 0 {
            None
        } else {
            let index = WeightedIndex::<u64>::new(source.counts()).map_err(|e| {
                FilterError::InvalidInput(format!("cannot weight counts: {}", e))
            })?;
            Some(index)
        };
        Ok(WeightedResampler { source, index })
    }

    /// One replicate of `n` draws over the source support.
    ///
    /// `n == 0` yields the all-zero distribution; identifiers never drawn hold 0.
    pub fn draw<R: Rng + ?Sized>(&self, n: u64, rng: &mut R) -> Result<FrequencyDistribution> {
        if n == 0 {
            return Ok(self.source.zeroed());
        }
        let index = self.index.as_ref().ok_or_else(|| {
            FilterError::InvalidInput(format!(
                "cannot draw {} observations from a distribution with zero total count",
                n
            ))
        })?;

        let mut counts = vec![0u64; self.source.len()];
        for _ in 0..n {
            counts[index.sample(rng)] += 1;
        }
        Ok(self.source.with_counts(counts))
    }
}

/// R resamples aligned to the support of the distribution they were drawn from.
///
/// Counts are kept per identifier as `u32` columns; a replicate is folded into
/// the columns as it is added and not kept as a distribution of its own.
#[derive(Debug, Clone)]
pub struct BootstrapEnsemble {
    origin: FrequencyDistribution,
    columns: Vec<Vec<u32>>,
    replicates: usize,
}

impl BootstrapEnsemble {
    /// An ensemble with no replicates yet
    pub fn new(origin: &FrequencyDistribution) -> Self {
        BootstrapEnsemble {
            origin: origin.zeroed(),
            columns: vec![Vec::new(); origin.len()],
            replicates: 0,
        }
    }

    /// An empty ensemble with room for `replicates` resamples of `origin`
    pub fn with_capacity(origin: &FrequencyDistribution, replicates: usize) -> Self {
        BootstrapEnsemble {
            origin: origin.zeroed(),
            columns: (0..origin.len())
                .map(|_| Vec::with_capacity(replicates))
                .collect(),
            replicates: 0,
        }
    }

    /// Accumulate one replicate; its support must match the ensemble's
    pub fn with_replicate(mut self, replicate: FrequencyDistribution) -> Result<Self> {
        if !replicate.same_support(&self.origin) {
            return Err(FilterError::InvalidInput(
                "replicate support does not match the ensemble".to_string(),
            ));
        }
        let counts = replicate
            .counts()
            .iter()
            .map(|&c| {
                u32::try_from(c).map_err(|_| {
                    FilterError::InvalidInput(format!("replicate count {} does not fit in u32", c))
                })
            })
            .collect::<Result<Vec<u32>>>()?;
        for (column, count) in self.columns.iter_mut().zip(counts) {
            column.push(count);
        }
        self.replicates += 1;
        Ok(self)
    }

    /// Number of replicates
    pub fn len(&self) -> usize {
        self.replicates
    }

    pub fn is_empty(&self) -> bool {
        self.replicates == 0
    }

    /// Per-identifier counts, one column per identifier of the origin
    pub fn columns(&self) -> &[Vec<u32>] {
        &self.columns
    }

    /// Whether the ensemble was drawn over the support of `dist`
    pub fn aligned_with(&self, dist: &FrequencyDistribution) -> bool {
        self.origin.same_support(dist)
    }

    /// Counts of the identifier at `position` across all replicates
    pub fn column(&self, position: usize) -> Vec<f64> {
        self.columns
            .get(position)
            .map(|c| c.iter().map(|&v| f64::from(v)).collect())
            .unwrap_or_default()
    }
}

/// Builds a bootstrap ensemble of a fixed number of replicates
#[derive(Debug, Clone, Copy)]
pub struct BootstrapEnsembleBuilder {
    replicates: usize,
}

impl BootstrapEnsembleBuilder {
    pub const DEFAULT_REPLICATES: usize = 1000;

    pub fn new(replicates: usize) -> Result<Self> {
        if replicates == 0 {
            return Err(FilterError::InvalidInput(
                "at least one bootstrap replicate is required".to_string(),
            ));
        }
        Ok(BootstrapEnsembleBuilder { replicates })
    }

    pub fn replicates(&self) -> usize {
        self.replicates
    }

    /// Resample `dist` at its own total size, once per replicate.
    ///
    /// Every replicate draws from its own generator seeded off `rng`.
    pub fn build<R: Rng>(
        &self,
        dist: &FrequencyDistribution,
        rng: &mut R,
    ) -> Result<BootstrapEnsemble> {
        let resampler = WeightedResampler::new(dist)?;
        let n = dist.total();
        debug!(
            "Building {} bootstrap replicates over {} sequences ({} reads)",
            self.replicates,
            dist.len(),
            n
        );

        let ensemble = BootstrapEnsemble::with_capacity(dist, self.replicates);
        (0..self.replicates).try_fold(ensemble, |ensemble, _| {
            let mut replicate_rng = StdRng::from_rng(&mut *rng);
            let replicate = resampler.draw(n, &mut replicate_rng)?;
            ensemble.with_replicate(replicate)
        })
    }
}

impl Default for BootstrapEnsembleBuilder {
    fn default() -> Self {
        BootstrapEnsembleBuilder {
            replicates: Self::DEFAULT_REPLICATES,
        }
    }
}
