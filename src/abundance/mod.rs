pub(crate) mod counter;
pub(crate) mod resample;
pub(crate) mod threshold;
pub(crate) mod types;

pub use counter::ReadCounter;
pub use resample::{BootstrapEnsemble, BootstrapEnsembleBuilder, WeightedResampler};
pub use threshold::{quantile, SequenceBounds, ThresholdEstimator, ThresholdOutcome};
pub use types::{FrequencyDistribution, SequenceId};
