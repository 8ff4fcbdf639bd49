//! Bootstrap abundance filtering of dereplicated sequencing reads.
//!
//! Each sample's reads are keyed by content hash and counted, a noise threshold
//! is estimated with the bias-corrected bootstrap of Wang et al., and only
//! sequences seen more often than the threshold are written back out.

pub mod abundance;
pub mod error;
pub mod io;
pub mod pipeline;

pub use abundance::{
    BootstrapEnsemble, BootstrapEnsembleBuilder, FrequencyDistribution, SequenceBounds,
    SequenceId, ThresholdEstimator, ThresholdOutcome, WeightedResampler,
};
pub use error::{FilterError, Result};
pub use pipeline::{FilterConfig, PipelineOrchestrator, SampleStatsRecord, StatsTable};
