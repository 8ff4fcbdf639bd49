pub(crate) mod job;
pub(crate) mod orchestrator;
pub(crate) mod table_filter;
pub(crate) mod types;

pub use job::{SampleFilterJob, SampleKey};
pub use orchestrator::{Dispatch, FilteredCollection, PipelineOrchestrator, PipelineOutput};
pub use table_filter::TableFilterOutput;
pub use types::{
    sample_seed, FilterConfig, SampleOutcome, SampleStatsRecord, StatsTable, STATS_HEADER,
};
