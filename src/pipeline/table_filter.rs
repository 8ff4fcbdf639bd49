use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::job::SampleKey;
use super::orchestrator::{Dispatch, PipelineOrchestrator};
use super::types::{sample_seed, SampleStatsRecord, StatsTable};
use crate::abundance::SequenceBounds;
use crate::error::{FilterError, Result};
use crate::io::CountTable;

/// One sample column of a dereplicated count table
struct ColumnJob {
    sample_id: String,
    column: usize,
    seed: u64,
}

impl SampleKey for ColumnJob {
    fn sample_id(&self) -> &str {
        &self.sample_id
    }
}

struct ColumnOutcome {
    stats: SampleStatsRecord,
    /// Filtered counts, one per feature of the input table
    kept: Vec<u64>,
    bounds: Vec<SequenceBounds>,
}

/// Result of filtering a whole count table
#[derive(Debug, Clone)]
pub struct TableFilterOutput {
    /// Filtered table without features that are absent from every sample
    pub table: CountTable,
    pub stats: StatsTable,
    /// Bootstrap intervals per sample, in sample order
    pub bounds: Vec<(String, Vec<SequenceBounds>)>,
}

impl PipelineOrchestrator {
    /// Threshold and filter every sample column of an already dereplicated table
    pub fn filter_table(&self, table: &CountTable) -> Result<TableFilterOutput> {
        if table.sample_ids().is_empty() {
            return Err(FilterError::CountTable("no sample columns".to_string()));
        }
        let batch_seed = self.batch_seed();
        let jobs: Vec<ColumnJob> = table
            .sample_ids()
            .iter()
            .enumerate()
            .map(|(column, sample_id)| ColumnJob {
                sample_id: sample_id.clone(),
                column,
                seed: sample_seed(batch_seed, sample_id),
            })
            .collect();

        let outcomes = Dispatch::from_threads(self.config().threads)
            .run(&jobs, |job| self.filter_column(table, job))?
            .into_iter()
            .collect::<Result<Vec<ColumnOutcome>>>()?;

        let stats = StatsTable::new(outcomes.iter().map(|o| o.stats.clone()).collect());
        if stats.all_empty() {
            return Err(FilterError::AllSamplesEmpty);
        }

        let counts = (0..table.feature_ids().len())
            .map(|feature| outcomes.iter().map(|o| o.kept[feature]).collect())
            .collect();
        let filtered = CountTable::new(
            table.feature_ids().to_vec(),
            table.sample_ids().to_vec(),
            counts,
        )?
        .drop_empty_features();

        info!(
            "{} of {} sequences kept in at least one sample",
            filtered.feature_ids().len(),
            table.feature_ids().len()
        );

        Ok(TableFilterOutput {
            table: filtered,
            stats,
            bounds: outcomes
                .into_iter()
                .map(|o| (o.stats.sample_id, o.bounds))
                .collect(),
        })
    }

    fn filter_column(&self, table: &CountTable, job: &ColumnJob) -> Result<ColumnOutcome> {
        let counts = table.sample_distribution(job.column)?;
        let mut rng = StdRng::seed_from_u64(job.seed);
        let (outcome, bounds) = self.estimator().estimate_with_bounds(&counts, &mut rng)?;
        let threshold = outcome.threshold();

        let kept: Vec<u64> = (0..table.feature_ids().len())
            .map(|feature| table.get(feature, job.column))
            .map(|count| if count > threshold { count } else { 0 })
            .collect();
        let n_seqs_unique_kept = kept.iter().filter(|&&c| c > 0).count() as u64;

        info!(
            "Abundance filtering threshold for sample {} set at > {} counts. \
             {} unique sequences kept.",
            job.sample_id, threshold, n_seqs_unique_kept
        );

        Ok(ColumnOutcome {
            stats: SampleStatsRecord {
                sample_id: job.sample_id.clone(),
                threshold,
                n_input_seqs: counts.total(),
                n_seqs_kept: kept.iter().sum(),
                n_seqs_unique_kept,
            },
            kept,
            bounds,
        })
    }
}
