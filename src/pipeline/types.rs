use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::abundance::BootstrapEnsembleBuilder;
use crate::error::Result;

/// Column names of the stats table, in order
pub const STATS_HEADER: [&str; 5] = [
    "sample-id",
    "threshold",
    "n_input_seqs",
    "n_seqs_kept",
    "n_seqs_unique_kept",
];

/// Per-sample outcome of abundance filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleStatsRecord {
    /// The sample ID
    #[serde(rename = "sample-id")]
    pub sample_id: String,
    /// Sequences seen more than this many times were kept
    pub threshold: u64,
    /// Reads in the sample before filtering
    pub n_input_seqs: u64,
    /// Reads kept after filtering
    pub n_seqs_kept: u64,
    /// Unique sequences kept after filtering
    pub n_seqs_unique_kept: u64,
}

/// Stats records of a batch, in manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatsTable {
    records: Vec<SampleStatsRecord>,
}

impl StatsTable {
    pub fn new(records: Vec<SampleStatsRecord>) -> Self {
        StatsTable { records }
    }

    pub fn records(&self) -> &[SampleStatsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, sample_id: &str) -> Option<&SampleStatsRecord> {
        self.records.iter().find(|r| r.sample_id == sample_id)
    }

    /// True when no sample kept a single read
    pub fn all_empty(&self) -> bool {
        self.records.iter().all(|r| r.n_seqs_kept == 0)
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<SampleStatsRecord>, _>>()?;
        Ok(StatsTable { records })
    }

    /// Whether the file starts with the stats header
    pub fn sniff<P: AsRef<Path>>(path: P) -> Result<bool> {
        let mut line = String::new();
        BufReader::new(File::open(path.as_ref())?).read_line(&mut line)?;
        let header: Vec<&str> = line.trim().split(',').collect();
        Ok(header == STATS_HEADER)
    }
}

/// Settings shared by every job of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Bootstrap replicates per sample
    pub replicates: usize,
    /// Batch seed; drawn from the OS when absent
    pub seed: Option<u64>,
    /// Worker threads; 1 runs samples one after another
    pub threads: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            replicates: BootstrapEnsembleBuilder::DEFAULT_REPLICATES,
            seed: None,
            threads: 1,
        }
    }
}

/// What one sample job produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleOutcome {
    pub stats: SampleStatsRecord,
    /// Written FASTQ.GZ file, `None` when nothing survived filtering
    pub output: Option<PathBuf>,
}

/// Seed of one sample's generator: depends on the batch seed and the sample
/// id only, never on which worker runs the sample.
pub fn sample_seed(batch_seed: u64, sample_id: &str) -> u64 {
    batch_seed ^ fxhash::hash64(sample_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn record(id: &str, kept: u64) -> SampleStatsRecord {
        SampleStatsRecord {
            sample_id: id.to_string(),
            threshold: 2,
            n_input_seqs: 10,
            n_seqs_kept: kept,
            n_seqs_unique_kept: kept.min(1),
        }
    }

    #[test]
    fn test_all_empty() {
        assert!(StatsTable::new(vec![record("a", 0), record("b", 0)]).all_empty());
        assert!(!StatsTable::new(vec![record("a", 0), record("b", 4)]).all_empty());
    }

    #[test]
    fn test_sniff_and_read_back() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("stats.csv");
        let table = StatsTable::new(vec![record("a", 0), record("b", 4)]);
        crate::io::write_stats_file(&table, crate::io::StatsFormat::Csv, &path)?;

        assert!(StatsTable::sniff(&path)?);
        assert_eq!(StatsTable::read_csv(&path)?, table);
        assert_eq!(table.get("b").map(|r| r.n_seqs_kept), Some(4));

        let other = dir.path().join("other.csv");
        fs::write(&other, "id,threshold\n")?;
        assert!(!StatsTable::sniff(&other)?);
        Ok(())
    }

    #[test]
    fn test_sample_seed_is_per_sample() {
        assert_eq!(sample_seed(7, "s1"), sample_seed(7, "s1"));
        assert_ne!(sample_seed(7, "s1"), sample_seed(7, "s2"));
        assert_ne!(sample_seed(7, "s1"), sample_seed(8, "s1"));
    }

    #[test]
    fn test_default_config() {
        let config = FilterConfig::default();
        assert_eq!(config.replicates, 1000);
        assert_eq!(config.threads, 1);
        assert_eq!(config.seed, None);
    }
}
