use std::path::PathBuf;

use fxhash::FxHashSet;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::types::{SampleOutcome, SampleStatsRecord};
use crate::abundance::{ReadCounter, SequenceId, ThresholdEstimator};
use crate::error::{FilterError, Result};
use crate::io::{FastqGzWriter, SampleReader};

/// Anything dispatched per sample
pub trait SampleKey {
    fn sample_id(&self) -> &str;
}

/// Count, threshold and filter the reads of one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFilterJob {
    pub sample_id: String,
    pub input: PathBuf,
    /// Where retained reads go; only created if at least one read survives
    pub output: PathBuf,
    pub phred_offset: u8,
    pub seed: u64,
}

impl SampleKey for SampleFilterJob {
    fn sample_id(&self) -> &str {
        &self.sample_id
    }
}

impl SampleFilterJob {
    pub fn run(&self, estimator: &ThresholdEstimator) -> Result<SampleOutcome> {
        let reader = SampleReader::new(&self.sample_id, &self.input, self.phred_offset);

        let mut counter = ReadCounter::new();
        let n_input_seqs = reader.process_all(|record| {
            counter.count_sequence(&record.seq());
            Ok(())
        })?;
        let counts = counter.into_distribution();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let threshold = estimator.estimate_with_rng(&counts, &mut rng)?.threshold();

        let retained: FxHashSet<SequenceId> = counts
            .iter()
            .filter(|&(_, count)| count > threshold)
            .map(|(id, _)| id.clone())
            .collect();
        let n_seqs_kept: u64 = counts
            .iter()
            .filter(|&(_, count)| count > threshold)
            .map(|(_, count)| count)
            .sum();

        info!(
            "Abundance filtering threshold for sample {} set at > {} counts. \
             {} unique sequences kept.",
            self.sample_id,
            threshold,
            retained.len()
        );

        let output = if retained.is_empty() {
            if n_input_seqs > 0 {
                warn!("All {} reads of sample {} were filtered out", n_input_seqs, self.sample_id);
            }
            None
        } else {
            let written = self.write_retained(&reader, &retained)?;
            if written != n_seqs_kept {
                return Err(FilterError::sample_io(
                    &self.sample_id,
                    format!(
                        "input changed while filtering: expected {} reads, wrote {}",
                        n_seqs_kept, written
                    ),
                ));
            }
            Some(self.output.clone())
        };

        Ok(SampleOutcome {
            stats: SampleStatsRecord {
                sample_id: self.sample_id.clone(),
                threshold,
                n_input_seqs,
                n_seqs_kept,
                n_seqs_unique_kept: retained.len() as u64,
            },
            output,
        })
    }

    /// Re-scan the sample and copy retained reads in their original order
    fn write_retained(
        &self,
        reader: &SampleReader,
        retained: &FxHashSet<SequenceId>,
    ) -> Result<u64> {
        let io_err = |e: std::io::Error| FilterError::SampleIo {
            sample_id: self.sample_id.clone(),
            source: e,
        };

        // opened on the first retained read: an empty FASTQ file is not valid output
        let mut writer: Option<FastqGzWriter> = None;
        reader.process_all(|record| {
            if !retained.contains(&SequenceId::from_sequence(&record.seq())) {
                return Ok(());
            }
            if writer.is_none() {
                writer = Some(FastqGzWriter::create(&self.output).map_err(io_err)?);
            }
            if let Some(w) = writer.as_mut() {
                w.write_record(record).map_err(io_err)?;
            }
            Ok(())
        })?;

        match writer {
            Some(w) => w.finish().map_err(io_err),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::test_utils::write_fastq_gz;
    use std::fs::File;
    use tempfile::tempdir;

    fn job(dir: &std::path::Path, input: PathBuf) -> SampleFilterJob {
        SampleFilterJob {
            sample_id: "s1".to_string(),
            input,
            output: dir.join("s1_0_L001_R1_001.fastq.gz"),
            phred_offset: 33,
            seed: 11,
        }
    }

    #[test]
    fn test_single_sequence_sample_is_kept_whole() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("in.fastq.gz");
        let reads: Vec<(String, &str, &str)> = (0..8)
            .map(|i| (format!("r{}", i), "ACGTTGCA", "IIIIIIII"))
            .collect();
        let reads: Vec<(&str, &str, &str)> =
            reads.iter().map(|(h, s, q)| (h.as_str(), *s, *q)).collect();
        write_fastq_gz(&input, &reads)?;

        let job = job(dir.path(), input);
        let outcome = job.run(&ThresholdEstimator::new(50)?)?;

        assert_eq!(outcome.stats.threshold, 0);
        assert_eq!(outcome.stats.n_input_seqs, 8);
        assert_eq!(outcome.stats.n_seqs_kept, 8);
        assert_eq!(outcome.stats.n_seqs_unique_kept, 1);
        assert_eq!(outcome.output.as_deref(), Some(job.output.as_path()));

        let mut headers = Vec::new();
        SampleReader::new("s1", &job.output, 33).process_all(|record| {
            headers.push(String::from_utf8_lossy(record.id()).into_owned());
            Ok(())
        })?;
        assert_eq!(headers, (0..8).map(|i| format!("r{}", i)).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_empty_sample_writes_nothing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("in.fastq");
        File::create(&input)?;

        let job = job(dir.path(), input);
        let outcome = job.run(&ThresholdEstimator::new(10)?)?;

        assert_eq!(outcome.output, None);
        assert_eq!(outcome.stats.n_input_seqs, 0);
        assert_eq!(outcome.stats.n_seqs_kept, 0);
        assert!(!job.output.exists());
        Ok(())
    }

    #[test]
    fn test_noise_removed_from_dominant_sample() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("in.fastq.gz");
        let mut reads: Vec<(String, String)> = Vec::new();
        for i in 0..100 {
            reads.push((format!("a{}", i), "AAAACCCCGGGG".to_string()));
        }
        for i in 0..50 {
            reads.push((format!("b{}", i), "CCCCGGGGTTTT".to_string()));
        }
        // sixteen singleton errors
        for i in 0..16 {
            let mut noisy = b"AAAACCCCGGGG".to_vec();
            noisy[i % 12] = b'T';
            if i >= 12 {
                noisy[(i + 1) % 12] = b'T';
            }
            reads.push((format!("n{}", i), String::from_utf8(noisy)?));
        }
        let quals: Vec<String> = reads.iter().map(|(_, s)| "I".repeat(s.len())).collect();
        let records: Vec<(&str, &str, &str)> = reads
            .iter()
            .zip(&quals)
            .map(|((h, s), q)| (h.as_str(), s.as_str(), q.as_str()))
            .collect();
        write_fastq_gz(&input, &records)?;

        let job = job(dir.path(), input);
        let outcome = job.run(&ThresholdEstimator::default())?;

        assert_eq!(outcome.stats.n_input_seqs, 166);
        assert_eq!(outcome.stats.n_seqs_unique_kept, 2);
        assert_eq!(outcome.stats.n_seqs_kept, 150);
        assert!(outcome.stats.threshold >= 1 && outcome.stats.threshold < 50);
        Ok(())
    }
}
