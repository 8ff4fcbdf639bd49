use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use needletail::parser::SequenceRecord;

use crate::error::{FilterError, Result};
use crate::pipeline::StatsTable;

/// Gzip FASTQ output for one sample.
///
/// Records are written as they were read. `finish` must be called to flush the
/// gzip trailer; a writer dropped early leaves a truncated file behind.
pub struct FastqGzWriter {
    path: PathBuf,
    encoder: GzEncoder<BufWriter<File>>,
    num_written: u64,
}

impl FastqGzWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::create(&path)?;
        Ok(FastqGzWriter {
            path,
            encoder: GzEncoder::new(BufWriter::new(file), Compression::default()),
            num_written: 0,
        })
    }

    pub fn write_record(&mut self, record: &SequenceRecord) -> std::io::Result<()> {
        record
            .write(&mut self.encoder, None)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        self.num_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the gzip stream; returns the number of records written
    pub fn finish(self) -> std::io::Result<u64> {
        let mut inner = self.encoder.finish()?;
        inner.flush()?;
        Ok(self.num_written)
    }
}

/// Serialization format of the stats table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsFormat {
    Csv,
    Json,
}

/// Write the stats table as CSV with the `sample-id,threshold,...` header
pub fn write_stats_csv<W: Write>(stats: &StatsTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in stats.records() {
        csv_writer.serialize(record)?;
    }
    if stats.is_empty() {
        csv_writer.write_record(crate::pipeline::STATS_HEADER)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_stats<W: Write>(stats: &StatsTable, format: StatsFormat, mut writer: W) -> Result<()> {
    match format {
        StatsFormat::Csv => write_stats_csv(stats, writer),
        StatsFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, stats.records())?;
            writeln!(writer)?;
            Ok(())
        }
    }
}

/// Write the stats table to a file
pub fn write_stats_file<P: AsRef<Path>>(
    stats: &StatsTable,
    format: StatsFormat,
    path: P,
) -> Result<()> {
    let file = File::create(path.as_ref()).map_err(FilterError::Io)?;
    write_stats(stats, format, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::test_utils::write_fastq_gz;
    use crate::io::SampleReader;
    use crate::pipeline::SampleStatsRecord;
    use tempfile::tempdir;

    fn table() -> StatsTable {
        StatsTable::new(vec![
            SampleStatsRecord {
                sample_id: "s1".to_string(),
                threshold: 1,
                n_input_seqs: 152,
                n_seqs_kept: 150,
                n_seqs_unique_kept: 2,
            },
            SampleStatsRecord {
                sample_id: "s2".to_string(),
                threshold: 1,
                n_input_seqs: 20,
                n_seqs_kept: 0,
                n_seqs_unique_kept: 0,
            },
        ])
    }

    #[test]
    fn test_stats_csv_layout() -> anyhow::Result<()> {
        let mut out = Vec::new();
        write_stats_csv(&table(), &mut out)?;
        let text = String::from_utf8(out)?;
        assert_eq!(
            text,
            "sample-id,threshold,n_input_seqs,n_seqs_kept,n_seqs_unique_kept\n\
             s1,1,152,150,2\n\
             s2,1,20,0,0\n"
        );
        Ok(())
    }

    #[test]
    fn test_empty_stats_still_has_header() -> anyhow::Result<()> {
        let mut out = Vec::new();
        write_stats_csv(&StatsTable::default(), &mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "sample-id,threshold,n_input_seqs,n_seqs_kept,n_seqs_unique_kept\n"
        );
        Ok(())
    }

    #[test]
    fn test_stats_json() -> anyhow::Result<()> {
        let mut out = Vec::new();
        write_stats(&table(), StatsFormat::Json, &mut out)?;
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(value[0]["sample-id"], "s1");
        assert_eq!(value[1]["n_seqs_kept"], 0);
        Ok(())
    }

    #[test]
    fn test_records_round_trip_unchanged() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("in.fastq.gz");
        let output = dir.path().join("out.fastq.gz");
        let reads = [("r1 desc=1", "ACGTN", "II#5!"), ("r2", "TTGCA", "@@@@@")];
        write_fastq_gz(&input, &reads)?;

        let mut writer = FastqGzWriter::create(&output)?;
        SampleReader::new("s", &input, 33).process_all(|record| {
            writer
                .write_record(record)
                .map_err(|e| FilterError::sample_io("s", e))
        })?;
        assert_eq!(writer.finish()?, 2);

        let mut seen = Vec::new();
        SampleReader::new("s", &output, 33).process_all(|record| {
            seen.push((
                String::from_utf8_lossy(record.id()).into_owned(),
                String::from_utf8_lossy(&record.seq()).into_owned(),
                String::from_utf8_lossy(record.qual().unwrap_or_default()).into_owned(),
            ));
            Ok(())
        })?;

        let expected: Vec<_> = reads
            .iter()
            .map(|(i, s, q)| (i.to_string(), s.to_string(), q.to_string()))
            .collect();
        assert_eq!(seen, expected);
        Ok(())
    }
}
