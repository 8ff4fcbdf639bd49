use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::abundance::{FrequencyDistribution, SequenceId};
use crate::error::{FilterError, Result};

/// Dereplicated counts: one row per unique sequence, one column per sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountTable {
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
    counts: Vec<Vec<u64>>,
}

impl CountTable {
    pub fn new(
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
        counts: Vec<Vec<u64>>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = sample_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(FilterError::CountTable(format!(
                "sample '{}' appears in more than one column",
                duplicate
            )));
        }
        if counts.len() != feature_ids.len() {
            return Err(FilterError::CountTable(format!(
                "{} feature ids but {} rows",
                feature_ids.len(),
                counts.len()
            )));
        }
        if let Some((i, row)) = counts
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != sample_ids.len())
        {
            return Err(FilterError::CountTable(format!(
                "row '{}' has {} values, expected {}",
                feature_ids[i],
                row.len(),
                sample_ids.len()
            )));
        }
        Ok(CountTable {
            feature_ids,
            sample_ids,
            counts,
        })
    }

    /// Read a CSV table; the first column holds feature ids, the header names
    /// the samples
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(FilterError::CountTable(
                "expected a feature id column and at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut feature_ids = Vec::new();
        let mut counts = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let feature = record.get(0).unwrap_or_default().to_string();
            let values = record
                .iter()
                .skip(1)
                .enumerate()
                .map(|(col, value)| parse_count(value, row, col + 1))
                .collect::<Result<Vec<u64>>>()?;
            feature_ids.push(feature);
            counts.push(values);
        }

        CountTable::new(feature_ids, sample_ids, counts)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(
            std::iter::once("feature-id").chain(self.sample_ids.iter().map(String::as_str)),
        )?;
        for (feature, row) in self.feature_ids.iter().zip(&self.counts) {
            csv_writer.write_record(
                std::iter::once(feature.clone()).chain(row.iter().map(|c| c.to_string())),
            )?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn get(&self, feature: usize, sample: usize) -> u64 {
        self.counts[feature][sample]
    }

    /// Observed sequences of one sample; zero cells are not observations and
    /// are left out
    pub fn sample_distribution(&self, sample: usize) -> Result<FrequencyDistribution> {
        FrequencyDistribution::from_counts(
            self.feature_ids
                .iter()
                .zip(&self.counts)
                .filter(|(_, row)| row[sample] > 0)
                .map(|(feature, row)| (SequenceId::new(feature.as_str()), row[sample])),
        )
    }

    /// Keep only features with a non-zero count in at least one sample
    pub fn drop_empty_features(self) -> Self {
        let (feature_ids, counts) = self
            .feature_ids
            .into_iter()
            .zip(self.counts)
            .filter(|(_, row)| row.iter().any(|&c| c > 0))
            .unzip();
        CountTable {
            feature_ids,
            sample_ids: self.sample_ids,
            counts,
        }
    }
}

fn parse_count(value: &str, row: usize, col: usize) -> Result<u64> {
    value
        .parse::<u64>()
        .or_else(|_| {
            // biom exports write integral counts as floats
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                .map(|v| v as u64)
                .ok_or(())
        })
        .map_err(|_| {
            FilterError::CountTable(format!(
                "invalid count '{}' at row {}, column {}",
                value, row, col
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_csv() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("table.csv");
        fs::write(&path, "feature-id,s1,s2\nf1,10,0\nf2,1.0,3\n")?;

        let table = CountTable::read_csv(&path)?;
        assert_eq!(table.sample_ids(), &["s1".to_string(), "s2".to_string()]);
        assert_eq!(table.get(1, 0), 1);

        let s2 = table.sample_distribution(1)?;
        assert_eq!(s2.len(), 1);
        assert_eq!(s2.get(&SequenceId::new("f2")), 3);
        Ok(())
    }

    #[test]
    fn test_invalid_count_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("table.csv");
        fs::write(&path, "feature-id,s1\nf1,-4\n")?;
        assert!(matches!(CountTable::read_csv(&path), Err(FilterError::CountTable(_))));
        Ok(())
    }

    #[test]
    fn test_repeated_sample_column_rejected() -> anyhow::Result<()> {
        let result = CountTable::new(
            vec!["f0".into(), "f1".into(), "n".into()],
            vec!["s1".into(), "s1".into()],
            vec![vec![100, 90], vec![50, 40], vec![1, 1]],
        );
        assert!(matches!(result, Err(FilterError::CountTable(msg)) if msg.contains("'s1'")));

        let dir = tempdir()?;
        let path = dir.path().join("table.csv");
        fs::write(&path, "feature-id,s1,s1\nf0,100,90\n")?;
        assert!(matches!(CountTable::read_csv(&path), Err(FilterError::CountTable(_))));
        Ok(())
    }

    #[test]
    fn test_drop_empty_features_and_write() -> anyhow::Result<()> {
        let table = CountTable::new(
            vec!["f1".into(), "f2".into(), "f3".into()],
            vec!["s1".into(), "s2".into()],
            vec![vec![5, 0], vec![0, 0], vec![0, 2]],
        )?
        .drop_empty_features();

        let mut out = Vec::new();
        table.write_csv(&mut out)?;
        assert_eq!(String::from_utf8(out)?, "feature-id,s1,s2\nf1,5,0\nf3,0,2\n");
        Ok(())
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = CountTable::new(
            vec!["f1".into()],
            vec!["s1".into(), "s2".into()],
            vec![vec![1]],
        );
        assert!(result.is_err());
    }
}
