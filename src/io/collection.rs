use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{FilterError, Result};

pub const MANIFEST_FILE: &str = "MANIFEST";
pub const METADATA_FILE: &str = "metadata.yml";
const PHRED_OFFSET_KEY: &str = "phred-offset";

const MANIFEST_PREAMBLE: &str = "sample-id,filename,direction\n\
# direction is not meaningful in this file as these\n\
# data may be derived from forward, reverse, or \n\
# joined reads\n";

/// One row of a per-sample sequence manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    #[serde(rename = "sample-id")]
    pub sample_id: String,
    pub filename: String,
    pub direction: String,
}

/// Sample listing of a collection, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    records: Vec<ManifestRecord>,
}

impl Manifest {
    pub fn new(records: Vec<ManifestRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for record in &records {
            if record.sample_id.is_empty() {
                return Err(FilterError::Manifest(format!(
                    "empty sample id for file '{}'",
                    record.filename
                )));
            }
            if !seen.insert(record.sample_id.as_str()) {
                return Err(FilterError::Manifest(format!(
                    "sample '{}' is listed more than once",
                    record.sample_id
                )));
            }
        }
        Ok(Manifest { records })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<ManifestRecord>, _>>()?;
        Manifest::new(records)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = BufWriter::new(File::create(path.as_ref())?);
        file.write_all(MANIFEST_PREAMBLE.as_bytes())?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    pub fn sample_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.sample_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Collection-level metadata; keys other than the phred offset are carried through untouched
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    phred_offset: u8,
    raw: Mapping,
}

impl Metadata {
    pub fn new(phred_offset: u8) -> Result<Self> {
        let mut raw = Mapping::new();
        raw.insert(Value::from(PHRED_OFFSET_KEY), Value::from(phred_offset as u64));
        Metadata::from_mapping(raw)
    }

    fn from_mapping(raw: Mapping) -> Result<Self> {
        let offset = raw
            .get(PHRED_OFFSET_KEY)
            .ok_or_else(|| FilterError::Metadata(format!("missing '{}'", PHRED_OFFSET_KEY)))?
            .as_u64()
            .ok_or_else(|| {
                FilterError::Metadata(format!("'{}' must be an integer", PHRED_OFFSET_KEY))
            })?;
        match offset {
            33 | 64 => Ok(Metadata {
                phred_offset: offset as u8,
                raw,
            }),
            other => Err(FilterError::Metadata(format!(
                "unsupported phred offset {} (expected 33 or 64)",
                other
            ))),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let raw: Mapping = serde_yaml::from_reader(file)?;
        Metadata::from_mapping(raw)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), serde_yaml::to_string(&self.raw)?)?;
        Ok(())
    }

    pub fn phred_offset(&self) -> u8 {
        self.phred_offset
    }
}

/// A sample to process: its id, input file and position in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub sample_id: String,
    pub path: PathBuf,
    pub position: usize,
}

/// Directory of per-sample FASTQ.GZ files with a manifest and metadata
#[derive(Debug, Clone)]
pub struct SampleCollection {
    root: PathBuf,
    manifest: Manifest,
    metadata: Metadata,
}

impl SampleCollection {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_owned();
        let manifest = Manifest::read(root.join(MANIFEST_FILE))?;
        let metadata = Metadata::read(root.join(METADATA_FILE))?;
        Ok(SampleCollection {
            root,
            manifest,
            metadata,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Samples in manifest order
    pub fn samples(&self) -> Vec<SampleEntry> {
        self.manifest
            .records()
            .iter()
            .enumerate()
            .map(|(position, r)| SampleEntry {
                sample_id: r.sample_id.clone(),
                path: self.root.join(&r.filename),
                position,
            })
            .collect()
    }

    /// Write the manifest and metadata of a collection rooted at `root`
    pub fn write_index<P: AsRef<Path>>(
        root: P,
        manifest: &Manifest,
        metadata: &Metadata,
    ) -> Result<()> {
        let root = root.as_ref();
        manifest.write(root.join(MANIFEST_FILE))?;
        metadata.write(root.join(METADATA_FILE))?;
        Ok(())
    }
}

/// Casava-style file name for a single-end sample
pub fn output_file_name(sample_id: &str, barcode: usize) -> String {
    format!("{}_{}_L001_R1_001.fastq.gz", sample_id, barcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_skips_comments() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(
            &path,
            "sample-id,filename,direction\n\
             # a comment\n\
             s1,s1_0_L001_R1_001.fastq.gz,forward\n\
             s2,s2_1_L001_R1_001.fastq.gz,forward\n",
        )?;

        let manifest = Manifest::read(&path)?;
        assert_eq!(manifest.sample_ids().collect::<Vec<_>>(), vec!["s1", "s2"]);
        assert_eq!(manifest.records()[1].filename, "s2_1_L001_R1_001.fastq.gz");
        Ok(())
    }

    #[test]
    fn test_manifest_round_trip_with_preamble() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(MANIFEST_FILE);
        let manifest = Manifest::new(vec![ManifestRecord {
            sample_id: "s1".to_string(),
            filename: output_file_name("s1", 0),
            direction: "forward".to_string(),
        }])?;
        manifest.write(&path)?;

        let text = fs::read_to_string(&path)?;
        assert!(text.starts_with("sample-id,filename,direction\n# direction"));
        assert_eq!(Manifest::read(&path)?, manifest);
        Ok(())
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        let record = ManifestRecord {
            sample_id: "s1".to_string(),
            filename: "a.fastq.gz".to_string(),
            direction: "forward".to_string(),
        };
        let result = Manifest::new(vec![record.clone(), record]);
        assert!(matches!(result, Err(FilterError::Manifest(_))));
    }

    #[test]
    fn test_metadata_keeps_extra_keys() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(METADATA_FILE);
        fs::write(&path, "phred-offset: 64\nsource: casava\n")?;

        let metadata = Metadata::read(&path)?;
        assert_eq!(metadata.phred_offset(), 64);

        let copy = dir.path().join("copy.yml");
        metadata.write(&copy)?;
        let reread = fs::read_to_string(&copy)?;
        assert!(reread.contains("source: casava"));
        assert_eq!(Metadata::read(&copy)?, metadata);
        Ok(())
    }

    #[test]
    fn test_metadata_rejects_bad_offset() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(METADATA_FILE);
        fs::write(&path, "phred-offset: 40\n")?;
        assert!(matches!(Metadata::read(&path), Err(FilterError::Metadata(_))));

        fs::write(&path, "other: 1\n")?;
        assert!(matches!(Metadata::read(&path), Err(FilterError::Metadata(_))));
        Ok(())
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("gut-1", 3), "gut-1_3_L001_R1_001.fastq.gz");
    }
}
