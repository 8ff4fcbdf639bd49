use std::path::{Path, PathBuf};

use log::debug;
use needletail::errors::ParseErrorKind;
use needletail::parser::SequenceRecord;
use needletail::parse_fastx_file;

use crate::error::{FilterError, Result};

/// Reads one sample's FASTQ(.gz) file. Every call to `process_all` re-opens
/// the file, so the same sample can be scanned more than once.
pub struct SampleReader {
    sample_id: String,
    path: PathBuf,
    phred_offset: u8,
}

impl SampleReader {
    pub fn new<P: AsRef<Path>>(sample_id: &str, path: P, phred_offset: u8) -> Self {
        SampleReader {
            sample_id: sample_id.to_string(),
            path: path.as_ref().to_owned(),
            phred_offset,
        }
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process each read of the sample in file order; returns the number of reads
    pub fn process_all<F>(&self, mut callback: F) -> Result<u64>
    where
        F: FnMut(&SequenceRecord) -> Result<()>,
    {
        let mut reader = match parse_fastx_file(&self.path) {
            Ok(reader) => reader,
            // an empty file is a sample with no reads
            Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => {
                debug!("{} is empty", self.path.display());
                return Ok(0);
            }
            Err(e) => return Err(FilterError::sample_io(&self.sample_id, e)),
        };

        let mut num_reads = 0;
        while let Some(record) = reader.next() {
            let record = record.map_err(|e| FilterError::sample_io(&self.sample_id, e))?;
            self.check_quality(&record)?;
            callback(&record)?;
            num_reads += 1;
        }

        debug!("Read {} sequences from {}", num_reads, self.path.display());
        Ok(num_reads)
    }

    /// Reads must carry qualities encodable at the collection's phred offset
    fn check_quality(&self, record: &SequenceRecord) -> Result<()> {
        let invalid = |reason: String| FilterError::InvalidRead {
            sample_id: self.sample_id.clone(),
            read_id: String::from_utf8_lossy(record.id()).into_owned(),
            reason,
        };

        let qual = record
            .qual()
            .ok_or_else(|| invalid("missing quality scores".to_string()))?;
        if let Some(&q) = qual.iter().find(|&&q| q < self.phred_offset) {
            return Err(invalid(format!(
                "quality character {:?} is below phred offset {}",
                q as char, self.phred_offset
            )));
        }
        Ok(())
    }
}
