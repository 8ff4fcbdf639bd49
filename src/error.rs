use thiserror::Error;

/// Errors raised while estimating thresholds or filtering a sample collection
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "All sequences from all samples were filtered out. \
         The parameter choices may be too stringent for the data."
    )]
    AllSamplesEmpty,

    #[error("I/O failure for sample '{sample_id}': {source}")]
    SampleIo {
        sample_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid read '{read_id}' in sample '{sample_id}': {reason}")]
    InvalidRead {
        sample_id: String,
        read_id: String,
        reason: String,
    },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Invalid metadata: {0}")]
    Metadata(String),

    #[error("Invalid count table: {0}")]
    CountTable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl FilterError {
    /// Wrap any I/O-ish failure as a per-sample error
    pub fn sample_io<E>(sample_id: &str, err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        FilterError::SampleIo {
            sample_id: sample_id.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_io_message() {
        let err = FilterError::sample_io("s1", "truncated gzip stream");
        assert_eq!(
            err.to_string(),
            "I/O failure for sample 's1': truncated gzip stream"
        );
    }

    #[test]
    fn test_all_samples_empty_message() {
        assert!(FilterError::AllSamplesEmpty
            .to_string()
            .starts_with("All sequences from all samples were filtered out"));
    }
}
