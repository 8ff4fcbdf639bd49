use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use fxhash::FxHashSet;
use log::{debug, info};
use rand::Rng;
use rayon::prelude::*;
use tempfile::TempDir;

use super::job::{SampleFilterJob, SampleKey};
use super::types::{sample_seed, FilterConfig, SampleOutcome, StatsTable};
use crate::abundance::ThresholdEstimator;
use crate::error::{FilterError, Result};
use crate::io::{output_file_name, Manifest, ManifestRecord, SampleCollection};

/// How per-sample jobs are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// One after another on the calling thread, in manifest order
    Sequential,
    /// On a dedicated pool with this many workers
    Pool(usize),
}

impl Dispatch {
    pub fn from_threads(threads: usize) -> Self {
        if threads <= 1 {
            Dispatch::Sequential
        } else {
            Dispatch::Pool(threads)
        }
    }

    /// Run every job to completion and return the results in job order.
    ///
    /// Results are collected keyed by sample id, so the order in which workers
    /// finish has no effect on the returned order. Sample ids must be unique;
    /// a repeated id is rejected before any job runs.
    pub fn run<J, T, F>(&self, jobs: &[J], run: F) -> Result<Vec<Result<T>>>
    where
        J: SampleKey + Sync,
        T: Send + Sync,
        F: Fn(&J) -> Result<T> + Sync,
    {
        let mut seen = FxHashSet::default();
        if let Some(job) = jobs.iter().find(|job| !seen.insert(job.sample_id())) {
            return Err(FilterError::InvalidInput(format!(
                "sample '{}' is scheduled more than once",
                job.sample_id()
            )));
        }

        let results: DashMap<String, Result<T>> = DashMap::with_capacity(jobs.len());

        match *self {
            Dispatch::Sequential => {
                for job in jobs {
                    results.insert(job.sample_id().to_string(), run(job));
                }
            }
            Dispatch::Pool(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?;
                debug!("Dispatching {} jobs on {} workers", jobs.len(), threads);
                pool.install(|| {
                    jobs.par_iter().for_each(|job| {
                        results.insert(job.sample_id().to_string(), run(job));
                    });
                });
            }
        }

        jobs.iter()
            .map(|job| {
                results
                    .remove(job.sample_id())
                    .map(|(_, result)| result)
                    .ok_or_else(|| {
                        FilterError::InvalidInput(format!(
                            "no result for sample '{}'",
                            job.sample_id()
                        ))
                    })
            })
            .collect()
    }
}

/// The filtered collection written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredCollection {
    root: PathBuf,
    manifest: Manifest,
}

impl FilteredCollection {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Samples that kept at least one read
    pub fn sample_ids(&self) -> Vec<&str> {
        self.manifest.sample_ids().collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub collection: FilteredCollection,
    pub stats: StatsTable,
}

/// Runs abundance filtering over every sample of a collection
pub struct PipelineOrchestrator {
    config: FilterConfig,
    estimator: ThresholdEstimator,
}

impl PipelineOrchestrator {
    pub fn new(config: FilterConfig) -> Result<Self> {
        Ok(PipelineOrchestrator {
            estimator: ThresholdEstimator::new(config.replicates)?,
            config,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub(crate) fn estimator(&self) -> &ThresholdEstimator {
        &self.estimator
    }

    /// Seed for this batch, logged so unseeded runs can be repeated
    pub(crate) fn batch_seed(&self) -> u64 {
        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        info!("Bootstrap seed: {}", seed);
        seed
    }

    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Q,
    ) -> Result<PipelineOutput> {
        let collection = SampleCollection::open(input_dir)?;
        self.run_collection(&collection, output_dir)
    }

    /// Filter every sample and publish the surviving ones under `output_dir`.
    ///
    /// Nothing is written to `output_dir` unless every job succeeded and at
    /// least one sample kept a read.
    /// An existing `output_dir` must be empty.
    pub fn run_collection<P: AsRef<Path>>(
        &self,
        collection: &SampleCollection,
        output_dir: P,
    ) -> Result<PipelineOutput> {
        let output_dir = output_dir.as_ref();
        let samples = collection.samples();
        if samples.is_empty() {
            return Err(FilterError::Manifest("no samples listed".to_string()));
        }
        check_output_dir(output_dir)?;
        info!(
            "Filtering {} samples with {} bootstrap replicates",
            samples.len(),
            self.estimator.replicates()
        );

        let batch_seed = self.batch_seed();
        let staging = staging_dir(output_dir)?;
        debug!("Staging output in {}", staging.path().display());

        let output_names: HashMap<&str, String> = samples
            .iter()
            .map(|s| (s.sample_id.as_str(), output_file_name(&s.sample_id, s.position)))
            .collect();

        let jobs: Vec<SampleFilterJob> = samples
            .iter()
            .map(|s| SampleFilterJob {
                sample_id: s.sample_id.clone(),
                input: s.path.clone(),
                output: staging.path().join(&output_names[s.sample_id.as_str()]),
                phred_offset: collection.metadata().phred_offset(),
                seed: sample_seed(batch_seed, &s.sample_id),
            })
            .collect();

        let outcomes = Dispatch::from_threads(self.config.threads)
            .run(&jobs, |job| job.run(&self.estimator))?
            .into_iter()
            .collect::<Result<Vec<SampleOutcome>>>()?;

        let stats = StatsTable::new(outcomes.iter().map(|o| o.stats.clone()).collect());
        if stats.all_empty() {
            return Err(FilterError::AllSamplesEmpty);
        }

        let collection = publish(&outcomes, collection, staging, output_dir)?;
        info!(
            "{} of {} samples kept reads; output written to {}",
            collection.manifest().len(),
            stats.len(),
            output_dir.display()
        );
        Ok(PipelineOutput { collection, stats })
    }
}

/// Private directory next to `output_dir`, removed when dropped
fn staging_dir(output_dir: &Path) -> Result<TempDir> {
    let parent = match output_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    Ok(tempfile::Builder::new()
        .prefix(".abundance-filter-")
        .tempdir_in(&parent)?)
}

/// `output_dir` must be absent or an empty directory
fn check_output_dir(output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    if !output_dir.is_dir() || fs::read_dir(output_dir)?.next().is_some() {
        return Err(FilterError::InvalidInput(format!(
            "output directory '{}' already exists and is not empty",
            output_dir.display()
        )));
    }
    Ok(())
}

/// Write the index next to the staged sample files, then move the whole
/// staging directory to `output_dir` in one rename.
fn publish(
    outcomes: &[SampleOutcome],
    input: &SampleCollection,
    staging: TempDir,
    output_dir: &Path,
) -> Result<FilteredCollection> {
    let mut records = Vec::new();
    for outcome in outcomes {
        let Some(staged) = &outcome.output else {
            continue;
        };
        let filename = staged
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FilterError::sample_io(&outcome.stats.sample_id, "staged output has no file name")
            })?;
        records.push(ManifestRecord {
            sample_id: outcome.stats.sample_id.clone(),
            filename,
            direction: "forward".to_string(),
        });
    }

    let manifest = Manifest::new(records)?;
    SampleCollection::write_index(staging.path(), &manifest, input.metadata())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging.path(), fs::Permissions::from_mode(0o755))?;
    }

    // a directory created while the jobs ran is only replaced if still empty
    check_output_dir(output_dir)?;
    if output_dir.exists() {
        fs::remove_dir(output_dir)?;
    }
    fs::rename(staging.path(), output_dir)?;
    debug!("Published {} to {}", staging.path().display(), output_dir.display());

    Ok(FilteredCollection {
        root: output_dir.to_owned(),
        manifest,
    })
}
