use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use abundance_filter::io::StatsFormat as StatsWriterFormat;
use abundance_filter::FilterConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bootstrap abundance filtering of sequencing reads (Wang et al.)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of samples to filter in parallel
    #[arg(short, long, global = true, default_value = "1")]
    pub threads: usize,

    /// Path to log file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter the reads of every sample in a demultiplexed collection
    Filter(FilterCommand),

    /// Threshold and filter an already dereplicated count table
    Threshold(ThresholdCommand),
}

#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    /// Bootstrap replicates per sample
    #[arg(short, long, default_value = "1000")]
    pub replicates: usize,

    /// Random seed (drawn at random and logged when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct FilterCommand {
    /// Input directory with MANIFEST, metadata.yml and per-sample FASTQ.GZ files
    pub input_dir: PathBuf,

    /// Output directory for the filtered collection
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Stats table output (defaults to stdout)
    #[arg(short, long)]
    pub stats: Option<PathBuf>,

    /// Stats table format
    #[arg(short = 'f', long, value_enum, default_value = "csv")]
    pub stats_format: StatsFormat,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,
}

#[derive(Parser, Debug)]
pub struct ThresholdCommand {
    /// Count table CSV: feature ids in the first column, one column per sample
    pub table: PathBuf,

    /// Write the filtered count table here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stats table output (defaults to stdout)
    #[arg(short, long)]
    pub stats: Option<PathBuf>,

    /// Stats table format
    #[arg(short = 'f', long, value_enum, default_value = "csv")]
    pub stats_format: StatsFormat,

    /// Write per-sequence bootstrap bounds (TSV)
    #[arg(long)]
    pub bounds: Option<PathBuf>,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum StatsFormat {
    Csv,
    Json,
}

impl From<StatsFormat> for StatsWriterFormat {
    fn from(format: StatsFormat) -> Self {
        match format {
            StatsFormat::Csv => Self::Csv,
            StatsFormat::Json => Self::Json,
        }
    }
}

impl BootstrapArgs {
    pub fn config(&self, threads: usize) -> FilterConfig {
        FilterConfig {
            replicates: self.replicates,
            seed: self.seed,
            threads,
        }
    }
}
