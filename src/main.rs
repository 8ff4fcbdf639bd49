mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use abundance_filter::io::{write_stats, CountTable, StatsFormat};
use abundance_filter::{PipelineOrchestrator, SequenceBounds, StatsTable};

use crate::cli::{Cli, Commands, FilterCommand, ThresholdCommand};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(log_file) = &cli.log_file {
        let file = File::create(log_file)
            .with_context(|| format!("Failed to create log file {}", log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    if cli.threads == 0 {
        return Err(anyhow::anyhow!("--threads must be at least 1"));
    }

    match cli.command {
        Commands::Filter(cmd) => handle_filter_command(cmd, cli.threads)?,
        Commands::Threshold(cmd) => handle_threshold_command(cmd, cli.threads)?,
    }

    Ok(())
}

fn handle_filter_command(cmd: FilterCommand, threads: usize) -> Result<()> {
    let orchestrator = PipelineOrchestrator::new(cmd.bootstrap.config(threads))?;

    info!(
        "Filtering {} into {} with {} bootstrap replicates",
        cmd.input_dir.display(),
        cmd.output_dir.display(),
        cmd.bootstrap.replicates
    );
    let output = orchestrator
        .run(&cmd.input_dir, &cmd.output_dir)
        .with_context(|| format!("Failed to filter {}", cmd.input_dir.display()))?;
    info!(
        "Wrote {} of {} samples to {}",
        output.collection.manifest().len(),
        output.stats.len(),
        output.collection.root().display()
    );

    output_stats(&output.stats, cmd.stats_format.into(), cmd.stats)
}

fn handle_threshold_command(cmd: ThresholdCommand, threads: usize) -> Result<()> {
    let table = CountTable::read_csv(&cmd.table)
        .with_context(|| format!("Failed to read count table {}", cmd.table.display()))?;
    info!(
        "Read {} sequences across {} samples",
        table.feature_ids().len(),
        table.sample_ids().len()
    );

    let orchestrator = PipelineOrchestrator::new(cmd.bootstrap.config(threads))?;
    let output = orchestrator.filter_table(&table)?;

    if let Some(path) = &cmd.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        output.table.write_csv(BufWriter::new(file))?;
        info!("Filtered table written to {}", path.display());
    }

    if let Some(path) = &cmd.bounds {
        output_bounds(&output.bounds, path)?;
    }

    output_stats(&output.stats, cmd.stats_format.into(), cmd.stats)
}

fn output_stats(stats: &StatsTable, format: StatsFormat, output: Option<PathBuf>) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout()),
    };
    write_stats(stats, format, writer)?;
    Ok(())
}

fn output_bounds(bounds: &[(String, Vec<SequenceBounds>)], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
    );

    writeln!(writer, "sample-id\tsequence-id\tobserved\tmean\tq005\tq995\tadjusted\tlower\tupper")?;
    for (sample_id, sample_bounds) in bounds {
        for b in sample_bounds {
            writeln!(
                writer,
                "{}\t{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}\t{:.4}\t{:.4}",
                sample_id, b.id, b.observed, b.mean, b.q005, b.q995, b.adjusted, b.lower, b.upper,
            )?;
        }
    }
    writer.flush()?;
    info!("Bootstrap bounds written to {}", path.display());
    Ok(())
}
