//! CIR optimizer driver
//!
//! Reads modules in the CIR textual format, runs the configured pipeline
//! over each one and prints the result. Every input is an independent
//! translation unit; several inputs are processed in parallel.

mod report;
mod unit;

use anyhow::{bail, Context as _, Result};
use clap::{ArgAction, Parser, ValueEnum};
use cir_transforms::PipelineOptions;
use log::{info, LevelFilter};
use rayon::prelude::*;
use report::print_diagnostics;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use unit::{process_unit, UnitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DiagnosticsFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "cir-opt")]
#[command(about = "Canonicalize and prepare CIR modules for lowering")]
#[command(version)]
struct Cli {
    /// Input files in the CIR textual format
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file; a directory when there are several inputs. Defaults to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated pass list, replacing the configured one
    #[arg(long, value_name = "LIST")]
    passes: Option<String>,

    /// Pipeline options as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parse and verify only
    #[arg(long)]
    verify_only: bool,

    /// Verify after every pass
    #[arg(long)]
    verify_each: bool,

    /// Unroll constant-length array loops up to this many elements
    #[arg(long, value_name = "N")]
    unroll_threshold: Option<u64>,

    #[arg(long, value_enum, default_value_t = DiagnosticsFormat::Text)]
    diagnostics_format: DiagnosticsFormat,

    /// More logging; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn pipeline_options(&self) -> Result<PipelineOptions> {
        let mut options = match &self.config {
            Some(path) => PipelineOptions::from_file(path)
                .with_context(|| format!("failed to load pipeline options from {}", path.display()))?,
            None => PipelineOptions::default(),
        };
        if let Some(passes) = &self.passes {
            options.set_passes(passes);
        }
        if self.verify_each {
            options.verify_each = true;
        }
        if let Some(threshold) = self.unroll_threshold {
            options.lowering.unroll_threshold = threshold;
        }
        // Reject unknown pass names before touching any input
        options.build_pass_manager()?;
        Ok(options)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = cli.pipeline_options()?;
    info!("pipeline: {}", options.passes.join(", "));

    let outcomes: Vec<UnitOutcome> = cli
        .inputs
        .par_iter()
        .map(|path| process_unit(path, &options, cli.verify_only))
        .collect();

    let mut failed = false;
    for outcome in &outcomes {
        print_diagnostics(&outcome.diagnostics, cli.diagnostics_format == DiagnosticsFormat::Json);
        failed |= outcome.diagnostics.has_errors();
    }
    if !cli.verify_only {
        write_outputs(&outcomes, cli.output.as_deref())?;
    }
    if failed {
        process::exit(1);
    }
    Ok(())
}

/// Print or write the module text of every unit that succeeded
fn write_outputs(outcomes: &[UnitOutcome], output: Option<&Path>) -> Result<()> {
    let Some(output) = output else {
        for text in outcomes.iter().filter_map(|o| o.text.as_deref()) {
            print!("{}", text);
        }
        return Ok(());
    };

    if outcomes.len() == 1 {
        if let Some(text) = &outcomes[0].text {
            fs::write(output, text).with_context(|| format!("failed to write {}", output.display()))?;
        }
        return Ok(());
    }

    if output.is_file() {
        bail!("{} must be a directory when there are several inputs", output.display());
    }
    fs::create_dir_all(output).with_context(|| format!("failed to create {}", output.display()))?;
    for outcome in outcomes {
        let (Some(text), Some(name)) = (&outcome.text, outcome.path.file_name()) else {
            continue;
        };
        let target = output.join(name);
        fs::write(&target, text).with_context(|| format!("failed to write {}", target.display()))?;
    }
    Ok(())
}
