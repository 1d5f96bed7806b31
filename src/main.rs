//! Climop - command-line driver.

use anyhow::{Context, Result};
use clap::Parser;
use climop::config::{JobConfig, Reference};
use climop::job;
use climop::writer::TraceSink;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "climop")]
#[command(about = "Select and describe climate model output for archiving", long_about = None)]
struct Args {
    /// Path to the YAML file listing the jobs to run
    #[arg(short, long)]
    config: PathBuf,

    /// Enable logging to specified file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log debug detail
    #[arg(long)]
    debug: bool,
}

/// Top-level run file: a list of jobs.
#[derive(Debug, Deserialize)]
struct RunConfig {
    jobs: Vec<JobConfig>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    if let Some(log_path) = &args.log {
        let log_path = log_path.clone();
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(move || {
                std::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&log_path)
                    .expect("Failed to open log file")
            })
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    tracing::info!("Starting climop");

    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("cannot read {}", args.config.display()))?;
    let run: RunConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("cannot parse {}", args.config.display()))?;
    let refs = Reference::load()?;

    let mut sink = TraceSink::default();
    let reports = job::run_all(&run.jobs, &refs, &mut sink);
    tracing::info!("{} of {} jobs completed", reports.len(), run.jobs.len());

    if reports.len() < run.jobs.len() {
        std::process::exit(1);
    }
    Ok(())
}
