use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deadwatch::{
    DeadlockEvent, DeadlockMonitor, JsonFileSource, JsonLinesReporter, MonitorConfig, Reporter,
    SnapshotSource, StderrReporter, WaitForGraph, detect, extract_deadlock_event, logger,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Deadwatch - wait-for graph deadlock monitor"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect deadlocks in a single JSON snapshot and print them
    Analyze {
        /// Path to the snapshot file
        snapshot: PathBuf,
        /// Stack frames printed per thread
        #[arg(long)]
        stack_depth: Option<usize>,
    },
    /// Re-read a JSON snapshot file periodically and report new deadlocks
    Watch {
        /// Path to the snapshot file
        snapshot: PathBuf,
        /// JSON configuration file (sampleIntervalMillis, stackDepthLimit, ...)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Sampling interval in milliseconds (minimum 100)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Stack frames reported per thread
        #[arg(long)]
        stack_depth: Option<usize>,
        /// Write monitor activity to this file
        #[arg(long)]
        log: Option<PathBuf>,
        /// Append reports as JSON lines to this file instead of stderr
        #[arg(long)]
        json_out: Option<PathBuf>,
        /// Stop after this many seconds instead of running until killed
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Analyze {
            snapshot,
            stack_depth,
        } => analyze(snapshot, stack_depth),
        Command::Watch {
            snapshot,
            config,
            interval_ms,
            stack_depth,
            log,
            json_out,
            duration_secs,
        } => {
            let mut monitor_config = match config {
                Some(path) => MonitorConfig::from_json_file(path)?,
                None => MonitorConfig::default(),
            };
            if let Some(millis) = interval_ms {
                monitor_config = monitor_config.with_sample_interval_millis(millis)?;
            }
            if let Some(frames) = stack_depth {
                monitor_config = monitor_config.with_stack_depth_limit(frames);
            }
            if let Some(path) = log {
                logger::init_logger(Some(path)).context("Failed to initialize logger")?;
            }

            let reporter: Box<dyn Fn(&DeadlockEvent) + Send> = match json_out {
                Some(path) => {
                    let sink = JsonLinesReporter::create(path)?;
                    Box::new(move |event: &DeadlockEvent| sink.report(event))
                }
                None => Box::new(|event: &DeadlockEvent| StderrReporter.report(event)),
            };

            watch(snapshot, monitor_config, reporter, duration_secs)
        }
    }
}

fn analyze(path: PathBuf, stack_depth: Option<usize>) -> Result<()> {
    let depth = stack_depth.unwrap_or(deadwatch::DEFAULT_STACK_DEPTH_LIMIT);
    let snapshot = JsonFileSource::new(&path)
        .capture()
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;

    let graph = WaitForGraph::build(&snapshot);
    let events: Vec<DeadlockEvent> = detect(&graph)
        .iter()
        .map(|group| extract_deadlock_event(group, &snapshot, &graph, depth))
        .collect();

    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}

fn watch(
    path: PathBuf,
    config: MonitorConfig,
    reporter: Box<dyn Fn(&DeadlockEvent) + Send>,
    duration_secs: Option<u64>,
) -> Result<()> {
    let monitor = DeadlockMonitor::new(config, JsonFileSource::new(path), reporter);
    let handle = monitor.spawn()?;

    match duration_secs {
        Some(secs) => std::thread::sleep(Duration::from_secs(secs)),
        // The monitor loop only ends on shutdown; park until the process is killed
        None => loop {
            std::thread::park();
        },
    }

    handle.shutdown()?;
    Ok(())
}
