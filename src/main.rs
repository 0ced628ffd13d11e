//! layer-diff - change-set between two directory trees
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use layer_diff::changes::{changes, Change, ChangeCounts, ChangeKind};
use layer_diff::config::{CliArgs, DiffConfig, Strategy};
use layer_diff::progress::{print_header, print_summary, ProgressReporter};
use layer_diff::tree::FileTree;
use layer_diff::walker::{DiffStats, TreeDiffer};
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    let config = DiffConfig::from_args(&args).context("Invalid configuration")?;

    setup_logging(config.verbose)?;

    if config.show_progress {
        let schedule = match config.strategy {
            Strategy::Sequential => "sequential".to_string(),
            Strategy::WorkerPool => format!("{} workers", config.worker_count),
        };
        print_header(&args.old, &args.new, &schedule);
    }

    let differ = TreeDiffer::new(config.clone());

    let progress = config.show_progress.then(ProgressReporter::new);
    let done = AtomicBool::new(false);

    let outcome = thread::scope(|scope| {
        if let Some(ref p) = progress {
            let stats = differ.stats();
            let done = &done;
            scope.spawn(move || poll_progress(p, &stats, done));
        }

        let result = differ.run(&args.old, &args.new);
        done.store(true, Ordering::SeqCst);
        result
    });

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    let outcome = outcome.with_context(|| {
        format!(
            "Diff of '{}' against '{}' failed",
            args.new.display(),
            args.old.display()
        )
    })?;

    let list = changes(&outcome.old, &outcome.new);
    let counts = ChangeCounts::tally(&list);

    if !config.summary_only {
        write_changes(&list).context("Failed to write change list")?;
    }

    info!(
        added = counts.added,
        modified = counts.modified,
        deleted = counts.deleted,
        "Changes classified"
    );

    if config.show_progress {
        let bytes = changed_bytes(&outcome.new, &list);
        print_summary(&outcome.stats, &counts, bytes, outcome.duration);
    }

    Ok(())
}

fn poll_progress(reporter: &ProgressReporter, stats: &DiffStats, done: &AtomicBool) {
    let start = Instant::now();
    reporter.set_status("Reading directories...");
    while !done.load(Ordering::SeqCst) {
        reporter.update(&stats.summary(), start.elapsed());
        thread::sleep(Duration::from_millis(100));
    }
}

fn write_changes(list: &[Change]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for change in list {
        writeln!(out, "{change}")?;
    }
    out.flush()
}

/// Bytes of regular content added or modified in the new tree
fn changed_bytes(new: &FileTree, list: &[Change]) -> u64 {
    list.iter()
        .filter(|c| c.kind != ChangeKind::Delete)
        .filter_map(|c| new.lookup(&c.path))
        .filter_map(|id| new.get(id))
        .filter_map(|node| node.stat())
        .filter(|stat| !stat.is_dir())
        .map(|stat| stat.size)
        .sum()
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("layer_diff=debug,warn")
    } else {
        EnvFilter::new("layer_diff=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}
