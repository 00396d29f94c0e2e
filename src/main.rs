//! idlewatch - one-shot process-activity idle checker.
//!
//! Control flow: parse args, init logging, load the watch configuration,
//! load the previous snapshot, sample the current one, persist it for the
//! next run and hand both snapshots to the decision engine. The exit code
//! carries the verdict.

use std::path::Path;

use clap::Parser;
use tracing::{debug, error, info, warn};

use idlewatch::cli::Args;
use idlewatch::config::WatchConfig;
use idlewatch::engine::{self, Verdict};
use idlewatch::snapshot::Snapshot;
use idlewatch::{logging, procs, store};

/// Every watched service is provably idle; suspending is safe.
const EXIT_IDLE: i32 = 0;
/// Activity found, or idleness could not be established.
const EXIT_ACTIVE: i32 = 1;
/// Usage or configuration error; no verdict was produced.
const EXIT_ERROR: i32 = 100;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let args = Args::parse();

    if let Err(e) = logging::init(args.effective_level(), args.log_file.as_deref()) {
        // The subscriber is not installed yet, so plain stderr it is.
        eprintln!(
            "ERROR: opening log file '{}': {}",
            args.log_file.as_deref().unwrap_or(Path::new("")).display(),
            e
        );
        return EXIT_ERROR;
    }

    info!("Started idlewatch");

    let config = match WatchConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return EXIT_ERROR;
        }
    };

    if args.check_config {
        println!("Configuration is valid");
        return EXIT_IDLE;
    }
    if args.show_config {
        print!("{}", config);
        return EXIT_IDLE;
    }

    debug!("Loading previous record");
    let previous = match store::load(&config) {
        Ok(previous) => previous,
        Err(e) => {
            // Missing trust in the history downgrades the verdict later; it
            // never aborts the run.
            warn!("Ignoring previous snapshot record: {}", e);
            None
        }
    };
    if let Some(prev) = &previous {
        debug!("**Previous workload record**\n{}", prev);
    }

    debug!("Sampling current service activity");
    let clock_now = procs::monotonic_clock_ns();
    let current = Snapshot::build(&config, clock_now, procs::enumerate());
    debug!("**Current workload record**\n{}", current);
    debug!("Found {} matched processes running", current.observations.len());

    debug!("Writing output record to '{}'", config.history_file.display());
    if let Err(e) = store::save(&current, &config.history_file) {
        // The record only matters for the NEXT invocation; this run still
        // has everything it needs in memory.
        warn!(
            "Cannot write snapshot record '{}': {}",
            config.history_file.display(),
            e
        );
    }

    match engine::decide(&config, previous.as_ref(), &current, *procs::CLK_TCK) {
        Verdict::Idle => EXIT_IDLE,
        Verdict::Active | Verdict::Indeterminate => EXIT_ACTIVE,
    }
}
