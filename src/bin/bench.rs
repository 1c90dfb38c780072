//! batchkv Load Benchmark
//!
//! Loads N sequential key/value pairs with a chosen write strategy and
//! reports timings.

use std::path::PathBuf;
use std::sync::Arc;

use batchkv::coalescer::CoalescerConfig;
use batchkv::experiment::{Experiment, ExperimentReport, Strategy, Workload, DEFAULT_BUCKET};
use batchkv::{BatchError, Config, DiskStore, MemoryStore, RetryPolicy, SyncPolicy};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StrategyArg {
    /// Plain in-memory map, no store
    Map,
    /// One commit per write
    Direct,
    /// Buffer writes and commit past a threshold
    Batched,
    /// Bounded worker pool merging queued writes
    Coalesced,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    Memory,
    Disk,
}

/// batchkv load benchmark
#[derive(Parser, Debug)]
#[command(name = "batchkv-bench")]
#[command(about = "Compare batched, direct and coalesced writes against a plain map")]
#[command(version)]
struct Args {
    /// Number of entries to write
    #[arg(short = 'n', long, default_value = "1000000")]
    count: usize,

    /// Write strategy
    #[arg(short, long, value_enum, default_value = "batched")]
    strategy: StrategyArg,

    /// Buffered entries above which the batched strategy flushes
    #[arg(short, long, default_value = "1000")]
    threshold: usize,

    /// Coalescer worker threads
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Coalescer queue depth
    #[arg(long, default_value = "1024")]
    queue_depth: usize,

    /// Most writes merged into one coalesced commit
    #[arg(long, default_value = "256")]
    max_batch: usize,

    /// Store backend
    #[arg(short, long, value_enum, default_value = "disk")]
    backend: Backend,

    /// Data directory for the disk backend
    #[arg(short, long, default_value = "./batchkv_data")]
    data_dir: PathBuf,

    /// Bucket to write into
    #[arg(long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Time a full read pass after writing
    #[arg(long)]
    read_back: bool,

    /// Check every value after writing
    #[arg(long)]
    verify: bool,

    /// Retries for transient commit failures
    #[arg(short, long, default_value = "0")]
    retries: u32,

    /// fsync the log every N commits instead of every commit
    #[arg(long)]
    sync_every: Option<usize>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,batchkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("batchkv-bench v{}", batchkv::VERSION);

    let strategy = match args.strategy {
        StrategyArg::Map => Strategy::Map,
        StrategyArg::Direct => Strategy::Direct,
        StrategyArg::Batched => Strategy::Batched {
            threshold: args.threshold,
        },
        StrategyArg::Coalesced => Strategy::Coalesced(CoalescerConfig {
            workers: args.workers,
            queue_depth: args.queue_depth,
            max_batch: args.max_batch,
        }),
    };

    let experiment = Experiment::new(Workload::new(args.count), strategy)
        .bucket(args.bucket.clone().into_bytes())
        .read_back(args.read_back)
        .verify(args.verify)
        .retry(RetryPolicy::from(args.retries));

    let result = match args.backend {
        Backend::Memory => experiment.run(&Arc::new(MemoryStore::new())),
        Backend::Disk => run_on_disk(&args, &experiment),
    };

    match result {
        Ok(report) => print_report(&report),
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            eprintln!("Run did not succeed: {}", e);
            if let BatchError::Aborted { committed, .. } = e {
                eprintln!(
                    "{} of {} entries were committed before the failure",
                    committed, args.count
                );
            }
            std::process::exit(1);
        }
    }
}

fn run_on_disk(args: &Args, experiment: &Experiment) -> batchkv::Result<ExperimentReport> {
    let sync_policy = match args.sync_every {
        Some(count) => SyncPolicy::EveryNCommits { count },
        None => SyncPolicy::EveryCommit,
    };
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_policy(sync_policy)
        .build();

    tracing::info!("Data directory: {}", args.data_dir.display());

    let store = Arc::new(DiskStore::open(config)?);
    let report = experiment.run(&store)?;

    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => tracing::warn!("Store still shared at exit; skipping final checkpoint"),
    }
    Ok(report)
}

fn print_report(report: &ExperimentReport) {
    println!("strategy:          {}", report.strategy.name());
    println!("entries written:   {}", report.entries_written);
    println!("commits:           {}", report.batches_committed);
    println!("write time:        {:?}", report.write_elapsed);
    println!("writes/sec:        {:.0}", report.writes_per_sec());
    if let Some(elapsed) = report.read_elapsed {
        println!("read time:         {:?}", elapsed);
    }
    if let Some(verify) = report.verify {
        println!(
            "verified:          {} checked, {} missing, {} mismatched",
            verify.checked, verify.missing, verify.mismatched
        );
    }
}
