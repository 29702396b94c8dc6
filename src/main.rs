//! Benchmark driver: runs every scenario against every strategy and prints a
//! comparison table of time and memory utilization.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use heapfit::harness::{ChallengeConfig, ChallengeStats, run_challenge};
use heapfit::trace::TraceWriter;
use heapfit::{AllocationStrategy, MemoryResult};

/// The five size ranges exercised, small and uniform through mixed to large.
const SCENARIOS: [(usize, usize); 5] = [(128, 128), (16, 16), (16, 128), (256, 4000), (8, 4000)];

#[derive(Debug, Parser)]
#[command(name = "heapfit", about = "Heap allocator benchmark harness", version)]
struct Args {
    /// Write per-run allocation traces into this directory, using reduced
    /// challenge parameters so the traces stay small.
    #[arg(long, value_name = "DIR")]
    trace: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    match run_scenarios(args.trace.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_scenarios(trace_dir: Option<&Path>) -> MemoryResult<()> {
    println!("Welcome to the malloc challenge!");

    if let Some(dir) = trace_dir {
        std::fs::create_dir_all(dir)?;
    }

    // Warm-up run to fault in code paths before anything is timed.
    let (min, max) = SCENARIOS[0];
    run_one(AllocationStrategy::FirstFit, min, max, None)?;

    for (index, &(min_size, max_size)) in SCENARIOS.iter().enumerate() {
        let number = index + 1;
        let mut results = Vec::with_capacity(AllocationStrategy::ALL.len());
        for strategy in AllocationStrategy::ALL {
            let trace_path = trace_dir
                .map(|dir| dir.join(format!("trace{number}_{}.txt", strategy.name())));
            let stats = run_one(strategy, min_size, max_size, trace_path.as_deref())?;
            results.push((strategy, stats));
        }
        print_table(number, &results);
    }

    println!("\nChallenge done!");
    Ok(())
}

fn run_one(
    strategy: AllocationStrategy,
    min_size: usize,
    max_size: usize,
    trace_path: Option<&Path>,
) -> MemoryResult<ChallengeStats> {
    // Tracing inflates the timings, so trace runs also shrink the workload.
    let (config, trace) = match trace_path {
        Some(path) => (
            ChallengeConfig::smoke(min_size, max_size),
            Some(TraceWriter::create(path)?),
        ),
        None => (ChallengeConfig::new(min_size, max_size), None),
    };

    info!(%strategy, min_size, max_size, "running challenge");
    let mut heap = strategy.instantiate(trace.clone());
    run_challenge(heap.as_mut(), &config, trace)
}

fn print_table(number: usize, results: &[(AllocationStrategy, ChallengeStats)]) {
    let row = |cells: Vec<String>| {
        cells
            .iter()
            .map(|cell| format!("{cell:>16}"))
            .collect::<Vec<_>>()
            .join(" => ")
    };

    println!("==========================================================================");
    println!(
        "Challenge #{number}    | {}",
        row(results.iter().map(|(s, _)| s.name().to_string()).collect())
    );
    println!(
        "{:-<16}+ {}",
        "",
        row(results.iter().map(|_| "-".repeat(16)).collect())
    );
    println!(
        "{:>16}| {}",
        "Time [ms]",
        row(results
            .iter()
            .map(|(_, stats)| stats.elapsed.as_millis().to_string())
            .collect())
    );
    println!(
        "{:>16}| {}",
        "Utilization [%]",
        row(results
            .iter()
            .map(|(_, stats)| format!("{}", stats.utilization_percent() as i64))
            .collect())
    );
}
