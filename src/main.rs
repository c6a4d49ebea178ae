use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use diffuzz::{
    config::{CaptureStream, EngineSpec},
    engines::build_engines,
    generators::RandomCodeGenerator,
    signals::shutdown_signal,
};
use diffuzz_core::{
    config::{DEFAULT_COUNTER_FILE, DEFAULT_QUEUE_CAPACITY},
    ComparisonTopology, FuzzConfig, Pipeline, RunOutcome,
};

#[derive(Parser)]
#[command(name = "diffuzz")]
#[command(about = "Differential fuzzer: runs random tests through several engines and flags diverging output")]
struct Args {
    /// Engine to compare, as NAME=PROGRAM [ARGS..]; the test file is appended.
    /// Give at least two; the first one is the reference engine.
    #[arg(long = "engine", required = true, num_args = 1)]
    engines: Vec<EngineSpec>,

    /// Number of parallel workers, split between generation and execution
    #[arg(long, default_value_t = num_cpus::get().max(2))]
    parallel: usize,

    /// Location to place test artifacts
    #[arg(long, default_value = "/tmp")]
    outdir: PathBuf,

    /// Location of the per-worker engine output files
    #[arg(long, default_value = ".")]
    scratch_dir: PathBuf,

    /// Label embedded in test file names
    #[arg(long, default_value = "diffuzz")]
    prefix: String,

    /// Number of tests to generate before stopping (default: run until interrupted)
    #[arg(long)]
    count: Option<u64>,

    /// Capacity of the pending-tests queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Seconds between progress reports
    #[arg(long, default_value = "5")]
    report_interval_secs: u64,

    /// File holding the cumulative number of executed tests
    #[arg(long, default_value = DEFAULT_COUNTER_FILE)]
    counter_file: PathBuf,

    /// Comparison topology: star (engine[0] against each other) or all-pairs
    #[arg(long, default_value_t = ComparisonTopology::Star)]
    topology: ComparisonTopology,

    /// Engine output stream to compare
    #[arg(long, value_enum, default_value_t = CaptureStream::Stdout)]
    capture: CaptureStream,

    /// Minimum length of generated code in bytes
    #[arg(long, default_value = "1")]
    min_code_len: usize,

    /// Maximum length of generated code in bytes
    #[arg(long, default_value = "256")]
    max_code_len: usize,

    /// Gas limit of generated tests
    #[arg(long, default_value = "10000000")]
    gas: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level))
    };

    let logs_dir = args.scratch_dir.join(".diffuzz").join("logs");
    std::fs::create_dir_all(&logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "diffuzz.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .init();

    info!("Starting diffuzz");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    for engine in &args.engines {
        info!("Engine: {}", engine);
    }
    info!("Parallelism: {}", args.parallel);
    info!("Output directory: {}", args.outdir.display());

    let config = FuzzConfig {
        output_dir: args.outdir,
        scratch_dir: args.scratch_dir,
        label: args.prefix,
        parallelism: args.parallel,
        queue_capacity: args.queue_capacity,
        cleanup_capacity: args.queue_capacity,
        report_interval: Duration::from_secs(args.report_interval_secs),
        counter_file: args.counter_file,
        topology: args.topology,
        max_tests: args.count,
    };

    // Handlers go in before any worker is spawned.
    let shutdown = shutdown_signal();

    let generator = RandomCodeGenerator::new(args.min_code_len, args.max_code_len, args.gas)?;
    let engines = build_engines(args.engines, args.capture);
    let pipeline = Pipeline::new(config, generator, engines)?;

    let summary = pipeline.run(shutdown).await?;

    info!(
        executed = summary.executed,
        deleted = summary.deleted,
        abandoned = summary.abandoned,
        "Run finished in {:.1?}",
        summary.elapsed
    );

    match summary.outcome {
        RunOutcome::Diverged(divergence) => {
            println!("Possible consensus error!");
            println!("File: {}", divergence.artifact.display());
            println!(
                "Engines: {} vs {} ({})",
                divergence.left_engine, divergence.right_engine, divergence.cause
            );
            for output in &divergence.outputs {
                println!("Output: {}", output.display());
            }
            Ok(ExitCode::from(2))
        }
        RunOutcome::Exhausted => {
            eprintln!(
                "Fuzzing stopped on its own after {} tests, see the log for generator errors",
                summary.executed
            );
            Ok(ExitCode::FAILURE)
        }
        RunOutcome::Interrupted | RunOutcome::Completed => {
            println!("{} tests executed, no divergence found", summary.executed);
            Ok(ExitCode::SUCCESS)
        }
    }
}
