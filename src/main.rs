//! FastTracks CLI entry point
//!
//! Runs a built-in kernel over one or more input tracks and writes the
//! result as Wiggle or bedGraph.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fast_tracks::core::config::render_options_table;
use fast_tracks::core::{ComputeFunction, EngineConfig, ExtentMode, Job};
use fast_tracks::formats::{open_reader, open_writer};
use fast_tracks::kernels::{Log, Math, MathOp, Mean, Scale};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "fast-tracks")]
#[command(about = "Chunked parallel computation over genome tracks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExtentModeArg {
    /// Only regions covered by every input
    Intersection,
    /// Regions covered by any input
    Union,
}

impl From<ExtentModeArg> for ExtentMode {
    fn from(arg: ExtentModeArg) -> Self {
        match arg {
            ExtentModeArg::Intersection => ExtentMode::Intersection,
            ExtentModeArg::Union => ExtentMode::Union,
        }
    }
}

/// Options shared by every computing subcommand
#[derive(Args)]
struct EngineArgs {
    /// Output file (.wig or .bedGraph, optionally .gz)
    #[arg(short = 'o', long)]
    output: PathBuf,
    /// Bases per chunk
    #[arg(short = 'c', long)]
    chunk_size: Option<u64>,
    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 't', long)]
    threads: Option<usize>,
    /// How input extents are combined
    #[arg(long)]
    extents: Option<ExtentModeArg>,
    /// Set an engine option, e.g. --set chunk_size=1000000 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
    /// Fail when the inputs share no region instead of writing nothing
    #[arg(long)]
    fail_on_empty: bool,
}

impl EngineArgs {
    /// `--set` assignments first, explicit flags override them
    fn config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = EngineConfig::default();
        config.apply_all(&self.set)?;
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(extents) = self.extents {
            config = config.with_extent_mode(extents.into());
        }
        if self.fail_on_empty {
            config = config.with_fail_on_empty_domain(true);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Multiply a track by a constant
    Scale {
        /// Input track (Wiggle, bedGraph or BigWig)
        input: PathBuf,
        /// Scale factor
        #[arg(short = 'f', long, default_value = "1.0")]
        factor: f32,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Logarithm of a track
    Log {
        /// Input track (Wiggle, bedGraph or BigWig)
        input: PathBuf,
        /// Logarithm base
        #[arg(short = 'b', long, default_value = "2.0")]
        base: f32,
        /// Added to every value before taking the logarithm
        #[arg(short = 'p', long, default_value = "1.0")]
        pseudocount: f32,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Combine two tracks base by base
    Math {
        /// Operation applied as <first> <op> <second> (add, subtract, multiply, divide)
        #[arg(value_parser = MathOp::from_str)]
        op: MathOp,
        /// First input track
        first: PathBuf,
        /// Second input track
        second: PathBuf,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Per-base mean of several tracks, ignoring missing values
    Mean {
        /// Input tracks
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// List engine options accepted by --set
    Options,
}

fn run_job(
    inputs: &[PathBuf],
    engine: &EngineArgs,
    compute: &dyn ComputeFunction,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = engine.config()?;

    let mut readers = Vec::with_capacity(inputs.len());
    for input in inputs {
        eprintln!("Loading track: {:?}", input);
        let reader = open_reader(input).with_context(|| format!("Failed to open {:?}", input))?;
        readers.push(reader);
    }
    let writer = open_writer(&engine.output)
        .with_context(|| format!("Failed to create {:?}", engine.output))?;

    eprintln!(
        "Computing -> {:?} ({} threads, chunk size {})",
        engine.output, config.thread_count, config.chunk_size
    );
    let mut job = Job::new(config, readers, writer)?;
    let report = match job.run(compute) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Output {:?} is incomplete and should be discarded", engine.output);
            return Err(e.into());
        }
    };

    eprintln!("\n=== Job Statistics ===");
    eprintln!("Chromosomes:     {}", report.chromosomes);
    eprintln!("Chunks:          {}", report.chunks);
    eprintln!("Bases written:   {}", report.bases_written);
    eprintln!("Max buffered:    {}", report.max_buffered);
    eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scale {
            input,
            factor,
            engine,
        } => run_job(&[input], &engine, &Scale(factor)),

        Commands::Log {
            input,
            base,
            pseudocount,
            engine,
        } => run_job(&[input], &engine, &Log::new(base, pseudocount)?),

        Commands::Math {
            op,
            first,
            second,
            engine,
        } => run_job(&[first, second], &engine, &Math(op)),

        Commands::Mean { inputs, engine } => run_job(&inputs, &engine, &Mean),

        Commands::Options => {
            print!("{}", render_options_table());
            Ok(())
        }
    }
}
