use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use xenoflow::branch::BranchPair;
use xenoflow::config::{ClusterConfig, LogFormat, PipelineConfig};
use xenoflow::events::LoggingEventSink;
use xenoflow::observability::init_logging;
use xenoflow::pipeline::{FailureMode, Pipeline};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level directive, e.g. `info` or `xenoflow=debug`. Overrides the
    /// configuration; `RUST_LOG` overrides both.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs every stage of the run list over all input pairs.
    Run(RunArgs),
    /// Prints the temporary and final outputs of every pair without running
    /// anything.
    Plan(PlanArgs),
    /// Validates the configuration only.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration file (YAML).
    config: PathBuf,

    /// Process an explicit pair instead of discovering inputs. Repeatable.
    #[arg(long = "pair", num_args = 2, value_names = ["A_FILE", "B_FILE"], action = ArgAction::Append)]
    pairs: Vec<PathBuf>,

    /// Process one pair at a time.
    #[arg(long)]
    serial: bool,

    /// Maximum number of pairs processed at once.
    #[arg(long, conflicts_with = "serial")]
    cores: Option<usize>,

    /// Keep running later stages with the pairs that succeeded.
    #[arg(long)]
    continue_on_failure: bool,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Pipeline configuration file (YAML).
    config: PathBuf,

    /// Plan an explicit pair instead of discovering inputs. Repeatable.
    #[arg(long = "pair", num_args = 2, value_names = ["A_FILE", "B_FILE"], action = ArgAction::Append)]
    pairs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Pipeline configuration file (YAML).
    config: PathBuf,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse()
}

fn config_path(command: &Commands) -> &PathBuf {
    match command {
        Commands::Run(args) => &args.config,
        Commands::Plan(args) => &args.config,
        Commands::Check(args) => &args.config,
    }
}

fn explicit_pairs(files: &[PathBuf], config: &PipelineConfig) -> anyhow::Result<Vec<BranchPair>> {
    let markers = config.markers();
    files
        .chunks(2)
        .map(|chunk| match chunk {
            [first, second] => Ok(BranchPair::from_files(first, second, &markers)?),
            _ => bail!("--pair takes exactly two files"),
        })
        .collect()
}

async fn run(args: RunArgs, mut config: PipelineConfig) -> anyhow::Result<ExitCode> {
    if args.serial {
        config.cluster.local = true;
    }
    if let Some(cores) = args.cores {
        config.cluster = ClusterConfig {
            cores: Some(cores),
            local: false,
        };
    }
    if args.continue_on_failure {
        config.failure_mode = FailureMode::ContinueOnFailure;
    }

    let pairs = explicit_pairs(&args.pairs, &config)?;
    let pipeline = Pipeline::new(config).with_events(Arc::new(LoggingEventSink::debug()));

    let summary = if pairs.is_empty() {
        pipeline.run().await?
    } else {
        pipeline.run_pairs(pairs).await?
    };

    print!("{summary}");
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn plan(args: &PlanArgs, config: PipelineConfig) -> anyhow::Result<ExitCode> {
    let explicit = explicit_pairs(&args.pairs, &config)?;
    let pipeline = Pipeline::new(config);
    pipeline.validate()?;

    let mut rejected = 0;
    let pairs = if explicit.is_empty() {
        let mut pairs = Vec::new();
        for entry in pipeline.discover()? {
            match entry {
                Ok(pair) => pairs.push(pair),
                Err(e) => {
                    rejected += 1;
                    println!("rejected {}: {}", e.file.display(), e.reason);
                }
            }
        }
        pairs
    } else {
        explicit
    };

    for planned in pipeline.plan(&pairs)? {
        println!("[{}] {}", planned.stage, planned.pair);
        for (temp, fin) in &planned.outputs {
            println!("  {} -> {}", temp.display(), fin.display());
        }
    }

    Ok(if rejected == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check(config: PipelineConfig) -> anyhow::Result<ExitCode> {
    let run = config.run.join(", ");
    Pipeline::new(config).validate()?;
    println!("configuration OK; stages: {run}");
    Ok(ExitCode::SUCCESS)
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let path = config_path(&cli.command).clone();
    let mut config = PipelineConfig::from_file(&path)
        .with_context(|| format!("loading configuration {}", path.display()))?;

    if let Some(level) = cli.log_level {
        config.log.level = level;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    init_logging(&config.log)?;

    match cli.command {
        Commands::Run(args) => run(args, config).await,
        Commands::Plan(args) => plan(&args, config),
        Commands::Check(_) => check(config),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "xenoflow failed");
            eprintln!("xenoflow: {e:#}");
            ExitCode::FAILURE
        }
    }
}
