#![warn(missing_docs)]
//! OffBench CLI Library
//!
//! Command line driver for the offload overhead benchmark. Parses arguments,
//! layers them over `offbench.toml`, plans which strategies and sizes to
//! measure, runs the [`Driver`] and renders the report.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> std::process::ExitCode {
//!     match offbench_cli::run() {
//!         Ok(()) => std::process::ExitCode::SUCCESS,
//!         Err(e) => {
//!             eprintln!("error: {e:#}");
//!             std::process::ExitCode::FAILURE
//!         }
//!     }
//! }
//! ```

mod config;
mod executor;
mod planner;
mod sanity;

pub use config::*;
pub use executor::{
    CellOutcome, Driver, DriverError, DriverSettings, DriverState, StrategyOutcome, build_report,
    fit_trials, format_human_output, intercept_records, strategy_result, summarize,
};
pub use planner::{ExecutionPlan, SWEEP_MAX_SIZE, build_plan, select_strategies, size_ladder};
pub use sanity::{AcceptAll, ContextDivergenceGate, SanityError, SanityGate};

use anyhow::Context;
use clap::{Parser, Subcommand};
use offbench_core::{DeviceKind, StrategyRegistry, WarmupPolicy};
use offbench_report::{OutputFormat, Report, generate_csv_report, generate_json_report};
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// OffBench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "offbench")]
#[command(author, version, about = "OffBench - offload dispatch overhead microbenchmark")]
pub struct Cli {
    /// Optional subcommand; defaults to measuring
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Strategy ids to measure (default: all registered strategies).
    /// Ids that name no strategy are skipped with a warning.
    #[arg(allow_negative_numbers = true)]
    pub strategies: Vec<String>,

    /// Host buffer length
    #[arg(short = 'N', long)]
    pub size: Option<usize>,

    /// Measure every power of two from 1 to 8192 instead of a single size
    #[arg(long, conflicts_with = "size")]
    pub sweep: bool,

    /// Output format: human, json, csv
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write per-trial intercepts for every strategy and size into this directory
    #[arg(long)]
    pub distribution: Option<PathBuf>,

    /// Only measure strategies whose name matches this regex
    #[arg(long)]
    pub filter: Option<String>,

    /// Number of benchmark sets
    #[arg(long)]
    pub sets: Option<usize>,

    /// Recorded runs per set
    #[arg(long)]
    pub runs: Option<usize>,

    /// Points in the delay schedule
    #[arg(long)]
    pub samples: Option<usize>,

    /// Dispatches per timed batch
    #[arg(long)]
    pub inner_reps: Option<usize>,

    /// Warm-up placement: per-trial or per-set
    #[arg(long)]
    pub warmup: Option<WarmupPolicy>,

    /// Execution context: thread or inline
    #[arg(long)]
    pub device: Option<DeviceKind>,

    /// Device pool width
    #[arg(long)]
    pub threads: Option<usize>,

    /// Configuration file (default: discover offbench.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all registered strategies
    List,
    /// Print a default offbench.toml
    DefaultConfig,
}

/// Run the OffBench CLI with process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the OffBench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::List) => list_strategies(&StrategyRegistry::builtin()),
        Some(Commands::DefaultConfig) => {
            print!("{}", OffbenchConfig::default_toml());
            Ok(())
        }
        None => run_measurements(&cli),
    }
}

/// Install the stderr subscriber; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "offbench=debug"
    } else {
        "offbench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn list_strategies(registry: &StrategyRegistry) -> anyhow::Result<()> {
    println!("OffBench Strategies:");
    for strategy in registry.iter() {
        let aliases = registry.aliases_of(strategy.id());
        let aliases = if aliases.is_empty() {
            String::new()
        } else {
            let ids: Vec<String> = aliases.iter().map(ToString::to_string).collect();
            format!(" (also {})", ids.join(", "))
        };
        println!(
            "├── {:>2}  {:<18} {}{}",
            strategy.id().0,
            strategy.name(),
            strategy.description(),
            aliases
        );
    }
    println!("{} strategies registered.", registry.len());
    Ok(())
}

/// Layer: built-in defaults → offbench.toml → CLI flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<OffbenchConfig> {
    let mut config = match &cli.config {
        Some(path) => OffbenchConfig::load(path)?,
        None => OffbenchConfig::discover()?.unwrap_or_default(),
    };

    if let Some(n) = cli.samples {
        config.harness.num_samples = n;
    }
    if let Some(n) = cli.inner_reps {
        config.harness.inner_reps = n;
    }
    if let Some(n) = cli.sets {
        config.harness.sets = n;
    }
    if let Some(n) = cli.runs {
        config.harness.runs = n;
    }
    if let Some(w) = cli.warmup {
        config.harness.warmup = w;
    }
    if let Some(kind) = cli.device {
        config.device.kind = kind;
    }
    if cli.threads.is_some() {
        config.device.threads = cli.threads;
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if cli.distribution.is_some() {
        config.output.distribution = cli.distribution.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Measure a plan with the given configuration
pub fn measure_plan(
    config: &OffbenchConfig,
    plan: &ExecutionPlan<'_>,
    show_progress: bool,
) -> Result<Report, DriverError> {
    let settings = DriverSettings {
        generator: config.generator()?,
        harness: config.harness_config(),
        sizes: plan.sizes.clone(),
        distribution: config.output.distribution.clone(),
        pin_cpu: config.device.pin_cpu,
        show_progress,
    };
    let mut driver = Driver::spawn(&config.device_config(), settings)?;
    let mut report = driver.run(&plan.strategies)?;
    report.summary.skipped = plan.skipped.clone();
    Ok(report)
}

/// Measure built-in strategies by id (empty: all) at the given sizes
pub fn measure(config: &OffbenchConfig, ids: &[u32], sizes: Vec<usize>) -> Result<Report, DriverError> {
    let registry = StrategyRegistry::builtin();
    let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
    let plan = build_plan(&registry, &ids, None, sizes);
    measure_plan(config, &plan, false)
}

/// Render a report in the requested format
pub fn render(report: &Report, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Human => format_human_output(report),
        OutputFormat::Json => generate_json_report(report)?,
        OutputFormat::Csv => generate_csv_report(report),
    })
}

fn run_measurements(cli: &Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli)?;
    let filter = cli
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(ConfigError::from)?;

    let sizes = if cli.sweep {
        size_ladder()
    } else {
        vec![cli.size.unwrap_or(DEFAULT_SIZE)]
    };

    let registry = StrategyRegistry::builtin();
    let plan = build_plan(&registry, &cli.strategies, filter.as_ref(), sizes);
    if plan.strategies.is_empty() {
        tracing::warn!("no strategies selected");
        println!("No strategies selected.");
        return Ok(());
    }

    tracing::info!(
        strategies = plan.strategies.len(),
        sizes = plan.sizes.len(),
        trials = config.harness_config().trials(),
        device = %config.device.kind,
        "starting measurement"
    );

    let report = measure_plan(&config, &plan, true).context("measurement aborted")?;
    let output = render(&report, config.output.format)?;

    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        tracing::info!(path = %path.display(), "report written");
    } else {
        print!("{}", output);
    }

    if report.summary.failed > 0 {
        tracing::warn!(failed = report.summary.failed, "some strategies failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_flags() {
        let cli = Cli::try_parse_from([
            "offbench", "1", "5", "42", "-N", "64", "--format", "csv", "--device", "inline",
            "--warmup", "per-set", "--sets", "3",
        ])
        .unwrap();

        assert_eq!(cli.strategies, ["1", "5", "42"]);
        assert_eq!(cli.size, Some(64));
        assert_eq!(cli.format, Some(OutputFormat::Csv));
        assert_eq!(cli.device, Some(DeviceKind::Inline));
        assert_eq!(cli.warmup, Some(WarmupPolicy::PerSet));
        assert_eq!(cli.sets, Some(3));
        assert!(cli.command.is_none());
    }

    #[test]
    fn malformed_ids_reach_the_planner() {
        let cli = Cli::try_parse_from(["offbench", "1", "-3", "99999999999", "-N", "8"]).unwrap();
        assert_eq!(cli.strategies, ["1", "-3", "99999999999"]);
        assert_eq!(cli.size, Some(8));

        let registry = StrategyRegistry::builtin();
        let plan = build_plan(&registry, &cli.strategies, None, vec![8]);
        let names: Vec<&str> = plan.strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["roundtrip"]);
        assert_eq!(plan.skipped, ["-3", "99999999999"]);
    }

    #[test]
    fn parses_list_subcommand() {
        let cli = Cli::try_parse_from(["offbench", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List)));
    }

    #[test]
    fn sweep_conflicts_with_size() {
        assert!(Cli::try_parse_from(["offbench", "--sweep", "-N", "8"]).is_err());
    }

    #[test]
    fn cli_overrides_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("offbench.toml");
        std::fs::write(&path, "[harness]\nsets = 7\nruns = 5\n").unwrap();

        let cli = Cli::try_parse_from([
            "offbench",
            "--config",
            path.to_str().unwrap(),
            "--runs",
            "2",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.harness.sets, 7);
        assert_eq!(config.harness.runs, 2);
    }

    #[test]
    fn invalid_override_rejected() {
        let cli = Cli::try_parse_from(["offbench", "--inner-reps", "0", "--config", "/nonexistent/offbench.toml"]).unwrap();
        assert!(resolve_config(&cli).is_err());

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("offbench.toml");
        std::fs::write(&path, "").unwrap();
        let cli = Cli::try_parse_from(["offbench", "--inner-reps", "0", "--config", path.to_str().unwrap()]).unwrap();
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}
