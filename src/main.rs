//! Spend Sleuth - IBM Cloud billing analysis
//!
//! Filter billing exports and reconcile them against a budget plan.
//!
//! ## Usage
//!
//! ```bash
//! # Allocate costs against the planning file and print JSON
//! sleuth plan --config planning.yaml
//!
//! # Save the allocation and completeness tables as CSV
//! sleuth plan --config planning.yaml --format csv --output reports/planning.csv
//!
//! # Ad-hoc filter over the exports
//! sleuth filter --instances "*oraprod*" --services "*Storage*" --logic or --months 2025-09
//!
//! # With verbose logging and a custom log directory
//! sleuth -v --log-dir /tmp/sleuth-logs plan --config planning.yaml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use sleuth_billing::{BillingLoader, Column, FilterAnalysis, FilterLogic, FilterSpec, evaluate};
use sleuth_core::{AnalysisContext, LogGuard, SleuthError, init_logging};
use sleuth_planning::{Planner, PlanningConfig, ReportFormat, save_report, write_report};
use tracing::{error, info, warn};

/// Spend Sleuth billing analysis
///
/// Loads IBM Cloud `*instances-*.csv` billing exports, splits each budget
/// group's cost into planned and not-planned parts, and reports how much of
/// the bill no group explains.
#[derive(Parser, Debug)]
#[command(name = "sleuth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.sleuth/logs/)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate costs against a planning file and reconcile completeness
    Plan(PlanArgs),
    /// Filter billing records and print a cost summary
    Filter(FilterArgs),
}

/// Options shared by every command that reads billing exports.
#[derive(Args, Debug)]
struct DataArgs {
    /// Directory holding the billing exports
    #[arg(long, default_value = "data/billing")]
    data_dir: PathBuf,

    /// Keep costs in the export currency instead of converting to USD
    #[arg(long)]
    no_convert: bool,

    /// Exchange rate used when an export has no usable Currency Rate
    #[arg(
        long,
        default_value_t = sleuth_core::context::DEFAULT_EXCHANGE_RATE,
        value_parser = parse_rate
    )]
    exchange_rate: f64,
}

impl DataArgs {
    fn context(&self) -> AnalysisContext {
        AnalysisContext::new()
            .with_currency_conversion(!self.no_convert)
            .with_fallback_exchange_rate(self.exchange_rate)
    }
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Planning YAML with groups, filters, and budgets
    #[arg(long)]
    config: PathBuf,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "json", value_parser = parse_format)]
    format: ReportFormat,

    #[command(flatten)]
    data: DataArgs,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Instance name patterns, comma-separated
    #[arg(long, visible_alias = "instance")]
    instances: Vec<String>,

    /// Service name patterns, comma-separated
    #[arg(long, visible_alias = "service")]
    services: Vec<String>,

    /// Regions, comma-separated
    #[arg(long, visible_alias = "region")]
    regions: Vec<String>,

    /// Billing months (YYYY-MM), comma-separated
    #[arg(long, visible_alias = "month")]
    months: Vec<String>,

    /// Wildcard pattern matched against --pattern-column
    #[arg(long)]
    pattern: Option<String>,

    /// Column the pattern applies to
    #[arg(long, default_value = "Instance Name", value_parser = parse_column)]
    pattern_column: Column,

    /// How criteria combine
    #[arg(long, default_value = "and", value_parser = parse_logic)]
    logic: FilterLogic,

    /// Report everything the criteria do NOT match
    #[arg(long)]
    exclude: bool,

    /// Number of services and instances listed
    #[arg(long, default_value_t = 10)]
    top: usize,

    #[command(flatten)]
    data: DataArgs,
}

impl FilterArgs {
    fn spec(&self) -> FilterSpec {
        let mut spec = FilterSpec::new()
            .with_instances(&self.instances)
            .with_services(&self.services)
            .with_regions(&self.regions)
            .with_months(&self.months)
            .with_logic(self.logic)
            .with_exclude(self.exclude);
        if let Some(pattern) = &self.pattern {
            spec = spec.with_pattern(self.pattern_column, pattern.clone());
        }
        spec
    }
}

fn parse_format(s: &str) -> Result<ReportFormat, String> {
    s.parse().map_err(|e: SleuthError| e.to_string())
}

fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.trim().parse().map_err(|_| format!("'{s}' is not a number"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("exchange rate must be positive, got {s}"))
    }
}

fn parse_column(s: &str) -> Result<Column, String> {
    s.parse().map_err(|e: SleuthError| e.to_string())
}

fn parse_logic(s: &str) -> Result<FilterLogic, String> {
    s.parse().map_err(|e: SleuthError| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Command::Plan(args) => run_plan(args),
        Command::Filter(args) => run_filter(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("sleuth failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<SleuthError>().and_then(SleuthError::guidance) {
                eprintln!("Hint: {hint}");
            }
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> sleuth_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose)
}

fn run_plan(args: &PlanArgs) -> anyhow::Result<()> {
    let ctx = args.data.context();
    let config = PlanningConfig::load(&args.config)?;
    let dataset = BillingLoader::new(&args.data.data_dir).load(&ctx)?;

    info!(
        groups = config.groups.len(),
        records = dataset.len(),
        currency = %ctx.currency,
        "running plan"
    );
    let report = Planner::new(&dataset, &ctx).run(&config);

    match &args.output {
        Some(path) => {
            let written = save_report(&report, args.format, path)
                .with_context(|| format!("saving report to {}", path.display()))?;
            for file in written {
                println!("Report written to {}", file.display());
            }
        }
        None => write_report(&report, args.format, std::io::stdout().lock())?,
    }

    for note in &report.notes {
        warn!(group = %note.group, month = %note.month.label(), "{}", note.recommendation);
    }

    if report.has_failures() {
        for failure in &report.failures {
            eprintln!("Group '{}' failed: {}", failure.group, failure.error);
        }
        bail!("{} of {} groups failed", report.failures.len(), config.groups.len());
    }
    Ok(())
}

fn run_filter(args: &FilterArgs) -> anyhow::Result<()> {
    let ctx = args.data.context();
    let dataset = BillingLoader::new(&args.data.data_dir).load(&ctx)?;
    let spec = args.spec();

    let matched = evaluate(&dataset, &spec)?;
    if let Some(warning) = matched.warning() {
        eprintln!("Warning: {warning}");
    }

    let analysis = FilterAnalysis::build(&dataset, &spec, &matched, &ctx.currency);
    println!("{}", analysis.summary(args.top));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_args() {
        let cli = Cli::try_parse_from([
            "sleuth",
            "-v",
            "plan",
            "--config",
            "planning.yaml",
            "--format",
            "csv",
            "--no-convert",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.format, ReportFormat::Csv);
        assert_eq!(args.data.data_dir, PathBuf::from("data/billing"));
        assert_eq!(args.data.context().currency, "BRL");
    }

    #[test]
    fn test_filter_args_build_spec() {
        let cli = Cli::try_parse_from([
            "sleuth",
            "filter",
            "--instances",
            "*oraprod*,*oracle*",
            "--services",
            "*Storage*",
            "--logic",
            "or",
            "--pattern",
            "*backup*",
            "--pattern-column",
            "Service Name",
            "--exclude",
        ])
        .unwrap();
        let Command::Filter(args) = cli.command else {
            panic!("expected filter");
        };
        let spec = args.spec();
        assert_eq!(spec.logic, FilterLogic::Or);
        assert!(spec.exclude);
        assert_eq!(spec.criteria.len(), 3);
    }

    #[test]
    fn test_rejects_unknown_values() {
        let plan = |extra: &[&str]| {
            let mut args = vec!["sleuth", "plan", "--config", "p.yaml"];
            args.extend_from_slice(extra);
            Cli::try_parse_from(args)
        };
        assert!(plan(&["--format", "xlsx"]).is_err());
        assert!(Cli::try_parse_from(["sleuth", "filter", "--logic", "xor"]).is_err());
        assert!(Cli::try_parse_from(["sleuth", "filter", "--pattern-column", "Colour"]).is_err());
    }

    #[test]
    fn test_exchange_rate_must_be_positive() {
        for rate in ["0", "-5.55", "NaN", "inf", "abc"] {
            let parsed = Cli::try_parse_from(["sleuth", "filter", "--exchange-rate", rate]);
            assert!(parsed.is_err(), "rate {rate} should be rejected");
        }

        let cli = Cli::try_parse_from(["sleuth", "filter", "--exchange-rate", "5.2"]).unwrap();
        let Command::Filter(args) = cli.command else {
            panic!("expected filter");
        };
        assert_eq!(args.data.context().fallback_exchange_rate, 5.2);
        assert!(args.data.context().validate().is_ok());
    }
}
