//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::benchmark;
use crate::domain::config_validation::{
    parse_optional_date, parse_target, parse_windows, validate_config,
};
use crate::domain::error::AllocatorError;
use crate::domain::frontier::{self, DEFAULT_SAMPLES};
use crate::domain::leverage::{DEFAULT_MAX_VAR_LEVERAGE, DEFAULT_MAX_VOL_LEVERAGE, LeverageCaps, RiskTarget};
use crate::domain::max_sharpe::{FINAL_TOLERANCE, SCORING_TOLERANCE};
use crate::domain::metrics::DEFAULT_VAR_CONFIDENCE;
use crate::domain::regime::{
    self, DEFAULT_RISK_FREE_RATE, DEFAULT_WINDOWS, OptimizerSettings, SHORT_HISTORY_ROWS,
};
use crate::domain::report::{AllocationReport, DEFAULT_RECENT_ROWS};
use crate::domain::solver::{DEFAULT_MAX_ITERATIONS, SolveStatus, SolverSettings, WeightBounds};
use crate::domain::strategy::OptimizationResult;
use crate::domain::universe::{UniverseError, load_universe, parse_tickers};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT: &str = "allocation.json";

#[derive(Parser, Debug)]
#[command(name = "regimefolio", about = "Regime-adaptive portfolio allocator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute allocations and write a JSON report
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated tickers, replacing [portfolio] tickers
        #[arg(long)]
        tickers: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration without loading any prices
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for the configured tickers
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
    },
}

/// Everything one `optimize` run needs, resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub tickers: Vec<String>,
    pub settings: OptimizerSettings,
    pub benchmarks: bool,
    pub output: PathBuf,
    pub frontier_samples: usize,
    pub recent_rows: usize,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Optimize {
            config,
            tickers,
            output,
        } => run_optimize(&config, tickers.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, tickers } => run_info(&config, tickers.as_deref()),
    }
}

fn fail(err: &AllocatorError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Loads an INI file and applies command-line overrides on top of it.
pub fn load_config(
    path: &Path,
    tickers: Option<&str>,
    output: Option<&Path>,
) -> Result<FileConfigAdapter, AllocatorError> {
    let mut adapter = FileConfigAdapter::from_file(path)?;
    if let Some(tickers) = tickers {
        adapter.set("portfolio", "tickers", tickers);
    }
    if let Some(output) = output {
        adapter.set("report", "output", &output.display().to_string());
    }
    Ok(adapter)
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, AllocatorError> {
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AllocatorError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn non_negative(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

pub fn build_optimizer_settings(config: &dyn ConfigPort) -> Result<OptimizerSettings, AllocatorError> {
    let bounds = WeightBounds::new(
        config.get_double("portfolio", "min_weight", 0.0) / 100.0,
        config.get_double("portfolio", "max_weight", 100.0) / 100.0,
    )?;
    let windows = match config.get_string("optimizer", "windows") {
        Some(s) => parse_windows(&s)?,
        None => DEFAULT_WINDOWS.to_vec(),
    };
    let max_iterations = non_negative(config.get_int(
        "optimizer",
        "max_iterations",
        DEFAULT_MAX_ITERATIONS as i64,
    ))
    .max(1);

    Ok(OptimizerSettings {
        windows,
        short_history_rows: non_negative(config.get_int(
            "optimizer",
            "short_history_rows",
            SHORT_HISTORY_ROWS as i64,
        )),
        bounds,
        risk_free_rate: config.get_double("portfolio", "risk_free_rate", DEFAULT_RISK_FREE_RATE),
        target: parse_target(config)?,
        var_confidence: config.get_double("optimizer", "var_confidence", DEFAULT_VAR_CONFIDENCE),
        leverage_caps: LeverageCaps {
            volatility: config.get_double("optimizer", "max_vol_leverage", DEFAULT_MAX_VOL_LEVERAGE),
            var: config.get_double("optimizer", "max_var_leverage", DEFAULT_MAX_VAR_LEVERAGE),
        },
        scoring: SolverSettings {
            tolerance: config.get_double("optimizer", "scoring_tolerance", SCORING_TOLERANCE),
            max_iterations,
        },
        final_solve: SolverSettings {
            tolerance: config.get_double("optimizer", "final_tolerance", FINAL_TOLERANCE),
            max_iterations,
        },
    })
}

pub fn build_run_config(config: &dyn ConfigPort) -> Result<RunConfig, AllocatorError> {
    let data_dir = PathBuf::from(required(config, "data", "dir")?.trim());
    let tickers = parse_tickers(&required(config, "portfolio", "tickers")?)?;

    Ok(RunConfig {
        data_dir,
        start_date: parse_optional_date(config, "start_date")?,
        end_date: parse_optional_date(config, "end_date")?,
        tickers,
        settings: build_optimizer_settings(config)?,
        benchmarks: config.get_bool("benchmarks", "enabled", true),
        output: config
            .get_string("report", "output")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        frontier_samples: non_negative(config.get_int(
            "report",
            "frontier_samples",
            DEFAULT_SAMPLES as i64,
        )),
        recent_rows: non_negative(config.get_int("report", "recent_rows", DEFAULT_RECENT_ROWS as i64))
            .max(1),
    })
}

/// Load prices, optimize, evaluate benchmarks, and assemble the report.
pub fn run_pipeline<R: Rng + ?Sized>(
    price_port: &dyn PricePort,
    run: &RunConfig,
    rng: &mut R,
) -> Result<(OptimizationResult, AllocationReport), AllocatorError> {
    let universe = load_universe(price_port, &run.tickers, run.start_date, run.end_date)?;
    let prices = universe.prices;

    let result = regime::optimize(&prices, &run.settings)?;

    let benchmarks = if run.benchmarks {
        benchmark::run(
            price_port,
            prices.dates(),
            run.start_date,
            run.end_date,
            run.settings.risk_free_rate,
            run.settings.var_confidence,
        )
    } else {
        Vec::new()
    };

    let cloud = frontier::sample_cloud(rng, &result.mean, &result.covariance, run.frontier_samples);

    let report = AllocationReport::build(
        &result,
        &prices,
        &benchmarks,
        &cloud,
        run.recent_rows,
        run.settings.risk_free_rate,
        run.settings.target,
    )
    .with_skipped(&universe.skipped);
    Ok((result, report))
}

fn run_optimize(config_path: &Path, tickers: Option<&str>, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path, tickers, output) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }
    let run = match build_run_config(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Allocating {} tickers from {}",
        run.tickers.len(),
        run.data_dir.display()
    );
    let price_port = CsvAdapter::new(run.data_dir.clone());
    let (result, report) = match run_pipeline(&price_port, &run, &mut rand::thread_rng()) {
        Ok(out) => out,
        Err(e) => return fail(&e),
    };

    print_summary(&result, &report);

    match JsonReportAdapter::new(true).write(&report, &run.output) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", run.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_summary(result: &OptimizationResult, report: &AllocationReport) {
    eprintln!(
        "\n=== Allocation (lookback {} days, shrinkage {:.4}) ===",
        result.lookback_days, result.shrinkage
    );
    eprintln!(
        "{:<12} {:<14} {:>8} {:>8} {:>7} {:>7}",
        "Strategy", "Mode", "Return", "Vol", "Sharpe", "VaR"
    );
    for r in &result.strategies {
        let m = &r.metrics;
        eprintln!(
            "{:<12} {:<14} {:>7.1}% {:>7.1}% {:>7.2} {:>6.2}%",
            r.strategy.display_name(),
            r.mode.as_str(),
            m.annual_return * 100.0,
            m.annual_volatility * 100.0,
            m.sharpe_ratio,
            m.var_pct
        );
        let weights: Vec<String> = result
            .tickers
            .iter()
            .zip(r.weights.iter())
            .filter(|(_, w)| **w > 0.0005)
            .map(|(t, w)| format!("{} {:.1}%", t, w * 100.0))
            .collect();
        eprintln!("    {}", weights.join("  "));
        if r.status == SolveStatus::FellBackToEqualWeight {
            eprintln!("    (solver did not converge; equal weights used)");
        }
    }

    if !report.meta.skipped.is_empty() {
        eprintln!("\n=== Skipped ===");
        for s in &report.meta.skipped {
            eprintln!("{:<12} {}", s.ticker, s.reason);
        }
    }

    if !report.benchmarks.is_empty() {
        eprintln!("\n=== Benchmarks ===");
        for (name, b) in &report.benchmarks {
            eprintln!(
                "{:<12} {:>7.1}% {:>7.1}% {:>7.2} {:>6.2}%",
                name, b.metrics.annual_return, b.metrics.volatility, b.metrics.sharpe, b.metrics.var
            );
        }
    }
}

fn describe_target(target: Option<RiskTarget>) -> String {
    match target {
        None => "none".to_string(),
        Some(RiskTarget::Volatility(v)) => format!("volatility {:.1}% annual", v * 100.0),
        Some(RiskTarget::Var(v)) => format!("VaR {:.2}% daily", v),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path, None, None) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    if let Err(e) = validate_config(&adapter) {
        return fail(&e);
    }
    let run = match build_run_config(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let s = &run.settings;

    eprintln!("\nData:");
    eprintln!("  dir:        {}", run.data_dir.display());
    eprintln!(
        "  range:      {} to {}",
        run.start_date.map_or("start".to_string(), |d| d.to_string()),
        run.end_date.map_or("end".to_string(), |d| d.to_string())
    );
    eprintln!("\nPortfolio:");
    eprintln!("  tickers:    {}", run.tickers.join(", "));
    eprintln!(
        "  bounds:     {:.1}% to {:.1}%",
        s.bounds.min_weight * 100.0,
        s.bounds.max_weight * 100.0
    );
    eprintln!("  risk free:  {:.2}%", s.risk_free_rate * 100.0);
    eprintln!("  target:     {}", describe_target(s.target));
    eprintln!("\nOptimizer:");
    let windows: Vec<String> = s.windows.iter().map(|w| w.to_string()).collect();
    eprintln!("  windows:    {}", windows.join(", "));
    eprintln!("  confidence: {}", s.var_confidence);
    eprintln!(
        "  leverage:   {}x vol, {}x VaR",
        s.leverage_caps.volatility, s.leverage_caps.var
    );
    eprintln!("\nReport:");
    eprintln!("  output:     {}", run.output.display());
    eprintln!("  benchmarks: {}", if run.benchmarks { "on" } else { "off" });

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

/// Tickers for `info`, where a single ticker is allowed.
fn info_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    match parse_tickers(input) {
        Err(UniverseError::TooFewTickers(_)) => Ok(vec![input.trim().to_uppercase()]),
        other => other,
    }
}

fn run_info(config_path: &Path, tickers: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path, tickers, None) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    let data_dir = match required(&adapter, "data", "dir") {
        Ok(d) => PathBuf::from(d.trim()),
        Err(e) => return fail(&e),
    };
    let tickers = match required(&adapter, "portfolio", "tickers")
        .and_then(|s| info_tickers(&s).map_err(AllocatorError::from))
    {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };

    let port = CsvAdapter::new(data_dir);
    for ticker in &tickers {
        match port.data_range(ticker) {
            Ok(Some((first, last, rows))) => {
                println!("{}: {} rows, {} to {}", ticker, rows, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", ticker),
            Err(e) => eprintln!("error reading {}: {}", ticker, e),
        }
    }
    ExitCode::SUCCESS
}
