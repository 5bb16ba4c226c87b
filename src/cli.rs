//! CLI definition and dispatch.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvTradeReport;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_event_adapter::JsonEventCatalog;
use crate::adapters::json_report_adapter::{JsonReport, write_json_file};
use crate::domain::backtest::{self as engine, BacktestConfig, DEFAULT_INITIAL_CAPITAL};
use crate::domain::comparison::{
    DetectorComparison, MaDeviationDetector, PercentileDetector, SignalDetector, compare_detectors,
};
use crate::domain::config_validation::{
    DEFAULT_MAX_HOLDING_PERIODS, DEFAULT_THRESHOLD, DEFAULT_WINDOW, validate_backtest_config,
};
use crate::domain::detector::DetectorConfig;
use crate::domain::error::FundingError;
use crate::domain::event::{Coin, EventWindow, TimeRange, find_event};
use crate::domain::rate_point::{annualized_funding, parse_timestamp};
use crate::domain::report::BacktestResult;
use crate::domain::simulator::SimulationConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::event_port::EventPort;
use crate::ports::report_port::ReportPort;

/// Funding settlements per day on the supported venues (every 8 hours).
pub const FUNDING_PERIODS_PER_DAY: f64 = 3.0;

#[derive(Parser, Debug)]
#[command(
    name = "fundingscope",
    about = "Funding-rate anomaly detection and backtesting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one coin over a time range, or the window around one event
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        coin: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, conflicts_with_all = ["coin", "start", "end"])]
        event: Option<String>,
        /// Trade log CSV (overrides [report] trades_csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Full result JSON (overrides [report] result_json)
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Compare signal counts and confidence across detectors for one coin
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        coin: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// List the event catalog
    Events {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Backtest the window around every catalog event
    BacktestEvents {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show available data for coin(s)
    Info {
        #[arg(long)]
        coin: Option<String>,
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            coin,
            start,
            end,
            event,
            output,
            json,
        } => match event {
            Some(name) => run_event(&config, &name, output, json),
            None => run_backtest(
                &config,
                coin.as_deref(),
                start.as_deref(),
                end.as_deref(),
                output,
                json,
            ),
        },
        Command::Compare {
            config,
            coin,
            start,
            end,
            json,
        } => run_compare(
            &config,
            coin.as_deref(),
            start.as_deref(),
            end.as_deref(),
            json.as_deref(),
        ),
        Command::Events { config } => run_list_events(&config),
        Command::BacktestEvents { config, json } => run_all_events(&config, json.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { coin, config } => run_info(coin.as_deref(), &config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load an INI file and validate every key before anything else runs.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FundingError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_backtest_config(&adapter)?;
    Ok(adapter)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, FundingError> {
    let window = usize::try_from(config.get_int("detector", "window", DEFAULT_WINDOW))
        .map_err(|_| FundingError::ConfigInvalid {
            section: "detector".into(),
            key: "window".into(),
            reason: "window must be at least 2".into(),
        })?;
    let max_holding_periods = u32::try_from(config.get_int(
        "simulation",
        "max_holding_periods",
        DEFAULT_MAX_HOLDING_PERIODS,
    ))
    .map_err(|_| FundingError::ConfigInvalid {
        section: "simulation".into(),
        key: "max_holding_periods".into(),
        reason: "max_holding_periods must be at least 1".into(),
    })?;

    let bt_config = BacktestConfig {
        detector: DetectorConfig::new(
            window,
            config.get_double("detector", "threshold", DEFAULT_THRESHOLD),
        )?,
        simulation: SimulationConfig::new(
            max_holding_periods,
            config.get_double("simulation", "stop_loss_pct", 0.0),
            config.get_bool("simulation", "allow_reentry_same_period", false),
        )?,
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
    };
    bt_config.validate()?;
    Ok(bt_config)
}

fn config_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, FundingError> {
    let raw = config.get_int(section, key, i64::try_from(default).unwrap_or(i64::MAX));
    usize::try_from(raw).map_err(|_| FundingError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("{key} must be non-negative"),
    })
}

/// The z-score detector plus the `[percentile]` and `[ma_deviation]`
/// alternatives. The percentile window falls back to the z-score window.
pub fn build_detectors(
    config: &dyn ConfigPort,
    zscore: DetectorConfig,
) -> Result<(DetectorConfig, PercentileDetector, MaDeviationDetector), FundingError> {
    let pct = PercentileDetector::default();
    let percentile = PercentileDetector::new(
        config_usize(config, "percentile", "window", zscore.window)?,
        config.get_double("percentile", "lower_pct", pct.lower_pct),
        config.get_double("percentile", "upper_pct", pct.upper_pct),
    )?;

    let ma = MaDeviationDetector::default();
    let ma_deviation = MaDeviationDetector::new(
        config_usize(config, "ma_deviation", "short_window", ma.short_window)?,
        config_usize(config, "ma_deviation", "long_window", ma.long_window)?,
        config.get_double("ma_deviation", "threshold", ma.threshold),
    )?;

    Ok((zscore, percentile, ma_deviation))
}

pub fn build_event_window(config: &dyn ConfigPort) -> EventWindow {
    let default = EventWindow::default();
    EventWindow {
        before_hours: config.get_int("events", "before_hours", default.before_hours),
        after_hours: config.get_int("events", "after_hours", default.after_hours),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, FundingError> {
    config
        .get_string(section, key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| FundingError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

pub fn data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, FundingError> {
    Ok(CsvAdapter::new(PathBuf::from(require(config, "data", "path")?)))
}

pub fn event_catalog(config: &dyn ConfigPort) -> Result<JsonEventCatalog, FundingError> {
    Ok(JsonEventCatalog::new(PathBuf::from(require(
        config, "events", "path",
    )?)))
}

pub fn resolve_coin(
    coin_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Coin, FundingError> {
    match coin_override
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "coin"))
    {
        Some(symbol) => Coin::from_str(&symbol),
        None => Err(FundingError::ConfigMissing {
            section: "backtest".into(),
            key: "coin".into(),
        }),
    }
}

fn resolve_bound(
    cli_value: Option<&str>,
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<DateTime<Utc>>, FundingError> {
    let Some(raw) = cli_value
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", key))
    else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| FundingError::ConfigInvalid {
            section: "backtest".into(),
            key: key.into(),
            reason: format!("invalid timestamp '{}'", raw.trim()),
        })
}

/// Resolve the backtest range from CLI overrides, then config, then the full
/// extent of the coin's data for whichever bound is still open.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    coin: Coin,
) -> Result<TimeRange, FundingError> {
    let start = resolve_bound(start, config, "start")?;
    let end = resolve_bound(end, config, "end")?;

    if let (Some(start), Some(end)) = (start, end) {
        return TimeRange::new(start, end);
    }

    let Some((first, last, _)) = data_port.data_range(coin)? else {
        return Err(FundingError::NoData {
            coin: coin.to_string(),
        });
    };
    let start = start.unwrap_or(first);
    let end = end.unwrap_or(last);
    if start > end {
        return Err(FundingError::invalid_input(format!(
            "range start {start} is after end {end}"
        )));
    }
    Ok(TimeRange { start, end })
}

fn run_backtest(
    config_path: &Path,
    coin_override: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let data_port = data_adapter(&config)?;

    let coin = resolve_coin(coin_override, &config)?;
    let range = resolve_range(start, end, &config, &data_port, coin)?;

    eprintln!("Loading {} funding from {} to {}", coin, range.start, range.end);
    let series = data_port.fetch_funding(coin, &range)?;
    if series.is_empty() {
        return Err(FundingError::NoData {
            coin: coin.to_string(),
        });
    }

    eprintln!(
        "Running backtest: {} points, window {}, threshold {}",
        series.len(),
        bt_config.detector.window,
        bt_config.detector.threshold
    );
    let result = engine::run_backtest(&series, &bt_config)?;

    print_summary(&result);
    write_reports(&result, &config, output, json)
}

fn run_event(
    config_path: &Path,
    event_name: &str,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let data_port = data_adapter(&config)?;

    let events = event_catalog(&config)?.list_events()?;
    let event = find_event(&events, event_name)?;
    let window = build_event_window(&config);

    eprintln!(
        "Event: {} ({}, {}), {}h before to {}h after",
        event.name, event.coin, event.timestamp, window.before_hours, window.after_hours
    );
    let outcome = engine::run_event_backtest(&data_port, event, &window, &bt_config)?;

    print_summary(&outcome.result);
    write_reports(&outcome.result, &config, output, json)
}

fn run_compare(
    config_path: &Path,
    coin_override: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
    json: Option<&Path>,
) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let (zscore, percentile, ma_deviation) = build_detectors(&config, bt_config.detector)?;
    let data_port = data_adapter(&config)?;

    let coin = resolve_coin(coin_override, &config)?;
    let range = resolve_range(start, end, &config, &data_port, coin)?;

    eprintln!("Loading {} funding from {} to {}", coin, range.start, range.end);
    let series = data_port.fetch_funding(coin, &range)?;
    if series.is_empty() {
        return Err(FundingError::NoData {
            coin: coin.to_string(),
        });
    }

    let detectors: [&dyn SignalDetector; 3] = [&zscore, &percentile, &ma_deviation];
    eprintln!("Comparing {} detectors over {} points", detectors.len(), series.len());
    let comparisons = compare_detectors(&series, &detectors)?;

    print_comparison(&comparisons);
    if let Some(path) = json {
        write_json_file(&comparisons, path)?;
        eprintln!("\nComparison written to: {}", path.display());
    }
    Ok(())
}

fn run_list_events(config_path: &Path) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let events = event_catalog(&config)?.list_events()?;

    for event in &events {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            event.name,
            event.coin,
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event.category,
            event.impact
        );
    }
    eprintln!("{} events in catalog", events.len());
    Ok(())
}

fn run_all_events(config_path: &Path, json: Option<&Path>) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let data_port = data_adapter(&config)?;
    let events = event_catalog(&config)?.list_events()?;
    let window = build_event_window(&config);

    eprintln!("Backtesting {} events", events.len());
    let results = engine::run_event_backtests(&data_port, &events, &window, &bt_config)?;
    if results.is_empty() {
        return Err(FundingError::NoData {
            coin: "any catalog event".into(),
        });
    }

    eprintln!("\n=== Per-Event Summary ===");
    for r in &results {
        let summary = &r.result.summary;
        eprintln!(
            "  {} ({}):  {} trades, {} win rate, {:+.6} pnl",
            r.event.name,
            r.event.coin,
            summary.total_trades,
            fmt_pct(summary.win_rate),
            summary.total_pnl,
        );
    }

    if let Some(path) = json {
        write_json_file(&results, path)?;
        eprintln!("\nResults written to: {}", path.display());
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let window = build_event_window(&config);

    eprintln!("\nDetector:");
    eprintln!("  window:     {}", bt_config.detector.window);
    eprintln!("  threshold:  {}", bt_config.detector.threshold);
    eprintln!("\nSimulation:");
    eprintln!(
        "  max_holding_periods:       {}",
        bt_config.simulation.max_holding_periods
    );
    eprintln!(
        "  stop_loss_pct:             {}",
        bt_config.simulation.stop_loss_pct
    );
    eprintln!(
        "  allow_reentry_same_period: {}",
        bt_config.simulation.allow_reentry_same_period
    );
    eprintln!("\nInitial capital: {}", bt_config.initial_capital);
    eprintln!("\nEvent window: {}h before, {}h after", window.before_hours, window.after_hours);

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(coin_override: Option<&str>, config_path: &Path) -> Result<(), FundingError> {
    let config = load_config(config_path)?;
    let data_port = data_adapter(&config)?;

    let coins = match coin_override {
        Some(symbol) => vec![Coin::from_str(symbol)?],
        None => Coin::ALL.to_vec(),
    };

    for coin in coins {
        match data_port.data_range(coin) {
            Ok(Some((first, last, count))) => {
                let range = TimeRange { start: first, end: last };
                let series = data_port.fetch_funding(coin, &range)?;
                let mean = series.iter().map(|p| p.rate).sum::<f64>() / series.len().max(1) as f64;
                println!(
                    "{}: {} points, {} to {}, mean rate {:.6} ({:.2}% annualised)",
                    coin,
                    count,
                    first,
                    last,
                    mean,
                    annualized_funding(mean, FUNDING_PERIODS_PER_DAY) * 100.0
                );
            }
            Ok(None) => eprintln!("{}: no data found", coin),
            Err(e) => eprintln!("error querying {}: {}", coin, e),
        }
    }
    Ok(())
}

fn write_reports(
    result: &BacktestResult,
    config: &dyn ConfigPort,
    trades_csv: Option<PathBuf>,
    result_json: Option<PathBuf>,
) -> Result<(), FundingError> {
    let trades_csv = trades_csv.or_else(|| config.get_string("report", "trades_csv").map(PathBuf::from));
    let result_json =
        result_json.or_else(|| config.get_string("report", "result_json").map(PathBuf::from));

    let targets: [(Option<PathBuf>, &dyn ReportPort, &str); 2] = [
        (trades_csv, &CsvTradeReport, "Trades"),
        (result_json, &JsonReport, "Result"),
    ];
    for (path, port, label) in targets {
        if let Some(path) = path {
            port.write(result, &path)?;
            eprintln!("{label} written to: {}", path.display());
        }
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v * 100.0))
}

/// A non-negative loss magnitude shown as a negative amount. Anything that
/// rounds to zero prints unsigned.
fn fmt_loss(magnitude: f64) -> String {
    let shown = format!("{:.6}", magnitude.abs());
    if magnitude > 0.0 && shown.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        format!("-{shown}")
    } else {
        shown
    }
}

pub fn print_comparison(comparisons: &[DetectorComparison]) {
    eprintln!("\n=== Detector Comparison ===");
    println!("detector\tevaluated\tlong\tshort\tfrequency\tavg_confidence\tlong_share\tshort_share");
    for c in comparisons {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            c.name,
            c.stats.evaluated_points,
            c.stats.long_signals,
            c.stats.short_signals,
            fmt_pct(c.stats.signal_frequency),
            fmt_opt(c.avg_confidence, 3),
            fmt_pct(c.long_share),
            fmt_pct(c.short_share)
        );
    }
}

pub fn print_summary(result: &BacktestResult) {
    let stats = &result.signal_stats;
    let s = &result.summary;

    eprintln!("\n=== Signals ===");
    eprintln!(
        "Points:           {} ({} evaluated)",
        stats.total_points, stats.evaluated_points
    );
    eprintln!(
        "Signals:          {} long, {} short ({})",
        stats.long_signals,
        stats.short_signals,
        fmt_pct(stats.signal_frequency)
    );

    eprintln!("\n=== Results ===");
    eprintln!("Total Trades:     {}", s.total_trades);
    eprintln!(
        "Won/Lost/Even:    {}/{}/{}",
        s.trades_won, s.trades_lost, s.trades_breakeven
    );
    eprintln!("Win Rate:         {}", fmt_pct(s.win_rate));
    eprintln!("Total PnL:        {:+.6}", s.total_pnl);
    eprintln!("  Price PnL:      {:+.6}", s.total_price_pnl);
    eprintln!("  Funding PnL:    {:+.6}", s.total_funding_pnl);
    eprintln!("Avg PnL:          {}", fmt_opt(s.avg_pnl, 6));
    eprintln!("Largest Win:      {:.6}", s.largest_win);
    eprintln!("Largest Loss:     {}", fmt_loss(s.largest_loss));
    eprintln!("Profit Factor:    {}", fmt_opt(s.profit_factor, 2));
    eprintln!("Sharpe Ratio:     {}", fmt_opt(s.sharpe_ratio, 2));
    eprintln!("Max Drawdown:     {}", fmt_loss(s.max_drawdown));
    eprintln!(
        "Avg Holding:      {} periods ({} h)",
        fmt_opt(s.avg_holding_periods, 1),
        fmt_opt(s.avg_holding_hours, 1)
    );
    eprintln!(
        "Exits:            {} stop loss, {} time limit, {} reversal, {} end of data",
        s.exits.stop_loss, s.exits.time_limit, s.exits.signal_reversal, s.exits.end_of_data
    );

    let capital = &result.capital;
    eprintln!("\n=== Capital ===");
    eprintln!("Initial Capital:  {:.2}", capital.initial_capital);
    eprintln!("Final Capital:    {:.2}", capital.final_capital);
    eprintln!(
        "Total Return:     {:+.6} ({:+.4}%)",
        capital.total_return, capital.total_return_pct
    );
}
