//! StratLab CLI — backtest, validation, and analysis commands.
//!
//! Commands:
//! - `run` — execute a two-stage backtest from a TOML request file
//! - `walk-forward` — split the date range into folds and score overfitting
//! - `monte-carlo` — rank a run against random-entry baselines
//! - `filters` — rank entry-snapshot filters and verify the top candidates

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use stratlab_core::{ProfitFactor, ResultSummary, Timeframe};
use stratlab_runner::{
    analyze, load_artifacts, run_monte_carlo, run_walk_forward, save_artifacts, try_run_backtest,
    verify, BacktestRecord, BacktestRequest, InMemoryProvider, MonteCarloRequest, RunStatus,
    WalkForwardRequest, WalkForwardResult, MAX_FILTERS,
};

#[derive(Parser)]
#[command(
    name = "stratlab",
    about = "StratLab CLI — strategy backtesting and validation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a two-stage backtest from a TOML request file.
    Run {
        /// Path to a TOML backtest request.
        #[arg(long)]
        request: PathBuf,

        /// Path to a 1-minute OHLCV bar CSV.
        #[arg(long)]
        data: PathBuf,

        /// Output directory for result artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run walk-forward validation over the request's date range.
    WalkForward {
        /// Path to a TOML backtest request.
        #[arg(long)]
        request: PathBuf,

        /// Path to a 1-minute OHLCV bar CSV.
        #[arg(long)]
        data: PathBuf,

        /// Number of folds.
        #[arg(long, default_value_t = 5)]
        splits: usize,

        /// Explicit in-sample window length in days (default: 70% of each fold).
        #[arg(long)]
        in_sample_days: Option<i64>,

        /// Explicit out-of-sample window length in days (default: 30% of each fold).
        #[arg(long)]
        out_of_sample_days: Option<i64>,

        /// Cap worker threads (default: rayon's global pool).
        #[arg(long)]
        threads: Option<usize>,

        /// Write the full result as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rank a backtest against random-entry Monte Carlo baselines.
    MonteCarlo {
        /// Path to a TOML backtest request.
        #[arg(long)]
        request: PathBuf,

        /// Path to a 1-minute OHLCV bar CSV.
        #[arg(long)]
        data: PathBuf,

        /// Simulation count (100, 500, or 1000).
        #[arg(long, default_value_t = 500)]
        iterations: usize,

        /// Per-bar entry probability for the random baselines.
        #[arg(long, default_value_t = 0.05)]
        entry_probability: f64,

        /// Master seed for the baseline RNG hierarchy.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Cap worker threads (default: rayon's global pool).
        #[arg(long)]
        threads: Option<usize>,

        /// Write the full result as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Analyze entry snapshots of a saved run and verify suggested filters.
    Filters {
        /// Artifact directory of a completed run (contains manifest.json).
        #[arg(long)]
        run_dir: PathBuf,

        /// Verify the top N suggested filters applied together (0 = analyze only).
        #[arg(long, default_value_t = 0)]
        apply: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            request,
            data,
            output_dir,
        } => run_cmd(&request, &data, &output_dir),
        Commands::WalkForward {
            request,
            data,
            splits,
            in_sample_days,
            out_of_sample_days,
            threads,
            output,
        } => walk_forward_cmd(
            &request,
            &data,
            splits,
            in_sample_days,
            out_of_sample_days,
            threads,
            output.as_deref(),
        ),
        Commands::MonteCarlo {
            request,
            data,
            iterations,
            entry_probability,
            seed,
            threads,
            output,
        } => monte_carlo_cmd(
            &request,
            &data,
            iterations,
            entry_probability,
            seed,
            threads,
            output.as_deref(),
        ),
        Commands::Filters { run_dir, apply } => filters_cmd(&run_dir, apply),
    }
}

fn load_request(path: &Path) -> Result<BacktestRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request file: {}", path.display()))?;
    let request: BacktestRequest = toml::from_str(&text)
        .with_context(|| format!("failed to parse request file: {}", path.display()))?;
    request.validate()?;
    Ok(request)
}

fn load_provider(path: &Path) -> Result<InMemoryProvider> {
    InMemoryProvider::from_csv(path)
        .with_context(|| format!("failed to load bar data: {}", path.display()))
}

fn run_cmd(request_path: &Path, data_path: &Path, output_dir: &Path) -> Result<()> {
    let request = load_request(request_path)?;
    let provider = load_provider(data_path)?;

    let record = try_run_backtest(&request, &provider)?;
    print_record(&record);

    let run_dir = save_artifacts(&record, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn walk_forward_cmd(
    request_path: &Path,
    data_path: &Path,
    splits: usize,
    in_sample_days: Option<i64>,
    out_of_sample_days: Option<i64>,
    threads: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let request = load_request(request_path)?;
    let provider = load_provider(data_path)?;

    let wf_request = WalkForwardRequest {
        split_count: splits,
        start_date: request.start_date,
        end_date: request.end_date,
        in_sample_days,
        out_of_sample_days,
    };
    let result = run_walk_forward(&request, &wf_request, &provider, threads, None)?;

    print_walk_forward(&result);

    if let Some(path) = output {
        write_json(path, &result)?;
        println!("Result written to: {}", path.display());
    }

    Ok(())
}

fn monte_carlo_cmd(
    request_path: &Path,
    data_path: &Path,
    iterations: usize,
    entry_probability: f64,
    seed: u64,
    threads: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let request = load_request(request_path)?;
    let provider = load_provider(data_path)?;

    // The real run comes first; the baselines rank its summary.
    let record = try_run_backtest(&request, &provider)?;
    if record.status != RunStatus::Completed {
        bail!(
            "backtest failed, cannot rank it: {}",
            record.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    let mc_request = MonteCarloRequest {
        iterations,
        start_date: request.start_date,
        end_date: request.end_date,
        timeframe: Timeframe::M1,
        side: request.side,
        exit: request.exit.clone(),
        initial_capital: request.initial_capital,
        lot_size: request.lot_size,
        leverage: request.leverage,
        entry_probability,
        seed,
    };
    let result = run_monte_carlo(&mc_request, &record.summary, &provider, threads, None)?;

    println!();
    println!("=== Monte Carlo Baseline ({} simulations) ===", result.iterations);
    println!(
        "Win rate:       {:.2}% (baseline mean {:.2}%, percentile {:.1})",
        record.summary.win_rate * 100.0,
        result.statistics.win_rate.mean * 100.0,
        result.comparison.win_rate_percentile
    );
    println!(
        "Profit factor:  percentile {:.1}",
        result.comparison.profit_factor_percentile
    );
    println!(
        "Max drawdown:   percentile {:.1} (lower drawdown ranks higher)",
        result.comparison.max_drawdown_percentile
    );
    println!(
        "Net profit:     percentile {:.1}",
        result.comparison.net_profit_percentile
    );
    println!("Overall score:  {:.1}", result.comparison.overall_score);
    println!("Assessment:     {:?}", result.comparison.assessment);

    if let Some(path) = output {
        write_json(path, &result)?;
        println!("Result written to: {}", path.display());
    }

    Ok(())
}

fn filters_cmd(run_dir: &Path, apply: usize) -> Result<()> {
    if apply > MAX_FILTERS {
        bail!("--apply {apply} exceeds the maximum of {MAX_FILTERS} filters");
    }

    let record = load_artifacts(run_dir)?;
    if record.trades.is_empty() {
        println!("Run has no trades; nothing to analyze.");
        return Ok(());
    }

    let candidates = analyze(&record.trades);
    if candidates.is_empty() {
        println!("No indicator separates winners from losers in this run.");
        return Ok(());
    }

    println!();
    println!("=== Filter Candidates ({} trades) ===", record.trades.len());
    println!(
        "{:<16} {:>10} {:>10} {:>12}   Suggestion",
        "Indicator", "Win Avg", "Lose Avg", "Significance"
    );
    println!("{}", "-".repeat(68));
    for c in &candidates {
        println!(
            "{:<16} {:>10.3} {:>10.3} {:>12.1}   {} {:?} {:.3}",
            c.indicator_key,
            c.win_average,
            c.lose_average,
            c.significance_score,
            c.suggested.indicator_key,
            c.suggested.op,
            c.suggested.threshold,
        );
    }

    if apply == 0 {
        return Ok(());
    }

    let chosen: Vec<_> = candidates
        .iter()
        .take(apply)
        .map(|c| c.suggested.clone())
        .collect();
    let v = verify(&record.trades, &chosen, record.summary.initial_capital)?;

    println!();
    println!("=== Verification (top {} filter(s)) ===", chosen.len());
    println!("Trades:         {} -> {}", v.before.total_trades, v.after.total_trades);
    println!("Filtered out:   {}", v.filtered_out_trade_count);
    println!(
        "Win rate:       {:.2}% -> {:.2}% ({:+.2} pp)",
        v.before.win_rate * 100.0,
        v.after.win_rate * 100.0,
        v.win_rate_delta * 100.0
    );
    println!(
        "Profit factor:  {} -> {} ({:+.2})",
        pf_display(&v.before.profit_factor),
        pf_display(&v.after.profit_factor),
        v.profit_factor_delta
    );
    println!(
        "Net profit:     {:.2} -> {:.2} ({:+.2})",
        v.before.net_profit, v.after.net_profit, v.net_profit_delta
    );

    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn pf_display(pf: &ProfitFactor) -> String {
    match pf {
        ProfitFactor::Finite(v) => format!("{v:.2}"),
        ProfitFactor::Unbounded => "unbounded".into(),
    }
}

fn print_record(record: &BacktestRecord) {
    println!();
    println!("=== Backtest Result ===");
    println!("Run ID:         {}", record.id);
    println!(
        "Strategy:       {} v{}",
        record.strategy_id, record.version_number
    );
    println!("Stage:          {:?} ({:?})", record.stage, record.timeframe);
    println!("Status:         {:?}", record.status);
    if let Some(reason) = record.stopped_reason {
        println!("Stopped:        {reason:?}");
    }
    println!("Coverage:       {:.1}%", record.coverage_ratio * 100.0);
    if let Some(err) = &record.error_message {
        println!("Error:          {err}");
        return;
    }
    print_summary(&record.summary);
}

fn print_summary(summary: &ResultSummary) {
    println!();
    println!("--- Performance ---");
    println!("Trades:         {}", summary.total_trades);
    println!(
        "Wins/Losses:    {}/{} ({} timeouts)",
        summary.winning_trades, summary.losing_trades, summary.timeout_trades
    );
    println!("Win Rate:       {:.2}%", summary.win_rate * 100.0);
    println!("Net Profit:     {:.2}", summary.net_profit);
    println!("Profit Factor:  {}", pf_display(&summary.profit_factor));
    println!("Expectancy:     {:.2}", summary.expectancy);
    println!(
        "Max Drawdown:   {:.2} ({:.2}%)",
        summary.max_drawdown,
        summary.max_drawdown_rate() * 100.0
    );
    println!("Max Consec Win: {}", summary.max_consecutive_wins);
    println!("Max Consec Loss:{}", summary.max_consecutive_losses);
    println!();
}

fn print_walk_forward(result: &WalkForwardResult) {
    println!();
    println!("=== Walk-Forward Validation ===");
    println!(
        "{:<6} {:<24} {:<24} {:>8} {:>8} {:>10}",
        "Split", "In-Sample", "Out-of-Sample", "IS WR", "OOS WR", "Divergence"
    );
    println!("{}", "-".repeat(86));
    for split in &result.splits {
        println!(
            "{:<6} {:<24} {:<24} {:>7.2}% {:>7.2}% {:>10.4}",
            split.split_number,
            format!("{} to {}", split.in_sample.start, split.in_sample.end),
            format!("{} to {}", split.out_of_sample.start, split.out_of_sample.end),
            split.in_sample_summary.win_rate * 100.0,
            split.out_of_sample_summary.win_rate * 100.0,
            split.win_rate_divergence(),
        );
    }
    println!();
    println!("Overfit score:  {:.4} (mean |IS - OOS| win-rate gap)", result.overfit_score);
}
