//! Monte Carlo baseline — random-entry distributions for significance ranking.
//!
//! Each iteration replaces the strategy's entry rule with a seeded random
//! process and runs it through the exact simulator and aggregator a real
//! strategy uses, so TP/SL/timeout semantics are shared code. The resulting
//! per-metric distributions locate the real strategy: a win rate that lands
//! at the 95th percentile of random entries means something, the same win
//! rate at the 50th means the exits are doing all the work.
//!
//! Sub-seeds derive from the master seed per iteration through the RNG
//! hierarchy, so a fixed (data, seed) pair reproduces the same distribution
//! no matter how Rayon schedules the iterations.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::{
    simulate, summarize, PriceOffset, RandomTrigger, ResultSummary, RngHierarchy, SimConfig,
    Timeframe, TradeSide,
};

use crate::config::ExitSpec;
use crate::data_loader::{LoadError, SeriesProvider};

/// Permitted iteration counts.
pub const ALLOWED_ITERATIONS: [usize; 3] = [100, 500, 1000];

/// Numeric stand-in for an unbounded profit factor in distribution space.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Bin count for every metric histogram.
pub const HISTOGRAM_BINS: usize = 10;

/// Per-bar entry probability of the random baseline process.
pub const DEFAULT_ENTRY_PROBABILITY: f64 = 0.05;

/// RNG hierarchy scope for baseline iterations.
const MC_SCOPE: &str = "mc";

/// Monte Carlo request: the exit-rule shape of a real backtest plus an
/// iteration count and seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    /// Must be one of [`ALLOWED_ITERATIONS`].
    pub iterations: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timeframe: Timeframe,
    pub side: TradeSide,
    pub exit: ExitSpec,
    pub initial_capital: f64,
    pub lot_size: f64,
    pub leverage: f64,
    #[serde(default = "default_entry_probability")]
    pub entry_probability: f64,
    pub seed: u64,
}

fn default_entry_probability() -> f64 {
    DEFAULT_ENTRY_PROBABILITY
}

impl MonteCarloRequest {
    fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig::new(
            self.side,
            self.exit.take_profit,
            self.exit.stop_loss,
            self.exit.timeout_bars(self.timeframe),
        );
        config.lot_size = self.lot_size;
        config.leverage = self.leverage;
        config.initial_capital = self.initial_capital;
        config
    }
}

/// Errors from the baseliner.
#[derive(Debug, Error)]
pub enum McError {
    #[error("iteration count {0} is not one of 100, 500, 1000")]
    BadIterationCount(usize),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("monte carlo cancelled")]
    Cancelled,
}

// ─── Distribution types ──────────────────────────────────────────────

/// One histogram bin with its percentage mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    /// Share of samples in [lower, upper), as a percentage.
    pub pct: f64,
}

/// Distribution summary of one metric across all iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub histogram: Vec<HistogramBin>,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Distributions for every ranked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDistributions {
    pub win_rate: DistributionStats,
    /// Profit factor with `Unbounded` capped at [`PROFIT_FACTOR_CAP`].
    pub profit_factor: DistributionStats,
    pub max_drawdown_rate: DistributionStats,
    pub net_profit_rate: DistributionStats,
}

/// Qualitative banding of the combined percentile rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
}

impl Assessment {
    /// Fixed banding of the overall 0-100 score.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Assessment::Excellent
        } else if score >= 70.0 {
            Assessment::Good
        } else if score >= 40.0 {
            Assessment::Average
        } else if score >= 20.0 {
            Assessment::Poor
        } else {
            Assessment::VeryPoor
        }
    }
}

/// Where the real strategy lands inside the baseline distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McComparison {
    pub win_rate_percentile: f64,
    pub profit_factor_percentile: f64,
    /// Percentile of the real drawdown within the baseline drawdowns;
    /// lower drawdown than the baseline is better.
    pub max_drawdown_percentile: f64,
    pub net_profit_percentile: f64,
    /// Mean of the per-metric scores, drawdown inverted so that 100 is
    /// uniformly "better than random".
    pub overall_score: f64,
    pub assessment: Assessment,
}

/// Complete Monte Carlo result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub iterations: usize,
    pub simulations: Vec<ResultSummary>,
    pub statistics: MetricDistributions,
    pub comparison: McComparison,
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run the random-entry baseline and rank `real` against it.
///
/// Iterations run in parallel and fail fast; `cancel` is polled between
/// iterations. Deterministic for a fixed (data, seed) pair.
pub fn run_monte_carlo(
    request: &MonteCarloRequest,
    real: &ResultSummary,
    provider: &dyn SeriesProvider,
    thread_cap: Option<usize>,
    cancel: Option<&AtomicBool>,
) -> Result<MonteCarloResult, McError> {
    if !ALLOWED_ITERATIONS.contains(&request.iterations) {
        return Err(McError::BadIterationCount(request.iterations));
    }

    let loaded = provider.series(request.timeframe, request.start_date, request.end_date)?;
    let bars = loaded.series.bars();
    let config = request.sim_config();
    let hierarchy = RngHierarchy::new(request.seed);
    let probability = request.entry_probability.clamp(0.0, 1.0);

    let iterate = || -> Result<Vec<ResultSummary>, McError> {
        (0..request.iterations)
            .into_par_iter()
            .map(|i| {
                if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                    return Err(McError::Cancelled);
                }
                let mut trigger =
                    RandomTrigger::new(hierarchy.rng_for(MC_SCOPE, i as u64), probability);
                let outcome = simulate(bars, &config, &mut trigger);
                Ok(summarize(&outcome.trades, config.initial_capital))
            })
            .collect()
    };

    let simulations = match thread_cap {
        Some(cap) if cap > 0 => rayon::ThreadPoolBuilder::new()
            .num_threads(cap)
            .build()
            .expect("failed to build Rayon thread pool")
            .install(iterate),
        _ => iterate(),
    }?;

    let statistics = compute_distributions(&simulations);
    let comparison = compare(real, &simulations);

    Ok(MonteCarloResult {
        iterations: request.iterations,
        simulations,
        statistics,
        comparison,
    })
}

// ─── Statistics ──────────────────────────────────────────────────────

fn metric_values(simulations: &[ResultSummary], metric: fn(&ResultSummary) -> f64) -> Vec<f64> {
    simulations.iter().map(metric).collect()
}

fn win_rate(s: &ResultSummary) -> f64 {
    s.win_rate
}

fn profit_factor(s: &ResultSummary) -> f64 {
    s.profit_factor.capped(PROFIT_FACTOR_CAP)
}

fn max_drawdown_rate(s: &ResultSummary) -> f64 {
    s.max_drawdown_rate()
}

fn net_profit_rate(s: &ResultSummary) -> f64 {
    s.net_profit_rate()
}

fn compute_distributions(simulations: &[ResultSummary]) -> MetricDistributions {
    MetricDistributions {
        win_rate: distribution_stats(&metric_values(simulations, win_rate)),
        profit_factor: distribution_stats(&metric_values(simulations, profit_factor)),
        max_drawdown_rate: distribution_stats(&metric_values(simulations, max_drawdown_rate)),
        net_profit_rate: distribution_stats(&metric_values(simulations, net_profit_rate)),
    }
}

fn compare(real: &ResultSummary, simulations: &[ResultSummary]) -> McComparison {
    let rank = |metric: fn(&ResultSummary) -> f64| {
        percentile_rank(&metric_values(simulations, metric), metric(real))
    };

    let win_rate_percentile = rank(win_rate);
    let profit_factor_percentile = rank(profit_factor);
    let max_drawdown_percentile = rank(max_drawdown_rate);
    let net_profit_percentile = rank(net_profit_rate);

    // Drawdown inverts: sitting below the baseline drawdowns is good.
    let overall_score = (win_rate_percentile
        + profit_factor_percentile
        + net_profit_percentile
        + (100.0 - max_drawdown_percentile))
        / 4.0;

    McComparison {
        win_rate_percentile,
        profit_factor_percentile,
        max_drawdown_percentile,
        net_profit_percentile,
        overall_score,
        assessment: Assessment::from_score(overall_score),
    }
}

/// Summary statistics over one metric's samples.
fn distribution_stats(values: &[f64]) -> DistributionStats {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    DistributionStats {
        mean,
        median: percentile_sorted(&sorted, 50.0),
        std_dev: variance.sqrt(),
        histogram: histogram(&sorted),
        p5: percentile_sorted(&sorted, 5.0),
        p25: percentile_sorted(&sorted, 25.0),
        p50: percentile_sorted(&sorted, 50.0),
        p75: percentile_sorted(&sorted, 75.0),
        p95: percentile_sorted(&sorted, 95.0),
    }
}

/// Fixed-bin histogram over the sample range, percentage mass per bin.
/// A degenerate (constant) sample puts 100% in a single bin.
fn histogram(sorted: &[f64]) -> Vec<HistogramBin> {
    let n = sorted.len();
    if n == 0 {
        return Vec::new();
    }
    let min = sorted[0];
    let max = sorted[n - 1];
    if (max - min).abs() < 1e-15 {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            pct: 100.0,
        }];
    }

    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for &v in sorted {
        let bin = (((v - min) / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            pct: count as f64 / n as f64 * 100.0,
        })
        .collect()
}

/// Percentile of a sorted slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Rank of `value` inside `values` as a 0-100 percentile, splitting ties.
fn percentile_rank(values: &[f64], value: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let below = values.iter().filter(|&&v| v < value).count() as f64;
    let equal = values.iter().filter(|&&v| v == value).count() as f64;
    (below + equal / 2.0) / values.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::InMemoryProvider;
    use stratlab_core::{Bar, BarSeries};

    fn provider() -> InMemoryProvider {
        let bars: Vec<Bar> = (0..1440)
            .map(|i| {
                let price = 100.0 + (i as f64 * 0.01).sin() * 3.0;
                Bar {
                    timestamp: NaiveDate::from_ymd_opt(2024, 3, 4)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                        + chrono::Duration::minutes(i),
                    open: price,
                    high: price + 0.3,
                    low: price - 0.3,
                    close: price,
                    volume: 25.0,
                }
            })
            .collect();
        InMemoryProvider::new(BarSeries::new(bars).unwrap())
    }

    fn request() -> MonteCarloRequest {
        MonteCarloRequest {
            iterations: 100,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            timeframe: Timeframe::M1,
            side: TradeSide::Long,
            exit: ExitSpec {
                take_profit: PriceOffset::Percent(0.5),
                stop_loss: PriceOffset::Percent(0.5),
                max_holding_minutes: 30,
            },
            initial_capital: 1_000_000.0,
            lot_size: 1_000.0,
            leverage: 100.0,
            entry_probability: 0.1,
            seed: 42,
        }
    }

    #[test]
    fn rejects_unsupported_iteration_counts() {
        let mut req = request();
        req.iterations = 250;
        let result = run_monte_carlo(&req, &ResultSummary::empty(), &provider(), None, None);
        assert!(matches!(result, Err(McError::BadIterationCount(250))));
    }

    #[test]
    fn seeded_runs_reproduce_statistics() {
        let provider = provider();
        let real = ResultSummary::empty();
        let a = run_monte_carlo(&request(), &real, &provider, None, None).unwrap();
        let b = run_monte_carlo(&request(), &real, &provider, Some(2), None).unwrap();
        // Identical regardless of thread scheduling
        assert_eq!(a.statistics, b.statistics);
        assert_eq!(a.comparison, b.comparison);
    }

    #[test]
    fn different_seeds_differ() {
        let provider = provider();
        let real = ResultSummary::empty();
        let a = run_monte_carlo(&request(), &real, &provider, None, None).unwrap();
        let mut req = request();
        req.seed = 43;
        let b = run_monte_carlo(&req, &real, &provider, None, None).unwrap();
        assert_ne!(a.statistics, b.statistics);
    }

    #[test]
    fn cancellation_aborts_the_batch() {
        let cancel = AtomicBool::new(true);
        let result = run_monte_carlo(
            &request(),
            &ResultSummary::empty(),
            &provider(),
            None,
            Some(&cancel),
        );
        assert!(matches!(result, Err(McError::Cancelled)));
    }

    #[test]
    fn histogram_mass_sums_to_hundred() {
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
        let bins = histogram(&values);
        assert_eq!(bins.len(), HISTOGRAM_BINS);
        let total: f64 = bins.iter().map(|b| b.pct).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_degenerate_sample_single_bin() {
        let bins = histogram(&[2.5; 40]);
        assert_eq!(bins.len(), 1);
        assert!((bins[0].pct - 100.0).abs() < 1e-12);
    }

    #[test]
    fn percentiles_interpolate() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile_sorted(&sorted, 50.0) - 3.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 25.0) - 2.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 95.0) - 4.8).abs() < 1e-12);
    }

    #[test]
    fn percentile_rank_splits_ties() {
        let values = vec![1.0, 2.0, 2.0, 3.0];
        assert!((percentile_rank(&values, 2.0) - 50.0).abs() < 1e-12);
        assert!((percentile_rank(&values, 10.0) - 100.0).abs() < 1e-12);
        assert!((percentile_rank(&values, 0.0) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn assessment_banding() {
        assert_eq!(Assessment::from_score(95.0), Assessment::Excellent);
        assert_eq!(Assessment::from_score(90.0), Assessment::Excellent);
        assert_eq!(Assessment::from_score(75.0), Assessment::Good);
        assert_eq!(Assessment::from_score(50.0), Assessment::Average);
        assert_eq!(Assessment::from_score(25.0), Assessment::Poor);
        assert_eq!(Assessment::from_score(5.0), Assessment::VeryPoor);
    }

    #[test]
    fn strong_real_strategy_outranks_random_baseline() {
        let provider = provider();
        let mut real = ResultSummary::empty();
        real.win_rate = 1.0;
        real.profit_factor = stratlab_core::ProfitFactor::Unbounded;
        real.net_profit = 500_000.0;
        real.initial_capital = 1_000_000.0;
        real.max_drawdown = 0.0;
        let result = run_monte_carlo(&request(), &real, &provider, None, None).unwrap();
        assert!(result.comparison.overall_score > 90.0);
        assert_eq!(result.comparison.assessment, Assessment::Excellent);
    }

    #[test]
    fn unbounded_profit_factor_capped_in_distributions() {
        assert_eq!(
            profit_factor(&{
                let mut s = ResultSummary::empty();
                s.profit_factor = stratlab_core::ProfitFactor::Unbounded;
                s
            }),
            PROFIT_FACTOR_CAP
        );
    }
}
