//! Bar data access for the runner.
//!
//! Simulations consume a pre-fetched, validated 1-minute series; the runner
//! slices it to the requested date range and resamples to coarser timeframes
//! on demand. `SeriesProvider` is the seam: the in-memory implementation here
//! backs CSV-loaded data and tests, and any other source (a cache, a feed)
//! can plug in behind the same trait.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use stratlab_core::{Bar, BarSeries, SeriesError, Timeframe};

/// Errors from the data layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read bar file: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {message}")]
    MalformedRow { row: usize, message: String },
    #[error("series error: {0}")]
    Series(#[from] SeriesError),
    #[error("no bars between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },
}

/// A series ready for simulation, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: BarSeries,
    /// Bars delivered over bars expected for the range and timeframe.
    /// Below 1.0 means gaps (weekends, holidays, missing feed data).
    pub coverage_ratio: f64,
    /// BLAKE3 over the underlying 1m data, for run fingerprinting.
    pub dataset_hash: String,
}

/// Source of bar series for backtest runs.
pub trait SeriesProvider: Send + Sync {
    fn series(
        &self,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LoadedSeries, LoadError>;
}

// ─── CSV loading ─────────────────────────────────────────────────────

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load a 1-minute bar series from a CSV file.
///
/// Expected header: `timestamp,open,high,low,close,volume` with timestamps
/// formatted `YYYY-MM-DD HH:MM:SS`. Ordering and OHLC sanity are enforced by
/// `BarSeries` construction.
pub fn load_bars_csv(path: &Path) -> Result<BarSeries, LoadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| LoadError::MalformedRow {
                row: i + 2, // 1-based, after the header line
                message: format!("bad timestamp '{}': {e}", row.timestamp),
            })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(BarSeries::new(bars)?)
}

// ─── In-memory provider ──────────────────────────────────────────────

/// Provider backed by one fully loaded 1-minute series.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    m1: BarSeries,
    dataset_hash: String,
}

impl InMemoryProvider {
    pub fn new(m1: BarSeries) -> Self {
        let dataset_hash = hash_series(&m1);
        Self { m1, dataset_hash }
    }

    pub fn from_csv(path: &Path) -> Result<Self, LoadError> {
        Ok(Self::new(load_bars_csv(path)?))
    }

    pub fn dataset_hash(&self) -> &str {
        &self.dataset_hash
    }
}

impl SeriesProvider for InMemoryProvider {
    fn series(
        &self,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LoadedSeries, LoadError> {
        let sliced = self
            .m1
            .slice_dates(start, end)
            .ok_or(LoadError::EmptyRange { start, end })?;
        let series = if timeframe == Timeframe::M1 {
            sliced
        } else {
            sliced.resample(timeframe)
        };
        let coverage_ratio = coverage_ratio(&series, timeframe, start, end);
        Ok(LoadedSeries {
            series,
            coverage_ratio,
            dataset_hash: self.dataset_hash.clone(),
        })
    }
}

/// Fraction of the expected bar count actually present, capped at 1.0.
fn coverage_ratio(series: &BarSeries, timeframe: Timeframe, start: NaiveDate, end: NaiveDate) -> f64 {
    let days = (end - start).num_days() + 1;
    let expected = (days * 1440) / i64::from(timeframe.minutes());
    if expected <= 0 {
        return 0.0;
    }
    (series.len() as f64 / expected as f64).min(1.0)
}

/// Content hash of a series: timestamps and OHLCV bytes through BLAKE3.
fn hash_series(series: &BarSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in series.bars() {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
