//! BarSeries — a validated, time-ordered sequence of OHLCV bars.
//!
//! The ordering invariant (strictly increasing timestamps, no duplicates) is
//! checked exactly once at construction; everything downstream may index the
//! series without re-validating.

use crate::domain::{Bar, Timeframe};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from series construction.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("empty bar series")]
    Empty,
    #[error("non-increasing timestamp at index {index}: {current} follows {previous}")]
    OutOfOrder {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
    #[error("insane OHLC values at index {index}")]
    InsaneBar { index: usize },
}

/// A time-ordered bar sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate and wrap a bar vector.
    ///
    /// Rejects empty input, out-of-order or duplicate timestamps, and bars
    /// whose OHLC ranges are inconsistent.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::InsaneBar { index: i });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(SeriesError::OutOfOrder {
                    index: i,
                    previous: bars[i - 1].timestamp,
                    current: bar.timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Sub-series covering `[start, end]` calendar dates (inclusive).
    ///
    /// Returns `None` if no bar falls inside the window. The slice preserves
    /// the ordering invariant by construction.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Option<BarSeries> {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| {
                let d = b.timestamp.date();
                d >= start && d <= end
            })
            .cloned()
            .collect();
        if bars.is_empty() {
            None
        } else {
            Some(BarSeries { bars })
        }
    }

    /// Downsample to a coarser timeframe by bucketing on wall-clock intervals.
    ///
    /// Open is the first bar's open in the bucket, high/low span the bucket,
    /// close is the last bar's close, volume is summed. Bucket boundaries are
    /// aligned to the Unix epoch, matching how most charting feeds cut bars.
    pub fn resample(&self, target: Timeframe) -> BarSeries {
        let bucket_secs = i64::from(target.minutes()) * 60;
        let mut out: Vec<Bar> = Vec::new();
        let mut current_bucket: Option<i64> = None;

        for bar in &self.bars {
            let bucket = bar.timestamp.and_utc().timestamp().div_euclid(bucket_secs);
            match current_bucket {
                Some(b) if b == bucket => {
                    let agg = out.last_mut().expect("bucket open implies output bar");
                    agg.high = agg.high.max(bar.high);
                    agg.low = agg.low.min(bar.low);
                    agg.close = bar.close;
                    agg.volume += bar.volume;
                }
                _ => {
                    current_bucket = Some(bucket);
                    out.push(bar.clone());
                }
            }
        }

        BarSeries { bars: out }
    }
}
