//! Built-in indicator provider: SMA, EMA, RSI, ATR.
//!
//! Trailing-window forms computed at a single bar index. RSI uses Wilder
//! smoothing seeded over the first `period` changes of the window; ATR uses
//! the true-range mean over the trailing `period` bars.

use super::IndicatorProvider;
use crate::domain::{Bar, IndicatorSpec};

/// Default provider covering the common oscillator/average keys:
/// `sma`, `ema`, `rsi`, `atr`. Unknown keys resolve to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinIndicators;

impl IndicatorProvider for BuiltinIndicators {
    fn value(&self, spec: &IndicatorSpec, bars: &[Bar], index: usize) -> Option<f64> {
        if index >= bars.len() || spec.period == 0 {
            return None;
        }
        let value = match spec.key.as_str() {
            "sma" => sma(bars, index, spec.period),
            "ema" => ema(bars, index, spec.period),
            "rsi" => rsi(bars, index, spec.period),
            "atr" => atr(bars, index, spec.period),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Rolling mean of closes over the window ending at `index`.
fn sma(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    if index + 1 < period {
        return None;
    }
    let window = &bars[index + 1 - period..=index];
    Some(window.iter().map(|b| b.close).sum::<f64>() / period as f64)
}

/// Exponential moving average seeded with the SMA of the first `period`
/// closes, then smoothed with alpha = 2 / (period + 1).
fn ema(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    if index + 1 < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
    for bar in &bars[period..=index] {
        value = alpha * bar.close + (1.0 - alpha) * value;
    }
    Some(value)
}

/// Wilder RSI. Needs `period + 1` bars for the seed changes.
fn rsi(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    if index < period {
        return None;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = bars[i].close - bars[i - 1].close;
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..=index {
        let change = bars[i].close - bars[i - 1].close;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
    }

    Some(if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    })
}

/// Average true range over the trailing `period` bars ending at `index`.
fn atr(bars: &[Bar], index: usize, period: usize) -> Option<f64> {
    if index < period {
        return None;
    }
    let mut sum = 0.0;
    for i in (index + 1 - period)..=index {
        let prev_close = bars[i - 1].close;
        let tr = (bars[i].high - bars[i].low)
            .max((bars[i].high - prev_close).abs())
            .max((bars[i].low - prev_close).abs());
        sum += tr;
    }
    Some(sum / period as f64)
}
