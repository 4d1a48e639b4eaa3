//! Timeframe — the bar interval a series is sampled at.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported bar intervals.
///
/// `M1` is reserved for the precision (stage-2) pass; coarse backtests run on
/// one of the larger intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Interval length in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Whether this interval is allowed as a coarse (stage-1) timeframe.
    pub fn is_coarse(&self) -> bool {
        !matches!(self, Timeframe::M1)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::M1 => "1m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_per_interval() {
        assert_eq!(Timeframe::M1.minutes(), 1);
        assert_eq!(Timeframe::M15.minutes(), 15);
        assert_eq!(Timeframe::H4.minutes(), 240);
        assert_eq!(Timeframe::D1.minutes(), 1440);
    }

    #[test]
    fn only_m1_is_fine() {
        assert!(!Timeframe::M1.is_coarse());
        for tf in [
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ] {
            assert!(tf.is_coarse());
        }
    }

    #[test]
    fn serde_uses_short_names() {
        assert_eq!(serde_json::to_string(&Timeframe::H1).unwrap(), "\"1h\"");
        let tf: Timeframe = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(tf, Timeframe::M15);
    }
}
