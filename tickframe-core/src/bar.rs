//! BarRecord — the bar-shaped ingestion record.
//!
//! One logical row of a feature table: the UTC instant the bar covers,
//! the local/session timestamp, OHLCV, and the completion flag. Both
//! timestamps are Unix seconds; conversion to wall-clock types happens
//! at the query boundary (`FeatureTable::records`).

use serde::{Deserialize, Serialize};

/// One OHLCV bar for a single timeframe slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    /// UTC instant the bar covers (bucket timestamp), Unix seconds.
    pub date: i64,
    /// Local/session timestamp of the bar, Unix seconds.
    pub date_l: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    /// Whether the bar's interval has fully elapsed.
    pub cpl: bool,
}

impl BarRecord {
    /// Basic OHLC sanity check: high is the top of the range, low the bottom.
    pub fn is_sane(&self) -> bool {
        !self.open.is_nan()
            && !self.close.is_nan()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> BarRecord {
        BarRecord {
            date: 1_700_000_100,
            date_l: 1_700_000_100 - 5 * 3600,
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000,
            cpl: true,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut bar = sample_bar();
        bar.high = 97.0; // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: BarRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
