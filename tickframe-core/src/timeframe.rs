//! Timeframe registry — the closed set of supported bar resolutions.
//!
//! Each timeframe is a singleton with a fixed duration in seconds and a
//! category derived from that duration. Variant order is ascending by
//! duration, so the derived `Ord` sorts finest to coarsest.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

const DAY_SECS: i64 = 86_400;

/// Bucket-rule category of a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeframeCategory {
    Intraday,
    Daily,
    Weekly,
    Monthly,
}

/// A named bar resolution. `Mo1` is the calendar month (the registry name
/// is `"M1"`, upper-case, distinguishing it from the 1-minute `"m1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "m1")]
    M1,
    #[serde(rename = "m2")]
    M2,
    #[serde(rename = "m3")]
    M3,
    #[serde(rename = "m5")]
    M5,
    #[serde(rename = "m15")]
    M15,
    #[serde(rename = "m30")]
    M30,
    #[serde(rename = "d1")]
    D1,
    #[serde(rename = "w1")]
    W1,
    #[serde(rename = "M1")]
    Mo1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Timeframe::M1,
        Timeframe::M2,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::Mo1,
    ];

    /// Registry name, e.g. `"m5"`, `"d1"`, `"M1"`.
    pub fn name(self) -> &'static str {
        match self {
            Timeframe::M1 => "m1",
            Timeframe::M2 => "m2",
            Timeframe::M3 => "m3",
            Timeframe::M5 => "m5",
            Timeframe::M15 => "m15",
            Timeframe::M30 => "m30",
            Timeframe::D1 => "d1",
            Timeframe::W1 => "w1",
            Timeframe::Mo1 => "M1",
        }
    }

    /// Bar duration in seconds. The monthly duration is nominal (31 days);
    /// monthly buckets use calendar arithmetic, not this value.
    pub fn duration_secs(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M2 => 2 * 60,
            Timeframe::M3 => 3 * 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::D1 => DAY_SECS,
            Timeframe::W1 => 7 * DAY_SECS,
            Timeframe::Mo1 => 31 * DAY_SECS,
        }
    }

    pub fn category(self) -> TimeframeCategory {
        match self {
            Timeframe::D1 => TimeframeCategory::Daily,
            Timeframe::W1 => TimeframeCategory::Weekly,
            Timeframe::Mo1 => TimeframeCategory::Monthly,
            _ => TimeframeCategory::Intraday,
        }
    }

    /// Resolve a registry name. Unknown names are a configuration error.
    pub fn lookup(name: &str) -> Result<Timeframe, EngineError> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.name() == name)
            .ok_or_else(|| EngineError::UnknownTimeframe(name.to_string()))
    }

    /// Display label with unit and digits swapped, e.g. `"m5"` → `"5m"`.
    pub fn flip(self) -> String {
        let name = self.name();
        format!("{}{}", &name[1..], &name[..1])
    }

    pub fn is_intraday(self) -> bool {
        self.duration_secs() < DAY_SECS
    }

    /// Daily, weekly or monthly.
    pub fn is_outside_day(self) -> bool {
        !self.is_intraday()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
