//! Engine error taxonomy.
//!
//! Only structural and configuration problems surface as errors; a stale
//! bar update is reported through [`crate::buffer::UpdateOutcome`] flags so
//! the live loop keeps running.

use crate::timeframe::Timeframe;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A timeframe name that is not in the registry.
    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    /// Resample/realign attempted against the timeframe ordering rules
    /// (finer onto coarser, same-to-same, or incompatible categories).
    #[error("invalid timeframe order: cannot derive {to} from {from}")]
    InvalidTimeframeOrder { from: Timeframe, to: Timeframe },

    /// No bucket rule is defined for this resample target.
    #[error("no bucket rule for target timeframe {0}")]
    UnsupportedTimeframe(Timeframe),

    /// Lookup of a feature name that is not declared in the table.
    #[error("no feature with name {0}")]
    MissingFeature(String),

    /// Column length or dtype does not match the table schema, or a
    /// computation unit's outputs do not match its declared definitions.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A computation unit name with no registered factory.
    #[error("unknown computation unit: {0}")]
    UnknownUnit(String),
}
