//! TickFrame Core — multi-timeframe OHLCV feature engine.
//!
//! The crate maintains fixed-capacity rolling bar buffers across a set of
//! timeframes, derives coarser bars from finer ones (batch and
//! incrementally), and runs pluggable computation units (indicators and
//! strategies) whose outputs live as extra feature columns alongside the
//! bars. Building blocks:
//! - Typed feature tables with a fixed OHLCV core schema
//! - Rolling buffers with an update/roll/reject state machine
//! - Intraday, weekly and monthly resampling with completion tracking
//! - Higher-timeframe feature realignment onto finer lanes
//! - A pipeline orchestrator with a fixed per-tick phase order

pub mod bar;
pub mod buffer;
pub mod engine;
pub mod error;
pub mod realign;
pub mod resample;
pub mod table;
pub mod timeframe;
pub mod units;

pub use bar::BarRecord;
pub use buffer::{RollingBuffer, UpdateOutcome};
pub use engine::{Pipeline, PipelineSpec, TickOutcome, UnitSpec};
pub use error::EngineError;
pub use realign::{realigned_name, Align, RealignEntry};
pub use table::{Column, Dtype, FeatureDefinition, FeatureTable, FeatureValue};
pub use timeframe::{Timeframe, TimeframeCategory};
pub use units::{ComputationUnit, ParamValue, Params, UnitRegistry};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types crossing the pipeline/caller seam are
    /// Send + Sync so a feed thread can own a pipeline outright.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<BarRecord>();
        require_sync::<BarRecord>();
        require_send::<RollingBuffer>();
        require_sync::<RollingBuffer>();
        require_send::<FeatureTable>();
        require_sync::<FeatureTable>();
        require_send::<Pipeline>();
        require_send::<UnitRegistry>();
    }
}
