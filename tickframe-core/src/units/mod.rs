//! Computation units — the pluggable indicator/strategy contract.
//!
//! A unit declares its input feature names, parameters and typed output
//! definitions. `prepare` computes full-length output columns once a
//! buffer is populated; `update` recomputes only the last index and is
//! only valid after the owning buffer's bar data for the current tick has
//! been written (the pipeline preserves that ordering).
//!
//! Units are constructed through an explicit [`UnitRegistry`] of factory
//! closures, so a missing unit name fails at construction instead of at
//! runtime name resolution.

pub mod anatomy;
pub mod mas;
pub mod rsi;
pub mod rsi_strategy;

pub use anatomy::CandleAnatomy;
pub use mas::MovingAverages;
pub use rsi::Rsi;
pub use rsi_strategy::RsiStrategy;

use crate::error::EngineError;
use crate::table::{Column, FeatureDefinition, FeatureTable, FeatureValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A unit parameter value as it appears in a pipeline spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Named parameters for one unit instance.
pub type Params = BTreeMap<String, ParamValue>;

/// Extract a named f64 parameter, falling back to `default`.
pub fn param_f64(params: &Params, name: &str, default: f64) -> f64 {
    match params.get(name) {
        Some(ParamValue::Float(v)) => *v,
        Some(ParamValue::Int(v)) => *v as f64,
        _ => default,
    }
}

/// Extract a named usize parameter, falling back to `default`.
pub fn param_usize(params: &Params, name: &str, default: usize) -> usize {
    match params.get(name) {
        Some(ParamValue::Int(v)) if *v >= 0 => *v as usize,
        Some(ParamValue::Float(v)) if *v >= 0.0 => *v as usize,
        _ => default,
    }
}

/// Extract a named string parameter, falling back to `default`.
pub fn param_str(params: &Params, name: &str, default: &str) -> String {
    match params.get(name) {
        Some(ParamValue::Str(v)) => v.clone(),
        _ => default.to_string(),
    }
}

/// The indicator/strategy contract driven by the pipeline. Units are
/// plain data so a feed thread can own a pipeline outright.
pub trait ComputationUnit: Send {
    /// Instance name, e.g. `"rsi"` or `"rsi_strategy"`.
    fn name(&self) -> &str;

    /// Feature names this unit reads. All must exist in the consuming
    /// table at construction time.
    fn input_names(&self) -> &[String];

    /// Typed definitions of the columns this unit writes.
    fn output_defs(&self) -> &[FeatureDefinition];

    /// Compute all outputs over the entire buffer length, in
    /// `output_defs` order.
    fn prepare(&mut self, table: &FeatureTable) -> Result<Vec<Column>, EngineError>;

    /// Recompute only the last index of each output, in `output_defs`
    /// order. The buffer's bar data for the current tick must already be
    /// written.
    fn update(&mut self, table: &FeatureTable) -> Result<Vec<FeatureValue>, EngineError>;
}

type UnitFactory =
    Box<dyn Fn(&Params) -> Result<Box<dyn ComputationUnit>, EngineError> + Send + Sync>;

/// Explicit name → factory mapping for the closed set of units.
pub struct UnitRegistry {
    factories: BTreeMap<String, UnitFactory>,
}

impl UnitRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every built-in unit.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("rsi", |p| Ok(Box::new(Rsi::new(param_usize(p, "period", 14)))));
        reg.register("moving_averages", |_| Ok(Box::new(MovingAverages::new())));
        reg.register("candle_anatomy", |_| Ok(Box::new(CandleAnatomy::new())));
        reg.register("rsi_strategy", |p| Ok(Box::new(RsiStrategy::from_params(p))));
        reg
    }

    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn(&Params) -> Result<Box<dyn ComputationUnit>, EngineError>
            + Send
            + Sync
            + 'static,
    ) {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Construct a unit; an unregistered name is fatal.
    pub fn create(
        &self,
        name: &str,
        params: &Params,
    ) -> Result<Box<dyn ComputationUnit>, EngineError> {
        match self.factories.get(name) {
            Some(factory) => factory(params),
            None => Err(EngineError::UnknownUnit(name.to_string())),
        }
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Simple moving average with NaN warmup, used by several units.
pub(crate) fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let mut sum = 0.0;
    for i in 0..n {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = sum / period as f64;
        }
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, NaN warmup before that.
pub(crate) fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}
