//! Standard moving-average set over `close`.
//!
//! `e<p>` columns are EMAs, `s<p>` columns SMAs, for the fixed period set
//! traders conventionally watch.

use super::{ema, sma, ComputationUnit};
use crate::error::EngineError;
use crate::table::{Column, FeatureDefinition, FeatureTable, FeatureValue};

const EMA_PERIODS: [usize; 5] = [9, 20, 50, 100, 200];
const SMA_PERIODS: [usize; 6] = [9, 20, 30, 50, 100, 200];

#[derive(Debug, Clone)]
pub struct MovingAverages {
    inputs: Vec<String>,
    outputs: Vec<FeatureDefinition>,
}

impl MovingAverages {
    pub fn new() -> Self {
        let mut outputs = Vec::new();
        for p in EMA_PERIODS {
            outputs.push(FeatureDefinition::float(format!("e{p}")));
        }
        for p in SMA_PERIODS {
            outputs.push(FeatureDefinition::float(format!("s{p}")));
        }
        Self {
            inputs: vec!["close".to_string()],
            outputs,
        }
    }
}

impl Default for MovingAverages {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputationUnit for MovingAverages {
    fn name(&self) -> &str {
        "moving_averages"
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_defs(&self) -> &[FeatureDefinition] {
        &self.outputs
    }

    fn prepare(&mut self, table: &FeatureTable) -> Result<Vec<Column>, EngineError> {
        let closes = table.closes();
        let mut cols = Vec::with_capacity(self.outputs.len());
        for p in EMA_PERIODS {
            cols.push(Column::Float(ema(closes, p)));
        }
        for p in SMA_PERIODS {
            cols.push(Column::Float(sma(closes, p)));
        }
        Ok(cols)
    }

    fn update(&mut self, table: &FeatureTable) -> Result<Vec<FeatureValue>, EngineError> {
        let closes = table.closes();
        let mut vals = Vec::with_capacity(self.outputs.len());
        for p in EMA_PERIODS {
            let series = ema(closes, p);
            vals.push(FeatureValue::Float(
                series.last().copied().unwrap_or(f64::NAN),
            ));
        }
        for p in SMA_PERIODS {
            let series = sma(closes, p);
            vals.push(FeatureValue::Float(
                series.last().copied().unwrap_or(f64::NAN),
            ));
        }
        Ok(vals)
    }
}
