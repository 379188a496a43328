//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and losses over `close`.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss); first `period` values are
//! NaN warmup. Edge cases: avg_loss == 0 → 100; avg_gain == 0 → 0.

use super::ComputationUnit;
use crate::error::EngineError;
use crate::table::{Column, FeatureDefinition, FeatureTable, FeatureValue};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    inputs: Vec<String>,
    outputs: Vec<FeatureDefinition>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            inputs: vec!["close".to_string()],
            outputs: vec![FeatureDefinition::float("rsi")],
        }
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=self.period {
            let change = closes[i] - closes[i - 1];
            if change.is_nan() {
                return result;
            }
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss -= change;
            }
        }
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;
        result[self.period] = rsi_value(avg_gain, avg_loss);

        let alpha = 1.0 / self.period as f64;
        for i in (self.period + 1)..n {
            let change = closes[i] - closes[i - 1];
            if change.is_nan() {
                return result;
            }
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
            result[i] = rsi_value(avg_gain, avg_loss);
        }
        result
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl ComputationUnit for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_defs(&self) -> &[FeatureDefinition] {
        &self.outputs
    }

    fn prepare(&mut self, table: &FeatureTable) -> Result<Vec<Column>, EngineError> {
        Ok(vec![Column::Float(self.compute(table.closes()))])
    }

    fn update(&mut self, table: &FeatureTable) -> Result<Vec<FeatureValue>, EngineError> {
        let result = self.compute(table.closes());
        let last = result.last().copied().unwrap_or(f64::NAN);
        Ok(vec![FeatureValue::Float(last)])
    }
}
