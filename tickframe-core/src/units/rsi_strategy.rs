//! Two-timeframe RSI entry strategy.
//!
//! Goes short when both the own-timeframe RSI and a realigned
//! higher-timeframe RSI sit above `threshold_high`, long when both sit
//! below `threshold_low`. The higher-timeframe column (default `rsim5`)
//! must be realigned into the buffer before the strategy is constructed.
//!
//! Outputs follow the standard strategy column convention consumed by the
//! external simulation backend: `<short>_size` (signed share count,
//! zero = no entry), `<short>_limit`, `<short>_stoploss`, `<short>_profit`.

use super::{param_f64, param_str, ComputationUnit, Params};
use crate::error::EngineError;
use crate::table::{Column, FeatureDefinition, FeatureTable, FeatureValue};

const SHORT_NAME: &str = "stratrsi";

#[derive(Debug, Clone)]
pub struct RsiStrategy {
    threshold_high: f64,
    threshold_low: f64,
    profit_rr: f64,
    min_risk: f64,
    risk_per_trade: f64,
    htf_rsi: String,
    inputs: Vec<String>,
    outputs: Vec<FeatureDefinition>,
}

/// One row of strategy output. Flat rows carry NaN prices, so derived
/// equality would never hold; compare fields instead.
#[derive(Debug, Clone, Copy)]
struct Decision {
    size: i64,
    limit: f64,
    stoploss: f64,
    profit: f64,
}

impl Decision {
    const FLAT: Decision = Decision {
        size: 0,
        limit: f64::NAN,
        stoploss: f64::NAN,
        profit: f64::NAN,
    };
}

impl RsiStrategy {
    pub fn from_params(params: &Params) -> Self {
        Self::new(
            param_f64(params, "threshold_high", 70.0),
            param_f64(params, "threshold_low", 30.0),
            param_f64(params, "profit_rr", 3.0),
            param_f64(params, "min_risk", 0.1),
            param_f64(params, "risk_per_trade", 500.0),
            param_str(params, "htf_rsi", "rsim5"),
        )
    }

    pub fn new(
        threshold_high: f64,
        threshold_low: f64,
        profit_rr: f64,
        min_risk: f64,
        risk_per_trade: f64,
        htf_rsi: impl Into<String>,
    ) -> Self {
        let htf_rsi = htf_rsi.into();
        let inputs = vec![
            "close".to_string(),
            "low".to_string(),
            "high".to_string(),
            "rsi".to_string(),
            htf_rsi.clone(),
        ];
        let outputs = vec![
            FeatureDefinition::int(format!("{SHORT_NAME}_size")),
            FeatureDefinition::float(format!("{SHORT_NAME}_limit")),
            FeatureDefinition::float(format!("{SHORT_NAME}_stoploss")),
            FeatureDefinition::float(format!("{SHORT_NAME}_profit")),
        ];
        Self {
            threshold_high,
            threshold_low,
            profit_rr,
            min_risk,
            risk_per_trade,
            htf_rsi,
            inputs,
            outputs,
        }
    }

    /// Entry decision for a single row. NaN RSI inputs (warmup) never
    /// trade: the threshold comparisons are false for NaN.
    fn decide(&self, close: f64, low: f64, high: f64, rsi: f64, rsi_htf: f64) -> Decision {
        let entry = close;
        let stoploss = if rsi > self.threshold_high && rsi_htf > self.threshold_high {
            // short: stop above the high
            (high + 0.01).max(entry + self.min_risk)
        } else if rsi < self.threshold_low && rsi_htf < self.threshold_low {
            // long: stop below the low
            (low - 0.01).min(entry - self.min_risk)
        } else {
            return Decision::FLAT;
        };
        // risk is signed: positive for longs, negative for shorts, so the
        // size sign encodes direction
        let risk = entry - stoploss;
        Decision {
            size: (self.risk_per_trade / risk) as i64,
            limit: entry,
            stoploss,
            profit: entry + self.profit_rr * risk,
        }
    }

    fn decision_at(&self, table: &FeatureTable, i: usize) -> Result<Decision, EngineError> {
        let rsi = table
            .get("rsi")?
            .as_floats()
            .ok_or_else(|| EngineError::SchemaMismatch("rsi column is not Float".to_string()))?;
        let htf = table.get(&self.htf_rsi)?.as_floats().ok_or_else(|| {
            EngineError::SchemaMismatch(format!("{} column is not Float", self.htf_rsi))
        })?;
        Ok(self.decide(
            table.closes()[i],
            table.lows()[i],
            table.highs()[i],
            rsi[i],
            htf[i],
        ))
    }
}

impl ComputationUnit for RsiStrategy {
    fn name(&self) -> &str {
        "rsi_strategy"
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_defs(&self) -> &[FeatureDefinition] {
        &self.outputs
    }

    fn prepare(&mut self, table: &FeatureTable) -> Result<Vec<Column>, EngineError> {
        let n = table.len();
        let mut size = Vec::with_capacity(n);
        let mut limit = Vec::with_capacity(n);
        let mut stoploss = Vec::with_capacity(n);
        let mut profit = Vec::with_capacity(n);
        for i in 0..n {
            let d = self.decision_at(table, i)?;
            size.push(d.size);
            limit.push(d.limit);
            stoploss.push(d.stoploss);
            profit.push(d.profit);
        }
        Ok(vec![
            Column::Int(size),
            Column::Float(limit),
            Column::Float(stoploss),
            Column::Float(profit),
        ])
    }

    fn update(&mut self, table: &FeatureTable) -> Result<Vec<FeatureValue>, EngineError> {
        let d = self.decision_at(table, table.len() - 1)?;
        Ok(vec![
            FeatureValue::Int(d.size),
            FeatureValue::Float(d.limit),
            FeatureValue::Float(d.stoploss),
            FeatureValue::Float(d.profit),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testutil::assert_approx;

    fn strategy() -> RsiStrategy {
        RsiStrategy::new(70.0, 30.0, 3.0, 0.1, 500.0, "rsim5")
    }

    #[test]
    fn long_entry_when_both_rsis_oversold() {
        let d = strategy().decide(100.0, 99.5, 101.0, 25.0, 20.0);
        assert!(d.size > 0);
        assert_eq!(d.limit, 100.0);
        // stop below the low
        assert_approx(d.stoploss, 99.49, 1e-9);
        // size = 500 / 0.51, truncated
        assert_eq!(d.size, 980);
        // profit at 3R above entry
        assert!((d.profit - 101.53).abs() < 1e-9);
    }

    #[test]
    fn short_entry_when_both_rsis_overbought() {
        let d = strategy().decide(100.0, 99.0, 100.4, 75.0, 80.0);
        assert!(d.size < 0);
        assert_approx(d.stoploss, 100.41, 1e-9);
        assert!(d.profit < 100.0);
    }

    #[test]
    fn min_risk_widens_tight_stops() {
        // low almost at entry: stop distance would be under min_risk
        let d = strategy().decide(100.0, 99.995, 101.0, 25.0, 20.0);
        assert_approx(d.stoploss, 99.9, 1e-9);
    }

    // NaN price fields make derived equality useless for flat decisions
    fn assert_flat(d: &Decision) {
        assert_eq!(d.size, 0);
        assert!(d.limit.is_nan());
        assert!(d.stoploss.is_nan());
        assert!(d.profit.is_nan());
    }

    #[test]
    fn no_entry_when_timeframes_disagree() {
        let d = strategy().decide(100.0, 99.0, 101.0, 25.0, 50.0);
        assert_flat(&d);
        let d = strategy().decide(100.0, 99.0, 101.0, 75.0, 50.0);
        assert_flat(&d);
    }

    #[test]
    fn nan_rsi_never_trades() {
        let d = strategy().decide(100.0, 99.0, 101.0, f64::NAN, 20.0);
        assert_eq!(d.size, 0);
        let d = strategy().decide(100.0, 99.0, 101.0, 25.0, f64::NAN);
        assert_eq!(d.size, 0);
    }

    #[test]
    fn inputs_declare_the_realigned_column() {
        let s = RsiStrategy::new(70.0, 30.0, 3.0, 0.1, 500.0, "rsim30");
        assert!(s.input_names().contains(&"rsim30".to_string()));
    }
}
