//! Candle anatomy — body/wick geometry and bar color.
//!
//! Base features several other units and strategies build on:
//! body levels and size, full range, wick sizes (absolute and as a
//! percentage of range), and the candle color (`1` green, `-1` red,
//! `0` doji).

use super::ComputationUnit;
use crate::error::EngineError;
use crate::table::{Column, FeatureDefinition, FeatureTable, FeatureValue};

/// Floor on the bar range so percentage wicks never divide by zero.
const MIN_RANGE: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct CandleAnatomy {
    inputs: Vec<String>,
    outputs: Vec<FeatureDefinition>,
}

impl CandleAnatomy {
    pub fn new() -> Self {
        Self {
            inputs: vec![
                "open".to_string(),
                "high".to_string(),
                "low".to_string(),
                "close".to_string(),
            ],
            outputs: vec![
                FeatureDefinition::float("body_high"),
                FeatureDefinition::float("body_low"),
                FeatureDefinition::float("body"),
                FeatureDefinition::float("range"),
                FeatureDefinition::float("wick_high"),
                FeatureDefinition::float("wick_low"),
                FeatureDefinition::float("wick_high_pct"),
                FeatureDefinition::float("wick_low_pct"),
                FeatureDefinition::int("col"),
            ],
        }
    }

    fn row(open: f64, high: f64, low: f64, close: f64) -> ([f64; 8], i64) {
        let body_high = open.max(close);
        let body_low = open.min(close);
        let body = body_high - body_low;
        let range = (high - low).max(MIN_RANGE);
        let wick_high = high - body_high;
        let wick_low = body_low - low;
        let col = if close > open {
            1
        } else if close < open {
            -1
        } else {
            0
        };
        (
            [
                body_high,
                body_low,
                body,
                range,
                wick_high,
                wick_low,
                wick_high / range * 100.0,
                wick_low / range * 100.0,
            ],
            col,
        )
    }
}

impl Default for CandleAnatomy {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputationUnit for CandleAnatomy {
    fn name(&self) -> &str {
        "candle_anatomy"
    }

    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_defs(&self) -> &[FeatureDefinition] {
        &self.outputs
    }

    fn prepare(&mut self, table: &FeatureTable) -> Result<Vec<Column>, EngineError> {
        let n = table.len();
        let mut floats = vec![Vec::with_capacity(n); 8];
        let mut cols = Vec::with_capacity(n);
        for i in 0..n {
            let (f, c) = Self::row(
                table.opens()[i],
                table.highs()[i],
                table.lows()[i],
                table.closes()[i],
            );
            for (dst, v) in floats.iter_mut().zip(f) {
                dst.push(v);
            }
            cols.push(c);
        }
        let mut out: Vec<Column> = floats.into_iter().map(Column::Float).collect();
        out.push(Column::Int(cols));
        Ok(out)
    }

    fn update(&mut self, table: &FeatureTable) -> Result<Vec<FeatureValue>, EngineError> {
        let i = table.len() - 1;
        let (f, c) = Self::row(
            table.opens()[i],
            table.highs()[i],
            table.lows()[i],
            table.closes()[i],
        );
        let mut vals: Vec<FeatureValue> = f.into_iter().map(FeatureValue::Float).collect();
        vals.push(FeatureValue::Int(c));
        Ok(vals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testutil::table_from_closes;

    #[test]
    fn body_and_wicks_from_ohlc() {
        let ([body_high, body_low, body, range, wick_high, wick_low, wh_pct, wl_pct], col) =
            CandleAnatomy::row(10.0, 14.0, 9.0, 12.0);
        assert_eq!(body_high, 12.0);
        assert_eq!(body_low, 10.0);
        assert_eq!(body, 2.0);
        assert_eq!(range, 5.0);
        assert_eq!(wick_high, 2.0);
        assert_eq!(wick_low, 1.0);
        assert_eq!(wh_pct, 40.0);
        assert_eq!(wl_pct, 20.0);
        assert_eq!(col, 1);
    }

    #[test]
    fn color_encodes_direction() {
        assert_eq!(CandleAnatomy::row(10.0, 11.0, 9.0, 9.5).1, -1);
        assert_eq!(CandleAnatomy::row(10.0, 11.0, 9.0, 10.0).1, 0);
    }

    #[test]
    fn degenerate_bar_keeps_range_positive() {
        let ([.., wh_pct, wl_pct], _) = CandleAnatomy::row(10.0, 10.0, 10.0, 10.0);
        assert!(wh_pct.is_finite());
        assert!(wl_pct.is_finite());
    }

    #[test]
    fn prepare_and_update_agree_on_last_row() {
        let table = table_from_closes(&[100.0, 102.0, 99.0, 101.0]);
        let mut unit = CandleAnatomy::new();
        let cols = unit.prepare(&table).unwrap();
        let vals = unit.update(&table).unwrap();
        let last = table.len() - 1;
        for (col, val) in cols.iter().zip(&vals) {
            assert_eq!(col.value_at(last), *val);
        }
    }
}
