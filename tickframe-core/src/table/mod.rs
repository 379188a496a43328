//! FeatureTable — a typed, named columnar store of equal-length arrays.
//!
//! Two-tier access: the eight core bar columns sit at fixed indices with
//! typed accessors (the hot path), while indicator and realigned columns
//! go through the name index. All columns share one length at all times;
//! `date` and `date_l` always occupy positions 0 and 1.

pub mod feature;

pub use feature::{Column, Dtype, FeatureDefinition, FeatureValue};

use crate::bar::BarRecord;
use crate::error::EngineError;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::ops::Range;

/// Convert Unix seconds to a UTC instant, clamping out-of-range values.
pub(crate) fn utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// One exported row: wall-clock timestamps plus every remaining feature
/// in schema order.
#[derive(Debug, Clone)]
pub struct RowRecord {
    pub date: DateTime<FixedOffset>,
    pub date_l: DateTime<FixedOffset>,
    pub values: Vec<(String, FeatureValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    defs: Vec<FeatureDefinition>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl FeatureTable {
    pub const DATE: usize = 0;
    pub const DATE_L: usize = 1;
    pub const OPEN: usize = 2;
    pub const HIGH: usize = 3;
    pub const LOW: usize = 4;
    pub const CLOSE: usize = 5;
    pub const VOLUME: usize = 6;
    pub const CPL: usize = 7;

    /// The mandatory bar schema, in its fixed column order.
    pub fn core_schema() -> Vec<FeatureDefinition> {
        vec![
            FeatureDefinition::timestamp("date"),
            FeatureDefinition::timestamp("date_l"),
            FeatureDefinition::float("open"),
            FeatureDefinition::float("high"),
            FeatureDefinition::float("low"),
            FeatureDefinition::float("close"),
            FeatureDefinition::int("volume"),
            FeatureDefinition::boolean("cpl"),
        ]
    }

    /// Core schema, default-filled to `len` rows.
    pub fn new_core(len: usize) -> Self {
        let defs = Self::core_schema();
        let columns = defs.iter().map(|d| Column::filled(d, len)).collect();
        let index = defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self {
            defs,
            columns,
            index,
        }
    }

    /// Build a table from populated core columns. All vectors must share
    /// one length.
    #[allow(clippy::too_many_arguments)]
    pub fn from_core_columns(
        date: Vec<i64>,
        date_l: Vec<i64>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<i64>,
        cpl: Vec<bool>,
    ) -> Result<Self, EngineError> {
        let n = date.len();
        let lens = [
            date_l.len(),
            open.len(),
            high.len(),
            low.len(),
            close.len(),
            volume.len(),
            cpl.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(EngineError::SchemaMismatch(format!(
                "core columns have unequal lengths (date has {n} rows)"
            )));
        }
        let mut table = Self::new_core(0);
        table.columns = vec![
            Column::Timestamp(date),
            Column::Timestamp(date_l),
            Column::Float(open),
            Column::Float(high),
            Column::Float(low),
            Column::Float(close),
            Column::Int(volume),
            Column::Bool(cpl),
        ];
        Ok(table)
    }

    /// Row count (buffer capacity or batch length).
    pub fn len(&self) -> usize {
        self.columns[Self::DATE].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn definition(&self, name: &str) -> Result<&FeatureDefinition, EngineError> {
        self.index
            .get(name)
            .map(|&i| &self.defs[i])
            .ok_or_else(|| EngineError::MissingFeature(name.to_string()))
    }

    pub fn dtype(&self, name: &str) -> Result<Dtype, EngineError> {
        self.definition(name).map(|d| d.dtype)
    }

    pub fn get(&self, name: &str) -> Result<&Column, EngineError> {
        self.index
            .get(name)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| EngineError::MissingFeature(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Column, EngineError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.columns[i]),
            None => Err(EngineError::MissingFeature(name.to_string())),
        }
    }

    /// Replace a column, or insert it under a new name with an inferred
    /// definition. The column length must equal the table length.
    pub fn add_or_replace(&mut self, name: &str, column: Column) -> Result<(), EngineError> {
        if column.len() != self.len() {
            return Err(EngineError::SchemaMismatch(format!(
                "column {name} has {} rows, table has {}",
                column.len(),
                self.len()
            )));
        }
        match self.index.get(name) {
            Some(&i) => {
                if self.defs[i].dtype != column.dtype() {
                    // dtype change: re-infer the definition
                    self.defs[i] = FeatureDefinition::inferred(name, column.dtype());
                }
                self.columns[i] = column;
            }
            None => {
                self.defs
                    .push(FeatureDefinition::inferred(name, column.dtype()));
                self.columns.push(column);
                self.index.insert(name.to_string(), self.defs.len() - 1);
            }
        }
        Ok(())
    }

    /// Explicit schema evolution: declare a feature and backfill existing
    /// rows with its default. Re-declaring with the same dtype is a no-op;
    /// a conflicting dtype is a schema mismatch.
    pub fn add_feature_definition(&mut self, def: FeatureDefinition) -> Result<(), EngineError> {
        if let Some(&i) = self.index.get(&def.name) {
            if self.defs[i].dtype != def.dtype {
                return Err(EngineError::SchemaMismatch(format!(
                    "feature {} already declared as {:?}, redeclared as {:?}",
                    def.name, self.defs[i].dtype, def.dtype
                )));
            }
            return Ok(());
        }
        let column = Column::filled(&def, self.len());
        self.index.insert(def.name.clone(), self.defs.len());
        self.defs.push(def);
        self.columns.push(column);
        Ok(())
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    // ── Typed fast path for the core bar columns ─────────────────────

    fn timestamps_at(&self, idx: usize) -> &[i64] {
        match &self.columns[idx] {
            Column::Timestamp(v) => v,
            _ => unreachable!("core timestamp column has fixed dtype"),
        }
    }

    fn timestamps_at_mut(&mut self, idx: usize) -> &mut [i64] {
        match &mut self.columns[idx] {
            Column::Timestamp(v) => v,
            _ => unreachable!("core timestamp column has fixed dtype"),
        }
    }

    fn floats_at(&self, idx: usize) -> &[f64] {
        match &self.columns[idx] {
            Column::Float(v) => v,
            _ => unreachable!("core float column has fixed dtype"),
        }
    }

    fn floats_at_mut(&mut self, idx: usize) -> &mut [f64] {
        match &mut self.columns[idx] {
            Column::Float(v) => v,
            _ => unreachable!("core float column has fixed dtype"),
        }
    }

    pub fn dates(&self) -> &[i64] {
        self.timestamps_at(Self::DATE)
    }

    pub fn dates_mut(&mut self) -> &mut [i64] {
        self.timestamps_at_mut(Self::DATE)
    }

    pub fn dates_l(&self) -> &[i64] {
        self.timestamps_at(Self::DATE_L)
    }

    pub fn dates_l_mut(&mut self) -> &mut [i64] {
        self.timestamps_at_mut(Self::DATE_L)
    }

    pub fn opens(&self) -> &[f64] {
        self.floats_at(Self::OPEN)
    }

    pub fn opens_mut(&mut self) -> &mut [f64] {
        self.floats_at_mut(Self::OPEN)
    }

    pub fn highs(&self) -> &[f64] {
        self.floats_at(Self::HIGH)
    }

    pub fn highs_mut(&mut self) -> &mut [f64] {
        self.floats_at_mut(Self::HIGH)
    }

    pub fn lows(&self) -> &[f64] {
        self.floats_at(Self::LOW)
    }

    pub fn lows_mut(&mut self) -> &mut [f64] {
        self.floats_at_mut(Self::LOW)
    }

    pub fn closes(&self) -> &[f64] {
        self.floats_at(Self::CLOSE)
    }

    pub fn closes_mut(&mut self) -> &mut [f64] {
        self.floats_at_mut(Self::CLOSE)
    }

    pub fn volumes(&self) -> &[i64] {
        match &self.columns[Self::VOLUME] {
            Column::Int(v) => v,
            _ => unreachable!("volume column has fixed dtype"),
        }
    }

    pub fn volumes_mut(&mut self) -> &mut [i64] {
        match &mut self.columns[Self::VOLUME] {
            Column::Int(v) => v,
            _ => unreachable!("volume column has fixed dtype"),
        }
    }

    pub fn cpl(&self) -> &[bool] {
        match &self.columns[Self::CPL] {
            Column::Bool(v) => v,
            _ => unreachable!("cpl column has fixed dtype"),
        }
    }

    pub fn cpl_mut(&mut self) -> &mut [bool] {
        match &mut self.columns[Self::CPL] {
            Column::Bool(v) => v,
            _ => unreachable!("cpl column has fixed dtype"),
        }
    }

    /// Core bar fields of row `i`.
    pub fn row(&self, i: usize) -> BarRecord {
        BarRecord {
            date: self.dates()[i],
            date_l: self.dates_l()[i],
            open: self.opens()[i],
            high: self.highs()[i],
            low: self.lows()[i],
            close: self.closes()[i],
            volume: self.volumes()[i],
            cpl: self.cpl()[i],
        }
    }

    /// Export rows as structured records, every feature included.
    /// `tz` applies a fixed-offset conversion to both timestamps; `None`
    /// keeps UTC.
    pub fn records(&self, range: Range<usize>, tz: Option<FixedOffset>) -> Vec<RowRecord> {
        let render = |secs: i64| -> DateTime<FixedOffset> {
            let dt = utc(secs);
            match tz {
                Some(off) => dt.with_timezone(&off),
                None => dt.fixed_offset(),
            }
        };
        range
            .map(|i| RowRecord {
                date: render(self.dates()[i]),
                date_l: render(self.dates_l()[i]),
                values: self
                    .defs
                    .iter()
                    .zip(&self.columns)
                    .skip(2)
                    .map(|(d, c)| (d.name.clone(), c.value_at(i)))
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn two_row_table() -> FeatureTable {
        FeatureTable::from_core_columns(
            vec![60, 120],
            vec![60, 120],
            vec![1.0, 2.0],
            vec![1.5, 2.5],
            vec![0.5, 1.5],
            vec![1.2, 2.2],
            vec![10, 20],
            vec![true, false],
        )
        .unwrap()
    }

    #[test]
    fn core_schema_order_is_fixed() {
        let t = FeatureTable::new_core(4);
        let names = t.feature_names();
        assert_eq!(names[0], "date");
        assert_eq!(names[1], "date_l");
        assert_eq!(
            names,
            vec!["date", "date_l", "open", "high", "low", "close", "volume", "cpl"]
        );
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn get_missing_feature_fails() {
        let t = FeatureTable::new_core(2);
        assert!(matches!(
            t.get("rsi"),
            Err(EngineError::MissingFeature(_))
        ));
    }

    #[test]
    fn add_or_replace_checks_length() {
        let mut t = FeatureTable::new_core(3);
        let err = t.add_or_replace("rsi", Column::Float(vec![1.0, 2.0]));
        assert!(matches!(err, Err(EngineError::SchemaMismatch(_))));
        t.add_or_replace("rsi", Column::Float(vec![1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(t.dtype("rsi").unwrap(), Dtype::Float);
    }

    #[test]
    fn add_or_replace_infers_definition_for_new_name() {
        let mut t = FeatureTable::new_core(2);
        t.add_or_replace("signal", Column::Bool(vec![false, true]))
            .unwrap();
        let def = t.definition("signal").unwrap();
        assert_eq!(def.dtype, Dtype::Bool);
        assert_eq!(def.default, FeatureValue::Bool(false));
    }

    #[test]
    fn add_feature_definition_backfills_default() {
        let mut t = two_row_table();
        t.add_feature_definition(FeatureDefinition::float("rsi"))
            .unwrap();
        let col = t.get("rsi").unwrap().as_floats().unwrap();
        assert_eq!(col.len(), 2);
        assert!(col.iter().all(|v| v.is_nan()));

        // idempotent with same dtype, mismatch with a different one
        t.add_feature_definition(FeatureDefinition::float("rsi"))
            .unwrap();
        assert!(matches!(
            t.add_feature_definition(FeatureDefinition::int("rsi")),
            Err(EngineError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn row_reads_core_fields() {
        let t = two_row_table();
        let row = t.row(1);
        assert_eq!(row.date, 120);
        assert_eq!(row.close, 2.2);
        assert!(!row.cpl);
    }

    #[test]
    fn records_render_timestamps_and_features() {
        let mut t = two_row_table();
        t.add_or_replace("rsi", Column::Float(vec![30.0, 70.0]))
            .unwrap();

        let recs = t.records(0..2, None);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].date.timestamp(), 60);
        assert_eq!(recs[1].values.last().unwrap().0, "rsi");
        assert_eq!(recs[1].values.last().unwrap().1, FeatureValue::Float(70.0));

        // fixed-offset conversion shifts wall-clock, not the instant
        let ny = FixedOffset::west_opt(5 * 3600).unwrap();
        let recs = t.records(0..1, Some(ny));
        assert_eq!(recs[0].date.timestamp(), 60);
        assert_eq!(recs[0].date.hour(), 19);
    }
}
