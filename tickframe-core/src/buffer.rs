//! RollingBuffer — fixed-capacity bar history with the update/roll state
//! machine.
//!
//! The buffer owns one [`FeatureTable`] whose length never changes after
//! construction. New bars shift history one slot toward index 0 (the
//! oldest row is permanently lost); an in-progress bar is overwritten in
//! place; stale input is rejected without mutation and reported through
//! [`UpdateOutcome`] rather than an error.

use crate::bar::BarRecord;
use crate::error::EngineError;
use crate::table::{Column, FeatureDefinition, FeatureTable, RowRecord};
use crate::timeframe::Timeframe;
use chrono::FixedOffset;
use std::ops::Range;

/// What an `update` call did. `applied == false` means stale input: the
/// buffer is untouched and the caller decides whether to log or skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub applied: bool,
    pub rolled: bool,
}

#[derive(Debug, Clone)]
pub struct RollingBuffer {
    timeframe: Timeframe,
    table: FeatureTable,
}

impl RollingBuffer {
    /// Pre-allocated, default-filled core schema of `capacity` rows.
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            timeframe,
            table: FeatureTable::new_core(capacity.max(1)),
        }
    }

    /// Adopt a populated table; its current length becomes the capacity.
    pub fn from_table(timeframe: Timeframe, table: FeatureTable) -> Self {
        Self { timeframe, table }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut FeatureTable {
        &mut self.table
    }

    /// Timestamp of the last (newest) slot.
    pub fn last_date(&self) -> i64 {
        self.table.dates().last().copied().unwrap_or(i64::MIN)
    }

    /// Core bar fields of the last slot.
    pub fn last_row(&self) -> BarRecord {
        self.table.row(self.len() - 1)
    }

    /// Ingest one bar per the three-way state machine:
    /// newer date → roll and write; same date → overwrite in place;
    /// older date → reject untouched.
    pub fn update(&mut self, bar: &BarRecord) -> UpdateOutcome {
        let last = self.last_date();
        if bar.date < last {
            return UpdateOutcome {
                applied: false,
                rolled: false,
            };
        }
        let rolled = bar.date > last;
        if rolled {
            self.roll();
        }
        let n = self.len() - 1;
        self.table.dates_mut()[n] = bar.date;
        self.table.dates_l_mut()[n] = bar.date_l;
        self.table.opens_mut()[n] = bar.open;
        self.table.highs_mut()[n] = bar.high;
        self.table.lows_mut()[n] = bar.low;
        self.table.closes_mut()[n] = bar.close;
        self.table.volumes_mut()[n] = bar.volume;
        self.table.cpl_mut()[n] = bar.cpl;
        UpdateOutcome {
            applied: true,
            rolled,
        }
    }

    /// Shift every feature array one slot toward index 0. Arrays keep
    /// their fixed size; nothing is reallocated.
    pub fn roll(&mut self) {
        for col in self.table.columns_mut() {
            col.shift_left();
        }
    }

    // ── Delegated schema/query surface ───────────────────────────────

    pub fn get_feature(&self, name: &str) -> Result<&Column, EngineError> {
        self.table.get(name)
    }

    pub fn add_feature(&mut self, name: &str, column: Column) -> Result<(), EngineError> {
        self.table.add_or_replace(name, column)
    }

    pub fn add_feature_definition(&mut self, def: FeatureDefinition) -> Result<(), EngineError> {
        self.table.add_feature_definition(def)
    }

    pub fn get_row_range(&self, range: Range<usize>, tz: Option<FixedOffset>) -> Vec<RowRecord> {
        self.table.records(range, tz)
    }
}
