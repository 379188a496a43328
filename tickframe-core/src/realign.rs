//! Realigner — project a coarser timeframe's feature onto a finer timeline.
//!
//! Batch mode is a causal left-join: each target timestamp is mapped to
//! the source bucket it may legally see. `Align::Open` makes the coarse
//! value visible from the moment its bar opens; `Align::Close` shifts the
//! key so the value only appears once the coarse bar has fully closed on
//! the finer grid — the no-look-ahead guarantee.
//!
//! Incremental mode instead copies the source's current last value every
//! tick. That is intentionally non-causal: live monitoring wants to watch
//! the coarse indicator evolve rather than wait for its close. The batch
//! path must never adopt this shortcut; the two modes diverge by design.
//!
//! Realigned columns are stored as `<feature><source timeframe name>`
//! (`rsi` from `m5` becomes `rsim5`) so they never collide with the
//! target's own feature of the same name.

use crate::buffer::RollingBuffer;
use crate::error::EngineError;
use crate::table::{Column, FeatureValue};
use crate::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Visibility rule for a realigned feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Open,
    Close,
}

/// One realignment declaration. Entries whose `from`/`to` don't match the
/// pair of buffers being processed are skipped silently for that call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealignEntry {
    pub align: Align,
    pub feature: String,
    pub from: Timeframe,
    pub to: Timeframe,
}

/// Realigned output column name: feature plus the source timeframe label.
pub fn realigned_name(feature: &str, from: Timeframe) -> String {
    format!("{feature}{}", from.name())
}

fn check_order(target: &RollingBuffer, source: &RollingBuffer) -> Result<(), EngineError> {
    if source.timeframe().duration_secs() <= target.timeframe().duration_secs() {
        return Err(EngineError::InvalidTimeframeOrder {
            from: source.timeframe(),
            to: target.timeframe(),
        });
    }
    Ok(())
}

/// Batch/historical realignment of every matching spec entry from
/// `source` into `target`.
///
/// For each target timestamp the source bucket key is
/// `t / from_dur` (open) or `(t - from_dur + to_dur) / from_dur` (close);
/// source rows key as `s / from_dur`. Unmatched targets receive the
/// feature's declared default. The copied definition is added to the
/// target schema under the realigned name.
pub fn realign_batch(
    target: &mut RollingBuffer,
    source: &RollingBuffer,
    spec: &[RealignEntry],
) -> Result<(), EngineError> {
    check_order(target, source)?;

    for entry in spec {
        if entry.from != source.timeframe() || entry.to != target.timeframe() {
            continue;
        }
        let from_dur = entry.from.duration_secs();
        let to_dur = entry.to.duration_secs();

        let src_values = source.table().get(&entry.feature)?;
        let src_dates = source.table().dates();
        let mut by_key: HashMap<i64, FeatureValue> =
            HashMap::with_capacity(src_dates.len());
        for (i, &s) in src_dates.iter().enumerate() {
            by_key.insert(s.div_euclid(from_dur), src_values.value_at(i));
        }

        let mut def = source.table().definition(&entry.feature)?.clone();
        def.name = realigned_name(&entry.feature, entry.from);

        let values: Vec<FeatureValue> = target
            .table()
            .dates()
            .iter()
            .map(|&t| {
                let key = match entry.align {
                    Align::Open => t.div_euclid(from_dur),
                    Align::Close => (t - from_dur + to_dur).div_euclid(from_dur),
                };
                by_key.get(&key).copied().unwrap_or(def.default)
            })
            .collect();

        let column = Column::from_values(def.dtype, &values)?;
        let name = def.name.clone();
        target.add_feature_definition(def)?;
        target.table_mut().add_or_replace(&name, column)?;
    }
    Ok(())
}

/// Incremental/live realignment: copy the source feature's current last
/// value into the target's last slot for every matching entry. The
/// realigned column must already exist from a prior batch realign.
pub fn realign_update(
    target: &mut RollingBuffer,
    source: &RollingBuffer,
    spec: &[RealignEntry],
) -> Result<(), EngineError> {
    check_order(target, source)?;

    for entry in spec {
        if entry.from != source.timeframe() || entry.to != target.timeframe() {
            continue;
        }
        let src = source.table().get(&entry.feature)?;
        let value = src.value_at(src.len() - 1);
        let name = realigned_name(&entry.feature, entry.from);
        let col = target.table_mut().get_mut(&name)?;
        let last = col.len() - 1;
        col.set_value(last, value)?;
    }
    Ok(())
}
