//! Pipeline — the orchestrator tying buffers, resampling, realignment and
//! computation units together.
//!
//! A pipeline is seeded once from finest-timeframe history (batch path:
//! resample, prepare, realign) and then driven bar by bar (incremental
//! path). Both paths must agree: after any number of ticks, a coarser
//! lane's bar data matches a fresh batch resample of the finest lane.
//!
//! Per-tick order is fixed: finest buffer update, incremental resample
//! into coarser lanes ascending, indicator updates finest to coarsest,
//! realignment copies, strategy updates finest to coarsest. Strategies
//! therefore always see same-tick indicator values, including realigned
//! higher-timeframe ones.

use crate::bar::BarRecord;
use crate::buffer::RollingBuffer;
use crate::error::EngineError;
use crate::realign::{realign_batch, realign_update, RealignEntry};
use crate::resample::{resample, resample_update};
use crate::table::{Column, FeatureDefinition, FeatureTable, FeatureValue};
use crate::timeframe::{Timeframe, TimeframeCategory};
use crate::units::{ComputationUnit, Params, UnitRegistry};
use serde::{Deserialize, Serialize};

/// Declarative description of one symbol's pipeline, usually loaded from
/// a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub symbol: String,
    pub timeframes: Vec<Timeframe>,
    #[serde(default)]
    pub indicators: Vec<UnitSpec>,
    #[serde(default)]
    pub strategies: Vec<UnitSpec>,
    #[serde(default)]
    pub realign: Vec<RealignEntry>,
}

/// One unit instance: which timeframe's lane it runs in and its params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    pub tf: Timeframe,
    pub unit: String,
    #[serde(default)]
    pub params: Params,
}

/// What one tick did across the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// False when the bar was stale; nothing was touched.
    pub applied: bool,
    /// Whether the finest buffer rolled to a new slot.
    pub rolled: bool,
    /// Coarser timeframes that opened a new bucket on this tick.
    pub closed_buckets: Vec<Timeframe>,
}

struct TfLane {
    buffer: RollingBuffer,
    indicators: Vec<Box<dyn ComputationUnit>>,
    strategies: Vec<Box<dyn ComputationUnit>>,
}

pub struct Pipeline {
    symbol: String,
    /// Ascending by timeframe duration; index 0 is the fed lane.
    lanes: Vec<TfLane>,
    realign: Vec<RealignEntry>,
}

/// Lane index that can act as resample source for `target`. Intraday
/// buckets are defined over 1-minute bars, weekly/monthly over daily
/// bars; a daily lane can only ever be the fed lane.
fn source_index(tfs: &[Timeframe], target: Timeframe) -> Result<usize, EngineError> {
    let want = match target.category() {
        TimeframeCategory::Intraday => Timeframe::M1,
        TimeframeCategory::Weekly | TimeframeCategory::Monthly => Timeframe::D1,
        // No bucket rule produces daily bars; d1 can only ever be the fed lane.
        TimeframeCategory::Daily => return Err(EngineError::UnsupportedTimeframe(target)),
    };
    tfs.iter()
        .position(|&t| t == want)
        .ok_or(EngineError::InvalidTimeframeOrder {
            from: want,
            to: target,
        })
}

fn install_outputs(
    buffer: &mut RollingBuffer,
    unit: &dyn ComputationUnit,
    columns: Vec<Column>,
) -> Result<(), EngineError> {
    let defs = unit.output_defs();
    if columns.len() != defs.len() {
        return Err(EngineError::SchemaMismatch(format!(
            "unit {} produced {} columns for {} declared outputs",
            unit.name(),
            columns.len(),
            defs.len()
        )));
    }
    for (def, col) in defs.iter().zip(columns) {
        if col.dtype() != def.dtype || col.len() != buffer.len() {
            return Err(EngineError::SchemaMismatch(format!(
                "unit {} output {}: expected {:?} x {}, got {:?} x {}",
                unit.name(),
                def.name,
                def.dtype,
                buffer.len(),
                col.dtype(),
                col.len()
            )));
        }
        buffer.add_feature_definition(def.clone())?;
        buffer.table_mut().add_or_replace(&def.name, col)?;
    }
    Ok(())
}

fn write_last(
    buffer: &mut RollingBuffer,
    defs: &[FeatureDefinition],
    values: &[FeatureValue],
) -> Result<(), EngineError> {
    if values.len() != defs.len() {
        return Err(EngineError::SchemaMismatch(format!(
            "update returned {} values for {} declared outputs",
            values.len(),
            defs.len()
        )));
    }
    let last = buffer.len() - 1;
    for (def, value) in defs.iter().zip(values) {
        buffer.table_mut().get_mut(&def.name)?.set_value(last, *value)?;
    }
    Ok(())
}

impl Pipeline {
    /// Build and seed a pipeline from finest-timeframe history.
    ///
    /// Coarser lanes are batch-resampled from the history, indicators are
    /// prepared over every lane, realignment runs for every finer/coarser
    /// pair, and strategies are prepared last so they see realigned
    /// columns.
    pub fn seed(
        spec: &PipelineSpec,
        registry: &UnitRegistry,
        history: FeatureTable,
    ) -> Result<Self, EngineError> {
        let mut tfs = spec.timeframes.clone();
        tfs.sort();
        tfs.dedup();
        let Some(&finest) = tfs.first() else {
            return Err(EngineError::SchemaMismatch(
                "pipeline spec names no timeframes".to_string(),
            ));
        };

        let mut lanes = Vec::with_capacity(tfs.len());
        lanes.push(TfLane {
            buffer: RollingBuffer::from_table(finest, history),
            indicators: Vec::new(),
            strategies: Vec::new(),
        });
        for &tf in &tfs[1..] {
            let src = source_index(&tfs, tf)?;
            let table = resample(lanes[src].buffer.table(), tfs[src], tf)?;
            lanes.push(TfLane {
                buffer: RollingBuffer::from_table(tf, table),
                indicators: Vec::new(),
                strategies: Vec::new(),
            });
        }

        let mut pipeline = Self {
            symbol: spec.symbol.clone(),
            lanes,
            realign: spec.realign.clone(),
        };

        for us in &spec.indicators {
            pipeline.install_unit(registry, us, false)?;
        }
        pipeline.realign_all(|target, source, spec| realign_batch(target, source, spec))?;
        for us in &spec.strategies {
            pipeline.install_unit(registry, us, true)?;
        }
        Ok(pipeline)
    }

    /// Drive the whole pipeline with one finest-timeframe bar.
    pub fn on_bar(&mut self, bar: &BarRecord) -> Result<TickOutcome, EngineError> {
        let outcome = self.lanes[0].buffer.update(bar);
        if !outcome.applied {
            return Ok(TickOutcome {
                applied: false,
                rolled: false,
                closed_buckets: Vec::new(),
            });
        }

        let tfs: Vec<Timeframe> = self.lanes.iter().map(|l| l.buffer.timeframe()).collect();
        let mut closed_buckets = Vec::new();
        for i in 1..self.lanes.len() {
            let src = source_index(&tfs, tfs[i])?;
            let derived = resample_update(&self.lanes[src].buffer, tfs[i])?;
            if self.lanes[i].buffer.update(&derived).rolled {
                closed_buckets.push(tfs[i]);
            }
        }

        for lane in &mut self.lanes {
            for j in 0..lane.indicators.len() {
                let values = lane.indicators[j].update(lane.buffer.table())?;
                write_last(&mut lane.buffer, lane.indicators[j].output_defs(), &values)?;
            }
        }

        self.realign_all(|target, source, spec| realign_update(target, source, spec))?;

        for lane in &mut self.lanes {
            for j in 0..lane.strategies.len() {
                let values = lane.strategies[j].update(lane.buffer.table())?;
                write_last(&mut lane.buffer, lane.strategies[j].output_defs(), &values)?;
            }
        }

        Ok(TickOutcome {
            applied: true,
            rolled: outcome.rolled,
            closed_buckets,
        })
    }

    /// Run `f` over every (finer target, coarser source) lane pair.
    fn realign_all(
        &mut self,
        f: impl Fn(&mut RollingBuffer, &RollingBuffer, &[RealignEntry]) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        for t in 0..self.lanes.len() {
            let (left, right) = self.lanes.split_at_mut(t + 1);
            let target = &mut left[t];
            for source in right.iter() {
                f(&mut target.buffer, &source.buffer, &self.realign)?;
            }
        }
        Ok(())
    }

    fn install_unit(
        &mut self,
        registry: &UnitRegistry,
        us: &UnitSpec,
        strategy: bool,
    ) -> Result<(), EngineError> {
        let i = self.lane_index(us.tf)?;
        let lane = &mut self.lanes[i];
        let mut unit = registry.create(&us.unit, &us.params)?;
        for input in unit.input_names() {
            if !lane.buffer.table().contains(input) {
                return Err(EngineError::MissingFeature(format!(
                    "{input} (input of {} on {})",
                    us.unit, us.tf
                )));
            }
        }
        let columns = unit.prepare(lane.buffer.table())?;
        install_outputs(&mut lane.buffer, unit.as_ref(), columns)?;
        if strategy {
            lane.strategies.push(unit);
        } else {
            lane.indicators.push(unit);
        }
        Ok(())
    }

    fn lane_index(&self, tf: Timeframe) -> Result<usize, EngineError> {
        self.lanes
            .iter()
            .position(|l| l.buffer.timeframe() == tf)
            .ok_or_else(|| EngineError::UnknownTimeframe(tf.name().to_string()))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.lanes.iter().map(|l| l.buffer.timeframe()).collect()
    }

    pub fn buffer(&self, tf: Timeframe) -> Result<&RollingBuffer, EngineError> {
        Ok(&self.lanes[self.lane_index(tf)?].buffer)
    }

    /// Core bar fields of a lane's newest slot.
    pub fn last_row(&self, tf: Timeframe) -> Result<BarRecord, EngineError> {
        Ok(self.buffer(tf)?.last_row())
    }
}
