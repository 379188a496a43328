//! Feature definitions and typed column storage.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Semantic type of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dtype {
    Float,
    Int,
    Bool,
    Timestamp,
}

/// A single typed scalar, used for defaults and last-row writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    /// Unix seconds.
    Timestamp(i64),
}

impl FeatureValue {
    pub fn dtype(&self) -> Dtype {
        match self {
            FeatureValue::Float(_) => Dtype::Float,
            FeatureValue::Int(_) => Dtype::Int,
            FeatureValue::Bool(_) => Dtype::Bool,
            FeatureValue::Timestamp(_) => Dtype::Timestamp,
        }
    }

    /// Lossy numeric view, handy for signal inspection.
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Float(v) => *v,
            FeatureValue::Int(v) => *v as f64,
            FeatureValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            FeatureValue::Timestamp(v) => *v as f64,
        }
    }
}

/// Name, type and default of one feature column.
///
/// The default backfills existing rows when a definition is added to a
/// populated table, and fills unmatched rows during realignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub name: String,
    pub dtype: Dtype,
    pub default: FeatureValue,
}

impl FeatureDefinition {
    pub fn float(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: Dtype::Float,
            default: FeatureValue::Float(f64::NAN),
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: Dtype::Int,
            default: FeatureValue::Int(0),
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: Dtype::Bool,
            default: FeatureValue::Bool(false),
        }
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: Dtype::Timestamp,
            default: FeatureValue::Timestamp(0),
        }
    }

    /// Definition with the conventional default for a dtype.
    pub fn inferred(name: impl Into<String>, dtype: Dtype) -> Self {
        match dtype {
            Dtype::Float => Self::float(name),
            Dtype::Int => Self::int(name),
            Dtype::Bool => Self::boolean(name),
            Dtype::Timestamp => Self::timestamp(name),
        }
    }
}

/// One fixed-length feature array.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Timestamp(Vec<i64>),
}

impl Column {
    /// Array of `len` copies of the definition's default.
    pub fn filled(def: &FeatureDefinition, len: usize) -> Column {
        match def.default {
            FeatureValue::Float(v) => Column::Float(vec![v; len]),
            FeatureValue::Int(v) => Column::Int(vec![v; len]),
            FeatureValue::Bool(v) => Column::Bool(vec![v; len]),
            FeatureValue::Timestamp(v) => Column::Timestamp(vec![v; len]),
        }
    }

    /// Assemble a column of `dtype` from scalars; any scalar of another
    /// dtype is a schema mismatch.
    pub fn from_values(dtype: Dtype, values: &[FeatureValue]) -> Result<Column, EngineError> {
        let mismatch = |v: &FeatureValue| {
            EngineError::SchemaMismatch(format!(
                "expected {dtype:?} value, got {:?}",
                v.dtype()
            ))
        };
        match dtype {
            Dtype::Float => values
                .iter()
                .map(|v| match v {
                    FeatureValue::Float(x) => Ok(*x),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Column::Float),
            Dtype::Int => values
                .iter()
                .map(|v| match v {
                    FeatureValue::Int(x) => Ok(*x),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Column::Int),
            Dtype::Bool => values
                .iter()
                .map(|v| match v {
                    FeatureValue::Bool(x) => Ok(*x),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Column::Bool),
            Dtype::Timestamp => values
                .iter()
                .map(|v| match v {
                    FeatureValue::Timestamp(x) => Ok(*x),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Column::Timestamp),
        }
    }

    pub fn dtype(&self) -> Dtype {
        match self {
            Column::Float(_) => Dtype::Float,
            Column::Int(_) => Dtype::Int,
            Column::Bool(_) => Dtype::Bool,
            Column::Timestamp(_) => Dtype::Timestamp,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value_at(&self, i: usize) -> FeatureValue {
        match self {
            Column::Float(v) => FeatureValue::Float(v[i]),
            Column::Int(v) => FeatureValue::Int(v[i]),
            Column::Bool(v) => FeatureValue::Bool(v[i]),
            Column::Timestamp(v) => FeatureValue::Timestamp(v[i]),
        }
    }

    /// Write one slot; the scalar's dtype must match the column's.
    pub fn set_value(&mut self, i: usize, value: FeatureValue) -> Result<(), EngineError> {
        match (self, value) {
            (Column::Float(v), FeatureValue::Float(x)) => v[i] = x,
            (Column::Int(v), FeatureValue::Int(x)) => v[i] = x,
            (Column::Bool(v), FeatureValue::Bool(x)) => v[i] = x,
            (Column::Timestamp(v), FeatureValue::Timestamp(x)) => v[i] = x,
            (col, v) => {
                return Err(EngineError::SchemaMismatch(format!(
                    "cannot write {:?} into {:?} column",
                    v.dtype(),
                    col.dtype()
                )))
            }
        }
        Ok(())
    }

    /// Shift every slot one position toward index 0. The final slot keeps
    /// its previous content until overwritten.
    pub fn shift_left(&mut self) {
        match self {
            Column::Float(v) => v.copy_within(1.., 0),
            Column::Int(v) => v.copy_within(1.., 0),
            Column::Bool(v) => v.copy_within(1.., 0),
            Column::Timestamp(v) => v.copy_within(1.., 0),
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bools(&self) -> Option<&[bool]> {
        match self {
            Column::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamps(&self) -> Option<&[i64]> {
        match self {
            Column::Timestamp(v) => Some(v),
            _ => None,
        }
    }
}
