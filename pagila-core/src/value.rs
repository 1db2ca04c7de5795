use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{
    Array, ArrayRef, BooleanArray, Decimal128Array, Float64Array, Int64Array, NullArray,
    StringArray,
};
use arrow_schema::DataType;
use ordered_float::OrderedFloat;
use pagila_error::{pagila_bail, pagila_err, PagilaResult};
use rust_decimal::Decimal;
use serde::Serialize;

/// A type that can represent any cell of a [`crate::dataframe::DataFrame`].
///
/// Integer widths are folded into [`AnyValue::Int64`] and floats into [`AnyValue::Float64`]
/// so that keys read from different sources (Postgres `int2` vs Parquet `INT32`) compare
/// equal when joined.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum AnyValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Decimal(Decimal),
    String(String),
}

impl AnyValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, AnyValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AnyValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The physical type this value is materialized with when it has no column to live in.
    pub fn dtype(&self) -> DataType {
        match self {
            AnyValue::Null => DataType::Null,
            AnyValue::Boolean(_) => DataType::Boolean,
            AnyValue::Int64(_) => DataType::Int64,
            AnyValue::Float64(_) => DataType::Float64,
            AnyValue::Decimal(d) => DataType::Decimal128(38, d.scale() as i8),
            AnyValue::String(_) => DataType::Utf8,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            AnyValue::Null => 0,
            AnyValue::Boolean(_) => 1,
            AnyValue::Int64(_) => 2,
            AnyValue::Float64(_) => 3,
            AnyValue::Decimal(_) => 4,
            AnyValue::String(_) => 5,
        }
    }

    /// Adds two values of the same kind. `Null` is the identity.
    pub fn checked_add(&self, other: &AnyValue) -> PagilaResult<AnyValue> {
        Ok(match (self, other) {
            (AnyValue::Null, v) | (v, AnyValue::Null) => v.clone(),
            (AnyValue::Int64(l), AnyValue::Int64(r)) => AnyValue::Int64(
                l.checked_add(*r)
                    .ok_or_else(|| pagila_err!(ComputeError: "integer overflow in sum"))?,
            ),
            (AnyValue::Float64(l), AnyValue::Float64(r)) => AnyValue::Float64(*l + *r),
            (AnyValue::Decimal(l), AnyValue::Decimal(r)) => AnyValue::Decimal(
                l.checked_add(*r)
                    .ok_or_else(|| pagila_err!(ComputeError: "decimal overflow in sum"))?,
            ),
            (l, r) => pagila_bail!(op = "`sum`", l.dtype(), r.dtype()),
        })
    }
}

impl PartialOrd for AnyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `Null` sorts before everything else. Values of different kinds never share a column,
/// so across kinds we only need *some* total order.
impl Ord for AnyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (AnyValue::Boolean(l), AnyValue::Boolean(r)) => l.cmp(r),
            (AnyValue::Int64(l), AnyValue::Int64(r)) => l.cmp(r),
            (AnyValue::Float64(l), AnyValue::Float64(r)) => l.cmp(r),
            (AnyValue::Decimal(l), AnyValue::Decimal(r)) => l.cmp(r),
            (AnyValue::String(l), AnyValue::String(r)) => l.cmp(r),
            (l, r) => l.rank().cmp(&r.rank()),
        }
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Boolean(b) => write!(f, "{:?}: bool", b),
            Self::Int64(i) => write!(f, "{:?}: i64", i),
            Self::Float64(v) => write!(f, "{:?}: f64", v),
            Self::Decimal(d) => write!(f, "{}: decimal", d),
            Self::String(s) => write!(f, "{:?}: string", s),
        }
    }
}

impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        AnyValue::Boolean(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        AnyValue::Int64(value)
    }
}

impl From<i32> for AnyValue {
    fn from(value: i32) -> Self {
        AnyValue::Int64(value as _)
    }
}

impl From<f64> for AnyValue {
    fn from(value: f64) -> Self {
        AnyValue::Float64(OrderedFloat(value))
    }
}

impl From<Decimal> for AnyValue {
    fn from(value: Decimal) -> Self {
        AnyValue::Decimal(value)
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        AnyValue::String(value.to_string())
    }
}

impl From<String> for AnyValue {
    fn from(value: String) -> Self {
        AnyValue::String(value)
    }
}

/// Normalizes a physical arrow type into the type computed columns are built with.
pub(crate) fn normalize_dtype(dtype: &DataType) -> PagilaResult<DataType> {
    Ok(match dtype {
        DataType::Null => DataType::Null,
        DataType::Boolean => DataType::Boolean,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => DataType::Int64,
        DataType::Float32 | DataType::Float64 => DataType::Float64,
        DataType::Decimal128(p, s) => DataType::Decimal128(*p, *s),
        DataType::Utf8 | DataType::LargeUtf8 => DataType::Utf8,
        other => pagila_bail!(InvalidOperation: "unsupported data type `{other}`"),
    })
}

/// Reads the value at `row` out of an arrow array.
pub(crate) fn value_at(array: &dyn Array, row: usize) -> PagilaResult<AnyValue> {
    if array.is_null(row) {
        return Ok(AnyValue::Null);
    }

    Ok(match array.data_type() {
        DataType::Null => AnyValue::Null,
        DataType::Boolean => AnyValue::Boolean(array.as_boolean().value(row)),
        DataType::Int8 => AnyValue::Int64(array.as_primitive::<Int8Type>().value(row) as _),
        DataType::Int16 => AnyValue::Int64(array.as_primitive::<Int16Type>().value(row) as _),
        DataType::Int32 => AnyValue::Int64(array.as_primitive::<Int32Type>().value(row) as _),
        DataType::Int64 => AnyValue::Int64(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => AnyValue::Int64(array.as_primitive::<UInt8Type>().value(row) as _),
        DataType::UInt16 => AnyValue::Int64(array.as_primitive::<UInt16Type>().value(row) as _),
        DataType::UInt32 => AnyValue::Int64(array.as_primitive::<UInt32Type>().value(row) as _),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            AnyValue::Int64(
                i64::try_from(v).map_err(|_| pagila_err!(oob = v, i64::MAX))?,
            )
        },
        DataType::Float32 => AnyValue::Float64(OrderedFloat(
            array.as_primitive::<Float32Type>().value(row) as _,
        )),
        DataType::Float64 => {
            AnyValue::Float64(OrderedFloat(array.as_primitive::<Float64Type>().value(row)))
        },
        DataType::Decimal128(_, scale) => {
            let mantissa = array.as_primitive::<Decimal128Type>().value(row);
            let scale = u32::try_from(*scale).map_err(
                |_| pagila_err!(InvalidOperation: "negative decimal scale {scale} is not supported"),
            )?;
            AnyValue::Decimal(Decimal::try_from_i128_with_scale(mantissa, scale).map_err(
                |e| pagila_err!(ComputeError: "decimal {mantissa}e-{scale} out of range: {e}"),
            )?)
        },
        DataType::Utf8 => AnyValue::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => AnyValue::String(array.as_string::<i64>().value(row).to_string()),
        other => pagila_bail!(InvalidOperation: "cannot read values of type `{other}`"),
    })
}

/// Materializes `values` into an arrow array of the (normalized) type `dtype`.
pub(crate) fn values_to_array(values: &[AnyValue], dtype: &DataType) -> PagilaResult<ArrayRef> {
    let mismatch = |v: &AnyValue| pagila_err!(SchemaMismatch: "value {v:?} does not fit `{dtype}`");

    let array: ArrayRef = match dtype {
        DataType::Null => {
            if let Some(v) = values.iter().find(|v| !v.is_null()) {
                return Err(mismatch(v));
            }
            Arc::new(NullArray::new(values.len()))
        },
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    AnyValue::Null => Ok(None),
                    AnyValue::Boolean(b) => Ok(Some(*b)),
                    v => Err(mismatch(v)),
                })
                .collect::<PagilaResult<BooleanArray>>()?,
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    AnyValue::Null => Ok(None),
                    AnyValue::Int64(i) => Ok(Some(*i)),
                    v => Err(mismatch(v)),
                })
                .collect::<PagilaResult<Int64Array>>()?,
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    AnyValue::Null => Ok(None),
                    AnyValue::Float64(f) => Ok(Some(f.0)),
                    AnyValue::Int64(i) => Ok(Some(*i as f64)),
                    v => Err(mismatch(v)),
                })
                .collect::<PagilaResult<Float64Array>>()?,
        ),
        DataType::Decimal128(precision, scale) => {
            let target = u32::try_from(*scale).map_err(|_| mismatch(&AnyValue::Null))?;
            let array = values
                .iter()
                .map(|v| match v {
                    AnyValue::Null => Ok(None),
                    AnyValue::Decimal(d) => {
                        let mut d = *d;
                        d.rescale(target);
                        Ok(Some(d.mantissa()))
                    },
                    AnyValue::Int64(i) => {
                        let mut d = Decimal::from(*i);
                        d.rescale(target);
                        Ok(Some(d.mantissa()))
                    },
                    v => Err(mismatch(v)),
                })
                .collect::<PagilaResult<Decimal128Array>>()?
                .with_precision_and_scale(*precision, *scale)
                .map_err(pagila_error::map_err)?;
            Arc::new(array)
        },
        DataType::Utf8 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    AnyValue::Null => Ok(None),
                    AnyValue::String(s) => Ok(Some(s.as_str())),
                    v => Err(mismatch(v)),
                })
                .collect::<PagilaResult<StringArray>>()?,
        ),
        other => pagila_bail!(InvalidOperation: "cannot build arrays of type `{other}`"),
    };

    Ok(array)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use arrow_array::Int16Array;

    use super::*;

    #[test]
    fn test_integer_widths_fold_into_i64() {
        let small = Int16Array::from(vec![Some(6), None]);
        assert_eq!(value_at(&small, 0).unwrap(), AnyValue::Int64(6));
        assert_eq!(value_at(&small, 1).unwrap(), AnyValue::Null);
        assert_eq!(
            value_at(&small, 0).unwrap(),
            value_at(&Int64Array::from(vec![6]), 0).unwrap()
        );
    }

    #[test]
    fn test_decimal_roundtrip_keeps_scale() {
        let amounts = [
            AnyValue::Decimal(Decimal::from_str("4.99").unwrap()),
            AnyValue::Null,
            AnyValue::Decimal(Decimal::from_str("10.5").unwrap()),
        ];
        let array = values_to_array(&amounts, &DataType::Decimal128(5, 2)).unwrap();
        assert_eq!(array.data_type(), &DataType::Decimal128(5, 2));
        assert_eq!(value_at(&array, 2).unwrap().to_string(), "10.50");
        assert!(value_at(&array, 1).unwrap().is_null());
    }

    #[test]
    fn test_sum_treats_null_as_identity() {
        let sum = AnyValue::Null
            .checked_add(&AnyValue::Int64(3))
            .and_then(|s| s.checked_add(&AnyValue::Int64(4)))
            .unwrap();
        assert_eq!(sum, AnyValue::Int64(7));
        assert!(AnyValue::Int64(1)
            .checked_add(&AnyValue::String("x".into()))
            .is_err());
    }

    #[test]
    fn test_null_sorts_first() {
        let mut values = vec![AnyValue::Int64(2), AnyValue::Null, AnyValue::Int64(1)];
        values.sort();
        assert_eq!(
            values,
            vec![AnyValue::Null, AnyValue::Int64(1), AnyValue::Int64(2)]
        );
    }

    #[test]
    fn test_untagged_json() {
        let json = serde_json::to_string(&vec![
            AnyValue::Null,
            AnyValue::Int64(3),
            AnyValue::from("Action"),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,3,"Action"]"#);
    }
}
