// In: src/marshal/arrow_impl.rs

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Date32Array, Float64Array, Int64Array,
    NullArray, StringArray, Time64MicrosecondArray, TimestampMicrosecondArray, UInt64Array,
};
use arrow::datatypes::*;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::{NaiveDate, NaiveTime};
use hashbrown::HashSet;

use crate::error::{BridgeError, Result};
use crate::marshal::row::{Row, ScalarValue};

//==================================================================================
// 1. Batch -> Rows
//==================================================================================

/// DATA MARSHALLING
/// Decodes one Arrow array into a vector of scalars, one per slot, nulls included.
///
/// Integer and float widths are widened to the canonical scalar of their family.
/// Returns `BridgeError::Marshalling` for types the row model cannot carry.
pub fn column_to_scalars(array: &dyn Array) -> Result<Vec<ScalarValue>> {
    macro_rules! widen_primitive {
        ($T:ty, $variant:ident, $dst:ty) => {
            array
                .as_primitive::<$T>()
                .iter()
                .map(|v| v.map_or(ScalarValue::Null, |v| ScalarValue::$variant(v as $dst)))
                .collect()
        };
    }

    // Temporal columns go through arrow's chrono conversions. A stored value chrono
    // cannot represent is an error, not a null.
    macro_rules! temporal {
        ($T:ty, $convert:ident, |$v:ident| $wrap:expr) => {{
            let typed = array.as_primitive::<$T>();
            (0..typed.len())
                .map(|i| {
                    if typed.is_null(i) {
                        return Ok(ScalarValue::Null);
                    }
                    typed.$convert(i).map(|$v| $wrap).ok_or_else(|| {
                        BridgeError::Marshalling(format!(
                            "{} value at index {} is out of range",
                            typed.data_type(),
                            i
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }};
    }

    let values = match array.data_type() {
        DataType::Null => vec![ScalarValue::Null; array.len()],
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(ScalarValue::from)
            .collect(),
        DataType::Int8 => widen_primitive!(Int8Type, Int64, i64),
        DataType::Int16 => widen_primitive!(Int16Type, Int64, i64),
        DataType::Int32 => widen_primitive!(Int32Type, Int64, i64),
        DataType::Int64 => widen_primitive!(Int64Type, Int64, i64),
        DataType::UInt8 => widen_primitive!(UInt8Type, UInt64, u64),
        DataType::UInt16 => widen_primitive!(UInt16Type, UInt64, u64),
        DataType::UInt32 => widen_primitive!(UInt32Type, UInt64, u64),
        DataType::UInt64 => widen_primitive!(UInt64Type, UInt64, u64),
        DataType::Float32 => widen_primitive!(Float32Type, Float64, f64),
        DataType::Float64 => widen_primitive!(Float64Type, Float64, f64),
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(ScalarValue::from)
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(ScalarValue::from)
            .collect(),
        DataType::Binary => array
            .as_binary::<i32>()
            .iter()
            .map(|v| v.map_or(ScalarValue::Null, |b| ScalarValue::Binary(b.to_vec())))
            .collect(),
        DataType::LargeBinary => array
            .as_binary::<i64>()
            .iter()
            .map(|v| v.map_or(ScalarValue::Null, |b| ScalarValue::Binary(b.to_vec())))
            .collect(),
        DataType::Timestamp(unit, tz) => {
            let tz = tz.clone();
            match unit {
                TimeUnit::Second => temporal!(TimestampSecondType, value_as_datetime, |utc| {
                    ScalarValue::Timestamp { utc, tz: tz.clone() }
                }),
                TimeUnit::Millisecond => {
                    temporal!(TimestampMillisecondType, value_as_datetime, |utc| {
                        ScalarValue::Timestamp { utc, tz: tz.clone() }
                    })
                }
                TimeUnit::Microsecond => {
                    temporal!(TimestampMicrosecondType, value_as_datetime, |utc| {
                        ScalarValue::Timestamp { utc, tz: tz.clone() }
                    })
                }
                TimeUnit::Nanosecond => {
                    temporal!(TimestampNanosecondType, value_as_datetime, |utc| {
                        ScalarValue::Timestamp { utc, tz: tz.clone() }
                    })
                }
            }
        }
        DataType::Date32 => temporal!(Date32Type, value_as_date, |d| ScalarValue::Date(d)),
        DataType::Date64 => temporal!(Date64Type, value_as_date, |d| ScalarValue::Date(d)),
        DataType::Time32(TimeUnit::Second) => {
            temporal!(Time32SecondType, value_as_time, |t| ScalarValue::Time(t))
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            temporal!(Time32MillisecondType, value_as_time, |t| ScalarValue::Time(t))
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            temporal!(Time64MicrosecondType, value_as_time, |t| ScalarValue::Time(t))
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            temporal!(Time64NanosecondType, value_as_time, |t| ScalarValue::Time(t))
        }
        dt => {
            return Err(BridgeError::Marshalling(format!(
                "Unsupported column type: {}",
                dt
            )))
        }
    };

    Ok(values)
}

/// Splits a batch into one `Row` per row index, in index order.
///
/// The batch is only read, so the same batch can be re-derived into rows any
/// number of times.
pub fn to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let schema = batch.schema();

    // 1. Rows are keyed by column name, so a repeated name would silently drop a column.
    let mut names: HashSet<&str> = HashSet::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if !names.insert(field.name().as_str()) {
            return Err(BridgeError::Marshalling(format!(
                "Duplicate column name '{}' cannot be represented as a row",
                field.name()
            )));
        }
    }

    // 2. Decode column-major, which keeps each downcast to a single pass.
    let columns = batch
        .columns()
        .iter()
        .map(|array| column_to_scalars(array.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    // 3. Transpose into rows, preserving the schema's field order within each row.
    let mut rows: Vec<Row> = (0..batch.num_rows())
        .map(|_| Row::with_capacity(columns.len()))
        .collect();
    for (field, values) in schema.fields().iter().zip(columns) {
        for (row, value) in rows.iter_mut().zip(values) {
            row.insert(field.name().as_str(), value);
        }
    }

    Ok(rows)
}

//==================================================================================
// 2. Rows -> Batch
//==================================================================================

static NULL_SCALAR: ScalarValue = ScalarValue::Null;

/// The scalar family a whole output column settles on.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnKind {
    Null,
    Boolean,
    Int64,
    UInt64,
    Float64,
    Utf8,
    Binary,
    Timestamp(Option<Arc<str>>),
    Date,
    Time,
}

impl ColumnKind {
    fn of(value: &ScalarValue) -> Self {
        match value {
            ScalarValue::Null => ColumnKind::Null,
            ScalarValue::Boolean(_) => ColumnKind::Boolean,
            ScalarValue::Int64(_) => ColumnKind::Int64,
            ScalarValue::UInt64(_) => ColumnKind::UInt64,
            ScalarValue::Float64(_) => ColumnKind::Float64,
            ScalarValue::Utf8(_) => ColumnKind::Utf8,
            ScalarValue::Binary(_) => ColumnKind::Binary,
            ScalarValue::Timestamp { tz, .. } => ColumnKind::Timestamp(tz.clone()),
            ScalarValue::Date(_) => ColumnKind::Date,
            ScalarValue::Time(_) => ColumnKind::Time,
        }
    }

    /// Numeric families promote the way a dataframe would; anything else must match,
    /// timestamps including their time zone.
    fn unify(self, other: Self, column: &str) -> Result<Self> {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => Ok(a),
            (Null, b) => Ok(b),
            (a, Null) => Ok(a),
            (Int64, UInt64) | (UInt64, Int64) => Ok(Int64),
            (Float64, Int64 | UInt64) | (Int64 | UInt64, Float64) => Ok(Float64),
            (a, b) => Err(BridgeError::Marshalling(format!(
                "Column '{}' mixes incompatible values: {:?} and {:?}",
                column, a, b
            ))),
        }
    }

    /// Temporal columns are written at microsecond resolution.
    fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Null => DataType::Null,
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::UInt64 => DataType::UInt64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::Utf8 => DataType::Utf8,
            ColumnKind::Binary => DataType::Binary,
            ColumnKind::Timestamp(tz) => DataType::Timestamp(TimeUnit::Microsecond, tz.clone()),
            ColumnKind::Date => DataType::Date32,
            ColumnKind::Time => DataType::Time64(TimeUnit::Microsecond),
        }
    }
}

/// Builds a columnar batch from rows.
///
/// The column set is the union of keys across all rows, in first-seen order; a row
/// missing a key contributes a null. An empty input yields a valid zero-row,
/// zero-column batch rather than an error.
pub fn from_rows(rows: &[Row]) -> Result<RecordBatch> {
    // 1. Collect the column names in first-seen order.
    let mut seen: HashSet<&str> = HashSet::new();
    let mut names: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key) {
                names.push(key);
            }
        }
    }

    // 2. Infer and build each column.
    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<&ScalarValue> = rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&NULL_SCALAR))
            .collect();

        let kind = values
            .iter()
            .try_fold(ColumnKind::Null, |acc, v| acc.unify(ColumnKind::of(v), name))?;
        let nullable = values.iter().any(|v| v.is_null()) || kind == ColumnKind::Null;

        arrays.push(build_array(&kind, &values, name)?);
        fields.push(Field::new(name, kind.data_type(), nullable));
    }

    // 3. Assemble. The explicit row count keeps zero-column batches well-formed.
    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

fn build_array(kind: &ColumnKind, values: &[&ScalarValue], column: &str) -> Result<ArrayRef> {
    let mismatch = |v: &ScalarValue| {
        BridgeError::Marshalling(format!(
            "Column '{}' cannot hold {} as {:?}",
            column, v, kind
        ))
    };

    let array: ArrayRef = match kind {
        ColumnKind::Null => Arc::new(NullArray::new(values.len())),
        ColumnKind::Boolean => Arc::new(BooleanArray::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::Boolean(b) => Ok(Some(*b)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::Int64 => Arc::new(Int64Array::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::Int64(i) => Ok(Some(*i)),
                    ScalarValue::UInt64(u) => i64::try_from(*u).map(Some).map_err(|_| mismatch(v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::UInt64 => Arc::new(UInt64Array::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::UInt64(u) => Ok(Some(*u)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::Float64 => Arc::new(Float64Array::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    other => other.as_f64().map(Some).ok_or_else(|| mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::Utf8 => Arc::new(StringArray::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::Utf8(s) => Ok(Some(s.as_str())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::Binary => Arc::new(BinaryArray::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::Binary(b) => Ok(Some(b.as_slice())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::Timestamp(tz) => Arc::new(
            TimestampMicrosecondArray::from(
                values
                    .iter()
                    .copied()
                    .map(|v| match v {
                        ScalarValue::Null => Ok(None),
                        ScalarValue::Timestamp { utc, .. } => {
                            Ok(Some(utc.and_utc().timestamp_micros()))
                        }
                        other => Err(mismatch(other)),
                    })
                    .collect::<Result<Vec<_>>>()?,
            )
            .with_timezone_opt(tz.clone()),
        ),
        ColumnKind::Date => Arc::new(Date32Array::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::Date(d) => {
                        // NaiveDate's default is the Unix epoch.
                        let days = d.signed_duration_since(NaiveDate::default()).num_days();
                        i32::try_from(days).map(Some).map_err(|_| mismatch(v))
                    }
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnKind::Time => Arc::new(Time64MicrosecondArray::from(
            values
                .iter()
                .copied()
                .map(|v| match v {
                    ScalarValue::Null => Ok(None),
                    ScalarValue::Time(t) => t
                        .signed_duration_since(NaiveTime::default())
                        .num_microseconds()
                        .map(Some)
                        .ok_or_else(|| mismatch(v)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
    };

    Ok(array)
}
