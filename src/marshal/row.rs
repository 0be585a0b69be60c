// In: src/marshal/row.rs

//! The row-level data model handed to and received from user operators.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

/// A single decoded cell.
///
/// Arrow's integer widths collapse onto `Int64`/`UInt64` and both float widths onto
/// `Float64`; the operator sees one canonical scalar per family. Temporal values are
/// carried as chrono types regardless of the Arrow unit they were stored in.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
    /// An instant as UTC wall-clock time, plus the column's time zone if it had one.
    Timestamp {
        utc: NaiveDateTime,
        tz: Option<Arc<str>>,
    },
    Date(NaiveDate),
    Time(NaiveTime),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as `i64` when it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int64(v) => Some(*v),
            ScalarValue::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns any numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::UInt64(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScalarValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// The UTC wall-clock value of a timestamp.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            ScalarValue::Timestamp { utc, .. } => Some(*utc),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ScalarValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            ScalarValue::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::UInt64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "{:?}", v),
            ScalarValue::Binary(v) => write!(f, "<{} bytes>", v.len()),
            ScalarValue::Timestamp { utc, tz: None } => write!(f, "{}", utc),
            ScalarValue::Timestamp { utc, tz: Some(tz) } => write!(f, "{} UTC ({})", utc, tz),
            ScalarValue::Date(d) => write!(f, "{}", d),
            ScalarValue::Time(t) => write!(f, "{}", t),
        }
    }
}

macro_rules! impl_scalar_from {
    ($($src:ty => $variant:ident as $dst:ty),+ $(,)?) => {
        $(
            impl From<$src> for ScalarValue {
                fn from(value: $src) -> Self {
                    ScalarValue::$variant(value as $dst)
                }
            }
        )+
    };
}

impl_scalar_from!(
    i8 => Int64 as i64,
    i16 => Int64 as i64,
    i32 => Int64 as i64,
    i64 => Int64 as i64,
    u8 => UInt64 as u64,
    u16 => UInt64 as u64,
    u32 => UInt64 as u64,
    u64 => UInt64 as u64,
    f32 => Float64 as f64,
    f64 => Float64 as f64,
);

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(value: Vec<u8>) -> Self {
        ScalarValue::Binary(value)
    }
}

/// A zone-less timestamp.
impl From<NaiveDateTime> for ScalarValue {
    fn from(value: NaiveDateTime) -> Self {
        ScalarValue::Timestamp {
            utc: value,
            tz: None,
        }
    }
}

impl From<NaiveDate> for ScalarValue {
    fn from(value: NaiveDate) -> Self {
        ScalarValue::Date(value)
    }
}

impl From<NaiveTime> for ScalarValue {
    fn from(value: NaiveTime) -> Self {
        ScalarValue::Time(value)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ScalarValue::Null, Into::into)
    }
}

/// An ordered mapping from column name to scalar, one per batch row index.
///
/// Field order is insertion order; replacing an existing field keeps its slot.
/// Equality is order-sensitive.
#[derive(Debug, Clone, Default)]
pub struct Row {
    fields: IndexMap<String, ScalarValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts or replaces a field, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ScalarValue>,
    ) -> Option<ScalarValue> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.fields.get(name)
    }

    /// Removes a field, shifting later fields down to keep their order.
    pub fn remove(&mut self, name: &str) -> Option<ScalarValue> {
        self.fields.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len() && self.fields.iter().eq(other.fields.iter())
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, ScalarValue);
    type IntoIter = indexmap::map::IntoIter<String, ScalarValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut row = Row::new().with("a", 1).with("b", "x");
        let previous = row.insert("a", 2.5);

        assert_eq!(previous, Some(ScalarValue::Int64(1)));
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&ScalarValue::Float64(2.5)));
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut row = Row::new().with("a", 1).with("b", 2).with("c", 3);

        assert_eq!(row.remove("a"), Some(ScalarValue::Int64(1)));
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["b", "c"]);
        assert!(!row.contains("a"));
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let ab = Row::new().with("a", 1).with("b", 2);
        let ba = Row::new().with("b", 2).with("a", 1);

        assert_ne!(ab, ba);
        assert_eq!(ab, Row::new().with("a", 1).with("b", 2));
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(ScalarValue::from(7u8), ScalarValue::UInt64(7));
        assert_eq!(ScalarValue::from(None::<i32>), ScalarValue::Null);
        assert_eq!(ScalarValue::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(ScalarValue::Int64(3).as_f64(), Some(3.0));
        assert_eq!(ScalarValue::from("hi").as_str(), Some("hi"));

        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(ScalarValue::from(day).as_date(), Some(day));
        let noon = day.and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(ScalarValue::from(noon).as_timestamp(), Some(noon));
        assert_eq!(ScalarValue::from(noon).to_string(), "2024-02-29 12:00:00");
    }
}
