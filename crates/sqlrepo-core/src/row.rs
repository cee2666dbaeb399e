//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_ascii_uppercase(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name, ignoring ASCII case.
    ///
    /// SQL identifiers are case-insensitive unless quoted, so `id` and `ID`
    /// name the same result column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Values are addressed positionally; the entity mapper reads column `i` of
/// the schema from position `i` of the row.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`
    /// to share the column metadata.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a typed value by position.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::from(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!(
                    "index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
                column: None,
            })
        })?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::from(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|e| with_column(e, name))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }
}

/// Record the column name on a type error raised while converting it.
pub fn with_column(err: Error, column: &str) -> Error {
    err.with_type_column(column)
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::from(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

/// Trait for converting from a `Value` to a typed value.
///
/// Integer conversions are lenient across widths: drivers may report any
/// integer column as `BigInt`, so `i32` accepts `BigInt` values that fit.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::BigInt(v) => i32::try_from(*v).map_err(|_| {
                Error::from(TypeError {
                    expected: "i32",
                    actual: format!("BIGINT {v} out of range"),
                    column: None,
                })
            }),
            Value::Bool(v) => Ok(i32::from(*v)),
            _ => Err(mismatch("i32", value)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(mismatch("Vec<u8>", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn person_row() -> Row {
        Row::new(
            vec!["ID".to_string(), "NAME".to_string(), "AGE".to_string()],
            vec![
                Value::BigInt(1),
                Value::Text("Ada".to_string()),
                Value::Int(36),
            ],
        )
    }

    #[test]
    fn test_with_column_keeps_suppressed_errors() {
        let err = Error::from(TypeError {
            expected: "i32",
            actual: "Text".to_string(),
            column: None,
        })
        .with_suppressed(Error::custom("close refused"));

        let err = with_column(err, "AGE");
        match err.kind() {
            ErrorKind::Type(te) => assert_eq!(te.column.as_deref(), Some("AGE")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.suppressed().len(), 1);
        assert_eq!(err.suppressed()[0].to_string(), Error::custom("close refused").to_string());

        let other = with_column(Error::custom("boom").with_suppressed(Error::custom("x")), "AGE");
        assert!(matches!(other.kind(), ErrorKind::Custom(m) if m == "boom"));
        assert_eq!(other.suppressed().len(), 1);
    }

    #[test]
    fn test_row_positional_and_named_access() {
        let row = person_row();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(1), Some(&Value::Text("Ada".to_string())));
        assert_eq!(row.get_as::<i64>(0).unwrap(), 1);
        assert_eq!(row.get_named::<String>("name").unwrap(), "Ada");
        assert_eq!(row.get_named::<i32>("AGE").unwrap(), 36);
    }

    #[test]
    fn test_row_type_errors_carry_column() {
        let row = Row::new(
            vec!["ID".to_string()],
            vec![Value::Text("not a number".to_string())],
        );
        let err = row.get_named::<i32>("ID").unwrap_err();
        match err.kind() {
            ErrorKind::Type(te) => assert_eq!(te.column.as_deref(), Some("ID")),
            other => panic!("expected type error, got {other:?}"),
        }
        assert!(row.get_named::<i32>("missing").is_err());
        assert!(row.get_as::<i32>(99).is_err());
    }

    #[test]
    fn test_row_null_handling() {
        let row = Row::new(vec!["nullable".to_string()], vec![Value::Null]);
        assert_eq!(row.get_named::<Option<i32>>("nullable").unwrap(), None);
        assert!(row.get_named::<i32>("nullable").is_err());
    }

    #[test]
    fn test_i32_accepts_bigint_in_range() {
        assert_eq!(i32::from_value(&Value::BigInt(30)).unwrap(), 30);
        assert!(i32::from_value(&Value::BigInt(i64::from(i32::MAX) + 1)).is_err());
        assert_eq!(
            Option::<i64>::from_value(&Value::Int(4)).unwrap(),
            Some(4_i64)
        );
    }

    #[test]
    fn test_row_shared_columns() {
        let columns = Arc::new(ColumnInfo::new(vec!["ID".to_string(), "NAME".to_string()]));
        let row1 = Row::with_columns(
            Arc::clone(&columns),
            vec![Value::Int(1), Value::Text("Alice".to_string())],
        );
        let row2 = Row::with_columns(
            Arc::clone(&columns),
            vec![Value::Int(2), Value::Text("Bob".to_string())],
        );
        assert!(Arc::ptr_eq(&row1.column_info(), &row2.column_info()));
        let pairs: Vec<_> = row2.iter().collect();
        assert_eq!(
            pairs,
            vec![("ID", &Value::Int(2)), ("NAME", &Value::Text("Bob".to_string()))]
        );
    }
}
