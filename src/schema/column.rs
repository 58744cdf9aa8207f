//! Dataset columns: types and value transforms

use std::fmt;

use serde_json::Value;

use crate::convert;
use crate::error::TransformError;
use crate::schema::Row;

/// Storage type of a dataset column. Conflict detection across schemas
/// compares these, so two columns with the same name must agree here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float64,
    Timestamp,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::String => "string",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Int128 => "int128",
            DataType::Int256 => "int256",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float64 => "float64",
            DataType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Final per-column value transform applied when a row is written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnTransform {
    /// Lowercase hex strings, element-wise for arrays
    HexNormalize,
    /// Hex quantity to integer
    HexToNumber,
    /// Hex quantity to float
    HexToFloat,
    /// Coerce any non-null scalar to a string, after an optional base
    /// transform
    ToString(Option<Box<ColumnTransform>>),
}

impl ColumnTransform {
    pub fn apply(&self, value: &Value) -> Result<Value, TransformError> {
        match self {
            ColumnTransform::HexNormalize => Ok(match value {
                Value::String(s) => Value::String(convert::normalize_hex(s)),
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Value::String(convert::normalize_hex(s)),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            }),
            ColumnTransform::HexToNumber => match value {
                Value::Null => Ok(Value::Null),
                other => convert::hex_to_int(other),
            },
            ColumnTransform::HexToFloat => convert::hex_to_float(value),
            ColumnTransform::ToString(base) => {
                let value = match base {
                    Some(base) => base.apply(value)?,
                    None => value.clone(),
                };
                Ok(match value {
                    Value::Null => Value::Null,
                    Value::String(s) => Value::String(s),
                    Value::Bool(b) => Value::String(b.to_string()),
                    Value::Number(n) => Value::String(n.to_string()),
                    other => Value::String(other.to_string()),
                })
            }
        }
    }
}

/// One named, typed column of the output schema with its optional value
/// transform. Equality for schema conflict detection is name and type only.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub transform: Option<ColumnTransform>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Column {
        Column {
            name: name.into(),
            data_type,
            transform: None,
        }
    }

    pub fn with_transform(
        name: impl Into<String>,
        data_type: DataType,
        transform: ColumnTransform,
    ) -> Column {
        Column {
            name: name.into(),
            data_type,
            transform: Some(transform),
        }
    }

    /// Hash-valued string column, normalized to lowercase on write
    pub fn hash_string(name: impl Into<String>) -> Column {
        Column::with_transform(name, DataType::String, ColumnTransform::HexNormalize)
    }

    /// Same column definition under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            data_type: self.data_type,
            transform: self.transform.clone(),
        }
    }

    /// Pull this column's value out of a row, applying the transform
    pub fn extract(&self, row: &Row) -> Result<Value, TransformError> {
        let value = row.get(&self.name).cloned().unwrap_or(Value::Null);
        match &self.transform {
            None => Ok(value),
            Some(transform) => transform.apply(&value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hex_normalize_strings_and_arrays() {
        let transform = ColumnTransform::HexNormalize;
        assert_eq!(transform.apply(&json!("0xABC")).unwrap(), json!("0xabc"));
        assert_eq!(
            transform.apply(&json!(["0xAB", "0xcd"])).unwrap(),
            json!(["0xab", "0xcd"])
        );
        assert_eq!(transform.apply(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_to_string_with_base() {
        let transform = ColumnTransform::ToString(Some(Box::new(ColumnTransform::HexNormalize)));
        assert_eq!(transform.apply(&json!("0xAB")).unwrap(), json!("0xab"));
        assert_eq!(transform.apply(&json!(7)).unwrap(), json!("7"));
        assert_eq!(transform.apply(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_extract_missing_is_null() {
        let column = Column::new("missing", DataType::String);
        let row = Row::new();
        assert_eq!(column.extract(&row).unwrap(), Value::Null);
    }

    #[test]
    fn test_extract_applies_transform() {
        let column = Column::hash_string("addr");
        let mut row = Row::new();
        row.insert("addr".to_string(), json!("0xDEADBEEF"));
        assert_eq!(column.extract(&row).unwrap(), json!("0xdeadbeef"));
    }
}
