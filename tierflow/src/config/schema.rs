//! Typed column schemas applied to extraction tasks.
//!
//! Schemas are written in the struct-type JSON layout:
//!
//! ```json
//! {"type": "struct", "fields": [
//!     {"name": "fruit", "type": "string", "nullable": true, "metadata": {}},
//!     {"name": "price", "type": "double", "nullable": true, "metadata": {}}
//! ]}
//! ```

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Largest precision a 128-bit decimal can hold.
const MAX_DECIMAL_PRECISION: u8 = 38;

/// A column type supported by extraction schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// UTF-8 text.
    String,
    /// True/false.
    Boolean,
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Calendar date.
    Date,
    /// Microsecond timestamp without time zone.
    Timestamp,
    /// Raw bytes.
    Binary,
    /// Fixed-point decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: i8,
    },
}

impl ColumnType {
    /// Converts to the Arrow data type used for reads.
    #[must_use]
    pub fn to_arrow(&self) -> DataType {
        match self {
            Self::String => DataType::Utf8,
            Self::Boolean => DataType::Boolean,
            Self::Byte => DataType::Int8,
            Self::Short => DataType::Int16,
            Self::Integer => DataType::Int32,
            Self::Long => DataType::Int64,
            Self::Float => DataType::Float32,
            Self::Double => DataType::Float64,
            Self::Date => DataType::Date32,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            Self::Binary => DataType::Binary,
            Self::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale),
        }
    }

    /// Maps an Arrow type back to a column type.
    ///
    /// Types without a direct counterpart (nested, unsigned, large variants)
    /// are reported as `None`.
    #[must_use]
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        let column_type = match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Self::String,
            DataType::Boolean => Self::Boolean,
            DataType::Int8 => Self::Byte,
            DataType::Int16 => Self::Short,
            DataType::Int32 => Self::Integer,
            DataType::Int64 => Self::Long,
            DataType::Float32 => Self::Float,
            DataType::Float64 => Self::Double,
            DataType::Date32 => Self::Date,
            DataType::Timestamp(_, _) => Self::Timestamp,
            DataType::Binary | DataType::LargeBinary => Self::Binary,
            DataType::Decimal128(precision, scale) => Self::Decimal {
                precision: *precision,
                scale: *scale,
            },
            _ => return None,
        };
        Some(column_type)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Byte => write!(f, "byte"),
            Self::Short => write!(f, "short"),
            Self::Integer => write!(f, "integer"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Date => write!(f, "date"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Binary => write!(f, "binary"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let simple = match s {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "byte" => Some(Self::Byte),
            "short" => Some(Self::Short),
            "integer" => Some(Self::Integer),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "date" => Some(Self::Date),
            "timestamp" => Some(Self::Timestamp),
            "binary" => Some(Self::Binary),
            _ => None,
        };
        if let Some(column_type) = simple {
            return Ok(column_type);
        }
        parse_decimal(s).ok_or_else(|| format!("unsupported column type '{s}'"))
    }
}

fn parse_decimal(s: &str) -> Option<ColumnType> {
    if s == "decimal" {
        return Some(ColumnType::Decimal {
            precision: 10,
            scale: 0,
        });
    }
    let args = s.strip_prefix("decimal(")?.strip_suffix(')')?;
    let (precision, scale) = args.split_once(',')?;
    let precision: u8 = precision.trim().parse().ok()?;
    let scale: i8 = scale.trim().parse().ok()?;
    if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale < 0 || scale as u8 > precision {
        return None;
    }
    Some(ColumnType::Decimal { precision, scale })
}

/// A single declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: ColumnType,
    /// Whether nulls are allowed.
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Marks the column as non-nullable.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    data_type: serde_json::Value,
    #[serde(default = "default_nullable")]
    nullable: bool,
}

const fn default_nullable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawStruct {
    #[serde(rename = "type")]
    kind: String,
    fields: Vec<RawField>,
}

/// An ordered list of typed columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    /// Columns in declaration order.
    pub fields: Vec<ColumnDef>,
}

impl TableSchema {
    /// Creates a schema from columns.
    #[must_use]
    pub fn new(fields: Vec<ColumnDef>) -> Self {
        Self { fields }
    }

    /// Parses and validates a struct-type JSON document.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, String> {
        let raw: RawStruct = serde_json::from_value(value.clone())
            .map_err(|e| format!("malformed schema: {e}"))?;
        if raw.kind != "struct" {
            return Err(format!("schema type must be 'struct', found '{}'", raw.kind));
        }
        if raw.fields.is_empty() {
            return Err("schema declares no fields".to_string());
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(raw.fields.len());
        for field in raw.fields {
            if field.name.trim().is_empty() {
                return Err("schema field with empty name".to_string());
            }
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(format!("duplicate schema field '{}'", field.name));
            }
            let type_name = field.data_type.as_str().ok_or_else(|| {
                format!("field '{}': nested types are not supported", field.name)
            })?;
            let data_type = type_name
                .parse::<ColumnType>()
                .map_err(|e| format!("field '{}': {e}", field.name))?;
            fields.push(ColumnDef {
                name: field.name,
                data_type,
                nullable: field.nullable,
            });
        }
        Ok(Self { fields })
    }

    /// Renders the schema as a struct-type JSON document.
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = self
            .fields
            .iter()
            .map(|field| {
                serde_json::json!({
                    "name": field.name,
                    "type": field.data_type.to_string(),
                    "nullable": field.nullable,
                    "metadata": {},
                })
            })
            .collect();
        serde_json::json!({ "type": "struct", "fields": fields })
    }

    /// Builds a schema from an Arrow schema, falling back to `string` for
    /// types without a column counterpart.
    #[must_use]
    pub fn from_arrow(schema: &Schema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|field| ColumnDef {
                name: field.name().clone(),
                data_type: ColumnType::from_arrow(field.data_type()).unwrap_or(ColumnType::String),
                nullable: field.is_nullable(),
            })
            .collect();
        Self { fields }
    }

    /// Converts to an Arrow schema.
    #[must_use]
    pub fn to_arrow(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .fields
            .iter()
            .map(|column| Field::new(&column.name, column.data_type.to_arrow(), column.nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no columns are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl TryFrom<serde_json::Value> for TableSchema {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json_value(&value)
    }
}

impl<'de> Deserialize<'de> for TableSchema {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json_value(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for TableSchema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prices_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "struct",
            "fields": [
                {"name": "fruit", "type": "string", "nullable": true, "metadata": {}},
                {"name": "price", "type": "double", "nullable": false, "metadata": {}},
                {"name": "amount", "type": "decimal(10,2)", "nullable": true, "metadata": {}}
            ]
        })
    }

    #[test]
    fn test_parse_struct_schema() {
        let schema = TableSchema::from_json_value(&prices_schema()).unwrap();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.fields[0], ColumnDef::new("fruit", ColumnType::String));
        assert_eq!(schema.fields[1], ColumnDef::new("price", ColumnType::Double).required());
        assert_eq!(
            schema.fields[2].data_type,
            ColumnType::Decimal {
                precision: 10,
                scale: 2
            }
        );
    }

    #[test]
    fn test_to_arrow() {
        let schema = TableSchema::from_json_value(&prices_schema()).unwrap().to_arrow();

        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert!(!schema.field(1).is_nullable());
        assert_eq!(schema.field(2).data_type(), &DataType::Decimal128(10, 2));
    }

    #[test]
    fn test_json_round_trip_keeps_layout() {
        let schema = TableSchema::from_json_value(&prices_schema()).unwrap();
        assert_eq!(schema.to_json_value(), prices_schema());
    }

    #[test]
    fn test_rejects_unknown_type() {
        let value = serde_json::json!({
            "type": "struct",
            "fields": [{"name": "x", "type": "varchar", "nullable": true}]
        });
        let err = TableSchema::from_json_value(&value).unwrap_err();
        assert!(err.contains("unsupported column type 'varchar'"));
    }

    #[test]
    fn test_rejects_nested_type() {
        let value = serde_json::json!({
            "type": "struct",
            "fields": [{"name": "x", "type": {"type": "array", "elementType": "string"}}]
        });
        assert!(TableSchema::from_json_value(&value).unwrap_err().contains("nested"));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let dup = serde_json::json!({
            "type": "struct",
            "fields": [
                {"name": "a", "type": "long"},
                {"name": "A", "type": "long"}
            ]
        });
        assert!(TableSchema::from_json_value(&dup).is_err());

        let empty = serde_json::json!({"type": "struct", "fields": []});
        assert!(TableSchema::from_json_value(&empty).is_err());
    }

    #[test]
    fn test_decimal_bounds() {
        assert!("decimal(39,2)".parse::<ColumnType>().is_err());
        assert!("decimal(5,6)".parse::<ColumnType>().is_err());
        assert_eq!(
            "decimal".parse::<ColumnType>().unwrap(),
            ColumnType::Decimal {
                precision: 10,
                scale: 0
            }
        );
    }

    #[test]
    fn test_from_arrow_falls_back_to_string() {
        let arrow_schema = Schema::new(vec![
            Field::new("n", DataType::Int64, true),
            Field::new(
                "tags",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                true,
            ),
        ]);
        let schema = TableSchema::from_arrow(&arrow_schema);

        assert_eq!(schema.fields[0].data_type, ColumnType::Long);
        assert_eq!(schema.fields[1].data_type, ColumnType::String);
    }
}
