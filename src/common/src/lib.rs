extern crate csv;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
pub mod config;
pub mod records;
pub mod testutil;

pub use config::EngineConfig;
pub use records::{DataSet, Order, OrderDetail, Pizza, PizzaType, Record, TableName};

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum PizzaError {
    /// IO and CSV errors from the load step.
    IOError(String),
    /// A table name outside the four base relations.
    UnknownTable(String),
    /// A base relation that was never loaded in this session.
    MissingTable(String),
    /// A grouping, ordering or partition key that does not resolve on the row type.
    InvalidGroupKey(String),
    /// An aggregate or window input that does not resolve, or has the wrong type.
    InvalidAggregateInput(String),
    /// A catalog lookup by a name that is not in the catalog.
    UnknownQuery(String),
    /// Malformed row data.
    ValidationError(String),
}

impl fmt::Display for PizzaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PizzaError::IOError(s) => s.to_string(),
                PizzaError::UnknownTable(s) => format!("Unknown table: {}", s),
                PizzaError::MissingTable(s) => format!("Table not loaded: {}", s),
                PizzaError::InvalidGroupKey(s) => format!("Invalid group key: {}", s),
                PizzaError::InvalidAggregateInput(s) => {
                    format!("Invalid aggregate input: {}", s)
                }
                PizzaError::UnknownQuery(s) => format!("Unknown query: {}", s),
                PizzaError::ValidationError(s) => format!("Validation Error: {}", s),
            }
        )
    }
}

// Implement std::convert::From for PizzaError; from io::Error
impl From<io::Error> for PizzaError {
    fn from(error: io::Error) -> Self {
        PizzaError::IOError(error.to_string())
    }
}

impl From<csv::Error> for PizzaError {
    fn from(error: csv::Error) -> Self {
        PizzaError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for PizzaError {
    fn from(error: serde_json::Error) -> Self {
        PizzaError::IOError(error.to_string())
    }
}

impl Error for PizzaError {}

/// Return type for a query result: the output schema plus its ordered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    schema: TableSchema,
    tuples: Vec<Tuple>,
}

impl QueryResult {
    /// Return a result holding the given rows.
    ///
    /// # Arguments
    ///
    /// * `schema` - Output columns.
    /// * `tuples` - Output rows, in output order.
    pub fn new(schema: TableSchema, tuples: Vec<Tuple>) -> Self {
        Self { schema, tuples }
    }

    /// Get the output schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Get the output rows.
    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    /// Number of output rows.
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Get the value of a named column in the given row.
    pub fn value(&self, row: usize, column: &str) -> Option<&Field> {
        let idx = self.schema.get_field_index(column)?;
        self.tuples.get(row)?.get_field(*idx)
    }

    /// Converts the result into a list of column name to value objects.
    pub fn to_json_value(&self) -> serde_json::Value {
        let rows = self
            .tuples
            .iter()
            .map(|t| {
                let mut obj = serde_json::Map::new();
                for (attr, field) in self.schema.attributes().zip(t.field_vals()) {
                    obj.insert(attr.name().to_string(), field.to_json_value());
                }
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    /// Serializes the result as a JSON array of row objects.
    pub fn to_json(&self) -> Result<String, PizzaError> {
        Ok(serde_json::to_string_pretty(&self.to_json_value())?)
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pad every column to the widest header or value.
        let width = self
            .schema
            .attributes()
            .map(|a| a.name().len())
            .chain(
                self.tuples
                    .iter()
                    .flat_map(|t| t.field_vals().map(|v| v.to_string().len())),
            )
            .max()
            .unwrap_or(10)
            + 2;
        let mut res = String::new();
        for attr in self.schema.attributes() {
            res += &format!("{:width$}", attr.name(), width = width);
        }
        res += "\n";
        for t in &self.tuples {
            for field in t.field_vals() {
                res += &format!("{:width$}", field.to_string(), width = width);
            }
            res += "\n";
        }
        write!(f, "{}", res)
    }
}

/// Handle schemas.
#[derive(PartialEq, Clone, Debug)]
pub struct TableSchema {
    /// Attributes of the schema.
    attributes: Vec<Attribute>,
    /// Mapping from attribute name to order in the schema.
    name_map: HashMap<String, usize>,
}

impl TableSchema {
    /// Create a new schema.
    ///
    /// # Arguments
    ///
    /// * `attributes` - Attributes of the schema in the order that they are in the schema.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let mut name_map = HashMap::new();
        for (i, attr) in attributes.iter().enumerate() {
            name_map.insert(attr.name().to_string(), i);
        }
        Self {
            attributes,
            name_map,
        }
    }

    /// Create a new schema with the given names and dtypes.
    ///
    /// # Arguments
    ///
    /// * `names` - Names of the new schema.
    /// * `dtypes` - Dypes of the new schema.
    pub fn from_vecs(names: Vec<&str>, dtypes: Vec<DataType>) -> Self {
        let mut attrs = Vec::new();
        for (name, dtype) in names.iter().zip(dtypes.iter()) {
            attrs.push(Attribute::new(name.to_string(), dtype.clone()));
        }
        TableSchema::new(attrs)
    }

    /// Get the attribute from the given index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the attribute to look for.
    pub fn get_attribute(&self, i: usize) -> Option<&Attribute> {
        self.attributes.get(i)
    }

    /// Get the index of the attribute.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute to get the index for.
    pub fn get_field_index(&self, name: &str) -> Option<&usize> {
        self.name_map.get(name)
    }

    /// Check if the attribute name is in the schema.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute to look for.
    pub fn contains(&self, name: &str) -> bool {
        self.name_map.contains_key(name)
    }

    /// Get an iterator of the attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Returns the length of the schema.
    pub fn size(&self) -> usize {
        self.attributes.len()
    }
}

/// Handle attributes. Pairs the name with the dtype.
#[derive(PartialEq, Clone, Debug)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute dtype.
    pub dtype: DataType,
}

impl Attribute {
    /// Create a new attribute with the given name and dtype.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the attribute.
    /// * `dtype` - Dtype of the attribute.
    pub fn new(name: String, dtype: DataType) -> Self {
        Self { name, dtype }
    }

    /// Returns the name of the attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the dtype of the attribute.
    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }
}

/// Enumerate the supported dtypes.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum DataType {
    Int,
    Decimal,
    String,
    Date,
    Time,
}

impl DataType {
    /// Whether sums and averages are defined over this dtype.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Decimal)
    }
}

/// For each of the dtypes, make sure that there is a corresponding field type.
///
/// Fields are totally ordered and hashable so they can serve as grouping and
/// sort keys. Fields of different variants order by variant.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Clone, Hash)]
pub enum Field {
    IntField(i64),
    DecimalField(Decimal),
    StringField(String),
    DateField(NaiveDate),
    TimeField(NaiveTime),
}

impl Field {
    /// Returns the dtype this field belongs to.
    pub fn dtype(&self) -> DataType {
        match self {
            Field::IntField(_) => DataType::Int,
            Field::DecimalField(_) => DataType::Decimal,
            Field::StringField(_) => DataType::String,
            Field::DateField(_) => DataType::Date,
            Field::TimeField(_) => DataType::Time,
        }
    }

    /// Numeric value of the field as an exact decimal, if it is numeric.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Field::IntField(i) => Some(Decimal::from(*i)),
            Field::DecimalField(d) => Some(*d),
            _ => None,
        }
    }

    /// Integer value of the field, if it is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Field::IntField(i) => Some(*i),
            _ => None,
        }
    }

    /// JSON rendering of the field. Decimals keep their exact digits as strings.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Field::IntField(i) => serde_json::Value::from(*i),
            Field::DecimalField(d) => serde_json::Value::String(d.to_string()),
            Field::StringField(s) => serde_json::Value::String(s.clone()),
            Field::DateField(d) => serde_json::Value::String(d.to_string()),
            Field::TimeField(t) => serde_json::Value::String(t.to_string()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::IntField(x) => write!(f, "{}", x),
            Field::DecimalField(x) => write!(f, "{}", x),
            Field::StringField(x) => write!(f, "{}", x),
            Field::DateField(x) => write!(f, "{}", x),
            Field::TimeField(x) => write!(f, "{}", x),
        }
    }
}

/// Tuple type.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub struct Tuple {
    /// Tuple data.
    pub field_vals: Vec<Field>,
}

impl Tuple {
    /// Create a new tuple with the given data.
    ///
    /// # Arguments
    ///
    /// * `field_vals` - Field values of the tuple.
    pub fn new(field_vals: Vec<Field>) -> Self {
        Self { field_vals }
    }

    /// Get the field at index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the field.
    pub fn get_field(&self, i: usize) -> Option<&Field> {
        self.field_vals.get(i)
    }

    /// Returns an iterator over the field values.
    pub fn field_vals(&self) -> impl Iterator<Item = &Field> {
        self.field_vals.iter()
    }

    /// Return the length of the tuple.
    pub fn size(&self) -> usize {
        self.field_vals.len()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = String::new();
        for field in &self.field_vals {
            res.push_str(&field.to_string());
            res.push('\t');
        }
        write!(f, "{}", res)
    }
}

#[cfg(test)]
mod libtests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn test_field_ordering_within_variant() {
        let cheap = Field::DecimalField(Decimal::new(1025, 2));
        let pricey = Field::DecimalField(Decimal::new(2095, 2));
        assert!(cheap < pricey);
        assert!(Field::IntField(-1) < Field::IntField(3));
        assert!(Field::StringField("L".into()) < Field::StringField("M".into()));
        assert_eq!(Some(3), Field::IntField(3).as_int());
        assert_eq!(None, cheap.as_int());
    }

    #[test]
    fn test_decimal_scale_equality() {
        // 10.0 and 10.00 must land in the same group.
        let a = Field::DecimalField(Decimal::new(100, 1));
        let b = Field::DecimalField(Decimal::new(1000, 2));
        assert_eq!(a, b);
        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(Some(&1), map.get(&b));
    }

    #[test]
    fn test_schema_lookup() {
        let schema = TableSchema::from_vecs(
            vec!["pizza_id", "price"],
            vec![DataType::String, DataType::Decimal],
        );
        assert_eq!(Some(&1), schema.get_field_index("price"));
        assert!(!schema.contains("size"));
        assert_eq!(2, schema.size());
    }

    #[test]
    fn test_query_result_rendering() {
        init();
        let schema = TableSchema::from_vecs(
            vec!["pizza_id", "count"],
            vec![DataType::String, DataType::Int],
        );
        let res = QueryResult::new(
            schema,
            vec![Tuple::new(vec![
                Field::StringField("hawaiian_m".into()),
                Field::IntField(2),
            ])],
        );
        let text = res.to_string();
        assert!(text.starts_with("pizza_id"));
        assert!(text.contains("hawaiian_m"));
        assert_eq!(Some(&Field::IntField(2)), res.value(0, "count"));

        let json: serde_json::Value = serde_json::from_str(&res.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["pizza_id"], "hawaiian_m");
        assert_eq!(json[0]["count"], 2);
    }

    #[test]
    fn test_error_display() {
        let e = PizzaError::UnknownTable(String::from("customers"));
        assert_eq!("Unknown table: customers", e.to_string());
        let io: PizzaError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(PizzaError::IOError(String::from("gone")), io);
    }
}
