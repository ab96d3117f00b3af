use crate::{DataType, Field, PizzaError, TableSchema, Tuple};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::de::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// The four base relations the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableName {
    Orders,
    OrderDetails,
    Pizzas,
    PizzaTypes,
}

impl TableName {
    pub const ALL: [TableName; 4] = [
        TableName::Orders,
        TableName::OrderDetails,
        TableName::Pizzas,
        TableName::PizzaTypes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Orders => "orders",
            TableName::OrderDetails => "order_details",
            TableName::Pizzas => "pizzas",
            TableName::PizzaTypes => "pizza_types",
        }
    }
}

impl FromStr for TableName {
    type Err = PizzaError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "orders" => Ok(TableName::Orders),
            "order_details" => Ok(TableName::OrderDetails),
            "pizzas" => Ok(TableName::Pizzas),
            "pizza_types" => Ok(TableName::PizzaTypes),
            _ => Err(PizzaError::UnknownTable(name.to_string())),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed row that can be lifted into the generic tuple form.
pub trait Record {
    /// Column layout shared by every row of this type.
    fn schema() -> TableSchema;

    /// Converts the row into field values laid out as in `schema()`.
    fn to_tuple(&self) -> Tuple;
}

/// Row sets for the four base tables, as handed over by a loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    pub orders: Vec<Order>,
    pub order_details: Vec<OrderDetail>,
    pub pizzas: Vec<Pizza>,
    pub pizza_types: Vec<PizzaType>,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub order_date: NaiveDate,
    pub order_time: NaiveTime,
}

/// One line of an order: a quantity of a single pizza.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderDetail {
    pub order_details_id: i64,
    pub order_id: i64,
    pub pizza_id: String,
    pub quantity: i64,
}

/// A pizza type offered in one size at one price.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pizza {
    pub pizza_id: String,
    pub pizza_type_id: String,
    pub size: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PizzaType {
    pub pizza_type_id: String,
    pub name: String,
    pub category: String,
    #[serde(deserialize_with = "deserialize_ingredients")]
    pub ingredients: Vec<String>,
}

/// Ingredients are stored as one comma-separated column.
fn deserialize_ingredients<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

impl Record for Order {
    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["order_id", "order_date", "order_time"],
            vec![DataType::Int, DataType::Date, DataType::Time],
        )
    }

    fn to_tuple(&self) -> Tuple {
        Tuple::new(vec![
            Field::IntField(self.order_id),
            Field::DateField(self.order_date),
            Field::TimeField(self.order_time),
        ])
    }
}

impl Record for OrderDetail {
    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["order_details_id", "order_id", "pizza_id", "quantity"],
            vec![DataType::Int, DataType::Int, DataType::String, DataType::Int],
        )
    }

    fn to_tuple(&self) -> Tuple {
        Tuple::new(vec![
            Field::IntField(self.order_details_id),
            Field::IntField(self.order_id),
            Field::StringField(self.pizza_id.clone()),
            Field::IntField(self.quantity),
        ])
    }
}

impl Record for Pizza {
    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["pizza_id", "pizza_type_id", "size", "price"],
            vec![
                DataType::String,
                DataType::String,
                DataType::String,
                DataType::Decimal,
            ],
        )
    }

    fn to_tuple(&self) -> Tuple {
        Tuple::new(vec![
            Field::StringField(self.pizza_id.clone()),
            Field::StringField(self.pizza_type_id.clone()),
            Field::StringField(self.size.clone()),
            Field::DecimalField(self.price),
        ])
    }
}

impl Record for PizzaType {
    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec!["pizza_type_id", "name", "category", "ingredients"],
            vec![
                DataType::String,
                DataType::String,
                DataType::String,
                DataType::String,
            ],
        )
    }

    fn to_tuple(&self) -> Tuple {
        Tuple::new(vec![
            Field::StringField(self.pizza_type_id.clone()),
            Field::StringField(self.name.clone()),
            Field::StringField(self.category.clone()),
            Field::StringField(self.ingredients.join(", ")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_parse() {
        for name in TableName::ALL.iter() {
            assert_eq!(*name, name.as_str().parse::<TableName>().unwrap());
        }
        assert_eq!(
            Err(PizzaError::UnknownTable(String::from("customers"))),
            "customers".parse::<TableName>()
        );
    }

    #[test]
    fn test_pizza_type_csv_ingredients() {
        let data = "pizza_type_id,name,category,ingredients\n\
                    bbq_ckn,The Barbecue Chicken Pizza,Chicken,\"Barbecued Chicken, Red Peppers, Green Peppers\"\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<PizzaType> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(1, rows.len());
        assert_eq!(
            vec!["Barbecued Chicken", "Red Peppers", "Green Peppers"],
            rows[0].ingredients
        );
        assert_eq!(
            Field::StringField(String::from("Barbecued Chicken, Red Peppers, Green Peppers")),
            rows[0].to_tuple().field_vals[3]
        );
    }

    #[test]
    fn test_record_tuple_matches_schema() {
        let pizza = Pizza {
            pizza_id: String::from("bbq_ckn_s"),
            pizza_type_id: String::from("bbq_ckn"),
            size: String::from("S"),
            price: Decimal::new(1275, 2),
        };
        let schema = Pizza::schema();
        let tuple = pizza.to_tuple();
        assert_eq!(schema.size(), tuple.size());
        for (attr, field) in schema.attributes().zip(tuple.field_vals()) {
            assert_eq!(*attr.dtype(), field.dtype());
        }
    }
}
