use common::{DataSet, Order, OrderDetail, Pizza, PizzaError, PizzaType, TableName};

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

/// A loaded base table. Rows are shared, never mutated after load.
#[derive(Debug, Clone)]
pub enum TableData {
    Orders(Arc<Vec<Order>>),
    OrderDetails(Arc<Vec<OrderDetail>>),
    Pizzas(Arc<Vec<Pizza>>),
    PizzaTypes(Arc<Vec<PizzaType>>),
}

impl TableData {
    /// The base table this row set belongs to.
    pub fn table_name(&self) -> TableName {
        match self {
            TableData::Orders(_) => TableName::Orders,
            TableData::OrderDetails(_) => TableName::OrderDetails,
            TableData::Pizzas(_) => TableName::Pizzas,
            TableData::PizzaTypes(_) => TableName::PizzaTypes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TableData::Orders(rows) => rows.len(),
            TableData::OrderDetails(rows) => rows.len(),
            TableData::Pizzas(rows) => rows.len(),
            TableData::PizzaTypes(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check keys are unique and quantities and prices are positive.
    pub fn validate(&self) -> Result<(), PizzaError> {
        match self {
            TableData::Orders(rows) => unique_keys("order_id", rows.iter().map(|o| o.order_id)),
            TableData::OrderDetails(rows) => {
                unique_keys(
                    "order_details_id",
                    rows.iter().map(|d| d.order_details_id),
                )?;
                match rows.iter().find(|d| d.quantity <= 0) {
                    Some(d) => Err(PizzaError::ValidationError(format!(
                        "order detail {} has non-positive quantity {}",
                        d.order_details_id, d.quantity
                    ))),
                    None => Ok(()),
                }
            }
            TableData::Pizzas(rows) => {
                unique_keys("pizza_id", rows.iter().map(|p| p.pizza_id.as_str()))?;
                let bad_price = rows
                    .iter()
                    .find(|p| p.price.is_zero() || p.price.is_sign_negative());
                match bad_price {
                    Some(p) => Err(PizzaError::ValidationError(format!(
                        "pizza {} has non-positive price {}",
                        p.pizza_id, p.price
                    ))),
                    None => Ok(()),
                }
            }
            TableData::PizzaTypes(rows) => unique_keys(
                "pizza_type_id",
                rows.iter().map(|t| t.pizza_type_id.as_str()),
            ),
        }
    }
}

fn unique_keys<K, I>(column: &str, keys: I) -> Result<(), PizzaError>
where
    K: Eq + Hash + std::fmt::Display,
    I: Iterator<Item = K>,
{
    let mut seen = HashSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(PizzaError::ValidationError(format!(
                "duplicate {} {}",
                column, key
            )));
        }
        seen.insert(key);
    }
    Ok(())
}

impl From<Vec<Order>> for TableData {
    fn from(rows: Vec<Order>) -> Self {
        TableData::Orders(Arc::new(rows))
    }
}

impl From<Vec<OrderDetail>> for TableData {
    fn from(rows: Vec<OrderDetail>) -> Self {
        TableData::OrderDetails(Arc::new(rows))
    }
}

impl From<Vec<Pizza>> for TableData {
    fn from(rows: Vec<Pizza>) -> Self {
        TableData::Pizzas(Arc::new(rows))
    }
}

impl From<Vec<PizzaType>> for TableData {
    fn from(rows: Vec<PizzaType>) -> Self {
        TableData::PizzaTypes(Arc::new(rows))
    }
}

/// Holds the immutable snapshots of the four base tables.
///
/// `load` swaps a whole table under the write lock; readers clone the `Arc`
/// of the current snapshot and never observe a partially loaded table.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: RwLock<HashMap<TableName, TableData>>,
}

impl TableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        TableStore {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the named table wholesale.
    ///
    /// Rows with a duplicate key, a non-positive quantity or a non-positive
    /// price fail the load and leave the previous snapshot in place.
    ///
    /// # Arguments
    ///
    /// * `name` - One of `orders`, `order_details`, `pizzas`, `pizza_types`.
    /// * `rows` - Complete row set for the table.
    pub fn load(&self, name: &str, rows: TableData) -> Result<(), PizzaError> {
        let table: TableName = name.parse()?;
        if rows.table_name() != table {
            return Err(PizzaError::ValidationError(format!(
                "{} rows cannot be loaded into table {}",
                rows.table_name(),
                table
            )));
        }
        if let Err(e) = rows.validate() {
            warn!("Rejecting load of table {}: {}", table, e);
            return Err(e);
        }
        info!("Loading table {} with {} rows", table, rows.len());
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(table, rows);
        Ok(())
    }

    /// Load all four tables from one data set.
    pub fn load_data_set(&self, data: DataSet) -> Result<(), PizzaError> {
        self.load(TableName::Orders.as_str(), data.orders.into())?;
        self.load(TableName::OrderDetails.as_str(), data.order_details.into())?;
        self.load(TableName::Pizzas.as_str(), data.pizzas.into())?;
        self.load(TableName::PizzaTypes.as_str(), data.pizza_types.into())
    }

    /// Get the current snapshot of the named table.
    pub fn get(&self, name: &str) -> Result<TableData, PizzaError> {
        let table: TableName = name.parse()?;
        self.get_table(table)
    }

    /// Get the current snapshot of a table by its typed name.
    pub fn get_table(&self, table: TableName) -> Result<TableData, PizzaError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        match tables.get(&table) {
            Some(data) => Ok(data.clone()),
            None => {
                debug!("memstore::table_store table {} requested before load", table);
                Err(PizzaError::MissingTable(table.to_string()))
            }
        }
    }

    /// Check whether a table has been loaded this session.
    pub fn is_loaded(&self, table: TableName) -> bool {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.contains_key(&table)
    }

    pub fn orders(&self) -> Result<Arc<Vec<Order>>, PizzaError> {
        match self.get_table(TableName::Orders)? {
            TableData::Orders(rows) => Ok(rows),
            other => Err(mismatch(TableName::Orders, &other)),
        }
    }

    pub fn order_details(&self) -> Result<Arc<Vec<OrderDetail>>, PizzaError> {
        match self.get_table(TableName::OrderDetails)? {
            TableData::OrderDetails(rows) => Ok(rows),
            other => Err(mismatch(TableName::OrderDetails, &other)),
        }
    }

    pub fn pizzas(&self) -> Result<Arc<Vec<Pizza>>, PizzaError> {
        match self.get_table(TableName::Pizzas)? {
            TableData::Pizzas(rows) => Ok(rows),
            other => Err(mismatch(TableName::Pizzas, &other)),
        }
    }

    pub fn pizza_types(&self) -> Result<Arc<Vec<PizzaType>>, PizzaError> {
        match self.get_table(TableName::PizzaTypes)? {
            TableData::PizzaTypes(rows) => Ok(rows),
            other => Err(mismatch(TableName::PizzaTypes, &other)),
        }
    }
}

// Unreachable through `load`, which checks the row type against the name.
fn mismatch(expected: TableName, found: &TableData) -> PizzaError {
    PizzaError::ValidationError(format!(
        "table {} holds {} rows",
        expected,
        found.table_name()
    ))
}
