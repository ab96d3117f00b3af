use crate::relation::Relation;
use chrono::{NaiveDate, NaiveTime};
use common::{DataType, Field, Order, OrderDetail, Pizza, PizzaError, PizzaType, Record, TableSchema, Tuple};
use memstore::TableStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// One order detail enriched with its order, pizza and pizza type.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub order_details_id: i64,
    pub order_id: i64,
    pub order_date: NaiveDate,
    pub order_time: NaiveTime,
    pub pizza_id: String,
    pub quantity: i64,
    pub pizza_type_id: String,
    pub size: String,
    pub price: Decimal,
    pub name: String,
    pub category: String,
    /// `quantity * price`, priced at join time.
    pub total_price: Decimal,
}

impl JoinedRow {
    fn new(detail: &OrderDetail, order: &Order, pizza: &Pizza, pizza_type: &PizzaType) -> Self {
        JoinedRow {
            order_details_id: detail.order_details_id,
            order_id: detail.order_id,
            order_date: order.order_date,
            order_time: order.order_time,
            pizza_id: detail.pizza_id.clone(),
            quantity: detail.quantity,
            pizza_type_id: pizza.pizza_type_id.clone(),
            size: pizza.size.clone(),
            price: pizza.price,
            name: pizza_type.name.clone(),
            category: pizza_type.category.clone(),
            total_price: Decimal::from(detail.quantity) * pizza.price,
        }
    }
}

impl Record for JoinedRow {
    fn schema() -> TableSchema {
        TableSchema::from_vecs(
            vec![
                "order_details_id",
                "order_id",
                "order_date",
                "order_time",
                "pizza_id",
                "quantity",
                "pizza_type_id",
                "size",
                "price",
                "name",
                "category",
                "total_price",
            ],
            vec![
                DataType::Int,
                DataType::Int,
                DataType::Date,
                DataType::Time,
                DataType::String,
                DataType::Int,
                DataType::String,
                DataType::String,
                DataType::Decimal,
                DataType::String,
                DataType::String,
                DataType::Decimal,
            ],
        )
    }

    fn to_tuple(&self) -> Tuple {
        Tuple::new(vec![
            Field::IntField(self.order_details_id),
            Field::IntField(self.order_id),
            Field::DateField(self.order_date),
            Field::TimeField(self.order_time),
            Field::StringField(self.pizza_id.clone()),
            Field::IntField(self.quantity),
            Field::StringField(self.pizza_type_id.clone()),
            Field::StringField(self.size.clone()),
            Field::DecimalField(self.price),
            Field::StringField(self.name.clone()),
            Field::StringField(self.category.clone()),
            Field::DecimalField(self.total_price),
        ])
    }
}

/// Snapshots of the four base tables taken together for one join.
pub struct JoinBuilder {
    orders: Arc<Vec<Order>>,
    order_details: Arc<Vec<OrderDetail>>,
    pizzas: Arc<Vec<Pizza>>,
    pizza_types: Arc<Vec<PizzaType>>,
}

impl JoinBuilder {
    /// Take the current snapshots. Fails with `MissingTable` if any of the
    /// four tables has not been loaded.
    pub fn new(store: &TableStore) -> Result<Self, PizzaError> {
        Ok(JoinBuilder {
            orders: store.orders()?,
            order_details: store.order_details()?,
            pizzas: store.pizzas()?,
            pizza_types: store.pizza_types()?,
        })
    }

    /// Lazily join every order detail with its order, pizza and pizza type.
    ///
    /// Details whose order, pizza, or pizza type does not resolve are skipped.
    /// Output follows the stored order of `order_details`.
    pub fn build_detail_join(&self) -> DetailJoin<'_> {
        // First row wins if a key is duplicated.
        let mut orders = HashMap::with_capacity(self.orders.len());
        for o in self.orders.iter() {
            orders.entry(o.order_id).or_insert(o);
        }
        let mut pizzas = HashMap::with_capacity(self.pizzas.len());
        for p in self.pizzas.iter() {
            pizzas.entry(p.pizza_id.as_str()).or_insert(p);
        }
        let mut pizza_types = HashMap::with_capacity(self.pizza_types.len());
        for t in self.pizza_types.iter() {
            pizza_types.entry(t.pizza_type_id.as_str()).or_insert(t);
        }
        DetailJoin {
            details: self.order_details.iter(),
            orders,
            pizzas,
            pizza_types,
            emitted: 0,
            excluded: 0,
        }
    }

    /// The detail join materialized as a relation.
    pub fn detail_relation(&self) -> Relation {
        let rows: Vec<JoinedRow> = self.build_detail_join().collect();
        Relation::from_records(rows.iter())
    }
}

/// Iterator over the detail join. See `JoinBuilder::build_detail_join`.
pub struct DetailJoin<'a> {
    details: std::slice::Iter<'a, OrderDetail>,
    orders: HashMap<i64, &'a Order>,
    pizzas: HashMap<&'a str, &'a Pizza>,
    pizza_types: HashMap<&'a str, &'a PizzaType>,
    emitted: usize,
    excluded: usize,
}

impl<'a> DetailJoin<'a> {
    fn resolve(&self, detail: &OrderDetail) -> Option<JoinedRow> {
        let order = self.orders.get(&detail.order_id)?;
        let pizza = self.pizzas.get(detail.pizza_id.as_str())?;
        let pizza_type = self.pizza_types.get(pizza.pizza_type_id.as_str())?;
        Some(JoinedRow::new(detail, order, pizza, pizza_type))
    }

    /// Details skipped so far because a key did not resolve.
    pub fn excluded(&self) -> usize {
        self.excluded
    }
}

impl<'a> Iterator for DetailJoin<'a> {
    type Item = JoinedRow;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(detail) = self.details.next() {
            match self.resolve(detail) {
                Some(row) => {
                    self.emitted += 1;
                    return Some(row);
                }
                None => {
                    trace!(
                        "queryexe::join order detail {} does not resolve, skipping",
                        detail.order_details_id
                    );
                    self.excluded += 1;
                }
            }
        }
        None
    }
}

impl<'a> Drop for DetailJoin<'a> {
    fn drop(&mut self) {
        debug!(
            "queryexe::join detail join emitted {} rows, excluded {}",
            self.emitted, self.excluded
        );
    }
}
