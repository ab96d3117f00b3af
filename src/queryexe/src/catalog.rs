use crate::aggregate::{group_by, round_decimal, AggSpec};
use crate::calendar::{with_calendar_column, CalendarPart};
use crate::join::JoinBuilder;
use crate::relation::{field_at, Relation, SortKey};
use crate::window::{avg_over, rolling_sum, row_number, row_number_unordered, WindowSpec};
use common::{DataType, EngineConfig, Field, PizzaError, QueryResult};
use memstore::TableStore;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Named analytical queries over the pizza sales tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryId {
    TotalOrders,
    TotalRevenue,
    HighestPricedPizza,
    MostCommonSize,
    TopPizzaTypesByQuantity,
    QuantityByCategory,
    OrdersByHour,
    PizzaTypesByCategory,
    AvgPizzasPerDay,
    NumberedPizzaTypes,
    TopPizzaTypesByRevenue,
    RevenueShareByCategory,
    CumulativeRevenue,
    TopPizzaTypesByCategoryRevenue,
    RollingPriceTotal,
    MostOrderedPizza,
    TotalItemsOrdered,
    TopOrdersByQuantity,
    OrdersByMonth,
    OrdersByWeekday,
    OrdersByWeekdayName,
    OrdersByDayOfMonth,
    PizzaCountBySize,
    AvgPriceByCategory,
    AvgPriceByPizzaType,
    BestSellingPizzasRolling,
}

impl QueryId {
    /// Every query, in catalog order.
    pub const ALL: [QueryId; 26] = [
        QueryId::TotalOrders,
        QueryId::TotalRevenue,
        QueryId::HighestPricedPizza,
        QueryId::MostCommonSize,
        QueryId::TopPizzaTypesByQuantity,
        QueryId::QuantityByCategory,
        QueryId::OrdersByHour,
        QueryId::PizzaTypesByCategory,
        QueryId::AvgPizzasPerDay,
        QueryId::NumberedPizzaTypes,
        QueryId::TopPizzaTypesByRevenue,
        QueryId::RevenueShareByCategory,
        QueryId::CumulativeRevenue,
        QueryId::TopPizzaTypesByCategoryRevenue,
        QueryId::RollingPriceTotal,
        QueryId::MostOrderedPizza,
        QueryId::TotalItemsOrdered,
        QueryId::TopOrdersByQuantity,
        QueryId::OrdersByMonth,
        QueryId::OrdersByWeekday,
        QueryId::OrdersByWeekdayName,
        QueryId::OrdersByDayOfMonth,
        QueryId::PizzaCountBySize,
        QueryId::AvgPriceByCategory,
        QueryId::AvgPriceByPizzaType,
        QueryId::BestSellingPizzasRolling,
    ];

    /// Stable snake_case name of the query.
    pub fn name(&self) -> &'static str {
        match self {
            QueryId::TotalOrders => "total_orders",
            QueryId::TotalRevenue => "total_revenue",
            QueryId::HighestPricedPizza => "highest_priced_pizza",
            QueryId::MostCommonSize => "most_common_size",
            QueryId::TopPizzaTypesByQuantity => "top_pizza_types_by_quantity",
            QueryId::QuantityByCategory => "quantity_by_category",
            QueryId::OrdersByHour => "orders_by_hour",
            QueryId::PizzaTypesByCategory => "pizza_types_by_category",
            QueryId::AvgPizzasPerDay => "avg_pizzas_per_day",
            QueryId::NumberedPizzaTypes => "numbered_pizza_types",
            QueryId::TopPizzaTypesByRevenue => "top_pizza_types_by_revenue",
            QueryId::RevenueShareByCategory => "revenue_share_by_category",
            QueryId::CumulativeRevenue => "cumulative_revenue",
            QueryId::TopPizzaTypesByCategoryRevenue => "top_pizza_types_by_category_revenue",
            QueryId::RollingPriceTotal => "rolling_price_total",
            QueryId::MostOrderedPizza => "most_ordered_pizza",
            QueryId::TotalItemsOrdered => "total_items_ordered",
            QueryId::TopOrdersByQuantity => "top_orders_by_quantity",
            QueryId::OrdersByMonth => "orders_by_month",
            QueryId::OrdersByWeekday => "orders_by_weekday",
            QueryId::OrdersByWeekdayName => "orders_by_weekday_name",
            QueryId::OrdersByDayOfMonth => "orders_by_day_of_month",
            QueryId::PizzaCountBySize => "pizza_count_by_size",
            QueryId::AvgPriceByCategory => "avg_price_by_category",
            QueryId::AvgPriceByPizzaType => "avg_price_by_pizza_type",
            QueryId::BestSellingPizzasRolling => "best_selling_pizzas_rolling",
        }
    }

    /// Look a query up by its name.
    pub fn from_name(name: &str) -> Result<Self, PizzaError> {
        QueryId::ALL
            .iter()
            .find(|id| id.name() == name)
            .copied()
            .ok_or_else(|| PizzaError::UnknownQuery(name.to_string()))
    }
}

impl FromStr for QueryId {
    type Err = PizzaError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        QueryId::from_name(name)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runs catalog queries against the tables currently loaded in a store.
///
/// Every query reads fresh snapshots, so results follow the latest `load`.
pub struct QueryCatalog<'a> {
    store: &'a TableStore,
    avg_precision: u32,
}

impl<'a> QueryCatalog<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self::with_config(store, &EngineConfig::default())
    }

    pub fn with_config(store: &'a TableStore, config: &EngineConfig) -> Self {
        QueryCatalog {
            store,
            avg_precision: config.avg_precision,
        }
    }

    /// Run one query.
    ///
    /// Fails with `MissingTable` if the query reads a table that has not been
    /// loaded. A join that matches nothing gives an empty result.
    pub fn run(&self, id: QueryId) -> Result<QueryResult, PizzaError> {
        info!("Running query {}", id);
        let rel = match id {
            QueryId::TotalOrders => self.total_orders(),
            QueryId::TotalRevenue => self.total_revenue(),
            QueryId::HighestPricedPizza => self.highest_priced_pizza(),
            QueryId::MostCommonSize => self.most_common_size(),
            QueryId::TopPizzaTypesByQuantity => self.top_pizza_types_by_quantity(),
            QueryId::QuantityByCategory => self.quantity_by_category(),
            QueryId::OrdersByHour => self.orders_by_calendar(CalendarPart::Hour, "hour"),
            QueryId::PizzaTypesByCategory => self.pizza_types_by_category(),
            QueryId::AvgPizzasPerDay => self.avg_pizzas_per_day(),
            QueryId::NumberedPizzaTypes => self.numbered_pizza_types(),
            QueryId::TopPizzaTypesByRevenue => self.top_pizza_types_by_revenue(),
            QueryId::RevenueShareByCategory => self.revenue_share_by_category(),
            QueryId::CumulativeRevenue => self.cumulative_revenue(),
            QueryId::TopPizzaTypesByCategoryRevenue => self.top_pizza_types_by_category_revenue(),
            QueryId::RollingPriceTotal => self.rolling_price_total(),
            QueryId::MostOrderedPizza => self.most_ordered_pizza(),
            QueryId::TotalItemsOrdered => self.total_items_ordered(),
            QueryId::TopOrdersByQuantity => self.top_orders_by_quantity(),
            QueryId::OrdersByMonth => self.orders_by_calendar(CalendarPart::Month, "month"),
            QueryId::OrdersByWeekday => {
                self.orders_by_calendar(CalendarPart::WeekdayIndex, "weekday")
            }
            QueryId::OrdersByWeekdayName => self.orders_by_weekday_name(),
            QueryId::OrdersByDayOfMonth => {
                self.orders_by_calendar(CalendarPart::DayOfMonth, "day_of_month")
            }
            QueryId::PizzaCountBySize => self.pizza_count_by_size(),
            QueryId::AvgPriceByCategory => self.avg_price_by_category(),
            QueryId::AvgPriceByPizzaType => self.avg_price_by_pizza_type(),
            QueryId::BestSellingPizzasRolling => self.best_selling_pizzas_rolling(),
        }?;
        debug!("queryexe::catalog query {} returned {} rows", id, rel.len());
        Ok(rel.into_result())
    }

    /// Run every query in catalog order, stopping at the first failure.
    pub fn run_all(&self) -> Result<Vec<(QueryId, QueryResult)>, PizzaError> {
        QueryId::ALL
            .iter()
            .map(|id| Ok((*id, self.run(*id)?)))
            .collect()
    }

    fn orders(&self) -> Result<Relation, PizzaError> {
        Ok(Relation::from_records(self.store.orders()?.iter()))
    }

    fn order_details(&self) -> Result<Relation, PizzaError> {
        Ok(Relation::from_records(self.store.order_details()?.iter()))
    }

    fn pizzas(&self) -> Result<Relation, PizzaError> {
        Ok(Relation::from_records(self.store.pizzas()?.iter()))
    }

    fn pizza_types(&self) -> Result<Relation, PizzaError> {
        Ok(Relation::from_records(self.store.pizza_types()?.iter()))
    }

    fn detail_join(&self) -> Result<Relation, PizzaError> {
        Ok(JoinBuilder::new(self.store)?.detail_relation())
    }

    /// Pizzas with their type's name and category.
    fn pizzas_with_types(&self) -> Result<Relation, PizzaError> {
        self.pizzas()?
            .join_on(&self.pizza_types()?, "pizza_type_id", "pizza_type_id")
    }

    fn total_orders(&self) -> Result<Relation, PizzaError> {
        group_by(&self.orders()?, &[], &[AggSpec::count("total_orders")])
    }

    fn total_revenue(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.detail_join()?,
            &[],
            &[AggSpec::sum("total_revenue", "total_price").rounded(2)],
        )
    }

    fn highest_priced_pizza(&self) -> Result<Relation, PizzaError> {
        self.pizzas_with_types()?
            .order_by(&[SortKey::desc("price")])?
            .limit(1)
            .project(&["name", "price"])
    }

    fn most_common_size(&self) -> Result<Relation, PizzaError> {
        group_by(&self.detail_join()?, &["size"], &[AggSpec::count("order_count")])?
            .order_by(&[SortKey::desc("order_count"), SortKey::asc("size")])
    }

    fn top_pizza_types_by_quantity(&self) -> Result<Relation, PizzaError> {
        Ok(group_by(
            &self.detail_join()?,
            &["name"],
            &[AggSpec::sum("quantity", "quantity")],
        )?
        .order_by(&[SortKey::desc("quantity")])?
        .limit(5))
    }

    fn quantity_by_category(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.detail_join()?,
            &["category"],
            &[AggSpec::sum("quantity", "quantity")],
        )?
        .order_by(&[SortKey::desc("quantity")])
    }

    /// Order count per calendar bucket of the order timestamp, ascending.
    fn orders_by_calendar(&self, part: CalendarPart, key: &str) -> Result<Relation, PizzaError> {
        let source = match part {
            CalendarPart::Hour => "order_time",
            _ => "order_date",
        };
        let orders = with_calendar_column(self.orders()?, source, part, key)?;
        group_by(&orders, &[key], &[AggSpec::count("order_count")])?
            .order_by(&[SortKey::asc(key)])
    }

    fn orders_by_weekday_name(&self) -> Result<Relation, PizzaError> {
        let orders =
            with_calendar_column(self.orders()?, "order_date", CalendarPart::WeekdayName, "weekday")?;
        group_by(&orders, &["weekday"], &[AggSpec::count("order_count")])?
            .order_by(&[SortKey::desc("order_count"), SortKey::asc("weekday")])
    }

    fn pizza_types_by_category(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.pizza_types()?,
            &["category"],
            &[AggSpec::count("pizza_types")],
        )
    }

    fn avg_pizzas_per_day(&self) -> Result<Relation, PizzaError> {
        let per_day = group_by(
            &self.detail_join()?,
            &["order_date"],
            &[AggSpec::sum("quantity", "quantity")],
        )?;
        group_by(
            &per_day,
            &[],
            &[AggSpec::avg("avg_pizzas_per_day", "quantity").rounded(0)],
        )
    }

    fn numbered_pizza_types(&self) -> Result<Relation, PizzaError> {
        let types = self.pizza_types()?.project(&["pizza_type_id", "name", "category"])?;
        row_number_unordered(types, "row_num")
    }

    fn revenue_by_name(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.detail_join()?,
            &["name"],
            &[AggSpec::sum("revenue", "total_price")],
        )
    }

    fn top_pizza_types_by_revenue(&self) -> Result<Relation, PizzaError> {
        Ok(self
            .revenue_by_name()?
            .order_by(&[SortKey::desc("revenue")])?
            .limit(3))
    }

    fn revenue_share_by_category(&self) -> Result<Relation, PizzaError> {
        let by_category = group_by(
            &self.detail_join()?,
            &["category"],
            &[AggSpec::sum("revenue", "total_price")],
        )?;
        let revenue_idx = by_category.column_index("revenue")?;
        let mut total = Decimal::ZERO;
        for tuple in by_category.tuples() {
            total += revenue_of(field_at(tuple, revenue_idx)?)?;
        }
        by_category
            .with_column("revenue_share", DataType::Decimal, |t| {
                let revenue = revenue_of(field_at(t, revenue_idx)?)?;
                if total.is_zero() {
                    return Ok(Field::DecimalField(Decimal::ZERO));
                }
                Ok(Field::DecimalField(round_decimal(
                    revenue * Decimal::from(100) / total,
                    2,
                )))
            })?
            .project(&["category", "revenue_share"])?
            .order_by(&[SortKey::desc("revenue_share")])
    }

    fn cumulative_revenue(&self) -> Result<Relation, PizzaError> {
        let per_day = group_by(
            &self.detail_join()?,
            &["order_date"],
            &[AggSpec::sum("revenue", "total_price")],
        )?
        .order_by(&[SortKey::asc("order_date")])?;
        let spec = WindowSpec::new().order_by(SortKey::asc("order_date"));
        rolling_sum(per_day, &spec, "revenue", "cum_revenue")
    }

    fn top_pizza_types_by_category_revenue(&self) -> Result<Relation, PizzaError> {
        let revenue = group_by(
            &self.detail_join()?,
            &["category", "name"],
            &[AggSpec::sum("revenue", "total_price")],
        )?;
        let spec = WindowSpec::new()
            .partition_by("category")
            .order_by(SortKey::desc("revenue"));
        let ranked = row_number(revenue, &spec, "rn")?;
        let rn_idx = ranked.column_index("rn")?;
        ranked
            .filter(|t| matches!(t.get_field(rn_idx), Some(Field::IntField(rn)) if *rn <= 3))
            .order_by(&[SortKey::asc("category"), SortKey::asc("rn")])
    }

    fn rolling_price_total(&self) -> Result<Relation, PizzaError> {
        let pizzas = self.pizzas()?.order_by(&[SortKey::asc("price")])?;
        let spec = WindowSpec::new().order_by(SortKey::asc("price"));
        rolling_sum(pizzas, &spec, "price", "rolling_total")
    }

    /// Order detail lines per pizza, before any ordering.
    fn lines_per_pizza(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.order_details()?,
            &["pizza_id"],
            &[AggSpec::count("order_count")],
        )
    }

    fn most_ordered_pizza(&self) -> Result<Relation, PizzaError> {
        self.lines_per_pizza()?
            .order_by(&[SortKey::desc("order_count"), SortKey::asc("pizza_id")])
    }

    fn total_items_ordered(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.lines_per_pizza()?,
            &[],
            &[AggSpec::sum("total_items", "order_count")],
        )
    }

    fn top_orders_by_quantity(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.order_details()?,
            &["order_id"],
            &[AggSpec::sum("quantity_ordered", "quantity")],
        )?
        .order_by(&[SortKey::desc("quantity_ordered"), SortKey::asc("order_id")])
    }

    fn pizza_count_by_size(&self) -> Result<Relation, PizzaError> {
        group_by(&self.pizzas()?, &["size"], &[AggSpec::count("pizza_count")])?
            .order_by(&[SortKey::asc("size")])
    }

    fn avg_price_by_category(&self) -> Result<Relation, PizzaError> {
        group_by(
            &self.pizzas_with_types()?,
            &["category"],
            &[AggSpec::avg("avg_price", "price").rounded(self.avg_precision)],
        )?
        .order_by(&[SortKey::asc("category")])
    }

    fn avg_price_by_pizza_type(&self) -> Result<Relation, PizzaError> {
        let rel = avg_over(
            self.pizzas_with_types()?,
            "pizza_type_id",
            "price",
            "avg_price",
            self.avg_precision,
        )?;
        rel.project(&["pizza_id", "name", "size", "price", "avg_price"])
    }

    fn best_selling_pizzas_rolling(&self) -> Result<Relation, PizzaError> {
        let sold = self
            .lines_per_pizza()?
            .join_on(&self.pizzas()?, "pizza_id", "pizza_id")?
            .order_by(&[SortKey::asc("order_count"), SortKey::asc("pizza_id")])?;
        let spec = WindowSpec::new().order_by(SortKey::asc("order_count"));
        rolling_sum(sold, &spec, "order_count", "rolling_count")?.project(&[
            "pizza_id",
            "size",
            "price",
            "order_count",
            "rolling_count",
        ])
    }
}

fn revenue_of(field: &Field) -> Result<Decimal, PizzaError> {
    field.as_decimal().ok_or_else(|| {
        PizzaError::InvalidAggregateInput(format!("revenue is not numeric: {:?}", field))
    })
}
