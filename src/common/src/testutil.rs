use crate::{DataSet, Field, Order, OrderDetail, Pizza, PizzaType};
use chrono::{Duration, NaiveDate, NaiveTime};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn int_field(i: i64) -> Field {
    Field::IntField(i)
}

/// Decimal field from a value in hundredths.
pub fn dec_field(cents: i64) -> Field {
    Field::DecimalField(Decimal::new(cents, 2))
}

pub fn str_field(s: &str) -> Field {
    Field::StringField(s.to_string())
}

/// Builds an order. Panics on a malformed date or time literal.
pub fn order(order_id: i64, date: &str, time: &str) -> Order {
    Order {
        order_id,
        order_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        order_time: NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap(),
    }
}

pub fn detail(order_details_id: i64, order_id: i64, pizza_id: &str, quantity: i64) -> OrderDetail {
    OrderDetail {
        order_details_id,
        order_id,
        pizza_id: pizza_id.to_string(),
        quantity,
    }
}

/// Builds a pizza priced in cents.
pub fn pizza(pizza_id: &str, pizza_type_id: &str, size: &str, cents: i64) -> Pizza {
    Pizza {
        pizza_id: pizza_id.to_string(),
        pizza_type_id: pizza_type_id.to_string(),
        size: size.to_string(),
        price: Decimal::new(cents, 2),
    }
}

pub fn pizza_type(pizza_type_id: &str, name: &str, category: &str) -> PizzaType {
    PizzaType {
        pizza_type_id: pizza_type_id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        ingredients: vec![String::from("Mozzarella Cheese")],
    }
}

/// A small hand-checked data set.
///
/// Orders 1 and 2 fall on Thursday 2015-01-01, order 3 on Friday 2015-01-02 and
/// order 4 on Sunday 2015-02-15. Detail 6 references an unknown pizza and is
/// dropped by the detail join.
pub fn small_data_set() -> DataSet {
    DataSet {
        orders: vec![
            order(1, "2015-01-01", "11:38:36"),
            order(2, "2015-01-01", "11:57:40"),
            order(3, "2015-01-02", "12:12:28"),
            order(4, "2015-02-15", "18:05:00"),
        ],
        order_details: vec![
            detail(1, 1, "hawaiian_m", 1),
            detail(2, 2, "classic_dlx_m", 1),
            detail(3, 2, "five_cheese_l", 2),
            detail(4, 3, "hawaiian_m", 3),
            detail(5, 4, "classic_dlx_m", 1),
            detail(6, 4, "ghost_pizza", 5),
        ],
        pizzas: vec![
            pizza("hawaiian_m", "hawaiian", "M", 1325),
            pizza("classic_dlx_m", "classic_dlx", "M", 1600),
            pizza("five_cheese_l", "five_cheese", "L", 1850),
            pizza("hawaiian_s", "hawaiian", "S", 1050),
        ],
        pizza_types: vec![
            pizza_type("hawaiian", "The Hawaiian Pizza", "Classic"),
            pizza_type("classic_dlx", "The Classic Deluxe Pizza", "Classic"),
            pizza_type("five_cheese", "The Five Cheese Pizza", "Veggie"),
        ],
    }
}

/// Generates a random but referentially complete data set.
///
/// # Arguments
///
/// * `num_orders` - Number of orders to generate.
/// * `max_lines` - Upper bound on detail lines per order.
pub fn gen_random_data_set(num_orders: usize, max_lines: usize) -> DataSet {
    let mut rng = thread_rng();
    let categories = ["Classic", "Veggie", "Supreme", "Chicken"];
    let sizes = [("S", 0), ("M", 250), ("L", 450)];

    let mut data = DataSet::default();
    for t in 0..8 {
        let type_id = format!("type_{}", t);
        data.pizza_types.push(pizza_type(
            &type_id,
            &format!("The {} Pizza", gen_rand_string(6)),
            categories[t % categories.len()],
        ));
        let base: i64 = rng.gen_range(900..1800);
        for (size, bump) in sizes.iter() {
            data.pizzas.push(pizza(
                &format!("{}_{}", type_id, size.to_lowercase()),
                &type_id,
                size,
                base + bump,
            ));
        }
    }

    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let mut detail_id = 1;
    for o in 0..num_orders {
        let order_id = o as i64 + 1;
        let date = start + Duration::days(rng.gen_range(0..365));
        let time = NaiveTime::from_hms_opt(rng.gen_range(9..24), rng.gen_range(0..60), 0).unwrap();
        data.orders.push(Order {
            order_id,
            order_date: date,
            order_time: time,
        });
        for _ in 0..rng.gen_range(1..=max_lines.max(1)) {
            let pizza_id = data.pizzas[rng.gen_range(0..data.pizzas.len())]
                .pizza_id
                .clone();
            data.order_details
                .push(detail(detail_id, order_id, &pizza_id, rng.gen_range(1..4)));
            detail_id += 1;
        }
    }
    data
}

pub fn gen_rand_string(n: usize) -> String {
    thread_rng().sample_iter(Alphanumeric).take(n).map(char::from).collect()
}

pub fn gen_random_dir() -> PathBuf {
    init();
    let mut dir = env::temp_dir();
    dir.push(String::from("pizzadb"));
    let rand_string = gen_rand_string(10);
    dir.push(rand_string);
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_data_set_resolves() {
        let data = gen_random_data_set(50, 4);
        assert_eq!(50, data.orders.len());
        let pizza_ids: HashSet<&str> = data.pizzas.iter().map(|p| p.pizza_id.as_str()).collect();
        let order_ids: HashSet<i64> = data.orders.iter().map(|o| o.order_id).collect();
        for d in &data.order_details {
            assert!(pizza_ids.contains(d.pizza_id.as_str()));
            assert!(order_ids.contains(&d.order_id));
            assert!(d.quantity > 0);
        }
    }
}
