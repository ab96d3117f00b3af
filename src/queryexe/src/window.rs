//! Window functions over a relation.
//!
//! Window functions never collapse rows: every input row is kept, in input
//! order, with the computed value appended as a new column.

use crate::aggregate::{round_decimal, sum_overflow, AggOp};
use crate::relation::{
    compare_on, field_at, resolve_input, resolve_key, resolve_sort_keys, Relation, ResolvedKey,
    SortKey,
};
use common::{Attribute, DataType, Field, PizzaError, TableSchema, Tuple};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// `PARTITION BY` and `ORDER BY` of a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSpec {
    pub partition_by: Vec<String>,
    pub order_by: Vec<SortKey>,
}

impl WindowSpec {
    /// A window over the whole relation with no ordering.
    pub fn new() -> Self {
        WindowSpec::default()
    }

    pub fn partition_by(mut self, column: &str) -> Self {
        self.partition_by.push(column.to_string());
        self
    }

    pub fn order_by(mut self, key: SortKey) -> Self {
        self.order_by.push(key);
        self
    }
}

/// Rows of one partition, as indices into the input, sorted on the window order.
struct Partition {
    rows: Vec<usize>,
}

/// Split row indices into partitions and sort each on the order keys.
///
/// Partitions are keyed in a `BTreeMap` so iteration is deterministic. The
/// sort is stable, so rows tied on every order key keep their input order.
fn partition_rows(
    tuples: &[Tuple],
    partition: &[usize],
    order: &[ResolvedKey],
) -> Result<Vec<Partition>, PizzaError> {
    let mut partitions: BTreeMap<Vec<Field>, Vec<usize>> = BTreeMap::new();
    for (i, tuple) in tuples.iter().enumerate() {
        let key = partition
            .iter()
            .map(|p| field_at(tuple, *p).map(Field::clone))
            .collect::<Result<Vec<_>, _>>()?;
        partitions.entry(key).or_default().push(i);
    }
    Ok(partitions
        .into_iter()
        .map(|(_, mut rows)| {
            rows.sort_by(|a, b| compare_on(order, &tuples[*a], &tuples[*b]));
            Partition { rows }
        })
        .collect())
}

fn resolve_spec(
    rel: &Relation,
    spec: &WindowSpec,
) -> Result<(Vec<usize>, Vec<ResolvedKey>), PizzaError> {
    let partition = spec
        .partition_by
        .iter()
        .map(|c| resolve_key(rel.schema(), c))
        .collect::<Result<Vec<_>, _>>()?;
    let order = resolve_sort_keys(rel.schema(), &spec.order_by)?;
    Ok((partition, order))
}

/// Attach computed values, one per input row, as a new column.
fn attach(
    rel: Relation,
    output: &str,
    dtype: DataType,
    values: Vec<Option<Field>>,
) -> Result<Relation, PizzaError> {
    let mut attrs: Vec<Attribute> = rel.schema().attributes().cloned().collect();
    attrs.push(Attribute::new(output.to_string(), dtype));
    let mut tuples = Vec::with_capacity(values.len());
    for (tuple, value) in rel.tuples().iter().zip(values) {
        let value = value.ok_or_else(|| {
            PizzaError::ValidationError(format!("no window value computed for {}", output))
        })?;
        let mut fields = tuple.field_vals.clone();
        fields.push(value);
        tuples.push(Tuple::new(fields));
    }
    Ok(Relation::new(TableSchema::new(attrs), tuples))
}

/// Numeric running total, typed after the input column.
#[derive(Clone, Copy)]
enum Total {
    Int(i64),
    Decimal(Decimal),
}

impl Total {
    fn add(self, value: &Field) -> Result<Self, PizzaError> {
        match (self, value) {
            (Total::Int(t), Field::IntField(v)) => t
                .checked_add(*v)
                .map(Total::Int)
                .ok_or_else(|| sum_overflow(AggOp::Sum)),
            (Total::Decimal(t), v) => match v.as_decimal() {
                Some(d) => t
                    .checked_add(d)
                    .map(Total::Decimal)
                    .ok_or_else(|| sum_overflow(AggOp::Sum)),
                None => Err(non_numeric(v)),
            },
            (_, v) => Err(non_numeric(v)),
        }
    }

    fn into_field(self) -> Field {
        match self {
            Total::Int(t) => Field::IntField(t),
            Total::Decimal(t) => Field::DecimalField(t),
        }
    }
}

fn non_numeric(value: &Field) -> PizzaError {
    PizzaError::InvalidAggregateInput(format!("expected a number, got {:?}", value))
}

/// Resolve a numeric input column and return its index and dtype.
fn numeric_input(rel: &Relation, column: &str) -> Result<(usize, DataType), PizzaError> {
    let idx = resolve_input(rel.schema(), column)?;
    match rel.schema().get_attribute(idx).map(|a| *a.dtype()) {
        Some(dtype) if dtype.is_numeric() => Ok((idx, dtype)),
        other => Err(PizzaError::InvalidAggregateInput(format!(
            "{} is {:?}, not numeric",
            column, other
        ))),
    }
}

/// Cumulative sum of `value` in window order, like `SUM(value) OVER (...)`.
///
/// Each row receives the sum over all rows of its partition whose order key
/// is less than or equal to its own. Rows tied on the order key form one peer
/// group and all receive the total through the end of that group. Without
/// order keys every row of a partition is a peer, so each gets the partition
/// total.
///
/// # Arguments
///
/// * `rel` - Input relation.
/// * `spec` - Partitioning and ordering of the window.
/// * `value` - Numeric column to sum.
/// * `output` - Name of the appended column.
pub fn rolling_sum(
    rel: Relation,
    spec: &WindowSpec,
    value: &str,
    output: &str,
) -> Result<Relation, PizzaError> {
    let (value_idx, dtype) = numeric_input(&rel, value)?;
    let (partition, order) = resolve_spec(&rel, spec)?;
    let zero = match dtype {
        DataType::Int => Total::Int(0),
        _ => Total::Decimal(Decimal::ZERO),
    };

    let mut values: Vec<Option<Field>> = vec![None; rel.len()];
    for part in partition_rows(rel.tuples(), &partition, &order)? {
        let tuples = rel.tuples();
        let mut running = zero;
        let mut start = 0;
        while start < part.rows.len() {
            // Extend to the end of the peer group.
            let mut end = start + 1;
            while end < part.rows.len()
                && compare_on(&order, &tuples[part.rows[start]], &tuples[part.rows[end]])
                    == Ordering::Equal
            {
                end += 1;
            }
            for row in &part.rows[start..end] {
                running = running.add(field_at(&tuples[*row], value_idx)?)?;
            }
            for row in &part.rows[start..end] {
                values[*row] = Some(running.into_field());
            }
            start = end;
        }
    }
    attach(rel, output, dtype, values)
}

/// Number rows 1, 2, 3, ... in window order, restarting in every partition.
///
/// Ties on the order key are broken by input order.
pub fn row_number(rel: Relation, spec: &WindowSpec, output: &str) -> Result<Relation, PizzaError> {
    let (partition, order) = resolve_spec(&rel, spec)?;
    let mut values: Vec<Option<Field>> = vec![None; rel.len()];
    for part in partition_rows(rel.tuples(), &partition, &order)? {
        for (n, row) in part.rows.iter().enumerate() {
            values[*row] = Some(Field::IntField(n as i64 + 1));
        }
    }
    attach(rel, output, DataType::Int, values)
}

/// Number rows by input order alone, like a bare `ROW_NUMBER() OVER ()`.
pub fn row_number_unordered(rel: Relation, output: &str) -> Result<Relation, PizzaError> {
    let values = (1..=rel.len() as i64)
        .map(|n| Some(Field::IntField(n)))
        .collect();
    attach(rel, output, DataType::Int, values)
}

/// Attach the average of `value` over each row's partition, like
/// `ROUND(AVG(value) OVER (PARTITION BY key), precision)`.
///
/// # Arguments
///
/// * `rel` - Input relation.
/// * `partition` - Partition column.
/// * `value` - Numeric column to average.
/// * `output` - Name of the appended column.
/// * `precision` - Decimal places of the rounded average.
pub fn avg_over(
    rel: Relation,
    partition: &str,
    value: &str,
    output: &str,
    precision: u32,
) -> Result<Relation, PizzaError> {
    let (value_idx, _) = numeric_input(&rel, value)?;
    let key_idx = resolve_key(rel.schema(), partition)?;

    let mut sums: HashMap<&Field, (Decimal, i64)> = HashMap::new();
    for tuple in rel.tuples() {
        let v = field_at(tuple, value_idx)?;
        let d = v.as_decimal().ok_or_else(|| non_numeric(v))?;
        let entry = sums
            .entry(field_at(tuple, key_idx)?)
            .or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.checked_add(d).ok_or_else(|| sum_overflow(AggOp::Avg))?;
        entry.1 += 1;
    }
    let mut values = Vec::with_capacity(rel.len());
    for tuple in rel.tuples() {
        let avg = sums
            .get(field_at(tuple, key_idx)?)
            .map(|(sum, count)| round_decimal(*sum / Decimal::from(*count), precision));
        values.push(avg.map(Field::DecimalField));
    }
    attach(rel, output, DataType::Decimal, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use common::{Pizza, Record};
    use rand::{thread_rng, Rng};

    fn pizzas() -> Relation {
        Relation::from_records(small_data_set().pizzas.iter())
    }

    fn int_relation(rows: Vec<(i64, i64, i64)>) -> Relation {
        let schema = TableSchema::from_vecs(
            vec!["part", "ord", "val"],
            vec![DataType::Int, DataType::Int, DataType::Int],
        );
        let tuples = rows
            .into_iter()
            .map(|(p, o, v)| Tuple::new(vec![int_field(p), int_field(o), int_field(v)]))
            .collect();
        Relation::new(schema, tuples)
    }

    #[test]
    fn test_rolling_price_total() {
        let rel = pizzas().order_by(&[SortKey::asc("price")]).unwrap();
        let spec = WindowSpec::new().order_by(SortKey::asc("price"));
        let res = rolling_sum(rel, &spec, "price", "rolling_total").unwrap();
        assert_eq!(Pizza::schema().size() + 1, res.schema().size());
        assert_eq!(
            vec![dec_field(1050), dec_field(2375), dec_field(3975), dec_field(5825)],
            res.column("rolling_total").unwrap()
        );
    }

    #[test]
    fn test_rolling_sum_ties_share_total() {
        let rel = int_relation(vec![(0, 1, 5), (0, 2, 1), (0, 2, 2), (0, 3, 4)]);
        let spec = WindowSpec::new().order_by(SortKey::asc("ord"));
        let res = rolling_sum(rel, &spec, "val", "cum").unwrap();
        assert_eq!(
            vec![int_field(5), int_field(8), int_field(8), int_field(12)],
            res.column("cum").unwrap()
        );
    }

    #[test]
    fn test_rolling_sum_keeps_input_order_and_partitions() {
        let rel = int_relation(vec![(1, 2, 10), (0, 1, 1), (1, 1, 20), (0, 2, 2)]);
        let spec = WindowSpec::new()
            .partition_by("part")
            .order_by(SortKey::asc("ord"));
        let res = rolling_sum(rel, &spec, "val", "cum").unwrap();
        assert_eq!(
            vec![int_field(30), int_field(1), int_field(20), int_field(3)],
            res.column("cum").unwrap()
        );
    }

    #[test]
    fn test_rolling_sum_monotonic_and_total() {
        let mut rng = thread_rng();
        let rows = (0..200)
            .map(|_| (0, rng.gen_range(0..50), rng.gen_range(0..100)))
            .collect::<Vec<_>>();
        let total: i64 = rows.iter().map(|r| r.2).sum();
        let rel = int_relation(rows)
            .order_by(&[SortKey::asc("ord")])
            .unwrap();
        let spec = WindowSpec::new().order_by(SortKey::asc("ord"));
        let cum = rolling_sum(rel, &spec, "val", "cum")
            .unwrap()
            .column("cum")
            .unwrap();
        for pair in cum.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(Some(&int_field(total)), cum.last());
    }

    #[test]
    fn test_row_number_partitioned() {
        let rel = int_relation(vec![(1, 5, 0), (0, 9, 0), (1, 3, 0), (0, 9, 1), (1, 4, 0)]);
        let spec = WindowSpec::new()
            .partition_by("part")
            .order_by(SortKey::desc("ord"));
        let res = row_number(rel, &spec, "rn").unwrap();
        // Partition 0 ties on ord = 9, input order decides.
        assert_eq!(
            vec![int_field(1), int_field(1), int_field(3), int_field(2), int_field(2)],
            res.column("rn").unwrap()
        );
    }

    #[test]
    fn test_row_number_contiguous() {
        let mut rng = thread_rng();
        let rows = (0..300)
            .map(|_| (rng.gen_range(0..7), rng.gen_range(0..20), 0))
            .collect::<Vec<_>>();
        let spec = WindowSpec::new()
            .partition_by("part")
            .order_by(SortKey::asc("ord"));
        let res = row_number(int_relation(rows), &spec, "rn").unwrap();
        let mut seen: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for t in res.tuples() {
            seen.entry(t.field_vals[0].as_int().unwrap())
                .or_default()
                .push(t.field_vals[3].as_int().unwrap());
        }
        for (_, mut numbers) in seen {
            numbers.sort();
            let expected: Vec<i64> = (1..=numbers.len() as i64).collect();
            assert_eq!(expected, numbers);
        }
    }

    #[test]
    fn test_row_number_unordered() {
        let res = row_number_unordered(pizzas(), "row_num").unwrap();
        assert_eq!(
            vec![int_field(1), int_field(2), int_field(3), int_field(4)],
            res.column("row_num").unwrap()
        );
    }

    #[test]
    fn test_avg_over_partition() {
        let res = avg_over(pizzas(), "pizza_type_id", "price", "avg_price", 2).unwrap();
        // Both hawaiian pizzas get (13.25 + 10.50) / 2 = 11.875 -> 11.88.
        assert_eq!(
            vec![dec_field(1188), dec_field(1600), dec_field(1850), dec_field(1188)],
            res.column("avg_price").unwrap()
        );
        assert_eq!(4, res.len());
    }

    #[test]
    fn test_window_errors() {
        let spec = WindowSpec::new().order_by(SortKey::asc("weight"));
        assert_eq!(
            Err(PizzaError::InvalidGroupKey(String::from("weight"))),
            rolling_sum(pizzas(), &spec, "price", "x")
        );
        assert!(matches!(
            rolling_sum(pizzas(), &WindowSpec::new(), "size", "x"),
            Err(PizzaError::InvalidAggregateInput(_))
        ));
        assert!(matches!(
            avg_over(pizzas(), "crust", "price", "x", 2),
            Err(PizzaError::InvalidGroupKey(_))
        ));
    }

    #[test]
    fn test_rolling_sum_overflow() {
        let rel = int_relation(vec![(0, 1, i64::MAX), (0, 2, 1)]);
        let spec = WindowSpec::new().order_by(SortKey::asc("ord"));
        assert!(matches!(
            rolling_sum(rel, &spec, "val", "cum"),
            Err(PizzaError::InvalidAggregateInput(_))
        ));
    }

    #[test]
    fn test_empty_window() {
        let rel = int_relation(Vec::new());
        let spec = WindowSpec::new().order_by(SortKey::asc("ord"));
        assert!(rolling_sum(rel.clone(), &spec, "val", "cum").unwrap().is_empty());
        assert!(row_number(rel, &spec, "rn").unwrap().is_empty());
    }
}
