use crate::relation::{field_at, resolve_input, resolve_key, Relation};
use common::{Attribute, DataType, Field, PizzaError, TableSchema, Tuple};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::fmt;

/// Aggregation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Avg,
    Count,
    Max,
    Min,
    Sum,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op_str = match self {
            AggOp::Avg => "avg",
            AggOp::Count => "count",
            AggOp::Max => "max",
            AggOp::Min => "min",
            AggOp::Sum => "sum",
        };
        write!(f, "{}", op_str)
    }
}

/// One output column of a `group_by`: an aggregate over an input column.
#[derive(Debug, Clone, PartialEq)]
pub struct AggSpec {
    /// Name of the output column.
    pub output: String,
    pub op: AggOp,
    /// Input column. `None` only for `count(*)`.
    pub input: Option<String>,
    /// Decimal places to round a decimal result to. Unrounded if `None`.
    pub precision: Option<u32>,
}

impl AggSpec {
    fn new(output: &str, op: AggOp, input: Option<&str>) -> Self {
        AggSpec {
            output: output.to_string(),
            op,
            input: input.map(String::from),
            precision: None,
        }
    }

    /// `count(*)`.
    pub fn count(output: &str) -> Self {
        Self::new(output, AggOp::Count, None)
    }

    pub fn sum(output: &str, input: &str) -> Self {
        Self::new(output, AggOp::Sum, Some(input))
    }

    pub fn avg(output: &str, input: &str) -> Self {
        Self::new(output, AggOp::Avg, Some(input))
    }

    pub fn min(output: &str, input: &str) -> Self {
        Self::new(output, AggOp::Min, Some(input))
    }

    pub fn max(output: &str, input: &str) -> Self {
        Self::new(output, AggOp::Max, Some(input))
    }

    /// Round a decimal result to `dp` places, half away from zero.
    pub fn rounded(mut self, dp: u32) -> Self {
        self.precision = Some(dp);
        self
    }
}

/// Round half away from zero, the way SQL `ROUND` does.
pub fn round_decimal(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// An aggregate resolved against the input schema.
struct ResolvedAgg {
    op: AggOp,
    input: Option<usize>,
    input_dtype: Option<DataType>,
    precision: Option<u32>,
}

impl ResolvedAgg {
    fn resolve(schema: &TableSchema, spec: &AggSpec) -> Result<Self, PizzaError> {
        let (input, input_dtype) = match &spec.input {
            Some(column) => {
                let idx = resolve_input(schema, column)?;
                let dtype = schema.get_attribute(idx).map(|a| *a.dtype());
                (Some(idx), dtype)
            }
            None => (None, None),
        };
        match spec.op {
            AggOp::Count => {}
            AggOp::Sum | AggOp::Avg => match input_dtype {
                Some(dtype) if dtype.is_numeric() => {}
                _ => {
                    return Err(PizzaError::InvalidAggregateInput(format!(
                        "{} needs a numeric column, got {:?}",
                        spec.op, spec.input
                    )))
                }
            },
            AggOp::Min | AggOp::Max => {
                if input.is_none() {
                    return Err(PizzaError::InvalidAggregateInput(format!(
                        "{} needs an input column",
                        spec.op
                    )));
                }
            }
        }
        Ok(ResolvedAgg {
            op: spec.op,
            input,
            input_dtype,
            precision: spec.precision,
        })
    }

    fn output_dtype(&self) -> DataType {
        match self.op {
            AggOp::Count => DataType::Int,
            AggOp::Avg => DataType::Decimal,
            // Resolution guarantees an input for these.
            AggOp::Sum | AggOp::Min | AggOp::Max => self.input_dtype.unwrap_or(DataType::Int),
        }
    }
}

/// Running state of one aggregate within one group.
#[derive(Debug, Clone)]
enum AggState {
    Count(i64),
    SumInt(i64),
    SumDecimal(Decimal),
    Avg { sum: Decimal, count: i64 },
    Extreme(Option<Field>),
}

impl AggState {
    fn new(agg: &ResolvedAgg) -> Self {
        match agg.op {
            AggOp::Count => AggState::Count(0),
            AggOp::Sum if agg.input_dtype == Some(DataType::Int) => AggState::SumInt(0),
            AggOp::Sum => AggState::SumDecimal(Decimal::ZERO),
            AggOp::Avg => AggState::Avg {
                sum: Decimal::ZERO,
                count: 0,
            },
            AggOp::Min | AggOp::Max => AggState::Extreme(None),
        }
    }

    fn merge(&mut self, agg: &ResolvedAgg, tuple: &Tuple) -> Result<(), PizzaError> {
        let value = match agg.input {
            Some(idx) => Some(field_at(tuple, idx)?),
            None => None,
        };
        match self {
            AggState::Count(c) => *c += 1,
            AggState::SumInt(s) => {
                *s = s
                    .checked_add(int_input(value)?)
                    .ok_or_else(|| sum_overflow(agg.op))?;
            }
            AggState::SumDecimal(s) => {
                *s = s
                    .checked_add(decimal_input(value)?)
                    .ok_or_else(|| sum_overflow(agg.op))?;
            }
            AggState::Avg { sum, count } => {
                *sum = sum
                    .checked_add(decimal_input(value)?)
                    .ok_or_else(|| sum_overflow(agg.op))?;
                *count += 1;
            }
            AggState::Extreme(current) => {
                let value = value.ok_or_else(|| {
                    PizzaError::InvalidAggregateInput(format!("{} without input", agg.op))
                })?;
                let replace = match current.as_ref() {
                    None => true,
                    Some(cur) if agg.op == AggOp::Min => value < cur,
                    Some(cur) => value > cur,
                };
                if replace {
                    *current = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn finish(self, agg: &ResolvedAgg) -> Field {
        let round = |d: Decimal| match agg.precision {
            Some(dp) => round_decimal(d, dp),
            None => d,
        };
        match self {
            AggState::Count(c) => Field::IntField(c),
            AggState::SumInt(s) => Field::IntField(s),
            AggState::SumDecimal(s) => Field::DecimalField(round(s)),
            AggState::Avg { sum, count } => {
                // Groups only exist once a row is merged, so count > 0.
                Field::DecimalField(round(sum / Decimal::from(count.max(1))))
            }
            AggState::Extreme(v) => match v {
                Some(Field::DecimalField(d)) => Field::DecimalField(round(d)),
                Some(f) => f,
                None => Field::IntField(0),
            },
        }
    }
}

/// Error for a running sum that left the range of its type.
pub(crate) fn sum_overflow(op: AggOp) -> PizzaError {
    PizzaError::InvalidAggregateInput(format!("{} overflowed", op))
}

fn int_input(value: Option<&Field>) -> Result<i64, PizzaError> {
    match value {
        Some(Field::IntField(i)) => Ok(*i),
        other => Err(PizzaError::InvalidAggregateInput(format!(
            "expected an integer, got {:?}",
            other
        ))),
    }
}

fn decimal_input(value: Option<&Field>) -> Result<Decimal, PizzaError> {
    value.and_then(Field::as_decimal).ok_or_else(|| {
        PizzaError::InvalidAggregateInput(format!("expected a number, got {:?}", value))
    })
}

/// Group rows by key columns and compute aggregates per group.
///
/// Output holds one row per distinct key: the key columns followed by one
/// column per aggregate. Groups appear in order of their first row; callers
/// that need a particular order apply `order_by`. An empty input yields an
/// empty output, also when `keys` is empty.
///
/// # Arguments
///
/// * `rel` - Input relation.
/// * `keys` - Grouping columns.
/// * `aggs` - Aggregates to compute per group.
pub fn group_by(rel: &Relation, keys: &[&str], aggs: &[AggSpec]) -> Result<Relation, PizzaError> {
    let schema = rel.schema();
    let key_indices = keys
        .iter()
        .map(|k| resolve_key(schema, k))
        .collect::<Result<Vec<_>, _>>()?;
    let resolved = aggs
        .iter()
        .map(|a| ResolvedAgg::resolve(schema, a))
        .collect::<Result<Vec<_>, _>>()?;

    let mut attrs: Vec<Attribute> = key_indices
        .iter()
        .filter_map(|i| schema.get_attribute(*i).cloned())
        .collect();
    for (spec, agg) in aggs.iter().zip(resolved.iter()) {
        attrs.push(Attribute::new(spec.output.clone(), agg.output_dtype()));
    }

    let mut slots: HashMap<Vec<Field>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Field>, Vec<AggState>)> = Vec::new();
    for tuple in rel.tuples() {
        let key = key_indices
            .iter()
            .map(|i| field_at(tuple, *i).map(Field::clone))
            .collect::<Result<Vec<_>, _>>()?;
        let slot = match slots.get(&key) {
            Some(slot) => *slot,
            None => {
                let states = resolved.iter().map(AggState::new).collect();
                groups.push((key.clone(), states));
                slots.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        let states = &mut groups[slot].1;
        for (state, agg) in states.iter_mut().zip(resolved.iter()) {
            state.merge(agg, tuple)?;
        }
    }

    let tuples = groups
        .into_iter()
        .map(|(mut key, states)| {
            for (state, agg) in states.into_iter().zip(resolved.iter()) {
                key.push(state.finish(agg));
            }
            Tuple::new(key)
        })
        .collect::<Vec<_>>();
    debug!(
        "queryexe::aggregate grouped {} rows into {} groups on {:?}",
        rel.len(),
        tuples.len(),
        keys
    );
    Ok(Relation::new(TableSchema::new(attrs), tuples))
}
