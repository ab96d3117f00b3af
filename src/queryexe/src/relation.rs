use common::{Attribute, DataType, Field, PizzaError, QueryResult, Record, TableSchema, Tuple};
use std::cmp::Ordering;
use std::collections::HashMap;

/// An in-memory row set with its schema. Every engine operation consumes and
/// produces relations; none mutates its input.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    schema: TableSchema,
    tuples: Vec<Tuple>,
}

/// Sort direction of one ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One ordering key: a column and its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(column: &str) -> Self {
        SortKey {
            column: column.to_string(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        SortKey {
            column: column.to_string(),
            order: SortOrder::Desc,
        }
    }
}

/// A sort key resolved to a column index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedKey {
    pub index: usize,
    pub order: SortOrder,
}

/// Resolve grouping, partition or ordering columns.
pub(crate) fn resolve_key(schema: &TableSchema, column: &str) -> Result<usize, PizzaError> {
    schema
        .get_field_index(column)
        .copied()
        .ok_or_else(|| PizzaError::InvalidGroupKey(column.to_string()))
}

/// Resolve an aggregate or window input column.
pub(crate) fn resolve_input(schema: &TableSchema, column: &str) -> Result<usize, PizzaError> {
    schema
        .get_field_index(column)
        .copied()
        .ok_or_else(|| PizzaError::InvalidAggregateInput(column.to_string()))
}

pub(crate) fn resolve_sort_keys(
    schema: &TableSchema,
    keys: &[SortKey],
) -> Result<Vec<ResolvedKey>, PizzaError> {
    keys.iter()
        .map(|k| {
            Ok(ResolvedKey {
                index: resolve_key(schema, &k.column)?,
                order: k.order,
            })
        })
        .collect()
}

/// Compare two tuples on resolved keys. Ties compare `Equal`.
pub(crate) fn compare_on(keys: &[ResolvedKey], a: &Tuple, b: &Tuple) -> Ordering {
    for key in keys {
        let ord = a.get_field(key.index).cmp(&b.get_field(key.index));
        let ord = match key.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Fetch a field a resolved index points at.
pub(crate) fn field_at(tuple: &Tuple, index: usize) -> Result<&Field, PizzaError> {
    tuple.get_field(index).ok_or_else(|| {
        PizzaError::ValidationError(format!(
            "row has {} fields, column {} requested",
            tuple.size(),
            index
        ))
    })
}

impl Relation {
    /// Create a relation. Every tuple must be laid out as the schema.
    pub fn new(schema: TableSchema, tuples: Vec<Tuple>) -> Self {
        Relation { schema, tuples }
    }

    /// Lift typed records into a relation, keeping their order.
    pub fn from_records<'a, R, I>(rows: I) -> Self
    where
        R: Record + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let tuples = rows.into_iter().map(|r| r.to_tuple()).collect();
        Relation::new(R::schema(), tuples)
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Get the index of a column.
    pub fn column_index(&self, column: &str) -> Result<usize, PizzaError> {
        resolve_key(&self.schema, column)
    }

    /// Values of one column, in row order.
    pub fn column(&self, column: &str) -> Result<Vec<Field>, PizzaError> {
        let idx = resolve_input(&self.schema, column)?;
        self.tuples
            .iter()
            .map(|t| field_at(t, idx).map(Field::clone))
            .collect()
    }

    /// Append a computed column.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the new column.
    /// * `dtype` - Dtype of the values `f` produces.
    /// * `f` - Computes the new value from the existing row.
    pub fn with_column<F>(self, name: &str, dtype: DataType, f: F) -> Result<Self, PizzaError>
    where
        F: Fn(&Tuple) -> Result<Field, PizzaError>,
    {
        let mut attrs: Vec<Attribute> = self.schema.attributes().cloned().collect();
        attrs.push(Attribute::new(name.to_string(), dtype));
        let mut tuples = Vec::with_capacity(self.tuples.len());
        for mut tuple in self.tuples {
            let value = f(&tuple)?;
            tuple.field_vals.push(value);
            tuples.push(tuple);
        }
        Ok(Relation::new(TableSchema::new(attrs), tuples))
    }

    /// Keep only the named columns, in the given order.
    pub fn project(&self, columns: &[&str]) -> Result<Self, PizzaError> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut attrs = Vec::with_capacity(columns.len());
        for column in columns {
            let idx = resolve_input(&self.schema, column)?;
            indices.push(idx);
            if let Some(attr) = self.schema.get_attribute(idx) {
                attrs.push(attr.clone());
            }
        }
        let tuples = self
            .tuples
            .iter()
            .map(|t| {
                let fields = indices
                    .iter()
                    .map(|i| field_at(t, *i).map(Field::clone))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Tuple::new(fields))
            })
            .collect::<Result<Vec<_>, PizzaError>>()?;
        Ok(Relation::new(TableSchema::new(attrs), tuples))
    }

    /// Keep the rows matching a predicate.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Tuple) -> bool,
    {
        let tuples = self.tuples.into_iter().filter(|t| predicate(t)).collect();
        Relation::new(self.schema, tuples)
    }

    /// Stable sort on the given keys; rows tied on every key keep input order.
    pub fn order_by(mut self, keys: &[SortKey]) -> Result<Self, PizzaError> {
        let resolved = resolve_sort_keys(&self.schema, keys)?;
        self.tuples.sort_by(|a, b| compare_on(&resolved, a, b));
        Ok(self)
    }

    /// Keep the first `n` rows.
    pub fn limit(mut self, n: usize) -> Self {
        self.tuples.truncate(n);
        self
    }

    /// Inner equi-join with another relation.
    ///
    /// Output follows this relation's row order; each left row is followed by
    /// its matches in the right relation's order. Right-side columns whose
    /// names already exist on the left, the join column included, are dropped.
    ///
    /// # Arguments
    ///
    /// * `right` - Relation to join with.
    /// * `left_col` - Join column of this relation.
    /// * `right_col` - Join column of `right`.
    pub fn join_on(&self, right: &Relation, left_col: &str, right_col: &str) -> Result<Self, PizzaError> {
        let left_idx = resolve_key(&self.schema, left_col)?;
        let right_idx = resolve_key(&right.schema, right_col)?;

        let kept: Vec<usize> = right
            .schema
            .attributes()
            .enumerate()
            .filter(|(i, a)| *i != right_idx && !self.schema.contains(a.name()))
            .map(|(i, _)| i)
            .collect();
        let mut attrs: Vec<Attribute> = self.schema.attributes().cloned().collect();
        for i in &kept {
            if let Some(attr) = right.schema.get_attribute(*i) {
                attrs.push(attr.clone());
            }
        }

        let mut build: HashMap<&Field, Vec<&Tuple>> = HashMap::new();
        for t in &right.tuples {
            build.entry(field_at(t, right_idx)?).or_default().push(t);
        }

        let mut tuples = Vec::new();
        for l in &self.tuples {
            if let Some(matches) = build.get(field_at(l, left_idx)?) {
                for r in matches {
                    let mut fields = l.field_vals.clone();
                    for i in &kept {
                        fields.push(field_at(r, *i)?.clone());
                    }
                    tuples.push(Tuple::new(fields));
                }
            }
        }
        debug!(
            "queryexe::relation join on {}={} produced {} rows from {}",
            left_col,
            right_col,
            tuples.len(),
            self.tuples.len()
        );
        Ok(Relation::new(TableSchema::new(attrs), tuples))
    }

    /// Hand the relation to a caller as a query result.
    pub fn into_result(self) -> QueryResult {
        QueryResult::new(self.schema, self.tuples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::*;
    use common::{Pizza, PizzaType};

    #[test]
    fn test_from_records() {
        let data = small_data_set();
        let rel = Relation::from_records(data.pizzas.iter());
        assert_eq!(Pizza::schema(), *rel.schema());
        assert_eq!(4, rel.len());
        assert_eq!(str_field("hawaiian_m"), rel.tuples()[0].field_vals[0]);
    }

    #[test]
    fn test_order_by_stable() {
        let data = small_data_set();
        let rel = Relation::from_records(data.pizzas.iter())
            .order_by(&[SortKey::asc("size")])
            .unwrap();
        let ids = rel.column("pizza_id").unwrap();
        // L first, then the two M pizzas in input order, then S.
        assert_eq!(
            vec![
                str_field("five_cheese_l"),
                str_field("hawaiian_m"),
                str_field("classic_dlx_m"),
                str_field("hawaiian_s"),
            ],
            ids
        );

        let desc = Relation::from_records(data.pizzas.iter())
            .order_by(&[SortKey::desc("price")])
            .unwrap();
        assert_eq!(dec_field(1850), desc.tuples()[0].field_vals[3]);
    }

    #[test]
    fn test_order_by_unknown_column() {
        let data = small_data_set();
        let res = Relation::from_records(data.pizzas.iter()).order_by(&[SortKey::asc("weight")]);
        assert_eq!(Err(PizzaError::InvalidGroupKey(String::from("weight"))), res);
    }

    #[test]
    fn test_project_and_limit() {
        let data = small_data_set();
        let rel = Relation::from_records(data.pizzas.iter())
            .project(&["price", "pizza_id"])
            .unwrap()
            .limit(2);
        assert_eq!(2, rel.len());
        assert_eq!(Some(&0), rel.schema().get_field_index("price"));
        assert_eq!(str_field("classic_dlx_m"), rel.tuples()[1].field_vals[1]);
        assert!(matches!(
            rel.project(&["size"]),
            Err(PizzaError::InvalidAggregateInput(_))
        ));
    }

    #[test]
    fn test_join_on_drops_duplicate_columns() {
        let data = small_data_set();
        let pizzas = Relation::from_records(data.pizzas.iter());
        let types = Relation::from_records(data.pizza_types.iter());
        let joined = pizzas.join_on(&types, "pizza_type_id", "pizza_type_id").unwrap();
        assert_eq!(
            Pizza::schema().size() + PizzaType::schema().size() - 1,
            joined.schema().size()
        );
        assert_eq!(4, joined.len());
        let names = joined.column("name").unwrap();
        assert_eq!(str_field("The Hawaiian Pizza"), names[0]);
        assert_eq!(str_field("The Hawaiian Pizza"), names[3]);
    }

    #[test]
    fn test_with_column_and_filter() {
        let data = small_data_set();
        let rel = Relation::from_records(data.order_details.iter())
            .with_column("double_qty", DataType::Int, |t| {
                Ok(Field::IntField(t.field_vals[3].as_int().unwrap() * 2))
            })
            .unwrap();
        assert_eq!(int_field(6), rel.tuples()[3].field_vals[4]);
        let big = rel.filter(|t| t.field_vals[4] > Field::IntField(2));
        assert_eq!(3, big.len());
    }
}
