use std::collections::HashMap;

use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Catalog,
        executor::{ResultSet, column_type, resolve_column},
        parser::ast::{self, AggregateFunc, ConditionGroup, Operand, Operator, SelectItem},
        plan::ColumnTypes,
        types::{DataType, Row, Value, cast_comparand},
    },
};

use super::Executor;

/// Aggregate executor - computes COUNT, SUM, AVG, MIN and MAX, optionally per group
///
/// Without GROUP BY every input row falls into one group and exactly one row
/// is produced. With GROUP BY, groups appear in order of first appearance.
/// Output columns follow the select list: grouped columns and aggregates
/// under their aliases, `*` standing for the GROUP BY columns.
pub struct Aggregate<C: Catalog> {
    source: Box<dyn Executor<C>>,
    group_by: Vec<String>,
    exprs: Vec<SelectItem>,
    having: Option<ConditionGroup>,
    types: ColumnTypes,
}

impl<C: Catalog> Aggregate<C> {
    pub fn new(
        source: Box<dyn Executor<C>>,
        group_by: Vec<String>,
        exprs: Vec<SelectItem>,
        having: Option<ConditionGroup>,
        types: ColumnTypes,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            group_by,
            exprs,
            having,
            types,
        })
    }
}

/// Where a value of an output row or HAVING condition comes from
#[derive(Clone)]
enum Target {
    Aggregate(ast::Aggregate),
    /// Source column position, read from the group's first row
    Column(usize),
}

/// One output column: name, value source and declared type
type Field = (String, Target, Option<DataType>);

impl<C: Catalog> Executor<C> for Aggregate<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, rows) = self.source.execute(catalog)?.into_scan()?;

        let group_pos = self
            .group_by
            .iter()
            .map(|name| resolve_column(&columns, name))
            .collect::<Result<Vec<_>>>()?;
        let fields = output_fields(&self.exprs, &self.group_by, &group_pos, &columns, &self.types)?;

        let having = match &self.having {
            Some(group) => Some(bind_having(group, &fields, &group_pos, &columns, &self.types)?),
            None => None,
        };

        // Every aggregate to compute: the selected ones plus any HAVING uses
        let mut needed: Vec<&ast::Aggregate> = Vec::new();
        let having_targets = having.iter().flat_map(|(_, bound)| bound.iter().map(|(t, _, _)| t));
        for target in fields.iter().map(|(_, t, _)| t).chain(having_targets) {
            if let Target::Aggregate(agg) = target {
                if !needed.contains(&agg) {
                    needed.push(agg);
                }
            }
        }
        let calculators = needed
            .into_iter()
            .map(|agg| -> Result<_> {
                let pos = agg
                    .column
                    .as_ref()
                    .map(|col| resolve_column(&columns, col))
                    .transpose()?;
                Ok((agg.clone(), <dyn Calculator>::build(&agg.func), pos))
            })
            .collect::<Result<Vec<_>>>()?;

        let groups = if group_pos.is_empty() {
            vec![rows.iter().collect::<Vec<_>>()]
        } else {
            group_rows(&rows, &group_pos)?
        };

        let mut new_rows = Vec::new();
        for group in &groups {
            let mut context = HashMap::new();
            for (agg, calculator, pos) in &calculators {
                context.insert(agg.clone(), calculator.calc(*pos, group)?);
            }
            let value_of = |target: &Target| match target {
                Target::Aggregate(agg) => context.get(agg).cloned().unwrap_or(Value::Null),
                Target::Column(pos) => group.first().map_or(Value::Null, |row| row[*pos].clone()),
            };

            if let Some((group_cond, bound)) = &having {
                let holds = group_cond.connective.combine(
                    bound
                        .iter()
                        .map(|(target, op, value)| value_of(target).satisfies(op, value)),
                );
                if !holds {
                    continue;
                }
            }
            new_rows.push(fields.iter().map(|(_, target, _)| value_of(target)).collect::<Row>());
        }

        debug!(
            "aggregated {} rows into {} groups, {} kept",
            rows.len(),
            groups.len(),
            new_rows.len()
        );
        Ok(ResultSet::Scan {
            columns: fields.into_iter().map(|(name, _, _)| name).collect(),
            rows: new_rows,
        })
    }
}

/// Lays out the output columns in select-list order. A plain column must be
/// one of the GROUP BY columns.
fn output_fields(
    exprs: &[SelectItem],
    group_by: &[String],
    group_pos: &[usize],
    columns: &[String],
    types: &ColumnTypes,
) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    for item in exprs {
        match item {
            SelectItem::Star => {
                for (name, pos) in group_by.iter().zip(group_pos) {
                    fields.push((name.clone(), Target::Column(*pos), column_type(types, columns, name)));
                }
            }
            SelectItem::Column { name, alias } => {
                let pos = resolve_column(columns, name)?;
                if !group_pos.contains(&pos) {
                    return Err(Error::Syntax(format!(
                        "column {} must appear in GROUP BY or inside an aggregate",
                        name
                    )));
                }
                fields.push((alias.clone(), Target::Column(pos), column_type(types, columns, name)));
            }
            SelectItem::Aggregate { aggregate, alias } => fields.push((
                alias.clone(),
                Target::Aggregate(aggregate.clone()),
                aggregate_type(aggregate, types, columns),
            )),
        }
    }
    Ok(fields)
}

/// Resolves each HAVING condition to the value it reads, casting its literal
/// to that value's type when known.
///
/// `FUNC(col)` reads the aggregate context. A plain name reads the output
/// field of that name, or else a GROUP BY column by its source name.
fn bind_having<'a>(
    group: &'a ConditionGroup,
    fields: &[Field],
    group_pos: &[usize],
    columns: &[String],
    types: &ColumnTypes,
) -> Result<(&'a ConditionGroup, Vec<(Target, Operator, Value)>)> {
    let names: Vec<String> = fields.iter().map(|(name, _, _)| name.clone()).collect();
    let mut bound = Vec::new();
    for cond in &group.conditions {
        let (target, datatype) = match &cond.operand {
            Operand::Aggregate(agg) => (
                Target::Aggregate(agg.clone()),
                aggregate_type(agg, types, columns),
            ),
            Operand::Column(name) => match resolve_column(&names, name) {
                Ok(i) => (fields[i].1.clone(), fields[i].2),
                Err(err) => {
                    let pos = resolve_column(columns, name).map_err(|_| err.clone())?;
                    if !group_pos.contains(&pos) {
                        return Err(err);
                    }
                    (Target::Column(pos), column_type(types, columns, name))
                }
            },
        };
        bound.push((target, cond.operator, cast_comparand(datatype, cond.value.clone().into())?));
    }
    Ok((group, bound))
}

/// Partitions rows by the values at `positions`, groups in order of first appearance
fn group_rows<'a>(rows: &'a [Row], positions: &[usize]) -> Result<Vec<Vec<&'a Row>>> {
    let mut index: HashMap<Vec<u8>, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Row>> = Vec::new();
    for row in rows {
        let key: Vec<&Value> = positions.iter().map(|p| &row[*p]).collect();
        let key = bincode::serialize(&key)?;
        match index.get(&key) {
            Some(i) => groups[*i].push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row]);
            }
        }
    }
    Ok(groups)
}

/// Type a literal compared with this aggregate is cast to.
/// MIN/MAX keep their column's type, the numeric aggregates compare as is.
fn aggregate_type(agg: &ast::Aggregate, types: &ColumnTypes, columns: &[String]) -> Option<DataType> {
    match agg.func {
        AggregateFunc::Min | AggregateFunc::Max => {
            column_type(types, columns, agg.column.as_deref()?)
        }
        _ => None,
    }
}

/// Trait for aggregate function calculations
///
/// `pos` is the argument column, `None` for `COUNT(*)`.
pub trait Calculator {
    fn calc(&self, pos: Option<usize>, rows: &[&Row]) -> Result<Value>;
}

impl dyn Calculator {
    /// Runtime dispatch to appropriate calculator based on function
    pub fn build(func: &AggregateFunc) -> Box<dyn Calculator> {
        match func {
            AggregateFunc::Count => Count::new(),
            AggregateFunc::Sum => Sum::new(),
            AggregateFunc::Avg => Avg::new(),
            AggregateFunc::Min => Min::new(),
            AggregateFunc::Max => Max::new(),
        }
    }
}

/// Non-null values of the argument column
fn non_null<'a>(pos: Option<usize>, rows: &[&'a Row]) -> Result<Vec<&'a Value>> {
    let pos = pos.ok_or_else(|| Error::Internal("aggregate needs a column argument".into()))?;
    Ok(rows.iter().map(|row| &row[pos]).filter(|v| !v.is_null()).collect())
}

/// Numeric view of the argument column, fails on text and booleans
fn numbers(pos: Option<usize>, rows: &[&Row]) -> Result<Vec<Value>> {
    non_null(pos, rows)?
        .into_iter()
        .map(|v| match v {
            Value::Integer(_) | Value::Float(_) => Ok(v.clone()),
            _ => Err(Error::InvalidValue(format!("{} is not numeric", v))),
        })
        .collect()
}

/// COUNT - counts rows for `*`, non-null values otherwise
pub struct Count;

impl Count {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Count {
    fn calc(&self, pos: Option<usize>, rows: &[&Row]) -> Result<Value> {
        let count = match pos {
            None => rows.len(),
            Some(_) => non_null(pos, rows)?.len(),
        };
        Ok(Value::Integer(count as i64))
    }
}

/// MIN - smallest non-null value, NULL if there is none
pub struct Min;

impl Min {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Min {
    fn calc(&self, pos: Option<usize>, rows: &[&Row]) -> Result<Value> {
        Ok(extreme(non_null(pos, rows)?, std::cmp::Ordering::Less))
    }
}

/// MAX - largest non-null value, NULL if there is none
pub struct Max;

impl Max {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Max {
    fn calc(&self, pos: Option<usize>, rows: &[&Row]) -> Result<Value> {
        Ok(extreme(non_null(pos, rows)?, std::cmp::Ordering::Greater))
    }
}

/// First value that no later value beats in direction `wins`
fn extreme(values: Vec<&Value>, wins: std::cmp::Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for v in values {
        match best {
            Some(b) if v.partial_cmp(b) != Some(wins) => {}
            _ => best = Some(v),
        }
    }
    best.cloned().unwrap_or(Value::Null)
}

/// SUM - integer sum unless a float is involved, 0 over no values
pub struct Sum;

impl Sum {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Sum {
    fn calc(&self, pos: Option<usize>, rows: &[&Row]) -> Result<Value> {
        let mut sum = Value::Integer(0);
        for v in numbers(pos, rows)? {
            sum = match (sum, v) {
                (Value::Integer(a), Value::Integer(b)) => match a.checked_add(b) {
                    Some(s) => Value::Integer(s),
                    None => Value::Float(a as f64 + b as f64),
                },
                (a, b) => Value::Float(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
            };
        }
        Ok(sum)
    }
}

/// AVG - mean of the non-null values, NULL over no values
pub struct Avg;

impl Avg {
    fn new() -> Box<Self> {
        Box::new(Self {})
    }
}

impl Calculator for Avg {
    fn calc(&self, pos: Option<usize>, rows: &[&Row]) -> Result<Value> {
        let values = numbers(pos, rows)?;
        if values.is_empty() {
            return Ok(Value::Null);
        }
        let total: f64 = values.iter().filter_map(Value::as_f64).sum();
        Ok(Value::Float(total / values.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::Calculator;
    use crate::{
        error::{Error, Result},
        sql::{
            parser::ast::AggregateFunc,
            types::{Row, Value},
        },
    };

    fn rows() -> Vec<Row> {
        vec![
            vec![Value::String("a".into()), Value::Integer(4)],
            vec![Value::String("b".into()), Value::Null],
            vec![Value::String("c".into()), Value::Integer(1)],
            vec![Value::Null, Value::Integer(7)],
        ]
    }

    fn calc(func: AggregateFunc, pos: Option<usize>, rows: &[Row]) -> Result<Value> {
        let refs: Vec<&Row> = rows.iter().collect();
        <dyn Calculator>::build(&func).calc(pos, &refs)
    }

    #[test]
    fn test_calculators() -> Result<()> {
        let rows = rows();
        assert_eq!(calc(AggregateFunc::Count, None, &rows)?, Value::Integer(4));
        assert_eq!(calc(AggregateFunc::Count, Some(1), &rows)?, Value::Integer(3));
        assert_eq!(calc(AggregateFunc::Sum, Some(1), &rows)?, Value::Integer(12));
        assert_eq!(calc(AggregateFunc::Avg, Some(1), &rows)?, Value::Float(4.0));
        assert_eq!(calc(AggregateFunc::Min, Some(1), &rows)?, Value::Integer(1));
        assert_eq!(calc(AggregateFunc::Max, Some(1), &rows)?, Value::Integer(7));
        assert_eq!(calc(AggregateFunc::Min, Some(0), &rows)?, Value::String("a".into()));
        assert_eq!(calc(AggregateFunc::Max, Some(0), &rows)?, Value::String("c".into()));
        assert!(matches!(calc(AggregateFunc::Sum, Some(0), &rows), Err(Error::InvalidValue(_))));
        Ok(())
    }

    #[test]
    fn test_calculators_over_no_values() -> Result<()> {
        let empty: Vec<Row> = Vec::new();
        assert_eq!(calc(AggregateFunc::Count, None, &empty)?, Value::Integer(0));
        assert_eq!(calc(AggregateFunc::Sum, Some(1), &empty)?, Value::Integer(0));
        assert_eq!(calc(AggregateFunc::Avg, Some(1), &empty)?, Value::Null);
        assert_eq!(calc(AggregateFunc::Min, Some(1), &empty)?, Value::Null);
        assert_eq!(calc(AggregateFunc::Max, Some(1), &empty)?, Value::Null);

        let nulls = vec![vec![Value::Null], vec![Value::Null]];
        assert_eq!(calc(AggregateFunc::Count, Some(0), &nulls)?, Value::Integer(0));
        assert_eq!(calc(AggregateFunc::Count, None, &nulls)?, Value::Integer(2));
        assert_eq!(calc(AggregateFunc::Sum, Some(0), &nulls)?, Value::Integer(0));
        Ok(())
    }

    #[test]
    fn test_sum_with_floats() -> Result<()> {
        let rows = vec![vec![Value::Integer(1)], vec![Value::Float(0.5)]];
        assert_eq!(calc(AggregateFunc::Sum, Some(0), &rows)?, Value::Float(1.5));
        Ok(())
    }
}
