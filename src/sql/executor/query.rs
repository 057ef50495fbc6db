use std::{cmp::Ordering, collections::HashSet};

use log::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Catalog,
        executor::{ResultSet, resolve_column},
        parser::ast::{ConditionGroup, Operand, Operator, OrderDirection, SelectItem},
        plan::ColumnTypes,
        types::{Value, cast_comparand},
    },
};

use super::Executor;

/// Table scan executor (SELECT)
pub struct Scan {
    table_name: String,
}

impl Scan {
    pub fn new(table_name: String) -> Box<Self> {
        Box::new(Self { table_name })
    }
}

impl<C: Catalog> Executor<C> for Scan {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let table = catalog.must_get_table(&self.table_name)?;
        Ok(ResultSet::Scan {
            columns: table.schema().column_names(),
            rows: table.select_all().to_vec(),
        })
    }
}

/// WHERE executor - keeps the rows the condition group holds for
pub struct Filter<C: Catalog> {
    source: Box<dyn Executor<C>>,
    predicate: ConditionGroup,
    types: ColumnTypes,
}

impl<C: Catalog> Filter<C> {
    pub fn new(
        source: Box<dyn Executor<C>>,
        predicate: ConditionGroup,
        types: ColumnTypes,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            predicate,
            types,
        })
    }
}

impl<C: Catalog> Executor<C> for Filter<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, rows) = self.source.execute(catalog)?.into_scan()?;

        // Resolve each condition once: column position and the literal cast
        // to that column's declared type
        let mut bound: Vec<(usize, Operator, Value)> = Vec::new();
        for cond in &self.predicate.conditions {
            let Operand::Column(name) = &cond.operand else {
                return Err(Error::Internal(format!(
                    "unexpected aggregate in WHERE: {:?}",
                    cond.operand
                )));
            };
            let pos = resolve_column(&columns, name)?;
            let datatype = self.types.get(&columns[pos]).copied();
            bound.push((pos, cond.operator, cast_comparand(datatype, cond.value.clone().into())?));
        }

        let total = rows.len();
        let rows: Vec<_> = rows
            .into_iter()
            .filter(|row| {
                self.predicate.connective.combine(
                    bound
                        .iter()
                        .map(|(pos, op, value)| row[*pos].satisfies(op, value)),
                )
            })
            .collect();
        debug!("filter kept {} of {} rows", rows.len(), total);
        Ok(ResultSet::Scan { columns, rows })
    }
}

/// DISTINCT executor - keeps the first occurrence of each distinct row
pub struct Distinct<C: Catalog> {
    source: Box<dyn Executor<C>>,
    on: Option<Vec<String>>,
}

impl<C: Catalog> Distinct<C> {
    pub fn new(source: Box<dyn Executor<C>>, on: Option<Vec<String>>) -> Box<Self> {
        Box::new(Self { source, on })
    }
}

impl<C: Catalog> Executor<C> for Distinct<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, rows) = self.source.execute(catalog)?.into_scan()?;
        let positions = match &self.on {
            Some(on) => on
                .iter()
                .map(|name| resolve_column(&columns, name))
                .collect::<Result<Vec<_>>>()?,
            None => (0..columns.len()).collect(),
        };

        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for row in rows {
            let key: Vec<&Value> = positions.iter().map(|pos| &row[*pos]).collect();
            if seen.insert(bincode::serialize(&key)?) {
                distinct.push(row);
            }
        }
        Ok(ResultSet::Scan {
            columns,
            rows: distinct,
        })
    }
}

/// ORDER BY executor - stable sort on a single column
pub struct Order<C: Catalog> {
    source: Box<dyn Executor<C>>,
    order_by: (String, OrderDirection),
}

impl<C: Catalog> Order<C> {
    pub fn new(source: Box<dyn Executor<C>>, order_by: (String, OrderDirection)) -> Box<Self> {
        Box::new(Self { source, order_by })
    }
}

impl<C: Catalog> Executor<C> for Order<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, mut rows) = self.source.execute(catalog)?.into_scan()?;
        let (name, direction) = &self.order_by;
        let pos = resolve_column(&columns, name)?;

        // NULL sorts lowest; incomparable values keep their relative order
        rows.sort_by(|a, b| {
            let ord = a[pos].partial_cmp(&b[pos]).unwrap_or(Ordering::Equal);
            match direction {
                OrderDirection::Asc => ord,
                OrderDirection::Desc => ord.reverse(),
            }
        });
        Ok(ResultSet::Scan { columns, rows })
    }
}

/// LIMIT executor - restricts the number of rows returned
pub struct Limit<C: Catalog> {
    source: Box<dyn Executor<C>>,
    limit: usize,
}

impl<C: Catalog> Limit<C> {
    pub fn new(source: Box<dyn Executor<C>>, limit: usize) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl<C: Catalog> Executor<C> for Limit<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, rows) = self.source.execute(catalog)?.into_scan()?;
        Ok(ResultSet::Scan {
            columns,
            rows: rows.into_iter().take(self.limit).collect(),
        })
    }
}

/// OFFSET executor - skips the first N rows
pub struct Offset<C: Catalog> {
    source: Box<dyn Executor<C>>,
    offset: usize,
}

impl<C: Catalog> Offset<C> {
    pub fn new(source: Box<dyn Executor<C>>, offset: usize) -> Box<Self> {
        Box::new(Self { source, offset })
    }
}

impl<C: Catalog> Executor<C> for Offset<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, rows) = self.source.execute(catalog)?.into_scan()?;
        Ok(ResultSet::Scan {
            columns,
            rows: rows.into_iter().skip(self.offset).collect(),
        })
    }
}

/// Projection executor - keeps the selected columns under their aliases,
/// in select-list order
pub struct Projection<C: Catalog> {
    source: Box<dyn Executor<C>>,
    exprs: Vec<SelectItem>,
}

impl<C: Catalog> Projection<C> {
    pub fn new(source: Box<dyn Executor<C>>, exprs: Vec<SelectItem>) -> Box<Self> {
        Box::new(Self { source, exprs })
    }
}

impl<C: Catalog> Executor<C> for Projection<C> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet> {
        let (columns, rows) = self.source.execute(catalog)?.into_scan()?;

        let mut positions = Vec::new();
        let mut new_cols = Vec::new();
        for item in &self.exprs {
            match item {
                SelectItem::Star => {
                    positions.extend(0..columns.len());
                    new_cols.extend(columns.iter().cloned());
                }
                SelectItem::Column { name, alias } => {
                    positions.push(resolve_column(&columns, name)?);
                    new_cols.push(alias.clone());
                }
                SelectItem::Aggregate { alias, .. } => {
                    return Err(Error::Internal(format!(
                        "aggregate {} reached projection",
                        alias
                    )));
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| positions.iter().map(|pos| row[*pos].clone()).collect())
            .collect();
        Ok(ResultSet::Scan {
            columns: new_cols,
            rows,
        })
    }
}
