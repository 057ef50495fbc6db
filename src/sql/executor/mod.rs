use std::fmt::Display;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Catalog,
        executor::{
            agg::Aggregate,
            join::NestedLoopJoin,
            mutation::{Delete, Insert, Update},
            query::{Distinct, Filter, Limit, Offset, Order, Projection, Scan},
            schema::CreateTable,
        },
        plan::{ColumnTypes, Node},
        types::{DataType, Row},
    },
};

mod agg;
mod join;
mod mutation;
mod query;
mod schema;

/// SQL executor trait
pub trait Executor<C: Catalog> {
    fn execute(self: Box<Self>, catalog: &mut C) -> Result<ResultSet>;
}

/// Builds an executor from a plan node
///
/// The `'static` bound is required for trait object usage in recursive executor building.
impl<C: Catalog + 'static> dyn Executor<C> {
    pub fn build(node: Node) -> Box<dyn Executor<C>> {
        match node {
            Node::CreateTable { schema } => CreateTable::new(schema),
            Node::Insert {
                table_name,
                columns,
                values,
            } => Insert::new(table_name, columns, values),
            Node::Update {
                table_name,
                columns,
                where_clause,
            } => Update::new(table_name, columns, where_clause),
            Node::Delete {
                table_name,
                where_clause,
            } => Delete::new(table_name, where_clause),
            Node::Scan { table_name } => Scan::new(table_name),
            Node::NestedLoopJoin {
                source,
                table_name,
                join_type,
                left,
                right,
                right_alias,
            } => NestedLoopJoin::new(
                Self::build(*source),
                table_name,
                join_type,
                left,
                right,
                right_alias,
            ),
            Node::Filter {
                source,
                predicate,
                types,
            } => Filter::new(Self::build(*source), predicate, types),
            Node::Aggregate {
                source,
                group_by,
                exprs,
                having,
                types,
            } => Aggregate::new(Self::build(*source), group_by, exprs, having, types),
            Node::Distinct { source, on } => Distinct::new(Self::build(*source), on),
            Node::Order { source, order_by } => Order::new(Self::build(*source), order_by),
            Node::Offset { source, offset } => Offset::new(Self::build(*source), offset),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
            Node::Projection { source, exprs } => Projection::new(Self::build(*source), exprs),
        }
    }
}

/// Execution result set
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    CreateTable { table_name: String },
    Insert { count: usize },
    Scan { columns: Vec<String>, rows: Vec<Row> },
    /// Carries a snapshot of the whole table after the update
    Update {
        count: usize,
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Delete { count: usize },
}

impl ResultSet {
    /// Unwraps the rows of a `Scan` result, the only shape query stages pass along
    fn into_scan(self) -> Result<(Vec<String>, Vec<Row>)> {
        match self {
            ResultSet::Scan { columns, rows } => Ok((columns, rows)),
            _ => Err(Error::Internal("Unexpected result set".into())),
        }
    }
}

impl Display for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSet::CreateTable { table_name } => write!(f, "Table {} created", table_name),
            ResultSet::Insert { count: 1 } => write!(f, "Row inserted successfully"),
            ResultSet::Insert { count } => write!(f, "{} rows inserted successfully", count),
            ResultSet::Scan { columns, rows } => {
                write_grid(f, columns, rows)?;
                write!(f, "({} row(s))", rows.len())
            }
            ResultSet::Update { count, columns, rows } => {
                writeln!(f, "{} row(s) updated", count)?;
                write_grid(f, columns, rows)?;
                write!(f, "({} row(s))", rows.len())
            }
            ResultSet::Delete { count } => write!(f, "{} row(s) deleted", count),
        }
    }
}

/// Bordered text table, one line per row
fn write_grid(f: &mut std::fmt::Formatter<'_>, columns: &[String], rows: &[Row]) -> std::fmt::Result {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .fold(col.chars().count(), usize::max)
        })
        .collect();

    let border = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");

    writeln!(f, "+{}+", border)?;
    write_line(f, &widths, columns)?;
    writeln!(f, "+{}+", border)?;
    for row in &cells {
        write_line(f, &widths, row)?;
    }
    writeln!(f, "+{}+", border)
}

fn write_line(f: &mut std::fmt::Formatter<'_>, widths: &[usize], values: &[String]) -> std::fmt::Result {
    let padded: Vec<String> = widths
        .iter()
        .zip(values)
        .map(|(w, v)| format!(" {:<width$} ", v, width = *w))
        .collect();
    writeln!(f, "|{}|", padded.join("|"))
}

/// Position of `name` among `columns`.
///
/// Tries the exact name, then the name without its `alias.` qualifier, then
/// the single qualified column whose unqualified part is `name`.
pub fn resolve_column(columns: &[String], name: &str) -> Result<usize> {
    if let Some(pos) = columns.iter().position(|c| c == name) {
        return Ok(pos);
    }
    if let Some((_, bare)) = name.split_once('.') {
        if let Some(pos) = columns.iter().position(|c| c == bare) {
            return Ok(pos);
        }
    }
    let mut suffixed = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.split_once('.').is_some_and(|(_, bare)| bare == name));
    match (suffixed.next(), suffixed.next()) {
        (Some((pos, _)), None) => Ok(pos),
        _ => Err(Error::ColumnNotFound(name.to_string())),
    }
}

/// Declared type of the result column `name` resolves to, if known
pub fn column_type(types: &ColumnTypes, columns: &[String], name: &str) -> Option<DataType> {
    let pos = resolve_column(columns, name).ok()?;
    types.get(&columns[pos]).copied()
}
