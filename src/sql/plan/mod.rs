use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    error::Result,
    sql::{
        engine::Catalog,
        executor::{Executor, ResultSet},
        parser::ast::{ConditionGroup, JoinType, OrderDirection, SelectItem, Statement},
        schema::Table,
        types::{DataType, Value},
    },
};

use self::planner::Planner;

mod planner;

/// Declared type of every column a node can see, keyed by result column name
pub type ColumnTypes = HashMap<String, DataType>;

/// Execution plan node
#[derive(Debug, PartialEq)]
pub enum Node {
    CreateTable {
        schema: Table,
    },
    Insert {
        table_name: String,
        columns: Vec<String>,
        values: Vec<Value>,
    },
    Update {
        table_name: String,
        columns: BTreeMap<String, Value>,
        where_clause: Option<(String, Value)>,
    },
    Delete {
        table_name: String,
        where_clause: (String, Value),
    },
    /// Full table scan, rows in insertion order
    Scan {
        table_name: String,
    },
    /// Joins the rows of `source` against every row of `table_name`
    NestedLoopJoin {
        source: Box<Node>,
        table_name: String,
        join_type: JoinType,
        left: String,
        right: String,
        right_alias: String,
    },
    Filter {
        source: Box<Node>,
        predicate: ConditionGroup,
        types: ColumnTypes,
    },
    /// Collapses rows into one row per group, or a single row if `group_by` is empty
    Aggregate {
        source: Box<Node>,
        group_by: Vec<String>,
        /// Select list the output row is laid out from
        exprs: Vec<SelectItem>,
        having: Option<ConditionGroup>,
        types: ColumnTypes,
    },
    /// Drops rows equal to an earlier row on `on`, or on every column when `None`
    Distinct {
        source: Box<Node>,
        on: Option<Vec<String>>,
    },
    Order {
        source: Box<Node>,
        order_by: (String, OrderDirection),
    },
    Offset {
        source: Box<Node>,
        offset: usize,
    },
    Limit {
        source: Box<Node>,
        limit: usize,
    },
    Projection {
        source: Box<Node>,
        exprs: Vec<SelectItem>,
    },
}

/// Execution plan, the root node of a plan tree
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    /// Builds a plan for `stmt`, reading table schemas from `catalog`
    pub fn build<C: Catalog>(stmt: Statement, catalog: &C) -> Result<Self> {
        let plan = Planner::new(catalog).build(stmt)?;
        debug!("built plan {:?}", plan);
        Ok(plan)
    }

    pub fn execute<C: Catalog + 'static>(self, catalog: &mut C) -> Result<ResultSet> {
        <dyn Executor<C>>::build(self.0).execute(catalog)
    }
}
