use std::{collections::BTreeMap, fmt::Display};

use crate::sql::types::DataType;

/// Abstract Syntax Tree (AST) node definitions for SQL statements
#[derive(Debug, PartialEq)]
pub enum Statement {
    /// CREATE TABLE statement
    CreateTable {
        name: String,
        columns: Vec<Column>,
        /// Table-level `PRIMARY KEY (col)` constraint
        primary_key: Option<String>,
    },
    /// INSERT statement, columns and values are paired by position
    Insert {
        table_name: String,
        columns: Vec<String>,
        values: Vec<Consts>,
    },
    /// SELECT statement
    Select {
        distinct: bool,
        /// Column-list entries, each carrying its output alias
        select: Vec<SelectItem>,
        from: FromItem,
        joins: Vec<Join>,
        where_clause: Option<ConditionGroup>,
        group_by: Option<Vec<String>>,
        having: Option<ConditionGroup>,
        order_by: Option<(String, OrderDirection)>,
        limit: Option<usize>,
        offset: Option<usize>,
    },
    /// UPDATE statement
    Update {
        table_name: String,
        columns: BTreeMap<String, Consts>,
        where_clause: Option<(String, Consts)>,
    },
    /// DELETE statement
    Delete {
        table_name: String,
        where_clause: Option<(String, Consts)>,
    },
}

/// FROM clause table reference
#[derive(Debug, PartialEq)]
pub struct FromItem {
    pub name: String,
    pub alias: Option<String>,
}

impl FromItem {
    /// The name columns of this table may be qualified with
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// `[INNER|LEFT|RIGHT|FULL] JOIN <table> [alias] ON <left> = <right>`
#[derive(Debug, PartialEq)]
pub struct Join {
    pub table: String,
    pub join_type: JoinType,
    /// Column of the accumulated left-hand result, possibly alias-qualified
    pub left: String,
    /// Column of the joined table, possibly alias-qualified
    pub right: String,
    pub left_alias: String,
    pub right_alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Whether unmatched left rows are kept
    pub fn keeps_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Whether unmatched right rows are kept
    pub fn keeps_right(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

/// Sort direction (ascending or descending)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column definition for CREATE TABLE statements
#[derive(Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub primary_key: bool,
}

/// One entry of a SELECT column list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    Star,
    /// `name [AS alias]`
    Column { name: String, alias: String },
    /// `FUNC(column) [AS alias]` or `COUNT(*) [AS alias]`
    Aggregate { aggregate: Aggregate, alias: String },
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    /// Attempts to parse a function name (case-insensitive)
    pub fn from_str(name: &str) -> Option<AggregateFunc> {
        Some(match name.to_uppercase().as_ref() {
            "COUNT" => AggregateFunc::Count,
            "SUM" => AggregateFunc::Sum,
            "AVG" => AggregateFunc::Avg,
            "MIN" => AggregateFunc::Min,
            "MAX" => AggregateFunc::Max,
            _ => return None,
        })
    }

    pub fn to_str(&self) -> &str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

/// An aggregate call, also the key of a group's aggregate context.
/// `column` is `None` for `COUNT(*)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregate {
    pub func: AggregateFunc,
    pub column: Option<String>,
}

impl Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "{}({})", self.func.to_str(), col),
            None => write!(f, "{}(*)", self.func.to_str()),
        }
    }
}

/// Left-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    /// Only meaningful in HAVING
    Aggregate(Aggregate),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Equal,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

/// `<operand> <op> <literal>`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operand: Operand,
    pub operator: Operator,
    pub value: Consts,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    /// AND: every result holds, OR: at least one does
    pub fn combine<I: IntoIterator<Item = bool>>(&self, results: I) -> bool {
        let mut results = results.into_iter();
        match self {
            Connective::And => results.all(|r| r),
            Connective::Or => results.any(|r| r),
        }
    }
}

/// Conditions joined by a single connective, no nesting
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub connective: Connective,
    pub conditions: Vec<Condition>,
}

/// Constant values in SQL statements
#[derive(Debug, PartialEq, Clone)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}
