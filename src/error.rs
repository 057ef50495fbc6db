use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

/// Custom Result type for minisql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for minisql
///
/// Every variant renders as a single line so the front end can print it and
/// carry on with the next statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Leading keyword is not CREATE/INSERT/SELECT/UPDATE/DELETE
    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),
    /// Statement text does not match the shape expected for its kind
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("table {0} already exists")]
    TableExists(String),
    #[error("table {0} does not exist")]
    TableNotFound(String),
    #[error("column {0} not found")]
    ColumnNotFound(String),
    /// INSERT did not supply a value for a declared column
    #[error("missing value for column {0}")]
    MissingColumn(String),
    #[error("primary key {column} = {value} already exists")]
    DuplicateKey { column: String, value: String },
    #[error("HAVING requires at least one aggregate column")]
    HavingRequiresAggregate,
    #[error("DELETE without WHERE is not allowed")]
    DeleteRequiresWhere,
    /// A literal could not be coerced to the declared column type
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ParseIntError> for Error {
    fn from(value: ParseIntError) -> Self {
        Error::Syntax(value.to_string())
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error::Syntax(value.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for Error {
    fn from(value: Box<bincode::ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}
