use std::{cmp::Ordering, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::parser::ast::{Consts, Operator},
};

/// Supported column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Boolean,
}

impl DataType {
    /// Canonicalizes a raw literal into a value of this type.
    ///
    /// `NULL` stays `NULL` whatever the type. INT conversion fails fast on
    /// anything that is not a whole number; BOOLEAN is true only for `1`,
    /// `'1'` and `true`; TEXT takes the display form of the literal.
    pub fn cast(&self, raw: Value) -> Result<Value> {
        Ok(match (self, raw) {
            (_, Value::Null) => Value::Null,

            (DataType::Integer, Value::Integer(i)) => Value::Integer(i),
            (DataType::Integer, Value::Boolean(b)) => Value::Integer(b as i64),
            (DataType::Integer, Value::Float(f)) => Value::Integer(float_to_int(f)?),
            (DataType::Integer, Value::String(s)) => {
                let trimmed = s.trim();
                match trimmed.parse::<i64>() {
                    Ok(i) => Value::Integer(i),
                    Err(_) => match trimmed.parse::<f64>() {
                        Ok(f) => Value::Integer(float_to_int(f)?),
                        Err(_) => {
                            return Err(Error::InvalidValue(format!(
                                "'{}' is not a valid INT",
                                s
                            )));
                        }
                    },
                }
            }

            (DataType::Boolean, Value::Boolean(b)) => Value::Boolean(b),
            (DataType::Boolean, Value::Integer(i)) => Value::Boolean(i == 1),
            (DataType::Boolean, Value::Float(f)) => Value::Boolean(f == 1.0),
            (DataType::Boolean, Value::String(s)) => Value::Boolean(s == "1"),

            (DataType::Text, Value::String(s)) => Value::String(s),
            (DataType::Text, v) => Value::String(v.to_string()),
        })
    }
}

/// Casts with the declared type if one is known, otherwise passes the literal through.
pub fn cast_value(datatype: Option<DataType>, raw: Value) -> Result<Value> {
    match datatype {
        Some(dt) => dt.cast(raw),
        None => Ok(raw),
    }
}

/// Casts a condition literal compared against a column.
///
/// Same as `cast_value`, except that an INT column compares against a
/// fractional number as it is instead of rejecting it.
pub fn cast_comparand(datatype: Option<DataType>, raw: Value) -> Result<Value> {
    match (datatype, raw) {
        (Some(DataType::Integer), Value::Float(f)) if f.is_finite() && f.fract() != 0.0 => {
            Ok(Value::Float(f))
        }
        (Some(DataType::Integer), Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() && f.fract() != 0.0 => Ok(Value::Float(f)),
            _ => DataType::Integer.cast(Value::String(s)),
        },
        (datatype, raw) => cast_value(datatype, raw),
    }
}

fn float_to_int(f: f64) -> Result<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(Error::InvalidValue(format!("{} is not a valid INT", f)))
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataType::Integer => "INT",
            DataType::Text => "TEXT",
            DataType::Boolean => "BOOLEAN",
        })
    }
}

/// Runtime value type for rows and literals
///
/// Stored columns only ever hold `Null`, `Boolean`, `Integer` or `String`;
/// `Float` shows up in numeric literals and aggregate results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by SUM/AVG
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Evaluates `self <op> other` for a WHERE/HAVING condition.
    ///
    /// `NULL = NULL` holds, every other comparison involving `NULL` is false.
    /// Ordering operators only apply to numbers and text.
    pub fn satisfies(&self, op: &Operator, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => return *op == Operator::Equal,
            (Value::Null, _) | (_, Value::Null) => return false,
            (Value::Boolean(_), _) | (_, Value::Boolean(_)) if *op != Operator::Equal => {
                return false;
            }
            _ => {}
        }
        let Some(ord) = self.partial_cmp(other) else {
            return false;
        };
        match op {
            Operator::Equal => ord == Ordering::Equal,
            Operator::GreaterThan => ord == Ordering::Greater,
            Operator::LessThan => ord == Ordering::Less,
            Operator::GreaterThanOrEqual => ord != Ordering::Less,
            Operator::LessThanOrEqual => ord != Ordering::Greater,
        }
    }
}

impl From<Consts> for Value {
    fn from(value: Consts) -> Self {
        match value {
            Consts::Null => Value::Null,
            Consts::Boolean(b) => Value::Boolean(b),
            Consts::Integer(i) => Value::Integer(i),
            Consts::Float(f) => Value::Float(f),
            Consts::String(s) => Value::String(s),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

/// Implements partial ordering for Value comparison (used by ORDER BY, MIN/MAX)
///
/// `NULL` sorts before everything else; values of unrelated types are incomparable.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (_, _) => None,
        }
    }
}

/// A row is a vector of values, positionally matching its column list
pub type Row = Vec<Value>;
