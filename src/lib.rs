//! minisql - a small in-memory relational store driven by SQL text
//!
//! This crate provides:
//! - SQL parsing (lexer, parser, AST)
//! - Query planning and execution, including joins, grouping and HAVING
//! - Typed, schema-checked tables held entirely in memory

pub mod error;
pub mod sql;
pub mod storage;

pub use error::{Error, Result};
pub use sql::{engine::Session, executor::ResultSet};
pub use storage::MemoryCatalog;
