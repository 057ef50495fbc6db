//! SQL processing module
//!
//! This module provides:
//! - `parser`: SQL lexer and parser
//! - `types`: column types, values and literal coercion
//! - `schema`: table and column definitions, checked at CREATE TABLE
//! - `plan`: the fixed SELECT stage pipeline and statement nodes
//! - `executor`: one executor per plan node, plus result rendering
//! - `engine`: Table registry contract and the statement session

pub mod engine;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
