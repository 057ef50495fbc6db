use std::collections::BTreeMap;
use std::iter::Peekable;

use log::debug;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{
    Aggregate, AggregateFunc, Column, Condition, ConditionGroup, Connective, Consts, FromItem,
    Join, JoinType, Operand, Operator, OrderDirection, SelectItem,
};
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::sql::types::DataType;

pub mod ast;
mod lexer;

/// SQL Parser - Converts tokens into Abstract Syntax Tree (AST)
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given SQL input
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses the input SQL statement into an AST.
    /// A single trailing semicolon is optional.
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_if_token(Token::Semicolon);
        // No tokens allowed after the statement
        if let Some(token) = self.peek()? {
            return Err(Error::Syntax(format!("[Parser] Unexpected token {}", token)));
        }
        debug!("parsed statement {:?}", stmt);
        Ok(stmt)
    }

    /// Parses a statement based on the first token
    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Create)) => self.parse_ddl(),
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(t) => Err(Error::UnsupportedStatement(t.to_string())),
            None => Err(Error::UnsupportedStatement("empty statement".into())),
        }
    }

    /// Parses DDL statements (CREATE TABLE)
    fn parse_ddl(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Create))?;
        match self.next()? {
            Token::Keyword(Keyword::Table) => self.parse_ddl_create_table(),
            token => Err(Error::Syntax(format!("[Parser] Unexpected token {}", token))),
        }
    }

    /// Parses CREATE TABLE statement
    fn parse_ddl_create_table(&mut self) -> Result<ast::Statement> {
        let table_name = self.next_ident()?;
        self.next_expect(Token::OpenParen)?;

        let mut columns = Vec::new();
        let mut primary_key = None;
        loop {
            // Table-level constraint: PRIMARY KEY (col)
            if self.next_if_token(Token::Keyword(Keyword::Primary)).is_some() {
                self.next_expect(Token::Keyword(Keyword::Key))?;
                self.next_expect(Token::OpenParen)?;
                let col = self.next_ident()?;
                self.next_expect(Token::CloseParen)?;
                if primary_key.replace(col).is_some() {
                    return Err(Error::Syntax(
                        "[Parser] Multiple PRIMARY KEY constraints".into(),
                    ));
                }
            } else {
                columns.push(self.parse_ddl_column()?);
            }
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        self.next_expect(Token::CloseParen)?;
        Ok(ast::Statement::CreateTable {
            name: table_name,
            columns,
            primary_key,
        })
    }

    /// Parses column definition in CREATE TABLE
    fn parse_ddl_column(&mut self) -> Result<ast::Column> {
        let name = self.next_ident()?;
        let datatype = match self.next()? {
            Token::Keyword(Keyword::Int) | Token::Keyword(Keyword::Integer) => DataType::Integer,
            Token::Keyword(Keyword::Bool) | Token::Keyword(Keyword::Boolean) => DataType::Boolean,
            Token::Keyword(Keyword::String)
            | Token::Keyword(Keyword::Text)
            | Token::Keyword(Keyword::Varchar) => DataType::Text,
            token => return Err(Error::Syntax(format!("[Parser] Unexpected token {}", token))),
        };
        let primary_key = if self.next_if_token(Token::Keyword(Keyword::Primary)).is_some() {
            self.next_expect(Token::Keyword(Keyword::Key))?;
            true
        } else {
            false
        };
        Ok(Column {
            name,
            datatype,
            primary_key,
        })
    }

    /// Parses SELECT statement, clauses are accepted in their fixed order only
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;
        let distinct = self.next_if_token(Token::Keyword(Keyword::Distinct)).is_some();

        let mut select = Vec::new();
        loop {
            select.push(self.parse_select_item()?);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }

        self.next_expect(Token::Keyword(Keyword::From))?;
        let from = FromItem {
            name: self.next_ident()?,
            alias: self.parse_table_alias()?,
        };
        let joins = self.parse_joins(from.qualifier())?;

        let where_clause = match self.next_if_token(Token::Keyword(Keyword::Where)) {
            Some(_) => Some(self.parse_condition_group()?),
            None => None,
        };

        let group_by = if self.next_if_token(Token::Keyword(Keyword::Group)).is_some() {
            self.next_expect(Token::Keyword(Keyword::By))?;
            let mut cols = Vec::new();
            loop {
                cols.push(self.parse_column_ref()?);
                if self.next_if_token(Token::Comma).is_none() {
                    break;
                }
            }
            Some(cols)
        } else {
            None
        };

        let having = match self.next_if_token(Token::Keyword(Keyword::Having)) {
            Some(_) => Some(self.parse_condition_group()?),
            None => None,
        };

        let order_by = if self.next_if_token(Token::Keyword(Keyword::Order)).is_some() {
            self.next_expect(Token::Keyword(Keyword::By))?;
            let col = self.parse_column_ref()?;
            let direction = match self.next_if(|t| {
                matches!(t, Token::Keyword(Keyword::Asc) | Token::Keyword(Keyword::Desc))
            }) {
                Some(Token::Keyword(Keyword::Desc)) => OrderDirection::Desc,
                _ => OrderDirection::Asc,
            };
            Some((col, direction))
        } else {
            None
        };

        let limit = match self.next_if_token(Token::Keyword(Keyword::Limit)) {
            Some(_) => Some(self.parse_count()?),
            None => None,
        };
        let offset = match self.next_if_token(Token::Keyword(Keyword::Offset)) {
            Some(_) => Some(self.parse_count()?),
            None => None,
        };

        Ok(ast::Statement::Select {
            distinct,
            select,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    /// Parses `*`, `FUNC(col|*) [AS alias]` or `col [AS alias]`
    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.next_if_token(Token::Asterisk).is_some() {
            return Ok(SelectItem::Star);
        }
        let name = self.next_ident()?;
        if self.next_if_token(Token::OpenParen).is_some() {
            let (aggregate, text) = self.parse_aggregate_call(&name)?;
            let alias = self.parse_column_alias()?.unwrap_or(text);
            return Ok(SelectItem::Aggregate { aggregate, alias });
        }
        let name = self.parse_qualified(name)?;
        let alias = self.parse_column_alias()?.unwrap_or_else(|| name.clone());
        Ok(SelectItem::Column { name, alias })
    }

    /// Parses the argument of an aggregate call whose name and `(` were consumed.
    /// Also returns the call as written, used as the default alias.
    fn parse_aggregate_call(&mut self, name: &str) -> Result<(Aggregate, String)> {
        let func = AggregateFunc::from_str(name)
            .ok_or_else(|| Error::Syntax(format!("[Parser] Unknown function {}", name)))?;
        let column = match self.next_if_token(Token::Asterisk) {
            Some(_) if func == AggregateFunc::Count => None,
            Some(_) => {
                return Err(Error::Syntax(format!(
                    "[Parser] {}(*) is not supported",
                    func.to_str()
                )));
            }
            None => Some(self.parse_column_ref()?),
        };
        self.next_expect(Token::CloseParen)?;
        let text = match &column {
            Some(col) => format!("{}({})", name, col),
            None => "COUNT(*)".to_string(),
        };
        Ok((Aggregate { func, column }, text))
    }

    /// `AS alias`
    fn parse_column_alias(&mut self) -> Result<Option<String>> {
        match self.next_if_token(Token::Keyword(Keyword::As)) {
            Some(_) => Ok(Some(self.next_ident()?)),
            None => Ok(None),
        }
    }

    /// `[AS] alias` after a table name
    fn parse_table_alias(&mut self) -> Result<Option<String>> {
        if self.next_if_token(Token::Keyword(Keyword::As)).is_some() {
            return Ok(Some(self.next_ident()?));
        }
        Ok(match self.next_if(|t| matches!(t, Token::Ident(_))) {
            Some(Token::Ident(alias)) => Some(alias),
            _ => None,
        })
    }

    /// Parses a chain of JOIN clauses following the FROM table
    fn parse_joins(&mut self, left_alias: &str) -> Result<Vec<Join>> {
        let mut joins = Vec::new();
        loop {
            let join_type = match self.peek()? {
                Some(Token::Keyword(Keyword::Join)) => JoinType::Inner,
                Some(Token::Keyword(Keyword::Inner)) => {
                    self.next()?;
                    JoinType::Inner
                }
                Some(Token::Keyword(Keyword::Left)) => {
                    self.next()?;
                    self.next_if_token(Token::Keyword(Keyword::Outer));
                    JoinType::Left
                }
                Some(Token::Keyword(Keyword::Right)) => {
                    self.next()?;
                    self.next_if_token(Token::Keyword(Keyword::Outer));
                    JoinType::Right
                }
                Some(Token::Keyword(Keyword::Full)) => {
                    self.next()?;
                    self.next_if_token(Token::Keyword(Keyword::Outer));
                    JoinType::Full
                }
                _ => break,
            };
            self.next_expect(Token::Keyword(Keyword::Join))?;

            let table = self.next_ident()?;
            let right_alias = self.parse_table_alias()?.unwrap_or_else(|| table.clone());
            self.next_expect(Token::Keyword(Keyword::On))?;
            let mut left = self.parse_column_ref()?;
            self.next_expect(Token::Equal)?;
            let mut right = self.parse_column_ref()?;

            // ON may name the joined table's column first
            if qualifier_of(&left) == Some(right_alias.as_str())
                && qualifier_of(&right) != Some(right_alias.as_str())
            {
                std::mem::swap(&mut left, &mut right);
            }

            joins.push(Join {
                table,
                join_type,
                left,
                right,
                left_alias: left_alias.to_string(),
                right_alias,
            });
        }
        Ok(joins)
    }

    /// Parses conditions joined by a single connective; mixing AND and OR is rejected
    fn parse_condition_group(&mut self) -> Result<ConditionGroup> {
        let mut conditions = vec![self.parse_condition()?];
        let mut connective = None;
        while let Some(token) = self.next_if(|t| {
            matches!(t, Token::Keyword(Keyword::And) | Token::Keyword(Keyword::Or))
        }) {
            let next = match token {
                Token::Keyword(Keyword::Or) => Connective::Or,
                _ => Connective::And,
            };
            match connective {
                Some(c) if c != next => {
                    return Err(Error::Syntax(
                        "[Parser] Mixing AND and OR in one clause is not supported".into(),
                    ));
                }
                _ => connective = Some(next),
            }
            conditions.push(self.parse_condition()?);
        }
        Ok(ConditionGroup {
            connective: connective.unwrap_or(Connective::And),
            conditions,
        })
    }

    /// Parses `<column|FUNC(column)> <op> <literal>`
    fn parse_condition(&mut self) -> Result<Condition> {
        let name = self.next_ident()?;
        let operand = if self.next_if_token(Token::OpenParen).is_some() {
            Operand::Aggregate(self.parse_aggregate_call(&name)?.0)
        } else {
            Operand::Column(self.parse_qualified(name)?)
        };
        let operator = match self.next()? {
            Token::Equal => Operator::Equal,
            Token::GreaterThan => Operator::GreaterThan,
            Token::LessThan => Operator::LessThan,
            Token::GreaterThanOrEqual => Operator::GreaterThanOrEqual,
            Token::LessThanOrEqual => Operator::LessThanOrEqual,
            token => {
                return Err(Error::Syntax(format!(
                    "[Parser] Expected comparison operator, got {}",
                    token
                )));
            }
        };
        let value = self.parse_literal(true)?;
        Ok(Condition {
            operand,
            operator,
            value,
        })
    }

    /// Parses INSERT statement
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Insert))?;
        self.next_expect(Token::Keyword(Keyword::Into))?;

        let table_name = self.next_ident()?;

        self.next_expect(Token::OpenParen)?;
        let mut columns: Vec<String> = Vec::new();
        loop {
            let col = self.next_ident()?;
            if columns.contains(&col) {
                return Err(Error::Syntax(format!(
                    "[Parser] Duplicate column {} for insert",
                    col
                )));
            }
            columns.push(col);
            match self.next()? {
                Token::CloseParen => break,
                Token::Comma => {}
                token => {
                    return Err(Error::Syntax(format!("[Parser] Unexpected token {}", token)));
                }
            }
        }

        self.next_expect(Token::Keyword(Keyword::Values))?;
        self.next_expect(Token::OpenParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal(false)?);
            match self.next()? {
                Token::CloseParen => break,
                Token::Comma => {}
                token => {
                    return Err(Error::Syntax(format!("[Parser] Unexpected token {}", token)));
                }
            }
        }

        if columns.len() != values.len() {
            return Err(Error::Syntax(format!(
                "[Parser] {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(ast::Statement::Insert {
            table_name,
            columns,
            values,
        })
    }

    /// Parses UPDATE statement
    fn parse_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Update))?;
        let table_name = self.next_ident()?;
        self.next_expect(Token::Keyword(Keyword::Set))?;

        let mut columns = BTreeMap::new();
        loop {
            let col = self.next_ident()?;
            self.next_expect(Token::Equal)?;
            let value = self.parse_literal(true)?;
            // The same column may only be assigned once
            if columns.contains_key(&col) {
                return Err(Error::Syntax(format!(
                    "[Parser] Duplicate column {} for update",
                    col
                )));
            }
            columns.insert(col, value);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        Ok(ast::Statement::Update {
            table_name,
            columns,
            where_clause: self.parse_where_clause()?,
        })
    }

    /// Parses DELETE statement, a missing WHERE is rejected at execution
    fn parse_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Delete))?;
        self.next_expect(Token::Keyword(Keyword::From))?;
        let table_name = self.next_ident()?;
        Ok(ast::Statement::Delete {
            table_name,
            where_clause: self.parse_where_clause()?,
        })
    }

    /// Parses a literal.
    ///
    /// Quoted text, numbers and `null`/`undefined` are always accepted;
    /// `true`/`false` only where `allow_bool` is set.
    fn parse_literal(&mut self, allow_bool: bool) -> Result<Consts> {
        Ok(match self.next()? {
            Token::String(s) => Consts::String(s),
            Token::Number(n) => parse_number(&n)?,
            Token::Minus => match self.next()? {
                Token::Number(n) => parse_number(&format!("-{}", n))?,
                token => {
                    return Err(Error::Syntax(format!("[Parser] Invalid value -{}", token)));
                }
            },
            Token::Keyword(Keyword::Null) => Consts::Null,
            Token::Ident(ident) if ident.eq_ignore_ascii_case("undefined") => Consts::Null,
            Token::Keyword(Keyword::True) if allow_bool => Consts::Boolean(true),
            Token::Keyword(Keyword::False) if allow_bool => Consts::Boolean(false),
            token => return Err(Error::Syntax(format!("[Parser] Invalid value {}", token))),
        })
    }

    /// Parses a LIMIT/OFFSET count
    fn parse_count(&mut self) -> Result<usize> {
        match self.next()? {
            Token::Number(n) if n.chars().all(|c| c.is_ascii_digit()) => Ok(n.parse()?),
            token => Err(Error::Syntax(format!(
                "[Parser] Expected non-negative integer, got {}",
                token
            ))),
        }
    }

    /// WHERE column = literal, the only form UPDATE and DELETE accept
    fn parse_where_clause(&mut self) -> Result<Option<(String, Consts)>> {
        if self.next_if_token(Token::Keyword(Keyword::Where)).is_none() {
            return Ok(None);
        }
        let col = self.next_ident()?;
        self.next_expect(Token::Equal)?;
        let val = self.parse_literal(true)?;
        Ok(Some((col, val)))
    }

    /// Parses `name` or `qualifier.name`
    fn parse_column_ref(&mut self) -> Result<String> {
        let name = self.next_ident()?;
        self.parse_qualified(name)
    }

    fn parse_qualified(&mut self, name: String) -> Result<String> {
        if self.next_if_token(Token::Period).is_some() {
            let col = self.next_ident()?;
            return Ok(format!("{}.{}", name, col));
        }
        Ok(name)
    }

    /// Peeks at the next token
    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    /// Consumes and returns the next token
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Syntax("[Parser] Unexpected end of input".into())))
    }

    /// Expects and consumes an identifier. A non-reserved keyword in this
    /// position is taken as a lowercase identifier.
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            Token::Keyword(keyword) if !keyword.is_reserved() => Ok(keyword.to_str().to_lowercase()),
            token => Err(Error::Syntax(format!(
                "[Parser] Expected ident, got token {}",
                token
            ))),
        }
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Syntax(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}

/// Integer when the digits allow it, float otherwise
fn parse_number(n: &str) -> Result<Consts> {
    if n.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) {
        Ok(Consts::Integer(n.parse()?))
    } else {
        Ok(Consts::Float(n.parse()?))
    }
}

/// `u` for `u.id`, `None` for a bare name
fn qualifier_of(name: &str) -> Option<&str> {
    name.split_once('.').map(|(q, _)| q)
}
