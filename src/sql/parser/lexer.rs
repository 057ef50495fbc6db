//! SQL Lexer - Tokenizes query text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

/// Represents a single lexical token in the SQL input
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// SQL reserved keyword
    Keyword(Keyword),
    /// Identifier such as table name, column name or function name
    Ident(String),
    /// String literal
    String(String),
    /// Numeric literal (integer or floating-point)
    Number(String),
    /// Operators and punctuation
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Asterisk,
    Period,
    Minus,
    Equal,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::String(v) => v,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Asterisk => "*",
            Token::Period => ".",
            Token::Minus => "-",
            Token::Equal => "=",
            Token::GreaterThan => ">",
            Token::LessThan => "<",
            Token::GreaterThanOrEqual => ">=",
            Token::LessThanOrEqual => "<=",
        })
    }
}

/// SQL reserved keywords
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
    // DDL keywords
    Create,
    Table,
    Primary,
    Key,
    // Data type keywords
    Int,
    Integer,
    Text,
    Varchar,
    String,
    Boolean,
    Bool,
    // Query keywords
    Select,
    Distinct,
    From,
    As,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    On,
    Where,
    And,
    Or,
    Group,
    By,
    Having,
    Order,
    Asc,
    Desc,
    Limit,
    Offset,
    // DML keywords
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    // Literal keywords
    True,
    False,
    Null,
}

/// Spelling of every keyword, matched case-insensitively
const KEYWORDS: [(Keyword, &str); 42] = [
    (Keyword::Create, "CREATE"),
    (Keyword::Table, "TABLE"),
    (Keyword::Primary, "PRIMARY"),
    (Keyword::Key, "KEY"),
    (Keyword::Int, "INT"),
    (Keyword::Integer, "INTEGER"),
    (Keyword::Text, "TEXT"),
    (Keyword::Varchar, "VARCHAR"),
    (Keyword::String, "STRING"),
    (Keyword::Boolean, "BOOLEAN"),
    (Keyword::Bool, "BOOL"),
    (Keyword::Select, "SELECT"),
    (Keyword::Distinct, "DISTINCT"),
    (Keyword::From, "FROM"),
    (Keyword::As, "AS"),
    (Keyword::Join, "JOIN"),
    (Keyword::Inner, "INNER"),
    (Keyword::Left, "LEFT"),
    (Keyword::Right, "RIGHT"),
    (Keyword::Full, "FULL"),
    (Keyword::Outer, "OUTER"),
    (Keyword::On, "ON"),
    (Keyword::Where, "WHERE"),
    (Keyword::And, "AND"),
    (Keyword::Or, "OR"),
    (Keyword::Group, "GROUP"),
    (Keyword::By, "BY"),
    (Keyword::Having, "HAVING"),
    (Keyword::Order, "ORDER"),
    (Keyword::Asc, "ASC"),
    (Keyword::Desc, "DESC"),
    (Keyword::Limit, "LIMIT"),
    (Keyword::Offset, "OFFSET"),
    (Keyword::Insert, "INSERT"),
    (Keyword::Into, "INTO"),
    (Keyword::Values, "VALUES"),
    (Keyword::Update, "UPDATE"),
    (Keyword::Set, "SET"),
    (Keyword::Delete, "DELETE"),
    (Keyword::True, "TRUE"),
    (Keyword::False, "FALSE"),
    (Keyword::Null, "NULL"),
];

impl Keyword {
    /// Looks up a word in the keyword table, ignoring case
    pub fn from_str(ident: &str) -> Option<Keyword> {
        KEYWORDS
            .iter()
            .find(|(_, word)| word.eq_ignore_ascii_case(ident))
            .map(|(keyword, _)| *keyword)
    }

    /// Whether the word can only ever be a keyword. Type names, join kinds,
    /// sort directions and a few clause words also serve as identifiers.
    pub fn is_reserved(&self) -> bool {
        !matches!(
            self,
            Keyword::Key
                | Keyword::Int
                | Keyword::Integer
                | Keyword::Text
                | Keyword::Varchar
                | Keyword::String
                | Keyword::Boolean
                | Keyword::Bool
                | Keyword::Inner
                | Keyword::Left
                | Keyword::Right
                | Keyword::Full
                | Keyword::Outer
                | Keyword::Asc
                | Keyword::Desc
                | Keyword::Limit
                | Keyword::Offset
                | Keyword::Values
                | Keyword::Set
        )
    }

    /// Uppercase spelling
    pub fn to_str(&self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(keyword, _)| keyword == self)
            .map_or("", |(_, word)| *word)
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// SQL lexical analyzer (lexer/tokenizer)
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Syntax(format!("[Lexer] Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given SQL text
    pub fn new(sql_text: &'a str) -> Self {
        Self {
            iter: sql_text.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    /// Removes whitespace from the input stream
    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        match self.iter.peek() {
            Some('\'') => self.scan_string(),
            Some(c) if c.is_ascii_digit() => Ok(self.scan_number()),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(self.scan_ident()),
            Some(_) => Ok(self.scan_symbol()),
            None => Ok(None),
        }
    }

    /// Scans a string literal (enclosed in single quotes, no escapes)
    fn scan_string(&mut self) -> Result<Option<Token>> {
        self.iter.next();
        let mut val = String::new();

        loop {
            match self.iter.next() {
                Some('\'') => break,
                Some(c) => val.push(c),
                None => return Err(Error::Syntax("[Lexer] Unexpected end of string".into())),
            }
        }
        Ok(Some(Token::String(val)))
    }

    /// Scans a numeric literal (integer or floating-point)
    fn scan_number(&mut self) -> Option<Token> {
        let mut val = self.next_while(|c| c.is_ascii_digit())?;
        if let Some(sep) = self.next_if(|c| c == '.') {
            val.push(sep);
            while let Some(c) = self.next_if(|c| c.is_ascii_digit()) {
                val.push(c);
            }
        }
        Some(Token::Number(val))
    }

    /// Scans an identifier or keyword. Identifiers keep their case.
    fn scan_ident(&mut self) -> Option<Token> {
        let mut val = self.next_if(|c| c.is_alphabetic() || c == '_')?.to_string();
        while let Some(c) = self.next_if(|c| c.is_alphanumeric() || c == '_') {
            val.push(c);
        }
        Some(Keyword::from_str(&val).map_or(Token::Ident(val), Token::Keyword))
    }

    /// Scans a symbol token, including the two-character comparison operators
    fn scan_symbol(&mut self) -> Option<Token> {
        let token = match *self.iter.peek()? {
            '*' => Token::Asterisk,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '.' => Token::Period,
            '-' => Token::Minus,
            '=' => Token::Equal,
            '>' => Token::GreaterThan,
            '<' => Token::LessThan,
            _ => return None,
        };
        self.iter.next();
        Some(match token {
            Token::GreaterThan if self.next_if(|c| c == '=').is_some() => Token::GreaterThanOrEqual,
            Token::LessThan if self.next_if(|c| c == '=').is_some() => Token::LessThanOrEqual,
            token => token,
        })
    }
}
