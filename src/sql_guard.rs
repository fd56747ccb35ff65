//! Read-only check for model-generated SQL.
//!
//! Generated text is parsed with the SQLite dialect and must be exactly one
//! query. Any write, DDL, pragma or attach statement is rejected before it
//! reaches the database. SQLite syntax the parser does not cover (`LIMIT 5, 10`,
//! `GLOB`) is accepted when the statement lexically is a single `SELECT` or
//! `WITH` statement; the executor's read-only connection refuses any write
//! hidden inside it.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("statement is empty")]
    Empty,

    #[error("statement could not be parsed: {0}")]
    Parse(String),

    #[error("expected a single statement, found {0}")]
    MultipleStatements(usize),

    #[error("only read-only queries are allowed, got {0}")]
    NotReadOnly(String),
}

pub type GuardResult<T> = Result<T, GuardError>;

/// Strip a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The rest of the opening line is the info string: `sql`, `SQL`, `sqlite`...
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Validate that `sql` is a single read-only query and return the statement
/// text that should be executed.
pub fn validate_read_only(sql: &str) -> GuardResult<String> {
    let statement = strip_code_fence(sql);
    if statement.trim_matches(|c: char| c.is_whitespace() || c == ';').is_empty() {
        return Err(GuardError::Empty);
    }

    let parsed = match Parser::parse_sql(&SQLiteDialect {}, statement) {
        Ok(parsed) => parsed,
        Err(err) => return accept_unparsed_query(statement, err.to_string()),
    };

    match parsed.as_slice() {
        [] => Err(GuardError::Empty),
        [Statement::Query(query)] => {
            if query_is_read_only(query) {
                Ok(statement.to_string())
            } else {
                Err(GuardError::NotReadOnly("data-modifying query".to_string()))
            }
        }
        [other] => Err(GuardError::NotReadOnly(statement_kind(other))),
        many => Err(GuardError::MultipleStatements(many.len())),
    }
}

/// Lexical check for statements the parser rejected: one statement, led by
/// `SELECT` or `WITH`. Anything else keeps the parser's error.
fn accept_unparsed_query(statement: &str, parse_error: String) -> GuardResult<String> {
    let Ok(tokens) = Tokenizer::new(&SQLiteDialect {}, statement).tokenize() else {
        return Err(GuardError::Parse(parse_error));
    };

    let mut leading = None;
    let mut statements = 0;
    let mut in_statement = false;
    for token in &tokens {
        match token {
            Token::Whitespace(_) => {}
            Token::SemiColon => in_statement = false,
            other => {
                if !in_statement {
                    in_statement = true;
                    statements += 1;
                    leading.get_or_insert(other);
                }
            }
        }
    }

    if statements > 1 {
        return Err(GuardError::MultipleStatements(statements));
    }
    match leading {
        Some(Token::Word(word)) if matches!(word.keyword, Keyword::SELECT | Keyword::WITH) => {
            debug!(target: "chatbot", error = %parse_error, "query outside parser grammar, relying on read-only connection");
            Ok(statement.to_string())
        }
        _ => Err(GuardError::Parse(parse_error)),
    }
}

fn query_is_read_only(query: &Query) -> bool {
    let ctes_ok = query
        .with
        .as_ref()
        .map(|with| with.cte_tables.iter().all(|cte| query_is_read_only(&cte.query)))
        .unwrap_or(true);
    ctes_ok && set_expr_is_read_only(&query.body)
}

fn set_expr_is_read_only(expr: &SetExpr) -> bool {
    match expr {
        SetExpr::Insert(_) | SetExpr::Update(_) => false,
        SetExpr::Query(inner) => query_is_read_only(inner),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read_only(left) && set_expr_is_read_only(right)
        }
        _ => true,
    }
}

/// Leading keyword of a statement, e.g. `DROP` or `INSERT`.
fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}
