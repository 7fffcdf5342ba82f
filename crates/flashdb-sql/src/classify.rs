//! Statement classification by leading keyword

use crate::scanner::{ScannedStatement, Token};
use crate::CompileError;

/// Transaction-control statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionVerb {
    Begin,
    Commit,
    Rollback,
    Savepoint,
    Release,
    RollbackTo,
}

/// What a statement produces, which decides how the executor runs it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Produces rows, never changes any
    Query,
    /// INSERT / UPDATE / DELETE / REPLACE: produces a change count
    Mutation,
    /// DDL and engine directives: neither rows nor a count
    Schema,
    Transaction(TransactionVerb),
}

impl StatementKind {
    pub fn is_mutation(&self) -> bool {
        matches!(self, StatementKind::Mutation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Query => "query",
            StatementKind::Mutation => "mutation",
            StatementKind::Schema => "schema",
            StatementKind::Transaction(_) => "transaction",
        }
    }
}

const QUERY_KEYWORDS: &[&str] = &["SELECT", "VALUES", "EXPLAIN", "DESCRIBE", "SHOW", "SUMMARIZE"];
const MUTATION_KEYWORDS: &[&str] = &["INSERT", "REPLACE", "UPDATE", "DELETE"];
const SCHEMA_KEYWORDS: &[&str] = &[
    "CREATE", "DROP", "ALTER", "VACUUM", "ANALYZE", "REINDEX", "ATTACH", "DETACH", "INSTALL",
    "LOAD", "SET", "RESET", "CHECKPOINT",
];

/// Classify a scanned statement. Returns the kind and whether rows come back.
pub(crate) fn classify(statement: &ScannedStatement<'_>) -> Result<(StatementKind, bool), CompileError> {
    let tokens = &statement.tokens;
    let leading = match tokens.first() {
        Some(Token::Word(word)) => word.to_ascii_uppercase(),
        Some(other) => {
            return Err(statement.error_at(
                0,
                format!("statement must start with a keyword, found {:?}", other),
            ))
        }
        None => return Err(CompileError::syntax("empty statement", 1, 1)),
    };

    let keyword = leading.as_str();
    if QUERY_KEYWORDS.contains(&keyword) {
        return Ok((StatementKind::Query, true));
    }
    if MUTATION_KEYWORDS.contains(&keyword) {
        return Ok((StatementKind::Mutation, has_top_level(tokens, "RETURNING")));
    }
    if SCHEMA_KEYWORDS.contains(&keyword) {
        return Ok((StatementKind::Schema, false));
    }

    match keyword {
        // `PRAGMA name = value` is a directive, `PRAGMA name` reads a setting
        "PRAGMA" => {
            if tokens.iter().any(|t| *t == Token::Symbol("=")) {
                Ok((StatementKind::Schema, false))
            } else {
                Ok((StatementKind::Query, true))
            }
        }
        "WITH" => classify_with(statement),
        "BEGIN" | "START" => Ok((StatementKind::Transaction(TransactionVerb::Begin), false)),
        "COMMIT" | "END" => Ok((StatementKind::Transaction(TransactionVerb::Commit), false)),
        "ROLLBACK" | "ABORT" => {
            let to = tokens
                .iter()
                .skip(1)
                .take(2)
                .any(|t| t.is_keyword("TO"));
            let verb = if to {
                TransactionVerb::RollbackTo
            } else {
                TransactionVerb::Rollback
            };
            Ok((StatementKind::Transaction(verb), false))
        }
        "SAVEPOINT" => Ok((StatementKind::Transaction(TransactionVerb::Savepoint), false)),
        "RELEASE" => Ok((StatementKind::Transaction(TransactionVerb::Release), false)),
        _ => Err(statement.error_at(0, format!("unrecognized statement {}", leading))),
    }
}

/// A CTE prefix defers to the first top-level statement keyword after it
fn classify_with(statement: &ScannedStatement<'_>) -> Result<(StatementKind, bool), CompileError> {
    let tokens = &statement.tokens;
    let mut depth = 0usize;
    for token in tokens.iter().skip(1) {
        match token {
            Token::Symbol("(") => depth += 1,
            Token::Symbol(")") => depth = depth.saturating_sub(1),
            Token::Word(word) if depth == 0 => {
                let word = word.to_ascii_uppercase();
                if word == "SELECT" || word == "VALUES" {
                    return Ok((StatementKind::Query, true));
                }
                if MUTATION_KEYWORDS.contains(&word.as_str()) {
                    return Ok((StatementKind::Mutation, has_top_level(tokens, "RETURNING")));
                }
            }
            _ => {}
        }
    }
    Err(statement.error_at(0, "WITH clause is not followed by a statement"))
}

fn has_top_level(tokens: &[Token<'_>], keyword: &str) -> bool {
    let mut depth = 0usize;
    tokens.iter().any(|token| {
        match token {
            Token::Symbol("(") => depth += 1,
            Token::Symbol(")") => depth = depth.saturating_sub(1),
            _ => {}
        }
        depth == 0 && token.is_keyword(keyword)
    })
}
