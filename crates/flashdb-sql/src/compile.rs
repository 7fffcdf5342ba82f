use std::collections::HashSet;

use flashdb_types::Value;

use crate::classify::{classify, StatementKind};
use crate::scanner::{scan, Placeholder, ScannedStatement, Token};
use crate::CompileError;

/// Highest `?NNN` index accepted (SQLite's default SQLITE_MAX_VARIABLE_NUMBER)
const MAX_PLACEHOLDER_INDEX: usize = 32766;

/// A single statement ready to hand to an engine
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    sql: String,
    kind: StatementKind,
    returns_rows: bool,
    parameters: Vec<Value>,
}

impl CompiledStatement {
    /// Statement text without the trailing `;`
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// True when the engine should step the statement for output rows
    pub fn returns_rows(&self) -> bool {
        self.returns_rows
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

/// Lexical flavour of the target engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// `[name]` quotes an identifier
    #[default]
    Sqlite,
    /// `[a, b]` is a list literal, so placeholders inside it count
    DuckDb,
}

impl Dialect {
    /// Compile one SQL statement with its positional parameters.
    ///
    /// Fails with [`CompileError::ParameterMismatch`] when the number of bind
    /// slots differs from `parameters.len()`, before anything reaches the engine.
    pub fn compile(self, sql: &str, parameters: &[Value]) -> Result<CompiledStatement, CompileError> {
        let statement = single_statement(sql, self)?;

        let expected = count_slots(&statement)?;
        if expected != parameters.len() {
            return Err(CompileError::ParameterMismatch {
                expected,
                supplied: parameters.len(),
            });
        }

        let (kind, returns_rows) = classify(&statement)?;

        Ok(CompiledStatement {
            sql: statement.text.to_string(),
            kind,
            returns_rows,
            parameters: parameters.to_vec(),
        })
    }

    /// Number of bind slots a single statement declares
    pub fn placeholder_count(self, sql: &str) -> Result<usize, CompileError> {
        count_slots(&single_statement(sql, self)?)
    }

    /// Split a script into its non-empty statements
    pub fn split(self, sql: &str) -> Result<Vec<&str>, CompileError> {
        Ok(scan(sql, self)?.into_iter().map(|s| s.text).collect())
    }
}

/// [`Dialect::compile`] for SQLite
pub fn compile(sql: &str, parameters: &[Value]) -> Result<CompiledStatement, CompileError> {
    Dialect::Sqlite.compile(sql, parameters)
}

pub fn placeholder_count(sql: &str) -> Result<usize, CompileError> {
    Dialect::Sqlite.placeholder_count(sql)
}

pub fn split(sql: &str) -> Result<Vec<&str>, CompileError> {
    Dialect::Sqlite.split(sql)
}

fn single_statement(sql: &str, dialect: Dialect) -> Result<ScannedStatement<'_>, CompileError> {
    let mut statements = scan(sql, dialect)?;
    match statements.len() {
        0 => Err(CompileError::syntax("empty statement", 1, 1)),
        1 => Ok(statements.remove(0)),
        n => Err(statements[1].error_at(
            0,
            format!("expected a single statement, found {}", n),
        )),
    }
}

/// Bind-slot numbering: `?` takes the slot after the highest seen so far,
/// `?NNN` names its slot, a named placeholder gets a new slot the first
/// time its name appears.
fn count_slots(statement: &ScannedStatement<'_>) -> Result<usize, CompileError> {
    let mut highest = 0usize;
    let mut names = HashSet::new();

    for (position, token) in statement.tokens.iter().enumerate() {
        let Token::Placeholder(placeholder) = token else {
            continue;
        };
        match placeholder {
            Placeholder::Anonymous => highest += 1,
            Placeholder::Numbered(digits) => {
                let index = digits
                    .parse::<usize>()
                    .ok()
                    .filter(|i| (1..=MAX_PLACEHOLDER_INDEX).contains(i))
                    .ok_or_else(|| {
                        statement.error_at(
                            position,
                            format!(
                                "placeholder ?{} must be between 1 and {}",
                                digits, MAX_PLACEHOLDER_INDEX
                            ),
                        )
                    })?;
                highest = highest.max(index);
            }
            Placeholder::Named(name) => {
                if names.insert(*name) {
                    highest += 1;
                }
            }
        }
    }
    Ok(highest)
}
