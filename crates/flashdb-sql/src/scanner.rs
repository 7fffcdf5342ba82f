//! Pest-based lexical scanner for SQL text

use pest::error::{InputLocation, LineColLocation};
use pest::iterators::Pair;
use pest::{Parser, Position};
use pest_derive::Parser;

use crate::{CompileError, Dialect};

#[derive(Parser)]
#[grammar = "sql.pest"]
struct SqlScanner;

/// Bind placeholder as written in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder<'a> {
    /// `?`
    Anonymous,
    /// `?NNN`, digits only
    Numbered(&'a str),
    /// `:name`, `@name`, `$name`, prefix included
    Named(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Word(&'a str),
    /// Strings, numbers and quoted identifiers
    Literal,
    Placeholder(Placeholder<'a>),
    Symbol(&'a str),
}

impl Token<'_> {
    pub(crate) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

/// One non-empty statement of a script
#[derive(Debug, Clone)]
pub(crate) struct ScannedStatement<'a> {
    /// Statement text from its first to its last token, without the `;`
    pub text: &'a str,
    pub tokens: Vec<Token<'a>>,
    /// Where each token starts, index for index with `tokens`
    pub positions: Vec<Position<'a>>,
}

impl ScannedStatement<'_> {
    /// Syntax error located at the token with the given index
    pub(crate) fn error_at(&self, index: usize, message: impl Into<String>) -> CompileError {
        let (line, column) = self
            .positions
            .get(index)
            .map(|p| p.line_col())
            .unwrap_or((1, 1));
        CompileError::syntax(message, line, column)
    }
}

/// Split `sql` into statements and tokenize each one.
///
/// Statements made only of whitespace and comments are dropped. A `;` inside
/// the `BEGIN ... END` body of `CREATE TRIGGER` does not end the statement.
pub(crate) fn scan(sql: &str, dialect: Dialect) -> Result<Vec<ScannedStatement<'_>>, CompileError> {
    let rule = match dialect {
        Dialect::Sqlite => Rule::script,
        Dialect::DuckDb => Rule::list_script,
    };
    let mut pairs = SqlScanner::parse(rule, sql).map_err(|e| syntax_error(sql, e))?;
    let script = pairs
        .next()
        .ok_or_else(|| CompileError::syntax("empty input", 1, 1))?;

    let mut statements = Vec::new();
    let mut pending = PendingStatement::default();
    for pair in script.into_inner() {
        match pair.as_rule() {
            Rule::EOI => {}
            Rule::semicolon if pending.depth == 0 => {
                statements.extend(std::mem::take(&mut pending).finish(sql));
            }
            _ => pending.push(pair),
        }
    }
    statements.extend(pending.finish(sql));
    Ok(statements)
}

/// Tokens collected since the last statement boundary
#[derive(Default)]
struct PendingStatement<'a> {
    tokens: Vec<Token<'a>>,
    positions: Vec<Position<'a>>,
    range: Option<(usize, usize)>,
    trigger: bool,
    /// Open `BEGIN`/`CASE` blocks inside a trigger
    depth: usize,
}

impl<'a> PendingStatement<'a> {
    fn push(&mut self, pair: Pair<'a, Rule>) {
        let span = pair.as_span();
        let start = self.range.map_or(span.start(), |(start, _)| start);
        self.range = Some((start, span.end()));

        let text = pair.as_str();
        let token = match pair.as_rule() {
            Rule::word => Token::Word(text),
            Rule::string | Rule::quoted_ident | Rule::bracket_ident | Rule::number => Token::Literal,
            Rule::anon_placeholder => Token::Placeholder(Placeholder::Anonymous),
            Rule::numbered_placeholder => Token::Placeholder(Placeholder::Numbered(&text[1..])),
            Rule::named_placeholder => Token::Placeholder(Placeholder::Named(text)),
            _ => Token::Symbol(text),
        };
        self.tokens.push(token);
        self.positions.push(span.start_pos());

        if !self.trigger && self.tokens.len() <= 3 {
            self.trigger = opens_trigger(&self.tokens);
        }
        if self.trigger {
            if token.is_keyword("BEGIN") || token.is_keyword("CASE") {
                self.depth += 1;
            } else if token.is_keyword("END") {
                self.depth = self.depth.saturating_sub(1);
            }
        }
    }

    fn finish(self, sql: &'a str) -> Option<ScannedStatement<'a>> {
        let (start, end) = self.range?;
        Some(ScannedStatement {
            text: &sql[start..end],
            tokens: self.tokens,
            positions: self.positions,
        })
    }
}

/// `CREATE [TEMP | TEMPORARY] TRIGGER`
fn opens_trigger(tokens: &[Token<'_>]) -> bool {
    match tokens {
        [create, trigger, ..] if create.is_keyword("CREATE") && trigger.is_keyword("TRIGGER") => true,
        [create, temp, trigger, ..] => {
            create.is_keyword("CREATE")
                && (temp.is_keyword("TEMP") || temp.is_keyword("TEMPORARY"))
                && trigger.is_keyword("TRIGGER")
        }
        _ => false,
    }
}

fn syntax_error(sql: &str, error: pest::error::Error<Rule>) -> CompileError {
    let (line, column) = match error.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let offset = match error.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };

    let message = match sql.get(offset..).and_then(|rest| rest.chars().next()) {
        Some('\'') => "unterminated string literal".to_string(),
        Some('"') | Some('`') | Some('[') => "unterminated quoted identifier".to_string(),
        Some(c) => format!("unexpected character {:?}", c),
        None => "unexpected end of input".to_string(),
    };
    CompileError::syntax(message, line, column)
}
