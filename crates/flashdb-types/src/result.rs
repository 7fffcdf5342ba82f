use serde::Serialize;

use crate::Row;

/// Structured result: row data and the affected-row count together
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Rows inserted, updated or deleted by the statement
    pub affected: u64,
    pub records: Vec<Row>,
    /// Same rows as `records`, as the engine produced them
    pub raw: Vec<Row>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>, affected: u64) -> Self {
        Self {
            affected,
            records: rows.clone(),
            raw: rows,
        }
    }
}

/// What `execute` hands back: bare rows, or the structured result when asked for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Structured(QueryResult),
}

impl QueryOutput {
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Structured(result) => &result.records,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Structured(result) => result.raw,
        }
    }

    pub fn into_structured(self) -> Option<QueryResult> {
        match self {
            QueryOutput::Structured(result) => Some(result),
            QueryOutput::Rows(_) => None,
        }
    }
}
