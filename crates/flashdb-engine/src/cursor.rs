//! Row cursor
//!
//! Engines step their native cursor and push each row here as it is
//! produced; the executor consumes the cursor once with [`RowCursor::into_rows`].
//! The adapter above needs a complete list, so rows are materialized in full.

use std::sync::Arc;

use flashdb_types::{Row, Value};

use crate::EngineError;

#[derive(Debug)]
pub struct RowCursor {
    columns: Arc<[String]>,
    rows: Vec<Row>,
    limit: Option<u64>,
}

impl RowCursor {
    /// Empty cursor. `limit` caps the number of rows a statement may produce.
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            columns: Arc::from(Vec::new()),
            rows: Vec::new(),
            limit,
        }
    }

    /// Result schema. Engines set it before the first push.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns.into();
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn push(&mut self, values: Vec<Value>) -> Result<(), EngineError> {
        if values.len() != self.columns.len() {
            return Err(EngineError::ColumnCountMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        if let Some(limit) = self.limit {
            if self.rows.len() as u64 >= limit {
                return Err(EngineError::RowLimitExceeded(limit));
            }
        }
        self.rows.push(Row::new(Arc::clone(&self.columns), values));
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Default for RowCursor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_share_schema() {
        let mut cursor = RowCursor::default();
        cursor.set_columns(vec!["a".to_string(), "b".to_string()]);
        cursor.push(vec![Value::Integer(1), Value::Null]).unwrap();
        cursor.push(vec![Value::Integer(2), Value::Text("x".to_string())]).unwrap();

        let rows = cursor.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("b"), Some(&Value::Text("x".to_string())));
        assert_eq!(rows[0].columns(), rows[1].columns());
    }

    #[test]
    fn test_width_must_match_schema() {
        let mut cursor = RowCursor::default();
        cursor.set_columns(vec!["a".to_string()]);
        let err = cursor.push(vec![]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ColumnCountMismatch {
                expected: 1,
                actual: 0
            }
        ));
    }

    #[test]
    fn test_row_limit() {
        let mut cursor = RowCursor::new(Some(1));
        cursor.set_columns(vec!["a".to_string()]);
        cursor.push(vec![Value::Integer(1)]).unwrap();
        assert!(matches!(
            cursor.push(vec![Value::Integer(2)]),
            Err(EngineError::RowLimitExceeded(1))
        ));
        assert_eq!(cursor.row_count(), 1);
    }
}
