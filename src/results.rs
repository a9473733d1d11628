use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// A row from a query result.
///
/// Column names and the name-to-index map are shared by every row of the same
/// [`QueryResult`].
#[derive(Debug, Clone)]
pub struct QueryRow {
    /// The column names for this row (shared across all rows in a result)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<RowValues>,
    column_index: Arc<HashMap<String, usize>>,
}

impl QueryRow {
    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }
}

/// Materialized result of a read query.
///
/// This is the payload a [`crate::QueryCallback`] carries back to the issuing thread and
/// what a [`crate::SqlQueryHolder`] stores per slot.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// The rows returned by the query
    pub rows: Vec<QueryRow>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl QueryResult {
    /// Create an empty result with the given column layout.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        let column_index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        Self {
            rows: Vec::new(),
            column_names: Arc::new(column_names),
            column_index: Arc::new(column_index),
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Append a row; values are expected in column order.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(QueryRow {
            column_names: Arc::clone(&self.column_names),
            values,
            column_index: Arc::clone(&self.column_index),
        });
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, the common shape of scalar queries.
    #[must_use]
    pub fn scalar(&self) -> Option<&RowValues> {
        self.rows.first().and_then(|row| row.get_by_index(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_lookup() {
        let mut result = QueryResult::new(vec!["id".into(), "name".into()]);
        result.add_row_values(vec![RowValues::Int(1), RowValues::Text("a".into())]);
        result.add_row_values(vec![RowValues::Int(2), RowValues::Text("b".into())]);

        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[1].get("name").and_then(RowValues::as_text), Some("b"));
        assert!(result.rows[0].get("missing").is_none());
        assert_eq!(result.scalar(), Some(&RowValues::Int(1)));
    }
}
