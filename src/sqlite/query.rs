use rusqlite::types::Value;
use rusqlite::Statement;

use crate::error::Result;
use crate::results::QueryResult;

use super::params::sqlite_value_to_row_value;

/// Run `stmt` (no bound parameters) and materialize every row into a [`QueryResult`].
///
/// # Errors
/// Returns `SqlDelayError::SqliteError` if the statement or row extraction fails.
pub fn build_result_set(stmt: &mut Statement<'_>) -> Result<QueryResult> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let mut result = QueryResult::new(column_names);

    let mut rows_iter = stmt.query([])?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            row_values.push(sqlite_value_to_row_value(value));
        }
        result.add_row_values(row_values);
    }

    Ok(result)
}
