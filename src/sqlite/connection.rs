use std::fmt;

use rusqlite::ToSql;

use crate::connection::SqlConnection;
use crate::error::{Result, SqlDelayError};
use crate::results::QueryResult;
use crate::types::StmtParams;

use super::config::SqliteOptions;
use super::params::convert_params;
use super::query::build_result_set;

/// [`SqlConnection`] backed by a `rusqlite` connection.
///
/// Prepared statements are addressed by slot index; the SQL for each slot is kept here and
/// compiled through rusqlite's statement cache.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    statements: Vec<String>,
}

impl SqliteConnection {
    /// Open the database at `opts.db_path` (`:memory:` for an in-memory database), run the
    /// pragmas and register the statements.
    ///
    /// # Errors
    /// Returns `SqlDelayError::SqliteError` if opening, a pragma or a statement fails.
    pub fn open(opts: &SqliteOptions) -> Result<Self> {
        let conn = rusqlite::Connection::open(&opts.db_path)?;
        for pragma in &opts.pragmas {
            conn.execute_batch(pragma)?;
        }
        let mut sqlite = Self::from_connection(conn);
        for sql in &opts.statements {
            sqlite.register_statement(sql.clone())?;
        }
        Ok(sqlite)
    }

    #[must_use]
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            statements: Vec::new(),
        }
    }

    /// Register `sql` as the next prepared-statement slot and return its index.
    ///
    /// # Errors
    /// Returns `SqlDelayError::SqliteError` if the statement does not compile.
    pub fn register_statement(&mut self, sql: impl Into<String>) -> Result<usize> {
        let sql = sql.into();
        let _ = self.conn.prepare_cached(&sql)?;
        self.statements.push(sql);
        Ok(self.statements.len() - 1)
    }

    #[must_use]
    pub fn statement_sql(&self, index: usize) -> Option<&str> {
        self.statements.get(index).map(String::as_str)
    }
}

impl SqlConnection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn execute_prepared(&mut self, index: usize, params: &StmtParams) -> Result<()> {
        let Some(sql) = self.statements.get(index) else {
            return Err(SqlDelayError::ExecutionError(format!(
                "no prepared statement registered at index {index}"
            )));
        };
        let values = convert_params(params);
        let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        let mut stmt = self.conn.prepare_cached(sql)?;
        let expected = stmt.parameter_count();
        if expected != param_refs.len() {
            return Err(SqlDelayError::ParameterError(format!(
                "statement {index} expects {expected} parameters, got {}",
                param_refs.len()
            )));
        }
        stmt.execute(&param_refs[..])?;
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        build_result_set(&mut stmt)
    }

    fn begin_transaction(&mut self) -> Result<()> {
        Ok(self.conn.execute_batch("BEGIN")?)
    }

    fn commit_transaction(&mut self) -> Result<()> {
        Ok(self.conn.execute_batch("COMMIT")?)
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        Ok(self.conn.execute_batch("ROLLBACK")?)
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .field("statements", &self.statements.len())
            .finish()
    }
}
