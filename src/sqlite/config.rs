use serde::Deserialize;

use crate::error::Result;

use super::connection::SqliteConnection;

/// Options for opening a [`SqliteConnection`].
///
/// `statements` are registered as prepared-statement slots `0..n` in order, so
/// [`crate::SqlOperation::PreparedRequest`] indices line up with this list.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteOptions {
    pub db_path: String,
    #[serde(default)]
    pub pragmas: Vec<String>,
    #[serde(default)]
    pub statements: Vec<String>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            pragmas: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Parse options from a JSON document.
    ///
    /// # Errors
    /// Returns `SqlDelayError::ConfigError` if the document does not describe `SqliteOptions`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    /// Run `pragma` (any batch SQL, really) right after opening.
    #[must_use]
    pub fn pragma(mut self, pragma: impl Into<String>) -> Self {
        self.opts.pragmas.push(pragma.into());
        self
    }

    /// Register the next prepared-statement slot.
    #[must_use]
    pub fn statement(mut self, sql: impl Into<String>) -> Self {
        self.opts.statements.push(sql.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the connection described by these options.
    ///
    /// # Errors
    /// Returns `SqlDelayError` if the database cannot be opened, a pragma fails or a statement
    /// does not prepare.
    pub fn open(self) -> Result<SqliteConnection> {
        SqliteConnection::open(&self.finish())
    }
}
