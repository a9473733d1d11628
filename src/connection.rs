use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;
use crate::results::QueryResult;
use crate::types::StmtParams;

/// A physical database connection the delay thread executes operations against.
///
/// Implementations only run SQL; ordering, locking and result delivery are handled by the
/// operations themselves.
pub trait SqlConnection: Send {
    /// Execute a statement, discarding any rows.
    ///
    /// # Errors
    /// Returns the backend error if the statement fails.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Execute the prepared statement registered at `index` with the given parameters.
    ///
    /// # Errors
    /// Returns an error for an unknown index or a failing statement.
    fn execute_prepared(&mut self, index: usize, params: &StmtParams) -> Result<()>;

    /// Run a read query and materialize its rows.
    ///
    /// # Errors
    /// Returns the backend error if the query fails.
    fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// # Errors
    /// Returns the backend error if the transaction cannot be opened.
    fn begin_transaction(&mut self) -> Result<()>;

    /// # Errors
    /// Returns the backend error if the commit fails.
    fn commit_transaction(&mut self) -> Result<()>;

    /// # Errors
    /// Returns the backend error if the rollback fails.
    fn rollback_transaction(&mut self) -> Result<()>;
}

type BoxedConnection = Box<dyn SqlConnection>;

/// Connection shared by every operation routed to it; one operation holds it at a time.
#[derive(Clone)]
pub struct SharedConnection {
    inner: Arc<Mutex<BoxedConnection>>,
    name: Arc<str>,
}

impl SharedConnection {
    pub fn new(name: impl Into<String>, conn: impl SqlConnection + 'static) -> Self {
        let name: String = name.into();
        Self {
            inner: Arc::new(Mutex::new(Box::new(conn))),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take exclusive access to the connection. The lock is released when the guard drops.
    ///
    /// A mutex poisoned by a panicking holder is recovered; the connection is still usable
    /// from this layer's point of view.
    pub fn lock(&self) -> ConnectionGuard<'_> {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(connection = %self.name, "connection mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        ConnectionGuard { guard }
    }
}

impl fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Scoped exclusive access to a [`SharedConnection`].
pub struct ConnectionGuard<'a> {
    guard: MutexGuard<'a, BoxedConnection>,
}

impl Deref for ConnectionGuard<'_> {
    type Target = dyn SqlConnection;

    fn deref(&self) -> &Self::Target {
        self.guard.as_ref()
    }
}

impl DerefMut for ConnectionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.as_mut()
    }
}
