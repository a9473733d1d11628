//! Convenient imports for common functionality.
//!
//! This module re-exports the types needed to build operations, submit them to a delay
//! thread and drain their results.

pub use crate::callback::{PendingCallback, QueryCallback};
pub use crate::connection::{ConnectionGuard, SharedConnection, SqlConnection};
pub use crate::delay_thread::{DelayThreadConfig, Dispatcher, SqlDelayThread};
pub use crate::error::SqlDelayError;
pub use crate::holder::{MAX_QUERY_LEN, SqlQueryHolder};
pub use crate::operation::{QueryOutcome, SqlOperation, SqlQuery, SqlTransaction};
pub use crate::result_queue::SqlResultQueue;
pub use crate::results::{QueryResult, QueryRow};
pub use crate::types::{RowValues, StmtParams};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
