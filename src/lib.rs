//! Deferred SQL execution on a dedicated delay thread.
//!
//! The issuing thread builds [`SqlOperation`]s (plain statements, prepared statements,
//! transactions, queries, [`SqlQueryHolder`] batches) and enqueues them on a [`Dispatcher`]
//! such as [`SqlDelayThread`]. Operations run in submission order against a
//! [`SharedConnection`]. Query results come back as [`QueryCallback`]s published to a
//! [`SqlResultQueue`], which the issuing thread drains whenever it chooses.

pub mod callback;
pub mod connection;
pub mod delay_thread;
pub mod error;
pub mod holder;
pub mod operation;
pub mod prelude;
pub mod result_queue;
pub mod results;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use callback::{PendingCallback, QueryCallback};
pub use connection::{ConnectionGuard, SharedConnection, SqlConnection};
pub use delay_thread::{DelayThreadConfig, Dispatcher, SqlDelayThread};
pub use error::SqlDelayError;
pub use holder::{MAX_QUERY_LEN, SqlQueryHolder};
pub use operation::{QueryOutcome, SqlOperation, SqlQuery, SqlQueryHolderEx, SqlTransaction};
pub use result_queue::SqlResultQueue;
pub use results::{QueryResult, QueryRow};
pub use types::{RowValues, StmtParams};
