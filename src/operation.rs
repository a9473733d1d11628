use std::sync::{Arc, Weak};

use crate::callback::QueryCallback;
use crate::connection::{SharedConnection, SqlConnection};
use crate::error::{Result, SqlDelayError};
use crate::holder::SqlQueryHolder;
use crate::result_queue::SqlResultQueue;
use crate::results::QueryResult;
use crate::types::StmtParams;

/// What a single query delivers to its callback.
pub type QueryOutcome = Result<QueryResult>;

/// A unit of deferred work executed by the delay thread.
///
/// Submitting an operation moves it to the dispatcher; it runs at most once and is dropped
/// afterwards, together with everything it owns.
#[derive(Debug)]
pub enum SqlOperation {
    /// One statement, no result captured.
    PlainRequest(String),
    /// Ordered children run inside a begin/commit bracket.
    Transaction(SqlTransaction),
    /// Prepared statement by slot index with its owned parameters.
    PreparedRequest { index: usize, params: StmtParams },
    /// Read query whose result is delivered through a callback.
    Query(SqlQuery),
    /// Every populated slot of a query holder, one callback for the batch.
    QueryHolderEx(SqlQueryHolderEx),
}

impl SqlOperation {
    pub fn plain(sql: impl Into<String>) -> Self {
        SqlOperation::PlainRequest(sql.into())
    }

    #[must_use]
    pub fn prepared(index: usize, params: StmtParams) -> Self {
        SqlOperation::PreparedRequest { index, params }
    }

    pub fn query(
        sql: impl Into<String>,
        callback: QueryCallback<QueryOutcome>,
        queue: &Arc<SqlResultQueue>,
    ) -> Self {
        SqlOperation::Query(SqlQuery::new(sql, callback, queue))
    }

    /// Short name used in log records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlOperation::PlainRequest(_) => "plain request",
            SqlOperation::Transaction(_) => "transaction",
            SqlOperation::PreparedRequest { .. } => "prepared request",
            SqlOperation::Query(_) => "query",
            SqlOperation::QueryHolderEx(_) => "query holder",
        }
    }

    /// Run the operation against `conn`, holding the connection lock for the whole call.
    ///
    /// # Errors
    /// Returns the first execution error, or a validation error when a query's callback or
    /// result queue is no longer available. In the latter case nothing is executed.
    pub fn execute(mut self, conn: &SharedConnection) -> Result<()> {
        match &self {
            SqlOperation::Transaction(tx) if tx.is_empty() => return Ok(()),
            SqlOperation::Query(query) => query.ensure_deliverable()?,
            SqlOperation::QueryHolderEx(holder) => holder.ensure_deliverable()?,
            _ => {}
        }
        let mut guard = conn.lock();
        self.run(&mut *guard)
    }

    fn run(&mut self, conn: &mut dyn SqlConnection) -> Result<()> {
        match self {
            SqlOperation::PlainRequest(sql) => conn.execute(sql),
            SqlOperation::Transaction(tx) => tx.run(conn),
            SqlOperation::PreparedRequest { index, params } => {
                conn.execute_prepared(*index, params)
            }
            SqlOperation::Query(query) => query.run(conn),
            SqlOperation::QueryHolderEx(holder) => holder.run(conn),
        }
    }
}

impl From<SqlTransaction> for SqlOperation {
    fn from(tx: SqlTransaction) -> Self {
        SqlOperation::Transaction(tx)
    }
}

impl From<SqlQuery> for SqlOperation {
    fn from(query: SqlQuery) -> Self {
        SqlOperation::Query(query)
    }
}

/// Fail-fast group of operations: the first failing child rolls the whole group back.
#[derive(Debug, Default)]
pub struct SqlTransaction {
    queue: Vec<SqlOperation>,
}

impl SqlTransaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child; children run in the order they were added.
    pub fn delay_execute(&mut self, op: SqlOperation) {
        self.queue.push(op);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn run(&mut self, conn: &mut dyn SqlConnection) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        conn.begin_transaction()?;
        for (position, op) in self.queue.iter_mut().enumerate() {
            if let Err(err) = op.run(conn) {
                tracing::warn!(
                    position,
                    kind = op.kind(),
                    error = %err,
                    "transaction member failed, rolling back"
                );
                roll_back(conn);
                return Err(err);
            }
        }
        // A failed COMMIT can leave the transaction open on the connection.
        if let Err(err) = conn.commit_transaction() {
            tracing::warn!(error = %err, "transaction commit failed, rolling back");
            roll_back(conn);
            return Err(err);
        }
        Ok(())
    }
}

fn roll_back(conn: &mut dyn SqlConnection) {
    if let Err(rollback_err) = conn.rollback_transaction() {
        tracing::error!(error = %rollback_err, "transaction rollback failed");
    }
}

/// Read query with result delivery to the issuing thread.
#[derive(Debug)]
pub struct SqlQuery {
    sql: String,
    callback: Option<QueryCallback<QueryOutcome>>,
    queue: Weak<SqlResultQueue>,
}

impl SqlQuery {
    pub fn new(
        sql: impl Into<String>,
        callback: QueryCallback<QueryOutcome>,
        queue: &Arc<SqlResultQueue>,
    ) -> Self {
        Self {
            sql: sql.into(),
            callback: Some(callback),
            queue: Arc::downgrade(queue),
        }
    }

    fn ensure_deliverable(&self) -> Result<()> {
        delivery_target(self.callback.is_some(), &self.queue).map(|_| ())
    }

    fn run(&mut self, conn: &mut dyn SqlConnection) -> Result<()> {
        let queue = delivery_target(self.callback.is_some(), &self.queue)?;
        let Some(mut callback) = self.callback.take() else {
            return Err(undeliverable("query callback already delivered"));
        };

        let outcome = conn.query(&self.sql);
        if let Err(err) = &outcome {
            tracing::warn!(sql = %self.sql, error = %err, "async query failed");
        }
        callback.set_result(outcome);
        queue.publish(Box::new(callback));
        Ok(())
    }
}

/// Batch execution of a [`SqlQueryHolder`]; created by [`SqlQueryHolder::submit_async`].
#[derive(Debug)]
pub struct SqlQueryHolderEx {
    holder: Option<SqlQueryHolder>,
    callback: Option<QueryCallback<SqlQueryHolder>>,
    queue: Weak<SqlResultQueue>,
}

impl SqlQueryHolderEx {
    pub(crate) fn new(
        holder: SqlQueryHolder,
        callback: QueryCallback<SqlQueryHolder>,
        queue: &Arc<SqlResultQueue>,
    ) -> Self {
        Self {
            holder: Some(holder),
            callback: Some(callback),
            queue: Arc::downgrade(queue),
        }
    }

    fn ensure_deliverable(&self) -> Result<()> {
        if self.holder.is_none() {
            return Err(undeliverable("query holder already delivered"));
        }
        delivery_target(self.callback.is_some(), &self.queue).map(|_| ())
    }

    fn run(&mut self, conn: &mut dyn SqlConnection) -> Result<()> {
        self.ensure_deliverable()?;
        let queue = delivery_target(self.callback.is_some(), &self.queue)?;
        let (Some(mut holder), Some(mut callback)) = (self.holder.take(), self.callback.take())
        else {
            return Err(undeliverable("query holder already delivered"));
        };

        let executed = holder.fill_results(|index, sql| match conn.query(sql) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(index, sql, error = %err, "holder query failed");
                None
            }
        });
        tracing::debug!(executed, slots = holder.slot_count(), "query holder executed");

        callback.set_result(holder);
        queue.publish(Box::new(callback));
        Ok(())
    }
}

fn delivery_target(
    has_callback: bool,
    queue: &Weak<SqlResultQueue>,
) -> Result<Arc<SqlResultQueue>> {
    if !has_callback {
        return Err(undeliverable("query callback already delivered"));
    }
    queue
        .upgrade()
        .ok_or_else(|| undeliverable("result queue dropped before delivery"))
}

fn undeliverable(message: &str) -> SqlDelayError {
    tracing::error!("{message}");
    SqlDelayError::ValidationError(message.into())
}
