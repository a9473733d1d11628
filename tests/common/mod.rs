#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use sql_delay::prelude::*;

/// Connection double that records every call in order.
///
/// Any statement or query listed in `failing` returns an execution error; queries otherwise
/// return one row with the query text in column `sql`. `fail_on("begin")` and
/// `fail_on("commit")` make the matching transaction call fail after it is recorded.
#[derive(Clone, Default)]
pub struct RecordingConnection {
    events: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, sql: &str) {
        self.failing.lock().unwrap().insert(sql.to_owned());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn shared(&self) -> SharedConnection {
        SharedConnection::new("recording", self.clone())
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn check(&self, sql: &str) -> Result<(), SqlDelayError> {
        if self.failing.lock().unwrap().contains(sql) {
            return Err(SqlDelayError::ExecutionError(format!("forced failure: {sql}")));
        }
        Ok(())
    }
}

impl SqlConnection for RecordingConnection {
    fn execute(&mut self, sql: &str) -> Result<(), SqlDelayError> {
        self.record(format!("execute {sql}"));
        self.check(sql)
    }

    fn execute_prepared(&mut self, index: usize, params: &StmtParams) -> Result<(), SqlDelayError> {
        self.record(format!("prepared {index} {:?}", params.as_slice()));
        Ok(())
    }

    fn query(&mut self, sql: &str) -> Result<QueryResult, SqlDelayError> {
        self.record(format!("query {sql}"));
        self.check(sql)?;
        let mut result = QueryResult::new(vec!["sql".into()]);
        result.add_row_values(vec![RowValues::Text(sql.to_owned())]);
        Ok(result)
    }

    fn begin_transaction(&mut self) -> Result<(), SqlDelayError> {
        self.record("begin".into());
        self.check("begin")
    }

    fn commit_transaction(&mut self) -> Result<(), SqlDelayError> {
        self.record("commit".into());
        self.check("commit")
    }

    fn rollback_transaction(&mut self) -> Result<(), SqlDelayError> {
        self.record("rollback".into());
        Ok(())
    }
}

/// Dispatcher double that keeps operations until the test runs them.
#[derive(Default)]
pub struct ManualDispatcher {
    pending: Mutex<Vec<SqlOperation>>,
}

impl ManualDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Execute every queued operation in FIFO order; returns the per-operation outcome.
    pub fn run_all(&self, conn: &SharedConnection) -> Vec<bool> {
        let ops: Vec<SqlOperation> = std::mem::take(&mut *self.pending.lock().unwrap());
        ops.into_iter().map(|op| op.execute(conn).is_ok()).collect()
    }
}

impl Dispatcher for ManualDispatcher {
    fn enqueue(&self, op: SqlOperation) -> Result<(), SqlDelayError> {
        self.pending.lock().unwrap().push(op);
        Ok(())
    }
}
