use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use serde::Deserialize;

use crate::connection::SharedConnection;
use crate::error::{Result, SqlDelayError};
use crate::operation::SqlOperation;

/// Accepts operations for deferred execution.
pub trait Dispatcher {
    /// Take ownership of `op`. It will be executed exactly once, after every operation
    /// enqueued before it on the same dispatcher.
    ///
    /// # Errors
    /// Returns [`SqlDelayError::ConnectionError`] if the dispatcher stopped accepting work;
    /// the operation is dropped unexecuted.
    fn enqueue(&self, op: SqlOperation) -> Result<()>;
}

/// Options for a [`SqlDelayThread`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayThreadConfig {
    pub thread_name: String,
}

impl Default for DelayThreadConfig {
    fn default() -> Self {
        Self {
            thread_name: "sql-delay".into(),
        }
    }
}

impl DelayThreadConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }
}

enum Command {
    Execute(SqlOperation),
    Shutdown,
}

/// Dedicated worker thread draining operations against one connection in FIFO order.
///
/// Dropping the handle lets the worker finish everything already queued, then joins it.
pub struct SqlDelayThread {
    sender: Sender<Command>,
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl SqlDelayThread {
    /// Spawn the worker thread for `conn`.
    ///
    /// # Errors
    /// Returns [`SqlDelayError::ConnectionError`] if the thread cannot be spawned.
    pub fn spawn(conn: SharedConnection, config: &DelayThreadConfig) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let name = format!("{}-{}", config.thread_name, conn.name());
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_delay_loop(&conn, &receiver))
            .map_err(|err| {
                SqlDelayError::ConnectionError(format!("failed to spawn delay thread: {err}"))
            })?;

        tracing::debug!(thread = %name, "delay thread started");
        Ok(Self {
            sender,
            handle: Some(handle),
            name,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Dispatcher for SqlDelayThread {
    fn enqueue(&self, op: SqlOperation) -> Result<()> {
        self.sender.send(Command::Execute(op)).map_err(|_| {
            tracing::error!(thread = %self.name, "delay thread closed, operation dropped");
            SqlDelayError::ConnectionError("delay thread closed".into())
        })
    }
}

impl fmt::Debug for SqlDelayThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlDelayThread")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for SqlDelayThread {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(thread = %self.name, "delay thread panicked");
            }
        }
    }
}

fn run_delay_loop(conn: &SharedConnection, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::Execute(op) => {
                let kind = op.kind();
                // A failed operation never stops the queue.
                if let Err(err) = op.execute(conn) {
                    tracing::warn!(
                        connection = conn.name(),
                        kind,
                        error = %err,
                        "delayed operation failed"
                    );
                }
            }
        }
    }
    tracing::debug!(connection = conn.name(), "delay thread stopped");
}
