use std::fmt::{self, Write};
use std::sync::Arc;

use crate::callback::QueryCallback;
use crate::connection::SharedConnection;
use crate::delay_thread::Dispatcher;
use crate::error::{Result, SqlDelayError};
use crate::operation::{SqlOperation, SqlQueryHolderEx};
use crate::result_queue::SqlResultQueue;
use crate::results::QueryResult;

/// Longest SQL text a formatted query may render to.
pub const MAX_QUERY_LEN: usize = 32 * 1024;

#[derive(Debug, Default)]
struct QuerySlot {
    sql: Option<String>,
    result: Option<QueryResult>,
}

/// Indexed batch of queries executed together, with one result per slot.
///
/// Declare the slot count, fill slots with [`set_query`](Self::set_query), then either hand
/// the holder to the delay thread with [`submit_async`](Self::submit_async) or run it inline
/// with [`execute_sync`](Self::execute_sync). Empty slots are skipped. A failing query leaves
/// its slot without a result; the rest of the batch still runs.
///
/// ```rust
/// use sql_delay::{set_pquery, SqlQueryHolder};
///
/// let mut holder = SqlQueryHolder::new();
/// holder.set_query_slot_count(2);
/// holder.set_query(0, "SELECT name FROM characters").unwrap();
/// set_pquery!(holder, 1, "SELECT * FROM items WHERE owner = {}", 42).unwrap();
/// assert!(holder.set_query(0, "SELECT 1").is_err());
/// ```
#[derive(Debug)]
pub struct SqlQueryHolder {
    slots: Vec<QuerySlot>,
    max_query_len: usize,
}

impl Default for SqlQueryHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlQueryHolder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            max_query_len: MAX_QUERY_LEN,
        }
    }

    /// Override the bound applied by [`set_formatted_query`](Self::set_formatted_query).
    #[must_use]
    pub fn with_max_query_len(mut self, max_query_len: usize) -> Self {
        self.max_query_len = max_query_len;
        self
    }

    /// Declare how many slots the holder has. New slots start empty.
    pub fn set_query_slot_count(&mut self, count: usize) {
        self.slots.resize_with(count, QuerySlot::default);
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Store the SQL text for slot `index`.
    ///
    /// # Errors
    /// Returns [`SqlDelayError::ValidationError`] if `index` is out of range or the slot
    /// already holds a query. The holder is left unchanged.
    pub fn set_query(&mut self, index: usize, sql: impl Into<String>) -> Result<()> {
        let sql = sql.into();
        let size = self.slots.len();
        let Some(slot) = self.slots.get_mut(index) else {
            tracing::error!(index, size, %sql, "query index out of range");
            return Err(SqlDelayError::ValidationError(format!(
                "query index ({index}) out of range (size: {size})"
            )));
        };

        if let Some(existing) = &slot.sql {
            tracing::error!(index, old = %existing, new = %sql, "query slot already populated");
            return Err(SqlDelayError::ValidationError(format!(
                "query slot {index} already holds a query"
            )));
        }

        slot.sql = Some(sql);
        slot.result = None;
        Ok(())
    }

    /// Render `args` and store the text for slot `index`; see [`crate::set_pquery!`].
    ///
    /// # Errors
    /// Returns [`SqlDelayError::ValidationError`] if the rendered text would be longer than the
    /// holder's bound, plus every error of [`set_query`](Self::set_query). The slot is not
    /// touched on failure.
    pub fn set_formatted_query(&mut self, index: usize, args: fmt::Arguments<'_>) -> Result<()> {
        let mut buf = BoundedBuf::new(self.max_query_len);
        if buf.write_fmt(args).is_err() {
            tracing::error!(index, limit = self.max_query_len, "SQL query truncated, not stored");
            return Err(SqlDelayError::ValidationError(format!(
                "formatted query for slot {index} exceeds {} bytes",
                self.max_query_len
            )));
        }
        self.set_query(index, buf.into_inner())
    }

    /// Pending SQL text of a slot; `None` once released or never set.
    #[must_use]
    pub fn query(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|slot| slot.sql.as_deref())
    }

    /// Result stored for slot `index`.
    ///
    /// The first call releases the slot's SQL text. Every call returns the same stored result;
    /// use [`take_result`](Self::take_result) to move it out.
    pub fn get_result(&mut self, index: usize) -> Option<&QueryResult> {
        let slot = self.slots.get_mut(index)?;
        slot.sql = None;
        slot.result.as_ref()
    }

    /// Move the result of slot `index` out of the holder, releasing the slot's SQL text.
    pub fn take_result(&mut self, index: usize) -> Option<QueryResult> {
        let slot = self.slots.get_mut(index)?;
        slot.sql = None;
        slot.result.take()
    }

    /// Queue every populated slot on `dispatcher`. Once the batch ran, `callback` is published
    /// to `queue` carrying this holder back with its results filled in.
    ///
    /// # Errors
    /// Returns the dispatcher's error if it no longer accepts work; the holder is dropped in
    /// that case.
    pub fn submit_async<D>(
        self,
        callback: QueryCallback<SqlQueryHolder>,
        dispatcher: &D,
        queue: &Arc<SqlResultQueue>,
    ) -> Result<()>
    where
        D: Dispatcher + ?Sized,
    {
        let op = SqlQueryHolderEx::new(self, callback, queue);
        dispatcher.enqueue(SqlOperation::QueryHolderEx(op))
    }

    /// Run every populated slot inline on the calling thread. Returns the number of slots run.
    pub fn execute_sync(&mut self, conn: &SharedConnection) -> usize {
        let mut guard = conn.lock();
        self.fill_results(|index, sql| match guard.query(sql) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(index, sql, error = %err, "holder query failed");
                None
            }
        })
    }

    /// Store `run(index, sql)` as the result of every populated slot, in index order. Slots
    /// holding empty text count as unpopulated.
    pub(crate) fn fill_results<F>(&mut self, mut run: F) -> usize
    where
        F: FnMut(usize, &str) -> Option<QueryResult>,
    {
        let mut executed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(sql) = slot.sql.as_deref().filter(|sql| !sql.is_empty()) {
                slot.result = run(index, sql);
                executed += 1;
            }
        }
        executed
    }
}

/// Store a formatted query in a holder slot.
///
/// `set_pquery!(holder, index, "fmt", args...)` expands to
/// `holder.set_formatted_query(index, format_args!("fmt", args...))`.
#[macro_export]
macro_rules! set_pquery {
    ($holder:expr, $index:expr, $($arg:tt)+) => {
        $holder.set_formatted_query($index, ::std::format_args!($($arg)+))
    };
}

/// String sink that refuses to grow past a fixed length.
struct BoundedBuf {
    buf: String,
    limit: usize,
}

impl BoundedBuf {
    fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
        }
    }

    fn into_inner(self) -> String {
        self.buf
    }
}

impl Write for BoundedBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.buf.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.buf.push_str(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RowValues;

    fn holder(slots: usize) -> SqlQueryHolder {
        let mut holder = SqlQueryHolder::new();
        holder.set_query_slot_count(slots);
        holder
    }

    fn canned(sql: &str) -> Option<QueryResult> {
        let mut result = QueryResult::new(vec!["sql".into()]);
        result.add_row_values(vec![RowValues::Text(sql.into())]);
        Some(result)
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut h = holder(2);
        assert!(matches!(h.set_query(2, "SELECT 1"), Err(SqlDelayError::ValidationError(_))));
        assert_eq!(h.slot_count(), 2);
        assert!(h.query(0).is_none());
        assert!(h.query(1).is_none());
    }

    #[test]
    fn populated_slot_keeps_its_text() {
        let mut h = holder(1);
        h.set_query(0, "SELECT 1").unwrap();
        assert!(h.set_query(0, "SELECT 2").is_err());
        assert_eq!(h.query(0), Some("SELECT 1"));
    }

    #[test]
    fn formatted_query_respects_the_bound() {
        let mut h = holder(2).with_max_query_len(16);
        assert!(set_pquery!(h, 0, "SELECT {} FROM t", "ab").is_ok());
        assert_eq!(h.query(0), Some("SELECT ab FROM t"));

        let err = set_pquery!(h, 1, "SELECT {} FROM some_table", "column");
        assert!(matches!(err, Err(SqlDelayError::ValidationError(_))));
        assert!(h.query(1).is_none());
    }

    #[test]
    fn formatted_query_at_exact_bound_fits() {
        let mut h = holder(1).with_max_query_len(8);
        set_pquery!(h, 0, "SELECT {}", 1).unwrap();
        assert_eq!(h.query(0), Some("SELECT 1"));
    }

    #[test]
    fn get_result_releases_text_and_returns_same_result() {
        let mut h = holder(2);
        h.set_query(0, "SELECT 1").unwrap();
        h.fill_results(|_, sql| canned(sql));

        let first: *const QueryResult = h.get_result(0).unwrap();
        assert!(h.query(0).is_none());
        let second: *const QueryResult = h.get_result(0).unwrap();
        assert!(std::ptr::eq(first, second));

        assert!(h.get_result(1).is_none());
        assert!(h.get_result(5).is_none());
    }

    #[test]
    fn reusing_a_released_slot_drops_the_old_result() {
        let mut h = holder(1);
        h.set_query(0, "SELECT 1").unwrap();
        h.fill_results(|_, sql| canned(sql));
        assert!(h.get_result(0).is_some());

        h.set_query(0, "SELECT 2").unwrap();
        assert!(h.get_result(0).is_none());

        h.set_query(0, "SELECT 3").unwrap();
        h.fill_results(|_, sql| canned(sql));
        let result = h.get_result(0).unwrap();
        assert_eq!(result.scalar().and_then(RowValues::as_text), Some("SELECT 3"));
    }

    #[test]
    fn fill_skips_empty_slots() {
        let mut h = holder(3);
        h.set_query(0, "SELECT 1").unwrap();
        h.set_query(2, "SELECT 2").unwrap();

        let mut seen = Vec::new();
        let executed = h.fill_results(|index, sql| {
            seen.push((index, sql.to_owned()));
            if index == 2 { None } else { canned(sql) }
        });

        assert_eq!(executed, 2);
        assert_eq!(seen, vec![(0, "SELECT 1".to_owned()), (2, "SELECT 2".to_owned())]);
        assert!(h.take_result(0).is_some());
        assert!(h.take_result(0).is_none());
        assert!(h.get_result(2).is_none());
    }
}
