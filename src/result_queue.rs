use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::callback::PendingCallback;

/// FIFO of completed callbacks waiting to run on the issuing thread.
///
/// The delay thread publishes; the owner drains on its own schedule. The lock only covers
/// queue mutation, callbacks always run with it released.
#[derive(Default)]
pub struct SqlResultQueue {
    queue: Mutex<VecDeque<Box<dyn PendingCallback>>>,
}

impl SqlResultQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a completed callback. Safe from any thread.
    pub fn publish(&self, callback: Box<dyn PendingCallback>) {
        self.entries().push_back(callback);
    }

    /// Pop and invoke callbacks on the calling thread until the queue is empty.
    ///
    /// Each pop is its own critical section; callbacks published while draining are run by the
    /// same call. Returns the number of callbacks invoked.
    pub fn drain(&self) -> usize {
        let mut invoked = 0;
        loop {
            let next = self.entries().pop_front();
            let Some(callback) = next else {
                break;
            };
            callback.invoke();
            invoked += 1;
        }
        if invoked > 0 {
            tracing::trace!(invoked, "drained result queue");
        }
        invoked
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<Box<dyn PendingCallback>>> {
        // A panicking callback never holds this lock, so poisoning only follows a panic inside
        // VecDeque itself; the data is still consistent.
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for SqlResultQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlResultQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::callback::QueryCallback;

    fn recording(
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> Box<dyn PendingCallback> {
        let log = Arc::clone(log);
        let mut cb = QueryCallback::new(move |(): ()| log.lock().unwrap().push(tag));
        cb.set_result(());
        Box::new(cb)
    }

    #[test]
    fn drain_runs_in_publish_order() {
        let queue = SqlResultQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.publish(recording(&log, "a"));
        queue.publish(recording(&log, "b"));
        queue.publish(recording(&log, "c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(), 3);
        assert!(queue.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn callbacks_run_outside_the_queue_lock() {
        let queue = Arc::new(SqlResultQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        // Publishing from inside a callback would deadlock if drain held the lock.
        let inner_queue = Arc::clone(&queue);
        let inner_log = Arc::clone(&log);
        let mut outer = QueryCallback::new(move |(): ()| {
            inner_log.lock().unwrap().push("outer");
            inner_queue.publish(recording(&inner_log, "inner"));
        });
        outer.set_result(());
        queue.publish(Box::new(outer));

        assert_eq!(queue.drain(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn callback_without_result_is_dropped() {
        let queue = SqlResultQueue::new();
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        queue.publish(Box::new(QueryCallback::new(move |(): ()| {
            *flag.lock().unwrap() = true;
        })));

        assert_eq!(queue.drain(), 1);
        assert!(!*ran.lock().unwrap());
    }
}
