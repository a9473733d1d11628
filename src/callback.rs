use std::fmt;

/// Single-use continuation carrying a result from the delay thread back to the issuing thread.
///
/// The result is attached once on the delay thread; the handler runs once on whichever thread
/// drains the [`crate::SqlResultQueue`] the callback was published to.
pub struct QueryCallback<T> {
    result: Option<T>,
    handler: Box<dyn FnOnce(T) + Send>,
}

impl<T: Send + 'static> QueryCallback<T> {
    pub fn new(handler: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            result: None,
            handler: Box::new(handler),
        }
    }

    /// Attach the producer-side result. A second call replaces the first.
    pub fn set_result(&mut self, result: T) {
        if self.result.is_some() {
            tracing::warn!("query callback result overwritten before delivery");
        }
        self.result = Some(result);
    }
}

impl<T> fmt::Debug for QueryCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCallback")
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

/// Type-erased callback as stored in the result queue.
pub trait PendingCallback: Send {
    /// Run the continuation, consuming it.
    fn invoke(self: Box<Self>);
}

impl<T: Send + 'static> PendingCallback for QueryCallback<T> {
    fn invoke(self: Box<Self>) {
        let QueryCallback { result, handler } = *self;
        match result {
            Some(result) => handler(result),
            None => tracing::error!("query callback invoked without a result, dropping it"),
        }
    }
}
