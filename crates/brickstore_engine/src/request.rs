//! Request callbacks and the operation queue entries behind them.
//!
//! Every engine request reports through callbacks rather than futures: one
//! for success, one for failure. Callbacks run on the runtime after the
//! request's work is done and outside of any engine lock, so they may
//! freely place further requests on the same transaction.

use crate::error::{EngineError, EngineResult};
use crate::transaction::WorkArea;

/// A failure delivered to a request's error callback.
///
/// Unless the callback calls [`ErrorEvent::prevent_default`], the failure
/// aborts the transaction the request belongs to.
#[derive(Debug)]
pub struct ErrorEvent {
    error: EngineError,
    default_prevented: bool,
}

impl ErrorEvent {
    pub(crate) fn new(error: EngineError) -> Self {
        Self {
            error,
            default_prevented: false,
        }
    }

    /// The failure.
    #[must_use]
    pub fn error(&self) -> &EngineError {
        &self.error
    }

    /// Keeps the transaction alive despite this failure.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether [`Self::prevent_default`] was called.
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type ErrorFn = Box<dyn FnOnce(&mut ErrorEvent) + Send>;

/// Success and error callbacks of a single request.
pub struct RequestHandlers<T> {
    on_success: SuccessFn<T>,
    on_error: ErrorFn,
}

impl<T> RequestHandlers<T> {
    /// Creates handlers from two callbacks.
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(&mut ErrorEvent) + Send + 'static,
    {
        Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        }
    }

    /// Handlers that ignore the outcome.
    ///
    /// Failures are not prevented, so they still abort the transaction.
    #[must_use]
    pub fn ignore() -> Self
    where
        T: 'static,
    {
        Self::new(|_| {}, |_| {})
    }

    /// Invokes the matching callback.
    ///
    /// Returns the error if it should abort the transaction.
    pub(crate) fn deliver(self, result: EngineResult<T>) -> Option<EngineError> {
        match result {
            Ok(value) => {
                (self.on_success)(value);
                None
            }
            Err(error) => {
                let mut event = ErrorEvent::new(error);
                (self.on_error)(&mut event);
                if event.default_prevented {
                    None
                } else {
                    Some(event.error)
                }
            }
        }
    }
}

/// Callback to run once an operation's work is done, outside the state
/// lock. Returns an error that should abort the transaction.
pub(crate) type Delivery = Box<dyn FnOnce() -> Option<EngineError> + Send>;

/// An entry in a transaction's queue.
pub(crate) trait Operation: Send {
    /// Does the work against the locked state.
    fn run(self: Box<Self>, area: &mut WorkArea<'_>) -> Delivery;

    /// Reports that the operation will never run.
    fn cancel(self: Box<Self>, error: EngineError);
}

/// A one-shot request: a unit of work plus its handlers.
pub(crate) struct Request<T, F> {
    handlers: RequestHandlers<T>,
    work: F,
}

impl<T, F> Request<T, F> {
    pub(crate) fn new(handlers: RequestHandlers<T>, work: F) -> Self {
        Self { handlers, work }
    }
}

impl<T, F> Operation for Request<T, F>
where
    T: Send + 'static,
    F: FnOnce(&mut WorkArea<'_>) -> EngineResult<T> + Send + 'static,
{
    fn run(self: Box<Self>, area: &mut WorkArea<'_>) -> Delivery {
        let Request { handlers, work } = *self;
        let result = work(area);
        Box::new(move || handlers.deliver(result))
    }

    fn cancel(self: Box<Self>, error: EngineError) {
        // Nothing left to abort
        let _ = self.handlers.deliver(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn success_reports_no_error() {
        let seen = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&seen);
        let handlers = RequestHandlers::new(
            move |v: i32| flag.store(v == 7, Ordering::SeqCst),
            |_| {},
        );
        assert!(handlers.deliver(Ok(7)).is_none());
        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn unprevented_error_propagates() {
        let handlers = RequestHandlers::<()>::ignore();
        let error = handlers.deliver(Err(EngineError::ReadOnly));
        assert_eq!(error, Some(EngineError::ReadOnly));
    }

    #[test]
    fn prevented_error_is_swallowed() {
        let handlers = RequestHandlers::<()>::new(|_| {}, |event| {
            assert!(event.error().is_constraint());
            event.prevent_default();
        });
        assert!(handlers
            .deliver(Err(EngineError::constraint("dup")))
            .is_none());
    }
}
