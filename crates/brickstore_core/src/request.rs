//! Adapters from engine callbacks to awaitable results.
//!
//! Engine requests report through a pair of callbacks. Store operations
//! hand out a [`Pending`] future instead, settled exactly once through the
//! matching [`Deferred`]. Handlers built here always prevent the engine's
//! default abort, so a failed request only fails its own operation.

use crate::error::{StoreError, StoreResult};
use brickstore_engine::{ErrorEvent, RequestHandlers, Transaction};
use futures_channel::oneshot;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Creates a connected deferred/pending pair.
#[must_use]
pub fn deferred<T>() -> (Deferred<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (Deferred { sender }, Pending { receiver })
}

/// The settling side of a [`Pending`] result.
///
/// Dropping it unsettled resolves the pending side with
/// [`StoreError::Interrupted`].
#[derive(Debug)]
pub struct Deferred<T> {
    sender: oneshot::Sender<StoreResult<T>>,
}

impl<T> Deferred<T> {
    /// Settles with `result`.
    pub fn settle(self, result: StoreResult<T>) {
        // The caller may have stopped waiting.
        let _ = self.sender.send(result);
    }

    /// Settles with a value.
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    /// Settles with an error.
    pub fn reject(self, error: StoreError) {
        self.settle(Err(error));
    }
}

/// The outcome of a store operation, available once it settles.
///
/// The operation is already submitted when a `Pending` is handed out;
/// dropping it discards the outcome but does not cancel the operation.
#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<StoreResult<T>>,
}

impl<T> Future for Pending<T> {
    type Output = StoreResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(StoreError::Interrupted)),
            Poll::Pending => Poll::Pending,
        }
    }
}

type Slot<T> = Arc<Mutex<Option<Deferred<T>>>>;

fn settle<T>(slot: &Slot<T>, result: StoreResult<T>) {
    if let Some(deferred) = slot.lock().take() {
        deferred.settle(result);
    }
}

/// Request handlers that settle `deferred` as soon as the request reports.
///
/// Used for reads: their result does not depend on the commit.
pub(crate) fn wrap<T, U, F>(deferred: Deferred<U>, map: F) -> RequestHandlers<T>
where
    T: 'static,
    U: Send + 'static,
    F: FnOnce(T) -> StoreResult<U> + Send + 'static,
{
    let slot: Slot<U> = Arc::new(Mutex::new(Some(deferred)));
    let failed = Arc::clone(&slot);
    RequestHandlers::new(
        move |value| settle(&slot, map(value)),
        move |event: &mut ErrorEvent| {
            event.prevent_default();
            settle(&failed, Err(StoreError::from(event.error().clone())));
        },
    )
}

/// Result of a write, released when its transaction completes.
///
/// Requests record into it; the transaction's completion callback settles
/// the deferred with the recorded result on commit, or with the abort
/// cause otherwise.
pub(crate) struct Outcome<U> {
    result: Arc<Mutex<Option<StoreResult<U>>>>,
}

impl<U> Clone for Outcome<U> {
    fn clone(&self) -> Self {
        Self {
            result: Arc::clone(&self.result),
        }
    }
}

impl<U: Send + 'static> Outcome<U> {
    /// Ties `deferred` to the completion of `txn`.
    pub(crate) fn on_commit(txn: &Transaction, deferred: Deferred<U>) -> Self {
        let result: Arc<Mutex<Option<StoreResult<U>>>> = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&result);
        txn.on_complete(move |completion| {
            let recorded = recorded.lock().take();
            deferred.settle(match (completion, recorded) {
                (Ok(()), Some(result)) => result,
                (Ok(()), None) => Err(StoreError::Interrupted),
                (Err(_), Some(Err(error))) => Err(error),
                (Err(error), _) => Err(StoreError::UnderlyingFault(error)),
            });
        });
        Self { result }
    }

    /// Records the operation's result. Only the first record counts.
    pub(crate) fn record(&self, result: StoreResult<U>) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
    }

    /// Handlers that run `next` on success and record the failure otherwise.
    pub(crate) fn then<T, F>(&self, next: F) -> RequestHandlers<T>
    where
        T: 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let failed = self.clone();
        RequestHandlers::new(next, move |event: &mut ErrorEvent| {
            event.prevent_default();
            failed.record(Err(StoreError::from(event.error().clone())));
        })
    }

    /// Handlers that record `map` of the success value, or the failure.
    pub(crate) fn handlers<T, F>(&self, map: F) -> RequestHandlers<T>
    where
        T: 'static,
        F: FnOnce(T) -> StoreResult<U> + Send + 'static,
    {
        let done = self.clone();
        self.then(move |value| done.record(map(value)))
    }
}
