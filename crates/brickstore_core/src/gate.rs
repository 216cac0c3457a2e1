//! Readiness gate between a store and its database connection.

use crate::error::StoreError;
use brickstore_engine::Connection;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// An operation waiting for the gate.
///
/// Called exactly once with the connection, or with the reason the store
/// failed to open.
pub(crate) type Starter = Box<dyn FnOnce(Result<&Connection, &StoreError>) + Send>;

enum GateState {
    Opening(VecDeque<Starter>),
    /// Settled; queued starters are still being run.
    Draining(Result<Connection, StoreError>, VecDeque<Starter>),
    Ready(Connection),
    Failed(StoreError),
}

/// Externally visible state of a store's readiness gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The database is still being opened.
    Opening,
    /// Operations start immediately.
    Ready,
    /// The store failed to open; operations are rejected.
    Failed(StoreError),
}

/// Holds operations until the database is open, then starts them in
/// submission order.
///
/// The gate settles exactly once. Starters never run under the gate lock,
/// so a starter may submit further operations. Anything submitted while the
/// queue drains joins the back of it and starts after every operation
/// queued before it.
pub(crate) struct Gate {
    state: Mutex<GateState>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Opening(VecDeque::new())),
        }
    }

    pub(crate) fn readiness(&self) -> Readiness {
        match &*self.state.lock() {
            GateState::Opening(_) => Readiness::Opening,
            GateState::Ready(_) | GateState::Draining(Ok(_), _) => Readiness::Ready,
            GateState::Failed(cause) | GateState::Draining(Err(cause), _) => {
                Readiness::Failed(cause.clone())
            }
        }
    }

    /// Starts `starter` now, or queues it until the gate settles.
    pub(crate) fn submit(&self, starter: Starter) {
        let outcome = {
            let mut state = self.state.lock();
            match &mut *state {
                GateState::Opening(queue) | GateState::Draining(_, queue) => {
                    queue.push_back(starter);
                    return;
                }
                GateState::Ready(conn) => Ok(conn.clone()),
                GateState::Failed(cause) => Err(cause.clone()),
            }
        };
        starter(outcome.as_ref());
    }

    /// Opens or fails the gate and starts every queued operation.
    pub(crate) fn settle(&self, outcome: Result<Connection, StoreError>) {
        let mut batch = {
            let mut state = self.state.lock();
            let GateState::Opening(queue) = &mut *state else {
                warn!("readiness gate settled twice; ignoring");
                return;
            };
            let queue = std::mem::take(queue);
            match &outcome {
                Ok(conn) => debug!(database = conn.name(), queued = queue.len(), "store ready"),
                Err(cause) => warn!(%cause, queued = queue.len(), "store failed to open"),
            }
            *state = GateState::Draining(outcome.clone(), VecDeque::new());
            queue
        };
        loop {
            for starter in batch {
                starter(outcome.as_ref());
            }
            let mut state = self.state.lock();
            let GateState::Draining(_, queue) = &mut *state else {
                return;
            };
            if queue.is_empty() {
                *state = match outcome {
                    Ok(conn) => GateState::Ready(conn),
                    Err(cause) => GateState::Failed(cause),
                };
                return;
            }
            batch = std::mem::take(queue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Starter {
        let log = Arc::clone(log);
        Box::new(move |outcome: Result<&Connection, &StoreError>| {
            let entry = match outcome {
                Ok(_) => format!("{label}:ok"),
                Err(cause) => format!("{label}:{cause}"),
            };
            log.lock().push(entry);
        })
    }

    #[test]
    fn failure_starts_queue_in_order_then_rejects_immediately() {
        let gate = Gate::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        gate.submit(recorder(&log, "a"));
        gate.submit(recorder(&log, "b"));
        assert!(log.lock().is_empty());
        assert_eq!(gate.readiness(), Readiness::Opening);

        gate.settle(Err(StoreError::unavailable("gone")));
        gate.submit(recorder(&log, "c"));

        assert_eq!(
            *log.lock(),
            vec![
                "a:store unavailable: gone",
                "b:store unavailable: gone",
                "c:store unavailable: gone",
            ]
        );
        assert_eq!(
            gate.readiness(),
            Readiness::Failed(StoreError::unavailable("gone"))
        );
    }

    #[test]
    fn starters_may_submit_to_the_gate() {
        let gate = Arc::new(Gate::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = recorder(&log, "a");
        let nested = recorder(&log, "c");
        let inner = Arc::clone(&gate);
        gate.submit(Box::new(move |outcome: Result<&Connection, &StoreError>| {
            first(outcome);
            inner.submit(nested);
        }));
        gate.submit(recorder(&log, "b"));
        gate.settle(Err(StoreError::unavailable("gone")));

        let late = recorder(&log, "d");
        let nested = recorder(&log, "e");
        let inner = Arc::clone(&gate);
        gate.submit(Box::new(move |outcome: Result<&Connection, &StoreError>| {
            late(outcome);
            inner.submit(nested);
        }));

        let labels: Vec<String> = log
            .lock()
            .iter()
            .map(|entry| entry[..1].to_string())
            .collect();
        assert_eq!(labels, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn settles_once() {
        let gate = Gate::new();
        gate.settle(Err(StoreError::InvalidRange));
        gate.settle(Err(StoreError::Interrupted));
        assert_eq!(gate.readiness(), Readiness::Failed(StoreError::InvalidRange));
    }
}
