//! Single-flight map: at most one computation per fingerprint.
//!
//! The first caller for a key starts the computation on its own task; later
//! callers for the same key join it and receive a clone of its result. A
//! waiter that goes away only stops waiting. The computation is cancelled
//! once no waiter is left.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Flight<T> {
    result: watch::Receiver<Option<T>>,
    /// Guarded by the map's shard lock: only changed inside `entry` or
    /// `remove_if` for this key.
    waiters: std::sync::atomic::AtomicUsize,
    cancel: CancellationToken,
}

pub struct InFlight<T> {
    flights: Arc<DashMap<String, Arc<Flight<T>>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the computation for `key`, starting it with `start` if none is
    /// running. `start` receives the flight's cancellation token.
    ///
    /// The check and the insert happen under one shard lock, so concurrent
    /// callers never start two computations for the same key.
    pub fn join_or_start<F, Fut>(&self, key: &str, start: F) -> Waiter<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        use std::sync::atomic::Ordering;

        let (flight, sender) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                let flight = entry.get().clone();
                flight.waiters.fetch_add(1, Ordering::SeqCst);
                debug!(key, "Joined in-flight computation");
                (flight, None)
            }
            Entry::Vacant(entry) => {
                let (sender, receiver) = watch::channel(None);
                let flight = Arc::new(Flight {
                    result: receiver,
                    waiters: std::sync::atomic::AtomicUsize::new(1),
                    cancel: CancellationToken::new(),
                });
                entry.insert(flight.clone());
                (flight, Some(sender))
            }
        };

        let joined = sender.is_none();
        if let Some(sender) = sender {
            let computation = start(flight.cancel.clone());
            let cancel = flight.cancel.clone();
            let flights = self.flights.clone();
            let owner = flight.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                tokio::select! {
                    result = computation => {
                        let _ = sender.send(Some(result));
                    }
                    _ = cancel.cancelled() => {
                        debug!(key = %key, "In-flight computation cancelled");
                    }
                }
                flights.remove_if(&key, |_, current| Arc::ptr_eq(current, &owner));
            });
        }

        Waiter {
            flight,
            flights: self.flights.clone(),
            key: key.to_string(),
            joined,
        }
    }

    /// Number of computations currently running.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

/// One caller's stake in a flight. Dropping it withdraws the caller.
pub struct Waiter<T> {
    flight: Arc<Flight<T>>,
    flights: Arc<DashMap<String, Arc<Flight<T>>>>,
    key: String,
    joined: bool,
}

impl<T: Clone> Waiter<T> {
    /// Whether this caller joined a computation started by another.
    pub fn joined(&self) -> bool {
        self.joined
    }

    /// The flight's result, or `None` if it was cancelled or panicked.
    pub async fn wait(&self) -> Option<T> {
        let mut receiver = self.flight.result.clone();
        let result = receiver.wait_for(Option::is_some).await.ok()?;
        result.clone()
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        use std::sync::atomic::Ordering;

        let flight = &self.flight;
        // Decrementing inside `remove_if` keeps it atomic with joins, which
        // increment under the same shard lock.
        let removed = self.flights.remove_if(&self.key, |_, current| {
            Arc::ptr_eq(current, flight)
                && flight.waiters.fetch_sub(1, Ordering::SeqCst) == 1
                && flight.result.borrow().is_none()
        });
        if removed.is_some() {
            debug!(key = %self.key, "Last waiter left; cancelling computation");
            flight.cancel.cancel();
        }
    }
}
