//! Circuit breakers around external dependencies.
//!
//! A breaker counts consecutive failures inside a sliding window. Reaching the
//! threshold opens it: calls are rejected without I/O until the cool-down
//! elapses, after which a single trial call is let through (half-open). A
//! successful trial closes the breaker; a failed one reopens it.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BreakerError;
use crate::types::config::BreakerConfig;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Closed,
    Open { until: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Inner {
    mode: Mode,
    /// Timestamps of consecutive failures, oldest first.
    failures: VecDeque<Instant>,
}

/// Breaker for one named dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                mode: Mode::Closed,
                failures: VecDeque::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.lock();
        match inner.mode {
            Mode::Closed => BreakerState::Closed,
            Mode::Open { until } if Instant::now() >= until => BreakerState::HalfOpen,
            Mode::Open { .. } => BreakerState::Open,
            Mode::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Run `fut` through the breaker with a time budget.
    ///
    /// Timeouts and errors for which `is_failure` returns true count against
    /// the breaker; other errors are returned without affecting it.
    pub async fn call<T, E, F>(
        &self,
        timeout: Duration,
        fut: F,
        is_failure: impl Fn(&E) -> bool,
    ) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let permit = self
            .try_acquire()
            .ok_or_else(|| BreakerError::Open(self.name.clone()))?;

        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(value)
            }
            Ok(Err(err)) => {
                if is_failure(&err) {
                    permit.failure();
                } else {
                    permit.success();
                }
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                permit.failure();
                Err(BreakerError::TimedOut(self.name.clone()))
            }
        }
    }

    /// Ask for permission to make one call. `None` when the breaker is open.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut inner = self.lock();
        let trial = match inner.mode {
            Mode::Closed => false,
            Mode::Open { until } if Instant::now() >= until => {
                debug!(breaker = %self.name, "Cool-down elapsed, allowing trial call");
                true
            }
            Mode::Open { .. } => return None,
            Mode::HalfOpen { trial_in_flight } if trial_in_flight => return None,
            Mode::HalfOpen { .. } => true,
        };
        if trial {
            inner.mode = Mode::HalfOpen {
                trial_in_flight: true,
            };
        }
        Some(Permit::new(self, trial))
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.lock();
        inner.failures.clear();
        if trial || matches!(inner.mode, Mode::HalfOpen { .. }) {
            info!(breaker = %self.name, "Circuit closed");
            inner.mode = Mode::Closed;
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        if trial {
            warn!(breaker = %self.name, "Trial call failed, reopening circuit");
            inner.mode = Mode::Open {
                until: now + self.config.cooldown,
            };
            return;
        }

        // A late failure from a call admitted before the breaker opened
        // doesn't extend the cool-down.
        if !matches!(inner.mode, Mode::Closed) {
            return;
        }

        inner.failures.push_back(now);
        while let Some(&oldest) = inner.failures.front() {
            if now.duration_since(oldest) > self.config.window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }

        if inner.failures.len() >= self.config.failure_threshold as usize {
            warn!(
                breaker = %self.name,
                failures = inner.failures.len(),
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit opened"
            );
            inner.failures.clear();
            inner.mode = Mode::Open {
                until: now + self.config.cooldown,
            };
        }
    }

    /// A trial permit dropped without an outcome (e.g. the call was
    /// cancelled) frees the half-open slot for the next caller.
    fn release_trial(&self) {
        let mut inner = self.lock();
        if let Mode::HalfOpen { trial_in_flight } = &mut inner.mode {
            *trial_in_flight = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Permission for one call. Report the outcome with [`Permit::success`] or
/// [`Permit::failure`].
#[must_use]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

/// All breakers of a process, created on first use by name.
///
/// Constructed once at startup and injected into the components that call
/// external dependencies.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// The breaker for `name`, created closed if it doesn't exist yet.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    /// Current state of every breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, BreakerState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
