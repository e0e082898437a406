//! Failure isolation for external dependencies.

pub mod breaker;

pub use breaker::{BreakerRegistry, BreakerState, CircuitBreaker, Permit};
