//! Capabilities the pipeline consumes from its hosting environment.
//!
//! Each external dependency sits behind a trait so tests (and other hosts)
//! can substitute their own implementation per case.

pub mod browser;
pub mod cache;
pub mod fetcher;
pub mod generator;
pub mod searcher;
