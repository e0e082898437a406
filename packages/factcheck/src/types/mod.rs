//! Strongly-typed records passed between pipeline stages.

pub mod citation;
pub mod claim;
pub mod config;
pub mod content;
pub mod input;
pub mod report;
pub mod verdict;
