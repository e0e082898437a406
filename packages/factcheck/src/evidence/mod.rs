//! Evidence Retrieval Engine: queries, concurrent provider calls, URL
//! canonicalization, deduplication and ranking.

pub mod canonical;
pub mod engine;
pub mod normalize;
pub mod queries;
pub mod rank;

pub use canonical::canonicalize_url;
pub use engine::EvidenceEngine;
