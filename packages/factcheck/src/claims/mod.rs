//! Claim Extractor: isolates normalized, independently verifiable claims
//! from a message and the content of its links.

pub mod extractor;
pub mod normalize;
pub mod prompts;

pub use extractor::{ClaimExtractor, ClaimRequest, ClaimsResponse, ExtractedClaim};
