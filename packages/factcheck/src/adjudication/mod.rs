//! Evidence-grounded adjudication.
//!
//! The model reports a stance per supplied source; the label is then decided
//! deterministically from those stances, the sources' authority tiers and
//! their publication dates.

pub mod adjudicator;
pub mod policy;
pub mod prompts;

pub use adjudicator::{AdjudicationResponse, Adjudicator};
pub use policy::{decide, Decision, Judgement, Resolution, Stance};
