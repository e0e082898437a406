//! Search and fact-check provider clients.

pub mod google_factcheck;
pub mod tavily;

pub use google_factcheck::GoogleFactCheckProvider;
pub use tavily::{SearchDepth, TavilyProvider};
