//! Headless browser runtimes for the heavy extraction strategy.

pub mod chrome;
pub mod firecrawl;

pub use chrome::ChromeRuntime;
pub use firecrawl::FirecrawlRuntime;
