use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Credentials and endpoints loaded from environment variables. Pipeline
/// tuning is read separately from `FACTCHECK_*` variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: Option<String>,
    pub tavily_api_key: Option<String>,
    pub google_factcheck_api_key: Option<String>,
    pub firecrawl_api_key: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_model: optional("OPENAI_MODEL"),
            tavily_api_key: optional("TAVILY_API_KEY"),
            google_factcheck_api_key: optional("GOOGLE_FACTCHECK_API_KEY"),
            firecrawl_api_key: optional("FIRECRAWL_API_KEY"),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
