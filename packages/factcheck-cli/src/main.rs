//! Command-line front end for the fact-check pipeline.
//!
//! Reads one message from the arguments, runs it through the pipeline, and
//! prints the report as JSON on stdout. Logs go to stderr.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use factcheck::{
    BrowserRuntime, ChromeRuntime, FirecrawlRuntime, GoogleFactCheckProvider, OpenAIGenerator,
    Orchestrator, PipelineConfig, RawInput, TavilyProvider,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "factcheck")]
#[command(about = "Check the factual claims in a message against retrieved sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fact-check one message
    Check {
        /// Message text
        text: String,

        /// Link attached to the message (repeatable)
        #[arg(long = "link")]
        links: Vec<String>,

        /// Text recognised from an attached image
        #[arg(long)]
        ocr: Option<String>,

        /// Locale tag such as pt-BR or en; detected when omitted
        #[arg(long, default_value = "")]
        locale: String,

        #[arg(long, default_value = "cli")]
        channel: String,

        /// Defaults to a fresh UUIDv7
        #[arg(long)]
        message_id: Option<String>,

        /// RFC 3339 receive time; defaults to now
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Print the effective pipeline configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,factcheck=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("invalid FACTCHECK_* configuration")?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Check {
            text,
            links,
            ocr,
            locale,
            channel,
            message_id,
            timestamp,
        } => {
            let settings = Settings::from_env()?;
            let orchestrator = build_orchestrator(config, &settings)?;

            let message_id = message_id.unwrap_or_else(|| Uuid::now_v7().to_string());
            let mut input = RawInput::new(channel, message_id, text)
                .with_locale(locale)
                .with_links(links)
                .with_timestamp(timestamp.unwrap_or_else(Utc::now));
            if let Some(ocr) = ocr {
                input = input.with_ocr_text(ocr);
            }

            let report = orchestrator
                .process(input)
                .await
                .context("message rejected")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn build_orchestrator(config: PipelineConfig, settings: &Settings) -> Result<Orchestrator> {
    let mut generator = OpenAIGenerator::new(&settings.openai_api_key);
    if let Some(model) = &settings.openai_model {
        generator = generator.with_model(model);
    }
    let mut builder = Orchestrator::builder(config).with_generator(Arc::new(generator));

    if let Some(key) = &settings.google_factcheck_api_key {
        builder = builder.with_provider(Arc::new(GoogleFactCheckProvider::new(key)));
    }
    if let Some(key) = &settings.tavily_api_key {
        builder = builder.with_provider(Arc::new(TavilyProvider::new(key)));
    }
    if settings.google_factcheck_api_key.is_none() && settings.tavily_api_key.is_none() {
        tracing::warn!("No search provider configured; every claim will be unverifiable");
    }

    let chrome = ChromeRuntime::discover();
    if chrome.is_available() {
        builder = builder.with_browser(Arc::new(chrome));
    } else if let Some(key) = &settings.firecrawl_api_key {
        builder = builder.with_browser(Arc::new(FirecrawlRuntime::new(key)));
    } else {
        tracing::info!("No browser runtime available; JavaScript-only pages will fail");
    }

    builder.build().context("failed to build pipeline")
}
