//! Hosted rendering through the Firecrawl scrape API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::security::SecretString;
use crate::traits::browser::{BrowserRuntime, RenderedPage};
use crate::traits::fetcher::FetchLimits;

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Renders pages remotely; usable only when an API key is configured.
#[derive(Debug, Clone)]
pub struct FirecrawlRuntime {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'a str; 1],
    /// Milliseconds
    timeout: u64,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    html: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    /// Address after redirects
    url: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
}

impl ScrapeData {
    /// Where the scrape landed, falling back to `requested`.
    fn landed_on(&self, requested: &Url) -> Url {
        self.metadata
            .as_ref()
            .and_then(|m| m.url.as_deref().or(m.source_url.as_deref()))
            .and_then(|u| Url::parse(u).ok())
            .unwrap_or_else(|| requested.clone())
    }
}

impl FirecrawlRuntime {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            base_url: FIRECRAWL_API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl BrowserRuntime for FirecrawlRuntime {
    fn name(&self) -> &str {
        "firecrawl"
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_blank()
    }

    async fn render(&self, url: &Url, limits: &FetchLimits) -> FetchResult<RenderedPage> {
        let timeout = limits.timeout;
        if !self.is_available() {
            return Err(FetchError::Runtime("Firecrawl API key is empty".to_string()));
        }

        let request = ScrapeRequest {
            url: url.as_str(),
            formats: ["html"],
            timeout: timeout.as_millis() as u64,
        };

        let response = self
            .client
            .post(format!("{}/scrape", self.base_url.trim_end_matches('/')))
            .bearer_auth(self.api_key.expose())
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Runtime(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Runtime(format!(
                "Firecrawl API error: HTTP {}",
                status.as_u16()
            )));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Runtime(format!("Firecrawl response decode failed: {}", e)))?;

        if !body.success {
            return Err(FetchError::Runtime(
                body.error
                    .unwrap_or_else(|| "Firecrawl scrape failed".to_string()),
            ));
        }

        let data = body
            .data
            .ok_or_else(|| FetchError::Runtime("Firecrawl returned no HTML".to_string()))?;
        let landed = data.landed_on(url);
        let mut html = data
            .html
            .filter(|html| !html.trim().is_empty())
            .ok_or_else(|| FetchError::Runtime("Firecrawl returned no HTML".to_string()))?;
        if html.len() > limits.max_bytes {
            let mut end = limits.max_bytes;
            while !html.is_char_boundary(end) {
                end -= 1;
            }
            html.truncate(end);
        }
        Ok(RenderedPage { url: landed, html })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_unavailable() {
        assert!(!FirecrawlRuntime::new("  ").is_available());
        assert!(FirecrawlRuntime::new("fc-key").is_available());
    }

    #[test]
    fn test_debug_redacts_key() {
        let runtime = FirecrawlRuntime::new("fc-secret");
        assert!(!format!("{:?}", runtime).contains("fc-secret"));
    }

    #[tokio::test]
    async fn test_render_without_key_fails_fast() {
        let runtime = FirecrawlRuntime::new("");
        let url = Url::parse("https://example.com/").unwrap();
        let err = runtime
            .render(
                &url,
                &FetchLimits {
                    timeout: std::time::Duration::from_secs(1),
                    max_bytes: 1024,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Runtime(_)));
    }

    #[test]
    fn test_response_decoding() {
        let body: ScrapeResponse = serde_json::from_str(
            r#"{"success":true,"data":{"html":"<html><body>hi</body></html>","metadata":{}}}"#,
        )
        .unwrap();
        assert!(body.success);
        assert_eq!(
            body.data.and_then(|d| d.html).as_deref(),
            Some("<html><body>hi</body></html>")
        );
    }

    #[test]
    fn test_landing_url_comes_from_metadata() {
        let requested = Url::parse("https://short.example/x").unwrap();
        let data: ScrapeData = serde_json::from_value(serde_json::json!({
            "html": "<p>hi</p>",
            "metadata": {
                "url": "http://169.254.169.254/latest",
                "sourceURL": "https://short.example/x"
            }
        }))
        .unwrap();
        assert_eq!(data.landed_on(&requested).as_str(), "http://169.254.169.254/latest");

        let bare: ScrapeData = serde_json::from_str(r#"{"html":"<p>hi</p>"}"#).unwrap();
        assert_eq!(bare.landed_on(&requested), requested);
    }
}
