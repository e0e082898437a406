//! reqwest-backed HTTP fetcher.
//!
//! Sends a browser-like User-Agent (many news sites refuse bare clients),
//! follows at most 5 redirects (each re-checked by the URL guard), and reads
//! the body in chunks, stopping at the byte cap.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, FetchError, FetchResult, SecurityError};
use crate::security::UrlGuard;
use crate::traits::fetcher::{FetchLimits, FetchedPage, HttpFetcher};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_guard(UrlGuard::new())
    }

    /// Redirect targets are validated against `guard` before being followed.
    pub fn with_guard(guard: UrlGuard) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(redirect_policy(guard))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    async fn fetch(&self, url: &Url, limits: &FetchLimits) -> FetchResult<FetchedPage> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(limits.timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        if let Some(ct) = &content_type {
            if !is_textual(ct) {
                return Err(FetchError::UnsupportedContent(ct.clone()));
            }
        }

        let final_url = response.url().clone();
        let mut body: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_reqwest_error(url, e))?
        {
            let room = limits.max_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            url = %final_url,
            bytes = body.len(),
            truncated,
            "Fetched page"
        );

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&body).into_owned(),
            truncated,
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &Url, limits: &FetchLimits) -> FetchResult<FetchedPage> {
        // The per-request timeout covers the headers; the body read needs its
        // own bound.
        tokio::time::timeout(limits.timeout, self.fetch(url, limits))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
    }
}

fn redirect_policy(guard: UrlGuard) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= 5 {
            attempt.error("too many redirects")
        } else if let Err(e) = guard.validate(attempt.url()) {
            let reason = format!("{} ({})", attempt.url(), e);
            attempt.error(SecurityError::BlockedRedirect(reason))
        } else {
            attempt.follow()
        }
    })
}

fn map_reqwest_error(url: &Url, err: reqwest::Error) -> FetchError {
    if err.is_redirect() {
        let blocked = std::error::Error::source(&err)
            .and_then(|source| source.downcast_ref::<SecurityError>())
            .map(ToString::to_string);
        if let Some(reason) = blocked {
            return FetchError::Security(SecurityError::BlockedRedirect(reason));
        }
    }
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network(err.to_string())
    }
}

fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("text/") || ct.contains("html") || ct.contains("xml")
}
