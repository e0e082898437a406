//! Google Fact Check Tools `claims:search`.
//!
//! Each published review of a matching claim becomes one hit, carrying the
//! reviewer as publisher and its textual rating.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::security::SecretString;
use crate::text::truncate_chars;
use crate::traits::searcher::{SearchHit, SearchProvider};

const DEFAULT_BASE_URL: &str = "https://factchecktools.googleapis.com/v1alpha1";
const PROVIDER: &str = "google_factcheck";
const CLAIM_TEXT_CHARS: usize = 150;

/// Published fact-check reviews from Google's Fact Check Tools API.
#[derive(Debug, Clone)]
pub struct GoogleFactCheckProvider {
    api_key: SecretString,
    base_url: String,
    language_code: Option<String>,
    page_size: u32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ClaimsSearchResponse {
    #[serde(default)]
    claims: Vec<FactCheckedClaim>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FactCheckedClaim {
    #[serde(default)]
    text: String,
    #[serde(default)]
    claim_review: Vec<ClaimReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimReview {
    #[serde(default)]
    publisher: Option<Publisher>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    review_date: Option<String>,
    #[serde(default)]
    textual_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    site: Option<String>,
}

impl GoogleFactCheckProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            language_code: None,
            page_size: 10,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Restrict reviews to one language, e.g. `pt` or `en-US`.
    pub fn with_language_code(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

#[async_trait]
impl SearchProvider for GoogleFactCheckProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn is_fact_check_source(&self) -> bool {
        true
    }

    async fn search(&self, query: &str) -> SearchResult<Vec<SearchHit>> {
        if self.api_key.is_blank() {
            return Err(SearchError::NotConfigured {
                provider: PROVIDER.to_string(),
                reason: "API key is empty".to_string(),
            });
        }

        let mut params = vec![
            ("query", query.to_string()),
            ("key", self.api_key.expose().to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(code) = &self.language_code {
            params.push(("languageCode", code.clone()));
        }

        // `without_url` keeps the API key out of error messages.
        let response = self
            .client
            .get(format!("{}/claims:search", self.base_url.trim_end_matches('/')))
            .query(&params)
            .send()
            .await
            .map_err(|e| SearchError::Http {
                provider: PROVIDER.to_string(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let body: ClaimsSearchResponse =
            response.json().await.map_err(|e| SearchError::Decode {
                provider: PROVIDER.to_string(),
                message: e.without_url().to_string(),
            })?;

        let hits = into_hits(body);
        debug!(provider = PROVIDER, reviews = hits.len(), "Fact-check search completed");
        Ok(hits)
    }
}

fn into_hits(response: ClaimsSearchResponse) -> Vec<SearchHit> {
    response
        .claims
        .into_iter()
        .flat_map(|claim| {
            let text = claim.text;
            claim
                .claim_review
                .into_iter()
                .filter_map(move |review| review_hit(&text, review))
        })
        .collect()
}

fn review_hit(claim_text: &str, review: ClaimReview) -> Option<SearchHit> {
    if review.url.trim().is_empty() {
        return None;
    }

    let claim_text = truncate_chars(claim_text.trim(), CLAIM_TEXT_CHARS);
    let title = review
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("Fact-check: {}", truncate_chars(&claim_text, 50)));
    let rating = review
        .textual_rating
        .filter(|r| !r.trim().is_empty());
    let snippet = format!(
        "Fact-check verdict: {}. Original claim: {}",
        rating.as_deref().unwrap_or("Unknown"),
        claim_text
    );

    let mut hit = SearchHit::new(review.url, title).with_snippet(snippet);
    if let Some(publisher) = review
        .publisher
        .and_then(|p| p.name.or(p.site))
        .filter(|p| !p.trim().is_empty())
    {
        hit = hit.with_publisher(publisher);
    }
    if let Some(rating) = rating {
        hit = hit.with_rating(rating);
    }
    if let Some(date) = review.review_date {
        hit = hit.with_published_at(date);
    }
    Some(hit)
}
