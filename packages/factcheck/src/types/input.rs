//! Inbound message and its validated form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::InputError;
use crate::text;
use crate::types::config::InputLimits;

/// A user message as delivered by the messaging/HTTP layer.
///
/// Immutable once built; consumed once by `Orchestrator::process`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawInput {
    pub channel_id: String,
    pub message_id: String,

    /// Message body.
    pub text: String,

    /// Text recognised from an attached image, if any.
    #[serde(default)]
    pub ocr_text: Option<String>,

    /// BCP-47-ish locale tag (`pt-BR`, `en`, ...). Empty means "detect".
    #[serde(default)]
    pub locale: String,

    /// Links attached to the message by the inbound layer.
    #[serde(default)]
    pub links: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl RawInput {
    pub fn new(
        channel_id: impl Into<String>,
        message_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            text: text.into(),
            ocr_text: None,
            locale: String::new(),
            links: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_ocr_text(mut self, ocr: impl Into<String>) -> Self {
        self.ocr_text = Some(ocr.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.links.extend(links.into_iter().map(Into::into));
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }

    /// Check the message and resolve its locale and links.
    ///
    /// Links listed explicitly must parse as absolute http(s) URLs. URLs found
    /// in the body are appended after them; unparsable ones are ignored.
    pub fn validate(&self, limits: &InputLimits) -> Result<ValidatedInput, InputError> {
        if self.channel_id.trim().is_empty() {
            return Err(InputError::MissingField { field: "channel_id" });
        }
        if self.message_id.trim().is_empty() {
            return Err(InputError::MissingField { field: "message_id" });
        }

        let text = self.text.trim().to_string();
        let ocr_text = self
            .ocr_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        for candidate in std::iter::once(&text).chain(ocr_text.as_ref()) {
            let length = candidate.chars().count();
            if length > limits.max_text_length {
                return Err(InputError::TooLong {
                    length,
                    max: limits.max_text_length,
                });
            }
        }

        let mut links: Vec<Url> = Vec::new();
        for raw in &self.links {
            let url = parse_link(raw).ok_or_else(|| InputError::InvalidLink { url: raw.clone() })?;
            push_unique(&mut links, url);
        }
        for found in text::find_urls(&text) {
            if let Some(url) = parse_link(&found) {
                push_unique(&mut links, url);
            }
        }
        if links.len() > limits.max_links {
            tracing::debug!(
                found = links.len(),
                max = limits.max_links,
                "Dropping links beyond the per-message limit"
            );
            links.truncate(limits.max_links);
        }

        if text.is_empty() && ocr_text.is_none() && links.is_empty() {
            return Err(InputError::Empty);
        }

        let locale = Locale::parse(&self.locale);
        let language = locale.language().unwrap_or_else(|| {
            detect_language(&format!("{} {}", text, ocr_text.as_deref().unwrap_or("")))
        });

        Ok(ValidatedInput {
            channel_id: self.channel_id.clone(),
            message_id: self.message_id.clone(),
            text,
            ocr_text,
            locale,
            language,
            links,
            timestamp: self.timestamp,
        })
    }
}

fn parse_link(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Some(url),
        _ => None,
    }
}

fn push_unique(links: &mut Vec<Url>, url: Url) {
    if !links.contains(&url) {
        links.push(url);
    }
}

/// A `RawInput` that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    pub channel_id: String,
    pub message_id: String,
    pub text: String,
    pub ocr_text: Option<String>,
    pub locale: Locale,
    /// Language the pipeline writes its output in.
    pub language: Language,
    pub links: Vec<Url>,
    pub timestamp: DateTime<Utc>,
}

impl ValidatedInput {
    /// Message body followed by OCR text.
    pub fn merged_text(&self) -> String {
        match &self.ocr_text {
            Some(ocr) if self.text.is_empty() => ocr.clone(),
            Some(ocr) => format!("{}\n\n{}", self.text, ocr),
            None => self.text.clone(),
        }
    }
}

/// Requested locale, reduced to what the pipeline distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    Portuguese,
    English,
    /// No locale given; language was detected from the text.
    Detect,
    Unsupported(String),
}

impl Locale {
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return Self::Detect;
        }
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or(tag)
            .to_ascii_lowercase();
        match primary.as_str() {
            "pt" => Self::Portuguese,
            "en" => Self::English,
            _ => Self::Unsupported(tag.to_string()),
        }
    }

    /// Output language implied by the tag, `None` when it must be detected.
    pub fn language(&self) -> Option<Language> {
        match self {
            Self::Portuguese => Some(Language::Portuguese),
            Self::English | Self::Unsupported(_) => Some(Language::English),
            Self::Detect => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// Output language for claims and rationales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Portuguese,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Portuguese => "pt",
            Self::English => "en",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Portuguese => "Brazilian Portuguese",
            Self::English => "English",
        }
    }
}

/// Stopword-count heuristic. Ties go to Portuguese, the primary audience.
pub fn detect_language(text: &str) -> Language {
    let (en, pt) = text::stopword_hits(text);
    if en > pt {
        Language::English
    } else {
        Language::Portuguese
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> InputLimits {
        InputLimits::default()
    }

    #[test]
    fn test_validate_requires_identifiers() {
        let input = RawInput::new("", "m1", "hello");
        assert_eq!(
            input.validate(&limits()),
            Err(InputError::MissingField { field: "channel_id" })
        );
    }

    #[test]
    fn test_validate_rejects_empty_message() {
        let input = RawInput::new("c", "m", "   ").with_ocr_text("  ");
        assert_eq!(input.validate(&limits()), Err(InputError::Empty));
    }

    #[test]
    fn test_validate_rejects_long_text() {
        let input = RawInput::new("c", "m", "x".repeat(10_001));
        assert!(matches!(
            input.validate(&limits()),
            Err(InputError::TooLong { length: 10_001, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_link() {
        let input = RawInput::new("c", "m", "see").with_link("ftp://example.com/x");
        assert!(matches!(
            input.validate(&limits()),
            Err(InputError::InvalidLink { .. })
        ));
    }

    #[test]
    fn test_validate_merges_links_from_text() {
        let input = RawInput::new("c", "m", "Olha https://a.com/x e https://b.com/y")
            .with_link("https://a.com/x");
        let validated = input.validate(&limits()).unwrap();
        let links: Vec<_> = validated.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(links, vec!["https://a.com/x", "https://b.com/y"]);
    }

    #[test]
    fn test_link_only_message_is_valid() {
        let input = RawInput::new("c", "m", "").with_link("https://a.com/");
        assert!(input.validate(&limits()).is_ok());
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!(Locale::parse("pt-BR"), Locale::Portuguese);
        assert_eq!(Locale::parse("en_US"), Locale::English);
        assert_eq!(Locale::parse(""), Locale::Detect);
        assert_eq!(Locale::parse("es-AR"), Locale::Unsupported("es-AR".into()));
        assert_eq!(
            Locale::Unsupported("es".into()).language(),
            Some(Language::English)
        );
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(
            detect_language("The vaccine is not safe for the children"),
            Language::English
        );
        assert_eq!(
            detect_language("A vacina não é segura para as crianças"),
            Language::Portuguese
        );
    }

    #[test]
    fn test_merged_text() {
        let input = RawInput::new("c", "m", "body")
            .with_ocr_text("image words")
            .validate(&limits())
            .unwrap();
        assert_eq!(input.merged_text(), "body\n\nimage words");
    }
}
