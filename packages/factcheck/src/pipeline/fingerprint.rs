//! Cache and single-flight keys.

use sha2::{Digest, Sha256};

use crate::evidence::canonicalize_url;
use crate::text::collapse_whitespace;
use crate::types::claim::Claim;
use crate::types::input::ValidatedInput;

const FIELD_SEPARATOR: u8 = 0x1f;

/// Key for a whole request: normalized body and OCR text, output language and
/// the canonical link set. Channel, message id and timestamp are ignored, so
/// the same message forwarded twice shares one key.
pub fn request_fingerprint(input: &ValidatedInput) -> String {
    let mut links: Vec<String> = input
        .links
        .iter()
        .map(|url| canonicalize_url(url.as_str()).unwrap_or_else(|| url.to_string()))
        .collect();
    links.sort();
    links.dedup();

    let mut hasher = Sha256::new();
    hasher.update(normalize_text(&input.text));
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(normalize_text(input.ocr_text.as_deref().unwrap_or("")));
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(input.language.code());
    for link in &links {
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(link);
    }
    format!("req:{}", hex::encode(hasher.finalize()))
}

/// Key for one claim's verdict: the claim's comparison key plus the domains
/// of its source links.
pub fn claim_fingerprint(claim: &Claim) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&claim.key);
    for domain in claim.domains() {
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(domain);
    }
    format!("claim:{}", hex::encode(hasher.finalize()))
}

fn normalize_text(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::claim::ClaimId;
    use crate::types::config::InputLimits;
    use crate::types::input::RawInput;

    fn validated(raw: RawInput) -> ValidatedInput {
        raw.validate(&InputLimits::default()).unwrap()
    }

    #[test]
    fn test_request_fingerprint_ignores_identifiers_and_spacing() {
        let a = validated(
            RawInput::new("c1", "m1", "Vaccine X  causes infertility").with_locale("en"),
        );
        let b = validated(
            RawInput::new("c2", "m9", " vaccine x causes\ninfertility ").with_locale("en"),
        );
        assert_eq!(request_fingerprint(&a), request_fingerprint(&b));
        assert!(request_fingerprint(&a).starts_with("req:"));
    }

    #[test]
    fn test_request_fingerprint_uses_canonical_links() {
        let a = validated(
            RawInput::new("c", "m", "see")
                .with_locale("en")
                .with_link("https://www.example.com/a?utm_source=wa")
                .with_link("https://other.org/b"),
        );
        let b = validated(
            RawInput::new("c", "m", "see")
                .with_locale("en")
                .with_link("https://other.org/b")
                .with_link("http://example.com/a"),
        );
        assert_eq!(request_fingerprint(&a), request_fingerprint(&b));
    }

    #[test]
    fn test_request_fingerprint_differs_by_language_and_text() {
        let en = validated(RawInput::new("c", "m", "text").with_locale("en"));
        let pt = validated(RawInput::new("c", "m", "text").with_locale("pt-BR"));
        let other = validated(RawInput::new("c", "m", "other text").with_locale("en"));
        assert_ne!(request_fingerprint(&en), request_fingerprint(&pt));
        assert_ne!(request_fingerprint(&en), request_fingerprint(&other));
    }

    #[test]
    fn test_claim_fingerprint_uses_key_and_domains() {
        let claim = |links: Vec<&str>| Claim {
            id: ClaimId::from_key("causes infertility vaccine women x"),
            normalized_text: "Vaccine X causes infertility in women".into(),
            key: "causes infertility vaccine women x".into(),
            entities: vec![],
            source_links: links.into_iter().map(String::from).collect(),
            extraction_rationale: String::new(),
        };
        let a = claim(vec!["https://www.reuters.com/a", "https://bbc.co.uk/b"]);
        let b = claim(vec!["https://bbc.co.uk/other", "https://reuters.com/c"]);
        let c = claim(vec![]);
        assert_eq!(claim_fingerprint(&a), claim_fingerprint(&b));
        assert_ne!(claim_fingerprint(&a), claim_fingerprint(&c));
    }
}
