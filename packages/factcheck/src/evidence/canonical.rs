//! URL canonicalization for citation deduplication.

use url::Url;

/// Query parameters that only track where a click came from.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "gbraid", "wbraid", "msclkid", "yclid", "igshid", "mc_cid",
    "mc_eid", "_ga", "_gl", "ref", "ref_src", "ref_url", "cmpid", "ocid", "smid", "amp",
];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Canonical form of an http(s) URL, or `None` for anything else.
///
/// - scheme forced to `https`, host lowercased, leading `www.` dropped
/// - default ports, fragment and tracking parameters removed
/// - remaining parameters sorted
/// - trailing slash removed from non-root paths
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        return None;
    }

    url.set_scheme("https").ok()?;
    url.set_host(Some(&host)).ok()?;
    if matches!(url.port(), Some(80) | Some(443)) {
        url.set_port(None).ok()?;
    }
    url.set_fragment(None);
    let _ = url.set_username("");
    let _ = url.set_password(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

/// Host of a canonical URL (already lowercase, without `www.`).
pub fn canonical_host(canonical: &str) -> Option<String> {
    Url::parse(canonical)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonicalize_url() {
        assert_eq!(
            canonicalize_url("HTTP://WWW.Example.Org/Page/?utm_source=x&b=2&a=1#top").as_deref(),
            Some("https://example.org/Page?a=1&b=2")
        );
        assert_eq!(
            canonicalize_url("https://example.org:443/").as_deref(),
            Some("https://example.org/")
        );
        assert_eq!(
            canonicalize_url("https://example.org/a?fbclid=abc").as_deref(),
            Some("https://example.org/a")
        );
    }

    #[test]
    fn test_rejects_non_web_urls() {
        assert!(canonicalize_url("ftp://example.org/file").is_none());
        assert!(canonicalize_url("mailto:someone@example.org").is_none());
        assert!(canonicalize_url("not a url").is_none());
    }

    #[test]
    fn test_keeps_meaningful_params() {
        assert_eq!(
            canonicalize_url("https://news.example.com/item?id=42").as_deref(),
            Some("https://news.example.com/item?id=42")
        );
    }

    #[test]
    fn test_canonical_host() {
        assert_eq!(
            canonical_host("https://reuters.com/x").as_deref(),
            Some("reuters.com")
        );
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_canonicalization_is_idempotent(
            host in segment(),
            path in proptest::collection::vec(segment(), 0..4),
            params in proptest::collection::vec((segment(), segment()), 0..4),
            slash in any::<bool>(),
        ) {
            let mut raw = format!("http://www.{}.com/{}", host, path.join("/"));
            if slash && !path.is_empty() {
                raw.push('/');
            }
            if !params.is_empty() {
                let query: Vec<String> =
                    params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                raw.push('?');
                raw.push_str(&query.join("&"));
            }
            let once = canonicalize_url(&raw).unwrap();
            prop_assert_eq!(canonicalize_url(&once).unwrap(), once);
        }

        #[test]
        fn prop_tracking_and_case_do_not_matter(
            host in segment(),
            path in segment(),
            campaign in segment(),
        ) {
            let plain = format!("https://{}.org/{}", host, path);
            let noisy = format!(
                "HTTP://WWW.{}.ORG/{}/?utm_campaign={}&fbclid={}#frag",
                host.to_uppercase(),
                path,
                campaign,
                campaign
            );
            prop_assert_eq!(canonicalize_url(&plain), canonicalize_url(&noisy));
        }
    }
}
