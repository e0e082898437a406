//! Small text utilities shared by claim normalization, query building and
//! locale detection.

use std::sync::OnceLock;

use regex::Regex;

/// English and Portuguese function words. Used for claim keys, query terms
/// and the locale heuristic.
const STOPWORDS_EN: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "for", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "it", "its", "this", "that", "these",
    "those", "as", "not", "no", "do", "does", "did", "has", "have", "had", "will", "would",
    "can", "could", "they", "he", "she", "we", "you", "i", "his", "her", "their", "our",
    "your", "my", "so", "if", "than", "then", "there", "what", "which", "who",
];

const STOPWORDS_PT: &[&str] = &[
    "o", "a", "os", "as", "um", "uma", "uns", "umas", "de", "do", "da", "dos", "das", "em",
    "no", "na", "nos", "nas", "por", "pelo", "pela", "para", "com", "sem", "e", "ou", "mas",
    "que", "se", "nao", "foi", "sao", "ser", "esta", "este", "isso", "isto",
    "ele", "ela", "eles", "elas", "seu", "sua", "seus", "suas", "ao", "aos", "mais", "muito",
    "tem", "ter", "como", "quando", "onde", "ja", "so", "vai", "vao",
];

/// Characters that commonly terminate a URL pasted into prose.
const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"'`]+"#).expect("valid URL pattern"))
}

/// Find http(s) URLs in free text, in order of appearance, without
/// trailing punctuation.
pub fn find_urls(text: &str) -> Vec<String> {
    url_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(URL_TRAILING).to_string())
        .filter(|u| u.len() > "https://".len())
        .collect()
}

/// Fold Latin diacritics (the set that appears in Portuguese and Spanish).
pub fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Lowercased, diacritic-folded alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    fold_diacritics(&text.to_lowercase())
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS_EN.contains(&token) || STOPWORDS_PT.contains(&token)
}

/// Tokens that carry meaning: not stopwords, longer than one char.
pub fn significant_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() > 1 && !is_stopword(t))
        .collect()
}

/// Count of English and Portuguese stopword hits, in that order.
pub fn stopword_hits(text: &str) -> (usize, usize) {
    let tokens = tokenize(text);
    let en = tokens.iter().filter(|t| STOPWORDS_EN.contains(&t.as_str())).count();
    let pt = tokens.iter().filter(|t| STOPWORDS_PT.contains(&t.as_str())).count();
    (en, pt)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` chars, on a char boundary, appending an
/// ellipsis when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

/// Truncate to at most `max` chars without any marker.
pub fn clip_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls_strips_trailing_punctuation() {
        let urls = find_urls("Veja isso: https://g1.globo.com/a/b.html, e (https://x.org/y).");
        assert_eq!(urls, vec!["https://g1.globo.com/a/b.html", "https://x.org/y"]);
    }

    #[test]
    fn test_fold_and_tokenize() {
        assert_eq!(fold_diacritics("Vacinação não"), "Vacinacao nao");
        assert_eq!(tokenize("A vacina, causa!"), vec!["a", "vacina", "causa"]);
    }

    #[test]
    fn test_significant_tokens_drop_stopwords() {
        assert_eq!(
            significant_tokens("The vaccine causes infertility in women"),
            vec!["vaccine", "causes", "infertility", "women"]
        );
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("ação", 10), "ação");
        let cut = truncate_chars("abcdefghij", 8);
        assert_eq!(cut, "abcde...");
        assert!(cut.chars().count() <= 8);
    }
}
