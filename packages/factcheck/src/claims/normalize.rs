//! Claim text normalization, comparison keys and grounding checks.
//!
//! Submissions that differ only in case, accents, punctuation, plurals or
//! function words land on the same key. Word order and negation stay in the
//! key: "A beat B" and "B beat A" are different claims, and so are "X causes
//! Y" and "X does not cause Y".

use std::collections::BTreeSet;

use crate::text::{collapse_whitespace, is_stopword, tokenize};

/// Lead-ins that frame a claim without being part of it.
const FILLER_PREFIXES: &[&str] = &[
    "i heard that",
    "i read that",
    "i saw that",
    "they say that",
    "they are saying that",
    "people are saying that",
    "someone told me that",
    "is it true that",
    "apparently,",
    "apparently",
    "breaking:",
    "urgent:",
    "fyi,",
    "ouvi dizer que",
    "dizem que",
    "estao dizendo que",
    "estão dizendo que",
    "li que",
    "vi que",
    "é verdade que",
    "e verdade que",
    "parece que",
    "urgente:",
    "atenção:",
    "atencao:",
];

/// Words that flip a claim. Each one becomes [`NEGATION_MARKER`] in the key.
const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nor", "cannot", "none", "nothing", "nobody", "nao", "nunca", "nem",
    "jamais", "nenhum", "nenhuma", "ninguem",
];

const NEGATION_MARKER: &str = "neg";

/// Pronouns a claim may open with when the model failed to resolve them.
const LEADING_PRONOUNS: &[&str] = &[
    "it", "he", "she", "they", "ele", "ela", "eles", "elas",
];

/// Clean claim text: whitespace collapsed, filler lead-ins and trailing
/// punctuation removed, first letter capitalized.
pub fn normalize_claim_text(text: &str) -> String {
    let mut text = collapse_whitespace(text);

    loop {
        let lower = text.to_lowercase();
        let Some(prefix) = FILLER_PREFIXES
            .iter()
            .find(|p| lower.starts_with(*p) && at_word_boundary(&lower, p))
        else {
            break;
        };
        // Lowercasing can change byte lengths; cut by chars.
        let cut = prefix.chars().count();
        text = text.chars().skip(cut).collect::<String>().trim().to_string();
    }

    let text = text
        .trim_end_matches(['.', '!', '?', ';', ':', ','])
        .trim()
        .to_string();
    capitalize(&text)
}

/// Replace a leading pronoun with the first entity, when there is one.
pub fn resolve_leading_pronoun(text: &str, entities: &[String]) -> String {
    let Some(entity) = entities.iter().find(|e| !e.trim().is_empty()) else {
        return text.to_string();
    };
    let mut parts = text.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();
    if rest.is_empty() || !LEADING_PRONOUNS.contains(&first.to_lowercase().as_str()) {
        return text.to_string();
    }
    format!("{} {}", entity.trim(), rest)
}

/// Comparison key: stopword-free tokens in order, plurals folded and
/// negations marked.
pub fn claim_key(text: &str) -> String {
    let tokens = tokenize(text);
    let mut key: Vec<String> = Vec::with_capacity(tokens.len());
    let mut tokens = tokens.into_iter().peekable();
    while let Some(token) = tokens.next() {
        // "doesn't" tokenizes as "doesn" + "t".
        let contracted = token.ends_with('n') && tokens.peek().is_some_and(|next| next == "t");
        if contracted {
            tokens.next();
        }
        if contracted || NEGATIONS.contains(&token.as_str()) {
            key.push(NEGATION_MARKER.to_string());
            continue;
        }
        if is_stopword(&token) {
            continue;
        }
        key.push(fold_plural(token));
    }
    key.join(" ")
}

/// Share of the claim's key tokens that appear in `source`, in `[0, 1]`.
pub fn grounding_overlap(claim: &str, source: &str) -> f32 {
    let claim_tokens = key_tokens(claim);
    if claim_tokens.is_empty() {
        return 0.0;
    }
    let source_tokens: BTreeSet<String> = tokenize(source).into_iter().map(fold_plural).collect();
    let found = claim_tokens
        .iter()
        .filter(|t| source_tokens.contains(*t))
        .count();
    found as f32 / claim_tokens.len() as f32
}

/// Whether every token of `entity` occurs in `source`.
pub fn entity_in_source(entity: &str, source: &str) -> bool {
    let entity_tokens = key_tokens(entity);
    if entity_tokens.is_empty() {
        return false;
    }
    let source_tokens: BTreeSet<String> = tokenize(source).into_iter().map(fold_plural).collect();
    entity_tokens.iter().all(|t| source_tokens.contains(t))
}

/// Stopword-free token set for overlap checks. Single letters stay: "vaccine X" and "vaccine Y"
/// are different claims.
fn key_tokens(text: &str) -> BTreeSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .map(fold_plural)
        .collect()
}

/// `lower` continues past `prefix` and the prefix ends a word.
fn at_word_boundary(lower: &str, prefix: &str) -> bool {
    match lower[prefix.len()..].chars().next() {
        None => false,
        Some(next) => !next.is_alphanumeric() || prefix.ends_with([':', ',']),
    }
}

fn fold_plural(token: String) -> String {
    if token.chars().count() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
