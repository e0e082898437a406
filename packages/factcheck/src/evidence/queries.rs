//! Search queries for a claim: the claim itself, then entity-focused variants.

use crate::text::{significant_tokens, tokenize, truncate_chars};
use crate::types::claim::Claim;

const MAX_QUERY_CHARS: usize = 300;
const TERMS_PER_ENTITY_QUERY: usize = 4;

pub fn build_queries(claim: &Claim, max_entity_queries: usize) -> Vec<String> {
    let mut queries = vec![truncate_chars(&claim.normalized_text, MAX_QUERY_CHARS)];
    let claim_terms = significant_tokens(&claim.normalized_text);

    for entity in claim
        .entities
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
    {
        if queries.len() > max_entity_queries {
            break;
        }
        let entity_tokens = tokenize(entity);
        let mut terms: Vec<&str> = Vec::new();
        for term in &claim_terms {
            if !entity_tokens.contains(term) && !terms.contains(&term.as_str()) {
                terms.push(term);
            }
            if terms.len() == TERMS_PER_ENTITY_QUERY {
                break;
            }
        }
        let query = if terms.is_empty() {
            entity.to_string()
        } else {
            format!("{} {}", entity, terms.join(" "))
        };
        if !queries.iter().any(|q| q.eq_ignore_ascii_case(&query)) {
            queries.push(query);
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::claim::ClaimId;

    fn claim(text: &str, entities: &[&str]) -> Claim {
        Claim {
            id: ClaimId::from_key(text),
            normalized_text: text.to_string(),
            key: text.to_lowercase(),
            entities: entities.iter().map(|e| e.to_string()).collect(),
            source_links: vec![],
            extraction_rationale: String::new(),
        }
    }

    #[test]
    fn test_claim_text_comes_first() {
        let queries = build_queries(
            &claim(
                "Vaccine X causes infertility in women",
                &["Vaccine X", "WHO", "Brazil"],
            ),
            2,
        );
        assert_eq!(
            queries,
            vec![
                "Vaccine X causes infertility in women",
                "Vaccine X causes infertility women",
                "WHO vaccine causes infertility women",
            ]
        );
    }

    #[test]
    fn test_no_entities_single_query() {
        assert_eq!(build_queries(&claim("Prices rose", &[]), 2).len(), 1);
    }

    #[test]
    fn test_duplicate_entity_queries_collapse() {
        let queries = build_queries(&claim("NASA", &["NASA", "nasa"]), 2);
        assert_eq!(queries, vec!["NASA"]);
    }
}
