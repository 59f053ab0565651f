//! Relevance-ranked text matching over note titles and content.
//!
//! The scorer is a plain term-frequency model: the query is tokenized the
//! same way as the indexed text (lowercase, split on non-alphanumerics),
//! and each occurrence of a query term contributes to the score, with
//! title hits weighted above content hits. A score of zero means no match.

/// Weight of a query term occurring in the title.
const TITLE_WEIGHT: f64 = 2.0;

/// Weight of a query term occurring in the content.
const CONTENT_WEIGHT: f64 = 1.0;

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Score a note's title and content against pre-tokenized query terms.
pub fn relevance(query: &[String], title: &str, content: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }

    let title_tokens = tokenize(title);
    let content_tokens = tokenize(content);

    let mut score = 0.0;
    for term in query {
        let title_hits = title_tokens.iter().filter(|t| *t == term).count() as f64;
        let content_hits = content_tokens.iter().filter(|t| *t == term).count() as f64;
        score += TITLE_WEIGHT * title_hits + CONTENT_WEIGHT * content_hits;
    }
    score
}
