//! Approximate text matching used to rank documents against a free text query.
//!
//! Text is lower-cased and split into alphanumeric tokens. A query term matches a token when
//! the token starts with it or when their edit distance fits the term's budget: no edits for
//! terms of up to two characters, one for up to five, two beyond. Matches in slugs and item
//! names weigh twice as much as matches in descriptions.

use std::cmp::Ordering;

use crate::types::{Document, Item, SearchResult};

pub const SLUG_BOOST: f64 = 2.0;

pub const NAME_BOOST: f64 = 2.0;

pub const DESCRIPTION_BOOST: f64 = 1.0;

/// Splits `text` into lower-cased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Returns the number of edits a term of `term_len` characters tolerates.
fn edit_budget(term_len: usize) -> usize {
    match term_len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous = (0..=b.len()).collect::<Vec<_>>();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Similarity in `(0, 1]` of a term and a token, `None` when they do not match.
fn similarity(term: &str, token: &str) -> Option<f64> {
    if token.starts_with(term) {
        return Some(1.0);
    }

    let term = term.chars().collect::<Vec<_>>();
    let token = token.chars().collect::<Vec<_>>();
    let distance = levenshtein(&term, &token);
    if distance > edit_budget(term.len()) {
        return None;
    }

    let max_len = term.len().max(token.len()) as f64;
    Some(1.0 - distance as f64 / max_len)
}

/// Sums, over the terms, the best similarity reached against any token of `field`.
fn field_score(terms: &[String], field: &str) -> f64 {
    let tokens = tokenize(field);

    terms
        .iter()
        .map(|term| {
            tokens
                .iter()
                .filter_map(|token| similarity(term, token))
                .fold(0.0, f64::max)
        })
        .sum()
}

/// Scores an item as its best boosted field.
pub fn score_item(terms: &[String], item: &Item) -> f64 {
    [
        field_score(terms, &item.slug) * SLUG_BOOST,
        field_score(terms, &item.name) * NAME_BOOST,
        field_score(terms, &item.description) * DESCRIPTION_BOOST,
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

/// Scores a document as its best item, `None` when no item matches.
pub fn score_document(terms: &[String], document: &Document) -> Option<f64> {
    let score = document
        .items
        .iter()
        .map(|item| score_item(terms, item))
        .fold(0.0, f64::max);

    (score > 0.0).then_some(score)
}

/// Orders results by descending score, then ascending owner id.
pub fn rank(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
}
