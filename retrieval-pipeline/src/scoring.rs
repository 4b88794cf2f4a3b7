use std::{cmp::Ordering, collections::HashSet};

use common::storage::types::knowledge_entry::KnowledgeEntry;
use serde::{Deserialize, Serialize};

/// An item paired with its lexical relevance score.
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub item: T,
    pub score: f64,
}

impl<T> Scored<T> {
    pub const fn new(item: T, score: f64) -> Self {
        Self { item, score }
    }
}

/// Weights for combining question and context overlap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LexicalWeights {
    pub question: f64,
    pub context: f64,
}

impl Default for LexicalWeights {
    fn default() -> Self {
        Self {
            question: 0.7,
            context: 0.3,
        }
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard_sets(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Jaccard similarity of the lower-cased whitespace-separated word sets.
/// Zero when both sides are empty.
pub fn jaccard(a: &str, b: &str) -> f64 {
    jaccard_sets(&word_set(a), &word_set(b))
}

fn score_against(query: &HashSet<String>, entry: &KnowledgeEntry, weights: LexicalWeights) -> f64 {
    let question = jaccard_sets(query, &word_set(&entry.question));
    let context = jaccard_sets(query, &word_set(entry.context.as_deref().unwrap_or_default()));
    weights.question * question + weights.context * context
}

/// Scores every entry and returns the best `k`, highest first. Ties keep
/// corpus order.
pub fn rank<'a>(
    query: &str,
    entries: &'a [KnowledgeEntry],
    k: usize,
    weights: LexicalWeights,
) -> Vec<Scored<&'a KnowledgeEntry>> {
    if k == 0 {
        return Vec::new();
    }

    let query_words = word_set(query);
    let mut scored: Vec<_> = entries
        .iter()
        .map(|entry| Scored::new(entry, score_against(&query_words, entry, weights)))
        .collect();

    // `sort_by` is stable, so equal scores stay in corpus order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, context: Option<&str>) -> KnowledgeEntry {
        let entry = KnowledgeEntry::new(question.into(), format!("answer: {question}"));
        match context {
            Some(context) => entry.with_context(context),
            None => entry,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_jaccard_bounds() {
        assert!(approx(jaccard("Visa fees", "visa FEES"), 1.0));
        assert!(approx(jaccard("visa", "hostel"), 0.0));
        assert!(approx(jaccard("", ""), 0.0));
        assert!(approx(jaccard("   ", "visa"), 0.0));
        // {a, b} vs {b, c}: one shared word of three.
        assert!(approx(jaccard("a b", "b c"), 1.0 / 3.0));
    }

    #[test]
    fn test_jaccard_ignores_repeated_words_and_spacing() {
        assert!(approx(jaccard("fee  fee\tfee", "fee"), 1.0));
    }

    #[test]
    fn test_score_weights_question_and_context() {
        let entries = vec![
            entry("unrelated", Some("tuition fee")),
            entry("tuition fee", None),
        ];

        let ranked = rank("tuition fee", &entries, 2, LexicalWeights::default());

        let scores: Vec<_> = ranked
            .iter()
            .map(|s| (s.item.question.as_str(), s.score))
            .collect();
        assert!(matches!(
            scores.as_slice(),
            [("tuition fee", q), ("unrelated", c)] if approx(*q, 0.7) && approx(*c, 0.3)
        ));
    }

    #[test]
    fn test_rank_prefers_question_overlap() {
        let entries = vec![entry("visa", None), entry("scholarship eligibility", None)];

        let ranked = rank("scholarship", &entries, 1, LexicalWeights::default());

        assert_eq!(ranked.len(), 1);
        assert_eq!(
            ranked.first().map(|s| s.item.question.as_str()),
            Some("scholarship eligibility")
        );
        assert!(ranked.first().is_some_and(|s| s.score > 0.0));
    }

    #[test]
    fn test_rank_is_bounded_and_non_increasing() {
        let entries: Vec<_> = [
            "admission process",
            "admission fee",
            "hostel fee",
            "visa process",
            "admission",
        ]
        .into_iter()
        .map(|q| entry(q, Some("admission")))
        .collect();

        let ranked = rank("admission fee", &entries, 3, LexicalWeights::default());

        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|pair| match pair {
            [a, b] => a.score >= b.score,
            _ => true,
        }));
        assert_eq!(
            ranked.first().map(|s| s.item.question.as_str()),
            Some("admission fee")
        );
    }

    #[test]
    fn test_rank_ties_keep_corpus_order() {
        let entries = vec![
            entry("first", None),
            entry("second", None),
            entry("third", None),
        ];

        let ranked = rank("nothing matches", &entries, 10, LexicalWeights::default());

        let order: Vec<_> = ranked.iter().map(|s| s.item.question.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert!(ranked.iter().all(|s| approx(s.score, 0.0)));
    }

    #[test]
    fn test_rank_handles_empty_inputs() {
        assert!(rank("visa", &[], 5, LexicalWeights::default()).is_empty());
        let entries = vec![entry("visa", None)];
        assert!(rank("visa", &entries, 0, LexicalWeights::default()).is_empty());
        assert_eq!(rank("", &entries, 5, LexicalWeights::default()).len(), 1);
    }
}
