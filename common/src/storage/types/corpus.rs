use serde::{Deserialize, Serialize};

use super::knowledge_entry::KnowledgeEntry;

/// Ordered reference corpus.
///
/// The first `verified_count` entries are the verified override set in their
/// original order; everything after them is bulk remote data in fetch order.
/// The only mutation offered is appending bulk entries, so the verified prefix
/// can never be evicted or reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    entries: Vec<KnowledgeEntry>,
    verified_count: usize,
}

impl Corpus {
    /// Builds `verified ++ remote`.
    pub fn new(verified: Vec<KnowledgeEntry>, remote: Vec<KnowledgeEntry>) -> Self {
        let verified_count = verified.len();
        let mut entries = verified;
        entries.extend(remote);
        Self {
            entries,
            verified_count,
        }
    }

    pub fn verified_only(verified: Vec<KnowledgeEntry>) -> Self {
        Self::new(verified, Vec::new())
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn verified(&self) -> &[KnowledgeEntry] {
        self.entries.get(..self.verified_count).unwrap_or_default()
    }

    pub fn remote(&self) -> &[KnowledgeEntry] {
        self.entries.get(self.verified_count..).unwrap_or_default()
    }

    pub const fn verified_count(&self) -> usize {
        self.verified_count
    }

    /// Number of bulk entries, which is also the offset a resumed fetch starts at.
    pub fn remote_count(&self) -> usize {
        self.entries.len().saturating_sub(self.verified_count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once the bulk portion holds at least `expected_remote_count` entries.
    pub fn is_complete(&self, expected_remote_count: usize) -> bool {
        self.remote_count() >= expected_remote_count
    }

    pub fn append_remote(&mut self, fetched: Vec<KnowledgeEntry>) {
        self.entries.extend(fetched);
    }

    /// A deserialized corpus is well-formed only if its prefix length fits.
    pub fn is_well_formed(&self) -> bool {
        self.verified_count <= self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(question.into(), format!("answer to {question}"))
    }

    fn questions(entries: &[KnowledgeEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.question.as_str()).collect()
    }

    #[test]
    fn test_verified_entries_form_the_prefix() {
        let corpus = Corpus::new(
            vec![entry("v1"), entry("v2")],
            vec![entry("r1"), entry("r2"), entry("r3")],
        );

        assert_eq!(corpus.verified_count(), 2);
        assert_eq!(questions(corpus.verified()), vec!["v1", "v2"]);
        assert_eq!(questions(corpus.remote()), vec!["r1", "r2", "r3"]);
        assert_eq!(corpus.remote_count(), 3);
        assert_eq!(corpus.len(), 5);
    }

    #[test]
    fn test_append_keeps_prefix_and_order() {
        let mut corpus = Corpus::new(vec![entry("v1")], vec![entry("r1")]);
        corpus.append_remote(vec![entry("r2"), entry("r3")]);

        assert_eq!(questions(corpus.entries()), vec!["v1", "r1", "r2", "r3"]);
        assert_eq!(questions(corpus.verified()), vec!["v1"]);
    }

    #[test]
    fn test_completeness_counts_only_remote_entries() {
        let corpus = Corpus::new(
            vec![entry("v1"), entry("v2")],
            (0..3).map(|i| entry(&format!("r{i}"))).collect(),
        );

        assert!(corpus.is_complete(3));
        assert!(!corpus.is_complete(4));
        assert!(Corpus::default().is_complete(0));
    }

    #[test]
    fn test_malformed_prefix_length_is_detected() {
        let corpus: Corpus = serde_json::from_value(serde_json::json!({
            "entries": [{ "question": "q", "answer": "a" }],
            "verified_count": 4
        }))
        .expect("shape deserializes");

        assert!(!corpus.is_well_formed());
        assert!(corpus.verified().is_empty());
        assert_eq!(corpus.remote_count(), 0);
    }
}
