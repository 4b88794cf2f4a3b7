use std::fmt::Write;

use common::storage::types::knowledge_entry::KnowledgeEntry;

/// Returned by [`build_context`] when nothing relevant was found.
pub const NO_CONTEXT_FOUND: &str =
    "No specific information found in the knowledge base for this query.";

const CONTEXT_HEADER: &str = "**Relevant Information from Knowledge Base:**\n\n";
const DIGEST_DEFAULT_TOPIC: &str = "General";

/// Renders retrieved entries as labelled blocks, in the order given.
pub fn build_context(entries: &[KnowledgeEntry]) -> String {
    if entries.is_empty() {
        return NO_CONTEXT_FOUND.to_string();
    }

    let mut context = String::from(CONTEXT_HEADER);
    for (index, entry) in entries.iter().enumerate() {
        if let Some(label) = entry.context_label() {
            let _ = writeln!(context, "**Context {}:** {label}", index.saturating_add(1));
        }
        let _ = writeln!(context, "**Q:** {}", entry.question);
        let _ = writeln!(context, "**A:** {}", entry.answer);
        if let Some(source) = entry.source_label() {
            let _ = writeln!(context, "**Source:** {source}");
        }
        context.push_str("\n---\n\n");
    }
    context
}

/// Prefixes the user's question to the assembled context. Without entries
/// the query is passed through untouched.
pub fn create_user_message(query: &str, entries: &[KnowledgeEntry]) -> String {
    if entries.is_empty() {
        return query.to_string();
    }
    format!("User Question: {query}\n\n{}", build_context(entries))
}

/// Topic-grouped overview of the first `max_entries` entries, suitable as
/// system prompt material. Topics appear in order of first use.
pub fn knowledge_base_digest(
    entries: &[KnowledgeEntry],
    max_entries: usize,
    title: &str,
) -> String {
    let mut groups: Vec<(&str, Vec<&KnowledgeEntry>)> = Vec::new();
    for entry in entries.iter().take(max_entries) {
        let topic = entry.context_label().unwrap_or(DIGEST_DEFAULT_TOPIC);
        match groups.iter_mut().find(|(name, _)| *name == topic) {
            Some((_, members)) => members.push(entry),
            None => groups.push((topic, vec![entry])),
        }
    }

    let mut digest = format!("**Knowledge Base: {title}**\n\n");
    for (topic, members) in groups {
        let _ = writeln!(digest, "**Topic: {topic}**");
        for entry in members {
            let _ = writeln!(digest, "*   **Question:** {}", entry.question);
            let _ = writeln!(digest, "*   **Answer:** {}", entry.answer);
            if let Some(note) = entry.grading_conversion() {
                let _ = writeln!(digest, "    *Note: {note}*");
            }
            digest.push('\n');
        }
        digest.push('\n');
    }
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::knowledge_entry::EntryMetadata;

    fn entry(question: &str, answer: &str) -> KnowledgeEntry {
        KnowledgeEntry::new(question.into(), answer.into())
    }

    #[test]
    fn test_empty_entries_yield_sentinel() {
        assert_eq!(build_context(&[]), NO_CONTEXT_FOUND);
    }

    #[test]
    fn test_context_blocks_follow_input_order() {
        let entries = vec![
            entry("visa?", "Apply early.")
                .with_context("Visa Requirements")
                .with_source("Verified Override Set"),
            entry("fee?", "About 2 lakh."),
        ];

        let context = build_context(&entries);

        let expected = "**Relevant Information from Knowledge Base:**\n\n\
            **Context 1:** Visa Requirements\n\
            **Q:** visa?\n\
            **A:** Apply early.\n\
            **Source:** Verified Override Set\n\
            \n---\n\n\
            **Q:** fee?\n\
            **A:** About 2 lakh.\n\
            \n---\n\n";
        assert_eq!(context, expected);
    }

    #[test]
    fn test_blank_labels_are_omitted() {
        let entries = vec![entry("q", "a").with_context("  ").with_source("")];

        let context = build_context(&entries);

        assert!(!context.contains("**Context"));
        assert!(!context.contains("**Source"));
    }

    #[test]
    fn test_user_message_wraps_context() {
        let entries = vec![entry("fee?", "X")];

        let message = create_user_message("How much is tuition?", &entries);

        assert!(message.starts_with("User Question: How much is tuition?\n\n"));
        assert!(message.ends_with(&build_context(&entries)));
        assert_eq!(create_user_message("plain", &[]), "plain");
    }

    #[test]
    fn test_digest_groups_by_topic_in_first_appearance_order() {
        let entries = vec![
            entry("fee?", "X").with_context("Costs"),
            entry("hostel?", "Y"),
            entry("scholarship?", "Z")
                .with_context("Costs")
                .with_metadata(EntryMetadata {
                    grading_conversion: Some("CGPA x 9.5".into()),
                    ..Default::default()
                }),
            entry("ignored?", "beyond limit").with_context("Late"),
        ];

        let digest = knowledge_base_digest(&entries, 3, "Guidance");

        let expected = "**Knowledge Base: Guidance**\n\n\
            **Topic: Costs**\n\
            *   **Question:** fee?\n\
            *   **Answer:** X\n\
            \n\
            *   **Question:** scholarship?\n\
            *   **Answer:** Z\n    \
            *Note: CGPA x 9.5*\n\
            \n\
            \n\
            **Topic: General**\n\
            *   **Question:** hostel?\n\
            *   **Answer:** Y\n\
            \n\
            \n";
        assert_eq!(digest, expected);
    }
}
