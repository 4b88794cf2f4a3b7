use serde::{Deserialize, Serialize};

/// Optional annotations attached to a reference entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_equivalence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_conversion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_sensitivity: Option<bool>,
}

/// One question/answer item of the reference corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
}

impl KnowledgeEntry {
    pub fn new(question: String, answer: String) -> Self {
        Self {
            question,
            answer,
            context: None,
            source: None,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Topic label, treating an empty string as absent.
    pub fn context_label(&self) -> Option<&str> {
        non_empty(self.context.as_deref())
    }

    /// Provenance label, treating an empty string as absent.
    pub fn source_label(&self) -> Option<&str> {
        non_empty(self.source.as_deref())
    }

    pub fn grading_conversion(&self) -> Option<&str> {
        non_empty(
            self.metadata
                .as_ref()
                .and_then(|metadata| metadata.grading_conversion.as_deref()),
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
