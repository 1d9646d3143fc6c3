use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The configured translation vendor for a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Azure,
    Aws,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Azure => "azure",
            ProviderKind::Aws => "aws",
        }
    }

    /// Parse the provider name stored in a batch configuration row.
    /// Matching is case-insensitive; unknown names yield `None` so the
    /// orchestrator can abort with an unsupported-provider error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Some(ProviderKind::Google),
            "azure" => Some(ProviderKind::Azure),
            "aws" => Some(ProviderKind::Aws),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkItemKind {
    Text,
    Document,
}

impl WorkItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemKind::Text => "text",
            WorkItemKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(WorkItemKind::Text),
            "document" => Some(WorkItemKind::Document),
            _ => None,
        }
    }
}

/// One queued unit of translation. `source_content` holds the inline text
/// for `Text` items and a filesystem path for `Document` items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: i64,
    pub token: String,
    pub kind: WorkItemKind,
    pub source_content: String,
    pub document_key: Option<String>,
    pub target_language: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub output_content: Option<String>,
    pub outcome_note: Option<String>,
}

/// Per-batch configuration row. The provider name is kept raw here; the
/// orchestrator parses it so an unknown vendor aborts the whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub provider: String,
    pub service_account: String,
    pub on_complete_sql: Option<String>,
}

/// The latest content baseline recorded for a document identity.
#[derive(Debug, Clone)]
pub struct ChangeSnapshot {
    pub document_key: String,
    pub content: Vec<u8>,
    pub checked_at: DateTime<Utc>,
}

/// Transient per-item result, consumed by the persistence step.
#[derive(Debug, Clone, Default)]
pub struct TranslationOutcome {
    pub item_id: i64,
    pub succeeded: bool,
    pub skipped: bool,
    pub translated_content: Option<String>,
    pub error_detail: Option<String>,
}

impl TranslationOutcome {
    pub fn success(item_id: i64, translated_content: Option<String>) -> Self {
        Self {
            item_id,
            succeeded: true,
            translated_content,
            ..Default::default()
        }
    }

    pub fn skipped(item_id: i64) -> Self {
        Self {
            item_id,
            succeeded: true,
            skipped: true,
            ..Default::default()
        }
    }

    pub fn failure(item_id: i64, error_detail: impl Into<String>) -> Self {
        Self {
            item_id,
            error_detail: Some(error_detail.into()),
            ..Default::default()
        }
    }
}

/// Aggregate counters returned to the scheduler. The three outcome buckets
/// are disjoint: `processed = succeeded + failed + skipped`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}, succeeded: {}, failed: {}, skipped: {}",
            self.processed, self.succeeded, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parse_is_case_insensitive() {
        assert_eq!(ProviderKind::parse("Google"), Some(ProviderKind::Google));
        assert_eq!(ProviderKind::parse(" AZURE "), Some(ProviderKind::Azure));
        assert_eq!(ProviderKind::parse("aws"), Some(ProviderKind::Aws));
        assert_eq!(ProviderKind::parse("deepl"), None);
        assert_eq!(ProviderKind::parse(""), None);
    }

    #[test]
    fn work_item_kind_round_trips() {
        for kind in [WorkItemKind::Text, WorkItemKind::Document] {
            assert_eq!(WorkItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(WorkItemKind::parse("pdf"), None);
    }

    #[test]
    fn outcome_constructors_set_disjoint_flags() {
        let ok = TranslationOutcome::success(1, Some("hola".into()));
        assert!(ok.succeeded && !ok.skipped && ok.error_detail.is_none());

        let skip = TranslationOutcome::skipped(2);
        assert!(skip.succeeded && skip.skipped);

        let bad = TranslationOutcome::failure(3, "boom");
        assert!(!bad.succeeded && !bad.skipped);
        assert_eq!(bad.error_detail.as_deref(), Some("boom"));
    }
}
