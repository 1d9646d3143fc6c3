//! Content-based change detection for document items.
//!
//! Decides whether a document must be re-translated by comparing its
//! normalized text against the last snapshot recorded for the same
//! document identity. Every evaluation advances the snapshot to the
//! current content, so the baseline is always "what we last saw", not
//! "what we last translated". Any extraction or comparison error fails
//! open toward translating; an unnecessary translation is cheaper than
//! silently serving a stale one.
use crate::db::{self, Pool};
use anyhow::Result;
use tracing::{debug, warn};

/// Text extraction from raw document bytes. The real extraction pipeline
/// (PDF text stripping etc.) lives outside this core; the trait is the
/// seam it plugs into.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;
}

/// Treats document bytes as UTF-8 text. Strict on purpose: undecodable
/// content is an extraction error, which fails open.
pub struct Utf8Extractor;

impl TextExtractor for Utf8Extractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        Ok(std::str::from_utf8(bytes)?.to_string())
    }
}

/// Collapse whitespace runs to a single space, trim, lowercase. Two
/// documents are unchanged iff their normalized texts compare equal.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct ChangeDetector<'a> {
    pool: &'a Pool,
    extractor: &'a dyn TextExtractor,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(pool: &'a Pool, extractor: &'a dyn TextExtractor) -> Self {
        Self { pool, extractor }
    }

    /// Whether `document_key` needs translating into `target_language`
    /// given its current bytes. Always upserts a fresh snapshot for the
    /// key, regardless of the decision.
    pub async fn should_translate(
        &self,
        document_key: &str,
        target_language: &str,
        current: &[u8],
    ) -> bool {
        let decision = match self
            .evaluate(document_key, target_language, current)
            .await
        {
            Ok(needed) => needed,
            Err(err) => {
                warn!(document_key, ?err, "change detection failed; translating");
                true
            }
        };

        if let Err(err) = db::upsert_change_snapshot(self.pool, document_key, current).await {
            warn!(document_key, ?err, "failed to advance change snapshot");
        }

        decision
    }

    async fn evaluate(
        &self,
        document_key: &str,
        target_language: &str,
        current: &[u8],
    ) -> Result<bool> {
        // First translation for this key/language pair: no baseline matters.
        if !db::translated_counterpart_exists(self.pool, document_key, target_language).await? {
            debug!(document_key, "no translated counterpart; translation required");
            return Ok(true);
        }

        let Some(snapshot) = db::fetch_change_snapshot(self.pool, document_key).await? else {
            debug!(document_key, "no previous snapshot; translation required");
            return Ok(true);
        };

        let previous_text = self.extractor.extract_text(&snapshot.content)?;
        let current_text = self.extractor.extract_text(current)?;
        let unchanged = normalize_text(&previous_text) == normalize_text(&current_text);
        debug!(document_key, unchanged, "document comparison finished");
        Ok(!unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_text("Hello   World\n"), "hello world");
        assert_eq!(normalize_text("hello world"), "hello world");
        assert_eq!(normalize_text("  \t a\nB  c "), "a b c");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn normalization_preserves_word_differences() {
        assert_ne!(normalize_text("hello world"), normalize_text("hello there"));
    }

    #[test]
    fn utf8_extractor_rejects_invalid_bytes() {
        assert!(Utf8Extractor.extract_text(&[0xff, 0xfe]).is_err());
        assert_eq!(Utf8Extractor.extract_text(b"ok").unwrap(), "ok");
    }
}
