//! Translation-vendor abstraction.
//!
//! One `TranslationProvider` instance is constructed per batch (not per
//! item) by the `ProviderFactory`, used for every item in the pass, then
//! torn down via `shutdown` on every exit path. Vendor wire formats live in
//! the variant modules; the orchestrator only sees this trait.
use crate::config::{Config, ProviderSettings};
use crate::model::ProviderKind;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

mod aws;
mod azure;
mod google;

pub use aws::AwsProvider;
pub use azure::AzureProvider;
pub use google::GoogleProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Malformed input from upstream; raised before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Network, auth or quota failure from the vendor.
    #[error("provider unavailable: {0}")]
    Unavailable(#[from] anyhow::Error),
    /// A remote job did not reach a terminal state within the poll budget.
    #[error("translation job timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
}

/// Uniform capability implemented by each vendor backend.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate_text(
        &self,
        source_text: &str,
        target_language: &str,
    ) -> Result<String, ProviderError>;

    /// Translate a whole document. Multi-step vendor workflows
    /// (upload, remote job, poll, download) are internal and bounded by the
    /// variant's poll policy.
    async fn translate_document(
        &self,
        source: &[u8],
        target_language: &str,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Release held client resources. Idempotent and infallible; teardown
    /// runs during already-unwinding failure paths.
    async fn shutdown(&self);
}

/// Constructs the adapter matching the batch's configured vendor.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, kind: ProviderKind, cfg: &Config) -> Box<dyn TranslationProvider>;
}

/// The real factory backed by the config file's provider sections.
pub struct VendorProviderFactory;

impl ProviderFactory for VendorProviderFactory {
    fn create(&self, kind: ProviderKind, cfg: &Config) -> Box<dyn TranslationProvider> {
        match kind {
            ProviderKind::Google => Box::new(GoogleProvider::from_settings(&cfg.providers.google)),
            ProviderKind::Azure => Box::new(AzureProvider::from_settings(&cfg.providers.azure)),
            ProviderKind::Aws => Box::new(AwsProvider::from_settings(&cfg.providers.aws)),
        }
    }
}

/// Bound on remote-job polling: fixed attempt count, fixed delay between
/// attempts. Configured per adapter variant.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl From<&ProviderSettings> for PollPolicy {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            max_attempts: settings.max_poll_attempts,
            interval: settings.poll_interval(),
        }
    }
}

pub fn ensure_text_args(source_text: &str, target_language: &str) -> Result<(), ProviderError> {
    if source_text.is_empty() {
        return Err(ProviderError::InvalidArgument(
            "source text is empty".into(),
        ));
    }
    ensure_target_language(target_language)
}

pub fn ensure_document_args(source: &[u8], target_language: &str) -> Result<(), ProviderError> {
    if source.is_empty() {
        return Err(ProviderError::InvalidArgument(
            "source document is empty".into(),
        ));
    }
    ensure_target_language(target_language)
}

fn ensure_target_language(target_language: &str) -> Result<(), ProviderError> {
    if target_language.is_empty() {
        return Err(ProviderError::InvalidArgument(
            "target language is empty".into(),
        ));
    }
    Ok(())
}

/// Drive `check` until it reports a terminal result, sleeping the policy's
/// interval between attempts. `Ok(None)` means "still running". Exhausting
/// the attempt budget escalates to `Timeout` so a stuck vendor job cannot
/// block the batch indefinitely.
pub(crate) async fn poll_until_terminal<T, F, Fut>(
    policy: PollPolicy,
    mut check: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ProviderError>>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(done) = check().await? {
            return Ok(done);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Err(ProviderError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn empty_inputs_are_invalid_arguments() {
        assert!(matches!(
            ensure_text_args("", "es"),
            Err(ProviderError::InvalidArgument(msg)) if msg.contains("empty")
        ));
        assert!(matches!(
            ensure_text_args("hello", ""),
            Err(ProviderError::InvalidArgument(_))
        ));
        assert!(matches!(
            ensure_document_args(&[], "es"),
            Err(ProviderError::InvalidArgument(_))
        ));
        assert!(ensure_text_args("hello", "es").is_ok());
        assert!(ensure_document_args(b"%PDF-", "es").is_ok());
    }

    #[tokio::test]
    async fn poll_returns_once_terminal() {
        let policy = PollPolicy {
            max_attempts: 5,
            interval: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result = poll_until_terminal(policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(if n == 3 { Some(n) } else { None }) }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_times_out_after_budget() {
        let policy = PollPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(1),
        };
        let err = poll_until_terminal::<(), _, _>(policy, || async { Ok(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { attempts: 3 }));
    }

    #[tokio::test]
    async fn poll_propagates_job_failure() {
        let policy = PollPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(1),
        };
        let err = poll_until_terminal::<(), _, _>(policy, || async {
            Err(ProviderError::Unavailable(anyhow::anyhow!("job failed")))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
