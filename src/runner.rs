//! Batch orchestrator: authenticates the token, claims it, resolves the
//! configured vendor, then drives the per-item loop with failure isolation.
//!
//! One invocation is one pass over the pending items. Per-item failures are
//! persisted as outcome notes and never abort the batch; only the fatal
//! setup categories surface to the caller.
use crate::changes::{ChangeDetector, TextExtractor, Utf8Extractor};
use crate::config::Config;
use crate::db::{self, Pool};
use crate::model::{BatchConfig, BatchSummary, ProviderKind, TranslationOutcome, WorkItem, WorkItemKind};
use crate::provider::{ProviderFactory, TranslationProvider, VendorProviderFactory};
use crate::staging::StagingDir;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    /// The token matches no known batch scope. Nothing is touched.
    #[error("invalid token; access denied")]
    AuthenticationDenied,
    /// No active configuration row for the token. Benign: callers should
    /// treat this as "nothing to do", not as an operational failure.
    #[error("no records found for token")]
    NoRecordsFound,
    /// The configuration names a vendor this build does not know. There is
    /// no item-level fallback; the whole batch aborts.
    #[error("unsupported service provider: {0}")]
    UnsupportedProvider(String),
    /// Another run holds a live lease on this token.
    #[error("batch is already claimed by a concurrent run")]
    BatchBusy,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Entry point for the scheduler/CLI: run one batch pass for `token` with
/// the real vendor adapters.
pub async fn run_batch(pool: &Pool, cfg: &Config, token: &str) -> Result<BatchSummary, BatchError> {
    run_batch_with(pool, cfg, token, &VendorProviderFactory, &Utf8Extractor).await
}

/// Same as [`run_batch`] but with the provider factory and text extractor
/// injected, which is how tests substitute recording doubles.
#[instrument(skip_all)]
pub async fn run_batch_with(
    pool: &Pool,
    cfg: &Config,
    token: &str,
    factory: &dyn ProviderFactory,
    extractor: &dyn TextExtractor,
) -> Result<BatchSummary, BatchError> {
    info!(token, "starting batch run");

    // Authentication happens strictly before any other store access.
    if !db::is_authorized(pool, token).await? {
        warn!(token, "authentication denied");
        return Err(BatchError::AuthenticationDenied);
    }

    if !db::acquire_batch_lease(pool, token, cfg.app.lease_ttl_seconds).await? {
        warn!(token, "batch lease is held by a concurrent run");
        return Err(BatchError::BatchBusy);
    }

    let result = process_batch(pool, cfg, token, factory, extractor).await;

    if let Err(err) = db::release_batch_lease(pool, token).await {
        warn!(token, ?err, "failed to release batch lease");
    }

    match &result {
        Ok(summary) => info!(token, %summary, "batch completed"),
        Err(err) => warn!(token, %err, "batch aborted"),
    }
    result
}

async fn process_batch(
    pool: &Pool,
    cfg: &Config,
    token: &str,
    factory: &dyn ProviderFactory,
    extractor: &dyn TextExtractor,
) -> Result<BatchSummary, BatchError> {
    let Some(batch_cfg) = db::fetch_batch_config(pool, token).await? else {
        return Err(BatchError::NoRecordsFound);
    };

    let kind = ProviderKind::parse(&batch_cfg.provider)
        .ok_or_else(|| BatchError::UnsupportedProvider(batch_cfg.provider.clone()))?;
    debug!(provider = %kind, "provider resolved");

    // One adapter instance for the whole pass, torn down on every exit path.
    let provider = factory.create(kind, cfg);
    let result = drive_items(pool, cfg, token, &batch_cfg, provider.as_ref(), extractor).await;
    provider.shutdown().await;
    result
}

async fn drive_items(
    pool: &Pool,
    cfg: &Config,
    token: &str,
    batch_cfg: &BatchConfig,
    provider: &dyn TranslationProvider,
    extractor: &dyn TextExtractor,
) -> Result<BatchSummary, BatchError> {
    let items = db::fetch_pending_items(pool, token).await?;
    if items.is_empty() {
        info!(token, "no pending items");
        return Ok(BatchSummary::default());
    }

    let staging = StagingDir::create(&cfg.app.data_dir, token).map_err(anyhow::Error::new)?;
    let detector = ChangeDetector::new(pool, extractor);
    let mut summary = BatchSummary::default();

    for item in &items {
        summary.processed += 1;
        let outcome = process_item(cfg, provider, &detector, &staging, item).await;
        if outcome.skipped {
            summary.skipped += 1;
        } else if outcome.succeeded {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
            debug!(item = item.id, note = ?outcome.error_detail, "item failed");
        }

        // Persistence is always attempted; a store failure here leaves the
        // item's completion status ambiguous and is flagged for operators,
        // but it never halts the remaining items.
        if let Err(err) = db::persist_item_outcome(pool, &outcome).await {
            error!(item = item.id, ?err, "failed to persist outcome; completion status ambiguous");
            continue;
        }

        if outcome.succeeded && !outcome.skipped && item.kind == WorkItemKind::Document {
            if let (Some(key), Some(output_ref)) = (&item.document_key, &outcome.translated_content)
            {
                if let Err(err) =
                    db::record_translated_counterpart(pool, key, &item.target_language, output_ref)
                        .await
                {
                    warn!(item = item.id, ?err, "failed to record translated counterpart");
                }
            }
        }

        if let Some(hook_sql) = batch_cfg.on_complete_sql.as_deref() {
            if let Err(err) = db::run_on_complete_hook(pool, hook_sql, item.id).await {
                warn!(item = item.id, ?err, "on-complete hook failed");
            }
        }
    }

    Ok(summary)
}

/// One item, start to finish. Adapter and filesystem failures are folded
/// into the outcome here; nothing propagates past this boundary.
async fn process_item(
    cfg: &Config,
    provider: &dyn TranslationProvider,
    detector: &ChangeDetector<'_>,
    staging: &StagingDir,
    item: &WorkItem,
) -> TranslationOutcome {
    match item.kind {
        WorkItemKind::Text => {
            match provider
                .translate_text(&item.source_content, &item.target_language)
                .await
            {
                Ok(translated) => TranslationOutcome::success(item.id, Some(translated)),
                Err(err) => TranslationOutcome::failure(item.id, err.to_string()),
            }
        }
        WorkItemKind::Document => process_document_item(cfg, provider, detector, staging, item).await,
    }
}

async fn process_document_item(
    cfg: &Config,
    provider: &dyn TranslationProvider,
    detector: &ChangeDetector<'_>,
    staging: &StagingDir,
    item: &WorkItem,
) -> TranslationOutcome {
    let source = match tokio::fs::read(&item.source_content).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return TranslationOutcome::failure(
                item.id,
                format!("failed to read source document: {err}"),
            )
        }
    };

    // Items without a stable document identity cannot be change-detected;
    // they always translate.
    if let Some(key) = &item.document_key {
        if !detector
            .should_translate(key, &item.target_language, &source)
            .await
        {
            info!(item = item.id, document_key = %key, "document unchanged; skipping");
            return TranslationOutcome::skipped(item.id);
        }
    }

    let translated = match provider
        .translate_document(&source, &item.target_language)
        .await
    {
        Ok(bytes) => bytes,
        Err(err) => return TranslationOutcome::failure(item.id, err.to_string()),
    };

    match store_document_output(cfg, staging, item, &translated).await {
        Ok(output_ref) => TranslationOutcome::success(item.id, Some(output_ref)),
        Err(err) => TranslationOutcome::failure(
            item.id,
            format!("failed to store translated document: {err}"),
        ),
    }
}

/// Stage the vendor output, then move it to its final location under
/// `<data_dir>/translated/`. Returns the final path as the output reference.
async fn store_document_output(
    cfg: &Config,
    staging: &StagingDir,
    item: &WorkItem,
    translated: &[u8],
) -> std::io::Result<String> {
    let ext = Path::new(&item.source_content)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("out");
    let file_name = format!("item-{}-{}.{}", item.id, item.target_language, ext);

    let staged = staging.write_file(&file_name, translated)?;

    let final_dir = Path::new(&cfg.app.data_dir).join("translated");
    tokio::fs::create_dir_all(&final_dir).await?;
    let dest = final_dir.join(&file_name);
    tokio::fs::copy(&staged, &dest).await?;
    Ok(dest.to_string_lossy().into_owned())
}
