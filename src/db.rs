//! SQLite repository for batch configuration, work items, change snapshots
//! and the per-token batch lease.
use crate::model::{BatchConfig, ChangeSnapshot, TranslationOutcome, WorkItem, WorkItemKind};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

/// Note written for document items skipped by change detection.
pub const SKIPPED_UNCHANGED: &str = "skipped: unchanged";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and ensure the parent
/// directory exists. In-memory URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(tail) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), tail),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{expanded_path}");
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Token validation: a token is authorized iff it scopes at least one queued
/// work item. Row-presence check only; the token itself is never stored
/// anywhere else by this core.
#[instrument(skip_all)]
pub async fn is_authorized(pool: &Pool, token: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM work_items WHERE token = ? LIMIT 1")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

#[instrument(skip_all)]
pub async fn fetch_batch_config(pool: &Pool, token: &str) -> Result<Option<BatchConfig>> {
    let row = sqlx::query(
        "SELECT provider, service_account, on_complete_sql \
         FROM translation_configs WHERE active = 1 AND token = ? LIMIT 1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| BatchConfig {
        provider: r.get("provider"),
        service_account: r.get("service_account"),
        on_complete_sql: r.get("on_complete_sql"),
    }))
}

/// Pending items for one token, in queue order. Completed items are
/// filtered here, which is what makes a re-run of a finished batch a no-op.
#[instrument(skip_all)]
pub async fn fetch_pending_items(pool: &Pool, token: &str) -> Result<Vec<WorkItem>> {
    let rows = sqlx::query(
        "SELECT id, token, kind, source_content, document_key, target_language, \
                completed, completed_at, output_content, outcome_note \
         FROM work_items WHERE token = ? AND completed = 0 ORDER BY id",
    )
    .bind(token)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(map_work_item).collect()
}

fn map_work_item(row: SqliteRow) -> Result<WorkItem> {
    let kind_raw: String = row.get("kind");
    let kind = WorkItemKind::parse(&kind_raw)
        .ok_or_else(|| anyhow!("unknown work item kind: {kind_raw}"))?;
    Ok(WorkItem {
        id: row.get("id"),
        token: row.get("token"),
        kind,
        source_content: row.get("source_content"),
        document_key: row.get("document_key"),
        target_language: row.get("target_language"),
        completed: row.get("completed"),
        completed_at: row.get::<Option<DateTime<Utc>>, _>("completed_at"),
        output_content: row.get("output_content"),
        outcome_note: row.get("outcome_note"),
    })
}

/// Write one item's outcome. Success and skip both complete the item;
/// failure leaves it pending with a diagnostic note so a later pass can
/// retry it.
#[instrument(skip_all)]
pub async fn persist_item_outcome(pool: &Pool, outcome: &TranslationOutcome) -> Result<()> {
    if outcome.succeeded {
        let note = if outcome.skipped {
            Some(SKIPPED_UNCHANGED)
        } else {
            None
        };
        sqlx::query(
            "UPDATE work_items \
             SET completed = 1, completed_at = datetime('now'), output_content = ?, outcome_note = ? \
             WHERE id = ?",
        )
        .bind(outcome.translated_content.as_deref())
        .bind(note)
        .bind(outcome.item_id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query("UPDATE work_items SET outcome_note = ? WHERE id = ?")
            .bind(outcome.error_detail.as_deref())
            .bind(outcome.item_id)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Execute a batch's configured on-complete hook for one finished item.
/// The statement binds the item id as its single parameter.
#[instrument(skip_all)]
pub async fn run_on_complete_hook(pool: &Pool, sql: &str, item_id: i64) -> Result<()> {
    sqlx::query(sql).bind(item_id).execute(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn fetch_change_snapshot(pool: &Pool, document_key: &str) -> Result<Option<ChangeSnapshot>> {
    let row = sqlx::query(
        "SELECT document_key, content, checked_at FROM change_snapshots WHERE document_key = ?",
    )
    .bind(document_key)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| ChangeSnapshot {
        document_key: r.get("document_key"),
        content: r.get("content"),
        checked_at: r.get("checked_at"),
    }))
}

/// Insert-or-update the single live snapshot for a document identity.
/// History beyond the latest snapshot is not retained.
#[instrument(skip_all)]
pub async fn upsert_change_snapshot(pool: &Pool, document_key: &str, content: &[u8]) -> Result<()> {
    sqlx::query(
        "INSERT INTO change_snapshots (document_key, content, checked_at) \
         VALUES (?, ?, datetime('now')) \
         ON CONFLICT(document_key) DO UPDATE SET \
             content = excluded.content, \
             checked_at = excluded.checked_at",
    )
    .bind(document_key)
    .bind(content)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn translated_counterpart_exists(
    pool: &Pool,
    document_key: &str,
    target_language: &str,
) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM translated_documents WHERE document_key = ? AND target_language = ? LIMIT 1",
    )
    .bind(document_key)
    .bind(target_language)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

#[instrument(skip_all)]
pub async fn record_translated_counterpart(
    pool: &Pool,
    document_key: &str,
    target_language: &str,
    output_ref: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO translated_documents (document_key, target_language, output_ref, created_at) \
         VALUES (?, ?, ?, datetime('now')) \
         ON CONFLICT(document_key, target_language) DO UPDATE SET \
             output_ref = excluded.output_ref, \
             created_at = excluded.created_at",
    )
    .bind(document_key)
    .bind(target_language)
    .bind(output_ref)
    .execute(pool)
    .await?;
    Ok(())
}

// One year. TTLs above this would wrap the i64 bind or exceed sqlite's
// datetime range, so they are clamped before hitting the query.
const MAX_LEASE_TTL_SECS: u64 = 31_536_000;

/// Claim a token for one run. Returns `false` when another run holds a live
/// lease. An expired lease left behind by a crashed run is reclaimed.
#[instrument(skip_all)]
pub async fn acquire_batch_lease(pool: &Pool, token: &str, ttl_seconds: u64) -> Result<bool> {
    let ttl_seconds = ttl_seconds.min(MAX_LEASE_TTL_SECS);
    let res = sqlx::query(
        "INSERT INTO batch_leases (token, acquired_at, expires_at) \
         VALUES (?, datetime('now'), datetime('now', '+' || ? || ' seconds')) \
         ON CONFLICT(token) DO UPDATE SET \
             acquired_at = excluded.acquired_at, \
             expires_at = excluded.expires_at \
         WHERE batch_leases.expires_at <= datetime('now')",
    )
    .bind(token)
    .bind(ttl_seconds as i64)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn release_batch_lease(pool: &Pool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM batch_leases WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("sqlite::memory:?cache=shared"),
            "sqlite::memory:?cache=shared"
        );
    }

    #[test]
    fn non_sqlite_urls_pass_through() {
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/db"),
            "postgres://localhost/db"
        );
    }

    #[test]
    fn file_urls_keep_query_strings() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested/queue.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let rebuilt = prepare_sqlite_url(&url);
        assert_eq!(rebuilt, url);
        assert!(path.parent().unwrap().exists());
    }
}
