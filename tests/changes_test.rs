use lingo_batch::changes::{ChangeDetector, TextExtractor, Utf8Extractor};
use lingo_batch::db;
use sqlx::SqlitePool;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn first_time_document_translates_and_records_snapshot() {
    let pool = setup_pool().await;
    let detector = ChangeDetector::new(&pool, &Utf8Extractor);

    let needed = detector.should_translate("doc-1", "es", b"hello world").await;
    assert!(needed);

    let snapshot = db::fetch_change_snapshot(&pool, "doc-1").await.unwrap().unwrap();
    assert_eq!(snapshot.content, b"hello world");
}

#[tokio::test]
async fn missing_snapshot_with_counterpart_translates() {
    let pool = setup_pool().await;
    db::record_translated_counterpart(&pool, "doc-1", "es", "out.txt")
        .await
        .unwrap();
    let detector = ChangeDetector::new(&pool, &Utf8Extractor);

    assert!(detector.should_translate("doc-1", "es", b"hello world").await);
}

#[tokio::test]
async fn unchanged_content_skips_but_snapshot_advances() {
    let pool = setup_pool().await;
    db::record_translated_counterpart(&pool, "doc-1", "es", "out.txt")
        .await
        .unwrap();
    db::upsert_change_snapshot(&pool, "doc-1", b"hello world")
        .await
        .unwrap();
    let detector = ChangeDetector::new(&pool, &Utf8Extractor);

    let needed = detector
        .should_translate("doc-1", "es", b"Hello   World\n")
        .await;
    assert!(!needed);

    // Baseline moves to "what we last saw" even though nothing translated.
    let snapshot = db::fetch_change_snapshot(&pool, "doc-1").await.unwrap().unwrap();
    assert_eq!(snapshot.content, b"Hello   World\n");
}

#[tokio::test]
async fn a_real_word_change_requires_translation() {
    let pool = setup_pool().await;
    db::record_translated_counterpart(&pool, "doc-1", "es", "out.txt")
        .await
        .unwrap();
    db::upsert_change_snapshot(&pool, "doc-1", b"hello world")
        .await
        .unwrap();
    let detector = ChangeDetector::new(&pool, &Utf8Extractor);

    assert!(detector.should_translate("doc-1", "es", b"hello there").await);
}

#[tokio::test]
async fn counterpart_language_is_part_of_the_identity() {
    let pool = setup_pool().await;
    db::record_translated_counterpart(&pool, "doc-1", "es", "out.txt")
        .await
        .unwrap();
    db::upsert_change_snapshot(&pool, "doc-1", b"hello world")
        .await
        .unwrap();
    let detector = ChangeDetector::new(&pool, &Utf8Extractor);

    // Same bytes, but nothing was ever produced for French.
    assert!(detector.should_translate("doc-1", "fr", b"hello world").await);
}

#[tokio::test]
async fn extraction_error_fails_open() {
    let pool = setup_pool().await;
    db::record_translated_counterpart(&pool, "doc-1", "es", "out.txt")
        .await
        .unwrap();
    db::upsert_change_snapshot(&pool, "doc-1", b"hello world")
        .await
        .unwrap();
    let detector = ChangeDetector::new(&pool, &Utf8Extractor);

    // Undecodable current bytes: comparison is impossible, so translate.
    let needed = detector
        .should_translate("doc-1", "es", &[0xff, 0xfe, 0x00])
        .await;
    assert!(needed);
}

struct FailingExtractor;

impl TextExtractor for FailingExtractor {
    fn extract_text(&self, _bytes: &[u8]) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("extraction backend offline"))
    }
}

#[tokio::test]
async fn extractor_backend_failure_fails_open_and_advances_snapshot() {
    let pool = setup_pool().await;
    db::record_translated_counterpart(&pool, "doc-1", "es", "out.txt")
        .await
        .unwrap();
    db::upsert_change_snapshot(&pool, "doc-1", b"old bytes")
        .await
        .unwrap();
    let detector = ChangeDetector::new(&pool, &FailingExtractor);

    assert!(detector.should_translate("doc-1", "es", b"new bytes").await);

    let snapshot = db::fetch_change_snapshot(&pool, "doc-1").await.unwrap().unwrap();
    assert_eq!(snapshot.content, b"new bytes");
}

#[tokio::test]
async fn expired_lease_is_reclaimable() {
    let pool = setup_pool().await;

    // Zero TTL expires immediately; a fresh claim takes over.
    assert!(db::acquire_batch_lease(&pool, "T1", 0).await.unwrap());
    assert!(db::acquire_batch_lease(&pool, "T1", 600).await.unwrap());

    // A live lease blocks further claims until released.
    assert!(!db::acquire_batch_lease(&pool, "T1", 600).await.unwrap());
    db::release_batch_lease(&pool, "T1").await.unwrap();
    assert!(db::acquire_batch_lease(&pool, "T1", 600).await.unwrap());
}

#[tokio::test]
async fn huge_ttl_still_holds_the_lease() {
    let pool = setup_pool().await;

    // A TTL beyond i64/datetime range is clamped, not wrapped. A wrapped
    // value would land expires_at in the past and let the second claim win.
    assert!(db::acquire_batch_lease(&pool, "T1", u64::MAX).await.unwrap());
    assert!(!db::acquire_batch_lease(&pool, "T1", 600).await.unwrap());

    db::release_batch_lease(&pool, "T1").await.unwrap();
    assert!(db::acquire_batch_lease(&pool, "T1", 600).await.unwrap());
}
