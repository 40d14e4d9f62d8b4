use std::time::Duration;

use beacon_core::backend::{QueueBackend, WorkerQueue};
use beacon_core::job::{AnalysisJob, JobStatus, Priority};
use beacon_core::result::AnalysisStatus;
use beacon_core::testutil::{make_failed_result, make_live_result};
use beacon_db::PgQueueBackend;
use chrono::Utc;

use crate::integration::common::setup_test_db;

fn test_job(url: &str) -> AnalysisJob {
    AnalysisJob::new(url).with_user("u-1")
}

#[tokio::test]
async fn submit_and_read_fields() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://example.com")).await.unwrap();
    let record = backend.read(&id).await.unwrap().expect("record exists");

    assert_eq!(record.id, id);
    assert_eq!(record.job.url, "https://example.com");
    assert_eq!(record.job.user_id.as_deref(), Some("u-1"));
    assert_eq!(record.job.priority, Priority::Normal);
    assert_eq!(record.status, JobStatus::Waiting);
    assert_eq!(record.progress, 0);
    assert_eq!(record.attempt, 0);
    assert_eq!(record.max_retries, 3);
    assert!(record.result.is_none());
}

#[tokio::test]
async fn read_unknown_or_malformed_id_is_none() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let unknown = uuid::Uuid::new_v4().to_string();
    assert!(backend.read(&unknown).await.unwrap().is_none());
    assert!(backend.read("not-a-uuid").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_orders_by_priority_then_age() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    backend
        .submit(test_job("https://normal.example.com"))
        .await
        .unwrap();
    backend
        .submit(test_job("https://high.example.com").with_priority(Priority::High))
        .await
        .unwrap();

    let first = backend.claim("worker-1").await.unwrap().unwrap();
    assert_eq!(first.job.url, "https://high.example.com");
    let second = backend.claim("worker-1").await.unwrap().unwrap();
    assert_eq!(second.job.url, "https://normal.example.com");
}

#[tokio::test]
async fn low_priority_submit_delay_gates_claims() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    backend
        .submit(test_job("https://low.example.com").with_priority(Priority::Low))
        .await
        .unwrap();

    // Not yet eligible: the low-priority submit delay has not elapsed.
    assert!(backend.claim("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_skips_active_jobs() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    backend.submit(test_job("https://example.com")).await.unwrap();

    assert!(backend.claim("worker-1").await.unwrap().is_some());
    assert!(backend.claim("worker-2").await.unwrap().is_none());
}

#[tokio::test]
async fn complete_stores_result() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();

    backend
        .complete(&claimed.id, &make_live_result("https://example.com"))
        .await
        .unwrap();

    let record = backend.read(&id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100);
    assert!(record.processed_at.is_some());
    assert!(record.failure_reason.is_none());
    let result = record.result.unwrap();
    assert_eq!(result.status, AnalysisStatus::Completed);
}

#[tokio::test]
async fn degraded_result_still_completes_the_job() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://down.example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();

    let fallback = make_failed_result("https://down.example.com", "connection refused");
    backend.complete(&claimed.id, &fallback).await.unwrap();

    // Queue-level completion is independent of analysis success.
    let record = backend.read(&id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.failure_reason.as_deref(), Some("connection refused"));
    let result = record.result.unwrap();
    assert_eq!(result.status, AnalysisStatus::Failed);
    assert!(result.authority_score.overall > 0);
}

#[tokio::test]
async fn fail_with_retry_returns_to_waiting() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://flaky.example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();

    // Retry timestamp in the past so the job is immediately claimable again.
    let next_retry = Utc::now() - chrono::Duration::seconds(1);
    backend
        .fail(&claimed.id, "navigation timed out", Some(next_retry))
        .await
        .unwrap();

    let record = backend.read(&id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Waiting);
    assert_eq!(record.attempt, 1);
    assert_eq!(record.failure_reason.as_deref(), Some("navigation timed out"));

    let reclaimed = backend.claim("worker-2").await.unwrap().unwrap();
    assert_eq!(reclaimed.attempt, 1);
}

#[tokio::test]
async fn fail_without_retry_is_terminal() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();

    backend.fail(&claimed.id, "backend lost", None).await.unwrap();

    let record = backend.read(&id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.processed_at.is_some());
    assert!(backend.claim("worker-2").await.unwrap().is_none());
}

#[tokio::test]
async fn terminal_record_never_reverts() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();
    backend
        .complete(&claimed.id, &make_live_result("https://example.com"))
        .await
        .unwrap();

    // A late fail from a stale worker must not touch the terminal record.
    backend
        .fail(&claimed.id, "stale failure", Some(Utc::now()))
        .await
        .unwrap();

    let record = backend.read(&id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert!(record.failure_reason.is_none());
}

#[tokio::test]
async fn release_worker_requeues_active_jobs() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    backend.submit(test_job("https://a.example.com")).await.unwrap();
    backend.submit(test_job("https://b.example.com")).await.unwrap();
    backend.claim("worker-1").await.unwrap().unwrap();
    backend.claim("worker-1").await.unwrap().unwrap();

    let released = backend.release_worker("worker-1").await.unwrap();
    assert_eq!(released, 2);

    let stats = backend.stats().await.unwrap();
    assert_eq!(stats.waiting, 2);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn stats_count_by_state() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    backend.submit(test_job("https://a.example.com")).await.unwrap();
    backend.submit(test_job("https://b.example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();
    backend
        .complete(&claimed.id, &make_live_result(&claimed.job.url))
        .await
        .unwrap();

    let stats = backend.stats().await.unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total, 2);
}

#[tokio::test]
async fn cleanup_keeps_recent_terminal_records() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();
    backend
        .complete(&claimed.id, &make_live_result(&claimed.job.url))
        .await
        .unwrap();

    let removed = backend.cleanup(Duration::from_secs(3600)).await.unwrap();
    assert_eq!(removed, 0);
    assert!(backend.read(&id).await.unwrap().is_some());

    // A zero-age cleanup sweeps it.
    let removed = backend.cleanup(Duration::ZERO).await.unwrap();
    assert_eq!(removed, 1);
    assert!(backend.read(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn retention_cap_applies_to_terminal_failures() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool).with_retention_cap(2);

    // Three jobs failed terminally, one after the other.
    for i in 0..3 {
        backend
            .submit(test_job(&format!("https://f{i}.example.com")))
            .await
            .unwrap();
        let claimed = backend.claim("worker-1").await.unwrap().unwrap();
        backend.fail(&claimed.id, "backend lost", None).await.unwrap();
    }

    // Only the newest two survive the cap.
    let stats = backend.stats().await.unwrap();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.total, 2);
    let failed = backend.list(Some(JobStatus::Failed), 10).await.unwrap();
    assert!(failed.iter().all(|r| r.job.url != "https://f0.example.com"));
}

#[tokio::test]
async fn remove_deletes_waiting_jobs() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    let id = backend.submit(test_job("https://example.com")).await.unwrap();
    backend.remove(&id).await.unwrap();
    assert!(backend.read(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn list_filters_by_status() {
    let (pool, _container) = setup_test_db().await;
    let backend = PgQueueBackend::new(pool);

    backend.submit(test_job("https://a.example.com")).await.unwrap();
    backend.submit(test_job("https://b.example.com")).await.unwrap();
    let claimed = backend.claim("worker-1").await.unwrap().unwrap();
    backend
        .complete(&claimed.id, &make_live_result(&claimed.job.url))
        .await
        .unwrap();

    let waiting = backend.list(Some(JobStatus::Waiting), 10).await.unwrap();
    assert_eq!(waiting.len(), 1);
    let all = backend.list(None, 10).await.unwrap();
    assert_eq!(all.len(), 2);
}
