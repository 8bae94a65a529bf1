use chrono::{TimeDelta, Utc};

use pricewatch_core::job::{CreateJobRequest, JobCounters, JobStatus, LogLevel};
use pricewatch_core::models::Marketplace;

use super::common::{seed_site, setup_test_db};

#[tokio::test]
async fn test_create_pending_and_scheduled_jobs() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let pending = repo
        .create(&CreateJobRequest::new("nightly", site.id, Marketplace::Other))
        .await
        .unwrap();
    assert_eq!(pending.status, JobStatus::Pending);
    assert!(pending.auto_start);
    assert!(pending.scheduled_at.is_none());

    let at = Utc::now() + TimeDelta::hours(2);
    let scheduled = repo
        .create(
            &CreateJobRequest::new("later", site.id, Marketplace::Other).scheduled_for(at),
        )
        .await
        .unwrap();
    assert_eq!(scheduled.status, JobStatus::Scheduled);
    assert!(!scheduled.auto_start);
    assert!(scheduled.scheduled_at.is_some());
}

#[tokio::test]
async fn test_job_lifecycle_to_completed() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let job = repo
        .create(&CreateJobRequest::new("run", site.id, Marketplace::Other))
        .await
        .unwrap();

    repo.mark_running(job.id).await.unwrap();
    let running = repo.get(job.id).await.unwrap().unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert!(running.started_at.is_some());

    let counters = JobCounters {
        products_scraped: 7,
        products_found: 9,
        errors_count: 1,
    };
    repo.complete(job.id, counters).await.unwrap();

    let done = repo.get(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.counters(), counters);
}

#[tokio::test]
async fn test_fail_records_error_message() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let job = repo
        .create(&CreateJobRequest::new("run", site.id, Marketplace::Other))
        .await
        .unwrap();
    repo.mark_running(job.id).await.unwrap();
    repo.fail(job.id, "search URL misconfigured", JobCounters::default())
        .await
        .unwrap();

    let failed = repo.get(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("search URL misconfigured")
    );
}

#[tokio::test]
async fn test_append_log_mirrors_current_progress() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let job = repo
        .create(&CreateJobRequest::new("run", site.id, Marketplace::Other))
        .await
        .unwrap();

    repo.append_log(job.id, LogLevel::Info, "Searching 'rice'")
        .await
        .unwrap();
    repo.append_log(job.id, LogLevel::Warning, "No results for 'oil'")
        .await
        .unwrap();

    let fetched = repo.get(job.id).await.unwrap().unwrap();
    assert_eq!(fetched.current_progress, "No results for 'oil'");

    // Newest first
    let logs = repo.tail_logs(job.id, 10).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "No results for 'oil'");
    assert_eq!(logs[0].level, LogLevel::Warning);
    assert_eq!(logs[1].message, "Searching 'rice'");
}

#[tokio::test]
async fn test_cancel_is_noop_on_terminal_job() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let job = repo
        .create(&CreateJobRequest::new("run", site.id, Marketplace::Other))
        .await
        .unwrap();
    repo.cancel(job.id).await.unwrap();
    assert_eq!(
        repo.get(job.id).await.unwrap().unwrap().status,
        JobStatus::Cancelled
    );

    let done = repo
        .create(&CreateJobRequest::new("run2", site.id, Marketplace::Other))
        .await
        .unwrap();
    repo.mark_running(done.id).await.unwrap();
    repo.complete(done.id, JobCounters::default()).await.unwrap();

    repo.cancel(done.id).await.unwrap();
    assert_eq!(
        repo.get(done.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn test_list_due_picks_auto_start_and_elapsed_schedules() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let auto = repo
        .create(&CreateJobRequest::new("auto", site.id, Marketplace::Other))
        .await
        .unwrap();

    let mut manual = CreateJobRequest::new("manual", site.id, Marketplace::Other);
    manual.auto_start = false;
    repo.create(&manual).await.unwrap();

    let overdue = repo
        .create(
            &CreateJobRequest::new("overdue", site.id, Marketplace::Other)
                .scheduled_for(Utc::now() - TimeDelta::minutes(5)),
        )
        .await
        .unwrap();
    repo.create(
        &CreateJobRequest::new("future", site.id, Marketplace::Other)
            .scheduled_for(Utc::now() + TimeDelta::hours(1)),
    )
    .await
    .unwrap();

    let due = repo.list_due(Utc::now()).await.unwrap();
    let ids: Vec<_> = due.iter().map(|j| j.id).collect();
    assert_eq!(due.len(), 2);
    assert!(ids.contains(&auto.id));
    assert!(ids.contains(&overdue.id));
}

#[tokio::test]
async fn test_list_jobs_filters_by_status() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.job_repo();

    let a = repo
        .create(&CreateJobRequest::new("a", site.id, Marketplace::Other))
        .await
        .unwrap();
    repo.create(&CreateJobRequest::new("b", site.id, Marketplace::Other))
        .await
        .unwrap();
    repo.cancel(a.id).await.unwrap();

    let cancelled = repo
        .list_jobs(Some(JobStatus::Cancelled), 10)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, a.id);

    let all = repo.list_jobs(None, 10).await.unwrap();
    assert_eq!(all.len(), 2);
}
