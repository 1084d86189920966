//! Integration tests for the PostgreSQL store.
//!
//! **IMPORTANT**: These tests require a PostgreSQL database reachable via
//! `DATABASE_URL` (migrations are applied automatically). Run with
//! `cargo test -p mediascrape-db -- --ignored`.

use std::time::Duration;

use futures::future::join_all;
use mediascrape_db::test_fixtures::connect_test_database;
use mediascrape_db::{
    ExtractedMedia, JobRepository, JobStatus, MediaFilter, MediaQuery, MediaRepository,
    MediaType, TargetClaim, TargetOutcome, TargetRepository, TargetStatus, TaskQueue,
};
use uuid::Uuid;

fn unique_urls(n: usize) -> Vec<String> {
    let run = Uuid::new_v4();
    (0..n)
        .map(|i| format!("https://{run}.test/page-{i}"))
        .collect()
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_job_lifecycle_ok_fail_ok() {
    let db = connect_test_database().await;
    let urls = unique_urls(3);

    let job = db.jobs.create_with_targets(&urls).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.total_targets, 3);

    let targets = db.targets.list_for_job(job.id).await.unwrap();
    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0].source_url, urls[0]);

    db.jobs.record_outcome(job.id, true).await.unwrap();
    let mid = db.jobs.record_outcome(job.id, false).await.unwrap();
    assert_eq!(mid.status, JobStatus::Processing);
    let last = db.jobs.record_outcome(job.id, true).await.unwrap();
    assert_eq!(last.status, JobStatus::Failed);
    assert_eq!((last.done_targets, last.failed_targets), (2, 1));

    // Counters are frozen once every target has an outcome.
    let frozen = db.jobs.record_outcome(job.id, true).await.unwrap();
    assert_eq!(frozen, last);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_concurrent_record_outcome_sums_exactly() {
    let db = connect_test_database().await;
    let n = 40;
    let job = db.jobs.create_with_targets(&unique_urls(n)).await.unwrap();

    let calls = (0..n).map(|i| {
        let jobs = db.jobs.clone();
        let id = job.id;
        tokio::spawn(async move { jobs.record_outcome(id, i % 5 != 0).await })
    });
    for result in join_all(calls).await {
        result.unwrap().unwrap();
    }

    let snapshot = db.jobs.get(job.id).await.unwrap().unwrap();
    assert_eq!(snapshot.finished_targets(), n as i32);
    assert_eq!(snapshot.failed_targets, 8);
    assert_eq!(snapshot.status, JobStatus::Failed);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_record_outcome_unknown_job() {
    let db = connect_test_database().await;
    assert!(db.jobs.record_outcome(Uuid::now_v7(), true).await.is_err());
    assert!(db.jobs.get(Uuid::now_v7()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_delete_cascades_to_targets_and_media() {
    let db = connect_test_database().await;
    let urls = unique_urls(2);
    let job = db.jobs.create_with_targets(&urls).await.unwrap();
    db.media
        .insert_if_absent(
            job.id,
            &urls[0],
            &[ExtractedMedia::new(MediaType::Image, format!("{}/a.png", urls[0]))],
        )
        .await
        .unwrap();

    assert!(db.jobs.delete(job.id).await.unwrap());
    assert!(!db.jobs.delete(job.id).await.unwrap());
    assert!(db.jobs.get(job.id).await.unwrap().is_none());
    assert!(db.targets.list_for_job(job.id).await.unwrap().is_empty());

    let filter = MediaFilter::default().with_job(job.id);
    let page = db.media.list(&MediaQuery::new(filter, 1, 24).unwrap()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_target_transitions() {
    let db = connect_test_database().await;
    let urls = unique_urls(1);
    let job = db.jobs.create_with_targets(&urls).await.unwrap();

    assert_eq!(
        db.targets.begin(job.id, &urls[0]).await.unwrap(),
        TargetClaim::Started
    );
    let outcome = TargetOutcome::Failed("Fetch timed out after 1000ms".to_string());
    assert!(db.targets.finish(job.id, &urls[0], &outcome).await.unwrap());
    assert!(!db
        .targets
        .finish(job.id, &urls[0], &TargetOutcome::Done)
        .await
        .unwrap());
    assert_eq!(
        db.targets.begin(job.id, &urls[0]).await.unwrap(),
        TargetClaim::AlreadyFinished
    );
    assert_eq!(
        db.targets.begin(job.id, "https://nowhere.test").await.unwrap(),
        TargetClaim::NotFound
    );

    let target = &db.targets.list_for_job(job.id).await.unwrap()[0];
    assert_eq!(target.status, TargetStatus::Failed);
    assert!(target.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_media_insert_dedupes_and_feeds_in_order() {
    let db = connect_test_database().await;
    let urls = unique_urls(1);
    let page = &urls[0];
    let job = db.jobs.create_with_targets(&urls).await.unwrap();

    let items = vec![
        ExtractedMedia::new(MediaType::Image, format!("{page}/1.png")),
        ExtractedMedia::new(MediaType::Image, format!("{page}/2.png")),
        ExtractedMedia::new(MediaType::Video, format!("{page}/3.mp4")),
    ];
    assert_eq!(
        db.media.insert_if_absent(job.id, page, &items).await.unwrap(),
        3
    );
    assert_eq!(
        db.media.insert_if_absent(job.id, page, &items).await.unwrap(),
        0
    );

    let filter = MediaFilter::default().with_job(job.id);
    let first = db.media.list_after(&filter, None, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    let rest = db
        .media
        .list_after(&filter, Some(first[1].cursor()), 200)
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].media_type, MediaType::Video);

    let videos = MediaQuery::new(filter.clone().with_type(MediaType::Video), 1, 24).unwrap();
    let listed = db.media.list(&videos).await.unwrap();
    assert_eq!(listed.total, 1);

    let search = MediaQuery::new(filter.with_search("2.PNG"), 1, 24).unwrap();
    let listed = db.media.list(&search).await.unwrap();
    assert_eq!(listed.total, 1);
    assert!(listed.items[0].media_url.ends_with("/2.png"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_feed_cursor_sees_every_concurrent_insert_once() {
    let db = connect_test_database().await;
    let urls = unique_urls(16);
    let job = db.jobs.create_with_targets(&urls).await.unwrap();
    let filter = MediaFilter::default().with_job(job.id);

    let writers: Vec<_> = urls
        .iter()
        .cloned()
        .map(|page| {
            let media = db.media.clone();
            tokio::spawn(async move {
                let items: Vec<_> = (0..5)
                    .map(|i| ExtractedMedia::new(MediaType::Image, format!("{page}/{i}.png")))
                    .collect();
                media.insert_if_absent(job.id, &page, &items).await
            })
        })
        .collect();

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut writers_done = false;
    loop {
        let batch = db.media.list_after(&filter, cursor, 7).await.unwrap();
        if let Some(last) = batch.last() {
            cursor = Some(last.cursor());
        }
        let empty = batch.is_empty();
        seen.extend(batch.into_iter().map(|m| m.id));
        if empty && writers_done {
            break;
        }
        writers_done = writers.iter().all(|w| w.is_finished());
    }
    for writer in join_all(writers).await {
        assert_eq!(writer.unwrap().unwrap(), 5);
    }

    let unique: std::collections::HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), seen.len(), "an item was delivered twice");
    assert_eq!(seen.len(), 80, "an item was skipped");
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_task_lease_redelivery() {
    let db = connect_test_database().await;
    let db = mediascrape_db::Database::with_task_lease(db.pool.clone(), Duration::from_secs(1));
    let urls = unique_urls(1);
    let job_id = Uuid::now_v7();
    db.tasks.enqueue(job_id, &urls).await.unwrap();

    let mut claimed = None;
    while let Some(task) = db.tasks.claim().await.unwrap() {
        if task.job_id == job_id {
            claimed = Some(task);
            break;
        }
    }
    let task = claimed.expect("task should be claimable");
    assert_eq!(task.attempts, 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let mut redelivered = None;
    while let Some(next) = db.tasks.claim().await.unwrap() {
        if next.id == task.id {
            redelivered = Some(next);
            break;
        }
    }
    let again = redelivered.expect("task should be redelivered after lease expiry");
    assert_eq!(again.attempts, 2);
    db.tasks.ack(again.id).await.unwrap();
}
