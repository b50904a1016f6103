mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use common::{authed_json, body_json, FakeMediaWorker, TestApp};
use vidshare_db::models::job::Job;
use vidshare_db::repositories::{JobRepo, VideoRepo};

fn trim_body(video_id: i64) -> serde_json::Value {
    json!({ "videoId": video_id, "startTime": 1, "endTime": 3 })
}

/// Wait until the latest job has left `running` and `source_id` is free.
async fn settled_job(app: &TestApp, source_id: i64) -> Job {
    for _ in 0..200 {
        let latest = JobRepo::list(&app.pool, None, None)
            .await
            .unwrap()
            .into_iter()
            .next();
        if let Some(job) = latest {
            if job.status != "running" && !app.orchestrator_holds(source_id) {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job on video {source_id} never settled");
}

/// Install a trigger on `jobs` that fires when a row moves to `status`.
async fn on_job_status(app: &TestApp, status: &str, action: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER jobs_hook BEFORE UPDATE OF status ON jobs \
         WHEN NEW.status = '{status}' BEGIN SELECT RAISE({action}); END"
    ))
    .execute(&app.pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn disconnected_trim_fails_job_and_removes_output() {
    let gate = Arc::new(Semaphore::new(0));
    let app = common::build_test_app_with(FakeMediaWorker::gated(gate), |_| {}).await;
    let video = app.seed_video("a.mp4", 20.0).await;

    let request = tokio::spawn(
        app.router
            .clone()
            .oneshot(authed_json("/videos/trim", 1, trim_body(video.id))),
    );
    app.worker.trim_entered.notified().await;
    assert_eq!(app.stored_files().len(), 2);
    assert!(app.orchestrator_holds(video.id));

    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());

    let job = settled_job(&app, video.id).await;
    assert_eq!(job.status, "failed");
    assert_eq!(
        job.error_message.as_deref(),
        Some("Job cancelled before completion")
    );
    assert!(job.output_video_id.is_none());
    assert_eq!(app.stored_files(), vec!["a.mp4".to_string()]);
    assert_eq!(VideoRepo::count(&app.pool).await.unwrap(), 1);
}

#[tokio::test]
async fn timed_out_trim_fails_job_and_frees_source() {
    let gate = Arc::new(Semaphore::new(0));
    let app = common::build_test_app_with(FakeMediaWorker::gated(gate.clone()), |config| {
        config.request_timeout_secs = 1;
    })
    .await;
    let video = app.seed_video("a.mp4", 20.0).await;

    let response = app
        .send(authed_json("/videos/trim", 1, trim_body(video.id)))
        .await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    let job = settled_job(&app, video.id).await;
    assert_eq!(job.status, "failed");
    assert_eq!(app.stored_files(), vec!["a.mp4".to_string()]);

    // The source is usable again once the abandoned job is cleaned up.
    gate.add_permits(1);
    let response = app
        .send(authed_json("/videos/trim", 1, trim_body(video.id)))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn job_that_cannot_start_is_failed_not_left_pending() {
    let app = common::build_test_app().await;
    let video = app.seed_video("a.mp4", 20.0).await;
    on_job_status(&app, "running", "ABORT, 'jobs are frozen'").await;

    let response = app
        .send(authed_json("/videos/trim", 1, trim_body(video.id)))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert!(!body["error"].as_str().unwrap().contains("frozen"));

    let job = settled_job(&app, video.id).await;
    assert_eq!(job.status, "failed");
    assert!(job.started_at.is_none());
    assert_eq!(app.worker.trim_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ignored_start_transition_is_an_error() {
    let app = common::build_test_app().await;
    let a = app.seed_video("a.mp4", 2.0).await;
    let b = app.seed_video("b.mp4", 3.0).await;
    on_job_status(&app, "running", "IGNORE").await;

    let response = app
        .send(authed_json(
            "/videos/merge",
            1,
            json!({ "videoIds": [a.id, b.id] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let job = settled_job(&app, a.id).await;
    assert_eq!(job.status, "failed");
    assert!(!app.orchestrator_holds(b.id));
    assert_eq!(app.worker.merge_calls.load(Ordering::SeqCst), 0);
    assert_eq!(VideoRepo::count(&app.pool).await.unwrap(), 2);
}

#[tokio::test]
async fn unrecorded_success_leaves_no_output_video() {
    let app = common::build_test_app().await;
    let video = app.seed_video("a.mp4", 20.0).await;
    on_job_status(&app, "succeeded", "ABORT, 'cannot succeed'").await;

    let response = app
        .send(authed_json("/videos/trim", 1, trim_body(video.id)))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let job = settled_job(&app, video.id).await;
    assert_eq!(job.status, "failed");
    assert!(job.output_video_id.is_none());
    assert_eq!(app.worker.trim_calls.load(Ordering::SeqCst), 1);
    assert_eq!(VideoRepo::count(&app.pool).await.unwrap(), 1);
    assert_eq!(app.stored_files(), vec!["a.mp4".to_string()]);
}
