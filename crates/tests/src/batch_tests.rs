use std::time::Duration;

use scribe_transcription::testing::{FakeLoader, wav_bytes};
use serde_json::Value;

use crate::fixtures::test_app::TestApp;

fn job_ids(body: &Value) -> Vec<String> {
    body["job_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn valid_corrupt_and_duplicate_files() {
    let loader = FakeLoader::default().with_delay(Duration::from_millis(200));
    let app = TestApp::spawn_with(loader, true, |_| {}).await;
    assert!(app.settings.jobs.max_concurrent > 1);

    let resp = app
        .post_files(
            "/v2/batch-transcribe?language=en",
            "files",
            vec![
                ("meeting.wav", wav_bytes(2.0)),
                ("broken.mp3", b"this is not an mp3".to_vec()),
                ("meeting-copy.wav", wav_bytes(2.0)),
            ],
        )
        .await;

    assert_eq!(resp.status().as_u16(), 202);
    let body: Value = resp.json().await.unwrap();
    let ids = job_ids(&body);
    assert_eq!(ids.len(), 3);
    assert_eq!(body["count"], 3);

    let valid = app.wait_for_job(&ids[0]).await;
    assert_eq!(valid["status"], "completed");
    assert_eq!(valid["source_name"], "meeting.wav");
    assert!(!valid["result"]["text"].as_str().unwrap().is_empty());
    assert_eq!(valid["result"]["cached"], false);
    assert!(valid["error"].is_null());
    assert!(!valid["completed_at"].is_null());

    let corrupt = app.wait_for_job(&ids[1]).await;
    assert_eq!(corrupt["status"], "failed");
    assert!(corrupt["result"].is_null());
    assert!(corrupt["error"].as_str().unwrap().contains("normalization"));

    let duplicate = app.wait_for_job(&ids[2]).await;
    assert_eq!(duplicate["status"], "completed");
    assert_eq!(duplicate["result"]["cached"], true);
    assert_eq!(duplicate["result"]["text"], valid["result"]["text"]);

    assert_eq!(app.state.dispatcher.cache().len(), 1);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn same_content_in_another_language_is_not_cached() {
    let app = TestApp::spawn().await;

    let resp = app
        .post_files("/v2/batch-transcribe?language=en", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    let first = job_ids(&resp.json().await.unwrap());
    app.wait_for_job(&first[0]).await;

    let resp = app
        .post_files("/v2/batch-transcribe?language=de", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    let second = job_ids(&resp.json().await.unwrap());
    let job = app.wait_for_job(&second[0]).await;

    assert_eq!(job["result"]["cached"], false);
    assert_eq!(job["result"]["language"], "de");
    assert_eq!(job["result"]["system_warning"]["code"], "low_accuracy_model");
}

#[tokio::test]
async fn unsupported_extension_rejects_submission() {
    let app = TestApp::spawn().await;

    let resp = app
        .post_files(
            "/v2/batch-transcribe",
            "files",
            vec![("a.wav", wav_bytes(1.0)), ("slides.pdf", b"%PDF".to_vec())],
        )
        .await;

    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains(".pdf"));
    assert!(app.state.dispatcher.jobs().is_empty());
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let app = TestApp::spawn().await;
    let resp = app.post_files("/v2/batch-transcribe", "files", Vec::new()).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn unknown_profile_is_rejected() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files(
            "/v2/batch-transcribe?profile=turbo",
            "files",
            vec![("a.wav", wav_bytes(1.0))],
        )
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn engine_unavailable_refuses_submission() {
    let app = TestApp::spawn_unloaded().await;

    let resp = app
        .post_files("/v2/batch-transcribe", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;

    assert_eq!(resp.status().as_u16(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unavailable");
    assert!(app.state.dispatcher.jobs().is_empty());
}

#[tokio::test]
async fn job_status_errors() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .get_json(&format!("/v2/jobs/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not_found");

    let (status, _) = app.get_json("/v2/jobs/not-a-uuid").await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn maintenance_reclaims_finished_jobs() {
    let app = TestApp::spawn_with(Default::default(), true, |settings| {
        settings.jobs.retention_secs = 0;
    })
    .await;

    let resp = app
        .post_files("/v2/batch-transcribe", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    let ids = job_ids(&resp.json().await.unwrap());
    app.wait_for_job(&ids[0]).await;

    let report = app.state.dispatcher.maintenance_tick().await;
    assert_eq!(report.removed_jobs, 1);
    assert_eq!(report.jobs_in_memory, 0);

    let (status, _) = app.get_json(&format!("/v2/jobs/{}", ids[0])).await;
    assert_eq!(status, 404);
}
