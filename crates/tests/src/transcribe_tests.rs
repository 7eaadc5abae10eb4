use std::time::{Duration, Instant};

use scribe_transcription::testing::{FakeLoader, POISON, wav_bytes};
use serde_json::Value;

use crate::fixtures::test_app::TestApp;

#[tokio::test]
async fn repeat_upload_is_served_from_cache_faster() {
    let loader = FakeLoader::default().with_delay(Duration::from_millis(300));
    let app = TestApp::spawn_with(loader, true, |_| {}).await;

    let start = Instant::now();
    let resp = app
        .post_files("/transcribe?language=en", "file", vec![("a.wav", wav_bytes(2.0))])
        .await;
    let first_elapsed = start.elapsed();
    assert_eq!(resp.status().as_u16(), 200);
    let first: Value = resp.json().await.unwrap();

    let start = Instant::now();
    let resp = app
        .post_files("/transcribe?language=en", "file", vec![("b.wav", wav_bytes(2.0))])
        .await;
    let second_elapsed = start.elapsed();
    let second: Value = resp.json().await.unwrap();

    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["text"], second["text"]);
    assert!(second_elapsed < first_elapsed);
    assert_eq!(app.state.dispatcher.cache().len(), 1);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn result_shape() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files("/transcribe?profile=fast&keywords=Rust,tokio", "file", vec![("a.wav", wav_bytes(1.5))])
        .await;

    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["text"], "segment 0 segment 1");
    assert_eq!(body["segments"].as_array().unwrap().len(), 2);
    assert_eq!(body["language"], "en");
    assert_eq!(body["model_used"], "base");
    assert!(body["duration"].as_f64().unwrap() > 1.4);
    assert!(body.get("system_warning").is_none());
}

#[tokio::test]
async fn corrupt_audio_is_unprocessable() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files("/transcribe", "file", vec![("bad.mp3", b"garbage".to_vec())])
        .await;

    assert_eq!(resp.status().as_u16(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "validation");
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn inference_failure_is_internal_error() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files("/transcribe", "file", vec![("poison.wav", POISON.to_vec())])
        .await;

    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn missing_file_field_is_bad_request() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files("/transcribe", "attachment", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 400);
}
