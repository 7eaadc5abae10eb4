use std::time::Duration;

use scribe_transcription::testing::{FakeLoader, wav_bytes};
use serde_json::{Value, json};

use crate::fixtures::test_app::TestApp;

async fn load_model(app: &TestApp, body: Value) -> (u16, Value) {
    let resp = app
        .client
        .post(app.url("/admin/model"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn swap_then_reload_same_model() {
    let app = TestApp::spawn().await;

    let (status, body) = load_model(&app, json!({ "model_size": "small" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "loaded");
    assert_eq!(body["model_size"], "small");

    let (status, body) = load_model(&app, json!({ "model_size": "small" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "unchanged");

    assert_eq!(app.loader.events(), vec!["load base", "drop base", "load small"]);

    let (_, health) = app.get_json("/health").await;
    assert_eq!(health["model_size"], "small");
}

#[tokio::test]
async fn loading_enables_submissions() {
    let app = TestApp::spawn_unloaded().await;

    let resp = app
        .post_files("/v2/batch-transcribe", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 503);

    let (status, _) = load_model(&app, json!({ "model_size": "base" })).await;
    assert_eq!(status, 200);

    let resp = app
        .post_files("/v2/batch-transcribe", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 202);
}

#[tokio::test]
async fn failed_swap_leaves_engine_unavailable() {
    let app = TestApp::spawn_with(FakeLoader::default().failing_on("broken"), true, |settings| {
        settings.engine.allowed_models.push("broken".to_string());
    })
    .await;

    let (status, body) = load_model(&app, json!({ "model_size": "broken" })).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "internal");

    let (_, health) = app.get_json("/health").await;
    assert_eq!(health["model_loaded"], false);

    let resp = app
        .post_files("/transcribe", "file", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 503);
}

#[tokio::test]
async fn empty_model_size_is_rejected() {
    let app = TestApp::spawn().await;
    let (status, _) = load_model(&app, json!({ "model_size": "  " })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn model_outside_allowlist_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, body) = load_model(&app, json!({ "model_size": "gigantic" })).await;
    assert_eq!(status, 400);
    assert!(body["message"].as_str().unwrap().contains("tiny"));

    assert_eq!(app.loader.events(), vec!["load base"]);
    let (_, health) = app.get_json("/health").await;
    assert_eq!(health["model_size"], "base");
}

#[tokio::test]
async fn empty_allowlist_accepts_any_model() {
    let app = TestApp::spawn_with(FakeLoader::default(), true, |settings| {
        settings.engine.allowed_models.clear();
    })
    .await;

    let (status, body) = load_model(&app, json!({ "model_size": "distil-large" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "loaded");
}

#[tokio::test]
async fn submissions_during_swap_are_accepted() {
    let loader = FakeLoader::default().with_load_delay(Duration::from_millis(300));
    let app = TestApp::spawn_with(loader, true, |_| {}).await;

    let swap = {
        let client = app.client.clone();
        let url = app.url("/admin/model");
        tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({ "model_size": "small" }))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = app
        .post_files("/v2/batch-transcribe", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 202);
    assert_eq!(swap.await.unwrap(), 200);

    let body: Value = resp.json().await.unwrap();
    let job = app.wait_for_job(body["job_ids"][0].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
}
