use scribe_transcription::testing::wav_bytes;

use crate::fixtures::test_app::TestApp;

#[tokio::test]
async fn health_reports_loaded_model() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get_json("/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["model_size"], "base");
    assert!(body["cpu_cores_available"].as_u64().unwrap() >= 1);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_without_model_is_degraded() {
    let app = TestApp::spawn_unloaded().await;
    let (status, body) = app.get_json("/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model_loaded"], false);
    assert!(body["model_size"].is_null());
}

#[tokio::test]
async fn root_welcomes() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get_json("/").await;

    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().contains(&app.settings.app.name));
}

#[tokio::test]
async fn system_stats_reports_usage_and_jobs() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files("/v2/batch-transcribe", "files", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 202);
    let body: serde_json::Value = resp.json().await.unwrap();
    app.wait_for_job(body["job_ids"][0].as_str().unwrap()).await;

    let (status, stats) = app.get_json("/system/stats").await;

    assert_eq!(status, 200);
    assert_eq!(stats["total_jobs_in_memory"], 1);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["model_loaded"], true);
    assert!(stats["memory_used_mb"].as_f64().unwrap() > 0.0);
    assert!(stats["memory_percent"].is_number());
    assert!(stats["cpu_percent"].is_number());
}
