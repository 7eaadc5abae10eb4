use scribe_transcription::testing::wav_bytes;
use serde_json::Value;

use crate::fixtures::test_app::TestApp;

/// Extracts the `data:` payloads of an SSE body.
fn sse_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

#[tokio::test]
async fn stream_emits_metadata_segments_and_done() {
    let app = TestApp::spawn().await;

    let resp = app
        .post_files("/stream?language=en", "file", vec![("a.wav", wav_bytes(3.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let payloads = sse_payloads(&resp.text().await.unwrap());
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let events: Vec<Value> = payloads[..payloads.len() - 1]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(events[0]["type"], "metadata");
    assert_eq!(events[0]["language"], "en");

    let starts: Vec<f64> = events[1..]
        .iter()
        .inspect(|e| assert_eq!(e["type"], "segment"))
        .map(|e| e["start"].as_f64().unwrap())
        .collect();
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));

    // Same input through the non-streaming route yields the same segment count.
    let resp = app
        .post_files("/transcribe?language=en", "file", vec![("a.wav", wav_bytes(3.0))])
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["segments"].as_array().unwrap().len(), starts.len());

    assert_eq!(app.staged_files(), 0);
}

#[tokio::test]
async fn stream_refused_without_engine() {
    let app = TestApp::spawn_unloaded().await;
    let resp = app
        .post_files("/stream", "file", vec![("a.wav", wav_bytes(1.0))])
        .await;
    assert_eq!(resp.status().as_u16(), 503);
}

#[tokio::test]
async fn stream_rejects_corrupt_audio() {
    let app = TestApp::spawn().await;
    let resp = app
        .post_files("/stream", "file", vec![("bad.wav", b"garbage".to_vec())])
        .await;
    assert_eq!(resp.status().as_u16(), 422);
    assert_eq!(app.staged_files(), 0);
}
