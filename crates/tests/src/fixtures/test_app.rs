use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use scribe_api::{build_router, state::AppState};
use scribe_config::Settings;
use scribe_transcription::testing::{FakeLoader, FakeNormalizer};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A running test application backed by the fake engine and normalizer.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub state: AppState,
    pub loader: FakeLoader,
    pub normalizer: FakeNormalizer,
    pub client: reqwest::Client,
    upload_dir: TempDir,
}

impl TestApp {
    /// Spawns a server with the "base" model loaded.
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeLoader::default(), true, |_| {}).await
    }

    /// Spawns a server whose engine has no model loaded.
    pub async fn spawn_unloaded() -> Self {
        Self::spawn_with(FakeLoader::default(), false, |_| {}).await
    }

    /// Spawns a server with a custom loader and settings tweaks.
    ///
    /// The `mutator` closure receives a `&mut Settings` after test defaults
    /// are applied.
    pub async fn spawn_with(
        loader: FakeLoader,
        load_engine: bool,
        mutator: impl FnOnce(&mut Settings),
    ) -> Self {
        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");

        let mut settings = test_settings();
        settings.uploads.dir = upload_dir.path().join("uploads").display().to_string();
        mutator(&mut settings);

        let normalizer = FakeNormalizer::default();
        let state = AppState::new(
            settings.clone(),
            Arc::new(loader.clone()),
            Arc::new(normalizer.clone()),
        );
        if load_engine {
            state
                .load_configured_engine()
                .await
                .expect("Failed to load fake engine");
        }
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            settings,
            state,
            loader,
            normalizer,
            client,
            upload_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Number of files currently staged in the upload directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path().join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// POSTs a multipart body with one part per file under `field`.
    pub async fn post_files(
        &self,
        path: &str,
        field: &str,
        files: Vec<(&str, Vec<u8>)>,
    ) -> reqwest::Response {
        let form = files.into_iter().fold(Form::new(), |form, (name, bytes)| {
            form.part(
                field.to_string(),
                Part::bytes(bytes).file_name(name.to_string()),
            )
        });
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed");
        let status = resp.status().as_u16();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Polls a job until it reaches a terminal status.
    pub async fn wait_for_job(&self, job_id: &str) -> Value {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let (status, job) = self.get_json(&format!("/v2/jobs/{}", job_id)).await;
            assert_eq!(status, 200, "job {} not found", job_id);
            if matches!(job["status"].as_str(), Some("completed") | Some("failed")) {
                return job;
            }
            assert!(Instant::now() < deadline, "job {} did not finish", job_id);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Defaults with the "base" model and a small cache.
pub fn test_settings() -> Settings {
    let mut settings = Settings::load().expect("Failed to load default settings");
    settings.engine.model_size = "base".to_string();
    settings.cache.capacity = 16;
    settings
}
