use std::time::Duration;

use scribe_api::{build_router, scheduler, state::AppState};
use scribe_config::Settings;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "scribe_api=debug,scribe_services=debug,scribe_transcription=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting {} on {}:{}", settings.app.name, settings.app.host, settings.app.port);
    info!(
        backend = %settings.engine.backend,
        model = %settings.engine.model_size,
        device = %settings.engine.device,
        compute_type = %settings.engine.compute_type,
        cache_capacity = settings.cache.capacity,
        "Engine config"
    );

    let app_state = AppState::from_settings(settings.clone());

    // Without a model the API stays up and refuses submissions with 503.
    if settings.engine.load_on_startup {
        if let Err(e) = app_state.load_configured_engine().await {
            error!("Initial model load failed: {}", e);
        }
    } else {
        warn!("Model loading deferred; POST /admin/model to load one");
    }

    let _scheduler = scheduler::start_maintenance(
        app_state.dispatcher.clone(),
        Duration::from_secs(settings.jobs.maintenance_interval_secs.max(1)),
    )
    .await?;

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
