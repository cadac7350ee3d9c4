use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clip_host::{
    api,
    config::{Config, StorageBackend},
    media::FfmpegTranscoder,
    object_store as obj,
    pipeline::{spawn_pool, JobQueue, Reaper, TranscodeWorker},
    storage::Database,
    temp::TempStore,
    AppState,
};

/// GCS access tokens expire after an hour.
const GCS_TOKEN_REFRESH: Duration = Duration::from_secs(45 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "clip-host starting");

    let config = Config::load()?;
    info!(bind = %config.node.bind_address, "Loaded configuration");

    let db = Database::open(&config.node.data_dir)?;
    info!("Database opened at: {}", config.node.data_dir);

    let mut background = Vec::new();

    // Object store backend, behind the read cache
    let backend: Arc<dyn obj::ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = obj::LocalStore::new(&config.storage.local_storage_path)?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(store)
        }
        StorageBackend::Gcs => {
            let bucket = config
                .storage
                .gcs_bucket
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("GCS_BUCKET is required for the gcs backend"))?;
            let store = Arc::new(
                obj::GcsStore::new(bucket, config.storage.gcs_credentials_file.as_deref()).await?,
            );
            info!("Using GCS storage backend, bucket: {}", bucket);

            let refresher = Arc::clone(&store);
            background.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(GCS_TOKEN_REFRESH);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = refresher.refresh_token().await {
                        error!(error = %e, "Failed to refresh GCS access token");
                    }
                }
            }));
            store
        }
    };
    let object_store: Arc<dyn obj::ObjectStore> = Arc::new(obj::CachedStore::new(
        backend,
        config.cache.max_entries,
        Duration::from_secs(config.cache.ttl_seconds),
    ));

    let temp = TempStore::new(&config.node.temp_dir)?;
    info!("Temp directory at: {}", temp.dir().display());

    // Transcode worker pool
    let (jobs, job_rx) = JobQueue::new();
    let worker = Arc::new(TranscodeWorker::new(
        db.clone(),
        Arc::clone(&object_store),
        Arc::new(FfmpegTranscoder::new(&config.media.ffmpeg_path)),
        temp.clone(),
    ));
    background.push(spawn_pool(
        worker,
        job_rx,
        config.media.worker_concurrency,
    ));

    // Abandoned-upload reaper
    let reaper = Reaper::new(db.clone(), temp.clone(), &config.reaper);
    background.push(tokio::spawn(reaper.start()));

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        object_store,
        temp,
        jobs,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: abort background tasks. Uploads still PROCESSING are picked
    // up by the reaper after the next start.
    info!("Shutting down background tasks");
    for handle in background {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
