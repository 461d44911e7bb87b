use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use audioscribe::application::ports::{
    JobStore, QueueBroker, ResultCache, StagingStore, TranscriptionEngine,
};
use audioscribe::application::services::{
    RetryPolicy, Scheduler, SchedulerConfig, WorkerContext, WorkerPool,
};
use audioscribe::infrastructure::audio::{
    MockTranscriptionEngine, TranscriptionEngineFactory, TranscriptionProvider,
};
use audioscribe::infrastructure::cache::{InMemoryResultCache, RedisResultCache};
use audioscribe::infrastructure::observability::{TracingConfig, init_tracing};
use audioscribe::infrastructure::persistence::{
    InMemoryJobStore, PgJobStore, create_pool, run_migrations,
};
use audioscribe::infrastructure::queue::{InMemoryQueueBroker, RedisQueueBroker};
use audioscribe::infrastructure::storage::{InMemoryStagingStore, LocalStagingStore};
use audioscribe::presentation::config::TranscriptionProviderSetting;
use audioscribe::presentation::{AppState, Environment, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    let json_format = settings.logging.enable_json
        || std::env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);
    init_tracing(&TracingConfig::new(
        environment.as_str(),
        json_format,
        Some(&settings.logging.level),
    ))
    .context("Failed to initialize logging")?;

    if settings.scaffold.enabled {
        tracing::warn!("Scaffold mode: running on in-memory adapters and the mock engine");
    }

    let job_store = build_job_store(&settings).await?;
    let broker = build_broker(&settings).await?;
    let result_cache = build_result_cache(&settings).await?;
    let staging_store = build_staging_store(&settings)?;
    let transcription_engine = build_engine(&settings)?;

    let retry = RetryPolicy::default();

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&job_store),
        Arc::clone(&broker),
        result_cache.clone(),
        SchedulerConfig {
            max_attempts: settings.worker.max_attempts,
            liveness_timeout: Duration::from_secs(settings.reconciler.liveness_timeout_secs),
            pending_grace: Duration::from_secs(settings.reconciler.pending_grace_secs),
            retry,
        },
    ));

    let pool = WorkerPool::new(
        settings.worker.pool_size,
        WorkerContext {
            job_store,
            broker,
            staging_store: Arc::clone(&staging_store),
            transcription_engine,
            result_cache,
            attempt_timeout: Duration::from_secs(settings.worker.attempt_timeout_secs),
            requeue_backoff: Duration::from_millis(settings.worker.requeue_backoff_ms),
            retry,
        },
    );

    let shutdown = CancellationToken::new();
    let workers = pool.spawn(shutdown.clone());
    let reconciler = tokio::spawn(Arc::clone(&scheduler).run_reconciler(
        Duration::from_secs(settings.reconciler.interval_secs),
        shutdown.child_token(),
    ));

    let state = AppState {
        scheduler,
        staging_store,
        settings: settings.clone(),
    };
    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    workers.join().await;
    if let Err(e) = reconciler.await {
        tracing::error!(error = %e, "Reconciler task panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn build_job_store(settings: &Settings) -> anyhow::Result<Arc<dyn JobStore>> {
    if !settings.uses_postgres() {
        tracing::info!("Using in-memory job store");
        return Ok(Arc::new(InMemoryJobStore::new()));
    }

    let pool = create_pool(&settings.database.url, settings.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(Arc::new(PgJobStore::new(pool)))
}

async fn build_broker(settings: &Settings) -> anyhow::Result<Arc<dyn QueueBroker>> {
    if !settings.uses_redis_queue() {
        tracing::info!("Using in-process queue broker");
        return Ok(Arc::new(InMemoryQueueBroker::new()));
    }

    let broker = RedisQueueBroker::connect(&settings.redis.url, &settings.redis.queue_name)
        .await
        .context("Failed to connect to Redis queue")?;
    tracing::info!(queue = %settings.redis.queue_name, "Using Redis queue broker");
    Ok(Arc::new(broker))
}

async fn build_result_cache(
    settings: &Settings,
) -> anyhow::Result<Option<Arc<dyn ResultCache>>> {
    if !settings.cache.enabled {
        tracing::info!("Result cache disabled");
        return Ok(None);
    }

    let ttl = Duration::from_secs(settings.cache.ttl_secs);
    if !settings.uses_redis_cache() {
        return Ok(Some(Arc::new(InMemoryResultCache::new(
            ttl,
            settings.cache.capacity,
        ))));
    }

    let cache = RedisResultCache::connect(&settings.redis.url, &settings.redis.cache_prefix, ttl)
        .await
        .context("Failed to connect to Redis cache")?;
    Ok(Some(Arc::new(cache)))
}

fn build_staging_store(settings: &Settings) -> anyhow::Result<Arc<dyn StagingStore>> {
    if settings.scaffold.enabled {
        return Ok(Arc::new(InMemoryStagingStore::new()));
    }

    let store = LocalStagingStore::new(PathBuf::from(&settings.storage.upload_dir))
        .context("Failed to open upload directory")?;
    Ok(Arc::new(store))
}

fn build_engine(settings: &Settings) -> anyhow::Result<Arc<dyn TranscriptionEngine>> {
    let mock_delay = settings.scaffold.mock_delay();
    if settings.scaffold.enabled {
        return Ok(Arc::new(MockTranscriptionEngine::new(
            "This is a mock transcription.",
            mock_delay,
        )));
    }

    let provider = match settings.transcription.provider {
        TranscriptionProviderSetting::Mock => TranscriptionProvider::Mock,
        TranscriptionProviderSetting::OpenAi => TranscriptionProvider::OpenAi,
    };
    tracing::info!(?provider, model = %settings.transcription.model, "Transcription engine selected");

    TranscriptionEngineFactory::create(
        provider,
        &settings.transcription.model,
        settings.transcription.api_key.clone(),
        settings.transcription.base_url.clone(),
        mock_delay,
    )
    .context("Failed to create transcription engine")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
