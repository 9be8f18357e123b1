use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use rally_algo::config::{LoggingSettings, Settings, StoreBackend};
use rally_algo::engine::Engine;
use rally_algo::routes::{self, AppState};
use rally_algo::services::{
    CacheManager, LogNotifier, MemoryStore, Notifier, PostgresStore, ProfileClient, ProfileSource, Store,
    WebhookNotifier,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

async fn build_store(settings: &Settings) -> io::Result<Arc<dyn Store>> {
    let db = &settings.database;
    match db.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; nothing survives a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let max_connections = db.max_connections.unwrap_or(10);
            let store = PostgresStore::connect(
                &db.url,
                max_connections,
                db.min_connections.unwrap_or(1),
                db.acquire_timeout_secs.unwrap_or(5),
                db.idle_timeout_secs.unwrap_or(600),
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;

            info!("PostgreSQL store initialized (max: {} connections)", max_connections);
            Ok(Arc::new(store))
        }
    }
}

async fn build_cache(settings: &Settings) -> Arc<CacheManager> {
    let ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let Some(redis_url) = settings.cache.redis_url.as_deref() else {
        info!("No Redis configured, profile cache is in-process only");
        return Arc::new(CacheManager::in_memory(l1_size, ttl));
    };

    match CacheManager::new(redis_url, l1_size, ttl).await {
        Ok(cache) => {
            info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_size, ttl);
            Arc::new(cache)
        }
        Err(e) => {
            warn!("Failed to connect to Redis ({}), falling back to in-process cache", e);
            Arc::new(CacheManager::in_memory(l1_size, ttl))
        }
    }
}

fn build_notifier(settings: &Settings) -> Arc<dyn Notifier> {
    let Some(url) = settings.notifications.webhook_url.as_deref() else {
        return Arc::new(LogNotifier);
    };

    match WebhookNotifier::new(url, settings.notifications.timeout_secs) {
        Ok(notifier) => {
            info!("Notifications are posted to {}", url);
            Arc::new(notifier)
        }
        Err(e) => {
            warn!("Failed to build webhook notifier ({}), logging notifications instead", e);
            Arc::new(LogNotifier)
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_logging(&settings.logging);
    info!("Starting Rally matching and reputation service...");

    let store = build_store(&settings).await?;
    let cache = build_cache(&settings).await;

    let profiles: Arc<dyn ProfileSource> = Arc::new(
        ProfileClient::new(
            settings.profiles.base_url.clone(),
            settings.profiles.api_key.clone(),
            settings.profiles.timeout_secs,
        )
        .map_err(|e| startup_error("Failed to build profile client", e))?
        .with_cache(cache),
    );

    let notifier = build_notifier(&settings);
    let engine_config = settings.to_engine_config();

    info!("Matcher initialized with weights: {:?}", engine_config.matcher.weights());

    let engine = Arc::new(Engine::new(Arc::clone(&store), profiles, notifier, engine_config));

    let auto_adjust = &settings.reputation.auto_adjust;
    if auto_adjust.enabled {
        Arc::clone(&engine.reputation).spawn_auto_adjust_job(Duration::from_secs(auto_adjust.interval_secs.max(1)));
        info!("Skill auto-adjustment runs every {}s", auto_adjust.interval_secs);
    }

    let app_state = AppState { engine, store };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(routes::handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(routes::handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
