//! FUN Charity server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use fun_api::{AppState, SessionVerifier, auth_middleware, router as api_router};
use fun_common::{Config, LocalStorage};
use fun_core::{
    ChangeFeed, ChangePublisher, ChangeTable, DataGateway, FeedCache, HttpFunctionInvoker,
    LocalChangeFeed, RealtimeSync,
};
use fun_realtime::RedisChangeFeed;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional `.env` for local development.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fun=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("FUN_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting FUN Charity server...");

    let config = Config::load()?;

    let db = fun_db::connect(&config.database).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    fun_db::migrate(&db).await?;
    info!("Migrations completed");

    let media_dir = ServeDir::new(&config.storage.base_path);
    let storage = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));
    let functions = Arc::new(HttpFunctionInvoker::new(&config.functions)?);

    // Redis fans changes out across instances; without it they stay in process.
    let redis = match &config.redis {
        Some(redis_config) => {
            info!("Connecting to Redis change feed...");
            let feed = RedisChangeFeed::connect(&redis_config.url, &redis_config.prefix).await?;
            feed.start().await?;
            Some(Arc::new(feed))
        }
        None => {
            warn!("No Redis configured, change events are local to this instance");
            None
        }
    };
    let (publisher, changes): (Arc<dyn ChangePublisher>, Arc<dyn ChangeFeed>) = match &redis {
        Some(feed) => (
            feed.clone() as Arc<dyn ChangePublisher>,
            feed.clone() as Arc<dyn ChangeFeed>,
        ),
        None => {
            let local = Arc::new(LocalChangeFeed::new());
            (
                local.clone() as Arc<dyn ChangePublisher>,
                local as Arc<dyn ChangeFeed>,
            )
        }
    };

    let cache = Arc::new(FeedCache::new());
    let gateway = DataGateway::from_connection(Arc::new(db), storage)
        .with_functions(functions, config.functions.moderation_function.clone())
        .with_publisher(publisher)
        .with_cache(cache.clone());

    let mut sync = RealtimeSync::start(changes.as_ref(), cache, &ChangeTable::ALL);

    let state = AppState::new(
        gateway,
        changes,
        SessionVerifier::new(&config.auth.jwt_secret),
    );

    let app = Router::new()
        .nest("/api", api_router())
        .nest_service("/files", media_dir)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sync.close();
    if let Some(feed) = redis
        && let Err(e) = feed.shutdown().await
    {
        warn!(error = %e, "Redis change feed did not shut down cleanly");
    }

    info!("Server shutdown complete");
    Ok(())
}
