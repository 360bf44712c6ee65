use actix_middleware::{CorrelationIdMiddleware, MetricsMiddleware, TokenVerifier};
use actix_web::{web, App, HttpServer};
use network_service::config::Config;
use network_service::repository::{AccountStore, InMemoryStore, PgStore, PostRepository};
use network_service::{db, routes, AppState};
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Network Service
///
/// Connection requests, privacy-aware feeds and post engagement for the
/// campus network.
///
/// # Routes
///
/// - `/api/v1/connections/*` - send, accept, reject, cancel, lists, status
/// - `/api/v1/feed/*` - latest, trending, category, hashtag, media, discovery
/// - `/api/v1/posts/*` - authoring, reads, likes, comments, saves, shares, views
///
/// Runs against PostgreSQL when `DATABASE_URL` is set, otherwise against an
/// in-memory store (development only).
#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            return Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    tracing::info!(
        env = %config.app.env,
        port = config.app.http_port,
        "Starting network-service"
    );

    let (accounts, posts): (Arc<dyn AccountStore>, Arc<dyn PostRepository>) =
        match &config.database {
            Some(db_config) => {
                let pool = db::create_pool(db_config).await.map_err(|e| {
                    tracing::error!(error = %e, "Database pool creation failed");
                    io::Error::new(io::ErrorKind::Other, e.to_string())
                })?;
                db::run_migrations(&pool).await.map_err(|e| {
                    tracing::error!(error = %e, "Database migrations failed");
                    io::Error::new(io::ErrorKind::Other, e.to_string())
                })?;

                let store = Arc::new(PgStore::new(pool, config.connections.write_retries));
                (store.clone(), store)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using the in-memory store");
                let store = Arc::new(InMemoryStore::new());
                (store.clone(), store)
            }
        };

    let state = web::Data::new(AppState::new(accounts, posts, config.feed.clone()));
    let verifier = Arc::new(TokenVerifier::from_secret(&config.auth.jwt_secret));

    let bind_address = format!("{}:{}", config.app.host, config.app.http_port);
    tracing::info!("Starting HTTP server on {}", bind_address);

    let server = HttpServer::new(move || {
        let verifier = verifier.clone();
        App::new()
            .app_data(state.clone())
            .wrap(MetricsMiddleware)
            .wrap(CorrelationIdMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(|cfg| routes::configure(cfg, verifier))
    })
    .bind(&bind_address)?
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        server_handle.stop(true).await;
    });

    server.await?;
    tracing::info!("network-service stopped");
    Ok(())
}
