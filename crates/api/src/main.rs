use std::net::SocketAddr;
use std::sync::Arc;

use adgen_api::config::{ProviderMode, ServerConfig};
use adgen_api::router::build_app_router;
use adgen_api::state::AppState;
use adgen_db::{InMemoryJobStore, JobStore, PgJobStore};
use adgen_events::EventBus;
use adgen_pipeline::{Dispatcher, ManifestComposer, Reconciler};
use adgen_providers::{Delivery, ScriptedProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "adgen_api=debug,adgen_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        host = %config.host,
        port = config.port,
        provider_mode = %config.provider_mode,
        "Loaded server configuration",
    );

    // --- Job store ---
    let store: Arc<dyn JobStore> = match &config.database_url {
        Some(database_url) => {
            let pool = adgen_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            adgen_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            adgen_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgJobStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, jobs are kept in memory only");
            Arc::new(InMemoryJobStore::new())
        }
    };

    // --- Pipeline ---
    let event_bus = Arc::new(EventBus::default());
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        Arc::new(ManifestComposer),
        Arc::clone(&event_bus),
    ));
    let dispatcher = match config.provider_mode {
        ProviderMode::Http => Dispatcher::new(config.provider.clone(), Arc::clone(&event_bus))
            .expect("Failed to build provider HTTP client"),
        ProviderMode::Simulated => {
            let provider = Arc::new(ScriptedProvider::new(
                reconciler.clone(),
                Delivery::Immediate,
            ));
            Dispatcher::with_provider(config.provider.clone(), provider, Arc::clone(&event_bus))
        }
    };

    let addr = SocketAddr::new(config.host, config.port);
    let state = AppState::new(config, store, event_bus, reconciler, dispatcher);
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
