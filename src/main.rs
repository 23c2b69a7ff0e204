//! Tatami Back binary entrypoint wiring REST, WebSocket, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tatami_back::{
    config::AppConfig,
    dao::match_store::memory::MemoryMatchStore,
    routes,
    services::{draft_service, monitor_service, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());

    tokio::spawn(storage_supervisor::publish_degraded_changes(
        app_state.clone(),
    ));
    start_storage(app_state.clone()).await;
    let ticker = tokio::spawn(monitor_service::run_timer_ticks(app_state.clone()));
    let sweeper = tokio::spawn(draft_service::run_draft_expiry(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum");

    ticker.abort();
    sweeper.abort();
    info!("background tasks stopped");
    served
}

/// Supervise MongoDB when `MONGO_URI` is set; otherwise keep matches in memory.
async fn start_storage(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    {
        if env::var("MONGO_URI").is_ok() {
            use tatami_back::dao::match_store::{
                MatchStore,
                mongodb::{MongoConfig, MongoMatchStore},
            };
            use tatami_back::dao::storage::StorageError;

            info!("MONGO_URI set; supervising MongoDB match store");
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoMatchStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
            }));
            return;
        }
    }

    info!("no database configured; match lists are kept in memory");
    state
        .install_match_store(Arc::new(MemoryMatchStore::new()))
        .await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
