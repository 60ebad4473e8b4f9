//! Buzzwire Back binary entrypoint wiring REST, WebSocket, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buzzwire_back::{
    config::AppConfig,
    dao::game_store::MemoryGameStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    install_storage(&app_state).await;

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port()));
    info!(%addr, "server listening");

    let listener = TcpListener::bind(addr)
        .await
        .context("binding the listen address")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running the server")?;

    Ok(())
}

/// `PORT` wins over `SERVER_PORT`; 8080 when neither parses.
fn server_port() -> u16 {
    env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080)
}

/// Pick the storage backend: MongoDB when `MONGO_URI` is set, supervised in
/// the background with reconnect and degraded mode handling; otherwise an
/// in-memory store seeded with a sample question set.
async fn install_storage(state: &SharedState) {
    #[cfg(feature = "mongo-store")]
    if env::var("MONGO_URI").is_ok() {
        use buzzwire_back::{
            dao::{
                game_store::{GameStore, MongoGameStore, mongodb::MongoConfig},
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        tokio::spawn(storage_supervisor::run(state.clone(), || async {
            let config = MongoConfig::from_env().await.map_err(StorageError::from)?;
            let store = MongoGameStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn GameStore>)
        }));
        return;
    }

    warn!("MONGO_URI not set; falling back to the in-memory store");
    state
        .install_game_store(Arc::new(MemoryGameStore::with_sample_set()))
        .await;
}

/// Attach the cross-cutting middleware to the full route tree.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// `RUST_LOG` wins; the default keeps tower-http request spans visible.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolve once the process is asked to stop, via Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
