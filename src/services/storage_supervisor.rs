//! Keeps the storage backend connected, entering and leaving degraded mode.
//!
//! While degraded no store is installed in [`AppState`], so every storage
//! dependent operation fails fast instead of piling up on a dead backend.
//!
//! [`AppState`]: crate::state::AppState

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and supervise it until the process exits.
///
/// `connect` is retried with exponential backoff; once a store is installed
/// it is health-polled, and a lost backend is reconnected in place before the
/// supervisor falls back to a fresh connection. Non-retryable errors end
/// supervision, since no amount of backoff fixes a bad configuration.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                monitor(&state, store).await;

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) if !err.is_retryable() => {
                error!(error = %err, "storage configuration is unusable; staying in degraded mode");
                return;
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the installed store until it is lost beyond in-place recovery.
async fn monitor(state: &SharedState, store: Arc<dyn GameStore>) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.install_game_store(store.clone()).await;
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if recover(state, &store).await {
                    state.install_game_store(store.clone()).await;
                    sleep(HEALTH_POLL_INTERVAL).await;
                } else {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
            }
        }
    }
}

/// Try to re-establish the existing connection a bounded number of times.
///
/// The store is uninstalled on the first failed attempt so callers stop
/// reaching a backend that is known dead.
async fn recover(state: &SharedState, store: &Arc<dyn GameStore>) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!("storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.clear_game_store().await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}
