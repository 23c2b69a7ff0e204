use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    services::sse_events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_match_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "storage health check failed");
                            if reconnect(&state, store.as_ref()).await {
                                state.update_degraded(false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            }
                            warn!("exhausted storage reconnect attempts; staying in degraded mode");
                            break;
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn MatchStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

/// Relay degraded mode changes to the operator stream until the state is dropped.
pub async fn publish_degraded_changes(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        info!(degraded, "storage availability changed");
        sse_events::broadcast_system_status(&state, degraded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::match_store::memory::MemoryMatchStore, state::AppState};

    #[tokio::test(start_paused = true)]
    async fn connects_and_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());

        let store = MemoryMatchStore::new();
        let task = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>) }
        }));

        tokio::task::yield_now().await;
        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());
        assert!(state.match_store().await.is_some());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_store_enters_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryMatchStore::new();
        let handle = store.clone();
        let task = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());

        handle.set_available(false);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded());
        task.abort();
    }
}
