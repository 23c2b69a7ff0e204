/// Three-way match list comparison.
pub mod conflict;
/// Monitor frame fan-out and the presentation session.
pub mod dispatch;
/// Draft session state machine.
pub mod draft;
/// Presentation heartbeat tracking.
pub mod heartbeat;
/// Match list domain types.
pub mod matches;
/// Live monitor state.
pub mod monitor;
/// Latest match list per tournament.
pub mod snapshots;
mod sse;

use std::{
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, RwLock, watch},
    time::Instant,
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::match_store::MatchStore,
    services::token_service::TokenService,
    state::{
        dispatch::{ChannelSink, MonitorDispatcher, MonitorSink, PresentationSink},
        draft::DraftSession,
        matches::TournamentScope,
        monitor::MonitorStore,
        snapshots::SnapshotRegistry,
    },
};

pub use self::sse::SseHub;
use self::sse::SseState;

/// Cheaply clonable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// An open draft session plus the stream its operator listens on.
pub struct DraftHandle {
    id: Uuid,
    scope: TournamentScope,
    session: Mutex<DraftSession>,
    events: SseHub,
    last_touched: StdMutex<Instant>,
}

impl DraftHandle {
    fn new(session: DraftSession) -> Self {
        Self {
            id: session.id(),
            scope: session.scope().clone(),
            session: Mutex::new(session),
            events: SseHub::new(8),
            last_touched: StdMutex::new(Instant::now()),
        }
    }

    /// Draft identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tournament the draft edits; fixed for the session's lifetime.
    pub fn scope(&self) -> &TournamentScope {
        &self.scope
    }

    /// Session state; every mutation goes through this lock.
    pub fn session(&self) -> &Mutex<DraftSession> {
        &self.session
    }

    /// Per-draft notifications such as pending merges.
    pub fn events(&self) -> &SseHub {
        &self.events
    }

    /// Record activity from the draft's operator.
    pub fn touch(&self) {
        *self
            .last_touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last activity.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let touched = *self
            .last_touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(touched)
    }
}

/// Central application state: storage handle, draft sessions and the live monitor.
pub struct AppState {
    config: Arc<AppConfig>,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    degraded: watch::Sender<bool>,
    sse: SseState,
    snapshots: SnapshotRegistry,
    drafts: DashMap<Uuid, Arc<DraftHandle>>,
    monitor: MonitorStore,
    dispatcher: MonitorDispatcher,
    presentation: Arc<PresentationSink>,
    tokens: TokenService,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a match store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let sse = SseState::new(32, 16);
        let presentation = Arc::new(PresentationSink::new(
            config.monitor().heartbeat_timeout(),
        ));
        let sinks: Vec<Arc<dyn MonitorSink>> = vec![
            Arc::new(ChannelSink::new(sse.monitor().clone())),
            presentation.clone(),
        ];
        let dispatcher = MonitorDispatcher::new(sinks);

        Arc::new(Self {
            match_store: RwLock::new(None),
            degraded: degraded_tx,
            sse,
            snapshots: SnapshotRegistry::new(),
            drafts: DashMap::new(),
            monitor: MonitorStore::new(config.monitor().default_duration_ms()),
            dispatcher,
            presentation,
            tokens: TokenService::new(config.token()),
            config: Arc::new(config),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn install_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Broadcast hub used for the operator SSE stream.
    pub fn operator_sse(&self) -> &SseHub {
        self.sse.operator()
    }

    /// Broadcast hub feeding the monitor SSE stream.
    pub fn monitor_sse(&self) -> &SseHub {
        self.sse.monitor()
    }

    /// Latest known match list per tournament.
    pub fn snapshots(&self) -> &SnapshotRegistry {
        &self.snapshots
    }

    /// Register a freshly opened draft.
    pub fn insert_draft(&self, session: DraftSession) -> Arc<DraftHandle> {
        let handle = Arc::new(DraftHandle::new(session));
        self.drafts.insert(handle.id(), handle.clone());
        handle
    }

    /// Look up a draft, detached from the registry so it can be held across awaits.
    pub fn draft(&self, id: Uuid) -> Option<Arc<DraftHandle>> {
        self.drafts.get(&id).map(|entry| entry.value().clone())
    }

    /// Unregister a draft.
    pub fn remove_draft(&self, id: Uuid) -> Option<Arc<DraftHandle>> {
        self.drafts.remove(&id).map(|(_, handle)| handle)
    }

    /// Unregister every draft idle for at least `ttl` and return their ids.
    /// A draft whose stream has subscribers counts as active.
    pub fn evict_idle_drafts(&self, ttl: Duration, now: Instant) -> Vec<Uuid> {
        let mut evicted = Vec::new();
        self.drafts.retain(|id, handle| {
            if handle.events().receiver_count() > 0 {
                handle.touch();
                return true;
            }
            let idle = handle.idle_for(now) >= ttl;
            if idle {
                evicted.push(*id);
            }
            !idle
        });
        evicted
    }

    /// Every open draft editing `scope`.
    pub fn drafts_for(&self, scope: &TournamentScope) -> Vec<Arc<DraftHandle>> {
        self.drafts
            .iter()
            .filter(|entry| entry.value().scope() == scope)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of open drafts, reported by the health check.
    pub fn open_draft_count(&self) -> usize {
        self.drafts.len()
    }

    /// Owner of the live monitor state.
    pub fn monitor(&self) -> &MonitorStore {
        &self.monitor
    }

    /// Fan-out of monitor frames.
    pub fn dispatcher(&self) -> &MonitorDispatcher {
        &self.dispatcher
    }

    /// External display sink.
    pub fn presentation(&self) -> &Arc<PresentationSink> {
        &self.presentation
    }

    /// Monitor token signer.
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}
