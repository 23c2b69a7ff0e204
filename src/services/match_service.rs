use std::{sync::Arc, time::SystemTime};

use tracing::info;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{MatchEntity, sort_for_display},
    },
    dto::matches::MatchListResponse,
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        matches::{MatchRow, Snapshot, TournamentScope},
        snapshots::ScopeEntry,
    },
};

/// Current match store, or [`ServiceError::Degraded`] while storage is down.
pub async fn require_match_store(state: &SharedState) -> Result<Arc<dyn MatchStore>, ServiceError> {
    if state.is_degraded() {
        return Err(ServiceError::Degraded);
    }
    state.match_store().await.ok_or(ServiceError::Degraded)
}

/// Latest authoritative list of `scope`, loaded from storage on first use.
pub async fn latest_snapshot(
    state: &SharedState,
    scope: &TournamentScope,
) -> Result<Snapshot, ServiceError> {
    let entry = state.snapshots().entry(scope);
    if let Some(snapshot) = entry.cached().await {
        return Ok(snapshot);
    }

    let _gate = entry.lock().await;
    load_locked(state, &entry, scope).await
}

/// Latest list of `scope` as served to operators.
pub async fn list_matches(
    state: &SharedState,
    scope: TournamentScope,
) -> Result<MatchListResponse, ServiceError> {
    let snapshot = latest_snapshot(state, &scope).await?;
    Ok(MatchListResponse::new(scope, snapshot))
}

/// Persist `rows` as the complete list of `scope` and publish the new version.
pub async fn commit_rows(
    state: &SharedState,
    scope: &TournamentScope,
    rows: Vec<MatchRow>,
) -> Result<Snapshot, ServiceError> {
    let entry = state.snapshots().entry(scope);
    let _gate = entry.lock().await;
    let current = load_locked(state, &entry, scope).await?;
    commit_locked(state, &entry, scope, &current, rows).await
}

/// Write `rows` on top of `current`; the caller holds the scope gate and
/// `current` is the snapshot it read under that gate.
pub async fn commit_locked(
    state: &SharedState,
    entry: &ScopeEntry,
    scope: &TournamentScope,
    current: &Snapshot,
    mut rows: Vec<MatchRow>,
) -> Result<Snapshot, ServiceError> {
    sort_for_display(&mut rows);
    let now = SystemTime::now();
    let entities = rows
        .iter()
        .cloned()
        .map(|row| MatchEntity::from_row(scope, row, now))
        .collect();
    require_match_store(state)
        .await?
        .replace_matches(scope.clone(), entities)
        .await?;

    let snapshot = Snapshot::new(current.version + 1, rows);
    entry.store(snapshot.clone()).await;
    info!(
        scope = %scope,
        version = snapshot.version,
        count = snapshot.matches.len(),
        "committed match list"
    );
    sse_events::broadcast_matches_snapshot(state, scope, &snapshot);
    Ok(snapshot)
}

/// Read-through load; the caller holds the scope gate.
pub async fn load_locked(
    state: &SharedState,
    entry: &ScopeEntry,
    scope: &TournamentScope,
) -> Result<Snapshot, ServiceError> {
    if let Some(snapshot) = entry.cached().await {
        return Ok(snapshot);
    }

    let store = require_match_store(state).await?;
    let mut rows: Vec<MatchRow> = store
        .load_matches(scope.clone())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    sort_for_display(&mut rows);

    let snapshot = Snapshot::new(0, rows);
    entry.store(snapshot.clone()).await;
    Ok(snapshot)
}
