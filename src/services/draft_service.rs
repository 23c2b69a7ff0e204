use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::draft::{DraftResponse, SaveDraftResponse},
    error::ServiceError,
    services::{match_service, sse_events},
    state::{
        DraftHandle, SharedState,
        draft::{DraftSession, SaveDecision, SavePhase, SnapshotOutcome},
        matches::{MatchRow, Snapshot, TournamentScope},
    },
};

/// Open a draft of `scope` baselined on its latest list.
pub async fn open_draft(
    state: &SharedState,
    scope: TournamentScope,
) -> Result<DraftResponse, ServiceError> {
    let snapshot = match_service::latest_snapshot(state, &scope).await?;
    let handle = state.insert_draft(DraftSession::open(scope, snapshot));
    let session = handle.session().lock().await;
    info!(draft = %handle.id(), scope = %handle.scope(), "draft opened");
    Ok(DraftResponse::from(&*session))
}

/// Look a draft up and mark it as in use.
pub fn require_draft(state: &SharedState, id: Uuid) -> Result<Arc<DraftHandle>, ServiceError> {
    let handle = state
        .draft(id)
        .ok_or_else(|| ServiceError::NotFound(format!("draft `{id}` not found")))?;
    handle.touch();
    Ok(handle)
}

/// Current view of a draft.
pub async fn get_draft(state: &SharedState, id: Uuid) -> Result<DraftResponse, ServiceError> {
    let handle = require_draft(state, id)?;
    let session = handle.session().lock().await;
    Ok(DraftResponse::from(&*session))
}

/// Replace the edited rows of a draft.
pub async fn update_draft(
    state: &SharedState,
    id: Uuid,
    rows: Vec<MatchRow>,
) -> Result<DraftResponse, ServiceError> {
    let handle = require_draft(state, id)?;
    let mut session = handle.session().lock().await;
    session.replace_draft(rows)?;
    Ok(DraftResponse::from(&*session))
}

/// Tear a draft down; its stream subscribers are disconnected.
pub fn close_draft(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let handle = state
        .remove_draft(id)
        .ok_or_else(|| ServiceError::NotFound(format!("draft `{id}` not found")))?;
    info!(draft = %id, scope = %handle.scope(), "draft closed");
    Ok(())
}

/// Run the save flow. A draft that would overwrite concurrent edits is parked
/// in the confirmation phase unless `force` confirms the overwrite.
///
/// The tournament's list is read, compared and committed under one hold of
/// its scope gate, so no other commit can land between the check and the write.
pub async fn save_draft(
    state: &SharedState,
    id: Uuid,
    force: bool,
) -> Result<SaveDraftResponse, ServiceError> {
    let handle = require_draft(state, id)?;
    let mut session = handle.session().lock().await;

    let entry = state.snapshots().entry(handle.scope());
    let gate = entry.lock().await;
    let latest = match_service::load_locked(state, &entry, handle.scope()).await?;
    session.on_server_snapshot(latest.clone())?;

    let awaiting_confirmation = matches!(session.save_phase(), SavePhase::ConfirmOverwrite { .. });
    let decision = match (force, awaiting_confirmation) {
        (true, true) => session.confirm_overwrite()?,
        (true, false) => match session.begin_save()? {
            SaveDecision::NeedsConfirmation(_) => session.confirm_overwrite()?,
            proceed => proceed,
        },
        (false, _) => session.begin_save()?,
    };

    let rows = match decision {
        SaveDecision::NeedsConfirmation(report) => {
            debug!(draft = %id, conflicts = report.details.len(), "save needs confirmation");
            return Ok(SaveDraftResponse::ConfirmOverwrite { report });
        }
        SaveDecision::Proceed(rows) => rows,
    };

    let committed =
        match match_service::commit_locked(state, &entry, handle.scope(), &latest, rows).await {
            Ok(committed) => committed,
            Err(err) => {
                warn!(draft = %id, error = %err, "save failed; draft kept");
                session.fail_save();
                return Err(err);
            }
        };
    drop(gate);
    session.complete_save(committed.clone())?;
    drop(session);

    propagate_snapshot(state, handle.scope(), id, &committed).await;
    Ok(SaveDraftResponse::Saved {
        version: committed.version,
        matches: committed.matches,
    })
}

/// Withdraw a pending overwrite confirmation.
pub async fn cancel_save(state: &SharedState, id: Uuid) -> Result<DraftResponse, ServiceError> {
    let handle = require_draft(state, id)?;
    let mut session = handle.session().lock().await;
    session.cancel_overwrite()?;
    Ok(DraftResponse::from(&*session))
}

/// Adopt pending upstream changes.
pub async fn merge_pending(state: &SharedState, id: Uuid) -> Result<DraftResponse, ServiceError> {
    let handle = require_draft(state, id)?;
    let mut session = handle.session().lock().await;
    let merged = session.merge()?.len();
    debug!(draft = %id, rows = merged, "merged upstream changes");
    Ok(DraftResponse::from(&*session))
}

/// Dismiss pending upstream changes.
pub async fn reject_pending(state: &SharedState, id: Uuid) -> Result<DraftResponse, ServiceError> {
    let handle = require_draft(state, id)?;
    let mut session = handle.session().lock().await;
    session.reject()?;
    Ok(DraftResponse::from(&*session))
}

/// Deliver a committed snapshot to every other open draft of `scope`.
pub async fn propagate_snapshot(
    state: &SharedState,
    scope: &TournamentScope,
    origin: Uuid,
    snapshot: &Snapshot,
) {
    for handle in state.drafts_for(scope) {
        if handle.id() == origin {
            continue;
        }

        let outcome = {
            let mut session = handle.session().lock().await;
            session.on_server_snapshot(snapshot.clone())
        };
        match outcome {
            Ok(SnapshotOutcome::PendingMerge(pending)) => {
                sse_events::send_pending_merge(&handle, &pending);
            }
            Ok(outcome) => {
                debug!(draft = %handle.id(), ?outcome, "snapshot delivered");
            }
            Err(err) => {
                warn!(draft = %handle.id(), error = %err, "failed to compare snapshot with draft");
            }
        }
    }
}

/// Evict drafts nobody has touched for the configured idle time. Runs until
/// the task is aborted.
pub async fn run_draft_expiry(state: SharedState) {
    let config = state.config().drafts().clone();
    let mut sweep = interval(config.sweep_interval());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        sweep.tick().await;
        for id in state.evict_idle_drafts(config.idle_ttl(), Instant::now()) {
            info!(draft = %id, idle_ttl = ?config.idle_ttl(), "idle draft evicted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::memory::MemoryMatchStore,
        state::{
            AppState,
            matches::{MatchField, MatchRow},
        },
    };

    fn row(id: &str, court: &str) -> MatchRow {
        MatchRow {
            court_id: Some(court.into()),
            ..MatchRow::new(id)
        }
    }

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default().with_draft_idle_ttl(Duration::from_secs(60)));
        state
            .install_match_store(Arc::new(MemoryMatchStore::new()))
            .await;
        state
    }

    #[tokio::test(start_paused = true)]
    async fn commit_landing_during_save_requires_confirmation() {
        let state = state_with_store().await;
        let scope = TournamentScope::new("org", "t1");
        match_service::commit_rows(&state, &scope, vec![row("m1", "c1")])
            .await
            .unwrap();

        let draft = open_draft(&state, scope.clone()).await.unwrap();
        update_draft(&state, draft.id, vec![row("m1", "c3")])
            .await
            .unwrap();

        // Another operator's commit holds the gate while the save starts.
        let entry = state.snapshots().entry(&scope);
        let gate = entry.lock().await;
        let save = tokio::spawn({
            let state = state.clone();
            async move { save_draft(&state, draft.id, false).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let current = entry.cached().await.unwrap();
        entry
            .store(Snapshot::new(current.version + 1, vec![row("m1", "c2")]))
            .await;
        drop(gate);

        let SaveDraftResponse::ConfirmOverwrite { report } = save.await.unwrap().unwrap() else {
            panic!("save must not overwrite the concurrent commit");
        };
        assert!(
            report
                .detail("m1")
                .unwrap()
                .conflicts
                .contains_key(&MatchField::CourtId)
        );
        let latest = match_service::latest_snapshot(&state, &scope).await.unwrap();
        assert_eq!(latest.matches[0].court_id.as_deref(), Some("c2"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_drafts_are_evicted_unless_streamed() {
        let state = state_with_store().await;
        let scope = TournamentScope::new("org", "t1");
        let idle = open_draft(&state, scope.clone()).await.unwrap();
        let streamed = open_draft(&state, scope.clone()).await.unwrap();
        let _listener = state.draft(streamed.id).unwrap().events().subscribe();

        tokio::time::advance(Duration::from_secs(30)).await;
        get_draft(&state, idle.id).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(state.evict_idle_drafts(Duration::from_secs(60), Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(30)).await;
        let evicted = state.evict_idle_drafts(Duration::from_secs(60), Instant::now());
        assert_eq!(evicted, vec![idle.id]);
        assert!(state.draft(idle.id).is_none());
        assert!(state.draft(streamed.id).is_some());
    }
}
