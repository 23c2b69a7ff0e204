//! Per-tournament cache of the authoritative match list.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::state::matches::{Snapshot, TournamentScope};

/// Cached snapshot plus the gate serializing commits for one tournament.
#[derive(Default)]
pub struct ScopeEntry {
    gate: Mutex<()>,
    latest: RwLock<Option<Snapshot>>,
}

impl ScopeEntry {
    /// Serialize load-and-commit sequences for this tournament.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Latest snapshot, when one was loaded or committed.
    pub async fn cached(&self) -> Option<Snapshot> {
        self.latest.read().await.clone()
    }

    /// Record `snapshot` unless a newer one is already cached.
    pub async fn store(&self, snapshot: Snapshot) -> bool {
        let mut guard = self.latest.write().await;
        if guard
            .as_ref()
            .is_some_and(|current| current.version > snapshot.version)
        {
            return false;
        }
        guard.replace(snapshot);
        true
    }
}

/// Registry of [`ScopeEntry`] values keyed by tournament.
#[derive(Default)]
pub struct SnapshotRegistry {
    scopes: DashMap<TournamentScope, Arc<ScopeEntry>>,
}

impl SnapshotRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `scope`, created on first use.
    ///
    /// The returned handle is detached from the map so callers may hold it
    /// across `.await` points.
    pub fn entry(&self, scope: &TournamentScope) -> Arc<ScopeEntry> {
        if let Some(entry) = self.scopes.get(scope) {
            return entry.clone();
        }
        self.scopes.entry(scope.clone()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::matches::MatchRow;

    #[tokio::test]
    async fn older_snapshots_never_replace_newer_ones() {
        let registry = SnapshotRegistry::new();
        let scope = TournamentScope::new("org", "t1");
        let entry = registry.entry(&scope);

        assert!(entry.store(Snapshot::new(2, vec![MatchRow::new("m1")])).await);
        assert!(!entry.store(Snapshot::new(1, Vec::new())).await);

        let cached = registry.entry(&scope).cached().await.unwrap();
        assert_eq!(cached.version, 2);
        assert_eq!(cached.matches.len(), 1);
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let registry = SnapshotRegistry::new();
        registry
            .entry(&TournamentScope::new("org", "t1"))
            .store(Snapshot::new(3, Vec::new()))
            .await;

        assert!(
            registry
                .entry(&TournamentScope::new("org", "t2"))
                .cached()
                .await
                .is_none()
        );
    }
}
