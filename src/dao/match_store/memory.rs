//! Process-local match store used when no database is configured and in tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
    dao::{
        match_store::MatchStore,
        models::MatchEntity,
        storage::{StorageError, StorageResult},
    },
    state::matches::TournamentScope,
};

/// Raised while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory match store is offline")]
pub struct MemoryStoreOffline;

#[derive(Default)]
struct MemoryInner {
    matches: DashMap<TournamentScope, Vec<MatchEntity>>,
    offline: AtomicBool,
}

/// Match store backed by a [`DashMap`]; contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<MemoryInner>,
}

impl MemoryMatchStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while offline every call fails as unavailable.
    pub fn set_available(&self, available: bool) {
        self.inner.offline.store(!available, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store offline",
                MemoryStoreOffline,
            ));
        }
        Ok(())
    }
}

impl MatchStore for MemoryMatchStore {
    fn load_matches(
        &self,
        scope: TournamentScope,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut matches = store
                .inner
                .matches
                .get(&scope)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();
            matches.sort_by(|left, right| {
                left.sort_order
                    .cmp(&right.sort_order)
                    .then_with(|| left.match_id.cmp(&right.match_id))
            });
            Ok(matches)
        })
    }

    fn replace_matches(
        &self,
        scope: TournamentScope,
        matches: Vec<MatchEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            if let Some(stray) = matches.iter().find(|entity| entity.scope() != scope) {
                return Err(StorageError::Corrupt(format!(
                    "match `{}` belongs to {} not {scope}",
                    stray.match_id,
                    stray.scope()
                )));
            }
            store.inner.matches.insert(scope, matches);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::matches::MatchRow;

    fn entity(scope: &TournamentScope, id: &str, sort_order: i64) -> MatchEntity {
        let mut row = MatchRow::new(id);
        row.sort_order = sort_order;
        MatchEntity::from_row(scope, row, SystemTime::now())
    }

    #[tokio::test]
    async fn replace_then_load_returns_rows_in_display_order() {
        let store = MemoryMatchStore::new();
        let scope = TournamentScope::new("org", "t1");
        store
            .replace_matches(
                scope.clone(),
                vec![entity(&scope, "m2", 2), entity(&scope, "m1", 1)],
            )
            .await
            .unwrap();

        let ids: Vec<String> = store
            .load_matches(scope)
            .await
            .unwrap()
            .into_iter()
            .map(|entity| entity.match_id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryMatchStore::new();
        store.set_available(false);
        let err = store
            .load_matches(TournamentScope::new("org", "t1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));

        store.set_available(true);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn rows_from_another_tournament_are_refused() {
        let store = MemoryMatchStore::new();
        let scope = TournamentScope::new("org", "t1");
        let other = TournamentScope::new("org", "t2");
        let err = store
            .replace_matches(scope, vec![entity(&other, "m1", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
