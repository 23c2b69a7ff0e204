/// MongoDB-backed store.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// In-process store.
pub mod memory;

use crate::dao::models::MatchEntity;
use crate::dao::storage::StorageResult;
use crate::state::matches::TournamentScope;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for tournament match lists.
pub trait MatchStore: Send + Sync {
    /// Every match of `scope`, ordered for display.
    fn load_matches(&self, scope: TournamentScope) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    /// Make `matches` the complete list of `scope`: rows missing from it are removed.
    fn replace_matches(
        &self,
        scope: TournamentScope,
        matches: Vec<MatchEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness check of the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
