use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, scope_filter},
};
use crate::{
    dao::{match_store::MatchStore, models::MatchEntity, storage::StorageResult},
    state::matches::TournamentScope,
};

const MATCH_COLLECTION_NAME: &str = "matches";
const MATCH_KEY_INDEX: &str = "match_scope_idx";

/// [`MatchStore`] persisting one document per match.
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            database: RwLock::new(database),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! {"org_id": 1, "tournament_id": 1, "match_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some(MATCH_KEY_INDEX.to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "org_id,tournament_id,match_id",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.database.read().await;
        guard.collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn load_matches(&self, scope: TournamentScope) -> MongoResult<Vec<MatchEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoMatchDocument> = collection
            .find(scope_filter(&scope))
            .sort(doc! {"sort_order": 1, "match_id": 1})
            .await
            .map_err(|source| MongoDaoError::LoadMatches {
                scope: scope.to_string(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadMatches {
                scope: scope.to_string(),
                source,
            })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Prune rows missing from `matches`, then upsert the rest by natural key.
    ///
    /// The two steps are not atomic; a failure between them leaves a list
    /// that the next successful save fully overwrites.
    async fn replace_matches(
        &self,
        scope: TournamentScope,
        matches: Vec<MatchEntity>,
    ) -> MongoResult<()> {
        let collection = self.collection().await;
        let kept: Vec<&str> = matches.iter().map(|entity| entity.match_id.as_str()).collect();

        let mut prune = scope_filter(&scope);
        prune.insert("match_id", doc! {"$nin": kept});
        let pruned = collection
            .delete_many(prune)
            .await
            .map_err(|source| MongoDaoError::PruneMatches {
                scope: scope.to_string(),
                source,
            })?;

        let documents: Vec<MongoMatchDocument> = matches.into_iter().map(Into::into).collect();
        for document in &documents {
            collection
                .replace_one(document.key(), document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::SaveMatch {
                    scope: scope.to_string(),
                    match_id: document.match_id().to_owned(),
                    source,
                })?;
        }

        debug!(
            scope = %scope,
            written = documents.len(),
            pruned = pruned.deleted_count,
            "replaced tournament matches"
        );
        Ok(())
    }
}

impl MatchStore for MongoMatchStore {
    fn load_matches(
        &self,
        scope: TournamentScope,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_matches(scope).await.map_err(Into::into) })
    }

    fn replace_matches(
        &self,
        scope: TournamentScope,
        matches: Vec<MatchEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_matches(scope, matches)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
