use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB match store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required environment variable is unset.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// `MONGO_URI` could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Rejected URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Creating the match index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection holding the index.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a tournament's matches failed.
    #[error("failed to load matches of `{scope}`")]
    LoadMatches {
        /// Tournament being read.
        scope: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Upserting one match failed.
    #[error("failed to save match `{match_id}` of `{scope}`")]
    SaveMatch {
        /// Tournament being written.
        scope: String,
        /// Match being written.
        match_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Deleting matches dropped from the list failed.
    #[error("failed to prune matches of `{scope}`")]
    PruneMatches {
        /// Tournament being written.
        scope: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
