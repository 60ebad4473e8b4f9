use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("MONGO_URI environment variable is not set")]
    MissingUri,
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert game `{game_id}`")]
    InsertGame {
        game_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save game `{game_id}`")]
    SaveGame {
        game_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load game `{game_id}`")]
    LoadGame {
        game_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list games")]
    ListGames {
        #[source]
        source: MongoError,
    },
    #[error("failed to apply conditional update on game `{game_id}`")]
    ConditionalUpdate {
        game_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load question set `{id}`")]
    LoadQuestionSet {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list question sets")]
    ListQuestionSets {
        #[source]
        source: MongoError,
    },
}
