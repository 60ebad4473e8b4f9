mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoGameStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::MissingUri | MongoDaoError::InvalidUri { .. } => {
                StorageError::misconfigured(err.to_string(), err)
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
