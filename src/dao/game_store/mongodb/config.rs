use std::env;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection URI, defaulting the database name when absent.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(Self {
            options,
            database_name: db_name.unwrap_or("buzzwire").to_owned(),
        })
    }

    /// Build the configuration from `MONGO_URI` and optional `MONGO_DB`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = env::var("MONGO_URI").map_err(|_| MongoDaoError::MissingUri)?;
        let db = env::var("MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}
