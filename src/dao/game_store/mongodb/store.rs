use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::{Bson, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, MongoQuestionSetDocument, uuid_as_binary},
};
use crate::dao::{
    game_store::{CasOutcome, GameStore, InsertOutcome},
    models::{GameEntity, GameListItemEntity, QuestionSetEntity, QuestionSetListItemEntity},
    storage::StorageResult,
};

const GAME_COLLECTION_NAME: &str = "games";
const QUESTION_SET_COLLECTION_NAME: &str = "question_sets";

#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        // Game uniqueness rides on `_id` (the join code); only question sets
        // need an extra unique index on their name.
        let database = self.database().await;
        let collection =
            database.collection::<MongoQuestionSetDocument>(QUESTION_SET_COLLECTION_NAME);
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"name": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("question_set_name_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUESTION_SET_COLLECTION_NAME,
                index: "name",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn question_set_collection(&self) -> Collection<MongoQuestionSetDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuestionSetDocument>(QUESTION_SET_COLLECTION_NAME)
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<InsertOutcome> {
        let game_id = game.game_id.clone();
        let document: MongoGameDocument = game.into();
        let collection = self.collection().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_duplicate_key(&err) => Ok(InsertOutcome::DuplicateId),
            Err(source) => Err(MongoDaoError::InsertGame { game_id, source }),
        }
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let game_id = game.game_id.clone();
        let document: MongoGameDocument = game.into();
        let collection = self.collection().await;

        collection
            .replace_one(doc! {"_id": &game_id}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame { game_id, source })?;

        Ok(())
    }

    async fn find_game(&self, game_id: String) -> MongoResult<Option<GameEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc! {"_id": &game_id})
            .await
            .map_err(|source| MongoDaoError::LoadGame { game_id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_games(&self) -> MongoResult<Vec<GameListItemEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoGameDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let entity: GameEntity = document.into();
                entity.into()
            })
            .collect())
    }

    async fn compare_and_set_answering(
        &self,
        game_id: String,
        expected: Option<String>,
        next: Option<String>,
    ) -> MongoResult<CasOutcome> {
        let collection = self.collection().await;

        let filter = doc! {
            "_id": &game_id,
            "answering_team_name": answering_bson(expected.as_deref()),
        };
        let update = doc! {
            "$set": {"answering_team_name": answering_bson(next.as_deref())},
        };

        let result = collection
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::ConditionalUpdate { game_id, source })?;

        Ok(if result.matched_count == 1 {
            CasOutcome::Applied
        } else {
            CasOutcome::Stale
        })
    }

    async fn bind_team_channel(
        &self,
        game_id: String,
        team_name: String,
        channel_id: Uuid,
    ) -> MongoResult<bool> {
        let collection = self.collection().await;

        let filter = doc! {"_id": &game_id, "teams.name": &team_name};
        let update = doc! {"$set": {"teams.$.channel_id": uuid_as_binary(channel_id)}};

        let result = collection
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::ConditionalUpdate { game_id, source })?;

        Ok(result.matched_count > 0)
    }

    async fn clear_team_channel_if(
        &self,
        game_id: String,
        team_name: String,
        expected: Uuid,
    ) -> MongoResult<CasOutcome> {
        let collection = self.collection().await;

        let filter = doc! {
            "_id": &game_id,
            "teams": {"$elemMatch": {"name": &team_name, "channel_id": uuid_as_binary(expected)}},
        };
        let update = doc! {"$set": {"teams.$.channel_id": Bson::Null}};

        let result = collection
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::ConditionalUpdate { game_id, source })?;

        Ok(if result.matched_count == 1 {
            CasOutcome::Applied
        } else {
            CasOutcome::Stale
        })
    }

    async fn find_question_set(&self, id: Uuid) -> MongoResult<Option<QuestionSetEntity>> {
        let collection = self.question_set_collection().await;

        let document = collection
            .find_one(doc! {"_id": uuid_as_binary(id)})
            .await
            .map_err(|source| MongoDaoError::LoadQuestionSet { id, source })?;

        Ok(document.map(Into::into))
    }

    async fn list_question_sets(&self) -> MongoResult<Vec<QuestionSetListItemEntity>> {
        let collection = self.question_set_collection().await;

        let documents: Vec<MongoQuestionSetDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListQuestionSets { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListQuestionSets { source })?;

        Ok(documents
            .into_iter()
            .map(|document| {
                let entity: QuestionSetEntity = document.into();
                entity.into()
            })
            .collect())
    }
}

impl GameStore for MongoGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        Box::pin(async move { store.find_game(game_id).await.map_err(Into::into) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games().await.map_err(Into::into) })
    }

    fn compare_and_set_answering(
        &self,
        game_id: &str,
        expected: Option<&str>,
        next: Option<&str>,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        let expected = expected.map(str::to_owned);
        let next = next.map(str::to_owned);
        Box::pin(async move {
            store
                .compare_and_set_answering(game_id, expected, next)
                .await
                .map_err(Into::into)
        })
    }

    fn bind_team_channel(
        &self,
        game_id: &str,
        team_name: &str,
        channel_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        let team_name = team_name.to_owned();
        Box::pin(async move {
            store
                .bind_team_channel(game_id, team_name, channel_id)
                .await
                .map_err(Into::into)
        })
    }

    fn clear_team_channel_if(
        &self,
        game_id: &str,
        team_name: &str,
        expected: Uuid,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        let game_id = game_id.to_owned();
        let team_name = team_name.to_owned();
        Box::pin(async move {
            store
                .clear_team_channel_if(game_id, team_name, expected)
                .await
                .map_err(Into::into)
        })
    }

    fn find_question_set(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionSetEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question_set(id).await.map_err(Into::into) })
    }

    fn list_question_sets(
        &self,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionSetListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_question_sets().await.map_err(Into::into) })
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

fn answering_bson(value: Option<&str>) -> Bson {
    match value {
        Some(name) => Bson::String(name.to_owned()),
        None => Bson::Null,
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11_000
    )
}
