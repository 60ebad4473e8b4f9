/// In-memory backend used for development and tests.
pub mod memory;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GameEntity, GameListItemEntity, QuestionSetEntity, QuestionSetListItemEntity,
};
use crate::dao::storage::StorageResult;

pub use memory::MemoryGameStore;
#[cfg(feature = "mongo-store")]
pub use mongodb::MongoGameStore;

/// Outcome of inserting a game under a fresh join code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The game was stored under its join code.
    Inserted,
    /// Another game already owns this join code.
    DuplicateId,
}

/// Outcome of a conditional field update.
///
/// `Stale` means the stored value no longer matched the expectation, i.e. a
/// concurrent writer got there first and the caller must treat its own
/// mutation as lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expectation held and the new value was written.
    Applied,
    /// The stored value differed from the expectation; nothing was written.
    Stale,
}

impl CasOutcome {
    /// Whether the conditional write went through.
    pub fn applied(self) -> bool {
        matches!(self, CasOutcome::Applied)
    }
}

/// Abstraction over the persistence layer for game sessions and question sets.
///
/// The whole-document operations follow a read-modify-write discipline; the
/// `compare_and_set_answering` and `clear_team_channel_if` operations are the
/// arbitration points where concurrent writers are resolved at the storage
/// level, so backends must implement them as single atomic conditional
/// updates.
pub trait GameStore: Send + Sync {
    /// Insert a new game, failing softly when the join code is taken.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    /// Persist the full game document, replacing the stored version.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a game by its join code.
    fn find_game(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// List all stored games in summary form.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>>;
    /// Atomically set `answering_team_name` to `next` only if it currently
    /// equals `expected`.
    fn compare_and_set_answering(
        &self,
        game_id: &str,
        expected: Option<&str>,
        next: Option<&str>,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Bind a team to its current WebSocket channel, returning whether the
    /// team exists.
    fn bind_team_channel(
        &self,
        game_id: &str,
        team_name: &str,
        channel_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Atomically clear a team's channel binding only if it still points at
    /// `expected`. Keeps a disconnect of a superseded channel from wiping a
    /// newer binding.
    fn clear_team_channel_if(
        &self,
        game_id: &str,
        team_name: &str,
        expected: Uuid,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Fetch a question set by id.
    fn find_question_set(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionSetEntity>>>;
    /// List available question sets in summary form.
    fn list_question_sets(
        &self,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionSetListItemEntity>>>;
    /// Cheap probe used by the supervisor to detect a lost backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
