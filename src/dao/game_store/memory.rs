//! In-memory [`GameStore`] backend.
//!
//! Used when the server runs without MongoDB (local development) and as the
//! storage fixture in service tests. Entries live in [`DashMap`]s; the
//! conditional updates run under the per-entry lock, which gives them the
//! same atomicity the MongoDB backend gets from filtered updates.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::game_store::{CasOutcome, GameStore, InsertOutcome};
use crate::dao::models::{
    GameEntity, GameListItemEntity, QuestionEntity, QuestionSetEntity, QuestionSetListItemEntity,
};
use crate::dao::storage::StorageResult;

/// Volatile game store holding every document in process memory.
#[derive(Default)]
pub struct MemoryGameStore {
    games: DashMap<String, GameEntity>,
    question_sets: DashMap<Uuid, QuestionSetEntity>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with a small general-knowledge question set
    /// so a storage-less deployment can still run games.
    pub fn with_sample_set() -> Self {
        let store = Self::new();
        store.put_question_set(sample_question_set());
        store
    }

    /// Insert or replace a question set.
    pub fn put_question_set(&self, set: QuestionSetEntity) {
        self.question_sets.insert(set.id, set);
    }
}

impl GameStore for MemoryGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let outcome = match self.games.entry(game.game_id.clone()) {
            Entry::Occupied(_) => InsertOutcome::DuplicateId,
            Entry::Vacant(slot) => {
                slot.insert(game);
                InsertOutcome::Inserted
            }
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.games.insert(game.game_id.clone(), game);
        Box::pin(async move { Ok(()) })
    }

    fn find_game(&self, game_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let found = self.games.get(game_id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let items = self
            .games
            .iter()
            .map(|entry| entry.value().clone().into())
            .collect();
        Box::pin(async move { Ok(items) })
    }

    fn compare_and_set_answering(
        &self,
        game_id: &str,
        expected: Option<&str>,
        next: Option<&str>,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let outcome = match self.games.get_mut(game_id) {
            Some(mut entry) => {
                let game = entry.value_mut();
                if game.answering_team_name.as_deref() == expected {
                    game.answering_team_name = next.map(str::to_owned);
                    CasOutcome::Applied
                } else {
                    CasOutcome::Stale
                }
            }
            None => CasOutcome::Stale,
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn bind_team_channel(
        &self,
        game_id: &str,
        team_name: &str,
        channel_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let bound = match self.games.get_mut(game_id) {
            Some(mut entry) => {
                match entry
                    .value_mut()
                    .teams
                    .iter_mut()
                    .find(|team| team.name == team_name)
                {
                    Some(team) => {
                        team.channel_id = Some(channel_id);
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };
        Box::pin(async move { Ok(bound) })
    }

    fn clear_team_channel_if(
        &self,
        game_id: &str,
        team_name: &str,
        expected: Uuid,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let outcome = match self.games.get_mut(game_id) {
            Some(mut entry) => {
                match entry
                    .value_mut()
                    .teams
                    .iter_mut()
                    .find(|team| team.name == team_name)
                {
                    Some(team) if team.channel_id == Some(expected) => {
                        team.channel_id = None;
                        CasOutcome::Applied
                    }
                    _ => CasOutcome::Stale,
                }
            }
            None => CasOutcome::Stale,
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn find_question_set(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionSetEntity>>> {
        let found = self
            .question_sets
            .get(&id)
            .map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_question_sets(
        &self,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionSetListItemEntity>>> {
        let items = self
            .question_sets
            .iter()
            .map(|entry| entry.value().clone().into())
            .collect();
        Box::pin(async move { Ok(items) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}

/// Built-in question set shipped with the binary for storage-less runs.
fn sample_question_set() -> QuestionSetEntity {
    let question = |category: &str, text: &str, options: [&str; 4], correct: usize| QuestionEntity {
        category: Some(category.to_owned()),
        question_text: text.to_owned(),
        options: options.iter().map(|option| (*option).to_owned()).collect(),
        correct_answer: options[correct].to_owned(),
    };

    QuestionSetEntity {
        id: Uuid::new_v4(),
        name: "Sample general knowledge".to_owned(),
        description: "Built-in set available when no database is configured".to_owned(),
        questions: vec![
            question(
                "Geography",
                "Which is the largest ocean on Earth?",
                ["Atlantic", "Indian", "Pacific", "Arctic"],
                2,
            ),
            question(
                "Science",
                "What gas do plants absorb from the atmosphere?",
                ["Oxygen", "Carbon dioxide", "Nitrogen", "Helium"],
                1,
            ),
            question(
                "History",
                "In which year did the Berlin Wall fall?",
                ["1979", "1985", "1989", "1991"],
                2,
            ),
            question(
                "Arts",
                "Who painted the Mona Lisa?",
                ["Michelangelo", "Raphael", "Rembrandt", "Leonardo da Vinci"],
                3,
            ),
            question(
                "Sports",
                "How many players does a volleyball team field at once?",
                ["5", "6", "7", "11"],
                1,
            ),
            question(
                "Science",
                "Which planet has the most moons discovered so far?",
                ["Earth", "Mars", "Saturn", "Venus"],
                2,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::machine::GameStatus;

    fn fixture_game(game_id: &str) -> GameEntity {
        GameEntity {
            game_id: game_id.to_owned(),
            client_name: "Acme".to_owned(),
            intervention_name: None,
            batch_id: None,
            number_of_teams: 4,
            status: GameStatus::Lobby,
            teams: vec![],
            question_set_id: Uuid::new_v4(),
            questions: vec![],
            current_question_index: None,
            answering_team_name: None,
            attempted_teams: vec![],
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_join_code() {
        let store = MemoryGameStore::new();

        let first = store.insert_game(fixture_game("ABC123")).await.unwrap();
        assert_eq!(first, InsertOutcome::Inserted);

        let second = store.insert_game(fixture_game("ABC123")).await.unwrap();
        assert_eq!(second, InsertOutcome::DuplicateId);
    }

    #[tokio::test]
    async fn answering_cas_applies_only_on_expected_value() {
        let store = MemoryGameStore::new();
        store.insert_game(fixture_game("ABC123")).await.unwrap();

        let grabbed = store
            .compare_and_set_answering("ABC123", None, Some("Red"))
            .await
            .unwrap();
        assert_eq!(grabbed, CasOutcome::Applied);

        // A second grab against an open lock must lose.
        let raced = store
            .compare_and_set_answering("ABC123", None, Some("Blue"))
            .await
            .unwrap();
        assert_eq!(raced, CasOutcome::Stale);

        let game = store.find_game("ABC123").await.unwrap().unwrap();
        assert_eq!(game.answering_team_name.as_deref(), Some("Red"));

        let released = store
            .compare_and_set_answering("ABC123", Some("Red"), None)
            .await
            .unwrap();
        assert_eq!(released, CasOutcome::Applied);
    }

    #[tokio::test]
    async fn answering_cas_on_unknown_game_is_stale() {
        let store = MemoryGameStore::new();
        let outcome = store
            .compare_and_set_answering("NOPE", None, Some("Red"))
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Stale);
    }

    #[tokio::test]
    async fn channel_clear_is_guarded_by_expected_id() {
        let store = MemoryGameStore::new();
        let mut game = fixture_game("ABC123");
        game.teams.push(crate::dao::models::TeamEntity {
            name: "Red".to_owned(),
            score: 0,
            is_ready: false,
            channel_id: None,
        });
        store.insert_game(game).await.unwrap();

        let old_channel = Uuid::new_v4();
        let new_channel = Uuid::new_v4();

        assert!(
            store
                .bind_team_channel("ABC123", "Red", old_channel)
                .await
                .unwrap()
        );
        // Reconnect supersedes the binding before the old channel disconnects.
        assert!(
            store
                .bind_team_channel("ABC123", "Red", new_channel)
                .await
                .unwrap()
        );

        let stale_clear = store
            .clear_team_channel_if("ABC123", "Red", old_channel)
            .await
            .unwrap();
        assert_eq!(stale_clear, CasOutcome::Stale);

        let game = store.find_game("ABC123").await.unwrap().unwrap();
        assert_eq!(game.teams[0].channel_id, Some(new_channel));

        let live_clear = store
            .clear_team_channel_if("ABC123", "Red", new_channel)
            .await
            .unwrap();
        assert_eq!(live_clear, CasOutcome::Applied);

        let game = store.find_game("ABC123").await.unwrap().unwrap();
        assert_eq!(game.teams[0].channel_id, None);
    }

    #[tokio::test]
    async fn bind_channel_reports_unknown_team() {
        let store = MemoryGameStore::new();
        store.insert_game(fixture_game("ABC123")).await.unwrap();

        let bound = store
            .bind_team_channel("ABC123", "Ghost", Uuid::new_v4())
            .await
            .unwrap();
        assert!(!bound);
    }
}
