//! Game bootstrap and read-side operations backed by the game store.

use rand::{Rng, rng, seq::SliceRandom};
use tracing::info;
use validator::Validate;

use crate::{
    dao::{game_store::InsertOutcome, models::GameEntity},
    dto::game::{CreateGameRequest, GameListItem, GameStateDto, QuestionSetListItem},
    error::ServiceError,
    state::{
        SharedState,
        game::{GameSession, Question},
    },
};

/// Attempts at drawing an unused join code before the request fails.
const JOIN_CODE_ATTEMPTS: usize = 5;
const JOIN_CODE_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Bootstrap a fresh game in the lobby from a stored question set.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameStateDto, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(format!("validation failed: {err}")))?;

    let store = state.require_game_store().await?;

    let Some(set) = store.find_question_set(request.question_set_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "question set `{}` not found",
            request.question_set_id
        )));
    };

    if set.questions.is_empty() {
        return Err(ServiceError::InvalidState(format!(
            "question set `{}` has no questions",
            set.id
        )));
    }

    let number_of_teams = request.number_of_teams.min(state.config().max_teams());
    let questions = sample_questions(
        set.questions.into_iter().map(Question::from).collect(),
        request.question_count,
    );

    // Join codes are short, so a collision is possible; retry with a fresh
    // draw instead of surfacing the duplicate to the caller.
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let join_code = generate_join_code(state.config().join_code_length());
        let session = GameSession::new(
            join_code,
            request.client_name.clone(),
            request.intervention_name.clone(),
            request.batch_id.clone(),
            number_of_teams,
            set.id,
            questions.clone(),
        );

        match store.insert_game(GameEntity::from(session.clone())).await? {
            InsertOutcome::Inserted => {
                info!(
                    game_id = %session.game_id,
                    client_name = %session.client_name,
                    question_count = session.questions.len(),
                    "created game"
                );
                return Ok(GameStateDto::from_session(
                    &session,
                    state.config().answer_window_secs(),
                ));
            }
            InsertOutcome::DuplicateId => continue,
        }
    }

    Err(ServiceError::InvalidState(
        "could not allocate an unused join code".into(),
    ))
}

/// Current snapshot of a single game.
pub async fn get_game(state: &SharedState, game_id: &str) -> Result<GameStateDto, ServiceError> {
    let store = state.require_game_store().await?;

    let Some(entity) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "game `{game_id}` not found"
        )));
    };

    let session = GameSession::from(entity);
    Ok(GameStateDto::from_session(
        &session,
        state.config().answer_window_secs(),
    ))
}

/// All games known to the store, newest first.
pub async fn list_games(state: &SharedState) -> Result<Vec<GameListItem>, ServiceError> {
    let store = state.require_game_store().await?;
    let mut entries = store.list_games().await?;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(entries.into_iter().map(Into::into).collect())
}

/// Question sets a new game can draw from.
pub async fn list_question_sets(
    state: &SharedState,
) -> Result<Vec<QuestionSetListItem>, ServiceError> {
    let store = state.require_game_store().await?;
    let entries = store.list_question_sets().await?;
    Ok(entries.into_iter().map(Into::into).collect())
}

/// Draw a fixed-size random sample, without replacement, preserving nothing
/// of the source order. `None` keeps the whole set (still shuffled).
fn sample_questions(mut questions: Vec<Question>, requested: Option<usize>) -> Vec<Question> {
    let mut rng = rng();
    questions.shuffle(&mut rng);

    let count = requested
        .unwrap_or(questions.len())
        .min(questions.len());
    questions.truncate(count);
    questions
}

fn generate_join_code(length: usize) -> String {
    let mut rng = rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..JOIN_CODE_CHARSET.len());
            JOIN_CODE_CHARSET[idx] as char
        })
        .collect()
}
