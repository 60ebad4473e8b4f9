use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::game::{CreateGameRequest, GameListItem, GameStateDto},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes for game setup and inspection by the facilitator frontend.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game).get(list_games))
        .route("/games/{game_id}", get(get_game))
}

/// Create a game from a question set and hand back its join code.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameStateDto),
        (status = 400, description = "Invalid setup request"),
        (status = 404, description = "Question set does not exist"),
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateGameRequest>,
) -> Result<Json<GameStateDto>, AppError> {
    let created = game_service::create_game(&state, payload).await?;
    Ok(Json(created))
}

/// Fetch the current state snapshot of one game by join code.
#[utoipa::path(
    get,
    path = "/games/{game_id}",
    tag = "games",
    params(("game_id" = String, Path, description = "Join code of the game")),
    responses(
        (status = 200, description = "Current game state", body = GameStateDto),
        (status = 404, description = "Unknown join code"),
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameStateDto>, AppError> {
    let snapshot = game_service::get_game(&state, &game_id).await?;
    Ok(Json(snapshot))
}

/// List stored games, newest first.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    responses(
        (status = 200, description = "Stored games", body = [GameListItem])
    )
)]
pub async fn list_games(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GameListItem>>, AppError> {
    let games = game_service::list_games(&state).await?;
    Ok(Json(games))
}
