use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::game::QuestionSetListItem, error::AppError, services::game_service, state::SharedState,
};

/// Routes exposing the question set catalog.
pub fn router() -> Router<SharedState> {
    Router::new().route("/question-sets", get(list_question_sets))
}

/// List the question sets a game can be created from.
#[utoipa::path(
    get,
    path = "/question-sets",
    tag = "question-sets",
    responses(
        (status = 200, description = "Available question sets", body = [QuestionSetListItem])
    )
)]
pub async fn list_question_sets(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuestionSetListItem>>, AppError> {
    let sets = game_service::list_question_sets(&state).await?;
    Ok(Json(sets))
}
