use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Buzzwire Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::get_game,
        crate::routes::game::list_games,
        crate::routes::question_set::list_question_sets,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::GameStateDto,
            crate::dto::game::TeamDto,
            crate::dto::game::QuestionDto,
            crate::dto::game::GameListItem,
            crate::dto::game::QuestionSetListItem,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game setup and inspection"),
        (name = "question-sets", description = "Question set catalog"),
        (name = "ws", description = "WebSocket entry point for live play"),
    )
)]
pub struct ApiDoc;
