use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod game;
pub mod health;
pub mod question_set;
pub mod websocket;

/// Assemble the full route tree: REST surface, WebSocket endpoint and the
/// API explorer, all sharing one state.
pub fn router(state: SharedState) -> Router<()> {
    let api = health::router()
        .merge(game::router())
        .merge(question_set::router())
        .merge(websocket::router());

    api.merge(docs::router(state.clone())).with_state(state)
}
