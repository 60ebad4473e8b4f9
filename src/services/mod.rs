/// OpenAPI document assembled from the annotated handlers.
pub mod documentation;
/// Game setup and catalog queries behind the HTTP API.
pub mod game_service;
/// Storage reachability probe behind the health route.
pub mod health_service;
/// WebSocket-driven game session operations.
pub mod session_service;
/// Storage backend supervision and degraded mode handling.
pub mod storage_supervisor;
/// WebSocket connection lifecycle and event dispatch.
pub mod websocket_service;
