/// Backend-agnostic game store trait and its implementations.
pub mod game_store;
/// Entities persisted by the store and shared across layers.
pub mod models;
/// Storage error types common to every backend.
pub mod storage;
