//! Backend for live buzzer quiz sessions: a small REST surface for game
//! setup, one WebSocket endpoint shared by facilitators, teams and
//! spectators, and a pluggable game store behind the service layer.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
