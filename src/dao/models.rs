use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::machine::GameStatus;

/// Representation of a team stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Display name chosen by the team, unique within a game.
    pub name: String,
    /// Current score for the team.
    pub score: i32,
    /// Whether the team has confirmed readiness in the lobby.
    pub is_ready: bool,
    /// Identifier of the WebSocket channel currently bound to this team, if any.
    pub channel_id: Option<Uuid>,
}

/// Question entry embedded in a game document or a question set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Optional grouping label (e.g., "Communication").
    pub category: Option<String>,
    /// The question prompt shown to every participant.
    pub question_text: String,
    /// Answer options presented to the teams.
    pub options: Vec<String>,
    /// The option that counts as correct. Never sent to team clients.
    pub correct_answer: String,
}

/// Aggregate game entity persisted by the storage layer.
///
/// Teams and the sampled questions are embedded so a game is a single
/// document and field-level conditional updates stay atomic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Human-readable join code, primary key of the game.
    pub game_id: String,
    /// Client (organization) the session is run for.
    pub client_name: String,
    /// Optional intervention label supplied at setup.
    pub intervention_name: Option<String>,
    /// Optional batch identifier supplied at setup.
    pub batch_id: Option<String>,
    /// Maximum number of teams allowed to join.
    pub number_of_teams: usize,
    /// Lifecycle status of the session.
    pub status: GameStatus,
    /// Participating teams and their current scores.
    pub teams: Vec<TeamEntity>,
    /// Question set the sample was drawn from.
    pub question_set_id: Uuid,
    /// The randomly sampled subset of questions played in this session.
    pub questions: Vec<QuestionEntity>,
    /// Index of the question currently in play; `None` before the game starts.
    pub current_question_index: Option<usize>,
    /// Name of the team holding the buzzer lock, or the answered sentinel.
    pub answering_team_name: Option<String>,
    /// Teams that already attempted the current question.
    pub attempted_teams: Vec<String>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
}

/// Game list item entity (subset of [`GameEntity`]) returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameListItemEntity {
    /// Human-readable join code, primary key of the game.
    pub game_id: String,
    /// Client (organization) the session is run for.
    pub client_name: String,
    /// Lifecycle status of the session.
    pub status: GameStatus,
    /// Number of teams currently joined.
    pub team_count: usize,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
}

/// Reusable bank of questions from which game samples are drawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionSetEntity {
    /// Stable identifier for the question set.
    pub id: Uuid,
    /// Unique human readable name.
    pub name: String,
    /// Free-form description of the set.
    pub description: String,
    /// Questions available for sampling.
    pub questions: Vec<QuestionEntity>,
}

/// Summary of a question set (subset of [`QuestionSetEntity`]) returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionSetListItemEntity {
    /// Stable identifier for the question set.
    pub id: Uuid,
    /// Unique human readable name.
    pub name: String,
    /// Free-form description of the set.
    pub description: String,
    /// Number of questions available for sampling.
    pub question_count: usize,
}

impl From<GameEntity> for GameListItemEntity {
    fn from(entity: GameEntity) -> Self {
        Self {
            game_id: entity.game_id,
            client_name: entity.client_name,
            status: entity.status,
            team_count: entity.teams.len(),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

impl From<QuestionSetEntity> for QuestionSetListItemEntity {
    fn from(entity: QuestionSetEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            question_count: entity.questions.len(),
        }
    }
}
