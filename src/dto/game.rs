use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameListItemEntity, QuestionSetListItemEntity},
    dto::format_system_time,
    state::{
        game::{GameSession, Question, Team},
        machine::GameStatus,
    },
};

/// Payload used to bootstrap a brand-new game instance.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Client the session is run for.
    #[validate(length(min = 1, max = 80))]
    pub client_name: String,
    /// Optional label of the intervention this quiz belongs to.
    #[validate(length(max = 120))]
    #[serde(default)]
    pub intervention_name: Option<String>,
    /// Optional batch identifier used for reporting.
    #[validate(length(max = 40))]
    #[serde(default)]
    pub batch_id: Option<String>,
    /// How many teams may join the lobby.
    #[validate(range(min = 1))]
    pub number_of_teams: usize,
    /// Question set the session draws its questions from.
    pub question_set_id: Uuid,
    /// How many questions to sample from the set; defaults to the whole set.
    #[serde(default)]
    pub question_count: Option<usize>,
}

/// Public projection of a team; never exposes the raw channel binding.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamDto {
    pub name: String,
    pub score: i32,
    pub is_ready: bool,
    /// Whether a live channel is currently bound to this team.
    pub connected: bool,
}

/// Public projection of a question. The correct answer is deliberately
/// absent: grading happens server-side only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    #[serde(default)]
    pub category: Option<String>,
    pub question_text: String,
    pub options: Vec<String>,
}

/// Full authoritative session snapshot broadcast after every mutation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStateDto {
    pub game_id: String,
    pub client_name: String,
    #[serde(default)]
    pub intervention_name: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    pub number_of_teams: usize,
    pub status: GameStatus,
    pub teams: Vec<TeamDto>,
    /// Index into the question list, `-1` while no question is active.
    pub current_question_index: i64,
    #[serde(default)]
    pub current_question: Option<QuestionDto>,
    pub question_count: usize,
    #[serde(default)]
    pub answering_team_name: Option<String>,
    pub attempted_teams: Vec<String>,
    /// Seconds a buzzing team has before the client raises a timeout.
    pub answer_window_secs: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl GameStateDto {
    /// Snapshot with teams in their stored (join) order.
    pub fn from_session(session: &GameSession, answer_window_secs: u64) -> Self {
        let teams = session.teams.iter().map(TeamDto::from).collect();
        Self::build(session, teams, answer_window_secs)
    }

    /// Snapshot with teams ranked by descending score, used for the final
    /// `gameOver` payload. The stored team order is left untouched.
    pub fn ranked(session: &GameSession, answer_window_secs: u64) -> Self {
        let ranked = session.ranked_teams();
        let teams = ranked.iter().map(TeamDto::from).collect();
        Self::build(session, teams, answer_window_secs)
    }

    fn build(session: &GameSession, teams: Vec<TeamDto>, answer_window_secs: u64) -> Self {
        Self {
            game_id: session.game_id.clone(),
            client_name: session.client_name.clone(),
            intervention_name: session.intervention_name.clone(),
            batch_id: session.batch_id.clone(),
            number_of_teams: session.number_of_teams,
            status: session.status,
            teams,
            current_question_index: session
                .current_question_index
                .map(|index| index as i64)
                .unwrap_or(-1),
            current_question: session.current_question().map(QuestionDto::from),
            question_count: session.questions.len(),
            answering_team_name: session.answering_team_name.clone(),
            attempted_teams: session.attempted_teams.clone(),
            answer_window_secs,
            created_at: format_system_time(session.created_at),
            updated_at: format_system_time(session.updated_at),
        }
    }
}

impl From<&Team> for TeamDto {
    fn from(team: &Team) -> Self {
        Self {
            name: team.name.clone(),
            score: team.score,
            is_ready: team.is_ready,
            connected: team.channel_id.is_some(),
        }
    }
}

impl From<&Question> for QuestionDto {
    fn from(question: &Question) -> Self {
        Self {
            category: question.category.clone(),
            question_text: question.question_text.clone(),
            options: question.options.clone(),
        }
    }
}

/// Compact game row returned by the listing endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameListItem {
    pub game_id: String,
    pub client_name: String,
    pub status: GameStatus,
    pub team_count: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<GameListItemEntity> for GameListItem {
    fn from(entity: GameListItemEntity) -> Self {
        Self {
            game_id: entity.game_id,
            client_name: entity.client_name,
            status: entity.status,
            team_count: entity.team_count,
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}

/// Question set row offered when creating a game.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSetListItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub question_count: usize,
}

impl From<QuestionSetListItemEntity> for QuestionSetListItem {
    fn from(entity: QuestionSetListItemEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            question_count: entity.question_count,
        }
    }
}
