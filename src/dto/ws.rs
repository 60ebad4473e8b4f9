use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::game::{GameStateDto, QuestionDto};

/// Messages accepted from game WebSocket clients.
///
/// Every variant carries the join code of the room it targets; events whose
/// `gameId` does not match the channel's established room are dropped.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Explicit reconnect of a team that already exists in the game.
    #[serde(rename_all = "camelCase")]
    PlayerConnect { game_id: String, team_name: String },
    /// Facilitator attaches to the room it drives.
    #[serde(rename_all = "camelCase")]
    FacilitatorJoin { game_id: String },
    /// Team joins the lobby, reconnects, or falls back to spectating.
    #[serde(rename_all = "camelCase")]
    TeamJoin { game_id: String, team_name: String },
    /// Team flags itself ready in the lobby.
    #[serde(rename_all = "camelCase")]
    TeamReady { game_id: String, team_name: String },
    /// Facilitator starts the quiz.
    #[serde(rename_all = "camelCase")]
    StartGame { game_id: String },
    /// Facilitator pauses a running quiz.
    #[serde(rename_all = "camelCase")]
    PauseGame { game_id: String },
    /// Facilitator resumes a paused quiz.
    #[serde(rename_all = "camelCase")]
    ResumeGame { game_id: String },
    /// Team presses the buzzer.
    #[serde(rename_all = "camelCase")]
    AnswerAttempt { game_id: String, team_name: String },
    /// Buzzing team submits its chosen option.
    #[serde(rename_all = "camelCase")]
    SubmitAnswer {
        game_id: String,
        team_name: String,
        answer: String,
    },
    /// Client-side answer timer expired for the buzzing team.
    #[serde(rename_all = "camelCase")]
    AnswerTimeout { game_id: String, team_name: String },
    /// Facilitator advances to the next question.
    #[serde(rename_all = "camelCase")]
    NextQuestion { game_id: String },
    /// Facilitator ends the quiz early.
    #[serde(rename_all = "camelCase")]
    EndGame { game_id: String },
    /// Facilitator removes a team from the lobby.
    #[serde(rename_all = "camelCase")]
    KickTeam { game_id: String, team_name: String },
    /// Any message type this server version does not know.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Join code the message targets, if the variant carries one.
    pub fn game_id(&self) -> Option<&str> {
        match self {
            Self::PlayerConnect { game_id, .. }
            | Self::FacilitatorJoin { game_id }
            | Self::TeamJoin { game_id, .. }
            | Self::TeamReady { game_id, .. }
            | Self::StartGame { game_id }
            | Self::PauseGame { game_id }
            | Self::ResumeGame { game_id }
            | Self::AnswerAttempt { game_id, .. }
            | Self::SubmitAnswer { game_id, .. }
            | Self::AnswerTimeout { game_id, .. }
            | Self::NextQuestion { game_id }
            | Self::EndGame { game_id }
            | Self::KickTeam { game_id, .. } => Some(game_id.as_str()),
            Self::Unknown => None,
        }
    }
}

/// Messages pushed to game WebSocket clients.
///
/// `UpdateGameState` is the authoritative one: it follows every persisted
/// mutation and lets a client resynchronize from any prior state. Everything
/// else is supplementary context a client may miss without losing correctness.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full session snapshot, broadcast after every persisted mutation.
    #[serde(rename_all = "camelCase")]
    UpdateGameState { game: GameStateDto },
    /// The quiz left the lobby.
    #[serde(rename_all = "camelCase")]
    GameStarted { game_id: String },
    /// A new question is in play.
    #[serde(rename_all = "camelCase")]
    NewQuestion {
        question: QuestionDto,
        question_index: usize,
    },
    /// Outcome of a graded submission.
    #[serde(rename_all = "camelCase")]
    AnswerResult {
        team_name: String,
        was_correct: bool,
        open_for_next_answer: bool,
    },
    /// A buzzing team ran out of time.
    #[serde(rename_all = "camelCase")]
    AnswerTimeout {
        team_name: String,
        open_for_next_answer: bool,
    },
    /// Final snapshot with teams ranked by descending score.
    #[serde(rename_all = "camelCase")]
    GameOver { game: GameStateDto },
    /// Unicast acknowledgement that the facilitator attached to the room.
    #[serde(rename_all = "camelCase")]
    FacilitatorJoined { game_id: String },
    /// Unicast notice that the channel watches the game read-only.
    #[serde(rename_all = "camelCase")]
    SpectatorView { message: String },
    /// Unicast join rejection with a user-facing reason.
    #[serde(rename_all = "camelCase")]
    JoinError { message: String },
    /// Unicast generic failure notice for the originating channel only.
    #[serde(rename_all = "camelCase")]
    GameError { message: String },
    /// Unicast notice sent to a team right before its channel is closed.
    #[serde(rename_all = "camelCase")]
    Kicked { reason: String },
}
