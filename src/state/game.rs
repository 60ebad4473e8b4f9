use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{GameEntity, QuestionEntity, TeamEntity};
use crate::state::machine::{GameStatus, InvalidTransition, StatusEvent};

/// Marker stored in `answering_team_name` once the current question was
/// answered correctly: the buzzer stays closed until the facilitator moves on.
pub const ANSWERED_SENTINEL: &str = "__answered__";

/// Points granted for a correct answer.
pub const POINTS_CORRECT: i32 = 10;
/// Points deducted for a wrong answer.
pub const POINTS_INCORRECT: i32 = -5;

/// Team info tracked during a game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Display name, unique within the session.
    pub name: String,
    /// Current score; can go negative.
    pub score: i32,
    /// Whether the team confirmed readiness in the lobby.
    pub is_ready: bool,
    /// WebSocket channel currently bound to this team, if any.
    pub channel_id: Option<Uuid>,
}

/// A single question of the sampled game sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Optional grouping label.
    pub category: Option<String>,
    /// Prompt shown to all participants.
    pub question_text: String,
    /// Answer options, one of which is correct.
    pub options: Vec<String>,
    /// The correct option; server-side only.
    pub correct_answer: String,
}

/// View of the buzzer lock derived from `answering_team_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerLock<'a> {
    /// Nobody holds the buzzer; attempts may grab it.
    Open,
    /// The named team holds the buzzer and must submit or time out.
    Held(&'a str),
    /// The question was answered correctly; closed until the next question.
    Answered,
}

/// Why a team could not be added to the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("A team with this name has already joined.")]
    DuplicateTeam,
    #[error("This game is already full.")]
    RoomFull,
}

/// Result of grading a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerVerdict {
    /// Whether the submitted answer matched the correct option.
    pub was_correct: bool,
    /// Whether the question reopened for the remaining teams.
    pub open_for_next_answer: bool,
}

/// Result of recording an answer-window timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutOutcome {
    /// Whether any team that has not yet attempted remains.
    pub open_for_next_answer: bool,
}

/// Aggregated state for a live or persisted game session.
///
/// All mutation goes through the operation methods below; they enforce the
/// status preconditions so callers only deal with "did it apply".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    /// Join code, primary key of the game.
    pub game_id: String,
    /// Client (organization) the session is run for.
    pub client_name: String,
    /// Optional intervention label supplied at setup.
    pub intervention_name: Option<String>,
    /// Optional batch identifier supplied at setup.
    pub batch_id: Option<String>,
    /// Soft cap on the number of teams, enforced during lobby join.
    pub number_of_teams: usize,
    /// Lifecycle status of the session.
    pub status: GameStatus,
    /// Participating teams in join order.
    pub teams: Vec<Team>,
    /// Question set the sample was drawn from.
    pub question_set_id: Uuid,
    /// Sampled question sequence, fixed at creation.
    pub questions: Vec<Question>,
    /// Index of the current question; `None` until the game starts.
    pub current_question_index: Option<usize>,
    /// Buzzer lock holder, or [`ANSWERED_SENTINEL`] once answered.
    pub answering_team_name: Option<String>,
    /// Teams that used their attempt on the current question.
    pub attempted_teams: Vec<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp.
    pub updated_at: SystemTime,
}

impl GameSession {
    /// Build a fresh session in the lobby with no teams joined yet.
    pub fn new(
        game_id: String,
        client_name: String,
        intervention_name: Option<String>,
        batch_id: Option<String>,
        number_of_teams: usize,
        question_set_id: Uuid,
        questions: Vec<Question>,
    ) -> Self {
        let timestamp = SystemTime::now();

        Self {
            game_id,
            client_name,
            intervention_name,
            batch_id,
            number_of_teams,
            status: GameStatus::Lobby,
            teams: Vec::new(),
            question_set_id,
            questions,
            current_question_index: None,
            answering_team_name: None,
            attempted_teams: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Look up a team by name.
    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.name == name)
    }

    fn team_mut(&mut self, name: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|team| team.name == name)
    }

    /// Current state of the buzzer lock.
    pub fn answer_lock(&self) -> AnswerLock<'_> {
        match self.answering_team_name.as_deref() {
            None => AnswerLock::Open,
            Some(ANSWERED_SENTINEL) => AnswerLock::Answered,
            Some(holder) => AnswerLock::Held(holder),
        }
    }

    /// Question currently in play, if the index points inside the sequence.
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question_index
            .and_then(|index| self.questions.get(index))
    }

    /// Whether the question sequence has been played past its end.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.current_question_index, Some(index) if index >= self.questions.len())
    }

    /// Append a team with score 0, not ready. Lobby capacity and name
    /// uniqueness are enforced here; the status precondition is the caller's.
    pub fn add_team(&mut self, name: &str, channel_id: Option<Uuid>) -> Result<(), JoinError> {
        if self.team(name).is_some() {
            return Err(JoinError::DuplicateTeam);
        }
        if self.teams.len() >= self.number_of_teams {
            return Err(JoinError::RoomFull);
        }

        self.teams.push(Team {
            name: name.to_owned(),
            score: 0,
            is_ready: false,
            channel_id,
        });
        self.touch();
        Ok(())
    }

    /// Remove a team by name, returning it when present.
    pub fn remove_team(&mut self, name: &str) -> Option<Team> {
        let index = self.teams.iter().position(|team| team.name == name)?;
        let team = self.teams.remove(index);
        self.touch();
        Some(team)
    }

    /// Point a team at its current channel, returning whether the team exists.
    pub fn bind_channel(&mut self, name: &str, channel_id: Uuid) -> bool {
        match self.team_mut(name) {
            Some(team) => {
                team.channel_id = Some(channel_id);
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Mark a team ready; no-op when the team is unknown.
    pub fn mark_ready(&mut self, name: &str) -> bool {
        match self.team_mut(name) {
            Some(team) => {
                team.is_ready = true;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Leave the lobby: the game goes live on the first question.
    pub fn begin(&mut self) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(StatusEvent::Start)?;
        self.current_question_index = Some(0);
        self.touch();
        Ok(())
    }

    /// Suspend a running game.
    pub fn pause(&mut self) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(StatusEvent::Pause)?;
        self.touch();
        Ok(())
    }

    /// Resume a paused game.
    pub fn resume(&mut self) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(StatusEvent::Resume)?;
        self.touch();
        Ok(())
    }

    /// Enter the terminal status. Scores and team order stay as they are.
    pub fn finish(&mut self) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(StatusEvent::Finish)?;
        self.touch();
        Ok(())
    }

    /// Grade `answer` for the team holding the buzzer lock.
    ///
    /// Returns `None` without touching anything when the game is not
    /// in progress, the lock is not held by `team_name`, or no question is in
    /// play; a submit losing the race against a timeout lands here.
    pub fn grade_answer(&mut self, team_name: &str, answer: &str) -> Option<AnswerVerdict> {
        if self.status != GameStatus::InProgress {
            return None;
        }
        if self.answer_lock() != AnswerLock::Held(team_name) {
            return None;
        }

        let correct_answer = self.current_question()?.correct_answer.clone();
        let was_correct = answer == correct_answer;
        let team = self.team_mut(team_name)?;

        if was_correct {
            team.score += POINTS_CORRECT;
            self.answering_team_name = Some(ANSWERED_SENTINEL.to_owned());
        } else {
            team.score += POINTS_INCORRECT;
            self.answering_team_name = None;
            self.record_attempt(team_name);
        }
        self.touch();

        Some(AnswerVerdict {
            was_correct,
            open_for_next_answer: !was_correct,
        })
    }

    /// Record that the lock holder ran out of time: the attempt is spent and
    /// the lock reopens. Returns `None` when the precondition
    /// (`answering_team_name == team_name`, game in progress) does not hold.
    pub fn record_timeout(&mut self, team_name: &str) -> Option<TimeoutOutcome> {
        if self.status != GameStatus::InProgress {
            return None;
        }
        if self.answer_lock() != AnswerLock::Held(team_name) {
            return None;
        }

        self.record_attempt(team_name);
        self.answering_team_name = None;
        self.touch();

        Some(TimeoutOutcome {
            open_for_next_answer: self.open_for_next_answer(),
        })
    }

    /// Advance to the next question, clearing the lock and the attempt set.
    ///
    /// Returns the new index (which may be one past the end, see
    /// [`GameSession::is_exhausted`]) or `None` when the game is not running.
    pub fn advance_question(&mut self) -> Option<usize> {
        if self.status != GameStatus::InProgress {
            return None;
        }

        let next_index = self.current_question_index? + 1;
        self.current_question_index = Some(next_index);
        self.answering_team_name = None;
        self.attempted_teams.clear();
        self.touch();
        Some(next_index)
    }

    /// Whether any team that has not spent its attempt remains.
    pub fn open_for_next_answer(&self) -> bool {
        self.teams
            .iter()
            .any(|team| !self.attempted_teams.iter().any(|name| *name == team.name))
    }

    /// Teams sorted by descending score, stable w.r.t. join order on ties.
    /// Presentation only; the stored order never changes.
    pub fn ranked_teams(&self) -> Vec<Team> {
        let mut ranked = self.teams.clone();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    fn record_attempt(&mut self, team_name: &str) {
        if !self.attempted_teams.iter().any(|name| name == team_name) {
            self.attempted_teams.push(team_name.to_owned());
        }
    }

    fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }
}

impl From<TeamEntity> for Team {
    fn from(value: TeamEntity) -> Self {
        Self {
            name: value.name,
            score: value.score,
            is_ready: value.is_ready,
            channel_id: value.channel_id,
        }
    }
}

impl From<Team> for TeamEntity {
    fn from(value: Team) -> Self {
        Self {
            name: value.name,
            score: value.score,
            is_ready: value.is_ready,
            channel_id: value.channel_id,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            category: value.category,
            question_text: value.question_text,
            options: value.options,
            correct_answer: value.correct_answer,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            category: value.category,
            question_text: value.question_text,
            options: value.options,
            correct_answer: value.correct_answer,
        }
    }
}

impl From<GameEntity> for GameSession {
    fn from(value: GameEntity) -> Self {
        Self {
            game_id: value.game_id,
            client_name: value.client_name,
            intervention_name: value.intervention_name,
            batch_id: value.batch_id,
            number_of_teams: value.number_of_teams,
            status: value.status,
            teams: value.teams.into_iter().map(Into::into).collect(),
            question_set_id: value.question_set_id,
            questions: value.questions.into_iter().map(Into::into).collect(),
            current_question_index: value.current_question_index,
            answering_team_name: value.answering_team_name,
            attempted_teams: value.attempted_teams,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<GameSession> for GameEntity {
    fn from(value: GameSession) -> Self {
        Self {
            game_id: value.game_id,
            client_name: value.client_name,
            intervention_name: value.intervention_name,
            batch_id: value.batch_id,
            number_of_teams: value.number_of_teams,
            status: value.status,
            teams: value.teams.into_iter().map(Into::into).collect(),
            question_set_id: value.question_set_id,
            questions: value.questions.into_iter().map(Into::into).collect(),
            current_question_index: value.current_question_index,
            answering_team_name: value.answering_team_name,
            attempted_teams: value.attempted_teams,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
