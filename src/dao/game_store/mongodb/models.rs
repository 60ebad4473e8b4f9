use mongodb::bson::{Binary, DateTime, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{GameEntity, QuestionEntity, QuestionSetEntity, TeamEntity};
use crate::state::machine::GameStatus;

/// Uuid in the binary form serde writes it as, for use in query filters.
pub(super) fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

/// Game document as stored in the `games` collection. The join code doubles
/// as the `_id`, which is what gives inserts their uniqueness guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    game_id: String,
    client_name: String,
    intervention_name: Option<String>,
    batch_id: Option<String>,
    number_of_teams: usize,
    status: GameStatus,
    teams: Vec<TeamEntity>,
    question_set_id: Uuid,
    questions: Vec<QuestionEntity>,
    current_question_index: Option<usize>,
    answering_team_name: Option<String>,
    attempted_teams: Vec<String>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            game_id: value.game_id,
            client_name: value.client_name,
            intervention_name: value.intervention_name,
            batch_id: value.batch_id,
            number_of_teams: value.number_of_teams,
            status: value.status,
            teams: value.teams,
            question_set_id: value.question_set_id,
            questions: value.questions,
            current_question_index: value.current_question_index,
            answering_team_name: value.answering_team_name,
            attempted_teams: value.attempted_teams,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            game_id: value.game_id,
            client_name: value.client_name,
            intervention_name: value.intervention_name,
            batch_id: value.batch_id,
            number_of_teams: value.number_of_teams,
            status: value.status,
            teams: value.teams,
            question_set_id: value.question_set_id,
            questions: value.questions,
            current_question_index: value.current_question_index,
            answering_team_name: value.answering_team_name,
            attempted_teams: value.attempted_teams,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Question set document as stored in the `question_sets` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionSetDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    name: String,
    #[serde(default)]
    description: String,
    questions: Vec<QuestionEntity>,
}

impl From<QuestionSetEntity> for MongoQuestionSetDocument {
    fn from(value: QuestionSetEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            questions: value.questions,
        }
    }
}

impl From<MongoQuestionSetDocument> for QuestionSetEntity {
    fn from(value: MongoQuestionSetDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            questions: value.questions,
        }
    }
}
