use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a game session.
///
/// Serialized in kebab-case because the same strings travel over the wire
/// and sit in stored documents (`"lobby"`, `"in-progress"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    /// Teams are joining and readying up; questions are not visible yet.
    Lobby,
    /// The game is live: questions, buzzes, and scoring are active.
    InProgress,
    /// The facilitator suspended play; buzzes are ignored.
    Paused,
    /// Terminal state: scores are final and the session is read-only.
    Finished,
}

/// Events that can move a session between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Facilitator starts the game from the lobby.
    Start,
    /// Facilitator suspends a running game.
    Pause,
    /// Facilitator resumes a paused game.
    Resume,
    /// The session ends, by exhausting questions or by facilitator decision.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The status the session was in when the invalid event was received.
    pub from: GameStatus,
    /// The event that cannot be applied from this status.
    pub event: StatusEvent,
}

impl GameStatus {
    /// Compute the status reached by applying `event`, or reject the event.
    ///
    /// `Finish` is accepted from every non-terminal status so a facilitator
    /// can abandon a lobby or a paused game; nothing leaves `Finished`.
    pub fn transition(self, event: StatusEvent) -> Result<GameStatus, InvalidTransition> {
        use GameStatus::*;
        use StatusEvent::*;

        let next = match (self, event) {
            (Lobby, Start) => InProgress,
            (InProgress, Pause) => Paused,
            (Paused, Resume) => InProgress,
            (Lobby | InProgress | Paused, Finish) => Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Whether the session reached its terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_through_statuses() {
        let status = GameStatus::Lobby;

        let status = status.transition(StatusEvent::Start).unwrap();
        assert_eq!(status, GameStatus::InProgress);

        let status = status.transition(StatusEvent::Pause).unwrap();
        assert_eq!(status, GameStatus::Paused);

        let status = status.transition(StatusEvent::Resume).unwrap();
        assert_eq!(status, GameStatus::InProgress);

        let status = status.transition(StatusEvent::Finish).unwrap();
        assert_eq!(status, GameStatus::Finished);
        assert!(status.is_terminal());
    }

    #[test]
    fn start_is_only_valid_from_lobby() {
        for from in [
            GameStatus::InProgress,
            GameStatus::Paused,
            GameStatus::Finished,
        ] {
            let err = from.transition(StatusEvent::Start).unwrap_err();
            assert_eq!(err, InvalidTransition {
                from,
                event: StatusEvent::Start,
            });
        }
    }

    #[test]
    fn pause_requires_running_game() {
        assert!(GameStatus::Lobby.transition(StatusEvent::Pause).is_err());
        assert!(GameStatus::Paused.transition(StatusEvent::Pause).is_err());
        assert!(GameStatus::Finished.transition(StatusEvent::Pause).is_err());
    }

    #[test]
    fn resume_requires_paused_game() {
        assert!(GameStatus::Lobby.transition(StatusEvent::Resume).is_err());
        assert!(
            GameStatus::InProgress
                .transition(StatusEvent::Resume)
                .is_err()
        );
        assert!(GameStatus::Finished.transition(StatusEvent::Resume).is_err());
    }

    #[test]
    fn finish_accepted_from_any_live_status() {
        for from in [GameStatus::Lobby, GameStatus::InProgress, GameStatus::Paused] {
            assert_eq!(
                from.transition(StatusEvent::Finish).unwrap(),
                GameStatus::Finished
            );
        }
    }

    #[test]
    fn finished_is_a_dead_end() {
        for event in [
            StatusEvent::Start,
            StatusEvent::Pause,
            StatusEvent::Resume,
            StatusEvent::Finish,
        ] {
            assert!(GameStatus::Finished.transition(event).is_err());
        }
    }

    #[test]
    fn wire_representation_is_kebab_case() {
        let json = serde_json::to_string(&GameStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");

        let parsed: GameStatus = serde_json::from_str("\"lobby\"").unwrap();
        assert_eq!(parsed, GameStatus::Lobby);
    }
}
