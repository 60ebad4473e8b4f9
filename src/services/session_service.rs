//! Game session operations driven by WebSocket events.
//!
//! Every operation that persists a mutation concludes with a full
//! `updateGameState` broadcast so clients resynchronize from the latest
//! snapshot instead of applying deltas. Supplementary events (`gameStarted`,
//! `answerResult`, ...) only add context; a client that misses one stays
//! correct once the next snapshot arrives.

use std::sync::Arc;

use axum::extract::ws::Message;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::{CasOutcome, GameStore},
        models::GameEntity,
        storage::StorageError,
    },
    dto::{game::GameStateDto, validation::validate_team_name, ws::ServerMessage},
    error::ServiceError,
    state::{
        Identity, ParticipantChannel, SharedState,
        game::{ANSWERED_SENTINEL, GameSession},
        machine::GameStatus,
    },
};

/// Reason string sent to a team right before its channel is closed.
const KICKED_REASON: &str = "You have been removed from the game by the facilitator.";
/// Spectator greeting, unicast on read-only joins.
const SPECTATOR_MESSAGE: &str = "You are viewing as a spectator.";

/// How an event handler failed. The WebSocket boundary decides which of
/// these reach the originating client and which are only logged.
#[derive(Debug, Error)]
pub enum EventError {
    /// The join code does not resolve to a stored game.
    #[error("unknown game `{0}`")]
    UnknownGame(String),
    /// A precondition did not hold; stale and duplicate client actions land
    /// here and are absorbed without telling anyone.
    #[error("{0}")]
    Ignored(String),
    /// A join was rejected with a user-facing reason.
    #[error("{0}")]
    JoinRefused(String),
    /// No storage backend is installed.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The storage backend failed mid-operation.
    #[error("storage unavailable")]
    Storage(#[from] StorageError),
}

impl From<ServiceError> for EventError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Degraded => EventError::Degraded,
            ServiceError::Unavailable(source) => EventError::Storage(source),
            other => EventError::Ignored(other.to_string()),
        }
    }
}

/// Attach the facilitator channel to its room and replay the current state.
pub async fn facilitator_join(
    state: &SharedState,
    game_id: &str,
    channel_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<Identity, EventError> {
    let store = state.require_game_store().await?;
    let session = load_session(&store, game_id).await?;

    let channel = ParticipantChannel {
        id: channel_id,
        identity: Identity::Facilitator,
        tx,
    };
    let unicast = channel.clone();
    state.registry().join(game_id, channel);

    unicast.send(&ServerMessage::UpdateGameState {
        game: snapshot(state, &session),
    });
    unicast.send(&ServerMessage::FacilitatorJoined {
        game_id: game_id.to_owned(),
    });

    info!(game_id, "facilitator joined room");
    Ok(Identity::Facilitator)
}

/// Team join: adds a new team in the lobby, reconnects a known team while
/// the game runs, and falls back to a read-only spectator seat otherwise.
pub async fn team_join(
    state: &SharedState,
    game_id: &str,
    team_name: &str,
    channel_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<Identity, EventError> {
    if let Err(err) = validate_team_name(team_name) {
        let message = err
            .message
            .map(|m| m.into_owned())
            .unwrap_or_else(|| "Invalid team name.".to_owned());
        return Err(EventError::JoinRefused(message));
    }

    let store = state.require_game_store().await?;
    let Some(entity) = store.find_game(game_id).await? else {
        return Err(EventError::JoinRefused("Game does not exist.".to_owned()));
    };
    let mut session = GameSession::from(entity);

    match session.status {
        GameStatus::Lobby => {
            session
                .add_team(team_name, Some(channel_id))
                .map_err(|err| EventError::JoinRefused(err.to_string()))?;
            store.save_game(GameEntity::from(session.clone())).await?;

            join_room(state, game_id, channel_id, team_identity(team_name), tx);
            broadcast_state(state, &session);
            info!(game_id, team_name, "team joined lobby");
            Ok(team_identity(team_name))
        }
        GameStatus::InProgress | GameStatus::Paused if session.team(team_name).is_some() => {
            rebind_and_broadcast(state, &store, session, team_name, channel_id, tx).await
        }
        _ => {
            // Late or unknown joiners watch read-only; a claimed team name
            // grants no rights once the lobby is gone.
            let channel = ParticipantChannel {
                id: channel_id,
                identity: Identity::Spectator,
                tx,
            };
            let unicast = channel.clone();
            state.registry().join(game_id, channel);

            unicast.send(&ServerMessage::SpectatorView {
                message: SPECTATOR_MESSAGE.to_owned(),
            });
            unicast.send(&ServerMessage::UpdateGameState {
                game: snapshot(state, &session),
            });
            info!(game_id, "spectator joined room");
            Ok(Identity::Spectator)
        }
    }
}

/// Explicit reconnect of a team that already exists in a running game.
pub async fn reconnect_team(
    state: &SharedState,
    game_id: &str,
    team_name: &str,
    channel_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<Identity, EventError> {
    let store = state.require_game_store().await?;
    let session = load_session(&store, game_id).await?;

    if session.status == GameStatus::Finished {
        return Err(EventError::Ignored(format!(
            "game `{game_id}` is finished; reconnect ignored"
        )));
    }
    if session.team(team_name).is_none() {
        return Err(EventError::Ignored(format!(
            "team `{team_name}` is not part of game `{game_id}`"
        )));
    }

    rebind_and_broadcast(state, &store, session, team_name, channel_id, tx).await
}

/// Flag a team as ready in the lobby list.
pub async fn team_ready(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
    team_name: &str,
) -> Result<(), EventError> {
    require_team_self(caller, team_name)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    if !session.mark_ready(team_name) {
        return Err(EventError::Ignored(format!(
            "team `{team_name}` is not part of game `{game_id}`"
        )));
    }

    store.save_game(GameEntity::from(session.clone())).await?;
    broadcast_state(state, &session);
    Ok(())
}

/// Leave the lobby and put the first question in play.
pub async fn start_game(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
) -> Result<(), EventError> {
    require_facilitator(caller)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    session
        .begin()
        .map_err(|err| EventError::Ignored(err.to_string()))?;
    store.save_game(GameEntity::from(session.clone())).await?;

    state.registry().broadcast(
        game_id,
        &ServerMessage::GameStarted {
            game_id: game_id.to_owned(),
        },
    );
    broadcast_state(state, &session);
    info!(game_id, "game started");
    Ok(())
}

/// Suspend a running game; answer and advance events are ignored while paused.
pub async fn pause_game(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
) -> Result<(), EventError> {
    require_facilitator(caller)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    session
        .pause()
        .map_err(|err| EventError::Ignored(err.to_string()))?;
    store.save_game(GameEntity::from(session.clone())).await?;
    broadcast_state(state, &session);
    info!(game_id, "game paused");
    Ok(())
}

/// Resume a paused game.
pub async fn resume_game(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
) -> Result<(), EventError> {
    require_facilitator(caller)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    session
        .resume()
        .map_err(|err| EventError::Ignored(err.to_string()))?;
    store.save_game(GameEntity::from(session.clone())).await?;
    broadcast_state(state, &session);
    info!(game_id, "game resumed");
    Ok(())
}

/// Buzzer press: claim the answer lock for `team_name`.
///
/// The claim is arbitrated by a storage-level compare-and-set on the open
/// lock, so of any number of concurrent presses exactly one wins; the rest
/// are absorbed silently.
pub async fn attempt_answer(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
    team_name: &str,
) -> Result<(), EventError> {
    require_team_self(caller, team_name)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    if session.team(team_name).is_none() {
        warn!(game_id, team_name, "answer attempt by unknown team");
        return Err(EventError::Ignored(format!(
            "team `{team_name}` is not part of game `{game_id}`"
        )));
    }
    if session.status != GameStatus::InProgress {
        return Err(EventError::Ignored(format!(
            "game `{game_id}` is not in progress"
        )));
    }
    if session.answering_team_name.is_some() {
        return Err(EventError::Ignored("buzzer lock already held".to_owned()));
    }

    match store
        .compare_and_set_answering(game_id, None, Some(team_name))
        .await?
    {
        CasOutcome::Applied => {
            session.answering_team_name = Some(team_name.to_owned());
            broadcast_state(state, &session);
            debug!(game_id, team_name, "buzzer lock claimed");
            Ok(())
        }
        CasOutcome::Stale => Err(EventError::Ignored(
            "buzzer lock lost to a concurrent press".to_owned(),
        )),
    }
}

/// Grade the lock holder's submission and settle the score.
pub async fn submit_answer(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
    team_name: &str,
    answer: &str,
) -> Result<(), EventError> {
    require_team_self(caller, team_name)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    if session.status != GameStatus::InProgress
        || session.answering_team_name.as_deref() != Some(team_name)
        || session.current_question().is_none()
    {
        return Err(EventError::Ignored(format!(
            "submission from `{team_name}` does not hold the lock"
        )));
    }

    let was_correct = session
        .current_question()
        .map(|question| question.correct_answer == answer)
        .unwrap_or(false);
    let next_holder = if was_correct {
        Some(ANSWERED_SENTINEL)
    } else {
        None
    };

    // The lock transition is the arbitration point against a concurrent
    // timeout; score and attempt bookkeeping ride the full save after it.
    match store
        .compare_and_set_answering(game_id, Some(team_name), next_holder)
        .await?
    {
        CasOutcome::Stale => Err(EventError::Ignored(
            "submission lost the race for the lock".to_owned(),
        )),
        CasOutcome::Applied => {
            let Some(verdict) = session.grade_answer(team_name, answer) else {
                return Err(EventError::Ignored(
                    "submission no longer grades against this question".to_owned(),
                ));
            };
            store.save_game(GameEntity::from(session.clone())).await?;

            state.registry().broadcast(
                game_id,
                &ServerMessage::AnswerResult {
                    team_name: team_name.to_owned(),
                    was_correct: verdict.was_correct,
                    open_for_next_answer: verdict.open_for_next_answer,
                },
            );
            broadcast_state(state, &session);
            info!(
                game_id,
                team_name,
                was_correct = verdict.was_correct,
                "answer graded"
            );
            Ok(())
        }
    }
}

/// The lock holder ran out of time: spend the attempt and reopen the lock.
///
/// Accepted from the facilitator or the team itself. Arrivals after the lock
/// was independently cleared lose the compare-and-set and become no-ops.
pub async fn answer_timeout(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
    team_name: &str,
) -> Result<(), EventError> {
    if !caller.is_facilitator() && caller.team_name() != Some(team_name) {
        return Err(EventError::Ignored(
            "timeout reported by an unauthorized channel".to_owned(),
        ));
    }

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    if session.status != GameStatus::InProgress
        || session.answering_team_name.as_deref() != Some(team_name)
    {
        return Err(EventError::Ignored(format!(
            "timeout for `{team_name}` does not match the lock holder"
        )));
    }

    match store
        .compare_and_set_answering(game_id, Some(team_name), None)
        .await?
    {
        CasOutcome::Stale => Err(EventError::Ignored(
            "timeout lost the race for the lock".to_owned(),
        )),
        CasOutcome::Applied => {
            let Some(outcome) = session.record_timeout(team_name) else {
                return Err(EventError::Ignored(
                    "timeout no longer applies to this question".to_owned(),
                ));
            };
            store.save_game(GameEntity::from(session.clone())).await?;

            state.registry().broadcast(
                game_id,
                &ServerMessage::AnswerTimeout {
                    team_name: team_name.to_owned(),
                    open_for_next_answer: outcome.open_for_next_answer,
                },
            );
            broadcast_state(state, &session);
            info!(game_id, team_name, "answer window expired");
            Ok(())
        }
    }
}

/// Advance to the next question, finishing the game past the last one.
pub async fn next_question(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
) -> Result<(), EventError> {
    require_facilitator(caller)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    let Some(index) = session.advance_question() else {
        return Err(EventError::Ignored(format!(
            "game `{game_id}` is not in progress"
        )));
    };

    if session.is_exhausted() {
        return end_and_broadcast(state, &store, session).await;
    }

    store.save_game(GameEntity::from(session.clone())).await?;

    let Some(question) = session.current_question() else {
        return Err(EventError::Ignored("question index out of range".to_owned()));
    };
    state.registry().broadcast(
        game_id,
        &ServerMessage::NewQuestion {
            question: question.into(),
            question_index: index,
        },
    );
    broadcast_state(state, &session);
    info!(game_id, question_index = index, "question advanced");
    Ok(())
}

/// Finish the game early and publish the final ranking.
pub async fn end_game(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
) -> Result<(), EventError> {
    require_facilitator(caller)?;

    let store = state.require_game_store().await?;
    let session = load_session(&store, game_id).await?;
    end_and_broadcast(state, &store, session).await
}

/// Remove a team from the lobby, telling its channel why before hanging up.
pub async fn kick_team(
    state: &SharedState,
    caller: &Identity,
    game_id: &str,
    team_name: &str,
) -> Result<(), EventError> {
    require_facilitator(caller)?;

    let store = state.require_game_store().await?;
    let mut session = load_session(&store, game_id).await?;

    if session.status != GameStatus::Lobby {
        return Err(EventError::Ignored(
            "teams can only be kicked from the lobby".to_owned(),
        ));
    }
    if session.remove_team(team_name).is_none() {
        return Err(EventError::Ignored(format!(
            "team `{team_name}` is not part of game `{game_id}`"
        )));
    }

    store.save_game(GameEntity::from(session.clone())).await?;
    broadcast_state(state, &session);

    if let Some(channel) = state.registry().team_channel(game_id, team_name) {
        channel.send(&ServerMessage::Kicked {
            reason: KICKED_REASON.to_owned(),
        });
        channel.close();
        state.registry().leave(channel.id);
    }
    info!(game_id, team_name, "team kicked from lobby");
    Ok(())
}

/// Transport-level disconnect: drop the membership and, for teams, clear the
/// persisted channel binding unless a reconnect already replaced it.
pub async fn channel_disconnected(state: &SharedState, channel_id: Uuid) {
    let Some((game_id, channel)) = state.registry().leave(channel_id) else {
        return;
    };
    let Identity::Team { name } = channel.identity else {
        debug!(%channel_id, game_id, "non-team channel disconnected");
        return;
    };

    let Some(store) = state.game_store().await else {
        debug!(game_id, team_name = %name, "disconnect cleanup skipped while degraded");
        return;
    };

    match store
        .clear_team_channel_if(&game_id, &name, channel_id)
        .await
    {
        Ok(CasOutcome::Applied) => match store.find_game(&game_id).await {
            Ok(Some(entity)) => {
                let session = GameSession::from(entity);
                broadcast_state(state, &session);
                info!(game_id, team_name = %name, "team disconnected");
            }
            Ok(None) => {}
            Err(err) => warn!(game_id, error = %err, "failed to reload game after disconnect"),
        },
        // A fast reconnect already bound a new channel; nothing to clear.
        Ok(CasOutcome::Stale) => {
            debug!(game_id, team_name = %name, "stale disconnect ignored");
        }
        Err(err) => warn!(game_id, error = %err, "failed to clear channel binding"),
    }
}

async fn rebind_and_broadcast(
    state: &SharedState,
    store: &Arc<dyn GameStore>,
    mut session: GameSession,
    team_name: &str,
    channel_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<Identity, EventError> {
    let game_id = session.game_id.clone();

    // Targeted update: a full save here could clobber a buzzer transition
    // that landed while this snapshot was in flight.
    if !store.bind_team_channel(&game_id, team_name, channel_id).await? {
        return Err(EventError::Ignored(format!(
            "team `{team_name}` is not part of game `{game_id}`"
        )));
    }
    session.bind_channel(team_name, channel_id);

    join_room(state, &game_id, channel_id, team_identity(team_name), tx);
    broadcast_state(state, &session);
    info!(game_id, team_name, "team reconnected");
    Ok(team_identity(team_name))
}

async fn end_and_broadcast(
    state: &SharedState,
    store: &Arc<dyn GameStore>,
    mut session: GameSession,
) -> Result<(), EventError> {
    if session.status.is_terminal() {
        return Err(EventError::Ignored(format!(
            "game `{}` is already finished",
            session.game_id
        )));
    }

    session
        .finish()
        .map_err(|err| EventError::Ignored(err.to_string()))?;
    store.save_game(GameEntity::from(session.clone())).await?;

    broadcast_state(state, &session);
    state.registry().broadcast(
        &session.game_id,
        &ServerMessage::GameOver {
            game: GameStateDto::ranked(&session, state.config().answer_window_secs()),
        },
    );
    info!(game_id = %session.game_id, "game finished");
    Ok(())
}

async fn load_session(
    store: &Arc<dyn GameStore>,
    game_id: &str,
) -> Result<GameSession, EventError> {
    let Some(entity) = store.find_game(game_id).await? else {
        return Err(EventError::UnknownGame(game_id.to_owned()));
    };
    Ok(GameSession::from(entity))
}

fn broadcast_state(state: &SharedState, session: &GameSession) {
    state.registry().broadcast(
        &session.game_id,
        &ServerMessage::UpdateGameState {
            game: snapshot(state, session),
        },
    );
}

fn snapshot(state: &SharedState, session: &GameSession) -> GameStateDto {
    GameStateDto::from_session(session, state.config().answer_window_secs())
}

fn join_room(
    state: &SharedState,
    game_id: &str,
    channel_id: Uuid,
    identity: Identity,
    tx: mpsc::UnboundedSender<Message>,
) {
    state.registry().join(
        game_id,
        ParticipantChannel {
            id: channel_id,
            identity,
            tx,
        },
    );
}

fn team_identity(team_name: &str) -> Identity {
    Identity::Team {
        name: team_name.to_owned(),
    }
}

fn require_facilitator(caller: &Identity) -> Result<(), EventError> {
    if caller.is_facilitator() {
        Ok(())
    } else {
        Err(EventError::Ignored(
            "operation reserved to the facilitator".to_owned(),
        ))
    }
}

fn require_team_self(caller: &Identity, team_name: &str) -> Result<(), EventError> {
    if caller.team_name() == Some(team_name) {
        Ok(())
    } else {
        Err(EventError::Ignored(format!(
            "channel may not act for team `{team_name}`"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::MemoryGameStore,
        state::AppState,
        state::game::Question,
    };

    const GAME_ID: &str = "ABC123";

    fn question(text: &str, correct: &str) -> Question {
        Question {
            category: None,
            question_text: text.to_owned(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: correct.to_owned(),
        }
    }

    fn facilitator() -> Identity {
        Identity::Facilitator
    }

    fn team(name: &str) -> Identity {
        Identity::Team {
            name: name.to_owned(),
        }
    }

    async fn seeded_state(questions: Vec<Question>, number_of_teams: usize) -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        let session = GameSession::new(
            GAME_ID.to_owned(),
            "Acme".to_owned(),
            None,
            None,
            number_of_teams,
            Uuid::new_v4(),
            questions,
        );
        store
            .insert_game(GameEntity::from(session))
            .await
            .unwrap();
        state.install_game_store(Arc::new(store)).await;
        state
    }

    struct TestChannel {
        id: Uuid,
        tx: mpsc::UnboundedSender<Message>,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    fn channel() -> TestChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        TestChannel {
            id: Uuid::new_v4(),
            tx,
            rx,
        }
    }

    fn drain(channel: &mut TestChannel) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = channel.rx.try_recv() {
            if let Message::Text(text) = frame {
                messages.push(serde_json::from_str(&text).unwrap());
            }
        }
        messages
    }

    fn last_snapshot(messages: &[ServerMessage]) -> &GameStateDto {
        messages
            .iter()
            .rev()
            .find_map(|message| match message {
                ServerMessage::UpdateGameState { game } => Some(game),
                _ => None,
            })
            .expect("no state snapshot received")
    }

    async fn join_team(state: &SharedState, name: &str) -> TestChannel {
        let mut ch = channel();
        let identity = team_join(state, GAME_ID, name, ch.id, ch.tx.clone())
            .await
            .unwrap();
        assert_eq!(identity, team(name));
        drain(&mut ch);
        ch
    }

    #[tokio::test]
    async fn facilitator_join_replays_state_and_acknowledges() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut ch = channel();

        let identity = facilitator_join(&state, GAME_ID, ch.id, ch.tx.clone())
            .await
            .unwrap();
        assert!(identity.is_facilitator());

        let messages = drain(&mut ch);
        assert!(matches!(
            messages[0],
            ServerMessage::UpdateGameState { .. }
        ));
        assert!(
            matches!(&messages[1], ServerMessage::FacilitatorJoined { game_id } if game_id == GAME_ID)
        );
    }

    #[tokio::test]
    async fn facilitator_join_on_unknown_game_is_silent() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut ch = channel();

        let err = facilitator_join(&state, "NOPE42", ch.id, ch.tx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::UnknownGame(_)));
        assert!(drain(&mut ch).is_empty());
    }

    #[tokio::test]
    async fn team_join_fills_the_lobby_and_broadcasts() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut fac = channel();
        facilitator_join(&state, GAME_ID, fac.id, fac.tx.clone())
            .await
            .unwrap();
        drain(&mut fac);

        let mut red = channel();
        team_join(&state, GAME_ID, "Red", red.id, red.tx.clone())
            .await
            .unwrap();

        let fac_messages = drain(&mut fac);
        let snapshot = last_snapshot(&fac_messages);
        assert_eq!(snapshot.teams.len(), 1);
        assert_eq!(snapshot.teams[0].name, "Red");
        assert!(snapshot.teams[0].connected);

        // The joining channel itself receives the room broadcast too.
        let red_messages = drain(&mut red);
        assert_eq!(last_snapshot(&red_messages).teams.len(), 1);
    }

    #[tokio::test]
    async fn team_join_surfaces_duplicate_full_and_unknown_game() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        join_team(&state, "Red").await;

        let mut dup = channel();
        let err = team_join(&state, GAME_ID, "Red", dup.id, dup.tx.clone())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, EventError::JoinRefused(message) if message == "A team with this name has already joined.")
        );

        join_team(&state, "Blue").await;
        let mut third = channel();
        let err = team_join(&state, GAME_ID, "Green", third.id, third.tx.clone())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, EventError::JoinRefused(message) if message == "This game is already full.")
        );

        let mut lost = channel();
        let err = team_join(&state, "NOPE42", "Red", lost.id, lost.tx.clone())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, EventError::JoinRefused(message) if message == "Game does not exist.")
        );
    }

    #[tokio::test]
    async fn late_joiners_become_spectators() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        join_team(&state, "Red").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        let mut ghost = channel();
        let identity = team_join(&state, GAME_ID, "Latecomer", ghost.id, ghost.tx.clone())
            .await
            .unwrap();
        assert_eq!(identity, Identity::Spectator);

        let messages = drain(&mut ghost);
        assert!(
            matches!(&messages[0], ServerMessage::SpectatorView { message, .. } if message == SPECTATOR_MESSAGE)
        );
        assert!(matches!(messages[1], ServerMessage::UpdateGameState { .. }));

        // The roster is unchanged; spectators never join the team list.
        let snapshot = last_snapshot(&messages[1..]);
        assert_eq!(snapshot.teams.len(), 1);
    }

    #[tokio::test]
    async fn known_team_rejoining_mid_game_reconnects() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let red = join_team(&state, "Red").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();
        drop(red);

        let mut back = channel();
        let identity = team_join(&state, GAME_ID, "Red", back.id, back.tx.clone())
            .await
            .unwrap();
        assert_eq!(identity, team("Red"));

        let messages = drain(&mut back);
        let snapshot = last_snapshot(&messages);
        assert!(snapshot.teams[0].connected);
    }

    #[tokio::test]
    async fn start_game_is_facilitator_only_and_broadcasts_both_events() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;

        let err = start_game(&state, &team("Red"), GAME_ID).await.unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        start_game(&state, &facilitator(), GAME_ID).await.unwrap();
        let messages = drain(&mut red);
        assert!(
            messages
                .iter()
                .any(|m| matches!(m, ServerMessage::GameStarted { .. }))
        );
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.current_question_index, 0);
        assert_eq!(snapshot.status, GameStatus::InProgress);

        // A second start is a stale duplicate and changes nothing.
        let err = start_game(&state, &facilitator(), GAME_ID).await.unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
    }

    #[tokio::test]
    async fn buzzer_lock_is_mutually_exclusive() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        join_team(&state, "Blue").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();
        drain(&mut red);

        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        let err = attempt_answer(&state, &team("Blue"), GAME_ID, "Blue")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        let messages = drain(&mut red);
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.answering_team_name.as_deref(), Some("Red"));
    }

    #[tokio::test]
    async fn correct_answer_scores_and_closes_the_question() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        join_team(&state, "Blue").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        drain(&mut red);
        submit_answer(&state, &team("Red"), GAME_ID, "Red", "a")
            .await
            .unwrap();

        let messages = drain(&mut red);
        assert!(matches!(
            &messages[0],
            ServerMessage::AnswerResult {
                team_name,
                was_correct: true,
                open_for_next_answer: false,
            } if team_name == "Red"
        ));
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.teams[0].score, 10);
        assert_eq!(
            snapshot.answering_team_name.as_deref(),
            Some(ANSWERED_SENTINEL)
        );

        // The question is closed; further buzzes bounce off the sentinel.
        let err = attempt_answer(&state, &team("Blue"), GAME_ID, "Blue")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
    }

    #[tokio::test]
    async fn wrong_answer_penalizes_and_reopens() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        join_team(&state, "Blue").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        drain(&mut red);
        submit_answer(&state, &team("Red"), GAME_ID, "Red", "b")
            .await
            .unwrap();

        let messages = drain(&mut red);
        assert!(matches!(
            &messages[0],
            ServerMessage::AnswerResult {
                was_correct: false,
                open_for_next_answer: true,
                ..
            }
        ));
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.teams[0].score, -5);
        assert!(snapshot.answering_team_name.is_none());
        assert_eq!(snapshot.attempted_teams, vec!["Red".to_owned()]);

        // The lock is open again for the other team.
        attempt_answer(&state, &team("Blue"), GAME_ID, "Blue")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn submission_without_the_lock_is_ignored() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        join_team(&state, "Red").await;
        join_team(&state, "Blue").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        let err = submit_answer(&state, &team("Blue"), GAME_ID, "Blue", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        // No score moved for either team.
        let store = state.game_store().await.unwrap();
        let entity = store.find_game(GAME_ID).await.unwrap().unwrap();
        assert!(entity.teams.iter().all(|t| t.score == 0));
    }

    #[tokio::test]
    async fn timeout_spends_the_attempt_and_reports_eligibility() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        join_team(&state, "Blue").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        drain(&mut red);
        answer_timeout(&state, &facilitator(), GAME_ID, "Red")
            .await
            .unwrap();

        let messages = drain(&mut red);
        assert!(matches!(
            &messages[0],
            ServerMessage::AnswerTimeout {
                team_name,
                open_for_next_answer: true,
            } if team_name == "Red"
        ));

        // Blue also times out; nobody is left for this question.
        attempt_answer(&state, &team("Blue"), GAME_ID, "Blue")
            .await
            .unwrap();
        answer_timeout(&state, &team("Blue"), GAME_ID, "Blue")
            .await
            .unwrap();
        let messages = drain(&mut red);
        assert!(messages.iter().any(|m| matches!(
            m,
            ServerMessage::AnswerTimeout {
                open_for_next_answer: false,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn stale_timeout_after_submission_is_a_no_op() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        submit_answer(&state, &team("Red"), GAME_ID, "Red", "a")
            .await
            .unwrap();
        drain(&mut red);

        let err = answer_timeout(&state, &facilitator(), GAME_ID, "Red")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
        assert!(drain(&mut red).is_empty());

        // The submitted score survives untouched.
        let store = state.game_store().await.unwrap();
        let entity = store.find_game(GAME_ID).await.unwrap().unwrap();
        assert_eq!(entity.teams[0].score, 10);
    }

    #[tokio::test]
    async fn next_question_past_the_end_finishes_the_game() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();
        drain(&mut red);

        next_question(&state, &facilitator(), GAME_ID)
            .await
            .unwrap();

        let messages = drain(&mut red);
        let snapshot = last_snapshot(&messages);
        assert_eq!(snapshot.status, GameStatus::Finished);
        assert!(
            messages
                .iter()
                .any(|m| matches!(m, ServerMessage::GameOver { .. }))
        );

        // Ending again is absorbed without a second gameOver.
        let err = end_game(&state, &facilitator(), GAME_ID).await.unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
        assert!(drain(&mut red).is_empty());
    }

    #[tokio::test]
    async fn two_team_match_produces_the_expected_ranking() {
        let state = seeded_state(
            vec![
                question("q1", "a"),
                question("q2", "b"),
                question("q3", "c"),
            ],
            2,
        )
        .await;
        let mut a = join_team(&state, "A").await;
        join_team(&state, "B").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        // Q1: A buzzes and answers correctly; B's press bounces off the lock.
        attempt_answer(&state, &team("A"), GAME_ID, "A").await.unwrap();
        submit_answer(&state, &team("A"), GAME_ID, "A", "a")
            .await
            .unwrap();
        let err = attempt_answer(&state, &team("B"), GAME_ID, "B")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        next_question(&state, &facilitator(), GAME_ID)
            .await
            .unwrap();

        // Q2: B answers wrong, the question reopens, then A takes it.
        attempt_answer(&state, &team("B"), GAME_ID, "B").await.unwrap();
        submit_answer(&state, &team("B"), GAME_ID, "B", "x")
            .await
            .unwrap();
        attempt_answer(&state, &team("A"), GAME_ID, "A").await.unwrap();
        submit_answer(&state, &team("A"), GAME_ID, "A", "b")
            .await
            .unwrap();

        next_question(&state, &facilitator(), GAME_ID)
            .await
            .unwrap();
        drain(&mut a);
        end_game(&state, &facilitator(), GAME_ID).await.unwrap();

        let messages = drain(&mut a);
        let game_over = messages
            .iter()
            .find_map(|m| match m {
                ServerMessage::GameOver { game } => Some(game),
                _ => None,
            })
            .expect("no gameOver received");

        let names: Vec<&str> = game_over.teams.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(game_over.teams[0].score, 20);
        assert_eq!(game_over.teams[1].score, -5);

        // The stored roster keeps its join order.
        let snapshot = last_snapshot(&messages);
        let stored: Vec<&str> = snapshot.teams.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(stored, ["A", "B"]);
    }

    #[tokio::test]
    async fn kick_notifies_the_team_then_closes_its_channel() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        let mut fac = channel();
        facilitator_join(&state, GAME_ID, fac.id, fac.tx.clone())
            .await
            .unwrap();
        drain(&mut fac);

        kick_team(&state, &facilitator(), GAME_ID, "Red")
            .await
            .unwrap();

        // The kicked channel sees the roster update, the notice, then a close.
        let mut saw_kicked = false;
        let mut saw_close = false;
        while let Ok(frame) = red.rx.try_recv() {
            match frame {
                Message::Text(text) => {
                    if let Ok(ServerMessage::Kicked { reason }) = serde_json::from_str(&text) {
                        assert_eq!(reason, KICKED_REASON);
                        saw_kicked = true;
                    }
                }
                Message::Close(_) => saw_close = true,
                _ => {}
            }
        }
        assert!(saw_kicked && saw_close);

        let fac_messages = drain(&mut fac);
        assert!(last_snapshot(&fac_messages).teams.is_empty());
        assert!(state.registry().team_channel(GAME_ID, "Red").is_none());

        // Kicking outside the lobby is refused silently.
        join_team(&state, "Blue").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();
        let err = kick_team(&state, &facilitator(), GAME_ID, "Blue")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
    }

    #[tokio::test]
    async fn disconnect_clears_the_binding_only_when_still_current() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let old = join_team(&state, "Red").await;
        let old_id = old.id;

        // The team reconnects before the old channel's disconnect lands.
        let mut new = channel();
        reconnect_team(&state, GAME_ID, "Red", new.id, new.tx.clone())
            .await
            .unwrap();
        drain(&mut new);

        channel_disconnected(&state, old_id).await;

        let store = state.game_store().await.unwrap();
        let entity = store.find_game(GAME_ID).await.unwrap().unwrap();
        assert_eq!(entity.teams[0].channel_id, Some(new.id));
        // No broadcast either since nothing changed.
        assert!(drain(&mut new).is_empty());

        // A current disconnect does clear the binding.
        channel_disconnected(&state, new.id).await;
        let entity = store.find_game(GAME_ID).await.unwrap().unwrap();
        assert_eq!(entity.teams[0].channel_id, None);
    }

    #[tokio::test]
    async fn pause_blocks_play_until_resume() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;
        start_game(&state, &facilitator(), GAME_ID).await.unwrap();

        pause_game(&state, &facilitator(), GAME_ID).await.unwrap();
        let messages = drain(&mut red);
        assert_eq!(last_snapshot(&messages).status, GameStatus::Paused);

        let err = attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
        let err = next_question(&state, &facilitator(), GAME_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        resume_game(&state, &facilitator(), GAME_ID).await.unwrap();
        attempt_answer(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn role_guards_drop_impersonated_events() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        join_team(&state, "Red").await;
        join_team(&state, "Blue").await;

        // A team cannot act for another team or drive the game.
        let err = team_ready(&state, &team("Blue"), GAME_ID, "Red")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
        let err = kick_team(&state, &team("Blue"), GAME_ID, "Red")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        // A spectator can drive nothing at all.
        let err = start_game(&state, &Identity::Spectator, GAME_ID)
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));

        let store = state.game_store().await.unwrap();
        let entity = store.find_game(GAME_ID).await.unwrap().unwrap();
        assert_eq!(entity.teams.len(), 2);
        assert!(entity.teams.iter().all(|t| !t.is_ready));
    }

    #[tokio::test]
    async fn team_ready_updates_the_roster() {
        let state = seeded_state(vec![question("q1", "a")], 2).await;
        let mut red = join_team(&state, "Red").await;

        team_ready(&state, &team("Red"), GAME_ID, "Red")
            .await
            .unwrap();
        let messages = drain(&mut red);
        assert!(last_snapshot(&messages).teams[0].is_ready);

        // Ready for a team that does not exist is silently absorbed.
        let err = team_ready(&state, &team("Ghost"), GAME_ID, "Ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Ignored(_)));
    }
}
