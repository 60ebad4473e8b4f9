//! WebSocket connection lifecycle.
//!
//! A connection must identify itself with one of the join events before
//! anything else; the established identity is then fixed for the lifetime of
//! the socket and every further event is checked against it.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitStream};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    services::session_service::{self, EventError},
    state::{Identity, SharedState},
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Sent over `gameError` when an internal failure interrupts an event.
const GENERIC_ERROR: &str = "An unexpected error occurred while processing your request.";

/// Room and identity a connection joined under.
struct Membership {
    game_id: String,
    identity: Identity,
}

/// Handle the full lifecycle of one game WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let channel_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let Some(membership) =
        establish_membership(&state, &mut receiver, &outbound_tx, channel_id).await
    else {
        finalize(writer_task, outbound_tx).await;
        return;
    };

    info!(
        %channel_id,
        game_id = %membership.game_id,
        identity = ?membership.identity,
        "channel joined"
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(event) => {
                    if let Err(err) = dispatch(&state, &membership, event).await {
                        report_event_error(&outbound_tx, &membership.game_id, err);
                    }
                }
                Err(err) => {
                    warn!(%channel_id, error = %err, "failed to parse client message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(%channel_id, "client closed the connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%channel_id, error = %err, "websocket error");
                break;
            }
        }
    }

    session_service::channel_disconnected(&state, channel_id).await;
    info!(%channel_id, game_id = %membership.game_id, "channel left");

    finalize(writer_task, outbound_tx).await;
}

/// Handshake phase: read frames until a join event succeeds.
///
/// Refused joins are reported back and the client may retry within the
/// timeout; `None` means the connection should be torn down without ever
/// having joined a room.
async fn establish_membership(
    state: &SharedState,
    receiver: &mut SplitStream<WebSocket>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    channel_id: Uuid,
) -> Option<Membership> {
    loop {
        let text = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(Message::Ping(payload)))) => {
                let _ = outbound_tx.send(Message::Pong(payload));
                continue;
            }
            Ok(Some(Ok(Message::Close(_)))) => return None,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(err))) => {
                warn!(%channel_id, error = %err, "websocket receive error");
                return None;
            }
            Ok(None) => return None,
            Err(_) => {
                warn!(%channel_id, "join handshake timed out");
                let _ = outbound_tx.send(Message::Close(None));
                return None;
            }
        };

        let event = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(event) => event,
            Err(err) => {
                warn!(%channel_id, error = %err, "failed to parse client message");
                continue;
            }
        };

        let (game_id, outcome) = match event {
            ClientMessage::FacilitatorJoin { game_id } => {
                let outcome = session_service::facilitator_join(
                    state,
                    &game_id,
                    channel_id,
                    outbound_tx.clone(),
                )
                .await;
                (game_id, outcome)
            }
            ClientMessage::TeamJoin { game_id, team_name } => {
                let outcome = session_service::team_join(
                    state,
                    &game_id,
                    &team_name,
                    channel_id,
                    outbound_tx.clone(),
                )
                .await;
                (game_id, outcome)
            }
            ClientMessage::PlayerConnect { game_id, team_name } => {
                let outcome = session_service::reconnect_team(
                    state,
                    &game_id,
                    &team_name,
                    channel_id,
                    outbound_tx.clone(),
                )
                .await;
                (game_id, outcome)
            }
            other => {
                debug!(%channel_id, event = ?other, "event ignored before join");
                continue;
            }
        };

        match outcome {
            Ok(identity) => return Some(Membership { game_id, identity }),
            Err(err) => report_event_error(outbound_tx, &game_id, err),
        }
    }
}

/// Route one in-session event to its operation, enforcing that it targets
/// the room the channel joined.
async fn dispatch(
    state: &SharedState,
    membership: &Membership,
    event: ClientMessage,
) -> Result<(), EventError> {
    if let ClientMessage::Unknown = event {
        warn!(game_id = %membership.game_id, "unsupported message type");
        return Ok(());
    }
    match event.game_id() {
        Some(game_id) if game_id == membership.game_id => {}
        _ => {
            debug!(game_id = %membership.game_id, "event for another game dropped");
            return Ok(());
        }
    }

    let caller = &membership.identity;
    let game_id = membership.game_id.as_str();

    match event {
        ClientMessage::PlayerConnect { .. }
        | ClientMessage::FacilitatorJoin { .. }
        | ClientMessage::TeamJoin { .. } => {
            warn!(game_id, "ignoring duplicate join event");
            Ok(())
        }
        ClientMessage::TeamReady { team_name, .. } => {
            session_service::team_ready(state, caller, game_id, &team_name).await
        }
        ClientMessage::StartGame { .. } => {
            session_service::start_game(state, caller, game_id).await
        }
        ClientMessage::PauseGame { .. } => {
            session_service::pause_game(state, caller, game_id).await
        }
        ClientMessage::ResumeGame { .. } => {
            session_service::resume_game(state, caller, game_id).await
        }
        ClientMessage::AnswerAttempt { team_name, .. } => {
            session_service::attempt_answer(state, caller, game_id, &team_name).await
        }
        ClientMessage::SubmitAnswer {
            team_name, answer, ..
        } => session_service::submit_answer(state, caller, game_id, &team_name, &answer).await,
        ClientMessage::AnswerTimeout { team_name, .. } => {
            session_service::answer_timeout(state, caller, game_id, &team_name).await
        }
        ClientMessage::NextQuestion { .. } => {
            session_service::next_question(state, caller, game_id).await
        }
        ClientMessage::EndGame { .. } => session_service::end_game(state, caller, game_id).await,
        ClientMessage::KickTeam { team_name, .. } => {
            session_service::kick_team(state, caller, game_id, &team_name).await
        }
        ClientMessage::Unknown => Ok(()),
    }
}

/// Decide which failures reach the client. Stale and duplicate actions are
/// absorbed with a log line; join refusals and internal failures are unicast
/// to the channel that caused them.
fn report_event_error(
    outbound_tx: &mpsc::UnboundedSender<Message>,
    game_id: &str,
    err: EventError,
) {
    match err {
        EventError::UnknownGame(_) | EventError::Ignored(_) => {
            debug!(game_id, reason = %err, "event ignored");
        }
        EventError::JoinRefused(message) => {
            send_to_channel(outbound_tx, &ServerMessage::JoinError { message });
        }
        EventError::Degraded => {
            warn!(game_id, "event rejected while storage is degraded");
            send_to_channel(outbound_tx, &ServerMessage::GameError {
                message: GENERIC_ERROR.to_owned(),
            });
        }
        EventError::Storage(source) => {
            warn!(game_id, error = %source, "storage failure while handling event");
            send_to_channel(outbound_tx, &ServerMessage::GameError {
                message: GENERIC_ERROR.to_owned(),
            });
        }
    }
}

fn send_to_channel(tx: &mpsc::UnboundedSender<Message>, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => warn!(error = %err, "failed to serialize unicast message"),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
