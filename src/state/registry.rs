use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Who a connected channel is, as established by its join handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The channel driving the session (start, advance, kick, end).
    Facilitator,
    /// A scoring team; `name` matches the team entry in the game document.
    Team {
        /// Team name bound to this channel.
        name: String,
    },
    /// Read-only membership, never mutates game state.
    Spectator,
}

impl Identity {
    /// Team name when the identity is a team.
    pub fn team_name(&self) -> Option<&str> {
        match self {
            Identity::Team { name } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Whether this channel may drive facilitator-only operations.
    pub fn is_facilitator(&self) -> bool {
        matches!(self, Identity::Facilitator)
    }
}

#[derive(Clone)]
/// Handle used to push messages to one connected participant.
pub struct ParticipantChannel {
    /// Unique id of the underlying WebSocket connection.
    pub id: Uuid,
    /// Role and name the channel joined under.
    pub identity: Identity,
    /// Writer-task queue for the connection.
    pub tx: mpsc::UnboundedSender<Message>,
}

impl ParticipantChannel {
    /// Serialize and queue a message for this channel alone.
    pub fn send(&self, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize unicast message");
                return;
            }
        };

        if self.tx.send(Message::Text(payload.into())).is_err() {
            debug!(channel_id = %self.id, "unicast dropped: writer closed");
        }
    }

    /// Queue a close frame, asking the writer task to hang up.
    pub fn close(&self) {
        let _ = self.tx.send(Message::Close(None));
    }
}

#[derive(Default)]
struct Room {
    members: HashMap<Uuid, ParticipantChannel>,
}

/// Process-wide table of room memberships keyed by game id.
///
/// The registry owns every channel ↔ game binding. Joining twice under the
/// same identity supersedes the previous channel so a reconnect never leaves
/// two live memberships for one team (or facilitator) in a room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    channels: DashMap<Uuid, String>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `channel` to the room for `game_id`, superseding any previous
    /// membership of the same channel (in any room) and, for teams and the
    /// facilitator, any previous channel holding the same identity.
    pub fn join(&self, game_id: &str, channel: ParticipantChannel) {
        if let Some((_, previous_room)) = self.channels.remove(&channel.id)
            && previous_room != game_id
        {
            if let Some(mut room) = self.rooms.get_mut(&previous_room) {
                room.members.remove(&channel.id);
            }
            self.drop_room_if_empty(&previous_room);
        }

        let mut room = self.rooms.entry(game_id.to_owned()).or_default();

        let superseded: Vec<Uuid> = room
            .members
            .values()
            .filter(|member| {
                member.id != channel.id
                    && same_exclusive_identity(&member.identity, &channel.identity)
            })
            .map(|member| member.id)
            .collect();

        for member_id in superseded {
            room.members.remove(&member_id);
            self.channels.remove(&member_id);
            debug!(%member_id, game_id, "membership superseded by reconnect");
        }

        self.channels.insert(channel.id, game_id.to_owned());
        room.members.insert(channel.id, channel);
    }

    /// Remove a channel's membership, returning the room it was in and the
    /// channel handle. `None` when the channel was not a member anywhere.
    pub fn leave(&self, channel_id: Uuid) -> Option<(String, ParticipantChannel)> {
        let (_, game_id) = self.channels.remove(&channel_id)?;

        let removed = {
            let mut room = self.rooms.get_mut(&game_id)?;
            room.members.remove(&channel_id)
        };

        self.drop_room_if_empty(&game_id);
        removed.map(|channel| (game_id, channel))
    }

    /// Queue `message` for every member of the room. Members with a closed
    /// writer are skipped; their own disconnect path cleans them up.
    pub fn broadcast(&self, game_id: &str, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize broadcast message");
                return;
            }
        };

        let Some(room) = self.rooms.get(game_id) else {
            return;
        };

        for member in room.members.values() {
            if member
                .tx
                .send(Message::Text(payload.clone().into()))
                .is_err()
            {
                debug!(channel_id = %member.id, game_id, "broadcast dropped: writer closed");
            }
        }
    }

    /// Find the live channel bound to a team, if any.
    pub fn team_channel(&self, game_id: &str, team_name: &str) -> Option<ParticipantChannel> {
        let room = self.rooms.get(game_id)?;
        room.members
            .values()
            .find(|member| member.identity.team_name() == Some(team_name))
            .cloned()
    }

    /// Number of channels currently in the room.
    pub fn room_size(&self, game_id: &str) -> usize {
        self.rooms
            .get(game_id)
            .map(|room| room.members.len())
            .unwrap_or(0)
    }

    fn drop_room_if_empty(&self, game_id: &str) {
        self.rooms
            .remove_if(game_id, |_, room| room.members.is_empty());
    }
}

/// Facilitator and team identities are exclusive within a room; spectators
/// may pile up freely.
fn same_exclusive_identity(a: &Identity, b: &Identity) -> bool {
    match (a, b) {
        (Identity::Facilitator, Identity::Facilitator) => true,
        (Identity::Team { name: left }, Identity::Team { name: right }) => left == right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(identity: Identity) -> (ParticipantChannel, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ParticipantChannel {
                id: Uuid::new_v4(),
                identity,
                tx,
            },
            rx,
        )
    }

    fn team(name: &str) -> Identity {
        Identity::Team {
            name: name.to_owned(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Message::Text(text) = frame {
                messages.push(serde_json::from_str(&text).unwrap());
            }
        }
        messages
    }

    #[test]
    fn broadcast_reaches_every_member() {
        let registry = RoomRegistry::new();
        let (facilitator, mut facilitator_rx) = channel(Identity::Facilitator);
        let (red, mut red_rx) = channel(team("Red"));

        registry.join("ABC123", facilitator);
        registry.join("ABC123", red);
        assert_eq!(registry.room_size("ABC123"), 2);

        registry.broadcast("ABC123", &ServerMessage::GameStarted {
            game_id: "ABC123".to_owned(),
        });

        assert_eq!(drain(&mut facilitator_rx).len(), 1);
        assert_eq!(drain(&mut red_rx).len(), 1);
    }

    #[test]
    fn rejoining_team_supersedes_previous_channel() {
        let registry = RoomRegistry::new();
        let (old, _old_rx) = channel(team("Red"));
        let old_id = old.id;
        let (new, mut new_rx) = channel(team("Red"));

        registry.join("ABC123", old);
        registry.join("ABC123", new);

        assert_eq!(registry.room_size("ABC123"), 1);
        // The old channel is a stranger now; its leave must find nothing.
        assert!(registry.leave(old_id).is_none());

        registry.broadcast("ABC123", &ServerMessage::GameStarted {
            game_id: "ABC123".to_owned(),
        });
        assert_eq!(drain(&mut new_rx).len(), 1);
    }

    #[test]
    fn spectators_do_not_supersede_each_other() {
        let registry = RoomRegistry::new();
        let (first, _rx1) = channel(Identity::Spectator);
        let (second, _rx2) = channel(Identity::Spectator);

        registry.join("ABC123", first);
        registry.join("ABC123", second);
        assert_eq!(registry.room_size("ABC123"), 2);
    }

    #[test]
    fn leave_forgets_the_room_once_empty() {
        let registry = RoomRegistry::new();
        let (member, _rx) = channel(team("Red"));
        let member_id = member.id;

        registry.join("ABC123", member);
        let (game_id, left) = registry.leave(member_id).unwrap();
        assert_eq!(game_id, "ABC123");
        assert_eq!(left.identity, team("Red"));
        assert_eq!(registry.room_size("ABC123"), 0);

        assert!(registry.leave(member_id).is_none());
    }

    #[test]
    fn joining_a_second_room_moves_the_channel() {
        let registry = RoomRegistry::new();
        let (member, _rx) = channel(team("Red"));
        let duplicate = member.clone();

        registry.join("ABC123", member);
        registry.join("XYZ789", duplicate);

        assert_eq!(registry.room_size("ABC123"), 0);
        assert_eq!(registry.room_size("XYZ789"), 1);
    }

    #[test]
    fn team_channel_resolves_the_bound_connection() {
        let registry = RoomRegistry::new();
        let (red, _red_rx) = channel(team("Red"));
        let red_id = red.id;
        let (blue, _blue_rx) = channel(team("Blue"));

        registry.join("ABC123", red);
        registry.join("ABC123", blue);

        let found = registry.team_channel("ABC123", "Red").unwrap();
        assert_eq!(found.id, red_id);
        assert!(registry.team_channel("ABC123", "Green").is_none());
    }
}
