//! In-memory registry of live game connections.
//!
//! Tracks every open `WebSocket` per player per room (a player may have several tabs open) and
//! delivers serialized events to them. Knows nothing about game rules.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A message destined for a specific `WebSocket` client.
pub type WsTx = mpsc::UnboundedSender<String>;

/// One open connection of a player.
#[derive(Debug, Clone)]
struct Connection {
    id: Uuid,
    tx: WsTx,
}

/// Tracks all active `WebSocket` connections across all rooms.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    /// `room_id` → `player_id` → open connections
    rooms: Arc<DashMap<Uuid, DashMap<Uuid, Vec<Connection>>>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// Register a connection and return its id, used later to unregister exactly this one.
    pub fn register(&self, room_id: Uuid, player_id: Uuid, tx: WsTx) -> Uuid {
        let id = Uuid::new_v4();
        self.rooms
            .entry(room_id)
            .or_default()
            .entry(player_id)
            .or_default()
            .push(Connection { id, tx });
        id
    }

    /// Unregister one connection. Returns how many connections the player still has open.
    pub fn unregister(&self, room_id: Uuid, player_id: Uuid, connection_id: Uuid) -> usize {
        let Some(players) = self.rooms.get(&room_id) else {
            return 0;
        };

        let remaining = players.get_mut(&player_id).map_or(0, |mut conns| {
            conns.retain(|c| c.id != connection_id);
            conns.len()
        });

        if remaining == 0 {
            players.remove(&player_id);
        }

        if players.is_empty() {
            drop(players);
            self.rooms.remove_if(&room_id, |_, players| players.is_empty());
        }

        remaining
    }

    /// Send a message to every connection of one player.
    pub fn send_to_player(&self, room_id: Uuid, player_id: Uuid, message: &str) {
        if let Some(players) = self.rooms.get(&room_id)
            && let Some(conns) = players.get(&player_id)
        {
            for conn in conns.iter() {
                let _ = conn.tx.send(message.to_string());
            }
        }
    }

    /// Broadcast a message to all connected clients in a room.
    pub fn broadcast(&self, room_id: Uuid, message: &str) {
        if let Some(players) = self.rooms.get(&room_id) {
            for entry in players.iter() {
                for conn in entry.value() {
                    let _ = conn.tx.send(message.to_string());
                }
            }
        }
    }

    /// Drop every connection of a room. The senders go away, so each connection's writer ends
    /// and its socket closes.
    pub fn close_room(&self, room_id: Uuid) {
        self.rooms.remove(&room_id);
    }

    /// Check if a player has at least one open connection.
    #[must_use]
    pub fn is_player_connected(&self, room_id: Uuid, player_id: Uuid) -> bool {
        self.rooms.get(&room_id).is_some_and(|players| {
            players
                .get(&player_id)
                .is_some_and(|conns| !conns.is_empty())
        })
    }

    /// Number of rooms with at least one open connection.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of players with an open connection in a room.
    #[must_use]
    pub fn connected_players(&self, room_id: Uuid) -> usize {
        self.rooms.get(&room_id).map_or(0, |players| players.len())
    }
}
