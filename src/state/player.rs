//! Player records and the player registry.
//!
//! A player outlives any single transport connection. The stable ID is the
//! primary key; the current connection ID and display name are secondary
//! lookup paths.
//!
//! # Lookup paths
//!
//! ```text
//! stable_id ──────────────▶ Player
//! connection_id ──▶ stable_id
//! display name ───▶ stable_id   (join resolution only)
//! ```

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::board::Board;

/// Identifier for a player that survives reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport-level handle for one live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claimed completed lines, stored as a threshold over fixed-size flags.
///
/// If `flags[i]` is true then every `flags[j]` with `j < i` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Progress {
    flags: Vec<bool>,
}

impl Progress {
    pub fn new(slots: usize) -> Self {
        Self {
            flags: vec![false; slots],
        }
    }

    /// Set `flags[i] = i < completed`. Counts past the end saturate.
    pub fn set_completed(&mut self, completed: usize) {
        for (i, flag) in self.flags.iter_mut().enumerate() {
            *flag = i < completed;
        }
    }

    /// Count claimed lines.
    pub fn completed(&self) -> usize {
        self.flags.iter().take_while(|f| **f).count()
    }

    /// Check if at least one line is claimed.
    pub fn has_bingo(&self) -> bool {
        self.flags.first().copied().unwrap_or(false)
    }

    /// Number of flags.
    pub fn slots(&self) -> usize {
        self.flags.len()
    }

    /// Get the raw flags.
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }
}

/// One participant, across any number of connections.
#[derive(Debug, Clone)]
pub struct Player {
    /// Assigned at first join, never reassigned
    pub stable_id: StableId,

    /// Connection the player first joined on. Older clients address
    /// players by this value.
    pub legacy_id: ConnectionId,

    /// Latest connection; stale once disconnected
    pub connection_id: ConnectionId,

    /// Set at first join
    pub name: String,

    board: Board,

    pub progress: Progress,

    /// Once set, stays set
    cursed: bool,

    pub connected: bool,

    pub joined_at: chrono::DateTime<chrono::Utc>,

    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl Player {
    pub fn new(
        stable_id: StableId,
        connection_id: ConnectionId,
        name: String,
        board: Board,
        progress_slots: usize,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            stable_id,
            legacy_id: connection_id.clone(),
            connection_id,
            name,
            board,
            progress: Progress::new(progress_slots),
            cursed: false,
            connected: true,
            joined_at: now,
            last_seen: now,
        }
    }

    /// Get the player's board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Check if the player is cursed.
    pub fn is_cursed(&self) -> bool {
        self.cursed
    }

    /// Apply the curse. Returns true if the flag changed.
    pub fn curse(&mut self) -> bool {
        let changed = !self.cursed;
        self.cursed = true;
        changed
    }

    /// Public projection sent to other participants.
    pub fn record(&self) -> PlayerRecord {
        PlayerRecord {
            stable_id: self.stable_id.clone(),
            name: self.name.clone(),
            bingos: self.progress.flags().to_vec(),
            has_bingo: self.progress.has_bingo(),
            cursed: self.cursed,
            connected: self.connected,
        }
    }
}

/// What other participants see of a player. Boards stay private.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub stable_id: StableId,
    pub name: String,
    pub bingos: Vec<bool>,
    pub has_bingo: bool,
    pub cursed: bool,
    pub connected: bool,
}

/// Player registry - every player seen this session, never pruned.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    /// Players by stable ID
    players: HashMap<StableId, Player>,

    /// Join order, for stable list output
    order: Vec<StableId>,

    /// Current connection ID to stable ID
    connection_index: HashMap<ConnectionId, StableId>,

    /// Display name to stable ID (first registration wins)
    name_index: HashMap<String, StableId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new player. Replaces any record under the same stable ID.
    pub fn insert(&mut self, player: Player) {
        let id = player.stable_id.clone();

        if let Some(previous) = self.players.remove(&id) {
            self.connection_index.remove(&previous.connection_id);
        } else {
            self.order.push(id.clone());
        }

        self.claim_connection(&player.connection_id, &id);
        self.name_index
            .entry(player.name.clone())
            .or_insert_with(|| id.clone());
        self.players.insert(id, player);
    }

    /// Get a player by stable ID.
    pub fn get(&self, id: &StableId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a mutable player by stable ID.
    pub fn get_mut(&mut self, id: &StableId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Check if a stable ID is registered.
    pub fn contains(&self, id: &StableId) -> bool {
        self.players.contains_key(id)
    }

    /// Player whose current connection is `connection_id`.
    pub fn id_for_connection(&self, connection_id: &ConnectionId) -> Option<&StableId> {
        self.connection_index.get(connection_id)
    }

    /// Get a player by current connection ID.
    pub fn get_by_connection(&self, connection_id: &ConnectionId) -> Option<&Player> {
        self.id_for_connection(connection_id)
            .and_then(|id| self.players.get(id))
    }

    /// Stable ID registered under a display name.
    pub fn id_for_name(&self, name: &str) -> Option<&StableId> {
        self.name_index.get(name)
    }

    /// Player first joined under `legacy_id`.
    pub fn id_for_legacy(&self, legacy_id: &str) -> Option<&StableId> {
        self.order
            .iter()
            .find(|id| {
                self.players
                    .get(*id)
                    .is_some_and(|p| p.legacy_id.as_str() == legacy_id)
            })
    }

    /// Point a player at a new connection.
    pub fn rebind(&mut self, id: &StableId, connection_id: ConnectionId) -> Option<&mut Player> {
        let previous = self.players.get(id)?.connection_id.clone();
        if self.connection_index.get(&previous) == Some(id) {
            self.connection_index.remove(&previous);
        }
        self.claim_connection(&connection_id, id);

        let player = self.players.get_mut(id)?;
        player.connection_id = connection_id;
        player.connected = true;
        player.last_seen = chrono::Utc::now();
        Some(player)
    }

    /// Index `connection_id` under `id`. A different player still holding
    /// that connection is marked disconnected; its connection ID is stale.
    fn claim_connection(&mut self, connection_id: &ConnectionId, id: &StableId) {
        let displaced = self
            .connection_index
            .insert(connection_id.clone(), id.clone())
            .filter(|owner| owner != id);

        if let Some(owner) = displaced {
            if let Some(player) = self.players.get_mut(&owner) {
                debug!("player {} displaced from connection {}", owner, connection_id);
                player.connected = false;
                player.last_seen = chrono::Utc::now();
            }
        }
    }

    /// Mark the player on `connection_id` as disconnected. Nothing is removed.
    pub fn mark_disconnected(&mut self, connection_id: &ConnectionId) -> Option<&StableId> {
        let id = self.connection_index.get(connection_id)?;
        if let Some(player) = self.players.get_mut(id) {
            player.connected = false;
            player.last_seen = chrono::Utc::now();
        }
        Some(id)
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.order.iter().filter_map(|id| self.players.get(id))
    }

    /// Public records in join order.
    pub fn records(&self) -> Vec<PlayerRecord> {
        self.players().map(Player::record).collect()
    }

    /// Count players.
    pub fn count(&self) -> usize {
        self.players.len()
    }

    /// Count connected players.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }
}
