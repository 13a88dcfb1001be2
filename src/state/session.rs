//! Session coordinator.
//!
//! [`Session`] owns the player registry and the combo pool. Every operation
//! mutates state and returns the messages it produced; nothing is sent from
//! here. [`SharedSession`] puts a `Session` behind a lock and delivers those
//! messages after the mutation is committed.
//!
//! # Join resolution
//!
//! ```text
//! join(name?, stable_id?)
//!   │
//!   ├─ stable_id known ────────────▶ reconnect (board/progress untouched)
//!   ├─ name known ─────────────────▶ reconnect to that player
//!   ├─ no name ────────────────────▶ dropped
//!   └─ otherwise ──────────────────▶ new player (claimed ID reused if given)
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use rand::rngs::StdRng;

use super::board::Board;
use super::combo::{ComboPool, DrawOutcome, PoolSnapshot};
use super::connection::{ConnectionManager, DeliveryReport, MessageSender};
use super::event::{ClientEvent, Outbound, ServerMessage};
use super::player::{ConnectionId, Player, PlayerRecord, PlayerRegistry, StableId};
use crate::config::SessionConfig;
use crate::error::EventError;

/// Reply text for a draw after every combo has been called.
pub const ALL_CALLED_MESSAGE: &str = "All combos have been called!";

/// How a join was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Registered(StableId),
    Reconnected(StableId),
    /// No name and no known identity
    Dropped,
}

/// Coordinator state. Not synchronized; see [`SharedSession`].
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    pool: ComboPool,
    players: PlayerRegistry,
    rng: StdRng,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let rng = config.rng();
        Self {
            config,
            pool: ComboPool::new(),
            players: PlayerRegistry::new(),
            rng,
        }
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Apply one inbound event from `connection_id`.
    pub fn handle(&mut self, connection_id: &ConnectionId, event: ClientEvent) -> Vec<Outbound> {
        debug!("{} from {}", event.kind(), connection_id);
        match event {
            ClientEvent::Join { name, stable_id } => self.join(connection_id, name, stable_id).1,
            ClientEvent::DrawCombo => self.draw_combo(connection_id).1,
            ClientEvent::UpdateProgress { completed_lines } => {
                self.update_progress(connection_id, completed_lines)
            }
            ClientEvent::TriggerCurse { target_id } => self.trigger_curse(&target_id),
        }
    }

    /// Resolve a join to a reconnect, a new player, or nothing.
    pub fn join(
        &mut self,
        connection_id: &ConnectionId,
        name: Option<String>,
        claimed: Option<StableId>,
    ) -> (JoinOutcome, Vec<Outbound>) {
        let known = claimed
            .as_ref()
            .filter(|id| self.players.contains(id))
            .or_else(|| name.as_deref().and_then(|n| self.players.id_for_name(n)))
            .cloned();

        // Name matches merge devices that share a display name.
        if let Some(id) = known {
            return self.reconnect(connection_id, id);
        }

        let Some(name) = name else {
            debug!("join from {} without name or known id dropped", connection_id);
            return (JoinOutcome::Dropped, Vec::new());
        };

        let id = claimed.unwrap_or_else(StableId::generate);
        let board = Board::generate(&mut self.rng);
        let player = Player::new(
            id.clone(),
            connection_id.clone(),
            name,
            board,
            self.config.progress_slots,
        );

        let welcome = welcome(&player);
        let joined = ServerMessage::PlayerJoined {
            player: player.record(),
        };
        info!("player {} ({}) registered on {}", player.name, id, connection_id);
        self.players.insert(player);

        let messages = vec![
            Outbound::to(connection_id, welcome),
            Outbound::all_except(connection_id, joined),
            Outbound::all(self.player_list()),
        ];
        (JoinOutcome::Registered(id), messages)
    }

    fn reconnect(&mut self, connection_id: &ConnectionId, id: StableId) -> (JoinOutcome, Vec<Outbound>) {
        let Some(player) = self.players.rebind(&id, connection_id.clone()) else {
            return (JoinOutcome::Dropped, Vec::new());
        };
        info!("player {} ({}) reconnected on {}", player.name, id, connection_id);

        let messages = vec![
            Outbound::to(connection_id, welcome(player)),
            Outbound::all(self.player_list()),
        ];
        (JoinOutcome::Reconnected(id), messages)
    }

    /// Draw a combo. Exhaustion is reported to the requester only.
    pub fn draw_combo(&mut self, requester: &ConnectionId) -> (DrawOutcome, Vec<Outbound>) {
        let outcome = self.pool.draw(&mut self.rng);
        let messages = match outcome {
            DrawOutcome::Drawn(combo) => {
                info!("drew {} ({} remaining)", combo, self.pool.remaining());
                vec![Outbound::all(ServerMessage::NewCombo { combo })]
            }
            DrawOutcome::Exhausted => {
                debug!("draw requested by {} after exhaustion", requester);
                vec![Outbound::to(
                    requester,
                    ServerMessage::AllCombosCalled {
                        message: ALL_CALLED_MESSAGE.to_string(),
                    },
                )]
            }
        };
        (outcome, messages)
    }

    /// Record a claimed completed-line count for the player on `connection_id`.
    /// The claim is trusted.
    pub fn update_progress(&mut self, connection_id: &ConnectionId, completed: usize) -> Vec<Outbound> {
        let Some(id) = self.players.id_for_connection(connection_id).cloned() else {
            debug!("progress from unknown connection {} dropped", connection_id);
            return Vec::new();
        };
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };

        player.progress.set_completed(completed);
        player.last_seen = chrono::Utc::now();
        debug!("player {} progress {}", id, player.progress.completed());

        vec![Outbound::all(ServerMessage::PlayerUpdate {
            player: player.record(),
        })]
    }

    /// Curse a player. Already-cursed players are broadcast again.
    pub fn trigger_curse(&mut self, target: &str) -> Vec<Outbound> {
        let Some(id) = self.resolve_target(target) else {
            debug!("curse target {} not found", target);
            return Vec::new();
        };
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };

        if player.curse() {
            info!("player {} ({}) cursed", player.name, id);
        }

        vec![Outbound::all(ServerMessage::CurseTriggered {
            stable_id: id,
            name: player.name.clone(),
        })]
    }

    /// Match a target against stable IDs, then legacy IDs, then current
    /// connection IDs.
    pub fn resolve_target(&self, target: &str) -> Option<StableId> {
        let as_stable = StableId::new(target);
        if self.players.contains(&as_stable) {
            return Some(as_stable);
        }
        if let Some(id) = self.players.id_for_legacy(target) {
            return Some(id.clone());
        }
        self.players
            .id_for_connection(&ConnectionId::new(target))
            .cloned()
    }

    /// Mark the player on `connection_id` disconnected. Nothing is removed
    /// and nothing is broadcast.
    pub fn disconnect(&mut self, connection_id: &ConnectionId) -> Option<StableId> {
        let id = self.players.mark_disconnected(connection_id).cloned();
        if let Some(id) = &id {
            debug!("player {} disconnected from {}", id, connection_id);
        }
        id
    }

    /// Get a player by stable ID.
    pub fn player(&self, id: &StableId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Public records of every player, in join order.
    pub fn players(&self) -> Vec<PlayerRecord> {
        self.players.records()
    }

    /// Get the combo pool.
    pub fn pool(&self) -> &ComboPool {
        &self.pool
    }

    /// Draw history and current combo.
    pub fn pool_snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot()
    }

    fn player_list(&self) -> ServerMessage {
        ServerMessage::PlayerList {
            players: self.players.records(),
        }
    }
}

fn welcome(player: &Player) -> ServerMessage {
    ServerMessage::Welcome {
        board: player.board().clone(),
        stable_id: player.stable_id.clone(),
        progress: player.progress.flags().to_vec(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe session: one lock serializes every mutation.
///
/// The connection lock is taken before the session lock is released, so
/// deliveries go out in commit order, while the session itself is free for
/// the next event during delivery.
#[derive(Debug)]
pub struct SharedSession {
    session: Mutex<Session>,
    connections: Mutex<ConnectionManager>,
}

impl SharedSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            session: Mutex::new(Session::new(config)),
            connections: Mutex::new(ConnectionManager::new()),
        }
    }

    /// Register a transport channel.
    pub fn connect(&self, connection_id: ConnectionId, sender: MessageSender) {
        lock(&self.connections).add(connection_id, sender);
    }

    /// Apply one event and deliver its messages.
    pub fn handle(&self, connection_id: &ConnectionId, event: ClientEvent) -> DeliveryReport {
        self.commit(|session| session.handle(connection_id, event))
    }

    /// Decode and apply a raw frame.
    pub fn handle_frame(
        &self,
        connection_id: &ConnectionId,
        frame: &str,
    ) -> Result<DeliveryReport, EventError> {
        let event = ClientEvent::from_json(frame)?;
        Ok(self.handle(connection_id, event))
    }

    /// Resolve a join and deliver its messages.
    pub fn join(
        &self,
        connection_id: &ConnectionId,
        name: Option<String>,
        claimed: Option<StableId>,
    ) -> JoinOutcome {
        let mut outcome = JoinOutcome::Dropped;
        self.commit(|session| {
            let (result, messages) = session.join(connection_id, name, claimed);
            outcome = result;
            messages
        });
        outcome
    }

    /// Draw a combo and broadcast it.
    pub fn draw_combo(&self, requester: &ConnectionId) -> DrawOutcome {
        let mut outcome = DrawOutcome::Exhausted;
        self.commit(|session| {
            let (result, messages) = session.draw_combo(requester);
            outcome = result;
            messages
        });
        outcome
    }

    /// Mark the player disconnected and drop the channel.
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        lock(&self.session).disconnect(connection_id);
        lock(&self.connections).remove(connection_id);
    }

    /// Count registered transport channels.
    pub fn connection_count(&self) -> usize {
        lock(&self.connections).total_count()
    }

    /// Public records of every player, in join order.
    pub fn players(&self) -> Vec<PlayerRecord> {
        lock(&self.session).players()
    }

    /// Draw history and current combo.
    pub fn pool_snapshot(&self) -> PoolSnapshot {
        lock(&self.session).pool_snapshot()
    }

    /// Run `mutate` under the session lock, then deliver what it produced.
    fn commit<F>(&self, mutate: F) -> DeliveryReport
    where
        F: FnOnce(&mut Session) -> Vec<Outbound>,
    {
        let mut session = lock(&self.session);
        let batch = mutate(&mut *session);
        let mut connections = lock(&self.connections);
        drop(session);

        connections.deliver(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::combo::Combo;
    use crate::state::event::Recipient;
    use pretty_assertions::assert_eq;

    fn make_session() -> Session {
        Session::new(SessionConfig {
            rng_seed: Some(42),
            ..SessionConfig::default()
        })
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn join_new(session: &mut Session, connection: &str, name: &str) -> StableId {
        match session.join(&conn(connection), Some(name.to_string()), None).0 {
            JoinOutcome::Registered(id) => id,
            other => panic!("expected registration, got {:?}", other),
        }
    }

    fn kinds(messages: &[Outbound]) -> Vec<&'static str> {
        messages.iter().map(|m| m.message.kind()).collect()
    }

    #[test]
    fn test_new_player_messages() {
        let mut session = make_session();
        let (outcome, messages) = session.join(&conn("c1"), Some("Alice".to_string()), None);

        let JoinOutcome::Registered(id) = outcome else {
            panic!("expected registration");
        };
        assert_eq!(kinds(&messages), vec!["welcome", "playerJoined", "playerList"]);
        assert_eq!(messages[0].to, Recipient::Connection(conn("c1")));
        assert_eq!(messages[1].to, Recipient::AllExcept(conn("c1")));
        assert_eq!(messages[2].to, Recipient::All);

        let player = session.player(&id).unwrap();
        assert_eq!(player.name, "Alice");
        assert_eq!(player.progress.slots(), 7);
        assert!(!player.is_cursed());
    }

    #[test]
    fn test_join_without_name_dropped() {
        let mut session = make_session();
        let (outcome, messages) = session.join(&conn("c1"), None, None);
        assert_eq!(outcome, JoinOutcome::Dropped);
        assert!(messages.is_empty());

        let (outcome, _) = session.join(&conn("c1"), None, Some(StableId::new("ghost")));
        assert_eq!(outcome, JoinOutcome::Dropped);
        assert!(session.players().is_empty());
    }

    #[test]
    fn test_claimed_id_reused_for_new_player() {
        let mut session = make_session();
        let (outcome, _) = session.join(
            &conn("c1"),
            Some("Alice".to_string()),
            Some(StableId::new("from-client")),
        );
        assert_eq!(outcome, JoinOutcome::Registered(StableId::new("from-client")));
    }

    #[test]
    fn test_reconnect_keeps_board_and_progress() {
        let mut session = make_session();
        let id = join_new(&mut session, "c1", "Alice");
        session.update_progress(&conn("c1"), 2);
        let board = session.player(&id).unwrap().board().clone();

        session.disconnect(&conn("c1"));
        assert!(!session.player(&id).unwrap().connected);

        for round in 0..5 {
            let connection = format!("c-re-{}", round);
            let (outcome, messages) = session.join(&conn(&connection), None, Some(id.clone()));
            assert_eq!(outcome, JoinOutcome::Reconnected(id.clone()));
            assert_eq!(kinds(&messages), vec!["welcome", "playerList"]);

            let ServerMessage::Welcome {
                board: sent,
                stable_id,
                progress,
            } = &messages[0].message
            else {
                panic!("expected welcome");
            };
            assert_eq!(sent, &board);
            assert_eq!(stable_id, &id);
            assert_eq!(&progress[..3], &[true, true, false]);
            session.disconnect(&conn(&connection));
        }

        let player = session.player(&id).unwrap();
        assert_eq!(player.board(), &board);
        assert_eq!(player.progress.completed(), 2);
        assert_eq!(player.name, "Alice");
        assert_eq!(session.players().len(), 1);
    }

    #[test]
    fn test_reconnect_ignores_new_name() {
        let mut session = make_session();
        let id = join_new(&mut session, "c1", "Alice");

        session.join(&conn("c2"), Some("Alicia".to_string()), Some(id.clone()));
        assert_eq!(session.player(&id).unwrap().name, "Alice");
        assert_eq!(session.players().len(), 1);
    }

    #[test]
    fn test_same_name_merges_into_one_player() {
        let mut session = make_session();
        let id = join_new(&mut session, "phone", "Alice");

        let (outcome, messages) = session.join(&conn("laptop"), Some("Alice".to_string()), None);
        assert_eq!(outcome, JoinOutcome::Reconnected(id.clone()));
        assert!(!kinds(&messages).contains(&"playerJoined"));
        assert_eq!(session.players().len(), 1);
        assert_eq!(
            session.player(&id).unwrap().connection_id,
            conn("laptop")
        );
    }

    #[test]
    fn test_draw_broadcasts_until_exhausted() {
        let mut session = make_session();

        for _ in 0..74 {
            let (outcome, messages) = session.draw_combo(&conn("host"));
            let DrawOutcome::Drawn(combo) = outcome else {
                panic!("expected a draw");
            };
            assert_eq!(messages, vec![Outbound::all(ServerMessage::NewCombo { combo })]);
        }

        let (outcome, messages) = session.draw_combo(&conn("host"));
        assert_eq!(outcome, DrawOutcome::Exhausted);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, Recipient::Connection(conn("host")));
        assert_eq!(messages[0].message.kind(), "allCombosCalled");

        let snapshot = session.pool_snapshot();
        assert_eq!(snapshot.called_combos.len(), 75);
        assert_eq!(snapshot.called_combos[0], Combo::Free);
    }

    #[test]
    fn test_update_progress() {
        let mut session = make_session();
        let id = join_new(&mut session, "c1", "Alice");

        let messages = session.update_progress(&conn("c1"), 3);
        assert_eq!(kinds(&messages), vec!["playerUpdate"]);
        let ServerMessage::PlayerUpdate { player } = &messages[0].message else {
            panic!("expected player update");
        };
        assert_eq!(player.stable_id, id);
        assert_eq!(player.bingos, vec![true, true, true, false, false, false, false]);
        assert!(player.has_bingo);

        session.update_progress(&conn("c1"), 1);
        let flags = session.player(&id).unwrap().progress.flags().to_vec();
        assert_eq!(flags, vec![true, false, false, false, false, false, false]);

        assert!(session.update_progress(&conn("stranger"), 2).is_empty());
    }

    #[test]
    fn test_curse_resolution_order() {
        let mut session = make_session();
        let alice = join_new(&mut session, "c1", "Alice");
        let bob = join_new(&mut session, "c2", "Bob");

        // Alice moves to a new connection; "c1" is now only her legacy ID.
        session.join(&conn("c3"), None, Some(alice.clone()));

        assert_eq!(session.resolve_target(alice.as_str()), Some(alice.clone()));
        assert_eq!(session.resolve_target("c1"), Some(alice.clone()));
        assert_eq!(session.resolve_target("c3"), Some(alice.clone()));
        assert_eq!(session.resolve_target("c2"), Some(bob.clone()));
        assert_eq!(session.resolve_target("nobody"), None);
    }

    #[test]
    fn test_curse_stable_id_wins_over_connection() {
        let mut session = make_session();
        // Bob's stable ID collides with Alice's connection ID.
        join_new(&mut session, "shared", "Alice");
        session.join(
            &conn("c2"),
            Some("Bob".to_string()),
            Some(StableId::new("shared")),
        );

        assert_eq!(session.resolve_target("shared"), Some(StableId::new("shared")));
        let messages = session.trigger_curse("shared");
        let ServerMessage::CurseTriggered { name, .. } = &messages[0].message else {
            panic!("expected curse");
        };
        assert_eq!(name, "Bob");
    }

    #[test]
    fn test_curse_idempotent_state_repeated_broadcast() {
        let mut session = make_session();
        let id = join_new(&mut session, "c1", "Alice");

        let first = session.trigger_curse(id.as_str());
        let second = session.trigger_curse(id.as_str());

        let expected = vec![Outbound::all(ServerMessage::CurseTriggered {
            stable_id: id.clone(),
            name: "Alice".to_string(),
        })];
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert!(session.player(&id).unwrap().is_cursed());

        assert!(session.trigger_curse("unknown").is_empty());
    }

    #[test]
    fn test_disconnect_removes_nothing() {
        let mut session = make_session();
        let id = join_new(&mut session, "c1", "Alice");

        assert_eq!(session.disconnect(&conn("c1")), Some(id.clone()));
        assert_eq!(session.disconnect(&conn("unknown")), None);
        assert_eq!(session.players().len(), 1);
        assert!(!session.players()[0].connected);
    }

    #[test]
    fn test_reused_connection_displaces_previous_player() {
        let mut session = make_session();
        let alice = join_new(&mut session, "c1", "Alice");
        let bob = join_new(&mut session, "c2", "Bob");

        session.join(&conn("c2"), None, Some(alice.clone()));
        assert!(!session.player(&bob).unwrap().connected);

        let messages = session.update_progress(&conn("c2"), 2);
        let ServerMessage::PlayerUpdate { player } = &messages[0].message else {
            panic!("expected player update");
        };
        assert_eq!(player.stable_id, alice);

        assert_eq!(session.disconnect(&conn("c2")), Some(alice.clone()));
        assert!(session.players().iter().all(|p| !p.connected));
    }

    #[test]
    fn test_handle_dispatch() {
        let mut session = make_session();
        let messages = session.handle(
            &conn("c1"),
            ClientEvent::Join {
                name: Some("Alice".to_string()),
                stable_id: None,
            },
        );
        assert_eq!(messages.len(), 3);

        let messages = session.handle(&conn("c1"), ClientEvent::DrawCombo);
        assert_eq!(kinds(&messages), vec!["newCombo"]);

        let messages = session.handle(
            &conn("c1"),
            ClientEvent::UpdateProgress { completed_lines: 1 },
        );
        assert_eq!(kinds(&messages), vec!["playerUpdate"]);

        let messages = session.handle(
            &conn("c1"),
            ClientEvent::TriggerCurse {
                target_id: "c1".to_string(),
            },
        );
        assert_eq!(kinds(&messages), vec!["curseTriggered"]);
    }

    #[test]
    fn test_seeded_sessions_are_reproducible() {
        let mut a = make_session();
        let mut b = make_session();

        let id_a = join_new(&mut a, "c1", "Alice");
        let id_b = join_new(&mut b, "c1", "Alice");
        assert_eq!(a.player(&id_a).unwrap().board(), b.player(&id_b).unwrap().board());
        assert_eq!(a.draw_combo(&conn("h")).0, b.draw_combo(&conn("h")).0);
    }
}
