//! Connection channel tracking and broadcast fan-out.
//!
//! Each live transport connection registers an outbound channel here. A
//! failed delivery affects only that channel: it is marked disconnected,
//! logged, and the remaining deliveries go ahead. Closed channels are
//! removed; the player they belonged to stays in the registry.

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use super::event::{Outbound, Recipient, ServerMessage};
use super::player::ConnectionId;
use crate::error::DeliveryError;

/// Outbound half of a connection channel.
pub type MessageSender = UnboundedSender<ServerMessage>;

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// Transport went away; dropped from the manager on the next sweep
    Disconnected { since: Instant },
}

impl ConnectionStatus {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// One transport channel.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,

    sender: MessageSender,

    pub status: ConnectionStatus,

    /// When this connection was established
    pub connected_at: Instant,

    /// Last successful delivery
    pub last_activity: Instant,

    /// Messages delivered so far
    pub send_seq: u64,
}

impl Connection {
    pub fn new(id: ConnectionId, sender: MessageSender) -> Self {
        let now = Instant::now();
        Self {
            id,
            sender,
            status: ConnectionStatus::Connected,
            connected_at: now,
            last_activity: now,
            send_seq: 0,
        }
    }

    /// Mark as disconnected.
    pub fn disconnect(&mut self) {
        if self.status.is_connected() {
            self.status = ConnectionStatus::Disconnected {
                since: Instant::now(),
            };
        }
    }

    /// Hand a message to the channel. Returns the sequence number on success.
    pub fn send(&mut self, message: ServerMessage) -> Result<u64, DeliveryError> {
        if !self.status.is_connected() {
            return Err(DeliveryError::Closed(self.id.to_string()));
        }

        if self.sender.send(message).is_err() {
            self.disconnect();
            return Err(DeliveryError::Closed(self.id.to_string()));
        }

        self.send_seq += 1;
        self.last_activity = Instant::now();
        Ok(self.send_seq)
    }
}

/// Per-batch delivery outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<(ConnectionId, DeliveryError)>,
}

impl DeliveryReport {
    /// Check if every delivery succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Connection manager - tracks every channel the session has seen.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. An existing channel with the same ID is replaced.
    pub fn add(&mut self, id: ConnectionId, sender: MessageSender) {
        debug!("connection {} registered", id);
        self.connections.insert(id.clone(), Connection::new(id, sender));
    }

    /// Get a connection by ID.
    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Remove a channel entirely.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        let conn = self.connections.remove(id)?;
        debug!("connection {} removed", id);
        Some(conn)
    }

    /// Drop every channel that is no longer connected.
    /// Returns the removed IDs.
    pub fn remove_disconnected(&mut self) -> Vec<ConnectionId> {
        let stale: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| !c.status.is_connected())
            .map(|c| c.id.clone())
            .collect();

        for id in &stale {
            self.connections.remove(id);
        }

        stale
    }

    /// Mark a channel disconnected. Returns false if it was unknown.
    pub fn disconnect(&mut self, id: &ConnectionId) -> bool {
        match self.connections.get_mut(id) {
            Some(conn) => {
                conn.disconnect();
                true
            }
            None => false,
        }
    }

    /// Send one message to one channel.
    pub fn send_to(
        &mut self,
        id: &ConnectionId,
        message: ServerMessage,
    ) -> Result<u64, DeliveryError> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| DeliveryError::UnknownConnection(id.to_string()))?
            .send(message)
    }

    /// Deliver a batch in order. Failures are isolated per channel, and
    /// channels found closed are dropped afterwards.
    pub fn deliver(&mut self, batch: Vec<Outbound>) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for outbound in batch {
            match &outbound.to {
                Recipient::Connection(id) => {
                    self.record(&mut report, id.clone(), |m| m.send_to(id, outbound.message));
                }
                recipient => {
                    let targets: Vec<ConnectionId> = self
                        .connections
                        .values()
                        .filter(|c| c.status.is_connected() && recipient.includes(&c.id))
                        .map(|c| c.id.clone())
                        .collect();

                    for id in targets {
                        let message = outbound.message.clone();
                        self.record(&mut report, id.clone(), |m| m.send_to(&id, message));
                    }
                }
            }
        }

        self.remove_disconnected();
        report
    }

    fn record<F>(&mut self, report: &mut DeliveryReport, id: ConnectionId, send: F)
    where
        F: FnOnce(&mut Self) -> Result<u64, DeliveryError>,
    {
        match send(self) {
            Ok(_) => report.delivered += 1,
            Err(err) => {
                warn!("delivery to {} failed: {}", id, err);
                report.failed.push((id, err));
            }
        }
    }

    /// Connected channel IDs.
    pub fn connected(&self) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.status.is_connected())
            .map(|c| c.id.clone())
            .collect()
    }

    /// Count connected channels.
    pub fn connected_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.status.is_connected())
            .count()
    }

    /// Count tracked channels.
    pub fn total_count(&self) -> usize {
        self.connections.len()
    }
}
