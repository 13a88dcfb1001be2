//! Inbound events and outbound messages.
//!
//! Both directions are tagged JSON objects (`{"type": "join", ...}`). The
//! transport decodes frames with [`ClientEvent::from_json`] and encodes
//! [`ServerMessage`] with serde.

use serde::{Deserialize, Deserializer, Serialize};

use super::board::Board;
use super::combo::Combo;
use super::player::{ConnectionId, PlayerRecord, StableId};
use crate::error::EventError;

/// Event received from a participant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// First join or reconnect. A blank name counts as no name.
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default, deserialize_with = "non_blank")]
        name: Option<String>,
        #[serde(default, deserialize_with = "non_blank_id")]
        stable_id: Option<StableId>,
    },

    DrawCombo,

    #[serde(rename_all = "camelCase")]
    UpdateProgress { completed_lines: usize },

    #[serde(rename_all = "camelCase")]
    TriggerCurse { target_id: String },
}

impl ClientEvent {
    /// Decode a JSON frame.
    pub fn from_json(frame: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Wire tag of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::DrawCombo => "drawCombo",
            Self::UpdateProgress { .. } => "updateProgress",
            Self::TriggerCurse { .. } => "triggerCurse",
        }
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn non_blank_id<'de, D>(deserializer: D) -> Result<Option<StableId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_blank(deserializer)?.map(StableId::new))
}

/// Message sent to one or more participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Joining channel only.
    #[serde(rename_all = "camelCase")]
    Welcome {
        board: Board,
        stable_id: StableId,
        progress: Vec<bool>,
    },

    PlayerJoined { player: PlayerRecord },

    PlayerList { players: Vec<PlayerRecord> },

    PlayerUpdate { player: PlayerRecord },

    NewCombo { combo: Combo },

    /// Requesting channel only; nothing left to draw.
    AllCombosCalled { message: String },

    #[serde(rename_all = "camelCase")]
    CurseTriggered { stable_id: StableId, name: String },
}

impl ServerMessage {
    /// Wire tag of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerList { .. } => "playerList",
            Self::PlayerUpdate { .. } => "playerUpdate",
            Self::NewCombo { .. } => "newCombo",
            Self::AllCombosCalled { .. } => "allCombosCalled",
            Self::CurseTriggered { .. } => "curseTriggered",
        }
    }

    /// Convert to JSON for sending to clients.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Who receives an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Connection(ConnectionId),
    All,
    AllExcept(ConnectionId),
}

impl Recipient {
    /// Check if a connection is addressed.
    pub fn includes(&self, connection_id: &ConnectionId) -> bool {
        match self {
            Self::Connection(id) => id == connection_id,
            Self::All => true,
            Self::AllExcept(id) => id != connection_id,
        }
    }
}

/// An addressed message, produced while the session lock is held and
/// delivered after it is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to(connection_id: &ConnectionId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::Connection(connection_id.clone()),
            message,
        }
    }

    pub fn all(message: ServerMessage) -> Self {
        Self {
            to: Recipient::All,
            message,
        }
    }

    pub fn all_except(connection_id: &ConnectionId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::AllExcept(connection_id.clone()),
            message,
        }
    }
}
