//! Session state for a bingo game.
//!
//! - `combo` - combo universe and draw history
//! - `board` - per-player boards
//! - `player` - player records and the registry
//! - `event` - inbound events and outbound messages
//! - `connection` - transport channels and fan-out
//! - `session` - the coordinator tying it together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         SharedSession                            │
//! │                                                                  │
//! │  Mutex<Session>                          Mutex<ConnectionManager>│
//! │  ┌────────────────────────────────┐      ┌────────────────────┐  │
//! │  │ PlayerRegistry                 │      │ connection_id →    │  │
//! │  │   stable_id → Player           │      │   Connection       │  │
//! │  │   connection_id → stable_id    │      │   (sender, status) │  │
//! │  │   name → stable_id             │      └────────────────────┘  │
//! │  │                                │                ▲             │
//! │  │ ComboPool                      │  Vec<Outbound> │             │
//! │  │   universe, drawn              │ ───────────────┘             │
//! │  └────────────────────────────────┘                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use bingo_session::state::{ConnectionId, SessionConfig, SharedSession};
//! use tokio::sync::mpsc::unbounded_channel;
//!
//! let session = SharedSession::new(SessionConfig::default());
//!
//! let (tx, mut rx) = unbounded_channel();
//! let conn = ConnectionId::new("socket-1");
//! session.connect(conn.clone(), tx);
//!
//! session.handle_frame(&conn, r#"{"type":"join","name":"Alice"}"#).unwrap();
//! assert_eq!(rx.try_recv().unwrap().kind(), "welcome");
//! ```

pub mod board;
pub mod combo;
pub mod connection;
pub mod event;
pub mod player;
pub mod session;

pub use crate::config::SessionConfig;

// Re-export commonly used types
pub use board::{Board, BOARD_SIZE};
pub use combo::{Column, Combo, ComboPool, DrawOutcome, PoolSnapshot, FREE_SLOT_NUMBER};
pub use connection::{Connection, ConnectionManager, ConnectionStatus, DeliveryReport, MessageSender};
pub use event::{ClientEvent, Outbound, Recipient, ServerMessage};
pub use player::{ConnectionId, Player, PlayerRecord, PlayerRegistry, Progress, StableId};
pub use session::{JoinOutcome, Session, SharedSession, ALL_CALLED_MESSAGE};
