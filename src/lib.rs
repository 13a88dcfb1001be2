//! Bingo Session Library
//!
//! This crate coordinates a multiplayer bingo session: a host draws shared
//! combos, every player holds a private board, and all participants receive
//! the same authoritative updates.
//!
//! # Overview
//!
//! - **Combo Pool** - The fixed universe of drawable combos and the ordered,
//!   append-only record of what has been called.
//!
//! - **Player Registry** - Players keyed by a stable ID that survives
//!   reconnects, with lookups by current connection and display name.
//!
//! - **Session Coordinator** - Resolves joins and reconnects, applies draws,
//!   progress claims and curses, and produces the messages to broadcast.
//!
//! # Design Principles
//!
//! 1. **Identity outlives connections** - A reconnect never regenerates a
//!    board or resets progress.
//!
//! 2. **Commit, then fan out** - State is mutated under one lock; delivery
//!    happens afterwards and a failed channel never rolls anything back.
//!
//! 3. **No networking** - The transport hands in events and channels; this
//!    crate never opens a socket.
//!
//! 4. **Permissive input** - Bad or unresolvable events are dropped and
//!    logged, never surfaced as errors to players.
//!
//! # Example
//!
//! ```rust
//! use bingo_session::{ClientEvent, ConnectionId, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! let host = ConnectionId::new("host");
//! let alice = ConnectionId::new("alice-phone");
//!
//! let messages = session.handle(
//!     &alice,
//!     ClientEvent::Join { name: Some("Alice".to_string()), stable_id: None },
//! );
//! assert_eq!(messages[0].message.kind(), "welcome");
//!
//! let messages = session.handle(&host, ClientEvent::DrawCombo);
//! assert_eq!(messages[0].message.kind(), "newCombo");
//! assert_eq!(session.pool_snapshot().called_combos.len(), 2);
//! ```

pub mod config;
pub mod error;
pub mod state;

// Re-export everything from state module at crate root
pub use error::{ComboParseError, ConfigError, DeliveryError, EventError};
pub use state::*;
