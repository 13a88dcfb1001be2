//! Error types.
//!
//! Bad input from players is never an error at the coordinator level (it is
//! dropped and logged). These types cover the edges: decoding frames from the
//! transport, parsing combos, loading configuration and delivering messages.

use thiserror::Error;

/// Failure to decode an inbound frame into a [`ClientEvent`](crate::ClientEvent).
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure to parse a combo label such as `"B12"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboParseError {
    #[error("empty combo label")]
    Empty,

    #[error("unknown column letter: {0}")]
    UnknownColumn(char),

    #[error("invalid number in combo label: {0}")]
    InvalidNumber(String),

    /// Number parsed but does not belong to the column (or is the free slot).
    #[error("{number} is not drawable in column {column}")]
    OutOfRange { column: char, number: u8 },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure to hand a message to one connection channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    #[error("connection closed: {0}")]
    Closed(String),
}
