/// PROTOCOL COMMON: EBCDIC codepage tables shared by every layer
pub mod protocol_common;

/// LIB5250: IBM 5250 data stream, screen, field and OIA model
/// Frame codec, stream decoder and Query Reply for IBM i hosts
pub mod lib5250;

/// Telnet option negotiation (RFC 1143 Q-method)
pub mod telnet_negotiation;

/// Keystroke encoding into inbound 5250 records
pub mod keyboard;

/// TCP and TLS transport
pub mod network;

/// Screen events and listener fan-out
pub mod events;

/// Session configuration
pub mod config;

/// Session driver: reader thread, shared state and the public API
pub mod controller;

pub mod error;

pub use config::SessionConfig;
pub use controller::{SendMode, Session};
pub use error::{
    CharacterConversionError, ConfigError, ConnectionError, DecodeError, EncodeError, NegotiationError,
    SessionError, TN5250Error, TN5250Result, UnlockError,
};
pub use events::{ListenerId, PendingKeys, ScreenEvent, ScreenListener};
pub use keyboard::{encode, EncodedKeys, KeystrokeEncoder};
pub use lib5250::{Cursor, FieldView, OiaState, Screen};
