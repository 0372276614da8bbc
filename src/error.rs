//! Error taxonomy for the TN5250E engine
//!
//! Every layer reports a typed error so callers can tell "your input was
//! invalid" (encode, character conversion) from "the host said something
//! unexpected" (negotiation, decode) from "the connection died".

use std::fmt;
use std::io;
use std::error::Error as StdError;
use std::time::Duration;

/// Top-level error type for TN5250E operations
#[derive(Debug)]
pub enum TN5250Error {
    /// Telnet option negotiation errors
    Negotiation(NegotiationError),
    /// 5250 data stream errors
    Decode(DecodeError),
    /// EBCDIC conversion errors
    Conversion(CharacterConversionError),
    /// Keystroke encoding errors
    Encode(EncodeError),
    /// Socket level errors
    Connection(ConnectionError),
    /// Configuration errors
    Config(ConfigError),
    /// Keyboard unlock wait errors
    Unlock(UnlockError),
    /// Session API misuse
    Session(SessionError),
}

/// Telnet option negotiation errors. Recoverable: the connection continues
/// with reduced capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// Subnegotiation payload could not be parsed
    MalformedSubnegotiation { option: u8, data: Vec<u8> },
    /// Subnegotiation received for an option that is not enabled
    OptionNotEnabled { option: u8 },
    /// Subnegotiation not terminated by IAC SE
    UnterminatedSubnegotiation { option: u8 },
    /// IAC EOR before END-OF-RECORD was agreed in both directions
    PrematureEndOfRecord,
    /// Local request that RFC 1143 forbids in the current state
    InvalidRequest { option: u8, reason: &'static str },
    /// Peer answered a request we never made
    UnexpectedReply { option: u8, command: u8 },
}

/// 5250 data stream errors. `TruncatedRecord` asks the caller to buffer more
/// bytes; the others abort the current record only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Field or address outside the screen, overlapping fields, 0 row/col
    InvalidField { row: usize, col: usize, reason: String },
    /// Unknown order byte inside a Write To Display
    UnknownOrder { order: u8, offset: usize },
    /// Record shorter than its length or command parameters
    TruncatedRecord { expected: usize, available: usize },
    /// GDS header that cannot be interpreted
    InvalidHeader { reason: String },
    /// Command byte not defined for this opcode
    UnsupportedCommand { command: u8 },
}

/// Unmappable byte or character. Never substituted silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterConversionError {
    /// CCSID is not one of the built-in tables
    UnsupportedCcsid { ccsid: u16 },
    /// EBCDIC byte has no Unicode mapping in this CCSID
    UnmappableByte { ccsid: u16, byte: u8 },
    /// Unicode character has no EBCDIC mapping in this CCSID
    UnmappableChar { ccsid: u16, ch: char },
    /// Shift-out or shift-in on a page whose double-byte plane is not built in
    DoubleByteUnsupported { ccsid: u16, byte: u8 },
}

/// Keystroke encoding errors. Raised before any byte is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// `[name]` is not a known mnemonic
    UnknownMnemonic { mnemonic: String },
    /// `[` without a closing `]`
    UnterminatedMnemonic { position: usize },
    /// Input does not fit in the remaining length of the current field
    FieldOverflow { row: usize, col: usize, remaining: usize, requested: usize },
    /// Typing outside an input field
    ProtectedPosition { row: usize, col: usize },
    /// Character refused by the field's shift/edit specification
    InvalidCharacter { ch: char, reason: &'static str },
    /// Keys after an AID key in the same batch
    InputAfterAid { remaining: String },
    /// Literal cannot be represented in the session CCSID
    Conversion(CharacterConversionError),
    /// Record longer than the 16-bit logical record length allows
    RecordTooLong { length: usize },
}

/// Socket level errors. Fatal to the session.
#[derive(Debug)]
pub enum ConnectionError {
    /// Host name did not resolve
    DnsResolution { host: String },
    /// TCP connect failed
    ConnectFailed { host: String, port: u16, source: io::Error },
    /// TLS setup or handshake failure
    Tls { message: String },
    /// Negotiation did not complete in time
    NegotiationTimeout { timeout: Duration },
    /// Peer closed the connection
    Closed,
    /// Read or write failure on an established connection
    Io(io::Error),
    /// Session configuration rejected before connecting
    Config(ConfigError),
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid configuration parameter
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Configuration file error
    FileError { path: String, error: String },
    /// JSON (de)serialization error
    Format { error: String },
}

/// Failure of `wait_for_unlock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockError {
    /// The keyboard stayed locked for the whole timeout
    Timeout { waited: Duration },
    /// The session was disconnected while waiting
    ConnectionClosed,
}

/// Errors of the session driver's public API
#[derive(Debug)]
pub enum SessionError {
    /// `send_keys` while the keyboard is locked without queuing
    KeyboardLocked,
    /// Operation on a disconnected session
    NotConnected,
    /// Keystrokes rejected by the encoder
    Encode(EncodeError),
    /// Screen text could not be converted
    Conversion(CharacterConversionError),
    /// Write to the host failed
    Connection(ConnectionError),
}

impl fmt::Display for TN5250Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TN5250Error::Negotiation(err) => write!(f, "Negotiation error: {err}"),
            TN5250Error::Decode(err) => write!(f, "Decode error: {err}"),
            TN5250Error::Conversion(err) => write!(f, "Conversion error: {err}"),
            TN5250Error::Encode(err) => write!(f, "Encode error: {err}"),
            TN5250Error::Connection(err) => write!(f, "Connection error: {err}"),
            TN5250Error::Config(err) => write!(f, "Configuration error: {err}"),
            TN5250Error::Unlock(err) => write!(f, "Unlock error: {err}"),
            TN5250Error::Session(err) => write!(f, "Session error: {err}"),
        }
    }
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationError::MalformedSubnegotiation { option, data } =>
                write!(f, "Malformed subnegotiation for option {option}: {data:02x?}"),
            NegotiationError::OptionNotEnabled { option } =>
                write!(f, "Subnegotiation for option {option} which is not enabled"),
            NegotiationError::UnterminatedSubnegotiation { option } =>
                write!(f, "Subnegotiation for option {option} not terminated by IAC SE"),
            NegotiationError::PrematureEndOfRecord =>
                write!(f, "IAC EOR received before END-OF-RECORD was negotiated"),
            NegotiationError::InvalidRequest { option, reason } =>
                write!(f, "Invalid request for option {option}: {reason}"),
            NegotiationError::UnexpectedReply { option, command } =>
                write!(f, "Unexpected reply {command} for option {option}"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidField { row, col, reason } =>
                write!(f, "Invalid field at row {row} col {col}: {reason}"),
            DecodeError::UnknownOrder { order, offset } =>
                write!(f, "Unknown order 0x{order:02X} at offset {offset}"),
            DecodeError::TruncatedRecord { expected, available } =>
                write!(f, "Truncated record: expected {expected} bytes, {available} available"),
            DecodeError::InvalidHeader { reason } =>
                write!(f, "Invalid GDS header: {reason}"),
            DecodeError::UnsupportedCommand { command } =>
                write!(f, "Unsupported command 0x{command:02X}"),
        }
    }
}

impl fmt::Display for CharacterConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterConversionError::UnsupportedCcsid { ccsid } =>
                write!(f, "CCSID {ccsid} is not supported"),
            CharacterConversionError::UnmappableByte { ccsid, byte } =>
                write!(f, "EBCDIC byte 0x{byte:02X} has no mapping in CCSID {ccsid}"),
            CharacterConversionError::UnmappableChar { ccsid, ch } =>
                write!(f, "Character {ch:?} (U+{:04X}) has no mapping in CCSID {ccsid}", *ch as u32),
            CharacterConversionError::DoubleByteUnsupported { ccsid, byte } =>
                write!(f, "Shift byte 0x{byte:02X} in CCSID {ccsid}: only the single-byte plane is supported"),
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::UnknownMnemonic { mnemonic } =>
                write!(f, "Unknown key mnemonic [{mnemonic}]"),
            EncodeError::UnterminatedMnemonic { position } =>
                write!(f, "Mnemonic starting at position {position} is not terminated"),
            EncodeError::FieldOverflow { row, col, remaining, requested } =>
                write!(f, "Field at row {row} col {col} has {remaining} positions left, {requested} requested"),
            EncodeError::ProtectedPosition { row, col } =>
                write!(f, "Cursor at row {row} col {col} is in a protected area"),
            EncodeError::InvalidCharacter { ch, reason } =>
                write!(f, "Character {ch:?} rejected: {reason}"),
            EncodeError::InputAfterAid { remaining } =>
                write!(f, "Input after AID key: {remaining:?}"),
            EncodeError::Conversion(err) => write!(f, "{err}"),
            EncodeError::RecordTooLong { length } =>
                write!(f, "Record of {length} bytes exceeds the 65535 byte record length"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::DnsResolution { host } =>
                write!(f, "Failed to resolve host: {host}"),
            ConnectionError::ConnectFailed { host, port, source } =>
                write!(f, "Failed to connect to {host}:{port}: {source}"),
            ConnectionError::Tls { message } => write!(f, "TLS error: {message}"),
            ConnectionError::NegotiationTimeout { timeout } =>
                write!(f, "Telnet negotiation did not complete within {timeout:?}"),
            ConnectionError::Closed => write!(f, "Connection closed by peer"),
            ConnectionError::Io(err) => write!(f, "I/O error: {err}"),
            ConnectionError::Config(err) => write!(f, "{err}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidParameter { parameter, value, reason } =>
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}"),
            ConfigError::FileError { path, error } =>
                write!(f, "Configuration file error at {path}: {error}"),
            ConfigError::Format { error } =>
                write!(f, "Configuration format error: {error}"),
        }
    }
}

impl fmt::Display for UnlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockError::Timeout { waited } =>
                write!(f, "Keyboard still locked after {waited:?}"),
            UnlockError::ConnectionClosed =>
                write!(f, "Connection closed while waiting for keyboard unlock"),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::KeyboardLocked => write!(f, "Keyboard is locked"),
            SessionError::NotConnected => write!(f, "Session is not connected"),
            SessionError::Encode(err) => write!(f, "{err}"),
            SessionError::Conversion(err) => write!(f, "{err}"),
            SessionError::Connection(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for TN5250Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TN5250Error::Negotiation(err) => Some(err),
            TN5250Error::Decode(err) => Some(err),
            TN5250Error::Conversion(err) => Some(err),
            TN5250Error::Encode(err) => Some(err),
            TN5250Error::Connection(err) => Some(err),
            TN5250Error::Config(err) => Some(err),
            TN5250Error::Unlock(err) => Some(err),
            TN5250Error::Session(err) => Some(err),
        }
    }
}

impl StdError for NegotiationError {}
impl StdError for DecodeError {}
impl StdError for CharacterConversionError {}
impl StdError for ConfigError {}
impl StdError for UnlockError {}

impl StdError for EncodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            EncodeError::Conversion(err) => Some(err),
            _ => None,
        }
    }
}

impl StdError for ConnectionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConnectionError::ConnectFailed { source, .. } => Some(source),
            ConnectionError::Io(err) => Some(err),
            ConnectionError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::Encode(err) => Some(err),
            SessionError::Conversion(err) => Some(err),
            SessionError::Connection(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NegotiationError> for TN5250Error {
    fn from(err: NegotiationError) -> Self {
        TN5250Error::Negotiation(err)
    }
}

impl From<DecodeError> for TN5250Error {
    fn from(err: DecodeError) -> Self {
        TN5250Error::Decode(err)
    }
}

impl From<CharacterConversionError> for TN5250Error {
    fn from(err: CharacterConversionError) -> Self {
        TN5250Error::Conversion(err)
    }
}

impl From<EncodeError> for TN5250Error {
    fn from(err: EncodeError) -> Self {
        TN5250Error::Encode(err)
    }
}

impl From<ConnectionError> for TN5250Error {
    fn from(err: ConnectionError) -> Self {
        TN5250Error::Connection(err)
    }
}

impl From<ConfigError> for TN5250Error {
    fn from(err: ConfigError) -> Self {
        TN5250Error::Config(err)
    }
}

impl From<UnlockError> for TN5250Error {
    fn from(err: UnlockError) -> Self {
        TN5250Error::Unlock(err)
    }
}

impl From<SessionError> for TN5250Error {
    fn from(err: SessionError) -> Self {
        TN5250Error::Session(err)
    }
}

impl From<CharacterConversionError> for EncodeError {
    fn from(err: CharacterConversionError) -> Self {
        EncodeError::Conversion(err)
    }
}

impl From<EncodeError> for SessionError {
    fn from(err: EncodeError) -> Self {
        SessionError::Encode(err)
    }
}

impl From<CharacterConversionError> for SessionError {
    fn from(err: CharacterConversionError) -> Self {
        SessionError::Conversion(err)
    }
}

impl From<ConnectionError> for SessionError {
    fn from(err: ConnectionError) -> Self {
        SessionError::Connection(err)
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => ConnectionError::Closed,
            _ => ConnectionError::Io(err),
        }
    }
}

impl From<ConfigError> for ConnectionError {
    fn from(err: ConfigError) -> Self {
        ConnectionError::Config(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Format { error: err.to_string() }
    }
}

/// Result type alias for the engine
pub type TN5250Result<T> = Result<T, TN5250Error>;

/// Result type alias for data stream decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::UnknownOrder { order: 0x07, offset: 12 };
        assert_eq!(err.to_string(), "Unknown order 0x07 at offset 12");

        let err = DecodeError::InvalidField { row: 0, col: 5, reason: "row is 0".to_string() };
        assert!(err.to_string().contains("row 0 col 5"));
    }

    #[test]
    fn test_conversion_error_display() {
        let err = CharacterConversionError::UnmappableChar { ccsid: 37, ch: '€' };
        assert!(err.to_string().contains("U+20AC"));
        assert!(err.to_string().contains("CCSID 37"));
    }

    #[test]
    fn test_top_level_conversions() {
        let err: TN5250Error = DecodeError::TruncatedRecord { expected: 10, available: 4 }.into();
        assert!(matches!(err, TN5250Error::Decode(_)));
        assert!(err.source().is_some());

        let err: EncodeError = CharacterConversionError::UnsupportedCcsid { ccsid: 1 }.into();
        assert!(matches!(err, EncodeError::Conversion(_)));
    }

    #[test]
    fn test_io_error_mapping() {
        let err: ConnectionError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, ConnectionError::Closed));

        let err: ConnectionError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, ConnectionError::Io(_)));
    }
}
