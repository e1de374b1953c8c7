//! Error types shared by the codec, validators, and engine.
//!
//! `Error` covers codec-level (malformed bytes) and type-level (bad pid,
//! bad topic) failures. `ValidationError` wraps those plus semantic
//! validation failures and carries the [`ErrorKind`] the engine needs to
//! decide whether a failure fails one operation or halts the connection.

use thiserror::Error as ThisError;

/// Low-level codec/type errors.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid remaining length")]
    InvalidRemainingLength,
    #[error("packet identifier is 0")]
    ZeroPid,
    #[error("invalid qos: `{0}`")]
    InvalidQos(u8),
    #[error("invalid connect flags: `{0:#04x}`")]
    InvalidConnectFlags(u8),
    #[error("invalid protocol level: `{0}`")]
    InvalidProtocolLevel(u8),
    #[error("invalid protocol name")]
    InvalidProtocolName,
    #[error("invalid fixed header")]
    InvalidHeader,
    #[error("invalid variable byte integer")]
    InvalidVarByteInt,
    #[error("invalid topic name: {0}")]
    InvalidTopicName(String),
    #[error("invalid topic filter: {0}")]
    InvalidTopicFilter(String),
    #[error("invalid utf-8 string")]
    InvalidString,
    #[error("invalid property identifier: `{0:#04x}`")]
    InvalidPropertyId(u8),
    #[error("duplicated property `{0:#04x}`")]
    DuplicatedProperty(u8),
    #[error("invalid reason code `{0:#04x}` for this packet type")]
    InvalidReasonCode(u8),
    #[error("unexpected end of buffer")]
    UnexpectedEof,
    #[error("payload is not valid json: {0}")]
    InvalidJsonPayload(String),
    #[error("all 65535 packet ids are bound")]
    PacketIdsExhausted,
}

/// The class of failure the engine must react to, per the contract in
/// spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// User-submitted-packet validation failure: only the submitted
    /// operation fails, nothing else is affected.
    UserValidation,
    /// Pre-encode binary validation failure: same blast radius as above.
    BinaryValidation,
    /// Inbound packet failed validation or was illegal for the current
    /// state: the connection must halt.
    ProtocolError,
    /// connack/pingresp deadline exceeded: the connection must halt.
    Timeout,
    /// A submitted operation's own `timeout_millis` elapsed before it
    /// completed: only that operation fails, the connection is unaffected.
    OperationTimeout,
    /// packet-id exhaustion or other internal invariant breach.
    Unknown,
    /// non-Success Connack or a server-sent Disconnect.
    Normal,
}

/// A validation failure, always tagged with the [`ErrorKind`] that tells a
/// caller how far its blast radius reaches.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ValidationError {
            kind,
            message: message.into(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserValidation, message)
    }

    pub fn binary(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BinaryValidation, message)
    }

    pub fn inbound(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    pub fn operation_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationTimeout, message)
    }
}

impl From<Error> for ValidationError {
    fn from(err: Error) -> Self {
        ValidationError::new(ErrorKind::ProtocolError, err.to_string())
    }
}
