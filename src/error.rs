//! ATT error codes and the host-side error types that are never put on the wire.

use crate::Handle;

/// An ATT Protocol error code, as carried in an Error Response.
///
/// `NoError` is a local sentinel: it must never be placed in an Error Response PDU. See the
/// Bluetooth Core Specification, Vol. 3, Part F, Section 3.4.1.1.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ErrorCode {
    /// Internal sentinel meaning "no error"; never transmitted.
    #[error("no error")]
    NoError,
    #[error("the attribute handle given was not valid on this server")]
    InvalidHandle,
    #[error("the attribute cannot be read")]
    ReadNotPermitted,
    #[error("the attribute cannot be written")]
    WriteNotPermitted,
    #[error("the attribute PDU was invalid")]
    InvalidPdu,
    #[error("the attribute requires authentication before it can be read or written")]
    InsufficientAuthentication,
    #[error("the attribute server does not support the request received from the client")]
    RequestNotSupported,
    #[error("offset specified was past the end of the attribute")]
    InvalidOffset,
    #[error("the attribute requires authorization before it can be read or written")]
    InsufficientAuthorization,
    #[error("too many prepare writes have been queued")]
    PrepareQueueFull,
    #[error("no attribute found within the given attribute handle range")]
    AttributeNotFound,
    #[error("the attribute cannot be read or written using the Read Blob Request")]
    AttributeNotLong,
    #[error("the encryption key size used for encrypting this link is insufficient")]
    InsufficientEncryptionKeySize,
    #[error("the attribute value length is invalid for the operation")]
    InvalidAttributeValueLength,
    #[error("the attribute request encountered an error that was unlikely")]
    UnlikelyError,
    #[error("the attribute requires encryption before it can be read or written")]
    InsufficientEncryption,
    #[error("the attribute type is not a supported grouping attribute")]
    UnsupportedGroupType,
    #[error("insufficient resources to complete the request")]
    InsufficientResources,
    /// Reserved, application-specific, or common profile error codes (0x12-0xFF).
    #[error("other ATT error code 0x{0:02X}")]
    Other(u8),
}

impl ErrorCode {
    pub fn from_raw(val: u8) -> ErrorCode {
        match val {
            0x00 => ErrorCode::NoError,
            0x01 => ErrorCode::InvalidHandle,
            0x02 => ErrorCode::ReadNotPermitted,
            0x03 => ErrorCode::WriteNotPermitted,
            0x04 => ErrorCode::InvalidPdu,
            0x05 => ErrorCode::InsufficientAuthentication,
            0x06 => ErrorCode::RequestNotSupported,
            0x07 => ErrorCode::InvalidOffset,
            0x08 => ErrorCode::InsufficientAuthorization,
            0x09 => ErrorCode::PrepareQueueFull,
            0x0A => ErrorCode::AttributeNotFound,
            0x0B => ErrorCode::AttributeNotLong,
            0x0C => ErrorCode::InsufficientEncryptionKeySize,
            0x0D => ErrorCode::InvalidAttributeValueLength,
            0x0E => ErrorCode::UnlikelyError,
            0x0F => ErrorCode::InsufficientEncryption,
            0x10 => ErrorCode::UnsupportedGroupType,
            0x11 => ErrorCode::InsufficientResources,
            other => ErrorCode::Other(other),
        }
    }

    pub fn into_raw(self) -> u8 {
        match self {
            ErrorCode::NoError => 0x00,
            ErrorCode::InvalidHandle => 0x01,
            ErrorCode::ReadNotPermitted => 0x02,
            ErrorCode::WriteNotPermitted => 0x03,
            ErrorCode::InvalidPdu => 0x04,
            ErrorCode::InsufficientAuthentication => 0x05,
            ErrorCode::RequestNotSupported => 0x06,
            ErrorCode::InvalidOffset => 0x07,
            ErrorCode::InsufficientAuthorization => 0x08,
            ErrorCode::PrepareQueueFull => 0x09,
            ErrorCode::AttributeNotFound => 0x0A,
            ErrorCode::AttributeNotLong => 0x0B,
            ErrorCode::InsufficientEncryptionKeySize => 0x0C,
            ErrorCode::InvalidAttributeValueLength => 0x0D,
            ErrorCode::UnlikelyError => 0x0E,
            ErrorCode::InsufficientEncryption => 0x0F,
            ErrorCode::UnsupportedGroupType => 0x10,
            ErrorCode::InsufficientResources => 0x11,
            ErrorCode::Other(val) => val,
        }
    }
}

/// A host-local error: something the local transaction-completion callback can see but which is
/// never placed on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum HostError {
    /// The transaction's 30-second deadline elapsed with no response.
    #[error("transaction timed out")]
    TimedOut,
    /// The bearer shut down (or the transaction was otherwise abandoned) for a reason other than
    /// a timeout.
    #[error("transaction failed")]
    Failed,
    /// The transaction could not be placed on the outbound queue.
    #[error("out of memory")]
    OutOfMemory,
    /// The transaction was explicitly cancelled.
    #[error("transaction cancelled")]
    Canceled,
}

/// The outcome reported to a `StartTransaction` completion when the transaction did not
/// succeed: either a protocol-level Error Response, or a host-local failure.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum AttError {
    /// The peer answered with an Error Response.
    #[error("{code} (handle {handle:#06X})")]
    Protocol { code: ErrorCode, handle: Handle },
    /// No response was ever received, for a host-local reason.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl AttError {
    pub fn protocol(code: ErrorCode, handle: Handle) -> Self {
        AttError::Protocol { code, handle }
    }
}

/// A PDU failed to parse. Parse errors never panic; the frame is simply dropped (and, depending
/// on context, the bearer shuts down per the sequencing rules in [`crate::bearer`]).
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum ParseError {
    #[error("PDU with length of zero received")]
    EmptyPdu,
    #[error("PDU too short for its opcode: needed at least {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },
    #[error("PDU payload length does not match a whole number of list entries")]
    TrailingBytes,
    #[error("unrecognized UUID format byte: {0:#04X}")]
    BadUuidFormat(u8),
    #[error("attribute value length {0} exceeds the maximum of {max}", max = crate::MAX_ATTRIBUTE_VALUE_LENGTH)]
    ValueTooLong(usize),
}
