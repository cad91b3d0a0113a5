//! ECP error types

use thiserror::Error;

use super::command::CommandCode;

/// Coarse classification of ECP failures
///
/// Every [`Error`] variant belongs to exactly one class; tests and callers
/// that only care about the failure class match on this instead of the
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Locally detectable misuse; the request never reaches the transport
    InvalidArgument,
    /// A numeric parameter outside its valid domain; never reaches the transport
    OutOfRange,
    /// Transport failure, or an undecodable or unexpected response
    Communication,
}

/// ECP protocol and client errors
#[derive(Error, Debug)]
pub enum Error {
    /// Payload exceeds the 16-bit length field's capacity
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Received buffer shorter than required
    #[error("response too short: need {needed} bytes, got {got}")]
    ResponseTooShort {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Declared payload length exceeds the bytes actually received
    #[error("response truncated: declares {declared} payload bytes, received {received}")]
    TruncatedPayload {
        /// Length declared in the header
        declared: usize,
        /// Payload bytes actually received
        received: usize,
    },

    /// Response carried a different command code than the operation expects
    #[error("unexpected reply: expected {expected}, got {got:#04x}")]
    UnexpectedReply {
        /// Code the operation expected
        expected: CommandCode,
        /// Code actually received
        got: u8,
    },

    /// Transport send or receive failure
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Entity operation invoked before `init` completed
    #[error("session not initialized")]
    NotInitialized,

    /// Handle does not match any entry of the current catalog
    #[error("{entity} handle does not match any current catalog entry")]
    StaleHandle {
        /// Catalog the handle was checked against
        entity: &'static str,
    },

    /// Write-class operation on a read-only entity
    #[error("{entity} {index} is not writable")]
    NotWritable {
        /// Entity kind
        entity: &'static str,
        /// Entity id
        index: u8,
    },

    /// Caller-supplied buffer length does not match the entity size
    #[error("value size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch {
        /// Size the entity requires
        expected: usize,
        /// Size the caller supplied
        got: usize,
    },

    /// Group creation requires at least one member variable
    #[error("a group needs at least one member variable")]
    EmptyGroup,

    /// Bitwise operation tag outside the six defined operations
    #[error("unknown bitwise operation tag {tag:#04x}")]
    UnknownBinOp {
        /// Rejected tag byte
        tag: u8,
    },

    /// Curve block offset beyond the curve's block count
    #[error("block offset {offset} out of range (curve has {nblocks} blocks)")]
    OffsetOutOfRange {
        /// Requested offset
        offset: u16,
        /// Blocks the curve holds
        nblocks: u32,
    },

    /// Curve block data longer than the curve's block size
    #[error("block length {len} exceeds curve block size {max}")]
    BlockTooLarge {
        /// Supplied data length
        len: usize,
        /// Curve block size
        max: usize,
    },

    /// Group membership reply referenced a variable id the catalog lacks
    #[error("group {group} reply references unknown variable id {id}")]
    UnknownMember {
        /// Group being refreshed
        group: u8,
        /// Variable id the server reported
        id: u8,
    },

    /// List reply reported more entries than one-byte ids can address
    #[error("{entity} list reports {count} entries (ids are one byte)")]
    CatalogOverflow {
        /// Catalog being refreshed
        entity: &'static str,
        /// Entry count the server reported
        count: usize,
    },

    /// Group catalog came back empty right after a create was acknowledged
    #[error("group catalog is empty after a create acknowledgment")]
    CreatedGroupMissing,
}

impl Error {
    /// Classification of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PayloadTooLarge { .. }
            | Self::NotInitialized
            | Self::StaleHandle { .. }
            | Self::NotWritable { .. }
            | Self::SizeMismatch { .. }
            | Self::EmptyGroup => ErrorKind::InvalidArgument,

            Self::UnknownBinOp { .. }
            | Self::OffsetOutOfRange { .. }
            | Self::BlockTooLarge { .. } => ErrorKind::OutOfRange,

            Self::ResponseTooShort { .. }
            | Self::TruncatedPayload { .. }
            | Self::UnexpectedReply { .. }
            | Self::Transport(_)
            | Self::UnknownMember { .. }
            | Self::CatalogOverflow { .. }
            | Self::CreatedGroupMissing => ErrorKind::Communication,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
