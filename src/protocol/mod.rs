//! ECP protocol core implementation
//!
//! This module provides the wire format, command codes, and codec for ECP
//! frames. A frame is a one-byte command code, a 16-bit big-endian payload
//! length, and the payload itself.

mod codec;
mod command;
mod error;
mod message;

pub use codec::{decode, encode};
pub use command::{BinOp, CommandCode};
pub use error::{Error, ErrorKind, Result};
pub use message::Message;

/// Header size in bytes: command code plus 16-bit payload length.
pub const HEADER_SIZE: usize = 3;

/// Maximum payload size declarable by the 16-bit length field.
pub const MAX_PAYLOAD: usize = 65_535;

/// Maximum total frame size (header + payload).
pub const MAX_MESSAGE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Writable bit in packed variable and group list bytes.
pub const WRITABLE_MASK: u8 = 0x80;

/// Size field bits in packed variable and group list bytes.
pub const SIZE_MASK: u8 = 0x7F;

/// Maximum variable size in bytes; a wire size field of 0 encodes this.
pub const VAR_MAX_SIZE: usize = 128;

/// Bytes per curve record in a curve-list response.
pub const CURVE_LIST_ENTRY: usize = 5;

/// Curve-block payload prefix: curve id plus 16-bit block offset.
pub const CURVE_BLOCK_INFO: usize = 3;

/// Maximum number of blocks in a curve; a wire value of 0 encodes this.
pub const CURVE_MAX_BLOCKS: u32 = 65_536;

/// Curve checksum width in bytes.
pub const CURVE_CSUM_SIZE: usize = 16;

/// Maximum function input/output size; both are 4-bit fields on the wire.
pub const FUNC_MAX_SIZE: usize = 15;
