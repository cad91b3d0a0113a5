//! ECP message implementation

use bytes::Bytes;

use super::command::CommandCode;

/// ECP message: one command code and its payload
///
/// Requests are built from a [`CommandCode`]; decoded responses keep the raw
/// code byte so a reply outside the known code set can still be inspected and
/// reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Command code byte
    code: u8,
    /// Message payload
    payload: Bytes,
}

impl Message {
    /// Create a new request message
    pub fn new(code: CommandCode, payload: impl Into<Bytes>) -> Self {
        Self {
            code: code.as_u8(),
            payload: payload.into(),
        }
    }

    /// Assemble a message from a decoded code byte and payload
    pub(crate) fn from_parts(code: u8, payload: Bytes) -> Self {
        Self { code, payload }
    }

    /// Get the raw command code byte
    #[must_use]
    pub const fn code(&self) -> u8 {
        self.code
    }

    /// Get the command code, if the byte is a known code
    #[must_use]
    pub fn command(&self) -> Option<CommandCode> {
        CommandCode::from_u8(self.code)
    }

    /// Check whether this message carries the given command code
    #[must_use]
    pub fn is(&self, code: CommandCode) -> bool {
        self.code == code.as_u8()
    }

    /// Get payload
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Encode message to bytes
    pub fn encode(&self) -> super::Result<Vec<u8>> {
        super::encode(self)
    }

    /// Decode message from bytes
    pub fn decode(bytes: &[u8]) -> super::Result<Self> {
        super::decode(bytes)
    }
}
