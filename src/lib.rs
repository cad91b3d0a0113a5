//! ECP (Entity Control Protocol) - client library for embedded device servers
//!
//! This library implements the client side of ECP, a compact binary
//! request/response protocol for discovering and manipulating the four entity
//! kinds an ECP server exposes: Variables, Groups, Curves, and Functions.
//! The client owns framing, the session-initialization sequence, the cached
//! entity catalogs, and the validation that keeps bad requests off the wire;
//! moving bytes is delegated to a [`Transport`] supplied by the embedding
//! application.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::io;
//! use ecp::{Client, Transport};
//!
//! struct Serial; // wraps whatever medium reaches the device
//!
//! impl Transport for Serial {
//!     fn send(&mut self, frame: &[u8]) -> io::Result<()> {
//!         unimplemented!("write one frame to the device")
//!     }
//!     fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
//!         unimplemented!("read one reply into buf")
//!     }
//! }
//!
//! let mut client = Client::new(Serial);
//! client.init()?;
//!
//! println!("server speaks v{}", client.version());
//! let var = client.variables()[0];
//! let value = client.read_variable(&var)?;
//! # Ok::<(), ecp::Error>(())
//! ```
//!
//! # Features
//!
//! - **Bounds-checked codec** - wire length fields are never trusted as copy
//!   bounds
//! - **Generation-tagged catalogs** - handles from a superseded catalog fail
//!   membership checks instead of aliasing rebuilt entries
//! - **Client-side validation** - read-only, range, and membership violations
//!   are rejected before any byte reaches the transport
//! - **Transport-agnostic** - sockets, serial lines, or in-process calls via
//!   one two-method trait

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]

pub mod client;
pub mod protocol;

pub use client::{
    Client, Curve, CurveChecksum, Function, FunctionOutcome, Group, Transport, Variable, Version,
};
pub use protocol::{BinOp, CommandCode, Error, ErrorKind, Message, Result};
