//! Transport dependency interface

use std::io;

/// Byte transport supplied by the embedding application
///
/// The client hands `send` one fully framed request and expects `receive` to
/// place one full response frame into `buf`, returning the byte count. How
/// bytes move — socket, serial line, in-process call — is the implementor's
/// concern, as is any timeout policy; the client imposes none of its own and
/// blocks until the adapter returns.
///
/// `buf` is always sized to the maximum wire frame, so an adapter never needs
/// to deliver a response in pieces. The returned count must not exceed
/// `buf.len()`.
pub trait Transport {
    /// Send one request frame
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Receive one response frame into `buf`, returning the byte count
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
