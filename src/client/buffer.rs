//! Reusable receive buffers sized to the maximum wire frame
//!
//! The exchange path leases one buffer per round trip; dropping the lease
//! returns the allocation to the pool. No buffer outlives its call, so there
//! is no cross-call aliasing and no global state.

use std::sync::{Arc, Mutex};

use crate::protocol::MAX_MESSAGE;

/// Pool of receive buffers, each `MAX_MESSAGE` bytes.
#[derive(Debug, Clone)]
pub(crate) struct FramePool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    frames: Mutex<Vec<Vec<u8>>>,
}

impl FramePool {
    /// Create a pool with one preallocated buffer.
    ///
    /// The protocol is half-duplex, so a session needs exactly one receive
    /// buffer at a time; `acquire` still allocates on demand if the pool is
    /// ever drained.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                frames: Mutex::new(vec![vec![0u8; MAX_MESSAGE]]),
            }),
        }
    }

    /// Lease a buffer from the pool.
    pub fn acquire(&self) -> FrameLease {
        let mut frames = self.inner.frames.lock().expect("frame pool mutex poisoned");
        let data = frames.pop().unwrap_or_else(|| vec![0u8; MAX_MESSAGE]);

        FrameLease {
            data: Some(data),
            pool: Arc::clone(&self.inner),
            len: 0,
        }
    }
}

/// Buffer leased from the pool; returned on drop.
pub(crate) struct FrameLease {
    data: Option<Vec<u8>>,
    pool: Arc<PoolInner>,
    len: usize,
}

impl FrameLease {
    /// Expose the full buffer for the transport to write into.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data
            .as_mut()
            .expect("lease already returned to pool")
            .as_mut_slice()
    }

    /// Record how many bytes the transport filled.
    ///
    /// Counts beyond the buffer capacity violate the adapter contract and are
    /// clamped so later reads stay in bounds.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= MAX_MESSAGE, "adapter returned a count past the buffer");
        self.len = len.min(MAX_MESSAGE);
    }

    /// Expose the filled portion.
    pub fn filled(&self) -> &[u8] {
        let data = self.data.as_ref().expect("lease already returned to pool");
        &data[..self.len]
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            if let Ok(mut frames) = self.pool.frames.lock() {
                frames.push(data);
            }
        }
    }
}
