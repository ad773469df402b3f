//! Reusable byte-buffer pool for encoded payloads.
//!
//! Buffers are handed out as growable [`BytesMut`] for encoding, then
//! frozen into [`Bytes`] for queueing. When a queue entry is dropped or
//! evicted we try to reclaim the underlying allocation (only possible when
//! no other clone of the `Bytes` is still alive) rather than paying for a
//! fresh allocation on every publish.

use std::sync::Mutex;

use bytes::{Bytes, BytesMut};

pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self { free: Mutex::new(Vec::new()) }
    }

    /// Hands out a buffer, reusing one from the pool when available.
    pub fn acquire(&self) -> BytesMut {
        self.free.lock().unwrap().pop().unwrap_or_default()
    }

    /// Returns a buffer's allocation to the pool, if it's still uniquely
    /// owned. Otherwise the allocation is dropped normally.
    pub fn release(&self, bytes: Bytes) {
        if let Ok(mut buf) = bytes.try_into_mut() {
            buf.clear();
            self.free.lock().unwrap().push(buf);
        }
    }

    pub fn len(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
