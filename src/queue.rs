//! Bounded, age-pruned queue of encoded payload entries for one tenant/kind.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::buffer_pool::BufferPool;
use crate::condition::Condition;

/// Limits enforced on every mutation, in this order: item count, byte
/// count, then age. A zero limit disables that dimension.
#[derive(Debug, Clone, Copy)]
pub struct QueueLimits {
    pub max_items: usize,
    pub max_bytes: usize,
    pub max_age: Duration,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self { max_items: 10_000, max_bytes: 64 * 1024 * 1024, max_age: Duration::from_secs(300) }
    }
}

pub struct QueueEntry {
    pub data: Bytes,
    pub inserted_at: Instant,
}

/// FIFO queue bounded by item count, byte count, and maximum age, with a
/// condition that wakes a waiting sending loop on every insert or requeue.
pub struct BoundedQueue {
    inner: std::sync::Mutex<VecDeque<QueueEntry>>,
    limits: QueueLimits,
    condition: Condition,
    dropped: AtomicU64,
    pool: Arc<BufferPool>,
}

impl BoundedQueue {
    pub fn new(limits: QueueLimits, pool: Arc<BufferPool>) -> Self {
        Self {
            inner: std::sync::Mutex::new(VecDeque::new()),
            limits,
            condition: Condition::new(),
            dropped: AtomicU64::new(0),
            pool,
        }
    }

    /// Appends one entry, then enforces limits, evicting from the front
    /// (oldest first) as needed.
    pub fn insert(&self, data: Bytes) {
        let mut guard = self.inner.lock().unwrap();
        guard.push_back(QueueEntry { data, inserted_at: Instant::now() });
        self.apply_limits(&mut guard);
        drop(guard);
        self.condition.signal();
    }

    /// Pushes previously dequeued entries back onto the front, preserving
    /// their original relative order, then enforces limits.
    pub fn requeue(&self, entries: Vec<QueueEntry>) {
        let mut guard = self.inner.lock().unwrap();
        for entry in entries.into_iter().rev() {
            guard.push_front(entry);
        }
        self.apply_limits(&mut guard);
        drop(guard);
        self.condition.signal();
    }

    /// Removes and returns the longest prefix whose total size does not
    /// exceed `max_push_bytes`, always taking at least one entry if the
    /// queue is non-empty.
    pub fn get(&self, max_push_bytes: usize) -> Vec<QueueEntry> {
        let mut guard = self.inner.lock().unwrap();
        let mut total = 0usize;
        let mut count = 0usize;
        for entry in guard.iter() {
            if count > 0 && total + entry.data.len() > max_push_bytes {
                break;
            }
            total += entry.data.len();
            count += 1;
        }
        let taken: Vec<_> = guard.drain(..count).collect();
        let remaining = !guard.is_empty();
        drop(guard);
        if remaining {
            self.condition.signal();
        }
        taken
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    fn apply_limits(&self, guard: &mut VecDeque<QueueEntry>) {
        let mut evicted = 0u64;

        if self.limits.max_items > 0 {
            while guard.len() > self.limits.max_items {
                if let Some(entry) = guard.pop_front() {
                    self.pool.release(entry.data);
                    evicted += 1;
                }
            }
        }

        if self.limits.max_bytes > 0 {
            let mut total: usize = guard.iter().map(|e| e.data.len()).sum();
            while total > self.limits.max_bytes {
                match guard.pop_front() {
                    Some(entry) => {
                        total -= entry.data.len();
                        self.pool.release(entry.data);
                        evicted += 1;
                    }
                    None => break,
                }
            }
        }

        if !self.limits.max_age.is_zero() {
            if let Some(cutoff) = Instant::now().checked_sub(self.limits.max_age) {
                let stale = guard.partition_point(|e| e.inserted_at < cutoff);
                for _ in 0..stale {
                    if let Some(entry) = guard.pop_front() {
                        self.pool.release(entry.data);
                        evicted += 1;
                    }
                }
            }
        }

        if evicted > 0 {
            self.dropped.fetch_add(evicted, Ordering::Relaxed);
        }
    }
}
