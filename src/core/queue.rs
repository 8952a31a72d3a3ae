//! Inbound byte queue
//!
//! Bounded FIFO shared between a channel's reader thread (producer) and the
//! session's foreground thread (consumer).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Thread-safe bounded byte FIFO
pub struct ByteQueue {
    inner: Mutex<VecDeque<u8>>,
    available: Condvar,
    capacity: usize,
}

impl ByteQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            available: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        // A panicking producer must not take the consumer down with it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push a single byte. Returns false when the queue is full.
    pub fn push(&self, byte: u8) -> bool {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(byte);
        drop(queue);
        self.available.notify_one();
        true
    }

    /// Push as many bytes as fit; returns the number accepted.
    pub fn push_slice(&self, bytes: &[u8]) -> usize {
        let mut queue = self.lock();
        let room = self.capacity.saturating_sub(queue.len());
        let accepted = bytes.len().min(room);
        queue.extend(&bytes[..accepted]);
        drop(queue);
        if accepted > 0 {
            self.available.notify_all();
        }
        accepted
    }

    /// Pop one byte without blocking
    pub fn try_pop(&self) -> Option<u8> {
        self.lock().pop_front()
    }

    /// Pop up to `max` bytes without blocking
    pub fn pop_many(&self, max: usize) -> Vec<u8> {
        let mut queue = self.lock();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Pop one byte, waiting at most `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<u8> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if let Some(byte) = queue.pop_front() {
                return Some(byte);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            queue = match self.available.wait_timeout(queue, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// True when at least one byte is waiting
    pub fn has_data(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard everything queued
    pub fn clear(&self) {
        self.lock().clear();
    }
}
