//! Relay buffer - bounded FIFO of undelivered inbound messages
//!
//! Producers `append`, a polling consumer `drain_all`s. Both run under one
//! mutex, so a message is either still buffered, handed to exactly one drain,
//! or evicted as the oldest entry on overflow.

use crate::config::DEFAULT_RELAY_CAPACITY;
use crate::error::{Error, Result};
use crate::message::Message;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct RelayBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<Message>>,
}

impl RelayBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecDeque<Message>>> {
        self.queue
            .lock()
            .map_err(|e| Error::BufferUnavailable(e.to_string()))
    }

    /// Add a message at the tail, silently evicting the oldest on overflow.
    ///
    /// Returns the evicted message, if any.
    pub fn append(&self, msg: Message) -> Result<Option<Message>> {
        let mut queue = self.lock()?;
        queue.push_back(msg);

        if queue.len() > self.capacity {
            let evicted = queue.pop_front();
            if let Some(ref old) = evicted {
                debug!("Relay full ({}), evicted {}", self.capacity, old.id);
            }
            return Ok(evicted);
        }

        Ok(None)
    }

    /// Take everything buffered, oldest first, leaving the buffer empty
    pub fn drain_all(&self) -> Result<Vec<Message>> {
        let mut queue = self.lock()?;
        let drained: Vec<Message> = queue.drain(..).collect();
        if !drained.is_empty() {
            debug!("Drained {} messages", drained.len());
        }
        Ok(drained)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Poison the lock by panicking while holding it
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = self.queue.lock();
                    panic!("holder panicked");
                })
                .join();
        });
    }
}

impl Default for RelayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_CAPACITY)
    }
}
