//! Blocking handoff between producer and consumer threads.
//!
//! `MessageQueue` is a mailbox, not a FIFO. `receive` hands out the most
//! recently sent message and throws away everything older that is still
//! buffered. If a producer sends A, B, C before any consumer wakes up, the
//! consumer gets C, and A and B are gone for good.
//!
//! That is what a phase notification wants: a waiter only cares about the
//! latest state of the light, never about the ones it slept through.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Mailbox-style blocking queue. Clones share the same buffer.
pub struct MessageQueue<T> {
    pair: Arc<(Mutex<VecDeque<T>>, Condvar)>,
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        MessageQueue {
            pair: Arc::new((Mutex::new(VecDeque::new()), Condvar::new())),
        }
    }

    /// Appends `msg` and wakes one waiting consumer. Never blocks beyond
    /// taking the lock.
    pub fn send(&self, msg: T) {
        let (_, cvar) = &*self.pair;
        let mut queue = self.lock();
        queue.push_back(msg);
        drop(queue);
        cvar.notify_one();
    }

    /// Blocks until the queue is non-empty, then returns the newest message
    /// and drains the rest.
    pub fn receive(&self) -> T {
        let (_, cvar) = &*self.pair;
        let mut queue = self.lock();
        // re-checked after every wake-up, spurious ones included
        loop {
            if let Some(msg) = Self::take_latest(&mut queue) {
                return msg;
            }
            queue = cvar.wait(queue).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `receive`, but gives up after `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let (_, cvar) = &*self.pair;
        let queue = self.lock();
        let (mut queue, _) = cvar
            .wait_timeout_while(queue, timeout, |queue| queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        Self::take_latest(&mut queue)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take_latest(queue: &mut VecDeque<T>) -> Option<T> {
        let latest = queue.pop_back();
        queue.clear();
        latest
    }

    // Pushes and drains cannot be observed half done, so a poisoned guard
    // still holds a consistent buffer.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        let (lock, _) = &*self.pair;
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for MessageQueue<T> {
    fn clone(&self) -> Self {
        MessageQueue {
            pair: self.pair.clone(),
        }
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
