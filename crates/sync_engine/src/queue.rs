//! Blocking handoff queue between pipeline stages.
//!
//! A mutex-guarded `VecDeque` with two condition variables. Producers block
//! while a bounded queue is full, consumers block while it is empty, and
//! `shutdown` wakes every waiter. After shutdown, pops keep draining whatever
//! is still queued and only then report `Closed`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use contracts::QueueCapacity;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{QueueError, TryPushError};

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer multi-consumer FIFO with blocking push/pop and shutdown
pub struct BlockingQueue<T> {
    name: String,
    capacity: Option<usize>,
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Queue holding at most `capacity` items (minimum 1)
    pub fn bounded(name: impl Into<String>, capacity: usize) -> Self {
        Self::new(name.into(), Some(capacity.max(1)))
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name.into(), None)
    }

    /// Build from a configured capacity
    pub fn from_capacity(name: impl Into<String>, capacity: QueueCapacity) -> Self {
        match capacity.limit() {
            Some(limit) => Self::bounded(name, limit),
            None => Self::unbounded(name),
        }
    }

    fn new(name: String, capacity: Option<usize>) -> Self {
        Self {
            name,
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.unwrap_or(0)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn at_capacity(&self, state: &QueueState<T>) -> bool {
        self.capacity
            .is_some_and(|capacity| state.items.len() >= capacity)
    }

    /// Append an item, blocking while the queue is full.
    ///
    /// Returns `Closed` if the queue is (or becomes) shut down before the
    /// item could be enqueued. The item is dropped in that case.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(QueueError::Closed);
            }
            if !self.at_capacity(&state) {
                break;
            }
            self.not_full.wait(&mut state);
        }

        state.items.push_back(item);
        let depth = state.items.len();
        drop(state);

        self.not_empty.notify_one();
        observability::record_queue_depth(&self.name, depth);
        Ok(())
    }

    /// Append without blocking
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TryPushError::Closed(item));
        }
        if self.at_capacity(&state) {
            return Err(TryPushError::Full(item));
        }

        state.items.push_back(item);
        let depth = state.items.len();
        drop(state);

        self.not_empty.notify_one();
        observability::record_queue_depth(&self.name, depth);
        Ok(())
    }

    /// Remove the oldest item, blocking until one is available.
    ///
    /// Returns `Closed` once the queue is shut down and empty.
    pub fn pop(&self) -> Result<T, QueueError> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(self.after_pop(state, item));
            }
            if state.closed {
                return Err(QueueError::Closed);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Like [`pop`](Self::pop), but gives up with `TimedOut` after `timeout`
    pub fn pop_with_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(self.after_pop(state, item));
            }
            if state.closed {
                return Err(QueueError::Closed);
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                return match state.items.pop_front() {
                    Some(item) => Ok(self.after_pop(state, item)),
                    None if state.closed => Err(QueueError::Closed),
                    None => Err(QueueError::TimedOut),
                };
            }
        }
    }

    /// Remove the oldest item if one is immediately available
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = state.items.pop_front()?;
        Some(self.after_pop(state, item))
    }

    fn after_pop(&self, state: parking_lot::MutexGuard<'_, QueueState<T>>, item: T) -> T {
        let depth = state.items.len();
        drop(state);
        self.not_full.notify_one();
        observability::record_queue_depth(&self.name, depth);
        item
    }

    /// Close the queue and wake every blocked producer and consumer.
    ///
    /// Idempotent. Items already queued stay poppable.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let remaining = state.items.len();
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        debug!(queue = %self.name, remaining, "Queue shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// `None` for unbounded queues
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BlockingQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}
