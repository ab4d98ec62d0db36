//! Sync engine error types

use contracts::Timestamp;
use thiserror::Error;

/// Errors raised by the time-indexed buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Timestamp does not advance past the newest inserted entry.
    /// Contract violation of the producing sensor, never retried.
    #[error("out-of-order insertion: timestamp {timestamp} is not after {last}")]
    OutOfOrderInsertion { timestamp: Timestamp, last: Timestamp },

    /// Newest retained sample is older than the requested end. Transient.
    #[error("insufficient data: newest sample {newest:?} is before interval end {end_ts}")]
    InsufficientData {
        newest: Option<Timestamp>,
        end_ts: Timestamp,
    },

    /// Oldest retained sample is newer than the requested start. Permanent.
    #[error("data gap: oldest sample {oldest} is after interval start {start_ts}")]
    DataGap {
        oldest: Timestamp,
        start_ts: Timestamp,
    },

    /// Requested interval ends before it starts
    #[error("invalid interval: start {start_ts} is after end {end_ts}")]
    InvalidInterval {
        start_ts: Timestamp,
        end_ts: Timestamp,
    },
}

impl BufferError {
    /// Whether retrying the same request later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BufferError::InsufficientData { .. })
    }
}

/// Queue control-flow signals. Not failures: `Closed` drives shutdown,
/// `TimedOut` keeps stage loops responsive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue was shut down (and, for pops, fully drained)
    #[error("queue closed")]
    Closed,

    /// No item arrived before the deadline
    #[error("timed out waiting for an item")]
    TimedOut,
}

/// Non-blocking push failure, hands the item back to the caller
#[derive(Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// Bounded queue is at capacity
    Full(T),
    /// Queue was shut down
    Closed(T),
}

impl<T> TryPushError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TryPushError::Closed(_))
    }
}

/// Assembler stop conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssemblerError {
    /// Frontend-bound queue refused the packet
    #[error("frontend queue closed")]
    OutputClosed,

    /// Shutdown observed while waiting for inertial coverage
    #[error("shutdown requested while awaiting inertial coverage")]
    Shutdown,
}
