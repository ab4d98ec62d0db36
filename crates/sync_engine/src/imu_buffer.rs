//! Thread-safe inertial sample buffer with interval extraction.
//!
//! Samples are kept in strictly increasing timestamp order. Extraction
//! returns the samples covering `[start, end]`, with the two boundary samples
//! synthesised by linear interpolation when no sample sits exactly on them,
//! and then purges everything the next extraction can no longer need.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use contracts::{InertialSample, Timestamp};
use parking_lot::{Condvar, Mutex};

use crate::error::BufferError;
use crate::interpolate::interpolate_at;

#[derive(Default)]
struct BufferState {
    samples: VecDeque<InertialSample>,
    last_inserted: Option<Timestamp>,
    low_water_mark: Option<Timestamp>,
    finished: bool,
    inserted_total: u64,
    purged_total: u64,
}

/// Buffer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InertialBufferStats {
    /// Samples currently retained
    pub len: usize,
    pub oldest: Option<Timestamp>,
    pub newest: Option<Timestamp>,
    /// Start of the most recent successful extraction
    pub low_water_mark: Option<Timestamp>,
    pub inserted_total: u64,
    pub purged_total: u64,
    /// Producer signalled end of stream
    pub finished: bool,
}

/// Inertial sample buffer shared by the ingestion thread (writer) and the
/// assembler (reader).
///
/// Every operation is atomic with respect to the others. Waiters blocked in
/// [`wait_for_coverage`](Self::wait_for_coverage) are woken on each insert.
#[derive(Default)]
pub struct InertialSampleBuffer {
    state: Mutex<BufferState>,
    arrived: Condvar,
}

impl InertialSampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample.
    ///
    /// Fails with `OutOfOrderInsertion` unless the timestamp is strictly
    /// greater than every previously inserted one (purged samples included).
    /// The buffer is left unchanged on failure.
    pub fn insert(&self, sample: InertialSample) -> Result<(), BufferError> {
        let mut state = self.state.lock();
        if let Some(last) = state.last_inserted {
            if sample.timestamp <= last {
                return Err(BufferError::OutOfOrderInsertion {
                    timestamp: sample.timestamp,
                    last,
                });
            }
        }

        state.samples.push_back(sample);
        state.last_inserted = Some(sample.timestamp);
        state.inserted_total += 1;
        drop(state);

        self.arrived.notify_all();
        Ok(())
    }

    /// Extract the samples covering `[start_ts, end_ts]`.
    ///
    /// On success the first sample is stamped exactly `start_ts`, the last
    /// exactly `end_ts` (a single sample when they are equal), and everything
    /// between is the retained samples strictly inside the interval. Samples
    /// older than `start_ts` are then purged, except the newest of them when
    /// it is still needed to interpolate `start_ts`, so repeating the same
    /// call yields the same result.
    ///
    /// Errors leave the buffer unchanged:
    /// - `InvalidInterval` when `start_ts > end_ts`
    /// - `DataGap` when the oldest retained sample is after `start_ts`, or
    ///   `start_ts` is below the low-water mark left by an earlier extraction
    /// - `InsufficientData` when the buffer is empty or its newest sample is
    ///   before `end_ts`
    pub fn extract_interval(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> Result<Vec<InertialSample>, BufferError> {
        if start_ts > end_ts {
            return Err(BufferError::InvalidInterval { start_ts, end_ts });
        }

        let mut state = self.state.lock();
        let samples = &state.samples;
        let (oldest, newest) = match (samples.front(), samples.back()) {
            (Some(oldest), Some(newest)) => (oldest.timestamp, newest.timestamp),
            _ => {
                return Err(BufferError::InsufficientData {
                    newest: None,
                    end_ts,
                })
            }
        };

        // Everything before the last extraction start has been consumed
        if let Some(mark) = state.low_water_mark {
            if start_ts < mark {
                return Err(BufferError::DataGap {
                    oldest: mark,
                    start_ts,
                });
            }
        }
        // A gap is permanent, so it wins over a transient shortage
        if oldest > start_ts {
            return Err(BufferError::DataGap { oldest, start_ts });
        }
        if newest < end_ts {
            return Err(BufferError::InsufficientData {
                newest: Some(newest),
                end_ts,
            });
        }

        // oldest <= start <= end <= newest from here on
        let first = samples.partition_point(|s| s.timestamp < start_ts);
        let start_exact = samples[first].timestamp == start_ts;

        let mut interval = Vec::new();
        interval.push(sample_at(samples, first, start_ts));
        interval.extend(
            samples
                .iter()
                .skip(first)
                .skip_while(|s| s.timestamp <= start_ts)
                .take_while(|s| s.timestamp < end_ts)
                .copied(),
        );
        if end_ts > start_ts {
            let last = samples.partition_point(|s| s.timestamp < end_ts);
            interval.push(sample_at(samples, last, end_ts));
        }

        // Keep the left bracket of start_ts when it had to be interpolated
        let keep_from = if start_exact { first } else { first - 1 };
        state.samples.drain(..keep_from);
        state.purged_total += keep_from as u64;
        state.low_water_mark = Some(
            state
                .low_water_mark
                .map_or(start_ts, |mark| mark.max(start_ts)),
        );

        Ok(interval)
    }

    /// Block until a sample at or after `ts` is present, the stream is marked
    /// finished, or `timeout` elapses. Returns whether `ts` is covered.
    ///
    /// The buffer lock is released while waiting.
    pub fn wait_for_coverage(&self, ts: Timestamp, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.last_inserted.is_some_and(|last| last >= ts) {
                return true;
            }
            if state.finished {
                return false;
            }
            if self.arrived.wait_until(&mut state, deadline).timed_out() {
                return state.last_inserted.is_some_and(|last| last >= ts);
            }
        }
    }

    /// Signal that no further samples will be inserted
    pub fn mark_finished(&self) {
        self.state.lock().finished = true;
        self.arrived.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Wake every waiter without changing state
    pub fn notify_waiters(&self) {
        self.arrived.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().samples.is_empty()
    }

    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.state.lock().samples.back().map(|s| s.timestamp)
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.state.lock().samples.front().map(|s| s.timestamp)
    }

    pub fn stats(&self) -> InertialBufferStats {
        let state = self.state.lock();
        InertialBufferStats {
            len: state.samples.len(),
            oldest: state.samples.front().map(|s| s.timestamp),
            newest: state.samples.back().map(|s| s.timestamp),
            low_water_mark: state.low_water_mark,
            inserted_total: state.inserted_total,
            purged_total: state.purged_total,
            finished: state.finished,
        }
    }
}

/// Sample at `ts`, where `idx` is the first retained sample with timestamp >= `ts`.
/// Exact hit is returned as-is, otherwise interpolated from `idx - 1` and `idx`.
fn sample_at(samples: &VecDeque<InertialSample>, idx: usize, ts: Timestamp) -> InertialSample {
    let after = samples[idx];
    if after.timestamp == ts {
        return after;
    }
    let before = samples[idx - 1];
    interpolate_at(before.timestamp, &before, after.timestamp, &after, ts).with_timestamp(ts)
}
