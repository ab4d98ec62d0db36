//! Bounded time-indexed buffer for auxiliary streams (reference poses).
//!
//! - HeapRb holds `(timestamp, value)` pairs in insertion order
//! - Full buffer evicts exactly the oldest entry per insert
//! - Optional span limit evicts entries older than `newest - max_span`

use std::fmt;

use contracts::{TemporalBufferConfig, Timestamp};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};

use crate::error::BufferError;
use crate::interpolate::interpolate_at;

struct TemporalInner<V> {
    ring: HeapRb<(Timestamp, V)>,
    newest: Option<Timestamp>,
    evicted: u64,
}

impl<V> TemporalInner<V> {
    fn oldest(&self) -> Option<Timestamp> {
        self.ring.iter().next().map(|(ts, _)| *ts)
    }
}

/// Thread-safe bounded buffer of timestamped values
pub struct TemporalBuffer<V> {
    inner: Mutex<TemporalInner<V>>,
    max_entries: usize,
    max_span: Option<Timestamp>,
}

impl<V> fmt::Debug for TemporalBuffer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TemporalBuffer")
            .field("len", &inner.ring.occupied_len())
            .field("max_entries", &self.max_entries)
            .field("max_span", &self.max_span)
            .field("evicted", &inner.evicted)
            .finish()
    }
}

impl<V> TemporalBuffer<V> {
    /// Buffer retaining at most `max_entries` values (minimum 1), optionally
    /// also bounded to `max_span` nanoseconds behind the newest entry.
    pub fn new(max_entries: usize, max_span: Option<Timestamp>) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            inner: Mutex::new(TemporalInner {
                ring: HeapRb::new(max_entries),
                newest: None,
                evicted: 0,
            }),
            max_entries,
            max_span,
        }
    }

    pub fn from_config(config: &TemporalBufferConfig) -> Self {
        Self::new(config.max_entries, config.max_span_ns())
    }

    /// Insert a value with a strictly increasing timestamp
    pub fn insert(&self, timestamp: Timestamp, value: V) -> Result<(), BufferError> {
        let mut inner = self.inner.lock();
        if let Some(last) = inner.newest {
            if timestamp <= last {
                return Err(BufferError::OutOfOrderInsertion { timestamp, last });
            }
        }

        let mut evicted = 0u64;
        if inner.ring.is_full() && inner.ring.try_pop().is_some() {
            evicted += 1;
        }
        let _ = inner.ring.try_push((timestamp, value));
        inner.newest = Some(timestamp);

        if let Some(span) = self.max_span {
            while inner
                .oldest()
                .is_some_and(|oldest| timestamp.abs_diff(oldest) > span.unsigned_abs())
            {
                if inner.ring.try_pop().is_some() {
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            inner.evicted += evicted;
            metrics::counter!("vio_sync_temporal_evictions_total").increment(evicted);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.inner.lock().oldest()
    }

    /// Newest retained timestamp (None when empty)
    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        let inner = self.inner.lock();
        if inner.ring.is_empty() {
            None
        } else {
            inner.newest
        }
    }

    /// Entries removed by capacity or span eviction
    pub fn evicted_count(&self) -> u64 {
        self.inner.lock().evicted
    }

    /// Drop every entry. Ordering against earlier timestamps is still enforced.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        while inner.ring.try_pop().is_some() {}
    }
}

impl<V: Clone> TemporalBuffer<V> {
    /// Value whose timestamp is closest to `timestamp`.
    /// On a tie the earlier entry wins. None only when empty.
    pub fn get_nearest(&self, timestamp: Timestamp) -> Option<V> {
        let inner = self.inner.lock();
        let mut best: Option<(u64, &V)> = None;
        for (ts, value) in inner.ring.iter() {
            let distance = ts.abs_diff(timestamp);
            match best {
                Some((best_distance, _)) if distance >= best_distance => {
                    // Sorted ascending: once distance grows, it only grows
                    if ts > &timestamp {
                        break;
                    }
                }
                _ => best = Some((distance, value)),
            }
        }
        best.map(|(_, value)| value.clone())
    }

    /// Newest `(timestamp, value)` pair
    pub fn latest(&self) -> Option<(Timestamp, V)> {
        let inner = self.inner.lock();
        inner.ring.iter().last().cloned()
    }

    /// Copy of every retained entry, oldest first
    pub fn snapshot(&self) -> Vec<(Timestamp, V)> {
        self.inner.lock().ring.iter().cloned().collect()
    }
}

impl<V: Clone + crate::interpolate::Interpolate> TemporalBuffer<V> {
    /// Value at `timestamp`: exact match, or a blend of the two bracketing
    /// entries. None when `timestamp` is outside the retained span.
    pub fn get_interpolated(&self, timestamp: Timestamp) -> Option<V> {
        let inner = self.inner.lock();
        let mut before: Option<&(Timestamp, V)> = None;
        for entry in inner.ring.iter() {
            let (ts, value) = entry;
            if *ts == timestamp {
                return Some(value.clone());
            }
            if *ts > timestamp {
                let (t0, v0) = before?;
                return Some(interpolate_at(*t0, v0, *ts, value, timestamp));
            }
            before = Some(entry);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PoseReference;
    use nalgebra::{UnitQuaternion, Vector3};

    fn pose_x(x: f64) -> PoseReference {
        PoseReference::new(Vector3::new(x, 0.0, 0.0), UnitQuaternion::identity())
    }

    #[test]
    fn test_capacity_eviction_drops_single_oldest() {
        let buffer = TemporalBuffer::new(3, None);
        for ts in [10, 20, 30] {
            buffer.insert(ts, ts as f64).unwrap();
        }
        assert_eq!(buffer.len(), 3);

        buffer.insert(40, 40.0).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest_timestamp(), Some(20));
        assert_eq!(buffer.newest_timestamp(), Some(40));
        assert_eq!(buffer.evicted_count(), 1);
        assert_eq!(
            buffer.snapshot(),
            vec![(20, 20.0), (30, 30.0), (40, 40.0)]
        );
    }

    #[test]
    fn test_span_eviction() {
        let buffer = TemporalBuffer::new(100, Some(25));
        for ts in [0, 10, 20, 30, 40] {
            buffer.insert(ts, ts as f64).unwrap();
        }
        // 40 - 10 > 25, 40 - 20 <= 25
        assert_eq!(buffer.oldest_timestamp(), Some(20));
        assert_eq!(buffer.evicted_count(), 2);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let buffer = TemporalBuffer::new(4, None);
        buffer.insert(10, 1.0).unwrap();
        assert_eq!(
            buffer.insert(10, 2.0),
            Err(BufferError::OutOfOrderInsertion {
                timestamp: 10,
                last: 10
            })
        );
        assert!(buffer.insert(5, 2.0).is_err());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_get_nearest() {
        let buffer = TemporalBuffer::new(8, None);
        for ts in [0, 10, 20] {
            buffer.insert(ts, ts).unwrap();
        }

        assert_eq!(buffer.get_nearest(-100), Some(0));
        assert_eq!(buffer.get_nearest(12), Some(10));
        assert_eq!(buffer.get_nearest(17), Some(20));
        assert_eq!(buffer.get_nearest(500), Some(20));
        // Tie goes to the earlier entry
        assert_eq!(buffer.get_nearest(15), Some(10));
    }

    #[test]
    fn test_get_nearest_extreme_timestamps() {
        let buffer = TemporalBuffer::new(8, Some(1_000));
        buffer.insert(-10, 1).unwrap();
        buffer.insert(10, 2).unwrap();

        assert_eq!(buffer.get_nearest(i64::MIN), Some(1));
        assert_eq!(buffer.get_nearest(i64::MAX), Some(2));

        // Span check must not overflow across the full range either
        buffer.insert(i64::MAX, 3).unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get_nearest(i64::MIN), Some(3));
    }

    #[test]
    fn test_get_nearest_empty() {
        let buffer: TemporalBuffer<f64> = TemporalBuffer::new(8, None);
        assert_eq!(buffer.get_nearest(0), None);
        assert_eq!(buffer.latest(), None);
    }

    #[test]
    fn test_get_interpolated_pose() {
        let buffer = TemporalBuffer::new(8, None);
        buffer.insert(0, pose_x(0.0)).unwrap();
        buffer.insert(100, pose_x(1.0)).unwrap();

        let mid = buffer.get_interpolated(25).unwrap();
        assert!((mid.position.x - 0.25).abs() < 1e-12);
        assert_eq!(buffer.get_interpolated(100), Some(pose_x(1.0)));

        assert_eq!(buffer.get_interpolated(-1), None);
        assert_eq!(buffer.get_interpolated(101), None);
    }

    #[test]
    fn test_clear_keeps_ordering() {
        let buffer = TemporalBuffer::new(4, None);
        buffer.insert(10, 1.0).unwrap();
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.newest_timestamp(), None);
        assert!(buffer.insert(5, 0.5).is_err());
        buffer.insert(20, 2.0).unwrap();
        assert_eq!(buffer.latest(), Some((20, 2.0)));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let buffer = TemporalBuffer::new(0, None);
        buffer.insert(1, 'a').unwrap();
        buffer.insert(2, 'b').unwrap();
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.get_nearest(0), Some('b'));
    }
}
