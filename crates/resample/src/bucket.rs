//! Fixed-width time buckets for one group.
//!
//! Buckets are left-closed and aligned to a global origin so that bucket
//! keys are comparable across groups.

use icu_core::{ts_to_bucket, Frequency, TimestampMs};
use std::collections::BTreeMap;

/// Assigns the rows of one group to fixed-width buckets.
pub struct BucketGrid {
    width_ms: i64,
    origin_ms: TimestampMs,
    /// Row positions per bucket start, in insertion order.
    buckets: BTreeMap<TimestampMs, Vec<usize>>,
}

impl BucketGrid {
    /// Create a grid aligned to the Unix epoch.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            width_ms: frequency.width_ms(),
            origin_ms: 0,
            buckets: BTreeMap::new(),
        }
    }

    /// Add a row observed at `ts_ms`.
    pub fn add_row(&mut self, ts_ms: TimestampMs, row: usize) {
        let start = ts_to_bucket(ts_ms, self.width_ms, self.origin_ms);
        self.buckets.entry(start).or_default().push(row);
    }

    /// First and last occupied bucket starts.
    pub fn span(&self) -> Option<(TimestampMs, TimestampMs)> {
        let first = *self.buckets.keys().next()?;
        let last = *self.buckets.keys().next_back()?;
        Some((first, last))
    }

    /// Every bucket from the first to the last occupied one, with its rows.
    ///
    /// Buckets that received no rows are included with an empty slice.
    pub fn complete(&self) -> Vec<(TimestampMs, &[usize])> {
        let Some((first, last)) = self.span() else {
            return Vec::new();
        };

        let count = ((last - first) / self.width_ms + 1) as usize;
        let mut out = Vec::with_capacity(count);
        let mut start = first;
        while start <= last {
            let rows = self.buckets.get(&start).map(Vec::as_slice).unwrap_or(&[]);
            out.push((start, rows));
            start += self.width_ms;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;

    #[test]
    fn test_single_row() {
        let mut grid = BucketGrid::new(Frequency::HOUR);
        grid.add_row(HOUR + 30 * 60_000, 0);

        let buckets = grid.complete();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0], (HOUR, &[0usize][..]));
    }

    #[test]
    fn test_left_closed() {
        let mut grid = BucketGrid::new(Frequency::HOUR);
        grid.add_row(HOUR - 1, 0);
        grid.add_row(HOUR, 1);

        let buckets = grid.complete();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], (0, &[0usize][..]));
        assert_eq!(buckets[1], (HOUR, &[1usize][..]));
    }

    #[test]
    fn test_gaps_are_filled() {
        let mut grid = BucketGrid::new(Frequency::HOUR);
        grid.add_row(0, 0);
        grid.add_row(3 * HOUR + 10, 1);

        let buckets = grid.complete();
        let starts: Vec<_> = buckets.iter().map(|(s, _)| *s).collect();
        assert_eq!(starts, vec![0, HOUR, 2 * HOUR, 3 * HOUR]);
        assert!(buckets[1].1.is_empty());
        assert!(buckets[2].1.is_empty());
        assert_eq!(buckets[3].1, &[1usize]);
    }

    #[test]
    fn test_rows_keep_insertion_order() {
        let mut grid = BucketGrid::new(Frequency::HOUR);
        grid.add_row(10, 2);
        grid.add_row(20, 0);
        grid.add_row(30, 1);

        assert_eq!(grid.complete()[0].1, &[2, 0, 1]);
    }

    #[test]
    fn test_before_epoch() {
        let mut grid = BucketGrid::new(Frequency::HOUR);
        grid.add_row(-1, 0);
        assert_eq!(grid.span(), Some((-HOUR, -HOUR)));
    }

    #[test]
    fn test_empty_grid() {
        let grid = BucketGrid::new(Frequency::HOUR);
        assert_eq!(grid.span(), None);
        assert!(grid.complete().is_empty());
    }
}
