//! Fixed-step time index shared by every series in a snapshot.
//!
//! All series of a [`crate::snapshot::ResultsSnapshot`] are aligned to one
//! strictly increasing, fixed-step index. The index is stored as a start
//! timestamp, a step and a length rather than a vector of timestamps, which
//! makes misalignment impossible to represent and keeps comparisons cheap.

use chrono::{Duration, NaiveDateTime};

use crate::error::{ExpostError, ExpostResult};

/// Strictly increasing, fixed-step sequence of timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeIndex {
    start: NaiveDateTime,
    step: Duration,
    len: usize,
}

impl TimeIndex {
    /// Create a new index. The step must be strictly positive.
    pub fn new(start: NaiveDateTime, step: Duration, len: usize) -> ExpostResult<Self> {
        if step <= Duration::zero() {
            return Err(ExpostError::Validation(format!(
                "time step must be strictly positive, got {}",
                step
            )));
        }
        Ok(Self { start, step, len })
    }

    /// Convenience constructor for an hourly index.
    pub fn hourly(start: NaiveDateTime, len: usize) -> Self {
        Self {
            start,
            step: Duration::hours(1),
            len,
        }
    }

    /// Build an index from explicit timestamps, validating that they are
    /// strictly increasing with a constant step.
    pub fn from_timestamps(timestamps: &[NaiveDateTime]) -> ExpostResult<Self> {
        match timestamps {
            [] => Err(ExpostError::Structure(
                "time index cannot be built from an empty timestamp list".into(),
            )),
            [only] => Ok(Self {
                start: *only,
                step: Duration::hours(1),
                len: 1,
            }),
            [first, second, rest @ ..] => {
                let step = *second - *first;
                if step <= Duration::zero() {
                    return Err(ExpostError::Structure(
                        "timestamps must be strictly increasing".into(),
                    ));
                }
                let mut prev = *second;
                for (i, ts) in rest.iter().enumerate() {
                    if *ts - prev != step {
                        return Err(ExpostError::Structure(format!(
                            "time index step changes at position {} ({} then {})",
                            i + 2,
                            step,
                            *ts - prev
                        )));
                    }
                    prev = *ts;
                }
                Ok(Self {
                    start: *first,
                    step,
                    len: timestamps.len(),
                })
            }
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Timestamp at position `i` (must be < len).
    pub fn at(&self, i: usize) -> NaiveDateTime {
        debug_assert!(i < self.len);
        self.start + self.step * i as i32
    }

    /// Fraction of an hour covered by one step (1.0 for hourly data).
    /// Energy sums multiply power by this factor.
    pub fn step_hours(&self) -> f64 {
        self.step.num_seconds() as f64 / 3600.0
    }

    /// Iterate over all timestamps.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.len).map(move |i| self.at(i))
    }

    /// Materialize the timestamps (for table output).
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.iter().collect()
    }

    /// Validate a window against this index.
    pub fn window(&self, start: usize, len: usize) -> ExpostResult<Window> {
        if len == 0 {
            return Err(ExpostError::Validation(
                "aggregation window must not be empty".into(),
            ));
        }
        if start + len > self.len {
            return Err(ExpostError::Validation(format!(
                "window [{start}, {}) exceeds horizon of {} steps",
                start + len,
                self.len
            )));
        }
        Ok(Window { start, len })
    }

    /// The whole horizon as a single window.
    pub fn full_window(&self) -> ExpostResult<Window> {
        self.window(0, self.len)
    }
}

/// A contiguous slice of the time index, used for windowed aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub len: usize,
}

impl Window {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_hourly_index() {
        let idx = TimeIndex::hourly(t0(), 24);
        assert_eq!(idx.len(), 24);
        assert_eq!(idx.at(0), t0());
        assert_eq!(idx.at(3), t0() + Duration::hours(3));
        assert_eq!(idx.step_hours(), 1.0);
    }

    #[test]
    fn test_from_timestamps_fixed_step() {
        let ts: Vec<_> = (0..5).map(|i| t0() + Duration::minutes(15 * i)).collect();
        let idx = TimeIndex::from_timestamps(&ts).unwrap();
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.step(), Duration::minutes(15));
        assert!((idx.step_hours() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_from_timestamps_rejects_irregular_step() {
        let ts = vec![
            t0(),
            t0() + Duration::hours(1),
            t0() + Duration::hours(3),
        ];
        let err = TimeIndex::from_timestamps(&ts).unwrap_err();
        assert!(matches!(err, ExpostError::Structure(_)));
    }

    #[test]
    fn test_from_timestamps_rejects_decreasing() {
        let ts = vec![t0() + Duration::hours(1), t0()];
        assert!(TimeIndex::from_timestamps(&ts).is_err());
    }

    #[test]
    fn test_window_bounds() {
        let idx = TimeIndex::hourly(t0(), 48);
        let w = idx.window(24, 24).unwrap();
        assert_eq!(w.range(), 24..48);
        assert!(idx.window(40, 24).is_err());
        assert!(idx.window(0, 0).is_err());
    }
}
