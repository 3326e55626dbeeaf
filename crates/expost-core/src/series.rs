//! Aligned series frames.
//!
//! A [`Frame`] is a set of f64 series ("columns"), one per entity, all aligned
//! to the snapshot's [`crate::timeindex::TimeIndex`]. Columns are keyed by
//! typed ids ([`crate::UnitId`], [`crate::ZoneId`], [`crate::LineId`]), so a
//! missing entity is a typed lookup miss rather than a silent string-matching
//! surprise. Column order is insertion order and is preserved in every output,
//! which keeps reruns on an identical snapshot bit-identical.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{ExpostError, ExpostResult};
use crate::timeindex::Window;
use crate::{LineId, UnitId, ZoneId};

/// Column-per-entity series aligned to a common time index.
#[derive(Debug, Clone)]
pub struct Frame<K> {
    len: usize,
    keys: Vec<K>,
    index: HashMap<K, usize>,
    values: Vec<Vec<f64>>,
}

/// Per-unit frame (power, commitment, heat, reserves, ...).
pub type UnitFrame = Frame<UnitId>;
/// Per-zone frame (demand, shed load, shadow prices, ...).
pub type ZoneFrame = Frame<ZoneId>;
/// Per-line frame (flows, transmission prices, flow limits).
pub type LineFrame = Frame<LineId>;

impl<K: Copy + Eq + Hash> Frame<K> {
    /// Create an empty frame with the given time length.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            keys: Vec::new(),
            index: HashMap::new(),
            values: Vec::new(),
        }
    }

    /// Time length of the frame (shared by every column).
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the frame holds no columns at all.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn num_columns(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, key: K) -> bool {
        self.index.contains_key(&key)
    }

    /// Column keys in insertion order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Insert a column. The length must match the frame and the key must not
    /// already be present.
    pub fn insert(&mut self, key: K, values: Vec<f64>) -> ExpostResult<()> {
        if values.len() != self.len {
            return Err(ExpostError::Structure(format!(
                "column length {} does not match time index length {}",
                values.len(),
                self.len
            )));
        }
        if self.index.contains_key(&key) {
            return Err(ExpostError::Validation(
                "duplicate column key in frame".into(),
            ));
        }
        self.index.insert(key, self.keys.len());
        self.keys.push(key);
        self.values.push(values);
        Ok(())
    }

    /// Insert an all-zero column (used when a unit is known but its series is
    /// absent, the unit stays in downstream tables with zero contribution).
    pub fn insert_zero(&mut self, key: K) -> ExpostResult<()> {
        self.insert(key, vec![0.0; self.len])
    }

    pub fn column(&self, key: K) -> Option<&[f64]> {
        self.index.get(&key).map(|&i| self.values[i].as_slice())
    }

    pub fn get(&self, key: K, t: usize) -> Option<f64> {
        self.column(key).and_then(|c| c.get(t).copied())
    }

    /// Sum of one column over the whole horizon; zero for a missing column.
    pub fn column_sum(&self, key: K) -> f64 {
        self.column(key).map_or(0.0, |c| c.iter().sum())
    }

    /// Sum of one column over a window; zero for a missing column.
    pub fn column_sum_window(&self, key: K, window: Window) -> f64 {
        self.column(key)
            .map_or(0.0, |c| c[window.range()].iter().sum())
    }

    /// Mean of one column; zero for a missing or zero-length column.
    pub fn column_mean(&self, key: K) -> f64 {
        match self.column(key) {
            Some(c) if !c.is_empty() => c.iter().sum::<f64>() / c.len() as f64,
            _ => 0.0,
        }
    }

    /// Maximum of one column; zero for a missing or empty column.
    pub fn column_max(&self, key: K) -> f64 {
        self.column(key)
            .map_or(0.0, |c| c.iter().copied().fold(0.0_f64, f64::max))
    }

    /// Count of steps where the column is nonzero.
    pub fn column_nonzero_count(&self, key: K) -> usize {
        self.column(key)
            .map_or(0, |c| c.iter().filter(|v| **v != 0.0).count())
    }

    /// Per-time sum across all columns.
    pub fn row_sums(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.len];
        for col in &self.values {
            for (acc, v) in out.iter_mut().zip(col.iter()) {
                *acc += v;
            }
        }
        out
    }

    /// Grand total across all columns and times.
    pub fn total(&self) -> f64 {
        self.values.iter().map(|c| c.iter().sum::<f64>()).sum()
    }

    /// Maximum per-time sum across columns (peak of the aggregate).
    pub fn max_row_sum(&self) -> f64 {
        self.row_sums().into_iter().fold(0.0_f64, f64::max)
    }

    /// Iterate `(key, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &[f64])> + '_ {
        self.keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (*k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut f: Frame<UnitId> = Frame::new(3);
        f.insert(UnitId::new(0), vec![1.0, 2.0, 3.0]).unwrap();
        f.insert_zero(UnitId::new(1)).unwrap();

        assert_eq!(f.num_columns(), 2);
        assert_eq!(f.column(UnitId::new(0)), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(f.column_sum(UnitId::new(0)), 6.0);
        assert_eq!(f.column_sum(UnitId::new(1)), 0.0);
        assert_eq!(f.column(UnitId::new(7)), None);
    }

    #[test]
    fn test_length_mismatch_is_structural() {
        let mut f: Frame<UnitId> = Frame::new(3);
        let err = f.insert(UnitId::new(0), vec![1.0]).unwrap_err();
        assert!(matches!(err, ExpostError::Structure(_)));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut f: Frame<ZoneId> = Frame::new(1);
        f.insert(ZoneId::new(0), vec![1.0]).unwrap();
        assert!(f.insert(ZoneId::new(0), vec![2.0]).is_err());
    }

    #[test]
    fn test_row_sums_and_peak() {
        let mut f: Frame<ZoneId> = Frame::new(3);
        f.insert(ZoneId::new(0), vec![1.0, 5.0, 2.0]).unwrap();
        f.insert(ZoneId::new(1), vec![2.0, 1.0, 2.0]).unwrap();

        assert_eq!(f.row_sums(), vec![3.0, 6.0, 4.0]);
        assert_eq!(f.max_row_sum(), 6.0);
        assert_eq!(f.total(), 13.0);
    }

    #[test]
    fn test_window_sum() {
        let mut f: Frame<LineId> = Frame::new(4);
        f.insert(LineId::new(0), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let w = Window { start: 1, len: 2 };
        assert_eq!(f.column_sum_window(LineId::new(0), w), 5.0);
    }

    #[test]
    fn test_missing_column_aggregates_to_zero() {
        let f: Frame<UnitId> = Frame::new(4);
        assert_eq!(f.column_mean(UnitId::new(0)), 0.0);
        assert_eq!(f.column_max(UnitId::new(0)), 0.0);
        assert_eq!(f.column_nonzero_count(UnitId::new(0)), 0);
    }
}
