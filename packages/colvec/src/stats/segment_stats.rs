//! Online per-segment statistics.
//!
//! Tracks `count`, `min` and `max` for every kind that keeps stats, and
//! `sum` / `sum of squares` for numeric kinds. Two stats objects combine
//! with [`SegmentStats::merge`]; merging per-segment stats equals computing
//! the stats over the concatenated values.
//!
//! Floats order by `total_cmp`, so a NaN can become `min` or `max`. The
//! range that drives resolution and spread checks is tracked separately
//! over non-NaN values, see [`SegmentStats::numeric_range`].

use std::cmp::Ordering;

use crate::element::Element;

/// Largest integer an `f64` represents exactly (2^53). Once the sum of
/// squares passes it, variance loses precision.
pub const PRECISION_LIMIT: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats<T> {
    count: u64,
    min: Option<T>,
    max: Option<T>,
    /// (lowest, highest) over values with a non-NaN `f64` view.
    range: Option<(f64, f64)>,
    sum: f64,
    sum_of_squares: f64,
}

impl<T: Element> SegmentStats<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            min: None,
            max: None,
            range: None,
            sum: 0.0,
            sum_of_squares: 0.0,
        }
    }

    /// Record one value. The first value seeds min and max.
    pub fn add(&mut self, value: T) {
        self.count += 1;
        match self.min {
            Some(min) if min.compare(&value) != Ordering::Greater => {}
            _ => self.min = Some(value),
        }
        match self.max {
            Some(max) if max.compare(&value) != Ordering::Less => {}
            _ => self.max = Some(value),
        }
        if let Some(v) = value.to_f64() {
            if !v.is_nan() {
                self.range = widen(self.range, Some((v, v)));
            }
            self.sum += v;
            self.sum_of_squares += v * v;
        }
    }

    /// Fold `other` into `self`. An empty side contributes nothing.
    pub fn merge(&mut self, other: &SegmentStats<T>) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        self.count += other.count;
        self.min = pick(self.min, other.min, Ordering::Less);
        self.max = pick(self.max, other.max, Ordering::Greater);
        self.range = widen(self.range, other.range);
        self.sum += other.sum;
        self.sum_of_squares += other.sum_of_squares;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<T> {
        self.min
    }

    pub fn max(&self) -> Option<T> {
        self.max
    }

    /// Lowest and highest non-NaN values as `f64`. `None` when every value
    /// is NaN or the kind has no numeric view.
    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        self.range
    }

    /// Whether any recorded value was NaN.
    pub fn has_nan(&self) -> bool {
        let is_nan = |v: Option<T>| v.and_then(|v| v.to_f64()).is_some_and(f64::is_nan);
        is_nan(self.min) || is_nan(self.max)
    }

    /// Sum of values; `None` for kinds without moments.
    pub fn sum(&self) -> Option<f64> {
        T::KIND.is_numeric().then_some(self.sum)
    }

    pub fn sum_of_squares(&self) -> Option<f64> {
        T::KIND.is_numeric().then_some(self.sum_of_squares)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 || !T::KIND.is_numeric() {
            return None;
        }
        Some(self.sum / self.count as f64)
    }

    /// Population variance, `E[X²] - E[X]²`. `0.0` for empty stats.
    pub fn variance(&self) -> f64 {
        match self.mean() {
            Some(mean) => {
                let n = self.count as f64;
                (self.sum_of_squares / n - mean * mean).max(0.0)
            }
            None => 0.0,
        }
    }

    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Advisory: variance and stdev may be numerically unreliable.
    pub fn precision_at_risk(&self) -> bool {
        self.sum_of_squares > PRECISION_LIMIT
    }
}

impl<T: Element> Default for SegmentStats<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn pick<T: Element>(a: Option<T>, b: Option<T>, prefer: Ordering) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y.compare(&x) == prefer { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

fn widen(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((lo, hi)), Some((l, h))) => Some((lo.min(l), hi.max(h))),
        (x, None) => x,
        (None, y) => y,
    }
}
