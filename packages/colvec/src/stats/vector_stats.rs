//! Vector-level statistics, finalized when a vector is sealed.

use crate::element::Element;
use crate::stats::segment_stats::SegmentStats;

/// One quantile target and its estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileEstimate {
    pub q: f64,
    pub value: f64,
    /// True when computed from fully materialized data rather than P².
    pub exact: bool,
}

/// Merged segment stats plus quantiles and the float resolution.
#[derive(Debug, Clone)]
pub struct VectorStats<T> {
    stats: SegmentStats<T>,
    quantiles: Vec<QuantileEstimate>,
    resolution: f64,
}

impl<T: Element> VectorStats<T> {
    pub fn new(stats: SegmentStats<T>, quantiles: Vec<QuantileEstimate>, resolution: f64) -> Self {
        Self {
            stats,
            quantiles,
            resolution,
        }
    }

    pub fn stats(&self) -> &SegmentStats<T> {
        &self.stats
    }

    pub fn count(&self) -> u64 {
        self.stats.count()
    }

    pub fn min(&self) -> Option<T> {
        self.stats.min()
    }

    pub fn max(&self) -> Option<T> {
        self.stats.max()
    }

    pub fn sum(&self) -> Option<f64> {
        self.stats.sum()
    }

    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        self.stats.numeric_range()
    }

    pub fn has_nan(&self) -> bool {
        self.stats.has_nan()
    }

    pub fn mean(&self) -> Option<f64> {
        self.stats.mean()
    }

    pub fn variance(&self) -> f64 {
        self.stats.variance()
    }

    pub fn stdev(&self) -> f64 {
        self.stats.stdev()
    }

    pub fn precision_at_risk(&self) -> bool {
        self.stats.precision_at_risk()
    }

    pub fn quantiles(&self) -> &[QuantileEstimate] {
        &self.quantiles
    }

    /// Estimate for target `q`, if it was one of the configured targets.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        self.quantiles
            .iter()
            .find(|e| (e.q - q).abs() < 1e-12)
            .map(|e| e.value)
    }

    pub fn median(&self) -> Option<f64> {
        self.quantile(0.5)
    }

    /// Rounding resolution for float distinctness (`0.0` = exact).
    pub fn resolution(&self) -> f64 {
        self.resolution
    }
}

/// Resolution derived from a value range: `range / divisor`, rounded to
/// the nearest power of ten. `0.0` when the range is empty or not finite.
pub fn resolution_for_range(min: f64, max: f64, divisor: f64) -> f64 {
    let range = max - min;
    if !(range > 0.0) || !range.is_finite() || !(divisor > 0.0) {
        return 0.0;
    }
    let raw = range / divisor;
    10f64.powf(raw.log10().round())
}
