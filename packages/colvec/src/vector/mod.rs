//! Segmented vectors: typed, append-then-seal columns split into
//! fixed-size swappable segments.
//!
//! ```text
//! SegmentedVector<T>
//!   segments: [seg 0][seg 1] ... [seg k]     seg k is the tail while open
//!   row r lives in segment r / segment_size at offset r % segment_size
//! ```
//!
//! A vector is mutated by a single producer (`append*`), sealed exactly once,
//! and read-only afterwards. Every read pins the segment it touches for the
//! duration of the read, so segments may be swapped out between reads.

pub mod column;
pub mod iter;
pub mod typed;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::bitmap::Bitmap;
use crate::config::VectorOptions;
use crate::element::{DistinctKey, Element, ElementKind};
use crate::error::{Result, VectorError};
use crate::segment::{SegmentContext, VectorSegment};
use crate::stats::{
    exact_quantile, resolution_for_range, P2Quantile, QuantileEstimate, SegmentStats,
    VectorStats, MARKER_COUNT,
};

pub use column::Column;
pub use iter::VectorIter;
pub use typed::{
    ByteVector, DoubleVector, FloatVector, IntVector, LogicalVector, LongVector, ShortVector,
    StringVector,
};

pub struct SegmentedVector<T: Element> {
    context: SegmentContext,
    options: VectorOptions,
    segments: Vec<Arc<VectorSegment<T>>>,
    size: usize,
    sealed: bool,
    stats: Option<VectorStats<T>>,
    resolution_override: Option<f64>,
    sorted: bool,
    factor_levels: Option<Vec<String>>,
}

impl<T: Element> SegmentedVector<T> {
    pub fn new(context: SegmentContext, mut options: VectorOptions) -> Self {
        options.segment_size = options.segment_size.max(1);
        Self {
            context,
            options,
            segments: Vec::new(),
            size: 0,
            sealed: false,
            stats: None,
            resolution_override: None,
            sorted: false,
            factor_levels: None,
        }
    }

    /// Vector over an unbounded manager and in-memory store.
    pub fn ephemeral(segment_size: usize) -> Self {
        Self::new(
            SegmentContext::ephemeral(),
            VectorOptions::with_segment_size(segment_size),
        )
    }

    /// Build a sealed vector from `values`.
    pub fn from_values(context: SegmentContext, options: VectorOptions, values: &[T]) -> Result<Self> {
        let mut vector = Self::new(context, options);
        vector.append_slice(values)?;
        vector.seal()?;
        Ok(vector)
    }

    pub fn kind(&self) -> ElementKind {
        T::KIND
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn segment_size(&self) -> usize {
        self.options.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Arc<VectorSegment<T>>] {
        &self.segments
    }

    pub fn context(&self) -> &SegmentContext {
        &self.context
    }

    pub fn options(&self) -> &VectorOptions {
        &self.options
    }

    fn check_open(&self) -> Result<()> {
        if self.sealed {
            return Err(VectorError::illegal_state("vector is sealed"));
        }
        Ok(())
    }

    fn check_sealed(&self) -> Result<()> {
        if !self.sealed {
            return Err(VectorError::illegal_state("vector is not sealed"));
        }
        Ok(())
    }

    // ── Append ─────────────────────────────────────────────────────

    /// Tail segment with room for at least one more value. A full tail is
    /// sealed and submitted before its successor is created.
    fn writable_tail(&mut self) -> Result<&VectorSegment<T>> {
        let need_new = match self.segments.last() {
            Some(tail) if tail.remaining() > 0 => false,
            Some(tail) => {
                tail.seal();
                tail.submit()?;
                true
            }
            None => true,
        };
        if need_new {
            let segment = VectorSegment::new(
                self.segments.len(),
                self.options.segment_size,
                self.context.clone(),
            );
            self.segments.push(Arc::new(segment));
        }
        self.segments
            .last()
            .map(|s| s.as_ref())
            .ok_or_else(|| VectorError::invariant("open vector has no tail segment"))
    }

    pub fn append(&mut self, value: T) -> Result<()> {
        self.check_open()?;
        self.writable_tail()?.append(value)?;
        self.size += 1;
        Ok(())
    }

    /// Append values in chunks: first the room left in the tail, then whole
    /// segments.
    pub fn append_slice(&mut self, values: &[T]) -> Result<()> {
        self.check_open()?;
        let mut rest = values;
        while !rest.is_empty() {
            let tail = self.writable_tail()?;
            let n = tail.remaining().min(rest.len());
            tail.append_slice(&rest[..n])?;
            self.size += n;
            rest = &rest[n..];
        }
        Ok(())
    }

    /// Append every value of a sealed vector. Vectors with the same segment
    /// size are copied one pinned segment at a time; others element by
    /// element.
    pub fn append_vector(&mut self, other: &SegmentedVector<T>) -> Result<()> {
        self.check_open()?;
        other.check_sealed()?;
        let before = self.size;

        if other.segment_size() == self.segment_size() {
            for segment in &other.segments {
                let guard = segment.pin()?;
                self.append_slice(&guard)?;
            }
        } else {
            for value in other.iter()? {
                self.append(value?)?;
            }
        }

        let copied = self.size - before;
        if copied != other.len() {
            return Err(VectorError::invariant(format!(
                "copied {copied} values from a vector of size {}",
                other.len()
            )));
        }
        Ok(())
    }

    // ── Seal ───────────────────────────────────────────────────────

    /// Seal the tail, aggregate segment stats and estimate quantiles.
    pub fn seal(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(tail) = self.segments.last() {
            tail.seal();
            tail.submit()?;
        }

        if T::KIND.tracks_stats() {
            let mut merged = SegmentStats::new();
            for segment in &self.segments {
                merged.merge(&segment.stats());
            }
            if merged.precision_at_risk() {
                tracing::warn!(
                    kind = ?T::KIND,
                    count = merged.count(),
                    "sum of squares exceeds exact f64 range, variance may be imprecise"
                );
            }
            let resolution = self.derive_resolution(&merged);
            let targets = self.options.quantiles.clone();
            let quantiles = self.estimate_quantiles(&targets)?;
            self.stats = Some(VectorStats::new(merged, quantiles, resolution));
        }

        self.sealed = true;
        tracing::debug!(
            kind = ?T::KIND,
            size = self.size,
            segments = self.segments.len(),
            "sealed vector"
        );
        Ok(())
    }

    fn derive_resolution(&self, stats: &SegmentStats<T>) -> f64 {
        if !T::KIND.is_floating() {
            return 0.0;
        }
        if let Some(r) = self.resolution_override {
            return r;
        }
        match stats.numeric_range() {
            Some((min, max)) => resolution_for_range(min, max, self.options.resolution_divisor),
            None => 0.0,
        }
    }

    /// Quantile estimates for `targets` over the sealed segments.
    ///
    /// Small vectors are materialized and answered exactly. Larger ones run
    /// one P² estimator per target, seeded from the first segment and fed
    /// the remaining segments in order, so only one segment is pinned at a
    /// time.
    fn estimate_quantiles(&self, targets: &[f64]) -> Result<Vec<QuantileEstimate>> {
        if !T::KIND.is_numeric() || targets.is_empty() || self.size == 0 {
            return Ok(Vec::new());
        }

        if self.size <= 2 * MARKER_COUNT {
            let mut values = Vec::with_capacity(self.size);
            for segment in &self.segments {
                let guard = segment.pin()?;
                values.extend(guard.iter().filter_map(|v| v.to_f64()).filter(|v| !v.is_nan()));
            }
            values.sort_by(f64::total_cmp);
            return Ok(targets
                .iter()
                .filter_map(|&q| {
                    exact_quantile(&values, q).map(|value| QuantileEstimate {
                        q,
                        value,
                        exact: true,
                    })
                })
                .collect());
        }

        let mut estimators: Vec<P2Quantile> = targets.iter().map(|&q| P2Quantile::new(q)).collect();
        for segment in &self.segments {
            let values: Vec<f64> = {
                let guard = segment.pin()?;
                guard.iter().filter_map(|v| v.to_f64()).collect()
            };
            estimators
                .par_iter_mut()
                .for_each(|estimator| estimator.observe_all(&values));
        }

        Ok(estimators
            .iter()
            .zip(targets)
            .filter_map(|(estimator, &q)| {
                estimator.estimate().map(|value| QuantileEstimate {
                    q,
                    value,
                    exact: !estimator.has_markers(),
                })
            })
            .collect())
    }

    // ── Read ───────────────────────────────────────────────────────

    pub fn get(&self, index: usize) -> Result<T> {
        self.check_sealed()?;
        if index >= self.size {
            return Err(VectorError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        let segment_size = self.segment_size();
        let segment = &self.segments[index / segment_size];
        let guard = segment.pin()?;
        guard
            .get(index % segment_size)
            .copied()
            .ok_or_else(|| VectorError::invariant(format!("row {index} missing from its segment")))
    }

    /// Iterate every value in row order.
    pub fn iter(&self) -> Result<VectorIter<'_, T>> {
        self.select(None)
    }

    /// Iterate the values at the selected rows, ascending.
    pub fn iter_selected<'a>(&'a self, selection: &'a Bitmap) -> Result<VectorIter<'a, T>> {
        self.select(Some(selection))
    }

    /// `iter()` for `None`, `iter_selected()` otherwise.
    pub fn select<'a>(&'a self, selection: Option<&'a Bitmap>) -> Result<VectorIter<'a, T>> {
        self.check_sealed()?;
        Ok(VectorIter::new(self, selection.map(Bitmap::position_iter)))
    }

    /// All values in row order.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.iter()?.collect()
    }

    /// New sealed vector holding the values at the selected rows.
    pub fn subset(&self, selection: &Bitmap) -> Result<SegmentedVector<T>> {
        self.check_sealed()?;
        let mut out = SegmentedVector::new(self.context.clone(), self.options.clone());
        out.resolution_override = self.resolution_override;
        out.sorted = self.sorted;
        out.factor_levels = self.factor_levels.clone();
        for value in self.iter_selected(selection)? {
            out.append(value?)?;
        }
        out.seal()?;
        Ok(out)
    }

    /// Rows whose value satisfies `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Result<Bitmap>
    where
        F: Fn(T) -> bool,
    {
        self.check_sealed()?;
        if self.size > u32::MAX as usize {
            return Err(VectorError::IndexOutOfRange {
                index: self.size,
                size: u32::MAX as usize,
            });
        }
        let mut bitmap = Bitmap::new();
        for value in self.iter()? {
            bitmap.append(predicate(value?));
        }
        Ok(bitmap)
    }

    /// Distinct values in natural order. Fails once more than `max_unique`
    /// distinct values are seen. Floats within one resolution bucket count
    /// as one value; the first value seen represents the bucket.
    pub fn sorted_unique_values(&self, max_unique: usize) -> Result<Vec<T>> {
        self.check_sealed()?;
        let resolution = self.resolution();
        let mut seen: HashMap<DistinctKey, T> = HashMap::new();
        for value in self.iter()? {
            let value = value?;
            let key = value.distinct_key(resolution);
            if !seen.contains_key(&key) {
                if seen.len() >= max_unique {
                    return Err(VectorError::TooManyUniqueValues { max: max_unique });
                }
                seen.insert(key, value);
            }
        }
        let mut values: Vec<T> = seen.into_values().collect();
        values.sort_by(|a, b| a.compare(b));
        Ok(values)
    }

    /// Whether the vector holds at least two distinct values. Floats closer
    /// than the resolution count as equal.
    pub fn has_more_than_one_value(&self) -> Result<bool> {
        self.check_sealed()?;
        if let Some(stats) = &self.stats {
            let (Some(min), Some(max)) = (stats.min(), stats.max()) else {
                return Ok(false);
            };
            if T::KIND.is_floating() {
                // NaN is keyed by its bits, so it differs from any number.
                if stats.has_nan() {
                    return Ok(min.compare(&max) != Ordering::Equal);
                }
                let spread = stats.numeric_range().map_or(0.0, |(lo, hi)| hi - lo);
                return Ok(spread > stats.resolution());
            }
            return Ok(min != max);
        }

        let mut iter = self.iter()?;
        let Some(first) = iter.next().transpose()? else {
            return Ok(false);
        };
        for value in iter {
            if value? != first {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ── Statistics ─────────────────────────────────────────────────

    /// Vector-level stats; `None` for kinds that carry no statistics.
    pub fn stats(&self) -> Result<Option<&VectorStats<T>>> {
        self.check_sealed()?;
        Ok(self.stats.as_ref())
    }

    pub fn mean(&self) -> Result<Option<f64>> {
        Ok(self.stats()?.and_then(VectorStats::mean))
    }

    pub fn median(&self) -> Result<Option<f64>> {
        self.quantile(0.5)
    }

    /// Estimate for quantile `q`. Configured targets are answered from the
    /// seal-time estimates; any other `q` runs a fresh pass.
    pub fn quantile(&self, q: f64) -> Result<Option<f64>> {
        if let Some(value) = self.stats()?.and_then(|s| s.quantile(q)) {
            return Ok(Some(value));
        }
        Ok(self.estimate_quantiles(&[q])?.first().map(|e| e.value))
    }

    /// Distinctness resolution for floats (`0.0` means exact).
    pub fn resolution(&self) -> f64 {
        match &self.stats {
            Some(stats) => stats.resolution(),
            None => self.resolution_override.unwrap_or(0.0),
        }
    }

    /// Override the auto-derived float resolution. Only before sealing.
    pub fn set_resolution(&mut self, resolution: f64) -> Result<()> {
        self.check_open()?;
        if !(resolution >= 0.0) || !resolution.is_finite() {
            return Err(VectorError::InvalidConfig(format!(
                "resolution must be a finite non-negative number, got {resolution}"
            )));
        }
        self.resolution_override = Some(resolution);
        Ok(())
    }

    // ── Metadata ───────────────────────────────────────────────────

    pub fn set_sorted(&mut self, sorted: bool) {
        self.sorted = sorted;
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Mark as a factor whose codes index into `levels`.
    pub fn set_factor_levels(&mut self, levels: Vec<String>) {
        self.factor_levels = Some(levels);
    }

    pub fn factor_levels(&self) -> Option<&[String]> {
        self.factor_levels.as_deref()
    }

    pub fn is_factor(&self) -> bool {
        self.factor_levels.is_some()
    }

    // ── Close ──────────────────────────────────────────────────────

    /// Force every segment out of memory. Fails if any segment is pinned.
    pub fn close(&self) -> Result<()> {
        self.check_sealed()?;
        self.segments
            .par_iter()
            .try_for_each(|segment| segment.swap_out().map(|_| ()))?;
        tracing::debug!(segments = self.segments.len(), "closed vector");
        Ok(())
    }
}

impl<T: Element> Drop for SegmentedVector<T> {
    fn drop(&mut self) {
        for segment in &self.segments {
            let Some(handle) = segment.handle() else {
                continue;
            };
            self.context.manager.forget(handle);
            if let Err(e) = self.context.store.remove(handle) {
                tracing::warn!(handle = handle.0, error = %e, "failed to remove swap image");
            }
        }
    }
}

impl<T: Element> fmt::Debug for SegmentedVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedVector")
            .field("kind", &T::KIND)
            .field("size", &self.size)
            .field("segment_size", &self.options.segment_size)
            .field("segments", &self.segments.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BudgetMemoryManager;
    use crate::resource::MemoryBudget;
    use crate::segment::PersistenceStatus;
    use crate::store::MemoryBackingStore;

    fn sealed<T: Element>(values: &[T], segment_size: usize) -> SegmentedVector<T> {
        let mut v = SegmentedVector::ephemeral(segment_size);
        v.append_slice(values).unwrap();
        v.seal().unwrap();
        v
    }

    #[test]
    fn test_append_get_across_segments() {
        let values: Vec<i32> = (0..23).collect();
        let v = sealed(&values, 5);
        assert_eq!(v.len(), 23);
        assert_eq!(v.segment_count(), 5);
        for (i, &expected) in values.iter().enumerate() {
            assert_eq!(v.get(i).unwrap(), expected);
        }
        assert!(v.segments().iter().all(|s| s.is_sealed()));
        assert_eq!(v.segments()[4].len(), 3);
    }

    #[test]
    fn test_seal_state_is_enforced() {
        let mut v = SegmentedVector::<i64>::ephemeral(4);
        v.append(1).unwrap();
        assert_eq!(v.get(0).unwrap_err().code(), "ILLEGAL_STATE");
        assert_eq!(v.iter().err().map(|e| e.code()), Some("ILLEGAL_STATE"));
        v.seal().unwrap();
        assert_eq!(v.append(2).unwrap_err().code(), "ILLEGAL_STATE");
        assert_eq!(v.seal().unwrap_err().code(), "ILLEGAL_STATE");
        assert_eq!(v.set_resolution(0.1).unwrap_err().code(), "ILLEGAL_STATE");
    }

    #[test]
    fn test_get_out_of_range() {
        let v = sealed(&[1, 2, 3], 2);
        let err = v.get(3).unwrap_err();
        assert!(matches!(err, VectorError::IndexOutOfRange { index: 3, size: 3 }));
    }

    #[test]
    fn test_empty_vector() {
        let v = sealed::<i32>(&[], 8);
        assert_eq!(v.segment_count(), 0);
        assert!(v.to_vec().unwrap().is_empty());
        assert_eq!(v.stats().unwrap().unwrap().count(), 0);
        assert_eq!(v.median().unwrap(), None);
        assert!(!v.has_more_than_one_value().unwrap());
    }

    #[test]
    fn test_iter_selected_skips_segments() {
        let values: Vec<i32> = (0..20).map(|x| x * 10).collect();
        let v = sealed(&values, 4);
        let selection = Bitmap::from_positions(20, [1, 2, 17]);
        let picked: Vec<i32> = v.iter_selected(&selection).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(picked, vec![10, 20, 170]);

        // Segments 1..=3 were never pinned, so an evicted one stays out.
        v.segments()[2].swap_out().unwrap();
        let picked: Vec<i32> = v.iter_selected(&selection).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(picked.len(), 3);
        assert_eq!(v.segments()[2].status(), PersistenceStatus::SwappedOut);
    }

    #[test]
    fn test_iter_selected_out_of_range() {
        let v = sealed(&[1, 2, 3], 2);
        let selection = Bitmap::from_positions(10, [0, 9]);
        let results: Vec<Result<i32>> = v.iter_selected(&selection).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert_eq!(results[1].as_ref().unwrap_err().code(), "INDEX_OUT_OF_RANGE");
    }

    #[test]
    fn test_subset() {
        let v = sealed(&[5, 6, 7, 8, 9, 10, 11], 3);
        let selection = Bitmap::from_bools([true, false, false, true, true, false, true]);
        let sub = v.subset(&selection).unwrap();
        assert!(sub.is_sealed());
        assert_eq!(sub.len() as u64, selection.cardinality());
        assert_eq!(sub.to_vec().unwrap(), vec![5, 8, 9, 11]);
        assert_eq!(sub.stats().unwrap().unwrap().min(), Some(5));
    }

    #[test]
    fn test_append_vector_same_and_mixed_layout() {
        let source = sealed(&(0..11).collect::<Vec<_>>(), 4);

        let mut same = SegmentedVector::<i32>::ephemeral(4);
        same.append(-1).unwrap();
        same.append_vector(&source).unwrap();
        same.seal().unwrap();
        assert_eq!(same.len(), 12);
        assert_eq!(same.segment_count(), 3);
        assert_eq!(same.get(1).unwrap(), 0);
        assert_eq!(same.get(11).unwrap(), 10);

        let mut mixed = SegmentedVector::<i32>::ephemeral(3);
        mixed.append_vector(&source).unwrap();
        mixed.seal().unwrap();
        assert_eq!(mixed.to_vec().unwrap(), source.to_vec().unwrap());
    }

    #[test]
    fn test_append_vector_requires_sealed_source() {
        let mut open = SegmentedVector::<i32>::ephemeral(4);
        open.append(1).unwrap();
        let mut target = SegmentedVector::<i32>::ephemeral(4);
        assert_eq!(target.append_vector(&open).unwrap_err().code(), "ILLEGAL_STATE");
    }

    #[test]
    fn test_stats_and_exact_quantiles() {
        let v = sealed(&[4, 1, 3, 2, 5], 2);
        let stats = v.stats().unwrap().unwrap();
        assert_eq!(stats.count(), 5);
        assert_eq!(stats.min(), Some(1));
        assert_eq!(stats.max(), Some(5));
        assert_eq!(v.mean().unwrap(), Some(3.0));
        assert_eq!(v.median().unwrap(), Some(3.0));
        assert_eq!(v.quantile(0.25).unwrap(), Some(2.0));
        assert!(stats.quantiles().iter().all(|e| e.exact));
        assert!((stats.variance() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_p2_quantiles_on_large_vector() {
        let values: Vec<i32> = (0..10_000).map(|i| (i * 7919) % 10_000).collect();
        let v = sealed(&values, 1024);
        let median = v.median().unwrap().unwrap();
        assert!((median - 5000.0).abs() < 250.0, "median estimate {median}");
        assert!(!v.stats().unwrap().unwrap().quantiles()[1].exact);

        // Not a configured target: computed on demand.
        let p90 = v.quantile(0.9).unwrap().unwrap();
        assert!((p90 - 9000.0).abs() < 300.0, "p90 estimate {p90}");
    }

    #[test]
    fn test_sorted_unique_values() {
        let v = sealed(&[3, 1, 3, 2, 1, 2, 3], 3);
        assert_eq!(v.sorted_unique_values(10).unwrap(), vec![1, 2, 3]);
        let err = v.sorted_unique_values(2).unwrap_err();
        assert!(matches!(err, VectorError::TooManyUniqueValues { max: 2 }));
    }

    #[test]
    fn test_float_unique_values_use_resolution() {
        let mut v = SegmentedVector::<f64>::ephemeral(4);
        v.set_resolution(0.1).unwrap();
        v.append_slice(&[1.0, 1.01, 1.02, 2.0, 2.04]).unwrap();
        v.seal().unwrap();
        assert_eq!(v.resolution(), 0.1);
        assert_eq!(v.sorted_unique_values(10).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_auto_resolution() {
        let mut v = SegmentedVector::<f64>::ephemeral(4);
        v.append_slice(&[0.0, 500.0, 1000.0]).unwrap();
        v.seal().unwrap();
        assert!((v.resolution() - 1e-3).abs() < 1e-15);

        let ints = sealed(&[0, 1000], 4);
        assert_eq!(ints.resolution(), 0.0);
    }

    #[test]
    fn test_has_more_than_one_value() {
        assert!(!sealed(&[7, 7, 7], 2).has_more_than_one_value().unwrap());
        assert!(sealed(&[7, 7, 8], 2).has_more_than_one_value().unwrap());

        let mut v = SegmentedVector::<f64>::ephemeral(4);
        v.set_resolution(0.5).unwrap();
        v.append_slice(&[1.0, 1.2]).unwrap();
        v.seal().unwrap();
        assert!(!v.has_more_than_one_value().unwrap());
    }

    #[test]
    fn test_nan_rows_in_float_vector() {
        let v = sealed(&[1.0f64, 5.0, f64::NAN], 2);
        assert!(v.has_more_than_one_value().unwrap());
        // From the non-NaN range: 4 / 1e6 rounds to 1e-5.
        assert!((v.resolution() - 1e-5).abs() < 1e-17);

        let nan_only = sealed(&[f64::NAN, f64::NAN], 2);
        assert!(!nan_only.has_more_than_one_value().unwrap());
        assert_eq!(nan_only.resolution(), 0.0);

        let one_and_nan = sealed(&[3.0f32, f32::NAN], 4);
        assert!(one_and_nan.has_more_than_one_value().unwrap());
    }

    #[test]
    fn test_filter() {
        let v = sealed(&[1, 8, 3, 9, 10, 2], 4);
        let bitmap = v.filter(|x| x > 5).unwrap();
        assert_eq!(bitmap.len(), 6);
        assert_eq!(bitmap.positions().collect::<Vec<_>>(), vec![1, 3, 4]);
    }

    #[test]
    fn test_metadata() {
        let mut v = SegmentedVector::<i32>::ephemeral(4);
        assert!(!v.is_sorted());
        v.set_sorted(true);
        v.set_factor_levels(vec!["a".into(), "b".into()]);
        v.append_slice(&[0, 0, 1]).unwrap();
        v.seal().unwrap();
        assert!(v.is_sorted());
        assert!(v.is_factor());

        let sub = v.subset(&Bitmap::from_positions(3, [2])).unwrap();
        assert_eq!(sub.factor_levels(), Some(&["a".to_string(), "b".to_string()][..]));
    }

    #[test]
    fn test_close_swaps_everything_out() {
        let v = sealed(&(0..10).collect::<Vec<_>>(), 3);
        v.close().unwrap();
        assert!(v
            .segments()
            .iter()
            .all(|s| s.status() == PersistenceStatus::SwappedOut));
        assert_eq!(v.context().manager.resident_bytes(), 0);
        // Reads still work: segments swap back in on demand.
        assert_eq!(v.get(9).unwrap(), 9);
    }

    #[test]
    fn test_close_refused_while_pinned() {
        let v = sealed(&[1, 2, 3], 2);
        let guard = v.segments()[0].pin().unwrap();
        assert_eq!(v.close().unwrap_err().code(), "ILLEGAL_STATE");
        drop(guard);
        v.close().unwrap();
    }

    #[test]
    fn test_reads_under_tight_budget() {
        let store = Arc::new(MemoryBackingStore::new());
        let context = SegmentContext::new(
            Arc::new(BudgetMemoryManager::new(MemoryBudget::new(16))),
            store.clone(),
        );
        let values: Vec<i64> = (0..40).collect();
        let v = SegmentedVector::from_values(context.clone(), VectorOptions::with_segment_size(2), &values)
            .unwrap();
        assert!(context.manager.resident_bytes() <= 16);
        assert_eq!(v.to_vec().unwrap(), values);
        assert_eq!(v.get(0).unwrap(), 0);
        assert!(!store.is_empty());

        drop(v);
        assert!(store.is_empty());
        assert_eq!(context.manager.resident_bytes(), 0);
    }
}
