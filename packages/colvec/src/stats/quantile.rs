//! P² streaming quantile estimator (Jain & Chlamtac, 1985).
//!
//! Keeps five markers (min, ~q/2, ~q, ~(1+q)/2, max) whose heights are
//! adjusted with piecewise-parabolic interpolation as observations arrive.
//! O(1) space and O(1) per observation. The result is an approximation
//! once five or more values have been seen; below that the estimate is
//! computed exactly from the buffered values.
//!
//! `q == 0` and `q == 1` degrade to a running min / max.

const MARKERS: usize = 5;

/// Number of markers the estimator maintains.
pub const MARKER_COUNT: usize = MARKERS;

#[derive(Debug, Clone)]
pub struct P2Quantile {
    q: f64,
    count: u64,
    /// Marker heights.
    heights: [f64; MARKERS],
    /// Actual marker positions (1-based).
    positions: [f64; MARKERS],
    /// Desired marker positions.
    desired: [f64; MARKERS],
    /// Desired position increments per observation.
    increments: [f64; MARKERS],
    /// Observations buffered until the markers are initialized.
    initial: Vec<f64>,
    min: f64,
    max: f64,
}

impl P2Quantile {
    /// Create an estimator for quantile `q` (clamped to `[0, 1]`).
    pub fn new(q: f64) -> Self {
        let q = if q.is_nan() { 0.5 } else { q.clamp(0.0, 1.0) };
        Self {
            q,
            count: 0,
            heights: [0.0; MARKERS],
            positions: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [1.0, 1.0 + 2.0 * q, 1.0 + 4.0 * q, 3.0 + 2.0 * q, 5.0],
            increments: [0.0, q / 2.0, q, (1.0 + q) / 2.0, 1.0],
            initial: Vec::with_capacity(MARKERS),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn quantile(&self) -> f64 {
        self.q
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether the five markers have been seeded.
    pub fn has_markers(&self) -> bool {
        self.count >= MARKERS as u64 && !self.is_extreme()
    }

    fn is_extreme(&self) -> bool {
        self.q == 0.0 || self.q == 1.0
    }

    /// Feed a slice of observations in order.
    pub fn observe_all(&mut self, values: &[f64]) {
        for &v in values {
            self.observe(v);
        }
    }

    /// Feed one observation. NaN values are ignored.
    pub fn observe(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        self.count += 1;
        self.min = self.min.min(x);
        self.max = self.max.max(x);

        if self.is_extreme() {
            return;
        }

        if self.initial.len() < MARKERS {
            self.initial.push(x);
            if self.initial.len() == MARKERS {
                self.initial.sort_by(|a, b| a.total_cmp(b));
                self.heights.copy_from_slice(&self.initial);
            }
            return;
        }

        // Locate the cell containing x, widening the extremes if needed.
        let k = if x < self.heights[0] {
            self.heights[0] = x;
            0
        } else if x >= self.heights[4] {
            self.heights[4] = x;
            3
        } else {
            (1..MARKERS)
                .find(|&i| x < self.heights[i])
                .map(|i| i - 1)
                .unwrap_or(3)
        };

        for i in (k + 1)..MARKERS {
            self.positions[i] += 1.0;
        }
        for i in 0..MARKERS {
            self.desired[i] += self.increments[i];
        }

        for i in 1..(MARKERS - 1) {
            let d = self.desired[i] - self.positions[i];
            let room_up = self.positions[i + 1] - self.positions[i];
            let room_down = self.positions[i - 1] - self.positions[i];
            if (d >= 1.0 && room_up > 1.0) || (d <= -1.0 && room_down < -1.0) {
                let step = d.signum();
                let candidate = self.parabolic(i, step);
                self.heights[i] =
                    if self.heights[i - 1] < candidate && candidate < self.heights[i + 1] {
                        candidate
                    } else {
                        self.linear(i, step)
                    };
                self.positions[i] += step;
            }
        }
    }

    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let (n, h) = (&self.positions, &self.heights);
        h[i] + d / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + d) * (h[i + 1] - h[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - d) * (h[i] - h[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, d: f64) -> f64 {
        let j = if d > 0.0 { i + 1 } else { i - 1 };
        let (n, h) = (&self.positions, &self.heights);
        h[i] + d * (h[j] - h[i]) / (n[j] - n[i])
    }

    /// Current estimate, `None` before the first observation.
    pub fn estimate(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        if self.q == 0.0 {
            return Some(self.min);
        }
        if self.q == 1.0 {
            return Some(self.max);
        }
        if self.initial.len() < MARKERS {
            let mut sorted = self.initial.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            return exact_quantile(&sorted, self.q);
        }
        Some(self.heights[2])
    }
}

/// Exact quantile of sorted data, interpolating linearly between closest ranks.
pub fn exact_quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic xorshift stream in [0, 1).
    fn uniform(n: usize, mut seed: u64) -> Vec<f64> {
        (0..n)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                (seed >> 11) as f64 / (1u64 << 53) as f64
            })
            .collect()
    }

    #[test]
    fn test_empty_estimate() {
        assert_eq!(P2Quantile::new(0.5).estimate(), None);
    }

    #[test]
    fn test_fewer_than_five_is_exact() {
        let mut p2 = P2Quantile::new(0.5);
        p2.observe_all(&[9.0, 1.0, 5.0]);
        assert!(!p2.has_markers());
        assert_eq!(p2.estimate(), Some(5.0));

        p2.observe(3.0);
        // 1, 3, 5, 9 -> midpoint of 3 and 5
        assert_eq!(p2.estimate(), Some(4.0));
    }

    #[test]
    fn test_markers_after_five() {
        let mut p2 = P2Quantile::new(0.5);
        p2.observe_all(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        assert!(p2.has_markers());
        assert_eq!(p2.estimate(), Some(3.0));
    }

    #[test]
    fn test_median_converges_on_uniform() {
        let data = uniform(100_000, 0x9e37_79b9_7f4a_7c15);
        let mut p2 = P2Quantile::new(0.5);
        p2.observe_all(&data);
        let est = p2.estimate().unwrap();
        assert!((est - 0.5).abs() < 0.02, "median estimate {est} too far from 0.5");
    }

    #[test]
    fn test_upper_quartile_converges() {
        let data = uniform(50_000, 42);
        let mut p2 = P2Quantile::new(0.75);
        p2.observe_all(&data);
        let est = p2.estimate().unwrap();
        assert!((est - 0.75).abs() < 0.02, "q75 estimate {est} too far from 0.75");
    }

    #[test]
    fn test_extreme_quantiles_track_min_max() {
        let mut lo = P2Quantile::new(0.0);
        let mut hi = P2Quantile::new(1.0);
        for v in [3.0, -2.0, 8.0, 0.5, 7.0, 11.0, -4.0] {
            lo.observe(v);
            hi.observe(v);
        }
        assert_eq!(lo.estimate(), Some(-4.0));
        assert_eq!(hi.estimate(), Some(11.0));
    }

    #[test]
    fn test_markers_stay_ordered() {
        let mut p2 = P2Quantile::new(0.3);
        for i in 0..10_000 {
            p2.observe(((i * 7919) % 1000) as f64);
        }
        for w in p2.heights.windows(2) {
            assert!(w[0] <= w[1], "marker heights out of order: {:?}", p2.heights);
        }
    }

    #[test]
    fn test_exact_quantile() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(exact_quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(exact_quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(exact_quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(exact_quantile(&[], 0.5), None);
    }
}
