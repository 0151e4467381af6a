//! Online statistics: per-segment aggregates, the P² quantile estimator,
//! and the vector-level summary built from both at seal time.

pub mod quantile;
pub mod segment_stats;
pub mod vector_stats;

pub use quantile::{exact_quantile, P2Quantile, MARKER_COUNT};
pub use segment_stats::{SegmentStats, PRECISION_LIMIT};
pub use vector_stats::{resolution_for_range, QuantileEstimate, VectorStats};
