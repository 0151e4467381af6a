//! colvec - segmented columnar vectors
//!
//! Typed, append-then-seal vectors split into fixed-size segments. Each
//! sealed segment can be swapped between memory and a backing store under
//! the direction of a memory manager; reads pin the segments they touch.
//! Sealing computes per-segment and vector-level statistics (including P²
//! quantile estimates), and compressed bitmaps select rows for filtered
//! iteration and subsetting.
//!
//! # Layout
//!
//! - [`bitmap`]: roaring-backed row selections
//! - [`stats`]: segment stats, the P² estimator, vector stats
//! - [`segment`]: backing arrays, the pin/swap protocol, the swap image format
//! - [`vector`]: `SegmentedVector<T>`, typed aliases, string vectors, columns
//! - [`memory`] / [`store`]: the memory manager and backing store contracts
//! - [`space`]: `DataSpace`, the owning context tying them together

pub mod bitmap;
pub mod config;
pub mod element;
pub mod error;
pub mod memory;
pub mod resource;
pub mod segment;
pub mod space;
pub mod stats;
pub mod store;
pub mod string_table;
pub mod vector;

pub use bitmap::{Bitmap, PositionIter};
pub use config::{StoreConfig, VectorOptions};
pub use element::{Element, ElementKind, StringCode};
pub use error::{Result, VectorError};
pub use memory::{BudgetMemoryManager, MemoryManager, SegmentHandle, Swappable};
pub use resource::{MemoryBudget, SystemResources};
pub use segment::{PersistenceStatus, SegmentContext, SegmentGuard, VectorSegment};
pub use space::DataSpace;
pub use stats::{P2Quantile, QuantileEstimate, SegmentStats, VectorStats};
pub use store::{BackingStore, FileBackingStore, MemoryBackingStore};
pub use string_table::{StringDictionary, StringTable};
pub use vector::{
    ByteVector, Column, DoubleVector, FloatVector, IntVector, LogicalVector, LongVector,
    SegmentedVector, ShortVector, StringVector, VectorIter,
};
