//! Memory manager contract and a byte-budgeted implementation.
//!
//! Segments are submitted once, after they are sealed. From then on the
//! segment reports pin transitions to the manager: `require` on 0 → 1 and
//! `release` on 1 → 0. The manager keeps resident bytes under its budget
//! by asking unpinned segments to swap out, least recently released first.
//!
//! # Locking
//!
//! The manager may call into a segment (`try_swap_out`) while holding its
//! own lock. Segments never call the manager while holding theirs, so the
//! lock order is always manager → segment.
//!
//! Pin transitions reach the manager after the segment lock is dropped,
//! so a concurrent 1 → 0 release and 0 → 1 require on the same segment
//! may arrive here in either order. The manager's `pinned` flag is
//! therefore a hint, not a linearized record of pin state. A segment's
//! own pin count is the authority: `try_swap_out` refuses while pinned,
//! so a stale flag can delay an eviction or offer a pinned segment as a
//! candidate, but never evict a pinned segment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, VectorError};
use crate::resource::MemoryBudget;

/// Opaque handle assigned to a segment on first submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentHandle(pub u64);

impl fmt::Display for SegmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the memory manager sees of a segment.
pub trait Swappable: Send + Sync {
    /// Handle assigned at submission, if any.
    fn handle(&self) -> Option<SegmentHandle>;

    /// Record the handle issued by the manager. Called once per segment.
    fn attach(&self, handle: SegmentHandle);

    /// Bytes the backing array occupies while resident.
    fn footprint(&self) -> usize;

    fn is_resident(&self) -> bool;

    /// Swap out unless pinned or already swapped out. Returns whether the
    /// segment went from resident to swapped out.
    fn try_swap_out(&self) -> Result<bool>;
}

/// Contract between segments and whatever eviction policy owns memory.
pub trait MemoryManager: Send + Sync {
    /// Register a sealed segment. Resubmitting a known segment returns its
    /// existing handle.
    fn submit(&self, segment: Arc<dyn Swappable>) -> Result<SegmentHandle>;

    /// Segment pinned (0 → 1): exclude it from eviction.
    fn require(&self, handle: SegmentHandle) -> Result<()>;

    /// Segment unpinned (1 → 0): eligible for eviction again.
    fn release(&self, handle: SegmentHandle) -> Result<()>;

    /// Segment was swapped out by someone other than the manager.
    fn on_swapped_out(&self, handle: SegmentHandle);

    /// Drop all bookkeeping for a segment whose vector is gone.
    fn forget(&self, handle: SegmentHandle);

    /// Bytes currently resident across all known segments.
    fn resident_bytes(&self) -> usize;

    /// Swap out every unpinned segment. Returns how many were swapped out.
    fn swap_out_all(&self) -> Result<usize>;
}

// ── BudgetMemoryManager ─────────────────────────────────────────────

struct Entry {
    segment: Arc<dyn Swappable>,
    bytes: usize,
    pinned: bool,
    resident: bool,
    /// Tick of the last release; lower is older.
    last_release: u64,
}

#[derive(Default)]
struct ManagerInner {
    next_handle: u64,
    tick: u64,
    resident_bytes: usize,
    entries: HashMap<SegmentHandle, Entry>,
}

/// Keeps resident segment bytes under a budget by evicting unpinned
/// segments, least recently released first.
pub struct BudgetMemoryManager {
    budget: usize,
    inner: Mutex<ManagerInner>,
}

impl BudgetMemoryManager {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            budget: budget.bytes,
            inner: Mutex::new(ManagerInner::default()),
        }
    }

    /// A manager that never evicts.
    pub fn unbounded() -> Self {
        Self::new(MemoryBudget::new(usize::MAX))
    }

    /// Budget derived from detected system memory.
    pub fn auto_detect() -> Self {
        Self::new(MemoryBudget::auto_detect())
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Number of submitted segments still tracked.
    pub fn segment_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Number of segments currently pinned.
    pub fn pinned_count(&self) -> usize {
        self.inner.lock().entries.values().filter(|e| e.pinned).count()
    }

    /// Evict unpinned resident segments until under budget.
    fn enforce_budget(&self, inner: &mut ManagerInner) -> Result<()> {
        if inner.resident_bytes <= self.budget {
            return Ok(());
        }

        let mut candidates: Vec<(u64, SegmentHandle)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.resident && !e.pinned)
            .map(|(h, e)| (e.last_release, *h))
            .collect();
        candidates.sort_unstable();

        for (_, handle) in candidates {
            if inner.resident_bytes <= self.budget {
                break;
            }
            let Some(entry) = inner.entries.get_mut(&handle) else {
                continue;
            };
            if entry.segment.try_swap_out()? {
                entry.resident = false;
                inner.resident_bytes -= entry.bytes;
                tracing::debug!(handle = handle.0, bytes = entry.bytes, "evicted segment");
            }
        }

        if inner.resident_bytes > self.budget {
            tracing::warn!(
                resident = inner.resident_bytes,
                budget = self.budget,
                "memory budget exceeded, all resident segments are pinned"
            );
        }
        Ok(())
    }
}

impl MemoryManager for BudgetMemoryManager {
    fn submit(&self, segment: Arc<dyn Swappable>) -> Result<SegmentHandle> {
        let mut inner = self.inner.lock();
        if let Some(handle) = segment.handle() {
            if inner.entries.contains_key(&handle) {
                return Ok(handle);
            }
        }

        let handle = SegmentHandle(inner.next_handle);
        inner.next_handle += 1;
        segment.attach(handle);

        let bytes = segment.footprint();
        let resident = segment.is_resident();
        if resident {
            inner.resident_bytes += bytes;
        }
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            handle,
            Entry {
                segment,
                bytes,
                pinned: false,
                resident,
                last_release: tick,
            },
        );
        tracing::debug!(handle = handle.0, bytes, "submitted segment");

        self.enforce_budget(&mut inner)?;
        Ok(handle)
    }

    fn require(&self, handle: SegmentHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(&handle)
            .ok_or(VectorError::SegmentNotFound(handle.0))?;
        entry.pinned = true;
        if !entry.resident {
            entry.resident = true;
            let bytes = entry.bytes;
            inner.resident_bytes += bytes;
        }
        let result = self.enforce_budget(&mut inner);
        if result.is_err() {
            // The caller rolls back its pin, so this one must not stick.
            if let Some(entry) = inner.entries.get_mut(&handle) {
                entry.pinned = false;
            }
        }
        result
    }

    fn release(&self, handle: SegmentHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        let entry = inner
            .entries
            .get_mut(&handle)
            .ok_or(VectorError::SegmentNotFound(handle.0))?;
        entry.pinned = false;
        entry.last_release = tick;
        self.enforce_budget(&mut inner)
    }

    fn on_swapped_out(&self, handle: SegmentHandle) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get_mut(&handle) else {
            return;
        };
        if entry.resident {
            entry.resident = false;
            let bytes = entry.bytes;
            inner.resident_bytes -= bytes;
        }
    }

    fn forget(&self, handle: SegmentHandle) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.remove(&handle) {
            if entry.resident {
                inner.resident_bytes -= entry.bytes;
            }
        }
    }

    fn resident_bytes(&self) -> usize {
        self.inner.lock().resident_bytes
    }

    fn swap_out_all(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let mut swapped = 0;
        let mut freed = 0;
        for entry in inner.entries.values_mut() {
            if entry.resident && entry.segment.try_swap_out()? {
                entry.resident = false;
                freed += entry.bytes;
                swapped += 1;
            }
        }
        inner.resident_bytes -= freed;
        Ok(swapped)
    }
}

impl fmt::Debug for BudgetMemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BudgetMemoryManager")
            .field("budget", &self.budget)
            .field("resident_bytes", &inner.resident_bytes)
            .field("segments", &inner.entries.len())
            .finish()
    }
}
