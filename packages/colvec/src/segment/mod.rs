//! Vector segments: the unit of swap-in / swap-out.
//!
//! A segment owns one [`BackingArray`] and its [`SegmentStats`]. Its life:
//!
//! ```text
//! OPEN ──seal──▶ SEALED (trimmed, submitted) ──▶ SWAPPED_IN ⇄ SWAPPED_OUT
//! ```
//!
//! While open it is the owning vector's tail and only the single producer
//! appends to it. Once sealed it is read through the pin protocol:
//! `require` increments the pin count (swapping in first if needed) and
//! `release` decrements it. A pinned segment is never swapped out.
//!
//! Pin count, persistence status and the backing array live under one
//! mutex, so `require`, `release`, `swap_in` and `swap_out` on the same
//! segment never interleave. The memory manager is only called after that
//! mutex is dropped (see [`crate::memory`] for the lock order), so the
//! manager's view of pin transitions is not linearized with the segment's
//! own count. Only the count here decides whether a swap-out may happen.

pub mod backing;
pub mod format;

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard};

use crate::element::Element;
use crate::error::{Result, VectorError};
use crate::memory::{BudgetMemoryManager, MemoryManager, SegmentHandle, Swappable};
use crate::stats::SegmentStats;
use crate::store::{BackingStore, MemoryBackingStore};

pub use backing::BackingArray;
pub use format::{decode_values, encode_values, SwapHeader};

// ── Persistence Status ─────────────────────────────────────────────

/// Where a segment's backing array currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStatus {
    /// In memory, never written to the backing store.
    NotPersisted,
    /// In memory, with an identical image in the backing store.
    SwappedIn,
    /// Only the backing store image remains.
    SwappedOut,
}

// ── Segment Context ────────────────────────────────────────────────

/// Collaborators a segment needs once sealed.
#[derive(Clone)]
pub struct SegmentContext {
    pub manager: Arc<dyn MemoryManager>,
    pub store: Arc<dyn BackingStore>,
}

impl SegmentContext {
    pub fn new(manager: Arc<dyn MemoryManager>, store: Arc<dyn BackingStore>) -> Self {
        Self { manager, store }
    }

    /// Unbounded manager over an in-memory store.
    pub fn ephemeral() -> Self {
        Self {
            manager: Arc::new(BudgetMemoryManager::unbounded()),
            store: Arc::new(MemoryBackingStore::new()),
        }
    }
}

impl fmt::Debug for SegmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentContext")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

// ── VectorSegment ──────────────────────────────────────────────────

struct SegmentState<T> {
    /// Present iff `status != SwappedOut`.
    data: Option<Arc<BackingArray<T>>>,
    status: PersistenceStatus,
    sealed: bool,
    pins: usize,
    local_size: usize,
    stats: SegmentStats<T>,
}

pub struct VectorSegment<T: Element> {
    /// Position within the owning vector.
    index: usize,
    capacity: usize,
    context: SegmentContext,
    handle: OnceLock<SegmentHandle>,
    state: Mutex<SegmentState<T>>,
}

impl<T: Element> VectorSegment<T> {
    pub fn new(index: usize, capacity: usize, context: SegmentContext) -> Self {
        tracing::debug!(index, capacity, kind = ?T::KIND, "created segment");
        Self {
            index,
            capacity,
            context,
            handle: OnceLock::new(),
            state: Mutex::new(SegmentState {
                data: Some(Arc::new(BackingArray::with_capacity(capacity))),
                status: PersistenceStatus::NotPersisted,
                sealed: false,
                pins: 0,
                local_size: 0,
                stats: SegmentStats::new(),
            }),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Capacity the segment was created with (before trimming).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().local_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Room left before the segment is full.
    pub fn remaining(&self) -> usize {
        self.capacity - self.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().sealed
    }

    pub fn status(&self) -> PersistenceStatus {
        self.state.lock().status
    }

    pub fn pin_count(&self) -> usize {
        self.state.lock().pins
    }

    pub fn stats(&self) -> SegmentStats<T> {
        self.state.lock().stats.clone()
    }

    // -- Open phase -----------------------------------------------------------

    /// Append one value to an open segment.
    pub fn append(&self, value: T) -> Result<()> {
        let mut st = self.state.lock();
        Self::open_array(&mut st)?.push(value)?;
        st.local_size += 1;
        if T::KIND.tracks_stats() {
            st.stats.add(value);
        }
        Ok(())
    }

    /// Append a chunk to an open segment, all or nothing.
    pub fn append_slice(&self, chunk: &[T]) -> Result<()> {
        let mut st = self.state.lock();
        Self::open_array(&mut st)?.extend_from_slice(chunk)?;
        st.local_size += chunk.len();
        if T::KIND.tracks_stats() {
            for &v in chunk {
                st.stats.add(v);
            }
        }
        Ok(())
    }

    fn open_array<'s>(st: &'s mut SegmentState<T>) -> Result<&'s mut BackingArray<T>> {
        if st.sealed {
            return Err(VectorError::illegal_state("append to a sealed segment"));
        }
        let data = st
            .data
            .as_mut()
            .ok_or_else(|| VectorError::invariant("open segment has no backing array"))?;
        Arc::get_mut(data)
            .ok_or_else(|| VectorError::invariant("open segment backing array is shared"))
    }

    /// Trim to the actual element count and make read-only. Idempotent.
    pub fn seal(&self) {
        let mut st = self.state.lock();
        if st.sealed {
            return;
        }
        if let Some(array) = st.data.as_mut().and_then(Arc::get_mut) {
            array.trim();
        }
        st.sealed = true;
        tracing::debug!(index = self.index, len = st.local_size, "sealed segment");
    }

    /// Register with the memory manager. Resubmission returns the same handle.
    pub fn submit(self: &Arc<Self>) -> Result<SegmentHandle> {
        if let Some(&handle) = self.handle.get() {
            return Ok(handle);
        }
        if !self.is_sealed() {
            return Err(VectorError::illegal_state("submit of an open segment"));
        }
        let swappable: Arc<dyn Swappable> = self.clone();
        self.context.manager.submit(swappable)
    }

    pub fn handle(&self) -> Option<SegmentHandle> {
        self.handle.get().copied()
    }

    // -- Pin protocol ---------------------------------------------------------

    /// Pin the segment in memory, swapping it in first if needed.
    pub fn require(&self) -> Result<()> {
        let handle = self.handle().ok_or(VectorError::ManagerNotReady)?;
        let first_pin = {
            let mut st = self.state.lock();
            if st.pins == 0 && st.status == PersistenceStatus::SwappedOut {
                self.swap_in_locked(&mut st, handle)?;
            }
            st.pins += 1;
            st.pins == 1
        };

        if first_pin {
            if let Err(e) = self.context.manager.require(handle) {
                self.state.lock().pins -= 1;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Unpin. At pin count 0 this is an invariant violation, or a silent
    /// no-op when `quiet` is set.
    pub fn release(&self, quiet: bool) -> Result<()> {
        let handle = self.handle().ok_or(VectorError::ManagerNotReady)?;
        let last_pin = {
            let mut st = self.state.lock();
            if st.pins == 0 {
                if quiet {
                    tracing::warn!(index = self.index, "quiet release of an unpinned segment");
                    return Ok(());
                }
                return Err(VectorError::invariant(format!(
                    "unbalanced release of segment {} (handle {handle})",
                    self.index
                )));
            }
            st.pins -= 1;
            st.pins == 0
        };

        if last_pin {
            self.context.manager.release(handle)?;
        }
        Ok(())
    }

    /// Pin and return a guard over the backing array; dropping the guard
    /// releases the pin.
    pub fn pin(&self) -> Result<SegmentGuard<'_, T>> {
        self.require()?;
        let data = self.state.lock().data.clone();
        match data {
            Some(data) => Ok(SegmentGuard {
                segment: self,
                data,
            }),
            None => {
                let _ = self.release(true);
                Err(VectorError::invariant(format!(
                    "pinned segment {} has no backing array",
                    self.index
                )))
            }
        }
    }

    // -- Swap -----------------------------------------------------------------

    /// Restore the backing array from the store if swapped out.
    pub fn swap_in(&self) -> Result<()> {
        let handle = self.handle().ok_or(VectorError::ManagerNotReady)?;
        let mut st = self.state.lock();
        if st.status == PersistenceStatus::SwappedOut {
            self.swap_in_locked(&mut st, handle)?;
        }
        Ok(())
    }

    /// Force a swap-out. Fails while pinned. Returns whether the segment
    /// was resident before the call.
    pub fn swap_out(&self) -> Result<bool> {
        let handle = self.handle().ok_or(VectorError::ManagerNotReady)?;
        {
            let mut st = self.state.lock();
            if st.pins > 0 {
                return Err(VectorError::illegal_state(format!(
                    "swap-out of segment {} while pinned {} times",
                    self.index, st.pins
                )));
            }
            if st.status == PersistenceStatus::SwappedOut {
                return Ok(false);
            }
            self.swap_out_locked(&mut st, handle)?;
        }
        self.context.manager.on_swapped_out(handle);
        Ok(true)
    }

    fn swap_in_locked(
        &self,
        st: &mut MutexGuard<'_, SegmentState<T>>,
        handle: SegmentHandle,
    ) -> Result<()> {
        let image = self.context.store.load(handle)?;
        let values = decode_values::<T>(&image)?;
        if values.len() != st.local_size {
            return Err(VectorError::InvalidFormat(format!(
                "segment {} restored {} values, expected {}",
                self.index,
                values.len(),
                st.local_size
            )));
        }
        st.data = Some(Arc::new(BackingArray::from_values(values)));
        st.status = PersistenceStatus::SwappedIn;
        tracing::debug!(index = self.index, handle = handle.0, "swapped in segment");
        Ok(())
    }

    fn swap_out_locked(
        &self,
        st: &mut MutexGuard<'_, SegmentState<T>>,
        handle: SegmentHandle,
    ) -> Result<()> {
        if !st.sealed {
            return Err(VectorError::illegal_state("swap-out of an open segment"));
        }
        // Sealed segments are immutable: once saved, the image stays valid.
        if st.status == PersistenceStatus::NotPersisted {
            let data = st
                .data
                .as_ref()
                .ok_or_else(|| VectorError::invariant("resident segment has no backing array"))?;
            let image = encode_values(data.as_slice());
            self.context.store.save(handle, &image)?;
        }
        st.data = None;
        st.status = PersistenceStatus::SwappedOut;
        tracing::debug!(index = self.index, handle = handle.0, "swapped out segment");
        Ok(())
    }

    /// Copy of the backing array, `None` while swapped out.
    pub fn snapshot(&self) -> Option<BackingArray<T>> {
        self.state.lock().data.as_deref().cloned()
    }
}

impl<T: Element> Swappable for VectorSegment<T> {
    fn handle(&self) -> Option<SegmentHandle> {
        self.handle.get().copied()
    }

    fn attach(&self, handle: SegmentHandle) {
        if self.handle.set(handle).is_err() {
            tracing::warn!(index = self.index, handle = handle.0, "segment already has a handle");
        }
    }

    fn footprint(&self) -> usize {
        self.state.lock().local_size * T::KIND.width()
    }

    fn is_resident(&self) -> bool {
        self.state.lock().status != PersistenceStatus::SwappedOut
    }

    fn try_swap_out(&self) -> Result<bool> {
        let Some(handle) = self.handle() else {
            return Ok(false);
        };
        let mut st = self.state.lock();
        if st.pins > 0 || !st.sealed || st.status == PersistenceStatus::SwappedOut {
            return Ok(false);
        }
        self.swap_out_locked(&mut st, handle)?;
        Ok(true)
    }
}

impl<T: Element> fmt::Debug for VectorSegment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("VectorSegment")
            .field("index", &self.index)
            .field("kind", &T::KIND)
            .field("len", &st.local_size)
            .field("sealed", &st.sealed)
            .field("status", &st.status)
            .field("pins", &st.pins)
            .field("handle", &self.handle.get())
            .finish()
    }
}

// ── SegmentGuard ───────────────────────────────────────────────────

/// A pinned view of a segment's backing array.
pub struct SegmentGuard<'a, T: Element> {
    segment: &'a VectorSegment<T>,
    data: Arc<BackingArray<T>>,
}

impl<'a, T: Element> SegmentGuard<'a, T> {
    pub fn segment(&self) -> &'a VectorSegment<T> {
        self.segment
    }

    pub fn values(&self) -> &[T] {
        self.data.as_slice()
    }
}

impl<'a, T: Element> Deref for SegmentGuard<'a, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data.as_slice()
    }
}

impl<'a, T: Element> Drop for SegmentGuard<'a, T> {
    fn drop(&mut self) {
        if let Err(e) = self.segment.release(false) {
            tracing::error!(index = self.segment.index, error = %e, "failed to release segment pin");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryBudget;

    fn sealed_segment(values: &[i32], context: SegmentContext) -> Arc<VectorSegment<i32>> {
        let seg = Arc::new(VectorSegment::new(0, values.len().max(1) * 2, context));
        seg.append_slice(values).unwrap();
        seg.seal();
        seg.submit().unwrap();
        seg
    }

    #[test]
    fn test_append_and_capacity() {
        let seg = VectorSegment::<i64>::new(0, 2, SegmentContext::ephemeral());
        seg.append(1).unwrap();
        seg.append(2).unwrap();
        let err = seg.append(3).unwrap_err();
        assert_eq!(err.code(), "CAPACITY_EXCEEDED");
        assert_eq!(seg.len(), 2);
        assert_eq!(seg.stats().count(), 2);
    }

    #[test]
    fn test_seal_is_idempotent_and_blocks_append() {
        let seg = VectorSegment::<i32>::new(0, 8, SegmentContext::ephemeral());
        seg.append(5).unwrap();
        seg.seal();
        seg.seal();
        assert!(seg.is_sealed());
        assert_eq!(seg.snapshot().unwrap().capacity(), 1);
        assert_eq!(seg.append(6).unwrap_err().code(), "ILLEGAL_STATE");
    }

    #[test]
    fn test_require_before_submit() {
        let seg = VectorSegment::<i32>::new(0, 8, SegmentContext::ephemeral());
        assert_eq!(seg.require().unwrap_err().code(), "MANAGER_NOT_READY");
        assert_eq!(seg.release(true).unwrap_err().code(), "MANAGER_NOT_READY");
    }

    #[test]
    fn test_submit_is_idempotent() {
        let seg = sealed_segment(&[1, 2, 3], SegmentContext::ephemeral());
        let h = seg.handle().unwrap();
        assert_eq!(seg.submit().unwrap(), h);
    }

    #[test]
    fn test_require_release_balance() {
        let seg = sealed_segment(&[1, 2, 3], SegmentContext::ephemeral());
        for _ in 0..5 {
            seg.require().unwrap();
        }
        assert_eq!(seg.pin_count(), 5);
        for _ in 0..5 {
            seg.release(false).unwrap();
        }
        assert_eq!(seg.pin_count(), 0);

        let err = seg.release(false).unwrap_err();
        assert_eq!(err.code(), "CONCURRENCY_INVARIANT_VIOLATION");
        seg.release(true).unwrap();
        assert_eq!(seg.pin_count(), 0);
    }

    #[test]
    fn test_swap_roundtrip() {
        let seg = sealed_segment(&[10, -20, 30], SegmentContext::ephemeral());
        let before = seg.snapshot().unwrap();

        assert!(seg.swap_out().unwrap());
        assert_eq!(seg.status(), PersistenceStatus::SwappedOut);
        assert!(seg.snapshot().is_none());
        assert!(!seg.swap_out().unwrap());

        seg.swap_in().unwrap();
        assert_eq!(seg.status(), PersistenceStatus::SwappedIn);
        assert_eq!(seg.snapshot().unwrap(), before);
    }

    #[test]
    fn test_require_swaps_in() {
        let seg = sealed_segment(&[4, 5, 6], SegmentContext::ephemeral());
        seg.swap_out().unwrap();
        let guard = seg.pin().unwrap();
        assert_eq!(&*guard, &[4, 5, 6]);
        assert_eq!(seg.status(), PersistenceStatus::SwappedIn);
        assert_eq!(seg.pin_count(), 1);
        drop(guard);
        assert_eq!(seg.pin_count(), 0);
    }

    #[test]
    fn test_swap_out_refused_while_pinned() {
        let seg = sealed_segment(&[1], SegmentContext::ephemeral());
        let guard = seg.pin().unwrap();
        assert_eq!(seg.swap_out().unwrap_err().code(), "ILLEGAL_STATE");
        assert!(!seg.try_swap_out().unwrap());
        drop(guard);
        assert!(seg.try_swap_out().unwrap());
    }

    #[test]
    fn test_budget_manager_evicts_unpinned_segment() {
        // Budget fits one 3-value i32 segment (12 bytes).
        let context = SegmentContext::new(
            Arc::new(BudgetMemoryManager::new(MemoryBudget::new(12))),
            Arc::new(MemoryBackingStore::new()),
        );
        let a = sealed_segment(&[1, 2, 3], context.clone());
        let b = sealed_segment(&[4, 5, 6], context.clone());
        assert_eq!(a.status(), PersistenceStatus::SwappedOut);
        assert_ne!(b.status(), PersistenceStatus::SwappedOut);

        // Pinning `a` brings it back and pushes `b` out.
        let guard = a.pin().unwrap();
        assert_eq!(&*guard, &[1, 2, 3]);
        assert_eq!(b.status(), PersistenceStatus::SwappedOut);
        drop(guard);
        assert_eq!(context.manager.resident_bytes(), 12);
    }
}
