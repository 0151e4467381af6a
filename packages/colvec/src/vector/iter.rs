//! Lazy iteration over a sealed vector, optionally through a selection.
//!
//! At most one segment is pinned at a time. With a selection bitmap, each
//! segment's row range is first checked against the bitmap by fast-forwarding
//! its position iterator; segments with no selected row are never pinned.

use crate::bitmap::PositionIter;
use crate::element::Element;
use crate::error::{Result, VectorError};
use crate::segment::SegmentGuard;
use crate::vector::SegmentedVector;

/// Iterator over the values of a sealed vector. Yields `Err` once (and then
/// stops) if a segment cannot be pinned or a selected position is past the
/// end of the vector.
pub struct VectorIter<'a, T: Element> {
    vector: &'a SegmentedVector<T>,
    selection: Option<PositionIter<'a>>,
    /// Next segment to open.
    next_segment: usize,
    guard: Option<SegmentGuard<'a, T>>,
    /// Absolute row of `guard[0]`.
    base: usize,
    /// Next local offset when iterating without a selection.
    offset: usize,
    done: bool,
}

impl<'a, T: Element> VectorIter<'a, T> {
    pub(crate) fn new(vector: &'a SegmentedVector<T>, selection: Option<PositionIter<'a>>) -> Self {
        Self {
            vector,
            selection,
            next_segment: 0,
            guard: None,
            base: 0,
            offset: 0,
            done: false,
        }
    }

    /// Value at the cursor of the currently pinned segment, if any remains.
    fn next_in_guard(&mut self) -> Option<T> {
        let guard = self.guard.as_ref()?;
        match self.selection.as_mut() {
            None => {
                let value = guard.get(self.offset).copied()?;
                self.offset += 1;
                Some(value)
            }
            Some(sel) => {
                let pos = sel.peek()? as usize;
                if pos >= self.base + guard.len() {
                    return None;
                }
                sel.next();
                Some(guard[pos - self.base])
            }
        }
    }

    /// Pin the next segment that has rows to visit. `Ok(false)` at the end.
    fn open_next(&mut self) -> Result<bool> {
        let vector = self.vector;
        let segment_size = vector.segment_size();
        while let Some(segment) = vector.segments.get(self.next_segment) {
            let start = self.next_segment * segment_size;
            let end = start + segment.len();
            self.next_segment += 1;

            if let Some(sel) = self.selection.as_mut() {
                let first = if start == 0 {
                    sel.peek().unwrap_or(u32::MAX)
                } else {
                    sel.fast_forward_past((start - 1) as u32, u32::MAX)
                };
                if first as usize >= end {
                    continue;
                }
            }

            self.guard = Some(segment.pin()?);
            self.base = start;
            self.offset = 0;
            return Ok(true);
        }

        if let Some(pos) = self.selection.as_mut().and_then(|sel| sel.next()) {
            return Err(VectorError::IndexOutOfRange {
                index: pos as usize,
                size: vector.len(),
            });
        }
        Ok(false)
    }
}

impl<'a, T: Element> Iterator for VectorIter<'a, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        loop {
            if let Some(value) = self.next_in_guard() {
                return Some(Ok(value));
            }
            // Unpin before moving on.
            self.guard = None;
            match self.open_next() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
