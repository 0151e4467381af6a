//! Compressed boolean sequence used for row selection.
//!
//! A `Bitmap` is an append-only sequence of booleans backed by a
//! [`RoaringBitmap`] holding the `true` positions, plus an explicit length
//! so that `not()` knows where the sequence ends. Positions are 0-based
//! absolute row indices into the owning vector.
//!
//! Row indices are `u32`, which bounds a selectable vector to ~4B rows.
//!
//! Once handed out as a query result a bitmap is treated as a value: the
//! boolean algebra (`and`, `or`, `not`) returns new bitmaps and never
//! mutates its operands.

use std::iter::Peekable;

use roaring::RoaringBitmap;

/// Append-only compressed bitmap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bitmap {
    bits: RoaringBitmap,
    len: u32,
}

impl Bitmap {
    /// Create an empty bitmap (length 0).
    pub fn new() -> Self {
        Self {
            bits: RoaringBitmap::new(),
            len: 0,
        }
    }

    /// Build from a sequence of booleans.
    pub fn from_bools<I: IntoIterator<Item = bool>>(values: I) -> Self {
        let mut bitmap = Self::new();
        for value in values {
            bitmap.append(value);
        }
        bitmap
    }

    /// Build a bitmap of length `len` with the given `true` positions.
    ///
    /// Positions at or beyond `len` are ignored.
    pub fn from_positions<I: IntoIterator<Item = u32>>(len: u32, positions: I) -> Self {
        let mut bits = RoaringBitmap::new();
        for pos in positions {
            if pos < len {
                bits.insert(pos);
            }
        }
        Self { bits, len }
    }

    /// Extend by one position at the end.
    pub fn append(&mut self, value: bool) -> &mut Self {
        debug_assert!(self.len < u32::MAX, "bitmap length exceeds u32 range");
        if value {
            // Appending in ascending order keeps this O(1) amortized.
            self.bits.push(self.len);
        }
        self.len += 1;
        self
    }

    /// Logical length (number of appended positions).
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of `true` positions.
    pub fn cardinality(&self) -> u64 {
        self.bits.len()
    }

    pub fn contains(&self, pos: u32) -> bool {
        self.bits.contains(pos)
    }

    /// Intersection. The result length is the longer operand's length.
    pub fn and(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            bits: &self.bits & &other.bits,
            len: self.len.max(other.len),
        }
    }

    /// Union. The result length is the longer operand's length.
    pub fn or(&self, other: &Bitmap) -> Bitmap {
        Bitmap {
            bits: &self.bits | &other.bits,
            len: self.len.max(other.len),
        }
    }

    /// Complement over `[0, len)`.
    pub fn not(&self) -> Bitmap {
        let mut all = RoaringBitmap::new();
        all.insert_range(0..self.len);
        Bitmap {
            bits: &all - &self.bits,
            len: self.len,
        }
    }

    /// Ascending `true` positions. Each call starts a fresh sequence.
    pub fn positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter()
    }

    /// Single-pass forward iterator supporting [`PositionIter::fast_forward_past`].
    pub fn position_iter(&self) -> PositionIter<'_> {
        PositionIter {
            inner: self.bits.iter().peekable(),
        }
    }

    /// Whether any `true` position falls in `[start, end)`.
    pub fn intersects_range(&self, start: u32, end: u32) -> bool {
        if start >= end {
            return false;
        }
        let before = if start == 0 { 0 } else { self.bits.rank(start - 1) };
        self.bits.rank(end - 1) > before
    }
}

// ── PositionIter ───────────────────────────────────────────────────

/// Forward-only iterator over ascending `true` positions.
pub struct PositionIter<'a> {
    inner: Peekable<roaring::bitmap::Iter<'a>>,
}

impl<'a> PositionIter<'a> {
    /// Next position without consuming it.
    pub fn peek(&mut self) -> Option<u32> {
        self.inner.peek().copied()
    }

    /// Skip to the first position greater than `last_index`.
    ///
    /// Returns that position without consuming it, or `default_if_exhausted`
    /// when no such position remains. Positions already passed are never
    /// revisited, so walking consecutive row ranges costs one pass overall.
    pub fn fast_forward_past(&mut self, last_index: u32, default_if_exhausted: u32) -> u32 {
        while let Some(&pos) = self.inner.peek() {
            if pos > last_index {
                return pos;
            }
            self.inner.next();
        }
        default_if_exhausted
    }
}

impl<'a> Iterator for PositionIter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bitmap {
        Bitmap::from_bools([
            false, false, true, false, true, true, true, false, true, false, false,
        ])
    }

    #[test]
    fn test_cardinality_and_positions() {
        let bm = sample();
        assert_eq!(bm.len(), 11);
        assert_eq!(bm.cardinality(), 5);
        assert_eq!(bm.positions().collect::<Vec<_>>(), vec![2, 4, 5, 6, 8]);
        // Restartable
        assert_eq!(bm.positions().count(), 5);
    }

    #[test]
    fn test_append_chaining() {
        let mut bm = Bitmap::new();
        bm.append(true).append(false).append(true);
        assert_eq!(bm.len(), 3);
        assert_eq!(bm.positions().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_and_not_is_empty() {
        let bm = sample();
        assert_eq!(bm.and(&bm.not()).cardinality(), 0);
    }

    #[test]
    fn test_or_not_is_full() {
        let bm = sample();
        let full = bm.or(&bm.not());
        assert_eq!(full.cardinality(), bm.len() as u64);
    }

    #[test]
    fn test_not_respects_length() {
        let bm = Bitmap::from_bools([true, false, false]);
        assert_eq!(bm.not().positions().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(Bitmap::new().not().cardinality(), 0);
    }

    #[test]
    fn test_and_or_mixed_lengths() {
        let a = Bitmap::from_positions(4, [0, 3]);
        let b = Bitmap::from_positions(10, [3, 9]);
        let and = a.and(&b);
        assert_eq!(and.len(), 10);
        assert_eq!(and.positions().collect::<Vec<_>>(), vec![3]);
        let or = a.or(&b);
        assert_eq!(or.positions().collect::<Vec<_>>(), vec![0, 3, 9]);
    }

    #[test]
    fn test_fast_forward_past() {
        let bm = sample();
        let mut it = bm.position_iter();
        assert_eq!(it.fast_forward_past(3, u32::MAX), 4);
        // Not consumed
        assert_eq!(it.peek(), Some(4));
        assert_eq!(it.fast_forward_past(6, u32::MAX), 8);
        assert_eq!(it.next(), Some(8));
        assert_eq!(it.fast_forward_past(8, u32::MAX), u32::MAX);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_intersects_range() {
        let bm = sample();
        assert!(!bm.intersects_range(0, 2));
        assert!(bm.intersects_range(0, 3));
        assert!(!bm.intersects_range(9, 11));
        assert!(!bm.intersects_range(5, 5));
    }

    #[test]
    fn test_from_positions_ignores_out_of_range() {
        let bm = Bitmap::from_positions(5, [1, 4, 5, 100]);
        assert_eq!(bm.cardinality(), 2);
    }
}
