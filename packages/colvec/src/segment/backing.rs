//! Fixed-capacity typed storage for one segment.

use std::ops::Deref;

use crate::element::Element;
use crate::error::{Result, VectorError};

/// Backing array of a segment. Never grows past its capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct BackingArray<T> {
    values: Vec<T>,
    capacity: usize,
}

impl<T: Element> BackingArray<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Wrap restored values; capacity equals length (sealed shape).
    pub fn from_values(values: Vec<T>) -> Self {
        let capacity = values.len();
        Self { values, capacity }
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.values.len() >= self.capacity {
            return Err(VectorError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.values.push(value);
        Ok(())
    }

    /// Append a whole chunk, all or nothing.
    pub fn extend_from_slice(&mut self, chunk: &[T]) -> Result<()> {
        if chunk.len() > self.remaining() {
            return Err(VectorError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.values.extend_from_slice(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.values.len()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Shrink capacity to the actual element count.
    pub fn trim(&mut self) {
        self.values.shrink_to_fit();
        self.capacity = self.values.len();
    }

    /// Resident size in bytes.
    pub fn footprint(&self) -> usize {
        self.capacity * T::KIND.width()
    }
}

impl<T> Deref for BackingArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut arr = BackingArray::<i32>::with_capacity(2);
        arr.push(1).unwrap();
        arr.push(2).unwrap();
        assert!(arr.is_full());
        let err = arr.push(3).unwrap_err();
        assert_eq!(err.code(), "CAPACITY_EXCEEDED");
        assert_eq!(arr.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let mut arr = BackingArray::<i16>::with_capacity(4);
        arr.extend_from_slice(&[1, 2, 3]).unwrap();
        assert!(arr.extend_from_slice(&[4, 5]).is_err());
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.remaining(), 1);
    }

    #[test]
    fn test_trim() {
        let mut arr = BackingArray::<f64>::with_capacity(100);
        arr.push(1.0).unwrap();
        assert_eq!(arr.footprint(), 800);
        arr.trim();
        assert_eq!(arr.capacity(), 1);
        assert_eq!(arr.footprint(), 8);
        assert!(arr.push(2.0).is_err());
    }
}
