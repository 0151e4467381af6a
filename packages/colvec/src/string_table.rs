//! String interning for string-typed vectors.
//!
//! String vectors store [`StringCode`]s; the dictionary maps each distinct
//! string to a stable 0-based code and back. `StringTable` stores the
//! deduplicated strings back to back:
//!
//! ```text
//! data:    [u8]              concatenated UTF-8
//! entries: [(offset, len)]   one per code, O(1) resolve
//! index:   str -> code       write-time deduplication
//! ```

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

use crate::element::StringCode;

/// Maps strings to stable integer codes and back.
pub trait StringDictionary: Send + Sync + fmt::Debug {
    /// Code for `s`, issuing a new one if `s` was never seen.
    fn intern(&self, s: &str) -> StringCode;

    /// Code for `s` if it was interned, without issuing a new one.
    fn lookup(&self, s: &str) -> Option<StringCode>;

    /// String for `code`, `None` if the code was never issued.
    fn resolve(&self, code: StringCode) -> Option<String>;

    /// Number of distinct strings.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct TableInner {
    /// Concatenated UTF-8 string bytes.
    data: String,
    /// (offset, length) pairs into `data`, one per code.
    entries: Vec<(u32, u32)>,
    index: HashMap<String, u32>,
}

/// Thread-safe string table with O(1) resolve and write-time deduplication.
#[derive(Debug, Default)]
pub struct StringTable {
    inner: RwLock<TableInner>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes of interned string data.
    pub fn data_len(&self) -> usize {
        self.inner.read().data.len()
    }
}

impl StringDictionary for StringTable {
    fn intern(&self, s: &str) -> StringCode {
        if let Some(&code) = self.inner.read().index.get(s) {
            return StringCode(code);
        }

        let mut inner = self.inner.write();
        // Another writer may have interned it between the two locks.
        if let Some(&code) = inner.index.get(s) {
            return StringCode(code);
        }

        debug_assert!(
            inner.data.len() + s.len() < u32::MAX as usize,
            "String table data exceeds u32 range"
        );

        let offset = inner.data.len() as u32;
        let code = inner.entries.len() as u32;
        inner.data.push_str(s);
        inner.entries.push((offset, s.len() as u32));
        inner.index.insert(s.to_string(), code);
        StringCode(code)
    }

    fn lookup(&self, s: &str) -> Option<StringCode> {
        self.inner.read().index.get(s).map(|&c| StringCode(c))
    }

    fn resolve(&self, code: StringCode) -> Option<String> {
        let inner = self.inner.read();
        let (offset, length) = *inner.entries.get(code.0 as usize)?;
        let start = offset as usize;
        inner
            .data
            .get(start..start + length as usize)
            .map(str::to_string)
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_string_table_empty() {
        let st = StringTable::new();
        assert_eq!(st.len(), 0);
        assert!(st.is_empty());
        assert_eq!(st.resolve(StringCode(0)), None);
    }

    #[test]
    fn test_intern_dedup() {
        let st = StringTable::new();
        let a = st.intern("alpha");
        let b = st.intern("beta");
        let a2 = st.intern("alpha");
        assert_eq!(a, StringCode(0));
        assert_eq!(b, StringCode(1));
        assert_eq!(a, a2);
        assert_eq!(st.len(), 2);
        assert_eq!(st.data_len(), "alphabeta".len());
    }

    #[test]
    fn test_resolve_and_lookup() {
        let st = StringTable::new();
        let code = st.intern("héllo wörld");
        st.intern("");
        assert_eq!(st.resolve(code).as_deref(), Some("héllo wörld"));
        assert_eq!(st.resolve(StringCode(1)).as_deref(), Some(""));
        assert_eq!(st.lookup("héllo wörld"), Some(code));
        assert_eq!(st.lookup("missing"), None);
    }

    #[test]
    fn test_concurrent_intern_is_consistent() {
        let st = Arc::new(StringTable::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let st = Arc::clone(&st);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| st.intern(&format!("s{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<StringCode>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(st.len(), 100);
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
    }
}
