//! Typed vector aliases, the logical vector's bitmap form, and string
//! vectors backed by a dictionary.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::config::VectorOptions;
use crate::element::StringCode;
use crate::error::{Result, VectorError};
use crate::segment::SegmentContext;
use crate::string_table::StringDictionary;
use crate::vector::SegmentedVector;

pub type ByteVector = SegmentedVector<i8>;
pub type ShortVector = SegmentedVector<i16>;
pub type IntVector = SegmentedVector<i32>;
pub type LongVector = SegmentedVector<i64>;
pub type FloatVector = SegmentedVector<f32>;
pub type DoubleVector = SegmentedVector<f64>;
pub type LogicalVector = SegmentedVector<bool>;

// ── LogicalVector ──────────────────────────────────────────────────

impl SegmentedVector<bool> {
    /// Materialize as a bitmap of the `true` rows.
    pub fn to_bitmap(&self) -> Result<Bitmap> {
        self.filter(|v| v)
    }

    /// Sealed logical vector with one row per bitmap position.
    pub fn from_bitmap(context: SegmentContext, options: VectorOptions, bitmap: &Bitmap) -> Result<Self> {
        let mut vector = Self::new(context, options);
        let mut positions = bitmap.position_iter();
        for row in 0..bitmap.len() {
            let selected = positions.peek() == Some(row);
            if selected {
                positions.next();
            }
            vector.append(selected)?;
        }
        vector.seal()?;
        Ok(vector)
    }

    /// Number of `true` rows.
    pub fn count_true(&self) -> Result<u64> {
        Ok(self.to_bitmap()?.cardinality())
    }
}

// ── StringVector ───────────────────────────────────────────────────

/// String column: codes in a segmented vector, text in a dictionary.
pub struct StringVector {
    codes: SegmentedVector<StringCode>,
    dictionary: Arc<dyn StringDictionary>,
}

impl StringVector {
    pub fn new(
        context: SegmentContext,
        options: VectorOptions,
        dictionary: Arc<dyn StringDictionary>,
    ) -> Self {
        Self {
            codes: SegmentedVector::new(context, options),
            dictionary,
        }
    }

    pub fn codes(&self) -> &SegmentedVector<StringCode> {
        &self.codes
    }

    pub fn dictionary(&self) -> &Arc<dyn StringDictionary> {
        &self.dictionary
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.codes.is_sealed()
    }

    pub fn append(&mut self, value: &str) -> Result<()> {
        let code = self.dictionary.intern(value);
        self.codes.append(code)
    }

    /// Append a code already issued by this vector's dictionary.
    pub fn append_code(&mut self, code: StringCode) -> Result<()> {
        if code.0 as usize >= self.dictionary.len() {
            return Err(VectorError::InvalidFormat(format!(
                "string code {code} was never issued"
            )));
        }
        self.codes.append(code)
    }

    /// Append a sealed string vector. Codes are copied directly when both
    /// vectors share a dictionary and re-interned otherwise.
    pub fn append_vector(&mut self, other: &StringVector) -> Result<()> {
        if Arc::ptr_eq(&self.dictionary, &other.dictionary) {
            return self.codes.append_vector(&other.codes);
        }
        for value in other.iter()? {
            self.append(&value?)?;
        }
        Ok(())
    }

    pub fn seal(&mut self) -> Result<()> {
        self.codes.seal()
    }

    fn resolve(&self, code: StringCode) -> Result<String> {
        self.dictionary
            .resolve(code)
            .ok_or_else(|| VectorError::InvalidFormat(format!("unknown string code {code}")))
    }

    pub fn get(&self, index: usize) -> Result<String> {
        self.resolve(self.codes.get(index)?)
    }

    pub fn iter(&self) -> Result<impl Iterator<Item = Result<String>> + '_> {
        Ok(self
            .codes
            .iter()?
            .map(move |code| code.and_then(|c| self.resolve(c))))
    }

    pub fn to_vec(&self) -> Result<Vec<String>> {
        self.iter()?.collect()
    }

    pub fn subset(&self, selection: &Bitmap) -> Result<StringVector> {
        Ok(StringVector {
            codes: self.codes.subset(selection)?,
            dictionary: self.dictionary.clone(),
        })
    }

    /// Rows whose string satisfies `predicate`. Each distinct code is
    /// resolved and tested once.
    pub fn filter<F>(&self, predicate: F) -> Result<Bitmap>
    where
        F: Fn(&str) -> bool,
    {
        let mut verdicts: HashMap<StringCode, bool> = HashMap::new();
        let mut bitmap = Bitmap::new();
        for code in self.codes.iter()? {
            let code = code?;
            let hit = match verdicts.get(&code) {
                Some(&hit) => hit,
                None => {
                    let hit = predicate(&self.resolve(code)?);
                    verdicts.insert(code, hit);
                    hit
                }
            };
            bitmap.append(hit);
        }
        Ok(bitmap)
    }

    /// Distinct strings in lexicographic order.
    pub fn sorted_unique_values(&self, max_unique: usize) -> Result<Vec<String>> {
        let mut values = self
            .codes
            .sorted_unique_values(max_unique)?
            .into_iter()
            .map(|code| self.resolve(code))
            .collect::<Result<Vec<_>>>()?;
        values.sort();
        Ok(values)
    }

    pub fn has_more_than_one_value(&self) -> Result<bool> {
        self.codes.has_more_than_one_value()
    }

    pub fn close(&self) -> Result<()> {
        self.codes.close()
    }
}

impl fmt::Debug for StringVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringVector")
            .field("codes", &self.codes)
            .field("dictionary_len", &self.dictionary.len())
            .finish()
    }
}
