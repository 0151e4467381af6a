//! Kind-tagged wrapper over the typed vectors, for callers that only know
//! a column's element kind at runtime.

use crate::bitmap::Bitmap;
use crate::element::ElementKind;
use crate::error::{Result, VectorError};
use crate::vector::typed::{
    ByteVector, DoubleVector, FloatVector, IntVector, LogicalVector, LongVector, ShortVector,
    StringVector,
};

#[derive(Debug)]
pub enum Column {
    Byte(ByteVector),
    Short(ShortVector),
    Int(IntVector),
    Long(LongVector),
    Float(FloatVector),
    Double(DoubleVector),
    Logical(LogicalVector),
    String(StringVector),
}

/// Run `$body` with `$v` bound to the inner vector, whatever its kind.
macro_rules! with_vector {
    ($column:expr, $v:ident => $body:expr) => {
        match $column {
            Column::Byte($v) => $body,
            Column::Short($v) => $body,
            Column::Int($v) => $body,
            Column::Long($v) => $body,
            Column::Float($v) => $body,
            Column::Double($v) => $body,
            Column::Logical($v) => $body,
            Column::String($v) => $body,
        }
    };
}

impl Column {
    pub fn kind(&self) -> ElementKind {
        match self {
            Column::Byte(_) => ElementKind::Byte,
            Column::Short(_) => ElementKind::Short,
            Column::Int(_) => ElementKind::Int,
            Column::Long(_) => ElementKind::Long,
            Column::Float(_) => ElementKind::Float,
            Column::Double(_) => ElementKind::Double,
            Column::Logical(_) => ElementKind::Boolean,
            Column::String(_) => ElementKind::String,
        }
    }

    pub fn len(&self) -> usize {
        with_vector!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sealed(&self) -> bool {
        with_vector!(self, v => v.is_sealed())
    }

    pub fn seal(&mut self) -> Result<()> {
        with_vector!(self, v => v.seal())
    }

    pub fn close(&self) -> Result<()> {
        with_vector!(self, v => v.close())
    }

    pub fn has_more_than_one_value(&self) -> Result<bool> {
        with_vector!(self, v => v.has_more_than_one_value())
    }

    /// Append a sealed column of the same kind.
    pub fn append_column(&mut self, other: &Column) -> Result<()> {
        match (self, other) {
            (Column::Byte(a), Column::Byte(b)) => a.append_vector(b),
            (Column::Short(a), Column::Short(b)) => a.append_vector(b),
            (Column::Int(a), Column::Int(b)) => a.append_vector(b),
            (Column::Long(a), Column::Long(b)) => a.append_vector(b),
            (Column::Float(a), Column::Float(b)) => a.append_vector(b),
            (Column::Double(a), Column::Double(b)) => a.append_vector(b),
            (Column::Logical(a), Column::Logical(b)) => a.append_vector(b),
            (Column::String(a), Column::String(b)) => a.append_vector(b),
            (target, source) => Err(VectorError::IncompatibleSegment {
                source_kind: source.kind(),
                target_kind: target.kind(),
            }),
        }
    }

    pub fn subset(&self, selection: &Bitmap) -> Result<Column> {
        Ok(match self {
            Column::Byte(v) => Column::Byte(v.subset(selection)?),
            Column::Short(v) => Column::Short(v.subset(selection)?),
            Column::Int(v) => Column::Int(v.subset(selection)?),
            Column::Long(v) => Column::Long(v.subset(selection)?),
            Column::Float(v) => Column::Float(v.subset(selection)?),
            Column::Double(v) => Column::Double(v.subset(selection)?),
            Column::Logical(v) => Column::Logical(v.subset(selection)?),
            Column::String(v) => Column::String(v.subset(selection)?),
        })
    }

    /// Mean for numeric columns, `None` otherwise.
    pub fn mean(&self) -> Result<Option<f64>> {
        match self {
            Column::Byte(v) => v.mean(),
            Column::Short(v) => v.mean(),
            Column::Int(v) => v.mean(),
            Column::Long(v) => v.mean(),
            Column::Float(v) => v.mean(),
            Column::Double(v) => v.mean(),
            Column::Logical(_) | Column::String(_) => Ok(None),
        }
    }

    /// Value at `index` rendered as text.
    pub fn get_display(&self, index: usize) -> Result<String> {
        match self {
            Column::String(v) => v.get(index),
            Column::Byte(v) => v.get(index).map(|x| x.to_string()),
            Column::Short(v) => v.get(index).map(|x| x.to_string()),
            Column::Int(v) => v.get(index).map(|x| x.to_string()),
            Column::Long(v) => v.get(index).map(|x| x.to_string()),
            Column::Float(v) => v.get(index).map(|x| x.to_string()),
            Column::Double(v) => v.get(index).map(|x| x.to_string()),
            Column::Logical(v) => v.get(index).map(|x| x.to_string()),
        }
    }
}

macro_rules! impl_from_vector {
    ($vector:ty, $variant:ident) => {
        impl From<$vector> for Column {
            fn from(v: $vector) -> Self {
                Column::$variant(v)
            }
        }
    };
}

impl_from_vector!(ByteVector, Byte);
impl_from_vector!(ShortVector, Short);
impl_from_vector!(IntVector, Int);
impl_from_vector!(LongVector, Long);
impl_from_vector!(FloatVector, Float);
impl_from_vector!(DoubleVector, Double);
impl_from_vector!(LogicalVector, Logical);
impl_from_vector!(StringVector, String);
