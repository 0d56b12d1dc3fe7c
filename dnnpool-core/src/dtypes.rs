//! Element types a blob can hold.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Runtime tag for the element type of a tensor, carried by every
/// [crate::layout::LayoutDescriptor].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    F32,
    F64,
}

impl DataType {
    pub const fn size_of(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Represents a data type or element of an array.
///
/// Blobs can be instantiated with any of these, but pooling primitives are
/// only ever built for `f32`.
pub trait Dtype:
    'static
    + Copy
    + Clone
    + std::fmt::Debug
    + std::fmt::Display
    + Default
    + PartialOrd
    + Send
    + Sync
    + num_traits::Float
    + num_traits::NumCast
    + std::ops::AddAssign
{
    const DATA_TYPE: DataType;

    /// Views a buffer as single precision, if that's what it holds.
    fn as_f32(buf: &[Self]) -> Option<&[f32]>;

    /// Mutable version of [Dtype::as_f32].
    fn as_f32_mut(buf: &mut [Self]) -> Option<&mut [f32]>;
}

impl Dtype for f32 {
    const DATA_TYPE: DataType = DataType::F32;
    fn as_f32(buf: &[Self]) -> Option<&[f32]> {
        Some(buf)
    }
    fn as_f32_mut(buf: &mut [Self]) -> Option<&mut [f32]> {
        Some(buf)
    }
}

impl Dtype for f64 {
    const DATA_TYPE: DataType = DataType::F64;
    fn as_f32(_: &[Self]) -> Option<&[f32]> {
        None
    }
    fn as_f32_mut(_: &mut [Self]) -> Option<&mut [f32]> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_tags() {
        assert_eq!(<f32 as Dtype>::DATA_TYPE, DataType::F32);
        assert_eq!(<f64 as Dtype>::DATA_TYPE, DataType::F64);
        assert_eq!(DataType::F64.size_of(), 8);
    }

    #[test]
    fn test_only_f32_views_as_f32() {
        assert_eq!(f32::as_f32(&[1.0f32, 2.0]), Some(&[1.0f32, 2.0][..]));
        assert_eq!(f64::as_f32(&[1.0f64]), None);
    }
}
