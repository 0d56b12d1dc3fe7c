//! Physical memory layouts and the machinery that moves data between them.
//!
//! Every tensor has one *public* layout, the canonical [MemoryFormat::Nchw]
//! that generic consumers expect, and may additionally carry a *private*
//! copy in an optimized layout chosen by a compute engine. Conversions
//! ("reorders") only happen when a reader wants a layout the tensor's
//! authoritative copy isn't in. See [LayoutBridge] for the protocol.

mod bridge;
mod reorder;

pub use bridge::{BufferRole, LayoutBridge};
pub use reorder::{reorder, reorder_into};

use crate::{dtypes::DataType, shapes::Shape4D};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width of a channel block in [MemoryFormat::NChw8c].
pub const CHANNEL_BLOCK: usize = 8;

/// Physical arrangement of a 4d tensor in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemoryFormat {
    /// Canonical batch-channel-height-width, row major.
    #[default]
    Nchw,
    /// Channels last.
    Nhwc,
    /// Channels split into blocks of [CHANNEL_BLOCK], with the block as the
    /// innermost dimension. The channel count is padded up to a whole block.
    NChw8c,
}

impl MemoryFormat {
    pub const fn is_canonical(&self) -> bool {
        matches!(self, Self::Nchw)
    }

    /// Number of elements a buffer in this format needs, including the
    /// channel padding of blocked formats.
    pub const fn buffer_len(&self, shape: &Shape4D) -> usize {
        match self {
            Self::Nchw | Self::Nhwc => shape.num_elements(),
            Self::NChw8c => {
                shape.batch * padded_channels(shape.channels) * shape.height * shape.width
            }
        }
    }

    /// Physical offset of logical element `(n, c, h, w)`.
    #[inline(always)]
    pub const fn offset(&self, shape: &Shape4D, n: usize, c: usize, h: usize, w: usize) -> usize {
        let (chan, height, width) = (shape.channels, shape.height, shape.width);
        match self {
            Self::Nchw => ((n * chan + c) * height + h) * width + w,
            Self::Nhwc => ((n * height + h) * width + w) * chan + c,
            Self::NChw8c => {
                let blocks = padded_channels(chan) / CHANNEL_BLOCK;
                let (cb, ci) = (c / CHANNEL_BLOCK, c % CHANNEL_BLOCK);
                (((n * blocks + cb) * height + h) * width + w) * CHANNEL_BLOCK + ci
            }
        }
    }
}

const fn padded_channels(channels: usize) -> usize {
    channels.div_ceil(CHANNEL_BLOCK) * CHANNEL_BLOCK
}

/// Logical shape, element type and physical format of one tensor endpoint.
///
/// Two descriptors for the same tensor compare equal only when their formats
/// coincide, in which case no conversion between them is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayoutDescriptor {
    pub shape: Shape4D,
    pub data_type: DataType,
    pub format: MemoryFormat,
}

impl LayoutDescriptor {
    pub const fn new(shape: Shape4D, data_type: DataType, format: MemoryFormat) -> Self {
        Self {
            shape,
            data_type,
            format,
        }
    }

    /// The canonical (public) descriptor of a shape.
    pub const fn canonical(shape: Shape4D, data_type: DataType) -> Self {
        Self::new(shape, data_type, MemoryFormat::Nchw)
    }

    /// The same element type and format, for a different shape.
    pub const fn with_shape(&self, shape: Shape4D) -> Self {
        Self::new(shape, self.data_type, self.format)
    }

    pub const fn buffer_len(&self) -> usize {
        self.format.buffer_len(&self.shape)
    }

    #[inline(always)]
    pub const fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        self.format.offset(&self.shape, n, c, h, w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_a_bijection() {
        let shape = Shape4D::new(2, 3, 2, 3);
        for format in [MemoryFormat::Nchw, MemoryFormat::Nhwc, MemoryFormat::NChw8c] {
            let mut seen = vec![false; format.buffer_len(&shape)];
            for n in 0..2 {
                for c in 0..3 {
                    for h in 0..2 {
                        for w in 0..3 {
                            let o = format.offset(&shape, n, c, h, w);
                            assert!(!seen[o], "{format:?} maps two elements to {o}");
                            seen[o] = true;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_blocked_format_pads_channels() {
        let shape = Shape4D::new(1, 3, 2, 2);
        assert_eq!(MemoryFormat::NChw8c.buffer_len(&shape), 32);
        assert_eq!(MemoryFormat::Nhwc.buffer_len(&shape), 12);
        assert_eq!(MemoryFormat::NChw8c.offset(&shape, 0, 2, 1, 1), 26);
    }

    #[test]
    fn test_descriptor_equality_tracks_format() {
        let shape = Shape4D::new(1, 2, 3, 4);
        let a = LayoutDescriptor::canonical(shape, DataType::F32);
        let b = LayoutDescriptor::new(shape, DataType::F32, MemoryFormat::Nhwc);
        assert_ne!(a, b);
        assert_eq!(a, LayoutDescriptor { format: MemoryFormat::Nchw, ..b });
    }
}
