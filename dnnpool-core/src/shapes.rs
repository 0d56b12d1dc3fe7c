//! Logical shapes of the 4d, channel-first tensors pooling operates on.

use crate::error::ConfigError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `(batch, channels, height, width)` shape.
///
/// This is the *logical* shape of a tensor. How the elements are laid out
/// in memory is described separately by a [crate::layout::MemoryFormat].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape4D {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape4D {
    pub const NUM_DIMS: usize = 4;

    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Builds a shape from a dynamic list of dims, as the framework hands them
    /// over. Anything that isn't exactly rank 4 is rejected.
    pub fn from_dims(dims: &[usize]) -> Result<Self, ConfigError> {
        match *dims {
            [n, c, h, w] => Ok(Self::new(n, c, h, w)),
            _ => Err(ConfigError::WrongRank(dims.len())),
        }
    }

    pub const fn dims(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Total number of logical elements.
    pub const fn num_elements(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Number of elements in one `(height, width)` plane.
    pub const fn plane_size(&self) -> usize {
        self.height * self.width
    }

    /// Row-major strides of the canonical layout.
    pub const fn strides(&self) -> [usize; 4] {
        [
            self.channels * self.height * self.width,
            self.height * self.width,
            self.width,
            1,
        ]
    }

    /// The same batch and channels with different spatial dims.
    pub const fn with_spatial(&self, height: usize, width: usize) -> Self {
        Self::new(self.batch, self.channels, height, width)
    }
}

impl std::fmt::Display for Shape4D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.batch, self.channels, self.height, self.width
        )
    }
}

impl From<[usize; 4]> for Shape4D {
    fn from([n, c, h, w]: [usize; 4]) -> Self {
        Self::new(n, c, h, w)
    }
}
