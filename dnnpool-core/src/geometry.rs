//! Output size and padding arithmetic shared by the forward and backward
//! primitives.
//!
//! With nonzero padding the output size follows the ceiling convention
//! `ceil((in + pad_near + pad_far - kernel) / stride) + 1`, then
//! 1. the last window is clipped if it would start inside the padding, and
//! 2. the far pad (bottom/right) grows until the last window is fully covered.
//!
//! Without padding the output size is `floor((in - kernel) / stride) + 1`,
//! every window lies inside the input, and no adjustment happens.

use crate::{
    config::{KernelSpec, Padding, PoolConfig},
    error::ConfigError,
    shapes::Shape4D,
};

/// A spatial axis of a channel-first image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Height,
    Width,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Height => f.write_str("height"),
            Self::Width => f.write_str("width"),
        }
    }
}

/// Resolved sizes along one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisGeometry {
    pub input: usize,
    pub kernel: usize,
    pub stride: usize,
    pub pad_near: usize,
    pub pad_far: usize,
    pub output: usize,
}

impl AxisGeometry {
    /// Resolves one axis. `padded` selects the ceiling convention with
    /// clipping and far-pad growth; it is set when *any* side of the image
    /// is padded, so both axes are treated alike.
    pub fn resolve(
        axis: Axis,
        input: usize,
        kernel: usize,
        stride: usize,
        pad_near: usize,
        pad_far: usize,
        padded: bool,
    ) -> Result<Self, ConfigError> {
        if input == 0 {
            return Err(ConfigError::EmptyInput(axis));
        }
        if kernel == 0 {
            return Err(ConfigError::ZeroKernel(axis));
        }
        if stride == 0 {
            return Err(ConfigError::ZeroStride(axis));
        }
        let extent = input + pad_near + pad_far;
        if kernel > extent {
            return Err(ConfigError::KernelExceedsInput {
                axis,
                kernel,
                padded: extent,
            });
        }

        if !padded {
            return Ok(Self {
                input,
                kernel,
                stride,
                pad_near,
                pad_far,
                output: (extent - kernel) / stride + 1,
            });
        }

        let mut output = (extent - kernel).div_ceil(stride) + 1;
        if (output - 1) * stride >= input + pad_near {
            output -= 1;
        }
        if output == 0 || (output - 1) * stride >= input + pad_near {
            return Err(ConfigError::WindowStartsInPadding(axis));
        }

        // only the far side grows, so the clipping condition above still holds
        let covered = stride * (output - 1) + kernel;
        let pad_far = pad_far.max(covered.saturating_sub(input + pad_near));

        Ok(Self {
            input,
            kernel,
            stride,
            pad_near,
            pad_far,
            output,
        })
    }

    /// Start of window `o` relative to the unpadded input. Negative values lie
    /// in the near padding.
    #[inline(always)]
    pub fn window_start(&self, o: usize) -> isize {
        (o * self.stride) as isize - self.pad_near as isize
    }
}

/// Complete pooling geometry for one input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolGeometry {
    pub h: AxisGeometry,
    pub w: AxisGeometry,
}

impl PoolGeometry {
    /// Runs the geometry resolver for an input of `input_h` x `input_w`.
    pub fn resolve(config: &PoolConfig, input_h: usize, input_w: usize) -> Result<Self, ConfigError> {
        match config.kernel {
            KernelSpec::Global => {
                let h = AxisGeometry::resolve(Axis::Height, input_h, input_h, 1, 0, 0, false)?;
                let w = AxisGeometry::resolve(Axis::Width, input_w, input_w, 1, 0, 0, false)?;
                Ok(Self { h, w })
            }
            KernelSpec::Fixed {
                h: kernel_h,
                w: kernel_w,
            } => {
                let pad = config.pad;
                let padded = !pad.is_zero();
                let h = AxisGeometry::resolve(
                    Axis::Height,
                    input_h,
                    kernel_h,
                    config.stride_h,
                    pad.top,
                    pad.bottom,
                    padded,
                )?;
                let w = AxisGeometry::resolve(
                    Axis::Width,
                    input_w,
                    kernel_w,
                    config.stride_w,
                    pad.left,
                    pad.right,
                    padded,
                )?;
                Ok(Self { h, w })
            }
        }
    }

    pub fn kernel(&self) -> [usize; 2] {
        [self.h.kernel, self.w.kernel]
    }

    pub fn strides(&self) -> [usize; 2] {
        [self.h.stride, self.w.stride]
    }

    /// Final padding, including any far-side growth.
    pub fn padding(&self) -> Padding {
        Padding {
            top: self.h.pad_near,
            bottom: self.h.pad_far,
            left: self.w.pad_near,
            right: self.w.pad_far,
        }
    }

    pub fn output_shape(&self, input: &Shape4D) -> Shape4D {
        input.with_spatial(self.h.output, self.w.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolingMode, PoolingParameter};

    fn geometry(param: PoolingParameter, h: usize, w: usize) -> PoolGeometry {
        PoolGeometry::resolve(&param.resolve().unwrap(), h, w).unwrap()
    }

    #[test]
    fn test_2x2_stride_2_no_pad() {
        let g = geometry(PoolingParameter::new(PoolingMode::Max, 2, 2), 4, 4);
        assert_eq!((g.h.output, g.w.output), (2, 2));
        assert_eq!(g.padding(), Padding::default());
    }

    #[test]
    fn test_zero_padding_uses_floor() {
        // ceil would give 3 and grow the far pad; floor gives 2 and leaves it
        let g = geometry(PoolingParameter::new(PoolingMode::Max, 2, 2), 5, 7);
        assert_eq!((g.h.output, g.w.output), (2, 3));
        assert_eq!(g.padding(), Padding::default());
    }

    #[test]
    fn test_padding_clips_and_grows() {
        // in=5, k=3, s=2, p=1: ceil((5+2-3)/2)+1 = 3, last start 4 < 6 so no clip
        let g = geometry(PoolingParameter::new(PoolingMode::Max, 3, 2).with_pad(1), 5, 5);
        assert_eq!(g.h.output, 3);
        assert_eq!(g.padding(), Padding::symmetric(1, 1));

        // in=4, k=2, s=2, p=1: ceil(4/2)+1 = 3, start 4 >= 4+1? no.
        // window 2 covers [4, 6) of the padded extent 6, no growth needed
        let g = geometry(PoolingParameter::new(PoolingMode::Average, 2, 2).with_pad(1), 4, 4);
        assert_eq!(g.h.output, 3);
        assert_eq!(g.h.pad_far, 1);

        // in=6, k=3, s=3, p=2: ceil((6+4-3)/3)+1 = 4, start 9 >= 8 so clip to 3,
        // then last window [6, 9) fits in 6+2+2 = 10
        let g = geometry(PoolingParameter::new(PoolingMode::Max, 3, 3).with_pad(2), 6, 6);
        assert_eq!(g.h.output, 3);
        assert_eq!(g.h.pad_far, 2);

        // in=5, k=4, s=3, p=1: ceil((5+2-4)/3)+1 = 2, last window [3, 7) fits in 7
        // in=6, k=4, s=3, p=1: ceil((6+2-4)/3)+1 = 3, start 6 < 7, window [6, 10)
        // needs 10 - 6 - 1 = 3 far pad
        let g = geometry(PoolingParameter::new(PoolingMode::Max, 4, 3).with_pad(1), 6, 5);
        assert_eq!(g.h.output, 3);
        assert_eq!(g.h.pad_near, 1);
        assert_eq!(g.h.pad_far, 3);
        assert_eq!(g.w.output, 2);
        assert_eq!(g.w.pad_far, 1);
    }

    #[test]
    fn test_padding_on_one_axis_adjusts_both() {
        // pad only along width, but the height axis also follows the padded
        // convention: in=5, k=2, s=2 -> ceil(3/2)+1 = 3, start 4 < 5, grow to 1
        let g = geometry(
            PoolingParameter::new(PoolingMode::Max, 2, 2).with_pad_hw(0, 1),
            5,
            4,
        );
        assert_eq!(g.h.output, 3);
        assert_eq!(g.h.pad_near, 0);
        assert_eq!(g.h.pad_far, 1);
    }

    #[test]
    fn test_global_pooling_outputs_one() {
        for h in 1..8 {
            for w in 1..8 {
                let g = geometry(PoolingParameter::global(PoolingMode::Average), h, w);
                assert_eq!((g.h.output, g.w.output), (1, 1));
                assert_eq!(g.kernel(), [h, w]);
                assert_eq!(g.padding(), Padding::default());
            }
        }
    }

    #[test]
    fn test_kernel_larger_than_input() {
        let cfg = PoolingParameter::new(PoolingMode::Max, 5, 1).resolve().unwrap();
        assert_eq!(
            PoolGeometry::resolve(&cfg, 4, 8),
            Err(ConfigError::KernelExceedsInput {
                axis: Axis::Height,
                kernel: 5,
                padded: 4
            })
        );
    }

    #[test]
    fn test_empty_input_is_rejected() {
        // padding alone would make room for the kernel
        let cfg = PoolingParameter::new(PoolingMode::Max, 2, 1)
            .with_pad(1)
            .resolve()
            .unwrap();
        assert_eq!(
            PoolGeometry::resolve(&cfg, 0, 0),
            Err(ConfigError::EmptyInput(Axis::Height))
        );
        assert_eq!(
            PoolGeometry::resolve(&cfg, 3, 0),
            Err(ConfigError::EmptyInput(Axis::Width))
        );

        let cfg = PoolingParameter::global(PoolingMode::Average).resolve().unwrap();
        assert_eq!(
            PoolGeometry::resolve(&cfg, 0, 4),
            Err(ConfigError::EmptyInput(Axis::Height))
        );
    }

    #[test]
    fn test_padded_windows_always_covered() {
        for input in 1..10 {
            for kernel in 1..6 {
                for stride in 1..5 {
                    for pad in 0..kernel {
                        if kernel > input + 2 * pad {
                            continue;
                        }
                        let cfg = PoolingParameter::new(PoolingMode::Max, kernel, stride)
                            .with_pad(pad)
                            .resolve()
                            .unwrap();
                        let g = PoolGeometry::resolve(&cfg, input, input).unwrap();
                        for a in [g.h, g.w] {
                            assert!(a.output >= 1);
                            assert!(a.pad_far >= pad);
                            assert_eq!(a.pad_near, pad);
                            assert!(
                                a.input + a.pad_near + a.pad_far >= a.stride * (a.output - 1) + a.kernel
                            );
                            assert!((a.output - 1) * a.stride < a.input + a.pad_near);
                            if pad == 0 {
                                assert_eq!(a.output, (input - kernel) / stride + 1);
                                assert_eq!(a.pad_far, 0);
                            }
                        }
                    }
                }
            }
        }
    }
}
