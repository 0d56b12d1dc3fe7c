//! Layer configuration as handed over by the surrounding framework, and its
//! resolution into an immutable [PoolConfig].
//!
//! The raw [PoolingParameter] mirrors the framework's layer message: every
//! field is optional, and several fields are mutually exclusive
//! (`kernel_size` vs `kernel_h`/`kernel_w`, and likewise for pad and stride).
//! [PoolingParameter::resolve] checks those rules once and produces the
//! per-axis values the geometry resolver works with.

use crate::{error::ConfigError, geometry::Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The reduction applied to each pooling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum PoolingMode {
    #[default]
    Max,
    #[cfg_attr(feature = "serde", serde(alias = "AVE", alias = "AVG"))]
    Average,
    /// Recognized, but no engine implements it.
    Stochastic,
}

impl PoolingMode {
    /// Whether this mode records an index mask during a training forward
    /// pass. This is the only place mode-specific buffer handling is decided.
    pub const fn uses_index_mask(&self) -> bool {
        matches!(self, Self::Max)
    }

    /// Only max and average pooling accept nonzero padding.
    pub const fn supports_padding(&self) -> bool {
        matches!(self, Self::Max | Self::Average)
    }
}

impl std::str::FromStr for PoolingMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAX" => Ok(Self::Max),
            "AVE" | "AVG" | "AVERAGE" => Ok(Self::Average),
            "STOCHASTIC" => Ok(Self::Stochastic),
            _ => Err(ConfigError::UnknownPoolingMode(s.to_string())),
        }
    }
}

/// Execution phase of the network the layer lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Phase {
    /// Forward-training propagation; max pooling records an index mask.
    #[default]
    Train,
    /// Forward-scoring propagation; no index mask is recorded.
    Test,
}

/// Raw pooling parameters. Unset fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolingParameter {
    pub pool: PoolingMode,
    pub kernel_size: Option<usize>,
    pub kernel_h: Option<usize>,
    pub kernel_w: Option<usize>,
    pub pad: Option<usize>,
    pub pad_h: Option<usize>,
    pub pad_w: Option<usize>,
    pub stride: Option<usize>,
    pub stride_h: Option<usize>,
    pub stride_w: Option<usize>,
    pub global_pooling: bool,
}

/// Everything the framework knows about one pooling layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayerParameter {
    pub name: String,
    pub phase: Phase,
    /// Ordered compute-engine candidates, e.g. `"MKLDNN:CPU"`. Empty selects
    /// the built-in CPU engine.
    pub engine: String,
    pub pooling: PoolingParameter,
}

impl LayerParameter {
    /// A training-phase layer on the default engine.
    pub fn new(name: impl Into<String>, pooling: PoolingParameter) -> Self {
        Self {
            name: name.into(),
            pooling,
            ..Default::default()
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }
}

/// Kernel extent, either fixed or taken from the input at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelSpec {
    Fixed { h: usize, w: usize },
    /// The kernel covers the whole input plane.
    Global,
}

/// Per-side padding. `bottom` and `right` may later be enlarged by the
/// geometry resolver; `top` and `left` never change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding {
    pub const fn symmetric(h: usize, w: usize) -> Self {
        Self {
            top: h,
            bottom: h,
            left: w,
            right: w,
        }
    }

    pub const fn is_zero(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// Validated pooling configuration. Immutable once the layer is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub mode: PoolingMode,
    pub kernel: KernelSpec,
    pub stride_h: usize,
    pub stride_w: usize,
    pub pad: Padding,
}

impl PoolConfig {
    pub const fn is_global(&self) -> bool {
        matches!(self.kernel, KernelSpec::Global)
    }
}

impl PoolingParameter {
    /// A fixed square kernel with the given stride and no padding.
    pub fn new(pool: PoolingMode, kernel_size: usize, stride: usize) -> Self {
        Self {
            pool,
            kernel_size: Some(kernel_size),
            stride: Some(stride),
            ..Default::default()
        }
    }

    /// Global pooling over the whole input plane.
    pub fn global(pool: PoolingMode) -> Self {
        Self {
            pool,
            global_pooling: true,
            ..Default::default()
        }
    }

    pub fn with_pad(mut self, pad: usize) -> Self {
        self.pad = Some(pad);
        self
    }

    pub fn with_pad_hw(mut self, pad_h: usize, pad_w: usize) -> Self {
        self.pad_h = Some(pad_h);
        self.pad_w = Some(pad_w);
        self
    }

    pub fn with_kernel_hw(mut self, kernel_h: usize, kernel_w: usize) -> Self {
        self.kernel_size = None;
        self.kernel_h = Some(kernel_h);
        self.kernel_w = Some(kernel_w);
        self
    }

    pub fn with_stride_hw(mut self, stride_h: usize, stride_w: usize) -> Self {
        self.stride = None;
        self.stride_h = Some(stride_h);
        self.stride_w = Some(stride_w);
        self
    }

    /// Checks the exclusivity rules and value constraints, producing a
    /// [PoolConfig].
    pub fn resolve(&self) -> Result<PoolConfig, ConfigError> {
        let kernel = if self.global_pooling {
            if self.kernel_size.is_some() || self.kernel_h.is_some() || self.kernel_w.is_some() {
                return Err(ConfigError::GlobalPoolingWithKernel);
            }
            KernelSpec::Global
        } else {
            let has_hw = self.kernel_h.is_some() && self.kernel_w.is_some();
            match (self.kernel_size, self.kernel_h, self.kernel_w) {
                (Some(_), _, _) if has_hw => return Err(ConfigError::KernelSizeAndKernelHw),
                (Some(k), None, None) => KernelSpec::Fixed { h: k, w: k },
                (None, Some(h), Some(w)) => KernelSpec::Fixed { h, w },
                _ => return Err(ConfigError::MissingKernelDim),
            }
        };

        let (pad_h, pad_w) = match (self.pad, self.pad_h, self.pad_w) {
            (None, Some(h), Some(w)) => (h, w),
            (p, None, None) => (p.unwrap_or(0), p.unwrap_or(0)),
            _ => return Err(ConfigError::AmbiguousPad),
        };
        let (stride_h, stride_w) = match (self.stride, self.stride_h, self.stride_w) {
            (None, Some(h), Some(w)) => (h, w),
            (s, None, None) => (s.unwrap_or(1), s.unwrap_or(1)),
            _ => return Err(ConfigError::AmbiguousStride),
        };

        if let KernelSpec::Fixed { h, w } = kernel {
            if h == 0 {
                return Err(ConfigError::ZeroKernel(Axis::Height));
            }
            if w == 0 {
                return Err(ConfigError::ZeroKernel(Axis::Width));
            }
        }
        if stride_h == 0 {
            return Err(ConfigError::ZeroStride(Axis::Height));
        }
        if stride_w == 0 {
            return Err(ConfigError::ZeroStride(Axis::Width));
        }

        if matches!(kernel, KernelSpec::Global)
            && (pad_h != 0 || pad_w != 0 || stride_h != 1 || stride_w != 1)
        {
            return Err(ConfigError::GlobalPoolingGeometry);
        }

        if pad_h != 0 || pad_w != 0 {
            if !self.pool.supports_padding() {
                return Err(ConfigError::PaddingUnsupported(self.pool));
            }
            if let KernelSpec::Fixed { h, w } = kernel {
                if pad_h >= h {
                    return Err(ConfigError::PadNotLessThanKernel {
                        axis: Axis::Height,
                        pad: pad_h,
                        kernel: h,
                    });
                }
                if pad_w >= w {
                    return Err(ConfigError::PadNotLessThanKernel {
                        axis: Axis::Width,
                        pad: pad_w,
                        kernel: w,
                    });
                }
            }
        }

        Ok(PoolConfig {
            mode: self.pool,
            kernel,
            stride_h,
            stride_w,
            pad: Padding::symmetric(pad_h, pad_w),
        })
    }
}
