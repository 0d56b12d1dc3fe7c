use crate::{config::PoolingMode, geometry::Axis, shapes::Shape4D};

/// A malformed layer configuration. Always surfaced at setup time, and
/// always fatal for the layer instance.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("filter size is kernel_size OR kernel_h and kernel_w; not both")]
    KernelSizeAndKernelHw,
    #[error("for non-square filters both kernel_h and kernel_w are required")]
    MissingKernelDim,
    #[error("with global pooling the filter size cannot be specified")]
    GlobalPoolingWithKernel,
    #[error("pad is pad OR pad_h and pad_w are required")]
    AmbiguousPad,
    #[error("stride is stride OR stride_h and stride_w are required")]
    AmbiguousStride,
    #[error("input is empty ({0} axis)")]
    EmptyInput(Axis),
    #[error("filter dimensions cannot be zero ({0} axis)")]
    ZeroKernel(Axis),
    #[error("stride cannot be zero ({0} axis)")]
    ZeroStride(Axis),
    #[error("with global pooling only pad = 0 and stride = 1 are allowed")]
    GlobalPoolingGeometry,
    #[error("padding implemented only for average and max pooling, got {0:?}")]
    PaddingUnsupported(PoolingMode),
    #[error("pad {pad} must be less than kernel {kernel} ({axis} axis)")]
    PadNotLessThanKernel { axis: Axis, pad: usize, kernel: usize },
    #[error("kernel {kernel} exceeds padded input extent {padded} ({axis} axis)")]
    KernelExceedsInput {
        axis: Axis,
        kernel: usize,
        padded: usize,
    },
    #[error("last pooling window starts inside the padding ({0} axis)")]
    WindowStartsInPadding(Axis),
    #[error("input must have 4 axes (num, channels, height, width), got {0}")]
    WrongRank(usize),
    #[error("unknown pooling method {0:?}")]
    UnknownPoolingMode(String),
    #[error("malformed engine string {0:?}")]
    MalformedEngine(String),
    #[error("engine family {0:?} cannot run this layer")]
    UnsupportedEngineFamily(String),
    #[error("unknown sub-engine {0:?}")]
    UnknownSubEngine(String),
}

/// Represents a number of different errors that can occur from setting up
/// a pooling layer or building and running its primitives.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The layer configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The requested feature is recognized but has no implementation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Every candidate compute engine rejected the primitive.
    #[error("no compute engine could build a {primitive} primitive (tried {tried:?})")]
    NoEngineAvailable {
        primitive: &'static str,
        tried: Vec<String>,
    },
    /// Allocation of a buffer failed.
    #[error("out of memory")]
    OutOfMemory,
    /// Not enough elements were provided when creating or filling a buffer.
    #[error("expected {expected} elements, got {actual}")]
    WrongNumElements { expected: usize, actual: usize },
    /// Too few or too many input or output blobs were handed to the layer.
    #[error("expected {expected} {role} blobs, got {actual}")]
    WrongNumBlobs {
        role: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A blob doesn't have the shape the layer was set up for.
    #[error("expected shape {expected}, got {actual}")]
    ShapeMismatch { expected: Shape4D, actual: Shape4D },
    /// The layer was used before `setup` was called.
    #[error("layer used before setup")]
    NotSetUp,
    /// Backward needs the forward primitive descriptor, which doesn't exist yet.
    #[error("backward primitive requested before the forward primitive was built")]
    ForwardNotInitialized,
    /// An exported index mask holds a value that isn't an input offset.
    #[error("index mask entry {value} at {position} is not a valid input offset")]
    InvalidMask { position: usize, value: f64 },
    /// Max pooling backward needs the index mask of a training forward pass.
    #[error("max pooling backward requires the index mask of a training forward pass")]
    MissingWorkspace,
}
