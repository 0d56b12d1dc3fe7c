//! # dnnpool-core
//!
//! Building blocks for a 2d pooling layer that runs on pluggable compute
//! engines and exchanges tensors in engine-preferred memory layouts.
//!
//! The pieces, from the bottom up:
//! 1. [config] turns a user facing [config::PoolingParameter] into a
//!    validated [config::PoolConfig].
//! 2. [geometry] computes output sizes and final padding for an input shape.
//! 3. [tensor] and [layout] hold blobs whose buffers may carry a private copy
//!    in an optimized [layout::MemoryFormat], converting lazily.
//! 4. [primitive] describes forward and backward pooling operations.
//! 5. [engine] parses engine strings and picks the first engine that accepts
//!    a primitive.
//!
//! The layer that ties these together lives in the `dnnpool` crate.
//!
//! # Errors
//!
//! Everything fallible returns [error::Error]. Configuration problems are
//! [error::ConfigError], surfaced when the layer is set up. An engine
//! declining a primitive is an [engine::EngineError], which only becomes an
//! [error::Error] once every candidate has declined.
//!
//! # Logging
//!
//! Engine registration, selection and cache invalidation are reported through
//! [tracing]. Install any subscriber to see them.

pub mod config;
pub mod dtypes;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod primitive;
pub mod shapes;
pub mod tensor;

/// Contains subset of all public exports.
pub mod prelude {
    pub use crate::config::{LayerParameter, Phase, PoolingMode, PoolingParameter};
    pub use crate::dtypes::{DataType, Dtype};
    pub use crate::engine::{ComputeEngine, CpuEngine, EngineError, EngineRegistry, GpuEngine};
    pub use crate::error::{ConfigError, Error};
    pub use crate::layout::{LayoutDescriptor, MemoryFormat};
    pub use crate::shapes::Shape4D;
    pub use crate::tensor::Blob;
}
