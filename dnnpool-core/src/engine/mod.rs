//! Compute engines, and choosing one for a primitive.
//!
//! An engine is anything that can accept or reject a [PoolingDesc] and run
//! the primitives it accepted. Layers name the engines they are willing to
//! use in an engine string ([EngineParser]); names are looked up in an
//! [EngineRegistry]; the resolved list is tried in order by
//! [select_forward] and [select_backward], and the first engine that
//! accepts wins.

mod parser;
mod registry;
mod select;

pub use parser::{EngineParser, DEFAULT_ENGINE, ENGINE_FAMILY};
pub use registry::EngineRegistry;
pub use select::{select_backward, select_forward, Rejection, Selection};

use std::sync::Arc;

use crate::{
    dtypes::DataType,
    error::Error,
    layout::MemoryFormat,
    primitive::{cpu_kernel, BackwardPrimitiveDesc, ForwardPrimitiveDesc, PoolingDesc},
};

/// Shared handle to an engine. Primitive descriptors keep the engine that
/// created them alive.
pub type EngineRef = Arc<dyn ComputeEngine>;

/// Why an engine declined to create a primitive. Never fatal on its own,
/// the selector moves on to the next candidate.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("data type {0:?} is not supported")]
    UnsupportedDataType(DataType),
    #[error("memory format {0:?} is not supported")]
    UnsupportedFormat(MemoryFormat),
    #[error("source and destination formats differ ({src:?} vs {dst:?})")]
    FormatMismatch {
        src: MemoryFormat,
        dst: MemoryFormat,
    },
    #[error("descriptor shapes disagree with the pooling geometry")]
    InconsistentShapes,
    #[error("backward hint was created by engine {0:?}")]
    HintMismatch(String),
    #[error("engine is not available on this machine")]
    Unavailable,
    #[error("{0}")]
    Rejected(String),
}

/// A device or library able to run pooling primitives.
///
/// `create_forward` and `create_backward` decide whether the engine can run
/// a descriptor. The `execute_*` methods default to the reference CPU
/// kernels, so an engine that runs on the host only has to implement the
/// checks.
pub trait ComputeEngine: std::fmt::Debug + Send + Sync {
    /// Name used in engine strings. Matched case-insensitively.
    fn name(&self) -> &str;

    fn create_forward(&self, desc: &PoolingDesc) -> Result<(), EngineError>;

    /// `hint` is the forward primitive descriptor the backward pass pairs
    /// with.
    fn create_backward(
        &self,
        desc: &PoolingDesc,
        hint: &ForwardPrimitiveDesc,
    ) -> Result<(), EngineError>;

    fn execute_forward(
        &self,
        pd: &ForwardPrimitiveDesc,
        src: &[f32],
        dst: &mut [f32],
        workspace: Option<&mut [u32]>,
    ) -> Result<(), Error> {
        pd.check_buffers(src.len(), dst.len(), workspace.as_deref().map(<[u32]>::len))?;
        let workspace = pd.workspace().zip(workspace);
        cpu_kernel::forward(pd.desc(), src, dst, workspace);
        Ok(())
    }

    fn execute_backward(
        &self,
        pd: &BackwardPrimitiveDesc,
        diff_dst: &[f32],
        workspace: Option<&[u32]>,
        diff_src: &mut [f32],
    ) -> Result<(), Error> {
        pd.check_buffers(diff_dst.len(), workspace.map(<[u32]>::len), diff_src.len())?;
        let workspace = pd.workspace().zip(workspace);
        cpu_kernel::backward(pd.desc(), diff_dst, workspace, diff_src);
        Ok(())
    }
}

/// Checks shared by every engine that runs the reference kernels.
pub fn check_host_support(desc: &PoolingDesc, formats: &[MemoryFormat]) -> Result<(), EngineError> {
    for d in [&desc.src, &desc.dst] {
        if d.data_type != DataType::F32 {
            return Err(EngineError::UnsupportedDataType(d.data_type));
        }
        if !formats.contains(&d.format) {
            return Err(EngineError::UnsupportedFormat(d.format));
        }
    }
    if desc.src.format != desc.dst.format {
        return Err(EngineError::FormatMismatch {
            src: desc.src.format,
            dst: desc.dst.format,
        });
    }
    let g = &desc.geometry;
    let src = desc.src.shape;
    if (src.height, src.width) != (g.h.input, g.w.input) || desc.dst.shape != g.output_shape(&src) {
        return Err(EngineError::InconsistentShapes);
    }
    Ok(())
}

/// Checks that a backward descriptor pairs with the forward primitive it
/// was hinted with.
pub fn check_hint(
    engine: &dyn ComputeEngine,
    desc: &PoolingDesc,
    hint: &ForwardPrimitiveDesc,
) -> Result<(), EngineError> {
    if !hint.engine_name().eq_ignore_ascii_case(engine.name()) {
        return Err(EngineError::HintMismatch(hint.engine_name().to_string()));
    }
    let fwd = hint.desc();
    if fwd.algorithm != desc.algorithm
        || fwd.geometry != desc.geometry
        || fwd.src.shape != desc.src.shape
        || fwd.dst.shape != desc.dst.shape
    {
        return Err(EngineError::InconsistentShapes);
    }
    Ok(())
}

/// The host engine. Runs single precision pooling in canonical,
/// channels-last and channel-blocked layouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuEngine;

impl CpuEngine {
    pub const NAME: &'static str = "CPU";
    pub const FORMATS: [MemoryFormat; 3] =
        [MemoryFormat::Nchw, MemoryFormat::Nhwc, MemoryFormat::NChw8c];
}

impl ComputeEngine for CpuEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_forward(&self, desc: &PoolingDesc) -> Result<(), EngineError> {
        check_host_support(desc, &Self::FORMATS)
    }

    fn create_backward(
        &self,
        desc: &PoolingDesc,
        hint: &ForwardPrimitiveDesc,
    ) -> Result<(), EngineError> {
        check_host_support(desc, &Self::FORMATS)?;
        check_hint(self, desc, hint)
    }
}

/// Placeholder for an accelerator engine. It is registered so engine
/// strings may name it, but rejects every primitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct GpuEngine;

impl GpuEngine {
    pub const NAME: &'static str = "GPU";
}

impl ComputeEngine for GpuEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_forward(&self, _: &PoolingDesc) -> Result<(), EngineError> {
        Err(EngineError::Unavailable)
    }

    fn create_backward(&self, _: &PoolingDesc, _: &ForwardPrimitiveDesc) -> Result<(), EngineError> {
        Err(EngineError::Unavailable)
    }

    fn execute_forward(
        &self,
        _: &ForwardPrimitiveDesc,
        _: &[f32],
        _: &mut [f32],
        _: Option<&mut [u32]>,
    ) -> Result<(), Error> {
        Err(Error::NotImplemented("gpu pooling"))
    }

    fn execute_backward(
        &self,
        _: &BackwardPrimitiveDesc,
        _: &[f32],
        _: Option<&[u32]>,
        _: &mut [f32],
    ) -> Result<(), Error> {
        Err(Error::NotImplemented("gpu pooling"))
    }
}
