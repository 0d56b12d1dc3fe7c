//! Pooling primitives: descriptors an engine validates, and the bound
//! forward/backward operations built from them.
//!
//! A primitive is created in two steps, mirroring how a compute library
//! works: first a [PoolingDesc] states what to compute, then an engine turns
//! it into a primitive descriptor ([ForwardPrimitiveDesc] or
//! [BackwardPrimitiveDesc]) if it can run it. The backward descriptor is
//! always created with the forward one as a hint.

pub(crate) mod cpu_kernel;

use crate::{
    config::PoolingMode,
    dtypes::Dtype,
    engine::EngineRef,
    error::Error,
    geometry::PoolGeometry,
    layout::{LayoutDescriptor, MemoryFormat},
    shapes::Shape4D,
};

/// What a primitive is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropKind {
    /// Forward pass whose results feed a backward pass; max pooling records
    /// its argmax indices.
    ForwardTraining,
    /// Inference only forward pass.
    ForwardScoring,
    /// Gradient propagation.
    Backward,
}

/// Pooling algorithms a primitive can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    PoolingMax,
    /// Divisor is always the full kernel area, padded cells included.
    PoolingAvg,
}

impl TryFrom<PoolingMode> for Algorithm {
    type Error = Error;
    fn try_from(mode: PoolingMode) -> Result<Self, Self::Error> {
        match mode {
            PoolingMode::Max => Ok(Self::PoolingMax),
            PoolingMode::Average => Ok(Self::PoolingAvg),
            PoolingMode::Stochastic => Err(Error::NotImplemented("stochastic pooling")),
        }
    }
}

/// Shape of the argmax index buffer ("workspace") of a max pooling
/// primitive: one `u32` per output element, canonical order. Each entry is
/// the flat `h * width + w` position of the winner inside its input plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceDesc {
    pub shape: Shape4D,
}

impl WorkspaceDesc {
    pub fn len(&self) -> usize {
        self.shape.num_elements()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub(crate) fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        MemoryFormat::Nchw.offset(&self.shape, n, c, h, w)
    }
}

/// Everything an engine needs to decide whether it can run a pooling
/// operation.
///
/// For the backward direction `src` describes the input gradient and `dst`
/// the output gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolingDesc {
    pub prop_kind: PropKind,
    pub algorithm: Algorithm,
    pub src: LayoutDescriptor,
    pub dst: LayoutDescriptor,
    pub geometry: PoolGeometry,
}

impl PoolingDesc {
    pub fn forward(
        prop_kind: PropKind,
        algorithm: Algorithm,
        src: LayoutDescriptor,
        dst: LayoutDescriptor,
        geometry: PoolGeometry,
    ) -> Self {
        Self {
            prop_kind,
            algorithm,
            src,
            dst,
            geometry,
        }
    }

    pub fn backward(
        algorithm: Algorithm,
        diff_src: LayoutDescriptor,
        diff_dst: LayoutDescriptor,
        geometry: PoolGeometry,
    ) -> Self {
        Self {
            prop_kind: PropKind::Backward,
            algorithm,
            src: diff_src,
            dst: diff_dst,
            geometry,
        }
    }

    /// Whether a primitive built from this produces or consumes argmax
    /// indices.
    pub fn needs_workspace(&self) -> bool {
        self.algorithm == Algorithm::PoolingMax && self.prop_kind != PropKind::ForwardScoring
    }

    /// Workspace descriptor, if [PoolingDesc::needs_workspace].
    pub fn workspace(&self) -> Option<WorkspaceDesc> {
        self.needs_workspace()
            .then_some(WorkspaceDesc { shape: self.dst.shape })
    }
}

/// A forward pooling operation an engine agreed to run.
#[derive(Debug, Clone)]
pub struct ForwardPrimitiveDesc {
    desc: PoolingDesc,
    engine: EngineRef,
    workspace: Option<WorkspaceDesc>,
}

impl ForwardPrimitiveDesc {
    pub(crate) fn new(desc: PoolingDesc, engine: EngineRef) -> Self {
        let workspace = desc.workspace();
        Self {
            desc,
            engine,
            workspace,
        }
    }

    pub fn desc(&self) -> &PoolingDesc {
        &self.desc
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn workspace(&self) -> Option<&WorkspaceDesc> {
        self.workspace.as_ref()
    }
}

/// A backward pooling operation an engine agreed to run.
#[derive(Debug, Clone)]
pub struct BackwardPrimitiveDesc {
    desc: PoolingDesc,
    engine: EngineRef,
    workspace: Option<WorkspaceDesc>,
}

impl BackwardPrimitiveDesc {
    pub(crate) fn new(desc: PoolingDesc, engine: EngineRef) -> Self {
        let workspace = desc.workspace();
        Self {
            desc,
            engine,
            workspace,
        }
    }

    pub fn desc(&self) -> &PoolingDesc {
        &self.desc
    }

    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn workspace(&self) -> Option<&WorkspaceDesc> {
        self.workspace.as_ref()
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::WrongNumElements { expected, actual });
    }
    Ok(())
}

fn check_workspace(expected: Option<&WorkspaceDesc>, actual: Option<usize>) -> Result<(), Error> {
    match (expected, actual) {
        (None, _) => Ok(()),
        (Some(_), None) => Err(Error::MissingWorkspace),
        (Some(ws), Some(len)) => check_len(ws.len(), len),
    }
}

impl ForwardPrimitiveDesc {
    /// Verifies buffer sizes against the descriptors before anything runs.
    pub fn check_buffers(&self, src: usize, dst: usize, workspace: Option<usize>) -> Result<(), Error> {
        check_len(self.desc.src.buffer_len(), src)?;
        check_len(self.desc.dst.buffer_len(), dst)?;
        check_workspace(self.workspace(), workspace)
    }
}

impl BackwardPrimitiveDesc {
    /// Verifies buffer sizes against the descriptors before anything runs.
    pub fn check_buffers(
        &self,
        diff_dst: usize,
        workspace: Option<usize>,
        diff_src: usize,
    ) -> Result<(), Error> {
        check_len(self.desc.dst.buffer_len(), diff_dst)?;
        check_workspace(self.workspace(), workspace)?;
        check_len(self.desc.src.buffer_len(), diff_src)
    }
}

/// Executable forward pooling, bound to the engine that accepted it.
#[derive(Debug, Clone)]
pub struct PoolingForward {
    pd: ForwardPrimitiveDesc,
}

impl PoolingForward {
    pub fn new(pd: ForwardPrimitiveDesc) -> Self {
        Self { pd }
    }

    pub fn primitive_desc(&self) -> &ForwardPrimitiveDesc {
        &self.pd
    }

    /// Runs the primitive. Buffers are laid out as the descriptor's `src`
    /// and `dst` say; `workspace` receives the argmax indices when the
    /// descriptor asks for one.
    pub fn submit<E: Dtype>(
        &self,
        src: &[E],
        dst: &mut [E],
        workspace: Option<&mut [u32]>,
    ) -> Result<(), Error> {
        let src = E::as_f32(src).ok_or(Error::NotImplemented("double precision pooling"))?;
        let dst = E::as_f32_mut(dst).ok_or(Error::NotImplemented("double precision pooling"))?;
        self.pd.engine().execute_forward(&self.pd, src, dst, workspace)
    }
}

/// Executable backward pooling, bound to the engine that accepted it.
#[derive(Debug, Clone)]
pub struct PoolingBackward {
    pd: BackwardPrimitiveDesc,
}

impl PoolingBackward {
    pub fn new(pd: BackwardPrimitiveDesc) -> Self {
        Self { pd }
    }

    pub fn primitive_desc(&self) -> &BackwardPrimitiveDesc {
        &self.pd
    }

    /// Overwrites `diff_src` with the gradient of the pooling input.
    pub fn submit<E: Dtype>(
        &self,
        diff_dst: &[E],
        workspace: Option<&[u32]>,
        diff_src: &mut [E],
    ) -> Result<(), Error> {
        let diff_dst =
            E::as_f32(diff_dst).ok_or(Error::NotImplemented("double precision pooling"))?;
        let diff_src =
            E::as_f32_mut(diff_src).ok_or(Error::NotImplemented("double precision pooling"))?;
        self.pd
            .engine()
            .execute_backward(&self.pd, diff_dst, workspace, diff_src)
    }
}
