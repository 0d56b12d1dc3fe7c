use std::marker::PhantomData;

use dnnpool_core::{
    config::{LayerParameter, Phase, PoolConfig},
    dtypes::{DataType, Dtype},
    engine::{select_backward, select_forward, EngineParser, EngineRef, EngineRegistry},
    error::Error,
    geometry::PoolGeometry,
    layout::{BufferRole, LayoutBridge, LayoutDescriptor},
    primitive::{
        Algorithm, ForwardPrimitiveDesc, PoolingBackward, PoolingDesc, PoolingForward, PropKind,
    },
    shapes::Shape4D,
    tensor::{try_alloc_elem, Blob},
};

use super::{check_num_blobs, Layer};

/// Lifecycle of a lazily built primitive. Moves to `Ready` on first use and
/// back to `Uninitialized` only through [PoolingLayer::invalidate].
#[derive(Debug)]
enum PrimitiveState<P> {
    Uninitialized,
    Ready(P),
}

impl<P> PrimitiveState<P> {
    fn ready(&self) -> Option<&P> {
        match self {
            Self::Ready(p) => Some(p),
            Self::Uninitialized => None,
        }
    }

    fn get_or_try_init(&mut self, init: impl FnOnce() -> Result<P, Error>) -> Result<&P, Error> {
        if let Self::Uninitialized = self {
            *self = Self::Ready(init()?);
        }
        self.ready().ok_or(Error::NotSetUp)
    }
}

#[derive(Debug)]
struct ForwardState {
    primitive: PoolingForward,
    src: LayoutBridge,
    dst: LayoutBridge,
}

#[derive(Debug)]
struct BackwardState {
    primitive: PoolingBackward,
    diff_src: LayoutBridge,
    diff_dst: LayoutBridge,
}

/// Storage of the max pooling index mask, decided once at setup.
///
/// With a second top blob the mask is exported there after every forward
/// pass and read back before every backward pass; the vector then only
/// stages the indices.
#[derive(Debug)]
enum MaskBuffer {
    None,
    Owned(Vec<u32>),
    TopBlob(Vec<u32>),
}

impl MaskBuffer {
    fn new(uses_index_mask: bool, num_top: usize) -> Self {
        match (uses_index_mask, num_top) {
            (false, _) => Self::None,
            (true, 1) => Self::Owned(Vec::new()),
            (true, _) => Self::TopBlob(Vec::new()),
        }
    }

    fn resize(&mut self, len: usize) -> Result<(), Error> {
        match self {
            Self::None => {}
            Self::Owned(buf) | Self::TopBlob(buf) => {
                if buf.len() != len {
                    *buf = try_alloc_elem(len, 0)?;
                }
            }
        }
        Ok(())
    }

    fn as_slice(&self) -> Option<&[u32]> {
        match self {
            Self::None => None,
            Self::Owned(buf) | Self::TopBlob(buf) => Some(buf),
        }
    }

    fn as_mut_slice(&mut self) -> Option<&mut [u32]> {
        match self {
            Self::None => None,
            Self::Owned(buf) | Self::TopBlob(buf) => Some(buf),
        }
    }
}

/// What setup resolved from the layer parameters.
#[derive(Debug)]
struct Resolved {
    config: PoolConfig,
    engines: Vec<EngineRef>,
}

/// What reshape derived from the current input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shapes {
    input: Shape4D,
    output: Shape4D,
    geometry: PoolGeometry,
}

/// 2d max or average pooling over `(batch, channels, height, width)` blobs.
///
/// Configuration and geometry are resolved by [Layer::setup]. The forward
/// and backward primitives are built lazily on the first pass, bound to the
/// first engine of the layer's engine string that accepts them, and reused
/// until the input shape changes or [PoolingLayer::invalidate] is called.
///
/// Max pooling takes an optional second top blob. When given, the index
/// mask is written there (indices stored as element values), otherwise the
/// layer keeps it internally.
#[derive(Debug)]
pub struct PoolingLayer<E> {
    param: LayerParameter,
    registry: EngineRegistry,
    resolved: Option<Resolved>,
    shapes: Option<Shapes>,
    mask: MaskBuffer,
    fwd: PrimitiveState<ForwardState>,
    bwd: PrimitiveState<BackwardState>,
    marker: PhantomData<E>,
}

impl<E: Dtype> PoolingLayer<E> {
    /// A layer drawing its engines from the default registry.
    pub fn new(param: LayerParameter) -> Self {
        Self::with_registry(param, EngineRegistry::default())
    }

    pub fn with_registry(param: LayerParameter, registry: EngineRegistry) -> Self {
        Self {
            param,
            registry,
            resolved: None,
            shapes: None,
            mask: MaskBuffer::None,
            fwd: PrimitiveState::Uninitialized,
            bwd: PrimitiveState::Uninitialized,
            marker: PhantomData,
        }
    }

    pub fn param(&self) -> &LayerParameter {
        &self.param
    }

    pub fn geometry(&self) -> Option<&PoolGeometry> {
        self.shapes.as_ref().map(|s| &s.geometry)
    }

    pub fn output_shape(&self) -> Option<Shape4D> {
        self.shapes.map(|s| s.output)
    }

    /// Engine the forward primitive is bound to, once built.
    pub fn forward_engine(&self) -> Option<&str> {
        self.fwd
            .ready()
            .map(|s| s.primitive.primitive_desc().engine_name())
    }

    /// Engine the backward primitive is bound to, once built.
    pub fn backward_engine(&self) -> Option<&str> {
        self.bwd
            .ready()
            .map(|s| s.primitive.primitive_desc().engine_name())
    }

    /// Argmax indices of the last training forward pass, one per output
    /// element in canonical order. `None` for average pooling.
    pub fn mask(&self) -> Option<&[u32]> {
        self.mask.as_slice()
    }

    /// Output shape for an input of the given dims, without touching the
    /// layer's state.
    pub fn infer_output_shape(&self, bottom_dims: &[usize]) -> Result<Shape4D, Error> {
        let input = Shape4D::from_dims(bottom_dims)?;
        let config = self.param.pooling.resolve()?;
        let geometry = PoolGeometry::resolve(&config, input.height, input.width)?;
        Ok(geometry.output_shape(&input))
    }

    /// Drops the cached primitives. They are rebuilt on the next pass.
    pub fn invalidate(&mut self) {
        if self.fwd.ready().is_some() || self.bwd.ready().is_some() {
            tracing::debug!(layer = %self.param.name, "invalidating cached pooling primitives");
        }
        self.fwd = PrimitiveState::Uninitialized;
        self.bwd = PrimitiveState::Uninitialized;
    }
}

fn check_shape(expected: Shape4D, actual: &Shape4D) -> Result<(), Error> {
    if expected != *actual {
        return Err(Error::ShapeMismatch {
            expected,
            actual: *actual,
        });
    }
    Ok(())
}

fn missing(role: &'static str, expected: usize) -> Error {
    Error::WrongNumBlobs {
        role,
        expected,
        actual: 0,
    }
}

fn init_forward<E: Dtype>(
    resolved: &Resolved,
    shapes: &Shapes,
    phase: Phase,
    input: &Blob<E>,
) -> Result<ForwardState, Error> {
    if E::DATA_TYPE != DataType::F32 {
        return Err(Error::NotImplemented("double precision pooling"));
    }
    let algorithm = Algorithm::try_from(resolved.config.mode)?;
    let prop_kind = match phase {
        Phase::Train => PropKind::ForwardTraining,
        Phase::Test => PropKind::ForwardScoring,
    };

    // the producer's layout is used for both ends
    let format = LayoutBridge::adopt_format(input.private_data_descriptor());
    let src = LayoutDescriptor::new(shapes.input, E::DATA_TYPE, format);
    let dst = src.with_shape(shapes.output);
    let desc = PoolingDesc::forward(prop_kind, algorithm, src, dst, shapes.geometry);
    let selection = select_forward(&resolved.engines, &desc)?;
    tracing::debug!(?format, ?prop_kind, "pooling forward primitive created");

    Ok(ForwardState {
        primitive: PoolingForward::new(selection.primitive_desc),
        src: LayoutBridge::new(
            "fwd_bottom_data",
            BufferRole::Data,
            LayoutDescriptor::canonical(shapes.input, E::DATA_TYPE),
            Some(src),
        ),
        dst: LayoutBridge::new(
            "fwd_top_data",
            BufferRole::Data,
            LayoutDescriptor::canonical(shapes.output, E::DATA_TYPE),
            Some(dst),
        ),
    })
}

fn init_backward<E: Dtype>(
    resolved: &Resolved,
    shapes: &Shapes,
    hint: &ForwardPrimitiveDesc,
    output: &Blob<E>,
) -> Result<BackwardState, Error> {
    if E::DATA_TYPE != DataType::F32 {
        return Err(Error::NotImplemented("double precision pooling"));
    }
    let algorithm = Algorithm::try_from(resolved.config.mode)?;

    // the incoming gradient's layout is used for both ends
    let format = LayoutBridge::adopt_format(output.private_diff_descriptor());
    let diff_src = LayoutDescriptor::new(shapes.input, E::DATA_TYPE, format);
    let diff_dst = diff_src.with_shape(shapes.output);
    let desc = PoolingDesc::backward(algorithm, diff_src, diff_dst, shapes.geometry);
    let selection = select_backward(&resolved.engines, &desc, hint)?;
    tracing::debug!(?format, "pooling backward primitive created");

    Ok(BackwardState {
        primitive: PoolingBackward::new(selection.primitive_desc),
        diff_src: LayoutBridge::new(
            "bwd_bottom_diff",
            BufferRole::Diff,
            LayoutDescriptor::canonical(shapes.input, E::DATA_TYPE),
            Some(diff_src),
        ),
        diff_dst: LayoutBridge::new(
            "bwd_top_diff",
            BufferRole::Diff,
            LayoutDescriptor::canonical(shapes.output, E::DATA_TYPE),
            Some(diff_dst),
        ),
    })
}

fn export_mask<E: Dtype>(indices: &[u32], blob: &mut Blob<E>) {
    let values = blob.data_buffer_mut().public_for_overwrite();
    for (v, &i) in values.iter_mut().zip(indices) {
        *v = num_traits::cast(i).unwrap_or_else(E::zero);
    }
}

/// Reads indices back from a mask blob. Every index must address an element
/// of an input plane of `plane` elements.
fn import_mask<E: Dtype>(blob: &mut Blob<E>, indices: &mut [u32], plane: usize) -> Result<(), Error> {
    let values = blob.data()?;
    if values.len() != indices.len() {
        return Err(Error::WrongNumElements {
            expected: indices.len(),
            actual: values.len(),
        });
    }
    for (position, (i, &v)) in indices.iter_mut().zip(values).enumerate() {
        *i = num_traits::cast(v)
            .filter(|&i: &u32| (i as usize) < plane)
            .ok_or_else(|| Error::InvalidMask {
                position,
                value: v.to_f64().unwrap_or(f64::NAN),
            })?;
    }
    Ok(())
}

impl<E: Dtype> Layer<E> for PoolingLayer<E> {
    fn name(&self) -> &str {
        &self.param.name
    }

    fn layer_type(&self) -> &'static str {
        "Pooling"
    }

    fn max_top_blobs(&self) -> usize {
        if self.param.pooling.pool.uses_index_mask() {
            2
        } else {
            1
        }
    }

    fn setup(&mut self, bottom: &[Blob<E>], top: &mut [Blob<E>]) -> Result<(), Error> {
        tracing::debug!(layer = %self.param.name, "pooling setup");
        let num_bottom = self.exact_num_bottom_blobs();
        check_num_blobs("bottom", bottom.len(), num_bottom, num_bottom)?;
        check_num_blobs("top", top.len(), self.min_top_blobs(), self.max_top_blobs())?;

        let config = self.param.pooling.resolve()?;
        let parsed = EngineParser::parse(&self.param.engine)?;
        let engines = self.registry.resolve(&parsed)?;
        tracing::debug!(
            layer = %self.param.name,
            engines = ?parsed.subengines(),
            mode = ?config.mode,
            "pooling configuration resolved"
        );

        self.mask = MaskBuffer::new(config.mode.uses_index_mask(), top.len());
        self.resolved = Some(Resolved { config, engines });
        self.shapes = None;
        self.invalidate();
        self.reshape(bottom, top)
    }

    fn reshape(&mut self, bottom: &[Blob<E>], top: &mut [Blob<E>]) -> Result<(), Error> {
        tracing::debug!(layer = %self.param.name, "pooling reshape");
        let resolved = self.resolved.as_ref().ok_or(Error::NotSetUp)?;
        let input = *bottom.first().ok_or_else(|| missing("bottom", 1))?.shape();
        let geometry = PoolGeometry::resolve(&resolved.config, input.height, input.width)?;
        let output = geometry.output_shape(&input);

        let (out, rest) = top.split_first_mut().ok_or_else(|| missing("top", 1))?;
        out.reshape(output)?;
        if let Some(mask) = rest.first_mut() {
            mask.reshape(output)?;
        }
        self.mask.resize(output.num_elements())?;

        let shapes = Shapes {
            input,
            output,
            geometry,
        };
        if self.shapes.is_some_and(|s| s != shapes) {
            self.invalidate();
        }
        self.shapes = Some(shapes);
        Ok(())
    }

    fn forward(&mut self, bottom: &mut [Blob<E>], top: &mut [Blob<E>]) -> Result<(), Error> {
        tracing::debug!(layer = %self.param.name, "pooling forward");
        let resolved = self.resolved.as_ref().ok_or(Error::NotSetUp)?;
        let shapes = self.shapes.ok_or(Error::NotSetUp)?;
        let input = bottom.first_mut().ok_or_else(|| missing("bottom", 1))?;
        check_shape(shapes.input, input.shape())?;
        let (output, rest) = top.split_first_mut().ok_or_else(|| missing("top", 1))?;
        check_shape(shapes.output, output.shape())?;

        let phase = self.param.phase;
        let state = self
            .fwd
            .get_or_try_init(|| init_forward(resolved, &shapes, phase, input))?;

        let src = state.src.sync_before_read(input)?;
        let dst = state.dst.sync_before_write(output)?;
        let has_workspace = state.primitive.primitive_desc().workspace().is_some();
        let workspace = if has_workspace {
            self.mask.as_mut_slice()
        } else {
            None
        };
        state.primitive.submit(src, dst, workspace)?;

        if let (true, MaskBuffer::TopBlob(indices), Some(mask)) =
            (has_workspace, &self.mask, rest.first_mut())
        {
            export_mask(indices, mask);
        }
        Ok(())
    }

    fn backward(
        &mut self,
        top: &mut [Blob<E>],
        propagate_down: &[bool],
        bottom: &mut [Blob<E>],
    ) -> Result<(), Error> {
        tracing::debug!(layer = %self.param.name, "pooling backward");
        if !propagate_down.first().copied().unwrap_or(false) {
            return Ok(());
        }
        let resolved = self.resolved.as_ref().ok_or(Error::NotSetUp)?;
        let shapes = self.shapes.ok_or(Error::NotSetUp)?;
        let hint = self
            .fwd
            .ready()
            .ok_or(Error::ForwardNotInitialized)?
            .primitive
            .primitive_desc();
        if hint.desc().algorithm == Algorithm::PoolingMax && hint.workspace().is_none() {
            return Err(Error::MissingWorkspace);
        }

        let (output, rest) = top.split_first_mut().ok_or_else(|| missing("top", 1))?;
        check_shape(shapes.output, output.shape())?;
        let input = bottom.first_mut().ok_or_else(|| missing("bottom", 1))?;
        check_shape(shapes.input, input.shape())?;

        let state = self
            .bwd
            .get_or_try_init(|| init_backward(resolved, &shapes, hint, output))?;
        let has_workspace = state.primitive.primitive_desc().workspace().is_some();
        if let (true, MaskBuffer::TopBlob(indices), Some(mask)) =
            (has_workspace, &mut self.mask, rest.first_mut())
        {
            import_mask(mask, indices, shapes.input.height * shapes.input.width)?;
        }

        let diff_dst = state.diff_dst.sync_before_read(output)?;
        let diff_src = state.diff_src.sync_before_write(input)?;
        let workspace = if has_workspace {
            self.mask.as_slice()
        } else {
            None
        };
        state.primitive.submit(diff_dst, workspace, diff_src)
    }
}
