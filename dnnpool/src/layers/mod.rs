//! Framework facing layers.

mod pooling;

pub use pooling::PoolingLayer;

use dnnpool_core::{dtypes::Dtype, error::Error, tensor::Blob};

/// The lifecycle a framework drives a layer through.
///
/// `bottom` blobs are the layer's inputs and `top` blobs its outputs. Reads
/// may convert a blob between memory layouts, which is why even inputs are
/// taken by `&mut` in the passes.
pub trait Layer<E: Dtype> {
    fn name(&self) -> &str;

    fn layer_type(&self) -> &'static str;

    fn exact_num_bottom_blobs(&self) -> usize {
        1
    }

    fn min_top_blobs(&self) -> usize {
        1
    }

    fn max_top_blobs(&self) -> usize {
        1
    }

    /// Validates the configuration once, then shapes the outputs.
    fn setup(&mut self, bottom: &[Blob<E>], top: &mut [Blob<E>]) -> Result<(), Error>;

    /// Recomputes output shapes from the current input shapes.
    fn reshape(&mut self, bottom: &[Blob<E>], top: &mut [Blob<E>]) -> Result<(), Error>;

    fn forward(&mut self, bottom: &mut [Blob<E>], top: &mut [Blob<E>]) -> Result<(), Error>;

    /// Writes input gradients for every bottom blob whose `propagate_down`
    /// flag is set.
    fn backward(
        &mut self,
        top: &mut [Blob<E>],
        propagate_down: &[bool],
        bottom: &mut [Blob<E>],
    ) -> Result<(), Error>;

    fn forward_gpu(&mut self, _bottom: &mut [Blob<E>], _top: &mut [Blob<E>]) -> Result<(), Error> {
        Err(Error::NotImplemented("gpu forward"))
    }

    fn backward_gpu(
        &mut self,
        _top: &mut [Blob<E>],
        _propagate_down: &[bool],
        _bottom: &mut [Blob<E>],
    ) -> Result<(), Error> {
        Err(Error::NotImplemented("gpu backward"))
    }
}

pub(crate) fn check_num_blobs(
    role: &'static str,
    actual: usize,
    min: usize,
    max: usize,
) -> Result<(), Error> {
    if actual < min {
        return Err(Error::WrongNumBlobs {
            role,
            expected: min,
            actual,
        });
    }
    if actual > max {
        return Err(Error::WrongNumBlobs {
            role,
            expected: max,
            actual,
        });
    }
    Ok(())
}
