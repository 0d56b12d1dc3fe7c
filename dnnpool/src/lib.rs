//! # dnnpool
//!
//! A 2d pooling layer (max and average, forward and backward) that defers
//! memory layout and compute engine choice to pluggable engines.
//!
//! ```rust
//! use dnnpool::prelude::*;
//!
//! let param = LayerParameter::new("pool1", PoolingParameter::new(PoolingMode::Max, 2, 2));
//! let mut layer = PoolingLayer::<f32>::new(param);
//!
//! let input: Vec<f32> = (1..=16).map(|v| v as f32).collect();
//! let mut bottom = vec![Blob::from_vec(Shape4D::new(1, 1, 4, 4), input).unwrap()];
//! let mut top = vec![Blob::zeros(Shape4D::default()).unwrap()];
//!
//! layer.setup(&bottom, &mut top).unwrap();
//! layer.forward(&mut bottom, &mut top).unwrap();
//! assert_eq!(top[0].data().unwrap(), [6., 8., 14., 16.]);
//! ```
//!
//! The building blocks (configuration, geometry, layouts, engines and
//! primitives) live in `dnnpool-core` and are re-exported here.

pub mod layers;

pub use dnnpool_core::*;

/// Contains subset of all public exports.
pub mod prelude {
    pub use crate::layers::*;
    pub use dnnpool_core::prelude::*;
}
