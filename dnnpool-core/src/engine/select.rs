use super::{EngineError, EngineRef};
use crate::{
    error::Error,
    primitive::{BackwardPrimitiveDesc, ForwardPrimitiveDesc, PoolingDesc},
};

/// A candidate engine that declined, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub engine: String,
    pub reason: EngineError,
}

/// Outcome of a successful selection: the primitive descriptor, plus every
/// engine that was tried and declined before it.
#[derive(Debug, Clone)]
pub struct Selection<T> {
    pub primitive_desc: T,
    /// Position of the accepting engine in the candidate list.
    pub index: usize,
    pub rejected: Vec<Rejection>,
}

fn select_first<T>(
    candidates: &[EngineRef],
    primitive: &'static str,
    mut create: impl FnMut(&EngineRef) -> Result<T, EngineError>,
) -> Result<Selection<T>, Error> {
    let mut rejected = Vec::new();
    for (index, engine) in candidates.iter().enumerate() {
        match create(engine) {
            Ok(primitive_desc) => {
                tracing::info!(
                    primitive,
                    engine = engine.name(),
                    skipped = rejected.len(),
                    "bound pooling primitive"
                );
                return Ok(Selection {
                    primitive_desc,
                    index,
                    rejected,
                });
            }
            Err(reason) => {
                tracing::debug!(
                    primitive,
                    engine = engine.name(),
                    %reason,
                    "engine rejected pooling primitive, trying next"
                );
                rejected.push(Rejection {
                    engine: engine.name().to_string(),
                    reason,
                });
            }
        }
    }
    Err(Error::NoEngineAvailable {
        primitive,
        tried: rejected.into_iter().map(|r| r.engine).collect(),
    })
}

/// Tries `candidates` in order and returns the first forward primitive
/// descriptor one of them accepts.
pub fn select_forward(
    candidates: &[EngineRef],
    desc: &PoolingDesc,
) -> Result<Selection<ForwardPrimitiveDesc>, Error> {
    select_first(candidates, "pooling forward", |engine| {
        engine.create_forward(desc)?;
        Ok(ForwardPrimitiveDesc::new(*desc, engine.clone()))
    })
}

/// Tries `candidates` in order and returns the first backward primitive
/// descriptor one of them accepts given the forward `hint`.
pub fn select_backward(
    candidates: &[EngineRef],
    desc: &PoolingDesc,
    hint: &ForwardPrimitiveDesc,
) -> Result<Selection<BackwardPrimitiveDesc>, Error> {
    select_first(candidates, "pooling backward", |engine| {
        engine.create_backward(desc, hint)?;
        Ok(BackwardPrimitiveDesc::new(*desc, engine.clone()))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{PoolingMode, PoolingParameter},
        dtypes::DataType,
        engine::{ComputeEngine, CpuEngine, GpuEngine},
        geometry::PoolGeometry,
        layout::LayoutDescriptor,
        primitive::{Algorithm, PropKind},
        shapes::Shape4D,
    };

    /// Accepts the same descriptors as the host engine under another name.
    #[derive(Debug)]
    struct Alias(&'static str);

    impl ComputeEngine for Alias {
        fn name(&self) -> &str {
            self.0
        }
        fn create_forward(&self, desc: &PoolingDesc) -> Result<(), EngineError> {
            CpuEngine.create_forward(desc)
        }
        fn create_backward(
            &self,
            desc: &PoolingDesc,
            hint: &ForwardPrimitiveDesc,
        ) -> Result<(), EngineError> {
            crate::engine::check_hint(self, desc, hint)
        }
    }

    fn forward_desc() -> PoolingDesc {
        let input = Shape4D::new(1, 1, 4, 4);
        let config = PoolingParameter::new(PoolingMode::Max, 2, 2).resolve().unwrap();
        let geometry = PoolGeometry::resolve(&config, 4, 4).unwrap();
        PoolingDesc::forward(
            PropKind::ForwardTraining,
            Algorithm::PoolingMax,
            LayoutDescriptor::canonical(input, DataType::F32),
            LayoutDescriptor::canonical(geometry.output_shape(&input), DataType::F32),
            geometry,
        )
    }

    #[test]
    fn test_first_accepting_engine_wins() {
        let candidates: Vec<EngineRef> = vec![Arc::new(GpuEngine), Arc::new(CpuEngine)];
        let selection = select_forward(&candidates, &forward_desc()).unwrap();
        assert_eq!(selection.primitive_desc.engine_name(), "CPU");
        assert_eq!(selection.index, 1);
        assert_eq!(
            selection.rejected,
            [Rejection {
                engine: "GPU".to_string(),
                reason: EngineError::Unavailable
            }]
        );
    }

    #[test]
    fn test_all_rejected() {
        let candidates: Vec<EngineRef> = vec![Arc::new(GpuEngine)];
        match select_forward(&candidates, &forward_desc()) {
            Err(Error::NoEngineAvailable { primitive, tried }) => {
                assert_eq!(primitive, "pooling forward");
                assert_eq!(tried, ["GPU"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            select_forward(&[], &forward_desc()),
            Err(Error::NoEngineAvailable { .. })
        ));
    }

    #[test]
    fn test_backward_follows_forward_engine() {
        let fwd = forward_desc();
        let candidates: Vec<EngineRef> = vec![Arc::new(Alias("A")), Arc::new(CpuEngine)];
        let hint = select_forward(&[Arc::new(CpuEngine) as EngineRef], &fwd)
            .unwrap()
            .primitive_desc;

        let bwd = PoolingDesc::backward(fwd.algorithm, fwd.src, fwd.dst, fwd.geometry);
        let selection = select_backward(&candidates, &bwd, &hint).unwrap();
        assert_eq!(selection.primitive_desc.engine_name(), "CPU");
        assert_eq!(
            selection.rejected[0].reason,
            EngineError::HintMismatch("CPU".to_string())
        );
        assert_eq!(selection.primitive_desc.workspace(), hint.workspace());
    }
}
