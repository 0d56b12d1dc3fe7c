use super::LayoutDescriptor;
use crate::{error::Error, tensor::try_alloc_elem};

/// Copies `src` (laid out as `from`) into `dst` (laid out as `to`).
///
/// Both descriptors must describe the same logical shape. Padding elements of
/// blocked destination formats are left untouched.
pub fn reorder_into<E: Copy>(
    src: &[E],
    from: &LayoutDescriptor,
    dst: &mut [E],
    to: &LayoutDescriptor,
) -> Result<(), Error> {
    if from.shape != to.shape {
        return Err(Error::ShapeMismatch {
            expected: to.shape,
            actual: from.shape,
        });
    }
    debug_assert!(src.len() >= from.buffer_len());
    debug_assert!(dst.len() >= to.buffer_len());

    if from.format == to.format {
        let len = from.buffer_len();
        dst[..len].copy_from_slice(&src[..len]);
        return Ok(());
    }

    tracing::trace!(from = ?from.format, to = ?to.format, shape = %from.shape, "reorder");
    let shape = from.shape;
    for n in 0..shape.batch {
        for c in 0..shape.channels {
            for h in 0..shape.height {
                for w in 0..shape.width {
                    dst[to.offset(n, c, h, w)] = src[from.offset(n, c, h, w)];
                }
            }
        }
    }
    Ok(())
}

/// Allocates a new buffer laid out as `to` holding the contents of `src`.
pub fn reorder<E: Copy + Default>(
    src: &[E],
    from: &LayoutDescriptor,
    to: &LayoutDescriptor,
) -> Result<Vec<E>, Error> {
    let mut dst = try_alloc_elem(to.buffer_len(), E::default())?;
    reorder_into(src, from, &mut dst, to)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dtypes::DataType, layout::MemoryFormat, shapes::Shape4D};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rand_distr::StandardNormal;

    #[test]
    fn test_nchw_to_nhwc() {
        let shape = Shape4D::new(1, 2, 2, 2);
        let nchw = LayoutDescriptor::canonical(shape, DataType::F32);
        let nhwc = LayoutDescriptor::new(shape, DataType::F32, MemoryFormat::Nhwc);
        let src: Vec<f32> = (0..8).map(|x| x as f32).collect();
        let dst = reorder(&src, &nchw, &nhwc).unwrap();
        assert_eq!(dst, [0., 4., 1., 5., 2., 6., 3., 7.]);
    }

    #[test]
    fn test_round_trip_through_blocked() {
        let shape = Shape4D::new(2, 3, 3, 2);
        let nchw = LayoutDescriptor::canonical(shape, DataType::F32);
        let blocked = LayoutDescriptor::new(shape, DataType::F32, MemoryFormat::NChw8c);
        let src: Vec<f32> = (0..shape.num_elements()).map(|x| x as f32).collect();
        let mid = reorder(&src, &nchw, &blocked).unwrap();
        assert_eq!(mid.len(), 2 * 8 * 3 * 2);
        let back = reorder(&mid, &blocked, &nchw).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_random_round_trips() {
        let mut rng = StdRng::seed_from_u64(0);
        let formats = [MemoryFormat::Nchw, MemoryFormat::Nhwc, MemoryFormat::NChw8c];
        for _ in 0..8 {
            let shape = Shape4D::new(
                rng.gen_range(1..3),
                rng.gen_range(1..12),
                rng.gen_range(1..5),
                rng.gen_range(1..5),
            );
            let nchw = LayoutDescriptor::canonical(shape, DataType::F32);
            let src: Vec<f32> = (0..shape.num_elements())
                .map(|_| rng.sample(StandardNormal))
                .collect();
            for from in formats {
                for to in formats {
                    let from = LayoutDescriptor::new(shape, DataType::F32, from);
                    let to = LayoutDescriptor::new(shape, DataType::F32, to);
                    let a = reorder(&src, &nchw, &from).unwrap();
                    let b = reorder(&a, &from, &to).unwrap();
                    assert_eq!(b.len(), to.buffer_len());
                    assert_eq!(reorder(&b, &to, &nchw).unwrap(), src, "{from:?} -> {to:?}");
                }
            }
        }
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let a = LayoutDescriptor::canonical(Shape4D::new(1, 1, 2, 2), DataType::F32);
        let b = LayoutDescriptor::canonical(Shape4D::new(1, 1, 2, 3), DataType::F32);
        let mut dst = [0.0f32; 6];
        assert!(matches!(
            reorder_into(&[0.0f32; 4], &a, &mut dst, &b),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
