use super::SyncedBuffer;
use crate::{dtypes::Dtype, error::Error, layout::LayoutDescriptor, shapes::Shape4D};

/// A 4d tensor as exchanged between layers: logical shape, values (`data`)
/// and gradients (`diff`).
///
/// Reading the public copy of either buffer may convert it from an optimized
/// layout, which is why even reads take `&mut self`.
///
/// ```rust
/// # use dnnpool_core::prelude::*;
/// let mut b = Blob::<f32>::from_vec(Shape4D::new(1, 1, 2, 2), vec![1., 2., 3., 4.]).unwrap();
/// assert_eq!(b.data().unwrap(), [1., 2., 3., 4.]);
/// assert_eq!(b.diff().unwrap(), [0.; 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Blob<E> {
    shape: Shape4D,
    data: SyncedBuffer<E>,
    diff: SyncedBuffer<E>,
}

impl<E: Dtype> Blob<E> {
    /// A zero filled blob.
    pub fn zeros(shape: Shape4D) -> Result<Self, Error> {
        Ok(Self {
            shape,
            data: SyncedBuffer::zeros(shape)?,
            diff: SyncedBuffer::zeros(shape)?,
        })
    }

    /// A blob whose data is `data` in canonical layout.
    pub fn from_vec(shape: Shape4D, data: Vec<E>) -> Result<Self, Error> {
        if data.len() != shape.num_elements() {
            return Err(Error::WrongNumElements {
                expected: shape.num_elements(),
                actual: data.len(),
            });
        }
        let mut blob = Self::zeros(shape)?;
        blob.data.public_for_overwrite().copy_from_slice(&data);
        Ok(blob)
    }

    pub fn shape(&self) -> &Shape4D {
        &self.shape
    }

    /// Changes the shape. Contents are discarded if the shape changes.
    pub fn reshape(&mut self, shape: Shape4D) -> Result<(), Error> {
        self.data.reshape(shape)?;
        self.diff.reshape(shape)?;
        self.shape = shape;
        Ok(())
    }

    pub fn data(&mut self) -> Result<&[E], Error> {
        self.data.public()
    }

    pub fn data_mut(&mut self) -> Result<&mut [E], Error> {
        self.data.public_mut()
    }

    pub fn diff(&mut self) -> Result<&[E], Error> {
        self.diff.public()
    }

    pub fn diff_mut(&mut self) -> Result<&mut [E], Error> {
        self.diff.public_mut()
    }

    /// Copies canonical-layout values into the data buffer.
    pub fn copy_from(&mut self, src: &[E]) -> Result<(), Error> {
        copy_checked(self.data.public_for_overwrite(), src)
    }

    /// Copies canonical-layout gradients into the diff buffer.
    pub fn copy_diff_from(&mut self, src: &[E]) -> Result<(), Error> {
        copy_checked(self.diff.public_for_overwrite(), src)
    }

    pub fn data_buffer(&self) -> &SyncedBuffer<E> {
        &self.data
    }

    pub fn data_buffer_mut(&mut self) -> &mut SyncedBuffer<E> {
        &mut self.data
    }

    pub fn diff_buffer(&self) -> &SyncedBuffer<E> {
        &self.diff
    }

    pub fn diff_buffer_mut(&mut self) -> &mut SyncedBuffer<E> {
        &mut self.diff
    }

    /// Whether the data currently lives in an optimized layout, and which.
    pub fn private_data_descriptor(&self) -> Option<&LayoutDescriptor> {
        self.data.private_descriptor()
    }

    /// Whether the gradient currently lives in an optimized layout, and which.
    pub fn private_diff_descriptor(&self) -> Option<&LayoutDescriptor> {
        self.diff.private_descriptor()
    }

    /// Deposits data in an optimized layout, as an upstream producer would.
    pub fn set_private_data(&mut self, desc: LayoutDescriptor, data: Vec<E>) -> Result<(), Error> {
        self.data.set_private(desc, data)
    }

    /// Deposits gradients in an optimized layout, as a downstream layer's
    /// backward pass would.
    pub fn set_private_diff(&mut self, desc: LayoutDescriptor, diff: Vec<E>) -> Result<(), Error> {
        self.diff.set_private(desc, diff)
    }
}

fn copy_checked<E: Copy>(dst: &mut [E], src: &[E]) -> Result<(), Error> {
    if dst.len() != src.len() {
        return Err(Error::WrongNumElements {
            expected: dst.len(),
            actual: src.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dtypes::DataType, layout::MemoryFormat, tensor::Head};

    #[test]
    fn test_from_vec_checks_len() {
        let shape = Shape4D::new(1, 1, 2, 2);
        assert!(matches!(
            Blob::<f32>::from_vec(shape, vec![0.; 3]),
            Err(Error::WrongNumElements { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_reshape_discards_contents() {
        let mut b = Blob::<f32>::from_vec(Shape4D::new(1, 1, 1, 2), vec![1., 2.]).unwrap();
        b.reshape(Shape4D::new(1, 1, 1, 2)).unwrap();
        assert_eq!(b.data().unwrap(), [1., 2.]);
        b.reshape(Shape4D::new(1, 1, 2, 2)).unwrap();
        assert_eq!(b.data().unwrap(), [0.; 4]);
        assert_eq!(b.shape(), &Shape4D::new(1, 1, 2, 2));
    }

    #[test]
    fn test_private_data_and_diff_are_independent() {
        let shape = Shape4D::new(1, 2, 1, 1);
        let desc = LayoutDescriptor::new(shape, DataType::F32, MemoryFormat::NChw8c);
        let mut b = Blob::<f32>::zeros(shape).unwrap();
        let mut blocked = vec![0.; 8];
        blocked[1] = 7.;
        b.set_private_data(desc, blocked).unwrap();
        assert_eq!(b.private_data_descriptor(), Some(&desc));
        assert_eq!(b.private_diff_descriptor(), None);
        assert_eq!(b.diff_buffer().head(), Head::AtPublic);
        assert_eq!(b.data().unwrap(), [0., 7.]);
        assert_eq!(b.data_buffer().head(), Head::Synced);
    }
}
