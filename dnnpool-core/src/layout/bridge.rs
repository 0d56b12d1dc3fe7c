use super::{LayoutDescriptor, MemoryFormat};
use crate::{dtypes::Dtype, error::Error, tensor::Blob};

/// Which buffer of a blob a bridge moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    Data,
    Diff,
}

/// Connects one tensor endpoint of a primitive (its input, output, or one of
/// the gradients) to the blob that backs it.
///
/// A bridge owns the pair of descriptors for the endpoint: the public one the
/// rest of the pipeline expects, and the optimized one the primitive was
/// built for (`None` when the primitive runs on the public layout).
///
/// Call [LayoutBridge::sync_before_read] for every primitive input and
/// [LayoutBridge::sync_before_write] for every primitive output right before
/// submitting; both hand back the buffer the primitive must use.
#[derive(Debug, Clone)]
pub struct LayoutBridge {
    name: String,
    role: BufferRole,
    public: LayoutDescriptor,
    private: Option<LayoutDescriptor>,
}

impl LayoutBridge {
    pub fn new(
        name: impl Into<String>,
        role: BufferRole,
        public: LayoutDescriptor,
        private: Option<LayoutDescriptor>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            public,
            private: private.filter(|p| *p != public),
        }
    }

    /// Picks the format for an endpoint: if the producer already left the
    /// tensor in an optimized layout, adopt it, otherwise stay canonical.
    pub fn adopt_format(upstream: Option<&LayoutDescriptor>) -> MemoryFormat {
        upstream.map_or(MemoryFormat::Nchw, |d| d.format)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> BufferRole {
        self.role
    }

    pub fn public_descriptor(&self) -> &LayoutDescriptor {
        &self.public
    }

    pub fn private_descriptor(&self) -> Option<&LayoutDescriptor> {
        self.private.as_ref()
    }

    /// Layout the primitive reads or writes through this bridge.
    pub fn primitive_descriptor(&self) -> &LayoutDescriptor {
        self.private.as_ref().unwrap_or(&self.public)
    }

    fn check_shape<E: Dtype>(&self, blob: &Blob<E>) -> Result<(), Error> {
        if *blob.shape() != self.public.shape {
            return Err(Error::ShapeMismatch {
                expected: self.public.shape,
                actual: *blob.shape(),
            });
        }
        Ok(())
    }

    /// Makes the blob's current contents available in the layout the
    /// primitive reads, reordering only when the blob holds them in a
    /// different layout.
    pub fn sync_before_read<'a, E: Dtype>(&self, blob: &'a mut Blob<E>) -> Result<&'a [E], Error> {
        self.check_shape(blob)?;
        let buffer = match self.role {
            BufferRole::Data => blob.data_buffer_mut(),
            BufferRole::Diff => blob.diff_buffer_mut(),
        };
        match &self.private {
            Some(desc) => buffer.private_for_read(desc),
            None => buffer.public(),
        }
    }

    /// Hands out the buffer the primitive writes, and marks it as the
    /// authoritative copy. Consumers wanting another layout convert on their
    /// own read.
    pub fn sync_before_write<'a, E: Dtype>(
        &self,
        blob: &'a mut Blob<E>,
    ) -> Result<&'a mut [E], Error> {
        self.check_shape(blob)?;
        let buffer = match self.role {
            BufferRole::Data => blob.data_buffer_mut(),
            BufferRole::Diff => blob.diff_buffer_mut(),
        };
        match &self.private {
            Some(desc) => buffer.private_for_overwrite(desc),
            None => Ok(buffer.public_for_overwrite()),
        }
    }
}
