use super::try_alloc_elem;
use crate::{
    dtypes::Dtype,
    error::Error,
    layout::{reorder_into, LayoutDescriptor},
    shapes::Shape4D,
};

/// Which copy of a [SyncedBuffer] is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Head {
    /// Only the public (canonical) copy is current.
    AtPublic,
    /// Only the private (optimized) copy is current.
    AtPrivate,
    /// Both copies hold the same values.
    Synced,
}

#[derive(Debug, Clone)]
struct PrivateBuffer<E> {
    desc: LayoutDescriptor,
    data: Vec<E>,
}

/// One logical buffer with a canonical public copy and an optional private
/// copy in an optimized layout.
///
/// Whoever wants a copy that isn't current pays for the conversion: reading
/// the public copy while the head is [Head::AtPrivate] reorders the private
/// data back, and asking for a private layout the buffer doesn't hold
/// reorders from the public copy.
#[derive(Debug, Clone)]
pub struct SyncedBuffer<E> {
    public_desc: LayoutDescriptor,
    public: Vec<E>,
    private: Option<PrivateBuffer<E>>,
    head: Head,
}

impl<E: Dtype> SyncedBuffer<E> {
    pub fn zeros(shape: Shape4D) -> Result<Self, Error> {
        Ok(Self {
            public_desc: LayoutDescriptor::canonical(shape, E::DATA_TYPE),
            public: try_alloc_elem(shape.num_elements(), E::zero())?,
            private: None,
            head: Head::AtPublic,
        })
    }

    pub fn head(&self) -> Head {
        self.head
    }

    pub fn public_descriptor(&self) -> &LayoutDescriptor {
        &self.public_desc
    }

    /// Layout of the private copy, if it holds current data. This is how a
    /// consumer learns that its producer left the buffer in an optimized
    /// layout.
    pub fn private_descriptor(&self) -> Option<&LayoutDescriptor> {
        match (&self.private, self.head) {
            (Some(p), Head::AtPrivate | Head::Synced) => Some(&p.desc),
            _ => None,
        }
    }

    /// Drops all contents and resizes to `shape`, zero filled.
    pub fn reshape(&mut self, shape: Shape4D) -> Result<(), Error> {
        if self.public_desc.shape != shape {
            *self = Self::zeros(shape)?;
        }
        Ok(())
    }

    fn sync_to_public(&mut self) -> Result<(), Error> {
        if self.head == Head::AtPrivate {
            if let Some(p) = &self.private {
                reorder_into(&p.data, &p.desc, &mut self.public, &self.public_desc)?;
            }
            self.head = Head::Synced;
        }
        Ok(())
    }

    /// Reads the public copy, converting from the private copy first if
    /// needed.
    pub fn public(&mut self) -> Result<&[E], Error> {
        self.sync_to_public()?;
        Ok(&self.public)
    }

    /// Mutable access to the public copy. Invalidates the private copy.
    pub fn public_mut(&mut self) -> Result<&mut [E], Error> {
        self.sync_to_public()?;
        self.head = Head::AtPublic;
        Ok(&mut self.public)
    }

    /// Mutable access to the public copy for a writer that overwrites every
    /// element, so nothing is converted.
    pub fn public_for_overwrite(&mut self) -> &mut [E] {
        self.head = Head::AtPublic;
        &mut self.public
    }

    /// Deposits data in an optimized layout, as an upstream producer would.
    /// The private copy becomes authoritative.
    pub fn set_private(&mut self, desc: LayoutDescriptor, data: Vec<E>) -> Result<(), Error> {
        if desc.shape != self.public_desc.shape {
            return Err(Error::ShapeMismatch {
                expected: self.public_desc.shape,
                actual: desc.shape,
            });
        }
        if data.len() != desc.buffer_len() {
            return Err(Error::WrongNumElements {
                expected: desc.buffer_len(),
                actual: data.len(),
            });
        }
        self.private = Some(PrivateBuffer { desc, data });
        self.head = Head::AtPrivate;
        Ok(())
    }

    /// Returns current data laid out as `desc`, reordering into the private
    /// copy if it isn't already there.
    pub fn private_for_read(&mut self, desc: &LayoutDescriptor) -> Result<&[E], Error> {
        if self.private_descriptor() != Some(desc) {
            self.sync_to_public()?;
            let mut data = match self.private.take() {
                Some(p) if p.desc == *desc => p.data,
                _ => try_alloc_elem(desc.buffer_len(), E::zero())?,
            };
            reorder_into(&self.public, &self.public_desc, &mut data, desc)?;
            self.head = Head::Synced;
            let p = self.private.insert(PrivateBuffer { desc: *desc, data });
            return Ok(&p.data);
        }
        Ok(self.private.as_ref().map_or(&[], |p| p.data.as_slice()))
    }

    /// Returns a private buffer laid out as `desc` that the caller is about
    /// to fill completely. The private copy becomes authoritative.
    pub fn private_for_overwrite(&mut self, desc: &LayoutDescriptor) -> Result<&mut [E], Error> {
        if self.private.as_ref().map_or(true, |p| p.desc != *desc) {
            let data = try_alloc_elem(desc.buffer_len(), E::zero())?;
            self.private = Some(PrivateBuffer { desc: *desc, data });
        }
        self.head = Head::AtPrivate;
        Ok(self.private.as_mut().map_or(&mut [], |p| p.data.as_mut_slice()))
    }
}
