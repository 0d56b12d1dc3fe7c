//! Blobs: 4d tensors holding a data buffer and a gradient ("diff") buffer,
//! each of which may carry a private copy in an optimized layout.

mod blob;
mod synced;

pub use blob::Blob;
pub use synced::{Head, SyncedBuffer};

use crate::error::Error;

/// Allocates `len` copies of `elem`, reporting allocation failure as
/// [Error::OutOfMemory] instead of aborting.
pub fn try_alloc_elem<E: Copy>(len: usize, elem: E) -> Result<Vec<E>, Error> {
    let mut data: Vec<E> = Vec::new();
    data.try_reserve(len).map_err(|_| Error::OutOfMemory)?;
    data.resize(len, elem);
    Ok(data)
}
