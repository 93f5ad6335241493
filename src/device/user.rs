//! User memory as seen by the device surface.

use crate::error::{Error, Result};

/// A caller-supplied buffer.
///
/// Transfers either move the whole requested range or fail with
/// `CopyFault`; there are no partial copies.
pub trait UserBuffer {
    /// Length the caller claims the buffer has.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src` to the start of the buffer.
    fn copy_to_user(&mut self, src: &[u8]) -> Result<()>;

    /// Fill `dst` from the start of the buffer.
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<()>;
}

impl UserBuffer for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_to_user(&mut self, src: &[u8]) -> Result<()> {
        self.get_mut(..src.len())
            .ok_or(Error::CopyFault)?
            .copy_from_slice(src);
        Ok(())
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<()> {
        let src = self.get(..dst.len()).ok_or(Error::CopyFault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserBuffer for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_to_user(&mut self, src: &[u8]) -> Result<()> {
        self.as_mut_slice().copy_to_user(src)
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<()> {
        self.as_slice().copy_from_user(dst)
    }
}

impl<const N: usize> UserBuffer for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_to_user(&mut self, src: &[u8]) -> Result<()> {
        self.as_mut_slice().copy_to_user(src)
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<()> {
        self.as_slice().copy_from_user(dst)
    }
}
