use std::borrow::{Borrow, BorrowMut};
use std::ops::{Index, IndexMut};
use std::slice::SliceIndex;

use crate::{ExecutableRegion, MappedRegion};

/// A [MappedRegion] that may be read and written, but not executed.
pub struct WritableRegion {
    region: MappedRegion,
}

impl WritableRegion {
    /// Maps a fresh region of `size` bytes and makes it writable.
    pub fn allocate(size: usize) -> crate::Result<Self> {
        MappedRegion::allocate(size)?.into_writable()
    }

    /// Consumes the [MappedRegion] and marks its memory as readable and writable.
    pub fn from(region: MappedRegion) -> crate::Result<Self> {
        use libc::{PROT_READ, PROT_WRITE};

        region.protect(PROT_READ | PROT_WRITE)?;

        Ok(Self { region })
    }

    /// Return the length of region.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Consumes the region and returns an executable region. That means you can run it!
    ///
    /// If the protection cannot be changed, the region is unmapped before the error is returned.
    pub fn into_executable(self) -> crate::Result<ExecutableRegion> {
        ExecutableRegion::from(self.region)
    }
}

impl<I> Index<I> for WritableRegion
where
    I: SliceIndex<[u8]>,
{
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        unsafe { &std::slice::from_raw_parts(self.region.addr(), self.region.len())[index] }
    }
}

impl<I> IndexMut<I> for WritableRegion
where
    I: SliceIndex<[u8]>,
{
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        unsafe {
            &mut std::slice::from_raw_parts_mut(self.region.addr_mut(), self.region.len())[index]
        }
    }
}

impl Borrow<[u8]> for WritableRegion {
    fn borrow(&self) -> &[u8] {
        &self[..]
    }
}

impl BorrowMut<[u8]> for WritableRegion {
    fn borrow_mut(&mut self) -> &mut [u8] {
        &mut self[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_memory_is_zeroed_and_writable() {
        let mut mem = WritableRegion::allocate(64).unwrap();
        assert!(mem[..].iter().all(|&b| b == 0));

        mem[0..3].copy_from_slice(&[0xde, 0xad, 0xbe]);
        assert_eq!(&[0xde, 0xad, 0xbe, 0x00], &mem[0..4]);
    }
}
