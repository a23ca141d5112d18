use std::ops::{Index, IndexMut};
use std::slice::SliceIndex;

use tracing::trace;

use crate::mapped_region::page_size;
use crate::MappedRegion;

/// Readable, writable memory with an inaccessible page on either side.
///
/// The usable bytes end exactly where the trailing guard page begins, so the first write past
/// the end faults. The slack left over by rounding up to whole pages sits in front of them,
/// before the leading guard page.
pub struct GuardedRegion {
    region: MappedRegion,
    offset: usize,
    len: usize,
}

impl GuardedRegion {
    /// Maps `len` zeroed bytes between two guard pages.
    pub fn allocate(len: usize) -> crate::Result<Self> {
        use libc::{PROT_READ, PROT_WRITE};

        let page = page_size();
        let body = ((len + page - 1) / page).max(1) * page;
        let region = MappedRegion::allocate(page + body + page)?;
        region.protect_range(page, body, PROT_READ | PROT_WRITE)?;

        let offset = page + body - len;
        trace!(addr = ?region.addr(), len, offset, "guarded region");

        Ok(GuardedRegion {
            region,
            offset,
            len,
        })
    }

    /// Number of usable bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to the first usable byte.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        unsafe { self.region.addr_mut().add(self.offset) }
    }

    fn as_ptr(&self) -> *const u8 {
        unsafe { self.region.addr().add(self.offset) }
    }
}

impl<I> Index<I> for GuardedRegion
where
    I: SliceIndex<[u8]>,
{
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        unsafe { &std::slice::from_raw_parts(self.as_ptr(), self.len)[index] }
    }
}

impl<I> IndexMut<I> for GuardedRegion
where
    I: SliceIndex<[u8]>,
{
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        let len = self.len;
        unsafe { &mut std::slice::from_raw_parts_mut(self.as_mut_ptr(), len)[index] }
    }
}
