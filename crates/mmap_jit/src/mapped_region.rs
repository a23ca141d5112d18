use std::ops::Drop;
use std::ptr;

use errno::errno;
use libc::{c_void, size_t};
use tracing::{trace, warn};

use crate::{MappingError, WritableRegion};

/// A region of memory mapped by `mmap(2)`.
///
/// The `munmap(2)` is automatically called when the value is dropped.
pub struct MappedRegion {
    addr: *mut c_void,
    len: size_t,
}

impl MappedRegion {
    /// Allocate a region of the given size (in bytes). The memory can be neither read, written,
    /// nor executed until it is converted.
    pub fn allocate(size: usize) -> crate::Result<Self> {
        use libc::{MAP_ANON, MAP_PRIVATE, PROT_NONE};

        let memory = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                PROT_NONE,
                MAP_PRIVATE | MAP_ANON | extra_map_flags(),
                -1,
                0,
            )
        };

        if memory == libc::MAP_FAILED {
            return Err(MappingError::Map {
                len: size,
                errno: errno(),
            });
        }

        trace!(addr = ?memory, len = size, "mapped region");

        Ok(MappedRegion {
            addr: memory,
            len: size,
        })
    }

    /// Returns a pointer to mapped memory.
    pub fn addr(&self) -> *const u8 {
        self.addr as *const u8
    }

    /// Returns a mutable pointer to this region.
    ///
    /// Note: to write to this memory, first you must convert into a [WritableRegion].
    pub fn addr_mut(&self) -> *mut u8 {
        self.addr as *mut u8
    }

    /// Return the length of region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Regions always have at least one byte; `mmap(2)` refuses empty mappings.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consumes the region and returns a writable region.
    pub fn into_writable(self) -> crate::Result<WritableRegion> {
        WritableRegion::from(self)
    }

    /// Changes the protection of the entire region.
    pub(crate) fn protect(&self, protection: libc::c_int) -> crate::Result<()> {
        self.protect_range(0, self.len, protection)
    }

    /// Changes the protection of `len` bytes starting `offset` bytes in. `offset` must be a
    /// multiple of the page size.
    pub(crate) fn protect_range(
        &self,
        offset: usize,
        len: usize,
        protection: libc::c_int,
    ) -> crate::Result<()> {
        assert!(offset + len <= self.len, "protected range is outside the region");

        let start = unsafe { self.addr_mut().add(offset) } as *mut c_void;
        let status = unsafe { libc::mprotect(start, len, protection) };
        if status < 0 {
            return Err(MappingError::Protect { len, errno: errno() });
        }

        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        let status = unsafe { libc::munmap(self.addr, self.len) };
        if status < 0 {
            warn!(addr = ?self.addr, len = self.len, errno = %errno(), "munmap failed");
        } else {
            trace!(addr = ?self.addr, len = self.len, "unmapped region");
        }
    }
}

/// The granularity of memory protection, in bytes.
pub fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    }
}

// Apple Silicon refuses to make anonymous memory executable unless it was mapped for JIT use.
#[cfg(target_os = "macos")]
fn extra_map_flags() -> libc::c_int {
    libc::MAP_JIT
}

#[cfg(not(target_os = "macos"))]
fn extra_map_flags() -> libc::c_int {
    0
}
