//! Memory that is first written, then executed, but never both at once.
//!
//! A region starts its life as a [MappedRegion] with no access at all. It becomes a
//! [WritableRegion] to receive machine code, and finally an [ExecutableRegion] (read + execute)
//! that can be called with [as_function!]. Every transition consumes the previous value, so
//! there is never a writable alias to executable memory. The mapping is released when the
//! region is dropped, whichever state it is in.
//!
//! Data that native code writes through a raw pointer lives in a [GuardedRegion] instead, so
//! that running off either end faults rather than scribbling over the rest of the process.

mod error;
mod executable_region;
mod guarded_region;
mod mapped_region;
mod writable_region;

pub use crate::error::{MappingError, Result};
pub use crate::executable_region::ExecutableRegion;
pub use crate::guarded_region::GuardedRegion;
pub use crate::mapped_region::{page_size, MappedRegion};
pub use crate::writable_region::WritableRegion;

/// Reinterprets the start of an [ExecutableRegion] as a function pointer of the given type.
///
/// # Safety
///
/// Must be used in an `unsafe` block. The region must contain a complete function that follows
/// the ABI named by the function type, and the region must outlive every call through the
/// returned pointer.
#[macro_export]
macro_rules! as_function {
    ($region: expr, $fn_type: ty) => {
        std::mem::transmute::<*const u8, $fn_type>($region.addr())
    };
}
