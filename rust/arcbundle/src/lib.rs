//! Bundled shared allocations: one control block and at most one payload
//! buffer behind a tuple of independently cloneable handles.
//!
//! [`bundle`] constructs a group of logically related members — plain
//! values and dynamically-sized slices — in a single reference-counted
//! allocation. Slice members are placement-constructed at correctly
//! aligned offsets inside one shared byte buffer; value members live
//! inline in the control block. Each member gets its own [`Shared`] or
//! [`SharedSlice`] handle, and all handles co-own the same allocation:
//! the group is torn down exactly once, when the last handle is dropped.
//!
//! ```
//! use arcbundle::{bundle, slice, value_of};
//!
//! let (header, samples) = bundle((value_of(42u32), slice::<f64>(3)));
//! assert_eq!(*header, 42);
//! assert_eq!(&*samples, &[0.0, 0.0, 0.0]);
//!
//! // `samples` keeps the whole group alive on its own.
//! drop(header);
//! assert_eq!(samples.len(), 3);
//! ```

use std::sync::Arc;

pub mod align;
mod buffer;
pub mod handle;
pub mod member;
mod storage;

pub use handle::{Shared, SharedSlice};
pub use member::{Member, Members, Slice, Value, slice, value, value_of};

use buffer::RawBuffer;
use storage::Storage;

/// Constructs every member of the tuple inside one shared allocation and
/// returns their handles, in declared order.
///
/// Performs exactly one control-block allocation and, when the slice
/// members need payload bytes, exactly one buffer allocation — regardless
/// of the number of members. The buffer is over-allocated by at most
/// `alignment - 1` bytes so that every slice member starts at an offset
/// aligned for its element type. Slice elements are default-constructed.
///
/// # Examples
///
/// ```
/// use arcbundle::{bundle, slice};
///
/// let (names, ids) = bundle((slice::<u8>(5), slice::<u32>(2)));
/// assert_eq!(names.len(), 5);
/// assert_eq!(&*ids, &[0, 0]);
/// ```
///
/// # Panics
///
/// Panics if the combined payload size overflows `usize`. Allocation
/// failure is fatal and surfaces through the global allocator's failure
/// path, never as a partially constructed bundle.
pub fn bundle<M: Members>(members: M) -> M::Handles {
    let size = members.buffer_size();
    let mut buffer = RawBuffer::allocate(size, M::BUFFER_ALIGN);
    let base = buffer.as_mut().map_or(std::ptr::null_mut(), RawBuffer::base);
    // SAFETY: `base` spans `size` bytes aligned to `M::BUFFER_ALIGN`, the
    // extents the fold reserved. A null base occurs only when `size` is 0,
    // in which case no slice member dereferences it.
    let slots = unsafe { members.place(base) };
    let storage = Arc::new(Storage { buffer, slots });
    M::export(&storage)
}
