//! Member descriptors and the layout fold over member tuples.
//!
//! A bundle is declared as an ordered tuple of descriptors: [`Value`] for
//! a plain value constructed inside the shared control block, [`Slice`]
//! for `len` elements placement-constructed inside the shared payload
//! buffer. [`Members`] folds over such a tuple to compute the combined
//! payload size and alignment, carve aligned sub-ranges out of one
//! buffer, and produce the per-member handles.

use std::any::Any;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::align::align_up;
use crate::handle::{Shared, SharedSlice};
use crate::storage::Storage;

mod sealed {
    pub trait Sealed {}
}

/// A value member: one `T` stored directly in the shared control block.
pub struct Value<T> {
    init: T,
}

/// A slice member: `len` elements of `T` constructed inside the shared
/// payload buffer, at an offset aligned for `T`.
pub struct Slice<T> {
    len: usize,
    _marker: PhantomData<T>,
}

/// Declares a default-constructed value member.
pub fn value<T: Default>() -> Value<T> {
    Value {
        init: T::default(),
    }
}

/// Declares a value member with the given initial value.
pub fn value_of<T>(init: T) -> Value<T> {
    Value { init }
}

/// Declares a slice member of `len` default-constructed elements.
pub fn slice<T: Default>(len: usize) -> Slice<T> {
    Slice {
        len,
        _marker: PhantomData,
    }
}

/// Location of a constructed slice member inside the payload buffer.
///
/// The pointer is dangling (and never dereferenced) when the member's
/// byte extent is zero.
pub struct RawSlice<T> {
    ptr: NonNull<T>,
    len: usize,
}

unsafe impl<T: Send> Send for RawSlice<T> {}
unsafe impl<T: Sync> Sync for RawSlice<T> {}

/// One member of a bundle.
///
/// Implemented by [`Value`] and [`Slice`]; the methods are plumbing for
/// [`bundle`](crate::bundle) and are not meant to be called directly.
pub trait Member: sealed::Sealed + Sized + 'static {
    /// Storage for the constructed member inside the control block.
    type Slot: Send + Sync + 'static;
    /// Handle type produced for this member.
    type Handle;

    #[doc(hidden)]
    const ALIGN: usize;
    #[doc(hidden)]
    const IS_SLICE: bool;

    /// Aligns `offset` as this member requires and adds its byte extent.
    #[doc(hidden)]
    fn reserve(&self, offset: usize) -> usize;

    /// Constructs the member.
    ///
    /// # Safety
    ///
    /// `base` must point to a buffer aligned to the member tuple's
    /// combined alignment and large enough for every extent accounted by
    /// `reserve`; `*offset` must carry the running offset of the same
    /// fold that `reserve` performed.
    #[doc(hidden)]
    unsafe fn place(self, base: *mut u8, offset: &mut usize) -> Self::Slot;

    /// Destroys the elements recorded in the slot.
    ///
    /// # Safety
    ///
    /// Must be called at most once, on a slot produced by `place` whose
    /// elements are still alive.
    #[doc(hidden)]
    unsafe fn discard(slot: &mut Self::Slot);

    #[doc(hidden)]
    fn export(slot: &Self::Slot, owner: Arc<dyn Any + Send + Sync>) -> Self::Handle;
}

impl<T> sealed::Sealed for Value<T> {}

impl<T: Send + Sync + 'static> Member for Value<T> {
    type Slot = T;
    type Handle = Shared<T>;

    const ALIGN: usize = 1;
    const IS_SLICE: bool = false;

    fn reserve(&self, offset: usize) -> usize {
        offset
    }

    unsafe fn place(self, _base: *mut u8, _offset: &mut usize) -> T {
        self.init
    }

    unsafe fn discard(_slot: &mut T) {}

    fn export(slot: &T, owner: Arc<dyn Any + Send + Sync>) -> Shared<T> {
        Shared::new(NonNull::from(slot), owner)
    }
}

impl<T> sealed::Sealed for Slice<T> {}

impl<T: Default + Send + Sync + 'static> Member for Slice<T> {
    type Slot = RawSlice<T>;
    type Handle = SharedSlice<T>;

    const ALIGN: usize = mem::align_of::<T>();
    const IS_SLICE: bool = true;

    fn reserve(&self, offset: usize) -> usize {
        let offset = align_up(offset, Self::ALIGN);
        let bytes = mem::size_of::<T>().checked_mul(self.len).expect("mul");
        offset.checked_add(bytes).expect("add")
    }

    unsafe fn place(self, base: *mut u8, offset: &mut usize) -> RawSlice<T> {
        *offset = align_up(*offset, Self::ALIGN);
        let bytes = mem::size_of::<T>() * self.len;
        let ptr = if bytes == 0 {
            NonNull::<T>::dangling()
        } else {
            // SAFETY: `reserve` accounted for `bytes` at this offset.
            unsafe { NonNull::new_unchecked(base.add(*offset).cast::<T>()) }
        };
        for i in 0..self.len {
            unsafe { ptr.as_ptr().add(i).write(T::default()) };
        }
        *offset += bytes;
        RawSlice {
            ptr,
            len: self.len,
        }
    }

    unsafe fn discard(slot: &mut RawSlice<T>) {
        let elements = std::ptr::slice_from_raw_parts_mut(slot.ptr.as_ptr(), slot.len);
        unsafe { std::ptr::drop_in_place(elements) };
    }

    fn export(slot: &RawSlice<T>, owner: Arc<dyn Any + Send + Sync>) -> SharedSlice<T> {
        SharedSlice::new(slot.ptr, slot.len, owner)
    }
}

/// An ordered tuple of bundle members.
///
/// Implemented for `()` and for tuples of up to 12 [`Member`]s. The fold
/// processes members in declared order, so the payload buffer holds the
/// slice members' extents in declaration order.
pub trait Members: sealed::Sealed + Sized + 'static {
    /// Slot tuple held by the storage block.
    type Slots: Send + Sync + 'static;
    /// Handle tuple returned by [`bundle`](crate::bundle).
    type Handles;

    /// Strictest element alignment among the slice members (1 if none).
    const BUFFER_ALIGN: usize;
    /// Number of slice members in the tuple.
    const SLICE_MEMBERS: usize;

    /// Total payload bytes needed by the slice members, including the
    /// padding between their extents.
    ///
    /// # Panics
    ///
    /// Panics if the total overflows `usize`.
    fn buffer_size(&self) -> usize;

    /// # Safety
    ///
    /// `base` must satisfy the conditions of [`Member::place`] for the
    /// whole tuple; a null `base` is allowed only when `buffer_size`
    /// is 0.
    #[doc(hidden)]
    unsafe fn place(self, base: *mut u8) -> Self::Slots;

    /// # Safety
    ///
    /// Must be called at most once, with the slots still live.
    #[doc(hidden)]
    unsafe fn discard(slots: &mut Self::Slots);

    #[doc(hidden)]
    fn export(storage: &Arc<Storage<Self>>) -> Self::Handles;
}

impl sealed::Sealed for () {}

impl Members for () {
    type Slots = ();
    type Handles = ();

    const BUFFER_ALIGN: usize = 1;
    const SLICE_MEMBERS: usize = 0;

    fn buffer_size(&self) -> usize {
        0
    }

    unsafe fn place(self, _base: *mut u8) -> Self::Slots {}

    unsafe fn discard(_slots: &mut Self::Slots) {}

    fn export(_storage: &Arc<Storage<Self>>) -> Self::Handles {}
}

macro_rules! impl_members {
    ($(($m:ident, $idx:tt)),+) => {
        impl<$($m: Member,)+> sealed::Sealed for ($($m,)+) {}

        impl<$($m: Member,)+> Members for ($($m,)+) {
            type Slots = ($($m::Slot,)+);
            type Handles = ($($m::Handle,)+);

            const BUFFER_ALIGN: usize = {
                let mut align = 1usize;
                $(
                    if $m::ALIGN > align {
                        align = $m::ALIGN;
                    }
                )+
                align
            };

            const SLICE_MEMBERS: usize = {
                let mut count = 0usize;
                $(
                    if $m::IS_SLICE {
                        count += 1;
                    }
                )+
                count
            };

            fn buffer_size(&self) -> usize {
                let size = 0usize;
                $( let size = self.$idx.reserve(size); )+
                size
            }

            unsafe fn place(self, base: *mut u8) -> Self::Slots {
                let mut offset = 0usize;
                ($( unsafe { self.$idx.place(base, &mut offset) },)+)
            }

            unsafe fn discard(slots: &mut Self::Slots) {
                $( unsafe { $m::discard(&mut slots.$idx) }; )+
            }

            fn export(storage: &Arc<Storage<Self>>) -> Self::Handles {
                let owner: Arc<dyn Any + Send + Sync> = storage.clone();
                ($( $m::export(&storage.slots.$idx, owner.clone()),)+)
            }
        }
    };
}

impl_members!((A, 0));
impl_members!((A, 0), (B, 1));
impl_members!((A, 0), (B, 1), (C, 2));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7), (I, 8));
impl_members!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5), (G, 6), (H, 7), (I, 8), (J, 9));
impl_members!(
    (A, 0),
    (B, 1),
    (C, 2),
    (D, 3),
    (E, 4),
    (F, 5),
    (G, 6),
    (H, 7),
    (I, 8),
    (J, 9),
    (K, 10)
);
impl_members!(
    (A, 0),
    (B, 1),
    (C, 2),
    (D, 3),
    (E, 4),
    (F, 5),
    (G, 6),
    (H, 7),
    (I, 8),
    (J, 9),
    (K, 10),
    (L, 11)
);
