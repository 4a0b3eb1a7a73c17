//! The reference-counted storage block shared by every handle of a bundle.

use crate::buffer::RawBuffer;
use crate::member::Members;

/// The single shared allocation behind a bundle: the payload buffer (when
/// any slice member has a non-zero byte extent) plus the constructed
/// member slots.
///
/// Value slots live directly in this block; slice slots point into
/// `buffer`. Handles keep the block alive through an `Arc`; it is dropped
/// exactly once, when the last handle or sub-view releases it.
pub struct Storage<M: Members> {
    pub(crate) buffer: Option<RawBuffer>,
    pub(crate) slots: M::Slots,
}

impl<M: Members> Drop for Storage<M> {
    fn drop(&mut self) {
        // Slice elements live in `buffer`; destroy them while it is still
        // allocated. Value slots drop as ordinary fields afterwards.
        unsafe { M::discard(&mut self.slots) };
        self.buffer.take();
    }
}
