use std::fmt;
use std::ptr::NonNull;

/// A position in an array, stored as an element index.
///
/// Cursors do not point into memory, so they stay meaningful when the array relocates its buffer
/// while growing. They do not borrow the array, either: whether a cursor still refers to a live
/// element is a question for the array (e.g. [`RecyclingArray::is_valid_cursor()`][1]).
///
/// [1]: crate::RecyclingArray::is_valid_cursor
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    #[must_use]
    pub(crate) fn new(index: usize) -> Self {
        Self { index }
    }

    /// The element index this cursor refers to.
    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }

    /// The distance in bytes between the start of the buffer and the element this cursor
    /// refers to, for an array of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the offset does not fit in `usize`.
    #[must_use]
    pub fn byte_offset<T>(self) -> usize {
        self.index
            .checked_mul(size_of::<T>())
            .expect("a cursor into a real buffer can never be further away than usize::MAX bytes")
    }
}

/// A raw pointer into the buffer of a [`DynamicArray`][1], tagged with the buffer generation it
/// was obtained in.
///
/// Any operation that grows the array may move its buffer, which leaves raw pointers dangling.
/// Pass the cursor to one of the rebasing capacity checks, such as
/// [`DynamicArray::check_reserved_length_rebasing()`][2], to have it follow the buffer. Use
/// [`DynamicArray::is_current()`][3] to check whether a cursor still belongs to the current
/// buffer.
///
/// Dereferencing the pointer is up to the caller and requires `unsafe` code.
///
/// [1]: crate::DynamicArray
/// [2]: crate::DynamicArray::check_reserved_length_rebasing
/// [3]: crate::DynamicArray::is_current
pub struct RawCursor<T> {
    ptr: NonNull<T>,
    generation: u64,
}

impl<T> RawCursor<T> {
    #[must_use]
    pub(crate) fn new(ptr: NonNull<T>, generation: u64) -> Self {
        Self { ptr, generation }
    }

    /// The pointer to the element (or one past the last element) this cursor refers to.
    ///
    /// The pointer is only valid while [`DynamicArray::is_current()`][1] returns `true` for
    /// this cursor.
    ///
    /// [1]: crate::DynamicArray::is_current
    #[must_use]
    pub fn as_ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// The buffer generation this cursor was obtained or last rebased in.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn rebase(&mut self, ptr: NonNull<T>, generation: u64) {
        self.ptr = ptr;
        self.generation = generation;
    }
}

impl<T> Clone for RawCursor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RawCursor<T> {}

impl<T> PartialEq for RawCursor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.generation == other.generation
    }
}

impl<T> Eq for RawCursor<T> {}

impl<T> fmt::Debug for RawCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCursor")
            .field("ptr", &self.ptr)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Cursor: Send, Sync, Copy);
    assert_impl_all!(RawCursor<String>: Copy, fmt::Debug);
    assert_not_impl_any!(RawCursor<u32>: Send, Sync);

    #[test]
    fn cursor_byte_offset_scales_with_element_size() {
        let cursor = Cursor::new(3);

        assert_eq!(cursor.index(), 3);
        assert_eq!(cursor.byte_offset::<u8>(), 3);
        assert_eq!(cursor.byte_offset::<u64>(), 24);
    }

    #[test]
    fn cursors_order_by_index() {
        assert!(Cursor::new(1) < Cursor::new(2));
        assert_eq!(Cursor::new(5), Cursor::new(5));
    }

    #[test]
    #[should_panic]
    fn cursor_byte_offset_overflow_panics() {
        _ = Cursor::new(usize::MAX).byte_offset::<u32>();
    }

    #[test]
    fn raw_cursor_rebase_replaces_pointer_and_generation() {
        let mut values = [1_u32, 2];
        let first = NonNull::from(&mut values[0]);
        let second = NonNull::from(&mut values[1]);

        let mut cursor = RawCursor::new(first, 0);
        cursor.rebase(second, 7);

        assert_eq!(cursor.as_ptr(), second);
        assert_eq!(cursor.generation(), 7);
        assert_ne!(cursor, RawCursor::new(second, 6));
    }
}
