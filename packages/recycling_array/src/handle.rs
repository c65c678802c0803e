use std::alloc::Layout;
use std::fmt;
use std::ptr::NonNull;

use tracing::debug;

use crate::BufferAllocator;

/// Owns one contiguous buffer obtained from a [`BufferAllocator`].
///
/// The handle knows nothing about elements. It deals in bytes only: the array on top of it
/// decides how much to ask for and how the bytes are interpreted.
///
/// The handle starts out without a buffer. The first successful [`reallocate()`][1] acquires
/// one and later calls resize it, possibly moving it. [`release()`][2] (or dropping the handle)
/// gives the buffer back to the allocator.
///
/// [1]: Self::reallocate
/// [2]: Self::release
pub(crate) struct BufferHandle<A: BufferAllocator> {
    /// Start of the buffer, if one is currently held.
    ptr: Option<NonNull<u8>>,

    /// Size of the held buffer in bytes. Zero if no buffer is held.
    allocated_size: usize,

    /// Alignment every buffer obtained by this handle must satisfy.
    align: usize,

    allocator: A,
}

impl<A: BufferAllocator> BufferHandle<A> {
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[must_use]
    pub(crate) fn new(align: usize, allocator: A) -> Self {
        assert!(
            align.is_power_of_two(),
            "buffer alignment {align} is not a power of two"
        );

        Self {
            ptr: None,
            allocated_size: 0,
            align,
            allocator,
        }
    }

    /// Start of the held buffer, or `None` if the handle holds no buffer.
    #[must_use]
    pub(crate) fn ptr(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    /// Size of the held buffer in bytes.
    #[must_use]
    pub(crate) fn allocated_size(&self) -> usize {
        self.allocated_size
    }

    #[must_use]
    pub(crate) fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Resizes the held buffer to `new_size` bytes, acquiring one if none is held.
    ///
    /// `used_size` is the number of leading bytes the caller relies on. These are preserved,
    /// moved along with the buffer if its address changes. `required_used_size` is the number of
    /// bytes the caller is about to use once the call succeeds and never exceeds `new_size`.
    ///
    /// Returns `false` if the allocator refused, in which case the previously held buffer (if
    /// any) is untouched and still held.
    #[must_use]
    pub(crate) fn reallocate(
        &mut self,
        new_size: usize,
        used_size: usize,
        required_used_size: usize,
    ) -> bool {
        debug_assert!(used_size <= self.allocated_size);
        debug_assert!(used_size <= required_used_size);
        debug_assert!(required_used_size <= new_size);

        if new_size == 0 {
            // Nothing to hold, nothing to do.
            return true;
        }

        let Ok(new_layout) = Layout::from_size_align(new_size, self.align) else {
            debug!(new_size, align = self.align, "buffer size does not form a valid layout");
            return false;
        };

        let new_ptr = match self.ptr {
            None => self.allocator.allocate(new_layout),
            Some(ptr) => {
                // SAFETY: The layout was valid when we allocated with it and neither size nor
                // alignment changed since then.
                let old_layout =
                    unsafe { Layout::from_size_align_unchecked(self.allocated_size, self.align) };

                // SAFETY: The pointer came from this allocator with this layout and is still
                // held by us. The new size is non-zero (checked above).
                unsafe { self.allocator.reallocate(ptr, old_layout, new_size) }
            }
        };

        let Some(new_ptr) = new_ptr else {
            debug!(
                new_size,
                used_size,
                required_used_size,
                allocated_size = self.allocated_size,
                "allocator refused to provide buffer"
            );
            return false;
        };

        self.ptr = Some(new_ptr);
        self.allocated_size = new_size;

        true
    }

    /// Returns the held buffer to the allocator. Does nothing if no buffer is held.
    ///
    /// The caller is responsible for having dropped any values stored in the buffer.
    pub(crate) fn release(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };

        // SAFETY: The layout was valid when we allocated with it and nothing changed since then.
        let layout = unsafe { Layout::from_size_align_unchecked(self.allocated_size, self.align) };

        debug!(allocated_size = self.allocated_size, "releasing buffer");

        // SAFETY: The pointer came from this allocator with this layout and we just gave up
        // our only copy of it by taking it out of `self.ptr`.
        unsafe {
            self.allocator.deallocate(ptr, layout);
        }

        self.allocated_size = 0;
    }
}

impl<A: BufferAllocator> Drop for BufferHandle<A> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<A: BufferAllocator + fmt::Debug> fmt::Debug for BufferHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("ptr", &self.ptr)
            .field("allocated_size", &self.allocated_size)
            .field("align", &self.align)
            .field("allocator", &self.allocator)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use super::*;
    use crate::{CappedAllocator, HeapAllocator};

    #[test]
    fn starts_without_buffer() {
        let handle = BufferHandle::new(4, HeapAllocator);

        assert!(handle.ptr().is_none());
        assert_eq!(handle.allocated_size(), 0);
    }

    #[test]
    fn first_reallocate_acquires_buffer() {
        let mut handle = BufferHandle::new(4, HeapAllocator);

        assert!(handle.reallocate(16, 0, 4));

        assert!(handle.ptr().is_some());
        assert_eq!(handle.allocated_size(), 16);
    }

    #[test]
    fn growth_preserves_used_bytes() {
        let mut handle = BufferHandle::new(1, HeapAllocator);
        assert!(handle.reallocate(4, 0, 4));

        let ptr = handle.ptr().unwrap();
        for i in 0..4_u8 {
            unsafe { ptr.add(usize::from(i)).write(i + 10) };
        }

        assert!(handle.reallocate(4096, 4, 5));

        let ptr = handle.ptr().unwrap();
        for i in 0..4_u8 {
            assert_eq!(unsafe { ptr.add(usize::from(i)).read() }, i + 10);
        }
    }

    #[test]
    fn refused_growth_keeps_buffer() {
        let mut handle = BufferHandle::new(1, CappedAllocator::new(8));
        assert!(handle.reallocate(8, 0, 1));

        let ptr_before = handle.ptr();
        unsafe { ptr_before.unwrap().write(99) };

        assert!(!handle.reallocate(9, 1, 9));

        assert_eq!(handle.ptr(), ptr_before);
        assert_eq!(handle.allocated_size(), 8);
        assert_eq!(unsafe { handle.ptr().unwrap().read() }, 99);
    }

    #[test]
    fn release_resets_to_empty() {
        let mut handle = BufferHandle::new(8, HeapAllocator);
        assert!(handle.reallocate(64, 0, 8));

        handle.release();

        assert!(handle.ptr().is_none());
        assert_eq!(handle.allocated_size(), 0);

        // Releasing twice is harmless.
        handle.release();
    }

    #[test]
    fn zero_size_request_is_noop() {
        let mut handle = BufferHandle::new(8, HeapAllocator);

        assert!(handle.reallocate(0, 0, 0));
        assert!(handle.ptr().is_none());
    }

    #[test]
    #[should_panic]
    fn non_power_of_two_alignment_panics() {
        drop(BufferHandle::new(3, HeapAllocator));
    }
}
