use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// The capability an array needs from its memory source: obtain, resize and return buffers.
///
/// Arrays never talk to an allocator directly. Each array owns a buffer handle that routes all
/// requests through this trait, so swapping the allocator changes where memory comes from
/// without changing how the arrays grow.
///
/// Allocation failure is an ordinary outcome here. Returning `None` makes the array operation
/// that asked for memory fail with [`Error::AllocationFailed`][crate::Error::AllocationFailed]
/// and leaves the array unchanged.
///
/// # Safety
///
/// Implementations must uphold the following:
///
/// * A pointer returned by [`allocate()`][Self::allocate] or [`reallocate()`][Self::reallocate]
///   is valid for reads and writes of the requested number of bytes and is aligned to the
///   requested alignment, until it is passed to [`deallocate()`][Self::deallocate] or to a
///   successful [`reallocate()`][Self::reallocate].
/// * A successful [`reallocate()`][Self::reallocate] preserves the first
///   `min(old_layout.size(), new_size)` bytes of the buffer, moving them if the address changes.
/// * A failed [`reallocate()`][Self::reallocate] leaves the original buffer untouched and valid.
pub unsafe trait BufferAllocator {
    /// Allocates a buffer for the given non-zero-sized layout.
    ///
    /// Returns `None` if the allocator cannot or will not provide the memory.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Resizes a buffer previously obtained from this allocator, preserving its contents up to
    /// the smaller of the old and new sizes.
    ///
    /// Returns `None` if the allocator cannot or will not provide the memory, in which case
    /// the original buffer remains valid.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` was returned by this allocator for `old_layout`, has not
    /// been deallocated and that `new_size` is non-zero.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Returns a buffer to the allocator.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` was returned by this allocator for `layout` and that it
    /// has not already been deallocated.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Allocates buffers from the Rust global allocator.
///
/// This is the default allocator of all arrays in this crate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeapAllocator;

// SAFETY: We forward to the global allocator, which upholds the same contract.
unsafe impl BufferAllocator for HeapAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "zero-sized buffers are never requested");

        // SAFETY: The layout is not zero-sized (asserted above, guaranteed by the handle).
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        // `realloc` requires that the new size, rounded up to alignment, fits in `isize`.
        Layout::from_size_align(new_size, old_layout.align()).ok()?;

        // SAFETY: Forwarding the caller's guarantees about `ptr` and `old_layout`, and we checked
        // above that the new size forms a valid layout with the same alignment.
        NonNull::new(unsafe { alloc::realloc(ptr.as_ptr(), old_layout, new_size) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// Wraps another allocator and refuses to provide any buffer larger than a fixed ceiling.
///
/// Arrays that use this allocator stop growing once their buffer would exceed the ceiling:
/// operations that need more room fail with
/// [`Error::AllocationFailed`][crate::Error::AllocationFailed] and leave the array unchanged.
///
/// # Examples
///
/// ```
/// use recycling_array::{CappedAllocator, DynamicArray};
///
/// // Room for at most four `u32` values.
/// let mut array = DynamicArray::<u32>::builder()
///     .allocator(CappedAllocator::new(16))
///     .build()
///     .unwrap();
///
/// for value in 0..4 {
///     array.add(value).unwrap();
/// }
///
/// assert!(array.add(4).is_err());
/// assert_eq!(array.as_slice(), &[0, 1, 2, 3]);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CappedAllocator<A = HeapAllocator> {
    max_buffer_bytes: usize,
    inner: A,
}

impl CappedAllocator {
    /// Creates an allocator that serves buffers of up to `max_buffer_bytes` from the heap.
    #[must_use]
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self::with_inner(max_buffer_bytes, HeapAllocator)
    }
}

impl<A> CappedAllocator<A> {
    /// Creates an allocator that serves buffers of up to `max_buffer_bytes` from `inner`.
    #[must_use]
    pub fn with_inner(max_buffer_bytes: usize, inner: A) -> Self {
        Self {
            max_buffer_bytes,
            inner,
        }
    }

    /// The largest buffer, in bytes, this allocator will provide.
    #[must_use]
    pub fn max_buffer_bytes(&self) -> usize {
        self.max_buffer_bytes
    }
}

// SAFETY: We only ever refuse requests or forward them to an allocator that upholds the contract.
unsafe impl<A: BufferAllocator> BufferAllocator for CappedAllocator<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() > self.max_buffer_bytes {
            return None;
        }

        self.inner.allocate(layout)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if new_size > self.max_buffer_bytes {
            return None;
        }

        // SAFETY: Forwarding the caller's guarantees.
        unsafe { self.inner.reallocate(ptr, old_layout, new_size) }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.inner.deallocate(ptr, layout);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(HeapAllocator: Send, Sync, Clone, Copy);
    assert_impl_all!(CappedAllocator: Send, Sync, Clone, Copy);

    #[test]
    fn heap_reallocate_preserves_prefix() {
        let layout = Layout::array::<u32>(4).unwrap();
        let ptr = HeapAllocator.allocate(layout).unwrap();

        unsafe {
            ptr.cast::<u32>().write(7);
            ptr.cast::<u32>().add(3).write(9);
        }

        let new_ptr = unsafe { HeapAllocator.reallocate(ptr, layout, 64) }.unwrap();

        unsafe {
            assert_eq!(new_ptr.cast::<u32>().read(), 7);
            assert_eq!(new_ptr.cast::<u32>().add(3).read(), 9);

            HeapAllocator.deallocate(new_ptr, Layout::from_size_align(64, layout.align()).unwrap());
        }
    }

    #[test]
    fn capped_refuses_oversized_allocation() {
        let allocator = CappedAllocator::new(8);

        assert!(allocator.allocate(Layout::array::<u8>(9).unwrap()).is_none());

        let layout = Layout::array::<u8>(8).unwrap();
        let ptr = allocator.allocate(layout).unwrap();
        unsafe { allocator.deallocate(ptr, layout) };
    }

    #[test]
    fn capped_refusal_keeps_original_buffer() {
        let allocator = CappedAllocator::new(8);
        let layout = Layout::array::<u8>(4).unwrap();
        let ptr = allocator.allocate(layout).unwrap();

        unsafe { ptr.write(42) };

        assert!(unsafe { allocator.reallocate(ptr, layout, 16) }.is_none());

        // Still ours and still intact.
        assert_eq!(unsafe { ptr.read() }, 42);
        unsafe { allocator.deallocate(ptr, layout) };
    }

    #[test]
    fn capped_reports_ceiling() {
        assert_eq!(CappedAllocator::new(123).max_buffer_bytes(), 123);
    }
}
