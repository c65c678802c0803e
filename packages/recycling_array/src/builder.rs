use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{BufferAllocator, DropPolicy, DynamicArray, HeapAllocator, RecyclingArray, Result};

/// Builder for creating an instance of [`DynamicArray`].
///
/// All settings are optional. Without any settings, the array allocates from the global heap,
/// reserves nothing up front and drops its items when dropped.
///
/// # Examples
///
/// ```
/// use recycling_array::{CappedAllocator, DropPolicy, DynamicArray};
///
/// let array = DynamicArray::<u64>::builder()
///     .allocator(CappedAllocator::new(1024))
///     .reserved_length(16)
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build()
///     .unwrap();
///
/// assert_eq!(array.reserved_length(), 16);
/// ```
#[must_use]
pub struct DynamicArrayBuilder<T, A: BufferAllocator = HeapAllocator> {
    allocator: A,
    reserved_length: usize,
    drop_policy: DropPolicy,

    _items: PhantomData<T>,
}

impl<T> DynamicArrayBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            allocator: HeapAllocator,
            reserved_length: 0,
            drop_policy: DropPolicy::default(),
            _items: PhantomData,
        }
    }
}

impl<T, A: BufferAllocator> DynamicArrayBuilder<T, A> {
    /// Sets the allocator the array obtains its buffer from.
    pub fn allocator<B: BufferAllocator>(self, allocator: B) -> DynamicArrayBuilder<T, B> {
        DynamicArrayBuilder {
            allocator,
            reserved_length: self.reserved_length,
            drop_policy: self.drop_policy,
            _items: PhantomData,
        }
    }

    /// Sets the number of items to reserve room for when the array is built.
    ///
    /// The reservation is exact; the growth policy only applies to later growth.
    pub fn reserved_length(mut self, length: usize) -> Self {
        self.reserved_length = length;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the array. This governs how
    /// to treat remaining items in the array when the array is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the array with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the initial reservation.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    pub fn build(self) -> Result<DynamicArray<T, A>> {
        let mut array = DynamicArray::new_inner(self.allocator, self.drop_policy);
        array.set_reserved_length(self.reserved_length)?;
        Ok(array)
    }
}

impl<T, A: BufferAllocator + fmt::Debug> fmt::Debug for DynamicArrayBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!("DynamicArrayBuilder<{}>", type_name::<T>()))
            .field("allocator", &self.allocator)
            .field("reserved_length", &self.reserved_length)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

/// Builder for creating an instance of [`RecyclingArray`].
///
/// All settings are optional. Without any settings, the array allocates from the global heap,
/// reserves nothing up front and drops its items when dropped.
///
/// The allocator is cloned so that the slots and the free list of reclaimed slots each get
/// their own buffer from it.
///
/// # Examples
///
/// ```
/// use recycling_array::RecyclingArray;
///
/// let mut array = RecyclingArray::<String>::builder()
///     .reserved_length(8)
///     .build()
///     .unwrap();
///
/// array.add("hello".to_string()).unwrap();
///
/// assert_eq!(array.len(), 1);
/// assert!(array.reserved_length() >= 8);
/// ```
#[must_use]
pub struct RecyclingArrayBuilder<T, A: BufferAllocator + Clone = HeapAllocator> {
    allocator: A,
    reserved_length: usize,
    drop_policy: DropPolicy,

    _items: PhantomData<T>,
}

impl<T> RecyclingArrayBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            allocator: HeapAllocator,
            reserved_length: 0,
            drop_policy: DropPolicy::default(),
            _items: PhantomData,
        }
    }
}

impl<T, A: BufferAllocator + Clone> RecyclingArrayBuilder<T, A> {
    /// Sets the allocator the array obtains its buffers from.
    pub fn allocator<B: BufferAllocator + Clone>(
        self,
        allocator: B,
    ) -> RecyclingArrayBuilder<T, B> {
        RecyclingArrayBuilder {
            allocator,
            reserved_length: self.reserved_length,
            drop_policy: self.drop_policy,
            _items: PhantomData,
        }
    }

    /// Sets the number of slots to reserve room for when the array is built.
    pub fn reserved_length(mut self, length: usize) -> Self {
        self.reserved_length = length;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the array. This governs how
    /// to treat remaining items in the array when the array is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the array with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the initial reservation.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    pub fn build(self) -> Result<RecyclingArray<T, A>> {
        RecyclingArray::new_inner(self.allocator, self.reserved_length, self.drop_policy)
    }
}

impl<T, A: BufferAllocator + Clone + fmt::Debug> fmt::Debug for RecyclingArrayBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!("RecyclingArrayBuilder<{}>", type_name::<T>()))
            .field("allocator", &self.allocator)
            .field("reserved_length", &self.reserved_length)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{CappedAllocator, Error};

    assert_impl_all!(DynamicArrayBuilder<u32>: Send, Sync, fmt::Debug);
    assert_impl_all!(RecyclingArrayBuilder<u32>: Send, Sync, fmt::Debug);

    #[test]
    fn defaults() {
        let array = DynamicArray::<u32>::builder().build().unwrap();

        assert!(array.is_empty());
        assert_eq!(array.reserved_length(), 0);
    }

    #[test]
    fn reserved_length_is_exact() {
        let array = DynamicArray::<u32>::builder()
            .reserved_length(7)
            .build()
            .unwrap();

        assert_eq!(array.reserved_length(), 7);
    }

    #[test]
    fn refused_reservation_is_error() {
        let result = DynamicArray::<u32>::builder()
            .allocator(CappedAllocator::new(8))
            .reserved_length(3)
            .build();

        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
    }

    #[test]
    fn allocator_is_kept() {
        let array = DynamicArray::<u32>::builder()
            .allocator(CappedAllocator::new(64))
            .build()
            .unwrap();

        assert_eq!(array.allocator().max_buffer_bytes(), 64);
    }

    #[test]
    fn recycling_reserved_length_covers_slots() {
        let array = RecyclingArray::<u64>::builder()
            .reserved_length(5)
            .build()
            .unwrap();

        assert_eq!(array.reserved_length(), 5);
        assert!(array.is_empty());
    }

    #[test]
    fn recycling_refused_reservation_is_error() {
        let result = RecyclingArray::<u64>::builder()
            .allocator(CappedAllocator::new(16))
            .reserved_length(100)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn debug_names_item_type() {
        let builder = DynamicArray::<u16>::builder();

        assert!(format!("{builder:?}").contains("u16"));
    }
}
