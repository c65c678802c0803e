use std::any::type_name;
use std::marker::PhantomData;
use std::ops::{Bound, Index, IndexMut, Range, RangeBounds};
use std::ptr::{self, NonNull};
use std::{fmt, mem, slice, thread};

use smallvec::SmallVec;
use tracing::trace;

use crate::growth::grown_capacity_bytes;
use crate::{
    BufferAllocator, BufferHandle, Cursor, DropPolicy, DynamicArrayBuilder, Error, HeapAllocator,
    RawCursor, Result,
};

/// A growable array that stores its items in one contiguous buffer obtained from a
/// [`BufferAllocator`].
///
/// Every operation that needs room for more items first checks whether the buffer is large
/// enough and grows it if not. Growth is amortized: the buffer gains a quarter of its size, at
/// least four items and at least the demand plus a quarter, so a sequence of single-item
/// appends costs O(1) per append on average.
///
/// # Allocation failure
///
/// Running out of memory is not a panic. Every operation that may grow the buffer returns a
/// [`Result`][std::result::Result] and, if the allocator refuses to provide memory, the array is
/// left exactly as it was before the call.
///
/// # Positions across growth
///
/// Growing may move the buffer, which invalidates every reference and raw pointer into it.
/// There are two ways to hold on to a position across growth:
///
/// * [`Cursor`] stores an index and is unaffected by relocation.
/// * [`RawCursor`] stores a pointer. Pass it to
///   [`check_reserved_length_rebasing()`][1] and similar methods to have it follow the buffer.
///
/// # Example
///
/// ```rust
/// use recycling_array::DynamicArray;
///
/// let mut array = DynamicArray::<u32>::new();
///
/// array.add(1).unwrap();
/// array.add(3).unwrap();
/// array.insert(1, 2).unwrap();
///
/// assert_eq!(array.as_slice(), &[1, 2, 3]);
/// assert!(array.reserved_length() >= 3);
/// ```
///
/// [1]: Self::check_reserved_length_rebasing
pub struct DynamicArray<T, A: BufferAllocator = HeapAllocator> {
    handle: BufferHandle<A>,

    /// Number of initialized items at the start of the buffer.
    len: usize,

    /// Number of items the buffer can hold. The buffer may be slightly larger than this if the
    /// allocator handed out a size that is not a whole number of items; the excess is unused.
    reserved_length: usize,

    /// Incremented every time the buffer starts at a different address than before, so raw
    /// cursors from an earlier buffer can be recognized.
    generation: u64,

    drop_policy: DropPolicy,

    _items: PhantomData<T>,
}

impl<T> DynamicArray<T> {
    /// Creates an empty array that allocates from the global heap.
    ///
    /// No memory is allocated until the first item is added or capacity is reserved.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub fn new() -> Self {
        Self::new_inner(HeapAllocator, DropPolicy::default())
    }

    /// Starts building a new [`DynamicArray`].
    ///
    /// Use this when you want a custom allocator, an initial reservation or a drop policy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use recycling_array::DynamicArray;
    ///
    /// let array = DynamicArray::<u64>::builder()
    ///     .reserved_length(10)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(array.reserved_length(), 10);
    /// ```
    pub fn builder() -> DynamicArrayBuilder<T> {
        DynamicArrayBuilder::new()
    }
}

impl<T, A: BufferAllocator> DynamicArray<T, A> {
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub(crate) fn new_inner(allocator: A, drop_policy: DropPolicy) -> Self {
        assert!(
            size_of::<T>() > 0,
            "DynamicArray must have non-zero item size"
        );

        Self {
            handle: BufferHandle::new(align_of::<T>(), allocator),
            len: 0,
            reserved_length: 0,
            generation: 0,
            drop_policy,
            _items: PhantomData,
        }
    }

    /// The number of items in the array.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array contains no items. An empty array may still hold reserved capacity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of bytes occupied by the items in the array.
    #[must_use]
    pub fn size(&self) -> usize {
        // Cannot overflow because the items fit in an allocated buffer.
        self.len.wrapping_mul(size_of::<T>())
    }

    /// The number of items the array can hold without growing its buffer.
    #[must_use]
    pub fn reserved_length(&self) -> usize {
        self.reserved_length
    }

    /// The number of bytes the array can fill without growing its buffer.
    ///
    /// This is always a whole multiple of the item size.
    #[must_use]
    pub fn reserved_size(&self) -> usize {
        // Cannot overflow because the reservation fits in an allocated buffer.
        self.reserved_length.wrapping_mul(size_of::<T>())
    }

    /// The allocator that provides the buffer of this array.
    #[must_use]
    pub fn allocator(&self) -> &A {
        self.handle.allocator()
    }

    /// Makes sure the array can hold at least `length` items without further growth, growing the
    /// buffer according to the amortized growth policy if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn check_reserved_length(&mut self, length: usize) -> Result<()> {
        self.ensure_capacity_for(length)
    }

    /// Makes sure the array can accept `additional` more items without further growth.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn check_add_reserved_length(&mut self, additional: usize) -> Result<()> {
        let length = self
            .len
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow)?;

        self.ensure_capacity_for(length)
    }

    /// Same as [`check_reserved_length()`][Self::check_reserved_length] but also moves each of
    /// the given raw cursors along with the buffer if growing relocates it.
    ///
    /// After a successful call, each cursor points to the same item (or one-past-the-end
    /// position) as before and is [current][Self::is_current]. After a failed call, the cursors
    /// are unchanged and still valid because the buffer did not move.
    ///
    /// # Example
    ///
    /// ```rust
    /// use recycling_array::DynamicArray;
    ///
    /// let mut array = DynamicArray::<u32>::new();
    /// array.add(10).unwrap();
    /// array.add(20).unwrap();
    ///
    /// let mut second = array.raw_cursor(1);
    /// array.check_reserved_length_rebasing(1000, &mut [&mut second]).unwrap();
    ///
    /// assert!(array.is_current(&second));
    /// // SAFETY: The cursor is current and refers to an initialized item.
    /// assert_eq!(unsafe { second.as_ptr().read() }, 20);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if any cursor is not [current][Self::is_current] for this array.
    pub fn check_reserved_length_rebasing(
        &mut self,
        length: usize,
        cursors: &mut [&mut RawCursor<T>],
    ) -> Result<()> {
        if length <= self.reserved_length {
            return Ok(());
        }

        // Offsets are recorded before growing because afterwards the old buffer is gone.
        let offsets = cursors
            .iter()
            .map(|cursor| self.cursor_byte_offset(cursor))
            .collect::<SmallVec<[usize; 3]>>();

        self.grow_for(length)?;

        let base = self.base_ptr();
        for (cursor, offset) in cursors.iter_mut().zip(offsets) {
            // SAFETY: The offset was validated to be within the live items of the old buffer
            // and the new buffer holds at least as many items, so we stay within the allocation.
            let ptr = unsafe { base.byte_add(offset) };
            cursor.rebase(ptr, self.generation);
        }

        Ok(())
    }

    /// Same as [`check_add_reserved_length()`][Self::check_add_reserved_length] but also moves
    /// each of the given raw cursors along with the buffer if growing relocates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if any cursor is not [current][Self::is_current] for this array.
    pub fn check_add_reserved_length_rebasing(
        &mut self,
        additional: usize,
        cursors: &mut [&mut RawCursor<T>],
    ) -> Result<()> {
        let length = self
            .len
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow)?;

        self.check_reserved_length_rebasing(length, cursors)
    }

    /// Reserves room for exactly `length` items, bypassing the growth policy.
    ///
    /// Does nothing if the array can already hold `length` items; the buffer never shrinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn set_reserved_length(&mut self, length: usize) -> Result<()> {
        let size = length
            .checked_mul(size_of::<T>())
            .ok_or(Error::CapacityOverflow)?;

        self.set_reserved_size(size)
    }

    /// Reserves a buffer of exactly `size` bytes, bypassing the growth policy.
    ///
    /// Any part of `size` that does not make up a whole item is allocated but never used.
    /// Does nothing if the array can already fill `size` bytes; the buffer never shrinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn set_reserved_size(&mut self, size: usize) -> Result<()> {
        if size <= self.handle.allocated_size() {
            return Ok(());
        }

        let live = self.size();
        self.reallocate_to(size, live)
    }

    /// Ensures the buffer can hold `required_len` items. This is the gate every growing
    /// operation passes through before touching any item.
    fn ensure_capacity_for(&mut self, required_len: usize) -> Result<()> {
        if required_len <= self.reserved_length {
            return Ok(());
        }

        self.grow_for(required_len)
    }

    #[cold]
    fn grow_for(&mut self, required_len: usize) -> Result<()> {
        debug_assert!(required_len > self.reserved_length);

        let item_size = size_of::<T>();

        let required_bytes = required_len
            .checked_mul(item_size)
            .ok_or(Error::CapacityOverflow)?;

        // Cannot underflow because the live items fit in the reservation, which is smaller than
        // the requirement (asserted above).
        let required_additional_bytes = required_bytes.wrapping_sub(self.size());

        let new_size =
            grown_capacity_bytes(self.reserved_size(), required_additional_bytes, item_size)
                .ok_or(Error::CapacityOverflow)?;

        self.reallocate_to(new_size, required_bytes)
    }

    fn reallocate_to(&mut self, new_size: usize, required_used_size: usize) -> Result<()> {
        let previous_base = self.handle.ptr();
        let previous_size = self.reserved_size();

        if !self
            .handle
            .reallocate(new_size, self.size(), required_used_size)
        {
            return Err(Error::AllocationFailed {
                requested_bytes: new_size,
                current_bytes: previous_size,
            });
        }

        let relocated = self.handle.ptr() != previous_base;
        if relocated {
            self.generation = self.generation.wrapping_add(1);
        }

        self.reserved_length = self
            .handle
            .allocated_size()
            .checked_div(size_of::<T>())
            .expect("guarded by non-zero item size assertion in ctor");

        trace!(
            item_type = type_name::<T>(),
            previous_size,
            new_size = self.reserved_size(),
            len = self.len,
            relocated,
            "grew array buffer"
        );

        Ok(())
    }

    /// Appends an item to the end of the array, growing the buffer if necessary.
    ///
    /// Returns the index of the new item.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged and
    /// `value` is dropped.
    pub fn add(&mut self, value: T) -> Result<usize> {
        self.add_with(|| value)
    }

    /// Appends an item constructed by `f`, growing the buffer if necessary.
    ///
    /// The closure is only called once the array is certain to have room for the item.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged and
    /// `f` is not called.
    pub fn add_with(&mut self, f: impl FnOnce() -> T) -> Result<usize> {
        self.check_add_reserved_length(1)?;

        // SAFETY: We just ensured there is room for one more item.
        Ok(unsafe { self.add_unchecked(f()) })
    }

    /// Appends an item to the end of the array without checking for available capacity.
    ///
    /// Returns the index of the new item.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `len() < reserved_length()`, for example via a preceding
    /// successful [`check_add_reserved_length()`][Self::check_add_reserved_length].
    pub unsafe fn add_unchecked(&mut self, value: T) -> usize {
        debug_assert!(
            self.len < self.reserved_length,
            "add_unchecked() on a full array of {}",
            type_name::<T>()
        );

        let index = self.len;

        // SAFETY: The caller guarantees the slot at `len` is within the reservation, and it is
        // not initialized because it is beyond the live items.
        unsafe {
            self.slot_ptr(index).write(value);
        }

        // Cannot overflow because the slot we just filled is within the reservation.
        self.len = index.wrapping_add(1);

        index
    }

    /// Appends clones of all the given items, growing the buffer at most once.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn add_slice(&mut self, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        self.check_add_reserved_length(values.len())?;

        for value in values {
            // SAFETY: We reserved room for all the values above.
            unsafe {
                self.add_unchecked(value.clone());
            }
        }

        Ok(())
    }

    /// Inserts an item at `index`, shifting all items after it one position towards the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged and
    /// `value` is dropped.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        assert!(
            index <= self.len,
            "insert({index}) out of bounds in array of {} with length {}",
            type_name::<T>(),
            self.len
        );

        self.check_add_reserved_length(1)?;

        // Cannot underflow because of the bounds check above.
        let tail_len = self.len.wrapping_sub(index);

        // SAFETY: Both ranges lie within the reservation because there is room for one more item
        // (ensured above). `ptr::copy` permits the overlap.
        unsafe {
            ptr::copy(
                self.slot_ptr(index).as_ptr(),
                self.slot_ptr(index.wrapping_add(1)).as_ptr(),
                tail_len,
            );
        }

        // SAFETY: The slot was vacated by the shift above.
        unsafe {
            self.slot_ptr(index).write(value);
        }

        self.len = self.len.wrapping_add(1);

        Ok(())
    }

    /// Inserts clones of all the given items at `index`, shifting the items after it towards the
    /// end.
    ///
    /// If cloning panics, the items after `index` are leaked rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert_slice(&mut self, index: usize, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        assert!(
            index <= self.len,
            "insert_slice({index}) out of bounds in array of {} with length {}",
            type_name::<T>(),
            self.len
        );

        self.splice_clones(index..index, values)
    }

    /// Replaces the items in `range` with clones of the given items. The number of new items may
    /// differ from the size of the range; the items after the range are shifted to fit.
    ///
    /// If cloning panics, the items after the range are leaked rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn replace(&mut self, range: impl RangeBounds<usize>, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        let range = resolve_range(range, self.len);

        self.splice_clones(range, values)
    }

    fn splice_clones(&mut self, range: Range<usize>, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        let old_len = self.len;

        // Cannot underflow because the range lies within the live items.
        let new_len = old_len
            .wrapping_sub(range.len())
            .checked_add(values.len())
            .ok_or(Error::CapacityOverflow)?;

        self.ensure_capacity_for(new_len)?;

        // From here on, nothing can fail except for panics in drop or clone. While we shuffle
        // things around, the array only claims the items before the range, so a panic leaks the
        // rest instead of exposing uninitialized slots.
        self.len = range.start;

        // SAFETY: The range covers initialized items we no longer claim.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.slot_ptr(range.start).as_ptr(),
                range.len(),
            ));
        }

        // Cannot underflow because the range lies within the live items.
        let tail_len = old_len.wrapping_sub(range.end);

        // Cannot overflow because `new_len` did not.
        let tail_destination = range.start.wrapping_add(values.len());

        // SAFETY: Both ranges lie within the reservation ensured above. `ptr::copy` permits
        // the overlap.
        unsafe {
            ptr::copy(
                self.slot_ptr(range.end).as_ptr(),
                self.slot_ptr(tail_destination).as_ptr(),
                tail_len,
            );
        }

        for (offset, value) in values.iter().enumerate() {
            // SAFETY: The gap between the head and the shifted tail is within the reservation
            // and not initialized.
            unsafe {
                self.slot_ptr(range.start.wrapping_add(offset))
                    .write(value.clone());
            }
        }

        self.len = new_len;

        Ok(())
    }

    /// Replaces the entire contents of the array with clones of the given items.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn set(&mut self, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        // Reserve before removing anything, so failure leaves the old contents in place.
        self.ensure_capacity_for(values.len())?;

        self.remove_all();

        for value in values {
            // SAFETY: We reserved room for all the values above and the array is empty.
            unsafe {
                self.add_unchecked(value.clone());
            }
        }

        Ok(())
    }

    /// Removes and returns the item at `index`, shifting all items after it one position
    /// towards the start.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        assert!(
            index < self.len,
            "remove({index}) out of bounds in array of {} with length {}",
            type_name::<T>(),
            self.len
        );

        // SAFETY: The slot is within the live items (bounds check above).
        let value = unsafe { self.slot_ptr(index).read() };

        // Cannot overflow or underflow because of the bounds check above.
        let tail_len = self.len.wrapping_sub(index).wrapping_sub(1);

        // SAFETY: Both ranges lie within the live items. `ptr::copy` permits the overlap.
        unsafe {
            ptr::copy(
                self.slot_ptr(index.wrapping_add(1)).as_ptr(),
                self.slot_ptr(index).as_ptr(),
                tail_len,
            );
        }

        self.len = self.len.wrapping_sub(1);

        value
    }

    /// Drops the items in `range`, shifting the items after it towards the start.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn remove_range(&mut self, range: impl RangeBounds<usize>) {
        let range = resolve_range(range, self.len);
        let old_len = self.len;

        // If an item panics on drop, the items after the range are leaked.
        self.len = range.start;

        // SAFETY: The range covers initialized items we no longer claim.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.slot_ptr(range.start).as_ptr(),
                range.len(),
            ));
        }

        let tail_len = old_len.wrapping_sub(range.end);

        // SAFETY: Both ranges lie within the old live items. `ptr::copy` permits the overlap.
        unsafe {
            ptr::copy(
                self.slot_ptr(range.end).as_ptr(),
                self.slot_ptr(range.start).as_ptr(),
                tail_len,
            );
        }

        self.len = range.start.wrapping_add(tail_len);
    }

    /// Removes and returns the last item, or `None` if the array is empty.
    pub fn remove_last(&mut self) -> Option<T> {
        let index = self.len.checked_sub(1)?;

        self.len = index;

        // SAFETY: The slot was the last live item and we just gave up our claim on it.
        Some(unsafe { self.slot_ptr(index).read() })
    }

    /// Drops all items after the first `len`. Does nothing if the array is not longer than that.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }

        let dropped = self.len.wrapping_sub(len);
        self.len = len;

        // SAFETY: The range covers initialized items we no longer claim.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.slot_ptr(len).as_ptr(),
                dropped,
            ));
        }
    }

    /// Drops all items but keeps the buffer, so the array can be refilled without allocating.
    pub fn remove_all(&mut self) {
        self.truncate(0);
    }

    /// Drops all items and releases the buffer.
    ///
    /// The array remains usable and acquires a new buffer when it next needs one.
    pub fn clear(&mut self) {
        self.remove_all();
        self.handle.release();
        self.reserved_length = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Exchanges the contents (including buffers) of two arrays.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// The items of the array as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: The first `len` slots are initialized. With no buffer, the pointer is dangling
        // but well-aligned and `len` is zero, which is valid for an empty slice.
        unsafe { slice::from_raw_parts(self.base_ptr().as_ptr(), self.len) }
    }

    /// The items of the array as a mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: See `as_slice()`. We hold `&mut self`, so the slice is exclusive.
        unsafe { slice::from_raw_parts_mut(self.base_ptr().as_ptr(), self.len) }
    }

    /// The item at `index`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// The item at `index` for modification, or `None` if out of bounds.
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Iterates over the items in order.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Iterates over the items in order, for modification.
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// A cursor at the first item.
    #[must_use]
    #[allow(clippy::unused_self, reason = "paired with end(), which does need the array")]
    pub fn begin(&self) -> Cursor {
        Cursor::new(0)
    }

    /// A cursor one past the last item.
    #[must_use]
    pub fn end(&self) -> Cursor {
        Cursor::new(self.len)
    }

    /// A cursor at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    #[must_use]
    pub fn position_at(&self, index: usize) -> Cursor {
        assert!(
            index <= self.len,
            "position_at({index}) out of bounds in array of {} with length {}",
            type_name::<T>(),
            self.len
        );

        Cursor::new(index)
    }

    /// The item a cursor refers to.
    ///
    /// # Panics
    ///
    /// Panics if the cursor does not refer to an item.
    #[must_use]
    pub fn at(&self, cursor: Cursor) -> &T {
        &self[cursor.index()]
    }

    /// A raw cursor at `index`, which may be `len()` for the one-past-the-end position.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    #[must_use]
    pub fn raw_cursor(&self, index: usize) -> RawCursor<T> {
        assert!(
            index <= self.len,
            "raw_cursor({index}) out of bounds in array of {} with length {}",
            type_name::<T>(),
            self.len
        );

        RawCursor::new(self.slot_ptr(index), self.generation)
    }

    /// Whether a raw cursor obtained from this array still points into its current buffer.
    ///
    /// Raw cursors go stale when the buffer is relocated or released, unless they were passed to
    /// a rebasing call such as
    /// [`check_reserved_length_rebasing()`][Self::check_reserved_length_rebasing].
    #[must_use]
    pub fn is_current(&self, cursor: &RawCursor<T>) -> bool {
        cursor.generation() == self.generation && self.cursor_offset_in_bounds(cursor).is_some()
    }

    fn cursor_offset_in_bounds(&self, cursor: &RawCursor<T>) -> Option<usize> {
        let offset = cursor
            .as_ptr()
            .as_ptr()
            .addr()
            .checked_sub(self.base_ptr().as_ptr().addr())?;

        (offset <= self.size() && offset.checked_rem(size_of::<T>()) == Some(0)).then_some(offset)
    }

    fn cursor_byte_offset(&self, cursor: &RawCursor<T>) -> usize {
        assert!(
            cursor.generation() == self.generation,
            "raw cursor from buffer generation {} cannot be rebased by array of {} in generation {}",
            cursor.generation(),
            type_name::<T>(),
            self.generation
        );

        self.cursor_offset_in_bounds(cursor).unwrap_or_else(|| {
            panic!(
                "raw cursor {:?} does not point into array of {} with length {}",
                cursor.as_ptr(),
                type_name::<T>(),
                self.len
            )
        })
    }

    /// Index of the first item equal to `value` within `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    #[must_use]
    pub fn index_of_first_in(&self, range: impl RangeBounds<usize>, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let range = resolve_range(range, self.len);
        let start = range.start;

        self.as_slice()
            .get(range)?
            .iter()
            .position(|item| item == value)
            .map(|offset| start.wrapping_add(offset))
    }

    /// Index of the last item equal to `value` within `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    #[must_use]
    pub fn index_of_last_in(&self, range: impl RangeBounds<usize>, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let range = resolve_range(range, self.len);
        let start = range.start;

        self.as_slice()
            .get(range)?
            .iter()
            .rposition(|item| item == value)
            .map(|offset| start.wrapping_add(offset))
    }

    /// Index of the first item equal to `value`.
    #[must_use]
    pub fn index_of_first(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.index_of_first_in(.., value)
    }

    /// Index of the last item equal to `value`.
    #[must_use]
    pub fn index_of_last(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.index_of_last_in(.., value)
    }

    /// The first item equal to `value`.
    #[must_use]
    pub fn find_first(&self, value: &T) -> Option<&T>
    where
        T: PartialEq,
    {
        self.index_of_first(value).and_then(|index| self.get(index))
    }

    /// The last item equal to `value`.
    #[must_use]
    pub fn find_last(&self, value: &T) -> Option<&T>
    where
        T: PartialEq,
    {
        self.index_of_last(value).and_then(|index| self.get(index))
    }

    /// Creates a copy of the array with its own buffer from the same kind of allocator.
    ///
    /// The copy reserves exactly as many items as the original holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
        A: Clone,
    {
        let mut clone = Self::new_inner(self.allocator().clone(), self.drop_policy);
        clone.set_reserved_length(self.len)?;
        clone.add_slice(self.as_slice())?;
        Ok(clone)
    }

    fn base_ptr(&self) -> NonNull<T> {
        self.handle
            .ptr()
            .map_or_else(NonNull::dangling, NonNull::cast::<T>)
    }

    /// Pointer to the slot at `index`, which may be anywhere up to and including the end of the
    /// reservation. The slot may or may not be initialized.
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<T> {
        debug_assert!(
            index <= self.reserved_length,
            "slot {index} beyond reservation of {} in array of {}",
            self.reserved_length,
            type_name::<T>()
        );

        // SAFETY: The slot is within the reservation or one past its end, both of which are
        // within (or at the end of) the allocation. With no buffer, index is zero.
        unsafe { self.base_ptr().add(index) }
    }

    /// Sets the number of live items without touching the items themselves.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `len <= reserved_length()`, that the first `len` slots hold
    /// values the array may treat as its own (e.g. drop) and that any values beyond `len` have
    /// been dealt with.
    pub(crate) unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.reserved_length);

        self.len = len;
    }
}

/// Turns any range expression into a concrete range and checks it against the given length.
///
/// # Panics
///
/// Panics if the range does not lie within `0..len`.
pub(crate) fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start
            .checked_add(1)
            .expect("range start cannot exceed usize::MAX"),
        Bound::Unbounded => 0,
    };

    let end = match range.end_bound() {
        Bound::Included(&end) => end
            .checked_add(1)
            .expect("range end cannot exceed usize::MAX"),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    };

    assert!(
        start <= end && end <= len,
        "range {start}..{end} out of bounds for length {len}"
    );

    start..end
}

impl<T> Default for DynamicArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: BufferAllocator> Drop for DynamicArray<T, A> {
    fn drop(&mut self) {
        let was_empty = self.is_empty();

        self.remove_all();

        // The handle releases the buffer when it is dropped after us.

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            assert!(
                was_empty,
                "dropped a non-empty array of {} with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

impl<T: Clone, A: BufferAllocator + Clone> Clone for DynamicArray<T, A> {
    fn clone(&self) -> Self {
        self.try_clone().expect(
            "clone() treats allocation failure as fatal - use try_clone() to handle it instead",
        )
    }
}

impl<T: fmt::Debug, A: BufferAllocator> fmt::Debug for DynamicArray<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicArray")
            .field("items", &self.as_slice())
            .field("reserved_length", &self.reserved_length)
            .field("generation", &self.generation)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T: PartialEq, A: BufferAllocator, B: BufferAllocator> PartialEq<DynamicArray<T, B>>
    for DynamicArray<T, A>
{
    fn eq(&self, other: &DynamicArray<T, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: BufferAllocator> Eq for DynamicArray<T, A> {}

impl<T, A: BufferAllocator> Index<usize> for DynamicArray<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).unwrap_or_else(|| {
            panic!(
                "index {index} out of bounds in array of {} with length {}",
                type_name::<T>(),
                self.len
            )
        })
    }
}

impl<T, A: BufferAllocator> IndexMut<usize> for DynamicArray<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let len = self.len;

        self.get_mut(index).unwrap_or_else(|| {
            panic!(
                "index {index} out of bounds in array of {} with length {len}",
                type_name::<T>()
            )
        })
    }
}

impl<'a, T, A: BufferAllocator> IntoIterator for &'a DynamicArray<T, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: BufferAllocator> IntoIterator for &'a mut DynamicArray<T, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

// SAFETY: The array exclusively owns its buffer and the items in it, so it can move between
// threads as long as the items and the allocator can.
unsafe impl<T: Send, A: BufferAllocator + Send> Send for DynamicArray<T, A> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::arithmetic_side_effects,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::CappedAllocator;

    assert_impl_all!(DynamicArray<u32>: Send, fmt::Debug, Clone);
    assert_not_impl_any!(DynamicArray<u32>: Sync);
    assert_not_impl_any!(DynamicArray<Rc<u32>>: Send);

    /// Counts how many times values sharing the counter have been dropped.
    #[derive(Debug)]
    struct DropCounter {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn capped<T>(max_items: usize) -> DynamicArray<T, CappedAllocator> {
        DynamicArray::<T>::builder()
            .allocator(CappedAllocator::new(max_items * size_of::<T>()))
            .build()
            .unwrap()
    }

    #[test]
    fn smoke_test() {
        let mut array = DynamicArray::<u32>::new();

        assert!(array.is_empty());
        assert_eq!(array.reserved_length(), 0);

        assert_eq!(array.add(1).unwrap(), 0);
        assert_eq!(array.add(2).unwrap(), 1);
        assert_eq!(array.add(3).unwrap(), 2);

        assert_eq!(array.len(), 3);
        assert_eq!(array.size(), 12);
        assert_eq!(array.as_slice(), &[1, 2, 3]);
        assert_eq!(array[1], 2);

        assert_eq!(array.remove(0), 1);
        assert_eq!(array.as_slice(), &[2, 3]);
    }

    #[test]
    fn first_growth_reserves_floor() {
        let mut array = DynamicArray::<u32>::new();
        array.add(1).unwrap();

        assert_eq!(array.reserved_length(), 4);
        assert_eq!(array.reserved_size(), 16);
    }

    #[test]
    fn growth_beyond_reservation_of_four() {
        let mut array = DynamicArray::<u32>::builder()
            .reserved_length(4)
            .build()
            .unwrap();

        for value in 0..4 {
            array.add(value).unwrap();
        }
        assert_eq!(array.reserved_length(), 4);

        array.add(4).unwrap();

        assert_eq!(array.reserved_length(), 8);
        assert_eq!(array.reserved_size() % size_of::<u32>(), 0);
        assert_eq!(array.as_slice(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn bulk_add_grows_with_headroom() {
        let mut array = DynamicArray::<u8>::new();
        let values = [7_u8; 100];

        array.add_slice(&values).unwrap();

        // 100 bytes of demand + 25 bytes of headroom.
        assert_eq!(array.reserved_length(), 125);
        assert_eq!(array.len(), 100);
    }

    #[test]
    fn failed_add_leaves_array_unchanged() {
        let mut array = capped::<u32>(3);

        array.set_reserved_length(2).unwrap();
        array.add(1).unwrap();
        array.add(2).unwrap();

        // The growth policy wants 6 items, the allocator allows 3.
        let result = array.add(3);

        assert!(matches!(result, Err(Error::AllocationFailed { .. })));
        assert_eq!(array.as_slice(), &[1, 2]);
    }

    #[test]
    fn capped_array_can_use_exact_reservation() {
        let mut array = capped::<u32>(2);

        array.set_reserved_length(2).unwrap();
        array.add(1).unwrap();
        array.add(2).unwrap();

        assert_eq!(array.reserved_length(), 2);
        assert!(array.add(3).is_err());
    }

    #[test]
    fn add_with_is_not_called_on_failure() {
        let mut array = capped::<u32>(0);

        let result = array.add_with(|| panic!("must not be called"));

        assert!(result.is_err());
        assert!(array.is_empty());
    }

    #[test]
    fn add_unchecked_within_reservation() {
        let mut array = DynamicArray::<u32>::new();
        array.check_add_reserved_length(3).unwrap();

        unsafe {
            assert_eq!(array.add_unchecked(5), 0);
            assert_eq!(array.add_unchecked(6), 1);
            assert_eq!(array.add_unchecked(7), 2);
        }

        assert_eq!(array.as_slice(), &[5, 6, 7]);
    }

    #[test]
    fn insert_shifts_tail() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 4]).unwrap();

        array.insert(2, 3).unwrap();
        array.insert(0, 0).unwrap();
        array.insert(5, 5).unwrap();

        assert_eq!(array.as_slice(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    #[should_panic]
    fn insert_out_of_bounds_panics() {
        let mut array = DynamicArray::<u32>::new();
        array.insert(1, 1).unwrap();
    }

    #[test]
    fn insert_slice_in_middle() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 5]).unwrap();

        array.insert_slice(1, &[2, 3, 4]).unwrap();

        assert_eq!(array.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    #[should_panic]
    fn insert_slice_out_of_bounds_panics() {
        let mut array = DynamicArray::<u32>::new();
        array.insert_slice(3, &[1]).unwrap();
    }

    #[test]
    fn failed_insert_leaves_array_unchanged() {
        let mut array = capped::<u32>(4);
        array.set_reserved_length(4).unwrap();
        array.add_slice(&[1, 2, 3, 4]).unwrap();

        assert!(array.insert(0, 0).is_err());
        assert!(array.insert_slice(2, &[9, 9]).is_err());

        assert_eq!(array.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn replace_with_longer_run() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 3, 4]).unwrap();

        array.replace(1..3, &[20, 30, 35]).unwrap();

        assert_eq!(array.as_slice(), &[1, 20, 30, 35, 4]);
    }

    #[test]
    fn replace_with_shorter_run() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 3, 4, 5]).unwrap();

        array.replace(1..=3, &[9]).unwrap();

        assert_eq!(array.as_slice(), &[1, 9, 5]);
    }

    #[test]
    fn replace_drops_replaced_items() {
        let drops = Rc::new(Cell::new(0));
        let mut array = DynamicArray::new();

        for _ in 0..4 {
            array
                .add(Rc::new(DropCounter {
                    drops: Rc::clone(&drops),
                }))
                .unwrap();
        }

        let replacement = Rc::new(DropCounter {
            drops: Rc::clone(&drops),
        });
        array.replace(0..2, &[Rc::clone(&replacement)]).unwrap();

        assert_eq!(drops.get(), 2);
        assert_eq!(array.len(), 3);

        drop(replacement);
        drop(array);

        assert_eq!(drops.get(), 5);
    }

    #[test]
    #[should_panic]
    fn replace_out_of_bounds_panics() {
        let mut array = DynamicArray::<u32>::new();
        array.add(1).unwrap();

        array.replace(0..2, &[]).unwrap();
    }

    #[test]
    fn set_replaces_contents() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 3]).unwrap();

        array.set(&[7, 8]).unwrap();
        assert_eq!(array.as_slice(), &[7, 8]);

        array.set(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(array.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn failed_set_keeps_old_contents() {
        let mut array = capped::<u32>(4);
        array.add_slice(&[1, 2]).unwrap();

        assert!(array.set(&[1, 2, 3, 4, 5]).is_err());

        assert_eq!(array.as_slice(), &[1, 2]);
    }

    #[test]
    fn remove_range_shifts_tail() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[0, 1, 2, 3, 4, 5]).unwrap();

        array.remove_range(1..3);
        assert_eq!(array.as_slice(), &[0, 3, 4, 5]);

        array.remove_range(2..);
        assert_eq!(array.as_slice(), &[0, 3]);

        array.remove_range(..);
        assert!(array.is_empty());
    }

    #[test]
    fn remove_last_pops() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2]).unwrap();

        assert_eq!(array.remove_last(), Some(2));
        assert_eq!(array.remove_last(), Some(1));
        assert_eq!(array.remove_last(), None);
    }

    #[test]
    fn truncate_drops_tail_only() {
        let drops = Rc::new(Cell::new(0));
        let mut array = DynamicArray::new();

        for _ in 0..5 {
            array
                .add(DropCounter {
                    drops: Rc::clone(&drops),
                })
                .unwrap();
        }

        array.truncate(2);
        assert_eq!(drops.get(), 3);
        assert_eq!(array.len(), 2);

        array.truncate(10);
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn remove_all_keeps_capacity_clear_releases_it() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 3]).unwrap();
        let reserved = array.reserved_length();

        array.remove_all();
        assert!(array.is_empty());
        assert_eq!(array.reserved_length(), reserved);

        array.add_slice(&[1, 2, 3]).unwrap();
        array.clear();
        assert!(array.is_empty());
        assert_eq!(array.reserved_length(), 0);
        assert_eq!(array.reserved_size(), 0);

        // Usable again after a clear.
        array.add(9).unwrap();
        assert_eq!(array.as_slice(), &[9]);
    }

    #[test]
    fn set_reserved_length_is_exact_and_never_shrinks() {
        let mut array = DynamicArray::<u64>::new();

        array.set_reserved_length(10).unwrap();
        assert_eq!(array.reserved_length(), 10);

        array.set_reserved_length(3).unwrap();
        assert_eq!(array.reserved_length(), 10);
    }

    #[test]
    fn set_reserved_size_rounds_down_to_items() {
        let mut array = DynamicArray::<u32>::new();

        array.set_reserved_size(10).unwrap();

        assert_eq!(array.reserved_length(), 2);
        assert_eq!(array.reserved_size(), 8);
    }

    #[test]
    fn check_reserved_length_uses_growth_policy() {
        let mut array = DynamicArray::<u32>::new();

        array.check_reserved_length(2).unwrap();
        assert_eq!(array.reserved_length(), 4);

        array.check_reserved_length(4).unwrap();
        assert_eq!(array.reserved_length(), 4);
    }

    #[test]
    fn capacity_overflow_is_error() {
        let mut array = DynamicArray::<u64>::new();

        assert_eq!(
            array.check_reserved_length(usize::MAX),
            Err(Error::CapacityOverflow)
        );
        assert_eq!(
            array.set_reserved_length(usize::MAX),
            Err(Error::CapacityOverflow)
        );
    }

    #[test]
    fn raw_cursor_survives_relocation_when_rebased() {
        let mut array = DynamicArray::<u64>::new();
        array.add_slice(&[10, 20, 30]).unwrap();

        let mut first = array.raw_cursor(0);
        let mut last = array.raw_cursor(2);
        let mut end = array.raw_cursor(3);
        let generation_before = array.generation;

        array
            .check_reserved_length_rebasing(100_000, &mut [&mut first, &mut last, &mut end])
            .unwrap();

        assert!(array.is_current(&first));
        assert!(array.is_current(&last));
        assert!(array.is_current(&end));

        unsafe {
            assert_eq!(first.as_ptr().read(), 10);
            assert_eq!(last.as_ptr().read(), 30);
        }

        if array.generation != generation_before {
            assert_eq!(first.generation(), array.generation);
        }

        assert_eq!(end, array.raw_cursor(3));
    }

    #[test]
    fn rebasing_without_growth_is_noop() {
        let mut array = DynamicArray::<u64>::new();
        array.add_slice(&[1, 2]).unwrap();

        let mut cursor = array.raw_cursor(1);
        let before = cursor;

        array
            .check_add_reserved_length_rebasing(1, &mut [&mut cursor])
            .unwrap();

        assert_eq!(cursor, before);
    }

    #[test]
    fn clear_makes_raw_cursors_stale() {
        let mut array = DynamicArray::<u64>::new();
        array.add(1).unwrap();

        let cursor = array.raw_cursor(0);
        array.clear();

        assert!(!array.is_current(&cursor));
    }

    #[test]
    #[should_panic]
    fn rebasing_stale_cursor_panics() {
        let mut array = DynamicArray::<u64>::new();
        array.add(1).unwrap();

        let mut stale = array.raw_cursor(0);
        array.clear();
        array.add(1).unwrap();

        _ = array.check_reserved_length_rebasing(1_000, &mut [&mut stale]);
    }

    #[test]
    fn failed_rebasing_leaves_cursors_alone() {
        let mut array = capped::<u32>(4);
        array.set_reserved_length(4).unwrap();
        array.add_slice(&[1, 2, 3, 4]).unwrap();

        let mut cursor = array.raw_cursor(3);
        let before = cursor;

        assert!(
            array
                .check_add_reserved_length_rebasing(1, &mut [&mut cursor])
                .is_err()
        );

        assert_eq!(cursor, before);
        assert!(array.is_current(&cursor));
    }

    #[test]
    fn index_cursors_survive_growth() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[5, 6, 7]).unwrap();

        let cursor = array.position_at(1);
        array.check_reserved_length(10_000).unwrap();

        assert_eq!(*array.at(cursor), 6);
        assert_eq!(array.begin().index(), 0);
        assert_eq!(array.end().index(), 3);
    }

    #[test]
    fn search_finds_first_and_last() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 3, 2, 1]).unwrap();

        assert_eq!(array.index_of_first(&2), Some(1));
        assert_eq!(array.index_of_last(&2), Some(3));
        assert_eq!(array.index_of_first(&9), None);
        assert_eq!(array.find_first(&3), Some(&3));
        assert_eq!(array.find_last(&9), None);

        assert_eq!(array.index_of_first_in(2.., &1), Some(4));
        assert_eq!(array.index_of_last_in(..3, &1), Some(0));
        assert_eq!(array.index_of_first_in(2..3, &2), None);
    }

    #[test]
    fn swap_exchanges_buffers() {
        let mut a = DynamicArray::<u32>::new();
        let mut b = DynamicArray::<u32>::new();
        a.add_slice(&[1, 2]).unwrap();
        b.add(3).unwrap();

        a.swap(&mut b);

        assert_eq!(a.as_slice(), &[3]);
        assert_eq!(b.as_slice(), &[1, 2]);
    }

    #[test]
    fn clone_is_deep_and_exact() {
        let mut array = DynamicArray::<String>::new();
        array.add("a".to_string()).unwrap();
        array.add("b".to_string()).unwrap();

        let mut clone = array.clone();
        clone[0].push('!');

        assert_eq!(array[0], "a");
        assert_eq!(clone[0], "a!");
        assert_eq!(clone.reserved_length(), 2);
        assert_ne!(array, clone);
    }

    #[test]
    fn drop_drops_every_item_once() {
        let drops = Rc::new(Cell::new(0));

        {
            let mut array = DynamicArray::new();
            for _ in 0..10 {
                array
                    .add(DropCounter {
                        drops: Rc::clone(&drops),
                    })
                    .unwrap();
            }

            drop(array.remove(3));
            assert_eq!(drops.get(), 1);
        }

        assert_eq!(drops.get(), 10);
    }

    #[test]
    fn iteration_and_mutation() {
        let mut array = DynamicArray::<u32>::new();
        array.add_slice(&[1, 2, 3]).unwrap();

        for value in &mut array {
            *value *= 10;
        }

        assert_eq!((&array).into_iter().copied().sum::<u32>(), 60);
        assert_eq!(array.iter().rev().next(), Some(&30));
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds_panics() {
        let array = DynamicArray::<u32>::new();
        _ = array[0];
    }

    #[test]
    #[should_panic]
    fn drop_item_with_forbidden_to_drop_policy_panics() {
        let mut array = DynamicArray::<u32>::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build()
            .unwrap();

        array.add(1).unwrap();
    }

    #[test]
    fn drop_itemless_with_forbidden_to_drop_policy_ok() {
        let mut array = DynamicArray::<u32>::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build()
            .unwrap();

        array.add(1).unwrap();
        array.remove_all();
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(DynamicArray::<()>::new());
    }

    #[test]
    fn resolve_range_handles_all_bounds() {
        assert_eq!(resolve_range(.., 5), 0..5);
        assert_eq!(resolve_range(1..=2, 5), 1..3);
        assert_eq!(
            resolve_range((Bound::Excluded(1), Bound::Unbounded), 5),
            2..5
        );
    }

    #[test]
    #[should_panic]
    fn resolve_range_out_of_bounds_panics() {
        _ = resolve_range(2..6, 5);
    }
}
