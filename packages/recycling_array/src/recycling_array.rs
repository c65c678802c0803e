use std::any::type_name;
use std::ops::{Index, IndexMut, RangeBounds};
use std::{fmt, mem, ptr, thread};

use bitvec::vec::BitVec;
use tracing::trace;

use crate::dynamic_array::resolve_range;
use crate::{
    BufferAllocator, Cursor, DropPolicy, DynamicArray, HeapAllocator, Iter, IterMut,
    RecyclingArrayBuilder, Result,
};

/// A growable array whose removals leave a hole instead of shifting the items after it.
///
/// Removing an item marks its slot as reclaimed and remembers it in a free list. The next
/// [`add()`][Self::add] fills the most recently reclaimed slot instead of growing the array, so
/// once an array has reached its working size it can keep taking and releasing items without
/// allocating. Indexes of live items never change while they are live.
///
/// Reclaimed slots are invisible: iteration, search, [`len()`][Self::len] and validity checks
/// consider live items only.
///
/// The slots are stored in a [`DynamicArray`], which grows according to its amortized growth
/// policy. The array never compacts; reclaimed slots are only given up by
/// [`remove_last()`][Self::remove_last] (for trailing slots), [`remove_all()`][Self::remove_all]
/// and [`clear()`][Self::clear].
///
/// # Example
///
/// ```rust
/// use recycling_array::RecyclingArray;
///
/// let mut array = RecyclingArray::<char>::new();
///
/// array.add('A').unwrap();
/// let b = array.add('B').unwrap();
/// array.add('C').unwrap();
///
/// assert_eq!(array.remove(b).unwrap(), 'B');
/// assert!(!array.is_valid(b));
///
/// // The reclaimed slot is filled again by the next addition.
/// assert_eq!(array.add('E').unwrap(), b);
///
/// assert_eq!(array.iter().collect::<String>(), "AEC");
/// ```
pub struct RecyclingArray<T, A: BufferAllocator + Clone = HeapAllocator> {
    /// Physical storage. Its length is the physical end and includes reclaimed slots, which
    /// hold no value. We therefore only ever access it slot by slot through `slot_ptr()`, never
    /// through its slice views.
    slots: DynamicArray<T, A>,

    /// Indexes of reclaimed slots, most recently reclaimed last.
    ///
    /// Grown by the removing operations, so adding never needs room in it.
    free_list: DynamicArray<usize, A>,

    /// One flag per physical slot, set if the slot index is on the free list.
    reclaimed: BitVec,

    drop_policy: DropPolicy,
}

impl<T> RecyclingArray<T> {
    /// Creates an empty array that allocates from the global heap.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DynamicArray::new_inner(HeapAllocator, DropPolicy::MayDropItems),
            free_list: DynamicArray::new_inner(HeapAllocator, DropPolicy::MayDropItems),
            reclaimed: BitVec::new(),
            drop_policy: DropPolicy::default(),
        }
    }

    /// Starts building a new [`RecyclingArray`].
    ///
    /// Use this when you want a custom allocator, an initial reservation or a drop policy.
    pub fn builder() -> RecyclingArrayBuilder<T> {
        RecyclingArrayBuilder::new()
    }
}

impl<T, A: BufferAllocator + Clone> RecyclingArray<T, A> {
    pub(crate) fn new_inner(
        allocator: A,
        reserved_length: usize,
        drop_policy: DropPolicy,
    ) -> Result<Self> {
        // The slots enforce our own drop policy only after we have dropped the items ourselves,
        // so they never see any items to drop.
        let mut slots = DynamicArray::new_inner(allocator.clone(), DropPolicy::MayDropItems);
        slots.set_reserved_length(reserved_length)?;

        Ok(Self {
            slots,
            free_list: DynamicArray::new_inner(allocator, DropPolicy::MayDropItems),
            reclaimed: BitVec::with_capacity(reserved_length),
            drop_policy,
        })
    }

    /// The number of live items in the array.
    #[must_use]
    pub fn len(&self) -> usize {
        // Cannot underflow because every reclaimed slot is also a physical slot.
        self.slots.len().wrapping_sub(self.free_list.len())
    }

    /// Whether the array contains no live items, either because it has no slots at all or
    /// because every slot is reclaimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() || self.slots.len() == self.free_list.len()
    }

    /// The number of physical slots, live or reclaimed. Cursors and indexes range up to this.
    #[must_use]
    pub fn physical_len(&self) -> usize {
        self.slots.len()
    }

    /// The number of reclaimed slots waiting to be reused.
    #[must_use]
    pub fn reclaimed_len(&self) -> usize {
        self.free_list.len()
    }

    /// The number of slots the array can hold without growing.
    #[must_use]
    pub fn reserved_length(&self) -> usize {
        self.slots.reserved_length()
    }

    /// The size in bytes of the slot buffer.
    #[must_use]
    pub fn reserved_size(&self) -> usize {
        self.slots.reserved_size()
    }

    /// Makes sure the array can hold at least `length` physical slots without further growth,
    /// growing according to the amortized growth policy if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn check_reserved_length(&mut self, length: usize) -> Result<()> {
        self.slots.check_reserved_length(length)?;
        self.reserve_flags(length);

        Ok(())
    }

    /// Makes sure the array can accept `additional` more items without growing, even if no
    /// reclaimed slot is available for any of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn check_add_reserved_length(&mut self, additional: usize) -> Result<()> {
        self.slots.check_add_reserved_length(additional)?;
        self.reserve_flags(self.slots.reserved_length());

        Ok(())
    }

    /// Reserves room for exactly `length` physical slots, bypassing the growth policy.
    ///
    /// Does nothing if the array can already hold `length` slots; the buffer never shrinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn set_reserved_length(&mut self, length: usize) -> Result<()> {
        self.slots.set_reserved_length(length)?;
        self.reserve_flags(length);

        Ok(())
    }

    fn reserve_flags(&mut self, physical_len: usize) {
        self.reclaimed
            .reserve(physical_len.saturating_sub(self.reclaimed.len()));
    }

    /// Adds an item, reusing the most recently reclaimed slot if there is one.
    ///
    /// Returns the index of the slot that now holds the item.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no reclaimed slot and the allocator cannot provide the memory
    /// for a new one. The array is unchanged and `value` is dropped.
    pub fn add(&mut self, value: T) -> Result<usize> {
        self.add_with(|| value)
    }

    /// Adds an item constructed by `f`, reusing the most recently reclaimed slot if there is one.
    ///
    /// The closure is only called once the array is certain to have a slot for the item.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no reclaimed slot and the allocator cannot provide the memory
    /// for a new one. The array is unchanged and `f` is not called.
    pub fn add_with(&mut self, f: impl FnOnce() -> T) -> Result<usize> {
        if self.free_list.is_empty() {
            self.slots.check_add_reserved_length(1)?;

            let value = f();

            // SAFETY: We just reserved room for one more slot.
            let index = unsafe { self.slots.add_unchecked(value) };
            self.reclaimed.push(false);

            #[cfg(debug_assertions)]
            self.integrity_check();

            return Ok(index);
        }

        // Constructed before touching the free list, so a panic in `f` changes nothing.
        let value = f();

        let index = self
            .free_list
            .remove_last()
            .expect("guarded by is_empty() check above");

        self.reclaimed.set(index, false);

        // SAFETY: The slot is within the physical end (free list invariant) and holds no value
        // because it was reclaimed.
        unsafe {
            self.slots.slot_ptr(index).write(value);
        }

        trace!(
            item_type = type_name::<T>(),
            index,
            reclaimed_remaining = self.free_list.len(),
            "reused reclaimed slot"
        );

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(index)
    }

    /// Removes and returns the item at `index`, leaving its slot reclaimed for reuse.
    ///
    /// The indexes of all other items are unaffected.
    ///
    /// # Errors
    ///
    /// Returns an error if the free list has to grow to remember the slot and the allocator
    /// cannot provide the memory. The array is unchanged and the item stays in place.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the slot is already reclaimed.
    pub fn remove(&mut self, index: usize) -> Result<T> {
        self.assert_live(index);

        self.free_list.check_add_reserved_length(1)?;

        // SAFETY: The slot is live (asserted above), so it holds an initialized value. After
        // this we treat the slot as reclaimed and never read it again.
        let value = unsafe { self.slots.slot_ptr(index).read() };

        self.reclaim(index);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(value)
    }

    /// Removes and drops the items in the physical slot range `range`, leaving their slots
    /// reclaimed for reuse.
    ///
    /// # Errors
    ///
    /// Returns an error if the free list has to grow to remember the slots and the allocator
    /// cannot provide the memory. Nothing is removed in that case.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds or any slot in it is already reclaimed. Nothing is
    /// removed in that case.
    pub fn remove_range(&mut self, range: impl RangeBounds<usize>) -> Result<()> {
        let range = resolve_range(range, self.slots.len());

        for index in range.clone() {
            self.assert_live(index);
        }

        self.free_list.check_add_reserved_length(range.len())?;

        for index in range.rev() {
            // Reclaimed before dropping, so a panicking drop leaves the slot correctly marked.
            self.reclaim(index);

            // SAFETY: The slot was live (asserted above) and is now reclaimed, so nobody else
            // will drop or read the value.
            unsafe {
                ptr::drop_in_place(self.slots.slot_ptr(index).as_ptr());
            }
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Puts a live slot on the free list without touching its value.
    ///
    /// The caller must have reserved room for the entry on the free list.
    fn reclaim(&mut self, index: usize) {
        assert!(
            self.free_list.len() < self.free_list.reserved_length(),
            "free list of array of {} has no room for slot {index}",
            type_name::<T>()
        );

        // SAFETY: There is room for one more entry (asserted above).
        unsafe {
            self.free_list.add_unchecked(index);
        }

        self.reclaimed.set(index, true);
    }

    /// Removes and returns the live item in the highest slot, or `None` if there are no live
    /// items.
    ///
    /// Unlike [`remove()`][Self::remove], this gives the slot up instead of reclaiming it. Any
    /// reclaimed slots after it are given up as well, so the physical end moves to just before
    /// the removed item.
    pub fn remove_last(&mut self) -> Option<T> {
        let index = self.reclaimed.last_zero()?;

        // Cannot overflow because the slot exists.
        let trailing_start = index.wrapping_add(1);

        if trailing_start < self.slots.len() {
            self.discard_reclaimed_from(trailing_start);

            // SAFETY: The slots after `index` are all reclaimed, so they hold no values that
            // need to be dropped, and `trailing_start` is within the reservation.
            unsafe {
                self.slots.set_len(trailing_start);
            }
        }

        let value = self
            .slots
            .remove_last()
            .expect("guarded by last_zero() finding a live slot");

        self.reclaimed.truncate(index);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Some(value)
    }

    /// Removes every free list entry at or after `physical_end`, preserving the order of the rest.
    fn discard_reclaimed_from(&mut self, physical_end: usize) {
        let entries = self.free_list.as_mut_slice();
        let mut kept: usize = 0;

        for read in 0..entries.len() {
            if entries.get(read).is_some_and(|&index| index < physical_end) {
                entries.swap(kept, read);

                // Cannot overflow because it never exceeds `read`.
                kept = kept.wrapping_add(1);
            }
        }

        self.free_list.truncate(kept);
    }

    /// Drops all live items and forgets all reclaimed slots, keeping the allocated capacity.
    ///
    /// Calling this on an empty array does nothing.
    pub fn remove_all(&mut self) {
        let physical_len = self.slots.len();

        // The bookkeeping is reset before any item is dropped, so a panicking drop leaks the
        // remaining items instead of leaving the array inconsistent.
        //
        // SAFETY: Zero is always a valid length and the items are dropped below.
        unsafe {
            self.slots.set_len(0);
        }

        self.free_list.remove_all();
        let mut reclaimed = mem::take(&mut self.reclaimed);

        for index in reclaimed.iter_zeros() {
            debug_assert!(index < physical_len);

            // SAFETY: The slot was live, and the array no longer claims it.
            unsafe {
                ptr::drop_in_place(self.slots.slot_ptr(index).as_ptr());
            }
        }

        // Keep the bitmap's allocation for the next round.
        reclaimed.clear();
        self.reclaimed = reclaimed;
    }

    /// Drops all live items and releases all memory held by the array.
    ///
    /// The array remains usable and allocates again when it next needs to.
    pub fn clear(&mut self) {
        self.remove_all();

        self.slots.clear();
        self.free_list.clear();
        self.reclaimed = BitVec::new();
    }

    /// Replaces the entire contents of the array with clones of the given items.
    ///
    /// Afterwards there are no reclaimed slots and item `i` of `values` is at index `i`.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    pub fn set(&mut self, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        // Reserve before removing anything, so failure leaves the old contents in place.
        self.slots.check_reserved_length(values.len())?;

        self.remove_all();
        self.reserve_flags(values.len());

        for value in values {
            // SAFETY: We reserved room for all the values above and the array is empty.
            unsafe {
                self.slots.add_unchecked(value.clone());
            }
            self.reclaimed.push(false);
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Replaces the entire contents of the array with the physical slots `range` of `source`.
    ///
    /// Live items are cloned. Reclaimed slots stay reclaimed, shifted down by `range.start` so
    /// the slot layout of the copied range is reproduced exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory. The array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds of the physical slots of `source`.
    pub fn set_from<B: BufferAllocator + Clone>(
        &mut self,
        source: &RecyclingArray<T, B>,
        range: impl RangeBounds<usize>,
    ) -> Result<()>
    where
        T: Clone,
    {
        let range = resolve_range(range, source.physical_len());
        let start = range.start;

        let reclaimed_in_range = source
            .reclaimed
            .get(range.clone())
            .map_or(0, |flags| flags.count_ones());

        // Reserve before removing anything, so failure leaves the old contents in place.
        self.slots.check_reserved_length(range.len())?;
        self.free_list.check_reserved_length(reclaimed_in_range)?;

        self.remove_all();
        self.reserve_flags(range.len());

        for index in range {
            if let Some(value) = source.get(index) {
                // SAFETY: We reserved room for the whole range.
                unsafe {
                    self.slots.add_unchecked(value.clone());
                }
                self.reclaimed.push(false);
            } else {
                // Cannot underflow because the range starts at `start`.
                let local = index.wrapping_sub(start);

                // SAFETY: We reserved room for the whole range. The new slot holds no value,
                // which is correct because we reclaim it immediately, and reclaimed slots are
                // never read.
                unsafe {
                    self.slots.set_len(local.wrapping_add(1));
                }
                self.reclaimed.push(false);
                self.reclaim(local);
            }
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Exchanges the contents (including buffers) of two arrays.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    fn is_reclaimed(&self, index: usize) -> bool {
        self.reclaimed.get(index).is_some_and(|bit| *bit)
    }

    /// Whether `index` refers to a live item.
    #[must_use]
    pub fn is_valid(&self, index: usize) -> bool {
        index < self.slots.len() && !self.is_reclaimed(index)
    }

    /// Whether `cursor` refers to a live item.
    #[must_use]
    pub fn is_valid_cursor(&self, cursor: Cursor) -> bool {
        self.is_valid(cursor.index())
    }

    fn assert_live(&self, index: usize) {
        assert!(
            index < self.slots.len(),
            "slot {index} out of bounds in recycling array of {} with {} physical slots",
            type_name::<T>(),
            self.slots.len()
        );

        assert!(
            !self.is_reclaimed(index),
            "slot {index} in recycling array of {} is already reclaimed",
            type_name::<T>()
        );
    }

    /// The live item at `index`, or `None` if out of bounds or reclaimed.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if !self.is_valid(index) {
            return None;
        }

        // SAFETY: The slot is live, so it holds an initialized value.
        Some(unsafe { self.slots.slot_ptr(index).as_ref() })
    }

    /// The live item at `index` for modification, or `None` if out of bounds or reclaimed.
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if !self.is_valid(index) {
            return None;
        }

        // SAFETY: The slot is live, so it holds an initialized value, and we hold the array
        // exclusively.
        Some(unsafe { self.slots.slot_ptr(index).as_mut() })
    }

    /// A cursor at the first live item, or [`end()`][Self::end] if there is none.
    #[must_use]
    pub fn begin(&self) -> Cursor {
        Cursor::new(self.reclaimed.first_zero().unwrap_or(self.slots.len()))
    }

    /// A cursor one past the last physical slot.
    #[must_use]
    pub fn end(&self) -> Cursor {
        Cursor::new(self.slots.len())
    }

    /// A cursor at the first live item after `cursor`, or [`end()`][Self::end] if there is none.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is already at or beyond the end.
    #[must_use]
    pub fn next_cursor(&self, cursor: Cursor) -> Cursor {
        assert!(
            cursor.index() < self.slots.len(),
            "cannot advance cursor at {} beyond the end of recycling array of {} with {} physical slots",
            cursor.index(),
            type_name::<T>(),
            self.slots.len()
        );

        // Cannot overflow because the index is below the physical length.
        let start = cursor.index().wrapping_add(1);

        let next = self
            .reclaimed
            .get(start..)
            .and_then(|rest| rest.first_zero())
            .map_or(self.slots.len(), |offset| start.wrapping_add(offset));

        Cursor::new(next)
    }

    /// A cursor at the last live item before `cursor`, or `None` if there is none.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is beyond the end.
    #[must_use]
    pub fn prev_cursor(&self, cursor: Cursor) -> Option<Cursor> {
        assert!(
            cursor.index() <= self.slots.len(),
            "cursor at {} is beyond the end of recycling array of {} with {} physical slots",
            cursor.index(),
            type_name::<T>(),
            self.slots.len()
        );

        self.reclaimed
            .get(..cursor.index())
            .and_then(|before| before.last_zero())
            .map(Cursor::new)
    }

    /// The live item a cursor refers to.
    ///
    /// # Panics
    ///
    /// Panics if the cursor does not refer to a live item.
    #[must_use]
    pub fn at(&self, cursor: Cursor) -> &T {
        &self[cursor.index()]
    }

    /// Iterates over the live items in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        // SAFETY: The bitmap has one flag per physical slot and the slots with a clear flag are
        // exactly the live ones. We are borrowed for as long as the iterator lives.
        unsafe { Iter::new(self.slots.slot_ptr(0), &self.reclaimed, self.len()) }
    }

    /// Iterates over the live items in slot order, for modification.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        let first = self.slots.slot_ptr(0);
        let live = self.len();

        // SAFETY: As in iter(), and we are exclusively borrowed for as long as the iterator
        // lives.
        unsafe { IterMut::new(first, &self.reclaimed, live) }
    }

    /// Iterates over the live items in slot order, together with their indexes.
    pub fn iter_slots(&self) -> impl DoubleEndedIterator<Item = (usize, &T)> {
        self.reclaimed.iter_zeros().map(move |index| {
            // SAFETY: The flag of the slot is clear, so it holds an initialized value, and the
            // iterator borrows the array.
            (index, unsafe { self.slots.slot_ptr(index).as_ref() })
        })
    }

    /// Index of the first live item equal to `value`.
    #[must_use]
    pub fn index_of_first(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter_slots()
            .find(|&(_, item)| item == value)
            .map(|(index, _)| index)
    }

    /// Index of the last live item equal to `value`.
    #[must_use]
    pub fn index_of_last(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter_slots()
            .rfind(|&(_, item)| item == value)
            .map(|(index, _)| index)
    }

    /// The first live item equal to `value`.
    #[must_use]
    pub fn find_first(&self, value: &T) -> Option<&T>
    where
        T: PartialEq,
    {
        self.iter().find(|&item| item == value)
    }

    /// The last live item equal to `value`.
    #[must_use]
    pub fn find_last(&self, value: &T) -> Option<&T>
    where
        T: PartialEq,
    {
        self.iter().rfind(|&item| item == value)
    }

    /// Creates a copy of the array with the same slot layout, including reclaimed slots and the
    /// order in which they will be reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the allocator cannot provide the memory.
    pub fn try_clone(&self) -> Result<Self>
    where
        T: Clone,
    {
        let mut clone = Self::new_inner(
            self.slots.allocator().clone(),
            self.slots.len(),
            self.drop_policy,
        )?;

        clone.set_from(self, ..)?;

        // Same entries, but restore the reuse order.
        clone
            .free_list
            .as_mut_slice()
            .copy_from_slice(self.free_list.as_slice());

        Ok(clone)
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        assert!(
            self.reclaimed.len() == self.slots.len(),
            "reclaimed bitmap covers {} slots but recycling array of {} has {} physical slots",
            self.reclaimed.len(),
            type_name::<T>(),
            self.slots.len()
        );

        assert!(
            self.reclaimed.count_ones() == self.free_list.len(),
            "recycling array of {} has {} reclaimed flags but {} free list entries",
            type_name::<T>(),
            self.reclaimed.count_ones(),
            self.free_list.len()
        );

        // Together with the count check above, this rules out duplicates on the free list.
        for &index in &self.free_list {
            assert!(
                self.is_reclaimed(index),
                "free list entry {index} in recycling array of {} is not flagged as reclaimed",
                type_name::<T>()
            );
        }
    }
}

impl<T> Default for RecyclingArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: BufferAllocator + Clone> Drop for RecyclingArray<T, A> {
    fn drop(&mut self) {
        let was_empty = self.is_empty();

        self.remove_all();

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            assert!(
                was_empty,
                "dropped a non-empty recycling array of {} with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

impl<T: Clone, A: BufferAllocator + Clone> Clone for RecyclingArray<T, A> {
    fn clone(&self) -> Self {
        self.try_clone().expect(
            "clone() treats allocation failure as fatal - use try_clone() to handle it instead",
        )
    }
}

impl<T: fmt::Debug, A: BufferAllocator + Clone> fmt::Debug for RecyclingArray<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecyclingArray")
            .field("live", &DebugLive(self))
            .field("physical_len", &self.slots.len())
            .field("reclaimed", &self.free_list.as_slice())
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

struct DebugLive<'a, T, A: BufferAllocator + Clone>(&'a RecyclingArray<T, A>);

impl<T: fmt::Debug, A: BufferAllocator + Clone> fmt::Debug for DebugLive<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter_slots()).finish()
    }
}

impl<T, A: BufferAllocator + Clone> Index<usize> for RecyclingArray<T, A> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.assert_live(index);

        // SAFETY: The slot is live (asserted above), so it holds an initialized value.
        unsafe { self.slots.slot_ptr(index).as_ref() }
    }
}

impl<T, A: BufferAllocator + Clone> IndexMut<usize> for RecyclingArray<T, A> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.assert_live(index);

        // SAFETY: The slot is live (asserted above) and we hold the array exclusively.
        unsafe { self.slots.slot_ptr(index).as_mut() }
    }
}

impl<'a, T, A: BufferAllocator + Clone> IntoIterator for &'a RecyclingArray<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: BufferAllocator + Clone> IntoIterator for &'a mut RecyclingArray<T, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::{CappedAllocator, Error};

    assert_impl_all!(RecyclingArray<u32>: Send, fmt::Debug, Clone, Default);
    assert_not_impl_any!(RecyclingArray<u32>: Sync);
    assert_not_impl_any!(RecyclingArray<Rc<u32>>: Send);

    #[derive(Debug)]
    struct DropCounter {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn counter(drops: &Rc<Cell<usize>>) -> DropCounter {
        DropCounter {
            drops: Rc::clone(drops),
        }
    }

    fn array_of(values: &[u32]) -> RecyclingArray<u32> {
        let mut array = RecyclingArray::new();
        for &value in values {
            array.add(value).unwrap();
        }
        array
    }

    fn collect<A: BufferAllocator + Clone>(array: &RecyclingArray<u32, A>) -> Vec<u32> {
        array.iter().copied().collect()
    }

    #[test]
    fn smoke_test() {
        let mut array = RecyclingArray::<u32>::new();
        assert!(array.is_empty());

        assert_eq!(array.add(10).unwrap(), 0);
        assert_eq!(array.add(20).unwrap(), 1);
        assert_eq!(array.add(30).unwrap(), 2);

        assert_eq!(array.len(), 3);
        assert_eq!(array[1], 20);

        assert_eq!(array.remove(1).unwrap(), 20);

        assert_eq!(array.len(), 2);
        assert_eq!(array.physical_len(), 3);
        assert_eq!(array.reclaimed_len(), 1);
        assert_eq!(collect(&array), vec![10, 30]);
    }

    #[test]
    fn reuse_is_most_recent_first() {
        let mut array = array_of(&[0, 1, 2, 3, 4]);

        array.remove(1).unwrap();
        array.remove(3).unwrap();

        assert_eq!(array.add(30).unwrap(), 3);
        assert_eq!(array.add(10).unwrap(), 1);
        assert_eq!(array.add(5).unwrap(), 5);

        assert_eq!(collect(&array), vec![0, 10, 2, 30, 4, 5]);
    }

    #[test]
    fn reuse_does_not_allocate() {
        let mut array = RecyclingArray::<u32>::builder()
            .allocator(CappedAllocator::new(32))
            .reserved_length(8)
            .build()
            .unwrap();

        for value in 0..8 {
            array.add(value).unwrap();
        }
        assert!(array.add(8).is_err());

        array.remove(2).unwrap();
        assert_eq!(array.add(22).unwrap(), 2);
        assert_eq!(collect(&array), vec![0, 1, 22, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn adds_as_many_items_as_dynamic_array_on_same_allocator() {
        let allocator = CappedAllocator::new(16);

        let mut dynamic = DynamicArray::<u16>::builder()
            .allocator(allocator)
            .reserved_length(2)
            .build()
            .unwrap();

        let mut recycling = RecyclingArray::<u16>::builder()
            .allocator(allocator)
            .reserved_length(2)
            .build()
            .unwrap();

        let mut dynamic_adds = 0;
        while dynamic.add(dynamic_adds).is_ok() {
            dynamic_adds += 1;
        }

        let mut recycling_adds = 0;
        while recycling.add(recycling_adds).is_ok() {
            recycling_adds += 1;
        }

        assert!(dynamic_adds >= 3);
        assert_eq!(recycling_adds, dynamic_adds);
        assert_eq!(recycling.reserved_size(), dynamic.reserved_size());
        assert_eq!(recycling.free_list.reserved_length(), 0);
    }

    #[test]
    fn exact_reservation_fills_capped_buffer() {
        let mut array = RecyclingArray::<u16>::builder()
            .allocator(CappedAllocator::new(16))
            .reserved_length(8)
            .build()
            .unwrap();

        for value in 0..8 {
            assert_eq!(array.add(value).unwrap(), usize::from(value));
        }

        assert_eq!(array.reserved_size(), 16);
    }

    #[test]
    fn failed_remove_leaves_item_in_place() {
        let mut array = RecyclingArray::<u16>::builder()
            .allocator(CappedAllocator::new(16))
            .reserved_length(8)
            .build()
            .unwrap();

        for value in 0..8 {
            array.add(value).unwrap();
        }

        // The free list of `usize` entries cannot grow within the cap.
        assert!(matches!(
            array.remove(3),
            Err(Error::AllocationFailed { .. })
        ));
        assert!(array.remove_range(0..2).is_err());

        assert_eq!(array.len(), 8);
        assert_eq!(array.reclaimed_len(), 0);
        assert_eq!(array.get(3), Some(&3));
        assert_eq!(
            array.iter().copied().collect::<Vec<_>>(),
            (0..8_u16).collect::<Vec<_>>()
        );
    }

    #[test]
    fn failed_add_leaves_array_unchanged() {
        let mut array = RecyclingArray::<u32>::builder()
            .allocator(CappedAllocator::new(16))
            .reserved_length(2)
            .build()
            .unwrap();

        array.add(1).unwrap();
        array.add(2).unwrap();

        assert!(matches!(array.add(3), Err(Error::AllocationFailed { .. })));
        assert_eq!(collect(&array), vec![1, 2]);
        assert_eq!(array.physical_len(), 2);
    }

    #[test]
    #[should_panic]
    fn double_remove_panics() {
        let mut array = array_of(&[1, 2]);

        array.remove(0).unwrap();
        array.remove(0).unwrap();
    }

    #[test]
    #[should_panic]
    fn remove_out_of_bounds_panics() {
        let mut array = array_of(&[1]);
        array.remove(1).unwrap();
    }

    #[test]
    fn remove_range_reclaims_back_to_front() {
        let mut array = array_of(&[0, 1, 2, 3, 4]);

        array.remove_range(1..4).unwrap();

        assert_eq!(collect(&array), vec![0, 4]);
        assert_eq!(array.reclaimed_len(), 3);

        // Back to front means the lowest slot was reclaimed last and is reused first.
        assert_eq!(array.add(10).unwrap(), 1);
        assert_eq!(array.add(20).unwrap(), 2);
        assert_eq!(array.add(30).unwrap(), 3);
    }

    #[test]
    #[should_panic]
    fn remove_range_over_reclaimed_slot_panics() {
        let mut array = array_of(&[0, 1, 2]);
        array.remove(1).unwrap();

        array.remove_range(..).unwrap();
    }

    #[test]
    fn remove_range_over_reclaimed_slot_changes_nothing() {
        let mut array = array_of(&[0, 1, 2]);
        array.remove(1).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            array.remove_range(..).unwrap();
        }));

        assert!(result.is_err());
        assert_eq!(collect(&array), vec![0, 2]);
    }

    #[test]
    fn remove_last_contracts_physical_end() {
        let mut array = array_of(&[0, 1, 2, 3]);
        array.remove(3).unwrap();
        array.remove(1).unwrap();

        assert_eq!(array.remove_last(), Some(2));

        // Slot 3 was discarded together with slot 2, slot 1 stays reclaimed.
        assert_eq!(array.physical_len(), 2);
        assert_eq!(array.reclaimed_len(), 1);
        assert_eq!(collect(&array), vec![0]);

        assert_eq!(array.add(11).unwrap(), 1);
        assert_eq!(array.add(22).unwrap(), 2);
    }

    #[test]
    fn remove_last_on_empty_is_none() {
        let mut array = RecyclingArray::<u32>::new();
        assert_eq!(array.remove_last(), None);

        let mut array = array_of(&[1]);
        array.remove(0).unwrap();
        assert_eq!(array.remove_last(), None);
        assert_eq!(array.physical_len(), 1);
    }

    #[test]
    fn remove_all_drops_live_only_and_is_idempotent() {
        let drops = Rc::new(Cell::new(0));
        let mut array = RecyclingArray::new();

        for _ in 0..5 {
            array.add(counter(&drops)).unwrap();
        }

        drop(array.remove(1).unwrap());
        drop(array.remove(3).unwrap());
        assert_eq!(drops.get(), 2);

        let reserved = array.reserved_length();

        array.remove_all();
        assert_eq!(drops.get(), 5);
        assert!(array.is_empty());
        assert_eq!(array.physical_len(), 0);
        assert_eq!(array.reclaimed_len(), 0);
        assert_eq!(array.reserved_length(), reserved);

        array.remove_all();
        assert_eq!(drops.get(), 5);
        assert_eq!(array.reserved_length(), reserved);
    }

    #[test]
    fn clear_releases_memory() {
        let mut array = array_of(&[1, 2, 3]);
        array.remove(0).unwrap();

        array.clear();

        assert!(array.is_empty());
        assert_eq!(array.reserved_length(), 0);

        assert_eq!(array.add(7).unwrap(), 0);
        assert_eq!(collect(&array), vec![7]);
    }

    #[test]
    fn is_empty_when_everything_reclaimed() {
        let mut array = array_of(&[1, 2]);
        array.remove(0).unwrap();
        array.remove(1).unwrap();

        assert!(array.is_empty());
        assert_eq!(array.len(), 0);
        assert_eq!(array.physical_len(), 2);
        assert_eq!(array.iter().next(), None);
        assert_eq!(array.begin(), array.end());
    }

    #[test]
    fn cursors_skip_reclaimed_slots() {
        let mut array = array_of(&[0, 1, 2, 3, 4]);
        array.remove(0).unwrap();
        array.remove(2).unwrap();
        array.remove(3).unwrap();

        let begin = array.begin();
        assert_eq!(begin.index(), 1);
        assert!(array.is_valid_cursor(begin));

        let next = array.next_cursor(begin);
        assert_eq!(next.index(), 4);
        assert_eq!(*array.at(next), 4);

        assert_eq!(array.next_cursor(next), array.end());

        assert_eq!(array.prev_cursor(array.end()), Some(next));
        assert_eq!(array.prev_cursor(next), Some(begin));
        assert_eq!(array.prev_cursor(begin), None);
    }

    #[test]
    #[should_panic]
    fn next_cursor_at_end_panics() {
        let array = array_of(&[1]);
        _ = array.next_cursor(array.end());
    }

    #[test]
    fn validity_checks() {
        let mut array = array_of(&[1, 2]);
        array.remove(1).unwrap();

        assert!(array.is_valid(0));
        assert!(!array.is_valid(1));
        assert!(!array.is_valid(2));

        assert_eq!(array.get(0), Some(&1));
        assert_eq!(array.get(1), None);
        assert_eq!(array.get_mut(1), None);
    }

    #[test]
    #[should_panic]
    fn index_reclaimed_panics() {
        let mut array = array_of(&[1, 2]);
        array.remove(1).unwrap();

        _ = array[1];
    }

    #[test]
    fn search_ignores_reclaimed_slots() {
        let mut array = array_of(&[7, 8, 7, 8]);
        array.remove(0).unwrap();
        array.remove(3).unwrap();

        assert_eq!(array.index_of_first(&7), Some(2));
        assert_eq!(array.index_of_last(&8), Some(1));
        assert_eq!(array.index_of_first(&9), None);
        assert_eq!(array.find_first(&8), Some(&8));
        assert_eq!(array.find_last(&7), Some(&7));
    }

    #[test]
    fn iteration_in_both_directions() {
        let mut array = array_of(&[1, 2, 3, 4]);
        array.remove(1).unwrap();

        assert_eq!(array.iter().len(), 3);
        assert_eq!(array.iter().rev().copied().collect::<Vec<_>>(), vec![4, 3, 1]);

        for value in &mut array {
            *value += 100;
        }

        assert_eq!(collect(&array), vec![101, 103, 104]);
        assert_eq!(
            array.iter_slots().map(|(index, _)| index).collect::<Vec<_>>(),
            vec![0, 2, 3]
        );
    }

    #[test]
    fn set_replaces_everything() {
        let mut array = array_of(&[1, 2, 3]);
        array.remove(1).unwrap();

        array.set(&[9, 8]).unwrap();

        assert_eq!(collect(&array), vec![9, 8]);
        assert_eq!(array.reclaimed_len(), 0);
        assert_eq!(array.physical_len(), 2);
    }

    #[test]
    fn failed_set_keeps_old_contents() {
        let mut array = RecyclingArray::<u32>::builder()
            .allocator(CappedAllocator::new(32))
            .build()
            .unwrap();

        array.set(&[1, 2]).unwrap();
        assert!(array.set(&[0; 9]).is_err());

        assert_eq!(collect(&array), vec![1, 2]);
    }

    #[test]
    fn set_from_translates_reclaimed_slots() {
        let mut source = array_of(&[0, 1, 2, 3, 4]);
        source.remove(2).unwrap();
        source.remove(4).unwrap();

        let mut target = array_of(&[100]);
        target.set_from(&source, 1..5).unwrap();

        assert_eq!(target.physical_len(), 4);
        assert_eq!(collect(&target), vec![1, 3]);
        assert!(!target.is_valid(1));
        assert!(!target.is_valid(3));
        assert_eq!(target.reclaimed_len(), 2);
    }

    #[test]
    fn clone_preserves_layout_and_reuse_order() {
        let mut array = array_of(&[0, 1, 2, 3]);
        array.remove(0).unwrap();
        array.remove(2).unwrap();

        let mut clone = array.clone();

        assert_eq!(collect(&clone), vec![1, 3]);
        assert_eq!(clone.physical_len(), 4);

        assert_eq!(clone.add(20).unwrap(), 2);
        assert_eq!(clone.add(0).unwrap(), 0);

        // The original is unaffected.
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn check_add_reserved_length_reserves_slots_only() {
        let mut array = RecyclingArray::<u64>::new();

        array.check_add_reserved_length(10).unwrap();

        assert!(array.reserved_length() >= 10);
        assert_eq!(array.free_list.reserved_length(), 0);
    }

    #[test]
    fn capacity_checks_pass_through_to_slots() {
        let mut array = RecyclingArray::<u32>::new();

        array.set_reserved_length(5).unwrap();
        assert_eq!(array.reserved_length(), 5);
        assert_eq!(array.reserved_size(), 20);

        array.check_reserved_length(3).unwrap();
        assert_eq!(array.reserved_length(), 5);

        array.check_reserved_length(6).unwrap();
        assert!(array.reserved_length() >= 6);

        for value in 0..6 {
            array.add(value).unwrap();
        }
        array.remove(0).unwrap();

        // Reservations count physical slots, reclaimed or not.
        let reserved = array.reserved_length();
        array.set_reserved_length(6).unwrap();
        assert_eq!(array.reserved_length(), reserved);
    }

    #[test]
    fn reclaimed_slots_of_types_with_invalid_bit_patterns_are_never_read() {
        let mut source = RecyclingArray::<bool>::new();
        for value in [true, false, true, false] {
            source.add(value).unwrap();
        }
        source.remove(1).unwrap();

        let mut target = RecyclingArray::<bool>::new();

        // Slot 1 of the copy is never written, so it holds no valid `bool`.
        target.set_from(&source, ..).unwrap();

        assert_eq!(target.iter().copied().collect::<Vec<_>>(), vec![true, true, false]);
        assert_eq!(
            target.iter().rev().copied().collect::<Vec<_>>(),
            vec![false, true, true]
        );
        assert_eq!(
            target.iter_slots().map(|(index, _)| index).collect::<Vec<_>>(),
            vec![0, 2, 3]
        );

        for value in &mut target {
            *value = !*value;
        }

        assert_eq!(target.get(0), Some(&false));
        assert_eq!(target.get(1), None);
        assert_eq!(target.get_mut(1), None);
        assert!(!target[2]);
        assert!(target[3]);
        assert_eq!(target.index_of_first(&true), Some(3));
        assert_eq!(target.find_last(&false), Some(&false));
    }

    #[test]
    fn drop_drops_live_items_once() {
        let drops = Rc::new(Cell::new(0));

        {
            let mut array = RecyclingArray::new();
            for _ in 0..6 {
                array.add(counter(&drops)).unwrap();
            }

            array.remove_range(2..4).unwrap();
            assert_eq!(drops.get(), 2);
        }

        assert_eq!(drops.get(), 6);
    }

    #[test]
    fn debug_lists_live_entries() {
        let mut array = array_of(&[5, 6]);
        array.remove(0).unwrap();

        let output = format!("{array:?}");

        assert!(output.contains("1: 6"));
        assert!(!output.contains("0: 5"));
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a = array_of(&[1]);
        let mut b = array_of(&[2, 3]);

        a.swap(&mut b);

        assert_eq!(collect(&a), vec![2, 3]);
        assert_eq!(collect(&b), vec![1]);
    }

    #[test]
    #[should_panic]
    fn drop_item_with_forbidden_to_drop_policy_panics() {
        let mut array = RecyclingArray::<u32>::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build()
            .unwrap();

        array.add(1).unwrap();
    }

    #[test]
    fn drop_only_reclaimed_with_forbidden_to_drop_policy_ok() {
        let mut array = RecyclingArray::<u32>::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build()
            .unwrap();

        array.add(1).unwrap();
        array.remove(0).unwrap();
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(RecyclingArray::<()>::new());
    }
}
