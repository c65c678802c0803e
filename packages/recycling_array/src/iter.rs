use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::NonNull;

use bitvec::slice::BitSlice;

/// Iterator over the live items of a [`RecyclingArray`][crate::RecyclingArray].
///
/// Created by [`RecyclingArray::iter()`][crate::RecyclingArray::iter]. Reclaimed slots are
/// skipped in both directions.
///
/// Reclaimed slots hold no value, so the iterator walks the slots through raw pointers and only
/// forms a reference once the reclaimed flag of a slot says it is live.
#[derive(Debug)]
pub struct Iter<'a, T> {
    /// The first not-yet-visited physical slot.
    first: NonNull<T>,

    /// Reclaimed flags for the not-yet-visited slots, starting at `first`.
    reclaimed: &'a BitSlice,

    /// Number of live items among the not-yet-visited slots.
    remaining: usize,

    _items: PhantomData<&'a T>,
}

impl<'a, T> Iter<'a, T> {
    /// # Safety
    ///
    /// For every index `i` below `reclaimed.len()`, `first.add(i)` must be within one
    /// allocation. Every such slot whose flag is clear must hold an initialized `T` that stays
    /// valid and unmodified for `'a`. `live` must be the number of clear flags.
    pub(crate) unsafe fn new(first: NonNull<T>, reclaimed: &'a BitSlice, live: usize) -> Self {
        debug_assert_eq!(reclaimed.count_zeros(), live);

        Self {
            first,
            reclaimed,
            remaining: live,
            _items: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (is_reclaimed, rest) = self.reclaimed.split_first()?;
            let slot = self.first;

            self.reclaimed = rest;
            // SAFETY: The slot was part of the range, so one past it is within the allocation
            // or at its end.
            self.first = unsafe { slot.add(1) };

            if !*is_reclaimed {
                // Cannot underflow because `remaining` counts the live items we have not yet
                // returned, and we are about to return one of them.
                self.remaining = self.remaining.wrapping_sub(1);

                // SAFETY: The flag is clear, so the slot holds a value that is valid for 'a.
                return Some(unsafe { slot.as_ref() });
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let (is_reclaimed, rest) = self.reclaimed.split_last()?;
            self.reclaimed = rest;

            if !*is_reclaimed {
                // Cannot underflow, see next().
                self.remaining = self.remaining.wrapping_sub(1);

                // SAFETY: The last slot of the range is at the offset equal to the length of the
                // remaining range. Its flag is clear, so it holds a value that is valid for 'a.
                return Some(unsafe { self.first.add(rest.len()).as_ref() });
            }
        }
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            first: self.first,
            reclaimed: self.reclaimed,
            remaining: self.remaining,
            _items: PhantomData,
        }
    }
}

// SAFETY: Behaves like `&'a [T]`, which is `Send` if `T` is `Sync`.
unsafe impl<T: Sync> Send for Iter<'_, T> {}

// SAFETY: Behaves like `&'a [T]`, which is `Sync` if `T` is `Sync`.
unsafe impl<T: Sync> Sync for Iter<'_, T> {}

/// Iterator over the live items of a [`RecyclingArray`][crate::RecyclingArray], for
/// modification.
///
/// Created by [`RecyclingArray::iter_mut()`][crate::RecyclingArray::iter_mut]. Reclaimed slots
/// are skipped in both directions.
#[derive(Debug)]
pub struct IterMut<'a, T> {
    first: NonNull<T>,
    reclaimed: &'a BitSlice,
    remaining: usize,
    _items: PhantomData<&'a mut T>,
}

impl<'a, T> IterMut<'a, T> {
    /// # Safety
    ///
    /// Same as [`Iter::new()`], except that the live slots must also be valid for writes and
    /// not accessed through any other path for `'a`.
    pub(crate) unsafe fn new(first: NonNull<T>, reclaimed: &'a BitSlice, live: usize) -> Self {
        debug_assert_eq!(reclaimed.count_zeros(), live);

        Self {
            first,
            reclaimed,
            remaining: live,
            _items: PhantomData,
        }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (is_reclaimed, rest) = self.reclaimed.split_first()?;
            let mut slot = self.first;

            self.reclaimed = rest;
            // SAFETY: See Iter::next().
            self.first = unsafe { slot.add(1) };

            if !*is_reclaimed {
                self.remaining = self.remaining.wrapping_sub(1);

                // SAFETY: The flag is clear, so the slot holds a value we have exclusive access
                // to for 'a. The slot has left the range, so it is never handed out again.
                return Some(unsafe { slot.as_mut() });
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for IterMut<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            let (is_reclaimed, rest) = self.reclaimed.split_last()?;
            self.reclaimed = rest;

            if !*is_reclaimed {
                self.remaining = self.remaining.wrapping_sub(1);

                // SAFETY: See Iter::next_back() and IterMut::next().
                return Some(unsafe { self.first.add(rest.len()).as_mut() });
            }
        }
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}

impl<T> FusedIterator for IterMut<'_, T> {}

// SAFETY: Behaves like `&'a mut [T]`, which is `Send` if `T` is `Send`.
unsafe impl<T: Send> Send for IterMut<'_, T> {}

// SAFETY: Behaves like `&'a mut [T]`, which is `Sync` if `T` is `Sync`.
unsafe impl<T: Sync> Sync for IterMut<'_, T> {}

#[cfg(test)]
#[allow(
    clippy::arithmetic_side_effects,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::mem::MaybeUninit;

    use bitvec::bitvec;
    use bitvec::order::Lsb0;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Iter<'static, u32>: Send, Sync, Clone, ExactSizeIterator, DoubleEndedIterator);
    assert_impl_all!(IterMut<'static, u32>: Send, Sync, ExactSizeIterator, DoubleEndedIterator);
    assert_not_impl_any!(Iter<'static, Cell<u32>>: Send, Sync);
    assert_not_impl_any!(IterMut<'static, Cell<u32>>: Sync);

    fn iter_over<'a, T>(slots: &'a [T], reclaimed: &'a BitSlice) -> Iter<'a, T> {
        // SAFETY: Every slot of the slice is initialized and borrowed for 'a.
        unsafe {
            Iter::new(
                NonNull::from(slots).cast::<T>(),
                reclaimed,
                reclaimed.count_zeros(),
            )
        }
    }

    fn iter_mut_over<'a, T>(slots: &'a mut [T], reclaimed: &'a BitSlice) -> IterMut<'a, T> {
        // SAFETY: Every slot of the slice is initialized and exclusively borrowed for 'a.
        unsafe {
            IterMut::new(
                NonNull::from(slots).cast::<T>(),
                reclaimed,
                reclaimed.count_zeros(),
            )
        }
    }

    #[test]
    fn skips_reclaimed_in_both_directions() {
        let slots = [1, 2, 3, 4, 5];
        let reclaimed = bitvec![usize, Lsb0; 1, 0, 1, 0, 1];

        let iter = iter_over(&slots, &reclaimed);
        assert_eq!(iter.len(), 2);
        assert_eq!(iter.clone().copied().collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(iter.rev().copied().collect::<Vec<_>>(), vec![4, 2]);
    }

    #[test]
    fn meets_in_the_middle() {
        let slots = [1, 2, 3];
        let reclaimed = bitvec![usize, Lsb0; 0, 0, 0];

        let mut iter = iter_over(&slots, &reclaimed);
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next_back(), Some(&3));
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next_back(), None);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.len(), 0);
    }

    #[test]
    fn all_reclaimed_is_empty() {
        let slots = [1, 2];
        let reclaimed = bitvec![usize, Lsb0; 1, 1];

        assert_eq!(iter_over(&slots, &reclaimed).next(), None);
    }

    #[test]
    fn empty_range_with_dangling_pointer() {
        let reclaimed = BitSlice::empty();

        // SAFETY: There are no slots, so the pointer is never dereferenced or offset.
        let mut iter = unsafe { Iter::<u64>::new(NonNull::dangling(), reclaimed, 0) };

        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn uninitialized_reclaimed_slots_are_never_touched() {
        // `bool` has invalid bit patterns, so forming a reference to the middle slot would be
        // undefined behavior.
        let slots = [
            MaybeUninit::new(true),
            MaybeUninit::uninit(),
            MaybeUninit::new(false),
        ];
        let reclaimed = bitvec![usize, Lsb0; 0, 1, 0];

        // SAFETY: Exactly the slots with a clear flag are initialized.
        let iter = unsafe {
            Iter::new(
                NonNull::from(&slots).cast::<bool>(),
                &reclaimed,
                2,
            )
        };

        assert_eq!(iter.clone().copied().collect::<Vec<_>>(), vec![true, false]);
        assert_eq!(iter.rev().copied().collect::<Vec<_>>(), vec![false, true]);
    }

    #[test]
    fn iter_mut_modifies_live_only() {
        let mut slots = [1, 2, 3, 4];
        let reclaimed = bitvec![usize, Lsb0; 0, 1, 0, 1];

        for value in iter_mut_over(&mut slots, &reclaimed) {
            *value *= 10;
        }

        assert_eq!(slots, [10, 2, 30, 4]);

        let mut iter = iter_mut_over(&mut slots, &reclaimed);
        assert_eq!(iter.next_back().map(|v| *v), Some(30));
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.next().map(|v| *v), Some(10));
        assert_eq!(iter.next(), None);
    }
}
