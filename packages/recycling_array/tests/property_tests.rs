//! Property tests for the growth policy and the slot recycling bookkeeping.
//!
//! Random operation sequences are applied both to the arrays under test and to a simple model
//! built on `Vec`, and the observable state is compared after every step.

use std::collections::BTreeSet;

use proptest::prelude::*;
use recycling_array::{CappedAllocator, DynamicArray, RecyclingArray};

#[derive(Clone, Debug)]
enum Op {
    Add(u16),
    Remove(usize),
    RemoveLast,
    RemoveAll,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<u16>().prop_map(Op::Add),
        4 => any::<usize>().prop_map(Op::Remove),
        1 => Just(Op::RemoveLast),
        1 => Just(Op::RemoveAll),
    ]
}

proptest! {
    #[test]
    fn growth_never_loses_data(
        cap_items in 0_usize..64,
        values in prop::collection::vec(any::<u32>(), 0..128),
    ) {
        let mut array = DynamicArray::<u32>::builder()
            .allocator(CappedAllocator::new(cap_items * size_of::<u32>()))
            .build()
            .unwrap();

        let mut model = Vec::new();

        for value in values {
            let before_reserved = array.reserved_length();

            match array.add(value) {
                Ok(index) => {
                    prop_assert_eq!(index, model.len());
                    model.push(value);
                }
                Err(_) => {
                    prop_assert_eq!(array.reserved_length(), before_reserved);
                }
            }

            prop_assert!(array.reserved_length() >= array.len());
            prop_assert_eq!(array.reserved_size() % size_of::<u32>(), 0);
            prop_assert!(array.reserved_size() <= cap_items * size_of::<u32>());
            prop_assert_eq!(array.as_slice(), model.as_slice());
        }
    }

    #[test]
    fn bulk_growth_has_headroom(
        initial in 0_usize..100,
        bulk in 1_usize..500,
    ) {
        let mut array = DynamicArray::<u8>::builder()
            .reserved_length(initial)
            .build()
            .unwrap();

        array.add_slice(&vec![1; initial]).unwrap();
        array.add_slice(&vec![2; bulk]).unwrap();

        prop_assert!(array.reserved_length() >= initial + bulk);

        if array.reserved_length() > initial {
            // Whenever growth happened, it gained at least four items.
            prop_assert!(array.reserved_length() >= initial + 4);
        }
    }

    #[test]
    fn recycling_matches_model(ops in prop::collection::vec(arb_op(), 0..200)) {
        let mut array = RecyclingArray::<u16>::new();

        // Index -> value for every live slot.
        let mut model: Vec<Option<u16>> = Vec::new();

        for op in ops {
            match op {
                Op::Add(value) => {
                    let index = array.add(value).unwrap();

                    if index == model.len() {
                        model.push(Some(value));
                    } else {
                        prop_assert!(model[index].is_none(), "reused a live slot");
                        model[index] = Some(value);
                    }
                }
                Op::Remove(seed) => {
                    let live = model
                        .iter()
                        .enumerate()
                        .filter_map(|(index, slot)| slot.map(|_| index))
                        .collect::<Vec<_>>();

                    if !live.is_empty() {
                        let index = live[seed % live.len()];
                        prop_assert_eq!(Some(array.remove(index).unwrap()), model[index].take());
                    }
                }
                Op::RemoveLast => {
                    let expected = model.iter().rposition(Option::is_some);
                    let removed = array.remove_last();

                    match expected {
                        Some(index) => {
                            prop_assert_eq!(removed, model[index]);
                            model.truncate(index);
                        }
                        None => prop_assert_eq!(removed, None),
                    }
                }
                Op::RemoveAll => {
                    array.remove_all();
                    model.clear();
                }
            }

            let live_values = model.iter().flatten().copied().collect::<Vec<_>>();
            let live_count = live_values.len();

            prop_assert_eq!(array.len(), live_count);
            prop_assert_eq!(array.is_empty(), live_count == 0);
            prop_assert_eq!(array.iter().count(), live_count);
            prop_assert_eq!(array.iter().copied().collect::<Vec<_>>(), live_values);
            prop_assert!(array.physical_len() <= model.len());

            for (index, slot) in model.iter().enumerate() {
                prop_assert_eq!(array.is_valid(index), slot.is_some());
                prop_assert_eq!(array.get(index).copied(), *slot);
            }
        }
    }

    #[test]
    fn reclaimed_slots_are_reused_without_duplicates(
        count in 1_usize..64,
        removals in prop::collection::btree_set(0_usize..64, 0..64),
    ) {
        let mut array = RecyclingArray::<usize>::new();
        for value in 0..count {
            array.add(value).unwrap();
        }

        let removed = removals
            .into_iter()
            .filter(|&index| index < count)
            .collect::<BTreeSet<_>>();

        for &index in &removed {
            array.remove(index).unwrap();
        }

        prop_assert_eq!(array.reclaimed_len(), removed.len());

        let mut reused = BTreeSet::new();
        for _ in 0..removed.len() {
            let index = array.add(usize::MAX).unwrap();
            prop_assert!(reused.insert(index), "slot {} handed out twice", index);
        }

        prop_assert_eq!(&reused, &removed);
        prop_assert_eq!(array.reclaimed_len(), 0);
        prop_assert_eq!(array.physical_len(), count);
        prop_assert_eq!(array.len(), count);
    }
}
