//! Integration tests for the `recycling_array` package.
//!
//! These exercise the public API end to end: growth, failure isolation, position tracking
//! across relocation and slot recycling.

use std::cell::Cell;
use std::rc::Rc;

use recycling_array::{CappedAllocator, DynamicArray, Error, RecyclingArray};

#[derive(Clone, Debug)]
struct Tracked {
    value: u32,
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get().wrapping_add(1));
    }
}

#[test]
fn recycling_round_trip() {
    let mut array = RecyclingArray::<char>::builder()
        .reserved_length(4)
        .build()
        .unwrap();

    for value in ['A', 'B', 'C', 'D'] {
        array.add(value).unwrap();
    }

    assert_eq!(array.remove(1).unwrap(), 'B');
    array.add('E').unwrap();

    assert_eq!(array.iter().collect::<String>(), "AECD");
    assert_eq!(array.len(), 4);
    assert_eq!(array.reserved_length(), 4);
}

#[test]
fn growth_under_pressure_keeps_order() {
    let mut array = DynamicArray::<u32>::builder()
        .reserved_length(4)
        .build()
        .unwrap();

    array.add_slice(&[10, 20, 30, 40]).unwrap();
    assert_eq!(array.reserved_length(), 4);

    array.add(50).unwrap();

    assert!(array.reserved_length() >= 5);
    assert_eq!(array.reserved_size() % size_of::<u32>(), 0);
    assert_eq!(array.as_slice(), &[10, 20, 30, 40, 50]);
}

#[test]
fn growth_invariant_holds_over_many_adds() {
    let mut array = DynamicArray::<[u8; 3]>::new();

    for value in 0..1000_u32 {
        let byte = u8::try_from(value % 256).unwrap();
        array.add([byte; 3]).unwrap();

        assert!(array.reserved_length() >= array.len());
        assert_eq!(array.reserved_size() % 3, 0);
    }

    for (index, item) in array.iter().enumerate() {
        assert_eq!(usize::from(item[0]), index % 256);
    }
}

#[test]
fn allocation_failure_leaves_contents_unchanged() {
    let mut array = DynamicArray::<u32>::builder()
        .allocator(CappedAllocator::new(16))
        .build()
        .unwrap();

    array.add_slice(&[1, 2, 3]).unwrap();

    let before = array.clone();

    assert!(matches!(
        array.add_slice(&[4, 5]),
        Err(Error::AllocationFailed { .. })
    ));
    assert!(array.insert_slice(0, &[7, 8]).is_err());
    assert!(array.replace(0..1, &[7, 8, 9]).is_err());
    assert!(array.set(&[0; 5]).is_err());
    assert!(array.check_add_reserved_length(2).is_err());

    assert_eq!(array, before);

    // Operations that fit still work.
    array.add(4).unwrap();
    assert_eq!(array.as_slice(), &[1, 2, 3, 4]);
}

#[test]
fn raw_cursors_follow_relocation() {
    let mut array = DynamicArray::<u64>::new();
    array.add_slice(&[1, 2, 3]).unwrap();

    let mut first = array.raw_cursor(0);
    let mut end = array.raw_cursor(array.len());

    for round in 0..20_u64 {
        array
            .check_add_reserved_length_rebasing(100, &mut [&mut first, &mut end])
            .unwrap();

        assert!(array.is_current(&first));
        assert!(array.is_current(&end));

        // SAFETY: The cursor is current and points at the first item.
        assert_eq!(unsafe { first.as_ptr().read() }, 1);

        // Fill up the reservation so the next round has to grow again.
        while array.len() < array.reserved_length() {
            array.add(round).unwrap();
        }

        // `end` still marks the old end, which is now the position of the 4th item.
        // SAFETY: The cursor is current and the slot it points to is initialized.
        assert_eq!(unsafe { end.as_ptr().read() }, 0);
    }
}

#[test]
fn index_cursors_need_no_rebasing() {
    let mut array = RecyclingArray::<u32>::new();
    array.add(1).unwrap();
    let second = array.add(2).unwrap();

    let cursor = array.next_cursor(array.begin());
    assert_eq!(cursor.index(), second);

    for value in 0..10_000 {
        array.add(value).unwrap();
    }

    assert_eq!(*array.at(cursor), 2);
}

#[test]
fn clear_versus_remove_all() {
    let drops = Rc::new(Cell::new(0));

    let mut array = RecyclingArray::new();
    for value in 0..10 {
        array
            .add(Tracked {
                value,
                drops: Rc::clone(&drops),
            })
            .unwrap();
    }
    drop(array.remove(4).unwrap());

    let reserved = array.reserved_length();

    array.remove_all();
    assert_eq!(drops.get(), 10);
    assert!(array.is_empty());
    assert_eq!(array.reserved_length(), reserved);

    // Idempotent.
    array.remove_all();
    assert_eq!(drops.get(), 10);
    assert_eq!(array.reserved_length(), reserved);

    array
        .add(Tracked {
            value: 99,
            drops: Rc::clone(&drops),
        })
        .unwrap();

    array.clear();
    assert_eq!(drops.get(), 11);
    assert!(array.is_empty());
    assert_eq!(array.reserved_length(), 0);
}

#[test]
fn recycled_slots_are_never_observed() {
    let drops = Rc::new(Cell::new(0));

    let mut array = RecyclingArray::new();
    for value in 0..8 {
        array
            .add(Tracked {
                value,
                drops: Rc::clone(&drops),
            })
            .unwrap();
    }

    array.remove_range(2..5).unwrap();
    drop(array.remove(7).unwrap());

    let seen = array.iter().map(|item| item.value).collect::<Vec<_>>();
    assert_eq!(seen, vec![0, 1, 5, 6]);
    assert_eq!(array.len(), seen.len());

    let reversed = array.iter().rev().map(|item| item.value).collect::<Vec<_>>();
    assert_eq!(reversed, vec![6, 5, 1, 0]);

    let mut cursor = array.begin();
    let mut walked = Vec::new();
    while cursor != array.end() {
        walked.push(array.at(cursor).value);
        cursor = array.next_cursor(cursor);
    }
    assert_eq!(walked, seen);

    drop(array);
    assert_eq!(drops.get(), 8);
}

#[test]
fn recycling_set_from_copies_layout() {
    let mut source = RecyclingArray::<u32>::new();
    for value in 0..6 {
        source.add(value).unwrap();
    }
    source.remove(1).unwrap();
    source.remove(4).unwrap();

    let mut copy = RecyclingArray::<u32>::new();
    copy.set_from(&source, ..).unwrap();

    assert_eq!(copy.physical_len(), 6);
    assert_eq!(
        copy.iter().copied().collect::<Vec<_>>(),
        source.iter().copied().collect::<Vec<_>>()
    );

    for index in 0..6 {
        assert_eq!(copy.is_valid(index), source.is_valid(index));
    }
}

#[test]
fn arrays_move_between_threads() {
    let mut array = RecyclingArray::<String>::new();
    array.add("hello".to_string()).unwrap();

    let array = std::thread::spawn(move || {
        array.add("world".to_string()).unwrap();
        array
    })
    .join()
    .unwrap();

    assert_eq!(array.len(), 2);
}
