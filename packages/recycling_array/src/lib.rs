#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Growable typed arrays with pluggable allocators, relocation-safe cursors and O(1) slot
//! recycling.
//!
//! This crate provides two layered containers:
//!
//! * [`DynamicArray`] owns one contiguous typed buffer and grows it on demand using an amortized
//!   growth policy. Allocation failure is reported as an [`Error`] and never leaves the array
//!   half-modified.
//! * [`RecyclingArray`] is built on top of [`DynamicArray`]. Removing an item leaves a reclaimed
//!   slot behind instead of shifting the rest of the array, and the next addition reuses it.
//!   Iteration, search and length queries skip reclaimed slots.
//!
//! # Key Features
//!
//! - **Amortized growth**: buffers grow by a quarter of their size, by at least four items and
//!   by at least the demand plus a quarter, so bulk requests do not immediately regrow
//! - **Fallible growth**: every operation that may allocate returns a [`Result`]
//! - **Pluggable memory source**: buffers come from a [`BufferAllocator`]. The global heap
//!   ([`HeapAllocator`]) is the default and [`CappedAllocator`] puts a ceiling on buffer size
//! - **Positions that survive growth**: index-based [`Cursor`]s are unaffected by relocation and
//!   pointer-based [`RawCursor`]s can be rebased by the capacity check that moves the buffer
//! - **Stable indexes**: items in a [`RecyclingArray`] keep their index until removed
//! - **Flexible drop policies**: configure behavior when an array is dropped with items in it
//!
//! # Examples
//!
//! ## Growing array
//!
//! ```rust
//! use recycling_array::DynamicArray;
//!
//! let mut array = DynamicArray::<u32>::new();
//!
//! array.add_slice(&[1, 2, 3, 4]).unwrap();
//! array.remove(0);
//! array.insert(3, 5).unwrap();
//!
//! assert_eq!(array.as_slice(), &[2, 3, 4, 5]);
//! ```
//!
//! ## Recycling slots
//!
//! ```rust
//! use recycling_array::RecyclingArray;
//!
//! let mut array = RecyclingArray::<&str>::builder()
//!     .reserved_length(4)
//!     .build()
//!     .unwrap();
//!
//! for value in ["A", "B", "C", "D"] {
//!     array.add(value).unwrap();
//! }
//!
//! array.remove(1).unwrap();
//! array.add("E").unwrap();
//!
//! assert_eq!(array.iter().copied().collect::<Vec<_>>(), ["A", "E", "C", "D"]);
//! assert_eq!(array.len(), 4);
//! ```
//!
//! ## Bounded memory
//!
//! ```rust
//! use recycling_array::{CappedAllocator, DynamicArray, Error};
//!
//! let mut array = DynamicArray::<u64>::builder()
//!     .allocator(CappedAllocator::new(64))
//!     .build()
//!     .unwrap();
//!
//! array.add_slice(&[1, 2, 3, 4]).unwrap();
//!
//! let error = array.add_slice(&[5; 8]).unwrap_err();
//! assert!(matches!(error, Error::AllocationFailed { .. }));
//!
//! // The array is exactly as it was before the failed call.
//! assert_eq!(array.as_slice(), &[1, 2, 3, 4]);
//! ```
//!
//! # Thread safety
//!
//! Arrays are thread-mobile ([`Send`]) when their items and allocator are, but not thread-safe
//! ([`Sync`]). Wrap them in a lock to share them between threads.

mod allocator;
mod builder;
mod cursor;
mod drop_policy;
mod dynamic_array;
mod error;
mod growth;
mod handle;
mod iter;
mod recycling_array;

pub use allocator::*;
pub use builder::*;
pub use cursor::*;
pub use drop_policy::*;
pub use dynamic_array::DynamicArray;
pub use error::Error;
pub(crate) use error::Result;
pub(crate) use handle::*;
pub use iter::*;
pub use recycling_array::RecyclingArray;
