/// Determines item dropping behavior when the array is dropped.
///
/// By default, the array will drop its items when it is dropped.
///
/// # Examples
///
/// ```
/// use recycling_array::{DropPolicy, DynamicArray};
///
/// let array = DynamicArray::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build()
///     .unwrap();
///
/// assert!(array.is_empty());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The array will drop its items when the array is dropped. This is the default.
    #[default]
    MayDropItems,

    /// The array will panic if it still contains items when it is dropped.
    ///
    /// Useful when the items are referenced from elsewhere via pointers obtained from the array
    /// and must be explicitly removed before the storage goes away.
    MustNotDropItems,
}
