use thiserror::Error;

/// Errors that can occur when an array needs more memory than it currently holds.
///
/// Every operation that returns this error leaves the array exactly as it was before the call.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The allocator refused to provide a buffer of the requested size.
    #[error(
        "allocator refused to provide a buffer of {requested_bytes} bytes (currently holding {current_bytes} bytes)"
    )]
    AllocationFailed {
        /// Size of the buffer that was requested, in bytes.
        requested_bytes: usize,

        /// Size of the buffer held by the array at the time of the request, in bytes.
        current_bytes: usize,
    },

    /// The requested capacity cannot be expressed as a valid memory layout on this platform.
    #[error("requested capacity overflows the addressable memory range")]
    CapacityOverflow,
}

/// A specialized `Result` type for array operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug, Clone);

    #[test]
    fn allocation_failed_mentions_sizes() {
        let error = Error::AllocationFailed {
            requested_bytes: 64,
            current_bytes: 16,
        };

        let message = error.to_string();
        assert!(message.contains("64 bytes"));
        assert!(message.contains("16 bytes"));
    }

    #[test]
    fn overflow_is_error() {
        let result: Result<()> = Err(Error::CapacityOverflow);
        assert_eq!(result, Err(Error::CapacityOverflow));
    }
}
