//! Amortized growth policy for array buffers.

/// A growing buffer always gains room for at least this many elements.
const MIN_GROWTH_ELEMENTS: usize = 4;

/// Calculates the new buffer size, in bytes, for a buffer that has to fit
/// `required_additional_bytes` more bytes beyond its live data.
///
/// The buffer grows by a quarter of its current size, but at least by
/// [`MIN_GROWTH_ELEMENTS`] elements so small buffers do not crawl, and at least by the demand
/// plus a quarter of the demand so a large bulk request does not immediately trigger another
/// reallocation. The result is rounded up to a whole number of elements.
///
/// Returns `None` if the result does not fit in `usize`.
#[must_use]
pub(crate) fn grown_capacity_bytes(
    current_capacity_bytes: usize,
    required_additional_bytes: usize,
    element_size: usize,
) -> Option<usize> {
    debug_assert!(element_size > 0);

    let proportional = current_capacity_bytes.checked_div(4)?;
    let floor = element_size.checked_mul(MIN_GROWTH_ELEMENTS)?;
    let demand = required_additional_bytes.checked_add(required_additional_bytes.checked_div(4)?)?;

    let growth = proportional.max(floor).max(demand);

    current_capacity_bytes
        .checked_add(growth)?
        .checked_next_multiple_of(element_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_gets_floor() {
        // 4 elements of 8 bytes.
        assert_eq!(grown_capacity_bytes(0, 8, 8), Some(32));
    }

    #[test]
    fn small_buffer_gets_floor() {
        // 16 bytes / 4 = 4 bytes, but the floor is 4 elements of 4 bytes.
        assert_eq!(grown_capacity_bytes(16, 4, 4), Some(32));
    }

    #[test]
    fn large_buffer_grows_by_quarter() {
        assert_eq!(grown_capacity_bytes(4096, 4, 4), Some(5120));
    }

    #[test]
    fn large_demand_overrides_quarter() {
        // Demand of 400 bytes + 25% headroom = 500 bytes beats 1024 / 4 = 256.
        assert_eq!(grown_capacity_bytes(1024, 400, 4), Some(1524));
    }

    #[test]
    fn result_is_whole_elements() {
        // 12-byte elements: 100 + max(25, 48, 12 + 3) = 148 -> rounded up to 156.
        let grown = grown_capacity_bytes(100, 12, 12).unwrap();

        assert_eq!(grown % 12, 0);
        assert_eq!(grown, 156);
    }

    #[test]
    fn overflow_is_none() {
        assert_eq!(grown_capacity_bytes(usize::MAX - 3, 4, 4), None);
        assert_eq!(grown_capacity_bytes(0, usize::MAX, 1), None);
    }
}
