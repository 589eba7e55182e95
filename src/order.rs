//! Sparse order labels.
//!
//! Every slot carries a `u64` label, strictly increasing along the list, so
//! that two positions can be compared without walking between them. New
//! labels are taken from the gap between the neighbors; when a gap closes the
//! whole list is relabeled with [`spacing_for`].

/// Distance between labels assigned at either end of the list.
pub(crate) const SPACING: u64 = 0x100000;

/// Label of the first slot ever inserted into an empty list. Sits in the
/// middle of the label space so that both ends have room to grow.
pub(crate) const ORIGIN: u64 = 1 << 63;

/// Label reserved for the end position. No slot ever receives it.
pub(crate) const END: u64 = u64::MAX;

/// Picks a label strictly between `prev` and `next`, where `None` stands for
/// the respective end of the list.
///
/// Returns `None` when the neighbors leave no gap.
pub(crate) fn between(prev: Option<u64>, next: Option<u64>) -> Option<u64> {
    match (prev, next) {
        (None, None) => Some(ORIGIN),
        (None, Some(next)) => next
            .checked_sub(SPACING)
            .or_else(|| (next > 0).then_some(next / 2)),
        (Some(prev), None) => prev
            .checked_add(SPACING)
            .filter(|&label| label < END)
            .or_else(|| midpoint(prev, END)),
        (Some(prev), Some(next)) => midpoint(prev, next),
    }
}

fn midpoint(low: u64, high: u64) -> Option<u64> {
    debug_assert!(low < high, "labels out of order: {low} >= {high}");
    (high - low >= 2).then(|| low + (high - low) / 2)
}

/// Spacing used when relabeling a list of `len` slots. Spreads the slots over
/// the whole label space with one spacing to spare at either end.
pub(crate) fn spacing_for(len: usize) -> u64 {
    let slots = len as u64 + 2;
    (END - 1) / slots
}

/// Label of the first slot when relabeling `len` slots with `spacing`. The
/// relabeled list is centered on [`ORIGIN`] so that the head, the tail and
/// every gap keep the same room.
pub(crate) fn relabel_start(len: usize, spacing: u64) -> u64 {
    ORIGIN - (len as u64 / 2) * spacing
}

#[cold]
#[inline(never)]
pub(crate) fn label_space_exhausted() -> ! {
    panic!("Order label space exhausted after relabeling");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_label_is_origin() {
        assert_eq!(between(None, None), Some(ORIGIN));
    }

    #[test]
    fn test_head_and_tail_step_by_spacing() {
        assert_eq!(between(None, Some(ORIGIN)), Some(ORIGIN - SPACING));
        assert_eq!(between(Some(ORIGIN), None), Some(ORIGIN + SPACING));
    }

    #[test]
    fn test_midpoint_between_neighbors() {
        assert_eq!(between(Some(10), Some(20)), Some(15));
        assert_eq!(between(Some(10), Some(12)), Some(11));
        assert_eq!(between(Some(10), Some(11)), None);
    }

    #[test]
    fn test_head_falls_back_to_halving() {
        assert_eq!(between(None, Some(8)), Some(4));
        assert_eq!(between(None, Some(1)), Some(0));
        assert_eq!(between(None, Some(0)), None);
    }

    #[test]
    fn test_tail_never_reaches_end() {
        assert_eq!(between(Some(END - 3), None), Some(END - 2));
        assert_eq!(between(Some(END - 1), None), None);
    }

    #[test]
    fn test_spacing_uses_whole_label_space() {
        assert_eq!(spacing_for(0), (END - 1) / 2);
        assert!(spacing_for(1000) > 1 << 50);
        assert!(spacing_for(1000) > spacing_for(1001));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_spacing_for_huge_lists() {
        let spacing = spacing_for(1 << 50);
        assert!(spacing < SPACING);
        assert!(spacing >= 2);
    }

    #[test]
    fn test_relabeled_list_has_room_at_both_ends() {
        for len in [1, 2, 3, 10, 141, 1000, 1 << 20] {
            let spacing = spacing_for(len);
            let first = relabel_start(len, spacing);
            let last = first + (len as u64 - 1) * spacing;

            assert!(first >= spacing, "no room at the head for {len} slots");
            assert!(last < END - spacing, "no room at the tail for {len} slots");
            assert!(first <= ORIGIN && ORIGIN <= last + spacing);
        }
    }
}
