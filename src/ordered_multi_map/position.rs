use crate::Ptr;

/// A detached position in an [`OrderedMultiMap`].
///
/// A `Position` names either one `(key, value)` pair or the end of the map.
/// It is a plain handle: it does not borrow the map, so it can be passed back
/// into mutating operations such as [`insert`] or [`erase_at`]. Obtaining one
/// from a key through [`find`] is O(1).
///
/// To walk, compare or inspect positions, either use the map's
/// position methods ([`next_position`], [`compare_positions`], ...) or turn
/// the position into a [`Cursor`] with [`cursor`]. A cursor converts back
/// with [`Cursor::position`].
///
/// Positions are **non-generational**. Any mutation of the map may
/// invalidate them, with one guarantee: erasing pairs leaves positions of
/// all other pairs valid, and [`erase_at`] returns a valid successor.
///
/// [`OrderedMultiMap`]: crate::ordered_multi_map::OrderedMultiMap
/// [`insert`]: crate::ordered_multi_map::OrderedMultiMap::insert
/// [`erase_at`]: crate::ordered_multi_map::OrderedMultiMap::erase_at
/// [`find`]: crate::ordered_multi_map::OrderedMultiMap::find
/// [`next_position`]: crate::ordered_multi_map::OrderedMultiMap::next_position
/// [`compare_positions`]: crate::ordered_multi_map::OrderedMultiMap::compare_positions
/// [`cursor`]: crate::ordered_multi_map::OrderedMultiMap::cursor
/// [`Cursor`]: crate::ordered_multi_map::Cursor
/// [`Cursor::position`]: crate::ordered_multi_map::Cursor::position
///
/// # Examples
///
/// ```
/// use ordered_multi_map::OrderedMultiMap;
/// use ordered_multi_map::Position;
///
/// let mut map = OrderedMultiMap::new();
/// assert_eq!(map.begin(), Position::end());
///
/// let (pos, inserted) = map.insert(map.begin(), "x", 1);
/// assert!(inserted);
/// assert_eq!(map.find(&"x"), pos);
/// assert_eq!(map.find(&"y"), Position::end());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    // Always an item slot. Tags are never exposed as positions.
    pub(crate) slot: Option<Ptr>,
}

impl Position {
    /// The past-the-end position, shared by every map.
    pub const fn end() -> Self {
        Position { slot: None }
    }

    /// Returns `true` if this is the past-the-end position.
    pub const fn is_end(&self) -> bool {
        self.slot.is_none()
    }

    pub(crate) fn item(slot: Ptr) -> Self {
        Position { slot: Some(slot) }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::end()
    }
}

impl core::fmt::Debug for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.slot {
            Some(ptr) => write!(f, "Position({})", ptr.unchecked_get()),
            None => f.write_str("Position(end)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn test_end_position() {
        assert!(Position::end().is_end());
        assert_eq!(Position::default(), Position::end());
        assert!(!Position::item(Ptr::unchecked_from(0)).is_end());
    }

    #[test]
    fn test_position_debug() {
        assert_eq!(format!("{:?}", Position::end()), "Position(end)");
        assert_eq!(
            format!("{:?}", Position::item(Ptr::unchecked_from(3))),
            "Position(3)"
        );
    }
}
