use core::cmp::Ordering;

use crate::ordered_multi_map::GroupKeys;
use crate::ordered_multi_map::Iter;
use crate::ordered_multi_map::OrderedMultiMap;
use crate::ordered_multi_map::Position;

/// A read-only cursor over an [`OrderedMultiMap`].
///
/// A `Cursor` pairs a [`Position`] with a shared borrow of its map, so it can
/// dereference, step in both directions, skip whole groups and compare itself
/// to other cursors in O(1). Two cursors are equal when they rest at the same
/// position of the same map; cursors over different maps are unordered.
///
/// Use [`position`](Self::position) to get a detached handle that outlives
/// the borrow, for example to pass back into a mutating map operation.
///
/// # Examples
///
/// ```
/// use ordered_multi_map::OrderedMultiMap;
///
/// let mut map = OrderedMultiMap::new();
/// map.insert_group(map.end(), ["a", "b"], 1);
/// map.push_back("c", 2);
///
/// let mut cursor = map.begin_cursor();
/// assert_eq!(cursor.current(), Some((&"a", &1)));
/// cursor.skip();
/// assert_eq!(cursor.key(), Some(&"c"));
///
/// let later = cursor;
/// cursor.move_prev();
/// assert!(cursor < later);
/// assert_eq!(cursor.key(), Some(&"b"));
/// ```
pub struct Cursor<'m, K, V, S> {
    pub(crate) map: &'m OrderedMultiMap<K, V, S>,
    pub(crate) pos: Position,
}

impl<K, V, S> Clone for Cursor<'_, K, V, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V, S> Copy for Cursor<'_, K, V, S> {}

impl<K: core::fmt::Debug, V: core::fmt::Debug, S> core::fmt::Debug for Cursor<'_, K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("current", &self.current())
            .finish()
    }
}

impl<K, V, S> PartialEq for Cursor<'_, K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.map, other.map) && self.pos == other.pos
    }
}

impl<K, V, S> Eq for Cursor<'_, K, V, S> {}

impl<K, V, S> PartialOrd for Cursor<'_, K, V, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        core::ptr::eq(self.map, other.map).then(|| self.map.compare_positions(self.pos, other.pos))
    }
}

impl<'m, K, V, S> Cursor<'m, K, V, S> {
    /// The detached position the cursor rests at.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// The pair under the cursor, or `None` at the end.
    pub fn current(&self) -> Option<(&'m K, &'m V)> {
        self.map.entry_at(self.pos)
    }

    /// The key under the cursor.
    pub fn key(&self) -> Option<&'m K> {
        self.current().map(|(key, _)| key)
    }

    /// The value of the group under the cursor.
    pub fn value(&self) -> Option<&'m V> {
        self.current().map(|(_, value)| value)
    }

    /// Returns `true` if the cursor rests at the end.
    pub fn at_end(&self) -> bool {
        self.pos.is_end()
    }

    /// Returns `true` if the cursor rests at the first pair. An empty map's
    /// cursor is both at the beginning and at the end.
    pub fn at_begin(&self) -> bool {
        self.pos == self.map.begin()
    }

    /// Advances to the next pair. Returns `false`, staying put, if the cursor
    /// is already at the end.
    pub fn move_next(&mut self) -> bool {
        match self.map.next_position(self.pos) {
            Some(next) => {
                self.pos = next;
                true
            }
            None => false,
        }
    }

    /// Steps back to the previous pair; from the end that is the last pair.
    /// Returns `false`, staying put, if there is no previous pair.
    pub fn move_prev(&mut self) -> bool {
        match self.map.prev_position(self.pos) {
            Some(prev) => {
                self.pos = prev;
                true
            }
            None => false,
        }
    }

    /// Moves to the first pair of the next group.
    /// See [`OrderedMultiMap::skip`].
    pub fn skip(&mut self) {
        self.pos = self.map.skip(self.pos);
    }

    /// Moves to the first pair of the previous group.
    /// See [`OrderedMultiMap::reverse_skip`].
    pub fn reverse_skip(&mut self) {
        self.pos = self.map.reverse_skip(self.pos);
    }

    /// Keys of the group under the cursor, from the group's first key. Empty
    /// at the end.
    pub fn group_keys(&self) -> GroupKeys<'m, K, V> {
        let next = self
            .pos
            .slot
            .and_then(|slot| self.map.nodes[self.map.nodes[slot].tag()].next);
        GroupKeys {
            next,
            nodes: &self.map.nodes,
        }
    }

    /// Iterates the pairs from the cursor to the end of the map.
    pub fn iter(&self) -> Iter<'m, K, V> {
        Iter {
            front: self.pos.slot,
            back: self.pos.slot.and(self.map.tail),
            nodes: &self.map.nodes,
        }
    }
}
