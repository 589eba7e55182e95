//! Ordered multi-key map.
//!
//! This module provides the core [`OrderedMultiMap`] type and related
//! functionality. The map associates *groups* of keys with a single owned
//! value, keeps every `(key, value)` pair in a caller-controlled order, and
//! answers "which comes first?" for any two positions in O(1).
//!
//! # Examples
//!
//! ```
//! use ordered_multi_map::ordered_multi_map::OrderedMultiMap;
//!
//! let mut map = OrderedMultiMap::new();
//! let (x, _) = map.push_back("x", 20);
//! map.push_back("y", 99);
//! map.insert_right(x, "x.clone");
//!
//! let mut keys = Vec::new();
//! assert!(map.associated_keys(&"x.clone", &mut keys));
//! assert_eq!(keys, ["x", "x.clone"]);
//! assert_eq!(map[&"x.clone"], 20);
//! ```

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::ops::Index;
use core::ops::IndexMut;

use hashbrown::HashTable;

use crate::Ptr;
use crate::RandomState;
use crate::arena::Arena;
use crate::arena::SlotData;
use crate::arena::SlotKind;
use crate::error::MultiMapError;
use crate::order;

mod cursor;
mod identity;
mod iter;
mod position;

pub use cursor::Cursor;
pub use identity::KeyIdentityListener;
pub use iter::GroupKeys;
pub use iter::Groups;
pub use iter::IntoIter;
pub use iter::Iter;
pub use position::Position;

/// An ordered map from keys to values, where several keys may share one
/// value.
///
/// Internally the map is a doubly-linked list of slots stored in an arena.
/// Each group is a *tag* slot owning the value, followed by one *item* slot
/// per key. A hash table indexes every key to its item slot, and every slot
/// carries a sparse order label so that positions can be compared without
/// walking the list.
///
/// The generic parameters are:
/// - `K`: key type, an externally owned identity such as an IR value handle.
///   Must implement `Hash + Eq` for most operations.
/// - `V`: value type, owned by the map and shared by all keys of a group.
/// - `S`: hash builder type, defaults to the standard hasher.
///
/// The map is move-only: it does not implement `Clone`. Moving it is
/// fine since positions are slot indices rather than addresses.
///
/// # Examples
///
/// ```
/// use ordered_multi_map::ordered_multi_map::OrderedMultiMap;
///
/// let mut map = OrderedMultiMap::new();
/// map.insert(map.begin(), "a", 10);
/// map.insert(map.end(), "b", 30);
/// map.insert_left(map.find(&"b"), "c");
///
/// // "c" joined the group of "a".
/// let pairs: Vec<_> = map.iter().collect();
/// assert_eq!(pairs, [(&"a", &10), (&"c", &10), (&"b", &30)]);
/// assert_eq!(map.group_count(), 2);
/// ```
pub struct OrderedMultiMap<K, V, S = RandomState> {
    head: Option<Ptr>,
    tail: Option<Ptr>,
    nodes: Arena<K, V>,
    table: HashTable<Ptr>,
    groups: usize,
    hasher: S,
}

impl<K: core::fmt::Debug, V: core::fmt::Debug, S> core::fmt::Debug for OrderedMultiMap<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Group<'a, K, V> {
            keys: Vec<&'a K>,
            value: &'a V,
        }

        let groups: Vec<_> = self
            .groups()
            .map(|(value, keys)| Group {
                keys: keys.collect(),
                value,
            })
            .collect();

        f.debug_struct("OrderedMultiMap")
            .field("len", &self.len())
            .field("groups", &groups)
            .finish()
    }
}

impl<K, V, S: Default> Default for OrderedMultiMap<K, V, S> {
    fn default() -> Self {
        OrderedMultiMap::with_capacity_and_hasher(0, S::default())
    }
}

impl<K, V> OrderedMultiMap<K, V> {
    /// Creates a new, empty map.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let map: OrderedMultiMap<u32, i32> = OrderedMultiMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.len(), 0);
    /// assert_eq!(map.begin(), map.end());
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new map able to hold at least `capacity` keys, each in its
    /// own group, without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::default())
    }
}

impl<K, V, S> OrderedMultiMap<K, V, S> {
    /// Creates a new map with the specified capacity and hasher.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hashbrown::DefaultHashBuilder as RandomState;
    /// use ordered_multi_map::ordered_multi_map::OrderedMultiMap;
    ///
    /// let hasher = RandomState::default();
    /// let mut map: OrderedMultiMap<&str, i32, _> =
    ///     OrderedMultiMap::with_capacity_and_hasher(10, hasher);
    /// map.push_back("key", 42);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        OrderedMultiMap {
            head: None,
            tail: None,
            // One tag plus one item per single-key group.
            nodes: Arena::with_capacity(capacity.saturating_mul(2)),
            table: HashTable::with_capacity(capacity),
            groups: 0,
            hasher,
        }
    }

    /// Returns the number of keys in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no keys.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns the number of groups, i.e. of distinct values, in the map.
    pub fn group_count(&self) -> usize {
        self.groups
    }

    /// Removes every key and drops every value.
    pub fn clear(&mut self) {
        self.head = None;
        self.tail = None;
        self.nodes.clear();
        self.table.clear();
        self.groups = 0;
    }

    /// Position of the first pair, or [`end`](Self::end) if the map is
    /// empty.
    pub fn begin(&self) -> Position {
        self.item_at_or_after(self.head)
    }

    /// The past-the-end position.
    pub fn end(&self) -> Position {
        Position::end()
    }

    /// Position of the pair following `pos`.
    ///
    /// Returns `None` when `pos` is already the end.
    pub fn next_position(&self, pos: Position) -> Option<Position> {
        let slot = pos.slot?;
        Some(Position {
            slot: self.nodes.next_item(slot),
        })
    }

    /// Position of the pair preceding `pos`. The pair before the end is the
    /// last pair of the map.
    ///
    /// Returns `None` when `pos` is the first pair or the map is empty.
    pub fn prev_position(&self, pos: Position) -> Option<Position> {
        let prev = match pos.slot {
            Some(slot) => self.nodes.prev_item(slot),
            None => self.tail,
        };
        prev.map(Position::item)
    }

    /// Position of the first pair of the group after the one containing
    /// `pos`, bypassing the remaining keys of the current group.
    ///
    /// Runs in time proportional to the size of the current group. Skipping
    /// from the end stays at the end.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.insert_group(map.end(), ["a", "b", "c"], 1);
    /// map.push_back("d", 2);
    ///
    /// assert_eq!(map.skip(map.find(&"b")), map.find(&"d"));
    /// assert_eq!(map.skip(map.find(&"d")), map.end());
    /// ```
    pub fn skip(&self, pos: Position) -> Position {
        match pos.slot {
            Some(slot) => self.item_at_or_after(self.group_end(slot)),
            None => pos,
        }
    }

    /// Position of the first pair of the group before the one containing
    /// `pos`. From the first group, returns the start of that group. From
    /// the end, returns the start of the last group.
    ///
    /// Runs in O(1) through the tag back-references.
    pub fn reverse_skip(&self, pos: Position) -> Position {
        let tag = match pos.slot {
            Some(slot) => {
                let tag = self.nodes[slot].tag();
                match self.nodes[tag].prev {
                    Some(prev_item) => self.nodes[prev_item].tag(),
                    None => tag,
                }
            }
            None => match self.tail {
                Some(last) => self.nodes[last].tag(),
                None => return pos,
            },
        };
        self.item_at_or_after(Some(tag))
    }

    /// Returns the pair at `pos`, or `None` for the end position.
    pub fn entry_at(&self, pos: Position) -> Option<(&K, &V)> {
        pos.slot.map(|slot| self.nodes.entry(slot))
    }

    /// Returns a mutable reference to the value of the group containing
    /// `pos`, or `None` for the end position.
    ///
    /// The value is shared: the change is visible through every key of the
    /// group.
    pub fn value_at_mut(&mut self, pos: Position) -> Option<&mut V> {
        let tag = self.nodes[pos.slot?].tag();
        Some(self.nodes[tag].value_mut())
    }

    /// Compares the order of two positions in O(1). The end position comes
    /// after every pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::cmp::Ordering;
    ///
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// let (b, _) = map.push_back("b", 2);
    /// let (a, _) = map.insert(map.begin(), "a", 1);
    ///
    /// assert_eq!(map.compare_positions(a, b), Ordering::Less);
    /// assert_eq!(map.compare_positions(b, map.end()), Ordering::Less);
    /// assert_eq!(map.compare_positions(b, b), Ordering::Equal);
    /// ```
    pub fn compare_positions(&self, a: Position, b: Position) -> Ordering {
        self.label(a).cmp(&self.label(b))
    }

    /// Returns a cursor resting at `pos`.
    pub fn cursor(&self, pos: Position) -> Cursor<'_, K, V, S> {
        Cursor { map: self, pos }
    }

    /// Returns a cursor resting at the first pair.
    pub fn begin_cursor(&self) -> Cursor<'_, K, V, S> {
        self.cursor(self.begin())
    }

    /// Returns an iterator over all `(key, value)` pairs in order. A value
    /// is yielded once for each key of its group.
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
    /// let pairs: Vec<_> = map.iter().collect();
    /// assert_eq!(pairs, [(&"a", &1), (&"b", &1), (&"c", &2)]);
    ///
    /// let reversed: Vec<_> = map.iter().rev().map(|(k, _)| *k).collect();
    /// assert_eq!(reversed, ["c", "b", "a"]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            front: self.begin().slot,
            back: self.tail,
            nodes: &self.nodes,
        }
    }

    /// Returns an iterator over the keys in order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values, one per key.
    ///
    /// Use [`groups`](Self::groups) to visit each value once.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns an iterator over the groups in order, yielding each value once
    /// together with an iterator over the keys sharing it.
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
    /// let groups: Vec<(Vec<&str>, i32)> = map
    ///     .groups()
    ///     .map(|(value, keys)| (keys.copied().collect(), *value))
    ///     .collect();
    /// assert_eq!(groups, [(vec!["a", "b"], 1), (vec!["c"], 2)]);
    /// ```
    pub fn groups(&self) -> Groups<'_, K, V> {
        Groups {
            next_tag: self.head,
            nodes: &self.nodes,
        }
    }

    /// Writes the slot list to the `trace` log, tags and items alike, with
    /// their order labels.
    pub fn dump(&self)
    where
        K: core::fmt::Debug,
        V: core::fmt::Debug,
    {
        let mut next = self.head;
        while let Some(ptr) = next {
            let slot = &self.nodes[ptr];
            match &slot.kind {
                SlotKind::Tag { value } => {
                    tracing::trace!(?ptr, order = slot.order, ?value, "tag slot");
                }
                SlotKind::Item { key, tag, .. } => {
                    tracing::trace!(?ptr, order = slot.order, ?key, ?tag, "item slot");
                }
            }
            next = slot.next;
        }
        tracing::trace!(keys = self.len(), groups = self.groups, "end of slot list");
    }

    fn label(&self, pos: Position) -> u64 {
        pos.slot.map_or(order::END, |slot| self.nodes[slot].order)
    }

    /// Turns a slot into a position, moving from a tag to its first item.
    fn item_at_or_after(&self, slot: Option<Ptr>) -> Position {
        match slot {
            Some(ptr) if self.nodes[ptr].is_tag() => Position {
                slot: self.nodes[ptr].next,
            },
            slot => Position { slot },
        }
    }

    /// The first slot after the group of `item`: the next tag, or `None` at
    /// the end of the list.
    fn group_end(&self, item: Ptr) -> Option<Ptr> {
        let mut next = self.nodes[item].next;
        while let Some(ptr) = next {
            if self.nodes[ptr].is_tag() {
                break;
            }
            next = self.nodes[ptr].next;
        }
        next
    }

    fn neighbor_labels(&self, before: Option<Ptr>) -> (Option<u64>, Option<u64>) {
        let prev = match before {
            Some(next) => self.nodes[next].prev,
            None => self.tail,
        };
        (
            prev.map(|ptr| self.nodes[ptr].order),
            before.map(|ptr| self.nodes[ptr].order),
        )
    }

    /// Allocates a slot and links it immediately before `before`, or at the
    /// tail when `before` is `None`.
    fn link_before(&mut self, before: Option<Ptr>, kind: SlotKind<K, V>) -> Ptr {
        let (low, high) = self.neighbor_labels(before);
        let order = match order::between(low, high) {
            Some(order) => order,
            None => {
                self.relabel();
                let (low, high) = self.neighbor_labels(before);
                order::between(low, high).unwrap_or_else(|| order::label_space_exhausted())
            }
        };

        let prev = match before {
            Some(next) => self.nodes[next].prev,
            None => self.tail,
        };
        let ptr = self.nodes.alloc(SlotData {
            prev,
            next: before,
            order,
            kind,
        });

        match prev {
            Some(prev) => self.nodes[prev].next = Some(ptr),
            None => self.head = Some(ptr),
        }
        match before {
            Some(next) => self.nodes[next].prev = Some(ptr),
            None => self.tail = Some(ptr),
        }

        ptr
    }

    fn unlink(&mut self, ptr: Ptr) -> SlotData<K, V> {
        let data = self.nodes.free(ptr);
        match data.prev {
            Some(prev) => self.nodes[prev].next = data.next,
            None => self.head = data.next,
        }
        match data.next {
            Some(next) => self.nodes[next].prev = data.prev,
            None => self.tail = data.prev,
        }
        data
    }

    /// Spreads the order labels evenly over the label space, centered on
    /// [`order::ORIGIN`].
    fn relabel(&mut self) {
        let slots = self.nodes.len();
        let spacing = order::spacing_for(slots);
        tracing::debug!(slots, spacing, "relabeling order index");

        let mut label = order::relabel_start(slots, spacing);
        let mut next = self.head;
        while let Some(ptr) = next {
            let slot = &mut self.nodes[ptr];
            slot.order = label;
            next = slot.next;
            label += spacing;
        }
    }

    /// Drops `slot` from the key index.
    fn unindex(&mut self, slot: Ptr) {
        let hash = self.nodes[slot].hash();
        if let Ok(entry) = self.table.find_entry(hash, |&ptr| ptr == slot) {
            entry.remove();
        }
    }

    /// Removes one item and, if it was the last one of its group, the
    /// group's tag. Returns the slot that followed the item and the value
    /// of the group if it was destroyed.
    fn erase_item(&mut self, slot: Ptr) -> (Option<Ptr>, Option<V>) {
        self.unindex(slot);
        let data = self.unlink(slot);
        let tag = data.tag();

        let emptied = match self.nodes[tag].next {
            Some(next) => self.nodes[next].is_tag(),
            None => true,
        };
        if !emptied {
            tracing::trace!(item = ?slot, ?tag, "erased item");
            return (data.next, None);
        }

        let value = self.unlink(tag).into_value();
        self.groups -= 1;
        tracing::trace!(item = ?slot, ?tag, "erased item and its empty group");
        (data.next, Some(value))
    }

    /// Removes a whole group, handing each key to `on_key` in order. Returns
    /// the slot that followed the group and the group's value.
    fn erase_group(&mut self, tag: Ptr, mut on_key: impl FnMut(K)) -> (Option<Ptr>, V) {
        let mut next = self.nodes[tag].next;
        while let Some(slot) = next {
            if self.nodes[slot].is_tag() {
                break;
            }
            self.unindex(slot);
            let data = self.unlink(slot);
            next = data.next;
            on_key(data.into_key());
        }

        let value = self.unlink(tag).into_value();
        self.groups -= 1;
        tracing::trace!(?tag, "erased group");
        (next, value)
    }

    /// Removes the pair at `pos` and returns the position of the pair that
    /// followed it. If the key was the last of its group, the group's value
    /// is dropped too. Erasing the end position does nothing.
    ///
    /// Positions of all other pairs stay valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.push_back("a", 1);
    /// map.push_back("b", 2);
    ///
    /// let next = map.erase_at(map.find(&"a"));
    /// assert_eq!(next, map.find(&"b"));
    /// assert_eq!(map.group_count(), 1);
    /// ```
    pub fn erase_at(&mut self, pos: Position) -> Position {
        let Some(slot) = pos.slot else {
            return pos;
        };
        let (next, _) = self.erase_item(slot);
        self.item_at_or_after(next)
    }

    /// Removes every key of the group containing `pos`, and its value.
    /// Returns the position of the first pair of the following group.
    /// Erasing the end position does nothing.
    pub fn erase_all_at(&mut self, pos: Position) -> Position {
        let Some(slot) = pos.slot else {
            return pos;
        };
        let tag = self.nodes[slot].tag();
        let (next, _) = self.erase_group(tag, drop);
        self.item_at_or_after(next)
    }

    /// Erases the pairs in `[from, to)` one by one and returns `to`.
    ///
    /// `to` must not come before `from`; otherwise every pair from `from` to
    /// the end is erased.
    pub fn erase_range(&mut self, from: Position, to: Position) -> Position {
        let mut pos = from;
        while pos != to && !pos.is_end() {
            pos = self.erase_at(pos);
        }
        pos
    }

    /// Shrinks the capacity of the key index as much as possible.
    pub fn shrink_to_fit(&mut self) {
        let nodes = &self.nodes;
        self.table.shrink_to_fit(|&ptr| nodes[ptr].hash());
        self.nodes.shrink_to_fit();
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> OrderedMultiMap<K, V, S> {
    fn find_hashed(&self, hash: u64, key: &K) -> Option<Ptr> {
        self.table
            .find(hash, |&ptr| self.nodes[ptr].key() == key)
            .copied()
    }

    fn find_slot(&self, key: &K) -> Option<Ptr> {
        self.find_hashed(self.hasher.hash_one(key), key)
    }

    fn index_item(&mut self, hash: u64, item: Ptr) {
        let nodes = &self.nodes;
        self.table
            .insert_unique(hash, item, |&ptr| nodes[ptr].hash());
    }

    /// Where a new group requested at `pos` is linked: before the group
    /// starting at `pos`, or after the group `pos` lies inside of.
    fn group_boundary(&self, pos: Position) -> Option<Ptr> {
        let slot = pos.slot?;
        let tag = self.nodes[slot].tag();
        if self.nodes[slot].prev == Some(tag) {
            Some(tag)
        } else {
            self.group_end(slot)
        }
    }

    fn check_fresh(&self, hash: u64, key: &K) -> Result<(), MultiMapError> {
        match self.find_hashed(hash, key) {
            Some(existing) => Err(MultiMapError::DuplicateKey {
                existing: Position::item(existing),
            }),
            None => Ok(()),
        }
    }

    fn outcome(result: Result<Position, MultiMapError>, pos: Position) -> (Position, bool) {
        match result {
            Ok(inserted) => (inserted, true),
            Err(MultiMapError::DuplicateKey { existing }) => (existing, false),
            Err(_) => (pos, false),
        }
    }

    /// Returns the position of `key`, or the end position if it is absent.
    /// O(1).
    pub fn find(&self, key: &K) -> Position {
        Position {
            slot: self.find_slot(key),
        }
    }

    /// Returns a cursor resting at `key`, or at the end if it is absent.
    pub fn cursor_at_key(&self, key: &K) -> Cursor<'_, K, V, S> {
        self.cursor(self.find(key))
    }

    /// Returns 1 if the map contains `key`, 0 otherwise.
    pub fn count(&self, key: &K) -> usize {
        usize::from(self.contains_key(key))
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_slot(key).is_some()
    }

    /// Returns a reference to the value of `key`'s group.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.push_back(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_slot(key)
            .map(|slot| self.nodes[self.nodes[slot].tag()].value())
    }

    /// Returns a mutable reference to the value of `key`'s group. The change
    /// is visible through every key of the group.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let tag = self.nodes[self.find_slot(key)?].tag();
        Some(self.nodes[tag].value_mut())
    }

    /// Returns a copy of the value of `key`'s group, or `V::default()` if the
    /// key is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.push_back("a", 7);
    /// assert_eq!(map.lookup(&"a"), 7);
    /// assert_eq!(map.lookup(&"b"), 0);
    /// ```
    pub fn lookup(&self, key: &K) -> V
    where
        V: Clone + Default,
    {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Appends to `out` every key of `key`'s group, `key` included, in group
    /// order.
    ///
    /// Returns `false`, leaving `out` untouched, if `key` is absent.
    pub fn associated_keys(&self, key: &K, out: &mut Vec<K>) -> bool
    where
        K: Clone,
    {
        match self.group_keys(key) {
            Some(keys) => {
                out.extend(keys.cloned());
                true
            }
            None => false,
        }
    }

    /// Returns an iterator over every key of `key`'s group, `key` included,
    /// in group order. `None` if `key` is absent.
    pub fn group_keys(&self, key: &K) -> Option<GroupKeys<'_, K, V>> {
        let tag = self.nodes[self.find_slot(key)?].tag();
        Some(GroupKeys {
            next: self.nodes[tag].next,
            nodes: &self.nodes,
        })
    }

    /// Inserts `key` as a brand-new group owning `value`, placed before
    /// `pos`.
    ///
    /// Groups are never split: if `pos` is the first pair of a group the new
    /// group goes before that group; if `pos` lies inside a group it goes
    /// after it.
    ///
    /// # Errors
    ///
    /// [`MultiMapError::DuplicateKey`] if `key` is already present. The map
    /// is left unchanged and `value` is dropped.
    pub fn try_insert(&mut self, pos: Position, key: K, value: V) -> Result<Position, MultiMapError> {
        let hash = self.hasher.hash_one(&key);
        self.check_fresh(hash, &key)?;

        let before = self.group_boundary(pos);
        let tag = self.link_before(before, SlotKind::Tag { value });
        let item = self.link_before(before, SlotKind::Item { key, hash, tag });
        self.index_item(hash, item);
        self.groups += 1;

        tracing::trace!(?tag, ?item, "inserted group");
        Ok(Position::item(item))
    }

    /// Inserts `key` as a brand-new group owning `value`, placed before
    /// `pos`. See [`try_insert`](Self::try_insert) for the placement rules.
    ///
    /// Returns the position of the new pair and `true`, or, if `key` was
    /// already present, its existing position and `false`. Existing keys
    /// are never overwritten.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// let (first, inserted) = map.insert(map.begin(), "a", 10);
    /// assert!(inserted);
    ///
    /// let (again, inserted) = map.insert(map.begin(), "a", 20);
    /// assert!(!inserted);
    /// assert_eq!(again, first);
    /// assert_eq!(map[&"a"], 10);
    /// ```
    pub fn insert(&mut self, pos: Position, key: K, value: V) -> (Position, bool) {
        Self::outcome(self.try_insert(pos, key, value), pos)
    }

    /// Inserts `key` as a new group at the end of the map.
    pub fn push_back(&mut self, key: K, value: V) -> (Position, bool) {
        self.insert(Position::end(), key, value)
    }

    /// Attaches `key` immediately before `pos`, joining the group of the
    /// pair on its left.
    ///
    /// # Errors
    ///
    /// - [`MultiMapError::InvalidPosition`] if `pos` is the first pair or
    ///   the map is empty, since there is no group on the left.
    /// - [`MultiMapError::DuplicateKey`] if `key` is already present.
    pub fn try_insert_left(&mut self, pos: Position, key: K) -> Result<Position, MultiMapError> {
        let left = match pos.slot {
            Some(slot) => self.nodes[slot].prev,
            None => self.tail,
        };
        let (before, left_item) = match left {
            Some(left) if self.nodes[left].is_tag() => match self.nodes[left].prev {
                Some(item) => (Some(left), item),
                None => return Err(MultiMapError::InvalidPosition),
            },
            Some(left) => (pos.slot, left),
            None => return Err(MultiMapError::InvalidPosition),
        };

        let hash = self.hasher.hash_one(&key);
        self.check_fresh(hash, &key)?;

        let tag = self.nodes[left_item].tag();
        let item = self.link_before(before, SlotKind::Item { key, hash, tag });
        self.index_item(hash, item);

        tracing::trace!(?tag, ?item, "attached key on the left");
        Ok(Position::item(item))
    }

    /// Attaches `key` immediately before `pos`, joining the group of the
    /// pair on its left. Fails at the first pair and for keys already
    /// present; see [`try_insert_left`](Self::try_insert_left).
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.push_back("a", 10);
    /// map.push_back("b", 30);
    ///
    /// let (c, inserted) = map.insert_left(map.find(&"b"), "c");
    /// assert!(inserted);
    /// assert_eq!(map.entry_at(c), Some((&"c", &10)));
    ///
    /// let (_, inserted) = map.insert_left(map.begin(), "d");
    /// assert!(!inserted);
    /// ```
    pub fn insert_left(&mut self, pos: Position, key: K) -> (Position, bool) {
        Self::outcome(self.try_insert_left(pos, key), pos)
    }

    /// Attaches `key` immediately after the pair at `pos`, joining `pos`'s
    /// group.
    ///
    /// # Errors
    ///
    /// - [`MultiMapError::InvalidPosition`] if `pos` is the end position.
    /// - [`MultiMapError::DuplicateKey`] if `key` is already present.
    pub fn try_insert_right(&mut self, pos: Position, key: K) -> Result<Position, MultiMapError> {
        let Some(slot) = pos.slot else {
            return Err(MultiMapError::InvalidPosition);
        };

        let hash = self.hasher.hash_one(&key);
        self.check_fresh(hash, &key)?;

        let tag = self.nodes[slot].tag();
        let before = self.nodes[slot].next;
        let item = self.link_before(before, SlotKind::Item { key, hash, tag });
        self.index_item(hash, item);

        tracing::trace!(?tag, ?item, "attached key on the right");
        Ok(Position::item(item))
    }

    /// Attaches `key` immediately after the pair at `pos`, joining `pos`'s
    /// group. Fails at the end position and for keys already present; see
    /// [`try_insert_right`](Self::try_insert_right).
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.push_back("a", 10);
    /// map.push_back("b", 30);
    ///
    /// map.insert_right(map.find(&"a"), "c");
    /// let keys: Vec<_> = map.keys().copied().collect();
    /// assert_eq!(keys, ["a", "c", "b"]);
    /// assert_eq!(map[&"c"], 10);
    /// ```
    pub fn insert_right(&mut self, pos: Position, key: K) -> (Position, bool) {
        Self::outcome(self.try_insert_right(pos, key), pos)
    }

    /// Inserts each pair as its own group, in input order, starting at `pos`.
    /// Keys already present are skipped.
    ///
    /// Returns the number of groups created.
    pub fn insert_pairs<I>(&mut self, pos: Position, pairs: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut pos = pos;
        let mut inserted = 0;
        for (key, value) in pairs {
            if let Ok(item) = self.try_insert(pos, key, value) {
                inserted += 1;
                pos = self.skip(item);
            }
        }
        inserted
    }

    /// Builds one group at `pos` holding every key of `keys`, in order, and
    /// owning `value`. Keys already present are skipped.
    ///
    /// Returns the position of the group's first key, or `None` (dropping
    /// `value`) if no key was new.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.push_back("z", 0);
    /// let start = map.insert_group(map.begin(), ["x", "y", "z"], 5);
    ///
    /// assert_eq!(start, Some(map.find(&"x")));
    /// let pairs: Vec<_> = map.iter().collect();
    /// assert_eq!(pairs, [(&"x", &5), (&"y", &5), (&"z", &0)]);
    /// ```
    pub fn insert_group<I>(&mut self, pos: Position, keys: I, value: V) -> Option<Position>
    where
        I: IntoIterator<Item = K>,
    {
        let mut keys = keys.into_iter();
        let first = loop {
            let key = keys.next()?;
            if !self.contains_key(&key) {
                break key;
            }
        };

        let start = self.try_insert(pos, first, value).ok()?;
        // Attaching on the left of the following pair appends to the new
        // group and leaves `after` in place.
        let after = self.skip(start);
        for key in keys {
            let _ = self.try_insert_left(after, key);
        }
        Some(start)
    }

    /// Removes `key` from its group. If it was the group's last key, the
    /// group's value is dropped too.
    ///
    /// # Errors
    ///
    /// [`MultiMapError::NotFound`] if `key` is absent.
    pub fn try_erase(&mut self, key: &K) -> Result<(), MultiMapError> {
        let slot = self.find_slot(key).ok_or(MultiMapError::NotFound)?;
        self.erase_item(slot);
        Ok(())
    }

    /// Removes `key` from its group, dropping the value with the last key.
    /// Returns `false`, without touching the map, if `key` is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.insert_group(map.end(), ["a", "b"], 1);
    ///
    /// assert!(map.erase(&"a"));
    /// assert_eq!(map.group_count(), 1);
    /// assert!(map.erase(&"b"));
    /// assert_eq!(map.group_count(), 0);
    /// assert!(!map.erase(&"b"));
    /// ```
    pub fn erase(&mut self, key: &K) -> bool {
        self.try_erase(key).is_ok()
    }

    /// Removes every key of `key`'s group and the group's value.
    ///
    /// # Errors
    ///
    /// [`MultiMapError::NotFound`] if `key` is absent.
    pub fn try_erase_all(&mut self, key: &K) -> Result<(), MultiMapError> {
        let slot = self.find_slot(key).ok_or(MultiMapError::NotFound)?;
        let tag = self.nodes[slot].tag();
        self.erase_group(tag, drop);
        Ok(())
    }

    /// Removes every key of `key`'s group and the group's value. Returns
    /// `false` if `key` is absent.
    pub fn erase_all(&mut self, key: &K) -> bool {
        self.try_erase_all(key).is_ok()
    }

    /// Removes `key`'s whole group and hands back its keys, in group order,
    /// together with its value.
    ///
    /// # Examples
    ///
    /// ```
    /// use ordered_multi_map::OrderedMultiMap;
    ///
    /// let mut map = OrderedMultiMap::new();
    /// map.insert_group(map.end(), ["a", "b"], 1);
    ///
    /// assert_eq!(map.remove_group(&"b"), Some((vec!["a", "b"], 1)));
    /// assert!(map.is_empty());
    /// ```
    pub fn remove_group(&mut self, key: &K) -> Option<(Vec<K>, V)> {
        let slot = self.find_slot(key)?;
        let tag = self.nodes[slot].tag();
        let mut keys = Vec::new();
        let (_, value) = self.erase_group(tag, |key| keys.push(key));
        Some((keys, value))
    }
}

impl<K, V, S> Index<&K> for OrderedMultiMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is not in the map.
    fn index(&self, key: &K) -> &Self::Output {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S> IndexMut<&K> for OrderedMultiMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// # Panics
    ///
    /// Panics if `key` is not in the map.
    fn index_mut(&mut self, key: &K) -> &mut Self::Output {
        self.get_mut(key).expect("no entry found for key")
    }
}

impl<K, V, S> FromIterator<(K, V)> for OrderedMultiMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMultiMap::default();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for OrderedMultiMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Appends each pair as its own group. Keys already present are skipped.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.insert_pairs(Position::end(), iter);
    }
}

impl<K, V, S> IntoIterator for OrderedMultiMap<K, V, S> {
    type IntoIter = IntoIter<K, V>;
    type Item = (Vec<K>, V);

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            next_tag: self.head,
            nodes: self.nodes,
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a OrderedMultiMap<K, V, S> {
    type IntoIter = Iter<'a, K, V>;
    type Item = (&'a K, &'a V);

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
