use alloc::vec::Vec;
use core::iter::FusedIterator;

use crate::Ptr;
use crate::arena::Arena;

/// An iterator over the `(key, value)` pairs of an [`OrderedMultiMap`].
///
/// This struct is created by the [`iter`] method on [`OrderedMultiMap`] and by
/// [`Cursor::iter`]. A value is yielded once per key of its group.
///
/// [`OrderedMultiMap`]: crate::ordered_multi_map::OrderedMultiMap
/// [`iter`]: crate::ordered_multi_map::OrderedMultiMap::iter
/// [`Cursor::iter`]: crate::ordered_multi_map::Cursor::iter
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    pub(crate) front: Option<Ptr>,
    pub(crate) back: Option<Ptr>,
    pub(crate) nodes: &'a Arena<K, V>,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            front: self.front,
            back: self.back,
            nodes: self.nodes,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let ptr = self.front?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = self.nodes.next_item(ptr);
        }

        Some(self.nodes.entry(ptr))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let ptr = self.back?;
        if self.back == self.front {
            self.back = None;
            self.front = None;
        } else {
            self.back = self.nodes.prev_item(ptr);
        }

        Some(self.nodes.entry(ptr))
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// An iterator over the keys of one group, in group order.
///
/// Created by [`OrderedMultiMap::group_keys`], [`Cursor::group_keys`] and
/// [`Groups`].
///
/// [`OrderedMultiMap::group_keys`]: crate::ordered_multi_map::OrderedMultiMap::group_keys
/// [`Cursor::group_keys`]: crate::ordered_multi_map::Cursor::group_keys
#[derive(Debug)]
pub struct GroupKeys<'a, K, V> {
    pub(crate) next: Option<Ptr>,
    pub(crate) nodes: &'a Arena<K, V>,
}

impl<K, V> Clone for GroupKeys<'_, K, V> {
    fn clone(&self) -> Self {
        GroupKeys {
            next: self.next,
            nodes: self.nodes,
        }
    }
}

impl<'a, K, V> Iterator for GroupKeys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = &self.nodes[self.next?];
        if slot.is_tag() {
            self.next = None;
            return None;
        }
        self.next = slot.next;
        Some(slot.key())
    }
}

impl<K, V> FusedIterator for GroupKeys<'_, K, V> {}

/// An iterator over the groups of an [`OrderedMultiMap`], yielding each value
/// once together with the keys that share it.
///
/// This struct is created by the [`groups`] method on [`OrderedMultiMap`].
///
/// [`OrderedMultiMap`]: crate::ordered_multi_map::OrderedMultiMap
/// [`groups`]: crate::ordered_multi_map::OrderedMultiMap::groups
#[derive(Debug)]
pub struct Groups<'a, K, V> {
    pub(crate) next_tag: Option<Ptr>,
    pub(crate) nodes: &'a Arena<K, V>,
}

impl<'a, K, V> Iterator for Groups<'a, K, V> {
    type Item = (&'a V, GroupKeys<'a, K, V>);

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.next_tag?;
        let first = self.nodes[tag].next;

        let mut next = first;
        while let Some(ptr) = next {
            if self.nodes[ptr].is_tag() {
                break;
            }
            next = self.nodes[ptr].next;
        }
        self.next_tag = next;

        let keys = GroupKeys {
            next: first,
            nodes: self.nodes,
        };
        Some((self.nodes[tag].value(), keys))
    }
}

impl<K, V> FusedIterator for Groups<'_, K, V> {}

/// An owning iterator over the groups of an [`OrderedMultiMap`].
///
/// This struct is created by the [`into_iter`] method on [`OrderedMultiMap`]
/// (provided by the [`IntoIterator`] trait). Each item is one group: its keys
/// in order, and the value they shared.
///
/// [`OrderedMultiMap`]: crate::ordered_multi_map::OrderedMultiMap
/// [`into_iter`]: IntoIterator::into_iter
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
/// for (keys, value) in map {
///     println!("{keys:?} -> {value}");
/// }
/// ```
#[derive(Debug)]
pub struct IntoIter<K, V> {
    pub(crate) next_tag: Option<Ptr>,
    pub(crate) nodes: Arena<K, V>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (Vec<K>, V);

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.next_tag?;
        let data = self.nodes.free(tag);

        let mut keys = Vec::new();
        let mut next = data.next;
        while let Some(ptr) = next {
            if self.nodes[ptr].is_tag() {
                break;
            }
            let item = self.nodes.free(ptr);
            next = item.next;
            keys.push(item.into_key());
        }
        self.next_tag = next;

        Some((keys, data.into_value()))
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::OrderedMultiMap as Map;

    fn sample() -> Map<u32, String> {
        let mut map = Map::new();
        map.insert_group(map.end(), [1, 2], "one".to_string());
        map.push_back(3, "three".to_string());
        map.insert_group(map.end(), [4, 5, 6], "four".to_string());
        map
    }

    #[test]
    fn test_iter_both_ends_meet() {
        let map = sample();
        let mut iter = map.iter();
        assert_eq!(iter.next().map(|(k, _)| *k), Some(1));
        assert_eq!(iter.next_back().map(|(k, _)| *k), Some(6));
        assert_eq!(iter.next_back().map(|(k, _)| *k), Some(5));
        assert_eq!(iter.next().map(|(k, _)| *k), Some(2));
        assert_eq!(iter.next().map(|(k, _)| *k), Some(3));
        assert_eq!(iter.next().map(|(k, _)| *k), Some(4));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);
    }

    #[test]
    fn test_iter_clone_is_independent() {
        let map = sample();
        let mut iter = map.iter();
        iter.next();
        let rest: Vec<_> = iter.clone().map(|(k, _)| *k).collect();
        assert_eq!(rest, [2, 3, 4, 5, 6]);
        assert_eq!(iter.count(), 5);
    }

    #[test]
    fn test_values_repeat_per_key() {
        let map = sample();
        let values: Vec<_> = map.values().map(String::as_str).collect();
        assert_eq!(values, ["one", "one", "three", "four", "four", "four"]);
    }

    #[test]
    fn test_groups() {
        let map = sample();
        let groups: Vec<(Vec<u32>, &str)> = map
            .groups()
            .map(|(value, keys)| (keys.copied().collect(), value.as_str()))
            .collect();
        assert_eq!(
            groups,
            [(vec![1, 2], "one"), (vec![3], "three"), (vec![4, 5, 6], "four")]
        );
    }

    #[test]
    fn test_into_iter_partial_then_drop() {
        let map = sample();
        let mut iter = map.into_iter();
        assert_eq!(iter.next(), Some((vec![1, 2], "one".to_string())));
        drop(iter);
    }

    #[test]
    fn test_into_iter_after_erasures() {
        let mut map = sample();
        map.erase(&1);
        map.erase_all(&3);
        map.erase(&6);
        let groups: Vec<_> = map.into_iter().collect();
        assert_eq!(
            groups,
            [(vec![2], "one".to_string()), (vec![4, 5], "four".to_string())]
        );
    }

    #[test]
    fn test_empty_iterators() {
        let map: Map<u32, String> = Map::new();
        assert_eq!(map.iter().next(), None);
        assert_eq!(map.iter().next_back(), None);
        assert_eq!(map.groups().count(), 0);
        assert_eq!(map.into_iter().next(), None);
    }
}
