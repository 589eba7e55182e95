use alloc::vec::Vec;
use core::ops::Index;
use core::ops::IndexMut;

use crate::Ptr;

#[cold]
#[inline(never)]
fn assert_free() -> ! {
    panic!("Attempted to access data of free slot");
}

#[cold]
#[inline(never)]
fn assert_item() -> ! {
    panic!("Attempted to access key data of a tag slot");
}

#[cold]
#[inline(never)]
fn assert_tag() -> ! {
    panic!("Attempted to access the value of an item slot");
}

/// What a live slot holds.
///
/// A tag owns the value of its group. An item holds one key and points back
/// at the tag of the group it belongs to.
#[derive(Debug, Clone)]
pub(crate) enum SlotKind<K, V> {
    Tag { value: V },
    Item { key: K, hash: u64, tag: Ptr },
}

#[derive(Debug, Clone)]
pub(crate) struct SlotData<K, V> {
    pub(crate) prev: Option<Ptr>,
    pub(crate) next: Option<Ptr>,
    pub(crate) order: u64,
    pub(crate) kind: SlotKind<K, V>,
}

impl<K, V> SlotData<K, V> {
    pub(crate) fn is_tag(&self) -> bool {
        matches!(self.kind, SlotKind::Tag { .. })
    }

    pub(crate) fn key(&self) -> &K {
        match &self.kind {
            SlotKind::Item { key, .. } => key,
            SlotKind::Tag { .. } => assert_item(),
        }
    }

    pub(crate) fn hash(&self) -> u64 {
        match self.kind {
            SlotKind::Item { hash, .. } => hash,
            SlotKind::Tag { .. } => assert_item(),
        }
    }

    /// Tag of the group this item belongs to.
    pub(crate) fn tag(&self) -> Ptr {
        match self.kind {
            SlotKind::Item { tag, .. } => tag,
            SlotKind::Tag { .. } => assert_item(),
        }
    }

    pub(crate) fn value(&self) -> &V {
        match &self.kind {
            SlotKind::Tag { value } => value,
            SlotKind::Item { .. } => assert_tag(),
        }
    }

    pub(crate) fn value_mut(&mut self) -> &mut V {
        match &mut self.kind {
            SlotKind::Tag { value } => value,
            SlotKind::Item { .. } => assert_tag(),
        }
    }

    pub(crate) fn into_key(self) -> K {
        match self.kind {
            SlotKind::Item { key, .. } => key,
            SlotKind::Tag { .. } => assert_item(),
        }
    }

    pub(crate) fn into_value(self) -> V {
        match self.kind {
            SlotKind::Tag { value } => value,
            SlotKind::Item { .. } => assert_tag(),
        }
    }
}

#[derive(Debug, Clone)]
enum DataOrFree<K, V> {
    Free { next_free: Option<Ptr> },
    Data(SlotData<K, V>),
}

/// Backing storage for every slot of the map.
///
/// Freed slots are chained into a free list and reused by later
/// allocations, so a `Ptr` stays stable for as long as its slot is live.
#[derive(Debug, Clone)]
pub(crate) struct Arena<K, V> {
    nodes: Vec<DataOrFree<K, V>>,
    free_head: Option<Ptr>,
    occupied: usize,
}

impl<K, V> Arena<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Arena {
            nodes: Vec::with_capacity(capacity),
            free_head: None,
            occupied: 0,
        }
    }

    /// Number of live slots, tags included.
    pub(crate) fn len(&self) -> usize {
        self.occupied
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.free_head = None;
        self.occupied = 0;
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        // Live slots cannot be compacted since positions handed out to callers
        // refer to them by index. Only trailing capacity can be released.
        self.nodes.shrink_to_fit();
    }

    pub(crate) fn alloc(&mut self, data: SlotData<K, V>) -> Ptr {
        self.occupied += 1;
        match self.free_head {
            Some(ptr) => {
                let old = core::mem::replace(
                    &mut self.nodes[ptr.unchecked_get()],
                    DataOrFree::Data(data),
                );
                self.free_head = match old {
                    DataOrFree::Free { next_free } => next_free,
                    DataOrFree::Data(_) => unreachable!("free list points at a live slot"),
                };
                ptr
            }
            None => {
                let ptr = Ptr::unchecked_from(self.nodes.len());
                self.nodes.push(DataOrFree::Data(data));
                ptr
            }
        }
    }

    pub(crate) fn is_occupied(&self, ptr: Ptr) -> bool {
        matches!(
            self.nodes.get(ptr.unchecked_get()),
            Some(DataOrFree::Data(_))
        )
    }

    pub(crate) fn free(&mut self, ptr: Ptr) -> SlotData<K, V> {
        assert!(self.is_occupied(ptr), "Pointer to free must be occupied");
        let old = core::mem::replace(
            &mut self.nodes[ptr.unchecked_get()],
            DataOrFree::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(ptr);
        self.occupied -= 1;

        match old {
            DataOrFree::Data(data) => data,
            DataOrFree::Free { .. } => assert_free(),
        }
    }

    /// The item following `ptr` in list order, stepping over a tag.
    pub(crate) fn next_item(&self, ptr: Ptr) -> Option<Ptr> {
        let next = self[ptr].next?;
        if self[next].is_tag() {
            self[next].next
        } else {
            Some(next)
        }
    }

    /// The item preceding `ptr` in list order, stepping over a tag.
    pub(crate) fn prev_item(&self, ptr: Ptr) -> Option<Ptr> {
        let prev = self[ptr].prev?;
        if self[prev].is_tag() {
            self[prev].prev
        } else {
            Some(prev)
        }
    }

    /// Key of an item together with the value of its group.
    pub(crate) fn entry(&self, item: Ptr) -> (&K, &V) {
        let data = &self[item];
        (data.key(), self[data.tag()].value())
    }
}

impl<K, V> Index<Ptr> for Arena<K, V> {
    type Output = SlotData<K, V>;

    fn index(&self, index: Ptr) -> &Self::Output {
        match &self.nodes[index.unchecked_get()] {
            DataOrFree::Data(data) => data,
            DataOrFree::Free { .. } => assert_free(),
        }
    }
}

impl<K, V> IndexMut<Ptr> for Arena<K, V> {
    fn index_mut(&mut self, index: Ptr) -> &mut Self::Output {
        match &mut self.nodes[index.unchecked_get()] {
            DataOrFree::Data(data) => data,
            DataOrFree::Free { .. } => assert_free(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::string::ToString;

    use super::*;

    fn tag(value: &str) -> SlotData<u32, String> {
        SlotData {
            prev: None,
            next: None,
            order: 0,
            kind: SlotKind::Tag {
                value: value.to_string(),
            },
        }
    }

    fn item(key: u32, tag: Ptr) -> SlotData<u32, String> {
        SlotData {
            prev: None,
            next: None,
            order: 0,
            kind: SlotKind::Item {
                key,
                hash: u64::from(key) * 31,
                tag,
            },
        }
    }

    #[test]
    fn test_ptr_debug() {
        let ptr = Ptr::unchecked_from(42);
        assert_eq!(format!("{:?}", ptr), "Ptr(42)");
        assert_eq!(ptr.unchecked_get(), 42);
    }

    #[test]
    fn test_ptr_equality() {
        assert_eq!(Ptr::unchecked_from(42), Ptr::unchecked_from(42));
        assert_ne!(Ptr::unchecked_from(42), Ptr::unchecked_from(43));
    }

    #[test]
    fn test_arena_new() {
        let arena: Arena<u32, String> = Arena::with_capacity(0);
        assert_eq!(arena.len(), 0);
        assert!(arena.free_head.is_none());
    }

    #[test]
    fn test_arena_with_capacity() {
        let arena: Arena<u32, String> = Arena::with_capacity(10);
        assert_eq!(arena.nodes.capacity(), 10);
    }

    #[test]
    fn test_arena_alloc_tag_and_item() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("ten"));
        let i = arena.alloc(item(7, t));

        assert_ne!(t, i);
        assert_eq!(arena.len(), 2);
        assert!(arena[t].is_tag());
        assert!(!arena[i].is_tag());
        assert_eq!(arena[t].value(), "ten");
        assert_eq!(*arena[i].key(), 7);
        assert_eq!(arena[i].hash(), 7 * 31);
        assert_eq!(arena[i].tag(), t);
    }

    #[test]
    fn test_arena_free_and_reuse() {
        let mut arena = Arena::with_capacity(0);
        let t1 = arena.alloc(tag("one"));
        let t2 = arena.alloc(tag("two"));

        let data = arena.free(t1);
        assert_eq!(data.value(), "one");
        assert!(!arena.is_occupied(t1));
        assert!(arena.is_occupied(t2));
        assert_eq!(arena.len(), 1);

        let t3 = arena.alloc(tag("three"));
        assert_eq!(t3, t1);
        assert_eq!(arena[t3].value(), "three");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_arena_free_list_is_lifo() {
        let mut arena = Arena::with_capacity(0);
        let a = arena.alloc(tag("a"));
        let b = arena.alloc(tag("b"));
        let c = arena.alloc(tag("c"));
        arena.free(a);
        arena.free(c);

        assert_eq!(arena.alloc(tag("d")), c);
        assert_eq!(arena.alloc(tag("e")), a);
        assert_eq!(arena.alloc(tag("f")), Ptr::unchecked_from(3));
        assert!(arena.is_occupied(b));
    }

    #[test]
    fn test_arena_value_mut() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("hello"));
        *arena[t].value_mut() = "world".to_string();
        assert_eq!(arena[t].value(), "world");
    }

    #[test]
    fn test_arena_clear() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("one"));
        arena.alloc(item(1, t));
        arena.clear();

        assert_eq!(arena.len(), 0);
        assert_eq!(arena.nodes.len(), 0);
        assert!(arena.free_head.is_none());
    }

    #[test]
    fn test_is_occupied_out_of_range() {
        let arena: Arena<u32, String> = Arena::with_capacity(0);
        assert!(!arena.is_occupied(Ptr::unchecked_from(5)));
    }

    #[test]
    #[should_panic(expected = "free slot")]
    fn test_arena_index_unoccupied_ptr() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("one"));
        arena.free(t);
        let _ = &arena[t];
    }

    #[test]
    #[should_panic(expected = "must be occupied")]
    fn test_arena_double_free() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("one"));
        arena.free(t);
        arena.free(t);
    }

    #[test]
    #[should_panic(expected = "tag slot")]
    fn test_key_of_tag_panics() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("one"));
        let _ = arena[t].key();
    }

    #[test]
    #[should_panic(expected = "item slot")]
    fn test_value_of_item_panics() {
        let mut arena = Arena::with_capacity(0);
        let t = arena.alloc(tag("one"));
        let i = arena.alloc(item(1, t));
        let _ = arena[i].value();
    }
}
