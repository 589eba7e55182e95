#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]

mod arena;
pub mod error;
mod order;
pub mod ordered_multi_map;

extern crate alloc;

use core::num::NonZeroU32;

#[cfg(feature = "std")]
type RandomState = std::hash::RandomState;
#[cfg(not(feature = "std"))]
type RandomState = hashbrown::DefaultHashBuilder;

/// An ordered map from many keys to one shared value per group, using the
/// default hasher.
///
/// For custom hashers, use [`ordered_multi_map::OrderedMultiMap`] directly.
///
/// # Examples
///
/// ```
/// use ordered_multi_map::OrderedMultiMap;
///
/// let mut map = OrderedMultiMap::new();
/// let (a, _) = map.push_back("a", 10);
/// map.push_back("b", 30);
/// map.insert_right(a, "a.cast");
///
/// let entries: Vec<_> = map.iter().collect();
/// assert_eq!(entries, [(&"a", &10), (&"a.cast", &10), (&"b", &30)]);
/// ```
pub type OrderedMultiMap<K, V> = crate::ordered_multi_map::OrderedMultiMap<K, V, RandomState>;

pub use error::MultiMapError;
pub use ordered_multi_map::Cursor;
pub use ordered_multi_map::GroupKeys;
pub use ordered_multi_map::Groups;
pub use ordered_multi_map::IntoIter;
pub use ordered_multi_map::Iter;
pub use ordered_multi_map::KeyIdentityListener;
pub use ordered_multi_map::Position;

/// Index of a slot in the map's arena.
///
/// Handles are **non-generational**: once a slot is freed its index may be
/// handed out again for an unrelated slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub(crate) struct Ptr(NonZeroU32);

impl core::fmt::Debug for Ptr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Ptr({})", self.0.get() - 1)
    }
}

impl Ptr {
    pub(crate) fn unchecked_from(index: usize) -> Self {
        debug_assert!(
            index < u32::MAX as usize,
            "Index too large to fit in Ptr: {index}"
        );
        Ptr(NonZeroU32::MIN.saturating_add(index as u32))
    }

    pub(crate) fn unchecked_get(self) -> usize {
        self.0.get() as usize - 1
    }
}
