use core::hash::BuildHasher;
use core::hash::Hash;

use crate::ordered_multi_map::OrderedMultiMap;

/// Receiver of key identity changes.
///
/// Keys of an [`OrderedMultiMap`] are identities owned elsewhere, such as
/// handles to values of a compiler's IR. Whoever rewrites or discards those
/// identities must report it synchronously through this trait so that data
/// keyed on them follows along:
///
/// - [`on_key_replaced`](Self::on_key_replaced) when every use of `old` is
///   rewritten to `new`;
/// - [`on_key_deleted`](Self::on_key_deleted) when a key stops existing.
///
/// Implemented by [`OrderedMultiMap`], by `&mut L` for any listener, and by
/// slices of listeners, which forward each notification to every element.
///
/// # Examples
///
/// ```
/// use ordered_multi_map::KeyIdentityListener;
/// use ordered_multi_map::OrderedMultiMap;
///
/// let mut map = OrderedMultiMap::new();
/// map.push_back("x", 20);
/// map.push_back("y", 99);
///
/// assert!(map.on_key_replaced(&"x", "y"));
/// assert_eq!(map.get(&"y"), Some(&20));
/// assert!(!map.contains_key(&"x"));
/// assert_eq!(map.group_count(), 1);
///
/// assert!(map.on_key_deleted(&"y"));
/// assert!(map.is_empty());
/// ```
pub trait KeyIdentityListener<K> {
    /// `old` has been replaced by `new` everywhere. Whatever `old` mapped to
    /// must now be addressed as `new`.
    ///
    /// Returns `true` if anything was migrated.
    fn on_key_replaced(&mut self, old: &K, new: K) -> bool;

    /// `key` no longer exists.
    ///
    /// Returns `true` if anything was dropped.
    fn on_key_deleted(&mut self, key: &K) -> bool;
}

impl<K, V, S> KeyIdentityListener<K> for OrderedMultiMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Drops the pair of `new`, if any, then moves `old` to `new` in place:
    /// same group, same position. `new`'s previous value is discarded with its
    /// group if `new` was its last key. Nothing happens if `old` is absent,
    /// besides `new` being erased.
    fn on_key_replaced(&mut self, old: &K, new: K) -> bool {
        if *old == new {
            return self.contains_key(old);
        }

        if self.erase(&new) {
            tracing::debug!("replacement key was already mapped, dropped its old pair");
        }

        let pos = self.find(old);
        if pos.is_end() {
            return false;
        }

        // `new` is absent now and `pos` is a pair, so attaching cannot fail.
        let (_, attached) = self.insert_right(pos, new);
        debug_assert!(attached);
        self.erase_at(pos);

        tracing::trace!(?pos, "migrated replaced key");
        true
    }

    /// Removes the pair of `key`, dropping the group's value only if `key`
    /// was its last key.
    fn on_key_deleted(&mut self, key: &K) -> bool {
        self.erase(key)
    }
}

impl<K, L> KeyIdentityListener<K> for &mut L
where
    L: KeyIdentityListener<K> + ?Sized,
{
    fn on_key_replaced(&mut self, old: &K, new: K) -> bool {
        (**self).on_key_replaced(old, new)
    }

    fn on_key_deleted(&mut self, key: &K) -> bool {
        (**self).on_key_deleted(key)
    }
}

impl<K, L> KeyIdentityListener<K> for [L]
where
    K: Clone,
    L: KeyIdentityListener<K>,
{
    fn on_key_replaced(&mut self, old: &K, new: K) -> bool {
        let mut changed = false;
        for listener in self.iter_mut() {
            changed |= listener.on_key_replaced(old, new.clone());
        }
        changed
    }

    fn on_key_deleted(&mut self, key: &K) -> bool {
        let mut changed = false;
        for listener in self.iter_mut() {
            changed |= listener.on_key_deleted(key);
        }
        changed
    }
}
