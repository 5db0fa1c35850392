//! First-seen grouping index shared by every filtering stage.
//!
//! # Overview
//!
//! Each stage groups candidates by a key (size, prefix digest, full
//! digest) and only passes on keys that turn out to have two or more
//! members. The stage cannot know a key is shared until its second member
//! shows up, so the first member is held back in a [`GroupIndex`] and
//! released retroactively.
//!
//! Two promotion policies exist:
//!
//! - [`Promotion::ForwardBoth`]: on the second member, release the held
//!   first member and the new one (in that order), then leave a sentinel so
//!   a third member is released alone and the first is never sent twice.
//! - [`Promotion::ForwardNewOnly`]: the first member stays in the index for
//!   good as the representative of its key. Every later member is paired
//!   with it via [`Partnered::pair_with`] and released alone. A key with N
//!   members therefore releases N-1 items, all paired with the same
//!   representative.
//!
//! The index itself is not synchronized; stages that share one across
//! workers wrap it in a mutex and hold the lock only around
//! [`GroupIndex::admit`].
//!
//! # Example
//!
//! ```
//! use dupreclaim::duplicates::{Admission, FileCandidate, GroupIndex, Promotion};
//! use std::path::PathBuf;
//!
//! let mut index = GroupIndex::new(Promotion::ForwardBoth);
//! let a = FileCandidate::new(PathBuf::from("/a"), 10);
//! let b = FileCandidate::new(PathBuf::from("/b"), 10);
//!
//! assert!(matches!(index.admit(10u64, a), Admission::Held));
//! match index.admit(10u64, b) {
//!     Admission::Forward(items) => assert_eq!(items.len(), 2),
//!     Admission::Held => unreachable!(),
//! }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

/// What to release when a key gains its second and later members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Release the held first member together with the second, then each
    /// later member alone.
    ForwardBoth,
    /// Keep the first member as representative; release each later member
    /// paired with it.
    ForwardNewOnly,
}

/// Items that can record which representative they duplicate.
pub trait Partnered {
    /// Record `representative` as the retained partner of `self`.
    fn pair_with(&mut self, representative: &Self);
}

/// Result of admitting one item.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// First member of its key; the index keeps it.
    Held,
    /// Items to send downstream, in discovery order.
    Forward(Vec<T>),
}

#[derive(Debug)]
enum Slot<T> {
    /// Seen once, held back.
    Pending(T),
    /// Representative that has been paired at least once (new-only policy).
    Shared(T),
    /// First member already released (forward-both policy).
    Forwarded,
}

/// Mapping from grouping key to the first-seen member of that key.
#[derive(Debug)]
pub struct GroupIndex<K, T> {
    policy: Promotion,
    slots: HashMap<K, Slot<T>>,
    shared_keys: usize,
}

impl<K, T> GroupIndex<K, T>
where
    K: Eq + Hash,
    T: Partnered,
{
    /// Create an empty index with the given policy.
    #[must_use]
    pub fn new(policy: Promotion) -> Self {
        Self {
            policy,
            slots: HashMap::new(),
            shared_keys: 0,
        }
    }

    /// The promotion policy of this index.
    #[must_use]
    pub fn policy(&self) -> Promotion {
        self.policy
    }

    /// Admit `item` under `key`.
    pub fn admit(&mut self, key: K, mut item: T) -> Admission<T> {
        let slot = match self.slots.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Pending(item));
                return Admission::Held;
            }
            Entry::Occupied(occupied) => occupied.into_mut(),
        };

        match (self.policy, std::mem::replace(slot, Slot::Forwarded)) {
            (Promotion::ForwardBoth, Slot::Pending(first)) => {
                self.shared_keys += 1;
                Admission::Forward(vec![first, item])
            }
            (Promotion::ForwardBoth, _) => Admission::Forward(vec![item]),
            (Promotion::ForwardNewOnly, Slot::Pending(representative)) => {
                self.shared_keys += 1;
                item.pair_with(&representative);
                *slot = Slot::Shared(representative);
                Admission::Forward(vec![item])
            }
            (Promotion::ForwardNewOnly, Slot::Shared(representative)) => {
                item.pair_with(&representative);
                *slot = Slot::Shared(representative);
                Admission::Forward(vec![item])
            }
            // ForwardNewOnly never leaves a Forwarded slot behind
            (Promotion::ForwardNewOnly, Slot::Forwarded) => Admission::Forward(vec![item]),
        }
    }

    /// Number of distinct keys seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no key has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of keys that gained a second member.
    #[must_use]
    pub fn shared_keys(&self) -> usize {
        self.shared_keys
    }

    /// Number of keys whose only member is still held back.
    #[must_use]
    pub fn unique_keys(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Pending(_)))
            .count()
    }

    /// Borrow the member held for `key`, if the index still holds one.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn representative(&self, key: &K) -> Option<&T> {
        match self.slots.get(key) {
            Some(Slot::Pending(item) | Slot::Shared(item)) => Some(item),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: u32,
        partner: Option<u32>,
    }

    impl Item {
        fn new(id: u32) -> Self {
            Self { id, partner: None }
        }
    }

    impl Partnered for Item {
        fn pair_with(&mut self, representative: &Self) {
            self.partner = Some(representative.id);
        }
    }

    fn ids(admission: Admission<Item>) -> Vec<u32> {
        match admission {
            Admission::Held => Vec::new(),
            Admission::Forward(items) => items.into_iter().map(|i| i.id).collect(),
        }
    }

    #[test]
    fn test_forward_both_releases_first_once() {
        let mut index = GroupIndex::new(Promotion::ForwardBoth);

        assert_eq!(index.admit("k", Item::new(1)), Admission::Held);
        assert_eq!(ids(index.admit("k", Item::new(2))), vec![1, 2]);
        assert_eq!(ids(index.admit("k", Item::new(3))), vec![3]);
        assert_eq!(ids(index.admit("k", Item::new(4))), vec![4]);

        assert_eq!(index.shared_keys(), 1);
        assert_eq!(index.unique_keys(), 0);
        assert!(index.representative(&"k").is_none());
    }

    #[test]
    fn test_forward_both_keeps_keys_apart() {
        let mut index = GroupIndex::new(Promotion::ForwardBoth);

        assert_eq!(index.admit(1u64, Item::new(1)), Admission::Held);
        assert_eq!(index.admit(2u64, Item::new(2)), Admission::Held);
        assert_eq!(ids(index.admit(2u64, Item::new(3))), vec![2, 3]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.unique_keys(), 1);
        assert_eq!(index.representative(&1u64).map(|i| i.id), Some(1));
    }

    #[test]
    fn test_forward_both_does_not_pair() {
        let mut index = GroupIndex::new(Promotion::ForwardBoth);
        index.admit(0u8, Item::new(1));

        if let Admission::Forward(items) = index.admit(0u8, Item::new(2)) {
            assert!(items.iter().all(|i| i.partner.is_none()));
        } else {
            panic!("expected forward");
        }
    }

    #[test]
    fn test_forward_new_only_pairs_with_first() {
        let mut index = GroupIndex::new(Promotion::ForwardNewOnly);

        assert_eq!(index.admit("d", Item::new(1)), Admission::Held);

        for id in 2..=4 {
            match index.admit("d", Item::new(id)) {
                Admission::Forward(items) => {
                    assert_eq!(items.len(), 1);
                    assert_eq!(items[0].id, id);
                    assert_eq!(items[0].partner, Some(1));
                }
                Admission::Held => panic!("later members must be forwarded"),
            }
        }

        assert_eq!(index.shared_keys(), 1);
        assert_eq!(index.representative(&"d").map(|i| i.id), Some(1));
    }

    #[test]
    fn test_empty_index() {
        let index: GroupIndex<u64, Item> = GroupIndex::new(Promotion::ForwardNewOnly);
        assert!(index.is_empty());
        assert_eq!(index.policy(), Promotion::ForwardNewOnly);
        assert_eq!(index.shared_keys(), 0);
    }
}
