//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A primary arena: a growable array that mints a typed key for every
/// value pushed into it.
///
/// Values are never removed, so every key handed out stays valid for the
/// life of the map. "Deleting" an IR entity therefore means unlinking it
/// from the structures that reference it, not reclaiming its slot; this is
/// what makes mutation during traversal safe.
///
/// ```
/// # use citrine::arena_key;
/// # use citrine::arena::*;
/// arena_key! { struct NodeRef; }
///
/// let mut map = ArenaMap::new();
/// let a: NodeRef = map.insert("a");
/// let b = map.insert("b");
///
/// assert_eq!(map[a], "a");
/// assert_eq!(map[b], "b");
/// assert_eq!(map.len(), 2);
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArenaMap<K: ArenaKey, V> {
    values: Vec<V>,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> ArenaMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            values: Vec::default(),
            _unused: PhantomData,
        }
    }

    /// Creates an empty map with space reserved for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            _unused: PhantomData,
        }
    }

    /// Pushes `value` into the arena and returns the key that now refers
    /// to it.
    pub fn insert(&mut self, value: V) -> K {
        let key = self.next_key();

        self.values.push(value);

        key
    }

    /// Returns the key that the *next* call to [`Self::insert`] will
    /// return.
    ///
    /// Entities that need to know their own key before they exist (a
    /// function storing the key it is registered under, for example) are
    /// built against this.
    pub fn next_key(&self) -> K {
        K::key_new(self.values.len())
    }

    /// Checks whether `key` refers to a value in this map.
    pub fn contains(&self, key: K) -> bool {
        key.key_index() < self.values.len()
    }

    /// Gets the value `key` refers to, if it is a valid key.
    pub fn get(&self, key: K) -> Option<&V> {
        self.values.get(key.key_index())
    }

    /// Gets the value `key` refers to mutably, if it is a valid key.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.values.get_mut(key.key_index())
    }

    /// Returns how many values the arena holds.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks whether the arena holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over every key in the map, in insertion order.
    ///
    /// The iterator does not borrow the map, so it can drive loops that
    /// mutate the values being iterated over:
    ///
    /// ```
    /// # use citrine::arena_key;
    /// # use citrine::arena::*;
    /// arena_key! { struct K; }
    /// let mut map = ArenaMap::<K, i32>::new();
    /// map.insert(1);
    /// map.insert(2);
    ///
    /// for k in map.keys() {
    ///     map[k] *= 10;
    /// }
    ///
    /// assert_eq!(map.iter().map(|(_, v)| *v).sum::<i32>(), 30);
    /// ```
    pub fn keys(&self) -> Keys<K> {
        Keys {
            range: 0..self.values.len(),
            _unused: PhantomData,
        }
    }

    /// Iterates over `(key, &value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }

    /// Iterates over `(key, &mut value)` pairs in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> + '_ {
        self.values
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }
}

impl<K: ArenaKey, V> Default for ArenaMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V> Index<K> for ArenaMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &Self::Output {
        self.get(key)
            .expect("tried to access invalid key on `ArenaMap`")
    }
}

impl<K: ArenaKey, V> IndexMut<K> for ArenaMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        self.get_mut(key)
            .expect("tried to access invalid key on `ArenaMap`")
    }
}

impl<K: ArenaKey, V: Debug> Debug for ArenaMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over the keys of an [`ArenaMap`], see [`ArenaMap::keys`].
#[derive(Clone)]
pub struct Keys<K: ArenaKey> {
    range: Range<usize>,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey> Iterator for Keys<K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.range.next().map(K::key_new)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<K: ArenaKey> DoubleEndedIterator for Keys<K> {
    fn next_back(&mut self) -> Option<K> {
        self.range.next_back().map(K::key_new)
    }
}

impl<K: ArenaKey> ExactSizeIterator for Keys<K> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena_key;

    arena_key! { struct E; }

    #[test]
    fn insert_get() {
        let mut map = ArenaMap::<E, i32>::new();
        let k1 = map.insert(10);
        let k2 = map.insert(20);

        assert_ne!(k1, k2);
        assert_eq!(map.get(k1), Some(&10));
        assert_eq!(map.get(k2), Some(&20));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn next_key_is_stable() {
        let mut map = ArenaMap::<E, &str>::new();
        let upcoming = map.next_key();
        let actual = map.insert("x");

        assert_eq!(upcoming, actual);
    }

    #[test]
    fn keys_do_not_borrow() {
        let mut map = ArenaMap::<E, i32>::new();
        map.insert(1);
        map.insert(2);
        map.insert(3);

        let mut seen = 0;

        for k in map.keys() {
            // mutating while iterating keys is the whole point
            map[k] += 1;
            seen += 1;
        }

        assert_eq!(seen, 3);
        assert_eq!(map.iter().map(|(_, v)| *v).collect::<Vec<_>>(), [2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "tried to access invalid key on `ArenaMap`")]
    fn bad_key_panics() {
        use crate::arena::ArenaKey;

        let map = ArenaMap::<E, i32>::new();
        let _ = map[E::key_new(0)];
    }
}
