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
use smallbitvec::SmallBitVec;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::iter;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::{Index, IndexMut};

#[cfg(feature = "enable-serde")]
use serde::{
    de::MapAccess, de::Visitor, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer,
};

/// A dense side-table associating extra data with keys minted by a primary
/// [`ArenaMap`](crate::arena::ArenaMap).
///
/// Storage is a flat array indexed directly by the key, with a bitvector
/// recording which slots actually hold a value. That keeps lookups at one
/// bounds check and one bit test, the right shape for per-entity data like
/// "next instruction in block" or "cached immediate dominator" where most
/// keys end up mapped.
///
/// ```
/// # use citrine::arena_key;
/// # use citrine::arena::*;
/// arena_key! { struct Player; }
///
/// let mut players = ArenaMap::new();
/// let p1: Player = players.insert("John");
/// let p2 = players.insert("Bob");
///
/// let mut health = SecondaryMap::new();
/// health.insert(p1, 200);
///
/// assert_eq!(health.get(p1), Some(&200));
/// assert_eq!(health.get(p2), None);
/// ```
pub struct SecondaryMap<K: ArenaKey, V> {
    slots: Vec<MaybeUninit<V>>,
    present: SmallBitVec,
    len: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> SecondaryMap<K, V> {
    /// Creates an empty map.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: Vec::default(),
            present: SmallBitVec::default(),
            len: 0,
            _unused: PhantomData,
        }
    }

    /// Checks whether a value has been inserted for `key`.
    pub fn contains(&self, key: K) -> bool {
        self.is_present(key.key_index())
    }

    /// Maps `key -> value`, growing the table if `key` is past the end.
    ///
    /// Returns the value previously mapped to `key`, if there was one.
    ///
    /// ```
    /// # use citrine::arena_key;
    /// # use citrine::arena::*;
    /// arena_key! { struct Key; }
    /// let mut primary = ArenaMap::new();
    /// let k: Key = primary.insert(());
    /// let mut map = SecondaryMap::new();
    ///
    /// assert_eq!(map.insert(k, 16), None);
    /// assert_eq!(map.insert(k, 13), Some(16));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let idx = key.key_index();

        if idx >= self.slots.len() {
            self.grow_to(idx + 1);
        }

        if self.is_present(idx) {
            // slot is live, swap the value out so it drops normally
            let slot = unsafe { self.slots[idx].assume_init_mut() };

            Some(std::mem::replace(slot, value))
        } else {
            self.slots[idx] = MaybeUninit::new(value);
            self.present.set(idx, true);
            self.len += 1;

            None
        }
    }

    /// Gets the value mapped to `key`, if one was inserted.
    pub fn get(&self, key: K) -> Option<&V> {
        self.contains(key)
            .then(|| unsafe { self.slots[key.key_index()].assume_init_ref() })
    }

    /// Gets the value mapped to `key` mutably, if one was inserted.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.contains(key)
            .then(|| unsafe { self.slots[key.key_index()].assume_init_mut() })
    }

    /// Removes and returns the value mapped to `key`, if one was inserted.
    ///
    /// ```
    /// # use citrine::arena_key;
    /// # use citrine::arena::*;
    /// arena_key! { struct Key; }
    /// let mut primary = ArenaMap::new();
    /// let k: Key = primary.insert(());
    /// let mut map = SecondaryMap::new();
    /// map.insert(k, 13);
    ///
    /// assert_eq!(map.remove(k), Some(13));
    /// assert_eq!(map.remove(k), None);
    /// ```
    pub fn remove(&mut self, key: K) -> Option<V> {
        if !self.contains(key) {
            return None;
        }

        let idx = key.key_index();
        let slot = std::mem::replace(&mut self.slots[idx], MaybeUninit::uninit());

        self.present.set(idx, false);
        self.len -= 1;

        Some(unsafe { slot.assume_init() })
    }

    /// Returns how many keys currently have values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether no keys have values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the `(key, &value)` pairs that are present, in key
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            self.is_present(i)
                .then(|| (K::key_new(i), unsafe { slot.assume_init_ref() }))
        })
    }

    fn is_present(&self, index: usize) -> bool {
        // `present` and `slots` grow in lockstep, a desync means UB on reads
        debug_assert_eq!(self.present.len(), self.slots.len());

        self.present.get(index) == Some(true)
    }

    fn grow_to(&mut self, cap: usize) {
        let extra = cap - self.slots.len();

        self.slots
            .extend(iter::repeat_with(MaybeUninit::uninit).take(extra));
        self.present.extend(iter::repeat(false).take(extra));
    }
}

impl<K: ArenaKey, V> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V> Drop for SecondaryMap<K, V> {
    fn drop(&mut self) {
        if std::mem::needs_drop::<V>() {
            for i in 0..self.slots.len() {
                if self.present.get(i) == Some(true) {
                    unsafe { self.slots[i].assume_init_drop() };
                }
            }
        }
    }
}

impl<K: ArenaKey, V: Clone> Clone for SecondaryMap<K, V> {
    fn clone(&self) -> Self {
        let mut map = Self::new();

        for (k, v) in self.iter() {
            map.insert(k, v.clone());
        }

        map
    }
}

impl<K: ArenaKey, V: PartialEq> PartialEq for SecondaryMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        // `(key, value)` pairs have to match, trailing empty slots don't count
        self.iter().eq(other.iter())
    }
}

impl<K: ArenaKey, V: Eq> Eq for SecondaryMap<K, V> {}

impl<K: ArenaKey, V> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &Self::Output {
        self.get(key)
            .expect("tried to access invalid key on `SecondaryMap`")
    }
}

impl<K: ArenaKey, V> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        self.get_mut(key)
            .expect("tried to access invalid key on `SecondaryMap`")
    }
}

impl<K: ArenaKey, V: Debug> Debug for SecondaryMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(feature = "enable-serde")]
impl<K: ArenaKey, V> Serialize for SecondaryMap<K, V>
where
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // the presence bits carry the sparse structure, so only the live
        // values themselves need to go over the wire
        let bits: Vec<bool> = self.present.iter().collect();
        let values: Vec<&V> = self.iter().map(|(_, value)| value).collect();

        let mut state = serializer.serialize_map(Some(2))?;

        state.serialize_entry("present", &bits)?;
        state.serialize_entry("slots", &values)?;

        state.end()
    }
}

#[cfg(feature = "enable-serde")]
struct SecondaryMapVisitor<K: ArenaKey, V>(PhantomData<fn() -> (K, V)>);

#[cfg(feature = "enable-serde")]
impl<'de, K: ArenaKey, V> Visitor<'de> for SecondaryMapVisitor<K, V>
where
    V: Deserialize<'de>,
{
    type Value = SecondaryMap<K, V>;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(
            formatter,
            "a map with a `present` sequence of `bool`s and a `slots` sequence of values"
        )
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        use serde::de;

        let bits: Vec<bool> = match map.next_entry::<String, _>()? {
            Some((field, bits)) if field == "present" => bits,
            _ => return Err(de::Error::missing_field("present")),
        };

        let values: Vec<V> = match map.next_entry::<String, _>()? {
            Some((field, values)) if field == "slots" => values,
            _ => return Err(de::Error::missing_field("slots")),
        };

        let present = SmallBitVec::from_iter(bits);
        let len = values.len();
        let mut slots = Vec::new();

        slots.resize_with(present.len(), MaybeUninit::uninit);

        let mut values = values.into_iter();

        for (i, live) in present.iter().enumerate() {
            if live {
                slots[i] = match values.next() {
                    Some(value) => MaybeUninit::new(value),
                    None => {
                        return Err(de::Error::custom(
                            "`present` must have exactly as many set bits as `slots` has values",
                        ))
                    }
                };
            }
        }

        if values.next().is_some() {
            return Err(de::Error::custom(
                "`present` must have exactly as many set bits as `slots` has values",
            ));
        }

        Ok(SecondaryMap {
            slots,
            present,
            len,
            _unused: PhantomData,
        })
    }
}

#[cfg(feature = "enable-serde")]
impl<'de, K: ArenaKey, V> Deserialize<'de> for SecondaryMap<K, V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(SecondaryMapVisitor(PhantomData))
    }
}
