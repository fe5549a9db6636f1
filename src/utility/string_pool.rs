//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::utility::Packable;
use ahash::AHashMap;
use std::fmt::{Formatter, Result as FmtResult};
use std::ops::Index;
use std::rc::Rc;

#[cfg(feature = "enable-serde")]
use serde::{de::SeqAccess, de::Visitor, Deserialize, Deserializer, Serialize, Serializer};

/// A compact reference to a string inside of a [`StringPool`].
///
/// Names are everywhere in the IR (blocks, debug info), and storing a
/// 4-byte handle instead of a `String` keeps entity payloads small. A
/// `Str` is only meaningful together with the pool that produced it.
///
/// ```
/// # use citrine::utility::*;
/// let mut pool = StringPool::new();
/// let s = pool.insert("entry");
///
/// assert_eq!(&pool[s], "entry");
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Str(u32);

impl Packable for Str {
    fn reserved() -> Self {
        Self(u32::MAX)
    }

    fn is_reserved(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// An order-preserving, de-duplicating string interner.
///
/// Inserting the same string twice yields the same [`Str`], so handle
/// equality is string equality for handles from one pool.
#[derive(Debug, Clone)]
pub struct StringPool {
    // `strings` owns insertion order (a `Str` is an index into it), and
    // `refs` maps string contents back to that index for de-duplication.
    // the `Rc` lets one heap allocation serve both sides.
    strings: Vec<Rc<str>>,
    refs: AHashMap<Rc<str>, Str>,
}

impl StringPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            strings: Vec::default(),
            refs: AHashMap::default(),
        }
    }

    fn with_strings(strings: &[&str]) -> Self {
        let mut instance = Self::new();

        // `strings` is in insertion order, so handles that were serialized
        // alongside the pool stay valid after this
        for string in strings {
            instance.insert(string);
        }

        instance
    }

    /// Interns `string` and returns its handle. If the pool already
    /// contains an equal string, the existing handle is returned.
    ///
    /// ```
    /// # use citrine::utility::*;
    /// let mut pool = StringPool::new();
    /// let s1 = pool.insert("merge");
    /// let s2 = pool.insert("merge");
    ///
    /// assert_eq!(s1, s2);
    /// ```
    pub fn insert(&mut self, string: &str) -> Str {
        if let Some(s) = self.refs.get(string) {
            return *s;
        }

        let handle = Str(self.strings.len() as u32);
        let owned: Rc<str> = Rc::from(string);

        self.strings.push(Rc::clone(&owned));
        self.refs.insert(owned, handle);

        handle
    }

    /// Resolves a handle back into its string, if the handle came from
    /// this pool.
    pub fn get(&self, index: Str) -> Option<&str> {
        self.strings.get(index.0 as usize).map(|rc| rc.as_ref())
    }

    /// Returns how many distinct strings the pool holds.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Checks whether the pool holds no strings at all.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Str> for StringPool {
    type Output = str;

    fn index(&self, index: Str) -> &Self::Output {
        self.strings[index.0 as usize].as_ref()
    }
}

#[cfg(feature = "enable-serde")]
impl Serialize for StringPool {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // serialized as a plain sequence of strings. order matters, any
        // handle serialized elsewhere relies on it
        serializer.collect_seq(self.strings.iter().map(|rc| rc.as_ref()))
    }
}

#[cfg(feature = "enable-serde")]
struct StringPoolVisitor;

#[cfg(feature = "enable-serde")]
impl<'de> Visitor<'de> for StringPoolVisitor {
    type Value = StringPool;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "a sequence of `str` values")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let size = seq.size_hint().unwrap_or(16);
        let mut values = Vec::with_capacity(size);

        while let Some(value) = seq.next_element()? {
            values.push(value);
        }

        Ok(StringPool::with_strings(&values))
    }
}

#[cfg(feature = "enable-serde")]
impl<'de> Deserialize<'de> for StringPool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(StringPoolVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_resolve() {
        let mut pool = StringPool::new();
        let a = pool.insert("entry");
        let b = pool.insert("rest");

        assert_ne!(a, b);
        assert_eq!(&pool[a], "entry");
        assert_eq!(&pool[b], "rest");
        assert_eq!(pool.get(b), Some("rest"));
    }

    #[test]
    fn deduplicates() {
        let mut pool = StringPool::new();
        let a = pool.insert("mod");
        let b = pool.insert("mod");

        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }
}
