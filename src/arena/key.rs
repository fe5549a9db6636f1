//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::Debug;
use std::hash::Hash;

/// A type that can act as a key for an arena.
///
/// Keys are thin wrappers around an index, the trait exists so containers
/// can mint and unpack them generically while user code still gets a
/// distinct type per entity kind (a `Block` is not an `Inst`).
///
/// Prefer generating implementations with [`arena_key!`](crate::arena_key)
/// or [`dense_arena_key!`](crate::dense_arena_key) over hand-writing them.
pub trait ArenaKey: Debug + Copy + Eq + PartialEq + Hash {
    /// Creates a key from a raw index. Only containers should call this.
    fn key_new(index: usize) -> Self;

    /// Unpacks the raw index that the key wraps.
    fn key_index(self) -> usize;
}

/// Generates new-type structs that implement [`ArenaKey`] with a
/// caller-chosen representation.
///
/// ```
/// # use citrine::arena_key;
/// # use citrine::arena::ArenaMap;
/// arena_key! {
///     /// Refers to a thing.
///     pub struct ThingRef(u32);
///
///     struct PrivateRef; // data type defaults to `usize`
/// }
///
/// let mut map = ArenaMap::<ThingRef, i32>::new();
/// let k = map.insert(42);
///
/// assert_eq!(map[k], 42);
/// ```
#[macro_export]
macro_rules! arena_key {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident($data:ty);

        $($rest:tt)*
    ) => {
        $(#[$outer])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        $vis struct $name($data);

        impl $crate::arena::ArenaKey for $name {
            #[inline]
            fn key_new(index: usize) -> Self {
                Self(index as $data)
            }

            #[inline]
            fn key_index(self) -> usize {
                self.0 as usize
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::write!(f, "{}({})", ::core::stringify!($name), self.0)
            }
        }

        $crate::arena_key!($($rest)*);
    };

    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident;

        $($rest:tt)*
    ) => {
        $crate::arena_key! {
            $(#[$outer])*
            $vis struct $name(usize);

            $($rest)*
        }
    };

    () => {}
}

/// Generates new-type structs that implement [`ArenaKey`] with a `u32`
/// representation, and implement [`Packable`](crate::utility::Packable)
/// with `u32::MAX` as the reserved state.
///
/// This is the key form used for the dense IR entities, it halves the size
/// of every stored reference relative to a `usize` key and makes the keys
/// usable inside [`PackedOption`](crate::utility::PackedOption)s (which is
/// how the layout's intrusive lists store their links).
///
/// ```
/// # use citrine::dense_arena_key;
/// # use citrine::arena::ArenaMap;
/// dense_arena_key! {
///     pub struct DenseRef;
/// }
///
/// let mut map = ArenaMap::<DenseRef, &str>::new();
/// let k = map.insert("dense");
///
/// assert_eq!(map[k], "dense");
/// ```
#[macro_export]
macro_rules! dense_arena_key {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident;

        $($rest:tt)*
    ) => {
        $crate::arena_key! { $(#[$outer])* $vis struct $name(u32); }

        impl $crate::utility::Packable for $name {
            #[inline]
            fn reserved() -> Self {
                Self(u32::MAX)
            }

            #[inline]
            fn is_reserved(&self) -> bool {
                self.0 == u32::MAX
            }
        }

        $crate::dense_arena_key!($($rest)*);
    };

    () => {}
}

#[cfg(test)]
mod tests {
    use crate::arena::*;
    use crate::utility::Packable;
    use static_assertions::assert_eq_size;

    #[test]
    fn key_roundtrip() {
        arena_key! { struct Key(u32); }

        let k = Key::key_new(31);

        assert_eq!(k.key_index(), 31);
        assert_eq!(format!("{k:?}"), "Key(31)");
    }

    #[test]
    fn default_data_is_usize() {
        arena_key! { struct Wide; }

        assert_eq_size!(Wide, usize);
    }

    #[test]
    fn dense_keys_are_u32_and_packable() {
        dense_arena_key! { struct Dense; }

        assert_eq_size!(Dense, u32);

        let mut map = ArenaMap::<Dense, i32>::new();
        let k1 = map.insert(15);
        let top = Dense::reserved();

        assert!(top.is_reserved());
        assert!(!k1.is_reserved());
    }
}
