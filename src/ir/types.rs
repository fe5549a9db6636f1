//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;
use std::fmt;

/// Models a boolean type in the IR.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Bool(());

/// Models a pointer type in the IR.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Ptr(());

/// Models the `iN` class of fundamental types.
///
/// Integers are in the form `iN`, such that $N \in \\{8, 16, 32, 64\\}$. Other
/// bit widths are currently unsupported by the library.
///
/// ```
/// # use citrine::ir::*;
/// let t1 = Int::i8();
/// assert_eq!(t1.width(), 8);
/// assert_eq!(t1.mask(), 0xFF);
/// assert_eq!(t1.sign_bit(), 0b1000_0000);
///
/// let t2 = Int::new(8).unwrap();
/// assert_eq!(t1, t2);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Int {
    width: u32,
}

macro_rules! int_const_shorthand {
    ($n:tt, $lower:ident) => {
        #[doc = concat!("Shorthand for creating an integer of width `", stringify!($n), "`.")]
        #[doc = concat!("Exactly equivalent to `Int::new(", stringify!($n), ").unwrap()`.")]
        #[doc = ""]
        #[doc = "```"]
        #[doc = "# use citrine::ir::Int;"]
        #[doc = concat!("let t1 = Int::i", stringify!($n), "();")]
        #[doc = concat!("let t2 = Int::new(", stringify!($n), ").unwrap();")]
        #[doc = ""]
        #[doc = "assert_eq!(t1, t2);"]
        #[doc = "```"]
        pub const fn $lower() -> Self {
            Self::of_width_unchecked($n)
        }
    };
}

impl Int {
    #[inline]
    const fn of_width_unchecked(bit_width: u32) -> Self {
        Self { width: bit_width }
    }

    /// Creates an `Int` with a given width, if the width is supported.
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let ty = Int::new(32); // ty => i32
    ///
    /// assert_eq!(ty.map(|i| i.width()), Some(32));
    /// assert_eq!(Int::new(13), None);
    /// ```
    #[inline]
    pub fn new(bit_width: u32) -> Option<Self> {
        match bit_width {
            8 => Some(Self::i8()),
            16 => Some(Self::i16()),
            32 => Some(Self::i32()),
            64 => Some(Self::i64()),
            _ => None,
        }
    }

    int_const_shorthand!(8, i8);
    int_const_shorthand!(16, i16);
    int_const_shorthand!(32, i32);
    int_const_shorthand!(64, i64);

    /// Gets the width of the integer, in bits.
    #[inline]
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Returns a mask with the sign bit (MSB in 2's complement) set for
    /// an integer of `self.width()` width.
    ///
    /// ```
    /// # use citrine::ir::Int;
    /// let t1 = Int::i32();
    /// let t2 = Int::i8();
    ///
    /// assert_eq!(t1.sign_bit(), 0x80000000);
    /// assert_eq!(t2.sign_bit(), 0b1000_0000);
    /// ```
    #[inline]
    pub const fn sign_bit(self) -> u64 {
        1u64 << (self.width - 1)
    }

    /// Returns a mask with every usable bit in the type set.
    ///
    /// ```
    /// # use citrine::ir::Int;
    /// let t1 = Int::i64();
    /// let t2 = Int::i16();
    ///
    /// assert_eq!(t1.mask(), 0xFFFFFFFFFFFFFFFF);
    /// assert_eq!(t2.mask(), 0b1111_1111_1111_1111);
    /// ```
    #[inline]
    pub const fn mask(self) -> u64 {
        !0u64 >> (64 - self.width)
    }
}

/// A reference to a type. Copyable, compact, and lightweight.
///
/// Unlike a full compiler IR there are no aggregate types here, every type
/// is fundamental and therefore carries all of its own information. Memory
/// is untyped and addressed through `ptr`s, the shape of an access comes
/// from the `load`/`store` instruction performing it.
///
/// ```
/// # use citrine::ir::*;
/// let t1 = Type::bool(); // models `bool`
/// let t2 = Type::ptr(); // models `ptr`
/// assert_ne!(t1, t2);
/// ```
#[repr(u32)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// A `bool` in the IR.
    Bool(Bool),
    /// A `ptr` in the IR.
    Ptr(Ptr),
    /// An `iN` in the IR.
    Int(Int),
}

// the discriminant packs into the padding next to `Int`'s width, keeping
// every type reference at a single word
assert_eq_size!(Type, u64);

macro_rules! type_int_shorthand {
    ($n:tt, $lower:ident) => {
        #[doc = concat!("Shorthand for `Type::int(", stringify!($n), ")`.")]
        pub const fn $lower() -> Self {
            Self::Int(Int::of_width_unchecked($n))
        }
    };
}

impl Type {
    /// Creates a boolean type (the `bool` type in the IR).
    pub const fn bool() -> Self {
        Self::Bool(Bool(()))
    }

    /// Creates a pointer type (the `ptr` type in the IR).
    pub const fn ptr() -> Self {
        Self::Ptr(Ptr(()))
    }

    /// Creates an integer type (the `iN` types in the IR) with a given
    /// width. Given `width` is $N$, $N \in \\{8, 16, 32, 64\\}$ must hold.
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let t1 = Type::int(32);
    /// let t2 = Type::int(64);
    /// assert_ne!(t1, t2);
    /// ```
    pub fn int(width: u32) -> Self {
        let inner = Int::new(width).unwrap_or_else(|| panic!("unsupported integer width {width}"));

        Self::Int(inner)
    }

    type_int_shorthand!(8, i8);
    type_int_shorthand!(16, i16);
    type_int_shorthand!(32, i32);
    type_int_shorthand!(64, i64);

    /// Checks if the type is a [`Bool`].
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let t1 = Type::bool();
    /// assert_eq!(t1.is_bool(), true);
    /// ```
    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Checks if the type is a [`Ptr`].
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let t1 = Type::ptr();
    /// assert_eq!(t1.is_ptr(), true);
    /// ```
    pub fn is_ptr(&self) -> bool {
        matches!(self, Self::Ptr(_))
    }

    /// Checks if the type is an [`Int`].
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let t1 = Type::int(32);
    /// assert_eq!(t1.is_int(), true);
    /// ```
    pub fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Checks if the type is an [`Int`] of a given width.
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let t1 = Type::int(64);
    /// assert_eq!(t1.is_int_of_width(64), true);
    /// assert_eq!(t1.is_int_of_width(32), false);
    /// ```
    pub fn is_int_of_width(&self, width: u32) -> bool {
        match self {
            Self::Int(i) => i.width() == width,
            _ => false,
        }
    }

    /// Extracts the inner [`Int`] if the type is an integer type.
    ///
    /// ```
    /// # use citrine::ir::*;
    /// let t1 = Type::int(16);
    /// assert_eq!(t1.as_int(), Some(Int::i16()));
    /// assert_eq!(Type::ptr().as_int(), None);
    /// ```
    pub fn as_int(self) -> Option<Int> {
        match self {
            Self::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Extracts the inner [`Int`], panicking if the type is not an integer.
    pub fn unwrap_int(self) -> Int {
        match self {
            Self::Int(i) => i,
            _ => panic!("tried to unwrap non-integer type as `Int`"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(_) => write!(f, "bool"),
            Self::Ptr(_) => write!(f, "ptr"),
            Self::Int(i) => write!(f, "i{}", i.width()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widths() {
        for width in [8u32, 16, 32, 64] {
            let ty = Int::new(width).unwrap();

            assert_eq!(ty.width(), width);
            assert_eq!(ty.mask().count_ones(), width);
            assert_eq!(ty.sign_bit(), 1u64 << (width - 1));
        }

        assert_eq!(Int::new(7), None);
        assert_eq!(Int::new(128), None);
    }

    #[test]
    fn shorthands_agree() {
        assert_eq!(Type::i32(), Type::int(32));
        assert_eq!(Type::i64(), Type::int(64));
        assert_eq!(Type::i32().unwrap_int(), Int::i32());
    }

    #[test]
    fn display() {
        assert_eq!(Type::bool().to_string(), "bool");
        assert_eq!(Type::ptr().to_string(), "ptr");
        assert_eq!(Type::i8().to_string(), "i8");
        assert_eq!(Type::i64().to_string(), "i64");
    }
}
