//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::mem;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A type that reserves one of its bit patterns as a null state, making it
/// eligible for storage inside of a [`PackedOption`].
///
/// The reserved value must never be produced by normal construction of the
/// type, it exists purely so "no value" can be represented without any
/// extra storage.
///
/// ```
/// # use citrine::utility::*;
/// struct NonZero(i32);
///
/// impl Packable for NonZero {
///     fn reserved() -> Self {
///         NonZero(0)
///     }
///
///     fn is_reserved(&self) -> bool {
///         self.0 == 0
///     }
/// }
///
/// let opt = PackedOption::some(NonZero(15));
///
/// assert!(opt.is_some());
/// ```
pub trait Packable {
    /// Returns the reserved null state of the type.
    fn reserved() -> Self;

    /// Checks whether `self` is the reserved null state.
    fn is_reserved(&self) -> bool;
}

/// An [`Option`]-like container that stores the "none" flag inside the
/// value itself, so `PackedOption<T>` is exactly as large as `T`.
///
/// The IR layout stores millions of these as intrusive list links, keeping
/// them at key-size matters there.
///
/// ```
/// # use citrine::utility::*;
/// # #[derive(Debug, Eq, PartialEq)]
/// # struct NonZero(i32);
/// # impl Packable for NonZero {
/// #    fn reserved() -> Self {
/// #        NonZero(0)
/// #    }
/// #    fn is_reserved(&self) -> bool {
/// #        self.0 == 0
/// #     }
/// # }
/// let opt = PackedOption::some(NonZero(15));
///
/// assert_eq!(opt.expand(), Some(NonZero(15)));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PackedOption<T: Packable>(T);

impl<T: Packable> PackedOption<T> {
    /// Creates a `None` instance of the packed option.
    ///
    /// ```
    /// # use citrine::utility::*;
    /// # #[derive(Debug, Eq, PartialEq)]
    /// # struct NonZero(i32);
    /// # impl Packable for NonZero {
    /// #    fn reserved() -> Self { NonZero(0) }
    /// #    fn is_reserved(&self) -> bool { self.0 == 0 }
    /// # }
    /// let opt = PackedOption::<NonZero>::none();
    ///
    /// assert!(opt.is_none());
    /// ```
    #[inline]
    pub fn none() -> Self {
        Self(T::reserved())
    }

    /// Creates a `Some` instance holding `value`. `value` must not be the
    /// reserved null state.
    #[inline]
    pub fn some(value: T) -> Self {
        debug_assert!(!value.is_reserved(), "packed a reserved value");

        Self(value)
    }

    /// Returns `true` if no value is present.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0.is_reserved()
    }

    /// Returns `true` if a value is present.
    #[inline]
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Expands into a real [`Option`] that can be pattern-matched on.
    #[inline]
    pub fn expand(self) -> Option<T> {
        if self.is_none() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Maps the contained value, yielding a plain [`Option`].
    #[inline]
    pub fn map<U, F>(self, f: F) -> Option<U>
    where
        F: FnOnce(T) -> U,
    {
        self.expand().map(f)
    }

    /// Unwraps the contained value, panicking on `None`.
    #[inline]
    #[track_caller]
    pub fn unwrap(self) -> T {
        self.expand().unwrap()
    }

    /// Unwraps the contained value with a message, panicking on `None`.
    #[inline]
    #[track_caller]
    pub fn expect(self, msg: &str) -> T {
        self.expand().expect(msg)
    }

    /// Takes the value out, leaving `None` in its place.
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        mem::replace(self, Self::none()).expand()
    }

    /// Replaces the contents with `value`, returning whatever was
    /// there before.
    #[inline]
    pub fn replace(&mut self, value: T) -> Option<T> {
        mem::replace(self, Self::some(value)).expand()
    }
}

impl<T: Packable> Default for PackedOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Packable> From<Option<T>> for PackedOption<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            None => Self::none(),
            Some(value) => Self::some(value),
        }
    }
}

impl<T: Packable> From<PackedOption<T>> for Option<T> {
    fn from(opt: PackedOption<T>) -> Self {
        opt.expand()
    }
}

impl<T> Debug for PackedOption<T>
where
    T: Packable + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.is_none() {
            write!(f, "None")
        } else {
            write!(f, "Some({:?})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    struct Nibble(u8);

    impl Packable for Nibble {
        fn reserved() -> Self {
            Nibble(u8::MAX)
        }

        fn is_reserved(&self) -> bool {
            self.0 == u8::MAX
        }
    }

    #[test]
    fn observers() {
        let none = PackedOption::<Nibble>::none();
        let some = PackedOption::some(Nibble(3));

        assert!(none.is_none());
        assert!(!none.is_some());
        assert!(some.is_some());
        assert_eq!(some.expand(), Some(Nibble(3)));
        assert_eq!(none.expand(), None);
    }

    #[test]
    fn take_leaves_none() {
        let mut opt = PackedOption::some(Nibble(7));

        assert_eq!(opt.take(), Some(Nibble(7)));
        assert!(opt.is_none());
        assert_eq!(opt.take(), None);
    }

    #[test]
    fn same_size_as_value() {
        use static_assertions::assert_eq_size;

        assert_eq_size!(PackedOption<Nibble>, Nibble);
    }
}
