//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::utility::{PackedOption, Str};
use static_assertions::assert_eq_size;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Holds the "debug info" for an instruction, i.e. where it came from.
///
/// Instructions built by a frontend carry the line/column of the construct
/// they were compiled from, so diagnostics from the verifier and from the
/// rewrite passes can point back at real source. Instructions synthesized
/// out of thin air (by a rewrite, or by a test) use [`DebugInfo::fake`].
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DebugInfo {
    name: PackedOption<Str>,
    col: u32,
    line: u32,
    file: PackedOption<Str>,
}

impl DebugInfo {
    /// Creates a new [`DebugInfo`] object that has all the fields
    /// filled in (except the name).
    pub fn new(line: u32, col: u32, file: Str) -> Self {
        Self {
            name: PackedOption::none(),
            line,
            col,
            file: PackedOption::some(file),
        }
    }

    /// Creates a new [`DebugInfo`] object that has all the fields
    /// filled in, including the name.
    ///
    /// This is intended for IR where a value should have a meaningful
    /// name that is maintained across transformations.
    pub fn with_name(name: Str, line: u32, col: u32, file: Str) -> Self {
        Self {
            name: PackedOption::some(name),
            line,
            col,
            file: PackedOption::some(file),
        }
    }

    /// Creates a [`DebugInfo`] that doesn't refer to any real source location.
    ///
    /// Synthesized instructions get this, the printer falls back to
    /// sequence numbers for their names.
    pub fn fake() -> Self {
        Self {
            name: PackedOption::none(),
            line: 0,
            col: 0,
            file: PackedOption::none(),
        }
    }

    /// Returns the line in the original file that the entity came from.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Returns the column in the original file that the entity came from.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// A reference to the filename, if the entity came from a real file.
    ///
    /// This can be resolved into a real string by using the
    /// [`StringPool`](crate::utility::StringPool) associated with the
    /// module that this [`DebugInfo`] came from.
    pub fn file(&self) -> Option<Str> {
        self.file.expand()
    }

    /// A reference to a name for the entity's value, if one was given to a
    /// builder. Unnamed values are given sequence numbers when printed.
    ///
    /// This can be resolved into a real string by using the
    /// [`StringPool`](crate::utility::StringPool) associated with the
    /// module that this [`DebugInfo`] came from.
    pub fn name(&self) -> Option<Str> {
        self.name.expand()
    }
}

assert_eq_size!(DebugInfo, (usize, usize));
