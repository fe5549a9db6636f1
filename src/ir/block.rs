//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::dense_arena_key;
use crate::utility::Str;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// References a single basic block in the program.
    ///
    /// Must be resolved with a [`DataFlowGraph`](crate::ir::DataFlowGraph) into an actual
    /// [`BasicBlock`] object.
    pub struct Block;
}

/// Models a single basic block in a function within the IR.
///
/// A block is a linear sequence of instructions ending in a terminator,
/// with any `phi`s sitting at the front of the sequence. The sequence itself
/// lives in the function's [`Layout`](crate::ir::Layout), this object only
/// carries the per-block facts that aren't positional.
///
/// ```other
/// something:
///   %0 = iconst i32 42
///   %1 = imul i32 %x, %0
///   br next
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    name: Str,
}

impl BasicBlock {
    pub(in crate::ir) fn new(name: Str) -> Self {
        Self { name }
    }

    /// Gets the name of the block.
    pub fn name(&self) -> Str {
        self.name
    }
}
