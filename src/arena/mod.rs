//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Arena-style storage for IR entities.
//!
//! Every IR object (instruction, block, value, function) lives in an arena
//! owned by its enclosing structure and is referred to by a small, `Copy`,
//! type-safe key. Keys stay valid across unrelated insertions and across
//! layout changes, which is exactly the property graph rewrites need:
//! splitting a block or deleting an instruction never dangles a reference,
//! it only changes which keys are *meaningful*.
//!
//! [`ArenaMap`] is the primary owner (it hands out the keys),
//! [`SecondaryMap`] associates extra data with keys minted elsewhere.

mod key;
mod map;
mod secondary;

pub use key::*;
pub use map::*;
pub use secondary::*;
