//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Small utility APIs shared by the rest of the crate.
//!
//! Nothing in here is CIR-specific, this is the general catch-all for the
//! storage helpers that the IR and pass layers are built on.

mod hash;
mod packed_option;
mod spinlock;
mod string_pool;

pub use hash::*;
pub use packed_option::*;
pub use spinlock::*;
pub use string_pool::*;
