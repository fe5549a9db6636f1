//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Provides APIs for the execution of CIR.
//!
//! This module defines the boundary types that let foreign values pass
//! in and out of executing CIR, and a reference [`Runtime`] that
//! interprets the in-memory form of a module directly. The runtime is
//! meant for checking what rewrites did to a module, not for speed.

mod engine;
mod runtime;

pub use engine::*;
pub use runtime::*;
