//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The pass infrastructure for CIR.
//!
//! This defines the traits that transform and analysis passes implement,
//! the managers that run transform passes in order, and the analysis
//! managers that lazily compute and cache analysis results for them.

mod analysis;
mod manager;
mod transform;

pub use analysis::*;
pub use manager::*;
pub use transform::*;
