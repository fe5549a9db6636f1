//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Contains the various analysis passes defined in the Citrine project.
//!
//! These are basically all passes that model the [`FunctionAnalysisPass`] or
//! the [`ModuleAnalysisPass`] traits, and range from debug passes to analyses
//! that are critical for correctness.
//!
//! [`FunctionAnalysisPass`]: crate::pass::FunctionAnalysisPass
//! [`ModuleAnalysisPass`]: crate::pass::ModuleAnalysisPass

mod dominators;
mod flowgraph;
mod writer;

pub use dominators::*;
pub use flowgraph::*;
pub use writer::*;
