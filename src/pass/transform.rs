//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Function, Module};
use crate::pass::{FunctionAnalysisManager, ModuleAnalysisManager, PreservedAnalyses};
use crate::transforms::RewriteError;

/// Models a pass that possibly performs a transformation over an entire CIR module.
///
/// While the pass may not actually modify the IR, it has the ability to, and needs to
/// declare what it changed (if anything) through [`PreservedAnalyses`](crate::pass::PreservedAnalyses).
pub trait ModuleTransformPass {
    /// Performs the transformation over a given CIR module.
    ///
    /// This function is expected to act as-if it was pure, i.e. calling the same
    /// pass multiple times on the same IR should produce equivalent IR each time
    /// and should return the same preserved analyses each time.
    ///
    /// Passes that reject some input (malformed IR, operand types they do not
    /// handle) report it through the error, the IR mutated so far is kept as-is.
    fn run(
        &mut self,
        module: &mut Module,
        am: &ModuleAnalysisManager,
    ) -> Result<PreservedAnalyses, RewriteError>;
}

/// Defines a transformation over a single CIR function.
///
/// While the pass may not actually modify the IR, it has the ability to, and needs to
/// declare what it changed (if anything) through [`PreservedAnalyses`](crate::pass::PreservedAnalyses).
pub trait FunctionTransformPass {
    /// Performs the transformation over a given CIR function.
    ///
    /// This function is expected to act as-if it was pure, i.e. calling the same
    /// pass multiple times on the same IR should produce equivalent IR each time
    /// and should return the same preserved analyses each time.
    ///
    /// Passes that reject some input (malformed IR, operand types they do not
    /// handle) report it through the error, the IR mutated so far is kept as-is.
    fn run(
        &mut self,
        func: &mut Function,
        am: &FunctionAnalysisManager,
    ) -> Result<PreservedAnalyses, RewriteError>;
}
