//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the "transform" passes of the Citrine project, i.e. the passes
//! that actually rewrite CIR into different (but behaviorally related) CIR.
//!
//! Each rewrite is exposed twice: once as a plain function that operates on
//! a single function or module and reports whether it changed anything, and
//! once as a pass type that plugs into the infrastructure in [`crate::pass`]
//! and reports which analyses survived the rewrite.

use crate::ir::DebugInfo;
use thiserror::Error;

mod inject;
mod modulo;
mod split;
mod substitute;
mod verify;

pub use inject::*;
pub use modulo::*;
pub use split::*;
pub use substitute::*;
pub use verify::*;

/// The ways a rewrite can fail.
///
/// A rewrite finding nothing to match is not a failure, the drivers report
/// that case through their `bool` result instead. These errors mean the input
/// couldn't be (or wasn't) rewritten safely, and whatever was already mutated
/// before the error was noticed is kept as-is.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The IR broke one of the structural rules checked by [`verify_func`]
    /// or [`verify_module`], either before a rewrite ran or after a rewrite
    /// that restructures control flow.
    #[error("malformed ir: {reason}")]
    MalformedIr {
        /// Every violation that was found, one `line:col: message` per
        /// violation, joined with `"; "`.
        reason: String,
    },

    /// A rewrite matched an instruction whose type it cannot handle. The
    /// function named here is left completely untouched.
    #[error("`{operation}` cannot rewrite a value of type `{ty}` in `@{func}`")]
    UnsupportedOperandType {
        /// The name of the function that contained the instruction.
        func: String,
        /// The name of the rewrite that gave up.
        operation: &'static str,
        /// The type that wasn't usable, in its textual form.
        ty: String,
    },

    /// A textual pass name given to [`run_rewrites`](crate::run_rewrites)
    /// doesn't map to any known rewrite.
    #[error("unknown pass name `{name}`")]
    UnknownPass {
        /// The name that failed to resolve.
        name: String,
    },
}

impl RewriteError {
    pub(crate) fn malformed(errors: &[(String, DebugInfo)]) -> Self {
        let reason = errors
            .iter()
            .map(|(message, debug)| format!("{}:{}: {message}", debug.line(), debug.col()))
            .collect::<Vec<String>>()
            .join("; ");

        Self::MalformedIr { reason }
    }
}
