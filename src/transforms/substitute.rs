//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The substitution rewrite: every `iadd` becomes an `isub`.
//!
//! This is the simplest of the rewrites, it exists to demonstrate (and test)
//! in-place instruction replacement without any control-flow surgery.

use crate::analysis::{ControlFlowGraphAnalysis, DominatorTreeAnalysis};
use crate::ir::matchers::as_add;
use crate::ir::{Cursor, FuncCursor, Function, InstBuilder};
use crate::pass::{FunctionAnalysisManager, FunctionTransformPass, PreservedAnalyses};
use crate::transforms::RewriteError;
use tracing::{debug, trace};

/// Replaces every `iadd` in `func` with an `isub` over the same operands.
///
/// The replacement keeps the operand order and the `nsw`/`nuw` flags of the
/// add, every consumer of the add's result is rewired to the new `isub`, and
/// the add is removed. Returns whether anything was rewritten.
///
/// This cannot fail: an `iadd` with no consumers still gets replaced, and an
/// `iadd` is always over a type that `isub` accepts.
pub fn substitute_adds(func: &mut Function) -> bool {
    let mut cursor = FuncCursor::over(func);
    let mut changed = false;

    while let Some(block) = cursor.next_block() {
        while let Some(inst) = cursor.next_inst() {
            let matched = match as_add(inst, cursor.dfg()) {
                Some(matched) => matched,
                None => continue,
            };

            let debug = cursor.dfg().debug_info(inst);

            // the replacement sits right where the add did, and every
            // consumer is pointed at it before the add goes away
            let sub = cursor
                .insert_before()
                .isub_with_flags(matched.lhs, matched.rhs, matched.flags, debug);

            cursor.dfg_mut().replace_uses_with(matched.result, sub);
            cursor.remove_inst();

            trace!(?inst, "replaced `iadd` with `isub`");

            changed = true;
        }

        cursor.goto_after(block);
    }

    if changed {
        debug!(func = func.name(), "substituted adds with subs");
    }

    changed
}

/// A function pass wrapping [`substitute_adds`].
///
/// Swapping one arithmetic instruction for another never touches the block
/// graph, so the flowgraph and dominator tree are reported as preserved even
/// when something was rewritten.
pub struct AddToSubPass;

impl FunctionTransformPass for AddToSubPass {
    fn run(
        &mut self,
        func: &mut Function,
        _: &FunctionAnalysisManager,
    ) -> Result<PreservedAnalyses, RewriteError> {
        if !substitute_adds(func) {
            return Ok(PreservedAnalyses::all());
        }

        let mut preserved = PreservedAnalyses::none();

        preserved.preserve::<ControlFlowGraphAnalysis>();
        preserved.preserve::<DominatorTreeAnalysis>();

        Ok(preserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ModuleWriter;
    use crate::ir::{ArithFlags, DebugInfo, InstBuilder, Module, SigBuilder, Type};

    #[test]
    fn rewires_consumers_to_the_sub() {
        let mut module = Module::new("substitute");
        let sig = SigBuilder::new().param(Type::i32()).param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("compute", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());
        let product = b.append().imul(sum, sum, DebugInfo::fake());

        b.append().ret_val(product, DebugInfo::fake());

        let func = b.define();

        assert!(substitute_adds(module.function_mut(func)));

        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn i32 @compute(i32 %0, i32 %1) {\n",
                "entry:\n",
                "  %2 = isub i32 %0, %1\n",
                "  %3 = imul i32 %2, %2\n",
                "  ret i32 %3\n",
                "}\n"
            )
        );
    }

    #[test]
    fn preserves_arithmetic_flags() {
        let mut module = Module::new("substitute");
        let sig = SigBuilder::new().param(Type::i32()).param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("flagged", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let flags = ArithFlags::NSW | ArithFlags::NUW;
        let sum = b.append().iadd_with_flags(params[0], params[1], flags, DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());

        let func = b.define();

        assert!(substitute_adds(module.function_mut(func)));

        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn i32 @flagged(i32 %0, i32 %1) {\n",
                "entry:\n",
                "  %2 = isub nsw nuw i32 %0, %1\n",
                "  ret i32 %2\n",
                "}\n"
            )
        );
    }

    #[test]
    fn rewrites_adds_in_every_block() {
        let mut module = Module::new("substitute");
        let sig = SigBuilder::new()
            .param(Type::bool())
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("branchy", sig);
        let entry = b.create_block("entry");
        let left = b.create_block("left");
        let right = b.create_block("right");

        b.switch_to(entry);

        let params = b.append_func_params();

        b.append().condbr(params[0], left, right, DebugInfo::fake());
        b.switch_to(left);

        let doubled = b.append().iadd(params[1], params[1], DebugInfo::fake());

        b.append().ret_val(doubled, DebugInfo::fake());
        b.switch_to(right);

        let tripled = b.append().iadd(params[1], params[1], DebugInfo::fake());
        let sum = b.append().iadd(tripled, params[1], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());

        let func = b.define();

        assert!(substitute_adds(module.function_mut(func)));

        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn i32 @branchy(bool %0, i32 %1) {\n",
                "entry:\n",
                "  condbr bool %0, left, right\n",
                "left:\n",
                "  %2 = isub i32 %1, %1\n",
                "  ret i32 %2\n",
                "right:\n",
                "  %3 = isub i32 %1, %1\n",
                "  %4 = isub i32 %3, %1\n",
                "  ret i32 %4\n",
                "}\n"
            )
        );
    }

    #[test]
    fn reports_no_change_without_adds() {
        let mut module = Module::new("substitute");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("square", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let squared = b.append().imul(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(squared, DebugInfo::fake());

        let func = b.define();

        assert!(!substitute_adds(module.function_mut(func)));
    }
}
