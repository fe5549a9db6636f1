//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The injection rewrite: every `iadd` gets routed through a call to the
//! synthesized `Modulo` helper.
//!
//! This is a module-level rewrite because it has to synthesize (or find) the
//! helper function before any call to it can be built.

use crate::analysis::{ControlFlowGraphAnalysis, DominatorTreeAnalysis};
use crate::ir::matchers::{as_add, first_store_of};
use crate::ir::{
    Cursor, Func, FuncCursor, FuncView, Function, InstBuilder, Module, Signature, StoreInst, Type,
};
use crate::pass::{
    FunctionAnalysisManagerModuleProxy, ModuleAnalysisManager, ModuleTransformPass,
    PreservedAnalyses,
};
use crate::transforms::{get_or_create_modulo, RewriteError, MODULO_NAME};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// Routes every stored `iadd` in `module` through the `Modulo` helper.
///
/// For each matched add, a `call @Modulo(sum)` is inserted immediately after
/// the add, and the first store of the sum (in operand creation order) has
/// its stored value rewired to the call's result. Every *other* consumer of
/// the sum keeps seeing the raw value, and an add with no consumer store
/// still gets its call, the call is just left without users.
///
/// The helper is synthesized on first need and found by name after that, so
/// a module ends up with at most one `Modulo` no matter how many functions
/// get rewritten. A function already named `Modulo` is never rewritten, that
/// would make the helper feed itself.
///
/// Returns whether anything was rewritten.
pub fn inject_modulo_calls(module: &mut Module) -> Result<bool, RewriteError> {
    let mut helper = module.find_function_by_name(MODULO_NAME);
    let mut changed = false;

    // synthesizing the helper adds a function mid-walk, so the walk is over
    // a snapshot of the functions that existed beforehand
    let funcs: SmallVec<[Func; 16]> = module.functions().collect();

    for func in funcs {
        let function = module.function(func);

        if function.name() == MODULO_NAME {
            continue;
        }

        if function.definition().is_none() || !has_injectable_add(function) {
            continue;
        }

        let target = match helper {
            Some(target) => target,
            None => {
                let target = get_or_create_modulo(module)?;

                helper = Some(target);

                target
            }
        };

        let sig = module.function(target).signature().clone();

        changed |= inject_into(module.function_mut(func), target, &sig);
    }

    Ok(changed)
}

/// Checks whether the function has an add that [`inject_into`] would
/// actually rewrite, so the helper isn't synthesized into modules that will
/// never call it.
fn has_injectable_add(func: &Function) -> bool {
    let mut cursor = FuncView::over(func);

    while let Some(block) = cursor.next_block() {
        while let Some(inst) = cursor.next_inst() {
            if let Some(matched) = as_add(inst, cursor.dfg()) {
                if matched.ty == Type::i32() {
                    return true;
                }
            }
        }

        cursor.goto_after(block);
    }

    false
}

fn inject_into(func: &mut Function, helper: Func, helper_sig: &Signature) -> bool {
    let mut cursor = FuncCursor::over(func);
    let sig = cursor.dfg_mut().import_signature(helper_sig);
    let mut changed = false;

    while let Some(block) = cursor.next_block() {
        while let Some(inst) = cursor.next_inst() {
            let matched = match as_add(inst, cursor.dfg()) {
                Some(matched) => matched,
                None => continue,
            };

            // the helper takes (and returns) `i32`, adds of other widths
            // are left alone
            if matched.ty != Type::i32() {
                continue;
            }

            let store = first_store_of(matched.result, cursor.dfg());
            let debug = cursor.dfg().debug_info(inst);
            let call = cursor.insert_after().call(helper, sig, &[matched.result], debug);

            // only the consumer store switches over to the reduced value,
            // every other consumer keeps seeing the raw sum
            if let Some(store) = store {
                let result = cursor
                    .dfg()
                    .inst_to_result(call)
                    .expect("the modulo helper always returns a value");

                cursor.dfg_mut().rewrite_operand(store, StoreInst::STORED_SLOT, result);
            }

            // the walk resumes past the call that was just made
            cursor.goto_inst(call);

            trace!(?inst, "routed add through the modulo helper");

            changed = true;
        }

        cursor.goto_after(block);
    }

    if changed {
        debug!(func = func.name(), "injected modulo helper calls");
    }

    changed
}

/// A module pass wrapping [`inject_modulo_calls`].
///
/// New calls never change a block graph, so the flowgraph and dominator tree
/// stay valid, but the per-function analysis managers behind the proxy still
/// hold results for the old instruction mix and get invalidated here.
pub struct InjectModuloCallsPass;

impl ModuleTransformPass for InjectModuloCallsPass {
    fn run(
        &mut self,
        module: &mut Module,
        am: &ModuleAnalysisManager,
    ) -> Result<PreservedAnalyses, RewriteError> {
        if !inject_modulo_calls(module)? {
            return Ok(PreservedAnalyses::all());
        }

        let mut preserved = PreservedAnalyses::none();

        preserved.preserve::<ControlFlowGraphAnalysis>();
        preserved.preserve::<DominatorTreeAnalysis>();

        let fam = am.get::<FunctionAnalysisManagerModuleProxy>(module);

        for func in module.functions() {
            let function = module.function(func);

            if function.definition().is_none() {
                continue;
            }

            let mut fam = fam.borrow_mut();

            fam.initialize(function);
            fam.invalidate(function, &preserved);
        }

        Ok(preserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ModuleWriter;
    use crate::ir::{DebugInfo, SigBuilder};

    #[test]
    fn routes_stored_add_through_helper() {
        let mut module = Module::new("inject");
        let sig = SigBuilder::new().param(Type::i32()).param(Type::i32()).ret(None).build();
        let mut b = module.define_function("sum_into", sig);
        let entry = b.create_block("entry");
        let out = b.create_stack_slot("out", Type::i32());

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());
        let addr = b.append().stackslot(out, DebugInfo::fake());

        b.append().store(sum, addr, DebugInfo::fake());
        b.append().ret_void(DebugInfo::fake());
        b.define();

        assert!(inject_modulo_calls(&mut module).unwrap());

        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn void @sum_into(i32 %0, i32 %1) {\n",
                "  $out = stack i32\n",
                "entry:\n",
                "  %2 = iadd i32 %0, %1\n",
                "  %3 = call i32 @Modulo(i32 %2)\n",
                "  %4 = stackslot $out\n",
                "  store i32 %3, ptr %4\n",
                "  ret void\n",
                "}\n",
                "\n",
                "fn i32 @Modulo(i32 %0) {\n",
                "entry:\n",
                "  %1 = iconst i32 100\n",
                "  %2 = icmp sgt i32 %0, %1\n",
                "  condbr bool %2, mod, merge\n",
                "mod:\n",
                "  %3 = srem i32 %0, %1\n",
                "  br merge\n",
                "merge:\n",
                "  %4 = phi i32 [ entry, %0 ], [ mod, %3 ]\n",
                "  ret i32 %4\n",
                "}\n"
            )
        );
    }

    #[test]
    fn leaves_dead_call_without_store() {
        let mut module = Module::new("inject");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("lonely", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());
        b.define();

        assert!(inject_modulo_calls(&mut module).unwrap());

        // no store to rewire, so the `ret` still returns the raw sum and
        // the call is simply dead
        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn i32 @lonely(i32 %0) {\n",
                "entry:\n",
                "  %1 = iadd i32 %0, %0\n",
                "  %2 = call i32 @Modulo(i32 %1)\n",
                "  ret i32 %1\n",
                "}\n",
                "\n",
                "fn i32 @Modulo(i32 %0) {\n",
                "entry:\n",
                "  %1 = iconst i32 100\n",
                "  %2 = icmp sgt i32 %0, %1\n",
                "  condbr bool %2, mod, merge\n",
                "mod:\n",
                "  %3 = srem i32 %0, %1\n",
                "  br merge\n",
                "merge:\n",
                "  %4 = phi i32 [ entry, %0 ], [ mod, %3 ]\n",
                "  ret i32 %4\n",
                "}\n"
            )
        );
    }

    #[test]
    fn other_consumers_keep_the_raw_sum() {
        let mut module = Module::new("inject");
        let sig = SigBuilder::new().param(Type::i32()).param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("mixed", sig);
        let entry = b.create_block("entry");
        let out = b.create_stack_slot("out", Type::i32());

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());
        let product = b.append().imul(sum, sum, DebugInfo::fake());
        let addr = b.append().stackslot(out, DebugInfo::fake());

        b.append().store(sum, addr, DebugInfo::fake());
        b.append().ret_val(product, DebugInfo::fake());

        let func = b.define();

        assert!(inject_modulo_calls(&mut module).unwrap());

        // `imul` and `ret` still use the raw `%2`, only the store was moved
        // over to the call's result
        let writer = ModuleWriter::from(&module);
        let printed = writer.func(func);

        assert_eq!(
            printed,
            concat!(
                "fn i32 @mixed(i32 %0, i32 %1) {\n",
                "  $out = stack i32\n",
                "entry:\n",
                "  %2 = iadd i32 %0, %1\n",
                "  %3 = call i32 @Modulo(i32 %2)\n",
                "  %4 = imul i32 %2, %2\n",
                "  %5 = stackslot $out\n",
                "  store i32 %3, ptr %5\n",
                "  ret i32 %4\n",
                "}\n"
            )
        );
    }

    #[test]
    fn first_store_in_creation_order_is_rewired() {
        let mut module = Module::new("inject");
        let sig = SigBuilder::new().param(Type::i32()).ret(None).build();
        let mut b = module.define_function("twice", sig);
        let entry = b.create_block("entry");
        let first = b.create_stack_slot("first", Type::i32());
        let second = b.create_stack_slot("second", Type::i32());

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());
        let addr_first = b.append().stackslot(first, DebugInfo::fake());
        let addr_second = b.append().stackslot(second, DebugInfo::fake());

        b.append().store(sum, addr_first, DebugInfo::fake());
        b.append().store(sum, addr_second, DebugInfo::fake());
        b.append().ret_void(DebugInfo::fake());

        let func = b.define();

        assert!(inject_modulo_calls(&mut module).unwrap());

        let writer = ModuleWriter::from(&module);

        assert_eq!(
            writer.func(func),
            concat!(
                "fn void @twice(i32 %0) {\n",
                "  $first = stack i32\n",
                "  $second = stack i32\n",
                "entry:\n",
                "  %1 = iadd i32 %0, %0\n",
                "  %2 = call i32 @Modulo(i32 %1)\n",
                "  %3 = stackslot $first\n",
                "  %4 = stackslot $second\n",
                "  store i32 %2, ptr %3\n",
                "  store i32 %1, ptr %4\n",
                "  ret void\n",
                "}\n"
            )
        );
    }

    #[test]
    fn helper_is_shared_across_functions() {
        let mut module = Module::new("inject");

        for name in ["one", "two"] {
            let sig = SigBuilder::new().param(Type::i32()).ret(None).build();
            let mut b = module.define_function(name, sig);
            let entry = b.create_block("entry");
            let out = b.create_stack_slot("out", Type::i32());

            b.switch_to(entry);

            let params = b.append_func_params();
            let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());
            let addr = b.append().stackslot(out, DebugInfo::fake());

            b.append().store(sum, addr, DebugInfo::fake());
            b.append().ret_void(DebugInfo::fake());
            b.define();
        }

        assert!(inject_modulo_calls(&mut module).unwrap());

        let helpers = module
            .functions()
            .filter(|func| module.function(*func).name() == MODULO_NAME)
            .count();

        assert_eq!(helpers, 1);
    }

    #[test]
    fn never_rewrites_a_function_named_modulo() {
        let mut module = Module::new("inject");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function(MODULO_NAME, sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());
        b.define();

        let before = ModuleWriter::from(&module).module().to_string();

        assert!(!inject_modulo_calls(&mut module).unwrap());
        assert_eq!(ModuleWriter::from(&module).module(), before);
    }
}
