//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The splitting rewrite: stores of a sum get a conditional remainder path
//! built around them.
//!
//! Where the other rewrites edit instructions in place, this one restructures
//! the block graph, so it leans on [`verify_func`] to prove the function is
//! still sound after every single application.

use crate::analysis::stringify_ty;
use crate::ir::matchers::{as_add, first_store_of};
use crate::ir::{Cursor, FuncCursor, FuncView, Function, Inst, InstBuilder, InstData, Type, Value};
use crate::pass::{FunctionAnalysisManager, FunctionTransformPass, PreservedAnalyses};
use crate::transforms::{verify_func, RewriteError};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// A matched `iadd` whose result is consumed by a store, everything
/// [`apply_guard`] needs to build the remainder path.
struct GuardSite {
    result: Value,
    ty: Type,
    store: Inst,
}

/// Builds a conditional remainder path around every store of an `iadd`
/// result in `func`.
///
/// For each matched pair, the store's block is split immediately after the
/// store: the tail and the original terminator move into a new `rest.N`
/// block, and the old block now ends in `condbr (sum > 100), mod.N, rest.N`.
/// The `mod.N` block stores `sum % 100` over the same pointer and falls
/// through to `rest.N`, so every matched store grows the function by exactly
/// two blocks.
///
/// Adds with no consumer store are skipped entirely. An add of a non-integer
/// type that *does* have a consumer store is reported as
/// [`RewriteError::UnsupportedOperandType`] before anything is mutated, the
/// whole function is left untouched in that case.
///
/// Returns whether anything was rewritten.
pub fn split_store_guards(func: &mut Function) -> Result<bool, RewriteError> {
    let sites = guard_sites(func)?;

    for (index, site) in sites.iter().enumerate() {
        apply_guard(func, site, index);

        // control flow was just restructured, prove the function is still
        // sound before going any further
        verify_func(func).map_err(|errors| RewriteError::malformed(&errors))?;
    }

    if !sites.is_empty() {
        debug!(
            func = func.name(),
            guards = sites.len(),
            "guarded stores with remainder branches"
        );
    }

    Ok(!sites.is_empty())
}

/// Collects every (add, store) pair before anything is mutated. The pairs
/// come out in layout order, and each add contributes its first store in
/// operand creation order, so the rewrite is deterministic.
fn guard_sites(func: &Function) -> Result<SmallVec<[GuardSite; 4]>, RewriteError> {
    let mut sites = SmallVec::new();
    let mut cursor = FuncView::over(func);

    while let Some(block) = cursor.next_block() {
        while let Some(inst) = cursor.next_inst() {
            let matched = match as_add(inst, cursor.dfg()) {
                Some(matched) => matched,
                None => continue,
            };

            let store = match first_store_of(matched.result, cursor.dfg()) {
                Some(store) => store,
                None => continue,
            };

            if matched.ty.as_int().is_none() {
                return Err(RewriteError::UnsupportedOperandType {
                    func: func.name().to_owned(),
                    operation: "split",
                    ty: stringify_ty(matched.ty),
                });
            }

            sites.push(GuardSite {
                result: matched.result,
                ty: matched.ty,
                store,
            });
        }

        cursor.goto_after(block);
    }

    Ok(sites)
}

fn apply_guard(func: &mut Function, site: &GuardSite, index: usize) {
    let mut cursor = FuncCursor::over(func);

    cursor.goto_inst(site.store);

    let debug = cursor.dfg().debug_info(site.store);
    let block = cursor
        .current_block()
        .expect("cursor points at the matched store");
    let pointer = match cursor.dfg().inst_data(site.store) {
        InstData::Store(store) => store.pointer(),
        _ => unreachable!("guard sites always point at stores"),
    };

    // the tail and the old terminator move out, and the fallthrough `br`
    // the split leaves behind gets replaced by the guard branch
    let rest = cursor.split_block_after(&format!("rest.{index}"), debug);
    let fallthrough = cursor
        .layout()
        .block_last_inst(block)
        .expect("a split block ends in the fallthrough branch");

    cursor.goto_inst(fallthrough);
    cursor.remove_inst();

    let guard = cursor.create_block_after(&format!("mod.{index}"), block);

    let hundred = cursor.append_to(block).iconst(site.ty, 100, debug);
    let over = cursor.append_to(block).icmp_sgt(site.result, hundred, debug);

    cursor.append_to(block).condbr(over, guard, rest, debug);

    // the remainder path stores `sum % 100` over the value the original
    // store wrote, then falls into the tail
    let rem = cursor.append_to(guard).srem(site.result, hundred, debug);

    cursor.append_to(guard).store(rem, pointer, debug);
    cursor.append_to(guard).br(rest, debug);

    trace!(store = ?site.store, "split a guarded store");
}

/// A function pass wrapping [`split_store_guards`].
///
/// Every application adds blocks and edges, so nothing block-level survives
/// a successful rewrite.
pub struct SplitStoreGuardsPass;

impl FunctionTransformPass for SplitStoreGuardsPass {
    fn run(
        &mut self,
        func: &mut Function,
        _: &FunctionAnalysisManager,
    ) -> Result<PreservedAnalyses, RewriteError> {
        if split_store_guards(func)? {
            Ok(PreservedAnalyses::none())
        } else {
            Ok(PreservedAnalyses::all())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ModuleWriter;
    use crate::ir::{DebugInfo, Module, SigBuilder};

    #[test]
    fn guards_store_with_remainder_branch() {
        let mut module = Module::new("split");
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

        let func = b.define();

        assert!(split_store_guards(module.function_mut(func)).unwrap());

        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn void @sum_into(i32 %0, i32 %1) {\n",
                "  $out = stack i32\n",
                "entry:\n",
                "  %2 = iadd i32 %0, %1\n",
                "  %3 = stackslot $out\n",
                "  store i32 %2, ptr %3\n",
                "  %4 = iconst i32 100\n",
                "  %5 = icmp sgt i32 %2, %4\n",
                "  condbr bool %5, mod.0, rest.0\n",
                "mod.0:\n",
                "  %6 = srem i32 %2, %4\n",
                "  store i32 %6, ptr %3\n",
                "  br rest.0\n",
                "rest.0:\n",
                "  ret void\n",
                "}\n"
            )
        );
    }

    #[test]
    fn tail_and_terminator_move_to_rest() {
        let mut module = Module::new("split");
        let sig = SigBuilder::new().param(Type::i32()).param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("busy", sig);
        let entry = b.create_block("entry");
        let out = b.create_stack_slot("out", Type::i32());

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());
        let addr = b.append().stackslot(out, DebugInfo::fake());

        b.append().store(sum, addr, DebugInfo::fake());

        let product = b.append().imul(sum, sum, DebugInfo::fake());

        b.append().ret_val(product, DebugInfo::fake());

        let func = b.define();

        assert!(split_store_guards(module.function_mut(func)).unwrap());

        assert_eq!(
            ModuleWriter::from(&module).module(),
            concat!(
                "fn i32 @busy(i32 %0, i32 %1) {\n",
                "  $out = stack i32\n",
                "entry:\n",
                "  %2 = iadd i32 %0, %1\n",
                "  %3 = stackslot $out\n",
                "  store i32 %2, ptr %3\n",
                "  %4 = iconst i32 100\n",
                "  %5 = icmp sgt i32 %2, %4\n",
                "  condbr bool %5, mod.0, rest.0\n",
                "mod.0:\n",
                "  %6 = srem i32 %2, %4\n",
                "  store i32 %6, ptr %3\n",
                "  br rest.0\n",
                "rest.0:\n",
                "  %7 = imul i32 %2, %2\n",
                "  ret i32 %7\n",
                "}\n"
            )
        );
    }

    #[test]
    fn no_consumer_store_means_no_split() {
        let mut module = Module::new("split");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("pure", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());

        let func = b.define();

        let before = ModuleWriter::from(&module).module().to_string();

        assert!(!split_store_guards(module.function_mut(func)).unwrap());
        assert_eq!(ModuleWriter::from(&module).module(), before);
    }

    #[test]
    fn every_guarded_store_grows_two_blocks() {
        let mut module = Module::new("split");
        let sig = SigBuilder::new().param(Type::i32()).param(Type::i32()).ret(None).build();
        let mut b = module.define_function("twice", sig);
        let entry = b.create_block("entry");
        let first = b.create_stack_slot("first", Type::i32());
        let second = b.create_stack_slot("second", Type::i32());

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());
        let addr_first = b.append().stackslot(first, DebugInfo::fake());

        b.append().store(sum, addr_first, DebugInfo::fake());

        let double = b.append().iadd(sum, sum, DebugInfo::fake());
        let addr_second = b.append().stackslot(second, DebugInfo::fake());

        b.append().store(double, addr_second, DebugInfo::fake());
        b.append().ret_void(DebugInfo::fake());

        let func = b.define();

        assert!(split_store_guards(module.function_mut(func)).unwrap());

        let function = module.function(func);
        let mut cursor = FuncView::over(function);
        let mut blocks = 0;

        while cursor.next_block().is_some() {
            blocks += 1;
        }

        // one original block plus two per guarded store
        assert_eq!(blocks, 5);
        assert!(verify_func(function).is_ok());
    }

    #[test]
    fn phi_preds_follow_the_split() {
        let mut module = Module::new("split");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("merging", sig);
        let entry = b.create_block("entry");
        let exit = b.create_block("exit");
        let out = b.create_stack_slot("out", Type::i32());

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());
        let addr = b.append().stackslot(out, DebugInfo::fake());

        b.append().store(sum, addr, DebugInfo::fake());
        b.append().br(exit, DebugInfo::fake());
        b.switch_to(exit);

        let merged = b.append().phi(Type::i32(), &[(entry, sum)], DebugInfo::fake());

        b.append().ret_val(merged, DebugInfo::fake());

        let func = b.define();

        assert!(split_store_guards(module.function_mut(func)).unwrap());

        // the value now flows into `exit` from the tail block, not `entry`
        let printed = ModuleWriter::from(&module).module().to_string();

        assert!(printed.contains("phi i32 [ rest.0, %1 ]"));
        assert!(verify_func(module.function(func)).is_ok());
    }
}
