//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![allow(dead_code)]
#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]
#![allow(unused_variables)]

//! # Citrine
//!
//! These are the basic APIs for building, rewriting and executing CIR.

pub mod analysis;
pub mod arena;
pub mod ir;
pub mod pass;
pub mod transforms;
pub mod utility;
pub mod vm;

#[cfg(feature = "dev-tools")]
pub mod cli;

use crate::analysis::{ControlFlowGraphAnalysis, DominatorTreeAnalysis, ModuleStringifyAnalysis};
use crate::pass::{
    FunctionAnalysisManager, FunctionAnalysisManagerModuleProxy, FunctionToModulePassAdapter,
    ModuleAnalysisManager, ModulePassManager, ModuleTransformPass,
};
use crate::transforms::{
    AddToSubPass, InjectModuloCallsPass, RewriteError, SplitStoreGuardsPass, VerifyModulePass,
};

/// A helper function that handles "run these rewrites specified by the user"
/// in a way that multiple tools can use.
///
/// This is not intended to be used for pre-determined pass pipelines, but is
/// useful for tools that take a pass list on the command line the way `cirt`
/// does.
///
/// - `verify` is whether to insert verify passes between all passes
/// - `passes` is the user-specified list of pass names
///
/// Returns whether any pass reported that it changed `module`.
pub fn run_rewrites(
    module: &mut ir::Module,
    verify: bool,
    passes: &[String],
) -> Result<bool, RewriteError> {
    let mut fam = FunctionAnalysisManager::new();
    fam.add_pass(ControlFlowGraphAnalysis);
    fam.add_pass(DominatorTreeAnalysis);

    let mut mam = ModuleAnalysisManager::new();
    mam.add_pass(FunctionAnalysisManagerModuleProxy::wrap(fam));
    mam.add_pass(ModuleStringifyAnalysis {});
    mam.initialize(module);

    let mut mpm = ModulePassManager::new();

    if verify {
        mpm.add_pass(VerifyModulePass);
    }

    for pass in passes {
        match pass.as_str() {
            "substitute" => mpm.add_pass(FunctionToModulePassAdapter::adapt(AddToSubPass)),
            "inject" => mpm.add_pass(InjectModuloCallsPass),
            "split" => mpm.add_pass(FunctionToModulePassAdapter::adapt(SplitStoreGuardsPass)),
            "verify" => mpm.add_pass(VerifyModulePass),
            _ => {
                return Err(RewriteError::UnknownPass { name: pass.clone() });
            }
        }

        if verify {
            mpm.add_pass(VerifyModulePass);
        }
    }

    let preserved = mpm.run(module, &mam)?;

    mam.invalidate(module, &preserved);

    Ok(!preserved.preserves_all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DebugInfo, InstBuilder, Module, SigBuilder, Type};
    use crate::vm::{ForeignValue, Runtime};

    fn stored_sum_module() -> Module {
        let mut module = Module::new("pipeline");
        let sig = SigBuilder::new()
            .param(Type::i32())
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("measure", sig);
        let slot = b.create_stack_slot("out", Type::i32());
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());
        let addr = b.append().stackslot(slot, DebugInfo::fake());

        b.append().store(sum, addr, DebugInfo::fake());

        let reloaded = b.append().load(Type::i32(), addr, DebugInfo::fake());

        b.append().ret_val(reloaded, DebugInfo::fake());
        b.define();

        module
    }

    #[test]
    fn substitute_pipeline_turns_sums_into_differences() {
        let mut module = stored_sum_module();
        let changed = run_rewrites(&mut module, true, &["substitute".to_string()]).unwrap();

        assert!(changed);

        let runtime = Runtime::with_module(module);
        let result = runtime
            .call("measure", &[ForeignValue::Int32(9), ForeignValue::Int32(4)])
            .unwrap();

        assert_eq!(result, Some(ForeignValue::Int32(5)));
    }

    #[test]
    fn inject_pipeline_reduces_large_sums() {
        let mut module = stored_sum_module();
        let changed = run_rewrites(&mut module, true, &["inject".to_string()]).unwrap();

        assert!(changed);

        let runtime = Runtime::with_module(module);
        let measure = |a: u32, b: u32| {
            runtime
                .call("measure", &[ForeignValue::Int32(a), ForeignValue::Int32(b)])
                .unwrap()
        };

        assert_eq!(measure(40, 50), Some(ForeignValue::Int32(90)));
        assert_eq!(measure(80, 90), Some(ForeignValue::Int32(70)));
    }

    #[test]
    fn split_pipeline_reduces_large_sums() {
        let mut module = stored_sum_module();
        let changed = run_rewrites(&mut module, true, &["split".to_string()]).unwrap();

        assert!(changed);

        let runtime = Runtime::with_module(module);
        let measure = |a: u32, b: u32| {
            runtime
                .call("measure", &[ForeignValue::Int32(a), ForeignValue::Int32(b)])
                .unwrap()
        };

        assert_eq!(measure(40, 50), Some(ForeignValue::Int32(90)));
        assert_eq!(measure(80, 90), Some(ForeignValue::Int32(70)));
    }

    #[test]
    fn a_module_without_adds_reports_no_change() {
        let mut module = Module::new("pipeline");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("identity", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();

        b.append().ret_val(params[0], DebugInfo::fake());
        b.define();

        let passes = ["substitute", "inject", "split"].map(String::from);
        let changed = run_rewrites(&mut module, true, &passes).unwrap();

        assert!(!changed);
    }

    #[test]
    fn unknown_pass_names_are_rejected() {
        let mut module = stored_sum_module();
        let result = run_rewrites(&mut module, false, &["gvn".to_string()]);

        assert!(matches!(result, Err(RewriteError::UnknownPass { name }) if name == "gvn"));
    }
}
