//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Structural validation for CIR.
//!
//! The rewrites in this crate assume (and promise to re-establish) a set of
//! structural rules: every block ends in exactly one terminator, every use is
//! dominated by its definition, phis agree with the flowgraph, and the types
//! flowing through instructions line up. [`verify_func`] and [`verify_module`]
//! check those rules and report every violation they can find instead of
//! stopping at the first one.

use crate::analysis::{stringify_signature, ControlFlowGraph, DominatorTree};
use crate::ir::{
    BinaryInst, Block, CallInst, CondBrInst, DebugInfo, Function, FunctionDefinition, ICmpInst,
    IConstInst, Inst, InstData, Instruction, LoadInst, Module, PhiInst, RetInst, StackSlotInst,
    StoreInst, Type, Value,
};
use crate::pass::{ModuleAnalysisManager, ModuleTransformPass, PreservedAnalyses};
use crate::transforms::RewriteError;
use crate::utility::CiHashSet;
use smallvec::SmallVec;

macro_rules! verify_assert {
    ($self:expr, $cond:expr, $info:expr, $explanation:expr) => {
        if !($cond) {
            $self.errors.push(($explanation.to_string(), $info));
        }
    };
}

macro_rules! verify_assert_eq {
    ($self:expr, $lhs:expr, $rhs:expr, $info:expr, $explanation:expr) => {
        verify_assert!($self, $lhs == $rhs, $info, $explanation)
    };
}

macro_rules! verify_integral_binop {
    ($self:expr, $data:expr, $debug:expr, $name:literal) => {{
        let lhs = $self.dfg().ty($data.lhs());
        let rhs = $self.dfg().ty($data.rhs());

        verify_assert!(
            $self,
            lhs.is_int(),
            $debug,
            concat!("`", $name, "` operands must be integers")
        );

        verify_assert_eq!(
            $self,
            lhs,
            rhs,
            $debug,
            concat!("`", $name, "` operands must have the same type")
        );

        verify_assert_eq!(
            $self,
            $data.result_ty(),
            Some(lhs),
            $debug,
            concat!("`", $name, "` must yield the same type as its operands")
        );
    }};
}

/// Verifies every function defined in `module`, including the rules that can
/// only be checked with the whole module in hand (call sites agreeing with
/// the real signature of their callee).
///
/// On failure, every violation is returned as a `(message, location)` pair.
pub fn verify_module(module: &Module) -> Result<(), Vec<(String, DebugInfo)>> {
    let mut errors = Vec::default();

    for func in module.functions() {
        if let Err(mut errs) = verify_func_in(Some(module), module.function(func)) {
            errors.append(&mut errs);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Verifies a single function without any module context.
///
/// This checks everything [`verify_module`] does except the call-site rule
/// that needs to resolve callees, making it usable from function rewrites
/// that only hold a [`Function`].
pub fn verify_func(func: &Function) -> Result<(), Vec<(String, DebugInfo)>> {
    verify_func_in(None, func)
}

fn verify_func_in(
    module: Option<&Module>,
    func: &Function,
) -> Result<(), Vec<(String, DebugInfo)>> {
    // declarations have no body, there's nothing to check
    let def = match func.definition() {
        Some(def) => def,
        None => return Ok(()),
    };

    let mut verifier = Verifier {
        module,
        func,
        def,
        cfg: None,
        domtree: None,
        defined: CiHashSet::default(),
        seen: CiHashSet::default(),
        errors: Vec::default(),
    };

    verifier.walk();

    if verifier.errors.is_empty() {
        Ok(())
    } else {
        Err(verifier.errors)
    }
}

struct Verifier<'m> {
    module: Option<&'m Module>,
    func: &'m Function,
    def: &'m FunctionDefinition,
    cfg: Option<ControlFlowGraph>,
    domtree: Option<DominatorTree>,
    defined: CiHashSet<Inst>,
    seen: CiHashSet<Value>,
    errors: Vec<(String, DebugInfo)>,
}

impl<'m> Verifier<'m> {
    fn walk(&mut self) {
        self.check_params();

        // the flowgraph can't even be computed while a block is missing its
        // terminator, nothing past this point is meaningful in that state
        if !self.check_structure() {
            return;
        }

        let cfg = ControlFlowGraph::compute(self.func);
        let domtree = DominatorTree::compute(self.func, &cfg);

        if let Some(entry) = self.def.layout.entry_block() {
            verify_assert_eq!(
                self,
                cfg.predecessors(entry).count(),
                0,
                DebugInfo::fake(),
                "the entry block cannot have any predecessors"
            );
        }

        let reachable: Vec<Block> = domtree.reverse_postorder().collect();

        self.cfg.replace(cfg);
        self.domtree.replace(domtree);

        for block in reachable {
            self.check_block(block);
        }
    }

    fn check_params(&mut self) {
        let def = self.def;
        let sig = self.func.signature();
        let params = def.dfg.func_params();

        let agree = params.len() == sig.params().len()
            && params
                .iter()
                .map(|param| def.dfg.ty(*param))
                .eq(sig.params().iter().copied());

        verify_assert!(
            self,
            agree,
            DebugInfo::fake(),
            "function parameters must match the function's signature"
        );
    }

    fn check_structure(&mut self) -> bool {
        let def = self.def;
        let before = self.errors.len();

        verify_assert!(
            self,
            def.layout.entry_block().is_some(),
            DebugInfo::fake(),
            "a function body must have an entry block"
        );

        for block in def.layout.blocks() {
            match def.layout.block_last_inst(block) {
                Some(last) => {
                    let debug = def.dfg.debug_info(last);

                    verify_assert!(
                        self,
                        def.dfg.inst_data(last).is_terminator(),
                        debug,
                        "every block must end in a terminator"
                    );
                }
                None => {
                    self.errors.push((
                        "every block must end in a terminator, found an empty block".to_string(),
                        DebugInfo::fake(),
                    ));
                }
            }
        }

        self.errors.len() == before
    }

    fn check_block(&mut self, block: Block) {
        let def = self.def;
        let insts: SmallVec<[Inst; 16]> = def.layout.insts_in_block(block).collect();
        let last = def.layout.block_last_inst(block);
        let mut saw_non_phi = false;

        self.seen.clear();

        for inst in insts {
            let data = def.dfg.inst_data(inst);
            let debug = def.dfg.debug_info(inst);

            verify_assert!(
                self,
                self.defined.insert(inst),
                debug,
                "an instruction can only appear in the layout once"
            );

            verify_assert!(
                self,
                !data.is_terminator() || Some(inst) == last,
                debug,
                "a terminator must be the last instruction in its block"
            );

            if matches!(data, InstData::Phi(_)) {
                verify_assert!(
                    self,
                    !saw_non_phi,
                    debug,
                    "phis must be grouped at the start of their block"
                );
            } else {
                saw_non_phi = true;

                self.check_operands(block, inst);
            }

            self.check_inst(block, inst);

            if let Some(result) = def.dfg.inst_to_result(inst) {
                self.seen.insert(result);
            }
        }
    }

    fn check_operands(&mut self, block: Block, inst: Inst) {
        let def = self.def;
        let data = def.dfg.inst_data(inst);
        let debug = def.dfg.debug_info(inst);

        for &operand in data.operands() {
            // parameters are defined before anything in the body executes
            if def.dfg.is_param(operand) {
                continue;
            }

            let source = match def.dfg.value_to_inst(operand) {
                Some(source) => source,
                None => continue,
            };

            verify_assert!(
                self,
                source != inst,
                debug,
                "an instruction cannot use its own result"
            );

            if !def.layout.is_inst_inserted(source) {
                self.errors.push((
                    "a use's definition must be inserted in the function".to_string(),
                    debug,
                ));

                continue;
            }

            let defined_in = def.layout.inst_block(source);

            if defined_in == block {
                verify_assert!(
                    self,
                    self.seen.contains(&operand),
                    debug,
                    "a definition must come before any use inside its own block"
                );
            } else {
                verify_assert!(
                    self,
                    self.domtree().dominates(block, defined_in),
                    debug,
                    "a definition's block must dominate every use's block"
                );
            }
        }
    }

    fn check_inst(&mut self, block: Block, inst: Inst) {
        let def = self.def;
        let data = def.dfg.inst_data(inst);
        let debug = def.dfg.debug_info(inst);

        match data {
            InstData::Call(call) => self.check_call(call, debug),
            InstData::ICmp(icmp) => self.check_icmp(icmp, debug),
            InstData::Br(br) => self.check_target(br.target(), debug),
            InstData::CondBr(condbr) => self.check_condbr(condbr, debug),
            InstData::Ret(ret) => self.check_ret(ret, debug),
            InstData::IAdd(arith) => verify_integral_binop!(self, arith, debug, "iadd"),
            InstData::ISub(arith) => verify_integral_binop!(self, arith, debug, "isub"),
            InstData::IMul(arith) => verify_integral_binop!(self, arith, debug, "imul"),
            InstData::SRem(arith) => verify_integral_binop!(self, arith, debug, "srem"),
            InstData::Load(load) => self.check_load(load, debug),
            InstData::Store(store) => self.check_store(store, debug),
            InstData::IConst(iconst) => self.check_iconst(iconst, debug),
            InstData::StackSlot(slot) => self.check_stackslot(slot, debug),
            InstData::Phi(phi) => self.check_phi(block, inst, phi, debug),
        }
    }

    fn check_call(&mut self, call: &CallInst, debug: DebugInfo) {
        let def = self.def;
        let sig = def.dfg.signature(call.sig());
        let args_agree = call
            .args()
            .iter()
            .map(|arg| def.dfg.ty(*arg))
            .eq(sig.params().iter().copied());

        verify_assert!(
            self,
            args_agree,
            debug,
            "call arguments must match the parameter types of the callee"
        );

        if let Some(module) = self.module {
            let callee = module.function(call.callee());

            verify_assert!(
                self,
                callee.signature() == sig,
                debug,
                format!(
                    "call signature must be `{}`, the real signature of the callee",
                    stringify_signature(callee.signature())
                )
            );
        }
    }

    fn check_icmp(&mut self, icmp: &ICmpInst, debug: DebugInfo) {
        let lhs = self.dfg().ty(icmp.lhs());
        let rhs = self.dfg().ty(icmp.rhs());

        verify_assert_eq!(
            self,
            lhs,
            rhs,
            debug,
            "`icmp` operands must have the same type"
        );

        verify_assert!(
            self,
            lhs.is_int() || lhs.is_bool() || lhs.is_ptr(),
            debug,
            "`icmp` operands must be integers, booleans or pointers"
        );
    }

    fn check_target(&mut self, target: Block, debug: DebugInfo) {
        let def = self.def;

        verify_assert!(
            self,
            def.dfg.is_block_inserted(target) && def.layout.is_block_inserted(target),
            debug,
            "a branch target must be a block inserted in the function"
        );
    }

    fn check_condbr(&mut self, condbr: &CondBrInst, debug: DebugInfo) {
        verify_assert_eq!(
            self,
            self.dfg().ty(condbr.condition()),
            Type::bool(),
            debug,
            "a `condbr` condition must be a `bool`"
        );

        self.check_target(condbr.true_branch(), debug);
        self.check_target(condbr.false_branch(), debug);
    }

    fn check_ret(&mut self, ret: &RetInst, debug: DebugInfo) {
        verify_assert_eq!(
            self,
            self.func.return_ty(),
            ret.value().map(|value| self.dfg().ty(value)),
            debug,
            "a `ret` must match the return type of the function"
        );
    }

    fn check_load(&mut self, load: &LoadInst, debug: DebugInfo) {
        verify_assert_eq!(
            self,
            self.dfg().ty(load.pointer()),
            Type::ptr(),
            debug,
            "a `load` address must be a `ptr`"
        );
    }

    fn check_store(&mut self, store: &StoreInst, debug: DebugInfo) {
        verify_assert_eq!(
            self,
            self.dfg().ty(store.pointer()),
            Type::ptr(),
            debug,
            "a `store` address must be a `ptr`"
        );
    }

    fn check_iconst(&mut self, iconst: &IConstInst, debug: DebugInfo) {
        verify_assert!(
            self,
            iconst.result_ty().map_or(false, |ty| ty.is_int()),
            debug,
            "an `iconst` must have an integer type"
        );
    }

    fn check_stackslot(&mut self, slot: &StackSlotInst, debug: DebugInfo) {
        let exists = self.dfg().stack_slots().any(|(key, _)| key == slot.slot());

        verify_assert!(
            self,
            exists,
            debug,
            "a `stackslot` must name a slot that exists in the function"
        );
    }

    fn check_phi(&mut self, block: Block, inst: Inst, phi: &PhiInst, debug: DebugInfo) {
        let def = self.def;
        let preds: SmallVec<[Block; 4]> = self.cfg().predecessors(block).collect();
        let ty = phi.result_ty();
        let mut seen_preds = SmallVec::<[Block; 4]>::default();

        for (pred, value) in phi.incoming() {
            verify_assert!(
                self,
                preds.contains(&pred),
                debug,
                "a phi can only take values from direct predecessors"
            );

            verify_assert!(
                self,
                !seen_preds.contains(&pred),
                debug,
                "a phi can only take one value per predecessor"
            );

            verify_assert_eq!(
                self,
                Some(def.dfg.ty(value)),
                ty,
                debug,
                "every phi operand must match the type of the phi"
            );

            seen_preds.push(pred);

            self.check_phi_operand(pred, inst, value, debug);
        }

        for pred in preds {
            verify_assert!(
                self,
                phi.value_from(pred).is_some(),
                debug,
                "a phi must take a value from every predecessor"
            );
        }
    }

    fn check_phi_operand(&mut self, pred: Block, _phi: Inst, value: Value, debug: DebugInfo) {
        let def = self.def;

        if def.dfg.is_param(value) {
            return;
        }

        let source = match def.dfg.value_to_inst(value) {
            Some(source) => source,
            None => return,
        };

        if !def.layout.is_inst_inserted(source) {
            self.errors.push((
                "a use's definition must be inserted in the function".to_string(),
                debug,
            ));

            return;
        }

        let defined_in = def.layout.inst_block(source);

        // edges from dead code have no meaningful dominance relationship
        if self.domtree().is_reachable(pred) {
            verify_assert!(
                self,
                self.domtree().dominates(pred, defined_in),
                debug,
                "a phi operand must dominate the predecessor it flows in from"
            );
        }
    }

    fn dfg(&self) -> &'m crate::ir::DataFlowGraph {
        &self.def.dfg
    }

    fn cfg(&self) -> &ControlFlowGraph {
        self.cfg
            .as_ref()
            .expect("flowgraph is computed before blocks are checked")
    }

    fn domtree(&self) -> &DominatorTree {
        self.domtree
            .as_ref()
            .expect("dominator tree is computed before blocks are checked")
    }
}

/// A module pass that runs [`verify_module`] and turns any violations into
/// a [`RewriteError::MalformedIr`].
///
/// This is interleaved between rewrites when callers ask for a verified
/// pipeline, so a rewrite that breaks the IR is caught right where it broke
/// it instead of several passes later.
pub struct VerifyModulePass;

impl ModuleTransformPass for VerifyModulePass {
    fn run(
        &mut self,
        module: &mut Module,
        _: &ModuleAnalysisManager,
    ) -> Result<PreservedAnalyses, RewriteError> {
        match verify_module(module) {
            Ok(()) => Ok(PreservedAnalyses::all()),
            Err(errors) => Err(RewriteError::malformed(&errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cursor, FuncCursor, InstBuilder, Module, SigBuilder};

    #[test]
    fn accepts_well_formed_function() {
        let mut module = Module::new("verify");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("square", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let squared = b.append().imul(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(squared, DebugInfo::fake());
        b.define();

        assert!(verify_module(&module).is_ok());
    }

    #[test]
    fn rejects_use_in_non_dominated_block() {
        let mut module = Module::new("verify");
        let sig = SigBuilder::new().param(Type::bool()).ret(None).build();
        let mut b = module.define_function("broken", sig);
        let entry = b.create_block("entry");
        let left = b.create_block("left");
        let right = b.create_block("right");
        let merge = b.create_block("merge");

        b.switch_to(entry);

        let params = b.append_func_params();

        b.append().condbr(params[0], left, right, DebugInfo::fake());
        b.switch_to(left);

        let one = b.append().iconst(Type::i32(), 1, DebugInfo::fake());

        b.append().br(merge, DebugInfo::fake());
        b.switch_to(right);

        // `left` does not dominate `right`, so `one` is not usable here
        b.append().iadd(one, one, DebugInfo::fake());
        b.append().br(merge, DebugInfo::fake());
        b.switch_to(merge);
        b.append().ret_void(DebugInfo::fake());
        b.define();

        let errors = verify_module(&module).unwrap_err();

        assert!(errors.iter().any(|(message, _)| message.contains("dominate")));
    }

    #[test]
    fn rejects_block_without_terminator() {
        let mut module = Module::new("verify");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("unfinished", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let squared = b.append().imul(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(squared, DebugInfo::fake());

        let func = b.define();

        // rip the `ret` back out so the block no longer terminates
        let mut cursor = FuncCursor::over(module.function_mut(func));
        let block = cursor.next_block().unwrap();

        cursor.goto_last_inst(block);
        cursor.remove_inst();

        let errors = verify_module(&module).unwrap_err();

        assert!(errors.iter().any(|(message, _)| message.contains("terminator")));
    }

    #[test]
    fn rejects_phi_missing_a_predecessor() {
        let mut module = Module::new("verify");
        let sig = SigBuilder::new().param(Type::bool()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("half_phi", sig);
        let entry = b.create_block("entry");
        let left = b.create_block("left");
        let right = b.create_block("right");
        let merge = b.create_block("merge");

        b.switch_to(entry);

        let params = b.append_func_params();

        b.append().condbr(params[0], left, right, DebugInfo::fake());
        b.switch_to(left);

        let one = b.append().iconst(Type::i32(), 1, DebugInfo::fake());

        b.append().br(merge, DebugInfo::fake());
        b.switch_to(right);
        b.append().iconst(Type::i32(), 2, DebugInfo::fake());
        b.append().br(merge, DebugInfo::fake());
        b.switch_to(merge);

        let result = b.append().phi(Type::i32(), &[(left, one)], DebugInfo::fake());

        b.append().ret_val(result, DebugInfo::fake());
        b.define();

        let errors = verify_module(&module).unwrap_err();

        assert!(errors.iter().any(|(message, _)| message.contains("every predecessor")));
    }

    #[test]
    fn rejects_call_with_wrong_signature() {
        let mut module = Module::new("verify");
        let callee_sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let callee = module.declare_function("callee", callee_sig);

        let caller_sig = SigBuilder::new().param(Type::i64()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("caller", caller_sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();

        // the imported signature takes an `i64`, the real callee takes `i32`
        let lied = SigBuilder::new().param(Type::i64()).ret(Some(Type::i32())).build();
        let sig = b.import_signature(&lied);
        let call = b.append().call(callee, sig, &params, DebugInfo::fake());
        let result = b.inst_to_result(call).unwrap();

        b.append().ret_val(result, DebugInfo::fake());
        b.define();

        let errors = verify_module(&module).unwrap_err();

        assert!(errors.iter().any(|(message, _)| message.contains("signature")));
    }
}
