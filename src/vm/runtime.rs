//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the reference runtime for CIR, a checked tree-walking
//! interpreter that executes the in-memory form of a module directly.

use crate::analysis::stringify_ty;
use crate::arena::SecondaryMap;
use crate::ir::{
    BinaryInst, DataFlowGraph, Func, ICmpOp, Inst, InstData, Module, StackSlot, Type, Value,
};
use crate::vm::{ExecutionError, ForeignValue};
use smallvec::SmallVec;
use std::iter;
use tracing::debug;

const MAX_CALL_DEPTH: usize = 256;

/// A single activation of a CIR function.
///
/// Every value held here is already masked to the width of its type,
/// [`Self::define`] is the only writer and it masks unconditionally.
/// Pointer values index into `cells` and are meaningless in any other
/// activation.
#[derive(Default)]
struct Frame {
    values: SecondaryMap<Value, u64>,
    slots: SecondaryMap<StackSlot, usize>,
    cells: Vec<u64>,
}

impl Frame {
    fn read(&self, value: Value) -> Result<u64, ExecutionError> {
        match self.values.get(value) {
            Some(raw) => Ok(*raw),
            None => Err(ExecutionError::UndefinedValue),
        }
    }

    fn define(&mut self, dfg: &DataFlowGraph, inst: Inst, raw: u64) {
        if let Some(result) = dfg.inst_to_result(inst) {
            self.values.insert(result, mask_to(dfg.ty(result), raw));
        }
    }
}

/// The reference execution engine for CIR.
///
/// This walks the in-memory form of the module directly without lowering
/// it first, so it is not fast, but every transfer of control and every
/// operand read is checked. Running a malformed or hostile module yields
/// an [`ExecutionError`] instead of doing anything undefined.
///
/// ```
/// # use citrine::ir::*;
/// # use citrine::vm::*;
/// # fn build() -> Module { Module::new("demo") }
/// let runtime = Runtime::with_module(build());
///
/// match runtime.call("main", &[]) {
///     Ok(result) => println!("returned {result:?}"),
///     Err(e) => eprintln!("execution failed: {e}"),
/// }
/// ```
pub struct Runtime {
    module: Module,
}

impl Runtime {
    /// Creates a runtime that executes functions from `module`.
    pub fn with_module(module: Module) -> Self {
        Self { module }
    }

    /// Gets the module being executed.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Consumes the runtime and yields the module back.
    pub fn into_module(self) -> Module {
        self.module
    }

    /// Calls the function named `name` with `args` and runs it to
    /// completion.
    ///
    /// Returns the value the function returned, or `None` if the
    /// function returns `void`. Arguments are checked against the
    /// callee's signature before anything executes.
    pub fn call(
        &self,
        name: &str,
        args: &[ForeignValue],
    ) -> Result<Option<ForeignValue>, ExecutionError> {
        let func = match self.module.find_function_by_name(name) {
            Some(func) => func,
            None => {
                return Err(ExecutionError::UnknownFunction {
                    name: name.to_owned(),
                })
            }
        };

        let sig = self.module.function(func).signature();

        if sig.params().len() != args.len() {
            return Err(ExecutionError::ArgumentCount {
                name: name.to_owned(),
                expected: sig.params().len(),
                given: args.len(),
            });
        }

        for (index, (param, arg)) in iter::zip(sig.params(), args).enumerate() {
            if *param != arg.ty() {
                return Err(ExecutionError::ArgumentType {
                    name: name.to_owned(),
                    index,
                });
            }
        }

        if let Some(ty) = sig.return_ty() {
            if ty.is_ptr() {
                return Err(ExecutionError::UnsupportedBoundaryType {
                    ty: stringify_ty(ty),
                });
            }
        }

        debug!(func = name, "executing function");

        let raw_args: SmallVec<[u64; 4]> = args.iter().map(|arg| arg.raw()).collect();
        let returned = self.eval(func, &raw_args, 0)?;

        Ok(match (returned, sig.return_ty()) {
            (Some(raw), Some(ty)) => Some(ForeignValue::from_raw(ty, raw)),
            _ => None,
        })
    }

    fn eval(&self, func: Func, args: &[u64], depth: usize) -> Result<Option<u64>, ExecutionError> {
        if depth > MAX_CALL_DEPTH {
            return Err(ExecutionError::CallDepthExceeded);
        }

        let function = self.module.function(func);
        let def = match function.definition() {
            Some(def) => def,
            None => {
                return Err(ExecutionError::NotDefined {
                    name: function.name().to_owned(),
                })
            }
        };

        let mut frame = Frame::default();

        for (&param, &raw) in iter::zip(def.dfg.func_params(), args) {
            frame.values.insert(param, mask_to(def.dfg.ty(param), raw));
        }

        for (slot, _) in def.dfg.stack_slots() {
            frame.slots.insert(slot, frame.cells.len());
            frame.cells.push(0);
        }

        let mut block = match def.layout.entry_block() {
            Some(entry) => entry,
            None => return Err(ExecutionError::MalformedBody),
        };
        let mut prev = None;

        'blocks: loop {
            // phis all read against the state on entry to the block, none
            // of them may observe the result of a phi beside it
            let mut staged = SmallVec::<[(Inst, u64); 2]>::new();

            for inst in def.layout.insts_in_block(block) {
                let phi = match def.dfg.inst_data(inst) {
                    InstData::Phi(phi) => phi,
                    _ => break,
                };

                let pred = prev.ok_or(ExecutionError::MalformedBody)?;
                let incoming = match phi.value_from(pred) {
                    Some(incoming) => incoming,
                    None => return Err(ExecutionError::MalformedBody),
                };

                staged.push((inst, frame.read(incoming)?));
            }

            for (inst, raw) in staged {
                frame.define(&def.dfg, inst, raw);
            }

            for inst in def.layout.insts_in_block(block) {
                match def.dfg.inst_data(inst) {
                    InstData::Phi(_) => continue,
                    InstData::IConst(iconst) => frame.define(&def.dfg, inst, iconst.value()),
                    InstData::IAdd(add) => {
                        let (lhs, rhs) = operands(&frame, add)?;

                        frame.define(&def.dfg, inst, lhs.wrapping_add(rhs));
                    }
                    InstData::ISub(sub) => {
                        let (lhs, rhs) = operands(&frame, sub)?;

                        frame.define(&def.dfg, inst, lhs.wrapping_sub(rhs));
                    }
                    InstData::IMul(mul) => {
                        let (lhs, rhs) = operands(&frame, mul)?;

                        frame.define(&def.dfg, inst, lhs.wrapping_mul(rhs));
                    }
                    InstData::SRem(srem) => {
                        let ty = def.dfg.ty(srem.lhs());
                        let (lhs, rhs) = operands(&frame, srem)?;

                        if rhs == 0 {
                            return Err(ExecutionError::RemainderByZero);
                        }

                        let rem = sign_extend(ty, lhs).wrapping_rem(sign_extend(ty, rhs));

                        frame.define(&def.dfg, inst, rem as u64);
                    }
                    InstData::ICmp(icmp) => {
                        let ty = def.dfg.ty(icmp.lhs());
                        let (lhs, rhs) = operands(&frame, icmp)?;

                        frame.define(&def.dfg, inst, compare(icmp.op(), ty, lhs, rhs) as u64);
                    }
                    InstData::StackSlot(stackslot) => {
                        let cell = match frame.slots.get(stackslot.slot()) {
                            Some(cell) => *cell,
                            None => return Err(ExecutionError::MalformedBody),
                        };

                        frame.define(&def.dfg, inst, cell as u64);
                    }
                    InstData::Load(load) => {
                        let addr = frame.read(load.pointer())? as usize;
                        let raw = match frame.cells.get(addr) {
                            Some(cell) => *cell,
                            None => return Err(ExecutionError::InvalidPointer),
                        };

                        frame.define(&def.dfg, inst, raw);
                    }
                    InstData::Store(store) => {
                        let raw = frame.read(store.stored())?;
                        let addr = frame.read(store.pointer())? as usize;

                        match frame.cells.get_mut(addr) {
                            Some(cell) => *cell = raw,
                            None => return Err(ExecutionError::InvalidPointer),
                        }
                    }
                    InstData::Call(call) => {
                        let mut args = SmallVec::<[u64; 4]>::new();

                        for &arg in call.args() {
                            args.push(frame.read(arg)?);
                        }

                        if let Some(raw) = self.eval(call.callee(), &args, depth + 1)? {
                            frame.define(&def.dfg, inst, raw);
                        }
                    }
                    InstData::Br(br) => {
                        prev = Some(block);
                        block = br.target();

                        continue 'blocks;
                    }
                    InstData::CondBr(condbr) => {
                        let cond = frame.read(condbr.condition())?;

                        prev = Some(block);
                        block = if cond != 0 {
                            condbr.true_branch()
                        } else {
                            condbr.false_branch()
                        };

                        continue 'blocks;
                    }
                    InstData::Ret(ret) => {
                        return match ret.value() {
                            Some(value) => Ok(Some(frame.read(value)?)),
                            None => Ok(None),
                        }
                    }
                }
            }

            // fell off the end of the block without reaching a terminator
            return Err(ExecutionError::MalformedBody);
        }
    }
}

fn operands(frame: &Frame, inst: &impl BinaryInst) -> Result<(u64, u64), ExecutionError> {
    Ok((frame.read(inst.lhs())?, frame.read(inst.rhs())?))
}

fn mask_to(ty: Type, raw: u64) -> u64 {
    match ty {
        Type::Bool(_) => raw & 1,
        Type::Ptr(_) => raw,
        Type::Int(int) => raw & int.mask(),
    }
}

fn sign_extend(ty: Type, raw: u64) -> i64 {
    let shift = match ty.as_int() {
        Some(int) => 64 - int.width(),
        None => 0,
    };

    ((raw << shift) as i64) >> shift
}

fn compare(op: ICmpOp, ty: Type, lhs: u64, rhs: u64) -> bool {
    let (sl, sr) = (sign_extend(ty, lhs), sign_extend(ty, rhs));

    match op {
        ICmpOp::EQ => lhs == rhs,
        ICmpOp::NE => lhs != rhs,
        ICmpOp::SGT => sl > sr,
        ICmpOp::SLT => sl < sr,
        ICmpOp::SGE => sl >= sr,
        ICmpOp::SLE => sl <= sr,
        ICmpOp::UGT => lhs > rhs,
        ICmpOp::ULT => lhs < rhs,
        ICmpOp::UGE => lhs >= rhs,
        ICmpOp::ULE => lhs <= rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DebugInfo, InstBuilder, SigBuilder};

    #[test]
    fn executes_straightline_arithmetic() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("square", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let product = b.append().imul(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(product, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let result = runtime.call("square", &[ForeignValue::Int32(7)]).unwrap();

        assert_eq!(result, Some(ForeignValue::Int32(49)));
    }

    #[test]
    fn wraps_at_the_type_width() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new()
            .param(Type::i8())
            .param(Type::i8())
            .ret(Some(Type::i8()))
            .build();
        let mut b = module.define_function("add8", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let result = runtime
            .call("add8", &[ForeignValue::Int8(200), ForeignValue::Int8(100)])
            .unwrap();

        assert_eq!(result, Some(ForeignValue::Int8(44)));
    }

    #[test]
    fn follows_branches_and_phis() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new()
            .param(Type::i32())
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("max", sig);
        let entry = b.create_block("entry");
        let bigger = b.create_block("bigger");
        let smaller = b.create_block("smaller");
        let merge = b.create_block("merge");

        b.switch_to(entry);

        let params = b.append_func_params();
        let cmp = b.append().icmp_sgt(params[0], params[1], DebugInfo::fake());

        b.append().condbr(cmp, bigger, smaller, DebugInfo::fake());
        b.switch_to(bigger);
        b.append().br(merge, DebugInfo::fake());
        b.switch_to(smaller);
        b.append().br(merge, DebugInfo::fake());
        b.switch_to(merge);

        let result = b.append().phi(
            Type::i32(),
            &[(bigger, params[0]), (smaller, params[1])],
            DebugInfo::fake(),
        );

        b.append().ret_val(result, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let max = |a: u32, b: u32| {
            runtime
                .call("max", &[ForeignValue::Int32(a), ForeignValue::Int32(b)])
                .unwrap()
        };

        assert_eq!(max(3, 9), Some(ForeignValue::Int32(9)));
        assert_eq!(max(9, 3), Some(ForeignValue::Int32(9)));

        // u32::MAX is -1 when compared signed
        assert_eq!(max(u32::MAX, 3), Some(ForeignValue::Int32(3)));
    }

    #[test]
    fn stack_slots_round_trip() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("spill", sig);
        let slot = b.create_stack_slot("tmp", Type::i32());
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let addr = b.append().stackslot(slot, DebugInfo::fake());

        b.append().store(params[0], addr, DebugInfo::fake());

        let reloaded = b.append().load(Type::i32(), addr, DebugInfo::fake());

        b.append().ret_val(reloaded, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let result = runtime.call("spill", &[ForeignValue::Int32(41)]).unwrap();

        assert_eq!(result, Some(ForeignValue::Int32(41)));
    }

    #[test]
    fn calls_between_functions() {
        let mut module = Module::new("vm");
        let double_sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("double", double_sig.clone());
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());

        let double = b.define();

        let mut b = module.define_function("quad", double_sig.clone());
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sig = b.import_signature(&double_sig);
        let once = b.append().call(double, sig, &[params[0]], DebugInfo::fake());
        let once = b.inst_to_result(once).unwrap();
        let twice = b.append().call(double, sig, &[once], DebugInfo::fake());
        let twice = b.inst_to_result(twice).unwrap();

        b.append().ret_val(twice, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let result = runtime.call("quad", &[ForeignValue::Int32(5)]).unwrap();

        assert_eq!(result, Some(ForeignValue::Int32(20)));
    }

    #[test]
    fn srem_by_zero_reports() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new()
            .param(Type::i32())
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("rem", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let rem = b.append().srem(params[0], params[1], DebugInfo::fake());

        b.append().ret_val(rem, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let ok = runtime
            .call("rem", &[ForeignValue::Int32(10), ForeignValue::Int32(3)])
            .unwrap();

        assert_eq!(ok, Some(ForeignValue::Int32(1)));

        let err = runtime.call("rem", &[ForeignValue::Int32(10), ForeignValue::Int32(0)]);

        assert!(matches!(err, Err(ExecutionError::RemainderByZero)));
    }

    #[test]
    fn calls_that_never_bottom_out_stop() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new().ret(Some(Type::i32())).build();
        let mut b = module.define_function("forever", sig.clone());
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let imported = b.import_signature(&sig);
        let func = b.current_func();
        let call = b.append().call(func, imported, &[], DebugInfo::fake());
        let result = b.inst_to_result(call).unwrap();

        b.append().ret_val(result, DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);
        let err = runtime.call("forever", &[]);

        assert!(matches!(err, Err(ExecutionError::CallDepthExceeded)));
    }

    #[test]
    fn argument_mismatches_are_rejected() {
        let mut module = Module::new("vm");
        let sig = SigBuilder::new().param(Type::i32()).ret(None).build();
        let mut b = module.define_function("sink", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);
        b.append_func_params();
        b.append().ret_void(DebugInfo::fake());
        b.define();

        let runtime = Runtime::with_module(module);

        assert!(matches!(
            runtime.call("sink", &[]),
            Err(ExecutionError::ArgumentCount { expected: 1, given: 0, .. })
        ));
        assert!(matches!(
            runtime.call("sink", &[ForeignValue::Int64(0)]),
            Err(ExecutionError::ArgumentType { index: 0, .. })
        ));
        assert!(matches!(
            runtime.call("missing", &[]),
            Err(ExecutionError::UnknownFunction { .. })
        ));
        assert_eq!(runtime.call("sink", &[ForeignValue::Int32(3)]).unwrap(), None);
    }
}
