//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::*;

macro_rules! base_binary_inst {
    ($t:ident, $var:ident, $self:expr, operands: (lhs: $lhs:expr, rhs: $rhs:expr), flags: $flags:expr, $debug:expr) => {{
        let lhs_ty = $self.dfg().ty($lhs);

        debug_assert_eq!(
            $self.dfg().ty($lhs),
            $self.dfg().ty($rhs),
            "operands must be same type"
        );
        debug_assert!(lhs_ty.is_int(), "operands must be integers");

        let inst = $t::new(lhs_ty, $lhs, $rhs, $flags);

        $self.build_result(InstData::$var(inst), $debug)
    }};
}

macro_rules! commutative_arith_integral {
    ($var:ident, $self:expr, operands: ($lhs:expr, $rhs:expr), flags: $flags:expr, $debug:expr) => {{
        base_binary_inst!(
            CommutativeArithInst,
            $var,
            $self,
            operands: (lhs: $lhs, rhs: $rhs),
            flags: $flags,
            $debug
        )
    }};
}

macro_rules! arith_integral {
    ($var:ident, $self:expr, operands: ($lhs:expr, $rhs:expr), flags: $flags:expr, $debug:expr) => {{
        base_binary_inst!(
            ArithInst,
            $var,
            $self,
            operands: (lhs: $lhs, rhs: $rhs),
            flags: $flags,
            $debug
        )
    }};
}

/// Helper trait that allows easy creation of instruction builders. This trait
/// provides a variety of helper methods that build instructions and inserts them
/// in whatever way the trait implementor defines.
///
/// This is used for the append/insert builders, along with any other more
/// situational ones scattered around the codebase.
pub trait InstBuilder<'dfg>: Sized {
    /// Gets the data-flow graph in use for the inserter
    fn dfg(&self) -> &DataFlowGraph;

    /// "Builds" a single instruction and inserts it in whatever way
    /// the particular [`InstBuilder`] sees fit.
    ///
    /// This returns a reference to the instruction and possibly a
    /// reference to the result of that instruction.
    fn build(self, data: InstData, debug: DebugInfo) -> (Inst, Option<Value>);

    /// Builds an instruction and returns its result.
    fn build_result(self, data: InstData, debug: DebugInfo) -> Value {
        self.build(data, debug)
            .1
            .expect("expected a result for instruction")
    }

    /// Builds an instruction and returns the instruction
    fn build_inst(self, data: InstData, debug: DebugInfo) -> Inst {
        self.build(data, debug).0
    }

    /// Builds a `call` instruction to a statically-known function.
    fn call(self, callee: Func, sig: Sig, args: &[Value], debug: DebugInfo) -> Inst {
        let output = self.dfg().signature(sig).return_ty();
        let call = CallInst::new(output, sig, callee, args);

        self.build_inst(InstData::Call(call), debug)
    }

    /// Builds an `icmp` instruction
    fn icmp(self, cmp: ICmpOp, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        debug_assert_eq!(self.dfg().ty(lhs), self.dfg().ty(rhs));
        debug_assert!({
            let ty = self.dfg().ty(lhs);

            ty.is_int() || ty.is_bool() || ty.is_ptr()
        });

        let icmp = ICmpInst::new(cmp, lhs, rhs);

        self.build_result(InstData::ICmp(icmp), debug)
    }

    /// Builds an `icmp eq` instruction
    fn icmp_eq(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        self.icmp(ICmpOp::EQ, lhs, rhs, debug)
    }

    /// Builds an `icmp ne` instruction
    fn icmp_ne(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        self.icmp(ICmpOp::NE, lhs, rhs, debug)
    }

    /// Builds an `icmp sgt` instruction
    fn icmp_sgt(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        self.icmp(ICmpOp::SGT, lhs, rhs, debug)
    }

    /// Builds a `br` instruction
    fn br(self, target: Block, debug: DebugInfo) -> Inst {
        debug_assert!(self.dfg().is_block_inserted(target));

        let br = BrInst::new(target);

        self.build_inst(InstData::Br(br), debug)
    }

    /// Builds a `condbr` instruction
    fn condbr(self, cond: Value, if_true: Block, if_false: Block, debug: DebugInfo) -> Inst {
        debug_assert!(self.dfg().is_block_inserted(if_true));
        debug_assert!(self.dfg().is_block_inserted(if_false));
        debug_assert_eq!(self.dfg().ty(cond), Type::bool());

        let cbr = CondBrInst::new(cond, if_true, if_false);

        self.build_inst(InstData::CondBr(cbr), debug)
    }

    /// Builds a `ret` instruction that possibly returns a value
    /// and possibly returns `void`.
    fn ret(self, value: Option<Value>, debug: DebugInfo) -> Inst {
        self.build_inst(InstData::Ret(RetInst::new(value)), debug)
    }

    /// Shorthand for [`Self::ret`] with a `Some`.
    fn ret_val(self, value: Value, debug: DebugInfo) -> Inst {
        self.ret(Some(value), debug)
    }

    /// Shorthand for [`Self::ret`] with a `None`.
    fn ret_void(self, debug: DebugInfo) -> Inst {
        self.ret(None, debug)
    }

    /// Builds an `iadd` instruction
    fn iadd(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        self.iadd_with_flags(lhs, rhs, ArithFlags::empty(), debug)
    }

    /// Builds an `iadd` instruction carrying a set of overflow guarantees
    fn iadd_with_flags(self, lhs: Value, rhs: Value, flags: ArithFlags, debug: DebugInfo) -> Value {
        commutative_arith_integral!(IAdd, self, operands: (lhs, rhs), flags: flags, debug)
    }

    /// Builds an `isub` instruction
    fn isub(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        self.isub_with_flags(lhs, rhs, ArithFlags::empty(), debug)
    }

    /// Builds an `isub` instruction carrying a set of overflow guarantees
    fn isub_with_flags(self, lhs: Value, rhs: Value, flags: ArithFlags, debug: DebugInfo) -> Value {
        arith_integral!(ISub, self, operands: (lhs, rhs), flags: flags, debug)
    }

    /// Builds an `imul` instruction
    fn imul(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        self.imul_with_flags(lhs, rhs, ArithFlags::empty(), debug)
    }

    /// Builds an `imul` instruction carrying a set of overflow guarantees
    fn imul_with_flags(self, lhs: Value, rhs: Value, flags: ArithFlags, debug: DebugInfo) -> Value {
        commutative_arith_integral!(IMul, self, operands: (lhs, rhs), flags: flags, debug)
    }

    /// Builds an `srem` instruction
    fn srem(self, lhs: Value, rhs: Value, debug: DebugInfo) -> Value {
        arith_integral!(SRem, self, operands: (lhs, rhs), flags: ArithFlags::empty(), debug)
    }

    /// Builds a `load` instruction
    fn load(self, ty: Type, ptr: Value, debug: DebugInfo) -> Value {
        debug_assert_eq!(self.dfg().ty(ptr), Type::ptr());

        let inst = LoadInst::new(ptr, ty);

        self.build_result(InstData::Load(inst), debug)
    }

    /// Builds a `store` instruction
    fn store(self, val: Value, ptr: Value, debug: DebugInfo) -> Inst {
        debug_assert_eq!(self.dfg().ty(ptr), Type::ptr());

        let inst = StoreInst::new(ptr, val);

        self.build_inst(InstData::Store(inst), debug)
    }

    /// Builds an `iconst` instruction
    fn iconst(self, into: Type, from: u64, debug: DebugInfo) -> Value {
        debug_assert!(into.is_int());

        self.build_result(InstData::IConst(IConstInst::new(into, from)), debug)
    }

    /// Builds a `stackslot` instruction
    fn stackslot(self, slot: StackSlot, debug: DebugInfo) -> Value {
        self.build_result(InstData::StackSlot(StackSlotInst::new(slot)), debug)
    }

    /// Builds a `phi` instruction that merges one value per predecessor.
    fn phi(self, ty: Type, incoming: &[(Block, Value)], debug: DebugInfo) -> Value {
        debug_assert!(!incoming.is_empty(), "phi must have at least one incoming value");
        debug_assert!(incoming
            .iter()
            .all(|(bb, val)| self.dfg().is_block_inserted(*bb) && self.dfg().ty(*val) == ty));

        let phi = PhiInst::new(ty, incoming);

        self.build_result(InstData::Phi(phi), debug)
    }
}
