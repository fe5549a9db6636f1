//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, Func, Sig, StackSlot, Type, Value};
use bitflags::bitflags;
use smallvec::SmallVec;
use std::{iter, mem, slice};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// This holds both the opcode of a given instruction and all the state
/// that makes up that specific instruction.
///
/// While each instruction may have wildly different actual data, they all
/// are stored in the same table and all inside the same `InstData` type.
#[repr(u32)]
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum InstData {
    /// `call T @function(args...)`, models a direct call to a known function.
    Call(CallInst),
    /// `icmp op T %a, %b`, models an integer comparison
    ICmp(ICmpInst),
    /// `br block`, models an unconditional branch
    Br(BrInst),
    /// `condbr bool %cond, if block1, else block2`, models a conditional branch between two blocks
    CondBr(CondBrInst),
    /// `ret T %val`, returns from the current function
    Ret(RetInst),
    /// `iadd T %a, %b`, performs two's complement addition
    IAdd(CommutativeArithInst),
    /// `isub T %a, %b`, performs two's complement subtraction
    ISub(ArithInst),
    /// `imul T %a, %b`, performs two's complement multiplication
    IMul(CommutativeArithInst),
    /// `srem T %a, %b`, gets the remainder of performing signed division
    SRem(ArithInst),
    /// `load T, ptr %p`, loads from a pointer
    Load(LoadInst),
    /// `store T %a, ptr %p`, stores a value to a pointer
    Store(StoreInst),
    /// `iconst T N`, materializes an integer constant
    IConst(IConstInst),
    /// `stackslot $name`, materializes a pointer to stack memory
    StackSlot(StackSlotInst),
    /// `phi T [ block1, %a ], [ block2, %b ]`, merges values at a control-flow join
    Phi(PhiInst),
}

/// An "opcode" for an instruction, i.e. the discriminant of the [`InstData`]
/// variant holding the instruction's payload.
pub type Opcode = mem::Discriminant<InstData>;

impl InstData {
    /// Gets the discriminant of the [`InstData`], this is the "opcode"
    /// of the instruction. This can be used to trivially check if two
    /// instructions are the same variant without needing the `mem::discriminant`
    /// boilerplate.
    pub fn opc(&self) -> Opcode {
        mem::discriminant(self)
    }

    /// Views the instruction as a [`Terminator`], if it is one.
    pub fn as_terminator(&self) -> Option<&dyn Terminator> {
        match self {
            InstData::Br(e) => Some(e),
            InstData::CondBr(e) => Some(e),
            InstData::Ret(e) => Some(e),
            _ => None,
        }
    }

    /// Checks if the instruction ends a basic block.
    pub fn is_terminator(&self) -> bool {
        self.as_terminator().is_some()
    }

    /// Checks if `self` is a constant materialization instruction.
    pub fn is_constant(&self) -> bool {
        matches!(self, InstData::IConst(_))
    }

    /// Gets the blocks this instruction could transfer control to, if it
    /// is a terminator. `ret` yields an empty list.
    pub fn targets(&self) -> Option<&[Block]> {
        self.as_terminator().map(|term| term.targets())
    }
}

macro_rules! for_each_inst {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            InstData::Call(e) => e.$method($($arg),*),
            InstData::ICmp(e) => e.$method($($arg),*),
            InstData::Br(e) => e.$method($($arg),*),
            InstData::CondBr(e) => e.$method($($arg),*),
            InstData::Ret(e) => e.$method($($arg),*),
            InstData::IAdd(e) => e.$method($($arg),*),
            InstData::ISub(e) => e.$method($($arg),*),
            InstData::IMul(e) => e.$method($($arg),*),
            InstData::SRem(e) => e.$method($($arg),*),
            InstData::Load(e) => e.$method($($arg),*),
            InstData::Store(e) => e.$method($($arg),*),
            InstData::IConst(e) => e.$method($($arg),*),
            InstData::StackSlot(e) => e.$method($($arg),*),
            InstData::Phi(e) => e.$method($($arg),*),
        }
    };
}

impl Instruction for InstData {
    fn operands(&self) -> &[Value] {
        for_each_inst!(self, operands)
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        for_each_inst!(self, __operands_dfg_mut)
    }

    fn result_ty(&self) -> Option<Type> {
        for_each_inst!(self, result_ty)
    }
}

/// These are the properties that any transform or analysis pass needs to be
/// able to observe for any given instruction in any block.
///
/// Any instruction's data can be passed as a `&dyn Instruction`, because every
/// valid opcode has at least an implementation for `Instruction`.
pub trait Instruction {
    /// Gets any operands that the instruction operates on.
    ///
    /// Note that this may be an empty array, it is not safe to assume that
    /// there will be at least one operand.
    fn operands(&self) -> &[Value];

    #[doc(hidden)]
    fn __operands_dfg_mut(&mut self) -> &mut [Value];

    /// Gets the type of the instruction's result after it has been evaluated.
    ///
    /// Not all instructions will have one of these, e.g. terminators and
    /// `store`s do not evaluate to anything.
    fn result_ty(&self) -> Option<Type>;

    /// Checks if the instruction yields any results at all.
    fn has_result(&self) -> bool {
        self.result_ty().is_some()
    }
}

/// Some instructions model binary operations, those instructions model this trait.
///
/// A valid assumption for any type implementing this trait is that the operands
/// returned by [`Instruction::operands`] has a length of exactly 2. However,
/// it is not valid to assume that any instruction implementing this follows the
/// same pattern as most arithmetic instructions (i.e. [`Self::lhs`] and [`Self::rhs`]
/// do **not** always have the same type, and [`Instruction::result_ty`] may be
/// different from the type of the operands).
pub trait BinaryInst: Instruction {
    /// Gets the left-hand operand of the instruction. For `inst T %a, %b`,
    /// this would be `%a`.
    fn lhs(&self) -> Value {
        self.operands()[0]
    }

    /// Gets the right-hand operand of the instruction. For `inst T %a, %b`,
    /// this would be `%b`.
    fn rhs(&self) -> Value {
        self.operands()[1]
    }

    /// Checks if the binary instruction follows the commutative property, i.e.
    /// whether it is safe to swap the operands while preserving the behavior.
    fn is_commutative(&self) -> bool;
}

/// Models a terminator, i.e. the only instructions that are allowed at the end
/// of a basic block.
///
/// All terminators transfer control flow *somewhere* unless they end execution,
/// so users need to be able to query where control could be transferred to.
pub trait Terminator: Instruction {
    /// Gets the possible blocks where control could be transferred to
    /// once this instruction is executed.
    ///
    /// Note that this might be empty, see `ret`.
    fn targets(&self) -> &[Block];

    #[doc(hidden)]
    fn __operands(&self) -> &[Value];

    #[doc(hidden)]
    fn __operands_mut(&mut self) -> &mut [Value];
}

impl<T: Terminator> Instruction for T {
    fn operands(&self) -> &[Value] {
        self.__operands()
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        self.__operands_mut()
    }

    fn result_ty(&self) -> Option<Type> {
        None
    }
}

/// Models the different ways that integer values can be compared
/// using the `icmp` instruction.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ICmpOp {
    /// `eq`, checks if the integers are (bitwise) equivalent
    EQ,
    /// `ne`, checks if the integers are (bitwise) not-equal
    NE,
    /// `sgt`, treats both integers as signed and checks if `a > b`
    SGT,
    /// `slt`, treats both integers as signed and checks if `a < b`
    SLT,
    /// `sge`, treats both integers as signed and checks if `a >= b`
    SGE,
    /// `sle`, treats both integers as signed and checks if `a <= b`
    SLE,
    /// `ugt`, treats both integers as unsigned and checks if `a > b`
    UGT,
    /// `ult`, treats both integers as unsigned and checks if `a < b`
    ULT,
    /// `uge`, treats both integers as unsigned and checks if `a >= b`
    UGE,
    /// `ule`, treats both integers as unsigned and checks if `a <= b`
    ULE,
}

/// Models a single `icmp` instruction.
///
/// ```raw
/// %2 = icmp sgt i32 %0, %1
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ICmpInst {
    comparison: ICmpOp,
    operands: [Value; 2],
}

impl ICmpInst {
    pub(in crate::ir) fn new(cmp: ICmpOp, lhs: Value, rhs: Value) -> Self {
        Self {
            comparison: cmp,
            operands: [lhs, rhs],
        }
    }

    /// Gets the comparison that the `icmp` is performing between
    /// the two operands.
    pub fn op(&self) -> ICmpOp {
        self.comparison
    }
}

impl Instruction for ICmpInst {
    fn operands(&self) -> &[Value] {
        &self.operands
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        &mut self.operands
    }

    fn result_ty(&self) -> Option<Type> {
        Some(Type::bool())
    }
}

impl BinaryInst for ICmpInst {
    fn is_commutative(&self) -> bool {
        matches!(self.op(), ICmpOp::EQ | ICmpOp::NE)
    }
}

/// Models an unconditional branch.
///
/// ```raw
/// br block1
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BrInst {
    target: Block,
}

impl BrInst {
    pub(in crate::ir) fn new(target: Block) -> Self {
        Self { target }
    }

    /// Gets the block being jumped to.
    pub fn target(&self) -> Block {
        self.target
    }
}

impl Terminator for BrInst {
    fn targets(&self) -> &[Block] {
        slice::from_ref(&self.target)
    }

    fn __operands(&self) -> &[Value] {
        &[]
    }

    fn __operands_mut(&mut self) -> &mut [Value] {
        &mut []
    }
}

/// Models a conditional branch.
///
/// ```raw
/// condbr bool %0, block1, block2
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CondBrInst {
    cond: Value,
    targets: [Block; 2],
}

impl CondBrInst {
    pub(in crate::ir) fn new(cond: Value, if_true: Block, otherwise: Block) -> Self {
        Self {
            cond,
            targets: [if_true, otherwise],
        }
    }

    /// Gets the condition being checked in the `condbr`.
    pub fn condition(&self) -> Value {
        self.cond
    }

    /// Gets the block being jumped to if the condition is `true`.
    pub fn true_branch(&self) -> Block {
        self.targets[0]
    }

    /// Gets the block being jumped to if the condition is `false`.
    pub fn false_branch(&self) -> Block {
        self.targets[1]
    }
}

impl Terminator for CondBrInst {
    fn targets(&self) -> &[Block] {
        &self.targets
    }

    fn __operands(&self) -> &[Value] {
        slice::from_ref(&self.cond)
    }

    fn __operands_mut(&mut self) -> &mut [Value] {
        slice::from_mut(&mut self.cond)
    }
}

/// Models a `ret` instruction.
///
/// ```raw
/// ret i32 %0
/// ret void
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct RetInst {
    value: Option<Value>,
}

impl RetInst {
    pub(in crate::ir) fn new(val: Option<Value>) -> Self {
        Self { value: val }
    }

    /// Gets the value being returned, if any.
    pub fn value(&self) -> Option<Value> {
        self.value
    }
}

impl Terminator for RetInst {
    fn targets(&self) -> &[Block] {
        &[]
    }

    fn __operands(&self) -> &[Value] {
        match &self.value {
            Some(val) => slice::from_ref(val),
            None => &[],
        }
    }

    fn __operands_mut(&mut self) -> &mut [Value] {
        match &mut self.value {
            Some(val) => slice::from_mut(val),
            None => &mut [],
        }
    }
}

bitflags! {
    /// Overflow guarantees attached to an integer arithmetic instruction.
    ///
    /// These assert facts about the operands rather than change the
    /// computation, so a rewrite that replaces one arithmetic instruction
    /// with another over the same operands must carry them over verbatim.
    #[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
    #[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize), serde(transparent))]
    pub struct ArithFlags: u32 {
        /// `nsw`, the operation is known not to wrap when treated as signed.
        const NSW = 0b01;
        /// `nuw`, the operation is known not to wrap when treated as unsigned.
        const NUW = 0b10;
    }
}

/// Models a general arithmetic instruction
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArithmeticInst<const COMMUTATIVE: bool> {
    flags: ArithFlags,
    output: Type,
    operands: [Value; 2],
}

impl<const C: bool> ArithmeticInst<C> {
    pub(in crate::ir) fn new(output: Type, lhs: Value, rhs: Value, flags: ArithFlags) -> Self {
        Self {
            flags,
            output,
            operands: [lhs, rhs],
        }
    }

    /// Gets the overflow guarantees attached to the instruction.
    pub fn flags(&self) -> ArithFlags {
        self.flags
    }
}

impl<const C: bool> Instruction for ArithmeticInst<C> {
    fn operands(&self) -> &[Value] {
        &self.operands
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        &mut self.operands
    }

    fn result_ty(&self) -> Option<Type> {
        Some(self.output)
    }
}

impl<const C: bool> BinaryInst for ArithmeticInst<C> {
    fn is_commutative(&self) -> bool {
        C
    }
}

/// An arithmetic instruction where the operand order is significant.
pub type ArithInst = ArithmeticInst<false>;

/// An arithmetic instruction where the operands can be safely swapped.
pub type CommutativeArithInst = ArithmeticInst<true>;

/// Models a direct call to a known function.
///
/// ```raw
/// %2 = call i32 @madd(i32 %0, i32 %1)
/// ```
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CallInst {
    output: Option<Type>,
    // slots 0 and 1 hold the `Sig` and `Func` smuggled in as `Value`s so
    // that one array covers the whole instruction, `args` skips past them
    operands: SmallVec<[Value; 4]>,
}

impl CallInst {
    pub(in crate::ir) fn new(output: Option<Type>, sig: Sig, callee: Func, args: &[Value]) -> Self {
        let sig = iter::once(Value::raw_from(sig));
        let callee = iter::once(Value::raw_from(callee));
        let args = args.iter().copied();

        Self {
            output,
            operands: sig.chain(callee).chain(args).collect(),
        }
    }

    /// Gets the function signature of the callee.
    pub fn sig(&self) -> Sig {
        self.operands[0].raw_into()
    }

    /// Gets the function being called.
    pub fn callee(&self) -> Func {
        // we take the underlying data of the second key and convert it
        // into a function key instead, since that's what it actually is
        self.operands[1].raw_into()
    }

    /// Gets the arguments being passed into the function.
    pub fn args(&self) -> &[Value] {
        match self.operands.get(2..) {
            Some(args) => args,
            None => &[],
        }
    }
}

impl Instruction for CallInst {
    fn operands(&self) -> &[Value] {
        self.args()
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        match self.operands.get_mut(2..) {
            Some(args) => args,
            None => &mut [],
        }
    }

    fn result_ty(&self) -> Option<Type> {
        self.output
    }
}

/// Models a `load` instruction.
///
/// ```raw
/// %1 = load i32, ptr %0
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct LoadInst {
    pointer: Value,
    output: Type,
}

impl LoadInst {
    pub(in crate::ir) fn new(pointer: Value, output: Type) -> Self {
        Self { pointer, output }
    }

    /// Gets the pointer being loaded from.
    pub fn pointer(&self) -> Value {
        self.pointer
    }
}

impl Instruction for LoadInst {
    fn operands(&self) -> &[Value] {
        slice::from_ref(&self.pointer)
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        slice::from_mut(&mut self.pointer)
    }

    fn result_ty(&self) -> Option<Type> {
        Some(self.output)
    }
}

/// Models a `store` instruction.
///
/// ```raw
/// store i32 %1, ptr %0
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StoreInst {
    operands: [Value; 2],
}

impl StoreInst {
    /// The operand slot holding the value being stored, as observed
    /// through [`Instruction::operands`].
    pub const STORED_SLOT: usize = 1;

    pub(in crate::ir) fn new(pointer: Value, val: Value) -> Self {
        Self {
            operands: [pointer, val],
        }
    }

    /// Gets the pointer being written to.
    pub fn pointer(&self) -> Value {
        self.operands[0]
    }

    /// Gets the value being stored.
    pub fn stored(&self) -> Value {
        self.operands[Self::STORED_SLOT]
    }
}

impl Instruction for StoreInst {
    fn operands(&self) -> &[Value] {
        &self.operands
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        &mut self.operands
    }

    fn result_ty(&self) -> Option<Type> {
        None
    }
}

/// Models an `iconst` instruction.
///
/// ```raw
/// %0 = iconst i32 42
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct IConstInst {
    constant: u64,
    mask: u64,
    ty: Type,
}

impl IConstInst {
    pub(in crate::ir) fn new(ty: Type, constant: u64) -> Self {
        Self {
            constant,
            ty,
            mask: ty.unwrap_int().mask(),
        }
    }

    /// Gets the actual const value being yielded, as an unsigned integer
    /// truncated to the width of the result type.
    pub fn value(&self) -> u64 {
        self.constant & self.mask
    }
}

impl Instruction for IConstInst {
    fn operands(&self) -> &[Value] {
        &[]
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        &mut []
    }

    fn result_ty(&self) -> Option<Type> {
        Some(self.ty)
    }
}

/// Models a `stackslot` instruction, materializing a pointer to
/// a stack region declared by the enclosing function.
///
/// ```raw
/// %0 = stackslot $x
/// ```
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StackSlotInst {
    slot: StackSlot,
}

impl StackSlotInst {
    pub(in crate::ir) fn new(slot: StackSlot) -> Self {
        Self { slot }
    }

    /// Gets the slot whose address is being materialized.
    pub fn slot(&self) -> StackSlot {
        self.slot
    }
}

impl Instruction for StackSlotInst {
    fn operands(&self) -> &[Value] {
        &[]
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        &mut []
    }

    fn result_ty(&self) -> Option<Type> {
        Some(Type::ptr())
    }
}

/// Models a `phi` instruction, selecting a value based on which
/// predecessor control arrived from.
///
/// ```raw
/// %2 = phi i32 [ entry, %0 ], [ other, %1 ]
/// ```
///
/// The incoming blocks and incoming values are stored as parallel arrays,
/// entry `i` of each forms one `[ block, value ]` pair. Keeping the values
/// in their own array means they are visible through
/// [`Instruction::operands`] like any other use.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PhiInst {
    output: Type,
    blocks: SmallVec<[Block; 2]>,
    operands: SmallVec<[Value; 2]>,
}

impl PhiInst {
    pub(in crate::ir) fn new(output: Type, incoming: &[(Block, Value)]) -> Self {
        Self {
            output,
            blocks: incoming.iter().map(|(bb, _)| *bb).collect(),
            operands: incoming.iter().map(|(_, val)| *val).collect(),
        }
    }

    /// Gets the `[ block, value ]` pairs of the phi, in the order
    /// they were appended.
    pub fn incoming(&self) -> impl Iterator<Item = (Block, Value)> + '_ {
        iter::zip(self.blocks.iter().copied(), self.operands.iter().copied())
    }

    /// Gets the value the phi takes when control arrives from `pred`,
    /// if `pred` is one of its incoming blocks.
    pub fn value_from(&self, pred: Block) -> Option<Value> {
        self.incoming().find(|(bb, _)| *bb == pred).map(|(_, val)| val)
    }

    pub(in crate::ir) fn append_incoming(&mut self, pred: Block, value: Value) {
        self.blocks.push(pred);
        self.operands.push(value);
    }

    pub(in crate::ir) fn replace_pred(&mut self, from: Block, to: Block) {
        for bb in self.blocks.iter_mut() {
            if *bb == from {
                *bb = to;
            }
        }
    }
}

impl Instruction for PhiInst {
    fn operands(&self) -> &[Value] {
        &self.operands
    }

    fn __operands_dfg_mut(&mut self) -> &mut [Value] {
        &mut self.operands
    }

    fn result_ty(&self) -> Option<Type> {
        Some(self.output)
    }
}
