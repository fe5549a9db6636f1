//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaKey, ArenaMap, SecondaryMap};
use crate::dense_arena_key;
use crate::ir::{
    BasicBlock, Block, DebugInfo, InstData, Instruction, Sig, Signature, StackSlot, StackSlotData,
    Type,
};
use crate::utility::{CiHashMap, Str};
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    struct EntityRef;

    /// A basic reference to some value, either the result of some computation
    /// or a parameter of the enclosing function. Since everything is based
    /// around function-scoped values here, this is effectively equivalent to a
    /// `llvm::Value*`.
    ///
    /// These are completely useless without the associated [`DataFlowGraph`] they
    /// come from, as they are just keys into a giant table. The DFG contains all the
    /// information that actually makes these useful.
    pub struct Value;

    /// While [`Value`]s refer to a result of some sort, [`Inst`]s refer to
    /// the instructions themselves. This has a subtly different meaning: an [`Inst`]
    /// may not actually refer to something that produces a *result*.
    ///
    /// Some instructions only perform side effects (e.g. `store`), some model
    /// control flow (e.g. `ret`, `br`). These can never be referred to with
    /// [`Value`]s, but they *can* be referred to with [`Inst`]s.
    pub struct Inst;
}

// this enables us to turn `Value`s into `Inst`s or `EntityRef`s, this is very
// useful for compact storage in homogenous containers
impl Value {
    pub(in crate::ir) fn raw_from(key: impl ArenaKey) -> Self {
        Self::key_new(key.key_index())
    }

    pub(in crate::ir) fn raw_into<T: ArenaKey>(self) -> T {
        T::key_new(self.key_index())
    }
}

// this enables us to turn `Inst`s into `Value`s or `EntityRef`s, this is very
// useful for compact storage in homogenous containers
impl Inst {
    pub(in crate::ir) fn raw_from(key: impl ArenaKey) -> Self {
        Self::key_new(key.key_index())
    }

    pub(in crate::ir) fn raw_into<T: ArenaKey>(self) -> T {
        T::key_new(self.key_index())
    }
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
struct FuncParam {
    ty: Type,
    index: u32,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
enum EntityData {
    Inst(InstData),
    Param(FuncParam),
}

/// One edge in the def-use graph: a single operand slot of a single
/// instruction that reads a given [`Value`].
///
/// The slot is an index into [`Instruction::operands`] of the consumer,
/// so the same producer can appear in several slots of one instruction
/// and each occurrence gets its own edge.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Use {
    consumer: Inst,
    slot: u32,
}

impl Use {
    /// Gets the instruction reading the value.
    pub fn consumer(self) -> Inst {
        self.consumer
    }

    /// Gets which operand slot of [`Self::consumer`] reads the value.
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

/// Owns all of the instructions, basic blocks, values, and everything else
/// in a given function, and models the data-flow between them.
///
/// An instruction that yields a result shares its table index with that
/// result, so converting between the [`Inst`] and the [`Value`] is free
/// (see [`Self::inst_to_result`] and [`Self::value_to_inst`]).
///
/// The graph also maintains a use-edge index: for every value, the list
/// of `(instruction, operand slot)` pairs currently reading it. Edges are
/// enumerated in the order they were created, which makes every query
/// that picks "the first" of something deterministic for a given build
/// order.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DataFlowGraph {
    entities: ArenaMap<EntityRef, EntityData>,
    uses: SecondaryMap<Value, SmallVec<[Use; 4]>>,
    debug: SecondaryMap<Inst, DebugInfo>,
    blocks: ArenaMap<Block, BasicBlock>,
    sigs: ArenaMap<Sig, Signature>,
    sig_lookup: CiHashMap<Signature, Sig>,
    stack_slots: ArenaMap<StackSlot, StackSlotData>,
    params: SmallVec<[Value; 4]>,
}

impl DataFlowGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an instruction from its data, registering every operand
    /// read as a use-edge. The instruction is not positioned anywhere,
    /// that is the job of the [`Layout`](crate::ir::Layout).
    ///
    /// Returns the instruction, and the [`Value`] referring to its result
    /// if it yields one.
    pub fn create_inst(&mut self, data: InstData, debug: DebugInfo) -> (Inst, Option<Value>) {
        let inst = Inst::raw_from(self.entities.next_key());
        let result = data.has_result().then(|| Value::raw_from(inst));

        for (slot, operand) in data.operands().iter().enumerate() {
            self.record_use(*operand, inst, slot);
        }

        self.entities.insert(EntityData::Inst(data));
        self.debug.insert(inst, debug);

        (inst, result)
    }

    /// Appends a parameter of the enclosing function, yielding the [`Value`]
    /// that reads it. Parameters are numbered in append order.
    pub fn append_func_param(&mut self, ty: Type) -> Value {
        let index = self.params.len() as u32;
        let value = Value::raw_from(self.entities.insert(EntityData::Param(FuncParam { ty, index })));

        self.params.push(value);

        value
    }

    /// Gets the values of the function's parameters, in declaration order.
    pub fn func_params(&self) -> &[Value] {
        &self.params
    }

    /// Creates a new basic block with a given name. The block is empty
    /// until the layout and the instructions say otherwise.
    pub fn create_block(&mut self, name: Str) -> Block {
        self.blocks.insert(BasicBlock::new(name))
    }

    /// Resolves a [`Block`] into its [`BasicBlock`] data.
    pub fn block(&self, block: Block) -> &BasicBlock {
        &self.blocks[block]
    }

    /// Checks whether `block` was created inside this function. This says
    /// nothing about whether the block is currently placed in the layout.
    pub fn is_block_inserted(&self, block: Block) -> bool {
        self.blocks.contains(block)
    }

    /// Finds a block by name, if one was created with that name.
    pub fn find_block(&self, name: Str) -> Option<Block> {
        self.blocks
            .iter()
            .find(|(_, bb)| bb.name() == name)
            .map(|(bb, _)| bb)
    }

    /// Inserts a signature into the function's signature table, reusing
    /// the existing [`Sig`] if an equal signature was imported before.
    pub fn import_signature(&mut self, sig: &Signature) -> Sig {
        if let Some(existing) = self.sig_lookup.get(sig) {
            return *existing;
        }

        let key = self.sigs.insert(sig.clone());

        self.sig_lookup.insert(sig.clone(), key);

        key
    }

    /// Gets a function's [`Signature`] from a given [`Sig`]. Any [`Sig`]
    /// used by any calls inside the function body can be resolved here.
    pub fn signature(&self, sig: Sig) -> &Signature {
        &self.sigs[sig]
    }

    /// Declares a stack slot for the enclosing function.
    pub fn create_stack_slot(&mut self, name: Str, ty: Type) -> StackSlot {
        self.stack_slots.insert(StackSlotData::new(name, ty))
    }

    /// Resolves a [`StackSlot`] into the data it was declared with.
    pub fn stack_slot(&self, slot: StackSlot) -> &StackSlotData {
        &self.stack_slots[slot]
    }

    /// Iterates over every stack slot declared by the function.
    pub fn stack_slots(&self) -> impl Iterator<Item = (StackSlot, &StackSlotData)> {
        self.stack_slots.iter()
    }

    /// Gets a single instruction's [`InstData`] from a given [`Inst`].
    /// Any [`Inst`] used anywhere in this function can be resolved here.
    pub fn inst_data(&self, inst: Inst) -> &InstData {
        match &self.entities[inst.raw_into()] {
            EntityData::Inst(data) => data,
            _ => panic!("got an `Inst` that did not refer to an instruction"),
        }
    }

    /// Gets the debug info that an instruction was created with.
    pub fn debug_info(&self, inst: Inst) -> DebugInfo {
        self.debug[inst]
    }

    /// Gets the type that a given [`Value`] evaluates to.
    pub fn ty(&self, value: Value) -> Type {
        match &self.entities[value.raw_into()] {
            EntityData::Param(p) => p.ty,
            EntityData::Inst(i) => match i.result_ty() {
                Some(ty) => ty,
                None => panic!("got a `Value` referring to an instruction that doesn't yield a result"),
            },
        }
    }

    /// Checks whether a value is a parameter of the enclosing function.
    pub fn is_param(&self, value: Value) -> bool {
        matches!(&self.entities[value.raw_into()], EntityData::Param(_))
    }

    /// If `value` is the result of an instruction, gets that instruction.
    pub fn value_to_inst(&self, value: Value) -> Option<Inst> {
        match &self.entities[value.raw_into()] {
            EntityData::Inst(_) => Some(Inst::raw_from(value)),
            _ => None,
        }
    }

    /// If `inst` yields a result, gets the [`Value`] referring to it.
    pub fn inst_to_result(&self, inst: Inst) -> Option<Value> {
        self.inst_data(inst)
            .has_result()
            .then(|| Value::raw_from(inst))
    }

    /// Gets the use-edges currently reading `value`, in the order the
    /// edges were created.
    ///
    /// Creating an instruction appends one edge per operand slot reading
    /// the value, and [`Self::replace_uses_with`] moves edges over while
    /// preserving their relative order. Nothing ever reorders the list,
    /// so "first use matching P" is a deterministic query.
    pub fn uses(&self, value: Value) -> &[Use] {
        match self.uses.get(value) {
            Some(edges) => edges,
            None => &[],
        }
    }

    /// Rewrites every use of `old` to read `new` instead, updating the
    /// use-edge index to match. `old` is left with no uses.
    ///
    /// The moved edges are appended onto `new`'s existing edges in the
    /// order they had as uses of `old`.
    pub fn replace_uses_with(&mut self, old: Value, new: Value) {
        debug_assert_ne!(old, new, "tried to replace a value with itself");

        let edges = match self.uses.get_mut(old) {
            Some(edges) => std::mem::take(edges),
            None => return,
        };

        for edge in edges.iter() {
            self.inst_data_mut(edge.consumer).__operands_dfg_mut()[edge.slot()] = new;
        }

        match self.uses.get_mut(new) {
            Some(existing) => existing.extend(edges),
            None => {
                self.uses.insert(new, edges);
            }
        }
    }

    /// Rewrites a single operand slot of a single instruction to read
    /// `new`, leaving every other reader of the old value alone.
    pub fn rewrite_operand(&mut self, inst: Inst, slot: usize, new: Value) {
        let old = self.inst_data(inst).operands()[slot];

        if old == new {
            return;
        }

        self.remove_use(old, inst, slot);
        self.inst_data_mut(inst).__operands_dfg_mut()[slot] = new;
        self.record_use(new, inst, slot);
    }

    /// Removes `inst`'s reads from the use-edge index, in preparation for
    /// the instruction being removed from the layout.
    ///
    /// The instruction's own result must have no remaining uses.
    pub fn detach_inst(&mut self, inst: Inst) {
        debug_assert!(
            self.inst_to_result(inst)
                .map_or(true, |result| self.uses(result).is_empty()),
            "cannot detach an instruction whose result still has uses"
        );

        let operands: SmallVec<[Value; 4]> =
            SmallVec::from_slice(self.inst_data(inst).operands());

        for (slot, operand) in operands.into_iter().enumerate() {
            self.remove_use(operand, inst, slot);
        }
    }

    /// Rewrites the incoming-block list of a `phi` so that edges recorded
    /// as arriving from `from` are recorded as arriving from `to`.
    ///
    /// The incoming values are untouched.
    pub fn rewrite_phi_pred(&mut self, phi: Inst, from: Block, to: Block) {
        match self.inst_data_mut(phi) {
            InstData::Phi(data) => data.replace_pred(from, to),
            _ => panic!("tried to rewrite the predecessors of a non-phi instruction"),
        }
    }

    fn inst_data_mut(&mut self, inst: Inst) -> &mut InstData {
        match &mut self.entities[inst.raw_into()] {
            EntityData::Inst(data) => data,
            _ => panic!("got an `Inst` that did not refer to an instruction"),
        }
    }

    fn record_use(&mut self, value: Value, consumer: Inst, slot: usize) {
        let edge = Use {
            consumer,
            slot: slot as u32,
        };

        match self.uses.get_mut(value) {
            Some(edges) => edges.push(edge),
            None => {
                self.uses.insert(value, SmallVec::from_slice(&[edge]));
            }
        }
    }

    fn remove_use(&mut self, value: Value, consumer: Inst, slot: usize) {
        let edges = match self.uses.get_mut(value) {
            Some(edges) => edges,
            None => return,
        };

        if let Some(at) = edges
            .iter()
            .position(|edge| edge.consumer == consumer && edge.slot() == slot)
        {
            // `remove` keeps the relative order of the remaining edges
            edges.remove(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;
    use crate::utility::StringPool;

    fn graph_with_add() -> (DataFlowGraph, Value, Value, Inst) {
        let mut dfg = DataFlowGraph::new();
        let a = dfg.append_func_param(Type::i32());
        let b = dfg.append_func_param(Type::i32());

        let (add, _) = dfg.create_inst(
            InstData::IAdd(CommutativeArithInst::new(
                Type::i32(),
                a,
                b,
                ArithFlags::NSW,
            )),
            DebugInfo::fake(),
        );

        (dfg, a, b, add)
    }

    #[test]
    fn inst_and_result_share_index() {
        let (dfg, a, _, add) = graph_with_add();
        let result = dfg.inst_to_result(add).unwrap();

        assert_eq!(dfg.value_to_inst(result), Some(add));
        assert_eq!(dfg.ty(result), Type::i32());
        assert_eq!(dfg.value_to_inst(a), None);
        assert!(dfg.is_param(a));
        assert!(!dfg.is_param(result));
    }

    #[test]
    fn uses_record_slots_in_creation_order() {
        let (mut dfg, a, b, add) = graph_with_add();
        let result = dfg.inst_to_result(add).unwrap();

        // `a + a` to get two slots reading one value
        let (double, _) = dfg.create_inst(
            InstData::IAdd(CommutativeArithInst::new(
                Type::i32(),
                a,
                a,
                ArithFlags::empty(),
            )),
            DebugInfo::fake(),
        );

        let a_uses = dfg.uses(a);

        assert_eq!(a_uses.len(), 3);
        assert_eq!((a_uses[0].consumer(), a_uses[0].slot()), (add, 0));
        assert_eq!((a_uses[1].consumer(), a_uses[1].slot()), (double, 0));
        assert_eq!((a_uses[2].consumer(), a_uses[2].slot()), (double, 1));
        assert!(dfg.uses(result).is_empty());
        assert_eq!(dfg.uses(b).len(), 1);
    }

    #[test]
    fn replace_uses_rewrites_all_slots() {
        let (mut dfg, a, b, add) = graph_with_add();
        let (double, _) = dfg.create_inst(
            InstData::IAdd(CommutativeArithInst::new(
                Type::i32(),
                a,
                a,
                ArithFlags::empty(),
            )),
            DebugInfo::fake(),
        );

        dfg.replace_uses_with(a, b);

        assert!(dfg.uses(a).is_empty());
        assert_eq!(dfg.inst_data(add).operands(), &[b, b]);
        assert_eq!(dfg.inst_data(double).operands(), &[b, b]);

        // edges of `a` were appended after the original edge of `b`
        let b_uses = dfg.uses(b);

        assert_eq!(b_uses.len(), 4);
        assert_eq!((b_uses[0].consumer(), b_uses[0].slot()), (add, 1));
        assert_eq!((b_uses[1].consumer(), b_uses[1].slot()), (add, 0));
        assert_eq!((b_uses[2].consumer(), b_uses[2].slot()), (double, 0));
        assert_eq!((b_uses[3].consumer(), b_uses[3].slot()), (double, 1));
    }

    #[test]
    fn rewrite_operand_touches_one_slot() {
        let (mut dfg, a, b, add) = graph_with_add();
        let result = dfg.inst_to_result(add).unwrap();
        let mut pool = StringPool::new();
        let slot = dfg.create_stack_slot(pool.insert("x"), Type::i32());
        let (_, addr_val) = dfg.create_inst(
            InstData::StackSlot(StackSlotInst::new(slot)),
            DebugInfo::fake(),
        );
        let addr_val = addr_val.unwrap();
        let (store, _) = dfg.create_inst(
            InstData::Store(StoreInst::new(addr_val, result)),
            DebugInfo::fake(),
        );

        dfg.rewrite_operand(store, StoreInst::STORED_SLOT, b);

        assert_eq!(dfg.inst_data(store).operands(), &[addr_val, b]);
        assert!(dfg.uses(result).is_empty());
        assert_eq!(dfg.uses(b).last().map(|u| u.consumer()), Some(store));

        // the untouched slot's edge is still there
        assert_eq!(dfg.uses(addr_val).len(), 1);
        assert_eq!(dfg.uses(a).len(), 1);
    }

    #[test]
    fn detach_inst_clears_operand_edges() {
        let (mut dfg, a, b, add) = graph_with_add();

        dfg.detach_inst(add);

        assert!(dfg.uses(a).is_empty());
        assert!(dfg.uses(b).is_empty());
    }
}
