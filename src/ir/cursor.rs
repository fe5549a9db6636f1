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
use smallvec::SmallVec;

/// Models the position that the cursor is "pointing at."
///
/// A cursor can be pointing at some block (either before the first instruction
/// in the block or after the last), at a specific instruction in a specific block,
/// or pointing at nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub enum CursorPos {
    /// Pointing at nothing.
    Nothing,
    /// Pointing "before" the first instruction in a given block.
    ///
    /// ```none
    /// entry:
    ///   ; <-- here
    ///   %0 = iconst i32 42
    ///   %1 = iadd i32 %0, %0
    ///   ; ...
    /// ```
    Before(Block),
    /// Pointing at a specific instruction in a given block.
    ///
    /// ```none
    /// entry:
    ///   %0 = iconst i32 42 ; <-- here
    ///   %1 = iadd i32 %0, %0
    ///   ; ...
    /// ```
    At(Block, Inst),
    /// Pointing at the end of a specific block.
    ///
    /// ```none
    /// entry:
    ///   %0 = iconst i32 42
    ///   %1 = iadd i32 %0, %0
    ///   br one
    ///   ; <-- here
    /// ```
    After(Block),
}

#[inline(always)]
fn move_to_block_internal(this: &mut impl Cursor, next: Option<Block>) -> Option<Block> {
    this.set_pos(next.map_or_else(|| CursorPos::Nothing, CursorPos::Before));

    next
}

#[inline(always)]
fn move_to_inst_internal(this: &mut impl Cursor, next: Option<(Block, Inst)>) -> Option<Inst> {
    this.set_pos(next.map_or_else(
        || CursorPos::Nothing,
        |(block, inst)| CursorPos::At(block, inst),
    ));

    next.map(|(_, inst)| inst)
}

/// Models basic cursor operations that **view** a function. None of these operations
/// require mutable access to a given function, so they can be used inside of
/// analyses.
pub trait Cursor: Sized {
    /// Gets the current cursor position
    fn pos(&self) -> CursorPos;

    /// Sets the current cursor position
    fn set_pos(&mut self, pos: CursorPos);

    /// Returns the definition of the function being viewed
    fn def(&self) -> &FunctionDefinition;

    /// Gets the layout associated with the function being viewed
    fn layout(&self) -> &Layout {
        &self.def().layout
    }

    /// Gets the data-flow graph associated with the function being viewed
    fn dfg(&self) -> &DataFlowGraph {
        &self.def().dfg
    }

    /// Gets the current block being viewed by the cursor, if any.
    fn current_block(&self) -> Option<Block> {
        match self.pos() {
            CursorPos::Nothing => None,
            CursorPos::Before(block) | CursorPos::After(block) | CursorPos::At(block, _) => {
                Some(block)
            }
        }
    }

    /// Gets the current instruction being viewed by the cursor, if any.
    fn current_inst(&self) -> Option<Inst> {
        if let CursorPos::At(_, inst) = self.pos() {
            Some(inst)
        } else {
            None
        }
    }

    /// Tries to get the possible branch targets for the terminator of the current block.
    /// If there is no current block or the current block's last instruction is not a
    /// terminator, returns `None`.
    fn current_block_terminator_targets(&self) -> Option<&[Block]> {
        let block = match self.current_block() {
            Some(bb) => bb,
            None => return None,
        };

        self.layout()
            .block_last_inst(block)
            .and_then(|inst| self.dfg().inst_data(inst).targets())
    }

    /// Moves the position to `Before(block)`.
    fn goto_before(&mut self, block: Block) {
        debug_assert!(self.layout().is_block_inserted(block));

        self.set_pos(CursorPos::Before(block));
    }

    /// Moves the position to `After(block)`.
    fn goto_after(&mut self, block: Block) {
        debug_assert!(self.layout().is_block_inserted(block));

        self.set_pos(CursorPos::After(block));
    }

    /// Moves the position to `At(block, first_inst_in_block)`.
    fn goto_first_inst(&mut self, block: Block) {
        self.goto_before(block);

        self.next_inst();
    }

    /// Moves the position to `At(block, last_inst_in_block)`.
    fn goto_last_inst(&mut self, block: Block) {
        self.goto_after(block);

        self.prev_inst();
    }

    /// Moves the position to `At(containing, inst)`
    fn goto_inst(&mut self, inst: Inst) {
        debug_assert!(self.layout().is_inst_inserted(inst));

        let block = self.layout().inst_block(inst);

        self.set_pos(CursorPos::At(block, inst));
    }

    /// Moves the cursor to the next block in the function. If the cursor is currently
    /// not pointing to anywhere in the function, this moves it to `Before(entry)`. If the
    /// cursor is pointing at the last block in the function, this moves it to `Nothing`.
    fn next_block(&mut self) -> Option<Block> {
        let bb = self.current_block().map_or_else(
            || self.layout().entry_block(),
            |block| self.layout().block_next(block),
        );

        move_to_block_internal(self, bb)
    }

    /// Moves the cursor to the block before the current one. If the cursor is pointing at `Nothing`,
    /// nothing changes. If the cursor is pointing at the first block, its moved to `Nothing`.
    fn prev_block(&mut self) -> Option<Block> {
        let bb = self
            .current_block()
            .and_then(|block| self.layout().block_prev(block));

        move_to_block_internal(self, bb)
    }

    /// Moves the cursor to the next instruction in the function. If the cursor points
    /// before the block, this is the first instruction. If it points after, this does
    /// nothing. If it points at nothing, this does nothing.
    fn next_inst(&mut self) -> Option<Inst> {
        let block_and_inst = match self.pos() {
            CursorPos::Nothing | CursorPos::After(_) => None,
            CursorPos::At(block, inst) => self.layout().inst_next(inst).map(|inst| (block, inst)),
            CursorPos::Before(block) => self
                .def()
                .layout
                .block_first_inst(block)
                .map(|inst| (block, inst)),
        };

        move_to_inst_internal(self, block_and_inst)
    }

    /// Moves the cursor to the previous instruction in the function. If the cursor points
    /// after the block, this is the last instruction. If it points before, this does
    /// nothing. If it points at nothing, this does nothing.
    fn prev_inst(&mut self) -> Option<Inst> {
        let block_and_inst = match self.pos() {
            CursorPos::Nothing | CursorPos::Before(_) => None,
            CursorPos::At(block, inst) => self.layout().inst_prev(inst).map(|inst| (block, inst)),
            CursorPos::After(block) => self
                .def()
                .layout
                .block_last_inst(block)
                .map(|inst| (block, inst)),
        };

        move_to_inst_internal(self, block_and_inst)
    }
}

/// Effectively a [`FuncCursor`] without any of the operations
/// that mutate the function.
pub struct FuncView<'f> {
    func: &'f Function,
    pos: CursorPos,
}

impl<'f> Cursor for FuncView<'f> {
    fn pos(&self) -> CursorPos {
        self.pos
    }

    fn set_pos(&mut self, pos: CursorPos) {
        self.pos = pos;
    }

    fn def(&self) -> &FunctionDefinition {
        self.func
            .definition()
            .expect("cannot view function without a definition")
    }
}

impl<'f> FuncView<'f> {
    /// Creates a [`FuncView`] that allows the given function to be viewed.
    pub fn over(func: &'f Function) -> Self {
        Self {
            func,
            pos: CursorPos::Nothing,
        }
    }
}

/// Similar to [`FuncBuilder`] but for in-place modification of functions.
///
/// Besides the navigation that [`Cursor`] provides, this hands out
/// [`InstBuilder`]s that insert next to the current instruction, and it
/// knows how to remove instructions and split blocks without leaving the
/// function in a state the rest of the crate can't deal with.
pub struct FuncCursor<'f> {
    func: &'f mut Function,
    pos: CursorPos,
}

impl<'f> Cursor for FuncCursor<'f> {
    fn pos(&self) -> CursorPos {
        self.pos
    }

    fn set_pos(&mut self, pos: CursorPos) {
        self.pos = pos;
    }

    fn def(&self) -> &FunctionDefinition {
        self.func
            .definition()
            .expect("cannot view function without a definition")
    }
}

impl<'f> FuncCursor<'f> {
    /// Creates a [`FuncCursor`] that allows the given function to be edited.
    pub fn over(func: &'f mut Function) -> Self {
        Self {
            func,
            pos: CursorPos::Nothing,
        }
    }

    /// Gets the data-flow graph of the function being edited.
    pub fn dfg_mut(&mut self) -> &mut DataFlowGraph {
        &mut self.def_mut().dfg
    }

    /// Gets the layout of the function being edited.
    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.def_mut().layout
    }

    /// Returns a builder that inserts new instructions immediately before
    /// the instruction the cursor points at. The cursor does not move, so
    /// inserted instructions are behind it and will not be yielded by
    /// [`Cursor::next_inst`].
    ///
    /// If the cursor is not pointing at an instruction, this will panic.
    pub fn insert_before(&mut self) -> InsertBuilder<'_> {
        let inst = self
            .current_inst()
            .expect("cannot insert without a current instruction");

        InsertBuilder::before(self.def_mut(), inst)
    }

    /// Returns a builder that inserts new instructions immediately after
    /// the instruction the cursor points at. The cursor does not move, so
    /// the next call to [`Cursor::next_inst`] yields the inserted
    /// instruction rather than whatever used to follow the current one.
    ///
    /// If the cursor is not pointing at an instruction, this will panic.
    pub fn insert_after(&mut self) -> InsertBuilder<'_> {
        let inst = self
            .current_inst()
            .expect("cannot insert without a current instruction");

        InsertBuilder::after(self.def_mut(), inst)
    }

    /// Returns a builder that appends to the end of `block`. The cursor
    /// does not move.
    pub fn append_to(&mut self, block: Block) -> AppendBuilder<'_> {
        debug_assert!(self.layout().is_block_inserted(block));

        AppendBuilder::new(self.def_mut(), block)
    }

    /// Removes the instruction the cursor points at, both from the layout
    /// and from the use-edge index. The instruction's result must have no
    /// remaining uses.
    ///
    /// The cursor falls back to the previous instruction in the block, or
    /// to before the block if there is none, so the next call to
    /// [`Cursor::next_inst`] yields whatever followed the removed
    /// instruction.
    pub fn remove_inst(&mut self) -> Inst {
        let (block, inst) = match self.pos() {
            CursorPos::At(block, inst) => (block, inst),
            _ => panic!("cannot remove without a current instruction"),
        };

        let prev = self.layout().inst_prev(inst);
        let def = self.def_mut();

        def.dfg.detach_inst(inst);
        def.layout.remove_inst(inst);

        self.set_pos(match prev {
            Some(prev) => CursorPos::At(block, prev),
            None => CursorPos::Before(block),
        });

        inst
    }

    /// Creates an empty block named `name` and inserts it into the layout
    /// immediately after `after`. The cursor does not move.
    pub fn create_block_after(&mut self, name: &str, after: Block) -> Block {
        debug_assert!(self.layout().is_block_inserted(after));

        let name = self.func.ctx().strings_mut().insert(name);
        let def = self.def_mut();
        let block = def.dfg.create_block(name);

        def.layout.insert_block_after(block, after);

        block
    }

    /// Splits the current block in two immediately after the instruction
    /// the cursor points at. Everything that followed that instruction,
    /// including the block's terminator, moves into a new block called
    /// `name` that is placed right after the current block in the layout.
    /// The current block gets an unconditional branch to the new block so
    /// that the function stays well-formed.
    ///
    /// Phi instructions in the moved terminator's targets are updated to
    /// record the new block as the predecessor they receive values from.
    ///
    /// Returns the new block. The cursor does not move.
    ///
    /// If the cursor is not pointing at an instruction, this will panic.
    pub fn split_block_after(&mut self, name: &str, debug: DebugInfo) -> Block {
        let (block, inst) = match self.pos() {
            CursorPos::At(block, inst) => (block, inst),
            _ => panic!("cannot split without a current instruction"),
        };

        let name = self.func.ctx().strings_mut().insert(name);
        let def = self.def_mut();
        let rest = def.dfg.create_block(name);

        def.layout.insert_block_after(rest, block);
        def.layout.split_block_after(inst, rest);

        // the terminator that moved still branches to the same places, but
        // those places now see `rest` as the predecessor on that edge
        if let Some(moved) = def.layout.block_last_inst(rest) {
            let targets: SmallVec<[Block; 2]> = match def.dfg.inst_data(moved).targets() {
                Some(targets) => SmallVec::from_slice(targets),
                None => SmallVec::new(),
            };

            for target in targets {
                let phis: SmallVec<[Inst; 2]> = def
                    .layout
                    .insts_in_block(target)
                    .take_while(|inst| matches!(def.dfg.inst_data(*inst), InstData::Phi(_)))
                    .collect();

                for phi in phis {
                    def.dfg.rewrite_phi_pred(phi, block, rest);
                }
            }
        }

        AppendBuilder::new(self.def_mut(), block).br(rest, debug);

        rest
    }

    fn def_mut(&mut self) -> &mut FunctionDefinition {
        self.func
            .definition_mut()
            .expect("cannot mutate function without a definition")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    fn sum_func() -> (Module, Func) {
        let mut module = Module::new("cursors");
        let sig = SigBuilder::new()
            .params(&[Type::i32(), Type::i32()])
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("sum", sig);
        let entry = b.create_block("entry");
        let params = b.append_func_params();

        b.switch_to(entry);

        let sum = b.append().iadd(params[0], params[1], DebugInfo::fake());

        b.append().ret_val(sum, DebugInfo::fake());

        let func = b.define();

        (module, func)
    }

    #[test]
    fn view_walks_blocks_and_insts() {
        let (module, func) = sum_func();
        let mut cursor = FuncView::over(module.function(func));

        let entry = cursor.next_block().unwrap();
        assert_eq!(cursor.pos(), CursorPos::Before(entry));

        let add = cursor.next_inst().unwrap();
        assert!(matches!(cursor.dfg().inst_data(add), InstData::IAdd(_)));
        assert_eq!(cursor.current_block(), Some(entry));

        let ret = cursor.next_inst().unwrap();
        assert!(cursor.dfg().inst_data(ret).is_terminator());
        assert!(cursor.next_inst().is_none());
        assert_eq!(cursor.pos(), CursorPos::Nothing);
    }

    #[test]
    fn goto_positions_cursor_exactly() {
        let (module, func) = sum_func();
        let mut cursor = FuncView::over(module.function(func));
        let entry = cursor.layout().entry_block().unwrap();

        cursor.goto_last_inst(entry);

        let ret = cursor.current_inst().unwrap();

        assert!(cursor.dfg().inst_data(ret).is_terminator());

        cursor.goto_first_inst(entry);

        let add = cursor.current_inst().unwrap();

        assert_eq!(cursor.layout().inst_next(add), Some(ret));
        assert!(cursor.prev_inst().is_none());
        assert_eq!(cursor.pos(), CursorPos::Nothing);
    }

    #[test]
    fn cursor_rewrites_in_place() {
        let (mut module, func) = sum_func();
        let mut cursor = FuncCursor::over(module.function_mut(func));

        cursor.next_block();

        let add = cursor.next_inst().unwrap();
        let (lhs, rhs) = match cursor.dfg().inst_data(add) {
            InstData::IAdd(inst) => (inst.lhs(), inst.rhs()),
            _ => unreachable!(),
        };

        let sub = cursor.insert_before().isub(lhs, rhs, DebugInfo::fake());
        let result = cursor.dfg().inst_to_result(add).unwrap();

        cursor.dfg_mut().replace_uses_with(result, sub);

        let removed = cursor.remove_inst();

        assert_eq!(removed, add);
        assert!(!cursor.layout().is_inst_inserted(add));
        assert_eq!(cursor.layout().len_insts(), 2);

        // the cursor fell back onto the isub, so the walk resumes at the ret
        let next = cursor.next_inst().unwrap();

        assert!(cursor.dfg().inst_data(next).is_terminator());
    }

    #[test]
    fn insert_after_is_yielded_next() {
        let (mut module, func) = sum_func();
        let mut cursor = FuncCursor::over(module.function_mut(func));

        cursor.next_block();

        let add = cursor.next_inst().unwrap();
        let result = cursor.dfg().inst_to_result(add).unwrap();
        let doubled = cursor.insert_after().imul(result, result, DebugInfo::fake());

        let next = cursor.next_inst().unwrap();

        assert_eq!(cursor.dfg().inst_to_result(next), Some(doubled));
    }

    #[test]
    fn split_moves_tail_and_phi_preds() {
        let mut module = Module::new("cursors");
        let sig = SigBuilder::new()
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("split", sig);
        let entry = b.create_block("entry");
        let exit = b.create_block("exit");
        let params = b.append_func_params();

        b.switch_to(entry);

        let doubled = b.append().iadd(params[0], params[0], DebugInfo::fake());

        b.append().br(exit, DebugInfo::fake());
        b.switch_to(exit);

        let merged = b.append().phi(Type::i32(), &[(entry, doubled)], DebugInfo::fake());

        b.append().ret_val(merged, DebugInfo::fake());

        let func = b.define();
        let mut cursor = FuncCursor::over(module.function_mut(func));

        cursor.next_block();

        let add = cursor.next_inst().unwrap();
        let rest = cursor.split_block_after("entry.split", DebugInfo::fake());

        // old block: [ iadd, br rest ], new block: [ br exit ]
        assert_eq!(cursor.pos(), CursorPos::At(entry, add));
        assert_eq!(cursor.layout().block_next(entry), Some(rest));
        assert_eq!(cursor.layout().insts_in_block(entry).count(), 2);

        let fallthrough = cursor.layout().block_last_inst(entry).unwrap();

        assert!(
            matches!(cursor.dfg().inst_data(fallthrough), InstData::Br(br) if br.target() == rest)
        );

        let moved = cursor.layout().block_last_inst(rest).unwrap();

        assert!(matches!(cursor.dfg().inst_data(moved), InstData::Br(br) if br.target() == exit));

        // the phi in `exit` now gets its value from `rest`
        let phi = cursor.dfg().value_to_inst(merged).unwrap();

        match cursor.dfg().inst_data(phi) {
            InstData::Phi(phi) => {
                assert_eq!(phi.value_from(rest), Some(doubled));
                assert_eq!(phi.value_from(entry), None);
            }
            _ => unreachable!(),
        }
    }
}
