//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaMap;
use crate::dense_arena_key;
use crate::ir::{Block, Cursor, FuncView, Function};
use crate::pass::{FunctionAnalysisManager, FunctionAnalysisPass};
use crate::utility::{CiHashMap, CiHashSet};
use smallvec::SmallVec;
use std::any::TypeId;
use std::collections::hash_map::Entry;

dense_arena_key! {
    struct CFGNode;
}

struct CFGNodeData {
    predecessors: CiHashSet<Block>,
    successors: CiHashSet<Block>,
}

struct CFGComputer<'f> {
    nodes: ArenaMap<CFGNode, CFGNodeData>,
    lookup: CiHashMap<Block, CFGNode>,
    cursor: FuncView<'f>,
}

impl<'f> CFGComputer<'f> {
    fn new(func: &'f Function) -> Self {
        Self {
            nodes: ArenaMap::default(),
            lookup: CiHashMap::default(),
            cursor: FuncView::over(func),
        }
    }

    fn compute(mut self) -> (ArenaMap<CFGNode, CFGNodeData>, CiHashMap<Block, CFGNode>) {
        while let Some(block) = self.cursor.next_block() {
            self.compute_block(block);
        }

        (self.nodes, self.lookup)
    }

    fn compute_block(&mut self, block: Block) {
        self.cursor.goto_last_inst(block);

        {
            // make sure that any block we compute at least gets
            // an empty node, even if we don't do anything else
            let _ = self.node_of(block);
        }

        let curr = match self.cursor.current_inst() {
            Some(inst) => inst,
            _ => return,
        };

        let successors: SmallVec<[Block; 8]> = match self.cursor.dfg().inst_data(curr).targets() {
            Some([]) => return, // early exit to avoid screwing with vectors unnecessarily
            Some(targets) => SmallVec::from_slice(targets),
            None => panic!("invalid block, did not have a terminator"),
        };

        for successor in successors {
            self.add_edge(block, successor);
        }
    }

    fn add_edge(&mut self, from: Block, to: Block) {
        self.node_of(from).successors.insert(to);
        self.node_of(to).predecessors.insert(from);
    }

    fn node_of(&mut self, block: Block) -> &mut CFGNodeData {
        match self.lookup.entry(block) {
            Entry::Occupied(slot) => &mut self.nodes[*slot.get()],
            Entry::Vacant(slot) => {
                let node = self.nodes.insert(CFGNodeData {
                    predecessors: CiHashSet::default(),
                    successors: CiHashSet::default(),
                });

                slot.insert(node);

                &mut self.nodes[node]
            }
        }
    }
}

/// Models successor/predecessor information about the control-flow graph of
/// a given function.
pub struct ControlFlowGraph {
    nodes: ArenaMap<CFGNode, CFGNodeData>,
    lookup: CiHashMap<Block, CFGNode>,
}

impl ControlFlowGraph {
    /// Directly computes flowgraph information for a given function.
    ///
    /// This should not be used directly in normal rewrite passes, this should be
    /// requested from the [`FunctionAnalysisManager`]
    /// through [`ControlFlowGraphAnalysis`].
    pub fn compute(func: &Function) -> Self {
        let computer = CFGComputer::new(func);
        let (nodes, lookup) = computer.compute();

        Self { nodes, lookup }
    }

    /// Returns an iterator over the predecessors for a given block.
    pub fn predecessors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        let node = self.data_of(block);

        node.predecessors.iter().copied()
    }

    /// Returns an iterator over the successors for a given block.
    pub fn successors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        let node = self.data_of(block);

        node.successors.iter().copied()
    }

    /// Checks if a given block `pred` is a predecessor of `block`
    pub fn is_pred_of(&self, block: Block, pred: Block) -> bool {
        let node = self.data_of(block);

        node.predecessors.contains(&pred)
    }

    /// Checks if a given block `succ` is a successor of `block`
    pub fn is_succ_of(&self, block: Block, succ: Block) -> bool {
        let node = self.data_of(block);

        node.successors.contains(&succ)
    }

    fn data_of(&self, block: Block) -> &CFGNodeData {
        let idx = self.lookup[&block];

        &self.nodes[idx]
    }
}

/// An analysis pass that wraps up a [`ControlFlowGraph`] into
/// something that can actually be used inside of rewrite passes.
pub struct ControlFlowGraphAnalysis;

impl FunctionAnalysisPass for ControlFlowGraphAnalysis {
    type Result = ControlFlowGraph;

    fn expects_preserved(&self) -> &'static [TypeId] {
        &[]
    }

    fn run(&mut self, func: &Function, _: &FunctionAnalysisManager) -> Self::Result {
        ControlFlowGraph::compute(func)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;
    use std::iter;

    #[test]
    fn no_blocks() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().build();
        let b = m.define_function("main", sig);
        let f = b.define();

        // shouldn't panic
        let _ = ControlFlowGraph::compute(m.function(f));
    }

    #[test]
    fn one_block() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().build();
        let mut b = m.define_function("main", sig);

        // fn void @main() {
        // entry:
        //   ret void
        // }
        let entry = b.create_block("entry");
        b.switch_to(entry);
        b.append().ret_void(DebugInfo::fake());

        let f = b.define();
        let cfg = ControlFlowGraph::compute(m.function(f));

        assert_eq!(cfg.predecessors(entry).next(), None);
    }

    #[test]
    fn merge() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().param(Type::bool()).build();
        let mut b = m.define_function("main", sig);

        //
        // fn void @main(bool) {
        // entry:
        //   condbr bool %0, if.true, otherwise
        //
        // if.true:
        //   br merge
        //
        // otherwise:
        //   br merge
        //
        // merge:
        //   ret void
        // }
        //
        let entry = b.create_block("entry");
        let params = b.append_func_params();
        let if_true = b.create_block("if.true");
        let otherwise = b.create_block("otherwise");
        let merge = b.create_block("merge");

        b.switch_to(entry);
        b.append()
            .condbr(params[0], if_true, otherwise, DebugInfo::fake());

        b.switch_to(if_true);
        b.append().br(merge, DebugInfo::fake());

        b.switch_to(otherwise);
        b.append().br(merge, DebugInfo::fake());

        b.switch_to(merge);
        b.append().ret_void(DebugInfo::fake());

        let f = b.define();
        let cfg = ControlFlowGraph::compute(m.function(f));

        assert_eq!(cfg.predecessors(entry).next(), None);
        assert!(cfg.is_pred_of(if_true, entry));
        assert!(cfg.is_pred_of(otherwise, entry));
        assert!(cfg.is_pred_of(merge, if_true));
        assert!(cfg.is_pred_of(merge, otherwise));
        assert!(cfg.is_succ_of(entry, if_true));
        assert!(cfg.is_succ_of(entry, otherwise));
        assert!(cfg.successors(if_true).eq(iter::once(merge)));
        assert!(cfg.successors(otherwise).eq(iter::once(merge)));
        assert_eq!(cfg.successors(merge).next(), None);
    }

    #[test]
    fn infinite_loop() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().build();
        let mut b = m.define_function("main", sig);

        //
        // fn void @main() {
        // entry:
        //   br entry
        // }
        //
        let entry = b.create_block("entry");
        b.switch_to(entry);
        b.append().br(entry, DebugInfo::fake());

        let f = b.define();
        let cfg = ControlFlowGraph::compute(m.function(f));

        assert!(cfg.predecessors(entry).eq(iter::once(entry)));
        assert!(cfg.successors(entry).eq(iter::once(entry)));
    }

    #[test]
    fn unreachable_block() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().build();
        let mut b = m.define_function("main", sig);

        //
        // fn void @main() {
        // entry:
        //   br entry
        //
        // dead:
        //   ret void
        // }
        //
        let entry = b.create_block("entry");
        let dead = b.create_block("dead");
        b.switch_to(entry);
        b.append().br(entry, DebugInfo::fake());

        b.switch_to(dead);
        b.append().ret_void(DebugInfo::fake());

        let f = b.define();
        let cfg = ControlFlowGraph::compute(m.function(f));

        assert!(cfg.predecessors(entry).eq(iter::once(entry)));
        assert!(cfg.successors(entry).eq(iter::once(entry)));
        assert_eq!(cfg.predecessors(dead).next(), None);
        assert_eq!(cfg.successors(dead).next(), None);
    }

    #[test]
    fn canonical_loop() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().build();
        let mut b = m.define_function("main", sig);

        //
        // fn void @main() {
        // entry:
        //   %0 = iconst i32 0
        //   %1 = icmp eq i32 %0, %0
        //   br loop.head
        //
        // loop.head:
        //   %2 = phi bool [ entry, %1 ], [ loop.latch, %3 ]
        //   condbr bool %2, loop.body, exit
        //
        // loop.body:
        //   br loop.latch
        //
        // loop.latch:
        //   %3 = icmp ne i32 %0, %0
        //   br loop.head
        //
        // exit:
        //   ret void
        // }
        //
        let entry = b.create_block("entry");
        let loop_head = b.create_block("loop.head");
        let loop_body = b.create_block("loop.body");
        let loop_latch = b.create_block("loop.latch");
        let exit = b.create_block("exit");

        // in block so I can collapse this in editor
        {
            b.switch_to(entry);
            let v0 = b.append().iconst(Type::i32(), 0, DebugInfo::fake());
            let v1 = b.append().icmp_eq(v0, v0, DebugInfo::fake());
            b.append().br(loop_head, DebugInfo::fake());

            b.switch_to(loop_latch);
            let v3 = b.append().icmp_ne(v0, v0, DebugInfo::fake());
            b.append().br(loop_head, DebugInfo::fake());

            b.switch_to(loop_head);
            let v2 = b.append().phi(
                Type::bool(),
                &[(entry, v1), (loop_latch, v3)],
                DebugInfo::fake(),
            );
            b.append().condbr(v2, loop_body, exit, DebugInfo::fake());

            b.switch_to(loop_body);
            b.append().br(loop_latch, DebugInfo::fake());

            b.switch_to(exit);
            b.append().ret_void(DebugInfo::fake());
        }

        let f = b.define();
        let cfg = ControlFlowGraph::compute(m.function(f));

        assert_eq!(cfg.predecessors(entry).next(), None);
        assert!(cfg.successors(entry).eq(iter::once(loop_head)));

        let loop_head_predecessors = cfg.predecessors(loop_head).collect::<Vec<_>>();
        let loop_head_successors = cfg.successors(loop_head).collect::<Vec<_>>();
        assert!(loop_head_predecessors.contains(&entry));
        assert!(loop_head_predecessors.contains(&loop_latch));
        assert!(loop_head_successors.contains(&loop_body));
        assert!(loop_head_successors.contains(&exit));

        assert!(cfg.predecessors(loop_body).eq(iter::once(loop_head)));
        assert!(cfg.successors(loop_body).eq(iter::once(loop_latch)));

        assert!(cfg.predecessors(loop_latch).eq(iter::once(loop_body)));
        assert!(cfg.successors(loop_latch).eq(iter::once(loop_head)));

        assert!(cfg.predecessors(exit).eq(iter::once(loop_head)));
        assert_eq!(cfg.successors(exit).next(), None);
    }

    #[test]
    fn irreducible() {
        let mut m = Module::new("test");
        let sig = SigBuilder::new().build();
        let mut b = m.define_function("main", sig);

        //
        // fn void @main() {
        // entry:
        //   br a
        //
        // a:
        //   br b
        //
        // b:
        //   br a
        // }
        //
        let entry = b.create_block("entry");
        let block_a = b.create_block("a");
        let block_b = b.create_block("b");
        b.switch_to(entry);
        b.append().br(block_a, DebugInfo::fake());

        b.switch_to(block_a);
        b.append().br(block_b, DebugInfo::fake());

        b.switch_to(block_b);
        b.append().br(block_a, DebugInfo::fake());

        let f = b.define();
        let cfg = ControlFlowGraph::compute(m.function(f));

        assert_eq!(cfg.predecessors(entry).next(), None);
        assert!(cfg.successors(entry).eq(iter::once(block_a)));

        let block_a_preds = cfg.predecessors(block_a).collect::<Vec<_>>();
        assert!(block_a_preds.contains(&entry));
        assert!(block_a_preds.contains(&block_b));
        assert!(cfg.successors(block_a).eq(iter::once(block_b)));

        assert!(cfg.predecessors(block_b).eq(iter::once(block_a)));
        assert!(cfg.successors(block_b).eq(iter::once(block_a)));
    }
}
