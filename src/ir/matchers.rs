//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines APIs for pattern-matching on CIR.
//!
//! This is what the rewrite passes are built on top of: matchers answer
//! "is this the shape I rewrite?" without mutating anything, so they can
//! run mid-traversal over a function that is about to be edited.
//!
//! ```
//! # use citrine::ir::matchers::*;
//! # use citrine::ir::*;
//! let mut module = Module::new("test");
//! let mut b = module.define_function("test", SigBuilder::new().ret(Some(Type::i32())).build());
//! let bb0 = b.create_block("bb0");
//! b.switch_to(bb0);
//!
//! let v1 = b.append().iconst(Type::i32(), 42, DebugInfo::fake());
//! let v2 = b.append().iconst(Type::i32(), 16, DebugInfo::fake());
//! let v3 = b.append().iadd(v2, v1, DebugInfo::fake());
//! let v4 = b.append().imul(v1, v3, DebugInfo::fake());
//! b.append().ret_val(v4, DebugInfo::fake());
//!
//! let f = b.define();
//! let dfg = &module.function(f).definition().unwrap().dfg;
//!
//! let iconst_42 = iconst_val(42);
//! let iadd_i32_42 = iadd_with(val_of_ty(Type::i32()), iconst_ty_val(Type::i32(), 42));
//!
//! assert!(matches(v1, iconst_42, dfg));
//! assert!(matches(v3, iadd_i32_42, dfg));
//! ```

use crate::ir::*;
use paste::paste;
use std::marker::PhantomData;

/// A basic matcher for a single value/instruction in the IR.
pub trait IRMatcher<'a> {
    /// Runs the matcher against a given instruction. Returns whether
    /// or not the value was matched.
    fn matches_inst(self, inst: Inst, dfg: &'a DataFlowGraph) -> bool;

    /// Runs the matcher against a given value. Returns whether
    /// or not the value was matched.
    fn matches_val(self, val: Value, dfg: &'a DataFlowGraph) -> bool;
}

/// Returns whether or not a value matches the provided matcher
pub fn matches<'a>(val: Value, matcher: impl IRMatcher<'a>, dfg: &'a DataFlowGraph) -> bool {
    matcher.matches_val(val, dfg)
}

/// Returns whether or not an instruction matches the provided matcher
pub fn matches_inst<'a>(inst: Inst, matcher: impl IRMatcher<'a>, dfg: &'a DataFlowGraph) -> bool {
    matcher.matches_inst(inst, dfg)
}

/// A matcher that wraps up a matcher function.
pub struct BasicInstMatcher<'a, F>
where
    F: FnOnce(Inst, &'a DataFlowGraph) -> bool + 'a,
{
    matcher: F,
    data: PhantomData<&'a i32>,
}

impl<'a, F> IRMatcher<'a> for BasicInstMatcher<'a, F>
where
    F: FnOnce(Inst, &'a DataFlowGraph) -> bool,
{
    fn matches_inst(self, inst: Inst, dfg: &'a DataFlowGraph) -> bool {
        (self.matcher)(inst, dfg)
    }

    fn matches_val(self, val: Value, dfg: &'a DataFlowGraph) -> bool {
        match dfg.value_to_inst(val) {
            Some(inst) => self.matches_inst(inst, dfg),
            None => false,
        }
    }
}

/// A matcher that matches on values
pub struct BasicValMatcher<'a, F>
where
    F: FnOnce(Value, &'a DataFlowGraph) -> bool + 'a,
{
    matcher: F,
    data: PhantomData<&'a i32>,
}

impl<'a, F> IRMatcher<'a> for BasicValMatcher<'a, F>
where
    F: FnOnce(Value, &'a DataFlowGraph) -> bool,
{
    fn matches_inst(self, inst: Inst, dfg: &'a DataFlowGraph) -> bool {
        match dfg.inst_to_result(inst) {
            Some(val) => self.matches_val(val, dfg),
            None => false,
        }
    }

    fn matches_val(self, val: Value, dfg: &'a DataFlowGraph) -> bool {
        (self.matcher)(val, dfg)
    }
}

/// Logical conjunction operation between two matchers.
///
/// The IR being matched must match both matchers provided, or this
/// matcher doesn't match.
pub fn both<'a, 'b, 'c, B, C>(lhs: B, rhs: C) -> impl IRMatcher<'a>
where
    'a: 'b,
    'a: 'c,
    B: IRMatcher<'b> + 'a,
    C: IRMatcher<'c> + 'a,
{
    BasicInstMatcher {
        matcher: |inst, dfg| lhs.matches_inst(inst, dfg) && rhs.matches_inst(inst, dfg),
        data: PhantomData::default(),
    }
}

/// Logical disjunction operation between two matchers.
///
/// The IR being matched must match one of the matchers provided, or this
/// matcher doesn't match.
pub fn one_of<'a, 'b, 'c, B, C>(lhs: B, rhs: C) -> impl IRMatcher<'a>
where
    'a: 'b,
    'a: 'c,
    B: IRMatcher<'b> + 'a,
    C: IRMatcher<'c> + 'a,
{
    BasicInstMatcher {
        matcher: |inst, dfg| lhs.matches_inst(inst, dfg) || rhs.matches_inst(inst, dfg),
        data: PhantomData::default(),
    }
}

/// A matcher that matches any value
pub fn val<'a>() -> impl IRMatcher<'a> {
    BasicValMatcher {
        matcher: move |_, _| true,
        data: PhantomData::default(),
    }
}

/// A matcher that matches any value with a given type
pub fn val_of_ty<'a>(ty: Type) -> impl IRMatcher<'a> {
    BasicValMatcher {
        matcher: move |val, dfg| dfg.ty(val) == ty,
        data: PhantomData::default(),
    }
}

/// A matcher that matches any value that is a parameter of the function.
pub fn func_param<'a>() -> impl IRMatcher<'a> {
    BasicValMatcher {
        matcher: move |val, dfg| dfg.is_param(val),
        data: PhantomData::default(),
    }
}

/// A matcher that matches any function parameter that also has a given type.
pub fn func_param_of_ty<'a>(ty: Type) -> impl IRMatcher<'a> {
    BasicValMatcher {
        matcher: move |val, dfg| dfg.is_param(val) && dfg.ty(val) == ty,
        data: PhantomData::default(),
    }
}

/// A matcher that matches on `iconst` instructions (i.e. matches on constant operands).
pub fn iconst<'a>() -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| matches!(dfg.inst_data(inst), InstData::IConst(_)),
        data: PhantomData::default(),
    }
}

/// A matcher that matches on `iconst` instructions with a specific value
pub fn iconst_val<'a>(value: u64) -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| match dfg.inst_data(inst) {
            InstData::IConst(iconst) => iconst.value() == value,
            _ => false,
        },
        data: PhantomData::default(),
    }
}

/// A matcher that matches on `iconst` instructions with a specific type
pub fn iconst_ty<'a>(ty: Type) -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| match dfg.inst_data(inst) {
            InstData::IConst(iconst) => iconst.result_ty().unwrap() == ty,
            _ => false,
        },
        data: PhantomData::default(),
    }
}

/// A matcher that matches on `iconst` instructions with a specific value *and*
/// a specific type.
pub fn iconst_ty_val<'a>(ty: Type, value: u64) -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| match dfg.inst_data(inst) {
            InstData::IConst(iconst) => {
                iconst.value() == value && iconst.result_ty().unwrap() == ty
            }
            _ => false,
        },
        data: PhantomData::default(),
    }
}

/// Matches on an `iconst` value that is a power of 2
pub fn power_of_two<'a>() -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| match dfg.inst_data(inst) {
            InstData::IConst(iconst) => iconst.value().is_power_of_two(),
            _ => false,
        },
        data: PhantomData::default(),
    }
}

/// Matches a `stackslot` instruction
pub fn stackslot<'a>() -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| matches!(dfg.inst_data(inst), InstData::StackSlot(_)),
        data: PhantomData::default(),
    }
}

/// Matches a `load` instruction
pub fn load<'a>() -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| matches!(dfg.inst_data(inst), InstData::Load(_)),
        data: PhantomData::default(),
    }
}

/// Matches a `store` instruction
pub fn store<'a>() -> impl IRMatcher<'a> {
    BasicInstMatcher {
        matcher: move |inst, dfg| matches!(dfg.inst_data(inst), InstData::Store(_)),
        data: PhantomData::default(),
    }
}

macro_rules! binary_matcher {
    ($name:ident, $variant:path, $underlying:ty, $str:literal) => {
        paste! {
            #[doc = concat!("Allows matching against `", $str, "` instructions.")]
            #[doc = ""]
            #[doc = concat!("If an instruction has the `", $str, "` opcode (or a value is the result of an")]
            #[doc = "instruction with that opcode), this will match."]
            pub fn [< $name >]<'a>() -> impl IRMatcher<'a> {
                BasicInstMatcher {
                    matcher: move |inst, dfg| matches!(dfg.inst_data(inst), InstData::$variant(_)),
                    data: PhantomData::default(),
                }
            }

            #[doc = concat!("Allows matching against `", $str, "` instructions and their lhs/rhs.")]
            #[doc = ""]
            #[doc = "Runs matchers on the left-hand side and the right-hand side operands. If the opcode and both the"]
            #[doc = "left-hand side and right-hand side matches, this will match."]
            pub fn [< $name _with >]<'a, 'b, 'c, B, C>(
                lhs: B,
                rhs: C
            ) -> impl IRMatcher<'a>
            where
                'a: 'b,
                'a: 'c,
                B: IRMatcher<'b> + 'a,
                C: IRMatcher<'c> + 'a
            {
                BasicInstMatcher {
                    matcher: |inst, dfg| {
                        match dfg.inst_data(inst) {
                            InstData::$variant(inst) => {
                                lhs.matches_val(inst.lhs(), dfg) && rhs.matches_val(inst.rhs(), dfg)
                            }
                            _ => false,
                        }
                    },
                    data: PhantomData::default(),
                }
            }
        }
    };
}

binary_matcher!(icmp, ICmp, ICmpInst, "icmp");
binary_matcher!(iadd, IAdd, CommutativeArithInst, "iadd");
binary_matcher!(isub, ISub, ArithInst, "isub");
binary_matcher!(imul, IMul, CommutativeArithInst, "imul");
binary_matcher!(srem, SRem, ArithInst, "srem");

/// The pieces of a matched `iadd` that a rewrite needs in order to build
/// an equivalent (or derived) instruction somewhere else.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchedAdd {
    /// The value the add yields.
    pub result: Value,
    /// The left-hand operand.
    pub lhs: Value,
    /// The right-hand operand.
    pub rhs: Value,
    /// The overflow guarantees carried by the add.
    pub flags: ArithFlags,
    /// The type of the result and of both operands.
    pub ty: Type,
}

/// Destructures an `iadd` instruction into the pieces rewrites care about.
/// Anything that isn't an `iadd` yields `None`.
pub fn as_add(inst: Inst, dfg: &DataFlowGraph) -> Option<MatchedAdd> {
    match dfg.inst_data(inst) {
        InstData::IAdd(add) => Some(MatchedAdd {
            result: dfg
                .inst_to_result(inst)
                .expect("`iadd` always yields a result"),
            lhs: add.lhs(),
            rhs: add.rhs(),
            flags: add.flags(),
            ty: add.result_ty().expect("`iadd` always yields a result"),
        }),
        _ => None,
    }
}

/// Finds the first `store` that stores `value` itself, as opposed to
/// storing *to* it, scanning the value's use-edges in the order they were
/// recorded.
///
/// The data-flow graph appends use-edges as instructions are created and
/// never reorders them, so for a fixed build order the store this finds is
/// deterministic. A use whose consumer is a store but that sits in the
/// pointer slot does not count.
pub fn first_store_of(value: Value, dfg: &DataFlowGraph) -> Option<Inst> {
    dfg.uses(value).iter().find_map(|edge| {
        let stores_value = edge.slot() == StoreInst::STORED_SLOT
            && matches!(dfg.inst_data(edge.consumer()), InstData::Store(_));

        stores_value.then_some(edge.consumer())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_matches_val {
        ($matcher:expr, $val:expr, $cursor:expr) => {
            assert!($matcher.matches_val($val, $cursor.dfg()));
        };
    }

    macro_rules! assert_not_matches_val {
        ($matcher:expr, $val:expr, $cursor:expr) => {
            assert!(!$matcher.matches_val($val, $cursor.dfg()));
        };
    }

    #[test]
    fn test_basic() {
        let mut module = Module::new("test");
        let mut b = module.define_function("test", SigBuilder::new().param(Type::i32()).build());

        let bb0 = b.create_block("bb0");
        let vx = b.append_func_params()[0];
        b.switch_to(bb0);

        let v0 = b.append().iconst(Type::i32(), 42, DebugInfo::fake());
        let v1 = b.append().iconst(Type::i32(), 6, DebugInfo::fake());
        let v2 = b.append().iadd(v0, vx, DebugInfo::fake());
        let v3 = b.append().imul(v2, vx, DebugInfo::fake());
        b.append().ret_void(DebugInfo::fake());

        let f = b.define();
        let func = module.function_mut(f);
        let cursor = FuncCursor::over(func);

        assert_matches_val!(val(), vx, cursor);
        assert_matches_val!(val_of_ty(Type::i32()), vx, cursor);
        assert_matches_val!(func_param(), vx, cursor);
        assert_matches_val!(func_param_of_ty(Type::i32()), vx, cursor);
        assert_matches_val!(iconst(), v0, cursor);
        assert_matches_val!(iconst_val(42), v0, cursor);
        assert_matches_val!(iconst_ty(Type::i32()), v0, cursor);
        assert_matches_val!(iconst_ty_val(Type::i32(), 42), v0, cursor);
        assert_matches_val!(iadd(), v2, cursor);
        assert_matches_val!(iadd_with(iconst(), val()), v2, cursor);
        assert_matches_val!(iadd_with(iconst(), val_of_ty(Type::i32())), v2, cursor);
        assert_matches_val!(imul(), v3, cursor);
        assert_matches_val!(imul_with(iadd(), val()), v3, cursor);
        assert_matches_val!(both(imul(), imul_with(val(), func_param())), v3, cursor);
        assert_matches_val!(one_of(iconst(), iadd()), v2, cursor);

        assert_not_matches_val!(iconst_val(42), v1, cursor);
        assert_not_matches_val!(iconst_val(6), v0, cursor);
        assert_not_matches_val!(iconst(), v2, cursor);
        assert_not_matches_val!(imul(), v2, cursor);
        assert_not_matches_val!(iadd_with(iconst(), iconst()), v2, cursor);
        assert_not_matches_val!(iadd(), v3, cursor);
        assert_not_matches_val!(iconst(), vx, cursor);
        assert_not_matches_val!(func_param(), v0, cursor);
        assert_not_matches_val!(imul_with(iconst(), val()), v3, cursor);
        assert_not_matches_val!(imul_with(func_param(), val()), v3, cursor);
    }

    #[test]
    fn add_extractor_carries_flags_and_operands() {
        let mut module = Module::new("test");
        let sig = SigBuilder::new()
            .params(&[Type::i32(), Type::i32()])
            .ret(Some(Type::i32()))
            .build();
        let mut b = module.define_function("test", sig);
        let bb0 = b.create_block("bb0");
        let params = b.append_func_params();
        b.switch_to(bb0);

        let sum = b.append().iadd_with_flags(
            params[0],
            params[1],
            ArithFlags::NSW | ArithFlags::NUW,
            DebugInfo::fake(),
        );
        let product = b.append().imul(sum, sum, DebugInfo::fake());
        b.append().ret_val(product, DebugInfo::fake());

        let f = b.define();
        let dfg = &module.function(f).definition().unwrap().dfg;
        let add = dfg.value_to_inst(sum).unwrap();
        let matched = as_add(add, dfg).unwrap();

        assert_eq!(matched.result, sum);
        assert_eq!(matched.lhs, params[0]);
        assert_eq!(matched.rhs, params[1]);
        assert_eq!(matched.flags, ArithFlags::NSW | ArithFlags::NUW);
        assert_eq!(matched.ty, Type::i32());
        assert!(as_add(dfg.value_to_inst(product).unwrap(), dfg).is_none());
    }

    #[test]
    fn first_store_wants_the_value_slot() {
        let mut module = Module::new("test");
        let mut b = module.define_function("test", SigBuilder::new().param(Type::i32()).build());
        let bb0 = b.create_block("bb0");
        let params = b.append_func_params();
        b.switch_to(bb0);

        let x = b.create_stack_slot("x", Type::i32());
        let p = b.create_stack_slot("p", Type::ptr());
        let x_addr = b.append().stackslot(x, DebugInfo::fake());
        let p_addr = b.append().stackslot(p, DebugInfo::fake());
        let doubled = b.append().iadd(params[0], params[0], DebugInfo::fake());

        // the pointer itself is stored into `p`, so `x_addr` has a store
        // use in both slots, only the second one stores it
        let into_x = b.append().store(doubled, x_addr, DebugInfo::fake());
        let into_p = b.append().store(x_addr, p_addr, DebugInfo::fake());
        b.append().ret_void(DebugInfo::fake());

        let f = b.define();
        let dfg = &module.function(f).definition().unwrap().dfg;

        assert_eq!(first_store_of(doubled, dfg), Some(into_x));
        assert_eq!(first_store_of(x_addr, dfg), Some(into_p));
        assert_eq!(first_store_of(p_addr, dfg), None);
        assert_eq!(first_store_of(params[0], dfg), None);
    }

    #[test]
    fn first_store_is_first_in_creation_order() {
        let mut module = Module::new("test");
        let mut b = module.define_function("test", SigBuilder::new().param(Type::i32()).build());
        let bb0 = b.create_block("bb0");
        let params = b.append_func_params();
        b.switch_to(bb0);

        let a = b.create_stack_slot("a", Type::i32());
        let z = b.create_stack_slot("z", Type::i32());
        let a_addr = b.append().stackslot(a, DebugInfo::fake());
        let z_addr = b.append().stackslot(z, DebugInfo::fake());
        let doubled = b.append().iadd(params[0], params[0], DebugInfo::fake());
        let first = b.append().store(doubled, a_addr, DebugInfo::fake());
        let _second = b.append().store(doubled, z_addr, DebugInfo::fake());
        b.append().ret_void(DebugInfo::fake());

        let f = b.define();
        let dfg = &module.function(f).definition().unwrap().dfg;

        assert_eq!(first_store_of(doubled, dfg), Some(first));
    }
}
