//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::dense_arena_key;
use crate::ir::{DataFlowGraph, Layout, ModuleContext, Type};
use crate::utility::Str;
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// The reference type for [`Signature`]s. They are keys into a table
    /// stored inside the [`DataFlowGraph`] of the function that they are used in.
    ///
    /// Note that this means that a `Sig` is only valid in its own function.
    pub struct Sig;

    /// The reference type for a [`Function`]. These can be looked up
    /// at the [`Module`](crate::ir::Module) level.
    pub struct Func;

    /// The reference type for a stack slot declared by a function. The
    /// slot's storage is materialized as a pointer with the `stackslot`
    /// instruction.
    pub struct StackSlot;
}

/// Holds all of the information necessary to call a function.
///
/// These are held in the [`DataFlowGraph`] alongside everything else
/// in a function, and are referenced through [`Sig`]s.
///
/// ```
/// # use citrine::ir::*;
/// let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
///
/// assert_eq!(sig.params(), &[Type::i32()]);
/// assert_eq!(sig.return_ty(), Some(Type::i32()));
/// ```
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Signature {
    params: SmallVec<[Type; 2]>,
    ret: Option<Type>,
}

impl Signature {
    pub(crate) fn new(params: SmallVec<[Type; 2]>, ret: Option<Type>) -> Self {
        Self { params, ret }
    }

    /// Gets the return type of the function signature.
    ///
    /// Note that `None` represents `void`, i.e. a function that doesn't
    /// actually return anything.
    #[inline]
    pub fn return_ty(&self) -> Option<Type> {
        self.ret
    }

    /// Gets the list of parameter types for the function.
    #[inline]
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// Checks if the signature refers to a `void` function.
    #[inline]
    pub fn is_void(&self) -> bool {
        self.ret.is_none()
    }
}

/// A builder in the style of the rest of the IR builders, but
/// for creating [`Signature`]s.
///
/// ```
/// # use citrine::ir::*;
/// let sig = SigBuilder::new()
///     .params(&[Type::i32(), Type::ptr()])
///     .ret(None)
///     .build();
///
/// assert!(sig.is_void());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SigBuilder {
    params: SmallVec<[Type; 2]>,
    ret: Option<Type>,
}

impl SigBuilder {
    /// Creates a builder for a signature with no parameters that
    /// returns `void`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single parameter to the signature.
    pub fn param(mut self, ty: Type) -> Self {
        self.params.push(ty);

        self
    }

    /// Appends a list of parameters to the signature.
    pub fn params(mut self, tys: &[Type]) -> Self {
        self.params.extend_from_slice(tys);

        self
    }

    /// Sets the return type of the signature, `None` meaning `void`.
    pub fn ret(mut self, ty: Option<Type>) -> Self {
        self.ret = ty;

        self
    }

    /// Finishes the builder off and yields a complete [`Signature`].
    pub fn build(self) -> Signature {
        Signature::new(self.params, self.ret)
    }
}

/// The data for a single stack slot declared by a function.
///
/// Slots are function-local regions of memory, they exist for the whole
/// call and their address is taken with the `stackslot` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StackSlotData {
    name: Str,
    ty: Type,
}

impl StackSlotData {
    pub(in crate::ir) fn new(name: Str, ty: Type) -> Self {
        Self { name, ty }
    }

    /// Gets the name the slot was declared with.
    pub fn name(&self) -> Str {
        self.name
    }

    /// Gets the type the slot was declared to hold.
    pub fn ty(&self) -> Type {
        self.ty
    }
}

/// The definition of a function.
///
/// This provides the storage for data in the function, and the
/// layout information that actually makes up a meaningful chunk of IR.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct FunctionDefinition {
    /// The "data-flow graph" (DFG) of the function. This is effectively
    /// the storage for every entity (instruction, value, block, etc.) that
    /// is used inside the function.
    ///
    /// This also contains data-flow information, it can tell you the
    /// data dependencies between each value.
    pub dfg: DataFlowGraph,
    /// The layout of a function. This maps all the data in the DFG into
    /// a structure that actually makes up a function, it models the relationships
    /// *between* entities from the DFG.
    ///
    /// This contains the lists that make up basic blocks, and the block ordering.
    pub layout: Layout,
}

/// Models a single function in the IR.
///
/// Contains a list of basic blocks and a list of parameters (included
/// in the signature), and a name.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Function {
    name: String,
    sig: Signature,
    func: Func,
    context: ModuleContext,
    definition: Option<FunctionDefinition>,
}

impl Function {
    /// Creates an empty function with a given name and signature.
    ///
    /// This is equivalent to "declaring" a function, as a declared function is
    /// just a function without a body.
    pub(in crate::ir) fn new(name: String, sig: Signature, func: Func, ctx: ModuleContext) -> Self {
        Self {
            name,
            sig,
            func,
            context: ctx,
            definition: None,
        }
    }

    /// Gets the signature of the function.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    /// Gets the return type of the function. If the function
    /// is a `void` function, [`None`] is returned.
    #[inline]
    pub fn return_ty(&self) -> Option<Type> {
        self.signature().return_ty()
    }

    /// Checks if the function is a declaration, i.e. whether or not
    /// it actually has a definition.
    #[inline]
    pub fn is_decl(&self) -> bool {
        self.definition.is_none()
    }

    /// Gets the function definition if it exists.
    #[inline]
    pub fn definition(&self) -> Option<&FunctionDefinition> {
        self.definition.as_ref()
    }

    /// Gets the function definition if it exists.
    #[inline]
    pub fn definition_mut(&mut self) -> Option<&mut FunctionDefinition> {
        self.definition.as_mut()
    }

    /// Gets the name of the function without `@`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a [`Func`] that refers to `self`. This can be used when a
    /// [`Module`](crate::ir::Module) is not available to get [`Func`]s from.
    #[inline]
    pub fn func(&self) -> Func {
        self.func
    }

    /// Gets the module context associated with the module that contains
    /// this function, allowing the string pool to be accessed directly.
    #[inline]
    pub fn ctx(&self) -> &ModuleContext {
        &self.context
    }

    pub(in crate::ir) fn replace_definition(&mut self, def: FunctionDefinition) {
        self.definition.replace(def);
    }
}
