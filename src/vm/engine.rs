//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Type;
use thiserror::Error;

/// Provides a translation layer between the values that the runtime
/// understands internally and the outside world.
///
/// This is meant to allow foreign values to be passed in as arguments
/// to CIR functions, and to be returned from calls to those functions.
/// Pointers deliberately have no representation here, the stack memory
/// they refer to does not outlive the call that created it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ForeignValue {
    /// A `bool` value
    Bool(bool),
    /// An `i8` value
    Int8(u8),
    /// An `i16` value
    Int16(u16),
    /// An `i32` value
    Int32(u32),
    /// An `i64` value
    Int64(u64),
}

impl ForeignValue {
    /// Gets the CIR type that this foreign value models.
    pub fn ty(&self) -> Type {
        match self {
            Self::Bool(_) => Type::bool(),
            Self::Int8(_) => Type::i8(),
            Self::Int16(_) => Type::i16(),
            Self::Int32(_) => Type::i32(),
            Self::Int64(_) => Type::i64(),
        }
    }

    pub(in crate::vm) fn raw(self) -> u64 {
        match self {
            Self::Bool(b) => b as u64,
            Self::Int8(v) => v as u64,
            Self::Int16(v) => v as u64,
            Self::Int32(v) => v as u64,
            Self::Int64(v) => v,
        }
    }

    pub(in crate::vm) fn from_raw(ty: Type, raw: u64) -> Self {
        match ty {
            Type::Bool(_) => Self::Bool(raw & 1 != 0),
            Type::Int(int) => match int.width() {
                8 => Self::Int8(raw as u8),
                16 => Self::Int16(raw as u16),
                32 => Self::Int32(raw as u32),
                _ => Self::Int64(raw),
            },
            Type::Ptr(_) => unreachable!("pointers cannot cross the runtime boundary"),
        }
    }
}

/// The ways that executing CIR can fail, either at the call boundary
/// or during evaluation.
///
/// The runtime checks everything it relies on, a malformed or hostile
/// module yields one of these instead of executing anything nonsensical.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The requested function does not exist in the module.
    #[error("no function named `@{name}` exists in the module")]
    UnknownFunction {
        /// The name that was looked up
        name: String,
    },
    /// The function being called is a declaration with no body to run.
    #[error("`@{name}` is declared but never defined")]
    NotDefined {
        /// The name of the declaration
        name: String,
    },
    /// The number of arguments given does not match the signature.
    #[error("`@{name}` takes {expected} argument(s) but was given {given}")]
    ArgumentCount {
        /// The name of the function being called
        name: String,
        /// The number of parameters in the signature
        expected: usize,
        /// The number of arguments given at the call boundary
        given: usize,
    },
    /// An argument's type does not match the parameter it binds to.
    #[error("argument {index} of `@{name}` has the wrong type")]
    ArgumentType {
        /// The name of the function being called
        name: String,
        /// Which argument was mismatched, zero-based
        index: usize,
    },
    /// A value of this type cannot pass between the runtime and the
    /// outside world.
    #[error("a value of type `{ty}` cannot cross the runtime boundary")]
    UnsupportedBoundaryType {
        /// The type at the call boundary
        ty: String,
    },
    /// An `srem` was evaluated with a divisor of zero.
    #[error("remainder by zero")]
    RemainderByZero,
    /// A load or store went through a pointer that does not refer to
    /// a live stack slot.
    #[error("load or store through an invalid pointer")]
    InvalidPointer,
    /// Calls nested deeper than the runtime's fixed limit.
    #[error("call depth exceeded the runtime limit")]
    CallDepthExceeded,
    /// An instruction read a value that was never defined along the
    /// path control actually took.
    #[error("read of a value that was never defined")]
    UndefinedValue,
    /// The body being executed is not structurally executable, e.g. a
    /// block missing its terminator or a phi with no entry for the
    /// edge control arrived over.
    #[error("function body is malformed")]
    MalformedBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_values_report_their_type() {
        assert_eq!(ForeignValue::Bool(true).ty(), Type::bool());
        assert_eq!(ForeignValue::Int8(1).ty(), Type::i8());
        assert_eq!(ForeignValue::Int16(2).ty(), Type::i16());
        assert_eq!(ForeignValue::Int32(3).ty(), Type::i32());
        assert_eq!(ForeignValue::Int64(4).ty(), Type::i64());
    }

    #[test]
    fn raw_round_trips_through_the_width() {
        let value = ForeignValue::Int8(0xFF);

        assert_eq!(value.raw(), 0xFF);
        assert_eq!(ForeignValue::from_raw(Type::i8(), value.raw()), value);
        assert_eq!(ForeignValue::from_raw(Type::bool(), 1), ForeignValue::Bool(true));
        assert_eq!(ForeignValue::from_raw(Type::i64(), u64::MAX), ForeignValue::Int64(u64::MAX));
    }
}
