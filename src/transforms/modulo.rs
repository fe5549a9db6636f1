//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Synthesizes the `Modulo` helper function that [`inject_modulo_calls`]
//! rewrites calls to.
//!
//! [`inject_modulo_calls`]: crate::transforms::inject_modulo_calls

use crate::ir::{DebugInfo, Func, InstBuilder, Module, SigBuilder, Type};
use crate::transforms::{verify_func, RewriteError};

/// The name the synthesized helper is registered under. Lookup of an existing
/// helper goes through this name too, so a module can only ever end up with
/// one copy.
pub const MODULO_NAME: &str = "Modulo";

/// Gets the `Modulo` helper in `module`, synthesizing it if it doesn't exist
/// yet.
///
/// The helper has the signature `i32 (i32)` and computes `x > 100 ? x % 100
/// : x`. Calling this twice on the same module returns the same function,
/// the helper is found by name before anything is created.
///
/// The construction is fixed, but the new body is still run through
/// [`verify_func`] before it is handed back so a drift in the builder logic
/// surfaces as [`RewriteError::MalformedIr`] instead of as bad IR leaking
/// into a rewrite.
pub fn get_or_create_modulo(module: &mut Module) -> Result<Func, RewriteError> {
    if let Some(existing) = module.find_function_by_name(MODULO_NAME) {
        return Ok(existing);
    }

    let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
    let mut b = module.define_function(MODULO_NAME, sig);
    let entry = b.create_block("entry");
    let reduce = b.create_block("mod");
    let merge = b.create_block("merge");

    b.switch_to(entry);

    let param = b.append_func_params()[0];
    let hundred = b.append().iconst(Type::i32(), 100, DebugInfo::fake());
    let over = b.append().icmp_sgt(param, hundred, DebugInfo::fake());

    b.append().condbr(over, reduce, merge, DebugInfo::fake());
    b.switch_to(reduce);

    let rem = b.append().srem(param, hundred, DebugInfo::fake());

    b.append().br(merge, DebugInfo::fake());
    b.switch_to(merge);

    let result = b
        .append()
        .phi(Type::i32(), &[(entry, param), (reduce, rem)], DebugInfo::fake());

    b.append().ret_val(result, DebugInfo::fake());

    let func = b.define();

    verify_func(module.function(func)).map_err(|errors| RewriteError::malformed(&errors))?;

    tracing::debug!(name = MODULO_NAME, "synthesized modulo helper");

    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Cursor, FuncView};

    #[test]
    fn creates_helper_once() {
        let mut module = Module::new("helpers");
        let first = get_or_create_modulo(&mut module).unwrap();
        let second = get_or_create_modulo(&mut module).unwrap();

        assert_eq!(first, second);
        assert_eq!(module.function(first).name(), MODULO_NAME);
    }

    #[test]
    fn helper_has_expected_shape() {
        let mut module = Module::new("helpers");
        let func = get_or_create_modulo(&mut module).unwrap();
        let function = module.function(func);

        let sig = function.signature();

        assert_eq!(sig.params(), &[Type::i32()]);
        assert_eq!(sig.return_ty(), Some(Type::i32()));

        let mut cursor = FuncView::over(function);
        let mut blocks = 0;

        while cursor.next_block().is_some() {
            blocks += 1;
        }

        assert_eq!(blocks, 3);
    }
}
