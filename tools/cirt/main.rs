//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use ansi_term::Color::Cyan;
use citrine::analysis;
use citrine::cli;
use citrine::cli::{execute, passes, verify, BaseOptions};
use citrine::ir::{DebugInfo, InstBuilder, Module, SigBuilder, Type};
use citrine::vm::Runtime;
use std::io::ErrorKind;
use std::{fs, io};
use tracing_subscriber::EnvFilter;

fn main() -> io::Result<()> {
    let (base, verify, passes, run) = parse_options();

    init_logging(&base);

    let mut module = demo_module();

    header("before");
    analysis::print_module(&module);

    if let Err(e) = citrine::run_rewrites(&mut module, verify, &passes) {
        eprintln!("failed to rewrite: {e}");

        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "failed to rewrite module",
        ));
    }

    header("after");
    analysis::print_module(&module);

    if let Some(path) = &base.output {
        let ir = analysis::stringify_module(&module);
        let err = format!("unable to write output to file `{}`", path.display());

        fs::write(path, ir).expect(&err);
    }

    if run {
        header("run");

        let runtime = Runtime::with_module(module);

        match runtime.call("main", &[]) {
            Ok(Some(value)) => println!("`@main` returned {value:?}"),
            Ok(None) => println!("`@main` returned void"),
            Err(e) => {
                eprintln!("failed to execute: {e}");

                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    "failed to execute module",
                ));
            }
        }
    }

    Ok(())
}

fn parse_options() -> (BaseOptions, bool, Vec<String>, bool) {
    let ((passes, verify, run), base) = cli::tool_with(
        "citrine demo driver, rewrites a built-in module and optionally runs it",
        "Usage: cirt [options]",
        bpaf::construct!(passes(), verify(), execute()),
    )
    .run();

    (base, verify, passes, run)
}

fn init_logging(base: &BaseOptions) {
    let default = if base.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();
}

fn header(text: &str) {
    let banner = Cyan.bold().paint(format!("===== {text} ====="));

    println!("{banner}");
}

/// Builds the module the driver rewrites, a CIR rendition of the sample
/// program the rewrites are usually demonstrated on. `main` accumulates
/// into a stack slot through `+=`, so every sum flows into a store.
///
/// ```c
/// int foo(int a) { return a * 2; }
/// int bar(int a, int b) { return a + foo(b) * 2; }
/// int fez(int a, int b, int c) { return a + bar(a, b) * 2 + c * 3; }
///
/// int main(void) {
///     int a = 123;
///     int ret = 0;
///
///     ret += foo(a);
///     ret += bar(a, ret);
///     ret += fez(a, ret, 123);
///
///     return ret;
/// }
/// ```
fn demo_module() -> Module {
    let mut module = Module::new("demo");
    let unary = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
    let binary = SigBuilder::new()
        .param(Type::i32())
        .param(Type::i32())
        .ret(Some(Type::i32()))
        .build();
    let ternary = SigBuilder::new()
        .params(&[Type::i32(), Type::i32(), Type::i32()])
        .ret(Some(Type::i32()))
        .build();

    let mut b = module.define_function("foo", unary.clone());
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let params = b.append_func_params();
    let two = b.append().iconst(Type::i32(), 2, DebugInfo::fake());
    let doubled = b.append().imul(params[0], two, DebugInfo::fake());

    b.append().ret_val(doubled, DebugInfo::fake());

    let foo = b.define();

    let mut b = module.define_function("bar", binary.clone());
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let params = b.append_func_params();
    let sig = b.import_signature(&unary);
    let call = b.append().call(foo, sig, &[params[1]], DebugInfo::fake());
    let result = b.inst_to_result(call).expect("`@foo` returns a value");
    let two = b.append().iconst(Type::i32(), 2, DebugInfo::fake());
    let scaled = b.append().imul(result, two, DebugInfo::fake());
    let sum = b.append().iadd(params[0], scaled, DebugInfo::fake());

    b.append().ret_val(sum, DebugInfo::fake());

    let bar = b.define();

    let mut b = module.define_function("fez", ternary.clone());
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let params = b.append_func_params();
    let sig = b.import_signature(&binary);
    let call = b.append().call(bar, sig, &[params[0], params[1]], DebugInfo::fake());
    let result = b.inst_to_result(call).expect("`@bar` returns a value");
    let two = b.append().iconst(Type::i32(), 2, DebugInfo::fake());
    let scaled = b.append().imul(result, two, DebugInfo::fake());
    let partial = b.append().iadd(params[0], scaled, DebugInfo::fake());
    let three = b.append().iconst(Type::i32(), 3, DebugInfo::fake());
    let weighted = b.append().imul(params[2], three, DebugInfo::fake());
    let sum = b.append().iadd(partial, weighted, DebugInfo::fake());

    b.append().ret_val(sum, DebugInfo::fake());

    let fez = b.define();

    let mut b = module.define_function("main", SigBuilder::new().ret(Some(Type::i32())).build());
    let slot = b.create_stack_slot("ret", Type::i32());
    let entry = b.create_block("entry");

    b.switch_to(entry);

    let addr = b.append().stackslot(slot, DebugInfo::fake());
    let zero = b.append().iconst(Type::i32(), 0, DebugInfo::fake());

    b.append().store(zero, addr, DebugInfo::fake());

    let a = b.append().iconst(Type::i32(), 123, DebugInfo::fake());
    let unary_sig = b.import_signature(&unary);
    let binary_sig = b.import_signature(&binary);
    let ternary_sig = b.import_signature(&ternary);

    let call = b.append().call(foo, unary_sig, &[a], DebugInfo::fake());
    let result = b.inst_to_result(call).expect("`@foo` returns a value");
    let current = b.append().load(Type::i32(), addr, DebugInfo::fake());
    let updated = b.append().iadd(current, result, DebugInfo::fake());

    b.append().store(updated, addr, DebugInfo::fake());

    let current = b.append().load(Type::i32(), addr, DebugInfo::fake());
    let call = b.append().call(bar, binary_sig, &[a, current], DebugInfo::fake());
    let result = b.inst_to_result(call).expect("`@bar` returns a value");
    let current = b.append().load(Type::i32(), addr, DebugInfo::fake());
    let updated = b.append().iadd(current, result, DebugInfo::fake());

    b.append().store(updated, addr, DebugInfo::fake());

    let current = b.append().load(Type::i32(), addr, DebugInfo::fake());
    let call = b.append().call(fez, ternary_sig, &[a, current, a], DebugInfo::fake());
    let result = b.inst_to_result(call).expect("`@fez` returns a value");
    let current = b.append().load(Type::i32(), addr, DebugInfo::fake());
    let updated = b.append().iadd(current, result, DebugInfo::fake());

    b.append().store(updated, addr, DebugInfo::fake());

    let ret = b.append().load(Type::i32(), addr, DebugInfo::fake());

    b.append().ret_val(ret, DebugInfo::fake());
    b.define();

    module
}
