//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Contains utility code specifically for the CLI tools located in
//! the `tools/` subdirectory.
//!
//! All of these tools should look and feel uniform, so the shared
//! argument handling is pulled into this module and then used in the
//! drivers of the different tools.

use bpaf::{construct, OptionParser, Parser};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basic options that every CLI tool in the suite takes in.
pub struct BaseOptions {
    /// The file to output results to
    pub output: Option<PathBuf>,
    /// Whether or not to run the logging in verbose mode.
    pub verbose: bool,
}

/// Returns an [`OptionParser`] preconfigured with the standard Citrine
/// options and additional tool-specific options.
pub fn tool_with<T>(
    description: &'static str,
    usage: &'static str,
    additional: impl Parser<T> + 'static,
) -> OptionParser<(T, BaseOptions)> {
    let res = construct!(additional, default());

    res.to_options()
        .descr(description)
        .version(VERSION)
        .usage(usage)
}

/// Gets the baseline default options that every tool needs.
pub fn default() -> impl Parser<BaseOptions> {
    let output = output();
    let verbose = verbose();

    construct!(BaseOptions { output, verbose })
}

/// Gets the output file specified on the CLI, if one exists.
pub fn output() -> impl Parser<Option<PathBuf>> {
    bpaf::long("output")
        .short('o')
        .help("the file to output the rewritten IR to")
        .argument::<PathBuf>("FILE")
        .optional()
}

/// Checks for the presence of `-v` or `--verbose`
pub fn verbose() -> impl Parser<bool> {
    bpaf::long("verbose")
        .short('v')
        .help("enable verbose output")
        .flag(true, false)
}

/// Gets a list of passes to run over the IR
pub fn passes() -> impl Parser<Vec<String>> {
    bpaf::long("passes")
        .short('p')
        .help("a pass to run over the input")
        .argument::<String>("PASS-NAME")
        .many()
}

/// Checks for the presence of `--verify`
pub fn verify() -> impl Parser<bool> {
    bpaf::long("verify")
        .help("verify the module before and after every pass")
        .flag(true, false)
}

/// Checks for the presence of `--run`
pub fn execute() -> impl Parser<bool> {
    bpaf::long("run")
        .help("execute `main` through the runtime after rewriting")
        .flag(true, false)
}
