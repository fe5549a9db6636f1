//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::ir::*;
use crate::pass::{ModuleAnalysisManager, ModuleAnalysisPass};
use crate::utility::{Str, StringPool};
use std::any::TypeId;
use std::io;
use std::ops::Range;

/// A simple CIR -> text pass that takes in an entire module, turns it into
/// textual CIR, and then maps each IR entity to a range of text referring to it.
///
/// This can be used for debug/test passes that need to produce human-readable CIR.
#[derive(Debug, Clone)]
pub struct ModuleWriter {
    whole: String,
    val_ranges: SecondaryMap<Value, Range<usize>>,
    inst_ranges: SecondaryMap<Inst, Range<usize>>,
    block_ranges: SecondaryMap<Block, Range<usize>>,
    func_ranges: SecondaryMap<Func, Range<usize>>,
}

impl ModuleWriter {
    pub(crate) fn from(module: &Module) -> Self {
        let mut writer_impl = WriterImpl {
            module,
            state: ModuleWriter {
                whole: String::default(),
                val_ranges: SecondaryMap::default(),
                inst_ranges: SecondaryMap::default(),
                block_ranges: SecondaryMap::default(),
                func_ranges: SecondaryMap::default(),
            },
            values: SecondaryMap::default(),
            next: 0,
        };

        writer_impl.walk();

        writer_impl.state
    }

    /// Stringifies a CIR type. Unlike the rest of this module, this type does not necessarily
    /// have to have been used in the module that this was constructed from.
    pub fn ty(&self, ty: Type) -> String {
        stringify_ty(ty)
    }

    /// Provides the name of a value. This is the `%_` syntax.
    pub fn val(&self, value: Value) -> &str {
        &self.whole[self.val_ranges[value].clone()]
    }

    /// Stringifies an entire instruction. This includes the result if the
    /// instruction actually has one.
    pub fn inst(&self, inst: Inst) -> &str {
        &self.whole[self.inst_ranges[inst].clone()]
    }

    /// Stringifies a whole block. This includes the block label and every
    /// instruction in the block.
    pub fn block(&self, bb: Block) -> &str {
        &self.whole[self.block_ranges[bb].clone()]
    }

    /// Stringifies a whole function. This includes every block, and the function prototype.
    pub fn func(&self, func: Func) -> &str {
        &self.whole[self.func_ranges[func].clone()]
    }

    /// Returns the entire module as a string.
    pub fn module(&self) -> &str {
        &self.whole
    }
}

/// Prints an entire module to `stdout`.
///
/// Wrapper for when setting up a pass/analysis manager and running the writer
/// pass is too much.
pub fn print_module(module: &Module) {
    println!("{}", ModuleWriter::from(module).module());
}

/// Returns the textual form of an entire module.
///
/// Wrapper for when setting up a pass/analysis manager and running the writer
/// pass is too much.
pub fn stringify_module(module: &Module) -> String {
    ModuleWriter::from(module).module().to_owned()
}

/// This is an analysis that provides a [`ModuleWriter`] to any code that wants it.
///
/// This analysis needs to be run in the standard way for a correct [`ModuleWriter`]
/// to be produced, the result yielded by the analysis can then be queried as desired.
pub struct ModuleStringifyAnalysis {}

impl ModuleAnalysisPass for ModuleStringifyAnalysis {
    type Result = ModuleWriter;

    fn expects_preserved(&self) -> &'static [TypeId] {
        &[]
    }

    fn run(&mut self, module: &Module, _: &ModuleAnalysisManager) -> Self::Result {
        ModuleWriter::from(module)
    }
}

/// This is an analysis that writes out a textual representation of a module
/// to a writer.
///
/// This analysis needs to be run in the standard way for a correct [`ModuleWriter`]
/// to be produced, the result yielded by the analysis can then be queried as desired.
pub struct ModuleWriterAnalysis {
    out: Box<dyn io::Write>,
}

impl ModuleWriterAnalysis {
    /// Creates an instance of the pass with a given writer.
    ///
    /// This writer will be where the module is printed out when the analysis
    /// is run over the IR.
    pub fn with_writer<T: io::Write + 'static>(writer: T) -> Self {
        Self {
            out: Box::new(writer),
        }
    }
}

impl ModuleAnalysisPass for ModuleWriterAnalysis {
    type Result = ();

    fn expects_preserved(&self) -> &'static [TypeId] {
        &[]
    }

    fn run(&mut self, module: &Module, am: &ModuleAnalysisManager) -> Self::Result {
        let writer = am.get::<ModuleStringifyAnalysis>(module);

        self.out
            .write_all(writer.module().as_bytes())
            .expect("unable to write module to writer")
    }
}

pub(crate) fn stringify_ty(ty: Type) -> String {
    match ty {
        Type::Bool(_) => "bool".to_owned(),
        Type::Ptr(_) => "ptr".to_owned(),
        Type::Int(i) => format!("i{}", i.width()),
    }
}

pub(crate) fn stringify_return_ty(ty: Option<Type>) -> String {
    match ty {
        Some(ty) => stringify_ty(ty),
        None => "void".to_owned(),
    }
}

fn write_sig_params(buf: &mut String, sig: &Signature) {
    *buf += "(";

    let mut it = sig.params().iter().peekable();

    while let Some(ty) = it.next() {
        *buf += &stringify_ty(*ty);

        if it.peek().is_some() {
            *buf += ", ";
        }
    }

    *buf += ")"
}

pub(crate) fn stringify_signature_params(sig: &Signature) -> String {
    let mut buf = String::default();

    write_sig_params(&mut buf, sig);

    buf
}

pub(crate) fn stringify_signature(sig: &Signature) -> String {
    let mut buf = stringify_return_ty(sig.return_ty());

    buf += " ";

    write_sig_params(&mut buf, sig);

    buf
}

impl ValueName {
    fn into_string(self, pool: &StringPool) -> String {
        match self {
            ValueName::Num(x) => format!("%{x}"),
            ValueName::Name(s) => format!("%{}", &pool[s]),
        }
    }
}

#[derive(Copy, Clone)]
enum ValueName {
    Num(u32),
    Name(Str),
}

struct WriterImpl<'m> {
    module: &'m Module,
    state: ModuleWriter,
    values: SecondaryMap<Value, ValueName>,
    next: u32,
}

impl<'m> WriterImpl<'m> {
    fn module(&self) -> &'m Module {
        self.module
    }

    fn resolve(&self, s: Str) -> String {
        self.module().context().strings()[s].to_owned()
    }

    fn ty(&self, ty: Type) -> String {
        stringify_ty(ty)
    }

    fn ty_void(&self, ty: Option<Type>) -> String {
        stringify_return_ty(ty)
    }

    fn param_tys(&self, sig: &Signature) -> String {
        stringify_signature_params(sig)
    }

    fn func_name(&self, func: Func) -> String {
        format!("@{}", self.module().function(func).name())
    }

    fn block_name(&self, block: Block, def: &FunctionDefinition) -> String {
        self.resolve(def.dfg.block(block).name())
    }

    fn result(&mut self, inst: Inst, def: &FunctionDefinition) {
        if let Some(val) = def.dfg.inst_to_result(inst) {
            let name = self.name(val, def);
            let begin = self.state.whole.len();

            self.state.whole += &format!("{name} = ");
            self.state
                .val_ranges
                .insert(val, begin..(begin + name.len()));
        }
    }

    fn arith<const C: bool>(
        &mut self,
        name: &'static str,
        inst: Inst,
        data: &ArithmeticInst<C>,
        def: &FunctionDefinition,
    ) {
        self.result(inst, def);

        let flags = stringify_flags(data.flags());
        let ty = self.ty(data.result_ty().unwrap());
        let lhs = self.name(data.lhs(), def);
        let rhs = self.name(data.rhs(), def);

        self.state.whole += &format!("{name}{flags} {ty} {lhs}, {rhs}");
    }

    fn args(&mut self, vals: &[Value], def: &FunctionDefinition) -> String {
        let mut result = String::default();
        let mut it = vals.iter().copied().peekable();

        while let Some(param) = it.next() {
            result += &self.name_ty(param, def);

            if it.peek().is_some() {
                result += ", ";
            }
        }

        result
    }

    fn name_ty(&mut self, val: Value, def: &FunctionDefinition) -> String {
        let ty = self.ty(def.dfg.ty(val));
        let val = self.name(val, def);

        format!("{ty} {val}")
    }

    fn name(&mut self, val: Value, def: &FunctionDefinition) -> String {
        let name = match self.values.get(val) {
            Some(name) => *name,
            None => self.insert_name(val, def),
        };

        name.into_string(&self.module().context().strings())
    }

    fn insert_name(&mut self, val: Value, def: &FunctionDefinition) -> ValueName {
        let debug_name = def
            .dfg
            .value_to_inst(val)
            .and_then(|inst| def.dfg.debug_info(inst).name());

        let new = match debug_name {
            Some(s) => ValueName::Name(s),
            None => {
                self.next += 1;
                ValueName::Num(self.next - 1)
            }
        };

        self.values.insert(val, new);

        new
    }

    fn walk(&mut self) {
        let mut it = self.module().functions();

        // if we have any functions at all, print first one without leading \n
        if let Some(func) = it.next() {
            self.visit_func(func);
        }

        // for any remaining functions, print a newline to split them up
        // then print the function
        for func in it {
            self.state.whole += "\n";

            self.visit_func(func);
        }
    }

    fn visit_func(&mut self, func: Func) {
        let begin = self.state.whole.len();

        // value names are local to a single function body
        self.values = SecondaryMap::default();
        self.next = 0;

        {
            let f = self.module().function(func);
            let sig = f.signature();
            let ty = self.ty_void(sig.return_ty());
            let name = self.func_name(func);

            match f.definition() {
                Some(def) => {
                    self.state.whole += &format!("fn {ty} {name}(");

                    //
                    // the reason we don't use self.args is because these are **new** value names,
                    // so we need to add them to val_ranges.
                    //
                    // we can't do that inside of self.args because it returns a string by design,
                    // it doesn't directly mutate self.state.whole
                    //
                    let mut it = def.dfg.func_params().iter().copied().peekable();

                    while let Some(param) = it.next() {
                        let begin = self.state.whole.len();

                        {
                            let pair = self.name_ty(param, def);
                            self.state.whole += &pair;
                        }

                        let end = self.state.whole.len();

                        self.state.val_ranges.insert(param, begin..end);

                        if it.peek().is_some() {
                            self.state.whole += ", ";
                        }
                    }

                    self.state.whole += ") {\n";

                    self.stack_slots(def);
                    self.dispatch_blocks(def);

                    // blocks print a newline after every inst, including last one
                    self.state.whole += "}\n";
                }
                None => {
                    let params = self.param_tys(sig);

                    self.state.whole += &format!("fn {ty} {name}{params}\n");
                }
            }
        }

        let end = self.state.whole.len();

        self.state.func_ranges.insert(func, begin..end);
    }

    fn stack_slots(&mut self, def: &FunctionDefinition) {
        for (_, data) in def.dfg.stack_slots() {
            let name = self.resolve(data.name());
            let ty = self.ty(data.ty());

            self.state.whole += &format!("  ${name} = stack {ty}\n");
        }
    }

    fn dispatch_blocks(&mut self, def: &FunctionDefinition) {
        for block in def.layout.blocks() {
            self.visit_block(block, def);
        }
    }

    fn visit_block(&mut self, block: Block, def: &FunctionDefinition) {
        let begin = self.state.whole.len();

        {
            let name = self.block_name(block, def);

            self.state.whole += &name;
            self.state.whole += ":\n";

            for inst in def.layout.insts_in_block(block) {
                self.visit_inst(inst, def);
            }
        }

        let end = self.state.whole.len();

        self.state.block_ranges.insert(block, begin..end);
    }

    fn visit_inst(&mut self, inst: Inst, def: &FunctionDefinition) {
        let begin = self.state.whole.len();

        {
            self.state.whole += "  ";
            self.dispatch_inst(inst, def.dfg.inst_data(inst), def);
            self.state.whole += "\n";
        }

        let end = self.state.whole.len();

        self.state.inst_ranges.insert(inst, begin..end);
    }

    fn dispatch_inst(&mut self, inst: Inst, data: &InstData, def: &FunctionDefinition) {
        match data {
            InstData::Call(call) => self.visit_call(inst, call, def),
            InstData::ICmp(icmp) => self.visit_icmp(inst, icmp, def),
            InstData::Br(br) => self.visit_br(inst, br, def),
            InstData::CondBr(condbr) => self.visit_condbr(inst, condbr, def),
            InstData::Ret(ret) => self.visit_ret(inst, ret, def),
            InstData::IAdd(arith) => self.arith("iadd", inst, arith, def),
            InstData::ISub(arith) => self.arith("isub", inst, arith, def),
            InstData::IMul(arith) => self.arith("imul", inst, arith, def),
            InstData::SRem(arith) => self.arith("srem", inst, arith, def),
            InstData::Load(load) => self.visit_load(inst, load, def),
            InstData::Store(store) => self.visit_store(inst, store, def),
            InstData::IConst(iconst) => self.visit_iconst(inst, iconst, def),
            InstData::StackSlot(slot) => self.visit_stackslot(inst, slot, def),
            InstData::Phi(phi) => self.visit_phi(inst, phi, def),
        }
    }

    fn visit_call(&mut self, inst: Inst, data: &CallInst, def: &FunctionDefinition) {
        self.result(inst, def);

        let ret = self.ty_void(data.result_ty());
        let name = self.func_name(data.callee());
        let args = self.args(data.args(), def);

        self.state.whole += &format!("call {ret} {name}({args})");
    }

    fn visit_icmp(&mut self, inst: Inst, data: &ICmpInst, def: &FunctionDefinition) {
        self.result(inst, def);

        let opc = match data.op() {
            ICmpOp::EQ => "eq",
            ICmpOp::NE => "ne",
            ICmpOp::SGT => "sgt",
            ICmpOp::SLT => "slt",
            ICmpOp::SGE => "sge",
            ICmpOp::SLE => "sle",
            ICmpOp::UGT => "ugt",
            ICmpOp::ULT => "ult",
            ICmpOp::UGE => "uge",
            ICmpOp::ULE => "ule",
        };

        let ty = self.ty(def.dfg.ty(data.lhs()));
        let lhs = self.name(data.lhs(), def);
        let rhs = self.name(data.rhs(), def);

        self.state.whole += &format!("icmp {opc} {ty} {lhs}, {rhs}");
    }

    fn visit_br(&mut self, _: Inst, data: &BrInst, def: &FunctionDefinition) {
        let target = self.block_name(data.target(), def);

        self.state.whole += &format!("br {target}");
    }

    fn visit_condbr(&mut self, _: Inst, data: &CondBrInst, def: &FunctionDefinition) {
        let cond = self.name(data.condition(), def);
        let if_true = self.block_name(data.true_branch(), def);
        let if_false = self.block_name(data.false_branch(), def);

        self.state.whole += &format!("condbr bool {cond}, {if_true}, {if_false}");
    }

    fn visit_ret(&mut self, _: Inst, data: &RetInst, def: &FunctionDefinition) {
        match data.value() {
            Some(val) => {
                let ty = self.ty(def.dfg.ty(val));
                let val = self.name(val, def);

                self.state.whole += &format!("ret {ty} {val}");
            }
            None => self.state.whole += "ret void",
        }
    }

    fn visit_load(&mut self, inst: Inst, data: &LoadInst, def: &FunctionDefinition) {
        self.result(inst, def);

        let ty = self.ty(data.result_ty().unwrap());
        let val = self.name_ty(data.pointer(), def);

        self.state.whole += &format!("load {ty}, {val}");
    }

    fn visit_store(&mut self, _: Inst, data: &StoreInst, def: &FunctionDefinition) {
        let val = self.name_ty(data.stored(), def);
        let ptr = self.name_ty(data.pointer(), def);

        self.state.whole += &format!("store {val}, {ptr}");
    }

    fn visit_iconst(&mut self, inst: Inst, data: &IConstInst, def: &FunctionDefinition) {
        self.result(inst, def);

        let ty = self.ty(data.result_ty().unwrap());
        let value = data.value();

        self.state.whole += &format!("iconst {ty} {value}");
    }

    fn visit_stackslot(&mut self, inst: Inst, data: &StackSlotInst, def: &FunctionDefinition) {
        self.result(inst, def);

        let name = self.resolve(def.dfg.stack_slot(data.slot()).name());

        self.state.whole += &format!("stackslot ${name}");
    }

    fn visit_phi(&mut self, inst: Inst, data: &PhiInst, def: &FunctionDefinition) {
        self.result(inst, def);

        let ty = self.ty(data.result_ty().unwrap());

        self.state.whole += &format!("phi {ty} ");

        let mut it = data.incoming().peekable();

        while let Some((block, value)) = it.next() {
            let name = self.block_name(block, def);
            let val = self.name(value, def);

            self.state.whole += &format!("[ {name}, {val} ]");

            if it.peek().is_some() {
                self.state.whole += ", ";
            }
        }
    }
}

fn stringify_flags(flags: ArithFlags) -> &'static str {
    match (
        flags.contains(ArithFlags::NSW),
        flags.contains(ArithFlags::NUW),
    ) {
        (true, true) => " nsw nuw",
        (true, false) => " nsw",
        (false, true) => " nuw",
        (false, false) => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn writes_simple_function() {
        let mut module = Module::new("test");
        let sig = SigBuilder::new()
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();

        let mut b = module.define_function("square", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let result = b.append().imul(params[0], params[0], DebugInfo::fake());

        b.append().ret_val(result, DebugInfo::fake());
        b.define();

        let writer = ModuleWriter::from(&module);

        assert_eq!(
            writer.module(),
            concat!(
                "fn i32 @square(i32 %0) {\n",
                "entry:\n",
                "  %1 = imul i32 %0, %0\n",
                "  ret i32 %1\n",
                "}\n"
            )
        );
    }

    #[test]
    fn numbers_values_per_function() {
        let mut module = Module::new("test");

        for name in ["first", "second"] {
            let sig = SigBuilder::new()
                .param(Type::i32())
                .ret(Some(Type::i32()))
                .build();

            let mut b = module.define_function(name, sig);
            let entry = b.create_block("entry");

            b.switch_to(entry);

            let params = b.append_func_params();

            b.append().ret_val(params[0], DebugInfo::fake());
            b.define();
        }

        let writer = ModuleWriter::from(&module);

        assert_eq!(
            writer.module(),
            concat!(
                "fn i32 @first(i32 %0) {\n",
                "entry:\n",
                "  ret i32 %0\n",
                "}\n",
                "\n",
                "fn i32 @second(i32 %0) {\n",
                "entry:\n",
                "  ret i32 %0\n",
                "}\n"
            )
        );
    }

    #[test]
    fn writes_branches_and_phis() {
        let mut module = Module::new("test");
        let sig = SigBuilder::new()
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();

        let mut b = module.define_function("clamp_ish", sig);
        let entry = b.create_block("entry");
        let big = b.create_block("big");
        let small = b.create_block("small");
        let merge = b.create_block("merge");

        b.switch_to(entry);

        let params = b.append_func_params();
        let hundred = b.append().iconst(Type::i32(), 100, DebugInfo::fake());
        let cond = b.append().icmp_sgt(params[0], hundred, DebugInfo::fake());

        b.append().condbr(cond, big, small, DebugInfo::fake());

        b.switch_to(big);
        b.append().br(merge, DebugInfo::fake());

        b.switch_to(small);
        b.append().br(merge, DebugInfo::fake());

        b.switch_to(merge);

        let phi = b.append().phi(
            Type::i32(),
            &[(big, hundred), (small, params[0])],
            DebugInfo::fake(),
        );

        b.append().ret_val(phi, DebugInfo::fake());
        b.define();

        let writer = ModuleWriter::from(&module);

        assert_eq!(
            writer.module(),
            concat!(
                "fn i32 @clamp_ish(i32 %0) {\n",
                "entry:\n",
                "  %1 = iconst i32 100\n",
                "  %2 = icmp sgt i32 %0, %1\n",
                "  condbr bool %2, big, small\n",
                "big:\n",
                "  br merge\n",
                "small:\n",
                "  br merge\n",
                "merge:\n",
                "  %3 = phi i32 [ big, %1 ], [ small, %0 ]\n",
                "  ret i32 %3\n",
                "}\n"
            )
        );
    }

    #[test]
    fn writes_stack_slots_and_memory() {
        let mut module = Module::new("test");
        let sig = SigBuilder::new().ret(Some(Type::i32())).build();

        let mut b = module.define_function("load_it", sig);
        let slot = b.create_stack_slot("x", Type::i32());
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let addr = b.append().stackslot(slot, DebugInfo::fake());
        let forty = b.append().iconst(Type::i32(), 40, DebugInfo::fake());

        b.append().store(forty, addr, DebugInfo::fake());

        let val = b.append().load(Type::i32(), addr, DebugInfo::fake());

        b.append().ret_val(val, DebugInfo::fake());
        b.define();

        let writer = ModuleWriter::from(&module);

        assert_eq!(
            writer.module(),
            concat!(
                "fn i32 @load_it() {\n",
                "  $x = stack i32\n",
                "entry:\n",
                "  %0 = stackslot $x\n",
                "  %1 = iconst i32 40\n",
                "  store i32 %1, ptr %0\n",
                "  %2 = load i32, ptr %0\n",
                "  ret i32 %2\n",
                "}\n"
            )
        );
    }

    #[test]
    fn writes_declarations_and_flags() {
        let mut module = Module::new("test");
        let ext_sig = SigBuilder::new()
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();
        let ext = module.declare_function("modulo", ext_sig.clone());

        let sig = SigBuilder::new()
            .param(Type::i32())
            .param(Type::i32())
            .ret(Some(Type::i32()))
            .build();

        let mut b = module.define_function("caller", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();
        let sum = b.append().iadd_with_flags(
            params[0],
            params[1],
            ArithFlags::NSW,
            DebugInfo::fake(),
        );

        let call_sig = b.import_signature(&ext_sig);
        let call = b.append().call(ext, call_sig, &[sum], DebugInfo::fake());
        let result = b.inst_to_result(call).unwrap();

        b.append().ret_val(result, DebugInfo::fake());
        b.define();

        let writer = ModuleWriter::from(&module);

        assert_eq!(
            writer.module(),
            concat!(
                "fn i32 @modulo(i32)\n",
                "\n",
                "fn i32 @caller(i32 %0, i32 %1) {\n",
                "entry:\n",
                "  %2 = iadd nsw i32 %0, %1\n",
                "  %3 = call i32 @modulo(i32 %2)\n",
                "  ret i32 %3\n",
                "}\n"
            )
        );
    }

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);

            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_analysis_prints_through_the_manager() {
        let mut module = Module::new("test");
        let sig = SigBuilder::new().param(Type::i32()).ret(Some(Type::i32())).build();
        let mut b = module.define_function("identity", sig);
        let entry = b.create_block("entry");

        b.switch_to(entry);

        let params = b.append_func_params();

        b.append().ret_val(params[0], DebugInfo::fake());
        b.define();

        let sink = SharedSink::default();
        let mut mam = ModuleAnalysisManager::new();

        mam.add_pass(ModuleStringifyAnalysis {});
        mam.add_pass(ModuleWriterAnalysis::with_writer(sink.clone()));
        mam.initialize(&module);
        mam.get::<ModuleWriterAnalysis>(&module);

        let written = String::from_utf8(sink.0.borrow().clone()).unwrap();

        assert_eq!(written, stringify_module(&module));
    }
}
