//! Textual IR printer
//!
//! Every operation prints in one generic form:
//!
//! ```text
//! %r = cir.name(%a : !T, %b : !U) [^bb1] : !R {key = attr} ({ ... }) loc("f.cpp":3:5)
//! ```
//!
//! Values and blocks are numbered in print order across the whole tree.
//! Named records are printed once, ahead of the module, as alias lines so
//! that self-referential bodies can be spelled out.

use crate::attrs::write_string;
use crate::context::{Block, Context, Op, Region, Value};
use crate::module::Module;
use std::collections::HashMap;
use std::fmt;

/// Print a module, including record alias definitions
pub fn print_module(ctx: &Context, module: Module) -> String {
    IrPrinter {
        ctx,
        root: module.op(),
        aliases: true,
    }
    .to_string()
}

/// Print a single operation tree without alias definitions
pub fn print_op(ctx: &Context, op: Op) -> String {
    IrPrinter {
        ctx,
        root: op,
        aliases: false,
    }
    .to_string()
}

pub struct IrPrinter<'a> {
    pub ctx: &'a Context,
    pub root: Op,
    pub aliases: bool,
}

impl fmt::Display for IrPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = PrintState {
            ctx: self.ctx,
            values: HashMap::new(),
            blocks: HashMap::new(),
        };
        state.number_op(self.root);
        if self.aliases {
            state.print_aliases(f)?;
        }
        state.print_op(f, self.root, 0)?;
        writeln!(f)
    }
}

struct PrintState<'a> {
    ctx: &'a Context,
    values: HashMap<Value, usize>,
    blocks: HashMap<Block, usize>,
}

impl PrintState<'_> {
    fn number_op(&mut self, op: Op) {
        for &result in self.ctx.results(op) {
            let n = self.values.len();
            self.values.insert(result, n);
        }
        for &region in self.ctx.regions(op) {
            for &block in self.ctx.region_blocks(region) {
                let n = self.blocks.len();
                self.blocks.insert(block, n);
                for &arg in self.ctx.block_args(block) {
                    let n = self.values.len();
                    self.values.insert(arg, n);
                }
                for &inner in self.ctx.block_ops(block) {
                    self.number_op(inner);
                }
            }
        }
    }

    fn print_aliases(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = &self.ctx.types;
        for &record in types.named_records() {
            let (Some(alias), Some(name), Some(kind)) = (
                types.record_alias(record),
                types.record_name(record),
                types.record_kind(record),
            ) else {
                continue;
            };
            write!(f, "!{} = !cir.record<{} ", alias, kind)?;
            write_string(f, name)?;
            if !types.is_complete(record) {
                writeln!(f, " incomplete>")?;
                continue;
            }
            if types.record_packed(record) {
                write!(f, " packed")?;
            }
            write!(f, " {{")?;
            for (i, &field) in types.record_fields(record).iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", types.display(field))?;
            }
            writeln!(f, "}}>")?;
        }
        Ok(())
    }

    fn value(&self, f: &mut fmt::Formatter<'_>, value: Value) -> fmt::Result {
        match self.values.get(&value) {
            Some(n) => write!(f, "%{}", n),
            None => write!(f, "%<undef{}>", value.index()),
        }
    }

    fn block(&self, f: &mut fmt::Formatter<'_>, block: Block) -> fmt::Result {
        match self.blocks.get(&block) {
            Some(n) => write!(f, "^bb{}", n),
            None => write!(f, "^<undef{}>", block.index()),
        }
    }

    fn print_op(&self, f: &mut fmt::Formatter<'_>, op: Op, indent: usize) -> fmt::Result {
        let ctx = self.ctx;
        write!(f, "{:indent$}", "", indent = indent)?;

        let results = ctx.results(op);
        if !results.is_empty() {
            for (i, &result) in results.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                self.value(f, result)?;
            }
            write!(f, " = ")?;
        }

        write!(f, "{}(", ctx.op_name(op))?;
        for (i, &operand) in ctx.operands(op).iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.value(f, operand)?;
            write!(f, " : {}", ctx.types.display(ctx.value_type(operand)))?;
        }
        write!(f, ")")?;

        let successors = ctx.successors(op);
        if !successors.is_empty() {
            write!(f, " [")?;
            for (i, &succ) in successors.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                self.block(f, succ)?;
            }
            write!(f, "]")?;
        }

        match results {
            [] => {}
            [single] => write!(f, " : {}", ctx.types.display(ctx.value_type(*single)))?,
            many => {
                write!(f, " : (")?;
                for (i, &result) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ctx.types.display(ctx.value_type(result)))?;
                }
                write!(f, ")")?;
            }
        }

        let attrs = ctx.attrs_of(op);
        if !attrs.is_empty() {
            write!(f, " {{")?;
            for (i, (key, &attr)) in attrs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} = {}", key, ctx.attrs.display(&ctx.types, attr))?;
            }
            write!(f, "}}")?;
        }

        let regions = ctx.regions(op);
        if !regions.is_empty() {
            write!(f, " (")?;
            for (i, &region) in regions.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                self.print_region(f, region, indent)?;
            }
            write!(f, ")")?;
        }

        let location = ctx.location(op);
        if !location.is_unknown() {
            write!(f, " loc(")?;
            write_string(f, &location.filename)?;
            write!(f, ":{}:{})", location.line, location.column)?;
        }
        Ok(())
    }

    fn print_region(&self, f: &mut fmt::Formatter<'_>, region: Region, indent: usize) -> fmt::Result {
        let ctx = self.ctx;
        let blocks = ctx.region_blocks(region);
        if blocks.is_empty() {
            return write!(f, "{{}}");
        }
        writeln!(f, "{{")?;
        for &block in blocks {
            write!(f, "{:indent$}", "", indent = indent)?;
            self.block(f, block)?;
            let args = ctx.block_args(block);
            if !args.is_empty() {
                write!(f, "(")?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.value(f, arg)?;
                    write!(f, " : {}", ctx.types.display(ctx.value_type(arg)))?;
                }
                write!(f, ")")?;
            }
            writeln!(f, ":")?;
            for &op in ctx.block_ops(block) {
                self.print_op(f, op, indent + 2)?;
                writeln!(f)?;
            }
        }
        write!(f, "{:indent$}}}", "", indent = indent)
    }
}
