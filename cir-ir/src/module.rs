//! Module and symbol table
//!
//! A module is a `builtin.module` operation whose single-block body holds
//! functions and globals. Symbols are resolved by scanning that body.

use crate::context::{Block, Context, InsertPoint, Op, OperationState};
use crate::dialect::OpKind;
use cir_common::SourceLocation;

/// Thin handle over a `builtin.module` operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Module {
    op: Op,
}

impl Module {
    /// Create an empty module named after its translation unit
    pub fn new(ctx: &mut Context, name: &str, location: SourceLocation) -> Self {
        let sym_name = ctx.attrs.string(name);
        let op = ctx.create_op(OperationState::new(OpKind::Module, location).attr("sym_name", sym_name));
        let body = ctx.region(op, 0);
        ctx.ensure_entry_block(body);
        Self { op }
    }

    /// Wrap an existing module operation
    pub fn from_op(ctx: &Context, op: Op) -> Option<Self> {
        (ctx.op_kind(op) == OpKind::Module).then_some(Self { op })
    }

    pub fn op(self) -> Op {
        self.op
    }

    pub fn name(self, ctx: &Context) -> &str {
        ctx.str_attr(self.op, "sym_name").unwrap_or("")
    }

    pub fn body(self, ctx: &mut Context) -> Block {
        let region = ctx.region(self.op, 0);
        ctx.ensure_entry_block(region)
    }

    /// Top-level operations in declaration order
    pub fn symbols(self, ctx: &Context) -> Vec<Op> {
        let region = ctx.region(self.op, 0);
        ctx.entry_block(region)
            .map(|b| ctx.block_ops(b).to_vec())
            .unwrap_or_default()
    }

    pub fn functions(self, ctx: &Context) -> Vec<Op> {
        self.symbols(ctx)
            .into_iter()
            .filter(|&op| ctx.op_kind(op) == OpKind::Func)
            .collect()
    }

    pub fn globals(self, ctx: &Context) -> Vec<Op> {
        self.symbols(ctx)
            .into_iter()
            .filter(|&op| ctx.op_kind(op) == OpKind::Global)
            .collect()
    }

    pub fn lookup(self, ctx: &Context, name: &str) -> Option<Op> {
        lookup_in_module(ctx, self.op, name)
    }

    /// Append a top-level operation
    pub fn push(self, ctx: &mut Context, op: Op) {
        let body = self.body(ctx);
        ctx.insert_op(op, InsertPoint::BlockEnd(body));
    }

    /// Insert a top-level operation at the start of the body
    pub fn push_front(self, ctx: &mut Context, op: Op) {
        let body = self.body(ctx);
        let ip = match ctx.block_ops(body).first() {
            Some(&first) => InsertPoint::Before(first),
            None => InsertPoint::BlockEnd(body),
        };
        ctx.insert_op(op, ip);
    }

    /// A symbol name not yet used in the module, derived from `base`.
    /// Follows the `base`, `base.1`, `base.2` numbering.
    pub fn unique_symbol(self, ctx: &Context, base: &str) -> String {
        if self.lookup(ctx, base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}.{}", base, n))
            .find(|candidate| self.lookup(ctx, candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }
}

fn lookup_in_module(ctx: &Context, module: Op, name: &str) -> Option<Op> {
    let region = ctx.region(module, 0);
    let body = ctx.entry_block(region)?;
    ctx.block_ops(body)
        .iter()
        .copied()
        .find(|&op| ctx.str_attr(op, "sym_name") == Some(name))
}

/// Resolve `name` in the module enclosing `from`
pub fn lookup_symbol(ctx: &Context, from: Op, name: &str) -> Option<Op> {
    let module = if ctx.op_kind(from) == OpKind::Module {
        from
    } else {
        ctx.parent_of_kind(from, OpKind::Module)?
    };
    lookup_in_module(ctx, module, name)
}
