//! Pattern rewriting infrastructure
//!
//! Patterns are plain structs implementing [`RewritePattern`]; a
//! [`RewritePatternSet`] orders them and [`apply_patterns_greedily`] drives
//! them to a fixed point.

pub mod driver;
pub mod pattern;

pub use driver::{apply_patterns_greedily, is_trivially_dead, GreedyRewriteConfig, RewriteStats};
pub use pattern::{PatternRewriter, RewritePattern, RewritePatternSet};

use cir_ir::{BinOpKind, CastKind, CmpKind, Context, Op, OpKind, UnaryKind, Value};
use std::str::FromStr;

fn kind_of<K: FromStr>(ctx: &Context, op: Op, expected: OpKind) -> Option<K> {
    if ctx.op_kind(op) != expected {
        return None;
    }
    K::from_str(ctx.str_attr(op, "kind")?).ok()
}

pub fn cast_kind(ctx: &Context, op: Op) -> Option<CastKind> {
    kind_of(ctx, op, OpKind::Cast)
}

pub fn unary_kind(ctx: &Context, op: Op) -> Option<UnaryKind> {
    kind_of(ctx, op, OpKind::Unary)
}

pub fn binop_kind(ctx: &Context, op: Op) -> Option<BinOpKind> {
    kind_of(ctx, op, OpKind::BinOp)
}

pub fn cmp_kind(ctx: &Context, op: Op) -> Option<CmpKind> {
    kind_of(ctx, op, OpKind::Cmp)
}

/// Cast of the given kind defining `value`
pub fn defining_cast(ctx: &Context, value: Value, kind: CastKind) -> Option<Op> {
    let op = ctx.defined_by(value, OpKind::Cast)?;
    (cast_kind(ctx, op)? == kind).then_some(op)
}

/// Integer constant feeding `value`
pub fn constant_int(ctx: &Context, value: Value) -> Option<i128> {
    let op = ctx.defined_by(value, OpKind::Const)?;
    ctx.int_attr(op, "value")
}

/// Boolean constant feeding `value`
pub fn constant_bool(ctx: &Context, value: Value) -> Option<bool> {
    let op = ctx.defined_by(value, OpKind::Const)?;
    ctx.attr(op, "value").and_then(|a| ctx.attrs.as_bool(a))
}
