//! Canonicalization
//!
//! Local peephole rules that bring the IR to a normal form:
//! - `not(not(x))` and `minus(minus(x))` fold to `x`
//! - integer/boolean cast round trips and cast chains collapse
//! - identity casts disappear
//! - `ptr_stride` over a decayed array, or over `get_element`, becomes one
//!   bounds-checked `get_element` when the index is a constant in range
//! - a decayed array only read or written through becomes `get_element[0]`
//! - integer `binop`/`cmp` on constants fold
//! - a branch to a block with a single predecessor merges the two blocks
//! - an empty `cir.scope` is removed
//!
//! Dead side-effect free operations are erased by the driver itself.

use crate::pass::Pass;
use crate::rewrite::{
    apply_patterns_greedily, binop_kind, cast_kind, cmp_kind, constant_bool, constant_int, defining_cast,
    unary_kind, GreedyRewriteConfig, PatternRewriter, RewritePattern, RewritePatternSet,
};
use cir_common::{CirError, DiagnosticEngine};
use cir_ir::attrs::wrap_int;
use cir_ir::{CastKind, Context, Module, Op, OpKind, Type, UnaryKind, Value};
use log::info;

struct RemoveDoubleUnary;

impl RewritePattern for RemoveDoubleUnary {
    fn name(&self) -> &'static str {
        "remove-double-unary"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Unary)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let kind = unary_kind(ctx, op)?;
        if !matches!(kind, UnaryKind::Not | UnaryKind::Minus) {
            return None;
        }
        let inner = ctx.defined_by(ctx.operand(op, 0), OpKind::Unary)?;
        if unary_kind(ctx, inner)? != kind {
            return None;
        }
        let input = ctx.operand(inner, 0);
        rewriter.replace_op(op, &[input]);
        Some(())
    }
}

/// Whether every value of integer type `from` is representable in `to`
fn int_fits(ctx: &Context, from: Type, to: Type) -> bool {
    let (Some((from_width, from_signed)), Some((to_width, to_signed))) =
        (ctx.types.int_info(from), ctx.types.int_info(to))
    else {
        return false;
    };
    match (from_signed, to_signed) {
        (false, false) | (true, true) => to_width >= from_width,
        (false, true) => to_width > from_width,
        (true, false) => false,
    }
}

struct SimplifyCastChain;

impl SimplifyCastChain {
    fn replace_with_cast(rewriter: &mut PatternRewriter<'_>, op: Op, kind: CastKind, input: Value, ty: Type) {
        let mut builder = rewriter.builder_before(op);
        let cast = builder.build_cast(rewriter.ctx_mut(), kind, input, ty);
        rewriter.replace_op(op, &[cast]);
    }
}

impl RewritePattern for SimplifyCastChain {
    fn name(&self) -> &'static str {
        "simplify-cast-chain"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Cast)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let kind = cast_kind(ctx, op)?;
        let input = ctx.operand(op, 0);
        let result_ty = ctx.value_type(ctx.result(op, 0));

        if ctx.value_type(input) == result_ty
            && matches!(kind, CastKind::Integral | CastKind::Bitcast | CastKind::Floating)
        {
            rewriter.replace_op(op, &[input]);
            return Some(());
        }

        let inner = ctx.defined_by(input, OpKind::Cast)?;
        let inner_kind = cast_kind(ctx, inner)?;
        let source = ctx.operand(inner, 0);
        let source_ty = ctx.value_type(source);
        let middle_ty = ctx.value_type(input);

        match (inner_kind, kind) {
            (CastKind::BoolToInt, CastKind::IntToBool) => {
                rewriter.replace_op(op, &[source]);
            }
            // Only when no width or signedness change is hidden in the pair
            (CastKind::IntToBool, CastKind::BoolToInt) if source_ty == result_ty => {
                rewriter.replace_op(op, &[source]);
            }
            (CastKind::Bitcast, CastKind::Bitcast) => {
                if source_ty == result_ty {
                    rewriter.replace_op(op, &[source]);
                } else {
                    Self::replace_with_cast(rewriter, op, CastKind::Bitcast, source, result_ty);
                }
            }
            (CastKind::Integral, CastKind::Integral) => {
                let middle_width = ctx.types.int_info(middle_ty)?.0;
                let result_width = ctx.types.int_info(result_ty)?.0;
                if !int_fits(ctx, source_ty, middle_ty) && middle_width < result_width {
                    return None;
                }
                if source_ty == result_ty {
                    rewriter.replace_op(op, &[source]);
                } else {
                    Self::replace_with_cast(rewriter, op, CastKind::Integral, source, result_ty);
                }
            }
            _ => return None,
        }
        Some(())
    }
}

struct FoldPtrStride;

impl RewritePattern for FoldPtrStride {
    fn name(&self) -> &'static str {
        "fold-ptr-stride"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::PtrStride)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let base = ctx.operand(op, 0);
        let stride = ctx.operand(op, 1);
        let offset = constant_int(ctx, stride)?;

        let (array_ptr, index) = if let Some(decay) = defining_cast(ctx, base, CastKind::ArrayToPtrdecay) {
            (ctx.operand(decay, 0), offset)
        } else {
            let element = ctx.defined_by(base, OpKind::GetElement)?;
            let element_index = ctx.operand(element, 1);
            if ctx.value_type(element_index) != ctx.value_type(stride) {
                return None;
            }
            let start = constant_int(ctx, element_index)?;
            (ctx.operand(element, 0), start.checked_add(offset)?)
        };

        let array = ctx.types.pointee(ctx.value_type(array_ptr))?;
        let (_, len) = ctx.types.array_info(array)?;
        if index < 0 || index >= i128::from(len) {
            return None;
        }

        let index_ty = ctx.value_type(stride);
        let mut builder = rewriter.builder_before(op);
        let ctx = rewriter.ctx_mut();
        let index = if index == offset {
            stride
        } else {
            builder.build_const_int(ctx, index_ty, index)
        };
        let element = builder.build_get_element(ctx, array_ptr, index);
        rewriter.replace_op(op, &[element]);
        Some(())
    }
}

struct SimplifyArrayDecay;

impl SimplifyArrayDecay {
    fn only_accessed_through(ctx: &Context, decay: Value, elem: Type) -> bool {
        let users = ctx.users(decay);
        !users.is_empty()
            && users.iter().all(|&user| match ctx.op_kind(user) {
                OpKind::Load => ctx.value_type(ctx.result(user, 0)) == elem,
                OpKind::Store => {
                    ctx.operand(user, 1) == decay
                        && ctx.operand(user, 0) != decay
                        && ctx.value_type(ctx.operand(user, 0)) == elem
                }
                OpKind::GetMember => true,
                _ => false,
            })
    }
}

impl RewritePattern for SimplifyArrayDecay {
    fn name(&self) -> &'static str {
        "simplify-array-decay"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Cast)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        if cast_kind(ctx, op)? != CastKind::ArrayToPtrdecay {
            return None;
        }
        let decay = ctx.result(op, 0);
        let elem = ctx.types.pointee(ctx.value_type(decay))?;
        if !Self::only_accessed_through(ctx, decay, elem) {
            return None;
        }
        let array_ptr = ctx.operand(op, 0);

        let mut builder = rewriter.builder_before(op);
        let ctx = rewriter.ctx_mut();
        let index_ty = ctx.types.u64();
        let zero = builder.build_const_int(ctx, index_ty, 0);
        let element = builder.build_get_element(ctx, array_ptr, zero);
        rewriter.replace_op(op, &[element]);
        Some(())
    }
}

struct FoldConstantBinOp;

impl RewritePattern for FoldConstantBinOp {
    fn name(&self) -> &'static str {
        "fold-constant-binop"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::BinOp)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let kind = binop_kind(ctx, op)?;
        let ty = ctx.value_type(ctx.result(op, 0));
        let (width, signed) = ctx.types.int_info(ty)?;
        let lhs = constant_int(ctx, ctx.operand(op, 0))?;
        let rhs = constant_int(ctx, ctx.operand(op, 1))?;
        let folded = wrap_int(kind.evaluate(lhs, rhs, width)?, width, signed);

        let mut builder = rewriter.builder_before(op);
        let constant = builder.build_const_int(rewriter.ctx_mut(), ty, folded);
        rewriter.replace_op(op, &[constant]);
        Some(())
    }
}

struct FoldConstantCmp;

impl FoldConstantCmp {
    fn operand_value(ctx: &Context, value: Value) -> Option<i128> {
        constant_int(ctx, value).or_else(|| constant_bool(ctx, value).map(i128::from))
    }
}

impl RewritePattern for FoldConstantCmp {
    fn name(&self) -> &'static str {
        "fold-constant-cmp"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Cmp)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let kind = cmp_kind(ctx, op)?;
        let lhs = Self::operand_value(ctx, ctx.operand(op, 0))?;
        let rhs = Self::operand_value(ctx, ctx.operand(op, 1))?;

        let mut builder = rewriter.builder_before(op);
        let constant = builder.build_const_bool(rewriter.ctx_mut(), kind.evaluate(lhs, rhs));
        rewriter.replace_op(op, &[constant]);
        Some(())
    }
}

struct RemoveRedundantBranch;

impl RewritePattern for RemoveRedundantBranch {
    fn name(&self) -> &'static str {
        "remove-redundant-branch"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Br)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let block = ctx.parent_block(op)?;
        let dest = *ctx.successors(op).first()?;
        if dest == block || ctx.predecessors(dest) != [block] {
            return None;
        }
        let args = ctx.operands(op).to_vec();
        rewriter.erase_op(op);
        rewriter.merge_blocks(dest, block, &args);
        Some(())
    }
}

struct RemoveEmptyScope;

impl RewritePattern for RemoveEmptyScope {
    fn name(&self) -> &'static str {
        "remove-empty-scope"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Scope)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        if !ctx.results(op).is_empty() {
            return None;
        }
        let blocks = ctx.region_blocks(ctx.region(op, 0));
        let empty = match blocks {
            [] => true,
            [only] => match ctx.block_ops(*only) {
                [single] => ctx.op_kind(*single) == OpKind::Yield,
                _ => false,
            },
            _ => false,
        };
        if !empty {
            return None;
        }
        rewriter.erase_op(op);
        Some(())
    }
}

/// Register the canonicalization rules, in the order they are tried
pub fn populate_canonicalize_patterns(patterns: &mut RewritePatternSet) {
    patterns
        .add(RemoveRedundantBranch)
        .add(RemoveEmptyScope)
        .add(RemoveDoubleUnary)
        .add(SimplifyCastChain)
        .add(SimplifyArrayDecay)
        .add(FoldPtrStride)
        .add(FoldConstantBinOp)
        .add(FoldConstantCmp);
}

/// Run the canonicalization rules over `module` to a fixed point
pub struct Canonicalize {
    config: GreedyRewriteConfig,
    patterns: RewritePatternSet,
}

impl Canonicalize {
    pub fn new(config: GreedyRewriteConfig) -> Self {
        let mut patterns = RewritePatternSet::new();
        populate_canonicalize_patterns(&mut patterns);
        Self { config, patterns }
    }
}

impl Pass for Canonicalize {
    fn name(&self) -> &'static str {
        "canonicalize"
    }

    fn run(&mut self, ctx: &mut Context, module: Module, diags: &mut DiagnosticEngine) -> Result<(), CirError> {
        let stats = apply_patterns_greedily(ctx, module.op(), &self.patterns, &self.config, diags);
        info!(
            "canonicalize: {} rewrite(s), {} dead op(s) erased",
            stats.rewrites, stats.dead_ops_erased
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
