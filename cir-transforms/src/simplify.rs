//! Simplification of structured selections
//!
//! A `cir.ternary` whose arms only yield an already available value (or a
//! constant materialized in the arm) becomes a `cir.select`; a select over
//! boolean constants folds to its condition or its negation.

use crate::pass::Pass;
use crate::rewrite::{
    apply_patterns_greedily, constant_bool, GreedyRewriteConfig, PatternRewriter, RewritePattern, RewritePatternSet,
};
use cir_common::{CirError, DiagnosticEngine};
use cir_ir::{Block, Context, Module, Op, OpKind, Region, UnaryKind, Value};
use log::info;

/// The block and yielded value of an arm with nothing but an optional constant
fn trivial_arm(ctx: &Context, region: Region) -> Option<(Block, Value)> {
    let [block] = ctx.region_blocks(region) else {
        return None;
    };
    if !ctx.block_args(*block).is_empty() {
        return None;
    }
    let (last, rest) = ctx.block_ops(*block).split_last()?;
    if ctx.op_kind(*last) != OpKind::Yield || ctx.operands(*last).len() != 1 {
        return None;
    }
    let value = ctx.operand(*last, 0);
    match rest {
        [] => {}
        [constant] if ctx.op_kind(*constant) == OpKind::Const && ctx.result(*constant, 0) == value => {}
        _ => return None,
    }
    Some((*block, value))
}

struct SimplifyTernary;

impl RewritePattern for SimplifyTernary {
    fn name(&self) -> &'static str {
        "simplify-ternary"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Ternary)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        if ctx.results(op).len() != 1 {
            return None;
        }
        let (true_block, on_true) = trivial_arm(ctx, ctx.region(op, 0))?;
        let (false_block, on_false) = trivial_arm(ctx, ctx.region(op, 1))?;
        let cond = ctx.operand(op, 0);
        let yields = [ctx.terminator(true_block)?, ctx.terminator(false_block)?];

        for yield_op in yields {
            rewriter.erase_op(yield_op);
        }
        rewriter.inline_block_before(true_block, op, &[]);
        rewriter.inline_block_before(false_block, op, &[]);

        let mut builder = rewriter.builder_before(op);
        let select = builder.build_select(rewriter.ctx_mut(), cond, on_true, on_false);
        rewriter.replace_op(op, &[select]);
        Some(())
    }
}

struct SimplifySelect;

impl RewritePattern for SimplifySelect {
    fn name(&self) -> &'static str {
        "simplify-select"
    }

    fn root_kind(&self) -> Option<OpKind> {
        Some(OpKind::Select)
    }

    fn match_and_rewrite(&self, op: Op, rewriter: &mut PatternRewriter<'_>) -> Option<()> {
        let ctx = rewriter.ctx();
        let (cond, on_true, on_false) = (ctx.operand(op, 0), ctx.operand(op, 1), ctx.operand(op, 2));
        if on_true == on_false {
            rewriter.replace_op(op, &[on_true]);
            return Some(());
        }

        match (constant_bool(ctx, on_true)?, constant_bool(ctx, on_false)?) {
            (true, false) => rewriter.replace_op(op, &[cond]),
            (false, true) => {
                let mut builder = rewriter.builder_before(op);
                let negated = builder.build_unary(rewriter.ctx_mut(), UnaryKind::Not, cond);
                rewriter.replace_op(op, &[negated]);
            }
            _ => return None,
        }
        Some(())
    }
}

pub fn populate_simplify_patterns(patterns: &mut RewritePatternSet) {
    patterns.add(SimplifyTernary).add(SimplifySelect);
}

pub struct Simplify {
    config: GreedyRewriteConfig,
    patterns: RewritePatternSet,
}

impl Simplify {
    pub fn new(config: GreedyRewriteConfig) -> Self {
        let mut patterns = RewritePatternSet::new();
        populate_simplify_patterns(&mut patterns);
        Self { config, patterns }
    }
}

impl Pass for Simplify {
    fn name(&self) -> &'static str {
        "simplify"
    }

    fn run(&mut self, ctx: &mut Context, module: Module, diags: &mut DiagnosticEngine) -> Result<(), CirError> {
        let stats = apply_patterns_greedily(ctx, module.op(), &self.patterns, &self.config, diags);
        info!("simplify: {} rewrite(s)", stats.rewrites);
        Ok(())
    }
}
