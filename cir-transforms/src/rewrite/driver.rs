//! Greedy worklist driver
//!
//! Operations are visited from a FIFO worklist seeded in pre-order. When a
//! pattern fires, the operations it created and the operations it touched
//! are queued again, so a fold that enables another fold is picked up
//! without rescanning the whole tree. Each operation carries a rewrite
//! count, inherited by the operations created while rewriting it; an
//! operation whose count reaches the configured bound is left alone.

use super::pattern::{PatternRewriter, RewritePatternSet};
use cir_common::{Diagnostic, DiagnosticEngine};
use cir_ir::{Context, Op};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Tuning knobs of the greedy driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyRewriteConfig {
    /// Rewrites allowed on one operation (and what it was rewritten into)
    pub max_rewrites_per_op: usize,
    /// Erase side-effect free operations whose results are unused
    pub erase_dead_ops: bool,
}

impl Default for GreedyRewriteConfig {
    fn default() -> Self {
        Self {
            max_rewrites_per_op: 16,
            erase_dead_ops: true,
        }
    }
}

/// What one driver run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub rewrites: usize,
    pub dead_ops_erased: usize,
    /// Operations that hit the rewrite bound
    pub exhausted: usize,
}

impl RewriteStats {
    pub fn changed(&self) -> bool {
        self.rewrites > 0 || self.dead_ops_erased > 0
    }
}

#[derive(Default)]
struct Worklist {
    queue: VecDeque<Op>,
    queued: HashSet<Op>,
}

impl Worklist {
    fn push(&mut self, op: Op) {
        if self.queued.insert(op) {
            self.queue.push_back(op);
        }
    }

    fn pop(&mut self) -> Option<Op> {
        let op = self.queue.pop_front()?;
        self.queued.remove(&op);
        Some(op)
    }
}

/// Side-effect free, attached, and nothing reads its results
pub fn is_trivially_dead(ctx: &Context, op: Op) -> bool {
    ctx.op_kind(op).info().pure_op
        && ctx.parent_block(op).is_some()
        && ctx.results(op).iter().all(|&r| !ctx.has_uses(r))
}

/// Apply `patterns` to everything nested under `root` until nothing fires
pub fn apply_patterns_greedily(
    ctx: &mut Context,
    root: Op,
    patterns: &RewritePatternSet,
    config: &GreedyRewriteConfig,
    diags: &mut DiagnosticEngine,
) -> RewriteStats {
    let mut stats = RewriteStats::default();
    let mut worklist = Worklist::default();
    let mut counts: HashMap<Op, usize> = HashMap::new();
    let mut last_pattern: HashMap<Op, &'static str> = HashMap::new();
    let mut exhausted: HashSet<Op> = HashSet::new();

    for op in ctx.walk(root).into_iter().skip(1) {
        worklist.push(op);
    }

    while let Some(op) = worklist.pop() {
        if ctx.is_erased(op) || exhausted.contains(&op) {
            continue;
        }
        trace!("worklist: visiting '{}'", ctx.op_name(op));

        if config.erase_dead_ops && is_trivially_dead(ctx, op) {
            let defs: Vec<Op> = ctx
                .operands(op)
                .iter()
                .filter_map(|&v| ctx.defining_op(v))
                .collect();
            debug!("erasing dead '{}' at {}", ctx.op_name(op), ctx.location(op));
            ctx.erase_op(op);
            stats.dead_ops_erased += 1;
            for def in defs {
                worklist.push(def);
            }
            continue;
        }

        let count = counts.get(&op).copied().unwrap_or(0);
        if count >= config.max_rewrites_per_op {
            let culprit = last_pattern.get(&op).copied().unwrap_or("<unknown>");
            warn!(
                "'{}' at {} was rewritten {} times; pattern '{}' may not terminate",
                ctx.op_name(op),
                ctx.location(op),
                count,
                culprit
            );
            diags.emit(
                Diagnostic::warning(
                    format!(
                        "stopped rewriting '{}' after {} rewrites",
                        ctx.op_name(op),
                        count
                    ),
                    ctx.location(op).clone(),
                )
                .with_note(format!("last applied pattern: '{}'", culprit)),
            );
            exhausted.insert(op);
            stats.exhausted += 1;
            continue;
        }

        let kind = ctx.op_kind(op);
        for pattern in patterns.for_kind(kind) {
            let mark = ctx.num_ops();
            let mut rewriter = PatternRewriter::new(ctx);
            if pattern.match_and_rewrite(op, &mut rewriter).is_none() {
                continue;
            }
            let touched = rewriter.into_touched();
            debug!("applied '{}' to '{}'", pattern.name(), kind);
            stats.rewrites += 1;

            let next = count + 1;
            for created in ctx.ops_created_since(mark) {
                counts.insert(created, next);
                last_pattern.insert(created, pattern.name());
                worklist.push(created);
            }
            for other in touched {
                if !ctx.is_erased(other) {
                    worklist.push(other);
                }
            }
            if !ctx.is_erased(op) {
                counts.insert(op, next);
                last_pattern.insert(op, pattern.name());
                worklist.push(op);
            }
            break;
        }
    }

    stats
}
