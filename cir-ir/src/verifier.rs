//! IR verifier
//!
//! Walks an operation tree and checks, for every operation:
//! - the generic shape declared in its `OpInfo` (operand, result, region and
//!   successor counts)
//! - terminator placement and successor targets
//! - SSA dominance of every operand
//! - the kind's own semantic hook
//!
//! Verification never mutates the IR. Problems are collected into a
//! [`VerificationReport`] anchored at the offending operation's location.

use crate::context::{Context, Op};
use crate::dominance::DominanceInfo;
use cir_common::{CirError, Diagnostic, DiagnosticEngine, Severity};
use log::trace;

/// Outcome of verifying an operation tree
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    diagnostics: Vec<Diagnostic>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Forward every diagnostic to `engine`
    pub fn emit_into(&self, engine: &mut DiagnosticEngine) {
        for diagnostic in &self.diagnostics {
            engine.emit(diagnostic.clone());
        }
    }

    /// First error as a `CirError`, if any
    pub fn into_result(self) -> Result<(), CirError> {
        match self.diagnostics.into_iter().find(Diagnostic::is_error) {
            Some(error) => Err(CirError::Verification {
                location: error.location,
                message: error.message,
            }),
            None => Ok(()),
        }
    }
}

struct Verifier<'a> {
    ctx: &'a Context,
    dominance: DominanceInfo,
    report: VerificationReport,
}

impl<'a> Verifier<'a> {
    fn error(&mut self, op: Op, message: String) {
        let location = self.ctx.location(op).clone();
        self.report.diagnostics.push(Diagnostic::error(
            format!("'{}' op {}", self.ctx.op_name(op), message),
            location,
        ));
    }

    fn warning(&mut self, op: Op, message: String) {
        let location = self.ctx.location(op).clone();
        self.report.diagnostics.push(Diagnostic::warning(
            format!("'{}' op {}", self.ctx.op_name(op), message),
            location,
        ));
    }

    /// Operand, result, region and successor counts. Returns false when the
    /// shape is wrong and the semantic hook must not run.
    fn check_shape(&mut self, op: Op) -> bool {
        let ctx = self.ctx;
        let info = ctx.op_kind(op).info();
        let mut ok = true;

        let operands = ctx.operands(op).len();
        if !info.operands.accepts(operands) {
            self.error(
                op,
                format!("requires {} operand(s), but found {}", info.operands, operands),
            );
            ok = false;
        }
        let results = ctx.results(op).len();
        if !info.results.accepts(results) {
            self.error(
                op,
                format!("requires {} result(s), but found {}", info.results, results),
            );
            ok = false;
        }
        let regions = ctx.regions(op).len();
        if regions != info.num_regions {
            self.error(
                op,
                format!("requires {} region(s), but found {}", info.num_regions, regions),
            );
            ok = false;
        }
        let successors = ctx.successors(op).len();
        if successors != info.num_successors {
            self.error(
                op,
                format!(
                    "requires {} successor(s), but found {}",
                    info.num_successors, successors
                ),
            );
            ok = false;
        }
        ok
    }

    fn check_placement(&mut self, op: Op) {
        let ctx = self.ctx;
        let info = ctx.op_kind(op).info();
        let Some(block) = ctx.parent_block(op) else {
            return;
        };

        if info.terminator && ctx.block_ops(block).last() != Some(&op) {
            self.error(op, "must be the last operation in its block".to_string());
        }

        let region = ctx.block_parent(block);
        let entry = region.and_then(|r| ctx.entry_block(r));
        for &succ in ctx.successors(op) {
            if ctx.block_parent(succ) != region || ctx.is_block_erased(succ) {
                self.error(op, "branches to a block outside its region".to_string());
            } else if Some(succ) == entry {
                self.error(op, "branches to the entry block of its region".to_string());
            }
        }
    }

    fn check_regions(&mut self, op: Op) {
        let ctx = self.ctx;
        let info = ctx.op_kind(op).info();
        for (index, &region) in ctx.regions(op).iter().enumerate() {
            let blocks = ctx.region_blocks(region);
            if info.needs_terminator {
                for &block in blocks {
                    if ctx.terminator(block).is_none() {
                        self.error(
                            op,
                            format!("block in region #{} does not end with a terminator", index),
                        );
                    }
                }
            }
            if blocks.len() > 1 {
                let unreachable = {
                    let dom = self.dominance.region(ctx, region);
                    blocks.iter().filter(|&&b| !dom.is_reachable(b)).count()
                };
                if unreachable > 0 {
                    self.warning(
                        op,
                        format!("region #{} contains {} unreachable block(s)", index, unreachable),
                    );
                }
            }
        }
    }

    fn check_operands(&mut self, op: Op) {
        let ctx = self.ctx;
        for (index, &value) in ctx.operands(op).iter().enumerate() {
            if !self.dominance.value_dominates(ctx, value, op) {
                self.error(
                    op,
                    format!("operand #{} does not dominate this use", index),
                );
            }
        }
    }

    fn verify(&mut self, root: Op) {
        for op in self.ctx.walk(root) {
            trace!("verifying '{}'", self.ctx.op_name(op));
            let shape_ok = self.check_shape(op);
            self.check_placement(op);
            self.check_regions(op);
            self.check_operands(op);
            if shape_ok {
                if let Err(message) = (self.ctx.op_kind(op).info().verify)(self.ctx, op) {
                    self.error(op, message);
                }
            }
        }
    }
}

/// Verify `root` and everything nested in it, collecting all diagnostics
pub fn verify_op(ctx: &Context, root: Op) -> VerificationReport {
    let mut verifier = Verifier {
        ctx,
        dominance: DominanceInfo::new(),
        report: VerificationReport::default(),
    };
    verifier.verify(root);
    verifier.report
}

/// Verify `root`, failing with the first error found
pub fn verify(ctx: &Context, root: Op) -> Result<(), CirError> {
    verify_op(ctx, root).into_result()
}
