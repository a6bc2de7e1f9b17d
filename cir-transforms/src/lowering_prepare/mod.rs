//! Lowering preparation
//!
//! Expands the high-level operations that target lowering does not handle:
//! - `cir.array.new` / `cir.array.delete` become allocator calls with the
//!   element count cookie arithmetic spelled out
//! - `cir.array.ctor` / `cir.array.dtor` become pointer-walking loops, or
//!   straight-line code for short constant-length arrays
//! - global constructor and destructor regions move into synthesized
//!   initialization functions registered in `cir.global_ctors`
//!
//! Operations the pass does not recognize are left alone. A construct it
//! must lower but cannot is reported as an error; the pass still processes
//! the rest of the module so one run surfaces every such error.

mod array;
mod cookie;
mod global_init;

use crate::options::LoweringPrepareOptions;
use crate::pass::Pass;
use cir_common::{CirError, Diagnostic, DiagnosticEngine, SourceLocation};
use cir_ir::{Block, Context, InsertPoint, IrMapping, Module, OpBuilder, OpKind, Type, Value};
use log::{error, info};
use std::collections::HashSet;

pub struct LoweringPrepare {
    options: LoweringPrepareOptions,
}

impl LoweringPrepare {
    pub fn new(options: LoweringPrepareOptions) -> Self {
        Self { options }
    }
}

impl Pass for LoweringPrepare {
    fn name(&self) -> &'static str {
        "lowering-prepare"
    }

    fn run(&mut self, ctx: &mut Context, module: Module, diags: &mut DiagnosticEngine) -> Result<(), CirError> {
        let mut failures = Failures::new(diags);

        // Innermost first: a destructor body is cloned into the expansion
        // of its `cir.array.delete`, so allocations nested in it must
        // already be lowered by then.
        let allocations: Vec<_> = ctx
            .walk_post_order(module.op())
            .into_iter()
            .filter(|&op| matches!(ctx.op_kind(op), OpKind::ArrayNew | OpKind::ArrayDelete))
            .collect();
        for op in allocations {
            if ctx.is_erased(op) {
                continue;
            }
            let lowered = match ctx.op_kind(op) {
                OpKind::ArrayNew => cookie::lower_array_new(ctx, module, op, &self.options.data_layout),
                _ => cookie::lower_array_delete(ctx, module, op, &self.options.data_layout),
            };
            if let Err(err) = lowered {
                failures.record(err);
            }
        }

        // Element bodies may hold array ops of their own; those are cloned
        // into the expansion and picked up by the next round.
        let mut failed = HashSet::new();
        let mut expanded = 0usize;
        loop {
            let pending: Vec<_> = ctx
                .walk(module.op())
                .into_iter()
                .filter(|&op| matches!(ctx.op_kind(op), OpKind::ArrayCtor | OpKind::ArrayDtor))
                .filter(|op| !failed.contains(op))
                .collect();
            if pending.is_empty() {
                break;
            }
            for op in pending {
                if ctx.is_erased(op) {
                    continue;
                }
                match array::lower_array_init(ctx, op, &self.options) {
                    Ok(()) => expanded += 1,
                    Err(err) => {
                        failed.insert(op);
                        failures.record(err);
                    }
                }
            }
        }

        let initializers = global_init::lower_global_initializers(ctx, module, &mut failures);
        info!(
            "lowering-prepare: {} array loop(s) expanded, {} global initializer(s) registered",
            expanded, initializers
        );
        failures.into_result()
    }
}

/// Errors of one pass run. Every error becomes a diagnostic; the first one
/// is what the pass returns.
pub(crate) struct Failures<'d> {
    diags: &'d mut DiagnosticEngine,
    first: Option<CirError>,
}

impl<'d> Failures<'d> {
    fn new(diags: &'d mut DiagnosticEngine) -> Self {
        Self { diags, first: None }
    }

    pub(crate) fn record(&mut self, err: CirError) {
        error!("lowering-prepare: {}", err);
        self.diags.emit(Diagnostic::from(&err));
        if self.first.is_none() {
            self.first = Some(err);
        }
    }

    fn into_result(self) -> Result<(), CirError> {
        match self.first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Function type of `name`, declaring it with `fty` at the end of the
/// module if it does not exist yet
pub(crate) fn ensure_function(
    ctx: &mut Context,
    module: Module,
    name: &str,
    fty: Type,
    location: &SourceLocation,
) -> Result<(), CirError> {
    let Some(existing) = module.lookup(ctx, name) else {
        let body = module.body(ctx);
        OpBuilder::new(InsertPoint::BlockEnd(body), location.clone()).build_func(ctx, name, fty, false);
        return Ok(());
    };
    if ctx.op_kind(existing) != OpKind::Func {
        return Err(CirError::lowering_error(
            format!("'@{}' is needed as a function, but is a '{}'", name, ctx.op_name(existing)),
            location.clone(),
        ));
    }
    match ctx.type_attr(existing, "function_type") {
        Some(actual) if actual == fty => Ok(()),
        Some(actual) => Err(CirError::lowering_error(
            format!(
                "'@{}' is declared as {}, but lowering needs {}",
                name,
                ctx.types.display(actual),
                ctx.types.display(fty)
            ),
            location.clone(),
        )),
        None => Err(CirError::lowering_error(
            format!("'@{}' has no function type", name),
            location.clone(),
        )),
    }
}

/// Copy the element body `body` to `ip` with its argument bound to `addr`.
/// `ip` must be `Before` or `BlockEnd` so the copies keep their order.
pub(crate) fn emit_element_body(ctx: &mut Context, body: Block, addr: Value, ip: InsertPoint) {
    let mut mapping = IrMapping::new();
    mapping.map_value(ctx.block_arg(body, 0), addr);
    for op in ctx.block_ops(body).to_vec() {
        if ctx.op_kind(op) == OpKind::Yield {
            continue;
        }
        let copy = ctx.clone_op(op, &mut mapping);
        ctx.insert_op(copy, ip);
    }
}
