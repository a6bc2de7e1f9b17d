//! Pass trait and pass manager
//!
//! The pass manager runs a fixed sequence of whole-module passes. The input
//! module is verified first; a failure there is the input's fault and is
//! reported as a verification error. After a pass, a verifier failure means
//! the pass produced broken IR: that is an internal error, and the offending
//! module is dumped to the log before the pipeline stops.

use cir_common::{CirError, Diagnostic, DiagnosticEngine};
use cir_ir::{print_module, verify_op, Context, Module};
use log::{debug, error, info};

/// A transformation over one module
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&mut self, ctx: &mut Context, module: Module, diags: &mut DiagnosticEngine) -> Result<(), CirError>;
}

pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    verify_each: bool,
}

impl PassManager {
    pub fn new(verify_each: bool) -> Self {
        Self {
            passes: Vec::new(),
            verify_each,
        }
    }

    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn add_boxed(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn verify_each(&self) -> bool {
        self.verify_each
    }

    /// Verify the input, run every pass in order, and verify the result.
    /// Every error is also recorded in `diags`.
    pub fn run(&mut self, ctx: &mut Context, module: Module, diags: &mut DiagnosticEngine) -> Result<(), CirError> {
        let report = verify_op(ctx, module.op());
        report.emit_into(diags);
        report.into_result()?;

        for pass in &mut self.passes {
            let name = pass.name();
            info!("running pass '{}' on '{}'", name, module.name(ctx));
            if let Err(err) = pass.run(ctx, module, diags) {
                if !diags.has_errors() {
                    diags.emit(Diagnostic::from(&err));
                }
                return Err(err);
            }
            if self.verify_each {
                check_pass_output(ctx, module, name, diags)?;
            }
            info!("finished pass '{}'", name);
        }

        if !self.verify_each && !self.passes.is_empty() {
            check_pass_output(ctx, module, "pipeline", diags)?;
        }
        Ok(())
    }
}

fn check_pass_output(ctx: &Context, module: Module, pass: &str, diags: &mut DiagnosticEngine) -> Result<(), CirError> {
    let report = verify_op(ctx, module.op());
    for warning in report.warnings() {
        debug!("after '{}': {}", pass, warning);
    }
    let Some(first) = report.errors().next() else {
        return Ok(());
    };

    error!(
        "'{}' produced IR that fails verification:\n{}",
        pass,
        print_module(ctx, module)
    );
    let message = format!("IR after '{}' is invalid: {}", pass, first.message);
    diags.emit(
        Diagnostic::error(format!("internal error: {}", message), first.location.clone())
            .with_note("this is a bug in the pipeline, not in the input"),
    );
    Err(CirError::Internal { message })
}
