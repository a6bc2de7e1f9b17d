//! One translation unit through the pipeline

use cir_common::{CirError, Diagnostic, DiagnosticEngine};
use cir_ir::{parse_module, print_module, verify_op, Context};
use cir_transforms::PipelineOptions;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub struct UnitOutcome {
    pub path: PathBuf,
    /// Printed module; `None` when the unit had errors or only was verified
    pub text: Option<String>,
    pub diagnostics: DiagnosticEngine,
}

pub fn process_unit(path: &Path, options: &PipelineOptions, verify_only: bool) -> UnitOutcome {
    let mut diagnostics = DiagnosticEngine::new();
    let text = match run(path, options, verify_only, &mut diagnostics) {
        Ok(text) if !diagnostics.has_errors() => text,
        Ok(_) => None,
        Err(err) => {
            if !diagnostics.has_errors() {
                diagnostics.emit(Diagnostic::from(&err));
            }
            None
        }
    };
    info!("{}: {}", path.display(), diagnostics.summary());
    UnitOutcome {
        path: path.to_path_buf(),
        text,
        diagnostics,
    }
}

fn run(
    path: &Path,
    options: &PipelineOptions,
    verify_only: bool,
    diagnostics: &mut DiagnosticEngine,
) -> Result<Option<String>, CirError> {
    let source = fs::read_to_string(path)
        .map_err(|e| CirError::Io {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
    let mut ctx = Context::new();
    let module = parse_module(&mut ctx, &source, &path.display().to_string())?;
    debug!("parsed '{}' from {}", module.name(&ctx), path.display());

    if verify_only {
        let report = verify_op(&ctx, module.op());
        report.emit_into(diagnostics);
        report.into_result()?;
        return Ok(None);
    }

    let mut pm = options.build_pass_manager()?;
    pm.run(&mut ctx, module, diagnostics)?;
    Ok(Some(print_module(&ctx, module)))
}
