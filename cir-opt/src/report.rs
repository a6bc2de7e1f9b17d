//! Diagnostic output on stderr

use cir_common::{Diagnostic, DiagnosticEngine, Severity};
use colored::{ColoredString, Colorize};

pub fn print_diagnostics(diagnostics: &DiagnosticEngine, json: bool) {
    for diagnostic in diagnostics.diagnostics() {
        if json {
            match serde_json::to_string(diagnostic) {
                Ok(line) => eprintln!("{}", line),
                Err(e) => eprintln!("failed to serialize diagnostic: {}", e),
            }
        } else {
            eprintln!("{}", format_text(diagnostic));
        }
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = format!("{}:", severity);
    match severity {
        Severity::Error => label.red().bold(),
        Severity::Warning => label.yellow().bold(),
        Severity::Note => label.cyan().bold(),
    }
}

/// `file:line:col: error: message`, followed by indented notes
fn format_text(diagnostic: &Diagnostic) -> String {
    let mut text = format!(
        "{} {} {}",
        format!("{}:", diagnostic.location).bold(),
        severity_label(diagnostic.severity),
        diagnostic.message
    );
    for note in &diagnostic.notes {
        text.push_str(&format!("\n  {} {}", severity_label(Severity::Note), note));
    }
    text
}
