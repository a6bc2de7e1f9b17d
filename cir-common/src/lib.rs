//! CIR lowering pipeline - Common Types and Diagnostics
//!
//! This crate contains the source-location and diagnostic types shared by
//! the IR, the transformation passes and the driver.

pub mod error;
pub mod source_loc;

pub use error::{CirError, Diagnostic, DiagnosticEngine, Severity};
pub use source_loc::{SourceLocation, SourceTracker};
