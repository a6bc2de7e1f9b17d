//! CIR lowering pipeline - Transformations
//!
//! This crate contains the pass infrastructure and the passes that run
//! between IR generation and target lowering:
//! - `canonicalize`: peephole normalization driven to a fixed point
//! - `simplify`: ternary and select simplification
//! - `lowering-prepare`: expansion of array construction and destruction,
//!   cookie-based array allocation and global initializer registration

pub mod canonicalize;
pub mod lowering_prepare;
pub mod options;
pub mod pass;
pub mod rewrite;
pub mod simplify;

pub use canonicalize::Canonicalize;
pub use lowering_prepare::LoweringPrepare;
pub use options::{LoweringPrepareOptions, PipelineOptions};
pub use pass::{Pass, PassManager};
pub use rewrite::{GreedyRewriteConfig, RewriteStats};
pub use simplify::Simplify;
