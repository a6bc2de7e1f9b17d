//! Pipeline configuration
//!
//! Options deserialize from JSON with every field optional; missing fields
//! take their defaults. The driver loads a file with `--config` and then
//! applies its command-line overrides on top.

use crate::canonicalize::Canonicalize;
use crate::lowering_prepare::LoweringPrepare;
use crate::pass::PassManager;
use crate::rewrite::GreedyRewriteConfig;
use crate::simplify::Simplify;
use cir_common::CirError;
use cir_ir::DataLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Names accepted in `passes`
pub const KNOWN_PASSES: [&str; 3] = ["canonicalize", "simplify", "lowering-prepare"];

/// Options of the lowering-prepare pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringPrepareOptions {
    /// Constant-length array loops with at most this many elements are unrolled
    pub unroll_threshold: u64,
    pub data_layout: DataLayout,
}

impl Default for LoweringPrepareOptions {
    fn default() -> Self {
        Self {
            unroll_threshold: 0,
            data_layout: DataLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub passes: Vec<String>,
    pub verify_each: bool,
    pub rewrite: GreedyRewriteConfig,
    pub lowering: LoweringPrepareOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            passes: KNOWN_PASSES.iter().map(|p| p.to_string()).collect(),
            verify_each: cfg!(debug_assertions),
            rewrite: GreedyRewriteConfig::default(),
            lowering: LoweringPrepareOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_json(text: &str) -> Result<Self, CirError> {
        serde_json::from_str(text).map_err(|e| CirError::config_error(format!("invalid pipeline options: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, CirError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, CirError> {
        serde_json::to_string_pretty(self).map_err(|e| CirError::config_error(e.to_string()))
    }

    /// Replace the pass list with a comma-separated one
    pub fn set_passes(&mut self, list: &str) {
        self.passes = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn build_pass_manager(&self) -> Result<PassManager, CirError> {
        let mut pm = PassManager::new(self.verify_each);
        for name in &self.passes {
            match name.as_str() {
                "canonicalize" => pm.add_pass(Canonicalize::new(self.rewrite)),
                "simplify" => pm.add_pass(Simplify::new(self.rewrite)),
                "lowering-prepare" => pm.add_pass(LoweringPrepare::new(self.lowering)),
                other => {
                    return Err(CirError::config_error(format!(
                        "unknown pass '{}' (expected one of: {})",
                        other,
                        KNOWN_PASSES.join(", ")
                    )))
                }
            }
        }
        Ok(pm)
    }
}
