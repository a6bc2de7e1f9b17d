//! CIR lowering pipeline - Intermediate Representation
//!
//! This crate defines the mid-level IR that the canonicalization and
//! lowering-prepare passes operate on: interned types and attributes, the
//! operation graph with its def-use lists, the CIR dialect's operation
//! table, dominance, the verifier and the textual format.

pub mod attrs;
pub mod builder;
pub mod context;
pub mod dialect;
pub mod dominance;
pub mod layout;
pub mod module;
pub mod parser;
pub mod printer;
pub mod types;
pub mod verifier;

pub use attrs::{Attr, AttrInterner, AttrKind};
pub use builder::{add_region_block, func_entry, OpBuilder};
pub use context::{Block, Context, InsertPoint, IrMapping, Op, OperationState, Region, Use, Value, ValueDef};
pub use dialect::{BinOpKind, CastKind, CmpKind, OpKind, UnaryKind};
pub use dominance::DominanceInfo;
pub use layout::DataLayout;
pub use module::{lookup_symbol, Module};
pub use parser::parse_module;
pub use printer::{print_module, print_op};
pub use types::{RecordKind, Type, TypeInterner, TypeKind};
pub use verifier::{verify, verify_op, VerificationReport};
