//! The CIR dialect
//!
//! Operation kinds form a closed set. Each kind registers one static
//! [`OpInfo`] record describing its shape (operand and result arity, region
//! and successor counts, terminator and purity flags) and its semantic verify
//! hook. Generic code dispatches through this table instead of matching on
//! every kind.

pub mod enums;
mod verify;

pub use enums::{BinOpKind, CastKind, CmpKind, UnaryKind};
pub use verify::{array_init_element, is_legal_cast};

use crate::context::{Context, Op};
use std::fmt;
use strum::{EnumIter, IntoEnumIterator};

/// Expected number of operands or results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Range(lo, hi) => write!(f, "{} to {}", lo, hi),
        }
    }
}

/// Semantic check for one operation kind; returns the failure message
pub type VerifyHook = fn(&Context, Op) -> Result<(), String>;

/// Static description of an operation kind
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub operands: Arity,
    pub results: Arity,
    pub num_regions: usize,
    pub num_successors: usize,
    pub terminator: bool,
    /// Free of side effects; dead instances may be erased
    pub pure_op: bool,
    /// Blocks of this op's regions must end in a terminator
    pub needs_terminator: bool,
    /// Values defined outside may not be referenced from within
    pub isolated: bool,
    pub verify: VerifyHook,
}

fn no_verify(_: &Context, _: Op) -> Result<(), String> {
    Ok(())
}

const BASE: OpInfo = OpInfo {
    name: "",
    operands: Arity::Exact(0),
    results: Arity::Exact(0),
    num_regions: 0,
    num_successors: 0,
    terminator: false,
    pure_op: false,
    needs_terminator: true,
    isolated: false,
    verify: no_verify,
};

const fn terminator(name: &'static str, operands: Arity, verify: VerifyHook) -> OpInfo {
    OpInfo {
        name,
        operands,
        terminator: true,
        verify,
        ..BASE
    }
}

const fn pure_op(name: &'static str, operands: usize, verify: VerifyHook) -> OpInfo {
    OpInfo {
        name,
        operands: Arity::Exact(operands),
        results: Arity::Exact(1),
        pure_op: true,
        verify,
        ..BASE
    }
}

static MODULE: OpInfo = OpInfo {
    name: "builtin.module",
    num_regions: 1,
    needs_terminator: false,
    isolated: true,
    verify: verify::module,
    ..BASE
};
static FUNC: OpInfo = OpInfo {
    name: "cir.func",
    num_regions: 1,
    isolated: true,
    verify: verify::func,
    ..BASE
};
static GLOBAL: OpInfo = OpInfo {
    name: "cir.global",
    num_regions: 2,
    isolated: true,
    verify: verify::global,
    ..BASE
};
static RETURN: OpInfo = terminator("cir.return", Arity::Range(0, 1), verify::return_op);
static BR: OpInfo = OpInfo {
    num_successors: 1,
    ..terminator("cir.br", Arity::AtLeast(0), verify::br)
};
static BRCOND: OpInfo = OpInfo {
    num_successors: 2,
    ..terminator("cir.brcond", Arity::Exact(1), verify::brcond)
};
static YIELD: OpInfo = terminator("cir.yield", Arity::AtLeast(0), verify::yield_op);
static CONDITION: OpInfo = terminator("cir.condition", Arity::Exact(1), verify::condition);
static UNREACHABLE: OpInfo = terminator("cir.unreachable", Arity::Exact(0), no_verify);
static CONST: OpInfo = pure_op("cir.const", 0, verify::constant);
static UNARY: OpInfo = pure_op("cir.unary", 1, verify::unary);
static BINOP: OpInfo = pure_op("cir.binop", 2, verify::binop);
static CMP: OpInfo = pure_op("cir.cmp", 2, verify::cmp);
static CAST: OpInfo = pure_op("cir.cast", 1, verify::cast);
static SELECT: OpInfo = pure_op("cir.select", 3, verify::select);
static TERNARY: OpInfo = OpInfo {
    name: "cir.ternary",
    operands: Arity::Exact(1),
    results: Arity::Range(0, 1),
    num_regions: 2,
    verify: verify::ternary,
    ..BASE
};
static SCOPE: OpInfo = OpInfo {
    name: "cir.scope",
    results: Arity::Range(0, 1),
    num_regions: 1,
    ..BASE
};
static ALLOCA: OpInfo = pure_op("cir.alloca", 0, verify::alloca);
static LOAD: OpInfo = OpInfo {
    pure_op: false,
    ..pure_op("cir.load", 1, verify::load)
};
static STORE: OpInfo = OpInfo {
    name: "cir.store",
    operands: Arity::Exact(2),
    verify: verify::store,
    ..BASE
};
static COPY: OpInfo = OpInfo {
    name: "cir.copy",
    operands: Arity::Exact(2),
    verify: verify::copy,
    ..BASE
};
static GET_GLOBAL: OpInfo = pure_op("cir.get_global", 0, verify::get_global);
static PTR_STRIDE: OpInfo = pure_op("cir.ptr_stride", 2, verify::ptr_stride);
static GET_ELEMENT: OpInfo = pure_op("cir.get_element", 2, verify::get_element);
static GET_MEMBER: OpInfo = pure_op("cir.get_member", 1, verify::get_member);
static CALL: OpInfo = OpInfo {
    name: "cir.call",
    operands: Arity::AtLeast(0),
    results: Arity::Range(0, 1),
    verify: verify::call,
    ..BASE
};
const ARRAY_INIT: OpInfo = OpInfo {
    operands: Arity::Range(1, 2),
    num_regions: 1,
    verify: verify::array_init,
    ..BASE
};
static ARRAY_CTOR: OpInfo = OpInfo {
    name: "cir.array.ctor",
    ..ARRAY_INIT
};
static ARRAY_DTOR: OpInfo = OpInfo {
    name: "cir.array.dtor",
    ..ARRAY_INIT
};
static ARRAY_NEW: OpInfo = OpInfo {
    name: "cir.array.new",
    operands: Arity::Exact(1),
    results: Arity::Exact(1),
    verify: verify::array_new,
    ..BASE
};
static ARRAY_DELETE: OpInfo = OpInfo {
    name: "cir.array.delete",
    operands: Arity::Exact(1),
    num_regions: 1,
    verify: verify::array_delete,
    ..BASE
};
static DO: OpInfo = OpInfo {
    name: "cir.do",
    num_regions: 2,
    verify: verify::do_loop,
    ..BASE
};
static WHILE: OpInfo = OpInfo {
    name: "cir.while",
    num_regions: 2,
    verify: verify::while_loop,
    ..BASE
};

/// Every operation kind of the dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum OpKind {
    Module,
    Func,
    Global,
    Return,
    Br,
    BrCond,
    Yield,
    Condition,
    Unreachable,
    Const,
    Unary,
    BinOp,
    Cmp,
    Cast,
    Select,
    Ternary,
    Scope,
    Alloca,
    Load,
    Store,
    Copy,
    GetGlobal,
    PtrStride,
    GetElement,
    GetMember,
    Call,
    ArrayCtor,
    ArrayDtor,
    ArrayNew,
    ArrayDelete,
    Do,
    While,
}

impl OpKind {
    pub fn info(self) -> &'static OpInfo {
        match self {
            OpKind::Module => &MODULE,
            OpKind::Func => &FUNC,
            OpKind::Global => &GLOBAL,
            OpKind::Return => &RETURN,
            OpKind::Br => &BR,
            OpKind::BrCond => &BRCOND,
            OpKind::Yield => &YIELD,
            OpKind::Condition => &CONDITION,
            OpKind::Unreachable => &UNREACHABLE,
            OpKind::Const => &CONST,
            OpKind::Unary => &UNARY,
            OpKind::BinOp => &BINOP,
            OpKind::Cmp => &CMP,
            OpKind::Cast => &CAST,
            OpKind::Select => &SELECT,
            OpKind::Ternary => &TERNARY,
            OpKind::Scope => &SCOPE,
            OpKind::Alloca => &ALLOCA,
            OpKind::Load => &LOAD,
            OpKind::Store => &STORE,
            OpKind::Copy => &COPY,
            OpKind::GetGlobal => &GET_GLOBAL,
            OpKind::PtrStride => &PTR_STRIDE,
            OpKind::GetElement => &GET_ELEMENT,
            OpKind::GetMember => &GET_MEMBER,
            OpKind::Call => &CALL,
            OpKind::ArrayCtor => &ARRAY_CTOR,
            OpKind::ArrayDtor => &ARRAY_DTOR,
            OpKind::ArrayNew => &ARRAY_NEW,
            OpKind::ArrayDelete => &ARRAY_DELETE,
            OpKind::Do => &DO,
            OpKind::While => &WHILE,
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Look up a kind by its textual name
    pub fn from_name(name: &str) -> Option<OpKind> {
        OpKind::iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in OpKind::iter() {
            assert_eq!(OpKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(OpKind::from_name("cir.bogus"), None);
    }

    #[test]
    fn test_capabilities() {
        assert!(OpKind::Return.info().terminator);
        assert!(!OpKind::Call.info().terminator);
        assert!(OpKind::Const.info().pure_op);
        assert!(!OpKind::Load.info().pure_op);
        assert_eq!(OpKind::BrCond.info().num_successors, 2);
        assert_eq!(OpKind::ArrayDtor.info().num_regions, 1);
        assert!(OpKind::Load.info().operands.accepts(1));
        assert!(!OpKind::Load.info().operands.accepts(2));
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::Exact(1).to_string(), "1");
        assert_eq!(Arity::AtLeast(2).to_string(), "at least 2");
        assert_eq!(Arity::Range(0, 1).to_string(), "0 to 1");
    }
}
