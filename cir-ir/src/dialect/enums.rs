//! Kind selectors stored in the `kind` attribute of unary, binary, compare
//! and cast operations

use strum::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryKind {
    Not,
    Minus,
    Plus,
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CmpKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CastKind {
    IntToBool,
    BoolToInt,
    Integral,
    ArrayToPtrdecay,
    Bitcast,
    PtrToBool,
    IntToPtr,
    PtrToInt,
    Floating,
    IntToFloat,
    FloatToInt,
}

impl CmpKind {
    /// Evaluate the comparison on two integers
    pub fn evaluate(self, lhs: i128, rhs: i128) -> bool {
        match self {
            CmpKind::Eq => lhs == rhs,
            CmpKind::Ne => lhs != rhs,
            CmpKind::Lt => lhs < rhs,
            CmpKind::Le => lhs <= rhs,
            CmpKind::Gt => lhs > rhs,
            CmpKind::Ge => lhs >= rhs,
        }
    }
}

impl BinOpKind {
    /// Evaluate on integers before wrapping to the result width. `None` when
    /// the result is undefined (division by zero, oversized shift).
    pub fn evaluate(self, lhs: i128, rhs: i128, width: u32) -> Option<i128> {
        match self {
            BinOpKind::Add => lhs.checked_add(rhs),
            BinOpKind::Sub => lhs.checked_sub(rhs),
            BinOpKind::Mul => lhs.checked_mul(rhs),
            BinOpKind::Div => lhs.checked_div(rhs),
            BinOpKind::Rem => lhs.checked_rem(rhs),
            BinOpKind::And => Some(lhs & rhs),
            BinOpKind::Or => Some(lhs | rhs),
            BinOpKind::Xor => Some(lhs ^ rhs),
            BinOpKind::Shl => {
                let amount = u32::try_from(rhs).ok().filter(|&a| a < width)?;
                lhs.checked_shl(amount)
            }
            BinOpKind::Shr => {
                let amount = u32::try_from(rhs).ok().filter(|&a| a < width)?;
                lhs.checked_shr(amount)
            }
        }
    }
}
