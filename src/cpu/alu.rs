//! Arithmetic/logic unit.
//!
//! Every operation works on 8-bit values and wraps; results never carry
//! past the register width. CMP is routed through here as well but only
//! produces flags.

use crate::cpu::registers::Flags;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Operations the ALU can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Cmp,
    Not,
    Inc,
    Dec,
}

impl AluOp {
    /// Whether the operation reads a second register.
    pub fn is_binary(self) -> bool {
        !matches!(self, AluOp::Not | AluOp::Inc | AluOp::Dec)
    }
}

/// What an ALU operation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluResult {
    /// Write this value back into the first register.
    Value(u8),
    /// Replace the flags register.
    Flags(Flags),
}

/// Evaluate `op` on `a` and `b`. Unary operations ignore `b`.
pub fn evaluate(op: AluOp, a: u8, b: u8) -> Result<AluResult, AluError> {
    let value = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Div => a.checked_div(b).ok_or(AluError::DivisionByZero)?,
        AluOp::Mod => a.checked_rem(b).ok_or(AluError::DivisionByZero)?,
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        // Shifting by 8 or more clears the register.
        AluOp::Shl => a.checked_shl(u32::from(b)).unwrap_or(0),
        AluOp::Shr => a.checked_shr(u32::from(b)).unwrap_or(0),
        AluOp::Not => !a,
        AluOp::Inc => a.wrapping_add(1),
        AluOp::Dec => a.wrapping_sub(1),
        AluOp::Cmp => return Ok(AluResult::Flags(Flags::compare(a, b))),
    };

    Ok(AluResult::Value(value))
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("division by zero")]
    DivisionByZero,
}
