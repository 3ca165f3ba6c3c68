//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 bytes of memory shared by code, data and the stack
//! - 8 general-purpose registers, R7 doubling as the stack pointer
//! - an FL register written by CMP
//! - one-byte opcodes whose high bits describe operand count and class

pub mod memory;
pub mod registers;
pub mod alu;
pub mod decode;
pub mod execute;
pub mod output;

pub use memory::Memory;
pub use registers::{Registers, Reg, Flags};
pub use alu::{AluOp, AluError};
pub use decode::{Instruction, Condition, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState};
pub use output::Output;
