//! Program tooling for the LS-8.
//!
//! This module provides:
//! - The binary-literal program image format (load/save)
//! - A simple two-pass assembler (mnemonics → memory image)
//! - A disassembler (memory image → readable text)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{load_program, parse_program, save_program, format_program, ProgramError};
