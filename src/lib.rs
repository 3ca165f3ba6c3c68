//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a minimal 8-bit stored-program computer
//! with 256 bytes of memory, eight registers and a one-byte opcode
//! format whose high bits carry the instruction's operand count and
//! class.
//!
//! ```
//! use ls8::{assemble, Cpu};
//! use ls8::cpu::output::Captured;
//!
//! let program = assemble("LDI R0,8\nLDI R1,9\nMUL R0,R1\nPRN R0\nHLT").unwrap();
//! let mut cpu = Cpu::new();
//! cpu.load_program(&program).unwrap();
//!
//! let mut out = Captured::default();
//! cpu.run(&mut out).unwrap();
//! assert_eq!(out.text, "72\n");
//! ```

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Reg, Flags, Instruction};
pub use asm::{assemble, disassemble, AssemblerError, ProgramError, load_program, parse_program, save_program};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
