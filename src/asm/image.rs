//! Program image format for LS-8 programs.
//!
//! A program is a text file holding one byte per line:
//! - Each byte is written as a string of `0`/`1` characters
//! - `#` starts a comment that runs to the end of the line
//! - Blank and comment-only lines are ignored
//!
//! ```text
//! # print8.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```

use crate::asm::disasm::disassemble_at;
use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Parse program text into a memory image.
pub fn parse_program(source: &str) -> Result<Vec<u8>, ProgramError> {
    let mut image = Vec::new();

    for (line_num, line) in source.lines().enumerate() {
        let code = line.split('#').next().unwrap_or_default().trim();

        if code.is_empty() {
            continue;
        }

        if !code.chars().all(|c| c == '0' || c == '1') {
            return Err(ProgramError::ParseError {
                line: line_num + 1,
                message: format!("expected a binary literal, found {:?}", code),
            });
        }

        let byte = u8::from_str_radix(code, 2).map_err(|_| ProgramError::ParseError {
            line: line_num + 1,
            message: format!("{} does not fit in 8 bits", code),
        })?;

        image.push(byte);
    }

    if image.len() > MEMORY_SIZE {
        return Err(MemoryError::ProgramTooLarge {
            size: image.len(),
            available: MEMORY_SIZE,
        }
        .into());
    }

    Ok(image)
}

/// Load a program file from disk.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ProgramError> {
    let source = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ProgramError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;
    parse_program(&source)
}

/// Render a memory image as program text, annotating each instruction.
pub fn format_program(image: &[u8]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "# LS-8 program");
    let _ = writeln!(text, "# {} bytes", image.len());
    text.push('\n');

    let mut addr = 0;
    while addr < image.len() {
        let (listing, len) = disassemble_at(image, addr);
        let _ = writeln!(text, "{:08b} # {:02X}: {}", image[addr], addr, listing);
        for operand in image.iter().skip(addr + 1).take(len - 1) {
            let _ = writeln!(text, "{:08b}", operand);
        }
        addr += len;
    }

    text
}

/// Save a memory image to disk.
pub fn save_program<P: AsRef<Path>>(path: P, image: &[u8]) -> Result<(), ProgramError> {
    std::fs::write(path.as_ref(), format_program(image))
        .map_err(|e| ProgramError::IoError(format!("{}: {}", path.as_ref().display(), e)))
}

/// Errors that can occur while reading or writing programs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
