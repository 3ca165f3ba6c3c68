//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (`#` works too)
//! START:              ; Define a label
//!     LDI R0,8        ; Load immediate
//!     LDI R1,LOOP     ; Labels are valid immediates
//!     MUL R0,R1       ; Register operands are R0-R7 (SP = R7)
//!     PRN R0
//!     HLT
//! DATA: DB 0x41,66    ; Raw data bytes
//! ```
//!
//! Numbers may be decimal, `0x` hex or `0b` binary.

use crate::cpu::decode::{opcode_for, Opcode};
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::Reg;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a memory image.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Pending label references: (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        if self.output.len() > MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { size: self.output.len() });
        }

        // Pass 2: patch label references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = line
            .split(|c: char| c == ';' || c == '#')
            .next()
            .unwrap_or_default()
            .trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some((label, rest)) = line.split_once(':') {
            let label = label.trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label {:?}", label),
                });
            }

            let addr = u8::try_from(self.output.len())
                .map_err(|_| AssemblerError::ProgramTooLarge { size: self.output.len() })?;
            if self.symbols.insert(label.clone(), addr).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }

            let rest = rest.trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, operands) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();
        let operands: Vec<&str> = if operands.is_empty() {
            Vec::new()
        } else {
            operands.split(',').map(str::trim).collect()
        };

        // Directives
        if mnemonic == "DB" || mnemonic == "DATA" {
            if operands.is_empty() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "DB requires at least one value".into(),
                });
            }
            for operand in operands {
                let value = self.parse_value(operand, line_num)?;
                self.output.push(value);
            }
            return Ok(());
        }

        // Instructions
        let opcode = opcode_for(&mnemonic).ok_or_else(|| AssemblerError::UnknownMnemonic {
            line: line_num,
            mnemonic: mnemonic.clone(),
        })?;

        let expected = Opcode(opcode).operand_count();
        if operands.len() != expected {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!(
                    "{} takes {} operand(s), found {}",
                    mnemonic,
                    expected,
                    operands.len()
                ),
            });
        }

        self.output.push(opcode);
        for (i, operand) in operands.into_iter().enumerate() {
            // LDI's second operand is the only immediate.
            let byte = if opcode == Opcode::LDI && i == 1 {
                self.parse_value(operand, line_num)?
            } else {
                parse_register(operand, line_num)?.index()
            };
            self.output.push(byte);
        }

        Ok(())
    }

    /// Parse a numeric literal, or record a label reference to patch later.
    fn parse_value(&mut self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let parsed = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok()
        } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            i64::from_str_radix(bin, 2).ok()
        } else {
            operand.parse::<i64>().ok()
        };

        match parsed {
            Some(value) => u8::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange {
                line: line_num,
                value,
            }),
            None if is_identifier(operand) => {
                self.pending.push((self.output.len(), operand.to_uppercase(), line_num));
                Ok(0)
            }
            None => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid value {:?}", operand),
            }),
        }
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

fn parse_register(operand: &str, line_num: usize) -> Result<Reg, AssemblerError> {
    let upper = operand.to_uppercase();
    let reg = if upper == "SP" {
        Some(Reg::SP)
    } else {
        upper
            .strip_prefix('R')
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Reg::new)
    };

    reg.ok_or_else(|| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("expected a register (R0-R7), found {:?}", operand),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program is {size} bytes, memory holds 256")]
    ProgramTooLarge { size: usize },
}
