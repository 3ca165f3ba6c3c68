//! Disassembler for LS-8 programs.
//!
//! Converts memory images back to readable assembly. Bytes that do not
//! decode are shown as `DB` data so the listing reassembles.

use crate::cpu::decode::{decode, Instruction, Opcode};

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of bytes it occupies (at least 1).
pub fn disassemble_at(image: &[u8], addr: usize) -> (String, usize) {
    let byte = |offset: usize| image.get(addr + offset).copied().unwrap_or(0);
    let opcode = byte(0);

    match decode([opcode, byte(1), byte(2)], addr) {
        Ok(instr) => (format_instruction(&instr), Opcode(opcode).len()),
        Err(_) => (format!("DB {:#04x}", opcode), 1),
    }
}

/// Disassemble a whole image.
pub fn disassemble(image: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut addr = 0;
    while addr < image.len() {
        let (line, len) = disassemble_at(image, addr);
        let end = (addr + len).min(image.len());
        let raw: Vec<String> = image[addr..end].iter().map(|b| format!("{:02X}", b)).collect();
        output.push_str(&format!("{:02X}: {:<14}; {}\n", addr, line, raw.join(" ")));
        addr += len;
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let name = instr.mnemonic();
    match instr {
        Instruction::Nop | Instruction::Hlt | Instruction::Ret => name.to_string(),

        Instruction::Ldi { reg, value } => format!("{} {},{}", name, reg, value),
        Instruction::Ld { dst, addr } => format!("{} {},{}", name, dst, addr),
        Instruction::St { addr, src } => format!("{} {},{}", name, addr, src),

        Instruction::Prn { reg }
        | Instruction::Pra { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg }
        | Instruction::Jmp { reg }
        | Instruction::Branch { reg, .. } => format!("{} {}", name, reg),

        Instruction::Alu { a, b: Some(b), .. } => format!("{} {},{}", name, a, b),
        Instruction::Alu { a, b: None, .. } => format!("{} {}", name, a),
    }
}
