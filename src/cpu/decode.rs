//! Instruction decoder for the LS-8.
//!
//! Every opcode is one byte laid out as `AABCDDDD`:
//! - `AA`: number of operand bytes that follow (0-2)
//! - `B`: the instruction is handled by the ALU
//! - `C`: the instruction sets the PC itself
//! - `DDDD`: instruction identifier
//!
//! The header bits only describe an instruction's shape. The full byte is
//! what selects it, so two opcodes may share an identifier nibble
//! (HLT `0x01` and RET `0x11`).

use crate::cpu::alu::AluOp;
use crate::cpu::registers::{Flags, Reg};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A raw opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const NOP: u8 = 0x00;
    pub const HLT: u8 = 0x01;
    pub const RET: u8 = 0x11;
    pub const PUSH: u8 = 0x45;
    pub const POP: u8 = 0x46;
    pub const PRN: u8 = 0x47;
    pub const PRA: u8 = 0x48;
    pub const CALL: u8 = 0x50;
    pub const JMP: u8 = 0x54;
    pub const JEQ: u8 = 0x55;
    pub const JNE: u8 = 0x56;
    pub const JGT: u8 = 0x57;
    pub const JLT: u8 = 0x58;
    pub const JLE: u8 = 0x59;
    pub const JGE: u8 = 0x5A;
    pub const INC: u8 = 0x65;
    pub const DEC: u8 = 0x66;
    pub const NOT: u8 = 0x69;
    pub const LDI: u8 = 0x82;
    pub const LD: u8 = 0x83;
    pub const ST: u8 = 0x84;
    pub const ADD: u8 = 0xA0;
    pub const SUB: u8 = 0xA1;
    pub const MUL: u8 = 0xA2;
    pub const DIV: u8 = 0xA3;
    pub const MOD: u8 = 0xA4;
    pub const CMP: u8 = 0xA7;
    pub const AND: u8 = 0xA8;
    pub const OR: u8 = 0xAA;
    pub const XOR: u8 = 0xAB;
    pub const SHL: u8 = 0xAC;
    pub const SHR: u8 = 0xAD;

    const OPERANDS_SHIFT: u8 = 6;
    const ALU_BIT: u8 = 0b0010_0000;
    const SETS_PC_BIT: u8 = 0b0001_0000;
    const IDENTIFIER_MASK: u8 = 0b0000_1111;

    /// Number of operand bytes following the opcode.
    #[inline]
    pub fn operand_count(self) -> usize {
        (self.0 >> Self::OPERANDS_SHIFT) as usize
    }

    /// Whether the ALU evaluates this instruction.
    #[inline]
    pub fn is_alu(self) -> bool {
        self.0 & Self::ALU_BIT != 0
    }

    /// Whether the instruction is responsible for the PC.
    #[inline]
    pub fn sets_pc(self) -> bool {
        self.0 & Self::SETS_PC_BIT != 0
    }

    /// The low identifier nibble.
    #[inline]
    pub fn identifier(self) -> u8 {
        self.0 & Self::IDENTIFIER_MASK
    }

    /// Total encoded length, opcode included.
    #[inline]
    pub fn len(self) -> usize {
        self.operand_count() + 1
    }
}

/// Every supported opcode with its mnemonic.
pub const OPCODE_TABLE: &[(u8, &str)] = &[
    (Opcode::NOP, "NOP"),
    (Opcode::HLT, "HLT"),
    (Opcode::RET, "RET"),
    (Opcode::PUSH, "PUSH"),
    (Opcode::POP, "POP"),
    (Opcode::PRN, "PRN"),
    (Opcode::PRA, "PRA"),
    (Opcode::CALL, "CALL"),
    (Opcode::JMP, "JMP"),
    (Opcode::JEQ, "JEQ"),
    (Opcode::JNE, "JNE"),
    (Opcode::JGT, "JGT"),
    (Opcode::JLT, "JLT"),
    (Opcode::JLE, "JLE"),
    (Opcode::JGE, "JGE"),
    (Opcode::INC, "INC"),
    (Opcode::DEC, "DEC"),
    (Opcode::NOT, "NOT"),
    (Opcode::LDI, "LDI"),
    (Opcode::LD, "LD"),
    (Opcode::ST, "ST"),
    (Opcode::ADD, "ADD"),
    (Opcode::SUB, "SUB"),
    (Opcode::MUL, "MUL"),
    (Opcode::DIV, "DIV"),
    (Opcode::MOD, "MOD"),
    (Opcode::CMP, "CMP"),
    (Opcode::AND, "AND"),
    (Opcode::OR, "OR"),
    (Opcode::XOR, "XOR"),
    (Opcode::SHL, "SHL"),
    (Opcode::SHR, "SHR"),
];

/// Look up an opcode byte by mnemonic (case-insensitive).
pub fn opcode_for(mnemonic: &str) -> Option<u8> {
    OPCODE_TABLE
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(mnemonic))
        .map(|&(op, _)| op)
}

/// Branch conditions tested against FL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl Condition {
    /// Whether the branch is taken for these flags.
    pub fn holds(self, fl: Flags) -> bool {
        match self {
            Condition::Equal => fl.contains(Flags::EQUAL),
            Condition::NotEqual => !fl.contains(Flags::EQUAL),
            Condition::Greater => fl.contains(Flags::GREATER),
            Condition::Less => fl.contains(Flags::LESS),
            Condition::GreaterOrEqual => fl.intersects(Flags::GREATER | Flags::EQUAL),
            Condition::LessOrEqual => fl.intersects(Flags::LESS | Flags::EQUAL),
        }
    }
}

/// Decoded LS-8 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Control ====================

    /// No operation
    Nop,

    /// Halt execution
    Hlt,

    // ==================== Data Transfer ====================

    /// Load immediate: reg := value
    Ldi { reg: Reg, value: u8 },

    /// Load from memory: dst := [addr]
    Ld { dst: Reg, addr: Reg },

    /// Store to memory: [addr] := src
    St { addr: Reg, src: Reg },

    // ==================== Output ====================

    /// Print a register as a decimal number
    Prn { reg: Reg },

    /// Print a register as an ASCII character
    Pra { reg: Reg },

    // ==================== Stack ====================

    /// SP := SP - 1; [SP] := reg
    Push { reg: Reg },

    /// reg := [SP]; SP := SP + 1
    Pop { reg: Reg },

    /// Push the return address, then PC := reg
    Call { reg: Reg },

    /// PC := pop
    Ret,

    // ==================== Control Flow ====================

    /// PC := reg
    Jmp { reg: Reg },

    /// PC := reg if the condition holds
    Branch { cond: Condition, reg: Reg },

    // ==================== ALU ====================

    /// ALU operation. `b` is `None` for unary operations.
    Alu { op: AluOp, a: Reg, b: Option<Reg> },
}

impl Instruction {
    /// The opcode byte this instruction encodes to.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Nop => Opcode::NOP,
            Instruction::Hlt => Opcode::HLT,
            Instruction::Ldi { .. } => Opcode::LDI,
            Instruction::Ld { .. } => Opcode::LD,
            Instruction::St { .. } => Opcode::ST,
            Instruction::Prn { .. } => Opcode::PRN,
            Instruction::Pra { .. } => Opcode::PRA,
            Instruction::Push { .. } => Opcode::PUSH,
            Instruction::Pop { .. } => Opcode::POP,
            Instruction::Call { .. } => Opcode::CALL,
            Instruction::Ret => Opcode::RET,
            Instruction::Jmp { .. } => Opcode::JMP,
            Instruction::Branch { cond, .. } => match cond {
                Condition::Equal => Opcode::JEQ,
                Condition::NotEqual => Opcode::JNE,
                Condition::Greater => Opcode::JGT,
                Condition::Less => Opcode::JLT,
                Condition::GreaterOrEqual => Opcode::JGE,
                Condition::LessOrEqual => Opcode::JLE,
            },
            Instruction::Alu { op, .. } => match op {
                AluOp::Add => Opcode::ADD,
                AluOp::Sub => Opcode::SUB,
                AluOp::Mul => Opcode::MUL,
                AluOp::Div => Opcode::DIV,
                AluOp::Mod => Opcode::MOD,
                AluOp::And => Opcode::AND,
                AluOp::Or => Opcode::OR,
                AluOp::Xor => Opcode::XOR,
                AluOp::Shl => Opcode::SHL,
                AluOp::Shr => Opcode::SHR,
                AluOp::Cmp => Opcode::CMP,
                AluOp::Not => Opcode::NOT,
                AluOp::Inc => Opcode::INC,
                AluOp::Dec => Opcode::DEC,
            },
        }
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        Opcode(self.opcode()).len()
    }

    /// Mnemonic for this instruction.
    pub fn mnemonic(&self) -> &'static str {
        let opcode = self.opcode();
        OPCODE_TABLE
            .iter()
            .find(|&&(op, _)| op == opcode)
            .map_or("???", |&(_, name)| name)
    }
}

/// Decode the instruction whose opcode is `bytes[0]`.
///
/// `bytes[1..]` are the candidate operands; only the ones the opcode
/// declares are interpreted. `addr` is where the opcode was fetched from
/// and is only used for error reporting.
pub fn decode(bytes: [u8; 3], addr: usize) -> Result<Instruction, DecodeError> {
    let [opcode, first, second] = bytes;
    let reg = |index: u8| {
        Reg::new(index).ok_or(DecodeError::InvalidRegister { register: index, addr })
    };
    let alu = |op: AluOp| -> Result<Instruction, DecodeError> {
        let b = if op.is_binary() { Some(reg(second)?) } else { None };
        Ok(Instruction::Alu { op, a: reg(first)?, b })
    };
    let branch = |cond: Condition| -> Result<Instruction, DecodeError> {
        Ok(Instruction::Branch { cond, reg: reg(first)? })
    };

    let instruction = match opcode {
        Opcode::NOP => Instruction::Nop,
        Opcode::HLT => Instruction::Hlt,
        Opcode::LDI => Instruction::Ldi { reg: reg(first)?, value: second },
        Opcode::LD => Instruction::Ld { dst: reg(first)?, addr: reg(second)? },
        Opcode::ST => Instruction::St { addr: reg(first)?, src: reg(second)? },
        Opcode::PRN => Instruction::Prn { reg: reg(first)? },
        Opcode::PRA => Instruction::Pra { reg: reg(first)? },
        Opcode::PUSH => Instruction::Push { reg: reg(first)? },
        Opcode::POP => Instruction::Pop { reg: reg(first)? },
        Opcode::CALL => Instruction::Call { reg: reg(first)? },
        Opcode::RET => Instruction::Ret,
        Opcode::JMP => Instruction::Jmp { reg: reg(first)? },
        Opcode::JEQ => branch(Condition::Equal)?,
        Opcode::JNE => branch(Condition::NotEqual)?,
        Opcode::JGT => branch(Condition::Greater)?,
        Opcode::JLT => branch(Condition::Less)?,
        Opcode::JGE => branch(Condition::GreaterOrEqual)?,
        Opcode::JLE => branch(Condition::LessOrEqual)?,
        Opcode::ADD => alu(AluOp::Add)?,
        Opcode::SUB => alu(AluOp::Sub)?,
        Opcode::MUL => alu(AluOp::Mul)?,
        Opcode::DIV => alu(AluOp::Div)?,
        Opcode::MOD => alu(AluOp::Mod)?,
        Opcode::AND => alu(AluOp::And)?,
        Opcode::OR => alu(AluOp::Or)?,
        Opcode::XOR => alu(AluOp::Xor)?,
        Opcode::SHL => alu(AluOp::Shl)?,
        Opcode::SHR => alu(AluOp::Shr)?,
        Opcode::CMP => alu(AluOp::Cmp)?,
        Opcode::NOT => alu(AluOp::Not)?,
        Opcode::INC => alu(AluOp::Inc)?,
        Opcode::DEC => alu(AluOp::Dec)?,
        _ => return Err(DecodeError::InvalidOpcode { opcode, addr }),
    };

    Ok(instruction)
}

/// Encode an instruction to its byte sequence.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut bytes = vec![instr.opcode()];

    match *instr {
        Instruction::Nop | Instruction::Hlt | Instruction::Ret => {}
        Instruction::Ldi { reg, value } => bytes.extend([reg.index(), value]),
        Instruction::Ld { dst, addr } => bytes.extend([dst.index(), addr.index()]),
        Instruction::St { addr, src } => bytes.extend([addr.index(), src.index()]),
        Instruction::Prn { reg }
        | Instruction::Pra { reg }
        | Instruction::Push { reg }
        | Instruction::Pop { reg }
        | Instruction::Call { reg }
        | Instruction::Jmp { reg }
        | Instruction::Branch { reg, .. } => bytes.push(reg.index()),
        Instruction::Alu { a, b, .. } => {
            bytes.push(a.index());
            if let Some(b) = b {
                bytes.push(b.index());
            }
        }
    }

    bytes
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode {opcode:#04x} at address {addr:#04x}")]
    InvalidOpcode { opcode: u8, addr: usize },

    #[error("invalid register {register} at address {addr:#04x}")]
    InvalidRegister { register: u8, addr: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bits() {
        let ldi = Opcode(Opcode::LDI);
        assert_eq!(ldi.operand_count(), 2);
        assert!(!ldi.is_alu());
        assert!(!ldi.sets_pc());
        assert_eq!(ldi.identifier(), 0b0010);

        let call = Opcode(Opcode::CALL);
        assert_eq!(call.operand_count(), 1);
        assert!(call.sets_pc());

        let mul = Opcode(Opcode::MUL);
        assert!(mul.is_alu());
        assert_eq!(mul.len(), 3);
    }

    #[test]
    fn test_table_header_bits_match_instruction_class() {
        for &(op, name) in OPCODE_TABLE {
            let instr = decode([op, 0, 1], 0)
                .unwrap_or_else(|e| panic!("{} does not decode: {}", name, e));
            let header = Opcode(op);

            assert_eq!(instr.opcode(), op, "{}", name);
            assert_eq!(instr.mnemonic(), name);
            assert_eq!(encode(&instr).len(), header.len(), "{}", name);
            assert_eq!(
                header.is_alu(),
                matches!(instr, Instruction::Alu { .. }),
                "{} ALU bit",
                name
            );
            assert_eq!(
                header.sets_pc(),
                matches!(
                    instr,
                    Instruction::Call { .. }
                        | Instruction::Ret
                        | Instruction::Jmp { .. }
                        | Instruction::Branch { .. }
                ),
                "{} sets-PC bit",
                name
            );
        }
    }

    #[test]
    fn test_opcodes_are_unique() {
        for (i, &(a, _)) in OPCODE_TABLE.iter().enumerate() {
            for &(b, _) in &OPCODE_TABLE[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_decode_ldi() {
        let instr = decode([0b1000_0010, 0, 8], 0).unwrap();
        assert_eq!(instr, Instruction::Ldi { reg: Reg::R0, value: 8 });
    }

    #[test]
    fn test_decode_invalid_opcode() {
        assert_eq!(
            decode([0xFF, 0, 0], 0x10),
            Err(DecodeError::InvalidOpcode { opcode: 0xFF, addr: 0x10 })
        );
    }

    #[test]
    fn test_decode_invalid_register() {
        assert_eq!(
            decode([Opcode::PRN, 8, 0], 3),
            Err(DecodeError::InvalidRegister { register: 8, addr: 3 })
        );
    }

    #[test]
    fn test_undeclared_operands_are_ignored() {
        // NOT reads one register; the garbage second byte must not matter.
        let instr = decode([Opcode::NOT, 2, 0xFF], 0).unwrap();
        assert_eq!(instr, Instruction::Alu { op: AluOp::Not, a: Reg::R2, b: None });

        assert_eq!(decode([Opcode::HLT, 0xFF, 0xFF], 0), Ok(Instruction::Hlt));
    }

    #[test]
    fn test_encode() {
        let mul = Instruction::Alu { op: AluOp::Mul, a: Reg::R0, b: Some(Reg::R1) };
        assert_eq!(encode(&mul), vec![0b1010_0010, 0, 1]);
        assert_eq!(encode(&Instruction::Ret), vec![0b0001_0001]);
    }

    #[test]
    fn test_conditions() {
        assert!(Condition::Equal.holds(Flags::EQUAL));
        assert!(!Condition::Equal.holds(Flags::LESS));
        assert!(Condition::NotEqual.holds(Flags::empty()));
        assert!(Condition::GreaterOrEqual.holds(Flags::EQUAL));
        assert!(Condition::GreaterOrEqual.holds(Flags::GREATER));
        assert!(!Condition::GreaterOrEqual.holds(Flags::LESS));
        assert!(Condition::LessOrEqual.holds(Flags::LESS));
        assert!(!Condition::LessOrEqual.holds(Flags::GREATER));
    }

    #[test]
    fn test_opcode_for() {
        assert_eq!(opcode_for("ldi"), Some(Opcode::LDI));
        assert_eq!(opcode_for("JGE"), Some(Opcode::JGE));
        assert_eq!(opcode_for("FOO"), None);
    }
}
