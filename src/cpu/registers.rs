//! LS-8 CPU registers.
//!
//! The LS-8 has:
//! - R0-R7: eight 8-bit general-purpose registers
//! - R7 doubles as the stack pointer (SP) by convention
//! - FL: the flags register, written only by CMP
//!
//! The program counter lives on the [`Cpu`](crate::Cpu) itself.

use bitflags::bitflags;
use serde::{Serialize, Deserialize};

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Power-on value of the stack pointer.
pub const SP_INIT: u8 = 0xF4;

/// A validated register index (0-7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reg(u8);

impl Reg {
    pub const R0: Reg = Reg(0);
    pub const R1: Reg = Reg(1);
    pub const R2: Reg = Reg(2);
    pub const R3: Reg = Reg(3);
    pub const R4: Reg = Reg(4);
    pub const R5: Reg = Reg(5);
    pub const R6: Reg = Reg(6);
    /// The stack pointer.
    pub const SP: Reg = Reg(7);

    /// Create from a raw operand byte, if it names a register.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Reg(index))
        } else {
            None
        }
    }

    /// The register's index.
    pub const fn index(self) -> u8 {
        self.0
    }
}

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

bitflags! {
    /// The FL register: `00000LGE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Flags: u8 {
        const EQUAL   = 0b0000_0001;
        const GREATER = 0b0000_0010;
        const LESS    = 0b0000_0100;
    }
}

impl Flags {
    /// Flags describing how `a` compares to `b`.
    ///
    /// Exactly one bit is ever set.
    pub fn compare(a: u8, b: u8) -> Self {
        match a.cmp(&b) {
            std::cmp::Ordering::Equal => Flags::EQUAL,
            std::cmp::Ordering::Greater => Flags::GREATER,
            std::cmp::Ordering::Less => Flags::LESS,
        }
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7. R7 is the stack pointer.
    pub gp: [u8; REGISTER_COUNT],

    /// FL: comparison flags.
    pub fl: Flags,
}

impl Registers {
    /// Create a register file in its power-on state.
    pub fn new() -> Self {
        let mut gp = [0; REGISTER_COUNT];
        gp[Reg::SP.index() as usize] = SP_INIT;
        Self {
            gp,
            fl: Flags::empty(),
        }
    }

    /// Reset all registers to their power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a register.
    #[inline]
    pub fn get(&self, reg: Reg) -> u8 {
        self.gp[reg.index() as usize]
    }

    /// Write a register.
    #[inline]
    pub fn set(&mut self, reg: Reg, value: u8) {
        self.gp[reg.index() as usize] = value;
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> u8 {
        self.get(Reg::SP)
    }

    /// Overwrite the stack pointer.
    #[inline]
    pub fn set_sp(&mut self, value: u8) {
        self.set(Reg::SP, value);
    }

    /// Replace the flags with the outcome of comparing `a` and `b`.
    pub fn compare(&mut self, a: u8, b: u8) {
        self.fl = Flags::compare(a, b);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
