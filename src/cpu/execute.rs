//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::alu::{self, AluError, AluResult};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use crate::cpu::output::Output;
use crate::cpu::{Memory, Registers};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU stopped on a fault.
    Error,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Program counter.
    pub pc: usize,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU in its power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            pc: 0,
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Reset the CPU to its power-on state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.pc = 0;
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. Any error leaves the CPU
    /// in the [`CpuState::Error`] state.
    pub fn step<O: Output>(&mut self, out: &mut O) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.fetch_and_execute(out) {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(e) => {
                warn!(pc = self.pc, error = %e, "CPU fault");
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run<O: Output>(&mut self, out: &mut O) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited<O: Output>(&mut self, max_cycles: u64, out: &mut O) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step(out)?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn fetch_and_execute<O: Output>(&mut self, out: &mut O) -> Result<Instruction, CpuError> {
        // Fetch
        let pc = self.pc;
        let opcode = self.mem.read(pc)?;
        let bytes = [opcode, self.mem.peek(pc + 1), self.mem.peek(pc + 2)];

        // Decode
        let instr = decode::decode(bytes, pc)?;
        let header = Opcode(opcode);
        let last_operand = pc + header.operand_count();
        if last_operand >= MEMORY_SIZE {
            return Err(MemoryError::AddressOutOfRange(last_operand).into());
        }

        debug!(pc, ?instr, "execute");

        // Execute
        self.execute(instr, pc + header.len(), out)?;

        if !header.sets_pc() {
            self.pc = pc + header.len();
        }

        Ok(instr)
    }

    /// Execute a decoded instruction. `next` is the address of the
    /// following instruction.
    fn execute<O: Output>(&mut self, instr: Instruction, next: usize, out: &mut O) -> Result<(), CpuError> {
        match instr {
            // ==================== Control ====================

            Instruction::Nop => {}

            Instruction::Hlt => {
                self.state = CpuState::Halted;
            }

            // ==================== Data Transfer ====================

            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value);
            }

            Instruction::Ld { dst, addr } => {
                let value = self.mem.read(usize::from(self.regs.get(addr)))?;
                self.regs.set(dst, value);
            }

            Instruction::St { addr, src } => {
                let value = self.regs.get(src);
                self.mem.write(usize::from(self.regs.get(addr)), value)?;
            }

            // ==================== Output ====================

            Instruction::Prn { reg } => {
                out.print_number(self.regs.get(reg));
            }

            Instruction::Pra { reg } => {
                out.print_char(self.regs.get(reg));
            }

            // ==================== Stack ====================

            Instruction::Push { reg } => {
                let value = self.regs.get(reg);
                self.push(value)?;
            }

            Instruction::Pop { reg } => {
                let value = self.pop()?;
                self.regs.set(reg, value);
            }

            Instruction::Call { reg } => {
                // Read the target first: pushing may move SP, and SP is a register.
                let target = self.regs.get(reg);
                let ret = u8::try_from(next).map_err(|_| MemoryError::AddressOutOfRange(next))?;
                self.push(ret)?;
                self.jump(target);
            }

            Instruction::Ret => {
                let target = self.pop()?;
                self.jump(target);
            }

            // ==================== Control Flow ====================

            Instruction::Jmp { reg } => {
                self.jump(self.regs.get(reg));
            }

            Instruction::Branch { cond, reg } => {
                if cond.holds(self.regs.fl) {
                    self.jump(self.regs.get(reg));
                } else {
                    self.pc = next;
                }
            }

            // ==================== ALU ====================

            Instruction::Alu { op, a, b } => {
                let lhs = self.regs.get(a);
                let rhs = b.map_or(0, |b| self.regs.get(b));
                match alu::evaluate(op, lhs, rhs)? {
                    AluResult::Value(value) => self.regs.set(a, value),
                    AluResult::Flags(flags) => self.regs.fl = flags,
                }
            }
        }

        Ok(())
    }

    /// Push a byte onto the stack.
    fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.regs.sp().checked_sub(1).ok_or(CpuError::StackOverflow)?;
        self.mem.write(usize::from(sp), value)?;
        self.regs.set_sp(sp);
        trace!(sp, value, "push");
        Ok(())
    }

    /// Pop a byte off the stack.
    fn pop(&mut self) -> Result<u8, CpuError> {
        let sp = self.regs.sp();
        let new_sp = sp.checked_add(1).ok_or(CpuError::StackUnderflow)?;
        let value = self.mem.read(usize::from(sp))?;
        self.regs.set_sp(new_sp);
        trace!(sp, value, "pop");
        Ok(value)
    }

    fn jump(&mut self, target: u8) {
        trace!(target, "jump");
        self.pc = usize::from(target);
    }

    /// One-line dump of PC, the bytes at PC and all registers, in hex.
    pub fn trace_line(&self) -> String {
        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            self.mem.peek(self.pc),
            self.mem.peek(self.pc + 1),
            self.mem.peek(self.pc + 2),
        );
        for value in self.regs.gp {
            line.push_str(&format!(" {:02X}", value));
        }
        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("division by zero")]
    DivisionByZero,
}

impl From<AluError> for CpuError {
    fn from(e: AluError) -> Self {
        match e {
            AluError::DivisionByZero => CpuError::DivisionByZero,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::alu::AluOp;
    use crate::cpu::decode::{encode, Condition};
    use crate::cpu::output::{Captured, Discard};
    use crate::cpu::registers::{Flags, Reg};

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    fn cpu_with(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(instructions)).unwrap();
        cpu
    }

    fn ldi(reg: Reg, value: u8) -> Instruction {
        Instruction::Ldi { reg, value }
    }

    fn alu(op: AluOp, a: Reg, b: Reg) -> Instruction {
        Instruction::Alu { op, a, b: Some(b) }
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = cpu_with(&[Instruction::Hlt]);

        let executed = cpu.run(&mut Discard).unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.step(&mut Discard), Err(CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_ldi_prn() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 8),
            Instruction::Prn { reg: Reg::R0 },
            Instruction::Hlt,
        ]);
        let mut out = Captured::default();

        cpu.run(&mut out).unwrap();

        assert_eq!(out.text, "8\n");
    }

    #[test]
    fn test_pc_advances_by_instruction_length() {
        let mut cpu = cpu_with(&[
            Instruction::Nop,
            ldi(Reg::R0, 1),
            Instruction::Prn { reg: Reg::R0 },
        ]);

        cpu.step(&mut Discard).unwrap();
        assert_eq!(cpu.pc, 1);
        cpu.step(&mut Discard).unwrap();
        assert_eq!(cpu.pc, 4);
        cpu.step(&mut Discard).unwrap();
        assert_eq!(cpu.pc, 6);
    }

    #[test]
    fn test_alu_masks_results() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 200),
            ldi(Reg::R1, 100),
            alu(AluOp::Add, Reg::R0, Reg::R1),
            Instruction::Hlt,
        ]);

        cpu.run(&mut Discard).unwrap();

        assert_eq!(cpu.regs.get(Reg::R0), 44);
        assert_eq!(cpu.regs.get(Reg::R1), 100);
    }

    #[test]
    fn test_cmp_sets_flags() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 3),
            ldi(Reg::R1, 9),
            alu(AluOp::Cmp, Reg::R0, Reg::R1),
            Instruction::Hlt,
        ]);

        cpu.run(&mut Discard).unwrap();

        assert_eq!(cpu.regs.fl, Flags::LESS);
        assert_eq!(cpu.regs.get(Reg::R0), 3);
    }

    #[test]
    fn test_push_pop() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 42),
            Instruction::Push { reg: Reg::R0 },
            Instruction::Pop { reg: Reg::R1 },
            Instruction::Hlt,
        ]);

        cpu.step(&mut Discard).unwrap();
        cpu.step(&mut Discard).unwrap();
        assert_eq!(cpu.regs.sp(), 0xF3);
        assert_eq!(cpu.mem.read(0xF3).unwrap(), 42);

        cpu.run(&mut Discard).unwrap();
        assert_eq!(cpu.regs.get(Reg::R1), 42);
        assert_eq!(cpu.regs.sp(), 0xF4);
    }

    #[test]
    fn test_call_ret() {
        // 0: LDI R1,8   3: CALL R1   5: PRN R0   7: HLT
        // 8: LDI R0,99  11: RET
        let mut cpu = cpu_with(&[
            ldi(Reg::R1, 8),
            Instruction::Call { reg: Reg::R1 },
            Instruction::Prn { reg: Reg::R0 },
            Instruction::Hlt,
            ldi(Reg::R0, 99),
            Instruction::Ret,
        ]);
        let mut out = Captured::default();

        cpu.step(&mut out).unwrap();
        cpu.step(&mut out).unwrap();
        assert_eq!(cpu.pc, 8);
        assert_eq!(cpu.mem.read(0xF3).unwrap(), 5);

        cpu.run(&mut out).unwrap();
        assert_eq!(out.numbers, vec![99]);
        assert_eq!(cpu.regs.sp(), 0xF4);
    }

    #[test]
    fn test_branch_not_taken_skips_operand() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 1),
            ldi(Reg::R1, 2),
            alu(AluOp::Cmp, Reg::R0, Reg::R1),
            Instruction::Branch { cond: Condition::Equal, reg: Reg::R0 },
            Instruction::Hlt,
        ]);

        for _ in 0..4 {
            cpu.step(&mut Discard).unwrap();
        }

        assert_eq!(cpu.pc, 11);
        cpu.step(&mut Discard).unwrap();
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_branch_taken() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 1),
            ldi(Reg::R1, 2),
            ldi(Reg::R2, 0x40),
            alu(AluOp::Cmp, Reg::R0, Reg::R1),
            Instruction::Branch { cond: Condition::NotEqual, reg: Reg::R2 },
        ]);

        for _ in 0..5 {
            cpu.step(&mut Discard).unwrap();
        }

        assert_eq!(cpu.pc, 0x40);
    }

    #[test]
    fn test_ld_st() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 0x80),
            ldi(Reg::R1, 77),
            Instruction::St { addr: Reg::R0, src: Reg::R1 },
            Instruction::Ld { dst: Reg::R2, addr: Reg::R0 },
            Instruction::Hlt,
        ]);

        cpu.run(&mut Discard).unwrap();

        assert_eq!(cpu.mem.read(0x80).unwrap(), 77);
        assert_eq!(cpu.regs.get(Reg::R2), 77);
    }

    #[test]
    fn test_invalid_opcode_halts_with_error() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[Opcode::NOP, 0xFF]).unwrap();

        let result = cpu.run(&mut Discard);

        assert_eq!(
            result,
            Err(CpuError::Decode(DecodeError::InvalidOpcode { opcode: 0xFF, addr: 1 }))
        );
        assert_eq!(cpu.state, CpuState::Error);
        assert_eq!(cpu.pc, 1);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_division_by_zero() {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, 10),
            alu(AluOp::Div, Reg::R0, Reg::R1),
        ]);

        assert_eq!(cpu.run(&mut Discard), Err(CpuError::DivisionByZero));
        assert_eq!(cpu.regs.get(Reg::R0), 10);
        assert_eq!(cpu.state, CpuState::Error);
    }

    #[test]
    fn test_stack_overflow() {
        let mut cpu = cpu_with(&[
            ldi(Reg::SP, 0),
            Instruction::Push { reg: Reg::R0 },
        ]);

        assert_eq!(cpu.run(&mut Discard), Err(CpuError::StackOverflow));
    }

    #[test]
    fn test_stack_underflow() {
        let mut cpu = cpu_with(&[
            ldi(Reg::SP, 0xFF),
            Instruction::Pop { reg: Reg::R0 },
        ]);

        assert_eq!(cpu.run(&mut Discard), Err(CpuError::StackUnderflow));
        assert_eq!(cpu.regs.sp(), 0xFF);
    }

    #[test]
    fn test_running_off_the_end() {
        let mut cpu = Cpu::new();
        cpu.pc = 0xFE;
        cpu.mem.write(0xFE, Opcode::LDI).unwrap();

        assert_eq!(
            cpu.step(&mut Discard),
            Err(CpuError::Memory(MemoryError::AddressOutOfRange(256)))
        );
    }

    #[test]
    fn test_run_limited() {
        // JMP R0 with R0 = 0 loops forever.
        let mut cpu = cpu_with(&[Instruction::Jmp { reg: Reg::R0 }]);

        let executed = cpu.run_limited(100, &mut Discard).unwrap();

        assert_eq!(executed, 100);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_trace_line() {
        let mut cpu = cpu_with(&[ldi(Reg::R0, 8)]);
        cpu.regs.set(Reg::R0, 0xAB);

        assert_eq!(
            cpu.trace_line(),
            "TRACE: 00 | 82 00 08 | AB 00 00 00 00 00 00 F4"
        );
    }

    #[test]
    fn test_reset() {
        let mut cpu = cpu_with(&[ldi(Reg::R0, 8), Instruction::Hlt]);
        cpu.run(&mut Discard).unwrap();

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs, Registers::new());
        assert_eq!(cpu.mem.read(0).unwrap(), 0);
        assert_eq!(cpu.last_instruction(), None);
    }
}
