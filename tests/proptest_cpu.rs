//! Property-based tests for CPU invariants.
//!
//! These tests use proptest to check that instruction semantics hold
//! across all register values, not just the handful of cases in the
//! unit tests.

use ls8::cpu::decode::{decode, encode, Condition, Opcode};
use ls8::cpu::output::{Captured, Discard};
use ls8::cpu::AluOp;
use ls8::{Cpu, Flags, Instruction, Reg};
use proptest::prelude::*;

fn cpu_with(instructions: &[Instruction]) -> Cpu {
    let image: Vec<u8> = instructions.iter().flat_map(encode).collect();
    let mut cpu = Cpu::new();
    cpu.load_program(&image).unwrap();
    cpu
}

fn ldi(reg: Reg, value: u8) -> Instruction {
    Instruction::Ldi { reg, value }
}

/// Run a binary ALU op on `a` and `b` and return R0.
fn alu_result(op: AluOp, a: u8, b: u8) -> u8 {
    let mut cpu = cpu_with(&[
        ldi(Reg::R0, a),
        ldi(Reg::R1, b),
        Instruction::Alu { op, a: Reg::R0, b: Some(Reg::R1) },
        Instruction::Hlt,
    ]);
    cpu.run(&mut Discard).unwrap();
    cpu.regs.get(Reg::R0)
}

/// Any general-purpose register other than SP.
fn gp_reg() -> impl Strategy<Value = Reg> {
    (0u8..7).prop_map(|i| Reg::new(i).unwrap())
}

proptest! {
    #[test]
    fn prop_ldi_then_prn_prints_value(reg in gp_reg(), value: u8) {
        let mut cpu = cpu_with(&[ldi(reg, value), Instruction::Prn { reg }, Instruction::Hlt]);
        let mut out = Captured::default();

        cpu.run(&mut out).unwrap();

        prop_assert_eq!(out.text, format!("{}\n", value));
    }

    #[test]
    fn prop_add_wraps(a: u8, b: u8) {
        prop_assert_eq!(alu_result(AluOp::Add, a, b), a.wrapping_add(b));
    }

    #[test]
    fn prop_mul_wraps(a: u8, b: u8) {
        prop_assert_eq!(alu_result(AluOp::Mul, a, b), a.wrapping_mul(b));
    }

    #[test]
    fn prop_shifts_fill_with_zero(a: u8, n in 0u8..8) {
        prop_assert_eq!(alu_result(AluOp::Shl, a, n), a << n);
        prop_assert_eq!(alu_result(AluOp::Shr, a, n), a >> n);
    }

    #[test]
    fn prop_cmp_sets_exactly_one_flag(a: u8, b: u8) {
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, a),
            ldi(Reg::R1, b),
            Instruction::Alu { op: AluOp::Cmp, a: Reg::R0, b: Some(Reg::R1) },
            Instruction::Hlt,
        ]);
        cpu.run(&mut Discard).unwrap();

        let fl = cpu.regs.fl;
        prop_assert_eq!(fl.bits().count_ones(), 1);
        prop_assert_eq!(fl.contains(Flags::EQUAL), a == b);
        prop_assert_eq!(fl.contains(Flags::LESS), a < b);
        prop_assert_eq!(fl.contains(Flags::GREATER), a > b);
    }

    #[test]
    fn prop_push_pop_balances_sp(values in prop::collection::vec(any::<u8>(), 1..20)) {
        let mut program = Vec::new();
        for &value in &values {
            program.push(ldi(Reg::R0, value));
            program.push(Instruction::Push { reg: Reg::R0 });
        }
        for _ in &values {
            program.push(Instruction::Pop { reg: Reg::R1 });
            program.push(Instruction::Prn { reg: Reg::R1 });
        }
        program.push(Instruction::Hlt);

        // Each value costs 9 bytes of code, well clear of the stack.
        let mut cpu = cpu_with(&program);
        let mut out = Captured::default();
        cpu.run(&mut out).unwrap();

        prop_assert_eq!(cpu.regs.sp(), 0xF4);
        let reversed: Vec<u8> = values.iter().rev().copied().collect();
        prop_assert_eq!(out.numbers, reversed);
    }

    #[test]
    fn prop_jeq_jne_follow_equal_flag(a: u8, b: u8, equal_branch: bool) {
        let cond = if equal_branch { Condition::Equal } else { Condition::NotEqual };
        let mut cpu = cpu_with(&[
            ldi(Reg::R0, a),
            ldi(Reg::R1, b),
            ldi(Reg::R2, 0x80),
            Instruction::Alu { op: AluOp::Cmp, a: Reg::R0, b: Some(Reg::R1) },
            Instruction::Branch { cond, reg: Reg::R2 },
        ]);
        for _ in 0..5 {
            cpu.step(&mut Discard).unwrap();
        }

        let taken = (a == b) == equal_branch;
        // Branch sits at 12 and is 2 bytes long.
        let expected = if taken { 0x80 } else { 14 };
        prop_assert_eq!(cpu.pc, expected);
    }

    #[test]
    fn prop_decode_never_panics(bytes: [u8; 3], addr in 0usize..256) {
        if let Ok(instr) = decode(bytes, addr) {
            let encoded = encode(&instr);
            prop_assert_eq!(encoded.len(), Opcode(bytes[0]).len());
            prop_assert_eq!(&encoded[..], &bytes[..encoded.len()]);
        }
    }

    #[test]
    fn prop_random_images_never_panic(image in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut cpu = Cpu::new();
        cpu.load_program(&image).unwrap();

        // Either halts, faults, or hits the limit; it must never panic.
        let _ = cpu.run_limited(1000, &mut Discard);
        prop_assert!(cpu.cycles <= 1000);
    }
}
