use super::test_helpers::*;
use super::*;
use crate::codegen;
use crate::eval;
use crate::parser;

mod expressions {
    use super::*;

    #[test]
    fn adds() {
        assert_result("3+4", 7);
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_result("3+4*2", 11);
    }

    #[test]
    fn parentheses_override() {
        assert_result("(3+4)*2", 14);
    }

    #[test]
    fn division_truncates() {
        assert_result("7/2", 3);
        assert_result("100/10/5", 2);
    }

    #[test]
    fn subtraction_wraps_below_zero() {
        // 0 - 5 as a 32-bit word.
        assert_result("0-5", 0xFFFF_FFFB);
    }

    #[test]
    fn large_constants_wrap_modulo_2_to_the_32() {
        // 4294967295 truncates to 0xFFFFFFFF; adding 1 wraps to 0.
        assert_result("4294967295+1", 0);
    }

    #[test]
    fn final_flags_reflect_the_last_operation() {
        let (_, cpu) = run_expression("5-5");
        assert_status(&cpu, Z | C);

        let (_, cpu) = run_expression("0-1");
        assert_status(&cpu, N);

        let (_, cpu) = run_expression("2147483647+1");
        assert_status(&cpu, N | V);
    }

    #[test]
    fn division_by_zero_is_reported() {
        let expr = parser::parse_expression("10/0").unwrap();
        let lowered = codegen::lower(&expr).unwrap();
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.run(&lowered.program).unwrap_err(),
            ExecError::DivisionByZero
        );
    }

    /// The reference evaluator and the CPU agree modulo 2^32.
    #[test]
    fn cross_check_against_the_reference_evaluator() {
        let samples = [
            "1",
            "3+4",
            "3+4*2",
            "(3+4)*2",
            "10-4-3",
            "0-5",
            "1000000*1000000",
            "(1+2)*(3+4)*(5+6)",
            "2147483647+2147483647",
            "100/7",
            "4294967295+1",
        ];
        for text in samples {
            let expr = parser::parse_expression(text).unwrap();
            let reference = eval::evaluate(&expr).unwrap();
            let (result, _) = run_expression(text);
            assert_eq!(
                result, reference as u32,
                "CPU and reference disagree on {}",
                text
            );
        }
    }
}

mod branching {
    use super::*;

    /// Compare two constants and pick 42 on equality, 99 otherwise.
    fn branch_select(first: i64, second: i64) -> Cpu<'static> {
        run_program([
            Instruction::load_const(1, first),
            Instruction::load_const(2, second),
            Instruction::cmp(1, 2),
            Instruction::jz(6),
            Instruction::load_const(3, 99),
            Instruction::jmp(7),
            Instruction::load_const(3, 42),
        ])
    }

    #[test]
    fn conditional_select_takes_the_equal_arm() {
        let cpu = branch_select(3, 3);
        assert_eq!(cpu.registers[3], 42);
    }

    #[test]
    fn conditional_select_takes_the_unequal_arm() {
        let cpu = branch_select(3, 5);
        assert_eq!(cpu.registers[3], 99);
    }

    #[test]
    fn countdown_loops_until_zero() {
        let cpu = run_program([
            Instruction::load_const(0, 5),
            Instruction::load_const(1, 1),
            Instruction::sub(0, 1),
            Instruction::jnz(2),
        ]);
        assert_eq!(cpu.registers[0], 0);
        // Two loads, then five trips through the two-instruction loop.
        assert_eq!(cpu.step_count, 12);
    }

    #[test]
    fn branch_to_program_length_halts() {
        let cpu = run_program([Instruction::load_const(0, 7), Instruction::jmp(2)]);
        assert_eq!(cpu.registers[0], 7);
        assert_eq!(cpu.pc, 2);
    }

    #[test]
    fn branch_past_program_length_is_an_error() {
        let program: Program = [Instruction::jmp(2)].into_iter().collect();
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.run(&program).unwrap_err(),
            ExecError::BranchOutOfRange { target: 2 }
        );
    }

    #[test]
    fn untaken_branches_still_validate_their_target() {
        // Z is clear at reset, so the Jz falls through, but its target is
        // checked anyway.
        let program: Program = [Instruction::jz(5)].into_iter().collect();
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.run(&program).unwrap_err(),
            ExecError::BranchOutOfRange { target: 5 }
        );
    }

    #[test]
    fn the_watchdog_stops_a_tight_loop() {
        let program: Program = [Instruction::jmp(0)].into_iter().collect();
        let mut cpu = Cpu::new();
        assert_eq!(cpu.run(&program).unwrap_err(), ExecError::InfiniteLoop);
        assert_eq!(cpu.step_count, MAX_STEPS + 1);
    }
}

mod state {
    use super::*;

    #[test]
    fn constant_loads_preserve_the_flags() {
        let cpu = run_program([
            Instruction::load_const(0, 5),
            Instruction::load_const(1, 5),
            Instruction::cmp(0, 1),
            // Z and C are set now; this load must not disturb them.
            Instruction::load_const(2, 123),
        ]);
        assert_status(&cpu, Z | C);
    }

    #[test]
    fn the_result_comes_from_the_last_written_register() {
        let cpu = run_program([
            Instruction::load_const(0, 1),
            Instruction::load_const(5, 77),
        ]);
        assert_eq!(cpu.last_dst, 5);
        assert_eq!(cpu.registers[5], 77);
    }

    #[test]
    fn cmp_does_not_move_last_dst() {
        let cpu = run_program([
            Instruction::load_const(0, 9),
            Instruction::load_const(1, 4),
            Instruction::cmp(1, 0),
        ]);
        assert_eq!(cpu.last_dst, 1);
    }

    #[test]
    fn registers_start_zeroed() {
        let cpu = Cpu::new();
        assert_eq!(cpu.registers, [0; REGISTER_COUNT]);
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.status.bits(), 0);
    }

    #[test]
    fn an_out_of_range_register_is_rejected() {
        let program: Program = [Instruction::load_const(32, 1)].into_iter().collect();
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.run(&program).unwrap_err(),
            ExecError::RegisterOutOfRange { index: 32 }
        );
    }

    #[test]
    fn the_callback_sees_every_retired_instruction() {
        let program: Program = [
            Instruction::load_const(0, 2),
            Instruction::load_const(1, 3),
            Instruction::add(0, 1),
        ]
        .into_iter()
        .collect();

        let mut seen = Vec::new();
        let mut cpu = Cpu::new();
        let result = cpu
            .run_with_callback(&program, |cpu, pc, instruction| {
                seen.push((pc, instruction.op, cpu.registers[0]));
            })
            .unwrap();

        assert_eq!(result, 5);
        assert_eq!(
            seen,
            vec![
                (0, OpCode::LoadConst, 2),
                (1, OpCode::LoadConst, 2),
                (2, OpCode::Add, 5),
            ]
        );
    }
}

mod memory_ops {
    use super::*;
    use crate::memory::{Memory, MemoryError};

    fn run_with_memory(
        memory: &mut Memory,
        instructions: impl IntoIterator<Item = Instruction>,
    ) -> Result<u32, ExecError> {
        let program: Program = instructions.into_iter().collect();
        Cpu::with_memory(memory).run(&program)
    }

    #[test]
    fn store_then_load_round_trips() {
        let mut memory = Memory::new();
        let program: Program = [
            Instruction::load_const(0, 0x200),
            Instruction::load_const(1, 0xDEAD_BEEF),
            Instruction::store(1, 0),
            Instruction::load(2, 0),
        ]
        .into_iter()
        .collect();

        let mut cpu = Cpu::with_memory(&mut memory);
        let result = cpu.run(&program).unwrap();
        assert_eq!(result, 0xDEAD_BEEF);
        assert_eq!(cpu.registers[2], 0xDEAD_BEEF);
    }

    #[test]
    fn stores_survive_for_a_later_program() {
        // The memory outlives the CPU that wrote it.
        let mut memory = Memory::new();
        run_with_memory(
            &mut memory,
            [
                Instruction::load_const(0, 0x400),
                Instruction::load_const(1, 1234),
                Instruction::store(1, 0),
            ],
        )
        .unwrap();

        let result = run_with_memory(
            &mut memory,
            [Instruction::load_const(0, 0x400), Instruction::load(2, 0)],
        )
        .unwrap();
        assert_eq!(result, 1234);
    }

    #[test]
    fn loads_require_an_attached_memory() {
        let program: Program = [Instruction::load(0, 1)].into_iter().collect();
        let mut cpu = Cpu::new();
        assert_eq!(cpu.run(&program).unwrap_err(), ExecError::MemoryNotAttached);
    }

    #[test]
    fn memory_errors_propagate() {
        let mut memory = Memory::new();
        let error = run_with_memory(
            &mut memory,
            [Instruction::load_const(0, 0x102), Instruction::load(1, 0)],
        )
        .unwrap_err();
        assert_eq!(error, ExecError::Memory(MemoryError::Misaligned { addr: 0x102 }));

        let error = run_with_memory(
            &mut memory,
            [Instruction::load_const(0, 0x10000), Instruction::load(1, 0)],
        )
        .unwrap_err();
        assert_eq!(
            error,
            ExecError::Memory(MemoryError::OutOfBounds { addr: 0x10000 })
        );
    }

    #[test]
    fn memory_ops_preserve_the_flags() {
        let mut memory = Memory::new();
        let program: Program = [
            Instruction::load_const(0, 0x200),
            Instruction::load_const(1, 5),
            Instruction::load_const(2, 5),
            Instruction::cmp(1, 2),
            Instruction::store(1, 0),
            Instruction::load(3, 0),
        ]
        .into_iter()
        .collect();

        let mut cpu = Cpu::with_memory(&mut memory);
        cpu.run(&program).unwrap();
        assert_status(&cpu, Z | C);
    }
}
