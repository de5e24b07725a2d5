use crate::alu::StatusFlag;
use crate::codegen::{self, Lowered};
use crate::cpu::Cpu;
use crate::ir::Program;
use crate::parser;

pub const C: u8 = StatusFlag::Carry as u8;
pub const Z: u8 = StatusFlag::Zero as u8;
pub const V: u8 = StatusFlag::Overflow as u8;
pub const N: u8 = StatusFlag::Negative as u8;

/// Compile one expression all the way down and run it on a fresh CPU.
/// Returns the final word and the CPU for further asserts.
pub fn run_expression(text: &str) -> (u32, Cpu<'static>) {
    let expr = parser::parse_expression(text).expect("expression should parse");
    let Lowered { program, .. } = codegen::lower(&expr).expect("expression should lower");
    let mut cpu = Cpu::new();
    let result = cpu.run(&program).expect("program should run");
    (result, cpu)
}

/// Assert the final register value of a compiled expression, with the
/// program text in the failure message.
pub fn assert_result(text: &str, value: u32) {
    let (result, _) = run_expression(text);
    if result != value {
        panic!(
            "\n{}\nExpected the final register to hold {:#x} ({}) but it held {:#x} ({})",
            text, value, value, result, result
        );
    }
}

/// Run a hand-written program on a fresh CPU with no memory attached.
pub fn run_program(instructions: impl IntoIterator<Item = crate::ir::Instruction>) -> Cpu<'static> {
    let program: Program = instructions.into_iter().collect();
    let mut cpu = Cpu::new();
    cpu.run(&program).expect("program should run");
    cpu
}

/// Assert the status byte of a CPU, naming each mismatched flag.
pub fn assert_status(cpu: &Cpu, expected: u8) {
    let actual = cpu.status.bits();
    if actual == expected {
        return;
    }

    let mut result = String::new();
    for (flag, name) in [(N, "N"), (V, "V"), (Z, "Z"), (C, "C")] {
        let expected_set = expected & flag == flag;
        let actual_set = actual & flag == flag;
        if expected_set != actual_set {
            result.push_str(&format!(
                "\n  {}: expected {} but it was {}",
                name, expected_set, actual_set
            ));
        }
    }
    panic!("The status flags do not match:{}", result);
}
