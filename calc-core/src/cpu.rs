//! The virtual CPU: a program-counter-driven fetch-decode-execute loop
//! over an IR program.

use std::fmt;

use crate::alu::{self, Status, StatusFlag};
use crate::ir::{Instruction, OpCode, Program};
use crate::memory::{Memory, MemoryError};

#[cfg(test)]
mod test_helpers;

// Test must be after test_helpers, rust format tries to move things around.
#[cfg(test)]
mod test;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 32;

/// Hard watchdog against program-supplied infinite loops.
pub const MAX_STEPS: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// An executed instruction names a register outside the register file.
    RegisterOutOfRange { index: u8 },
    /// A branch target past the one-past-the-end halt index.
    BranchOutOfRange { target: usize },
    /// A Div instruction with a zero divisor.
    DivisionByZero,
    /// The step watchdog tripped.
    InfiniteLoop,
    /// A Load or Store executed with no memory attached.
    MemoryNotAttached,
    /// The attached memory rejected the access.
    Memory(MemoryError),
}

impl From<MemoryError> for ExecError {
    fn from(error: MemoryError) -> ExecError {
        ExecError::Memory(error)
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::RegisterOutOfRange { index } => {
                write!(f, "register r{} is outside the register file", index)
            }
            ExecError::BranchOutOfRange { target } => {
                write!(f, "branch target {} is outside the program", target)
            }
            ExecError::DivisionByZero => write!(f, "division by zero"),
            ExecError::InfiniteLoop => {
                write!(f, "execution did not finish within {} steps", MAX_STEPS)
            }
            ExecError::MemoryNotAttached => {
                write!(f, "a memory instruction ran with no memory attached")
            }
            ExecError::Memory(error) => write!(f, "memory error: {}", error),
        }
    }
}

impl std::error::Error for ExecError {}

/// This struct implements the register machine the IR targets.
///
/// All state starts zeroed, every run is self-contained, and nothing
/// persists between invocations: callers build a fresh `Cpu` per program.
/// Memory is borrowed, never owned; the caller that allocated it gets it
/// back when the run is over.
pub struct Cpu<'a> {
    /// General-purpose registers, all zero at reset.
    pub registers: [u32; REGISTER_COUNT],
    /// Index of the next instruction to execute. The program terminates
    /// normally when this reaches the program length.
    pub pc: usize,
    /// Condition flags written by the most recent arithmetic or
    /// comparison instruction.
    pub status: Status,
    /// The register most recently written by LoadConst, arithmetic, or
    /// Load. Cmp and Store do not count. The final result of a program is
    /// read from here.
    pub last_dst: u8,
    /// Instructions retired so far, for the watchdog.
    pub step_count: u64,
    memory: Option<&'a mut Memory>,
}

impl<'a> Cpu<'a> {
    pub fn new() -> Cpu<'a> {
        Cpu {
            registers: [0; REGISTER_COUNT],
            pc: 0,
            status: Status::new(),
            last_dst: 0,
            step_count: 0,
            memory: None,
        }
    }

    /// A CPU with RAM attached for the coming run. The memory is only
    /// borrowed; it outlives the CPU and stays with the caller.
    pub fn with_memory(memory: &'a mut Memory) -> Cpu<'a> {
        Cpu {
            memory: Some(memory),
            ..Cpu::new()
        }
    }

    /// Run the program to completion and return the word in the register
    /// most recently written. Execution halts at the first error; there
    /// is no partial-failure recovery.
    pub fn run(&mut self, program: &Program) -> Result<u32, ExecError> {
        self.run_with_callback(program, |_, _, _| {})
    }

    /// Run, invoking `callback` after every retired instruction with the
    /// CPU state, the index the instruction was fetched from, and the
    /// instruction itself. Drivers use this for tracing; anything printed
    /// from the callback is diagnostic, not contract.
    pub fn run_with_callback<F>(
        &mut self,
        program: &Program,
        mut callback: F,
    ) -> Result<u32, ExecError>
    where
        F: FnMut(&Cpu, usize, &Instruction),
    {
        while self.pc < program.len() {
            self.step_count += 1;
            if self.step_count > MAX_STEPS {
                return Err(ExecError::InfiniteLoop);
            }

            let pc = self.pc;
            let instruction = program.instructions()[pc];
            self.step(&instruction, program.len())?;
            callback(&*self, pc, &instruction);
        }

        Ok(self.registers[self.last_dst as usize])
    }

    /// Decode and execute a single instruction, leaving `pc` at the next
    /// instruction to run.
    fn step(&mut self, instruction: &Instruction, program_len: usize) -> Result<(), ExecError> {
        match instruction.op {
            OpCode::LoadConst => {
                let dst = register_index(instruction.dst)?;
                self.registers[dst] = instruction.imm;
                self.last_dst = instruction.dst;
                self.pc += 1;
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
                self.do_arithmetic(instruction)?;
            }
            OpCode::Cmp => {
                let dst = register_index(instruction.dst)?;
                let src = register_index(instruction.src)?;
                // Subtract for the flags, throw the difference away.
                alu::sub(self.registers[dst], self.registers[src], &mut self.status);
                self.pc += 1;
            }
            OpCode::Jmp => self.do_branch(instruction.target, program_len, true)?,
            OpCode::Jz => {
                let taken = self.status.is_set(StatusFlag::Zero);
                self.do_branch(instruction.target, program_len, taken)?;
            }
            OpCode::Jnz => {
                let taken = !self.status.is_set(StatusFlag::Zero);
                self.do_branch(instruction.target, program_len, taken)?;
            }
            OpCode::Load => {
                let dst = register_index(instruction.dst)?;
                let addr = register_index(instruction.addr)?;
                let address = self.registers[addr];
                let value = match self.memory.as_deref() {
                    Some(memory) => memory.read_word(address)?,
                    None => return Err(ExecError::MemoryNotAttached),
                };
                self.registers[dst] = value;
                self.last_dst = instruction.dst;
                self.pc += 1;
            }
            OpCode::Store => {
                let src = register_index(instruction.src)?;
                let addr = register_index(instruction.addr)?;
                let address = self.registers[addr];
                let value = self.registers[src];
                match self.memory.as_deref_mut() {
                    Some(memory) => memory.write_word(address, value)?,
                    None => return Err(ExecError::MemoryNotAttached),
                }
                self.pc += 1;
            }
        }
        Ok(())
    }

    fn do_arithmetic(&mut self, instruction: &Instruction) -> Result<(), ExecError> {
        let dst = register_index(instruction.dst)?;
        let src = register_index(instruction.src)?;
        let a = self.registers[dst];
        let b = self.registers[src];

        let result = match instruction.op {
            OpCode::Add => alu::add(a, b, &mut self.status),
            OpCode::Sub => alu::sub(a, b, &mut self.status),
            OpCode::Mul => alu::mul(a, b, &mut self.status),
            OpCode::Div => {
                if b == 0 {
                    return Err(ExecError::DivisionByZero);
                }
                alu::div(a, b, &mut self.status)
            }
            _ => unreachable!("not an arithmetic opcode"),
        };

        self.registers[dst] = result;
        self.last_dst = instruction.dst;
        self.pc += 1;
        Ok(())
    }

    /// Branch targets are validated whether or not the branch is taken; a
    /// target equal to the program length is a legal halt-by-jump.
    fn do_branch(
        &mut self,
        target: usize,
        program_len: usize,
        taken: bool,
    ) -> Result<(), ExecError> {
        if target > program_len {
            return Err(ExecError::BranchOutOfRange { target });
        }
        self.pc = if taken { target } else { self.pc + 1 };
        Ok(())
    }
}

fn register_index(index: u8) -> Result<usize, ExecError> {
    if (index as usize) < REGISTER_COUNT {
        Ok(index as usize)
    } else {
        Err(ExecError::RegisterOutOfRange { index })
    }
}
