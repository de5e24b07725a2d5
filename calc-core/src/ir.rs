//! The intermediate representation: the opcode set, the instruction
//! record, and the append-only program buffer the CPU executes.

use std::fmt;

/// Every operation the virtual machine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    LoadConst,
    Add,
    Sub,
    Mul,
    Div,
    Cmp,
    Jmp,
    Jz,
    Jnz,
    Load,
    Store,
}

/// One machine instruction.
///
/// Only the fields an opcode actually uses carry meaning; the constructors
/// below leave every other field zero. Arithmetic is two-address: the
/// destination register doubles as the left operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    /// Destination register.
    pub dst: u8,
    /// Source register.
    pub src: u8,
    /// Immediate value, as a 32-bit pattern.
    pub imm: u32,
    /// Absolute instruction index for branches.
    pub target: usize,
    /// Register holding a memory address.
    pub addr: u8,
}

impl Instruction {
    fn with_op(op: OpCode) -> Instruction {
        Instruction {
            op,
            dst: 0,
            src: 0,
            imm: 0,
            target: 0,
            addr: 0,
        }
    }

    /// R[dst] := imm. A wider immediate is truncated to its low 32 bits
    /// without diagnostic.
    pub fn load_const(dst: u8, value: i64) -> Instruction {
        Instruction {
            dst,
            imm: value as u32,
            ..Instruction::with_op(OpCode::LoadConst)
        }
    }

    /// R[dst] := R[dst] + R[src]
    pub fn add(dst: u8, src: u8) -> Instruction {
        Instruction {
            dst,
            src,
            ..Instruction::with_op(OpCode::Add)
        }
    }

    /// R[dst] := R[dst] - R[src]
    pub fn sub(dst: u8, src: u8) -> Instruction {
        Instruction {
            dst,
            src,
            ..Instruction::with_op(OpCode::Sub)
        }
    }

    /// R[dst] := R[dst] * R[src]
    pub fn mul(dst: u8, src: u8) -> Instruction {
        Instruction {
            dst,
            src,
            ..Instruction::with_op(OpCode::Mul)
        }
    }

    /// R[dst] := R[dst] / R[src]
    pub fn div(dst: u8, src: u8) -> Instruction {
        Instruction {
            dst,
            src,
            ..Instruction::with_op(OpCode::Div)
        }
    }

    /// Compare R[dst] with R[src]: subtract for the flags, discard the
    /// difference.
    pub fn cmp(dst: u8, src: u8) -> Instruction {
        Instruction {
            dst,
            src,
            ..Instruction::with_op(OpCode::Cmp)
        }
    }

    /// pc := target
    pub fn jmp(target: usize) -> Instruction {
        Instruction {
            target,
            ..Instruction::with_op(OpCode::Jmp)
        }
    }

    /// pc := target if Z is set, else fall through.
    pub fn jz(target: usize) -> Instruction {
        Instruction {
            target,
            ..Instruction::with_op(OpCode::Jz)
        }
    }

    /// pc := target if Z is clear, else fall through.
    pub fn jnz(target: usize) -> Instruction {
        Instruction {
            target,
            ..Instruction::with_op(OpCode::Jnz)
        }
    }

    /// R[dst] := the word at the address held in R[addr].
    pub fn load(dst: u8, addr: u8) -> Instruction {
        Instruction {
            dst,
            addr,
            ..Instruction::with_op(OpCode::Load)
        }
    }

    /// Store R[src] to the address held in R[addr].
    pub fn store(src: u8, addr: u8) -> Instruction {
        Instruction {
            src,
            addr,
            ..Instruction::with_op(OpCode::Store)
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            OpCode::LoadConst => write!(f, "LoadConst r{}, {}", self.dst, self.imm),
            OpCode::Add => write!(f, "Add r{}, r{}", self.dst, self.src),
            OpCode::Sub => write!(f, "Sub r{}, r{}", self.dst, self.src),
            OpCode::Mul => write!(f, "Mul r{}, r{}", self.dst, self.src),
            OpCode::Div => write!(f, "Div r{}, r{}", self.dst, self.src),
            OpCode::Cmp => write!(f, "Cmp r{}, r{}", self.dst, self.src),
            OpCode::Jmp => write!(f, "Jmp {}", self.target),
            OpCode::Jz => write!(f, "Jz {}", self.target),
            OpCode::Jnz => write!(f, "Jnz {}", self.target),
            OpCode::Load => write!(f, "Load r{}, [r{}]", self.dst, self.addr),
            OpCode::Store => write!(f, "Store [r{}], r{}", self.addr, self.src),
        }
    }
}

/// An append-only instruction buffer. Instruction indices double as branch
/// targets, so nothing is ever inserted or removed once emitted, and the
/// program is immutable while the CPU runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Initial capacity of the instruction buffer; growth doubles from
    /// here.
    const INITIAL_CAPACITY: usize = 16;

    pub fn new() -> Program {
        Program {
            instructions: Vec::with_capacity(Program::INITIAL_CAPACITY),
        }
    }

    /// Append one instruction and return its index.
    pub fn push(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Program {
        let mut program = Program::new();
        for instruction in iter {
            program.push(instruction);
        }
        program
    }
}

impl fmt::Display for Program {
    // A numbered listing, one instruction per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{}: {}", index, instruction)?;
        }
        Ok(())
    }
}
