//! Lowers an expression tree into a linear IR program.

use std::fmt;

use crate::ast::{BinOp, Expr};
use crate::cpu::REGISTER_COUNT;
use crate::ir::{Instruction, Program};

/// The output of lowering: the finished program plus the register that
/// holds the value of the whole expression once the program has run.
#[derive(Debug)]
pub struct Lowered {
    pub program: Program,
    pub result_register: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenError {
    /// The expression needs more registers than the machine has.
    /// Registers are handed out linearly, one per leaf, and never
    /// reclaimed.
    OutOfRegisters,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::OutOfRegisters => write!(
                f,
                "the expression needs more than {} registers",
                REGISTER_COUNT
            ),
        }
    }
}

impl std::error::Error for CodegenError {}

/// Walk the tree post-order, emitting instructions as operands become
/// available.
///
/// A number leaf loads its value into a fresh register. A binary node
/// lowers its left child, then its right child, then emits the operation
/// in two-address form: the left operand's register is the destination,
/// mirroring the CPU's `dst := dst op src` contract. The right operand's
/// register is dead immediately afterwards but is not reclaimed.
pub fn lower(expr: &Expr) -> Result<Lowered, CodegenError> {
    let mut codegen = CodeGen {
        program: Program::new(),
        next_register: 0,
    };
    let result_register = codegen.lower_expr(expr)?;
    Ok(Lowered {
        program: codegen.program,
        result_register,
    })
}

struct CodeGen {
    program: Program,
    next_register: u8,
}

impl CodeGen {
    fn fresh_register(&mut self) -> Result<u8, CodegenError> {
        if self.next_register as usize >= REGISTER_COUNT {
            return Err(CodegenError::OutOfRegisters);
        }
        let register = self.next_register;
        self.next_register += 1;
        Ok(register)
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<u8, CodegenError> {
        match expr {
            Expr::Number(value) => {
                let register = self.fresh_register()?;
                self.program
                    .push(Instruction::load_const(register, *value));
                Ok(register)
            }
            Expr::BinaryOp { op, lhs, rhs } => {
                let lhs_register = self.lower_expr(lhs)?;
                let rhs_register = self.lower_expr(rhs)?;
                self.program.push(match op {
                    BinOp::Add => Instruction::add(lhs_register, rhs_register),
                    BinOp::Sub => Instruction::sub(lhs_register, rhs_register),
                    BinOp::Mul => Instruction::mul(lhs_register, rhs_register),
                    BinOp::Div => Instruction::div(lhs_register, rhs_register),
                });
                Ok(lhs_register)
            }
        }
    }
}
