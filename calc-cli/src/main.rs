use std::io::{self, BufRead, Write};

use calc_core::{
    alu::StatusFlag,
    codegen::{self, Lowered},
    cpu::{Cpu, ExecError},
    eval,
    ir::{Instruction, Program},
    memory::Memory,
    parser,
};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(author, version, about, long_about = None, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and run it on the virtual CPU
    Eval(EvalArgs),
    /// Read expressions from stdin, one line at a time
    Repl(ReplArgs),
    /// Run the hand-written demonstration programs
    Demos,
}

#[derive(Parser)]
struct EvalArgs {
    /// The infix expression to compile, e.g. "(3+4)*2"
    expression: String,
    /// Print the IR listing before running
    #[arg(long)]
    listing: bool,
    /// Print every executed instruction
    #[arg(long)]
    trace: bool,
}

#[derive(Parser)]
struct ReplArgs {
    /// Print every executed instruction
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval(args) => eval_line(&args.expression, args.listing, args.trace),
        Commands::Repl(args) => repl(args.trace),
        Commands::Demos => demos(),
    }
}

/// Run one line of input through the whole pipeline:
/// text -> tree -> IR -> CPU, cross-checked against the tree-walking
/// reference evaluator.
fn eval_line(text: &str, listing: bool, trace: bool) -> Result<(), String> {
    let expr = match parser::parse_expression(text) {
        Ok(expr) => expr,
        Err(parse_error) => {
            eprintln!("{}", parse_error.nice_message());
            return Err(parse_error.to_string());
        }
    };

    let Lowered {
        program,
        result_register,
    } = codegen::lower(&expr).map_err(|error| error.to_string())?;

    if listing {
        print_listing(&program);
    }

    let mut memory = Memory::new();
    let mut cpu = Cpu::with_memory(&mut memory);
    let result = execute(&mut cpu, &program, trace).map_err(|error| error.to_string())?;

    print_result(result_register, result, &cpu);
    cross_check(&expr, result);
    Ok(())
}

fn repl(trace: bool) -> Result<(), String> {
    let stdin = io::stdin();
    print_prompt();

    for line in stdin.lock().lines() {
        let line = line.map_err(|error| error.to_string())?;
        let text = line.trim();
        if !text.is_empty() {
            // Errors are recoverable here: report and read the next line.
            if let Err(message) = eval_line(text, false, trace) {
                eprintln!("{}", message.red());
            }
        }
        print_prompt();
    }

    println!();
    Ok(())
}

fn print_prompt() {
    print!("{} ", ">".cyan());
    let _ = io::stdout().flush();
}

fn execute(cpu: &mut Cpu, program: &Program, trace: bool) -> Result<u32, ExecError> {
    if !trace {
        return cpu.run(program);
    }
    cpu.run_with_callback(program, |cpu, pc, instruction| {
        println!(
            "{} {:<20} {}",
            format!("{:4}", pc).cyan(),
            instruction.to_string(),
            format!(
                "r{} = {:#010x}  [{}]",
                cpu.last_dst, cpu.registers[cpu.last_dst as usize], flags_text(cpu)
            )
            .dimmed()
        );
    })
}

fn flags_text(cpu: &Cpu) -> String {
    let flag = |set: bool, name: char| if set { name } else { '.' };
    format!(
        "{}{}{}{}",
        flag(cpu.status.is_set(StatusFlag::Negative), 'N'),
        flag(cpu.status.is_set(StatusFlag::Overflow), 'V'),
        flag(cpu.status.is_set(StatusFlag::Zero), 'Z'),
        flag(cpu.status.is_set(StatusFlag::Carry), 'C'),
    )
}

fn print_listing(program: &Program) {
    println!("{}", "Program listing:".bright_white());
    for line in program.to_string().lines() {
        println!("  {}", line);
    }
}

fn print_result(result_register: u8, result: u32, cpu: &Cpu) {
    // Show the signed reading too when bit 31 is set; it is only an
    // interpretation of the same word.
    let signed = result as i32;
    if signed < 0 {
        println!(
            "r{} = {} {}",
            result_register,
            result,
            format!("({} signed, {:#010x})", signed, result).dimmed()
        );
    } else {
        println!(
            "r{} = {} {}",
            result_register,
            result,
            format!("({:#010x})", result).dimmed()
        );
    }
    println!("flags: [{}]", flags_text(cpu));
}

fn cross_check(expr: &calc_core::ast::Expr, result: u32) {
    match eval::evaluate(expr) {
        // The reference walks the tree in host integers while the CPU
        // works modulo 2^32, so the comparison is modulo 2^32.
        Ok(reference) => {
            if reference as u32 == result {
                println!("{}", format!("cross-check ok (reference = {})", reference).green());
            } else {
                println!(
                    "{}",
                    format!(
                        "cross-check mismatch: reference = {} ({:#010x} mod 2^32)",
                        reference, reference as u32
                    )
                    .yellow()
                );
            }
        }
        Err(error) => println!("{}", format!("cross-check skipped: {}", error).yellow()),
    }
}

fn demos() -> Result<(), String> {
    println!("{}", "== Conditional select ==".bright_white());
    branch_select_demo(3, 3)?;
    branch_select_demo(3, 5)?;

    println!("{}", "== Countdown loop ==".bright_white());
    countdown_demo()?;

    println!("{}", "== Memory round-trip ==".bright_white());
    memory_round_trip_demo()?;
    Ok(())
}

/// Compare two constants and pick 42 on equality, 99 otherwise.
fn branch_select_demo(first: i64, second: i64) -> Result<(), String> {
    let program: Program = [
        Instruction::load_const(1, first),
        Instruction::load_const(2, second),
        Instruction::cmp(1, 2),
        Instruction::jz(6),
        Instruction::load_const(3, 99),
        Instruction::jmp(7),
        Instruction::load_const(3, 42),
    ]
    .into_iter()
    .collect();

    print_listing(&program);
    let mut cpu = Cpu::new();
    execute(&mut cpu, &program, true).map_err(|error| error.to_string())?;
    println!("{} vs {} -> r3 = {}\n", first, second, cpu.registers[3]);
    Ok(())
}

/// Subtract 1 from 5 until the Z flag stops the loop.
fn countdown_demo() -> Result<(), String> {
    let program: Program = [
        Instruction::load_const(0, 5),
        Instruction::load_const(1, 1),
        Instruction::sub(0, 1),
        Instruction::jnz(2),
    ]
    .into_iter()
    .collect();

    print_listing(&program);
    let mut cpu = Cpu::new();
    execute(&mut cpu, &program, true).map_err(|error| error.to_string())?;
    println!(
        "r0 = {} after {} steps\n",
        cpu.registers[0], cpu.step_count
    );
    Ok(())
}

/// Store a word at 0x200 and load it back.
fn memory_round_trip_demo() -> Result<(), String> {
    let program: Program = [
        Instruction::load_const(0, 0x200),
        Instruction::load_const(1, 0xDEAD_BEEF),
        Instruction::store(1, 0),
        Instruction::load(2, 0),
    ]
    .into_iter()
    .collect();

    print_listing(&program);
    let mut memory = Memory::new();
    let mut cpu = Cpu::with_memory(&mut memory);
    execute(&mut cpu, &program, true).map_err(|error| error.to_string())?;
    println!("r2 = {:#010x}\n", cpu.registers[2]);
    Ok(())
}
