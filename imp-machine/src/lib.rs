//! A small interpreter for the textual instruction set described in the
//! compiler's external interface (six registers `a`-`f`, byte-addressable
//! memory, `GET`/`PUT` I/O, and relative jumps).
//!
//! `GET x` and `PUT x` both treat `x` as a pointer: `GET x` writes the next
//! input value to the cell `x` addresses, `PUT x` prints the cell `x`
//! addresses. Neither touches `x` itself. This mirrors the source
//! compiler's own codegen, which always materializes an address in a
//! register before a `GET`/`PUT` rather than ever passing a bare value to
//! either.
//!
//! This crate has no connection to the compiler beyond the text format: it
//! parses the same assembly lines `imp-codegen` writes to a `.asm` file and
//! runs them. It exists purely so the compiler's own test suite can assert
//! "this emitted program, when executed, produces this output" instead of
//! only asserting on instruction-by-instruction shape.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Register {
    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = MachineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Register::A),
            "b" => Ok(Register::B),
            "c" => Ok(Register::C),
            "d" => Ok(Register::D),
            "e" => Ok(Register::E),
            "f" => Ok(Register::F),
            other => Err(MachineError::BadRegister(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Instr {
    Get(Register),
    Put(Register),
    Load(Register, Register),
    Store(Register, Register),
    Add(Register, Register),
    Sub(Register, Register),
    Reset(Register),
    Inc(Register),
    Dec(Register),
    Shr(Register),
    Shl(Register),
    Jump(i64),
    Jzero(Register, i64),
    Jodd(Register, i64),
    Halt,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MachineError {
    #[error("unknown register {0:?}")]
    BadRegister(String),
    #[error("unknown opcode {0:?}")]
    BadOpcode(String),
    #[error("malformed instruction {0:?}")]
    Malformed(String),
    #[error("jump target {0} out of range")]
    JumpOutOfRange(i64),
    #[error("program counter ran off the end of the program without HALT")]
    RanOffEnd,
    #[error("exceeded step budget of {0} instructions without halting")]
    StepBudgetExceeded(u64),
}

fn parse_program(source: &str) -> Result<Vec<Instr>, MachineError> {
    let mut instrs = Vec::new();
    for raw_line in source.lines() {
        let line = match raw_line.find('#') {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let opcode = parts.next().unwrap();
        let reg = |s: &str| s.parse::<Register>();
        let off = |s: &str| -> Result<i64, MachineError> {
            s.parse().map_err(|_| MachineError::Malformed(line.to_owned()))
        };

        let instr = match opcode {
            "GET" => Instr::Get(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "PUT" => Instr::Put(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "LOAD" => {
                let x = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                let y = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                Instr::Load(x, y)
            }
            "STORE" => {
                let x = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                let y = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                Instr::Store(x, y)
            }
            "ADD" => {
                let x = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                let y = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                Instr::Add(x, y)
            }
            "SUB" => {
                let x = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                let y = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                Instr::Sub(x, y)
            }
            "RESET" => Instr::Reset(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "INC" => Instr::Inc(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "DEC" => Instr::Dec(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "SHR" => Instr::Shr(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "SHL" => Instr::Shl(reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "JUMP" => Instr::Jump(off(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?),
            "JZERO" => {
                let x = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                let o = off(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                Instr::Jzero(x, o)
            }
            "JODD" => {
                let x = reg(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                let o = off(parts.next().ok_or_else(|| MachineError::Malformed(line.into()))?)?;
                Instr::Jodd(x, o)
            }
            "HALT" => Instr::Halt,
            other => return Err(MachineError::BadOpcode(other.to_owned())),
        };
        instrs.push(instr);
    }
    Ok(instrs)
}

#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub output: Vec<i64>,
    pub steps: u64,
}

/// Executes a textual program, feeding `inputs` to successive `GET`s in
/// order and collecting every `PUT` into `output`.
///
/// Stops at `HALT`. A generous but finite step budget guards against
/// accidentally-infinite loops in a buggy code generator turning a test run
/// into a hang.
pub fn run(source: &str, inputs: &[i64]) -> Result<RunResult, MachineError> {
    const STEP_BUDGET: u64 = 10_000_000;

    let program = parse_program(source)?;
    let mut registers = [0i64; 6];
    let mut memory: HashMap<i64, i64> = HashMap::new();
    let mut input_queue: VecDeque<i64> = inputs.iter().copied().collect();
    let mut output = Vec::new();

    let mut pc: i64 = 0;
    let mut steps = 0u64;

    loop {
        if steps >= STEP_BUDGET {
            return Err(MachineError::StepBudgetExceeded(STEP_BUDGET));
        }
        if pc < 0 || pc as usize >= program.len() {
            return Err(MachineError::RanOffEnd);
        }

        let instr = program[pc as usize];
        let mut next_pc = pc + 1;

        match instr {
            Instr::Get(x) => {
                let addr = registers[x.index()];
                memory.insert(addr, input_queue.pop_front().unwrap_or(0));
            }
            Instr::Put(x) => {
                let addr = registers[x.index()];
                output.push(*memory.get(&addr).unwrap_or(&0));
            }
            Instr::Load(x, y) => {
                let addr = registers[y.index()];
                registers[x.index()] = *memory.get(&addr).unwrap_or(&0);
            }
            Instr::Store(x, y) => {
                let addr = registers[y.index()];
                memory.insert(addr, registers[x.index()]);
            }
            Instr::Add(x, y) => {
                registers[x.index()] += registers[y.index()];
            }
            Instr::Sub(x, y) => {
                registers[x.index()] = (registers[x.index()] - registers[y.index()]).max(0);
            }
            Instr::Reset(x) => registers[x.index()] = 0,
            Instr::Inc(x) => registers[x.index()] += 1,
            Instr::Dec(x) => registers[x.index()] = (registers[x.index()] - 1).max(0),
            Instr::Shr(x) => registers[x.index()] /= 2,
            Instr::Shl(x) => registers[x.index()] *= 2,
            Instr::Jump(off) => {
                next_pc = pc + off;
            }
            Instr::Jzero(x, off) => {
                if registers[x.index()] == 0 {
                    next_pc = pc + off;
                }
            }
            Instr::Jodd(x, off) => {
                if registers[x.index()].rem_euclid(2) == 1 {
                    next_pc = pc + off;
                }
            }
            Instr::Halt => {
                return Ok(RunResult { output, steps });
            }
        }

        pc = next_pc;
        steps += 1;
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Register::A => 'a',
            Register::B => 'b',
            Register::C => 'c',
            Register::D => 'd',
            Register::E => 'e',
            Register::F => 'f',
        };
        write!(f, "{c}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn runs_a_trivial_write() {
        let src = "RESET a\nINC a\nINC a\nINC a\nINC a\nINC a\nRESET b\nINC b\nSTORE a b\nPUT b\nHALT";
        let result = run(src, &[]).unwrap();
        assert_eq!(result.output, vec![5]);
    }

    #[test]
    fn jzero_skips_forward() {
        let src = "RESET a\nJZERO a 3\nINC b\nJUMP 1\nHALT";
        let result = run(src, &[]).unwrap();
        assert_eq!(result.output, Vec::<i64>::new());
        assert!(result.steps < 10);
    }

    #[test]
    fn saturating_sub_never_goes_negative() {
        let src = "RESET a\nRESET b\nINC b\nINC b\nSUB a b\nHALT";
        // a = 0, b = 2, a - b should saturate at 0 rather than go negative.
        let result = run(src, &[]).unwrap();
        assert_eq!(result.output, Vec::<i64>::new());
        let _ = result;
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert_eq!(
            run("FROB a", &[]).unwrap_err(),
            MachineError::BadOpcode("FROB".to_owned())
        );
    }
}
