//! The append-only instruction buffer and its two-pass label resolution.
//!
//! While the generator is walking the tree, jump targets are not yet known
//! — a `WHILE`'s exit label is placed only after its body has been emitted.
//! So every jump instruction here references a [`LabelId`] rather than a
//! concrete offset, and a separate [`Line::Mark`] records where a label
//! actually lands. [`InstructionBuffer::finalize`] turns that into the
//! machine's real textual form in exactly two passes: first compute every
//! label's resolved program-counter, then rewrite each jump's label
//! reference into a signed offset relative to the jump itself.

use std::fmt;

use crate::registers::Reg;

pub type LabelId = usize;

#[derive(Debug, Clone, Copy)]
pub enum Op {
    Get(Reg),
    Put(Reg),
    Load(Reg, Reg),
    Store(Reg, Reg),
    Add(Reg, Reg),
    Sub(Reg, Reg),
    Reset(Reg),
    /// Same instruction as [`Op::Reset`], annotated with the immediate
    /// value the following `INC`/`SHL` sequence is about to build. Mirrors
    /// `machine_instructions.py`'s `reset(x, debug=...)` call in
    /// `generate_value` — purely a trace aid, never read back by anything
    /// in this workspace.
    ResetForImmediate(Reg, i64),
    Inc(Reg),
    Dec(Reg),
    Shr(Reg),
    Shl(Reg),
    Jump(LabelId),
    Jzero(Reg, LabelId),
    Jodd(Reg, LabelId),
    Halt,
}

enum Line {
    Instr(Op),
    Mark(LabelId),
}

/// Append-only sequence of instructions and label placeholders.
pub struct InstructionBuffer {
    lines: Vec<Line>,
    next_label: LabelId,
}

impl InstructionBuffer {
    pub fn new() -> Self {
        InstructionBuffer {
            lines: Vec::new(),
            next_label: 0,
        }
    }

    /// Returns a fresh symbolic label. It refers to nothing until a
    /// matching [`put_label`](Self::put_label) call fixes its position.
    pub fn new_label(&mut self) -> LabelId {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    pub fn put_label(&mut self, label: LabelId) {
        self.lines.push(Line::Mark(label));
    }

    pub fn emit(&mut self, op: Op) {
        self.lines.push(Line::Instr(op));
    }

    pub fn emit_jump(&mut self, label: LabelId) {
        self.emit(Op::Jump(label));
    }

    pub fn emit_jzero(&mut self, r: Reg, label: LabelId) {
        self.emit(Op::Jzero(r, label));
    }

    pub fn emit_jodd(&mut self, r: Reg, label: LabelId) {
        self.emit(Op::Jodd(r, label));
    }

    /// Resolves every label to a PC-relative offset and renders the final
    /// textual program, one instruction per line. The caller is
    /// responsible for having emitted a trailing `HALT` beforehand.
    pub fn finalize(&self) -> Vec<String> {
        let mut positions = vec![0usize; self.next_label];
        let mut pc = 0usize;
        for line in &self.lines {
            match line {
                Line::Instr(_) => pc += 1,
                Line::Mark(id) => positions[*id] = pc,
            }
        }

        let mut out = Vec::with_capacity(pc);
        let mut pc = 0i64;
        for line in &self.lines {
            if let Line::Instr(op) = line {
                out.push(render(op, pc, &positions));
                pc += 1;
            }
        }
        out
    }
}

fn render(op: &Op, pc: i64, positions: &[usize]) -> String {
    let offset = |label: LabelId| positions[label] as i64 - pc;
    match op {
        Op::Get(x) => format!("GET {x}"),
        Op::Put(x) => format!("PUT {x}"),
        Op::Load(x, y) => format!("LOAD {x} {y}"),
        Op::Store(x, y) => format!("STORE {x} {y}"),
        Op::Add(x, y) => format!("ADD {x} {y}"),
        Op::Sub(x, y) => format!("SUB {x} {y}"),
        Op::Reset(x) => format!("RESET {x}"),
        Op::ResetForImmediate(x, value) => {
            if log::log_enabled!(log::Level::Trace) {
                format!("RESET {x} # generating {value}")
            } else {
                format!("RESET {x}")
            }
        }
        Op::Inc(x) => format!("INC {x}"),
        Op::Dec(x) => format!("DEC {x}"),
        Op::Shr(x) => format!("SHR {x}"),
        Op::Shl(x) => format!("SHL {x}"),
        Op::Jump(l) => format!("JUMP {}", offset(*l)),
        Op::Jzero(x, l) => format!("JZERO {x} {}", offset(*l)),
        Op::Jodd(x, l) => format!("JODD {x} {}", offset(*l)),
        Op::Halt => "HALT".to_owned(),
    }
}

impl fmt::Debug for InstructionBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionBuffer")
            .field("len", &self.lines.len())
            .field("labels", &self.next_label)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_a_forward_jump() {
        let mut buf = InstructionBuffer::new();
        let exit = buf.new_label();
        buf.emit(Op::Reset(Reg::A));
        buf.emit_jzero(Reg::A, exit);
        buf.emit(Op::Inc(Reg::B));
        buf.put_label(exit);
        buf.emit(Op::Halt);

        let lines = buf.finalize();
        assert_eq!(lines, vec!["RESET a", "JZERO a 2", "INC b", "HALT"]);
    }

    #[test]
    fn resolves_a_backward_jump() {
        let mut buf = InstructionBuffer::new();
        let top = buf.new_label();
        buf.put_label(top);
        buf.emit(Op::Dec(Reg::A));
        buf.emit_jump(top);
        buf.emit(Op::Halt);

        let lines = buf.finalize();
        assert_eq!(lines, vec!["DEC a", "JUMP -1", "HALT"]);
    }

    #[test]
    fn immediate_annotation_is_silent_without_trace_logging() {
        let mut buf = InstructionBuffer::new();
        buf.emit(Op::ResetForImmediate(Reg::A, 42));
        buf.emit(Op::Halt);

        let lines = buf.finalize();
        assert_eq!(lines, vec!["RESET a", "HALT"]);
    }
}
