//! The code generator core: walks a parsed [`Program`](imp_syntax::ast::Program)
//! and lowers it to register-machine assembly text.
//!
//! The driver ([`compile`]) runs in four stages, matching the data flow of
//! the system overview: size the iterator-slot region from the program's
//! maximum loop-nesting depth ([`preprocess`]), populate the symbol table
//! and allocate storage for every declaration, walk the command tree
//! emitting instructions through the [`buffer`], and finally append `HALT`
//! and resolve every label to a PC-relative offset.
//!
//! Diagnostics are collected rather than raised as soon as they occur
//! (§5/§7): the generator keeps walking the tree after the first error so
//! that a single compile reports as many problems as it can, and only the
//! caller decides whether to keep the emitted text (no diagnostics) or
//! discard it (one or more diagnostics).

pub mod buffer;
pub mod codegen;
pub mod diagnostics;
pub mod memory;
pub mod preprocess;
pub mod registers;
pub mod symtab;

use imp_syntax::ast::{Command, Condition, Declaration, Expr, Lvalue, Program, RelOp, Value};

use crate::buffer::{InstructionBuffer, Op};
use crate::codegen::{lvalue_target, Target};
pub use crate::diagnostics::Diagnostic;
use crate::memory::MemoryAllocator;
use crate::registers::{Reg, RegisterFile};
use crate::symtab::SymbolTable;

/// Lowers `program` to assembly text, or returns every diagnostic collected
/// while trying. Mirrors the CLI contract of §6: a non-empty diagnostic
/// list means no file should be written.
pub fn compile(program: &Program) -> Result<String, Vec<Diagnostic>> {
    let mut compiler = Compiler::new(program);
    compiler.emit_commands(&program.commands);
    if compiler.diagnostics.is_empty() {
        Ok(compiler.finish())
    } else {
        Err(compiler.diagnostics)
    }
}

pub struct Compiler {
    buffer: InstructionBuffer,
    regs: RegisterFile,
    symtab: SymbolTable,
    alloc: MemoryAllocator,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    fn new(program: &Program) -> Self {
        let capacity = preprocess::iterator_region_capacity(&program.commands);
        log::debug!("iterator region capacity: {capacity} cells");
        let mut compiler = Compiler {
            buffer: InstructionBuffer::new(),
            regs: RegisterFile::new(),
            symtab: SymbolTable::new(),
            alloc: MemoryAllocator::new(capacity),
            diagnostics: Vec::new(),
        };
        compiler.declare_all(&program.declarations);
        compiler
    }

    fn declare_all(&mut self, declarations: &[Declaration]) {
        for decl in declarations {
            match decl {
                Declaration::Scalar { name, line } => {
                    let address = self.alloc.allocate(1);
                    log::trace!("declare scalar `{name}` at cell {address}");
                    if let Err(d) = self.symtab.declare_scalar(name, *line, address) {
                        self.report(d);
                    }
                }
                Declaration::Array {
                    name,
                    lower,
                    upper,
                    line,
                } => {
                    let count = (*upper - *lower + 1).max(1);
                    let is_big = count > 1000;
                    let base = self.alloc.allocate(count);
                    log::trace!(
                        "declare array `{name}` [{lower}:{upper}] at base {base} (big={is_big})"
                    );
                    if let Err(d) = self
                        .symtab
                        .declare_array(name, *line, *lower, *upper, base, is_big)
                    {
                        self.report(d);
                    }
                }
            }
        }
    }

    /// Appends the trailing `HALT` and resolves every label, consuming the
    /// compiler. Callers must already have checked `self.diagnostics` is
    /// empty (see [`compile`]) before trusting the returned text.
    fn finish(mut self) -> String {
        self.buffer.emit(Op::Halt);
        let mut text = self.buffer.finalize().join("\n");
        text.push('\n');
        text
    }

    fn emit_commands(&mut self, commands: &[Command]) {
        for command in commands {
            self.emit_command(command);
        }
    }

    fn emit_command(&mut self, command: &Command) {
        match command {
            Command::Assign { lvalue, rvalue, line } => self.emit_assign(lvalue, rvalue, *line),
            Command::Read { lvalue, line } => self.emit_read(lvalue, *line),
            Command::Write { rvalue, line } => self.emit_write(rvalue, *line),
            Command::If {
                condition,
                then_body,
                line,
            } => self.emit_if(condition, then_body, *line),
            Command::IfElse {
                condition,
                then_body,
                else_body,
                line,
            } => self.emit_if_else(condition, then_body, else_body, *line),
            Command::While { condition, body, line } => self.emit_while(condition, body, *line),
            Command::Repeat { condition, body, line } => self.emit_repeat(condition, body, *line),
            Command::ForTo {
                iterator,
                from,
                to,
                body,
                line,
            } => self.emit_for_to(iterator, from, to, body, *line),
            Command::ForDownTo {
                iterator,
                from,
                downto,
                body,
                line,
            } => self.emit_for_downto(iterator, from, downto, body, *line),
        }
    }

    /// `ASSIGN lvalue, rvalue` (§4.5): evaluate the rvalue first, stash it
    /// out of the way in `B`, then compute the lvalue's address in `A` —
    /// the two must use disjoint registers since computing a scalar-indexed
    /// array address itself needs a scratch register (§5's "distinct
    /// registers" precondition).
    fn emit_assign(&mut self, lvalue: &Lvalue, rvalue: &Expr, _line: u32) {
        self.eval_expr(rvalue);
        self.copy_reg(Reg::B, Reg::A);
        let target = lvalue_target(lvalue);
        self.address_for_write(Reg::A, Reg::C, &target);
        self.buffer.emit(Op::Store(Reg::B, Reg::A));
    }

    /// `READ lvalue` (§4.5): compute the target address, then let the
    /// machine's `GET` write straight into it.
    fn emit_read(&mut self, lvalue: &Lvalue, _line: u32) {
        let target = lvalue_target(lvalue);
        self.address_for_write(Reg::A, Reg::C, &target);
        self.buffer.emit(Op::Get(Reg::A));
    }

    /// `WRITE value` (§4.5 and §9's preserved scratch convention): a
    /// literal or an arithmetic expression is materialized into a register
    /// and stored to cell 0 before printing it; a bare scalar or array read
    /// instead has its *address* computed directly, since the value is
    /// already resident in memory.
    fn emit_write(&mut self, rvalue: &Expr, line: u32) {
        match rvalue {
            Expr::Value(Value::Num(n)) => {
                self.load_immediate(Reg::A, *n);
                self.store_to_cell(Reg::A, Reg::B, 0);
                self.buffer.emit(Op::Put(Reg::B));
            }
            Expr::Value(value @ (Value::Scalar { .. } | Value::ArrayElement { .. })) => {
                let target = match value {
                    Value::Scalar { name, line } => Target::Scalar { name, line: *line },
                    Value::ArrayElement { name, index, line } => Target::ArrayElement {
                        name,
                        index,
                        line: *line,
                    },
                    Value::Num(_) => unreachable!(),
                };
                self.address_for_read(Reg::A, Reg::C, &target);
                self.buffer.emit(Op::Put(Reg::A));
            }
            Expr::Arith { .. } => {
                let _ = line;
                self.eval_expr(rvalue);
                self.store_to_cell(Reg::A, Reg::B, 0);
                self.buffer.emit(Op::Put(Reg::B));
            }
        }
    }

    /// `IF cond THEN body ENDIF` (§4.5).
    fn emit_if(&mut self, condition: &Condition, then_body: &[Command], _line: u32) {
        let end = self.buffer.new_label();
        self.eval_condition(condition);
        self.buffer.emit_jzero(Reg::A, end);
        self.emit_commands(then_body);
        self.buffer.put_label(end);
    }

    /// `IF cond THEN t ELSE e ENDIF` (§4.5).
    fn emit_if_else(
        &mut self,
        condition: &Condition,
        then_body: &[Command],
        else_body: &[Command],
        _line: u32,
    ) {
        let else_label = self.buffer.new_label();
        let end = self.buffer.new_label();
        self.eval_condition(condition);
        self.buffer.emit_jzero(Reg::A, else_label);
        self.emit_commands(then_body);
        self.buffer.emit_jump(end);
        self.buffer.put_label(else_label);
        self.emit_commands(else_body);
        self.buffer.put_label(end);
    }

    /// `WHILE cond DO body ENDWHILE` (§4.5): condition re-checked before
    /// every iteration, including the first.
    fn emit_while(&mut self, condition: &Condition, body: &[Command], _line: u32) {
        let top = self.buffer.new_label();
        let exit = self.buffer.new_label();
        self.buffer.put_label(top);
        self.eval_condition(condition);
        self.buffer.emit_jzero(Reg::A, exit);
        self.emit_commands(body);
        self.buffer.emit_jump(top);
        self.buffer.put_label(exit);
    }

    /// `REPEAT body UNTIL cond;` (§4.5): condition checked only after the
    /// body, so the body always runs at least once.
    fn emit_repeat(&mut self, condition: &Condition, body: &[Command], _line: u32) {
        let top = self.buffer.new_label();
        self.buffer.put_label(top);
        self.emit_commands(body);
        self.eval_condition(condition);
        self.buffer.emit_jzero(Reg::A, top);
    }

    /// `FOR i FROM a TO b DO body ENDFOR` (§4.5). `from`/`to` are evaluated
    /// and stashed before the iterator's name starts shadowing anything, so
    /// a loop reusing an outer variable's name in its own bounds still
    /// reads the outer value.
    fn emit_for_to(&mut self, iterator: &str, from: &Value, to: &Value, body: &[Command], line: u32) {
        self.eval_value(Reg::A, Reg::C, from);
        self.copy_reg(Reg::D, Reg::A);
        self.eval_value(Reg::A, Reg::C, to);
        self.copy_reg(Reg::E, Reg::A);

        let bound_addr = self.alloc.allocate_iterator();
        let iter_addr = self.alloc.allocate_iterator();
        self.store_to_cell(Reg::E, Reg::C, bound_addr);
        self.store_to_cell(Reg::D, Reg::C, iter_addr);
        self.symtab.introduce_iterator(iterator, line, iter_addr);

        let top = self.buffer.new_label();
        let exit = self.buffer.new_label();
        self.buffer.put_label(top);
        self.load_from_cell(Reg::A, Reg::C, iter_addr);
        self.load_from_cell(Reg::B, Reg::C, bound_addr);
        self.compare(RelOp::Leq, Reg::A, Reg::B, Reg::C);
        self.buffer.emit_jzero(Reg::A, exit);
        self.emit_commands(body);
        self.load_from_cell(Reg::A, Reg::C, iter_addr);
        self.buffer.emit(Op::Inc(Reg::A));
        self.store_to_cell(Reg::A, Reg::C, iter_addr);
        self.buffer.emit_jump(top);
        self.buffer.put_label(exit);

        self.retire_loop_iterator(iterator, bound_addr);
    }

    /// `FOR i FROM a DOWNTO b DO body ENDFOR` (§4.5). Cells are unsigned
    /// and subtraction saturates at zero, so the loop cannot simply
    /// decrement past `b` and compare — it instead pre-checks `a < b` to
    /// skip entirely, then runs the body once more than it decrements,
    /// checking `i != b` *before* each decrement and peeling off the final
    /// `i == b` iteration as its own block.
    fn emit_for_downto(
        &mut self,
        iterator: &str,
        from: &Value,
        downto: &Value,
        body: &[Command],
        line: u32,
    ) {
        self.eval_value(Reg::A, Reg::C, from);
        self.copy_reg(Reg::D, Reg::A);
        self.eval_value(Reg::A, Reg::C, downto);
        self.copy_reg(Reg::E, Reg::A);

        let bound_addr = self.alloc.allocate_iterator();
        let iter_addr = self.alloc.allocate_iterator();
        self.store_to_cell(Reg::E, Reg::C, bound_addr);
        self.store_to_cell(Reg::D, Reg::C, iter_addr);
        self.symtab.introduce_iterator(iterator, line, iter_addr);

        let exit = self.buffer.new_label();
        let last = self.buffer.new_label();
        let top = self.buffer.new_label();

        self.copy_reg(Reg::A, Reg::D);
        self.copy_reg(Reg::B, Reg::E);
        self.compare(RelOp::Lt, Reg::A, Reg::B, Reg::C);
        self.buffer.emit_jzero(Reg::A, top);
        self.buffer.emit_jump(exit);

        self.buffer.put_label(top);
        self.load_from_cell(Reg::A, Reg::C, iter_addr);
        self.load_from_cell(Reg::B, Reg::C, bound_addr);
        self.compare(RelOp::Neq, Reg::A, Reg::B, Reg::C);
        self.buffer.emit_jzero(Reg::A, last);
        self.emit_commands(body);
        self.load_from_cell(Reg::A, Reg::C, iter_addr);
        self.buffer.emit(Op::Dec(Reg::A));
        self.store_to_cell(Reg::A, Reg::C, iter_addr);
        self.buffer.emit_jump(top);

        self.buffer.put_label(last);
        self.emit_commands(body);

        self.retire_loop_iterator(iterator, bound_addr);
        self.buffer.put_label(exit);
    }

    fn retire_loop_iterator(&mut self, iterator: &str, bound_addr: i64) {
        if let Some(addr) = self.symtab.retire_iterator(iterator) {
            self.alloc.deallocate_iterator(addr);
        }
        self.alloc.deallocate_iterator(bound_addr);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use imp_syntax::parse;
    use pretty_assertions::assert_eq;

    fn compile_ok(src: &str) -> String {
        let program = parse(src).unwrap();
        compile(&program).unwrap()
    }

    #[test]
    fn emits_a_single_trailing_halt() {
        let asm = compile_ok("BEGIN WRITE 5; END");
        let lines: Vec<&str> = asm.lines().collect();
        assert_eq!(lines.last(), Some(&"HALT"));
        assert_eq!(lines.iter().filter(|l| **l == "HALT").count(), 1);
    }

    #[test]
    fn no_label_text_survives_into_the_output() {
        let asm = compile_ok("DECLARE i BEGIN FOR i FROM 1 TO 10 DO WRITE i; ENDFOR END");
        assert!(!asm.contains("LABEL"));
    }

    #[test]
    fn uninitialized_scalar_read_is_reported() {
        let program = parse("DECLARE x\nBEGIN WRITE x; END").unwrap();
        let diagnostics = compile(&program).unwrap_err();
        assert_eq!(
            diagnostics,
            vec![Diagnostic::UninitializedScalar {
                name: "x".into(),
                line: 2,
            }]
        );
    }

    #[test]
    fn redeclaration_is_reported_and_does_not_abort_the_rest_of_the_walk() {
        let program = parse("DECLARE x, x BEGIN x := 1; WRITE x; END").unwrap();
        let diagnostics = compile(&program).unwrap_err();
        assert_eq!(
            diagnostics,
            vec![Diagnostic::Redeclared {
                name: "x".into(),
                line: 1,
            }]
        );
    }

    #[test]
    fn iterator_cannot_be_assigned_inside_its_own_loop() {
        let src = "DECLARE i BEGIN FOR i FROM 1 TO 3 DO i := 1; ENDFOR END";
        let program = parse(src).unwrap();
        let diagnostics = compile(&program).unwrap_err();
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::IteratorAssignment { name, .. } if name == "i")));
    }

    #[test]
    fn array_index_out_of_bounds_is_reported() {
        let src = "DECLARE t(0:3) BEGIN t(4) := 1; END";
        let program = parse(src).unwrap();
        let diagnostics = compile(&program).unwrap_err();
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::IndexOutOfBounds { name, .. } if name == "t")));
    }
}
