//! Expression, condition and address-computation primitives.
//!
//! Register use here is static and by convention, per §5: `A` and `B` hold
//! the two operands of whatever binary operation is in flight, `C`–`F` are
//! scratch. Nothing survives across statements in a register — every
//! statement emitter starts from a clean slate and reloads from memory
//! whatever it needs, so the same small register set is reused everywhere
//! without a allocator.

use imp_syntax::ast::{ArithOp, Condition, Index, RelOp, Value};

use crate::buffer::Op;
use crate::diagnostics::Diagnostic;
use crate::registers::Reg;
use crate::symtab::Descriptor;
use crate::Compiler;

/// What a `Value`/`Lvalue` ultimately names: either a bare scalar, or an
/// array indexed by either a literal or another scalar.
pub(crate) enum Target<'a> {
    Scalar { name: &'a str, line: u32 },
    ArrayElement {
        name: &'a str,
        index: &'a Index,
        line: u32,
    },
}

pub(crate) fn lvalue_target(lv: &imp_syntax::ast::Lvalue) -> Target<'_> {
    use imp_syntax::ast::Lvalue;
    match lv {
        Lvalue::Scalar { name, line } => Target::Scalar { name, line: *line },
        Lvalue::ArrayElement { name, index, line } => Target::ArrayElement {
            name,
            index,
            line: *line,
        },
    }
}

impl Compiler {
    pub(crate) fn report(&mut self, d: Diagnostic) {
        self.diagnostics.push(d);
    }

    /// `r <- mem[address]`, using `addr_reg` to hold the address.
    pub(crate) fn load_from_cell(&mut self, r: Reg, addr_reg: Reg, address: i64) {
        self.load_immediate(addr_reg, address);
        self.buffer.emit(Op::Load(r, addr_reg));
        self.regs.clobber(r);
    }

    /// `mem[address] <- r`, using `addr_reg` to hold the address.
    pub(crate) fn store_to_cell(&mut self, r: Reg, addr_reg: Reg, address: i64) {
        self.load_immediate(addr_reg, address);
        self.buffer.emit(Op::Store(r, addr_reg));
    }

    /// Loads the non-negative immediate `v` into `r` without touching
    /// memory: a `RESET`, then one `INC` for the leading bit and a
    /// `SHL`+optional-`INC` pair for every bit after it.
    pub(crate) fn load_immediate(&mut self, r: Reg, v: i64) {
        self.buffer.emit(Op::ResetForImmediate(r, v));
        self.regs.note_reset(r);
        if v <= 0 {
            return;
        }
        let v_u = v as u64;
        let msb = 63 - v_u.leading_zeros() as i64;
        self.buffer.emit(Op::Inc(r));
        for bit in (0..msb).rev() {
            self.buffer.emit(Op::Shl(r));
            if (v_u >> bit) & 1 == 1 {
                self.buffer.emit(Op::Inc(r));
            }
        }
        self.regs.note_constant(r, v);
    }

    /// `dst <- src`, leaving `src` untouched.
    pub(crate) fn copy_reg(&mut self, dst: Reg, src: Reg) {
        self.buffer.emit(Op::Reset(dst));
        self.buffer.emit(Op::Add(dst, src));
        self.regs.clobber(dst);
    }

    /// Resolves `target`'s address into `r`, using `scratch` for the
    /// scalar-indexed case. Reports undeclared/type-mismatch diagnostics
    /// and, for a literal array index, the out-of-bounds diagnostic.
    /// Initialization is neither checked nor marked here — callers decide
    /// that based on whether this is a read or a write.
    fn resolve_address(&mut self, r: Reg, scratch: Reg, target: &Target) {
        match target {
            Target::Scalar { name, line } => match self.symtab.lookup(name, *line) {
                Ok(Descriptor::Scalar { address, .. }) => self.load_immediate(r, address),
                Ok(Descriptor::Array { .. }) => {
                    self.report(Diagnostic::ArrayUsedWithoutIndex {
                        name: (*name).to_owned(),
                        line: *line,
                    });
                    self.load_immediate(r, 0);
                }
                Err(d) => {
                    self.report(d);
                    self.load_immediate(r, 0);
                }
            },
            Target::ArrayElement { name, index, line } => {
                let (lower, base) = match self.symtab.lookup(name, *line) {
                    Ok(Descriptor::Array { lower, base, .. }) => (*lower, *base),
                    Ok(Descriptor::Scalar { .. }) => {
                        self.report(Diagnostic::ScalarUsedWithIndex {
                            name: (*name).to_owned(),
                            line: *line,
                        });
                        (0, 0)
                    }
                    Err(d) => {
                        self.report(d);
                        (0, 0)
                    }
                };
                match index {
                    Index::Literal(i) => {
                        if let Err(d) = self.symtab.bounds_check(name, *i, *line) {
                            self.report(d);
                        }
                        self.load_immediate(r, base + (i - lower));
                    }
                    Index::Scalar {
                        name: idx_name,
                        line: idx_line,
                    } => {
                        let idx_address = match self.symtab.lookup(idx_name, *idx_line) {
                            Ok(Descriptor::Scalar {
                                address,
                                initialized,
                                ..
                            }) => {
                                if !*initialized {
                                    self.report(Diagnostic::UninitializedScalar {
                                        name: idx_name.clone(),
                                        line: *idx_line,
                                    });
                                }
                                *address
                            }
                            Ok(Descriptor::Array { .. }) => {
                                self.report(Diagnostic::ArrayUsedWithoutIndex {
                                    name: idx_name.clone(),
                                    line: *idx_line,
                                });
                                0
                            }
                            Err(d) => {
                                self.report(d);
                                0
                            }
                        };
                        self.load_immediate(scratch, lower);
                        self.load_immediate(r, idx_address);
                        self.buffer.emit(Op::Load(r, r));
                        self.buffer.emit(Op::Sub(r, scratch));
                        self.regs.clobber(r);
                        self.load_immediate(scratch, base);
                        self.buffer.emit(Op::Add(scratch, r));
                        self.regs.clobber(scratch);
                        self.copy_reg(r, scratch);
                        // The index is only known at runtime, so every
                        // element might be the one being touched.
                        self.symtab.mark_array_fully_initialized(name);
                    }
                }
            }
        }
    }

    /// Computes `target`'s address into `r` for a read, reporting
    /// uninitialized-value diagnostics along the way.
    pub(crate) fn address_for_read(&mut self, r: Reg, scratch: Reg, target: &Target) {
        match target {
            Target::Scalar { name, line } => {
                if let Ok(Descriptor::Scalar { initialized, .. }) = self.symtab.lookup(name, *line) {
                    if !*initialized {
                        self.report(Diagnostic::UninitializedScalar {
                            name: (*name).to_owned(),
                            line: *line,
                        });
                    }
                }
                self.resolve_address(r, scratch, target);
            }
            Target::ArrayElement { name, index, line } => {
                if let Index::Literal(i) = index {
                    if !self.symtab.is_array_element_initialized(name, *i) {
                        self.report(Diagnostic::UninitializedArrayElement {
                            name: (*name).to_owned(),
                            line: *line,
                        });
                    }
                }
                self.resolve_address(r, scratch, target);
            }
        }
    }

    /// Computes `target`'s address into `r` for a write, marking the
    /// element (or, for iterators, rejecting the assignment outright)
    /// initialized.
    pub(crate) fn address_for_write(&mut self, r: Reg, scratch: Reg, target: &Target) {
        if let Target::Scalar { name, line } = target {
            if self.symtab.is_iterator(name) {
                self.report(Diagnostic::IteratorAssignment {
                    name: (*name).to_owned(),
                    line: *line,
                });
            }
        }
        self.resolve_address(r, scratch, target);
        match target {
            Target::Scalar { name, .. } => self.symtab.mark_scalar_initialized(name),
            Target::ArrayElement { name, index, .. } => {
                if let Index::Literal(i) = index {
                    self.symtab.mark_array_element_initialized(name, *i);
                }
            }
        }
    }

    /// Loads `value` into `r`, validating and dereferencing through
    /// memory where needed. `scratch` is used only for array elements
    /// with a scalar index.
    pub(crate) fn eval_value(&mut self, r: Reg, scratch: Reg, value: &Value) {
        match value {
            Value::Num(n) => self.load_immediate(r, *n),
            Value::Scalar { name, line } => {
                let target = Target::Scalar { name, line: *line };
                self.address_for_read(r, scratch, &target);
                self.buffer.emit(Op::Load(r, r));
                self.regs.clobber(r);
            }
            Value::ArrayElement { name, index, line } => {
                let target = Target::ArrayElement {
                    name,
                    index,
                    line: *line,
                };
                self.address_for_read(r, scratch, &target);
                self.buffer.emit(Op::Load(r, r));
                self.regs.clobber(r);
            }
        }
    }

    /// Evaluates an arithmetic expression, leaving the result in `A`.
    pub(crate) fn eval_expr(&mut self, expr: &imp_syntax::ast::Expr) {
        use imp_syntax::ast::Expr;
        match expr {
            Expr::Value(v) => self.eval_value(Reg::A, Reg::C, v),
            Expr::Arith { op, left, right, .. } => match op {
                ArithOp::Add => {
                    self.eval_value(Reg::A, Reg::C, left);
                    self.eval_value(Reg::B, Reg::C, right);
                    self.buffer.emit(Op::Add(Reg::A, Reg::B));
                    self.regs.clobber(Reg::A);
                }
                ArithOp::Sub => {
                    self.eval_value(Reg::A, Reg::C, left);
                    self.eval_value(Reg::B, Reg::C, right);
                    self.buffer.emit(Op::Sub(Reg::A, Reg::B));
                    self.regs.clobber(Reg::A);
                }
                ArithOp::Mul => self.eval_mul(left, right),
                ArithOp::Div => self.eval_div_mod(left, right, true),
                ArithOp::Mod => self.eval_div_mod(left, right, false),
            },
        }
    }

    /// Shift-and-add multiplication (§4.4). When both operands are
    /// literals, the generator may swap them so the register that gets
    /// shifted down to zero starts out no larger than the other — this is
    /// the one peephole spec.md allows.
    fn eval_mul(&mut self, left: &Value, right: &Value) {
        let (left, right) = match (left, right) {
            (Value::Num(l), Value::Num(r)) if r > l => (right, left),
            _ => (left, right),
        };

        self.eval_value(Reg::A, Reg::C, left);
        self.eval_value(Reg::B, Reg::C, right);
        self.buffer.emit(Op::Reset(Reg::D)); // accumulator

        let top = self.buffer.new_label();
        let exit = self.buffer.new_label();
        let add = self.buffer.new_label();
        let skip_add = self.buffer.new_label();

        self.buffer.put_label(top);
        self.buffer.emit_jzero(Reg::B, exit);
        self.buffer.emit_jodd(Reg::B, add);
        self.buffer.emit_jump(skip_add);
        self.buffer.put_label(add);
        self.buffer.emit(Op::Add(Reg::D, Reg::A));
        self.buffer.put_label(skip_add);
        self.buffer.emit(Op::Shr(Reg::B));
        self.buffer.emit(Op::Shl(Reg::A));
        self.buffer.emit_jump(top);
        self.buffer.put_label(exit);

        self.copy_reg(Reg::A, Reg::D);
    }

    /// Division and modulo share one routine: restoring-style division by
    /// repeated doubling of the divisor, then repeated halving while
    /// conditionally subtracting (§4.4). `want_quotient` selects which of
    /// the two results is copied into `A` at the end; the other is
    /// discarded, matching "`%` invokes the divide routine with the
    /// remainder register as the result".
    fn eval_div_mod(&mut self, left: &Value, right: &Value, want_quotient: bool) {
        self.eval_value(Reg::A, Reg::C, left); // dividend
        self.eval_value(Reg::B, Reg::C, right); // divisor

        let remainder = Reg::C;
        let quotient = Reg::D;
        let power = Reg::E;
        let step = Reg::F;

        self.copy_reg(remainder, Reg::A);
        self.buffer.emit(Op::Reset(quotient));

        let zero_divisor = self.buffer.new_label();
        let done = self.buffer.new_label();
        self.buffer.emit_jzero(Reg::B, zero_divisor);

        self.copy_reg(power, Reg::B);
        self.load_immediate(step, 1);

        let grow_top = self.buffer.new_label();
        let grow_exit = self.buffer.new_label();
        let grow_do = self.buffer.new_label();
        self.buffer.put_label(grow_top);
        // grow while power <= remainder, i.e. while NOT (power > remainder)
        self.copy_reg(Reg::A, power);
        self.buffer.emit(Op::Sub(Reg::A, remainder));
        self.buffer.emit_jzero(Reg::A, grow_do);
        self.buffer.emit_jump(grow_exit);
        self.buffer.put_label(grow_do);
        self.buffer.emit(Op::Shl(power));
        self.buffer.emit(Op::Shl(step));
        self.buffer.emit_jump(grow_top);
        self.buffer.put_label(grow_exit);

        let reduce_top = self.buffer.new_label();
        let reduce_exit = self.buffer.new_label();
        let subtract = self.buffer.new_label();
        let no_subtract = self.buffer.new_label();
        self.buffer.put_label(reduce_top);
        self.buffer.emit_jzero(step, reduce_exit);
        self.copy_reg(Reg::A, power);
        self.buffer.emit(Op::Sub(Reg::A, remainder));
        self.buffer.emit_jzero(Reg::A, subtract);
        self.buffer.emit_jump(no_subtract);
        self.buffer.put_label(subtract);
        self.buffer.emit(Op::Sub(remainder, power));
        self.buffer.emit(Op::Add(quotient, step));
        self.buffer.put_label(no_subtract);
        self.buffer.emit(Op::Shr(power));
        self.buffer.emit(Op::Shr(step));
        self.buffer.emit_jump(reduce_top);
        self.buffer.put_label(reduce_exit);
        self.buffer.emit_jump(done);

        self.buffer.put_label(zero_divisor);
        self.buffer.emit(Op::Reset(quotient));
        self.buffer.emit(Op::Reset(remainder));

        self.buffer.put_label(done);
        let result = if want_quotient { quotient } else { remainder };
        self.copy_reg(Reg::A, result);
    }

    /// Evaluates `condition`, leaving a boolean (non-zero iff true) in
    /// `A`, ready for a caller's `JZERO A, exit`.
    pub(crate) fn eval_condition(&mut self, condition: &Condition) {
        self.eval_value(Reg::A, Reg::C, &condition.left);
        self.eval_value(Reg::B, Reg::C, &condition.right);
        self.compare(condition.op, Reg::A, Reg::B, Reg::C);
    }

    pub(crate) fn compare(&mut self, op: RelOp, a: Reg, b: Reg, scratch: Reg) {
        match op {
            RelOp::Gt => {
                self.buffer.emit(Op::Sub(a, b));
            }
            RelOp::Lt => {
                self.buffer.emit(Op::Sub(b, a));
                self.copy_reg(a, b);
            }
            RelOp::Geq => {
                self.buffer.emit(Op::Inc(a));
                self.buffer.emit(Op::Sub(a, b));
            }
            RelOp::Leq => {
                self.buffer.emit(Op::Inc(b));
                self.buffer.emit(Op::Sub(b, a));
                self.copy_reg(a, b);
            }
            RelOp::Eq => {
                let skip = self.buffer.new_label();
                self.copy_reg(scratch, a);
                self.buffer.emit(Op::Inc(scratch));
                self.buffer.emit(Op::Sub(scratch, b)); // scratch = (a >= b)
                self.buffer.emit(Op::Inc(b));
                self.buffer.emit(Op::Sub(b, a)); // b = (b >= a)
                self.buffer.emit(Op::Reset(a));
                self.buffer.emit_jzero(scratch, skip);
                self.buffer.emit_jzero(b, skip);
                self.buffer.emit(Op::Inc(a));
                self.buffer.put_label(skip);
            }
            RelOp::Neq => {
                self.copy_reg(scratch, b);
                self.buffer.emit(Op::Sub(scratch, a)); // scratch = b - a
                self.buffer.emit(Op::Sub(a, b)); // a = a - b
                self.buffer.emit(Op::Add(a, scratch)); // a = |a - b|
            }
        }
        self.regs.clobber(a);
        self.regs.clobber(b);
        self.regs.clobber(scratch);
    }
}
