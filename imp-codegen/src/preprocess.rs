//! Sizes the iterator-slot memory region before declarations are realized.
//!
//! Walks every command body — not only the bodies of `FOR`/`FOR DOWNTO`,
//! but also `IF`/`IF_ELSE`/`WHILE`/`REPEAT` bodies that might themselves
//! contain counted loops — and returns the true maximum nesting depth of
//! counted loops anywhere in the program. Each counted loop needs two
//! slots (the iterator and its bound), so the iterator region is sized to
//! `2 * (1 + maxDepth)` cells once any counted loop exists at all, and `0`
//! cells when the program has none.

use imp_syntax::ast::Command;

pub fn max_for_depth(commands: &[Command]) -> usize {
    commands.iter().map(command_for_depth).max().unwrap_or(0)
}

fn command_for_depth(cmd: &Command) -> usize {
    match cmd {
        Command::Assign { .. } | Command::Read { .. } | Command::Write { .. } => 0,
        Command::If { then_body, .. } => max_for_depth(then_body),
        Command::IfElse {
            then_body,
            else_body,
            ..
        } => max_for_depth(then_body).max(max_for_depth(else_body)),
        Command::While { body, .. } | Command::Repeat { body, .. } => max_for_depth(body),
        Command::ForTo { body, .. } | Command::ForDownTo { body, .. } => 1 + max_for_depth(body),
    }
}

/// `K` from §3: `2 * (1 + maxDepth)` cells when at least one counted loop
/// is present anywhere in the program, `0` otherwise.
pub fn iterator_region_capacity(commands: &[Command]) -> i64 {
    if !has_any_for_loop(commands) {
        return 0;
    }
    2 * (1 + max_for_depth(commands) as i64)
}

fn has_any_for_loop(commands: &[Command]) -> bool {
    commands.iter().any(|c| match c {
        Command::Assign { .. } | Command::Read { .. } | Command::Write { .. } => false,
        Command::If { then_body, .. } => has_any_for_loop(then_body),
        Command::IfElse {
            then_body,
            else_body,
            ..
        } => has_any_for_loop(then_body) || has_any_for_loop(else_body),
        Command::While { body, .. } | Command::Repeat { body, .. } => has_any_for_loop(body),
        Command::ForTo { .. } | Command::ForDownTo { .. } => true,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use imp_syntax::ast::{Expr, Value};

    fn write(line: u32) -> Command {
        Command::Write {
            rvalue: Expr::Value(Value::Num(1)),
            line,
        }
    }

    fn for_to(body: Vec<Command>) -> Command {
        Command::ForTo {
            iterator: "i".into(),
            from: Value::Num(1),
            to: Value::Num(1),
            body,
            line: 1,
        }
    }

    #[test]
    fn no_loops_means_zero_capacity() {
        assert_eq!(iterator_region_capacity(&[write(1)]), 0);
    }

    #[test]
    fn a_single_loop_needs_two_slots() {
        let prog = vec![for_to(vec![write(2)])];
        assert_eq!(iterator_region_capacity(&prog), 2);
    }

    #[test]
    fn nested_loops_are_measured_by_max_depth_not_sum() {
        let inner = for_to(vec![write(3)]);
        let middle = for_to(vec![inner]);
        let outer = for_to(vec![middle]);
        assert_eq!(max_for_depth(&[outer]), 3);
    }

    #[test]
    fn sibling_loops_do_not_add_depth() {
        let first = for_to(vec![write(2)]);
        let second = for_to(vec![write(3)]);
        assert_eq!(max_for_depth(&[first, second]), 1);
    }

    #[test]
    fn depth_is_found_through_if_and_while_bodies() {
        let nested_for = for_to(vec![write(5)]);
        let inside_if = Command::If {
            condition: imp_syntax::ast::Condition {
                op: imp_syntax::ast::RelOp::Eq,
                left: Value::Num(1),
                right: Value::Num(1),
                line: 1,
            },
            then_body: vec![nested_for],
            line: 1,
        };
        assert_eq!(max_for_depth(&[inside_if]), 1);
    }
}
