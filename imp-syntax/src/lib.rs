//! Parsing front end for IMP source files.
//!
//! This crate is the "external collaborator" the code generator trusts: it
//! turns source text into the [`ast`] tree shape and does nothing else — no
//! semantic checks, no symbol table, no diagnostics beyond "this is not
//! valid IMP syntax". [`imp_codegen`](../imp_codegen/index.html) validates
//! everything else.

pub mod ast;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as DeriveParser;

pub use pest::error::Error as ParseError;

use ast::*;

#[derive(DeriveParser)]
#[grammar = "imp.pest"]
struct ImpParser;

pub type Result<T> = std::result::Result<T, Box<ParseError<Rule>>>;

/// Parses a complete IMP source file into a [`Program`].
pub fn parse(source: &str) -> Result<Program> {
    let mut pairs = ImpParser::parse(Rule::program, source).map_err(Box::new)?;
    let program_pair = pairs.next().expect("program rule always produces one pair");
    Ok(build_program(program_pair))
}

fn line_of(pair: &Pair<Rule>) -> Line {
    pair.as_span().start_pos().line_col().0 as Line
}

fn build_program(pair: Pair<Rule>) -> Program {
    debug_assert_eq!(pair.as_rule(), Rule::program);
    let mut declarations = Vec::new();
    let mut commands = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::declarations => declarations = build_declarations(inner),
            Rule::commands => commands = build_commands(inner),
            Rule::EOI => {}
            _ => unreachable!("unexpected top-level rule {:?}", inner.as_rule()),
        }
    }

    Program {
        declarations,
        commands,
    }
}

fn build_declarations(pair: Pair<Rule>) -> Vec<Declaration> {
    pair.into_inner().map(build_declaration).collect()
}

fn build_declaration(pair: Pair<Rule>) -> Declaration {
    debug_assert_eq!(pair.as_rule(), Rule::declaration);
    let inner = pair.into_inner().next().unwrap();
    let line = line_of(&inner);

    match inner.as_rule() {
        Rule::scalar_decl => {
            let name = inner.into_inner().next().unwrap().as_str().to_owned();
            Declaration::Scalar { name, line }
        }
        Rule::array_decl => {
            let mut parts = inner.into_inner();
            let name = parts.next().unwrap().as_str().to_owned();
            let lower = parse_num(parts.next().unwrap());
            let upper = parse_num(parts.next().unwrap());
            Declaration::Array {
                name,
                lower,
                upper,
                line,
            }
        }
        _ => unreachable!(),
    }
}

fn build_commands(pair: Pair<Rule>) -> Vec<Command> {
    pair.into_inner().map(build_command).collect()
}

fn build_command(pair: Pair<Rule>) -> Command {
    debug_assert_eq!(pair.as_rule(), Rule::command);
    let inner = pair.into_inner().next().unwrap();
    let line = line_of(&inner);

    match inner.as_rule() {
        Rule::assign_cmd => {
            let mut parts = inner.into_inner();
            let lvalue = build_accessor_as_lvalue(parts.next().unwrap());
            let rvalue = build_expression(parts.next().unwrap());
            Command::Assign {
                lvalue,
                rvalue,
                line,
            }
        }
        Rule::read_cmd => {
            let lvalue = build_accessor_as_lvalue(inner.into_inner().next().unwrap());
            Command::Read { lvalue, line }
        }
        Rule::write_cmd => {
            let rvalue = build_expression(inner.into_inner().next().unwrap());
            Command::Write { rvalue, line }
        }
        Rule::if_cmd => build_if(inner, line),
        Rule::while_cmd => {
            let mut parts = inner.into_inner();
            let condition = build_condition(parts.next().unwrap());
            let body = build_commands(parts.next().unwrap());
            Command::While {
                condition,
                body,
                line,
            }
        }
        Rule::repeat_cmd => {
            let mut parts = inner.into_inner();
            let body = build_commands(parts.next().unwrap());
            let condition = build_condition(parts.next().unwrap());
            Command::Repeat {
                condition,
                body,
                line,
            }
        }
        Rule::for_to_cmd => {
            let mut parts = inner.into_inner();
            let iterator = parts.next().unwrap().as_str().to_owned();
            let from = build_value(parts.next().unwrap());
            let to = build_value(parts.next().unwrap());
            let body = build_commands(parts.next().unwrap());
            Command::ForTo {
                iterator,
                from,
                to,
                body,
                line,
            }
        }
        Rule::for_downto_cmd => {
            let mut parts = inner.into_inner();
            let iterator = parts.next().unwrap().as_str().to_owned();
            let from = build_value(parts.next().unwrap());
            let downto = build_value(parts.next().unwrap());
            let body = build_commands(parts.next().unwrap());
            Command::ForDownTo {
                iterator,
                from,
                downto,
                body,
                line,
            }
        }
        _ => unreachable!("unexpected command rule {:?}", inner.as_rule()),
    }
}

fn build_if(pair: Pair<Rule>, line: Line) -> Command {
    let mut parts = pair.into_inner();
    let condition = build_condition(parts.next().unwrap());
    let then_body = build_commands(parts.next().unwrap());
    match parts.next() {
        Some(else_commands) => {
            let else_body = build_commands(else_commands);
            Command::IfElse {
                condition,
                then_body,
                else_body,
                line,
            }
        }
        None => Command::If {
            condition,
            then_body,
            line,
        },
    }
}

fn build_condition(pair: Pair<Rule>) -> Condition {
    debug_assert_eq!(pair.as_rule(), Rule::condition);
    let line = line_of(&pair);
    let mut parts = pair.into_inner();
    let left = build_value(parts.next().unwrap());
    let op = build_rel_op(parts.next().unwrap());
    let right = build_value(parts.next().unwrap());
    Condition {
        op,
        left,
        right,
        line,
    }
}

fn build_rel_op(pair: Pair<Rule>) -> RelOp {
    match pair.as_str() {
        "=" => RelOp::Eq,
        "!=" => RelOp::Neq,
        "<" => RelOp::Lt,
        ">" => RelOp::Gt,
        "<=" => RelOp::Leq,
        ">=" => RelOp::Geq,
        other => unreachable!("unknown relational operator {other:?}"),
    }
}

fn build_expression(pair: Pair<Rule>) -> Expr {
    debug_assert_eq!(pair.as_rule(), Rule::expression);
    let line = line_of(&pair);
    let mut parts = pair.into_inner();
    let left = build_value(parts.next().unwrap());
    match parts.next() {
        None => Expr::Value(left),
        Some(op_pair) => {
            let op = build_arith_op(op_pair);
            let right = build_value(parts.next().unwrap());
            Expr::Arith {
                op,
                left,
                right,
                line,
            }
        }
    }
}

fn build_arith_op(pair: Pair<Rule>) -> ArithOp {
    match pair.as_str() {
        "+" => ArithOp::Add,
        "-" => ArithOp::Sub,
        "*" => ArithOp::Mul,
        "/" => ArithOp::Div,
        "%" => ArithOp::Mod,
        other => unreachable!("unknown arithmetic operator {other:?}"),
    }
}

fn build_value(pair: Pair<Rule>) -> Value {
    debug_assert_eq!(pair.as_rule(), Rule::value);
    let inner = pair.into_inner().next().unwrap();
    let line = line_of(&inner);

    match inner.as_rule() {
        Rule::num => Value::Num(parse_num(inner)),
        Rule::accessor => build_accessor_as_value(inner, line),
        _ => unreachable!(),
    }
}

fn build_accessor_as_value(pair: Pair<Rule>, line: Line) -> Value {
    let mut parts = pair.into_inner();
    let name = parts.next().unwrap().as_str().to_owned();
    match parts.next() {
        None => Value::Scalar { name, line },
        Some(index_pair) => {
            let index = build_index(index_pair);
            Value::ArrayElement { name, index, line }
        }
    }
}

fn build_accessor_as_lvalue(pair: Pair<Rule>) -> Lvalue {
    let line = line_of(&pair);
    let mut parts = pair.into_inner();
    let name = parts.next().unwrap().as_str().to_owned();
    match parts.next() {
        None => Lvalue::Scalar { name, line },
        Some(index_pair) => {
            let index = build_index(index_pair);
            Lvalue::ArrayElement { name, index, line }
        }
    }
}

fn build_index(pair: Pair<Rule>) -> Index {
    debug_assert_eq!(pair.as_rule(), Rule::index);
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::num => Index::Literal(parse_num(inner)),
        Rule::identifier => Index::Scalar {
            name: inner.as_str().to_owned(),
            line: line_of(&inner),
        },
        _ => unreachable!(),
    }
}

fn parse_num(pair: Pair<Rule>) -> i64 {
    pair.as_str()
        .parse()
        .expect("num rule only matches ASCII digits")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_hello_world() {
        let program = parse("BEGIN WRITE 5; END").unwrap();
        assert!(program.declarations.is_empty());
        assert_eq!(
            program.commands,
            vec![Command::Write {
                rvalue: Expr::Value(Value::Num(5)),
                line: 1,
            }]
        );
    }

    #[test]
    fn parses_declarations_and_array_access() {
        let program = parse("DECLARE t(0:3) BEGIN t(0):=7; WRITE t(0); END").unwrap();
        assert_eq!(
            program.declarations,
            vec![Declaration::Array {
                name: "t".into(),
                lower: 0,
                upper: 3,
                line: 1,
            }]
        );
        assert_eq!(program.commands.len(), 2);
    }

    #[test]
    fn parses_nested_for_loops() {
        let src = "DECLARE i BEGIN FOR i FROM 1 TO 10 DO WRITE i; ENDFOR END";
        let program = parse(src).unwrap();
        match &program.commands[0] {
            Command::ForTo {
                iterator, from, to, ..
            } => {
                assert_eq!(iterator, "i");
                assert_eq!(*from, Value::Num(1));
                assert_eq!(*to, Value::Num(10));
            }
            other => panic!("expected FOR_TO, got {other:?}"),
        }
    }

    #[test]
    fn comments_are_ignored() {
        let src = "BEGIN [ this is a comment ] WRITE 1; END";
        assert!(parse(src).is_ok());
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let src = "BEGIN\nWRITE 1;\nWRITE 2;\nEND";
        let program = parse(src).unwrap();
        let lines: Vec<Line> = program
            .commands
            .iter()
            .map(|c| match c {
                Command::Write { line, .. } => *line,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn rejects_malformed_source() {
        assert!(parse("BEGIN WRITE ; END").is_err());
    }
}
