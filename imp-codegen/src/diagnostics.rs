//! The diagnostic kinds the code generator can raise while walking a
//! program. Each one carries the line number and, where relevant, the
//! identifier name involved, matching the `Error! line <n>` contract the
//! CLI renders to standard error.

use imp_syntax::ast::Line;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("undeclared variable `{name}`")]
    Undeclared { name: String, line: Line },

    #[error("variable `{name}` is already declared")]
    Redeclared { name: String, line: Line },

    #[error("variable `{name}` is read before it is initialized")]
    UninitializedScalar { name: String, line: Line },

    #[error("element `{name}` is read before it is initialized")]
    UninitializedArrayElement { name: String, line: Line },

    #[error("`{name}` is a scalar and cannot be indexed")]
    ScalarUsedWithIndex { name: String, line: Line },

    #[error("`{name}` is an array and must be indexed")]
    ArrayUsedWithoutIndex { name: String, line: Line },

    #[error("cannot assign to `{name}`, it is the iterator of an enclosing loop")]
    IteratorAssignment { name: String, line: Line },

    #[error("index out of declared bounds for `{name}`")]
    IndexOutOfBounds { name: String, line: Line },

    #[error("unknown operator")]
    UnknownOperator { line: Line },
}

impl Diagnostic {
    pub fn line(&self) -> Line {
        match self {
            Diagnostic::Undeclared { line, .. }
            | Diagnostic::Redeclared { line, .. }
            | Diagnostic::UninitializedScalar { line, .. }
            | Diagnostic::UninitializedArrayElement { line, .. }
            | Diagnostic::ScalarUsedWithIndex { line, .. }
            | Diagnostic::ArrayUsedWithoutIndex { line, .. }
            | Diagnostic::IteratorAssignment { line, .. }
            | Diagnostic::IndexOutOfBounds { line, .. }
            | Diagnostic::UnknownOperator { line } => *line,
        }
    }
}
