use thiserror::Error;

use crate::bytecode::op::OperationError;

/// Errors surfaced while compiling an AST.
///
/// Compilation is best-effort: the first error aborts the walk and no
/// bytecode is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// An infix or prefix operator the compiler has no instruction for.
    #[error("unknown operator {0}")]
    UnknownOperator(String),

    /// An identifier that resolves in no enclosing scope.
    #[error("Variable {0} is undefined")]
    UndefinedVariable(String),

    /// The constant pool is limited by the 2-byte operand of `Constant`.
    #[error("constant pool is full ({0} entries)")]
    TooManyConstants(usize),

    /// Instruction encoding failed.
    #[error(transparent)]
    Operation(#[from] OperationError),
}
