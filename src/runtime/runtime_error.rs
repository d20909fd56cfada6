use thiserror::Error;

/// Errors surfaced while the virtual machine executes bytecode.
///
/// Any of these aborts `run`; the machine is not safe to resume after a
/// failure. Messages are human-readable and matched by substring in
/// tests, they carry no machine codes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("frame overflow")]
    FrameOverflow,

    #[error("frame underflow")]
    FrameUnderflow,

    #[error("Undefined Opcode: {0}")]
    UndefinedOpcode(u8),

    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes {
        left: &'static str,
        right: &'static str,
    },

    #[error("unknown integer operator: {0}")]
    UnknownIntegerOperator(u8),

    #[error("unknown operator: {op} ({left} {right})")]
    UnknownOperator {
        op: u8,
        left: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    UnsupportedIndex(&'static str),

    #[error("calling non-function")]
    CallingNonFunction,

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("not a function: {0}")]
    NotAFunction(&'static str),

    // Builtin argument errors, phrased the way the builtins report them.
    #[error("wrong number of arguments. got={got}, want={want}")]
    BuiltinArity { got: usize, want: usize },

    #[error("argument to `{builtin}` not supported, got {got}")]
    BuiltinArgument {
        builtin: &'static str,
        got: &'static str,
    },

    #[error("argument to `{builtin}` must be ARRAY, got {got}")]
    BuiltinArrayArgument {
        builtin: &'static str,
        got: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_vm_messages() {
        assert_eq!(
            RuntimeError::UnsupportedBinaryTypes {
                left: "STRING",
                right: "INTEGER",
            }
            .to_string(),
            "unsupported types for binary operation: STRING INTEGER"
        );
        assert_eq!(
            RuntimeError::WrongArity {
                expected: 2,
                got: 3,
            }
            .to_string(),
            "wrong number of arguments: expected 2, got 3"
        );
        assert_eq!(RuntimeError::StackOverflow.to_string(), "stack overflow");
        assert_eq!(
            RuntimeError::UndefinedOpcode(99).to_string(),
            "Undefined Opcode: 99"
        );
    }
}
