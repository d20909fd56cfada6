//! # Ape execution core
//!
//! The bytecode compiler and stack virtual machine for the Ape language.
//! The surrounding pieces (lexer, parser, REPL) hand a parsed AST to the
//! compiler and inspect the value the machine leaves behind:
//!
//! ```
//! use ape::bytecode::Compiler;
//! use ape::lang::node::{Expression, Program, Statement};
//! use ape::lang::value::Value;
//! use ape::runtime::VM;
//!
//! // 1 + 2
//! let program = Program::new(vec![Statement::Expression(Expression::infix(
//!     "+",
//!     Expression::Integer(1),
//!     Expression::Integer(2),
//! ))]);
//!
//! let mut compiler = Compiler::new();
//! compiler.compile(&program)?;
//! let bytecode = compiler.bytecode();
//!
//! let mut vm = VM::new(&bytecode);
//! vm.run()?;
//! assert_eq!(vm.result(), Value::Integer(3));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bytecode;
pub mod lang;
pub mod runtime;
