//! # Ape bytecode
//!
//! The instruction set, its binary encoding, and the single-pass compiler
//! that turns an AST into a [`compile::Bytecode`] artifact: a contiguous
//! instruction stream plus the constant pool it references.

pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod op;
pub mod symbols;

pub use compile::{Bytecode, Compiler};
pub use op::{Instructions, Opcode};
