//! # Ape runtime
//!
//! The stack-based virtual machine and its supporting pieces: the value
//! stack, call frames, and runtime errors. A [`vm::VM`] consumes one
//! compiled [`crate::bytecode::Bytecode`] artifact and exposes the value
//! of the last evaluated expression through [`vm::VM::result`].

pub mod frame;
pub mod runtime_error;
pub mod stack;
pub mod vm;

pub use runtime_error::RuntimeError;
pub use vm::VM;
