//! # Ape language data model
//!
//! The AST handed to the bytecode compiler and the runtime values the
//! virtual machine computes with, plus the registry of host builtins
//! shared by both.

pub mod builtins;
pub mod node;
pub mod value;
