//! Bytecode compiler for contract modules.
//!
//! Transforms a (transpiled) syntax tree into AVM instructions.
//!
//! # Module Structure
//!
//! - `bytecode`: opcode table, instruction encoding and decoding
//! - `codegen`: code generation from the syntax tree
//!   - `codegen::scope`: compile-time slot resolution
//! - `helpers`: reusable emission units with fixed stack contracts
//! - `options`: per-node visiting context
//! - `syscalls`: the interop services reachable from source

pub mod bytecode;
pub mod codegen;
pub mod helpers;
pub mod options;
pub mod syscalls;

pub use bytecode::{Instruction, OpCode, Operand};
pub use codegen::Compiler;
pub use helpers::Helper;
pub use options::VisitOptions;
