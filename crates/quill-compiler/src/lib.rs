// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # quill-compiler
//!
//! A compiler from a typed, object-oriented source subset to NEO AVM
//! bytecode.
//!
//! ## Overview
//!
//! This crate provides the whole back end of a smart contract toolchain:
//! - A syntax tree for the supported source subset
//! - A transpiler that turns contract classes into deployable form
//! - A bytecode compiler emitting AVM instructions
//! - A disassembler for compiled scripts
//! - A reference VM that runs compiled contracts against in-memory storage
//!
//! ## Quick Start
//!
//! ```rust
//! use quill_compiler::ast::build::*;
//! use quill_compiler::ast::Type;
//! use quill_compiler::{compile, CompileOptions};
//!
//! let module = program(vec![let_("x", Some(Type::Number), Some(num(1)))]);
//! let output = compile(&module, &CompileOptions::default()).unwrap();
//! assert!(!output.script.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod disassembler;
pub mod transpile;
pub mod types;
pub mod vm;

#[cfg(feature = "parallel")]
pub mod parallel;

pub use compiler::bytecode::{DecodeError, EncodeError, Instruction, OpCode};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity, Span};
pub use vm::{ExecutionEngine, StackItem, VmConfig, VmError};

use ast::Program;
use compiler::Compiler;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use transpile::Transpiler;

/// Compilation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Reject a second `deploy` call through a storage flag
    pub guard_deploy: bool,
    /// Name of the class every smart contract derives from
    pub contract_base: String,
    /// Diagnostics kept per module before the rest are dropped
    pub max_diagnostics: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            guard_deploy: true,
            contract_base: "SmartContract".to_string(),
            max_diagnostics: 100,
        }
    }
}

/// A compiled module.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The encoded script
    pub script: Vec<u8>,
    /// The instructions the script encodes
    pub instructions: Vec<Instruction>,
    /// Warnings reported along the way
    pub diagnostics: Vec<Diagnostic>,
    /// Methods the contract entry point dispatches on; empty for a module
    /// without a contract
    pub entry_points: Vec<String>,
}

/// Compiles a module: transpiles contract classes, generates code and
/// encodes it.
///
/// Any error diagnostic, from either pass, fails the whole module with
/// [`Error::Diagnostics`].
pub fn compile(program: &Program, options: &CompileOptions) -> Result<CompileOutput> {
    tracing::debug!("compiling module of {} statements", program.body.len());
    let mut transpiler = Transpiler::new(options);
    let transpiled = transpiler.transpile(program);

    let mut compiler = Compiler::new(options.clone());
    compiler.extend_diagnostics(transpiler.into_diagnostics());
    compiler.compile(&transpiled)?;
    let entry_points = compiler.entry_points().to_vec();
    let (instructions, diagnostics) = compiler.finish()?;
    let script = crate::compiler::bytecode::encode(&instructions)?;
    tracing::info!(
        "compiled {} instructions into {} bytes",
        instructions.len(),
        script.len()
    );
    Ok(CompileOutput {
        script,
        instructions,
        diagnostics,
        entry_points,
    })
}

/// Errors that stop compilation or execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The module has error diagnostics
    #[error("{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// A construct that passed checking has no code generator
    #[error("no compiler for {0}")]
    NoCompiler(&'static str),
    /// A jump too far for a 16-bit offset
    #[error("jump from {from} to {to} does not fit a 16-bit offset")]
    JumpOutOfRange {
        /// Address of the jump
        from: u32,
        /// Address of its target
        to: u32,
    },
    /// A jump to a label that was never placed
    #[error("unresolved label {0}")]
    UnresolvedLabel(usize),
    /// Bytecode could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Instructions could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Execution faulted
    #[error("execution faulted: {0}")]
    Vm(#[from] VmError),
    /// Internal compiler error
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let mut out = format!("compilation failed with {} error(s)", errors);
    for diagnostic in diagnostics {
        out.push_str("\n  ");
        out.push_str(&diagnostic.to_string());
    }
    out
}

/// Result alias for compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{BinaryOperator, ClassMember, Type};

    #[test]
    fn test_compile_produces_decodable_script() {
        let module = program(vec![let_("x", Some(Type::Number), Some(num(41)))]);
        let output = compile(&module, &CompileOptions::default()).unwrap();
        assert_eq!(output.instructions.last().map(|i| i.opcode), Some(OpCode::Ret));
        let listing = disassembler::disassemble(&output.script).unwrap();
        assert_eq!(listing.len(), output.instructions.len());
    }

    #[test]
    fn test_output_lists_entry_points() {
        let module = program(vec![class(
            "Token",
            Some("SmartContract"),
            vec![method(
                "add",
                vec![param("a", Some(Type::Number)), param("b", Some(Type::Number))],
                Some(Type::Number),
                vec![ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))],
            )],
        )]);
        let output = compile(&module, &CompileOptions::default()).unwrap();
        assert_eq!(output.entry_points, ["add", "deploy"]);

        let plain = program(vec![let_("x", Some(Type::Number), Some(num(1)))]);
        let output = compile(&plain, &CompileOptions::default()).unwrap();
        assert!(output.entry_points.is_empty());
    }

    #[test]
    fn test_transpiler_diagnostics_fail_compilation() {
        let module = program(vec![class(
            "Token",
            Some("SmartContract"),
            vec![ClassMember::Property(property("owner", None, None))],
        )]);
        match compile(&module, &CompileOptions::default()) {
            Err(Error::Diagnostics(diagnostics)) => {
                assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::UnknownType));
            }
            other => panic!("expected diagnostics, got {:?}", other.map(|o| o.script)),
        }
    }

    #[test]
    fn test_diagnostics_error_lists_every_report() {
        let error = Error::Diagnostics(vec![
            Diagnostic::error(DiagnosticCode::UnknownIdentifier, "Unknown identifier 'a'.", Span::default()),
            Diagnostic::error(DiagnosticCode::UnknownIdentifier, "Unknown identifier 'b'.", Span::default()),
        ]);
        let text = error.to_string();
        assert!(text.starts_with("compilation failed with 2 error(s)"));
        assert!(text.contains("'a'") && text.contains("'b'"));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompileOptions = serde_json::from_str(r#"{"guard_deploy": false}"#).unwrap();
        assert!(!options.guard_deploy);
        assert_eq!(options.contract_base, "SmartContract");
    }
}
