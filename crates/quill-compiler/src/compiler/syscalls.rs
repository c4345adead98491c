//! The interop services compiled code can reach.
//!
//! Source code invokes a service as `syscall('<name>', ...args)`. Each
//! service declares how its arguments are lowered from tagged values to the
//! raw items the host expects, and how its raw result is lifted back.

use super::bytecode::OpCode;
use super::codegen::Compiler;
use super::helpers::Helper;
use super::options::VisitOptions;
use crate::ast::Expression;
use crate::diagnostics::DiagnosticCode;
use crate::types::Tag;
use crate::Result;

/// Name of the pseudo-function that introduces a syscall.
pub const SYSCALL_FUNCTION: &str = "syscall";

/// How an argument is handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallArg {
    /// A storage context, passed through untouched
    Context,
    /// The payload of a tagged string or buffer
    Bytes,
    /// Any tagged value, serialized to bytes
    Serialized,
    /// Any tagged value, as is
    Value,
}

/// What the host leaves on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallResult {
    /// Nothing
    None,
    /// A storage context
    Context,
    /// Raw bytes, surfaced as a tagged string
    Bytes,
    /// Serialized bytes of a tagged value; empty means `undefined`
    Deserialized,
    /// A tagged value
    Value,
}

/// One interop service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallSignature {
    /// Service name as written in source and in the SYSCALL operand
    pub name: &'static str,
    /// Arguments in source order
    pub args: &'static [SyscallArg],
    /// Result handling
    pub result: SyscallResult,
}

/// `Neo.Storage.GetContext`
pub const GET_CONTEXT: &str = "Neo.Storage.GetContext";
/// `Neo.Storage.Get`
pub const STORAGE_GET: &str = "Neo.Storage.Get";
/// `Neo.Storage.Put`
pub const STORAGE_PUT: &str = "Neo.Storage.Put";
/// `Neo.Storage.Delete`
pub const STORAGE_DELETE: &str = "Neo.Storage.Delete";
/// `Neo.Runtime.Serialize`
pub const SERIALIZE: &str = "Neo.Runtime.Serialize";
/// `Neo.Runtime.Deserialize`
pub const DESERIALIZE: &str = "Neo.Runtime.Deserialize";
/// `Neo.Runtime.Log`
pub const LOG: &str = "Neo.Runtime.Log";

/// Every service the compiler knows.
pub const SYSCALLS: &[SyscallSignature] = &[
    SyscallSignature {
        name: GET_CONTEXT,
        args: &[],
        result: SyscallResult::Context,
    },
    SyscallSignature {
        name: STORAGE_GET,
        args: &[SyscallArg::Context, SyscallArg::Bytes],
        result: SyscallResult::Deserialized,
    },
    SyscallSignature {
        name: STORAGE_PUT,
        args: &[SyscallArg::Context, SyscallArg::Bytes, SyscallArg::Serialized],
        result: SyscallResult::None,
    },
    SyscallSignature {
        name: STORAGE_DELETE,
        args: &[SyscallArg::Context, SyscallArg::Bytes],
        result: SyscallResult::None,
    },
    SyscallSignature {
        name: SERIALIZE,
        args: &[SyscallArg::Value],
        result: SyscallResult::Bytes,
    },
    SyscallSignature {
        name: DESERIALIZE,
        args: &[SyscallArg::Bytes],
        result: SyscallResult::Value,
    },
    SyscallSignature {
        name: LOG,
        args: &[SyscallArg::Bytes],
        result: SyscallResult::None,
    },
];

/// Looks up a service by name.
pub fn lookup(name: &str) -> Option<&'static SyscallSignature> {
    SYSCALLS.iter().find(|signature| signature.name == name)
}

/// The service name of a `syscall('<name>', ...)` call, if `callee` and
/// `arguments` have that shape.
pub fn syscall_name<'a>(callee: &Expression, arguments: &'a [Expression]) -> Option<&'a str> {
    match (callee, arguments.first()) {
        (
            Expression::Identifier(id),
            Some(Expression::Literal(crate::ast::Literal::String(name))),
        ) if id.name == SYSCALL_FUNCTION => Some(name),
        _ => None,
    }
}

impl Compiler {
    /// Compiles `syscall('<name>', ...args)`; `arguments` excludes the name.
    pub(crate) fn compile_syscall(
        &mut self,
        name: &str,
        arguments: &[Expression],
        options: &VisitOptions,
    ) -> Result<()> {
        self.emit_syscall(name, arguments, false, options)
    }

    fn emit_syscall(
        &mut self,
        name: &str,
        arguments: &[Expression],
        raw: bool,
        options: &VisitOptions,
    ) -> Result<()> {
        let Some(signature) = lookup(name) else {
            self.report(
                DiagnosticCode::UnsupportedSyntax,
                format!("Unknown syscall '{}'.", name),
            );
            self.emit_unsupported_value(options);
            return Ok(());
        };
        if signature.args.len() != arguments.len() {
            self.report(
                DiagnosticCode::UnsupportedSyntax,
                format!(
                    "Syscall '{}' expects {} arguments, got {}.",
                    name,
                    signature.args.len(),
                    arguments.len()
                ),
            );
            self.emit_unsupported_value(options);
            return Ok(());
        }

        for (kind, argument) in signature.args.iter().zip(arguments) {
            self.emit_syscall_argument(*kind, argument, options)?;
        }
        // The host pops the first argument first.
        match arguments.len() {
            0 | 1 => {}
            2 => self.asm.op(OpCode::Swap),
            _ => self.asm.ops(&[OpCode::Swap, OpCode::Rot]),
        }
        self.asm.syscall(signature.name);

        match signature.result {
            SyscallResult::None => {
                if options.push_value {
                    self.emit_helper(Helper::PushUndefined, options);
                }
            }
            SyscallResult::Context if raw => {}
            SyscallResult::Context => self.emit_helper(Helper::Wrap(Tag::Object), options),
            SyscallResult::Bytes => self.emit_helper(Helper::Wrap(Tag::String), options),
            SyscallResult::Value => {
                if !options.push_value {
                    self.asm.op(OpCode::Drop);
                }
            }
            SyscallResult::Deserialized => self.emit_deserialize_stored(options),
        }
        Ok(())
    }

    fn emit_syscall_argument(
        &mut self,
        kind: SyscallArg,
        argument: &Expression,
        options: &VisitOptions,
    ) -> Result<()> {
        let pushing = options.pushing();
        match kind {
            SyscallArg::Context => match argument {
                Expression::Call(call) => match syscall_name(&call.callee, &call.arguments) {
                    Some(GET_CONTEXT) => {
                        return self.emit_syscall(GET_CONTEXT, &call.arguments[1..], true, &pushing);
                    }
                    _ => {
                        self.compile_expression(argument, &pushing)?;
                        self.emit_helper(Helper::Unwrap, &pushing);
                    }
                },
                _ => {
                    self.compile_expression(argument, &pushing)?;
                    self.emit_helper(Helper::Unwrap, &pushing);
                }
            },
            SyscallArg::Bytes => {
                self.compile_expression(argument, &pushing)?;
                self.emit_helper(Helper::Unwrap, &pushing);
            }
            SyscallArg::Serialized => {
                self.compile_expression(argument, &pushing)?;
                self.asm.syscall(SERIALIZE);
            }
            SyscallArg::Value => self.compile_expression(argument, &pushing)?,
        }
        Ok(())
    }

    /// `[raw bytes] -> [value]`
    fn emit_deserialize_stored(&mut self, options: &VisitOptions) {
        let cast = options.cast.as_ref().and_then(|ty| ty.static_tag());
        let pushing = options.pushing();
        self.emit_if_else(
            |c| c.asm.ops(&[OpCode::Dup, OpCode::Size]),
            |c| {
                c.asm.syscall(DESERIALIZE);
                if let Some(tag) = cast {
                    c.emit_if(
                        |c| {
                            c.asm.op(OpCode::Dup);
                            c.emit_is_tag(tag);
                            c.asm.op(OpCode::Not);
                        },
                        |c| c.emit_throw_type_error(&pushing),
                    );
                }
            },
            |c| {
                c.asm.op(OpCode::Drop);
                c.emit_helper(Helper::PushUndefined, &pushing);
            },
        );
        if !options.push_value {
            self.asm.op(OpCode::Drop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;

    #[test]
    fn test_lookup_known_services() {
        let put = lookup(STORAGE_PUT).unwrap();
        assert_eq!(put.args.len(), 3);
        assert_eq!(put.result, SyscallResult::None);
        assert_eq!(lookup(GET_CONTEXT).unwrap().result, SyscallResult::Context);
        assert!(lookup("Neo.Blockchain.GetHeight").is_none());
    }

    #[test]
    fn test_syscall_name_requires_string_literal() {
        let args = vec![build::string(LOG), build::string("hello")];
        assert_eq!(syscall_name(&build::ident("syscall"), &args), Some(LOG));
        assert_eq!(syscall_name(&build::ident("other"), &args), None);
        let dynamic = vec![build::ident("name")];
        assert_eq!(syscall_name(&build::ident("syscall"), &dynamic), None);
    }
}
