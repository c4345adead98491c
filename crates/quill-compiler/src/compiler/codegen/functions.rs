//! Function bodies: arrow functions and class members.
//!
//! Every body is entered with `[context, args]` on the stack and returns a
//! completion record. The prologue copies the context one level deep,
//! appends a fresh frame for the body, binds the parameters and records the
//! evaluation stack depth so an abrupt completion can unwind to it.

use super::{Compiler, FrameId};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::compiler::helpers::Helper;
use crate::compiler::options::VisitOptions;
use crate::types::Tag;
use crate::Result;

/// The body of something callable.
pub(crate) enum FunctionBody<'a> {
    /// `=> expression`
    Expression(&'a Expression),
    /// `{ statements }`
    Block(&'a [Statement]),
}

impl Compiler {
    /// Compiles an arrow function in place, jumping over its body, and
    /// pushes the function value.
    pub(crate) fn compile_arrow(
        &mut self,
        arrow: &ArrowFunctionExpression,
        options: &VisitOptions,
    ) -> Result<()> {
        let body_label = self.asm.new_label();
        let after = self.asm.new_label();
        let id = self.register_function(body_label);

        self.asm.jump(OpCode::Jmp, after);
        self.asm.mark(body_label);
        let this_type = self.scope.this_type();
        let body = match &arrow.body {
            ArrowBody::Expression(expr) => FunctionBody::Expression(expr),
            ArrowBody::Block(stmts) => FunctionBody::Block(stmts),
        };
        self.compile_function_body(&arrow.params, body, this_type, options.super_class.clone())?;
        self.asm.mark(after);

        if options.push_value {
            self.emit_push_all();
            self.emit_helper(Helper::CreateFunction(id), options);
        }
        Ok(())
    }

    /// Emits a complete body at the current position.
    pub(crate) fn compile_function_body(
        &mut self,
        params: &[Parameter],
        body: FunctionBody<'_>,
        this_type: Type,
        super_class: Option<String>,
    ) -> Result<()> {
        let frame = self.new_frame();
        self.scope.enter_function(frame, this_type);
        let finally_depth = std::mem::take(&mut self.finally_depth);
        let loop_finally = std::mem::take(&mut self.loop_finally);

        self.emit_function_prologue(frame, params)?;

        let options = VisitOptions::statement().with_super_class(super_class);
        match body {
            FunctionBody::Expression(expr) => {
                self.compile_expression(expr, &options.pushing())?;
            }
            FunctionBody::Block(stmts) => {
                for stmt in stmts {
                    self.compile_statement(stmt, &options)?;
                }
                self.emit_helper(Helper::PushUndefined, &options.pushing());
            }
        }
        self.emit_helper(Helper::CreateNormalCompletion, &options.pushing());
        self.emit_function_epilogue();

        self.finally_depth = finally_depth;
        self.loop_finally = loop_finally;
        if let Some((frame, size)) = self.scope.exit_function() {
            tracing::trace!("frame {} holds {} slots", frame.0, size);
            self.asm.set_frame_size(frame, size);
        }
        Ok(())
    }

    /// `[context, args] -> []`, with the callee context on the alt stack.
    fn emit_function_prologue(&mut self, frame: FrameId, params: &[Parameter]) -> Result<()> {
        let pushing = VisitOptions::default();

        // context' with frames' = frames + [new frame]
        self.emit_helper(Helper::CloneArray, &pushing);
        self.asm.ops(&[OpCode::Dup, OpCode::Push0, OpCode::PickItem]);
        self.emit_helper(Helper::CloneArray, &pushing);
        self.asm.op(OpCode::Dup);
        self.asm.push_frame_size(frame);
        self.asm.ops(&[OpCode::NewArray, OpCode::Append]);
        self.asm.ops(&[
            OpCode::Over,
            OpCode::Swap,
            OpCode::Push0,
            OpCode::Swap,
            OpCode::SetItem,
        ]);
        self.asm.op(OpCode::ToAltStack);

        // Everything above this depth belongs to the body.
        let entry_depth = self.scope.allocate_hidden();
        self.asm.ops(&[OpCode::Depth, OpCode::Dec]);
        self.emit_store_hidden(entry_depth);
        self.scope.set_entry_depth_slot(entry_depth);

        for (index, param) in params.iter().enumerate() {
            if param.rest {
                self.report(
                    crate::diagnostics::DiagnosticCode::UnsupportedSyntax,
                    format!("Unsupported syntax: rest parameter '{}'.", param.name.name),
                );
                continue;
            }
            let ty = param.ty.clone().unwrap_or(Type::Any);
            if self.scope.declare(&param.name.name, true, ty).is_none() {
                self.report(
                    crate::diagnostics::DiagnosticCode::UnsupportedSyntax,
                    format!("Duplicate parameter '{}'.", param.name.name),
                );
                continue;
            }

            self.emit_if_else(
                |c| {
                    c.asm.ops(&[OpCode::Dup, OpCode::ArraySize]);
                    c.asm.push_int(index);
                    c.asm.op(OpCode::Gt);
                },
                |c| {
                    c.asm.op(OpCode::Dup);
                    c.asm.push_int(index);
                    c.asm.op(OpCode::PickItem);
                },
                |c| c.emit_helper(Helper::PushUndefined, &pushing),
            );
            if let Some(init) = &param.init {
                let end = self.asm.new_label();
                self.asm.op(OpCode::Dup);
                self.emit_is_tag(Tag::Undefined);
                self.asm.jump(OpCode::JmpIfNot, end);
                self.asm.op(OpCode::Drop);
                self.compile_expression(init, &pushing)?;
                self.asm.mark(end);
            }
            self.scope.mark_initialized(&param.name.name);
            self.emit_set_variable(&param.name.name, true);
        }
        self.asm.op(OpCode::Drop);
        Ok(())
    }

    /// `[] -> [args]`: evaluates `arguments` in order into an array.
    pub(crate) fn compile_arguments(
        &mut self,
        arguments: &[Expression],
        options: &VisitOptions,
    ) -> Result<()> {
        let pushing = options.pushing();
        for argument in arguments {
            self.compile_expression(argument, &pushing)?;
        }
        self.asm.push_int(arguments.len());
        self.asm.op(OpCode::Pack);
        if arguments.len() > 1 {
            // PACK stores the last pushed item first.
            self.asm.ops(&[OpCode::Dup, OpCode::Reverse]);
        }
        Ok(())
    }
}
