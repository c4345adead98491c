//! Completion records: `[value, error]`, abrupt when `error` is not
//! undefined.
//!
//! An abrupt completion leaves the current statement through one of three
//! exits: the nearest enclosing `catch` target, the function epilogue (after
//! unwinding the evaluation stack to its depth at function entry), or, in
//! module code, a machine fault.

use super::Helper;
use crate::compiler::bytecode::OpCode;
use crate::compiler::codegen::Compiler;
use crate::compiler::options::VisitOptions;
use crate::types::Tag;

impl Compiler {
    /// `[value] -> [completion]`
    pub(crate) fn emit_create_normal_completion(&mut self) {
        self.emit_tagged_constant(Tag::Undefined);
        self.asm.ops(&[OpCode::Swap, OpCode::Push2, OpCode::Pack]);
    }

    /// `[error] -> [completion]`
    pub(crate) fn emit_create_throw_completion(&mut self) {
        self.emit_tagged_constant(Tag::Undefined);
        self.asm.ops(&[OpCode::Push2, OpCode::Pack]);
    }

    /// `[completion] -> [value]`
    pub(crate) fn emit_handle_completion(&mut self, options: &VisitOptions) {
        let normal = self.asm.new_label();
        self.asm.op(OpCode::Dup);
        self.asm.ops(&[OpCode::Push1, OpCode::PickItem]);
        self.emit_is_tag(Tag::Undefined);
        self.asm.jump(OpCode::JmpIf, normal);
        self.emit_throw_completion(options);
        self.asm.mark(normal);
        self.asm.ops(&[OpCode::Push0, OpCode::PickItem]);
    }

    /// `[completion, ...] -> !`
    pub(crate) fn emit_throw_completion(&mut self, options: &VisitOptions) {
        if let Some(catch_pc) = options.catch_pc {
            self.asm.jump(OpCode::Jmp, catch_pc);
        } else if let Some(slot) = self.scope.entry_depth_slot() {
            self.emit_unwind(slot);
            self.emit_function_epilogue();
        } else {
            self.asm.op(OpCode::Throw);
        }
    }

    /// Drops everything between the completion on top and the stack depth
    /// saved in hidden slot `slot`.
    pub(crate) fn emit_unwind(&mut self, slot: usize) {
        let top = self.asm.new_label();
        let done = self.asm.new_label();
        self.asm.mark(top);
        self.asm.op(OpCode::Depth);
        self.emit_load_hidden(slot);
        self.asm.ops(&[OpCode::Inc, OpCode::Gt]);
        self.asm.jump(OpCode::JmpIfNot, done);
        self.asm.op(OpCode::Nip);
        self.asm.jump(OpCode::Jmp, top);
        self.asm.mark(done);
    }

    /// `[completion] -> return`
    pub(crate) fn emit_function_epilogue(&mut self) {
        self.asm
            .ops(&[OpCode::FromAltStack, OpCode::Drop, OpCode::Ret]);
    }

    /// `[value] -> !`: throws `value` as an exception.
    pub(crate) fn emit_throw_value(&mut self, options: &VisitOptions) {
        self.emit_helper(Helper::CreateThrowCompletion, &options.pushing());
        self.emit_helper(Helper::ThrowCompletion, options);
    }

    /// `[value] -> !`: throws a `TypeError`.
    pub(crate) fn emit_throw_type_error(&mut self, options: &VisitOptions) {
        self.asm.op(OpCode::Drop);
        self.emit_tagged_string("TypeError");
        self.emit_throw_value(options);
    }
}
