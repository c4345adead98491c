//! Function values, invocation and object property access.

use super::Helper;
use crate::compiler::bytecode::OpCode;
use crate::compiler::codegen::{Compiler, Label};
use crate::compiler::options::VisitOptions;
use crate::types::Tag;

/// Internal property of a function object: `[context, function id]`.
pub const CALL_PROPERTY: &str = "call";

/// Internal property of the global object holding the invocation arguments.
pub const ARGUMENTS_PROPERTY: &str = "arguments";

impl Compiler {
    /// `[context] -> [context']`
    ///
    /// Copies the context, its frames array and every frame in it. A frame
    /// copied here is shared by every later call of the capturing function,
    /// so the function sees its own writes but never the enclosing code's.
    pub(crate) fn emit_clone_frames(&mut self) {
        let top = self.asm.new_label();
        let done = self.asm.new_label();

        // context' and frames'
        self.asm.ops(&[
            OpCode::Unpack,
            OpCode::Pack,
            OpCode::Dup,
            OpCode::Push0,
            OpCode::PickItem,
            OpCode::Unpack,
            OpCode::Pack,
        ]);
        // context'[0] = frames'
        self.asm.ops(&[
            OpCode::Over,
            OpCode::Push0,
            OpCode::Push2,
            OpCode::Pick,
            OpCode::SetItem,
        ]);
        // [i, frames', context'], counting down
        self.asm.ops(&[OpCode::Dup, OpCode::ArraySize]);
        self.asm.mark(top);
        self.asm.op(OpCode::Dup);
        self.asm.jump(OpCode::JmpIfNot, done);
        self.asm.ops(&[
            OpCode::Dec,
            OpCode::Over,
            OpCode::Over,
            OpCode::PickItem,
            OpCode::Unpack,
            OpCode::Pack,
            OpCode::Push2,
            OpCode::Pick,
            OpCode::Push2,
            OpCode::Pick,
            OpCode::Rot,
            OpCode::SetItem,
        ]);
        self.asm.jump(OpCode::Jmp, top);
        self.asm.mark(done);
        self.asm.ops(&[OpCode::Drop, OpCode::Drop]);
    }

    /// `[context] -> [function]`
    pub(crate) fn emit_create_function(&mut self, id: usize) {
        self.asm.push_int(id);
        self.asm.ops(&[OpCode::Swap, OpCode::Push2, OpCode::Pack]);
        // [map, map, [context, id]] -> map.call = [context, id]
        self.asm.ops(&[OpCode::NewMap, OpCode::Dup, OpCode::Rot]);
        self.asm.push_string(CALL_PROPERTY);
        self.asm.ops(&[OpCode::Swap, OpCode::SetItem]);
        self.emit_wrap(Tag::Object);
    }

    /// `[args, function] -> [completion]`
    pub(crate) fn emit_invoke_function(&mut self, options: &VisitOptions) {
        let options = options.pushing();
        self.asm.op(OpCode::Swap);
        self.emit_if(
            |c| {
                c.asm.op(OpCode::Dup);
                c.emit_is_tag(Tag::Object);
                c.asm.op(OpCode::Not);
            },
            |c| c.emit_throw_type_error(&options),
        );
        self.asm.ops(&[OpCode::Push1, OpCode::PickItem]);
        self.emit_if(
            |c| {
                c.asm.op(OpCode::Dup);
                c.asm.push_string(CALL_PROPERTY);
                c.asm.ops(&[OpCode::HasKey, OpCode::Not]);
            },
            |c| c.emit_throw_type_error(&options),
        );
        self.asm.push_string(CALL_PROPERTY);
        self.asm.op(OpCode::PickItem);
        // [[context, id], args] -> [id, context, args]
        self.asm.ops(&[
            OpCode::Dup,
            OpCode::Push1,
            OpCode::PickItem,
            OpCode::Swap,
            OpCode::Push0,
            OpCode::PickItem,
            OpCode::Swap,
        ]);
        let dispatch = self.dispatch_label();
        self.asm.jump(OpCode::Call, dispatch);
    }

    /// `[args, this] -> [completion]`
    pub(crate) fn emit_invoke_method(&mut self, label: Label) {
        self.asm.op(OpCode::Swap);
        self.emit_method_context();
        self.asm.jump(OpCode::Call, label);
    }

    /// `[index] -> [value]`
    pub(crate) fn emit_get_argument(&mut self) {
        self.asm.ops(&[OpCode::Push1, OpCode::PickItem]);
        self.emit_get_global();
        self.asm.push_string(ARGUMENTS_PROPERTY);
        self.emit_get_internal_property();
        self.asm.ops(&[OpCode::Swap, OpCode::PickItem]);
    }

    /// `[arguments, global] -> []`
    pub(crate) fn emit_add_arguments(&mut self) {
        self.asm.push_string(ARGUMENTS_PROPERTY);
        self.asm.op(OpCode::Swap);
        self.emit_set_internal_property();
    }

    /// `[key, object] -> [value]`
    pub(crate) fn emit_get_internal_property(&mut self) {
        self.asm.ops(&[
            OpCode::Swap,
            OpCode::Push1,
            OpCode::PickItem,
            OpCode::Swap,
            OpCode::PickItem,
        ]);
    }

    /// `[value, key, object] -> []`
    pub(crate) fn emit_set_internal_property(&mut self) {
        self.asm.ops(&[
            OpCode::Rot,
            OpCode::Push1,
            OpCode::PickItem,
            OpCode::Rot,
            OpCode::Rot,
            OpCode::SetItem,
        ]);
    }

    /// `[object] -> [value]`
    pub(crate) fn emit_get_object_property(&mut self, name: &str, options: &VisitOptions) {
        let options = options.pushing();
        self.emit_if(
            |c| {
                c.asm.op(OpCode::Dup);
                c.emit_is_tag(Tag::Object);
                c.asm.op(OpCode::Not);
            },
            |c| c.emit_throw_type_error(&options),
        );
        self.asm.ops(&[OpCode::Push1, OpCode::PickItem]);
        self.emit_if_else(
            |c| {
                c.asm.op(OpCode::Dup);
                c.asm.push_string(name);
                c.asm.op(OpCode::HasKey);
            },
            |c| {
                c.asm.push_string(name);
                c.asm.op(OpCode::PickItem);
            },
            |c| {
                c.asm.op(OpCode::Drop);
                c.emit_helper(Helper::PushUndefined, &VisitOptions::default());
            },
        );
    }

    /// `[value, object] -> []`
    pub(crate) fn emit_set_object_property(&mut self, name: &str, options: &VisitOptions) {
        let options = options.pushing();
        self.emit_if(
            |c| {
                c.asm.op(OpCode::Over);
                c.emit_is_tag(Tag::Object);
                c.asm.op(OpCode::Not);
            },
            |c| {
                c.asm.op(OpCode::Drop);
                c.emit_throw_type_error(&options);
            },
        );
        self.asm.ops(&[OpCode::Swap, OpCode::Push1, OpCode::PickItem]);
        self.asm.push_string(name);
        self.asm.ops(&[OpCode::Rot, OpCode::SetItem]);
    }
}
