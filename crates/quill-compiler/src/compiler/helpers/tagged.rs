//! Tagged value construction and inspection.

use crate::compiler::bytecode::OpCode;
use crate::compiler::codegen::Compiler;
use crate::types::Tag;

impl Compiler {
    /// `[value] -> [raw bool]`
    pub(crate) fn emit_is_tag(&mut self, tag: Tag) {
        self.asm.ops(&[OpCode::Push0, OpCode::PickItem]);
        self.asm.push_int(tag.value());
        self.asm.op(OpCode::Equal);
    }

    /// `[payload] -> [tag, payload]`
    pub(crate) fn emit_wrap(&mut self, tag: Tag) {
        self.asm.push_int(tag.value());
        self.asm.ops(&[OpCode::Push2, OpCode::Pack]);
    }

    /// `[] -> [value]` for the payload-less tags.
    pub(crate) fn emit_tagged_constant(&mut self, tag: Tag) {
        self.asm.op(OpCode::Push0);
        self.emit_wrap(tag);
    }

    /// `[] -> [string]`
    pub(crate) fn emit_tagged_string(&mut self, value: &str) {
        self.asm.push_string(value);
        self.emit_wrap(Tag::String);
    }

    /// `[] -> [boolean]`
    pub(crate) fn emit_tagged_boolean(&mut self, value: bool) {
        self.asm.push_bool(value);
        self.emit_wrap(Tag::Boolean);
    }
}
