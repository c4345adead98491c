//! Type conversions on tagged values.
//!
//! Each conversion picks its branch at compile time when the static type
//! pins down the runtime tag, and otherwise dispatches on the tag at
//! runtime. Numbers and symbols have no string form in the compiled subset
//! and convert to a thrown `TypeError`.

use super::Helper;
use crate::compiler::bytecode::OpCode;
use crate::compiler::codegen::Compiler;
use crate::compiler::options::VisitOptions;
use crate::types::{Tag, Type};

/// String form of any object.
const OBJECT_STRING: &str = "[object Object]";

/// Every tag, in the order conversions other than ToString test them.
const TAG_ORDER: [Tag; 7] = [
    Tag::Undefined,
    Tag::Null,
    Tag::Boolean,
    Tag::String,
    Tag::Number,
    Tag::Symbol,
    Tag::Object,
];

impl Compiler {
    /// `[value] -> [raw string]`
    pub(crate) fn emit_to_string(&mut self, ty: &Type, throw_on_object: bool, options: &VisitOptions) {
        let options = options.pushing();
        match ty.static_tag() {
            Some(tag) => self.emit_to_string_branch(tag, throw_on_object, &options),
            None => self.emit_tag_dispatch(&Tag::TO_STRING_ORDER, |compiler, tag| {
                compiler.emit_to_string_branch(tag, throw_on_object, &options)
            }),
        }
    }

    fn emit_to_string_branch(&mut self, tag: Tag, throw_on_object: bool, options: &VisitOptions) {
        match tag {
            Tag::Undefined | Tag::Null => {
                self.asm.op(OpCode::Drop);
                self.asm
                    .push_string(if tag == Tag::Null { "null" } else { "undefined" });
            }
            Tag::Boolean => {
                self.emit_helper(Helper::Unwrap, options);
                self.emit_if_else(
                    |_| {},
                    |c| c.asm.push_string("true"),
                    |c| c.asm.push_string("false"),
                );
            }
            Tag::String => self.emit_helper(Helper::Unwrap, options),
            Tag::Number | Tag::Symbol => self.emit_throw_type_error(options),
            Tag::Object if throw_on_object => self.emit_throw_type_error(options),
            Tag::Object => {
                self.emit_to_primitive(&Type::Object);
                self.emit_to_string(&Type::String, true, options);
            }
        }
    }

    /// `[value] -> [value]`
    pub(crate) fn emit_to_primitive(&mut self, ty: &Type) {
        match ty.static_tag() {
            Some(Tag::Object) => {
                self.asm.op(OpCode::Drop);
                self.emit_tagged_string(OBJECT_STRING);
            }
            Some(_) => {}
            None => self.emit_if(
                |c| {
                    c.asm.op(OpCode::Dup);
                    c.emit_is_tag(Tag::Object);
                },
                |c| {
                    c.asm.op(OpCode::Drop);
                    c.emit_tagged_string(OBJECT_STRING);
                },
            ),
        }
    }

    /// `[value] -> [raw bool]`
    pub(crate) fn emit_to_boolean(&mut self, ty: &Type) {
        match ty.static_tag() {
            Some(tag) => self.emit_to_boolean_branch(tag),
            None => self.emit_tag_dispatch(&TAG_ORDER, |compiler, tag| {
                compiler.emit_to_boolean_branch(tag)
            }),
        }
    }

    fn emit_to_boolean_branch(&mut self, tag: Tag) {
        match tag {
            Tag::Undefined | Tag::Null => {
                self.asm.op(OpCode::Drop);
                self.asm.push_bool(false);
            }
            Tag::Boolean => self.asm.ops(&[OpCode::Push1, OpCode::PickItem]),
            Tag::Number => self.asm.ops(&[OpCode::Push1, OpCode::PickItem, OpCode::Nz]),
            Tag::String => self
                .asm
                .ops(&[OpCode::Push1, OpCode::PickItem, OpCode::Size, OpCode::Nz]),
            Tag::Symbol | Tag::Object => {
                self.asm.op(OpCode::Drop);
                self.asm.push_bool(true);
            }
        }
    }

    /// `[value] -> [raw integer]`
    pub(crate) fn emit_to_number(&mut self, ty: &Type, options: &VisitOptions) {
        let options = options.pushing();
        match ty.static_tag() {
            Some(tag) => self.emit_to_number_branch(tag, &options),
            None => self.emit_tag_dispatch(&TAG_ORDER, |compiler, tag| {
                compiler.emit_to_number_branch(tag, &options)
            }),
        }
    }

    fn emit_to_number_branch(&mut self, tag: Tag, options: &VisitOptions) {
        match tag {
            Tag::Null => {
                self.asm.op(OpCode::Drop);
                self.asm.push_int(0);
            }
            Tag::Boolean | Tag::Number => self.asm.ops(&[OpCode::Push1, OpCode::PickItem]),
            Tag::Undefined | Tag::String | Tag::Symbol | Tag::Object => {
                self.emit_throw_type_error(options)
            }
        }
    }

    /// `[value] -> [tagged string]`
    pub(crate) fn emit_type_of(&mut self, ty: &Type) {
        if let Type::Function(_) = ty {
            self.asm.op(OpCode::Drop);
            self.emit_tagged_string("function");
            return;
        }
        match ty.static_tag() {
            Some(tag) => {
                self.asm.op(OpCode::Drop);
                self.emit_tagged_string(tag.type_of_name());
            }
            None => self.emit_tag_dispatch(&TAG_ORDER, |compiler, tag| {
                compiler.asm.op(OpCode::Drop);
                compiler.emit_tagged_string(tag.type_of_name());
            }),
        }
    }

    /// `[right, left] -> [raw bool]`
    pub(crate) fn emit_strict_equals(&mut self, left: &Type, right: &Type) {
        match (left.static_tag(), right.static_tag()) {
            (Some(l), Some(r)) if l != r => {
                self.asm.ops(&[OpCode::Drop, OpCode::Drop]);
                self.asm.push_bool(false);
            }
            (Some(_), Some(_)) => self.emit_payloads_equal(),
            _ => {
                let end = self.asm.new_label();
                let same = self.asm.new_label();
                // [right, left] -> [right.tag, left.tag, right, left]
                self.asm
                    .ops(&[OpCode::Over, OpCode::Push0, OpCode::PickItem]);
                self.asm
                    .ops(&[OpCode::Over, OpCode::Push0, OpCode::PickItem]);
                self.asm.op(OpCode::NumEqual);
                self.asm.jump(OpCode::JmpIf, same);
                self.asm.ops(&[OpCode::Drop, OpCode::Drop]);
                self.asm.push_bool(false);
                self.asm.jump(OpCode::Jmp, end);
                self.asm.mark(same);
                self.emit_payloads_equal();
                self.asm.mark(end);
            }
        }
    }

    fn emit_payloads_equal(&mut self) {
        self.asm.ops(&[
            OpCode::Push1,
            OpCode::PickItem,
            OpCode::Swap,
            OpCode::Push1,
            OpCode::PickItem,
            OpCode::Equal,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::bytecode::OpCode;
    use crate::compiler::codegen::Compiler;
    use crate::types::{Tag, Type};
    use crate::CompileOptions;

    fn opcodes(build: impl FnOnce(&mut Compiler)) -> Vec<OpCode> {
        let mut compiler = Compiler::new(CompileOptions::default());
        build(&mut compiler);
        compiler
            .into_instructions()
            .unwrap()
            .into_iter()
            .map(|i| i.opcode)
            .collect()
    }

    #[test]
    fn test_is_tag_shape() {
        let ops = opcodes(|c| c.emit_is_tag(Tag::Boolean));
        assert_eq!(
            ops,
            vec![OpCode::Push0, OpCode::PickItem, OpCode::Push2, OpCode::Equal]
        );
    }

    #[test]
    fn test_static_string_conversion_is_unwrap() {
        let ops = opcodes(|c| {
            c.emit_to_string(&Type::String, false, &Default::default())
        });
        assert_eq!(ops, vec![OpCode::Push1, OpCode::PickItem]);
    }

    #[test]
    fn test_static_number_conversion_throws() {
        let ops = opcodes(|c| {
            c.emit_to_string(&Type::Number, false, &Default::default())
        });
        assert_eq!(ops.first(), Some(&OpCode::Drop));
        assert_eq!(ops.last(), Some(&OpCode::Throw));
    }

    #[test]
    fn test_dynamic_string_conversion_checks_string_first() {
        let ops = opcodes(|c| c.emit_to_string(&Type::Any, false, &Default::default()));
        assert_eq!(
            &ops[..5],
            &[OpCode::Dup, OpCode::Push0, OpCode::PickItem, OpCode::Push3, OpCode::Equal]
        );
    }

    #[test]
    fn test_strict_equals_of_distinct_tags_is_constant() {
        let ops = opcodes(|c| c.emit_strict_equals(&Type::Number, &Type::String));
        assert_eq!(ops, vec![OpCode::Drop, OpCode::Drop, OpCode::Push0]);
    }
}
