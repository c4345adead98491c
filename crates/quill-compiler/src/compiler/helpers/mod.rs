//! Reusable emission units.
//!
//! Every [`Helper`] has a fixed stack contract, given as
//! `[inputs] -> [outputs]` with the stack top first. Under
//! `push_value = false` a helper still consumes its inputs; pure helpers
//! simply drop them, helpers that can throw run to completion and drop
//! their result, so no side effect is lost.

mod coercion;
mod completion;
mod function;
mod tagged;

use super::bytecode::OpCode;
use super::codegen::{Compiler, Label};
use super::options::VisitOptions;
use crate::types::{Tag, Type};

/// A named emission unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Helper {
    // ==================== Tagged values ====================
    /// `[value] -> [raw bool]`: the value's tag equals `tag`
    Is(Tag),
    /// `[payload] -> [value]`
    Wrap(Tag),
    /// `[value] -> [payload]`
    Unwrap,
    /// `[] -> [undefined]`
    PushUndefined,
    /// `[] -> [null]`
    PushNull,

    // ==================== Completion records ====================
    /// `[value, error] -> [completion]`
    CreateCompletion,
    /// `[value] -> [completion]`
    CreateNormalCompletion,
    /// `[error] -> [completion]`
    CreateThrowCompletion,
    /// `[completion] -> [value]`
    GetCompletionValue,
    /// `[completion] -> [error]`
    GetCompletionError,
    /// `[completion] -> [value]`, diverting abrupt completions
    HandleCompletion,
    /// `[completion] -> !`: transfers an abrupt completion to its handler
    ThrowCompletion,

    // ==================== Coercion ====================
    /// `[value] -> [raw string]`
    ToString {
        /// Static type of the input
        ty: Type,
        /// Nested conversion after ToPrimitive: objects are a type error
        throw_on_object: bool,
    },
    /// `[value] -> [value]`, objects become their string form
    ToPrimitive(Type),
    /// `[value] -> [raw bool]`
    ToBoolean(Type),
    /// `[value] -> [raw integer]`
    ToNumber(Type),
    /// `[value] -> [tagged string]`
    TypeOf(Type),
    /// `[value] -> !`: throws a `TypeError`
    ThrowTypeError,
    /// `[right, left] -> [raw bool]`
    StrictEquals {
        /// Static type of the left operand
        left: Type,
        /// Static type of the right operand
        right: Type,
    },

    // ==================== Scopes and functions ====================
    /// `[array] -> [copy]`
    CloneArray,
    /// `[context] -> [context']` with frames copied two levels deep
    CloneFrames,
    /// `[context] -> [function]`
    CreateFunction(usize),
    /// `[args, function] -> [completion]`
    InvokeFunction,
    /// `[args, this] -> [completion]`
    InvokeMethod(Label),
    /// `[index] -> [value]`: an invocation argument of the contract
    GetArgument,
    /// `[arguments, global] -> []`
    AddArguments,
    /// `[key, object] -> [value]`
    GetInternalObjectProperty,
    /// `[value, key, object] -> []`
    SetInternalObjectProperty,
    /// `[object] -> [value]`, missing properties read as undefined
    GetObjectProperty(String),
    /// `[value, object] -> []`
    SetObjectProperty(String),
}

impl Helper {
    /// `(inputs, outputs)` of the helper's stack contract.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Helper::PushUndefined | Helper::PushNull => (0, 1),
            Helper::CreateCompletion | Helper::InvokeFunction | Helper::InvokeMethod(_) => (2, 1),
            Helper::StrictEquals { .. } => (2, 1),
            Helper::ThrowCompletion | Helper::ThrowTypeError => (1, 0),
            Helper::AddArguments => (2, 0),
            Helper::GetInternalObjectProperty => (2, 1),
            Helper::SetInternalObjectProperty => (3, 0),
            Helper::SetObjectProperty(_) => (2, 0),
            _ => (1, 1),
        }
    }

    /// True when the helper cannot throw or otherwise act beyond its result.
    pub fn is_pure(&self) -> bool {
        match self {
            Helper::Is(_)
            | Helper::Wrap(_)
            | Helper::Unwrap
            | Helper::PushUndefined
            | Helper::PushNull
            | Helper::CreateCompletion
            | Helper::CreateNormalCompletion
            | Helper::CreateThrowCompletion
            | Helper::GetCompletionValue
            | Helper::GetCompletionError
            | Helper::ToPrimitive(_)
            | Helper::ToBoolean(_)
            | Helper::TypeOf(_)
            | Helper::StrictEquals { .. }
            | Helper::CloneArray
            | Helper::CloneFrames
            | Helper::CreateFunction(_)
            | Helper::GetInternalObjectProperty => true,
            Helper::ToString { ty, .. } => matches!(
                ty.static_tag(),
                Some(Tag::Undefined | Tag::Null | Tag::Boolean | Tag::String)
            ),
            Helper::ToNumber(ty) => matches!(
                ty.static_tag(),
                Some(Tag::Null | Tag::Boolean | Tag::Number)
            ),
            _ => false,
        }
    }
}

impl Compiler {
    /// Emits a helper honoring `options.push_value`.
    pub(crate) fn emit_helper(&mut self, helper: Helper, options: &VisitOptions) {
        let (inputs, outputs) = helper.stack_effect();
        if !options.push_value && helper.is_pure() {
            self.emit_drop(inputs);
            return;
        }

        match helper {
            Helper::Is(tag) => self.emit_is_tag(tag),
            Helper::Wrap(tag) => self.emit_wrap(tag),
            Helper::Unwrap => self.asm.ops(&[OpCode::Push1, OpCode::PickItem]),
            Helper::PushUndefined => self.emit_tagged_constant(Tag::Undefined),
            Helper::PushNull => self.emit_tagged_constant(Tag::Null),

            Helper::CreateCompletion => self.asm.ops(&[OpCode::Push2, OpCode::Pack]),
            Helper::CreateNormalCompletion => self.emit_create_normal_completion(),
            Helper::CreateThrowCompletion => self.emit_create_throw_completion(),
            Helper::GetCompletionValue => self.asm.ops(&[OpCode::Push0, OpCode::PickItem]),
            Helper::GetCompletionError => self.asm.ops(&[OpCode::Push1, OpCode::PickItem]),
            Helper::HandleCompletion => self.emit_handle_completion(options),
            Helper::ThrowCompletion => self.emit_throw_completion(options),

            Helper::ToString { ty, throw_on_object } => {
                self.emit_to_string(&ty, throw_on_object, options)
            }
            Helper::ToPrimitive(ty) => self.emit_to_primitive(&ty),
            Helper::ToBoolean(ty) => self.emit_to_boolean(&ty),
            Helper::ToNumber(ty) => self.emit_to_number(&ty, options),
            Helper::TypeOf(ty) => self.emit_type_of(&ty),
            Helper::ThrowTypeError => self.emit_throw_type_error(options),
            Helper::StrictEquals { left, right } => self.emit_strict_equals(&left, &right),

            Helper::CloneArray => self.asm.ops(&[OpCode::Unpack, OpCode::Pack]),
            Helper::CloneFrames => self.emit_clone_frames(),
            Helper::CreateFunction(id) => self.emit_create_function(id),
            Helper::InvokeFunction => self.emit_invoke_function(options),
            Helper::InvokeMethod(label) => self.emit_invoke_method(label),
            Helper::GetArgument => self.emit_get_argument(),
            Helper::AddArguments => self.emit_add_arguments(),
            Helper::GetInternalObjectProperty => self.emit_get_internal_property(),
            Helper::SetInternalObjectProperty => self.emit_set_internal_property(),
            Helper::GetObjectProperty(name) => self.emit_get_object_property(&name, options),
            Helper::SetObjectProperty(name) => self.emit_set_object_property(&name, options),
        }

        if !options.push_value {
            self.emit_drop(outputs);
        }
    }

    /// Drops `count` stack items.
    pub(crate) fn emit_drop(&mut self, count: usize) {
        for _ in 0..count {
            self.asm.op(OpCode::Drop);
        }
    }

    /// Emits `condition`, which must leave a raw boolean, then `then` when
    /// it is true.
    pub(crate) fn emit_if(
        &mut self,
        condition: impl FnOnce(&mut Self),
        then: impl FnOnce(&mut Self),
    ) {
        let end = self.asm.new_label();
        condition(self);
        self.asm.jump(OpCode::JmpIfNot, end);
        then(self);
        self.asm.mark(end);
    }

    /// Two-armed form of [`Compiler::emit_if`].
    pub(crate) fn emit_if_else(
        &mut self,
        condition: impl FnOnce(&mut Self),
        then: impl FnOnce(&mut Self),
        otherwise: impl FnOnce(&mut Self),
    ) {
        let else_label = self.asm.new_label();
        let end = self.asm.new_label();
        condition(self);
        self.asm.jump(OpCode::JmpIfNot, else_label);
        then(self);
        self.asm.jump(OpCode::Jmp, end);
        self.asm.mark(else_label);
        otherwise(self);
        self.asm.mark(end);
    }

    /// Runtime dispatch on the tag of the value on top of the stack.
    ///
    /// Tags are tested in `order`; the branch for a tag runs with the value
    /// still on the stack. The last tag is not tested: anything that got
    /// that far takes its branch.
    pub(crate) fn emit_tag_dispatch(&mut self, order: &[Tag], mut branch: impl FnMut(&mut Self, Tag)) {
        let end = self.asm.new_label();
        let Some((&last, tested)) = order.split_last() else {
            return;
        };
        for &tag in tested {
            let next = self.asm.new_label();
            self.asm.op(OpCode::Dup);
            self.emit_is_tag(tag);
            self.asm.jump(OpCode::JmpIfNot, next);
            branch(self, tag);
            self.asm.jump(OpCode::Jmp, end);
            self.asm.mark(next);
        }
        branch(self, last);
        self.asm.mark(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_effects() {
        assert_eq!(Helper::PushUndefined.stack_effect(), (0, 1));
        assert_eq!(Helper::SetInternalObjectProperty.stack_effect(), (3, 0));
        assert_eq!(Helper::InvokeFunction.stack_effect(), (2, 1));
        assert_eq!(Helper::Wrap(Tag::Number).stack_effect(), (1, 1));
    }

    #[test]
    fn test_string_conversion_purity_follows_type() {
        let boolean = Helper::ToString {
            ty: Type::Boolean,
            throw_on_object: false,
        };
        let number = Helper::ToString {
            ty: Type::Number,
            throw_on_object: false,
        };
        assert!(boolean.is_pure());
        assert!(!number.is_pure());
        assert!(!Helper::ThrowTypeError.is_pure());
    }
}
