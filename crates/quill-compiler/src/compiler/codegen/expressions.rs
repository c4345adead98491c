//! Expression compilation.

use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::{MAX_INTEGER_SIZE, OpCode, integer_in_range};
use crate::compiler::helpers::Helper;
use crate::compiler::options::VisitOptions;
use crate::compiler::syscalls::syscall_name;
use crate::diagnostics::DiagnosticCode;
use crate::types::Tag;
use crate::Result;
use num_bigint::BigInt;
use num_traits::FromPrimitive;

impl Compiler {
    /// Compiles an expression.
    pub(crate) fn compile_expression(&mut self, expr: &Expression, options: &VisitOptions) -> Result<()> {
        match expr {
            Expression::Literal(lit) => self.compile_literal(lit, options),
            Expression::Identifier(id) => {
                if id.name == "undefined" && self.scope.resolve("undefined").is_none() {
                    self.emit_helper(Helper::PushUndefined, options);
                } else {
                    self.emit_get_variable(&id.name, options);
                }
            }
            Expression::This => {
                if options.push_value {
                    self.emit_get_this();
                }
            }
            Expression::Binary(binary) => self.compile_binary(binary, options)?,
            Expression::Unary(unary) => self.compile_unary(unary, options)?,
            Expression::Assignment(assign) => self.compile_assignment(assign, options)?,
            Expression::Call(call) => self.compile_call(call, options)?,
            Expression::Member(member) => self.compile_member(member, options)?,
            Expression::Conditional(cond) => self.compile_conditional(cond, options)?,
            Expression::Arrow(arrow) => self.compile_arrow(arrow, options)?,
            Expression::New(new) => self.compile_new(new, options)?,
            Expression::Update(update) => self.compile_update(update, options)?,
            Expression::Sequence(seq) => {
                let count = seq.expressions.len();
                for (i, expr) in seq.expressions.iter().enumerate() {
                    if i + 1 == count {
                        self.compile_expression(expr, options)?;
                    } else {
                        self.compile_expression(expr, &options.discarding())?;
                    }
                }
                if count == 0 {
                    self.emit_unsupported_value(options);
                }
            }
            Expression::As(cast) => {
                self.compile_expression(&cast.expression, &options.with_cast(cast.ty.clone()))?;
            }
            Expression::Super => self.emit_unsupported("'super' outside a member access", options),
            Expression::Array(_) => self.emit_unsupported("array literal", options),
            Expression::Object(_) => self.emit_unsupported("object literal", options),
            Expression::Function(_) => self.emit_unsupported("function expression", options),
        }
        Ok(())
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn compile_literal(&mut self, lit: &Literal, options: &VisitOptions) {
        if let Literal::RegExp { .. } = lit {
            self.emit_unsupported("regular expression", options);
            return;
        }
        let integer = match lit {
            Literal::Number(n) if n.is_finite() && n.fract() == 0.0 => BigInt::from_f64(*n),
            Literal::Number(n) => {
                self.report(
                    DiagnosticCode::InvalidLiteral,
                    format!("Only integral numbers are supported, found {}.", n),
                );
                None
            }
            Literal::BigInt(digits) => {
                let parsed = BigInt::parse_bytes(digits.trim_end_matches('n').as_bytes(), 10);
                if parsed.is_none() {
                    self.report(
                        DiagnosticCode::InvalidLiteral,
                        format!("Invalid integer literal '{}'.", digits),
                    );
                }
                parsed
            }
            _ => None,
        };
        let integer = match integer {
            Some(value) if !integer_in_range(&value) => {
                self.report(
                    DiagnosticCode::InvalidLiteral,
                    format!("Integer literal {} does not fit in {} bytes.", value, MAX_INTEGER_SIZE),
                );
                None
            }
            other => other,
        };
        if !options.push_value {
            return;
        }
        match lit {
            Literal::Number(_) | Literal::BigInt(_) => match integer {
                Some(value) => {
                    self.asm.push_int(value);
                    self.emit_wrap(Tag::Number);
                }
                None => self.emit_helper(Helper::PushUndefined, options),
            },
            Literal::String(value) => self.emit_tagged_string(value),
            Literal::Boolean(value) => self.emit_tagged_boolean(*value),
            Literal::Null => self.emit_helper(Helper::PushNull, options),
            Literal::Undefined | Literal::RegExp { .. } => {
                self.emit_helper(Helper::PushUndefined, options)
            }
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_binary(&mut self, binary: &BinaryExpression, options: &VisitOptions) -> Result<()> {
        let pushing = options.pushing();
        match binary.operator {
            BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
                let ty = self.type_of(&binary.left);
                let end = self.asm.new_label();
                self.compile_expression(&binary.left, &pushing)?;
                self.asm.op(OpCode::Dup);
                self.emit_helper(Helper::ToBoolean(ty), &pushing);
                let jump = if binary.operator == BinaryOperator::LogicalAnd {
                    OpCode::JmpIfNot
                } else {
                    OpCode::JmpIf
                };
                self.asm.jump(jump, end);
                self.asm.op(OpCode::Drop);
                self.compile_expression(&binary.right, &pushing)?;
                self.asm.mark(end);
            }
            BinaryOperator::NullishCoalescing => {
                let end = self.asm.new_label();
                self.compile_expression(&binary.left, &pushing)?;
                self.asm.op(OpCode::Dup);
                self.emit_is_tag(Tag::Undefined);
                self.asm.op(OpCode::Over);
                self.emit_is_tag(Tag::Null);
                self.asm.op(OpCode::BoolOr);
                self.asm.jump(OpCode::JmpIfNot, end);
                self.asm.op(OpCode::Drop);
                self.compile_expression(&binary.right, &pushing)?;
                self.asm.mark(end);
            }
            operator => {
                let left = self.type_of(&binary.left);
                let right = self.type_of(&binary.right);
                self.compile_expression(&binary.left, &pushing)?;
                self.compile_expression(&binary.right, &pushing)?;
                self.emit_binary_operator(operator, &left, &right, &pushing);
            }
        }
        if !options.push_value {
            self.asm.op(OpCode::Drop);
        }
        Ok(())
    }

    /// `[right, left] -> [result]` for the non short-circuiting operators.
    fn emit_binary_operator(&mut self, operator: BinaryOperator, left: &Type, right: &Type, options: &VisitOptions) {
        match operator {
            BinaryOperator::Add => self.emit_add(left, right, options),
            BinaryOperator::Subtract => self.emit_numeric(OpCode::Sub, Tag::Number, left, right, options),
            BinaryOperator::Multiply => self.emit_numeric(OpCode::Mul, Tag::Number, left, right, options),
            BinaryOperator::Divide => self.emit_numeric(OpCode::Div, Tag::Number, left, right, options),
            BinaryOperator::Modulo => self.emit_numeric(OpCode::Mod, Tag::Number, left, right, options),
            BinaryOperator::BitwiseAnd => self.emit_numeric(OpCode::And, Tag::Number, left, right, options),
            BinaryOperator::BitwiseOr => self.emit_numeric(OpCode::Or, Tag::Number, left, right, options),
            BinaryOperator::BitwiseXor => self.emit_numeric(OpCode::Xor, Tag::Number, left, right, options),
            BinaryOperator::LeftShift => self.emit_numeric(OpCode::Shl, Tag::Number, left, right, options),
            BinaryOperator::RightShift => self.emit_numeric(OpCode::Shr, Tag::Number, left, right, options),
            BinaryOperator::LessThan => self.emit_numeric(OpCode::Lt, Tag::Boolean, left, right, options),
            BinaryOperator::LessThanEqual => self.emit_numeric(OpCode::Lte, Tag::Boolean, left, right, options),
            BinaryOperator::GreaterThan => self.emit_numeric(OpCode::Gt, Tag::Boolean, left, right, options),
            BinaryOperator::GreaterThanEqual => {
                self.emit_numeric(OpCode::Gte, Tag::Boolean, left, right, options)
            }
            BinaryOperator::StrictEqual | BinaryOperator::StrictNotEqual => {
                self.emit_strict_compare(operator == BinaryOperator::StrictNotEqual, left, right, options)
            }
            // Loose equality agrees with strict equality when both tags are
            // known and equal.
            BinaryOperator::Equal | BinaryOperator::NotEqual
                if left.static_tag().is_some() && left.static_tag() == right.static_tag() =>
            {
                self.emit_strict_compare(operator == BinaryOperator::NotEqual, left, right, options)
            }
            other => {
                self.asm.ops(&[OpCode::Drop, OpCode::Drop]);
                self.emit_unsupported(&format!("operator {:?}", other), options);
            }
        }
    }

    fn emit_strict_compare(&mut self, negate: bool, left: &Type, right: &Type, options: &VisitOptions) {
        self.emit_helper(
            Helper::StrictEquals {
                left: left.clone(),
                right: right.clone(),
            },
            options,
        );
        if negate {
            self.asm.op(OpCode::Not);
        }
        self.emit_helper(Helper::Wrap(Tag::Boolean), options);
    }

    /// `[right, left] -> [raw right, raw left]` as integers.
    fn emit_numeric_operands(&mut self, left: &Type, right: &Type, options: &VisitOptions) {
        self.emit_helper(Helper::ToNumber(right.clone()), options);
        self.asm.op(OpCode::Swap);
        self.emit_helper(Helper::ToNumber(left.clone()), options);
        self.asm.op(OpCode::Swap);
    }

    fn emit_numeric(&mut self, op: OpCode, result: Tag, left: &Type, right: &Type, options: &VisitOptions) {
        self.emit_numeric_operands(left, right, options);
        self.asm.op(op);
        self.emit_helper(Helper::Wrap(result), options);
    }

    /// `[right, left] -> [raw right, raw left]` as strings.
    fn emit_string_operands(&mut self, left: &Type, right: &Type, options: &VisitOptions) {
        self.emit_helper(
            Helper::ToString {
                ty: right.clone(),
                throw_on_object: false,
            },
            options,
        );
        self.asm.op(OpCode::Swap);
        self.emit_helper(
            Helper::ToString {
                ty: left.clone(),
                throw_on_object: false,
            },
            options,
        );
        self.asm.op(OpCode::Swap);
    }

    fn emit_concat(&mut self, left: &Type, right: &Type, options: &VisitOptions) {
        self.emit_string_operands(left, right, options);
        self.asm.op(OpCode::Cat);
        self.emit_helper(Helper::Wrap(Tag::String), options);
    }

    /// `+`: concatenation when either side is a string, addition otherwise.
    fn emit_add(&mut self, left: &Type, right: &Type, options: &VisitOptions) {
        if left.is_only(Tag::String) || right.is_only(Tag::String) {
            self.emit_concat(left, right, options);
            return;
        }
        if left.is_only(Tag::Number) && right.is_only(Tag::Number) {
            self.emit_numeric(OpCode::Add, Tag::Number, left, right, options);
            return;
        }

        self.emit_helper(Helper::ToPrimitive(right.clone()), options);
        self.asm.op(OpCode::Swap);
        self.emit_helper(Helper::ToPrimitive(left.clone()), options);
        self.asm.op(OpCode::Swap);
        self.emit_if_else(
            |c| {
                c.asm.op(OpCode::Dup);
                c.emit_is_tag(Tag::String);
                c.asm.ops(&[OpCode::Push2, OpCode::Pick]);
                c.emit_is_tag(Tag::String);
                c.asm.op(OpCode::BoolOr);
            },
            |c| c.emit_concat(&Type::Any, &Type::Any, options),
            |c| c.emit_numeric(OpCode::Add, Tag::Number, &Type::Any, &Type::Any, options),
        );
    }

    fn compile_unary(&mut self, unary: &UnaryExpression, options: &VisitOptions) -> Result<()> {
        let pushing = options.pushing();
        let ty = self.type_of(&unary.argument);
        match unary.operator {
            UnaryOperator::Void => {
                self.compile_expression(&unary.argument, &options.discarding())?;
                self.emit_helper(Helper::PushUndefined, options);
                return Ok(());
            }
            UnaryOperator::Delete => {
                self.emit_unsupported("delete", options);
                return Ok(());
            }
            _ => self.compile_expression(&unary.argument, &pushing)?,
        }
        match unary.operator {
            UnaryOperator::Minus => {
                self.emit_helper(Helper::ToNumber(ty), &pushing);
                self.asm.op(OpCode::Negate);
                self.emit_wrap(Tag::Number);
            }
            UnaryOperator::Plus => {
                self.emit_helper(Helper::ToNumber(ty), &pushing);
                self.emit_wrap(Tag::Number);
            }
            UnaryOperator::BitwiseNot => {
                self.emit_helper(Helper::ToNumber(ty), &pushing);
                self.asm.op(OpCode::Invert);
                self.emit_wrap(Tag::Number);
            }
            UnaryOperator::LogicalNot => {
                self.emit_helper(Helper::ToBoolean(ty), &pushing);
                self.asm.op(OpCode::Not);
                self.emit_wrap(Tag::Boolean);
            }
            UnaryOperator::Typeof => self.emit_helper(Helper::TypeOf(ty), &pushing),
            UnaryOperator::Void | UnaryOperator::Delete => {}
        }
        if !options.push_value {
            self.asm.op(OpCode::Drop);
        }
        Ok(())
    }

    fn compile_conditional(&mut self, cond: &ConditionalExpression, options: &VisitOptions) -> Result<()> {
        let ty = self.type_of(&cond.test);
        let else_label = self.asm.new_label();
        let end = self.asm.new_label();
        self.compile_expression(&cond.test, &options.pushing())?;
        self.emit_helper(Helper::ToBoolean(ty), &options.pushing());
        self.asm.jump(OpCode::JmpIfNot, else_label);
        self.compile_expression(&cond.consequent, options)?;
        self.asm.jump(OpCode::Jmp, end);
        self.asm.mark(else_label);
        self.compile_expression(&cond.alternate, options)?;
        self.asm.mark(end);
        Ok(())
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn compile_assignment(&mut self, assign: &AssignmentExpression, options: &VisitOptions) -> Result<()> {
        let pushing = options.pushing();
        let operator = match assign.operator {
            AssignmentOperator::Assign => None,
            AssignmentOperator::LogicalAndAssign
            | AssignmentOperator::LogicalOrAssign
            | AssignmentOperator::NullishCoalescingAssign => {
                self.emit_unsupported("logical assignment", options);
                return Ok(());
            }
            other => other.binary_operator(),
        };

        match assign.left.as_ref() {
            Expression::Identifier(id) => {
                match operator {
                    Some(operator) => {
                        let left = self.type_of(&assign.left);
                        let right = self.type_of(&assign.right);
                        self.emit_get_variable(&id.name, &pushing);
                        self.compile_expression(&assign.right, &pushing)?;
                        self.emit_binary_operator(operator, &left, &right, &pushing);
                    }
                    None => self.compile_expression(&assign.right, &pushing)?,
                }
                if options.push_value {
                    self.asm.op(OpCode::Dup);
                }
                self.emit_set_variable(&id.name, false);
            }
            Expression::Member(member) => {
                let Some(name) = member.property_name() else {
                    self.emit_unsupported("computed member assignment", options);
                    return Ok(());
                };
                let object_ty = self.type_of(&member.object);
                self.compile_expression(&member.object, &pushing)?;
                match operator {
                    Some(operator) => {
                        let current = self.type_of(&assign.left);
                        let right = self.type_of(&assign.right);
                        self.asm.op(OpCode::Dup);
                        self.emit_member_get(&object_ty, name, &pushing)?;
                        self.compile_expression(&assign.right, &pushing)?;
                        self.emit_binary_operator(operator, &current, &right, &pushing);
                    }
                    None => self.compile_expression(&assign.right, &pushing)?,
                }
                if options.push_value {
                    self.asm.op(OpCode::Tuck);
                }
                self.emit_member_set(&object_ty, name, &pushing)?;
            }
            _ => {
                self.report(
                    DiagnosticCode::InvalidAssignment,
                    "Invalid assignment target.",
                );
                self.emit_unsupported_value(options);
            }
        }
        Ok(())
    }

    fn compile_update(&mut self, update: &UpdateExpression, options: &VisitOptions) -> Result<()> {
        let pushing = options.pushing();
        let step = match update.operator {
            UpdateOperator::Increment => OpCode::Inc,
            UpdateOperator::Decrement => OpCode::Dec,
        };
        let ty = self.type_of(&update.argument);
        let keep_old = options.push_value && !update.prefix;
        let keep_new = options.push_value && update.prefix;

        match update.argument.as_ref() {
            Expression::Identifier(id) => {
                self.emit_get_variable(&id.name, &pushing);
                self.emit_helper(Helper::ToNumber(ty), &pushing);
                if keep_old {
                    self.asm.op(OpCode::Dup);
                }
                self.asm.op(step);
                self.emit_wrap(Tag::Number);
                if keep_new {
                    self.asm.op(OpCode::Dup);
                }
                self.emit_set_variable(&id.name, false);
            }
            Expression::Member(member) => {
                let Some(name) = member.property_name() else {
                    self.emit_unsupported("computed member update", options);
                    return Ok(());
                };
                let object_ty = self.type_of(&member.object);
                self.compile_expression(&member.object, &pushing)?;
                self.asm.op(OpCode::Dup);
                self.emit_member_get(&object_ty, name, &pushing)?;
                self.emit_helper(Helper::ToNumber(ty), &pushing);
                if keep_old {
                    self.asm.op(OpCode::Tuck);
                }
                self.asm.op(step);
                self.emit_wrap(Tag::Number);
                if keep_new {
                    self.asm.op(OpCode::Tuck);
                }
                self.emit_member_set(&object_ty, name, &pushing)?;
            }
            _ => {
                self.report(
                    DiagnosticCode::InvalidAssignment,
                    "Invalid increment or decrement target.",
                );
                self.emit_unsupported_value(options);
                return Ok(());
            }
        }
        if keep_old {
            self.emit_wrap(Tag::Number);
        }
        Ok(())
    }

    // ========================================================================
    // Members and calls
    // ========================================================================

    fn compile_member(&mut self, member: &MemberExpression, options: &VisitOptions) -> Result<()> {
        let Some(name) = member.property_name() else {
            self.emit_unsupported("computed member access", options);
            return Ok(());
        };
        if let Expression::Super = member.object.as_ref() {
            self.emit_unsupported("'super' property access", options);
            return Ok(());
        }
        let object_ty = self.type_of(&member.object);
        self.compile_expression(&member.object, &options.pushing())?;
        self.emit_member_get(&object_ty, name, options)
    }

    fn compile_call(&mut self, call: &CallExpression, options: &VisitOptions) -> Result<()> {
        if let Some(name) = syscall_name(&call.callee, &call.arguments) {
            return self.compile_syscall(name, &call.arguments[1..], options);
        }
        match call.callee.as_ref() {
            Expression::Super => self.compile_super_constructor_call(&call.arguments, options),
            Expression::Member(member) => {
                let Some(name) = member.property_name() else {
                    self.emit_unsupported("computed method call", options);
                    return Ok(());
                };
                if let Expression::Super = member.object.as_ref() {
                    return self.compile_super_method_call(name, &call.arguments, options);
                }
                let object_ty = self.type_of(&member.object);
                self.compile_expression(&member.object, &options.pushing())?;
                self.emit_method_call(&object_ty, name, &call.arguments, options)
            }
            callee => {
                let pushing = options.pushing();
                self.compile_expression(callee, &pushing)?;
                self.compile_arguments(&call.arguments, &pushing)?;
                self.emit_helper(Helper::InvokeFunction, &pushing);
                self.emit_helper(Helper::HandleCompletion, options);
                Ok(())
            }
        }
    }
}
