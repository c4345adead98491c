//! Classes: the contract entry point, member bodies, instances and member
//! access.

use super::functions::FunctionBody;
use super::{Compiler, FrameId, Member, MethodInfo};
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::compiler::helpers::Helper;
use crate::compiler::options::VisitOptions;
use crate::compiler::syscalls::{GET_CONTEXT, STORAGE_GET, STORAGE_PUT};
use crate::diagnostics::DiagnosticCode;
use crate::transpile::DEPLOY_METHOD;
use crate::types::Tag;
use crate::Result;

/// Storage key marking a contract as deployed.
pub const DEPLOYED_KEY: &str = "%deployed";

impl Compiler {
    // ========================================================================
    // Entry point
    // ========================================================================

    /// `[method, params] -> [method]`, with the module context installed.
    pub(crate) fn emit_entry_prologue(&mut self, module_frame: FrameId) {
        let pushing = VisitOptions::default();
        // [params, method]
        self.asm.op(OpCode::Swap);
        // global
        self.asm.op(OpCode::NewMap);
        self.emit_helper(Helper::Wrap(Tag::Object), &pushing);
        // this
        self.emit_helper(Helper::PushUndefined, &pushing);
        // frames = [module frame]
        self.asm.push_frame_size(module_frame);
        self.asm.ops(&[OpCode::NewArray, OpCode::Push1, OpCode::Pack]);
        // [frames, this, global, params, method]
        self.asm.ops(&[OpCode::Push3, OpCode::Pack, OpCode::ToAltStack]);
        // [params, method] -> global.arguments = params
        self.emit_get_global();
        self.asm.op(OpCode::Swap);
        self.emit_helper(Helper::AddArguments, &pushing);
    }

    /// `[method] -> return`: calls the contract method named `method`.
    pub(crate) fn emit_contract_dispatch(&mut self) {
        let Some(contract) = self.entry_contract() else {
            self.asm
                .ops(&[OpCode::Drop, OpCode::FromAltStack, OpCode::Drop, OpCode::Ret]);
            return;
        };
        let entries = self.contract_entries(&contract);
        tracing::debug!(
            "contract '{}' exposes {} entry points",
            contract,
            entries.len()
        );

        self.entry_points = entries.iter().map(|(name, _)| name.clone()).collect();

        let labels: Vec<_> = entries.iter().map(|_| self.asm.new_label()).collect();
        for ((name, _), label) in entries.iter().zip(&labels) {
            self.asm.op(OpCode::Dup);
            self.asm.push_string(name);
            self.asm.op(OpCode::Equal);
            self.asm.jump(OpCode::JmpIf, *label);
        }
        self.asm.op(OpCode::Throw);

        for ((name, method), label) in entries.into_iter().zip(labels) {
            self.asm.mark(label);
            self.asm.op(OpCode::Drop);
            if name == DEPLOY_METHOD && self.compile_options().guard_deploy {
                self.emit_deploy_guard();
            }
            self.emit_entry_call(&name, &method);
        }
    }

    /// The most derived contract class of the module.
    fn entry_contract(&mut self) -> Option<String> {
        let contracts: Vec<String> = self
            .class_order
            .iter()
            .filter(|name| self.classes.get(*name).is_some_and(|c| c.is_contract))
            .cloned()
            .collect();
        let leaves: Vec<String> = contracts
            .iter()
            .filter(|name| {
                !contracts.iter().any(|other| {
                    self.classes
                        .get(other)
                        .and_then(|c| c.super_class.as_ref())
                        == Some(*name)
                })
            })
            .cloned()
            .collect();
        if leaves.len() > 1 {
            self.report(
                DiagnosticCode::UnsupportedSyntax,
                "Only one smart contract may be declared per module.",
            );
        }
        leaves.last().cloned()
    }

    /// Public methods and getters reachable on `contract`, most derived first.
    fn contract_entries(&self, contract: &str) -> Vec<(String, MethodInfo)> {
        let mut entries: Vec<(String, MethodInfo)> = Vec::new();
        let mut current = self.classes.get(contract);
        let mut steps = 0;
        while let Some(info) = current {
            for (name, method) in info.methods.iter().chain(&info.getters) {
                if method.public && !entries.iter().any(|(seen, _)| seen == name) {
                    entries.push((name.clone(), method.clone()));
                }
            }
            steps += 1;
            if steps > self.classes.len() {
                break;
            }
            current = info
                .super_class
                .as_ref()
                .and_then(|base| self.classes.get(base));
        }
        entries
    }

    /// Faults when the contract was deployed before, then marks it deployed.
    fn emit_deploy_guard(&mut self) {
        self.asm.push_string(DEPLOYED_KEY);
        self.asm.syscall(GET_CONTEXT);
        self.asm.syscall(STORAGE_GET);
        self.asm.ops(&[OpCode::Size, OpCode::Not, OpCode::ThrowIfNot]);
        self.asm.op(OpCode::Push1);
        self.asm.push_string(DEPLOYED_KEY);
        self.asm.syscall(GET_CONTEXT);
        self.asm.syscall(STORAGE_PUT);
    }

    /// `[] -> return`: invokes an entry point with the invocation arguments
    /// and returns the raw payload of its result.
    fn emit_entry_call(&mut self, name: &str, method: &MethodInfo) {
        let pushing = VisitOptions::default();
        // this
        self.asm.op(OpCode::NewMap);
        self.emit_helper(Helper::Wrap(Tag::Object), &pushing);

        let count = method.params.len();
        for index in (0..count).rev() {
            self.asm.push_int(index);
            self.emit_helper(Helper::Wrap(Tag::Number), &pushing);
            self.emit_helper(Helper::GetArgument, &pushing);
            let ty = method.params[index].ty.clone();
            self.emit_wrap_parameter(name, &method.params[index].name.name, ty.as_ref());
        }
        self.asm.push_int(count);
        self.asm.op(OpCode::Pack);

        self.emit_helper(Helper::InvokeMethod(method.label), &pushing);
        self.asm.op(OpCode::Dup);
        self.emit_helper(Helper::GetCompletionError, &pushing);
        self.emit_is_tag(Tag::Undefined);
        self.asm.op(OpCode::ThrowIfNot);
        self.emit_helper(Helper::GetCompletionValue, &pushing);
        self.emit_helper(Helper::Unwrap, &pushing);
        self.asm
            .ops(&[OpCode::FromAltStack, OpCode::Drop, OpCode::Ret]);
    }

    /// `[raw argument] -> [value]`
    fn emit_wrap_parameter(&mut self, method: &str, param: &str, ty: Option<&Type>) {
        let pushing = VisitOptions::default();
        let tag = match ty {
            Some(Type::Boolean) => Tag::Boolean,
            Some(Type::Number | Type::Fixed(_)) => Tag::Number,
            Some(Type::String) => Tag::String,
            Some(Type::Buffer) => Tag::Object,
            Some(other) => {
                self.report(
                    DiagnosticCode::UnsupportedSyntax,
                    format!(
                        "Unsupported type '{}' for parameter '{}' of contract method '{}'.",
                        other, param, method
                    ),
                );
                return;
            }
            None => {
                self.report(
                    DiagnosticCode::UnknownType,
                    format!(
                        "Could not determine type of parameter '{}' of contract method '{}'.",
                        param, method
                    ),
                );
                return;
            }
        };
        self.emit_helper(Helper::Wrap(tag), &pushing);
    }

    // ========================================================================
    // Member bodies
    // ========================================================================

    /// Emits every member body of every class.
    pub(crate) fn emit_class_bodies(&mut self) -> Result<()> {
        let order = self.class_order.clone();
        for name in order {
            let Some(class) = self.classes.get(&name).cloned() else {
                continue;
            };
            tracing::debug!("emitting members of class '{}'", name);
            let this_type = Type::Reference(name.clone());
            let super_class = class.super_class.clone();

            for member in &class.declaration.members {
                self.set_span(member.span());
                match member {
                    ClassMember::Constructor(ctor) => {
                        if let Some(info) = &class.constructor {
                            self.asm.mark(info.label);
                            self.compile_function_body(
                                &ctor.params,
                                FunctionBody::Block(&ctor.body),
                                this_type.clone(),
                                super_class.clone(),
                            )?;
                        }
                    }
                    ClassMember::Method(method) => {
                        if method.is_static {
                            self.report(
                                DiagnosticCode::UnsupportedSyntax,
                                format!("Unsupported syntax: static method '{}'.", method.key.name),
                            );
                            continue;
                        }
                        let label = class
                            .methods
                            .iter()
                            .find(|(n, _)| *n == method.key.name)
                            .map(|(_, info)| info.label);
                        if let Some(label) = label {
                            self.asm.mark(label);
                            self.compile_function_body(
                                &method.params,
                                FunctionBody::Block(&method.body),
                                this_type.clone(),
                                super_class.clone(),
                            )?;
                        }
                    }
                    ClassMember::Getter(getter) => {
                        let label = class
                            .getters
                            .iter()
                            .find(|(n, _)| *n == getter.key.name)
                            .map(|(_, info)| info.label);
                        if let Some(label) = label {
                            self.asm.mark(label);
                            self.compile_function_body(
                                &[],
                                FunctionBody::Block(&getter.body),
                                this_type.clone(),
                                super_class.clone(),
                            )?;
                        }
                    }
                    ClassMember::Setter(setter) => {
                        let label = class
                            .setters
                            .iter()
                            .find(|(n, _)| *n == setter.key.name)
                            .map(|(_, info)| info.label);
                        if let Some(label) = label {
                            self.asm.mark(label);
                            self.compile_function_body(
                                std::slice::from_ref(&setter.param),
                                FunctionBody::Block(&setter.body),
                                this_type.clone(),
                                super_class.clone(),
                            )?;
                        }
                    }
                    ClassMember::Property(_) => {}
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// `new C(args)` for a class declared in the module.
    pub(crate) fn compile_new(&mut self, new: &NewExpression, options: &VisitOptions) -> Result<()> {
        let Expression::Identifier(id) = new.callee.as_ref() else {
            self.emit_unsupported("'new' of a computed constructor", options);
            return Ok(());
        };
        let is_contract = match self.class(&id.name) {
            Some(class) => class.is_contract,
            None => {
                self.report(
                    DiagnosticCode::UnknownIdentifier,
                    format!("Unknown class '{}'.", id.name),
                );
                self.emit_unsupported_value(options);
                return Ok(());
            }
        };
        if is_contract {
            self.emit_unsupported("instantiating a smart contract", options);
            return Ok(());
        }

        let pushing = options.pushing();
        self.asm.op(OpCode::NewMap);
        self.emit_helper(Helper::Wrap(Tag::Object), &pushing);
        for field in self.initialized_fields(&id.name) {
            if let Some(init) = &field.init {
                self.asm.op(OpCode::Dup);
                self.compile_expression(init, &pushing)?;
                self.emit_helper(Helper::SetObjectProperty(field.name.clone()), &pushing);
            }
        }
        if let Some(ctor) = self.find_constructor(&id.name) {
            self.asm.op(OpCode::Dup);
            self.compile_arguments(&new.arguments, &pushing)?;
            self.emit_helper(Helper::InvokeMethod(ctor.label), &pushing);
            self.emit_helper(Helper::HandleCompletion, &pushing.discarding());
        } else {
            for argument in &new.arguments {
                self.compile_expression(argument, &pushing.discarding())?;
            }
        }
        if !options.push_value {
            self.asm.op(OpCode::Drop);
        }
        Ok(())
    }

    /// `super(args)` inside a constructor.
    pub(crate) fn compile_super_constructor_call(
        &mut self,
        arguments: &[Expression],
        options: &VisitOptions,
    ) -> Result<()> {
        let base = options
            .super_class
            .clone()
            .and_then(|base| self.find_constructor(&base));
        match base {
            Some(ctor) => {
                let pushing = options.pushing();
                self.emit_get_this();
                self.compile_arguments(arguments, &pushing)?;
                self.emit_helper(Helper::InvokeMethod(ctor.label), &pushing);
                self.emit_helper(Helper::HandleCompletion, &pushing.discarding());
            }
            None => {
                for argument in arguments {
                    self.compile_expression(argument, &options.discarding())?;
                }
            }
        }
        if options.push_value {
            self.emit_helper(Helper::PushUndefined, options);
        }
        Ok(())
    }

    // ========================================================================
    // Member access
    // ========================================================================

    /// Resolves `name` on a receiver of static type `object_ty`.
    ///
    /// `None` means dynamic property access; an unknown member of a known
    /// class is reported.
    pub(crate) fn resolve_member(&mut self, object_ty: &Type, name: &str) -> Option<Option<Member>> {
        let class = object_ty.class_name()?;
        if self.class(class).is_none() {
            return None;
        }
        let member = self.find_member(class, name);
        if member.is_none() {
            self.report(
                DiagnosticCode::UnknownIdentifier,
                format!("Property '{}' does not exist on type '{}'.", name, class),
            );
        }
        Some(member)
    }

    /// `[object] -> [value]`
    pub(crate) fn emit_member_get(
        &mut self,
        object_ty: &Type,
        name: &str,
        options: &VisitOptions,
    ) -> Result<()> {
        let pushing = options.pushing();
        match self.resolve_member(object_ty, name) {
            None | Some(Some(Member::Field(_))) => {
                self.emit_helper(Helper::GetObjectProperty(name.to_string()), options);
            }
            Some(Some(Member::Accessor {
                getter: Some(getter),
                ..
            })) => {
                self.asm.ops(&[OpCode::Push0, OpCode::NewArray]);
                self.emit_helper(Helper::InvokeMethod(getter.label), &pushing);
                self.emit_helper(Helper::HandleCompletion, options);
            }
            Some(Some(Member::Accessor { getter: None, .. })) => {
                self.report(
                    DiagnosticCode::UnsupportedSyntax,
                    format!("Property '{}' has no getter.", name),
                );
                self.asm.op(OpCode::Drop);
                self.emit_unsupported_value(options);
            }
            Some(Some(Member::Method(_))) => {
                self.asm.op(OpCode::Drop);
                self.emit_unsupported("method used as a value", options);
            }
            Some(None) => {
                self.asm.op(OpCode::Drop);
                self.emit_unsupported_value(options);
            }
        }
        Ok(())
    }

    /// `[value, object] -> []`
    pub(crate) fn emit_member_set(
        &mut self,
        object_ty: &Type,
        name: &str,
        options: &VisitOptions,
    ) -> Result<()> {
        let pushing = options.pushing();
        match self.resolve_member(object_ty, name) {
            None | Some(Some(Member::Field(_))) => {
                self.emit_helper(Helper::SetObjectProperty(name.to_string()), &pushing);
            }
            Some(Some(Member::Accessor {
                setter: Some(setter),
                ..
            })) => {
                self.asm.ops(&[OpCode::Push1, OpCode::Pack]);
                self.emit_helper(Helper::InvokeMethod(setter.label), &pushing);
                self.emit_helper(Helper::HandleCompletion, &pushing.discarding());
            }
            Some(Some(Member::Accessor { setter: None, .. })) => {
                self.report(
                    DiagnosticCode::InvalidAssignment,
                    format!("Cannot assign to '{}' because it is a read-only property.", name),
                );
                self.asm.ops(&[OpCode::Drop, OpCode::Drop]);
            }
            Some(Some(Member::Method(_))) => {
                self.report(
                    DiagnosticCode::InvalidAssignment,
                    format!("Cannot assign to method '{}'.", name),
                );
                self.asm.ops(&[OpCode::Drop, OpCode::Drop]);
            }
            Some(None) => self.asm.ops(&[OpCode::Drop, OpCode::Drop]),
        }
        Ok(())
    }

    /// `receiver.name(args)`, with `receiver` already compiled: `[object]`.
    pub(crate) fn emit_method_call(
        &mut self,
        object_ty: &Type,
        name: &str,
        arguments: &[Expression],
        options: &VisitOptions,
    ) -> Result<()> {
        let pushing = options.pushing();
        match self.resolve_member(object_ty, name) {
            Some(Some(Member::Method(method))) => {
                self.compile_arguments(arguments, &pushing)?;
                self.emit_helper(Helper::InvokeMethod(method.label), &pushing);
                self.emit_helper(Helper::HandleCompletion, options);
            }
            Some(None) => {
                self.asm.op(OpCode::Drop);
                for argument in arguments {
                    self.compile_expression(argument, &options.discarding())?;
                }
                self.emit_unsupported_value(options);
            }
            _ => {
                // A property holding a function value.
                self.emit_member_get(object_ty, name, &pushing)?;
                self.compile_arguments(arguments, &pushing)?;
                self.emit_helper(Helper::InvokeFunction, &pushing);
                self.emit_helper(Helper::HandleCompletion, options);
            }
        }
        Ok(())
    }

    /// `super.name(args)`
    pub(crate) fn compile_super_method_call(
        &mut self,
        name: &str,
        arguments: &[Expression],
        options: &VisitOptions,
    ) -> Result<()> {
        let Some(base) = options.super_class.clone() else {
            self.emit_unsupported("'super' outside a derived class", options);
            return Ok(());
        };
        self.emit_get_this();
        self.emit_method_call(&Type::Reference(base), name, arguments, options)
    }
}
