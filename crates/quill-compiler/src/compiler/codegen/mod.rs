//! Code generation from AST to bytecode.
//!
//! This module contains the `Compiler` which transforms a (transpiled)
//! syntax tree into AVM instructions. Code is laid out as:
//!
//! 1. the entry prologue, which installs the module scope context,
//! 2. module level statements,
//! 3. the contract's method dispatch,
//! 4. every class member body,
//! 5. the dispatch routine for function values, when any are called.

mod assembler;
mod classes;
mod expressions;
mod functions;
mod scope;
mod statements;

#[cfg(test)]
mod tests;

pub use assembler::{Assembler, FrameId, Label};
pub use scope::{Binding, Local, Scope};

use crate::ast::*;
use crate::compiler::bytecode::{Instruction, OpCode};
use crate::compiler::helpers::Helper;
use crate::compiler::options::VisitOptions;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Span};
use crate::types::Tag;
use crate::{CompileOptions, Error, Result};
use rustc_hash::FxHashMap;

/// A compiled class member callable with a static `CALL`.
#[derive(Debug, Clone)]
pub(crate) struct MethodInfo {
    /// Entry of the member body
    pub label: Label,
    /// Declared parameters
    pub params: Vec<Parameter>,
    /// Declared return type
    pub return_type: Type,
    /// Exposed through the contract entry point
    pub public: bool,
}

/// An instance field of a plain (non-contract) class.
#[derive(Debug, Clone)]
pub(crate) struct FieldInfo {
    pub name: String,
    pub ty: Type,
    pub init: Option<Expression>,
}

/// Everything the emitter knows about a declared class.
#[derive(Debug, Clone)]
pub(crate) struct ClassInfo {
    pub super_class: Option<String>,
    pub is_contract: bool,
    pub constructor: Option<MethodInfo>,
    pub methods: Vec<(String, MethodInfo)>,
    pub getters: Vec<(String, MethodInfo)>,
    pub setters: Vec<(String, MethodInfo)>,
    pub fields: Vec<FieldInfo>,
    pub declaration: ClassDeclaration,
}

/// What a member name refers to on a class.
#[derive(Debug, Clone)]
pub(crate) enum Member {
    Method(MethodInfo),
    Accessor {
        getter: Option<MethodInfo>,
        setter: Option<MethodInfo>,
    },
    Field(Type),
}

/// Compiles AST to bytecode.
pub struct Compiler {
    /// The instruction stream being generated
    pub(crate) asm: Assembler,
    /// Current scope for variable resolution
    pub(crate) scope: Scope,
    diagnostics: Diagnostics,
    options: CompileOptions,
    classes: FxHashMap<String, ClassInfo>,
    class_order: Vec<String>,
    /// Function id -> body label
    functions: Vec<Label>,
    dispatch: Label,
    dispatch_used: bool,
    frames: usize,
    span: Span,
    /// Number of enclosing `try` statements with a `finally` block
    finally_depth: usize,
    /// `finally_depth` at the entry of each enclosing loop or switch
    loop_finally: Vec<usize>,
    /// Method names the contract dispatch accepts
    entry_points: Vec<String>,
}

impl Compiler {
    /// Creates a new compiler.
    pub fn new(options: CompileOptions) -> Self {
        let mut asm = Assembler::new();
        let dispatch = asm.new_label();
        Self {
            asm,
            scope: Scope::new(),
            diagnostics: Diagnostics::with_limit(options.max_diagnostics),
            options,
            classes: FxHashMap::default(),
            class_order: Vec::new(),
            functions: Vec::new(),
            dispatch,
            dispatch_used: false,
            frames: 0,
            span: Span::default(),
            finally_depth: 0,
            loop_finally: Vec::new(),
            entry_points: Vec::new(),
        }
    }

    /// Adds diagnostics produced by an earlier pass.
    pub fn extend_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics.extend(diagnostics);
    }

    // ========================================================================
    // Main Compilation Entry Point
    // ========================================================================

    /// Compiles a program.
    ///
    /// Diagnostics are accumulated rather than returned; an `Err` here is an
    /// internal failure that stops compilation of the module.
    pub fn compile(&mut self, program: &Program) -> Result<()> {
        self.declare_classes(program)?;

        let module_frame = self.new_frame();
        self.scope.enter_function(module_frame, Type::Undefined);
        self.emit_entry_prologue(module_frame);

        let options = VisitOptions::statement();
        for stmt in &program.body {
            self.compile_statement(stmt, &options)?;
        }

        self.emit_contract_dispatch();
        self.emit_class_bodies()?;
        self.emit_function_dispatch();

        if let Some((frame, size)) = self.scope.exit_function() {
            self.asm.set_frame_size(frame, size);
        }
        Ok(())
    }

    /// Finishes compilation, returning the instructions and any warnings.
    ///
    /// Fails with every accumulated diagnostic when one of them is an error.
    pub fn finish(self) -> Result<(Vec<Instruction>, Vec<Diagnostic>)> {
        if self.diagnostics.has_errors() {
            return Err(Error::Diagnostics(self.diagnostics.into_vec()));
        }
        let instructions = self.asm.assemble()?;
        Ok((instructions, self.diagnostics.into_vec()))
    }

    /// Finishes compilation, discarding warnings.
    pub fn into_instructions(self) -> Result<Vec<Instruction>> {
        self.finish().map(|(instructions, _)| instructions)
    }

    /// Method names accepted by the contract entry point, in dispatch order.
    pub fn entry_points(&self) -> &[String] {
        &self.entry_points
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.items()
    }

    /// Records an error at the current location.
    pub(crate) fn report(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(code, message, self.span));
    }

    /// Records an unsupported construct and pushes `undefined` in its place.
    pub(crate) fn emit_unsupported(&mut self, what: &str, options: &VisitOptions) {
        self.report(
            DiagnosticCode::UnsupportedSyntax,
            format!("Unsupported syntax: {}.", what),
        );
        self.emit_unsupported_value(options);
    }

    /// Keeps the stack shape of an expression that could not be compiled.
    pub(crate) fn emit_unsupported_value(&mut self, options: &VisitOptions) {
        if options.push_value {
            self.emit_helper(Helper::PushUndefined, options);
        }
    }

    pub(crate) fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub(crate) fn compile_options(&self) -> &CompileOptions {
        &self.options
    }

    pub(crate) fn new_frame(&mut self) -> FrameId {
        let frame = FrameId(self.frames);
        self.frames += 1;
        frame
    }

    // ========================================================================
    // Function values
    // ========================================================================

    /// Registers a function body, returning its id.
    pub(crate) fn register_function(&mut self, body: Label) -> usize {
        self.functions.push(body);
        self.functions.len() - 1
    }

    /// Entry of the function dispatch routine.
    pub(crate) fn dispatch_label(&mut self) -> Label {
        self.dispatch_used = true;
        self.dispatch
    }

    /// `[id, context, args] -> ...`: jumps to the body of function `id` with
    /// `[context, args]`, faulting on an unknown id.
    fn emit_function_dispatch(&mut self) {
        if !self.dispatch_used {
            return;
        }
        tracing::trace!("emitting dispatch over {} functions", self.functions.len());
        self.asm.mark(self.dispatch);
        let bodies = self.functions.clone();
        let mut trampolines = Vec::with_capacity(bodies.len());
        for (id, _) in bodies.iter().enumerate() {
            let trampoline = self.asm.new_label();
            self.asm.op(OpCode::Dup);
            self.asm.push_int(id);
            self.asm.op(OpCode::NumEqual);
            self.asm.jump(OpCode::JmpIf, trampoline);
            trampolines.push(trampoline);
        }
        self.asm.op(OpCode::Throw);
        for (trampoline, body) in trampolines.into_iter().zip(bodies) {
            self.asm.mark(trampoline);
            self.asm.op(OpCode::Drop);
            self.asm.jump(OpCode::Jmp, body);
        }
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Collects every module level class and allocates member labels.
    fn declare_classes(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.body {
            let Statement::ClassDeclaration(decl) = stmt else {
                continue;
            };
            if self.classes.contains_key(&decl.id.name) {
                self.set_span(decl.span);
                self.report(
                    DiagnosticCode::UnsupportedSyntax,
                    format!("Duplicate class '{}'.", decl.id.name),
                );
                continue;
            }
            let info = self.class_info(decl);
            self.class_order.push(decl.id.name.clone());
            self.classes.insert(decl.id.name.clone(), info);
        }

        let names = self.class_order.clone();
        for name in names {
            let is_contract = self.extends_contract_base(&name);
            if let Some(class) = self.classes.get_mut(&name) {
                class.is_contract = is_contract;
                if is_contract && class.constructor.is_some() {
                    return Err(Error::NoCompiler("smart contract constructor"));
                }
            }
        }
        Ok(())
    }

    fn class_info(&mut self, decl: &ClassDeclaration) -> ClassInfo {
        let mut info = ClassInfo {
            super_class: decl.super_class.as_ref().map(|id| id.name.clone()),
            is_contract: false,
            constructor: None,
            methods: Vec::new(),
            getters: Vec::new(),
            setters: Vec::new(),
            fields: Vec::new(),
            declaration: decl.clone(),
        };
        for member in &decl.members {
            match member {
                ClassMember::Constructor(ctor) => {
                    info.constructor = Some(MethodInfo {
                        label: self.asm.new_label(),
                        params: ctor.params.clone(),
                        return_type: Type::Undefined,
                        public: false,
                    });
                }
                ClassMember::Method(method) => {
                    info.methods.push((
                        method.key.name.clone(),
                        MethodInfo {
                            label: self.asm.new_label(),
                            params: method.params.clone(),
                            return_type: method.return_type.clone().unwrap_or(Type::Any),
                            public: method.accessibility == Accessibility::Public,
                        },
                    ));
                }
                ClassMember::Getter(getter) => {
                    info.getters.push((
                        getter.key.name.clone(),
                        MethodInfo {
                            label: self.asm.new_label(),
                            params: Vec::new(),
                            return_type: getter.return_type.clone().unwrap_or(Type::Any),
                            public: getter.accessibility == Accessibility::Public,
                        },
                    ));
                }
                ClassMember::Setter(setter) => {
                    info.setters.push((
                        setter.key.name.clone(),
                        MethodInfo {
                            label: self.asm.new_label(),
                            params: vec![setter.param.clone()],
                            return_type: Type::Undefined,
                            public: false,
                        },
                    ));
                }
                ClassMember::Property(property) if !property.is_static => {
                    info.fields.push(FieldInfo {
                        name: property.key.name.clone(),
                        ty: property.ty.clone().unwrap_or(Type::Any),
                        init: property.value.clone(),
                    });
                }
                ClassMember::Property(_) => {}
            }
        }
        info
    }

    /// True when `name`'s base chain ends at the ambient contract base.
    fn extends_contract_base(&self, name: &str) -> bool {
        let mut current = self.classes.get(name).and_then(|c| c.super_class.clone());
        for _ in 0..=self.classes.len() {
            match current {
                Some(base) if base == self.options.contract_base => return true,
                Some(base) => current = self.classes.get(&base).and_then(|c| c.super_class.clone()),
                None => return false,
            }
        }
        false
    }

    pub(crate) fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Resolves `member` on `class`, walking up the base chain.
    pub(crate) fn find_member(&self, class: &str, member: &str) -> Option<Member> {
        let mut current = self.classes.get(class);
        let mut steps = 0;
        while let Some(info) = current {
            if let Some((_, method)) = info.methods.iter().find(|(name, _)| name == member) {
                return Some(Member::Method(method.clone()));
            }
            let getter = info.getters.iter().find(|(name, _)| name == member);
            let setter = info.setters.iter().find(|(name, _)| name == member);
            if getter.is_some() || setter.is_some() {
                return Some(Member::Accessor {
                    getter: getter.map(|(_, m)| m.clone()),
                    setter: setter.map(|(_, m)| m.clone()),
                });
            }
            if let Some(field) = info.fields.iter().find(|field| field.name == member) {
                return Some(Member::Field(field.ty.clone()));
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
        None
    }

    /// The nearest constructor on `class`'s chain, starting at `class`.
    pub(crate) fn find_constructor(&self, class: &str) -> Option<MethodInfo> {
        let mut current = self.classes.get(class);
        let mut steps = 0;
        while let Some(info) = current {
            if let Some(ctor) = &info.constructor {
                return Some(ctor.clone());
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
        None
    }

    /// Fields with initializers along `class`'s chain, base first.
    pub(crate) fn initialized_fields(&self, class: &str) -> Vec<FieldInfo> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(class);
        while let Some(info) = current {
            if chain.len() > self.classes.len() {
                break;
            }
            chain.push(info);
            current = info
                .super_class
                .as_ref()
                .and_then(|base| self.classes.get(base));
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|info| info.fields.iter())
            .filter(|field| field.init.is_some())
            .cloned()
            .collect()
    }

    // ========================================================================
    // Static types
    // ========================================================================

    /// Best-effort static type of an expression.
    pub(crate) fn type_of(&self, expr: &Expression) -> Type {
        match expr {
            Expression::Literal(literal) => match literal {
                Literal::Number(_) | Literal::BigInt(_) => Type::Number,
                Literal::String(_) => Type::String,
                Literal::Boolean(_) => Type::Boolean,
                Literal::Null => Type::Null,
                Literal::Undefined => Type::Undefined,
                Literal::RegExp { .. } => Type::Any,
            },
            Expression::Identifier(id) => match self.scope.resolve(&id.name) {
                Some(binding) => binding.ty,
                None if id.name == "undefined" => Type::Undefined,
                None => Type::Any,
            },
            Expression::This => self.scope.this_type(),
            Expression::Binary(binary) => {
                let left = self.type_of(&binary.left);
                let right = self.type_of(&binary.right);
                match binary.operator {
                    BinaryOperator::Add => {
                        if left.is_only(Tag::String)
                            || right.is_only(Tag::String)
                        {
                            Type::String
                        } else if left.is_only(Tag::Number)
                            && right.is_only(Tag::Number)
                        {
                            Type::Number
                        } else {
                            Type::Any
                        }
                    }
                    BinaryOperator::Subtract
                    | BinaryOperator::Multiply
                    | BinaryOperator::Divide
                    | BinaryOperator::Modulo
                    | BinaryOperator::BitwiseAnd
                    | BinaryOperator::BitwiseOr
                    | BinaryOperator::BitwiseXor
                    | BinaryOperator::LeftShift
                    | BinaryOperator::RightShift => Type::Number,
                    BinaryOperator::Equal
                    | BinaryOperator::NotEqual
                    | BinaryOperator::StrictEqual
                    | BinaryOperator::StrictNotEqual
                    | BinaryOperator::LessThan
                    | BinaryOperator::LessThanEqual
                    | BinaryOperator::GreaterThan
                    | BinaryOperator::GreaterThanEqual => Type::Boolean,
                    BinaryOperator::LogicalAnd
                    | BinaryOperator::LogicalOr
                    | BinaryOperator::NullishCoalescing
                        if left == right =>
                    {
                        left
                    }
                    _ => Type::Any,
                }
            }
            Expression::Unary(unary) => match unary.operator {
                UnaryOperator::Minus | UnaryOperator::Plus | UnaryOperator::BitwiseNot => {
                    Type::Number
                }
                UnaryOperator::LogicalNot => Type::Boolean,
                UnaryOperator::Typeof => Type::String,
                UnaryOperator::Void => Type::Undefined,
                UnaryOperator::Delete => Type::Any,
            },
            Expression::Assignment(assign) => match assign.operator {
                AssignmentOperator::Assign => self.type_of(&assign.right),
                _ => self.type_of(&Expression::Binary(BinaryExpression {
                    operator: assign
                        .operator
                        .binary_operator()
                        .unwrap_or(BinaryOperator::Add),
                    left: assign.left.clone(),
                    right: assign.right.clone(),
                })),
            },
            Expression::Call(call) => self.type_of_call(call),
            Expression::Member(member) => {
                let object = match member.object.as_ref() {
                    Expression::Super => None,
                    object => self.type_of(object).class_name().map(str::to_string),
                };
                match (object, member.property_name()) {
                    (Some(class), Some(name)) => match self.find_member(&class, name) {
                        Some(Member::Field(ty)) => ty,
                        Some(Member::Accessor {
                            getter: Some(getter),
                            ..
                        }) => getter.return_type,
                        _ => Type::Any,
                    },
                    _ => Type::Any,
                }
            }
            Expression::Conditional(cond) => {
                let consequent = self.type_of(&cond.consequent);
                if consequent == self.type_of(&cond.alternate) {
                    consequent
                } else {
                    Type::Any
                }
            }
            Expression::Arrow(arrow) => {
                let ret = match (&arrow.return_type, &arrow.body) {
                    (Some(ty), _) => ty.clone(),
                    (None, ArrowBody::Expression(body)) => self.type_of(body),
                    (None, ArrowBody::Block(_)) => Type::Any,
                };
                Type::Function(Box::new(ret))
            }
            Expression::New(new) => match new.callee.as_ref() {
                Expression::Identifier(id) => Type::Reference(id.name.clone()),
                _ => Type::Any,
            },
            Expression::Update(_) => Type::Number,
            Expression::Sequence(seq) => seq
                .expressions
                .last()
                .map(|last| self.type_of(last))
                .unwrap_or(Type::Undefined),
            Expression::As(cast) => cast.ty.clone(),
            Expression::Super
            | Expression::Array(_)
            | Expression::Object(_)
            | Expression::Function(_) => Type::Any,
        }
    }

    fn type_of_call(&self, call: &CallExpression) -> Type {
        if let Some(name) = crate::compiler::syscalls::syscall_name(&call.callee, &call.arguments) {
            use crate::compiler::syscalls::{lookup, SyscallResult};
            return match lookup(name).map(|signature| signature.result) {
                Some(SyscallResult::None) => Type::Undefined,
                Some(SyscallResult::Bytes) => Type::String,
                Some(SyscallResult::Context) => Type::Object,
                _ => Type::Any,
            };
        }
        match call.callee.as_ref() {
            Expression::Member(member) => {
                let class = match member.object.as_ref() {
                    Expression::Super => None,
                    object => self.type_of(object).class_name().map(str::to_string),
                };
                match (class, member.property_name()) {
                    (Some(class), Some(name)) => match self.find_member(&class, name) {
                        Some(Member::Method(method)) => method.return_type,
                        _ => Type::Any,
                    },
                    _ => Type::Any,
                }
            }
            callee => match self.type_of(callee) {
                Type::Function(ret) => *ret,
                _ => Type::Any,
            },
        }
    }
}
