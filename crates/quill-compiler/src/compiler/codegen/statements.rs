//! Statement compilation.

use super::Compiler;
use crate::ast::*;
use crate::compiler::bytecode::OpCode;
use crate::compiler::helpers::Helper;
use crate::compiler::options::VisitOptions;
use crate::diagnostics::DiagnosticCode;
use crate::Result;

impl Compiler {
    /// Compiles a statement.
    pub(crate) fn compile_statement(&mut self, stmt: &Statement, options: &VisitOptions) -> Result<()> {
        if let Some(span) = stmt.span() {
            self.set_span(span);
        }
        match stmt {
            Statement::VariableDeclaration(decl) => self.compile_var_declaration(decl, options)?,
            Statement::Expression(expr_stmt) => {
                self.compile_expression(&expr_stmt.expression, &options.discarding())?;
            }
            Statement::Block(block) => self.compile_block(&block.body, options)?,
            Statement::If(if_stmt) => self.compile_if(if_stmt, options)?,
            Statement::While(while_stmt) => self.compile_while(while_stmt, options)?,
            Statement::DoWhile(do_while) => self.compile_do_while(do_while, options)?,
            Statement::For(for_stmt) => self.compile_for(for_stmt, options)?,
            Statement::Switch(switch_stmt) => self.compile_switch(switch_stmt, options)?,
            Statement::Return(ret) => self.compile_return(ret, options)?,
            Statement::Break => self.compile_break(options),
            Statement::Continue => self.compile_continue(options),
            Statement::Throw(throw) => {
                self.compile_expression(&throw.argument, &options.pushing())?;
                self.emit_throw_value(options);
            }
            Statement::Try(try_stmt) => self.compile_try(try_stmt, options)?,
            Statement::ClassDeclaration(_) => {
                if self.scope.in_function() {
                    self.report_unsupported("class declaration inside a function");
                }
            }
            Statement::FunctionDeclaration(_) => self.report_unsupported("function declaration"),
            Statement::ForIn(_) => self.report_unsupported("for...in"),
            Statement::ForOf(_) => self.report_unsupported("for...of"),
            Statement::With(_) => self.report_unsupported("with"),
            Statement::Labeled(_) => self.report_unsupported("labeled statement"),
            Statement::BreakLabel(_) => self.report_unsupported("labeled break"),
            Statement::ContinueLabel(_) => self.report_unsupported("labeled continue"),
            Statement::Debugger => self.report_unsupported("debugger"),
            Statement::Empty => {}
        }
        Ok(())
    }

    fn report_unsupported(&mut self, what: &str) {
        self.report(
            DiagnosticCode::UnsupportedSyntax,
            format!("Unsupported syntax: {}.", what),
        );
    }

    fn compile_block(&mut self, body: &[Statement], options: &VisitOptions) -> Result<()> {
        self.scope.begin_scope();
        for stmt in body {
            self.compile_statement(stmt, options)?;
        }
        self.scope.end_scope();
        Ok(())
    }

    fn compile_var_declaration(&mut self, decl: &VariableDeclaration, options: &VisitOptions) -> Result<()> {
        if decl.kind == VariableKind::Var {
            self.report_unsupported("'var' declaration");
            return Ok(());
        }
        let mutable = decl.kind == VariableKind::Let;
        for declarator in &decl.declarations {
            let name = &declarator.id.name;
            let ty = match (&declarator.ty, &declarator.init) {
                (Some(ty), _) => ty.clone(),
                (None, Some(init)) => self.type_of(init),
                (None, None) => Type::Any,
            };
            match &declarator.init {
                Some(init) => self.compile_expression(init, &options.pushing())?,
                None => {
                    if !mutable {
                        self.report(
                            DiagnosticCode::InvalidAssignment,
                            format!("'const' declaration '{}' must be initialized.", name),
                        );
                    }
                    self.emit_helper(Helper::PushUndefined, &options.pushing());
                }
            }
            if self.scope.declare(name, mutable, ty).is_none() {
                self.report(
                    DiagnosticCode::InvalidAssignment,
                    format!("Cannot redeclare block-scoped variable '{}'.", name),
                );
                self.asm.op(OpCode::Drop);
                continue;
            }
            self.scope.mark_initialized(name);
            self.emit_set_variable(name, true);
        }
        Ok(())
    }

    /// `[value] -> []`, jumping to `target` when the value is falsy.
    fn emit_branch_unless(&mut self, test: &Expression, target: super::Label, options: &VisitOptions) -> Result<()> {
        let ty = self.type_of(test);
        self.compile_expression(test, &options.pushing())?;
        self.emit_helper(Helper::ToBoolean(ty), &options.pushing());
        self.asm.jump(OpCode::JmpIfNot, target);
        Ok(())
    }

    fn compile_if(&mut self, if_stmt: &IfStatement, options: &VisitOptions) -> Result<()> {
        let else_label = self.asm.new_label();
        self.emit_branch_unless(&if_stmt.test, else_label, options)?;
        self.compile_statement(&if_stmt.consequent, options)?;
        match &if_stmt.alternate {
            Some(alternate) => {
                let end = self.asm.new_label();
                self.asm.jump(OpCode::Jmp, end);
                self.asm.mark(else_label);
                self.compile_statement(alternate, options)?;
                self.asm.mark(end);
            }
            None => self.asm.mark(else_label),
        }
        Ok(())
    }

    fn compile_loop_body(&mut self, body: &Statement, options: &VisitOptions) -> Result<()> {
        self.loop_finally.push(self.finally_depth);
        let result = self.compile_statement(body, options);
        self.loop_finally.pop();
        result
    }

    fn compile_while(&mut self, while_stmt: &WhileStatement, options: &VisitOptions) -> Result<()> {
        let start = self.asm.new_label();
        let end = self.asm.new_label();
        self.asm.mark(start);
        self.emit_branch_unless(&while_stmt.test, end, options)?;
        self.compile_loop_body(&while_stmt.body, &options.with_loop(end, Some(start)))?;
        self.asm.jump(OpCode::Jmp, start);
        self.asm.mark(end);
        Ok(())
    }

    fn compile_do_while(&mut self, do_while: &DoWhileStatement, options: &VisitOptions) -> Result<()> {
        let start = self.asm.new_label();
        let test = self.asm.new_label();
        let end = self.asm.new_label();
        self.asm.mark(start);
        self.compile_loop_body(&do_while.body, &options.with_loop(end, Some(test)))?;
        self.asm.mark(test);
        let ty = self.type_of(&do_while.test);
        self.compile_expression(&do_while.test, &options.pushing())?;
        self.emit_helper(Helper::ToBoolean(ty), &options.pushing());
        self.asm.jump(OpCode::JmpIf, start);
        self.asm.mark(end);
        Ok(())
    }

    fn compile_for(&mut self, for_stmt: &ForStatement, options: &VisitOptions) -> Result<()> {
        self.scope.begin_scope();
        match &for_stmt.init {
            Some(ForInit::Declaration(decl)) => self.compile_var_declaration(decl, options)?,
            Some(ForInit::Expression(expr)) => self.compile_expression(expr, &options.discarding())?,
            None => {}
        }

        let start = self.asm.new_label();
        let update = self.asm.new_label();
        let end = self.asm.new_label();
        self.asm.mark(start);
        if let Some(test) = &for_stmt.test {
            self.emit_branch_unless(test, end, options)?;
        }
        self.compile_loop_body(&for_stmt.body, &options.with_loop(end, Some(update)))?;
        self.asm.mark(update);
        if let Some(expr) = &for_stmt.update {
            self.compile_expression(expr, &options.discarding())?;
        }
        self.asm.jump(OpCode::Jmp, start);
        self.asm.mark(end);
        self.scope.end_scope();
        Ok(())
    }

    fn compile_switch(&mut self, switch_stmt: &SwitchStatement, options: &VisitOptions) -> Result<()> {
        let discriminant_type = self.type_of(&switch_stmt.discriminant);
        self.compile_expression(&switch_stmt.discriminant, &options.pushing())?;
        let slot = self.scope.allocate_hidden();
        self.emit_store_hidden(slot);

        let end = self.asm.new_label();
        let case_options = options
            .with_loop(end, None)
            .with_switch_type(discriminant_type);
        let labels: Vec<_> = switch_stmt.cases.iter().map(|_| self.asm.new_label()).collect();

        let mut default = None;
        for (case, label) in switch_stmt.cases.iter().zip(&labels) {
            let Some(test) = &case.test else {
                default = Some(*label);
                continue;
            };
            let right = self.type_of(test);
            let left = case_options
                .switch_expression_type
                .clone()
                .unwrap_or(Type::Any);
            self.emit_load_hidden(slot);
            self.compile_expression(test, &case_options.pushing())?;
            self.emit_helper(Helper::StrictEquals { left, right }, &case_options.pushing());
            self.asm.jump(OpCode::JmpIf, *label);
        }
        self.asm.jump(OpCode::Jmp, default.unwrap_or(end));

        self.scope.begin_scope();
        self.loop_finally.push(self.finally_depth);
        for (case, label) in switch_stmt.cases.iter().zip(labels) {
            self.asm.mark(label);
            for stmt in &case.consequent {
                self.compile_statement(stmt, &case_options)?;
            }
        }
        self.loop_finally.pop();
        self.scope.end_scope();
        self.asm.mark(end);
        Ok(())
    }

    fn crosses_finally(&self) -> bool {
        self.loop_finally
            .last()
            .is_some_and(|&depth| self.finally_depth > depth)
    }

    fn compile_break(&mut self, options: &VisitOptions) {
        match options.break_pc {
            Some(_) if self.crosses_finally() => {
                self.report_unsupported("'break' out of a 'try' with a 'finally' block")
            }
            Some(target) => self.asm.jump(OpCode::Jmp, target),
            None => self.report_unsupported("'break' outside a loop or switch"),
        }
    }

    fn compile_continue(&mut self, options: &VisitOptions) {
        match options.continue_pc {
            Some(_) if self.crosses_finally() => {
                self.report_unsupported("'continue' out of a 'try' with a 'finally' block")
            }
            Some(target) => self.asm.jump(OpCode::Jmp, target),
            None => self.report_unsupported("'continue' outside a loop"),
        }
    }

    fn compile_return(&mut self, ret: &ReturnStatement, options: &VisitOptions) -> Result<()> {
        if !self.scope.in_function() {
            self.report_unsupported("'return' outside a function");
            return Ok(());
        }
        if self.finally_depth > 0 {
            self.report_unsupported("'return' inside a 'try' with a 'finally' block");
            return Ok(());
        }
        let pushing = options.pushing();
        match &ret.argument {
            Some(argument) => self.compile_expression(argument, &pushing)?,
            None => self.emit_helper(Helper::PushUndefined, &pushing),
        }
        self.emit_helper(Helper::CreateNormalCompletion, &pushing);
        self.emit_function_epilogue();
        Ok(())
    }

    /// `try`/`catch`/`finally`.
    ///
    /// The evaluation stack depth is saved on entry; an abrupt completion
    /// raised anywhere in the protected block jumps to the handler, which
    /// first unwinds back to that depth.
    fn compile_try(&mut self, try_stmt: &TryStatement, options: &VisitOptions) -> Result<()> {
        let depth_slot = self.scope.allocate_hidden();
        self.asm.op(OpCode::Depth);
        self.emit_store_hidden(depth_slot);

        let catch_label = self.asm.new_label();
        let normal = self.asm.new_label();
        let has_finally = try_stmt.finalizer.is_some();
        let abrupt_finally = self.asm.new_label();

        if has_finally {
            self.finally_depth += 1;
        }
        self.compile_block(&try_stmt.block.body, &options.with_catch(Some(catch_label)))?;
        self.asm.jump(OpCode::Jmp, normal);

        self.asm.mark(catch_label);
        self.emit_unwind(depth_slot);
        match &try_stmt.handler {
            Some(handler) => {
                let handler_catch = if has_finally {
                    Some(abrupt_finally)
                } else {
                    options.catch_pc
                };
                let handler_options = options.with_catch(handler_catch);
                self.emit_helper(Helper::GetCompletionError, &options.pushing());
                self.scope.begin_scope();
                match &handler.param {
                    Some(param) => match self.scope.declare(&param.name, true, Type::Any) {
                        Some(_) => {
                            self.scope.mark_initialized(&param.name);
                            self.emit_set_variable(&param.name, true);
                        }
                        None => self.asm.op(OpCode::Drop),
                    },
                    None => self.asm.op(OpCode::Drop),
                }
                for stmt in &handler.body.body {
                    self.compile_statement(stmt, &handler_options)?;
                }
                self.scope.end_scope();
                self.asm.jump(OpCode::Jmp, normal);
            }
            None if has_finally => self.asm.jump(OpCode::Jmp, abrupt_finally),
            None => {
                self.report_unsupported("'try' without 'catch' or 'finally'");
                self.emit_helper(Helper::ThrowCompletion, options);
            }
        }
        if has_finally {
            self.finally_depth -= 1;
        }

        if let Some(finalizer) = &try_stmt.finalizer {
            // Abrupt path: park the completion, run the block, rethrow.
            self.asm.mark(abrupt_finally);
            self.emit_unwind(depth_slot);
            let pending = self.scope.allocate_hidden();
            self.emit_store_hidden(pending);
            self.compile_block(&finalizer.body, options)?;
            self.emit_load_hidden(pending);
            self.emit_helper(Helper::ThrowCompletion, options);

            self.asm.mark(normal);
            self.compile_block(&finalizer.body, options)?;
        } else {
            self.asm.mark(normal);
        }
        Ok(())
    }
}
