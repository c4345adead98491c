//! Source-to-source rewriting that runs before code generation.
//!
//! Smart contract classes cannot keep a constructor or plain instance
//! fields: a contract is instantiated once, at deploy time, and its state
//! lives in storage. The transpiler turns the constructor into a public
//! `deploy` method and every supported instance property into a pair of
//! storage-backed accessors. Other classes pass through untouched.

mod class;

use crate::CompileOptions;
use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use rustc_hash::{FxHashMap, FxHashSet};

/// Name of the synthesized contract initializer.
pub const DEPLOY_METHOD: &str = "deploy";

/// Rewrites contract classes of a module.
pub struct Transpiler {
    contract_base: String,
    diagnostics: Diagnostics,
    /// Class declarations as written
    classes: FxHashMap<String, ClassDeclaration>,
    /// Rewritten classes, filled as they are visited
    transpiled: FxHashMap<String, ClassDeclaration>,
    in_progress: FxHashSet<String>,
}

impl Transpiler {
    /// Creates a transpiler.
    pub fn new(options: &CompileOptions) -> Self {
        Self {
            contract_base: options.contract_base.clone(),
            diagnostics: Diagnostics::with_limit(options.max_diagnostics),
            classes: FxHashMap::default(),
            transpiled: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    /// Returns the rewritten module.
    pub fn transpile(&mut self, program: &Program) -> Program {
        tracing::debug!("transpiling {} statements", program.body.len());
        for stmt in &program.body {
            if let Statement::ClassDeclaration(decl) = stmt {
                self.classes
                    .entry(decl.id.name.clone())
                    .or_insert_with(|| decl.clone());
            }
        }

        let body = program
            .body
            .iter()
            .map(|stmt| match stmt {
                Statement::ClassDeclaration(decl) => {
                    Statement::ClassDeclaration(self.visit_class(decl))
                }
                other => other.clone(),
            })
            .collect();
        tracing::debug!("transpiled {} classes", self.transpiled.len());
        Program { body }
    }

    /// Diagnostics reported so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.items()
    }

    /// Consumes the transpiler, returning its diagnostics.
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// True when `decl` derives, directly or not, from the contract base.
    pub fn is_smart_contract(&self, decl: &ClassDeclaration) -> bool {
        let mut base = decl.super_class.as_ref().map(|id| id.name.as_str());
        let mut seen = FxHashSet::default();
        while let Some(name) = base {
            if name == self.contract_base {
                return true;
            }
            if !seen.insert(name) {
                return false;
            }
            base = self
                .classes
                .get(name)
                .and_then(|class| class.super_class.as_ref())
                .map(|id| id.name.as_str());
        }
        false
    }

    /// Rewrites a class once; bases are rewritten first.
    fn visit_class(&mut self, decl: &ClassDeclaration) -> ClassDeclaration {
        let name = decl.id.name.clone();
        if let Some(done) = self.transpiled.get(&name) {
            return done.clone();
        }
        if !self.is_smart_contract(decl) || !self.in_progress.insert(name.clone()) {
            return decl.clone();
        }

        if let Some(base) = decl
            .super_class
            .as_ref()
            .and_then(|id| self.classes.get(&id.name))
            .cloned()
        {
            self.visit_class(&base);
        }

        tracing::debug!("synthesizing deploy for contract '{}'", name);
        let rewritten = self.transpile_deploy(decl);
        self.in_progress.remove(&name);
        self.transpiled.insert(name, rewritten.clone());
        rewritten
    }

    /// The nearest `deploy` up the base class chain of `decl`.
    fn base_deploy(&self, decl: &ClassDeclaration) -> Option<MethodDefinition> {
        let mut base = decl.super_class.as_ref().map(|id| id.name.clone());
        let mut steps = 0;
        while let Some(name) = base {
            let class = self
                .transpiled
                .get(&name)
                .or_else(|| self.classes.get(&name))?;
            if let Some(deploy) = class.method(DEPLOY_METHOD) {
                return Some(deploy.clone());
            }
            steps += 1;
            if steps > self.classes.len() {
                return None;
            }
            base = class.super_class.as_ref().map(|id| id.name.clone());
        }
        None
    }

    fn report(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message, span));
    }
}
