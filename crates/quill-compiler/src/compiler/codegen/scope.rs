//! Scope management for variable resolution during compilation.
//!
//! At runtime the scope context sits on top of the alt stack as
//! `[frames, this, global]`. `frames[d]` is the slot array of the function at
//! lexical depth `d` (0 is the module). Every binding is resolved at compile
//! time to a `(depth, slot)` pair; block scoping only affects name lookup,
//! slots are never reused within a frame.

use super::assembler::FrameId;
use super::Compiler;
use crate::compiler::bytecode::OpCode;
use crate::compiler::helpers::Helper;
use crate::compiler::options::VisitOptions;
use crate::diagnostics::DiagnosticCode;
use crate::types::Type;

/// A local variable in a scope.
#[derive(Debug, Clone)]
pub struct Local {
    /// The variable name
    pub name: String,
    /// The block depth where this was declared
    pub depth: usize,
    /// Whether the variable is mutable (let vs const)
    pub mutable: bool,
    /// Whether the variable has been initialized
    pub initialized: bool,
    /// Slot in the function's frame
    pub slot: usize,
    /// Declared or inferred type
    pub ty: Type,
}

/// The compile-time view of one runtime frame.
#[derive(Debug)]
pub struct FunctionScope {
    /// Local variables, innermost last
    pub locals: Vec<Local>,
    /// Current block depth within the function
    pub depth: usize,
    /// Frame whose size this scope determines
    pub frame: FrameId,
    /// Slots allocated so far
    pub slots: usize,
    /// Hidden slot holding the evaluation stack depth at entry
    pub entry_depth_slot: Option<usize>,
    /// Static type of `this`
    pub this_type: Type,
}

impl FunctionScope {
    fn new(frame: FrameId, this_type: Type) -> Self {
        Self {
            locals: Vec::new(),
            depth: 0,
            frame,
            slots: 0,
            entry_depth_slot: None,
            this_type,
        }
    }
}

/// A resolved variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Lexical function depth (index into the runtime frames array)
    pub function_depth: usize,
    /// Slot within that frame
    pub slot: usize,
    /// let vs const
    pub mutable: bool,
    /// Whether the declaration has run
    pub initialized: bool,
    /// Static type
    pub ty: Type,
}

/// The chain of function scopes, module first.
#[derive(Debug, Default)]
pub struct Scope {
    functions: Vec<FunctionScope>,
}

impl Scope {
    /// Creates an empty scope chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a new function (or the module) with its own frame.
    pub fn enter_function(&mut self, frame: FrameId, this_type: Type) {
        self.functions.push(FunctionScope::new(frame, this_type));
    }

    /// Leaves the innermost function, returning its frame and slot count.
    pub fn exit_function(&mut self) -> Option<(FrameId, usize)> {
        self.functions
            .pop()
            .map(|function| (function.frame, function.slots))
    }

    /// Lexical depth of the innermost function (0 = module).
    pub fn function_depth(&self) -> usize {
        self.functions.len().saturating_sub(1)
    }

    /// True inside a function body (as opposed to module code).
    pub fn in_function(&self) -> bool {
        self.functions.len() > 1
    }

    /// The innermost function scope.
    pub fn current(&self) -> Option<&FunctionScope> {
        self.functions.last()
    }

    fn current_mut(&mut self) -> Option<&mut FunctionScope> {
        self.functions.last_mut()
    }

    /// Begin a new block scope.
    pub fn begin_scope(&mut self) {
        if let Some(function) = self.current_mut() {
            function.depth += 1;
        }
    }

    /// End the current block scope and return the number of names dropped.
    pub fn end_scope(&mut self) -> usize {
        let Some(function) = self.current_mut() else {
            return 0;
        };
        let mut count = 0;
        while function
            .locals
            .last()
            .is_some_and(|local| local.depth == function.depth)
        {
            function.locals.pop();
            count += 1;
        }
        function.depth = function.depth.saturating_sub(1);
        count
    }

    /// Declare a local variable, returning its slot.
    ///
    /// Returns `None` if the name is already declared in the same block.
    pub fn declare(&mut self, name: &str, mutable: bool, ty: Type) -> Option<usize> {
        let function = self.current_mut()?;
        for local in function.locals.iter().rev() {
            if local.depth < function.depth {
                break;
            }
            if local.name == name {
                return None;
            }
        }

        let slot = function.slots;
        function.slots += 1;
        function.locals.push(Local {
            name: name.to_string(),
            depth: function.depth,
            mutable,
            initialized: false,
            slot,
            ty,
        });
        Some(slot)
    }

    /// Allocates an unnamed slot in the innermost frame.
    pub fn allocate_hidden(&mut self) -> usize {
        match self.current_mut() {
            Some(function) => {
                let slot = function.slots;
                function.slots += 1;
                slot
            }
            None => 0,
        }
    }

    /// Mark the innermost declaration of `name` as initialized.
    pub fn mark_initialized(&mut self, name: &str) {
        if let Some(local) = self
            .current_mut()
            .and_then(|function| function.locals.iter_mut().rev().find(|l| l.name == name))
        {
            local.initialized = true;
        }
    }

    /// Narrows the recorded type of the innermost declaration of `name`.
    pub fn set_type(&mut self, name: &str, ty: Type) {
        if let Some(local) = self
            .current_mut()
            .and_then(|function| function.locals.iter_mut().rev().find(|l| l.name == name))
        {
            local.ty = ty;
        }
    }

    /// Resolve a variable by name, innermost function first.
    pub fn resolve(&self, name: &str) -> Option<Binding> {
        for (function_depth, function) in self.functions.iter().enumerate().rev() {
            if let Some(local) = function.locals.iter().rev().find(|l| l.name == name) {
                return Some(Binding {
                    function_depth,
                    slot: local.slot,
                    mutable: local.mutable,
                    initialized: local.initialized,
                    ty: local.ty.clone(),
                });
            }
        }
        None
    }

    /// Static type of `this` in the innermost function.
    pub fn this_type(&self) -> Type {
        self.current()
            .map(|function| function.this_type.clone())
            .unwrap_or(Type::Any)
    }

    /// Records the hidden entry depth slot of the innermost function.
    pub fn set_entry_depth_slot(&mut self, slot: usize) {
        if let Some(function) = self.current_mut() {
            function.entry_depth_slot = Some(slot);
        }
    }

    /// The innermost function's entry depth slot.
    pub fn entry_depth_slot(&self) -> Option<usize> {
        self.current().and_then(|function| function.entry_depth_slot)
    }
}

// ==================== Runtime scope operations ====================

impl Compiler {
    /// `[] -> [this]`
    pub(crate) fn emit_get_this(&mut self) {
        self.asm
            .ops(&[OpCode::DupFromAltStack, OpCode::Push1, OpCode::PickItem]);
    }

    /// `[] -> [global]`
    pub(crate) fn emit_get_global(&mut self) {
        self.asm
            .ops(&[OpCode::DupFromAltStack, OpCode::Push2, OpCode::PickItem]);
    }

    /// `[] -> [frames[depth]]`
    fn emit_get_frame(&mut self, function_depth: usize) {
        self.asm
            .ops(&[OpCode::DupFromAltStack, OpCode::Push0, OpCode::PickItem]);
        self.asm.push_int(function_depth);
        self.asm.op(OpCode::PickItem);
    }

    /// `[] -> [value]`
    pub(crate) fn emit_load_slot(&mut self, function_depth: usize, slot: usize) {
        self.emit_get_frame(function_depth);
        self.asm.push_int(slot);
        self.asm.op(OpCode::PickItem);
    }

    /// `[value] -> []`
    pub(crate) fn emit_store_slot(&mut self, function_depth: usize, slot: usize) {
        self.emit_get_frame(function_depth);
        self.asm.push_int(slot);
        self.asm.ops(&[OpCode::Rot, OpCode::SetItem]);
    }

    /// Loads a hidden slot of the innermost function.
    pub(crate) fn emit_load_hidden(&mut self, slot: usize) {
        let depth = self.scope.function_depth();
        self.emit_load_slot(depth, slot);
    }

    /// Stores into a hidden slot of the innermost function.
    pub(crate) fn emit_store_hidden(&mut self, slot: usize) {
        let depth = self.scope.function_depth();
        self.emit_store_slot(depth, slot);
    }

    /// `[] -> [value]`; an unknown name is reported and yields `undefined`.
    pub(crate) fn emit_get_variable(&mut self, name: &str, options: &VisitOptions) {
        match self.scope.resolve(name) {
            Some(binding) => {
                if options.push_value {
                    self.emit_load_slot(binding.function_depth, binding.slot);
                }
            }
            None => {
                self.report(
                    DiagnosticCode::UnknownIdentifier,
                    format!("Unknown identifier '{}'.", name),
                );
                if options.push_value {
                    self.emit_helper(Helper::PushUndefined, options);
                }
            }
        }
    }

    /// `[value] -> []`
    pub(crate) fn emit_set_variable(&mut self, name: &str, is_declaration: bool) {
        match self.scope.resolve(name) {
            Some(binding) if binding.mutable || is_declaration => {
                self.emit_store_slot(binding.function_depth, binding.slot);
            }
            Some(_) => {
                self.report(
                    DiagnosticCode::InvalidAssignment,
                    format!("Cannot assign to '{}' because it is a constant.", name),
                );
                self.asm.op(OpCode::Drop);
            }
            None => {
                self.report(
                    DiagnosticCode::UnknownIdentifier,
                    format!("Unknown identifier '{}'.", name),
                );
                self.asm.op(OpCode::Drop);
            }
        }
    }

    /// `[] -> [context']`: a capture of the current scope context whose
    /// frames are copies, so later writes by the enclosing code stay
    /// invisible to the capture.
    pub(crate) fn emit_push_all(&mut self) {
        self.asm.op(OpCode::DupFromAltStack);
        self.emit_helper(Helper::CloneFrames, &VisitOptions::default());
    }

    /// `[this] -> [context]` for a static call: frames hold only the
    /// module frame, `this` is the receiver, global is shared.
    pub(crate) fn emit_method_context(&mut self) {
        // [this] -> [global, this]
        self.emit_get_global();
        // [global, this] -> [this, global]
        self.asm.op(OpCode::Swap);
        // [frames, this, global]
        self.emit_get_frame(0);
        self.asm.ops(&[OpCode::Push1, OpCode::Pack]);
        self.asm.ops(&[OpCode::Push3, OpCode::Pack]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_new() {
        let scope = Scope::new();
        assert_eq!(scope.function_depth(), 0);
        assert!(!scope.in_function());
    }

    #[test]
    fn test_block_scopes_keep_slots_unique() {
        let mut scope = Scope::new();
        scope.enter_function(FrameId(0), Type::Undefined);
        scope.begin_scope();
        assert_eq!(scope.declare("x", true, Type::Number), Some(0));
        assert_eq!(scope.end_scope(), 1);
        scope.begin_scope();
        assert_eq!(scope.declare("x", true, Type::Number), Some(1));
        assert_eq!(scope.exit_function(), Some((FrameId(0), 2)));
    }

    #[test]
    fn test_scope_duplicate_rejected() {
        let mut scope = Scope::new();
        scope.enter_function(FrameId(0), Type::Undefined);
        assert!(scope.declare("x", true, Type::Any).is_some());
        assert!(scope.declare("x", true, Type::Any).is_none());
    }

    #[test]
    fn test_resolve_walks_outward() {
        let mut scope = Scope::new();
        scope.enter_function(FrameId(0), Type::Undefined);
        scope.declare("outer", false, Type::String);
        scope.enter_function(FrameId(1), Type::Any);
        scope.declare("inner", true, Type::Number);
        let hidden = scope.allocate_hidden();
        assert_eq!(hidden, 1);

        let outer = scope.resolve("outer").unwrap();
        assert_eq!((outer.function_depth, outer.slot), (0, 0));
        assert!(!outer.mutable);
        let inner = scope.resolve("inner").unwrap();
        assert_eq!((inner.function_depth, inner.slot), (1, 0));
        assert_eq!(scope.resolve("missing"), None);
    }

    #[test]
    fn test_shadowing_prefers_innermost() {
        let mut scope = Scope::new();
        scope.enter_function(FrameId(0), Type::Undefined);
        scope.declare("x", true, Type::String);
        scope.begin_scope();
        scope.declare("x", true, Type::Number);
        assert_eq!(scope.resolve("x").unwrap().ty, Type::Number);
        scope.end_scope();
        assert_eq!(scope.resolve("x").unwrap().ty, Type::String);
    }
}
