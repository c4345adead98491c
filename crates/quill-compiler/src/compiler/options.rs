//! Per-node visiting context.
//!
//! A [`VisitOptions`] travels down the tree by value. A node compiler that
//! needs a different context for a child derives one with the builder
//! methods; siblings never see each other's overrides.

use super::codegen::Label;
use crate::types::Type;

/// How a node should be compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitOptions {
    /// Leave the node's value on the stack
    pub push_value: bool,
    /// Where an abrupt completion jumps, if inside a `try`
    pub catch_pc: Option<Label>,
    /// Target of `break`
    pub break_pc: Option<Label>,
    /// Target of `continue`
    pub continue_pc: Option<Label>,
    /// Type asserted by an enclosing `as` expression
    pub cast: Option<Type>,
    /// Static type of the enclosing `switch` discriminant
    pub switch_expression_type: Option<Type>,
    /// Base class of the class whose member is being compiled
    pub super_class: Option<String>,
}

impl Default for VisitOptions {
    fn default() -> Self {
        Self {
            push_value: true,
            catch_pc: None,
            break_pc: None,
            continue_pc: None,
            cast: None,
            switch_expression_type: None,
            super_class: None,
        }
    }
}

impl VisitOptions {
    /// Options for a statement-level node: nothing is pushed.
    pub fn statement() -> Self {
        Self {
            push_value: false,
            ..Self::default()
        }
    }

    /// Same context, value kept.
    pub fn pushing(&self) -> Self {
        Self {
            push_value: true,
            cast: None,
            ..self.clone()
        }
    }

    /// Same context, value discarded.
    pub fn discarding(&self) -> Self {
        Self {
            push_value: false,
            cast: None,
            ..self.clone()
        }
    }

    /// Overrides the catch target.
    pub fn with_catch(&self, catch_pc: Option<Label>) -> Self {
        Self {
            catch_pc,
            ..self.clone()
        }
    }

    /// Overrides the loop targets.
    pub fn with_loop(&self, break_pc: Label, continue_pc: Option<Label>) -> Self {
        Self {
            break_pc: Some(break_pc),
            continue_pc: continue_pc.or(self.continue_pc),
            ..self.clone()
        }
    }

    /// Sets the asserted type.
    pub fn with_cast(&self, cast: Type) -> Self {
        Self {
            cast: Some(cast),
            ..self.clone()
        }
    }

    /// Sets the switch discriminant type.
    pub fn with_switch_type(&self, ty: Type) -> Self {
        Self {
            switch_expression_type: Some(ty),
            ..self.clone()
        }
    }

    /// Sets the base class.
    pub fn with_super_class(&self, super_class: Option<String>) -> Self {
        Self {
            super_class,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_do_not_leak() {
        let base = VisitOptions::statement().with_super_class(Some("Base".into()));
        let child = base.pushing().with_cast(Type::Number);
        assert!(child.push_value);
        assert_eq!(child.super_class.as_deref(), Some("Base"));
        assert!(!base.push_value);
        assert_eq!(base.cast, None);
        assert_eq!(child.discarding().cast, None);
    }
}
