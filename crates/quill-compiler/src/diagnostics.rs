//! Compile-time diagnostics.
//!
//! Diagnostics are produced by the transpiler and the emitter and handed to
//! the caller; rendering and exit codes belong to the tooling layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A source location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// 1-based line (0 when unknown)
    pub line: u32,
    /// 1-based column (0 when unknown)
    pub column: u32,
}

impl Span {
    /// Creates a span at the given position.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Syntax outside the compiled subset
    UnsupportedSyntax,
    /// A type could not be determined
    UnknownType,
    /// Reference to an undeclared name
    UnknownIdentifier,
    /// A literal the target machine cannot represent
    InvalidLiteral,
    /// A reserved member name was declared
    ReservedMethod,
    /// Assignment to something that is not assignable
    InvalidAssignment,
    /// A contract property whose type cannot be storage backed
    UnsupportedProperty,
}

impl DiagnosticCode {
    /// Numeric code shown to users.
    pub fn number(self) -> u32 {
        match self {
            DiagnosticCode::UnsupportedSyntax => 1001,
            DiagnosticCode::UnknownType => 1002,
            DiagnosticCode::UnknownIdentifier => 1003,
            DiagnosticCode::InvalidLiteral => 1004,
            DiagnosticCode::ReservedMethod => 1005,
            DiagnosticCode::InvalidAssignment => 1006,
            DiagnosticCode::UnsupportedProperty => 1007,
        }
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Prevents the artifact from being produced
    Error,
    /// Reported, compilation proceeds
    Warning,
}

/// A single compile-time report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code
    pub code: DiagnosticCode,
    /// Human readable message
    pub message: String,
    /// Where it happened
    pub span: Span,
    /// Error or warning
    pub severity: Severity,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            severity: Severity::Error,
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            severity: Severity::Warning,
        }
    }

    /// Whether this diagnostic blocks the artifact.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}[QL{}] {}: {}",
            level,
            self.code.number(),
            self.span,
            self.message
        )
    }
}

/// Accumulates diagnostics up to a limit.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    limit: Option<usize>,
}

impl Diagnostics {
    /// Creates an empty, limited accumulator.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Records a diagnostic unless the limit has been reached.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if let Some(limit) = self.limit {
            if self.items.len() >= limit {
                return;
            }
        }
        tracing::debug!("diagnostic: {}", diagnostic);
        self.items.push(diagnostic);
    }

    /// True if any error diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// The recorded diagnostics.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Moves every diagnostic of `other` into this accumulator.
    pub fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other.items {
            self.push(diagnostic);
        }
    }

    /// Consumes the accumulator.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_location() {
        let diagnostic = Diagnostic::error(
            DiagnosticCode::UnknownType,
            "Could not determine type of property.",
            Span::new(3, 5),
        );
        assert_eq!(
            diagnostic.to_string(),
            "error[QL1002] 3:5: Could not determine type of property."
        );
    }

    #[test]
    fn test_limit_drops_overflow() {
        let mut diagnostics = Diagnostics::with_limit(1);
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::UnsupportedSyntax,
            "a",
            Span::default(),
        ));
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::UnsupportedSyntax,
            "b",
            Span::default(),
        ));
        assert_eq!(diagnostics.items().len(), 1);
        assert!(!diagnostics.has_errors());
    }
}
