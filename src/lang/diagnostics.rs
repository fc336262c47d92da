use std::fmt;

use super::ast::InputSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: InputSpan,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Info => write!(f, " INFO: ")?,
            Severity::Error => write!(f, "ERROR: ")?,
        }
        writeln!(f, "{}", &self.message)?;
        write!(f, " +- at {}", self.span)
    }
}

/// Accumulated diagnostics of one binding pass. Binders each own one of these
/// and merge the ones of nested binders explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub(crate) statements: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self{ statements: Vec::new() }
    }

    pub(crate) fn error<S: ToString>(&mut self, span: InputSpan, message: S) {
        self.statements.push(Diagnostic{
            severity: Severity::Error,
            span,
            message: message.to_string(),
        });
    }

    pub(crate) fn info<S: ToString>(&mut self, span: InputSpan, message: S) {
        self.statements.push(Diagnostic{
            severity: Severity::Info,
            span,
            message: message.to_string(),
        });
    }

    pub(crate) fn merge(&mut self, other: Diagnostics) {
        self.statements.extend(other.statements);
    }

    pub fn has_errors(&self) -> bool {
        self.statements.iter().any(|v| v.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.statements.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.statements.is_empty() {
            return Ok(())
        }

        fmt::Display::fmt(&self.statements[0], f)?;
        for statement in self.statements.iter().skip(1) {
            writeln!(f)?;
            fmt::Display::fmt(statement, f)?;
        }

        Ok(())
    }
}
