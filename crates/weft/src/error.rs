//! Source-located compile errors.
//!
//! Two user-facing kinds exist: structural (illegal tag usage) and
//! resolution (a referenced tag cannot be located). Internal-consistency
//! failures are compiler defects and are guarded by debug assertions, not
//! represented here.

use std::fmt;

use ariadne::{Label, Report, ReportKind, Source};

use crate::ast::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Resolution,
}

#[derive(Clone, Debug)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
}

impl CompileError {
    pub fn structural(span: Span, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Structural,
            span,
            message: message.into(),
        }
    }

    pub fn resolution(span: Span, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Resolution,
            span,
            message: message.into(),
        }
    }

    /// Render a human-readable report against the template source.
    pub fn write_report(
        &self,
        source_name: &str,
        source: &str,
        out: &mut impl std::io::Write,
    ) -> std::io::Result<()> {
        let span = self.span.start as usize..self.span.end.max(self.span.start) as usize;
        Report::build(ReportKind::Error, (source_name, span.clone()))
            .with_message(&self.message)
            .with_label(Label::new((source_name, span)).with_message(match self.kind {
                ErrorKind::Structural => "invalid template structure",
                ErrorKind::Resolution => "cannot be resolved",
            }))
            .finish()
            .write((source_name, Source::from(source)), out)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Structural => "structural",
            ErrorKind::Resolution => "resolution",
        };
        write!(
            f,
            "{kind} error at {}..{}: {}",
            self.span.start, self.span.end, self.message
        )
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, Vec<CompileError>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_span_and_kind() {
        let err = CompileError::structural(Span::new(3, 7), "missing `of=` attribute");
        let text = err.to_string();
        assert!(text.contains("structural"));
        assert!(text.contains("3..7"));
    }
}
