use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    /// Malformed or unknown directive syntax.
    #[error("{0}")]
    Syntax(String),
    /// Nested `writing`/`choice` bodies went deeper than the configured limit.
    #[error("maximum recursion depth of {limit} exceeded at depth {depth}")]
    RecursionLimitExceeded {
        depth: usize,
        limit: usize,
        /// Enclosing directive fragments, outermost first.
        trail: Vec<String>,
    },
}

/// Parse errors with source location information.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: `{fragment}`")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// The offending piece of template text.
    pub fragment: String,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn error(
        reason: impl Into<String>,
        fragment: impl Into<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind: ParseErrorKind::Syntax(reason.into()),
            fragment: fragment.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn recursion_limit(
        depth: usize,
        limit: usize,
        trail: Vec<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        let fragment = trail.last().cloned().unwrap_or_default();
        ParseError {
            kind: ParseErrorKind::RecursionLimitExceeded {
                depth,
                limit,
                trail,
            },
            fragment,
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Human-readable reason, without the fragment.
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }

    pub fn is_recursion_limit(&self) -> bool {
        matches!(self.kind, ParseErrorKind::RecursionLimitExceeded { .. })
    }

    /// Name of the error class shown to template authors.
    pub fn error_type(&self) -> &'static str {
        match self.kind {
            ParseErrorKind::Syntax(_) => "InstructionParseError",
            ParseErrorKind::RecursionLimitExceeded { .. } => "ParsedRecursionDepthLimit",
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let mut notes = self.notes.clone();
        if let ParseErrorKind::RecursionLimitExceeded { trail, .. } = &self.kind {
            notes.extend(
                trail
                    .iter()
                    .enumerate()
                    .map(|(level, fragment)| format!("depth {}: {}", level, fragment)),
            );
        }
        Diagnostic::error()
            .with_message(self.to_string())
            .with_labels(vec![
                Label::primary(self.file_id, self.span.clone()).with_message(self.reason()),
            ])
            .with_notes(notes)
    }
}
