//! Error and diagnostic types

use miette::SourceSpan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source location span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of source
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
}

impl Span {
    /// Create a span with byte offset only
    pub fn new(offset: usize, length: usize) -> Self {
        Self {
            offset,
            length,
            line: 0,
            column: 0,
        }
    }

    /// Create a span with byte offset, line and column
    pub fn with_location(offset: usize, length: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            length,
            line,
            column,
        }
    }

    /// Byte offset right after the span
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Span covering both `self` and `other`, keeping the location of the earlier one
    pub fn cover(&self, other: &Span) -> Span {
        let (first, _) = if self.offset <= other.offset {
            (self, other)
        } else {
            (other, self)
        };
        let end = self.end().max(other.end());
        Span {
            offset: first.offset,
            length: end - first.offset,
            line: first.line,
            column: first.column,
        }
    }

    /// Same span moved `delta` bytes to the right. Line information is dropped
    /// unless `line_delta` re-bases it.
    pub fn shifted(&self, delta: usize, line_delta: Option<(usize, usize)>) -> Span {
        let (line, column) = match line_delta {
            Some((base_line, base_column)) if self.line == 1 => {
                (base_line, base_column + self.column - 1)
            }
            Some((base_line, _)) if self.line > 1 => (base_line + self.line - 1, self.column),
            _ => (0, 0),
        };
        Span {
            offset: self.offset + delta,
            length: self.length,
            line,
            column,
        }
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.offset.into(), span.length)
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Diagnostic message produced while parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
    pub labels: Vec<Label>,
}

/// Label for source annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            span: None,
            help: None,
            labels: Vec::new(),
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            help: None,
            labels: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_label(mut self, message: impl Into<String>, span: Span) -> Self {
        self.labels.push(Label {
            message: message.into(),
            span,
        });
        self
    }

    /// Get the error code string (e.g., "E1001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// Types of diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// E1000: The lexer could not tokenize part of the input
    LexerError,
    /// E1001: A statement is missing required content
    IncompleteStatement,
    /// E1002: A token no grammar element accepts
    UnexpectedToken,
    /// E1003: Nesting exceeded the recursion limit
    RecursionLimit,
    /// E1004: Input left unparsed after an internal parser failure
    UnparsedInput,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::LexerError => "E1000",
            DiagnosticKind::IncompleteStatement => "E1001",
            DiagnosticKind::UnexpectedToken => "E1002",
            DiagnosticKind::RecursionLimit => "E1003",
            DiagnosticKind::UnparsedInput => "E1004",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticKind::LexerError => "lexer-error",
            DiagnosticKind::IncompleteStatement => "incomplete-statement",
            DiagnosticKind::UnexpectedToken => "unexpected-token",
            DiagnosticKind::RecursionLimit => "recursion-limit",
            DiagnosticKind::UnparsedInput => "unparsed-input",
        }
    }
}

/// Errors raised while loading token, grammar or dialect definitions.
///
/// These are configuration errors: a dialect whose definitions fail to load
/// is not usable at all.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("undefined token type '{0}'")]
    UndefinedTokenType(String),

    #[error("duplicate token type '{0}'")]
    DuplicateTokenType(String),

    #[error("invalid {what} definition '{element}': missing '{attribute}' attribute")]
    MissingAttribute {
        what: &'static str,
        element: String,
        attribute: &'static str,
    },

    #[error("invalid value '{value}' for '{attribute}' in '{element}': {reason}")]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid {kind} definition '{element}': expected {expected}, found {found} children")]
    ChildCount {
        kind: &'static str,
        element: String,
        expected: &'static str,
        found: usize,
    },

    #[error("could not resolve element definition '{kind}' in '{element}'")]
    UnknownElementKind { kind: String, element: String },

    #[error("duplicate element definition '{0}'")]
    DuplicateElement(String),

    #[error("duplicate root element '{0}'")]
    DuplicateRoot(String),

    #[error("no element carries the ROOT attribute")]
    MissingRoot,

    #[error("sequence '{element}' marks more than one child as exit")]
    AmbiguousExit { element: String },

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dialect definition '{path}': {source}")]
    DialectSyntax {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("malformed token definition: {0}")]
    TokenSyntax(#[from] toml::de::Error),

    #[error("malformed grammar definition: {0}")]
    GrammarSyntax(#[from] serde_json::Error),
}

/// Conditions that abort the structured parse of a statement or file.
///
/// The driver converts every variant except `Cancelled` into tree content, so
/// callers of [`crate::Parser::parse`] never see them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("recursion limit of {0} nested elements exceeded")]
    RecursionLimit(usize),

    #[error("token type index {0} is not defined in the registry")]
    UnknownTokenType(usize),

    #[error("parse cancelled")]
    Cancelled,
}
