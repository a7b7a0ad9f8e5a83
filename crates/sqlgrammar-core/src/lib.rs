//! sqlgrammar-core: declarative grammar driven SQL parsing
//!
//! Token types and grammars are loaded from definition files. The parser
//! walks the grammar over a token stream and always produces a tree that
//! covers the whole input, with error nodes and diagnostics where the input
//! does not follow the grammar. Embedded procedural blocks stay as deferred
//! chameleon regions until they are expanded with their own dialect.

pub mod chameleon;
pub mod dialect;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod lookup;
pub mod parser;
pub mod token;
pub mod tree;

pub use chameleon::{expand, expand_with};
pub use dialect::{Dialect, DialectDefinition, DialectSet, Language};
pub use error::{DefinitionError, Diagnostic, DiagnosticKind, ParseError, Severity, Span};
pub use grammar::{Branch, ElementId, Grammar, LATEST_VERSION};
pub use lexer::{Lexed, Lexer, SqlLexer};
pub use lookup::LookupTable;
pub use parser::{ParseOptions, Parser};
pub use token::{Token, TokenRegistry, TokenSet, TokenTypeId};
pub use tree::{ChameleonRegion, NodeKind, SyntaxElement, SyntaxNode, SyntaxTree};
