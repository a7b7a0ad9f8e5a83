//! Token types and the token registry

mod registry;
mod set;

pub use registry::{SharedTokens, TokenCatalog, TokenDefinition, TokenRegistry, TokenSetDefinition};
pub use set::TokenSet;

use serde::{Deserialize, Serialize};

use crate::dialect::Language;
use crate::error::Span;

/// Dense index of a token type inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenTypeId(u32);

impl TokenTypeId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lexical category of a token type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    Keyword,
    Function,
    Parameter,
    Datatype,
    Object,
    Exception,
    Operator,
    Character,
    Identifier,
    Chameleon,
    Literal,
    Numeric,
    Whitespace,
    Comment,
}

impl TokenCategory {
    /// Categories whose members are reserved words
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            TokenCategory::Keyword
                | TokenCategory::Function
                | TokenCategory::Parameter
                | TokenCategory::Datatype
        )
    }

    /// Whitespace and comments are skipped by the parser
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenCategory::Whitespace | TokenCategory::Comment)
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenCategory::Keyword => "keyword",
            TokenCategory::Function => "function",
            TokenCategory::Parameter => "parameter",
            TokenCategory::Datatype => "datatype",
            TokenCategory::Object => "object",
            TokenCategory::Exception => "exception",
            TokenCategory::Operator => "operator",
            TokenCategory::Character => "character",
            TokenCategory::Identifier => "identifier",
            TokenCategory::Chameleon => "chameleon",
            TokenCategory::Literal => "literal",
            TokenCategory::Numeric => "numeric",
            TokenCategory::Whitespace => "whitespace",
            TokenCategory::Comment => "comment",
        }
    }
}

/// Spacing hint around a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Spacing {
    NoSpace,
    OneSpace,
    LineBreak,
}

/// Default formatting hint carried by a token type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Formatting {
    pub before: Option<Spacing>,
    pub after: Option<Spacing>,
}

impl Formatting {
    /// Hint used for token types that do not declare one
    pub fn for_category(category: TokenCategory) -> Self {
        match category {
            TokenCategory::Character => Formatting {
                before: Some(Spacing::NoSpace),
                after: None,
            },
            TokenCategory::Whitespace | TokenCategory::Comment | TokenCategory::Chameleon => {
                Formatting::default()
            }
            _ => Formatting {
                before: Some(Spacing::OneSpace),
                after: Some(Spacing::OneSpace),
            },
        }
    }
}

/// A lexical token type, immutable once the registry is loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenType {
    pub index: TokenTypeId,
    pub id: String,
    pub value: Option<String>,
    pub description: Option<String>,
    pub category: TokenCategory,
    /// Reserved word that may never act as an identifier
    pub reserved: bool,
    /// Member of at least one token set
    pub registered: bool,
    pub formatting: Formatting,
    pub object_type: Option<String>,
    /// Embedded language of a chameleon token
    pub language: Option<Language>,
}

impl TokenType {
    pub fn is_identifier(&self) -> bool {
        self.category == TokenCategory::Identifier
    }

    pub fn is_chameleon(&self) -> bool {
        self.category == TokenCategory::Chameleon
    }

    pub fn is_function(&self) -> bool {
        self.category == TokenCategory::Function
    }

    pub fn is_trivia(&self) -> bool {
        self.category.is_trivia()
    }

    pub fn is_reserved_word(&self) -> bool {
        self.category.is_reserved()
    }

    /// A reserved word that can act as an identifier in some contexts
    pub fn is_suppressible_reserved_word(&self) -> bool {
        self.is_reserved_word() && !self.reserved
    }

    /// Tokens the parser can resynchronise on after an error
    pub fn is_parser_landmark(&self) -> bool {
        !self.is_identifier()
    }

    /// Same token type, or both identifiers
    pub fn matches(&self, other: &TokenType) -> bool {
        self.index == other.index || (self.is_identifier() && other.is_identifier())
    }

    /// Text shown for this token type in "expected" messages
    pub fn display_name(&self) -> String {
        match (&self.value, self.category) {
            (Some(value), TokenCategory::Character | TokenCategory::Operator) => {
                format!("'{}'", value)
            }
            (Some(value), _) => value.to_uppercase(),
            (None, _) => self.id.to_lowercase().replace('_', " "),
        }
    }
}

/// A lexed token handed to the parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: TokenTypeId,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenTypeId, text: impl Into<String>, span: Span) -> Self {
        Self {
            token_type,
            text: text.into(),
            span,
        }
    }
}
