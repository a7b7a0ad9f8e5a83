//! Dialects - a language with its token registry, grammar and lexer settings

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DefinitionError, ParseError};
use crate::grammar::{Branch, Grammar};
use crate::lexer::{Lexer, SqlLexer};
use crate::parser::{ParseOptions, Parser};
use crate::token::TokenRegistry;
use crate::tree::SyntaxTree;

/// Languages a grammar can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Plain SQL statements
    #[default]
    Sql,
    /// Procedural SQL blocks
    Psql,
}

impl Language {
    pub fn name(self) -> &'static str {
        match self {
            Language::Sql => "sql",
            Language::Psql => "psql",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sql" => Ok(Language::Sql),
            "psql" | "plsql" | "plpgsql" => Ok(Language::Psql),
            _ => Err(format!(
                "Unknown language: '{}'. Supported languages: sql, psql.",
                s
            )),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dialect definition file, as read from a `dialect.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DialectDefinition {
    pub id: String,
    pub language: Language,
    pub name: Option<String>,
    /// Branches active for every parse with this dialect
    #[serde(default)]
    pub branches: Vec<String>,
    /// Tokenizer dialect name understood by `sqlparser`
    #[serde(default = "default_lexer_dialect")]
    pub lexer_dialect: String,
    /// Token catalog path, relative to the definition file
    pub tokens: String,
    /// Grammar definition path, relative to the definition file
    pub grammar: String,
}

fn default_lexer_dialect() -> String {
    "generic".to_string()
}

const SQL_DIALECT: &str = include_str!("../../grammars/sql/dialect.toml");
const SQL_TOKENS: &str = include_str!("../../grammars/sql/tokens.toml");
const SQL_GRAMMAR: &str = include_str!("../../grammars/sql/grammar.json");
const PSQL_DIALECT: &str = include_str!("../../grammars/psql/dialect.toml");
const PSQL_TOKENS: &str = include_str!("../../grammars/psql/tokens.toml");
const PSQL_GRAMMAR: &str = include_str!("../../grammars/psql/grammar.json");

/// A loaded dialect, cheap to clone and shareable across threads
#[derive(Debug, Clone)]
pub struct Dialect {
    id: String,
    name: String,
    language: Language,
    branches: Vec<Branch>,
    lexer_dialect: String,
    grammar: Arc<Grammar>,
}

impl Dialect {
    /// Dialect compiled into the library for `language`
    pub fn builtin(language: Language) -> Result<Self, DefinitionError> {
        let (definition, tokens, grammar) = match language {
            Language::Sql => (SQL_DIALECT, SQL_TOKENS, SQL_GRAMMAR),
            Language::Psql => (PSQL_DIALECT, PSQL_TOKENS, PSQL_GRAMMAR),
        };
        let definition: DialectDefinition =
            toml::from_str(definition).map_err(|source| DefinitionError::DialectSyntax {
                path: format!("<builtin {}>", language),
                source,
            })?;
        Self::from_sources(definition, tokens, grammar)
    }

    /// Load a dialect from a `dialect.toml` file and the files it names
    pub fn from_definition_file(path: &Path) -> Result<Self, DefinitionError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        let content = read(path)?;
        let definition: DialectDefinition =
            toml::from_str(&content).map_err(|source| DefinitionError::DialectSyntax {
                path: path.display().to_string(),
                source,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let tokens = read(&base.join(&definition.tokens))?;
        let grammar = read(&base.join(&definition.grammar))?;
        Self::from_sources(definition, &tokens, &grammar)
    }

    /// Build a dialect from its definition and the token and grammar texts
    pub fn from_sources(
        definition: DialectDefinition,
        tokens: &str,
        grammar: &str,
    ) -> Result<Self, DefinitionError> {
        let registry = Arc::new(TokenRegistry::from_toml(tokens)?);
        let grammar = Grammar::from_json(grammar, registry)?;
        if grammar.language() != definition.language {
            return Err(DefinitionError::InvalidAttribute {
                element: definition.id,
                attribute: "language",
                value: definition.language.to_string(),
                reason: format!("grammar describes {}", grammar.language()),
            });
        }
        let branches = definition
            .branches
            .iter()
            .map(|b| {
                b.parse::<Branch>()
                    .map_err(|reason| DefinitionError::InvalidAttribute {
                        element: definition.id.clone(),
                        attribute: "branches",
                        value: b.clone(),
                        reason,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            dialect = %definition.id,
            language = %definition.language,
            tokens = grammar.registry().len(),
            elements = grammar.len(),
            "Dialect loaded"
        );

        Ok(Self {
            name: definition.name.unwrap_or_else(|| definition.id.clone()),
            id: definition.id,
            language: definition.language,
            branches,
            lexer_dialect: definition.lexer_dialect,
            grammar: Arc::new(grammar),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Branches active for every parse with this dialect
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        self.grammar.registry()
    }

    pub fn lexer(&self) -> SqlLexer {
        SqlLexer::new(Arc::clone(self.registry()), &self.lexer_dialect)
    }

    /// Options with this dialect's default branches added
    pub fn options(&self, options: &ParseOptions) -> ParseOptions {
        let mut options = options.clone();
        for branch in &self.branches {
            if !options.branches.contains(branch) {
                options.branches.push(branch.clone());
            }
        }
        options
    }

    /// Lex and parse `text`. Lexer diagnostics precede parser diagnostics.
    pub fn parse(&self, text: &str, options: &ParseOptions) -> Result<SyntaxTree, ParseError> {
        let lexed = self.lexer().tokenize(text);
        let options = self.options(options);
        let mut tree = Parser::new(&self.grammar)
            .with_options(options)
            .parse(lexed.tokens)?;
        if !lexed.diagnostics.is_empty() {
            let mut diagnostics = lexed.diagnostics;
            diagnostics.append(&mut tree.diagnostics);
            tree.diagnostics = diagnostics;
        }
        Ok(tree)
    }
}

/// Dialects available to a parse, looked up by id or by language
#[derive(Debug, Clone, Default)]
pub struct DialectSet {
    dialects: IndexMap<String, Dialect>,
}

impl DialectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `sql` and `psql` dialects compiled into the library
    pub fn builtin() -> Result<Self, DefinitionError> {
        let mut set = Self::new();
        set.insert(Dialect::builtin(Language::Sql)?);
        set.insert(Dialect::builtin(Language::Psql)?);
        Ok(set)
    }

    /// Add a dialect, replacing any dialect with the same id
    pub fn insert(&mut self, dialect: Dialect) {
        self.dialects.insert(dialect.id.to_lowercase(), dialect);
    }

    pub fn get(&self, id: &str) -> Option<&Dialect> {
        self.dialects.get(&id.to_lowercase())
    }

    /// Most recently added dialect for `language`
    pub fn for_language(&self, language: Language) -> Option<&Dialect> {
        self.dialects.values().rev().find(|d| d.language == language)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dialect> {
        self.dialects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.dialects.keys().map(String::as_str)
    }
}
