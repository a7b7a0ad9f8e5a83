//! Token registry - the catalog of token types for one dialect

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Formatting, TokenCategory, TokenSet, TokenType, TokenTypeId};
use crate::dialect::Language;
use crate::error::DefinitionError;

/// Declarative token catalog, as read from a `tokens.toml` file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TokenCatalog {
    #[serde(default)]
    pub tokens: Vec<TokenDefinition>,
    #[serde(default)]
    pub token_sets: Vec<TokenSetDefinition>,
}

/// One `[[tokens]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TokenDefinition {
    pub id: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub category: TokenCategory,
    pub description: Option<String>,
    #[serde(default)]
    pub reserved: bool,
    pub formatting: Option<Formatting>,
    pub object_type: Option<String>,
    pub language: Option<String>,
}

/// One `[[token-sets]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSetDefinition {
    pub id: String,
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Token types every registry defines, independent of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedTokens {
    pub whitespace: TokenTypeId,
    pub comment: TokenTypeId,
    pub identifier: TokenTypeId,
    pub quoted_identifier: TokenTypeId,
    pub variable: TokenTypeId,
    pub string: TokenTypeId,
    pub integer: TokenTypeId,
    pub number: TokenTypeId,
    pub bad_character: TokenTypeId,
    pub dot: Option<TokenTypeId>,
    pub left_parenthesis: Option<TokenTypeId>,
}

const BUILTIN_TOKENS: [(&str, TokenCategory); 9] = [
    ("WHITE_SPACE", TokenCategory::Whitespace),
    ("COMMENT", TokenCategory::Comment),
    ("IDENTIFIER", TokenCategory::Identifier),
    ("QUOTED_IDENTIFIER", TokenCategory::Identifier),
    ("VARIABLE", TokenCategory::Literal),
    ("STRING", TokenCategory::Literal),
    ("INTEGER", TokenCategory::Numeric),
    ("NUMBER", TokenCategory::Numeric),
    ("BAD_CHARACTER", TokenCategory::Character),
];

/// Priority used when one word is defined in several categories
const WORD_CATEGORIES: [TokenCategory; 6] = [
    TokenCategory::Keyword,
    TokenCategory::Datatype,
    TokenCategory::Function,
    TokenCategory::Parameter,
    TokenCategory::Exception,
    TokenCategory::Object,
];

/// Immutable registry of token types with O(1) lookup by index
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<TokenType>,
    by_id: IndexMap<String, TokenTypeId>,
    words: IndexMap<String, Vec<TokenTypeId>>,
    symbols: IndexMap<String, TokenTypeId>,
    token_sets: IndexMap<String, TokenSet>,
    shared: SharedTokens,
}

impl TokenRegistry {
    /// Load a registry from TOML catalog text
    pub fn from_toml(text: &str) -> Result<Self, DefinitionError> {
        let catalog: TokenCatalog = toml::from_str(text)?;
        Self::from_catalog(catalog)
    }

    /// Build a registry from a catalog, assigning dense indices in
    /// declaration order after the shared built-in token types
    pub fn from_catalog(catalog: TokenCatalog) -> Result<Self, DefinitionError> {
        let mut tokens = Vec::with_capacity(BUILTIN_TOKENS.len() + catalog.tokens.len());
        let mut by_id = IndexMap::new();

        for (id, category) in BUILTIN_TOKENS {
            let index = TokenTypeId::new(tokens.len());
            tokens.push(TokenType {
                index,
                id: id.to_string(),
                value: None,
                description: None,
                category,
                reserved: false,
                registered: false,
                formatting: Formatting::for_category(category),
                object_type: None,
                language: None,
            });
            by_id.insert(id.to_string(), index);
        }

        for def in catalog.tokens {
            if by_id.contains_key(&def.id) {
                return Err(DefinitionError::DuplicateTokenType(def.id));
            }
            let language = match (&def.language, def.category) {
                (Some(language), _) => Some(
                    language
                        .parse::<Language>()
                        .map_err(|_| DefinitionError::UnknownLanguage(language.clone()))?,
                ),
                (None, TokenCategory::Chameleon) => {
                    return Err(DefinitionError::MissingAttribute {
                        what: "chameleon token",
                        element: def.id,
                        attribute: "language",
                    })
                }
                (None, _) => None,
            };
            let index = TokenTypeId::new(tokens.len());
            by_id.insert(def.id.clone(), index);
            tokens.push(TokenType {
                index,
                id: def.id,
                value: def.value,
                description: def.description,
                category: def.category,
                reserved: def.reserved,
                registered: false,
                formatting: def
                    .formatting
                    .unwrap_or_else(|| Formatting::for_category(def.category)),
                object_type: def.object_type,
                language,
            });
        }

        let mut token_sets = IndexMap::new();
        for def in catalog.token_sets {
            let mut set = TokenSet::new();
            for member in &def.tokens {
                match by_id.get(member.trim()) {
                    Some(index) => {
                        set.insert(*index);
                        tokens[index.index()].registered = true;
                    }
                    None => warn!(
                        token_set = %def.id,
                        token = %member,
                        "Invalid token set member: token type not defined"
                    ),
                }
            }
            token_sets.insert(def.id, set);
        }

        let mut words: IndexMap<String, Vec<TokenTypeId>> = IndexMap::new();
        let mut symbols = IndexMap::new();
        for token in &tokens {
            let Some(value) = &token.value else { continue };
            match token.category {
                TokenCategory::Operator | TokenCategory::Character => {
                    symbols.entry(value.clone()).or_insert(token.index);
                }
                category if WORD_CATEGORIES.contains(&category) => {
                    words
                        .entry(value.to_lowercase())
                        .or_default()
                        .push(token.index);
                }
                _ => {}
            }
        }

        let builtin = |id: &str| by_id[id];
        let shared = SharedTokens {
            whitespace: builtin("WHITE_SPACE"),
            comment: builtin("COMMENT"),
            identifier: builtin("IDENTIFIER"),
            quoted_identifier: builtin("QUOTED_IDENTIFIER"),
            variable: builtin("VARIABLE"),
            string: builtin("STRING"),
            integer: builtin("INTEGER"),
            number: builtin("NUMBER"),
            bad_character: builtin("BAD_CHARACTER"),
            dot: symbols.get(".").copied(),
            left_parenthesis: symbols.get("(").copied(),
        };

        Ok(Self {
            tokens,
            by_id,
            words,
            symbols,
            token_sets,
            shared,
        })
    }

    pub fn shared(&self) -> &SharedTokens {
        &self.shared
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenType> {
        self.tokens.iter()
    }

    /// Token type by dense index
    pub fn get(&self, index: TokenTypeId) -> Option<&TokenType> {
        self.tokens.get(index.index())
    }

    /// Token type by dense index.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not issued by this registry.
    pub fn token_type(&self, index: TokenTypeId) -> &TokenType {
        &self.tokens[index.index()]
    }

    /// Strict lookup by id
    pub fn try_lookup(&self, id: &str) -> Result<TokenTypeId, DefinitionError> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| DefinitionError::UndefinedTokenType(id.to_string()))
    }

    /// Lookup by id, degrading to the generic identifier token when the id
    /// is not defined
    pub fn lookup(&self, id: &str) -> TokenTypeId {
        match self.try_lookup(id) {
            Ok(index) => index,
            Err(_) => {
                warn!(token = %id, "Undefined token type, falling back to identifier");
                self.shared.identifier
            }
        }
    }

    /// Token type of the given category with the given value
    pub fn find(&self, category: TokenCategory, value: &str) -> Option<TokenTypeId> {
        self.tokens
            .iter()
            .find(|t| {
                t.category == category
                    && t.value
                        .as_deref()
                        .map(|v| v.eq_ignore_ascii_case(value))
                        .unwrap_or(false)
            })
            .map(|t| t.index)
    }

    /// Classify a bare word, case-insensitively
    pub fn classify_word(&self, text: &str) -> Option<TokenTypeId> {
        let candidates = self.words.get(&text.to_lowercase())?;
        WORD_CATEGORIES.iter().find_map(|category| {
            candidates
                .iter()
                .copied()
                .find(|c| self.tokens[c.index()].category == *category)
        })
    }

    /// Classify an operator or punctuation character
    pub fn classify_symbol(&self, text: &str) -> Option<TokenTypeId> {
        self.symbols.get(text).copied()
    }

    /// Whether `text` is a reserved word of this registry
    pub fn is_reserved_word(&self, text: &str) -> bool {
        self.words
            .get(&text.to_lowercase())
            .map(|candidates| {
                candidates
                    .iter()
                    .any(|c| self.tokens[c.index()].is_reserved_word())
            })
            .unwrap_or(false)
    }

    pub fn token_set(&self, id: &str) -> Option<&TokenSet> {
        self.token_sets.get(id)
    }

    pub fn token_set_ids(&self) -> impl Iterator<Item = &str> {
        self.token_sets.keys().map(String::as_str)
    }

    /// Chameleon token types embedding `language`
    pub fn chameleon_tokens(&self, language: Language) -> TokenSet {
        self.tokens
            .iter()
            .filter(|t| t.is_chameleon() && t.language == Some(language))
            .map(|t| t.index)
            .collect()
    }

    /// First chameleon token type defined by the catalog, if any
    pub fn default_chameleon(&self) -> Option<TokenTypeId> {
        self.tokens.iter().find(|t| t.is_chameleon()).map(|t| t.index)
    }

    /// Human readable names of a token set, in index order
    pub fn describe(&self, set: &TokenSet) -> Vec<String> {
        set.iter()
            .filter_map(|index| self.get(index))
            .filter(|t| !t.is_trivia())
            .map(TokenType::display_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = r#"
        [[tokens]]
        id = "KW_SELECT"
        value = "select"
        type = "keyword"
        reserved = true

        [[tokens]]
        id = "KW_DATE"
        value = "date"
        type = "keyword"

        [[tokens]]
        id = "DT_DATE"
        value = "date"
        type = "datatype"

        [[tokens]]
        id = "FN_COUNT"
        value = "count"
        type = "function"

        [[tokens]]
        id = "CHR_DOT"
        value = "."
        type = "character"

        [[tokens]]
        id = "CHR_LEFT_PARENTHESIS"
        value = "("
        type = "character"

        [[tokens]]
        id = "OPR_CONCAT"
        value = "||"
        type = "operator"

        [[tokens]]
        id = "CT_PSQL_BLOCK"
        type = "chameleon"
        language = "psql"

        [[token-sets]]
        id = "AGGREGATES"
        tokens = ["FN_COUNT", "FN_MISSING"]
    "#;

    #[test]
    fn test_builtin_tokens_come_first() {
        let registry = TokenRegistry::from_toml(CATALOG).unwrap();
        assert_eq!(registry.shared().whitespace.index(), 0);
        assert_eq!(registry.token_type(registry.shared().identifier).id, "IDENTIFIER");
        assert_eq!(registry.try_lookup("KW_SELECT").unwrap().index(), BUILTIN_TOKENS.len());
        assert_eq!(registry.len(), BUILTIN_TOKENS.len() + 8);
    }

    #[test]
    fn test_lookup_degrades_to_identifier() {
        let registry = TokenRegistry::from_toml(CATALOG).unwrap();
        assert!(matches!(
            registry.try_lookup("KW_NOPE"),
            Err(DefinitionError::UndefinedTokenType(id)) if id == "KW_NOPE"
        ));
        assert_eq!(registry.lookup("KW_NOPE"), registry.shared().identifier);
    }

    #[test]
    fn test_reserved_flags() {
        let registry = TokenRegistry::from_toml(CATALOG).unwrap();
        let select = registry.token_type(registry.lookup("KW_SELECT"));
        let date = registry.token_type(registry.lookup("KW_DATE"));
        assert!(select.is_reserved_word());
        assert!(!select.is_suppressible_reserved_word());
        assert!(date.is_suppressible_reserved_word());
        assert!(registry.is_reserved_word("SELECT"));
        assert!(!registry.is_reserved_word("employees"));
    }

    #[test]
    fn test_word_classification_priority() {
        let registry = TokenRegistry::from_toml(CATALOG).unwrap();
        assert_eq!(registry.classify_word("Date"), Some(registry.lookup("KW_DATE")));
        assert_eq!(registry.classify_word("COUNT"), Some(registry.lookup("FN_COUNT")));
        assert_eq!(registry.classify_word("employees"), None);
        assert_eq!(registry.classify_symbol("||"), Some(registry.lookup("OPR_CONCAT")));
        assert_eq!(registry.shared().dot, Some(registry.lookup("CHR_DOT")));
    }

    #[test]
    fn test_token_sets_register_members() {
        let registry = TokenRegistry::from_toml(CATALOG).unwrap();
        let count = registry.lookup("FN_COUNT");
        let set = registry.token_set("AGGREGATES").unwrap();
        assert!(set.contains(count));
        assert_eq!(set.len(), 1);
        assert!(registry.token_type(count).registered);
        assert!(!registry.token_type(registry.lookup("KW_SELECT")).registered);
    }

    #[test]
    fn test_chameleon_tokens() {
        let registry = TokenRegistry::from_toml(CATALOG).unwrap();
        let chameleon = registry.lookup("CT_PSQL_BLOCK");
        assert!(registry.chameleon_tokens(Language::Psql).contains(chameleon));
        assert!(registry.chameleon_tokens(Language::Sql).is_empty());
        assert_eq!(registry.default_chameleon(), Some(chameleon));
    }

    #[test]
    fn test_duplicate_and_invalid_definitions() {
        let duplicate = r#"
            [[tokens]]
            id = "IDENTIFIER"
            type = "identifier"
        "#;
        assert!(matches!(
            TokenRegistry::from_toml(duplicate),
            Err(DefinitionError::DuplicateTokenType(_))
        ));

        let chameleon = r#"
            [[tokens]]
            id = "CT_BLOCK"
            type = "chameleon"
        "#;
        assert!(matches!(
            TokenRegistry::from_toml(chameleon),
            Err(DefinitionError::MissingAttribute { attribute: "language", .. })
        ));

        assert!(matches!(
            TokenRegistry::from_toml("[[tokens]]\nid = 3"),
            Err(DefinitionError::TokenSyntax(_))
        ));
    }
}
