//! Grammar tree - element types loaded from a declarative definition
//!
//! Elements live in an arena owned by [`Grammar`] and refer to each other by
//! [`ElementId`]. Named elements are registered once and referenced by id, so
//! recursion in the grammar only ever goes through a named element.

mod definition;
mod gate;
mod loader;
mod variant;

pub use definition::{ElementDefinition, GrammarDefinition};
pub use gate::{Branch, BranchCheck, BranchCheckKind, Gate, LATEST_VERSION};
pub use variant::{QualifiedIdentifierVariant, VariantMatch};

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dialect::Language;
use crate::error::DefinitionError;
use crate::lookup::LookupTable;
use crate::token::{TokenRegistry, TokenTypeId};

/// Index of an element inside its grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(u32);

impl ElementId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Flags attached to grammar elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementAttribute {
    Root,
    Statement,
    Subject,
    ScopeDemarcation,
    ScopeIsolation,
    FoldableBlock,
    Executable,
    Clause,
    Structure,
}

impl ElementAttribute {
    const ALL: [ElementAttribute; 9] = [
        ElementAttribute::Root,
        ElementAttribute::Statement,
        ElementAttribute::Subject,
        ElementAttribute::ScopeDemarcation,
        ElementAttribute::ScopeIsolation,
        ElementAttribute::FoldableBlock,
        ElementAttribute::Executable,
        ElementAttribute::Clause,
        ElementAttribute::Structure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ElementAttribute::Root => "ROOT",
            ElementAttribute::Statement => "STATEMENT",
            ElementAttribute::Subject => "SUBJECT",
            ElementAttribute::ScopeDemarcation => "SCOPE_DEMARCATION",
            ElementAttribute::ScopeIsolation => "SCOPE_ISOLATION",
            ElementAttribute::FoldableBlock => "FOLDABLE_BLOCK",
            ElementAttribute::Executable => "EXECUTABLE",
            ElementAttribute::Clause => "CLAUSE",
            ElementAttribute::Structure => "STRUCTURE",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Compact set of [`ElementAttribute`] flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Attributes(u16);

impl Attributes {
    pub fn contains(self, attribute: ElementAttribute) -> bool {
        self.0 & attribute.bit() != 0
    }

    pub fn insert(&mut self, attribute: ElementAttribute) {
        self.0 |= attribute.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = ElementAttribute> {
        ElementAttribute::ALL
            .into_iter()
            .filter(move |a| self.contains(*a))
    }

    /// Statement or scope demarcation boundary used by error recovery
    pub fn is_scope_demarcation(self) -> bool {
        self.contains(ElementAttribute::ScopeDemarcation)
            || self.contains(ElementAttribute::Statement)
    }
}

impl FromStr for Attributes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut attributes = Attributes::default();
        for name in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|n| !n.is_empty())
        {
            let attribute = ElementAttribute::ALL
                .into_iter()
                .find(|a| a.name().eq_ignore_ascii_case(name))
                .ok_or_else(|| format!("unknown attribute '{}'", name))?;
            attributes.insert(attribute);
        }
        Ok(attributes)
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(ElementAttribute::name).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Edge from a composite element to one of its children
#[derive(Debug, Clone, PartialEq)]
pub struct Child {
    pub element: ElementId,
    pub optional: bool,
    pub gate: Gate,
}

/// Ordered children shared by sequence, block and named elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceBody {
    pub children: Vec<Child>,
    /// Index of the child up to which a failing sequence is rolled back
    /// instead of recovered
    pub exit: Option<usize>,
}

impl SequenceBody {
    pub fn position_of(&self, element: ElementId) -> Option<usize> {
        self.children.iter().position(|c| c.element == element)
    }

    /// Every child from `index` on is optional
    pub fn is_optional_from(&self, index: usize) -> bool {
        self.children.iter().skip(index).all(|c| c.optional)
    }

    /// Every child before `index` is optional
    pub fn is_optional_to(&self, index: usize) -> bool {
        self.children.iter().take(index).all(|c| c.optional)
    }

    /// A required child at `index` that fails rolls the sequence back
    pub fn is_exit_index(&self, index: usize) -> bool {
        index <= self.exit.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Object,
    Alias,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierRole {
    Definition,
    Reference,
}

/// Kind-specific content of an element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Token {
        token: TokenTypeId,
        /// Case-insensitive text the token must carry
        text: Option<String>,
    },
    Identifier {
        kind: IdentifierKind,
        role: IdentifierRole,
        object_type: Option<String>,
    },
    QualifiedIdentifier {
        separator: ElementId,
        variants: Vec<QualifiedIdentifierVariant>,
    },
    Sequence(SequenceBody),
    Block(SequenceBody),
    Named(SequenceBody),
    OneOf {
        alternatives: Vec<Child>,
        sortable: bool,
    },
    Iteration {
        child: ElementId,
        separators: Vec<ElementId>,
        /// Allowed iteration counts, empty when unconstrained
        elements_count: Vec<RangeInclusive<usize>>,
        min_iterations: usize,
    },
    Wrapper {
        begin: ElementId,
        end: ElementId,
        child: ElementId,
        child_optional: bool,
    },
    Chameleon {
        language: Language,
    },
    /// Placeholder for undefined references, never matches
    Unknown,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Token { .. } => "token",
            ElementKind::Identifier { .. } => "identifier",
            ElementKind::QualifiedIdentifier { .. } => "qualified-identifier",
            ElementKind::Sequence(_) => "sequence",
            ElementKind::Block(_) => "block",
            ElementKind::Named(_) => "named",
            ElementKind::OneOf { .. } => "one-of",
            ElementKind::Iteration { .. } => "iteration",
            ElementKind::Wrapper { .. } => "wrapper",
            ElementKind::Chameleon { .. } => "chameleon",
            ElementKind::Unknown => "unknown",
        }
    }

    /// Children of sequence-like elements
    pub fn sequence_body(&self) -> Option<&SequenceBody> {
        match self {
            ElementKind::Sequence(body) | ElementKind::Block(body) | ElementKind::Named(body) => {
                Some(body)
            }
            _ => None,
        }
    }
}

/// A grammar node
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    /// Definition id for named elements, a generated path otherwise
    pub name: String,
    pub description: Option<String>,
    /// Enclosing element; `None` for named elements, which may be referenced
    /// from many places
    pub parent: Option<ElementId>,
    pub attributes: Attributes,
    /// Branch published to later siblings once this element matched
    pub branch: Option<Branch>,
    pub virtual_object: Option<String>,
    pub kind: ElementKind,
}

impl Element {
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Token { .. } | ElementKind::Identifier { .. }
        )
    }

    pub fn is_named(&self) -> bool {
        matches!(self.kind, ElementKind::Named(_))
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, ElementKind::Identifier { .. })
    }

    pub fn is_identifier_reference(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Identifier {
                role: IdentifierRole::Reference,
                ..
            }
        )
    }
}

/// Immutable grammar of one language, with its lazily computed lookup table
#[derive(Debug)]
pub struct Grammar {
    language: Language,
    registry: Arc<TokenRegistry>,
    elements: Vec<Element>,
    named: IndexMap<String, ElementId>,
    root: ElementId,
    unknown: ElementId,
    warnings: Vec<String>,
    lookup: OnceLock<LookupTable>,
}

impl Grammar {
    /// Load a grammar from JSON definition text
    pub fn from_json(text: &str, registry: Arc<TokenRegistry>) -> Result<Self, DefinitionError> {
        let definition: GrammarDefinition = serde_json::from_str(text)?;
        Self::load(definition, registry)
    }

    /// Build a grammar from a parsed definition
    pub fn load(
        definition: GrammarDefinition,
        registry: Arc<TokenRegistry>,
    ) -> Result<Self, DefinitionError> {
        loader::GrammarLoader::new(registry).load(definition)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Placeholder element standing in for undefined references
    pub fn unknown(&self) -> ElementId {
        self.unknown
    }

    /// Element by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this grammar.
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Named element by definition id
    pub fn named(&self, name: &str) -> Option<ElementId> {
        self.named.get(name).copied()
    }

    pub fn named_elements(&self) -> impl Iterator<Item = (&str, ElementId)> {
        self.named.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Non-fatal problems found while loading
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Lookup table, computed on first access and shared afterwards
    pub fn lookup(&self) -> &LookupTable {
        self.lookup.get_or_init(|| LookupTable::compute(self))
    }

    /// Resolve a dotted token chain against the variants of a
    /// qualified-identifier element
    pub fn resolve_qualified_identifier(
        &self,
        element: ElementId,
        tokens: &[TokenTypeId],
    ) -> Option<VariantMatch> {
        variant::resolve(self, element, tokens)
    }

    /// Every variant that fits the dotted chain, most specific first
    pub fn rank_qualified_identifier(&self, element: ElementId, tokens: &[TokenTypeId]) -> Vec<VariantMatch> {
        variant::rank(self, element, tokens)
    }
}
