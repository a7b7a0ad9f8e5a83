//! Two-pass construction of a [`Grammar`] from its definition
//!
//! The first pass registers every named element so that references resolve
//! regardless of declaration order; the second pass builds the bodies.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::variant::create_variants;
use super::{
    Attributes, Branch, BranchCheck, Child, Element, ElementAttribute, ElementDefinition,
    ElementId, ElementKind, Gate, Grammar, GrammarDefinition, IdentifierKind, IdentifierRole,
    SequenceBody,
};
use crate::dialect::Language;
use crate::error::DefinitionError;
use crate::token::{TokenCategory, TokenRegistry, TokenTypeId};

/// Begin/end token pairs a wrapper can name instead of explicit ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrapperTemplate {
    Parentheses,
    Brackets,
    BeginEnd,
}

impl FromStr for WrapperTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PARENTHESES" => Ok(WrapperTemplate::Parentheses),
            "BRACKETS" => Ok(WrapperTemplate::Brackets),
            "BEGIN_END" => Ok(WrapperTemplate::BeginEnd),
            _ => Err(format!("unknown wrapper template '{}'", s)),
        }
    }
}

impl WrapperTemplate {
    fn resolve(self, registry: &TokenRegistry) -> Result<(TokenTypeId, TokenTypeId), DefinitionError> {
        let symbol = |value: &str| {
            registry
                .classify_symbol(value)
                .ok_or_else(|| DefinitionError::UndefinedTokenType(value.to_string()))
        };
        let keyword = |value: &str| {
            registry
                .find(TokenCategory::Keyword, value)
                .ok_or_else(|| DefinitionError::UndefinedTokenType(value.to_uppercase()))
        };
        match self {
            WrapperTemplate::Parentheses => Ok((symbol("(")?, symbol(")")?)),
            WrapperTemplate::Brackets => Ok((symbol("[")?, symbol("]")?)),
            WrapperTemplate::BeginEnd => Ok((keyword("begin")?, keyword("end")?)),
        }
    }
}

/// Parse an `elements-count` list such as `"1-3,5"`
fn parse_elements_count(element: &str, def: &str) -> Result<Vec<RangeInclusive<usize>>, DefinitionError> {
    let invalid = |reason: &str| DefinitionError::InvalidAttribute {
        element: element.to_string(),
        attribute: "elements-count",
        value: def.to_string(),
        reason: reason.to_string(),
    };
    let number = |s: &str| s.trim().parse::<usize>().map_err(|_| invalid("not a number"));

    let mut counts = Vec::new();
    for part in def.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (number(from)?, number(to)?);
                if from > to {
                    return Err(invalid("empty range"));
                }
                counts.push(from..=to);
            }
            None => {
                let count = number(part)?;
                counts.push(count..=count);
            }
        }
    }
    counts.sort_by_key(|range| (*range.start(), *range.end()));
    counts.dedup();
    Ok(counts)
}

pub(crate) struct GrammarLoader {
    registry: Arc<TokenRegistry>,
    elements: Vec<Element>,
    named: IndexMap<String, ElementId>,
    warnings: Vec<String>,
    unknown: ElementId,
}

impl GrammarLoader {
    pub fn new(registry: Arc<TokenRegistry>) -> Self {
        let unknown = ElementId::new(0);
        let elements = vec![Element {
            id: unknown,
            name: "unknown".to_string(),
            description: Some("Undefined element reference".to_string()),
            parent: None,
            attributes: Attributes::default(),
            branch: None,
            virtual_object: None,
            kind: ElementKind::Unknown,
        }];
        Self {
            registry,
            elements,
            named: IndexMap::new(),
            warnings: Vec::new(),
            unknown,
        }
    }

    pub fn load(mut self, definition: GrammarDefinition) -> Result<Grammar, DefinitionError> {
        let language = match &definition.language {
            Some(language) => language
                .parse::<Language>()
                .map_err(|_| DefinitionError::UnknownLanguage(language.clone()))?,
            None => Language::default(),
        };

        let mut root = None;
        let mut ids = Vec::with_capacity(definition.elements.len());
        for (position, def) in definition.elements.iter().enumerate() {
            let name = def.id.clone().ok_or_else(|| DefinitionError::MissingAttribute {
                what: "named element",
                element: format!("#{}", position),
                attribute: "id",
            })?;
            if self.named.contains_key(&name) {
                return Err(DefinitionError::DuplicateElement(name));
            }
            let id = self.push(None, name.clone(), def, ElementKind::Named(SequenceBody::default()))?;
            if self.elements[id.index()].attributes.contains(ElementAttribute::Root) {
                if root.is_some() {
                    return Err(DefinitionError::DuplicateRoot(name));
                }
                root = Some(id);
            }
            self.named.insert(name, id);
            ids.push(id);
        }

        for (def, id) in definition.elements.iter().zip(ids) {
            let body = self.sequence_body(def, id)?;
            self.elements[id.index()].kind = ElementKind::Named(body);
        }

        let root = root.ok_or(DefinitionError::MissingRoot)?;
        debug!(
            language = %language,
            named = self.named.len(),
            elements = self.elements.len(),
            warnings = self.warnings.len(),
            "Grammar loaded"
        );

        Ok(Grammar {
            language,
            registry: self.registry,
            elements: self.elements,
            named: self.named,
            root,
            unknown: self.unknown,
            warnings: self.warnings,
            lookup: OnceLock::new(),
        })
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn invalid(
        element: &str,
        attribute: &'static str,
        value: &str,
        reason: impl Into<String>,
    ) -> DefinitionError {
        DefinitionError::InvalidAttribute {
            element: element.to_string(),
            attribute,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Append an element with the common attributes of its definition
    fn push(
        &mut self,
        parent: Option<ElementId>,
        name: String,
        def: &ElementDefinition,
        kind: ElementKind,
    ) -> Result<ElementId, DefinitionError> {
        let attributes = match &def.attributes {
            Some(value) => value
                .parse::<Attributes>()
                .map_err(|reason| Self::invalid(&name, "attributes", value, reason))?,
            None => Attributes::default(),
        };
        let branch = match &def.branch {
            Some(value) => Some(
                value
                    .parse::<Branch>()
                    .map_err(|reason| Self::invalid(&name, "branch", value, reason))?,
            ),
            None => None,
        };
        let id = ElementId::new(self.elements.len());
        self.elements.push(Element {
            id,
            name,
            description: def.description.clone(),
            parent,
            attributes,
            branch,
            virtual_object: def.virtual_object.clone(),
            kind,
        });
        Ok(id)
    }

    fn name_of(&self, id: ElementId) -> &str {
        &self.elements[id.index()].name
    }

    fn token_element(
        &mut self,
        parent: ElementId,
        token: TokenTypeId,
        text: Option<String>,
    ) -> ElementId {
        let id = ElementId::new(self.elements.len());
        self.elements.push(Element {
            id,
            name: self.registry.token_type(token).id.clone(),
            description: None,
            parent: Some(parent),
            attributes: Attributes::default(),
            branch: None,
            virtual_object: None,
            kind: ElementKind::Token { token, text },
        });
        id
    }

    /// Resolve a token id leniently, remembering the drift as a warning
    fn lookup_token(&mut self, id: &str) -> TokenTypeId {
        match self.registry.try_lookup(id) {
            Ok(token) => token,
            Err(_) => {
                let fallback = self.registry.lookup(id);
                self.warnings
                    .push(format!("undefined token type '{}' replaced by identifier", id));
                fallback
            }
        }
    }

    fn gate(&self, def: &ElementDefinition, element: &str) -> Result<Gate, DefinitionError> {
        let branch_checks = match &def.branch_check {
            Some(value) => BranchCheck::parse_list(value)
                .map_err(|reason| Self::invalid(element, "branch-check", value, reason))?,
            None => Vec::new(),
        };
        let min_version = match def.version {
            Some(version) if version.is_nan() || version < 0.0 => {
                return Err(Self::invalid(
                    element,
                    "version",
                    &version.to_string(),
                    "must be a non-negative number",
                ))
            }
            Some(version) => version,
            None => 0.0,
        };
        Ok(Gate {
            branch_checks,
            min_version,
        })
    }

    /// Build the edge to a child; `exit` is only meaningful on sequence
    /// children and is reported otherwise
    fn child(
        &mut self,
        def: &ElementDefinition,
        parent: ElementId,
        position: usize,
        in_sequence: bool,
    ) -> Result<Child, DefinitionError> {
        if def.exit && !in_sequence {
            let message = format!(
                "exit flag ignored on a child of {} '{}'",
                self.elements[parent.index()].kind.name(),
                self.name_of(parent)
            );
            self.warn(message);
        }
        let element = self.build(def, parent, position)?;
        let gate = self.gate(def, self.name_of(parent))?;
        Ok(Child {
            element,
            optional: def.optional,
            gate,
        })
    }

    fn sequence_body(
        &mut self,
        def: &ElementDefinition,
        id: ElementId,
    ) -> Result<SequenceBody, DefinitionError> {
        let mut children = Vec::new();
        if let Some(tokens) = &def.tokens {
            for token_id in tokens.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let token = self.lookup_token(token_id);
                children.push(Child {
                    element: self.token_element(id, token, None),
                    optional: false,
                    gate: Gate::default(),
                });
            }
        }

        let mut exit = None;
        for child_def in &def.children {
            let position = children.len();
            if child_def.exit {
                if exit.is_some() {
                    return Err(DefinitionError::AmbiguousExit {
                        element: self.name_of(id).to_string(),
                    });
                }
                exit = Some(position);
            }
            children.push(self.child(child_def, id, position, true)?);
        }

        Ok(SequenceBody { children, exit })
    }

    fn build(
        &mut self,
        def: &ElementDefinition,
        parent: ElementId,
        position: usize,
    ) -> Result<ElementId, DefinitionError> {
        let parent_name = self.name_of(parent).to_string();
        let kind = def.kind.as_deref().ok_or_else(|| DefinitionError::MissingAttribute {
            what: "element",
            element: format!("{}.{}", parent_name, position),
            attribute: "kind",
        })?;
        let name = def
            .id
            .clone()
            .unwrap_or_else(|| format!("{}.{}", parent_name, position));

        match kind {
            "element" => {
                let ref_id = def.ref_id.as_deref().ok_or_else(|| DefinitionError::MissingAttribute {
                    what: "element reference",
                    element: name.clone(),
                    attribute: "ref-id",
                })?;
                match self.named.get(ref_id) {
                    Some(id) => Ok(*id),
                    None => {
                        self.warn(format!(
                            "undefined element '{}' referenced from '{}'",
                            ref_id, parent_name
                        ));
                        Ok(self.unknown)
                    }
                }
            }
            "token" => {
                let type_id = def.type_id.as_deref().ok_or_else(|| DefinitionError::MissingAttribute {
                    what: "token element",
                    element: name.clone(),
                    attribute: "type-id",
                })?;
                let token = self.lookup_token(type_id);
                let id = self.token_element(parent, token, def.text.clone());
                self.apply_common(id, def)?;
                Ok(id)
            }
            "exec-variable" => {
                let token = self.registry.shared().variable;
                Ok(self.token_element(parent, token, None))
            }
            "object-def" | "object-ref" | "identifier-def" | "identifier-ref" | "alias-def"
            | "alias-ref" | "variable-def" | "variable-ref" => {
                let (kind_name, role_name) = kind.split_at(kind.len() - 4);
                let identifier_kind = match kind_name {
                    "alias" => IdentifierKind::Alias,
                    "variable" => IdentifierKind::Variable,
                    _ => IdentifierKind::Object,
                };
                let role = if role_name == "-def" {
                    IdentifierRole::Definition
                } else {
                    IdentifierRole::Reference
                };
                let name = match (&def.id, &def.object_type) {
                    (None, Some(object_type)) => format!("{}({})", kind, object_type),
                    _ => name,
                };
                self.push(
                    Some(parent),
                    name,
                    def,
                    ElementKind::Identifier {
                        kind: identifier_kind,
                        role,
                        object_type: def.object_type.clone(),
                    },
                )
            }
            "chameleon" => {
                let language = def.language.as_deref().ok_or_else(|| DefinitionError::MissingAttribute {
                    what: "chameleon element",
                    element: name.clone(),
                    attribute: "language",
                })?;
                let language = language
                    .parse::<Language>()
                    .map_err(|_| DefinitionError::UnknownLanguage(language.to_string()))?;
                self.push(Some(parent), name, def, ElementKind::Chameleon { language })
            }
            "sequence" | "block" => {
                let id = self.push(Some(parent), name, def, ElementKind::Unknown)?;
                let body = self.sequence_body(def, id)?;
                self.elements[id.index()].kind = if kind == "block" {
                    ElementKind::Block(body)
                } else {
                    ElementKind::Sequence(body)
                };
                Ok(id)
            }
            "one-of" => {
                let id = self.push(Some(parent), name.clone(), def, ElementKind::Unknown)?;
                let mut alternatives = Vec::new();
                if let Some(tokens) = &def.tokens {
                    for token_id in tokens.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        let token = self.lookup_token(token_id);
                        alternatives.push(Child {
                            element: self.token_element(id, token, None),
                            optional: false,
                            gate: Gate::default(),
                        });
                    }
                }
                for child_def in &def.children {
                    let position = alternatives.len();
                    alternatives.push(self.child(child_def, id, position, false)?);
                }
                if alternatives.len() < 2 {
                    return Err(DefinitionError::ChildCount {
                        kind: "one-of",
                        element: name,
                        expected: "at least 2",
                        found: alternatives.len(),
                    });
                }
                self.elements[id.index()].kind = ElementKind::OneOf {
                    alternatives,
                    sortable: def.sortable,
                };
                Ok(id)
            }
            "iteration" => {
                if def.children.len() != 1 {
                    return Err(DefinitionError::ChildCount {
                        kind: "iteration",
                        element: name,
                        expected: "exactly 1",
                        found: def.children.len(),
                    });
                }
                let elements_count = match &def.elements_count {
                    Some(value) => parse_elements_count(&name, value)?,
                    None => Vec::new(),
                };
                let id = self.push(Some(parent), name, def, ElementKind::Unknown)?;
                let mut separators = Vec::new();
                if let Some(list) = &def.separator {
                    for token_id in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        let token = self.lookup_token(token_id);
                        separators.push(self.token_element(id, token, None));
                    }
                }
                let child = self.child(&def.children[0], id, 0, false)?.element;
                self.elements[id.index()].kind = ElementKind::Iteration {
                    child,
                    separators,
                    elements_count,
                    min_iterations: def.min_iterations.unwrap_or(0),
                };
                Ok(id)
            }
            "wrapper" => {
                if def.children.len() != 1 {
                    return Err(DefinitionError::ChildCount {
                        kind: "wrapper",
                        element: name,
                        expected: "exactly 1",
                        found: def.children.len(),
                    });
                }
                let (begin, end) = match (&def.template, &def.begin_token, &def.end_token) {
                    (Some(template), _, _) => template
                        .parse::<WrapperTemplate>()
                        .map_err(|reason| Self::invalid(&name, "template", template, reason))?
                        .resolve(&self.registry)?,
                    (None, Some(begin), Some(end)) => (
                        self.registry.try_lookup(begin)?,
                        self.registry.try_lookup(end)?,
                    ),
                    (None, None, _) => {
                        return Err(DefinitionError::MissingAttribute {
                            what: "wrapper",
                            element: name,
                            attribute: "begin-token",
                        })
                    }
                    (None, Some(_), None) => {
                        return Err(DefinitionError::MissingAttribute {
                            what: "wrapper",
                            element: name,
                            attribute: "end-token",
                        })
                    }
                };
                let id = self.push(Some(parent), name, def, ElementKind::Unknown)?;
                let begin = self.token_element(id, begin, None);
                let child = self.child(&def.children[0], id, 0, false)?;
                let end = self.token_element(id, end, None);
                self.elements[id.index()].kind = ElementKind::Wrapper {
                    begin,
                    end,
                    child: child.element,
                    child_optional: child.optional,
                };
                Ok(id)
            }
            "qualified-identifier" => {
                let id = self.push(Some(parent), name.clone(), def, ElementKind::Unknown)?;
                let separator = match &def.separator {
                    Some(token_id) => self.registry.try_lookup(token_id.trim())?,
                    None => self.registry.shared().dot.ok_or_else(|| {
                        DefinitionError::MissingAttribute {
                            what: "qualified identifier",
                            element: name.clone(),
                            attribute: "separator",
                        }
                    })?,
                };
                let separator = self.token_element(id, separator, None);

                let grouped = def.children.iter().any(|c| c.kind.as_deref() == Some("variant"));
                let groups: Vec<&[ElementDefinition]> = if grouped {
                    def.children.iter().map(|c| c.children.as_slice()).collect()
                } else {
                    vec![def.children.as_slice()]
                };

                let mut variants = Vec::new();
                for group in groups {
                    let mut leaves = Vec::with_capacity(group.len());
                    let mut optional = Vec::with_capacity(group.len());
                    for (position, leaf_def) in group.iter().enumerate() {
                        let leaf = self.build(leaf_def, id, position)?;
                        if !self.elements[leaf.index()].is_leaf() {
                            return Err(Self::invalid(
                                &name,
                                "kind",
                                leaf_def.kind_name(),
                                "qualified identifier components must be tokens or identifiers",
                            ));
                        }
                        leaves.push(leaf);
                        optional.push(leaf_def.optional);
                    }
                    for variant in create_variants(&leaves, &optional) {
                        if !variants.contains(&variant) {
                            variants.push(variant);
                        }
                    }
                }
                if variants.is_empty() {
                    return Err(DefinitionError::ChildCount {
                        kind: "qualified-identifier",
                        element: name,
                        expected: "at least 1",
                        found: 0,
                    });
                }
                self.elements[id.index()].kind = ElementKind::QualifiedIdentifier {
                    separator,
                    variants,
                };
                Ok(id)
            }
            other => Err(DefinitionError::UnknownElementKind {
                kind: other.to_string(),
                element: parent_name,
            }),
        }
    }

    /// Common attributes of elements created through `token_element`
    fn apply_common(&mut self, id: ElementId, def: &ElementDefinition) -> Result<(), DefinitionError> {
        let name = self.name_of(id).to_string();
        if let Some(value) = &def.attributes {
            self.elements[id.index()].attributes = value
                .parse::<Attributes>()
                .map_err(|reason| Self::invalid(&name, "attributes", value, reason))?;
        }
        if let Some(value) = &def.branch {
            self.elements[id.index()].branch = Some(
                value
                    .parse::<Branch>()
                    .map_err(|reason| Self::invalid(&name, "branch", value, reason))?,
            );
        }
        self.elements[id.index()].description = def.description.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOKENS: &str = r#"
        [[tokens]]
        id = "KW_SELECT"
        value = "select"
        type = "keyword"
        reserved = true

        [[tokens]]
        id = "KW_FROM"
        value = "from"
        type = "keyword"
        reserved = true

        [[tokens]]
        id = "CHR_DOT"
        value = "."
        type = "character"

        [[tokens]]
        id = "CHR_COMMA"
        value = ","
        type = "character"

        [[tokens]]
        id = "CHR_LEFT_PARENTHESIS"
        value = "("
        type = "character"

        [[tokens]]
        id = "CHR_RIGHT_PARENTHESIS"
        value = ")"
        type = "character"
    "#;

    fn registry() -> Arc<TokenRegistry> {
        Arc::new(TokenRegistry::from_toml(TOKENS).unwrap())
    }

    fn load(json: &str) -> Result<Grammar, DefinitionError> {
        Grammar::from_json(json, registry())
    }

    #[test]
    fn test_forward_references_resolve() {
        let grammar = load(
            r#"{"elements": [
                {"id": "file", "attributes": "ROOT", "children": [
                    {"kind": "element", "ref-id": "query"}
                ]},
                {"id": "query", "attributes": "STATEMENT", "children": [
                    {"kind": "token", "type-id": "KW_SELECT"},
                    {"kind": "iteration", "separator": "CHR_COMMA", "children": [
                        {"kind": "object-ref", "object-type": "column"}
                    ]},
                    {"kind": "token", "type-id": "KW_FROM", "optional": true}
                ]}
            ]}"#,
        )
        .unwrap();

        let file = grammar.root();
        let query = grammar.named("query").unwrap();
        let body = grammar.element(file).kind.sequence_body().unwrap();
        assert_eq!(body.children[0].element, query);
        assert!(grammar.element(query).attributes.contains(ElementAttribute::Statement));

        let query_body = grammar.element(query).kind.sequence_body().unwrap();
        assert_eq!(query_body.children.len(), 3);
        assert!(query_body.children[2].optional);
        let iteration = grammar.element(query_body.children[1].element);
        assert_eq!(iteration.parent, Some(query));
        match &iteration.kind {
            ElementKind::Iteration { separators, child, .. } => {
                assert_eq!(separators.len(), 1);
                assert!(grammar.element(*child).is_identifier_reference());
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(grammar.warnings().is_empty());
    }

    #[test]
    fn test_undefined_reference_degrades_to_unknown() {
        let grammar = load(
            r#"{"elements": [
                {"id": "file", "attributes": "ROOT", "children": [
                    {"kind": "element", "ref-id": "missing"}
                ]}
            ]}"#,
        )
        .unwrap();
        let body = grammar.element(grammar.root()).kind.sequence_body().unwrap();
        assert_eq!(body.children[0].element, grammar.unknown());
        assert_eq!(grammar.warnings().len(), 1);
    }

    #[test]
    fn test_gates_and_exit() {
        let grammar = load(
            r#"{"elements": [
                {"id": "file", "attributes": "ROOT", "children": [
                    {"kind": "token", "type-id": "KW_SELECT"},
                    {"kind": "token", "type-id": "KW_FROM", "exit": true,
                     "version": 12, "branch-check": "-oracle"}
                ]}
            ]}"#,
        )
        .unwrap();
        let body = grammar.element(grammar.root()).kind.sequence_body().unwrap();
        assert_eq!(body.exit, Some(1));
        assert_eq!(body.children[1].gate.min_version, 12.0);
        assert_eq!(body.children[1].gate.branch_checks.len(), 1);
        assert!(body.children[0].gate.is_open());
    }

    #[test]
    fn test_wrapper_template() {
        let grammar = load(
            r#"{"elements": [
                {"id": "file", "attributes": "ROOT", "children": [
                    {"kind": "wrapper", "template": "PARENTHESES", "children": [
                        {"kind": "token", "type-id": "KW_SELECT", "optional": true}
                    ]}
                ]}
            ]}"#,
        )
        .unwrap();
        let body = grammar.element(grammar.root()).kind.sequence_body().unwrap();
        match &grammar.element(body.children[0].element).kind {
            ElementKind::Wrapper {
                begin,
                end,
                child_optional,
                ..
            } => {
                assert_eq!(grammar.element(*begin).name, "CHR_LEFT_PARENTHESIS");
                assert_eq!(grammar.element(*end).name, "CHR_RIGHT_PARENTHESIS");
                assert!(child_optional);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_qualified_identifier_variants() {
        let grammar = load(
            r#"{"elements": [
                {"id": "file", "attributes": "ROOT", "children": [
                    {"kind": "qualified-identifier", "children": [
                        {"kind": "object-ref", "object-type": "schema", "optional": true},
                        {"kind": "object-ref", "object-type": "table"},
                        {"kind": "object-ref", "object-type": "column"}
                    ]}
                ]}
            ]}"#,
        )
        .unwrap();
        let body = grammar.element(grammar.root()).kind.sequence_body().unwrap();
        match &grammar.element(body.children[0].element).kind {
            ElementKind::QualifiedIdentifier { variants, .. } => {
                let lengths: Vec<usize> = variants.iter().map(|v| v.len()).collect();
                assert_eq!(lengths, vec![3, 2]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_elements_count() {
        assert_eq!(parse_elements_count("x", "5,1-3").unwrap(), vec![1..=3, 5..=5]);
        assert_eq!(parse_elements_count("x", "2, 2").unwrap(), vec![2..=2]);
        // wide ranges stay ranges
        let wide = parse_elements_count("x", "1-4000000000").unwrap();
        assert_eq!(wide, vec![1..=4_000_000_000]);
        assert!(parse_elements_count("x", "3-1").is_err());
        assert!(parse_elements_count("x", "a").is_err());
    }

    #[test]
    fn test_definition_errors() {
        let cases: [(&str, fn(&DefinitionError) -> bool); 8] = [
            (
                r#"{"elements": [{"id": "a", "children": []}]}"#,
                |e| matches!(e, DefinitionError::MissingRoot),
            ),
            (
                r#"{"elements": [
                    {"id": "a", "attributes": "ROOT"},
                    {"id": "b", "attributes": "ROOT"}
                ]}"#,
                |e| matches!(e, DefinitionError::DuplicateRoot(name) if name == "b"),
            ),
            (
                r#"{"elements": [{"id": "a", "attributes": "ROOT"}, {"id": "a"}]}"#,
                |e| matches!(e, DefinitionError::DuplicateElement(_)),
            ),
            (
                r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
                    {"kind": "one-of", "children": [{"kind": "token", "type-id": "KW_SELECT"}]}
                ]}]}"#,
                |e| matches!(e, DefinitionError::ChildCount { kind: "one-of", .. }),
            ),
            (
                r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
                    {"kind": "iteration", "children": []}
                ]}]}"#,
                |e| matches!(e, DefinitionError::ChildCount { kind: "iteration", .. }),
            ),
            (
                r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
                    {"kind": "mystery"}
                ]}]}"#,
                |e| matches!(e, DefinitionError::UnknownElementKind { .. }),
            ),
            (
                r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
                    {"kind": "token", "type-id": "KW_SELECT", "exit": true},
                    {"kind": "token", "type-id": "KW_FROM", "exit": true}
                ]}]}"#,
                |e| matches!(e, DefinitionError::AmbiguousExit { .. }),
            ),
            (
                r#"{"elements": [{"id": "a", "attributes": "ROOT BOGUS"}]}"#,
                |e| matches!(e, DefinitionError::InvalidAttribute { attribute: "attributes", .. }),
            ),
        ];

        for (json, check) in cases {
            match load(json) {
                Err(error) => assert!(check(&error), "unexpected error {:?} for {}", error, json),
                Ok(_) => panic!("expected an error for {}", json),
            }
        }
    }

    #[test]
    fn test_missing_mandatory_attributes() {
        let missing_kind = r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [{}]}]}"#;
        assert!(matches!(
            load(missing_kind),
            Err(DefinitionError::MissingAttribute { attribute: "kind", .. })
        ));

        let missing_ref = r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
            {"kind": "element"}
        ]}]}"#;
        assert!(matches!(
            load(missing_ref),
            Err(DefinitionError::MissingAttribute { attribute: "ref-id", .. })
        ));

        let missing_tokens = r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
            {"kind": "wrapper", "children": [{"kind": "token", "type-id": "KW_SELECT"}]}
        ]}]}"#;
        assert!(matches!(
            load(missing_tokens),
            Err(DefinitionError::MissingAttribute { attribute: "begin-token", .. })
        ));
    }

    #[test]
    fn test_exit_outside_sequence_is_ignored() {
        let grammar = load(
            r#"{"elements": [{"id": "a", "attributes": "ROOT", "children": [
                {"kind": "one-of", "children": [
                    {"kind": "token", "type-id": "KW_SELECT", "exit": true},
                    {"kind": "token", "type-id": "KW_FROM"}
                ]}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(grammar.warnings().len(), 1);
    }
}
