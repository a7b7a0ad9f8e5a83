//! Shared state of one parse

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ParseError;
use crate::grammar::{Branch, ElementId, ElementKind, Gate, Grammar};
use crate::lookup::LookupTable;
use crate::token::{TokenRegistry, TokenSet, TokenTypeId};
use crate::tree::NodeKind;

use super::builder::{Marker, TreeBuilder};
use super::ParseOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchKind {
    Matched,
    /// Consumed input but incomplete; an error was recorded
    Failed,
    NotMatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParseResult {
    pub kind: MatchKind,
    pub matched_tokens: usize,
}

impl ParseResult {
    pub fn matched(matched_tokens: usize) -> Self {
        Self {
            kind: MatchKind::Matched,
            matched_tokens,
        }
    }

    pub fn failed(matched_tokens: usize) -> Self {
        Self {
            kind: MatchKind::Failed,
            matched_tokens,
        }
    }

    pub fn not_matched() -> Self {
        Self {
            kind: MatchKind::NotMatched,
            matched_tokens: 0,
        }
    }

    /// Matched or Failed
    pub fn is_match(self) -> bool {
        self.kind != MatchKind::NotMatched
    }
}

/// One element on the current parse path, linked to its caller
#[derive(Debug)]
pub(crate) struct PathNode<'p> {
    pub element: ElementId,
    pub parent: Option<&'p PathNode<'p>>,
    /// Token cursor when the element was entered
    pub start: usize,
    /// Child index of a sequence being parsed
    pub cursor: Cell<usize>,
    pub serial: usize,
}

impl<'p> PathNode<'p> {
    /// This node and its callers, innermost first
    pub fn ancestors(&self) -> impl Iterator<Item = &PathNode<'p>> {
        std::iter::successors(Some(self), |node| node.parent)
    }
}

pub(crate) struct ParserContext<'g> {
    pub grammar: &'g Grammar,
    pub lookup: &'g LookupTable,
    pub registry: &'g TokenRegistry,
    pub builder: TreeBuilder,
    pub version: f64,
    branches: Vec<Branch>,
    /// Branches published by matched elements, keyed by the serial of the
    /// path node whose children may see them
    markers: Vec<(usize, Branch)>,
    pub last_resolved_leaf: Option<ElementId>,
    depth: usize,
    max_depth: usize,
    serial: usize,
    cancel: Option<&'g AtomicBool>,
}

impl<'g> ParserContext<'g> {
    pub fn new(
        grammar: &'g Grammar,
        builder: TreeBuilder,
        options: &ParseOptions,
        cancel: Option<&'g AtomicBool>,
    ) -> Self {
        Self {
            grammar,
            lookup: grammar.lookup(),
            registry: grammar.registry(),
            builder,
            version: options.version,
            branches: options.branches.clone(),
            markers: Vec::new(),
            last_resolved_leaf: None,
            depth: 0,
            max_depth: options.max_depth,
            serial: 0,
            cancel,
        }
    }

    pub fn check_cancelled(&self) -> Result<(), ParseError> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(ParseError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Forget per-statement state after an aborted statement
    pub fn reset(&mut self) {
        self.depth = 0;
        self.markers.clear();
    }

    pub fn allows(&self, gate: &Gate) -> bool {
        if gate.is_open() {
            return true;
        }
        let active = self
            .branches
            .iter()
            .chain(self.markers.iter().map(|(_, branch)| branch));
        gate.allows(active, self.version)
    }

    pub fn step_in<'p>(
        &mut self,
        element: ElementId,
        parent: Option<&'p PathNode<'p>>,
    ) -> Result<(PathNode<'p>, Marker), ParseError> {
        self.check_cancelled()?;
        if self.depth >= self.max_depth {
            return Err(ParseError::RecursionLimit(self.max_depth));
        }
        self.depth += 1;
        self.serial += 1;
        let marker = self.builder.mark();
        let node = PathNode {
            element,
            parent,
            start: self.builder.cursor(),
            cursor: Cell::new(0),
            serial: self.serial,
        };
        Ok((node, marker))
    }

    pub fn step_out(&mut self, node: &PathNode<'_>, marker: Marker, result: ParseResult) -> ParseResult {
        self.depth = self.depth.saturating_sub(1);
        self.markers.retain(|(owner, _)| *owner != node.serial);

        let grammar = self.grammar;
        let element = grammar.element(node.element);
        match result.kind {
            MatchKind::NotMatched => {
                self.builder.rollback_to(marker);
                return result;
            }
            MatchKind::Failed => self.error_expected(),
            MatchKind::Matched => {}
        }

        if matches!(element.kind, ElementKind::Block(_)) {
            self.builder.drop(marker);
        } else {
            self.builder.done(
                marker,
                NodeKind::Element {
                    element: node.element,
                    name: element.name.clone(),
                    partial: result.kind == MatchKind::Failed,
                },
            );
        }
        self.resolved(node.element, node.parent);
        result
    }

    /// Bookkeeping after an element matched: remember leaves and publish the
    /// element's branch to the enclosing node
    pub fn resolved(&mut self, element: ElementId, parent: Option<&PathNode<'_>>) {
        let grammar = self.grammar;
        let element = grammar.element(element);
        if element.is_leaf() {
            self.last_resolved_leaf = Some(element.id);
        }
        if let (Some(branch), Some(parent)) = (&element.branch, parent) {
            self.markers.push((parent.serial, branch.clone()));
        }
    }

    /// Record "expected ..." at the current position, using what may follow
    /// the last resolved leaf
    pub fn error_expected(&mut self) {
        let expected = match self.last_resolved_leaf {
            Some(leaf) => self.registry.describe(self.lookup.next_possible_tokens(leaf)),
            None => Vec::new(),
        };
        self.error_with(expected);
    }

    /// Record "expected ..." listing the given tokens
    pub fn error_expecting(&mut self, tokens: &TokenSet) {
        let expected = self.registry.describe(tokens);
        self.error_with(expected);
    }

    fn error_with(&mut self, expected: Vec<String>) {
        let message = if expected.is_empty() {
            match self.builder.current() {
                Some(token) => format!("unexpected '{}'", token.text.trim()),
                None => "unexpected end of input".to_string(),
            }
        } else {
            format!("expected {}", expected.join(" or "))
        };
        self.builder.error_here(message, expected);
    }

    /// Same element already entered at the same token position by a caller
    pub fn is_left_recursive(&self, element: ElementId, parent: Option<&PathNode<'_>>) -> bool {
        let cursor = self.builder.cursor();
        parent
            .map(|p| p.ancestors().any(|n| n.element == element && n.start == cursor))
            .unwrap_or(false)
    }

    /// Whether the element should be attempted at the current token
    pub fn should_parse(&self, element: ElementId, parent: Option<&PathNode<'_>>) -> bool {
        let Some(token) = self.builder.current_type() else {
            return false;
        };
        if self.registry.token_type(token).is_chameleon() {
            return self.lookup.could_start_with(element, token);
        }
        self.lookup.could_start_with(element, token)
            || (self.lookup.starts_with_identifier(element)
                && self.is_suppressible_reserved_word(token, element, parent))
    }

    /// Whether a reserved word may act as an identifier at this position
    pub fn is_suppressible_reserved_word(
        &self,
        token: TokenTypeId,
        element: ElementId,
        parent: Option<&PathNode<'_>>,
    ) -> bool {
        let token_type = self.registry.token_type(token);
        if !token_type.is_suppressible_reserved_word() {
            return false;
        }

        let shared = self.registry.shared();
        if let Some(dot) = shared.dot {
            if self.builder.previous_type() == Some(dot) || self.builder.lookahead(1) == Some(dot) {
                return true;
            }
        }

        if token_type.is_function() {
            if let Some(left_parenthesis) = shared.left_parenthesis {
                if self.builder.lookahead(1) != Some(left_parenthesis) {
                    return !self
                        .lookup
                        .next_required_tokens(element)
                        .contains(left_parenthesis);
                }
            }
        }

        let named = parent.and_then(|p| {
            p.ancestors()
                .map(|n| n.element)
                .find(|id| self.grammar.element(*id).is_named())
        });
        let last_leaf_accepts = |leaf: ElementId| self.lookup.can_be_followed_by(leaf, token);
        match named {
            Some(named) if self.lookup.contains_token(named, token) => self
                .last_resolved_leaf
                .map(|leaf| !last_leaf_accepts(leaf))
                .unwrap_or(false),
            _ => self
                .last_resolved_leaf
                .map(|leaf| !last_leaf_accepts(leaf))
                .unwrap_or(true),
        }
    }
}
