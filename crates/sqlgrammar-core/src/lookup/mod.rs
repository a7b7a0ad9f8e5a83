//! Lookup cache - first/next token sets per grammar element
//!
//! The table is computed once per grammar as a monotone fixpoint: every set
//! starts empty and only grows, so recursion through named elements
//! converges. Gates are ignored here; the parser applies them per edge.

use std::collections::BTreeSet;

use tracing::debug;

use crate::grammar::{Element, ElementId, ElementKind, Grammar, SequenceBody};
use crate::token::{TokenSet, TokenTypeId};

/// Sets that can be combined along grammar edges
trait FirstSet: Clone + Default + PartialEq {
    fn union_with(&mut self, other: &Self);
    fn intersect_with(&mut self, other: &Self);
}

impl FirstSet for TokenSet {
    fn union_with(&mut self, other: &Self) {
        TokenSet::union_with(self, other);
    }

    fn intersect_with(&mut self, other: &Self) {
        TokenSet::intersect_with(self, other);
    }
}

impl FirstSet for BTreeSet<ElementId> {
    fn union_with(&mut self, other: &Self) {
        self.extend(other.iter().copied());
    }

    fn intersect_with(&mut self, other: &Self) {
        self.retain(|id| other.contains(id));
    }
}

/// Possible and required first sets of one element
fn first_of<S: FirstSet>(
    element: &Element,
    possible: &[S],
    required: &[S],
    leaf: &impl Fn(&Element) -> S,
) -> (S, S) {
    let intersect_all = |ids: &mut dyn Iterator<Item = ElementId>| {
        let mut acc: Option<S> = None;
        for id in ids {
            match &mut acc {
                Some(set) => set.intersect_with(&required[id.index()]),
                None => acc = Some(required[id.index()].clone()),
            }
        }
        acc.unwrap_or_default()
    };

    match &element.kind {
        ElementKind::Token { .. } | ElementKind::Identifier { .. } | ElementKind::Chameleon { .. } => {
            let set = leaf(element);
            (set.clone(), set)
        }
        ElementKind::Unknown => (S::default(), S::default()),
        ElementKind::Sequence(body) | ElementKind::Block(body) | ElementKind::Named(body) => {
            let mut first = S::default();
            for child in &body.children {
                first.union_with(&possible[child.element.index()]);
                if !child.optional {
                    break;
                }
            }
            let first_required = match body.children.first() {
                Some(child) if !child.optional => required[child.element.index()].clone(),
                _ => S::default(),
            };
            (first, first_required)
        }
        ElementKind::OneOf { alternatives, .. } => {
            let mut first = S::default();
            for alternative in alternatives {
                first.union_with(&possible[alternative.element.index()]);
            }
            let first_required = intersect_all(&mut alternatives.iter().map(|a| a.element));
            (first, first_required)
        }
        ElementKind::Iteration { child, .. } => (
            possible[child.index()].clone(),
            required[child.index()].clone(),
        ),
        ElementKind::Wrapper { begin, .. } => (
            possible[begin.index()].clone(),
            required[begin.index()].clone(),
        ),
        ElementKind::QualifiedIdentifier { variants, .. } => {
            let mut first = S::default();
            for variant in variants {
                if let Some(leaf) = variant.leaves.first() {
                    first.union_with(&possible[leaf.index()]);
                }
            }
            let first_required =
                intersect_all(&mut variants.iter().filter_map(|v| v.leaves.first().copied()));
            (first, first_required)
        }
    }
}

/// Least fixpoint of the first sets over the whole grammar
fn fixpoint<S: FirstSet>(grammar: &Grammar, leaf: impl Fn(&Element) -> S) -> (Vec<S>, Vec<S>, usize) {
    let mut possible = vec![S::default(); grammar.len()];
    let mut required = vec![S::default(); grammar.len()];
    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        for element in grammar.elements() {
            let (p, r) = first_of(element, &possible, &required, &leaf);
            let index = element.id.index();
            if p != possible[index] {
                possible[index] = p;
                changed = true;
            }
            if r != required[index] {
                required[index] = r;
                changed = true;
            }
        }
        if !changed {
            return (possible, required, rounds);
        }
    }
}

/// Element ids directly reachable from an element, in the grammar arena
fn children_of(element: &Element) -> Vec<ElementId> {
    match &element.kind {
        ElementKind::Sequence(body) | ElementKind::Block(body) | ElementKind::Named(body) => {
            body.children.iter().map(|c| c.element).collect()
        }
        ElementKind::OneOf { alternatives, .. } => alternatives.iter().map(|a| a.element).collect(),
        ElementKind::Iteration {
            child, separators, ..
        } => std::iter::once(*child).chain(separators.iter().copied()).collect(),
        ElementKind::Wrapper {
            begin, end, child, ..
        } => vec![*begin, *child, *end],
        ElementKind::QualifiedIdentifier {
            separator,
            variants,
        } => std::iter::once(*separator)
            .chain(variants.iter().flat_map(|v| v.leaves.iter().copied()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Precomputed token sets for every element of a grammar
#[derive(Debug)]
pub struct LookupTable {
    first_possible: Vec<TokenSet>,
    first_required: Vec<TokenSet>,
    first_possible_leaves: Vec<Vec<ElementId>>,
    first_required_leaves: Vec<Vec<ElementId>>,
    all_possible: Vec<TokenSet>,
    next_possible: Vec<TokenSet>,
    next_required: Vec<TokenSet>,
    starts_with_identifier: Vec<bool>,
    alternative_order: Vec<Vec<usize>>,
    identifiers: TokenSet,
}

impl LookupTable {
    pub(crate) fn compute(grammar: &Grammar) -> Self {
        let registry = grammar.registry();
        let shared = registry.shared();
        let identifiers: TokenSet = registry
            .iter()
            .filter(|t| t.is_identifier())
            .map(|t| t.index)
            .collect();

        let leaf_tokens = |element: &Element| -> TokenSet {
            match &element.kind {
                ElementKind::Token { token, .. } => std::iter::once(*token).collect(),
                ElementKind::Identifier { .. } => [shared.identifier, shared.quoted_identifier]
                    .into_iter()
                    .collect(),
                ElementKind::Chameleon { language } => registry.chameleon_tokens(*language),
                _ => TokenSet::new(),
            }
        };

        let (first_possible, first_required, token_rounds) = fixpoint(grammar, &leaf_tokens);
        let (possible_leaves, required_leaves, leaf_rounds) =
            fixpoint(grammar, |element: &Element| match element.kind {
                ElementKind::Token { .. } | ElementKind::Identifier { .. } => {
                    std::iter::once(element.id).collect()
                }
                _ => BTreeSet::new(),
            });

        let mut all_possible: Vec<TokenSet> = grammar.elements().map(&leaf_tokens).collect();
        let children: Vec<Vec<ElementId>> = grammar.elements().map(children_of).collect();
        loop {
            let mut changed = false;
            for (index, kids) in children.iter().enumerate() {
                for kid in kids {
                    if kid.index() == index {
                        continue;
                    }
                    let kid_set = all_possible[kid.index()].clone();
                    changed |= all_possible[index].union_with(&kid_set);
                }
            }
            if !changed {
                break;
            }
        }

        let starts_with_identifier = first_possible
            .iter()
            .map(|set| set.intersects(&identifiers))
            .collect();

        let mut table = Self {
            first_possible,
            first_required,
            first_possible_leaves: possible_leaves
                .into_iter()
                .map(|s| s.into_iter().collect())
                .collect(),
            first_required_leaves: required_leaves
                .into_iter()
                .map(|s| s.into_iter().collect())
                .collect(),
            all_possible,
            next_possible: Vec::new(),
            next_required: Vec::new(),
            starts_with_identifier,
            alternative_order: Vec::new(),
            identifiers,
        };

        let (next_possible, next_required): (Vec<_>, Vec<_>) = grammar
            .elements()
            .map(|element| table.follow_sets(grammar, element.id))
            .unzip();
        table.next_possible = next_possible;
        table.next_required = next_required;
        table.alternative_order = grammar
            .elements()
            .map(|element| table.resolve_order(grammar, element))
            .collect();

        debug!(
            language = %grammar.language(),
            elements = grammar.len(),
            token_rounds,
            leaf_rounds,
            "Lookup table computed"
        );
        table
    }

    /// Tokens that may follow an element inside its enclosing named element
    fn follow_sets(&self, grammar: &Grammar, id: ElementId) -> (TokenSet, TokenSet) {
        let mut possible = TokenSet::new();
        let mut current = id;
        while let Some(parent) = grammar.element(current).parent {
            match &grammar.element(parent).kind {
                ElementKind::Sequence(body) | ElementKind::Block(body) | ElementKind::Named(body) => {
                    if let Some(position) = body.position_of(current) {
                        for child in &body.children[position + 1..] {
                            possible.union_with(&self.first_possible[child.element.index()]);
                            if !child.optional {
                                return (possible, self.first_required[child.element.index()].clone());
                            }
                        }
                    }
                }
                ElementKind::Iteration {
                    child, separators, ..
                } => {
                    if separators.contains(&current) {
                        possible.union_with(&self.first_possible[child.index()]);
                        return (possible, self.first_required[child.index()].clone());
                    }
                    if separators.is_empty() {
                        possible.union_with(&self.first_possible[child.index()]);
                    }
                    for separator in separators {
                        possible.union_with(&self.first_possible[separator.index()]);
                    }
                }
                ElementKind::Wrapper {
                    begin,
                    end,
                    child,
                    child_optional,
                } => {
                    if current == *begin {
                        possible.union_with(&self.first_possible[child.index()]);
                        if *child_optional {
                            possible.union_with(&self.first_possible[end.index()]);
                            return (possible, TokenSet::new());
                        }
                        return (possible, self.first_required[child.index()].clone());
                    }
                    if current == *child {
                        possible.union_with(&self.first_possible[end.index()]);
                        return (possible, self.first_required[end.index()].clone());
                    }
                }
                ElementKind::QualifiedIdentifier {
                    separator,
                    variants,
                } => {
                    if current == *separator {
                        for variant in variants {
                            for leaf in variant.leaves.iter().skip(1) {
                                possible.union_with(&self.first_possible[leaf.index()]);
                            }
                        }
                        return (possible, TokenSet::new());
                    }
                    possible.union_with(&self.first_possible[separator.index()]);
                }
                _ => {}
            }
            current = parent;
        }
        (possible, TokenSet::new())
    }

    /// Evaluation order of one-of alternatives: declared order, or for
    /// sortable elements non-identifier alternatives first, then
    /// identifier-led constructs, then bare identifiers
    fn resolve_order(&self, grammar: &Grammar, element: &Element) -> Vec<usize> {
        let ElementKind::OneOf {
            alternatives,
            sortable,
        } = &element.kind
        else {
            return Vec::new();
        };
        let mut order: Vec<usize> = (0..alternatives.len()).collect();
        if *sortable {
            order.sort_by_key(|index| {
                let id = alternatives[*index].element;
                if !self.starts_with_identifier[id.index()] {
                    0
                } else if grammar.element(id).is_leaf() {
                    2
                } else {
                    1
                }
            });
        }
        order
    }

    pub fn first_possible_tokens(&self, element: ElementId) -> &TokenSet {
        &self.first_possible[element.index()]
    }

    pub fn first_required_tokens(&self, element: ElementId) -> &TokenSet {
        &self.first_required[element.index()]
    }

    /// Identifier tokens are interchangeable here, as in token matching
    pub fn could_start_with(&self, element: ElementId, token: TokenTypeId) -> bool {
        let first = &self.first_possible[element.index()];
        first.contains(token) || (self.identifiers.contains(token) && first.intersects(&self.identifiers))
    }

    pub fn is_first_required_token(&self, element: ElementId, token: TokenTypeId) -> bool {
        self.first_required[element.index()].contains(token)
    }

    pub fn first_possible_leaves(&self, element: ElementId) -> &[ElementId] {
        &self.first_possible_leaves[element.index()]
    }

    pub fn first_required_leaves(&self, element: ElementId) -> &[ElementId] {
        &self.first_required_leaves[element.index()]
    }

    /// Every token reachable from the element, separators and wrapper
    /// tokens included
    pub fn all_possible_tokens(&self, element: ElementId) -> &TokenSet {
        &self.all_possible[element.index()]
    }

    pub fn contains_token(&self, element: ElementId, token: TokenTypeId) -> bool {
        self.all_possible[element.index()].contains(token)
    }

    pub fn starts_with_identifier(&self, element: ElementId) -> bool {
        self.starts_with_identifier[element.index()]
    }

    pub fn next_possible_tokens(&self, element: ElementId) -> &TokenSet {
        &self.next_possible[element.index()]
    }

    pub fn next_required_tokens(&self, element: ElementId) -> &TokenSet {
        &self.next_required[element.index()]
    }

    /// Whether `token` may directly follow `element`
    pub fn can_be_followed_by(&self, element: ElementId, token: TokenTypeId) -> bool {
        let next = &self.next_possible[element.index()];
        next.contains(token) || (self.identifiers.contains(token) && next.intersects(&self.identifiers))
    }

    /// Alternative indices of a one-of element in evaluation order
    pub fn alternative_order(&self, element: ElementId) -> &[usize] {
        &self.alternative_order[element.index()]
    }

    /// Tokens a sequence can continue with at child `index`
    pub fn first_possible_from(&self, body: &SequenceBody, index: usize) -> TokenSet {
        let mut possible = TokenSet::new();
        for child in body.children.iter().skip(index) {
            possible.union_with(&self.first_possible[child.element.index()]);
            if !child.optional {
                break;
            }
        }
        possible
    }
}
