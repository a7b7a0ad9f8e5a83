//! Qualified identifier variants
//!
//! A rule such as `[owner.]table.column` expands into every contiguous leaf
//! combination its optional components allow. A dotted input is matched back
//! against those variants to pick the most probable reading.

use std::cmp::Ordering;

use super::{ElementId, ElementKind, Grammar};
use crate::token::TokenTypeId;

/// One legal leaf combination of a qualified identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedIdentifierVariant {
    pub leaves: Vec<ElementId>,
}

impl QualifiedIdentifierVariant {
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

/// A variant evaluated against a concrete dotted input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantMatch {
    /// Position of the variant in declaration order
    pub index: usize,
    pub leaves: Vec<ElementId>,
    /// Leaves whose token type matches the input component at their position
    pub matched_tokens: usize,
    /// Number of dotted components found in the input
    pub chain_length: usize,
    /// Fewer matches than leaves, or more input components than leaves
    pub incomplete: bool,
}

impl VariantMatch {
    fn new(index: usize, variant: &QualifiedIdentifierVariant, matched_tokens: usize, chain_length: usize) -> Self {
        Self {
            index,
            leaves: variant.leaves.clone(),
            matched_tokens,
            chain_length,
            incomplete: matched_tokens < variant.len() || chain_length > variant.len(),
        }
    }
}

impl Ord for VariantMatch {
    /// Most specific first: complete before incomplete, longer before
    /// shorter, then declaration order
    fn cmp(&self, other: &Self) -> Ordering {
        self.incomplete
            .cmp(&other.incomplete)
            .then_with(|| other.leaves.len().cmp(&self.leaves.len()))
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for VariantMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Expand one component group into its variants: the full list, the prefixes
/// left after dropping optional trailing components, and for every optional
/// leading component the remaining suffix together with its own prefixes.
pub(crate) fn create_variants(leaves: &[ElementId], optional: &[bool]) -> Vec<QualifiedIdentifierVariant> {
    let mut variants: Vec<QualifiedIdentifierVariant> = Vec::new();
    let mut add = |slice: &[ElementId]| {
        if !slice.is_empty() && !variants.iter().any(|v| v.leaves == slice) {
            variants.push(QualifiedIdentifierVariant {
                leaves: slice.to_vec(),
            });
        }
    };

    if leaves.is_empty() {
        return Vec::new();
    }
    add(leaves);

    let last = leaves.len() - 1;
    let mut right = last;
    while right > 0 && optional[right] {
        add(&leaves[..right]);
        right -= 1;
    }

    let mut left = 0;
    while left < last && optional[left] {
        let start = left + 1;
        add(&leaves[start..]);
        let mut right = last;
        while right > start && optional[right] {
            add(&leaves[start..right]);
            right -= 1;
        }
        left += 1;
    }

    variants
}

/// Token type a leaf stands for when compared with input components
fn leaf_token(grammar: &Grammar, leaf: ElementId) -> TokenTypeId {
    match &grammar.element(leaf).kind {
        ElementKind::Token { token, .. } => *token,
        _ => grammar.registry().shared().identifier,
    }
}

/// Reduce upcoming token types to the dotted component chain. A missing
/// component (leading, doubled or trailing separator) becomes an identifier
/// placeholder.
pub(crate) fn build_chain(grammar: &Grammar, element: ElementId, tokens: &[TokenTypeId]) -> Vec<TokenTypeId> {
    let ElementKind::QualifiedIdentifier { separator, .. } = &grammar.element(element).kind else {
        return Vec::new();
    };
    let registry = grammar.registry();
    let identifier = registry.shared().identifier;
    let separator = leaf_token(grammar, *separator);
    let lookup = grammar.lookup();

    let mut chain = Vec::new();
    let mut was_separator = true;
    for (position, token) in tokens.iter().copied().enumerate() {
        if token == separator {
            if was_separator {
                chain.push(identifier);
            }
            was_separator = true;
        } else {
            if !was_separator {
                break;
            }
            let is_identifier = registry.get(token).map(|t| t.is_identifier()).unwrap_or(false);
            if is_identifier || lookup.contains_token(element, token) {
                chain.push(token);
            } else {
                chain.push(identifier);
            }
            was_separator = false;
        }
        if position + 1 == tokens.len() && was_separator {
            chain.push(identifier);
        }
    }
    chain
}

fn evaluate(grammar: &Grammar, element: ElementId, tokens: &[TokenTypeId]) -> Vec<VariantMatch> {
    let ElementKind::QualifiedIdentifier { variants, .. } = &grammar.element(element).kind else {
        return Vec::new();
    };
    let registry = grammar.registry();
    let chain = build_chain(grammar, element, tokens);

    variants
        .iter()
        .enumerate()
        .filter(|(_, variant)| variant.len() <= chain.len())
        .map(|(index, variant)| {
            let matched = variant
                .leaves
                .iter()
                .zip(&chain)
                .filter(|(leaf, token)| {
                    let expected = registry.token_type(leaf_token(grammar, **leaf));
                    registry
                        .get(**token)
                        .map(|actual| expected.matches(actual))
                        .unwrap_or(false)
                })
                .count();
            VariantMatch::new(index, variant, matched, chain.len())
        })
        .collect()
}

/// Variant with the most matching leaves; ties keep the earlier declared one
pub(crate) fn resolve(grammar: &Grammar, element: ElementId, tokens: &[TokenTypeId]) -> Option<VariantMatch> {
    let mut best: Option<VariantMatch> = None;
    for candidate in evaluate(grammar, element, tokens) {
        if best
            .as_ref()
            .map_or(true, |b| b.matched_tokens < candidate.matched_tokens)
        {
            best = Some(candidate);
        }
    }
    best
}

/// All applicable variants, most specific first
pub(crate) fn rank(grammar: &Grammar, element: ElementId, tokens: &[TokenTypeId]) -> Vec<VariantMatch> {
    let mut matches = evaluate(grammar, element, tokens);
    matches.sort();
    matches
}
