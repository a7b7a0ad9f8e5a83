//! Dotted names such as `schema.table.column`

use crate::error::ParseError;
use crate::grammar::{ElementId, ElementKind};

use super::context::{ParseResult, ParserContext, PathNode};
use super::leaf;

pub(super) fn parse(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let ElementKind::QualifiedIdentifier { separator, .. } = &grammar.element(id).kind else {
        return Ok(ParseResult::not_matched());
    };
    if !ctx.should_parse(id, parent) {
        return Ok(ParseResult::not_matched());
    }
    let Some(variant) = grammar.resolve_qualified_identifier(id, ctx.builder.remaining_types()) else {
        return Ok(ParseResult::not_matched());
    };

    let (node, marker) = ctx.step_in(id, parent)?;
    let mut consumed = 0;
    let mut matched_tokens = 0;
    let mut missing = None;
    for (position, leaf_id) in variant.leaves.iter().copied().enumerate() {
        if position > 0 {
            let result = leaf::parse_token(ctx, *separator, Some(&node))?;
            if !result.is_match() {
                missing = Some(*separator);
                break;
            }
            matched_tokens += result.matched_tokens;
        }
        let result = match grammar.element(leaf_id).kind {
            ElementKind::Token { .. } => leaf::parse_token(ctx, leaf_id, Some(&node))?,
            _ => leaf::parse_identifier(ctx, leaf_id, Some(&node))?,
        };
        if !result.is_match() {
            missing = Some(leaf_id);
            break;
        }
        consumed += 1;
        matched_tokens += result.matched_tokens;
    }

    if consumed == 0 {
        return Ok(ctx.step_out(&node, marker, ParseResult::not_matched()));
    }
    let incomplete = consumed < variant.leaves.len() || variant.chain_length > variant.leaves.len();
    if !incomplete {
        return Ok(ctx.step_out(&node, marker, ParseResult::matched(matched_tokens)));
    }

    let expected = match missing {
        Some(element) => ctx.lookup.first_possible_tokens(element).clone(),
        None => ctx.lookup.next_possible_tokens(id).clone(),
    };
    ctx.error_expecting(&expected);
    Ok(ctx.step_out(&node, marker, ParseResult::failed(matched_tokens)))
}
