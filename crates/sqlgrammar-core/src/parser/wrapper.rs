//! Begin/end delimited elements

use crate::error::ParseError;
use crate::grammar::{ElementId, ElementKind};

use super::context::{ParseResult, ParserContext, PathNode};
use super::parse_element;

pub(super) fn parse(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let ElementKind::Wrapper {
        begin,
        end,
        child,
        child_optional,
    } = &grammar.element(id).kind
    else {
        return Ok(ParseResult::not_matched());
    };
    if !ctx.should_parse(id, parent) {
        return Ok(ParseResult::not_matched());
    }

    let (node, marker) = ctx.step_in(id, parent)?;
    let begin_result = parse_element(ctx, *begin, Some(&node))?;
    if !begin_result.is_match() {
        return Ok(ctx.step_out(&node, marker, ParseResult::not_matched()));
    }

    let lookup = ctx.lookup;
    let strong = is_strong(ctx, id, *begin, parent);
    let mut matched_tokens = begin_result.matched_tokens;
    let at_end = ctx
        .builder
        .current_type()
        .is_some_and(|token| lookup.could_start_with(*end, token));

    if !(*child_optional && at_end) {
        let result = parse_element(ctx, *child, Some(&node))?;
        if result.is_match() {
            matched_tokens += result.matched_tokens;
        } else if *child_optional {
            // nothing inside, the end token decides
        } else if !strong && !at_end {
            return Ok(ctx.step_out(&node, marker, ParseResult::not_matched()));
        } else {
            ctx.error_expecting(lookup.first_possible_tokens(*child));
        }
    }

    let end_result = parse_element(ctx, *end, Some(&node))?;
    if end_result.is_match() {
        matched_tokens += end_result.matched_tokens;
        return Ok(ctx.step_out(&node, marker, ParseResult::matched(matched_tokens)));
    }
    if !strong && matched_tokens == begin_result.matched_tokens {
        return Ok(ctx.step_out(&node, marker, ParseResult::not_matched()));
    }
    ctx.error_expecting(lookup.first_possible_tokens(*end));
    Ok(ctx.step_out(&node, marker, ParseResult::failed(matched_tokens)))
}

/// A wrapper is committed once its begin token matched when that token is a
/// reserved word, or when it is a required, non-leading part of the
/// enclosing sequence
fn is_strong(
    ctx: &ParserContext<'_>,
    id: ElementId,
    begin: ElementId,
    parent: Option<&PathNode<'_>>,
) -> bool {
    let grammar = ctx.grammar;
    if let ElementKind::Token { token, .. } = grammar.element(begin).kind {
        if ctx.registry.token_type(token).is_reserved_word() {
            return true;
        }
    }
    let Some(parent) = parent else {
        return false;
    };
    let Some(body) = grammar.element(parent.element).kind.sequence_body() else {
        return false;
    };
    let index = parent.cursor.get();
    body.children
        .get(index)
        .is_some_and(|edge| edge.element == id && !edge.optional && index > 0 && !body.is_optional_to(index))
}
