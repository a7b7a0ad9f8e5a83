//! Alternatives

use crate::error::ParseError;
use crate::grammar::{ElementId, ElementKind};

use super::context::{ParseResult, ParserContext, PathNode};
use super::parse_element;

/// Try the alternatives in lookup order; the first that matches wins
pub(super) fn parse(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let ElementKind::OneOf { alternatives, .. } = &grammar.element(id).kind else {
        return Ok(ParseResult::not_matched());
    };
    if !ctx.should_parse(id, parent) {
        return Ok(ParseResult::not_matched());
    }

    let (node, marker) = ctx.step_in(id, parent)?;
    let lookup = ctx.lookup;
    for index in lookup.alternative_order(id) {
        let alternative = &alternatives[*index];
        if !ctx.allows(&alternative.gate) {
            continue;
        }
        let result = parse_element(ctx, alternative.element, Some(&node))?;
        if result.is_match() {
            return Ok(ctx.step_out(&node, marker, result));
        }
    }
    Ok(ctx.step_out(&node, marker, ParseResult::not_matched()))
}
