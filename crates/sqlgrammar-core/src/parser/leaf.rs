//! Token, identifier and chameleon leaves

use crate::error::ParseError;
use crate::grammar::{ElementId, ElementKind};
use crate::tree::NodeKind;

use super::context::{ParseResult, ParserContext, PathNode};

/// Consume the current token if it has the expected type (any identifier
/// matches any identifier) and carries the expected text
pub(super) fn parse_token(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let ElementKind::Token { token, text } = &grammar.element(id).kind else {
        return Ok(ParseResult::not_matched());
    };
    let Some(current) = ctx.builder.current() else {
        return Ok(ParseResult::not_matched());
    };
    let expected = ctx.registry.token_type(*token);
    let matches = ctx
        .registry
        .get(current.token_type)
        .map(|actual| expected.matches(actual))
        .unwrap_or(false)
        && text
            .as_deref()
            .map(|text| current.text.eq_ignore_ascii_case(text))
            .unwrap_or(true);
    if !matches {
        return Ok(ParseResult::not_matched());
    }
    ctx.builder.advance();
    ctx.resolved(id, parent);
    Ok(ParseResult::matched(1))
}

/// Consume an identifier, or a reserved word usable as one here
pub(super) fn parse_identifier(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let Some(token) = ctx.builder.current_type() else {
        return Ok(ParseResult::not_matched());
    };
    let accepted = ctx.registry.token_type(token).is_identifier()
        || ctx.is_suppressible_reserved_word(token, id, parent);
    if !accepted {
        return Ok(ParseResult::not_matched());
    }
    let (node, marker) = ctx.step_in(id, parent)?;
    ctx.builder.advance();
    Ok(ctx.step_out(&node, marker, ParseResult::matched(1)))
}

/// Consume a chameleon token of the element's language as a deferred region
pub(super) fn parse_chameleon(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let ElementKind::Chameleon { language } = grammar.element(id).kind else {
        return Ok(ParseResult::not_matched());
    };
    let Some(token) = ctx.builder.current_type() else {
        return Ok(ParseResult::not_matched());
    };
    let token_type = ctx.registry.token_type(token);
    if !token_type.is_chameleon() || token_type.language != Some(language) {
        return Ok(ParseResult::not_matched());
    }
    let marker = ctx.builder.mark();
    ctx.builder.advance();
    ctx.builder.done(marker, NodeKind::Chameleon { language });
    ctx.resolved(id, parent);
    Ok(ParseResult::matched(1))
}
