//! Repeated elements, optionally separated

use crate::error::ParseError;
use crate::grammar::{ElementId, ElementKind};

use super::context::{ParseResult, ParserContext, PathNode};
use super::parse_element;
use super::sequence::owned_by_ancestor;

pub(super) fn parse(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let ElementKind::Iteration {
        child,
        separators,
        elements_count,
        min_iterations,
    } = &grammar.element(id).kind
    else {
        return Ok(ParseResult::not_matched());
    };
    if ctx.is_left_recursive(id, parent) {
        return Ok(ParseResult::not_matched());
    }

    let (node, marker) = ctx.step_in(id, parent)?;
    let first = parse_element(ctx, *child, Some(&node))?;
    if !first.is_match() {
        return Ok(ctx.step_out(&node, marker, ParseResult::not_matched()));
    }

    let lookup = ctx.lookup;
    let mut iterations = 1;
    let mut matched_tokens = first.matched_tokens;
    let mut failed = false;

    loop {
        ctx.check_cancelled()?;
        if separators.is_empty() {
            let before = ctx.builder.cursor();
            let result = parse_element(ctx, *child, Some(&node))?;
            if !result.is_match() || ctx.builder.cursor() == before {
                break;
            }
            iterations += 1;
            matched_tokens += result.matched_tokens;
            continue;
        }

        let Some(token) = ctx.builder.current_type() else {
            break;
        };
        let Some(separator) = separators
            .iter()
            .copied()
            .find(|s| lookup.could_start_with(*s, token))
        else {
            break;
        };

        let separator_marker = ctx.builder.mark();
        ctx.builder.advance();
        ctx.resolved(separator, Some(&node));

        let result = parse_element(ctx, *child, Some(&node))?;
        if result.is_match() {
            ctx.builder.drop(separator_marker);
            iterations += 1;
            matched_tokens += result.matched_tokens + 1;
            continue;
        }

        if lookup.can_be_followed_by(id, token) {
            // the separator belongs to whatever follows the iteration
            ctx.builder.rollback_to(separator_marker);
            break;
        }
        ctx.builder.drop(separator_marker);
        matched_tokens += 1;
        failed = true;

        // skip to the next separator or a token the child can start with
        let expected = ctx.registry.describe(lookup.first_possible_tokens(*child));
        let skipped = ctx.builder.mark();
        let mut count = 0;
        let resume = loop {
            let Some(current) = ctx.builder.current_type() else {
                break false;
            };
            let current_type = ctx.registry.token_type(current);
            if current_type.is_parser_landmark() {
                if separators.iter().any(|s| lookup.could_start_with(*s, current))
                    || lookup.could_start_with(*child, current)
                {
                    break true;
                }
                // deferred regions are left to the driver
                if current_type.is_chameleon() || owned_by_ancestor(ctx, &node, current) {
                    break false;
                }
            }
            ctx.builder.advance();
            count += 1;
        };
        if count == 0 {
            ctx.builder.rollback_to(skipped);
            let message = format!("expected {}", expected.join(" or "));
            ctx.builder.error_here(message, expected);
        } else {
            let message = format!("unexpected input, expected {}", expected.join(" or "));
            ctx.builder.error_node(skipped, message, expected);
            matched_tokens += count;
        }
        if !resume {
            break;
        }
        if ctx.builder.current_type().is_some_and(|t| lookup.could_start_with(*child, t)) {
            let result = parse_element(ctx, *child, Some(&node))?;
            if result.is_match() {
                iterations += 1;
                matched_tokens += result.matched_tokens;
            }
        }
    }

    let counted = elements_count.is_empty() || elements_count.iter().any(|range| range.contains(&iterations));
    let result = if iterations < *min_iterations {
        ParseResult::not_matched()
    } else if failed || !counted {
        ParseResult::failed(matched_tokens)
    } else {
        ParseResult::matched(matched_tokens)
    };
    Ok(ctx.step_out(&node, marker, result))
}
