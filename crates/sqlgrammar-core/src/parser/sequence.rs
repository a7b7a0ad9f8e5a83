//! Sequence, block and named elements

use crate::error::ParseError;
use crate::grammar::{ElementId, ElementKind, SequenceBody};
use crate::token::TokenTypeId;

use super::context::{ParseResult, ParserContext, PathNode};
use super::parse_element;

/// Where landmark recovery left the sequence
enum Recovery {
    /// Continue with the child at this index
    Resume(usize),
    /// The landmark belongs to an enclosing element
    Stop,
}

pub(super) fn parse(
    ctx: &mut ParserContext<'_>,
    id: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    let Some(body) = grammar.element(id).kind.sequence_body() else {
        return Ok(ParseResult::not_matched());
    };
    if ctx.is_left_recursive(id, parent) || !ctx.should_parse(id, parent) {
        return Ok(ParseResult::not_matched());
    }

    let (node, marker) = ctx.step_in(id, parent)?;
    let children = &body.children;
    let mut matches = 0;
    let mut matched_tokens = 0;
    let mut index = 0;

    while index < children.len() {
        node.cursor.set(index);
        let child = &children[index];

        // A deferred region ends the sequence unless a later child takes it
        let foreign_region = ctx.builder.current_type().is_some_and(|token| {
            ctx.registry.token_type(token).is_chameleon()
                && !ctx.lookup.could_start_with(child.element, token)
        });
        if foreign_region && child.optional {
            index += 1;
            continue;
        }
        if foreign_region || ctx.builder.is_eof() {
            let result = if matches == 0 || body.is_exit_index(index) {
                ParseResult::not_matched()
            } else if body.is_optional_from(index) {
                ParseResult::matched(matched_tokens)
            } else {
                ParseResult::failed(matched_tokens)
            };
            return Ok(ctx.step_out(&node, marker, result));
        }

        if !ctx.allows(&child.gate) {
            index += 1;
            continue;
        }

        let result = parse_element(ctx, child.element, Some(&node))?;
        if result.is_match() {
            matches += 1;
            matched_tokens += result.matched_tokens;
            index += 1;
            continue;
        }
        if child.optional {
            index += 1;
            continue;
        }

        let weak_match = matches < 2
            && matched_tokens < 3
            && index > 1
            && grammar.element(children[0].element).is_identifier_reference();
        if index == 0 || matches == 0 || body.is_exit_index(index) || weak_match {
            return Ok(ctx.step_out(&node, marker, ParseResult::not_matched()));
        }

        let before = ctx.builder.cursor();
        let recovery = recover(ctx, &node, body, index);
        matched_tokens += ctx.builder.cursor() - before;
        match recovery {
            Recovery::Resume(next) => index = next,
            Recovery::Stop => {
                return Ok(ctx.step_out(&node, marker, ParseResult::failed(matched_tokens)));
            }
        }
    }

    let result = if matches > 0 {
        ParseResult::matched(matched_tokens)
    } else {
        ParseResult::not_matched()
    };
    Ok(ctx.step_out(&node, marker, result))
}

/// Skip tokens after a missing required child until a landmark some element
/// can continue with. The skipped tokens end up in an error node listing what
/// the sequence expected.
fn recover(ctx: &mut ParserContext<'_>, node: &PathNode<'_>, body: &SequenceBody, index: usize) -> Recovery {
    let expected_tokens = ctx.lookup.first_possible_from(body, index);
    let expected = ctx.registry.describe(&expected_tokens);
    let marker = ctx.builder.mark();
    let mut skipped = 0;

    let recovery = loop {
        let Some(token) = ctx.builder.current_type() else {
            break Recovery::Stop;
        };
        if ctx.registry.token_type(token).is_parser_landmark() {
            let statement = node
                .ancestors()
                .find(|n| ctx.grammar.element(n.element).attributes.is_scope_demarcation());
            if statement.is_some_and(|s| ctx.lookup.could_start_with(s.element, token)) {
                break Recovery::Stop;
            }
            // The failed child only gets another chance once input was skipped
            let first = if skipped == 0 { index + 1 } else { index };
            let resume = (first..body.children.len()).find(|i| {
                let child = &body.children[*i];
                ctx.allows(&child.gate) && ctx.lookup.could_start_with(child.element, token)
            });
            if let Some(next) = resume {
                break Recovery::Resume(next);
            }
            if owned_by_ancestor(ctx, node, token) {
                break Recovery::Stop;
            }
        }
        ctx.builder.advance();
        skipped += 1;
    };

    if skipped == 0 {
        ctx.builder.rollback_to(marker);
        let message = format!("expected {}", expected.join(" or "));
        ctx.builder.error_here(message, expected);
    } else {
        let message = match expected.is_empty() {
            true => "unexpected input".to_string(),
            false => format!("unexpected input, expected {}", expected.join(" or ")),
        };
        ctx.builder.error_node(marker, message, expected);
    }
    recovery
}

/// Whether an enclosing element is waiting for `token`: a later child of a
/// sequence, an iteration separator or a wrapper's end token
pub(super) fn owned_by_ancestor(
    ctx: &ParserContext<'_>,
    node: &PathNode<'_>,
    token: TokenTypeId,
) -> bool {
    let lookup = ctx.lookup;
    node.ancestors().skip(1).any(|ancestor| {
        match &ctx.grammar.element(ancestor.element).kind {
            ElementKind::Sequence(body) | ElementKind::Block(body) | ElementKind::Named(body) => body
                .children
                .iter()
                .skip(ancestor.cursor.get() + 1)
                .any(|child| lookup.could_start_with(child.element, token)),
            ElementKind::Iteration { separators, .. } => separators
                .iter()
                .any(|separator| lookup.could_start_with(*separator, token)),
            ElementKind::Wrapper { end, .. } => lookup.could_start_with(*end, token),
            _ => false,
        }
    })
}
