//! Expansion of embedded-language regions
//!
//! A chameleon node keeps its source verbatim during the outer parse. Expanding
//! it re-lexes and parses the content with the embedded language's dialect and
//! moves every span into the coordinates of the outer source.

use tracing::{debug, warn};

use crate::dialect::{Dialect, Language};
use crate::error::{ParseError, Span};
use crate::grammar::Grammar;
use crate::lexer::Lexer;
use crate::parser::{ParseOptions, Parser};
use crate::tree::{ChameleonRegion, SyntaxElement, SyntaxNode, SyntaxTree};

/// Split a `$tag$ ... $tag$` quoted text into its delimiter length and body
fn strip_delimiters(text: &str) -> (usize, &str) {
    if let Some(rest) = text.strip_prefix('$') {
        if let Some(close) = rest.find('$') {
            let tag = &text[..close + 2];
            if text.len() >= tag.len() * 2 && text.ends_with(tag) {
                return (tag.len(), &text[tag.len()..text.len() - tag.len()]);
            }
        }
    }
    (0, text)
}

/// Region described by a chameleon node
pub(crate) fn region(language: Language, node: &SyntaxNode) -> ChameleonRegion {
    let text = node.text();
    let (delimiter, content) = strip_delimiters(&text);
    let location = node
        .tokens()
        .first()
        .map(|token| token.span)
        .filter(|span| span.line > 0)
        .map(|span| (span.line, span.column + delimiter));
    ChameleonRegion {
        language,
        span: node.span,
        content: content.to_string(),
        content_offset: node.span.offset + delimiter,
        content_location: location,
    }
}

/// Parse a region with `dialect`, the outer parse options and the
/// dialect's default branches
pub fn expand(
    region: &ChameleonRegion,
    dialect: &Dialect,
    options: &ParseOptions,
) -> Result<SyntaxTree, ParseError> {
    if dialect.language() != region.language {
        warn!(
            region = %region.language,
            dialect = %dialect.id(),
            "Expanding chameleon region with a dialect of another language"
        );
    }
    expand_with(region, dialect.grammar(), &dialect.lexer(), &dialect.options(options))
}

/// Parse a region with an explicit grammar and lexer
pub fn expand_with(
    region: &ChameleonRegion,
    grammar: &Grammar,
    lexer: &dyn Lexer,
    options: &ParseOptions,
) -> Result<SyntaxTree, ParseError> {
    let lexed = lexer.tokenize(&region.content);
    let mut tree = Parser::new(grammar)
        .with_options(options.clone())
        .parse(lexed.tokens)?;

    let mut diagnostics = lexed.diagnostics;
    diagnostics.append(&mut tree.diagnostics);
    for diagnostic in &mut diagnostics {
        if let Some(span) = diagnostic.span.as_mut() {
            *span = shift(span, region);
        }
        for label in &mut diagnostic.labels {
            label.span = shift(&label.span, region);
        }
    }
    tree.diagnostics = diagnostics;
    shift_node(&mut tree.root, region);

    debug!(
        language = %region.language,
        offset = region.content_offset,
        diagnostics = tree.diagnostics.len(),
        "Chameleon region expanded"
    );
    Ok(tree)
}

fn shift(span: &Span, region: &ChameleonRegion) -> Span {
    span.shifted(region.content_offset, region.content_location)
}

fn shift_node(node: &mut SyntaxNode, region: &ChameleonRegion) {
    node.span = shift(&node.span, region);
    for child in &mut node.children {
        match child {
            SyntaxElement::Node(child) => shift_node(child, region),
            SyntaxElement::Token(token) => token.span = shift(&token.span, region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_dollar_quotes() {
        assert_eq!(strip_delimiters("$$ begin null; end; $$"), (2, " begin null; end; "));
        assert_eq!(strip_delimiters("$body$x$body$"), (6, "x"));
        assert_eq!(strip_delimiters("$1"), (0, "$1"));
        assert_eq!(strip_delimiters("plain"), (0, "plain"));
        assert_eq!(strip_delimiters("$$"), (0, "$$"));
    }
}
