//! Incremental tree builder
//!
//! Strategies record a flat list of events through markers. A marker can be
//! completed into a node, dropped (its children attach to the parent) or
//! rolled back (events and cursor are reset). Trivia tokens never reach the
//! strategies; they are woven back in when the tree is built.

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::token::{Token, TokenRegistry, TokenTypeId};
use crate::tree::{NodeKind, SyntaxElement, SyntaxNode, SyntaxTree};

#[derive(Debug)]
enum Event {
    /// Marker that was opened and not (or not yet) completed
    Tombstone,
    Start {
        kind: NodeKind,
        /// Diagnostic reported for the node once its span is known
        report: Option<DiagnosticKind>,
    },
    Finish,
    /// Consumes the next significant token
    Token,
    /// Zero-width error at the position of the next significant token
    Error {
        message: String,
        expected: Vec<String>,
    },
}

/// Position in the event list and token stream
#[derive(Debug)]
#[must_use = "a marker must be completed, dropped or rolled back"]
pub(crate) struct Marker {
    event: usize,
    cursor: usize,
}

#[derive(Debug)]
pub(crate) struct TreeBuilder {
    tokens: Vec<Token>,
    /// Indices into `tokens` of the non-trivia tokens
    significant: Vec<usize>,
    types: Vec<TokenTypeId>,
    cursor: usize,
    events: Vec<Event>,
    /// Cursor and event index of the most recent error
    last_error: Option<(usize, usize)>,
    diagnostics: Vec<Diagnostic>,
}

impl TreeBuilder {
    pub fn new(tokens: Vec<Token>, registry: &TokenRegistry) -> Self {
        let significant: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !registry.get(t.token_type).map(|t| t.is_trivia()).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        let types = significant.iter().map(|i| tokens[*i].token_type).collect();
        Self {
            tokens,
            significant,
            types,
            cursor: 0,
            events: Vec::new(),
            last_error: None,
            diagnostics: Vec::new(),
        }
    }

    /// Index of the current significant token
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_eof(&self) -> bool {
        self.cursor >= self.significant.len()
    }

    pub fn current(&self) -> Option<&Token> {
        self.significant.get(self.cursor).map(|i| &self.tokens[*i])
    }

    pub fn current_type(&self) -> Option<TokenTypeId> {
        self.types.get(self.cursor).copied()
    }

    /// Significant token type `n` positions after the current one
    pub fn lookahead(&self, n: usize) -> Option<TokenTypeId> {
        self.types.get(self.cursor + n).copied()
    }

    pub fn previous_type(&self) -> Option<TokenTypeId> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.types.get(i).copied())
    }

    /// Types of the significant tokens not consumed yet
    pub fn remaining_types(&self) -> &[TokenTypeId] {
        &self.types[self.cursor.min(self.types.len())..]
    }

    /// Span of the current token, or an empty span at the end of input
    pub fn current_span(&self) -> Span {
        match self.current() {
            Some(token) => token.span,
            None => self.end_span(),
        }
    }

    fn end_span(&self) -> Span {
        match self.tokens.last() {
            Some(last) => Span::new(last.span.end(), 0),
            None => Span::default(),
        }
    }

    pub fn advance(&mut self) {
        if !self.is_eof() {
            self.events.push(Event::Token);
            self.cursor += 1;
        }
    }

    pub fn mark(&mut self) -> Marker {
        let marker = Marker {
            event: self.events.len(),
            cursor: self.cursor,
        };
        self.events.push(Event::Tombstone);
        marker
    }

    /// Complete the marker into a node of `kind`
    pub fn done(&mut self, marker: Marker, kind: NodeKind) {
        self.complete(marker, kind, None);
    }

    fn complete(&mut self, marker: Marker, kind: NodeKind, report: Option<DiagnosticKind>) {
        self.events[marker.event] = Event::Start { kind, report };
        self.events.push(Event::Finish);
    }

    /// Forget the marker; whatever was recorded since stays with the parent
    pub fn drop(&mut self, marker: Marker) {
        let _ = marker;
    }

    /// Discard everything recorded since the marker
    pub fn rollback_to(&mut self, marker: Marker) {
        self.events.truncate(marker.event);
        self.cursor = marker.cursor;
    }

    fn is_duplicate_error(&self) -> bool {
        match self.last_error {
            Some((cursor, event)) => {
                cursor == self.cursor
                    && matches!(
                        self.events.get(event),
                        Some(Event::Error { .. })
                            | Some(Event::Start {
                                kind: NodeKind::Error { .. },
                                ..
                            })
                    )
            }
            None => false,
        }
    }

    /// Record a zero-width error at the current position, unless one was
    /// already recorded here
    pub fn error_here(&mut self, message: String, expected: Vec<String>) {
        if self.is_duplicate_error() {
            return;
        }
        self.last_error = Some((self.cursor, self.events.len()));
        self.events.push(Event::Error { message, expected });
    }

    /// Complete the marker into an error node around the tokens it covers
    pub fn error_node(&mut self, marker: Marker, message: String, expected: Vec<String>) {
        self.last_error = Some((self.cursor, marker.event));
        let report = Some(DiagnosticKind::UnexpectedToken);
        self.complete(marker, NodeKind::Error { message, expected }, report);
    }

    /// Complete the marker into an error node for input the parser gave up on
    pub fn unparsed(&mut self, marker: Marker, message: String) {
        self.last_error = Some((self.cursor, marker.event));
        let report = Some(DiagnosticKind::UnparsedInput);
        let kind = NodeKind::Error {
            message,
            expected: Vec::new(),
        };
        self.complete(marker, kind, report);
    }

    /// Diagnostic that is not tied to an error node
    pub fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn finish(self) -> SyntaxTree {
        TreeAssembler::new(self.tokens, &self.significant).run(self.events, self.diagnostics)
    }
}

/// Replays builder events into a [`SyntaxTree`]
struct TreeAssembler<'a> {
    tokens: Vec<Option<Token>>,
    significant: &'a [usize],
    /// Next token index not yet attached
    next: usize,
    /// Next significant token position
    consumed: usize,
    stack: Vec<SyntaxNode>,
    /// Diagnostic to report when the node at the same stack depth closes
    reports: Vec<Option<DiagnosticKind>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TreeAssembler<'a> {
    fn new(tokens: Vec<Token>, significant: &'a [usize]) -> Self {
        let span = match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => first.span.cover(&last.span),
            _ => Span::default(),
        };
        Self {
            tokens: tokens.into_iter().map(Some).collect(),
            significant,
            next: 0,
            consumed: 0,
            stack: vec![SyntaxNode::new(NodeKind::File, span)],
            reports: vec![None],
            diagnostics: Vec::new(),
        }
    }

    fn top(&mut self) -> &mut SyntaxNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Attach tokens up to (excluding) index `until` to the innermost node
    fn attach_until(&mut self, until: usize) {
        while self.next < until.min(self.tokens.len()) {
            if let Some(token) = self.tokens[self.next].take() {
                self.top().children.push(SyntaxElement::Token(token));
            }
            self.next += 1;
        }
    }

    /// Index of the next significant token, or the end of the stream
    fn next_significant(&self) -> usize {
        self.significant
            .get(self.consumed)
            .copied()
            .unwrap_or(self.tokens.len())
    }

    /// Empty span where the next significant token starts
    fn position(&self) -> Span {
        let index = self.next_significant();
        let found = self.tokens[index.min(self.tokens.len())..]
            .iter()
            .flatten()
            .next()
            .map(|t| Span::with_location(t.span.offset, 0, t.span.line, t.span.column));
        match found {
            Some(span) => span,
            None => {
                let end = self.stack[0].span.end();
                Span::new(end, 0)
            }
        }
    }

    fn close(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        let Some(mut node) = self.stack.pop() else {
            return;
        };
        let report = self.reports.pop().flatten();
        if let (Some(first), Some(last)) = (node.children.first(), node.children.last()) {
            node.span = first.span().cover(&last.span());
        }
        if let (Some(report), NodeKind::Error { message, expected }) = (report, &node.kind) {
            let diagnostic = Diagnostic::error(report, message.clone()).with_span(node.span);
            let diagnostic = if expected.is_empty() {
                diagnostic
            } else {
                diagnostic.with_help(format!("expected {}", expected.join(" or ")))
            };
            self.diagnostics.push(diagnostic);
        }
        self.top().children.push(SyntaxElement::Node(node));
    }

    fn run(mut self, events: Vec<Event>, extra: Vec<Diagnostic>) -> SyntaxTree {
        for event in events {
            match event {
                Event::Tombstone => {}
                Event::Start { kind, report } => {
                    self.attach_until(self.next_significant());
                    let span = self.position();
                    self.stack.push(SyntaxNode::new(kind, span));
                    self.reports.push(report);
                }
                Event::Finish => self.close(),
                Event::Token => {
                    let index = self.next_significant();
                    self.attach_until(index + 1);
                    self.consumed += 1;
                }
                Event::Error { message, expected } => {
                    self.attach_until(self.next_significant());
                    let span = self.position();
                    let mut diagnostic =
                        Diagnostic::error(DiagnosticKind::IncompleteStatement, message.clone())
                            .with_span(span);
                    if !expected.is_empty() {
                        diagnostic = diagnostic.with_help(format!("expected {}", expected.join(" or ")));
                    }
                    self.diagnostics.push(diagnostic);
                    self.top()
                        .children
                        .push(SyntaxElement::Node(SyntaxNode::new(
                            NodeKind::Error { message, expected },
                            span,
                        )));
                }
            }
        }
        while self.stack.len() > 1 {
            self.close();
        }
        self.attach_until(self.tokens.len());

        let mut diagnostics = self.diagnostics;
        diagnostics.extend(extra);
        diagnostics.sort_by_key(|d| d.span.map(|s| s.offset).unwrap_or(usize::MAX));

        let root = self.stack.pop().unwrap_or_else(|| SyntaxNode::new(NodeKind::File, Span::default()));
        SyntaxTree { root, diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ElementId;
    use pretty_assertions::assert_eq;

    const TOKENS: &str = r#"
        [[tokens]]
        id = "KW_SELECT"
        value = "select"
        type = "keyword"
    "#;

    fn builder(source: &[(&str, &str)]) -> TreeBuilder {
        let registry = TokenRegistry::from_toml(TOKENS).unwrap();
        let mut offset = 0;
        let tokens = source
            .iter()
            .map(|(id, text)| {
                let token = Token::new(registry.lookup(id), *text, Span::new(offset, text.len()));
                offset += text.len();
                token
            })
            .collect();
        TreeBuilder::new(tokens, &registry)
    }

    fn element(name: &str) -> NodeKind {
        NodeKind::Element {
            element: ElementId::new(1),
            name: name.to_string(),
            partial: false,
        }
    }

    #[test]
    fn test_trivia_is_skipped_and_restored() {
        let mut b = builder(&[
            ("WHITE_SPACE", " "),
            ("KW_SELECT", "select"),
            ("WHITE_SPACE", " "),
            ("IDENTIFIER", "x"),
            ("WHITE_SPACE", "\n"),
        ]);
        assert_eq!(b.remaining_types().len(), 2);
        let m = b.mark();
        b.advance();
        b.advance();
        assert!(b.is_eof());
        b.done(m, element("statement"));
        let tree = b.finish();

        assert_eq!(tree.text(), " select x\n");
        assert_eq!(tree.root.children.len(), 3);
        let statement = tree.root.child_nodes().next().unwrap();
        assert_eq!(statement.span, Span::new(1, 8));
        assert_eq!(statement.text(), "select x");
    }

    #[test]
    fn test_rollback_discards_events() {
        let mut b = builder(&[("KW_SELECT", "select"), ("IDENTIFIER", "x")]);
        let m = b.mark();
        b.advance();
        b.error_here("expected something".to_string(), Vec::new());
        b.rollback_to(m);
        assert_eq!(b.cursor(), 0);
        b.advance();
        b.advance();
        let tree = b.finish();
        assert!(tree.diagnostics.is_empty());
        assert_eq!(tree.root.children.len(), 2);
    }

    #[test]
    fn test_dropped_marker_attaches_children_to_parent() {
        let mut b = builder(&[("KW_SELECT", "select"), ("IDENTIFIER", "x")]);
        let outer = b.mark();
        let inner = b.mark();
        b.advance();
        b.drop(inner);
        b.advance();
        b.done(outer, element("statement"));
        let tree = b.finish();
        let statement = tree.root.child_nodes().next().unwrap();
        assert_eq!(statement.children.len(), 2);
    }

    #[test]
    fn test_errors_are_deduplicated_per_position() {
        let mut b = builder(&[("KW_SELECT", "select")]);
        b.advance();
        b.error_here("expected x".to_string(), vec!["x".to_string()]);
        b.error_here("expected y".to_string(), vec!["y".to_string()]);
        let tree = b.finish();
        assert_eq!(tree.diagnostics.len(), 1);
        assert_eq!(tree.diagnostics[0].code(), "E1001");
        assert_eq!(tree.diagnostics[0].span, Some(Span::new(6, 0)));
        assert_eq!(tree.error_nodes().len(), 1);
    }

    #[test]
    fn test_error_node_wraps_tokens() {
        let mut b = builder(&[("KW_SELECT", "select"), ("IDENTIFIER", "x")]);
        b.advance();
        let m = b.mark();
        b.advance();
        b.error_node(m, "unexpected input".to_string(), vec!["FROM".to_string()]);
        b.error_here("expected FROM".to_string(), Vec::new());
        let tree = b.finish();
        assert_eq!(tree.error_nodes().len(), 1);
        assert_eq!(tree.error_nodes()[0].text(), "x");
        assert_eq!(tree.diagnostics.len(), 1);
        assert_eq!(tree.diagnostics[0].code(), "E1002");
    }
}
