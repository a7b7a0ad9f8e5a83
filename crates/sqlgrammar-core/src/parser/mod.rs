//! Grammar-driven parser
//!
//! The driver repeatedly parses the grammar's root element until the input is
//! exhausted. Every token ends up in the tree: when the root cannot make
//! progress one token is consumed as an error, and when a statement aborts
//! (recursion limit, malformed input) the driver recovers instead of failing.

mod builder;
mod context;
mod iteration;
mod leaf;
mod one_of;
mod qualified;
mod sequence;
mod wrapper;

use std::sync::atomic::AtomicBool;

use tracing::{debug, warn};

use crate::error::{Diagnostic, DiagnosticKind, ParseError};
use crate::grammar::{Branch, ElementId, ElementKind, Grammar, LATEST_VERSION};
use crate::token::Token;
use crate::tree::{NodeKind, SyntaxTree};

use builder::TreeBuilder;
use context::{ParseResult, ParserContext, PathNode};

/// Nesting depth at which a statement is abandoned
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Per-parse settings
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    /// Database version edges are gated against
    pub version: f64,
    /// Branches active for the whole input
    pub branches: Vec<Branch>,
    /// Named element to parse instead of the grammar's root
    pub root: Option<String>,
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            version: LATEST_VERSION,
            branches: Vec::new(),
            root: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    pub fn with_version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }
}

#[derive(Debug)]
enum State {
    Parsing,
    /// The root made no progress; one token is consumed as an error
    Stuck,
    /// The statement hit the recursion limit; one token is consumed
    TooDeep(usize),
    /// Structured parsing was abandoned; the rest of the input is swallowed
    ErrorRecovering(ParseError),
    Done,
}

/// Parser for one grammar. Cheap to create; all per-parse state lives in the
/// call to [`Parser::parse`].
pub struct Parser<'g> {
    grammar: &'g Grammar,
    options: ParseOptions,
    cancel: Option<&'g AtomicBool>,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            options: ParseOptions::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop parsing with [`ParseError::Cancelled`] once `flag` is set
    pub fn with_cancellation(mut self, flag: &'g AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn root(&self) -> ElementId {
        let Some(name) = &self.options.root else {
            return self.grammar.root();
        };
        match self.grammar.named(name) {
            Some(root) => root,
            None => {
                warn!(root = %name, "Unknown root element, using the grammar root");
                self.grammar.root()
            }
        }
    }

    /// Parse a token stream into a tree covering every token.
    ///
    /// Only cancellation is reported as an error; every other problem ends
    /// up as error nodes and diagnostics in the tree.
    pub fn parse(&self, tokens: Vec<Token>) -> Result<SyntaxTree, ParseError> {
        let registry = self.grammar.registry();
        let root = self.root();
        let unknown = tokens
            .iter()
            .find(|token| registry.get(token.token_type).is_none())
            .map(|token| token.token_type.index());

        debug!(
            tokens = tokens.len(),
            root = %self.grammar.element(root).name,
            version = self.options.version,
            "Parsing"
        );
        let builder = TreeBuilder::new(tokens, registry);
        let mut ctx = ParserContext::new(self.grammar, builder, &self.options, self.cancel);
        let mut state = match unknown {
            Some(index) => State::ErrorRecovering(ParseError::UnknownTokenType(index)),
            None => State::Parsing,
        };

        // inside a run of statements that all hit the recursion limit
        let mut too_deep = false;
        loop {
            state = match state {
                State::Parsing => {
                    let next = self.parse_statement(&mut ctx, root)?;
                    too_deep &= matches!(next, State::TooDeep(_));
                    next
                }
                State::Stuck => {
                    consume_unexpected(&mut ctx, root, true);
                    State::Parsing
                }
                State::TooDeep(limit) => {
                    // one report covers the whole run of skipped tokens
                    if !too_deep {
                        let diagnostic = Diagnostic::error(
                            DiagnosticKind::RecursionLimit,
                            format!("statement nests deeper than {} elements", limit),
                        )
                        .with_span(ctx.builder.current_span())
                        .with_help("the statement was skipped token by token");
                        ctx.builder.diagnostic(diagnostic);
                    }
                    consume_unexpected(&mut ctx, root, !too_deep);
                    too_deep = true;
                    State::Parsing
                }
                State::ErrorRecovering(error) => {
                    debug!(%error, cursor = ctx.builder.cursor(), "Abandoning structured parse");
                    if !ctx.builder.is_eof() {
                        let marker = ctx.builder.mark();
                        while !ctx.builder.is_eof() {
                            ctx.builder.advance();
                        }
                        ctx.builder.unparsed(marker, format!("input not parsed: {}", error));
                    }
                    State::Done
                }
                State::Done => break,
            };
        }
        Ok(ctx.builder.finish())
    }

    /// One attempt of the root element at the current position
    fn parse_statement(&self, ctx: &mut ParserContext<'_>, root: ElementId) -> Result<State, ParseError> {
        ctx.check_cancelled()?;
        if ctx.builder.is_eof() {
            return Ok(State::Done);
        }
        let marker = ctx.builder.mark();
        let start = ctx.builder.cursor();
        match parse_element(ctx, root, None) {
            Ok(_) if ctx.builder.cursor() > start => {
                ctx.builder.drop(marker);
                Ok(State::Parsing)
            }
            Ok(_) => {
                ctx.builder.rollback_to(marker);
                Ok(State::Stuck)
            }
            Err(ParseError::Cancelled) => Err(ParseError::Cancelled),
            Err(ParseError::RecursionLimit(limit)) => {
                ctx.builder.rollback_to(marker);
                ctx.reset();
                debug!(limit, cursor = start, "Recursion limit reached");
                Ok(State::TooDeep(limit))
            }
            Err(error) => {
                ctx.builder.rollback_to(marker);
                ctx.reset();
                Ok(State::ErrorRecovering(error))
            }
        }
    }
}

/// Consume the current token on its own: chameleon tokens become deferred
/// regions, anything else an error listing what the root could start with,
/// or a bare leaf when `report` is off
fn consume_unexpected(ctx: &mut ParserContext<'_>, root: ElementId, report: bool) {
    let Some(token) = ctx.builder.current_type() else {
        return;
    };
    ctx.reset();
    let token_type = ctx.registry.token_type(token);
    let marker = ctx.builder.mark();
    let text = ctx
        .builder
        .current()
        .map(|t| t.text.trim().to_string())
        .unwrap_or_default();
    ctx.builder.advance();

    if let (true, Some(language)) = (token_type.is_chameleon(), token_type.language) {
        ctx.builder.done(marker, NodeKind::Chameleon { language });
        return;
    }
    if !report {
        ctx.builder.drop(marker);
        return;
    }
    let expected = ctx.registry.describe(ctx.lookup.first_possible_tokens(root));
    debug!(token = %token_type.id, "Unexpected token");
    ctx.builder
        .error_node(marker, format!("unexpected '{}'", text), expected);
}

/// Dispatch on the element kind
fn parse_element(
    ctx: &mut ParserContext<'_>,
    element: ElementId,
    parent: Option<&PathNode<'_>>,
) -> Result<ParseResult, ParseError> {
    let grammar = ctx.grammar;
    match &grammar.element(element).kind {
        ElementKind::Token { .. } => leaf::parse_token(ctx, element, parent),
        ElementKind::Identifier { .. } => leaf::parse_identifier(ctx, element, parent),
        ElementKind::Chameleon { .. } => leaf::parse_chameleon(ctx, element, parent),
        ElementKind::Sequence(_) | ElementKind::Block(_) | ElementKind::Named(_) => {
            sequence::parse(ctx, element, parent)
        }
        ElementKind::OneOf { .. } => one_of::parse(ctx, element, parent),
        ElementKind::Iteration { .. } => iteration::parse(ctx, element, parent),
        ElementKind::Wrapper { .. } => wrapper::parse(ctx, element, parent),
        ElementKind::QualifiedIdentifier { .. } => qualified::parse(ctx, element, parent),
        ElementKind::Unknown => Ok(ParseResult::not_matched()),
    }
}
