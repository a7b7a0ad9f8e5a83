//! Syntax tree produced by the parser

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::dialect::Language;
use crate::error::{Diagnostic, Severity, Span};
use crate::grammar::ElementId;
use crate::token::{Token, TokenRegistry};

/// What a tree node stands for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// Root of every tree
    File,
    /// A matched grammar element; `partial` when it matched with errors
    Element {
        element: ElementId,
        name: String,
        partial: bool,
    },
    /// Unparsable or missing content
    Error {
        message: String,
        expected: Vec<String>,
    },
    /// Deferred region of an embedded language
    Chameleon { language: Language },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyntaxElement {
    Node(SyntaxNode),
    Token(Token),
}

impl SyntaxElement {
    pub fn span(&self) -> Span {
        match self {
            SyntaxElement::Node(node) => node.span,
            SyntaxElement::Token(token) => token.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Span,
    pub children: Vec<SyntaxElement>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            children: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, NodeKind::Error { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.kind, NodeKind::Element { partial: true, .. })
    }

    /// Grammar element of an element node
    pub fn element(&self) -> Option<ElementId> {
        match self.kind {
            NodeKind::Element { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter_map(|child| match child {
            SyntaxElement::Node(node) => Some(node),
            SyntaxElement::Token(_) => None,
        })
    }

    /// This node and every node below it, depth first
    pub fn descendants(&self) -> Vec<&SyntaxNode> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            let children: Vec<_> = node.child_nodes().collect();
            stack.extend(children.into_iter().rev());
        }
        nodes
    }

    /// Every token below this node in source order
    pub fn tokens(&self) -> Vec<&Token> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    fn collect_tokens<'a>(&'a self, tokens: &mut Vec<&'a Token>) {
        for child in &self.children {
            match child {
                SyntaxElement::Node(node) => node.collect_tokens(tokens),
                SyntaxElement::Token(token) => tokens.push(token),
            }
        }
    }

    /// Source text covered by the node's tokens
    pub fn text(&self) -> String {
        self.tokens().iter().map(|t| t.text.as_str()).collect()
    }
}

/// An embedded-language region found in a tree, ready to be expanded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChameleonRegion {
    pub language: Language,
    /// Span of the whole region, delimiters included
    pub span: Span,
    /// Embedded source text without delimiters
    pub content: String,
    /// Absolute byte offset of `content` in the outer source
    pub content_offset: usize,
    /// Line and column of `content` in the outer source, when known
    pub content_location: Option<(usize, usize)>,
}

/// Result of a parse: a tree covering the whole input plus diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub root: SyntaxNode,
    pub diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// Concatenated token text, identical to the parsed source
    pub fn text(&self) -> String {
        self.root.text()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_nodes(&self) -> Vec<&SyntaxNode> {
        self.root
            .descendants()
            .into_iter()
            .filter(|node| node.is_error())
            .collect()
    }

    /// Element nodes of the named grammar element
    pub fn find(&self, name: &str) -> Vec<&SyntaxNode> {
        self.root
            .descendants()
            .into_iter()
            .filter(|node| matches!(&node.kind, NodeKind::Element { name: n, .. } if n == name))
            .collect()
    }

    /// Deferred embedded-language regions, in source order
    pub fn chameleon_regions(&self) -> Vec<ChameleonRegion> {
        self.root
            .descendants()
            .into_iter()
            .filter_map(|node| match node.kind {
                NodeKind::Chameleon { language } => Some(crate::chameleon::region(language, node)),
                _ => None,
            })
            .collect()
    }

    /// Indented text rendering, one node or token per line
    pub fn dump(&self, registry: &TokenRegistry) -> String {
        let mut out = String::new();
        dump_node(&self.root, registry, 0, &mut out);
        out
    }
}

fn dump_node(node: &SyntaxNode, registry: &TokenRegistry, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let range = format!("{}..{}", node.span.offset, node.span.end());
    let _ = match &node.kind {
        NodeKind::File => writeln!(out, "{}FILE {}", indent, range),
        NodeKind::Element { name, partial, .. } => {
            let marker = if *partial { " (partial)" } else { "" };
            writeln!(out, "{}{}{} {}", indent, name, marker, range)
        }
        NodeKind::Error { message, .. } => writeln!(out, "{}ERROR {} \"{}\"", indent, range, message),
        NodeKind::Chameleon { language } => writeln!(out, "{}CHAMELEON({}) {}", indent, language, range),
    };
    for child in &node.children {
        match child {
            SyntaxElement::Node(child) => dump_node(child, registry, depth + 1, out),
            SyntaxElement::Token(token) => {
                let token_type = registry.get(token.token_type);
                if token_type.map(|t| t.is_trivia()).unwrap_or(false) {
                    continue;
                }
                let name = token_type.map(|t| t.id.as_str()).unwrap_or("?");
                let _ = writeln!(
                    out,
                    "{}  {} {:?} {}..{}",
                    indent,
                    name,
                    token.text,
                    token.span.offset,
                    token.span.end()
                );
            }
        }
    }
}
