//! Lexer adapter - turns source text into the parser's token stream
//!
//! Raw tokens come from the `sqlparser` tokenizer. Each one is classified
//! against the token registry, and its text is the exact source slice up to
//! the next token, so concatenating the token texts reproduces the input.

use std::sync::Arc;

use sqlparser::dialect::{dialect_from_str, GenericDialect};
use sqlparser::tokenizer::{Token as RawToken, Tokenizer, Whitespace};
use tracing::trace;

use crate::error::{Diagnostic, DiagnosticKind, Span};
use crate::token::{Token, TokenRegistry, TokenTypeId};

/// Tokens of one source text plus the problems found while lexing
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Source of token streams for the parser
pub trait Lexer {
    fn tokenize(&self, text: &str) -> Lexed;
}

/// Byte offsets of line starts, for converting line/column locations
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    /// Byte offset of a 1-based line and character column
    fn offset(&self, line: u64, column: u64) -> usize {
        let Some(start) = (line as usize)
            .checked_sub(1)
            .and_then(|l| self.starts.get(l).copied())
        else {
            return self.text.len();
        };
        let skip = (column as usize).saturating_sub(1);
        self.text[start..]
            .char_indices()
            .nth(skip)
            .map(|(i, _)| start + i)
            .unwrap_or(self.text.len())
    }

    /// 1-based line and character column of a byte offset
    fn location(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|start| *start <= offset);
        let start = self.starts[line - 1];
        let column = self.text[start..offset].chars().count() + 1;
        (line, column)
    }
}

/// Registry-aware lexer on top of the `sqlparser` tokenizer
#[derive(Debug, Clone)]
pub struct SqlLexer {
    registry: Arc<TokenRegistry>,
    dialect: String,
}

impl SqlLexer {
    /// `dialect` is a `sqlparser` dialect name such as `postgresql` or
    /// `generic`; unknown names fall back to the generic tokenizer
    pub fn new(registry: Arc<TokenRegistry>, dialect: &str) -> Self {
        Self {
            registry,
            dialect: dialect.to_string(),
        }
    }

    fn classify(&self, raw: &RawToken, text: &str) -> TokenTypeId {
        let shared = self.registry.shared();
        match raw {
            RawToken::Whitespace(Whitespace::SingleLineComment { .. })
            | RawToken::Whitespace(Whitespace::MultiLineComment(_)) => shared.comment,
            RawToken::Whitespace(_) => shared.whitespace,
            RawToken::Word(word) if word.quote_style.is_some() => shared.quoted_identifier,
            RawToken::Word(word) => self
                .registry
                .classify_word(&word.value)
                .unwrap_or(shared.identifier),
            RawToken::Number(value, _) => {
                if value.contains(['.', 'e', 'E']) {
                    shared.number
                } else {
                    shared.integer
                }
            }
            RawToken::SingleQuotedString(_)
            | RawToken::DoubleQuotedString(_)
            | RawToken::NationalStringLiteral(_)
            | RawToken::EscapedStringLiteral(_)
            | RawToken::HexStringLiteral(_) => shared.string,
            RawToken::DollarQuotedString(_) => {
                self.registry.default_chameleon().unwrap_or(shared.string)
            }
            RawToken::Placeholder(_) => shared.variable,
            _ => self
                .registry
                .classify_symbol(text)
                .unwrap_or(shared.bad_character),
        }
    }

    /// Tokenize `text`, falling back to shorter prefixes when the tokenizer
    /// rejects the input. The rejected tail becomes one bad character token.
    fn raw_tokens(&self, text: &str, lines: &LineIndex<'_>) -> (Vec<(RawToken, usize)>, Option<(usize, String)>) {
        let dialect = dialect_from_str(&self.dialect).unwrap_or_else(|| Box::new(GenericDialect {}));
        let mut end = text.len();
        let mut failure = None;
        loop {
            let result = Tokenizer::new(&*dialect, &text[..end])
                .with_unescape(false)
                .tokenize_with_location();
            match result {
                Ok(tokens) => {
                    let raw = tokens
                        .into_iter()
                        .filter(|t| t.token != RawToken::EOF)
                        .map(|t| {
                            let offset = lines.offset(t.span.start.line, t.span.start.column);
                            (t.token, offset.min(end))
                        })
                        .collect();
                    return (raw, failure);
                }
                Err(error) => {
                    let at = lines.offset(error.location.line, error.location.column).min(end);
                    trace!(offset = at, message = %error.message, "Tokenizer rejected input");
                    failure = Some((at, error.message));
                    if at == 0 || at >= end {
                        return (Vec::new(), failure.map(|(_, message)| (0, message)));
                    }
                    end = at;
                }
            }
        }
    }
}

impl Lexer for SqlLexer {
    fn tokenize(&self, text: &str) -> Lexed {
        let lines = LineIndex::new(text);
        let (raw, failure) = self.raw_tokens(text, &lines);
        let shared = *self.registry.shared();

        let mut lexed = Lexed::default();
        let tail = failure.as_ref().map(|(at, _)| *at).unwrap_or(text.len());
        let make = |token_type: TokenTypeId, start: usize, end: usize| {
            let (line, column) = lines.location(start);
            Token::new(
                token_type,
                &text[start..end],
                Span::with_location(start, end - start, line, column),
            )
        };

        if let Some((_, first)) = raw.first() {
            if *first > 0 {
                lexed.tokens.push(make(shared.whitespace, 0, *first));
            }
        }
        for (index, (token, start)) in raw.iter().enumerate() {
            let end = raw.get(index + 1).map(|(_, o)| *o).unwrap_or(tail);
            if end <= *start {
                continue;
            }
            let token_type = self.classify(token, &text[*start..end]);
            lexed.tokens.push(make(token_type, *start, end));
        }

        if let Some((at, message)) = failure {
            if at < text.len() {
                let token = make(shared.bad_character, at, text.len());
                lexed.diagnostics.push(
                    Diagnostic::error(DiagnosticKind::LexerError, message)
                        .with_span(token.span)
                        .with_help("the remaining input could not be tokenized"),
                );
                lexed.tokens.push(token);
            }
        }
        lexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOKENS: &str = r#"
        [[tokens]]
        id = "KW_SELECT"
        value = "select"
        type = "keyword"
        reserved = true

        [[tokens]]
        id = "KW_FROM"
        value = "from"
        type = "keyword"
        reserved = true

        [[tokens]]
        id = "CHR_COMMA"
        value = ","
        type = "character"

        [[tokens]]
        id = "CHR_DOT"
        value = "."
        type = "character"

        [[tokens]]
        id = "CT_PSQL"
        type = "chameleon"
        language = "psql"
    "#;

    fn lexer() -> SqlLexer {
        SqlLexer::new(Arc::new(TokenRegistry::from_toml(TOKENS).unwrap()), "postgresql")
    }

    fn kinds(lexer: &SqlLexer, lexed: &Lexed) -> Vec<String> {
        lexed
            .tokens
            .iter()
            .map(|t| lexer.registry.token_type(t.token_type).id.clone())
            .collect()
    }

    #[test]
    fn test_classification() {
        let lexer = lexer();
        let lexed = lexer.tokenize("SELECT a.\"B\", 1.5 -- note\nfrom t");
        assert_eq!(
            kinds(&lexer, &lexed),
            vec![
                "KW_SELECT",
                "WHITE_SPACE",
                "IDENTIFIER",
                "CHR_DOT",
                "QUOTED_IDENTIFIER",
                "CHR_COMMA",
                "WHITE_SPACE",
                "NUMBER",
                "WHITE_SPACE",
                "COMMENT",
                "KW_FROM",
                "WHITE_SPACE",
                "IDENTIFIER"
            ]
        );
        assert!(lexed.diagnostics.is_empty());
    }

    #[test]
    fn test_text_is_reproduced_exactly() {
        let lexer = lexer();
        let source = "select  x,\r\n\t'é' || y /* c */ from t;\n";
        let lexed = lexer.tokenize(source);
        let text: String = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(text, source);
        for pair in lexed.tokens.windows(2) {
            assert_eq!(pair[0].span.end(), pair[1].span.offset);
        }
    }

    #[test]
    fn test_locations() {
        let lexer = lexer();
        let lexed = lexer.tokenize("select\n  x");
        let x = lexed.tokens.last().unwrap();
        assert_eq!(x.text, "x");
        assert_eq!((x.span.offset, x.span.line, x.span.column), (9, 2, 3));
    }

    #[test]
    fn test_dollar_quoted_body_is_chameleon() {
        let lexer = lexer();
        let lexed = lexer.tokenize("select $$ begin null; end; $$");
        let last = lexed.tokens.last().unwrap();
        assert_eq!(lexer.registry.token_type(last.token_type).id, "CT_PSQL");
        assert_eq!(last.text, "$$ begin null; end; $$");
    }

    #[test]
    fn test_unterminated_string_falls_back() {
        let lexer = lexer();
        let source = "select 'abc";
        let lexed = lexer.tokenize(source);
        let text: String = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(text, source);
        assert_eq!(lexed.diagnostics.len(), 1);
        assert_eq!(lexed.diagnostics[0].code(), "E1000");
        let last = lexed.tokens.last().unwrap();
        assert_eq!(last.token_type, lexer.registry.shared().bad_character);
    }

    #[test]
    fn test_empty_input() {
        let lexed = lexer().tokenize("");
        assert!(lexed.tokens.is_empty());
        assert!(lexed.diagnostics.is_empty());
    }
}
