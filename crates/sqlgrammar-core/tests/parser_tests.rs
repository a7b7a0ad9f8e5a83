// Integration tests for the grammar driven parser
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use sqlgrammar_core::{
    Branch, Grammar, Lexer, ParseError, ParseOptions, Parser, Span, SqlLexer, SyntaxTree, Token,
    TokenRegistry, TokenTypeId,
};

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
    id = "KW_LIMIT"
    value = "limit"
    type = "keyword"
    reserved = true

    [[tokens]]
    id = "KW_ONLY"
    value = "only"
    type = "keyword"
    reserved = true

    [[tokens]]
    id = "KW_DISTINCT"
    value = "distinct"
    type = "keyword"
    reserved = true

    [[tokens]]
    id = "KW_DO"
    value = "do"
    type = "keyword"
    reserved = true

    [[tokens]]
    id = "CHR_DOT"
    value = "."
    type = "character"

    [[tokens]]
    id = "CHR_COMMA"
    value = ","
    type = "character"

    [[tokens]]
    id = "CHR_SEMICOLON"
    value = ";"
    type = "character"

    [[tokens]]
    id = "CHR_LEFT_PARENTHESIS"
    value = "("
    type = "character"

    [[tokens]]
    id = "CHR_RIGHT_PARENTHESIS"
    value = ")"
    type = "character"

    [[tokens]]
    id = "CT_PSQL"
    type = "chameleon"
    language = "psql"
"#;

const SCRIPT: &str = r#"{"id": "script", "attributes": "ROOT", "children": [
    {"kind": "element", "ref-id": "query"}
]}"#;

const QUERY: &str = r#"{"id": "query", "attributes": "STATEMENT", "children": [
    {"kind": "token", "type-id": "KW_SELECT"},
    {"kind": "object-ref", "object-type": "column"},
    {"kind": "token", "type-id": "KW_FROM"},
    {"kind": "object-ref", "object-type": "table"},
    {"kind": "token", "type-id": "CHR_SEMICOLON", "optional": true}
]}"#;

fn grammar(elements: &[&str]) -> Grammar {
    let registry = Arc::new(TokenRegistry::from_toml(TOKENS).unwrap());
    let json = format!(r#"{{"elements": [{}]}}"#, elements.join(","));
    let grammar = Grammar::from_json(&json, registry).unwrap();
    assert!(grammar.warnings().is_empty(), "{:?}", grammar.warnings());
    grammar
}

fn tokenize(grammar: &Grammar, text: &str) -> Vec<Token> {
    SqlLexer::new(Arc::clone(grammar.registry()), "postgresql")
        .tokenize(text)
        .tokens
}

fn parse_with(grammar: &Grammar, text: &str, options: ParseOptions) -> SyntaxTree {
    let tree = Parser::new(grammar)
        .with_options(options)
        .parse(tokenize(grammar, text))
        .unwrap();
    assert_eq!(tree.text(), text, "tree must cover the whole input");
    tree
}

fn parse(grammar: &Grammar, text: &str) -> SyntaxTree {
    parse_with(grammar, text, ParseOptions::default())
}

fn codes(tree: &SyntaxTree) -> Vec<&'static str> {
    tree.diagnostics.iter().map(|d| d.code()).collect()
}

/// Code, offset and length of every diagnostic
fn reported(tree: &SyntaxTree) -> Vec<(&'static str, usize, usize)> {
    tree.diagnostics
        .iter()
        .map(|d| {
            let span = d.span.unwrap_or_default();
            (d.code(), span.offset, span.length)
        })
        .collect()
}

#[test]
fn test_valid_statements() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let tree = parse(&grammar, "select a from t;\nSELECT b FROM u");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert_eq!(tree.find("query").len(), 2);
    assert_eq!(tree.find("script").len(), 2);
    let tables: Vec<String> = tree
        .find("object-ref(table)")
        .iter()
        .map(|n| n.text())
        .collect();
    assert_eq!(tables, vec!["t", "u"]);
}

#[test]
fn test_empty_and_trivia_only_input() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let tree = parse(&grammar, "");
    assert!(tree.root.children.is_empty());
    assert!(tree.diagnostics.is_empty());

    let tree = parse(&grammar, "  -- nothing here\n");
    assert!(tree.diagnostics.is_empty());
    assert_eq!(tree.root.child_nodes().count(), 0);
}

#[test]
fn test_missing_token_is_reported_in_place() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let tree = parse(&grammar, "select from t");

    assert_eq!(reported(&tree), vec![("E1001", 7, 0)]);

    // select, the zero width error, from, the table reference
    let query = tree.find("query")[0];
    let errors: Vec<_> = query.child_nodes().filter(|n| n.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span.length, 0);
    assert_eq!(tree.find("object-ref(table)")[0].text(), "t");
    assert!(tree.find("object-ref(column)").is_empty());
}

#[test]
fn test_unexpected_tokens_are_skipped_to_landmark() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let tree = parse(&grammar, "select a b c from t");

    assert_eq!(reported(&tree), vec![("E1002", 9, 3)]);
    let errors = tree.error_nodes();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].text(), "b c");
    assert_eq!(tree.find("object-ref(table)")[0].text(), "t");
}

#[test]
fn test_incomplete_statement_at_end_of_input() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let tree = parse(&grammar, "select a from");

    assert_eq!(reported(&tree), vec![("E1001", 13, 0)]);
    assert!(tree.find("query")[0].is_partial());
}

#[test]
fn test_tokens_no_element_accepts_become_errors() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let tree = parse(&grammar, ") ) select a from t");

    assert_eq!(codes(&tree), vec!["E1002", "E1002"]);
    assert_eq!(tree.error_nodes().len(), 2);
    assert_eq!(tree.find("query").len(), 1);
}

#[test]
fn test_total_coverage_of_malformed_input() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let inputs = [
        ";;;",
        "select",
        "from from from",
        "select a from t; garbage ( here",
        "select 'unterminated",
        "select a.b from t where",
        "/* c */ select a -- trailing\nfrom t",
        "select a from t $$ body $$",
        "é ü ß",
    ];
    for input in inputs {
        let tree = parse(&grammar, input);
        let mut end = 0;
        for token in tree.root.tokens() {
            assert_eq!(token.span.offset, end, "gap before {:?} in {:?}", token.text, input);
            end = token.span.end();
        }
        assert_eq!(end, input.len());
    }
}

#[test]
fn test_version_gate() {
    let gated = r#"{"id": "query", "attributes": "STATEMENT", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "object-ref", "object-type": "column"},
        {"kind": "token", "type-id": "KW_FROM"},
        {"kind": "object-ref", "object-type": "table"},
        {"kind": "sequence", "optional": true, "version": 12, "children": [
            {"kind": "token", "type-id": "KW_LIMIT"},
            {"kind": "token", "type-id": "INTEGER"}
        ]}
    ]}"#;
    let grammar = grammar(&[SCRIPT, gated]);
    let text = "select a from t limit 5";

    for version in [12.0, 13.0] {
        let tree = parse_with(&grammar, text, ParseOptions::default().with_version(version));
        assert!(!tree.has_errors(), "version {}: {:?}", version, tree.diagnostics);
        assert_eq!(tree.find("query.4").len(), 1);
    }

    let tree = parse_with(&grammar, text, ParseOptions::default().with_version(11.0));
    assert!(tree.has_errors());
    assert!(tree.find("query.4").is_empty());

    let tree = parse(&grammar, text);
    assert!(!tree.has_errors());
}

#[test]
fn test_branch_gate() {
    let gated = r#"{"id": "query", "attributes": "STATEMENT", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "token", "type-id": "KW_ONLY", "optional": true, "branch-check": "+postgres -oracle"},
        {"kind": "object-ref", "object-type": "column"},
        {"kind": "token", "type-id": "KW_FROM"},
        {"kind": "object-ref", "object-type": "table"}
    ]}"#;
    let grammar = grammar(&[SCRIPT, gated]);
    let text = "select only a from t";

    let postgres = ParseOptions::default().with_branch(Branch::new("postgres"));
    assert!(!parse_with(&grammar, text, postgres.clone()).has_errors());

    let tree = parse(&grammar, text);
    assert_eq!(codes(&tree), vec!["E1002"]);
    assert_eq!(tree.error_nodes()[0].text(), "only a");

    let both = postgres.with_branch(Branch::new("oracle"));
    assert!(parse_with(&grammar, text, both).has_errors());

    // Branches do not matter when the gated token is absent
    assert!(!parse(&grammar, "select a from t").has_errors());
}

#[test]
fn test_branch_published_by_matched_element() {
    let query = r#"{"id": "query", "attributes": "STATEMENT", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "token", "type-id": "KW_DISTINCT", "optional": true, "branch": "distinct"},
        {"kind": "token", "type-id": "KW_ONLY", "optional": true, "branch-check": "+distinct"},
        {"kind": "object-ref", "object-type": "column"},
        {"kind": "token", "type-id": "KW_FROM"},
        {"kind": "object-ref", "object-type": "table"}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    assert!(!parse(&grammar, "select distinct only a from t").has_errors());
    assert!(parse(&grammar, "select only a from t").has_errors());
    // The branch does not leak into the next statement
    let tree = parse(&grammar, "select distinct a from t select only a from t");
    assert_eq!(tree.find("query").len(), 2);
    assert_eq!(codes(&tree), vec!["E1002"]);
}

#[test]
fn test_qualified_identifier_variants() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "qualified-identifier", "children": [
            {"kind": "object-ref", "object-type": "schema", "optional": true},
            {"kind": "object-ref", "object-type": "table"},
            {"kind": "object-ref", "object-type": "column"}
        ]}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    let tree = parse(&grammar, "select s.t.c");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert_eq!(tree.find("object-ref(schema)")[0].text(), "s");
    assert_eq!(tree.find("object-ref(table)")[0].text(), "t");
    assert_eq!(tree.find("object-ref(column)")[0].text(), "c");

    let tree = parse(&grammar, "select t.c");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert!(tree.find("object-ref(schema)").is_empty());
    assert_eq!(tree.find("object-ref(table)")[0].text(), "t");

    let tree = parse(&grammar, "select s.t.c.d");
    assert!(tree.has_errors());
    assert_eq!(reported(&tree)[0], ("E1001", 12, 0));
    assert!(tree.find("query.1")[0].is_partial());
}

#[test]
fn test_qualified_identifier_resolution() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "qualified-identifier", "id": "name", "children": [
            {"kind": "object-ref", "object-type": "schema", "optional": true},
            {"kind": "object-ref", "object-type": "table"},
            {"kind": "object-ref", "object-type": "column"}
        ]}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);
    let name = grammar
        .elements()
        .find(|e| e.name == "name")
        .map(|e| e.id)
        .unwrap();
    let types: Vec<TokenTypeId> = tokenize(&grammar, "a.b.c")
        .iter()
        .map(|t| t.token_type)
        .collect();

    let best = grammar.resolve_qualified_identifier(name, &types).unwrap();
    assert_eq!(best.leaves.len(), 3);
    assert_eq!(best.chain_length, 3);
    assert!(!best.incomplete);

    let ranked = grammar.rank_qualified_identifier(name, &types);
    let lengths: Vec<usize> = ranked.iter().map(|m| m.leaves.len()).collect();
    assert_eq!(lengths, vec![3, 2]);
}

#[test]
fn test_sortable_alternatives_prefer_longer_constructs() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "one-of", "sortable": true, "children": [
            {"kind": "object-ref", "object-type": "column"},
            {"kind": "sequence", "children": [
                {"kind": "object-ref", "object-type": "function"},
                {"kind": "wrapper", "template": "PARENTHESES", "exit": true, "children": [
                    {"kind": "object-ref", "object-type": "column", "optional": true}
                ]}
            ]}
        ]}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    let tree = parse(&grammar, "select f(x)");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert_eq!(tree.find("object-ref(function)")[0].text(), "f");

    let tree = parse(&grammar, "select a");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert!(tree.find("object-ref(function)").is_empty());
    assert_eq!(tree.find("object-ref(column)")[0].text(), "a");
}

#[test]
fn test_separated_iteration() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "iteration", "separator": "CHR_COMMA", "children": [
            {"kind": "object-ref", "object-type": "column"}
        ]},
        {"kind": "token", "type-id": "KW_FROM"},
        {"kind": "object-ref", "object-type": "table"}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    let tree = parse(&grammar, "select a, b, c from t");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert_eq!(tree.find("object-ref(column)").len(), 3);

    // The separator stays in the list; the missing column is reported in place
    let tree = parse(&grammar, "select a, from t");
    assert_eq!(reported(&tree), vec![("E1001", 10, 0)]);
    assert_eq!(tree.find("object-ref(column)").len(), 1);
    assert_eq!(tree.find("object-ref(table)")[0].text(), "t");
}

#[test]
fn test_iteration_below_minimum_is_not_matched() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "iteration", "separator": "CHR_COMMA", "min-iterations": 2, "children": [
            {"kind": "object-ref", "object-type": "column"}
        ]},
        {"kind": "token", "type-id": "KW_FROM"},
        {"kind": "object-ref", "object-type": "table"}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    assert!(!parse(&grammar, "select a, b from t").has_errors());

    // One broken column is not a partial list; the whole range is skipped
    let tree = parse(&grammar, "select a, ) from t");
    assert_eq!(reported(&tree), vec![("E1002", 7, 4)]);
    assert_eq!(tree.error_nodes()[0].text(), "a, )");
    assert!(tree.find("object-ref(column)").is_empty());
    assert_eq!(tree.find("object-ref(table)")[0].text(), "t");
}

#[test]
fn test_iteration_recovery_stops_at_chameleon() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_DO"},
        {"kind": "iteration", "separator": "CHR_COMMA", "children": [
            {"kind": "object-ref", "object-type": "column"}
        ]}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    let tree = parse(&grammar, "do a, ) $$ x $$");
    assert!(tree.has_errors());
    assert_eq!(tree.error_nodes()[0].text(), ")");
    let regions = tree.chameleon_regions();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].content, " x ");
}

#[test]
fn test_recovery_skips_children_that_refuse_the_landmark() {
    // The lookup admits LIMIT for the one-of, but every alternative is gated
    let gated = r#"{"id": "query", "attributes": "STATEMENT", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "one-of", "children": [
            {"kind": "token", "type-id": "KW_LIMIT", "branch-check": "+oracle"},
            {"kind": "token", "type-id": "KW_ONLY", "branch-check": "+oracle"}
        ]},
        {"kind": "object-ref", "object-type": "table"}
    ]}"#;
    let gated_grammar = grammar(&[SCRIPT, gated]);
    let tree = parse(&gated_grammar, "select limit t");
    assert_eq!(reported(&tree)[0], ("E1002", 7, 7));
    assert_eq!(tree.error_nodes()[0].text(), "limit t");
    let oracle = ParseOptions::default().with_branch(Branch::new("oracle"));
    assert!(!parse_with(&gated_grammar, "select limit t", oracle).has_errors());

    // The nested sequence starts with FROM but rolls back before its exit
    let nested = r#"{"id": "query", "attributes": "STATEMENT", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "sequence", "children": [
            {"kind": "token", "type-id": "KW_FROM"},
            {"kind": "token", "type-id": "KW_LIMIT", "exit": true}
        ]},
        {"kind": "object-ref", "object-type": "table"}
    ]}"#;
    let grammar = grammar(&[SCRIPT, nested]);
    let tree = parse(&grammar, "select from t");
    assert_eq!(reported(&tree)[0], ("E1002", 7, 6));
    assert_eq!(tree.error_nodes()[0].text(), "from t");
    assert!(!parse(&grammar, "select from limit t").has_errors());
}

#[test]
fn test_input_ending_before_exit_child_is_not_matched() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_SELECT"},
        {"kind": "token", "type-id": "KW_DISTINCT", "optional": true},
        {"kind": "token", "type-id": "KW_ONLY", "optional": true, "exit": true}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    let tree = parse(&grammar, "select");
    assert!(tree.find("query").is_empty());
    assert_eq!(codes(&tree), vec!["E1002"]);

    let tree = parse(&grammar, "select distinct only");
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    assert_eq!(tree.find("query").len(), 1);
}

#[test]
fn test_recursion_limit_is_recovered() {
    let nested = r#"{"id": "expr", "children": [
        {"kind": "one-of", "children": [
            {"kind": "wrapper", "template": "PARENTHESES", "children": [
                {"kind": "element", "ref-id": "expr"}
            ]},
            {"kind": "object-ref", "object-type": "column"}
        ]}
    ]}"#;
    let root = r#"{"id": "script", "attributes": "ROOT", "children": [
        {"kind": "element", "ref-id": "expr"}
    ]}"#;
    let grammar = grammar(&[root, nested]);

    let shallow = format!("{}a{}", "(".repeat(5), ")".repeat(5));
    assert!(!parse(&grammar, &shallow).has_errors());

    let deep = format!("{}a{}", "(".repeat(40), ")".repeat(40));
    let options = ParseOptions {
        max_depth: 30,
        ..ParseOptions::default()
    };
    let tree = parse_with(&grammar, &deep, options);
    // one report for the whole run of skipped tokens
    let limits = codes(&tree).iter().filter(|code| **code == "E1003").count();
    assert_eq!(limits, 1);
    assert!(tree.diagnostics.len() < 60, "{:?}", codes(&tree));
}

#[test]
fn test_cancellation() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let flag = AtomicBool::new(false);
    let tokens = tokenize(&grammar, "select a from t");

    let parser = Parser::new(&grammar).with_cancellation(&flag);
    assert!(parser.parse(tokens.clone()).is_ok());

    flag.store(true, Ordering::Relaxed);
    assert_eq!(parser.parse(tokens).unwrap_err(), ParseError::Cancelled);
}

#[test]
fn test_unknown_token_type_leaves_input_unparsed() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let mut tokens = tokenize(&grammar, "select a from t");
    tokens[2].token_type = TokenTypeId::new(9_999);

    let tree = Parser::new(&grammar).parse(tokens).unwrap();
    assert_eq!(tree.text(), "select a from t");
    assert_eq!(codes(&tree), vec!["E1004"]);
    assert_eq!(tree.error_nodes().len(), 1);
}

#[test]
fn test_custom_root() {
    let grammar = grammar(&[SCRIPT, QUERY]);
    let options = ParseOptions::default().with_root("query");
    let tree = parse_with(&grammar, "select a from t", options);
    assert!(!tree.has_errors());
    assert!(tree.find("script").is_empty());

    // An unknown root falls back to the grammar root
    let options = ParseOptions::default().with_root("nope");
    let tree = parse_with(&grammar, "select a from t", options);
    assert_eq!(tree.find("script").len(), 1);
}

#[test]
fn test_chameleon_regions() {
    let query = r#"{"id": "query", "children": [
        {"kind": "token", "type-id": "KW_DO"},
        {"kind": "chameleon", "language": "psql"}
    ]}"#;
    let grammar = grammar(&[SCRIPT, query]);

    let text = "do $$ begin null; end; $$";
    let tree = parse(&grammar, text);
    assert!(!tree.has_errors(), "{:?}", tree.diagnostics);
    let regions = tree.chameleon_regions();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].content, " begin null; end; ");
    assert_eq!(regions[0].content_offset, 5);
    assert_eq!(regions[0].span, Span::with_location(3, 22, 1, 4));

    // A stray region is kept as a region, not reported
    let tree = parse(&grammar, "$$ x $$");
    assert!(!tree.has_errors());
    assert_eq!(tree.chameleon_regions().len(), 1);
}

#[test]
fn test_shared_grammar_across_threads() {
    let grammar = Arc::new(grammar(&[SCRIPT, QUERY]));
    let expected = parse(&grammar, "select a from t; select from u").dump(grammar.registry());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let grammar = Arc::clone(&grammar);
                scope.spawn(move || parse(&grammar, "select a from t; select from u").dump(grammar.registry()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
