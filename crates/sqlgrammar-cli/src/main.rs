//! sqlgrammar CLI - grammar driven SQL parser

mod args;
mod config;
mod output;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use sqlgrammar_core::{expand, DialectSet, Lexer, ParseOptions, Severity, SyntaxTree, TokenSet};
use tracing::{debug, warn};

use crate::args::{Args, Command, OutputFormat};
use crate::config::Config;
use crate::output::{offset_to_line_col, OutputFormatter};

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match (args.quiet, args.verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::INFO,
        (false, 2) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// Expand glob patterns; plain paths are kept as given
fn collect_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            for path in glob::glob(pattern).into_diagnostic()?.flatten() {
                files.push(path);
            }
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}

fn run(args: Args) -> Result<bool> {
    let config = Config::load(args.config.as_deref())?.merge_with_args(&args);
    let dialects = config.dialects()?;
    let dialect = config.select(&dialects)?;
    let options = config.parse_options()?;
    debug!(dialect = %dialect.id(), version = options.version, "Using dialect");

    match args.command {
        Command::Check {
            files,
            format,
            disable,
        } => {
            let config = config.merge_with_check(&files, format, &disable);
            let output_format = config.output_format()?;

            let files = collect_files(&config.files)?;
            if files.is_empty() {
                miette::bail!(
                    "No files specified. Use positional arguments or configure in {}",
                    config::CONFIG_FILE
                );
            }

            let disabled_codes: HashSet<&str> = config.disable.iter().map(String::as_str).collect();
            let mut total_errors = 0;
            let mut total_warnings = 0;

            for file in &files {
                let content = read(file)?;
                let tree = dialect.parse(&content, &options).into_diagnostic()?;

                let diagnostics: Vec<_> = tree
                    .diagnostics
                    .into_iter()
                    .filter(|d| !disabled_codes.contains(d.code()))
                    .collect();

                if !diagnostics.is_empty() {
                    let formatter = OutputFormatter::new(output_format, file.display().to_string());
                    formatter.print_diagnostics(&diagnostics, &content)?;

                    for diag in &diagnostics {
                        match diag.severity {
                            Severity::Error => total_errors += 1,
                            Severity::Warning => total_warnings += 1,
                            Severity::Info => {}
                        }
                    }
                }
            }

            if output_format == OutputFormat::Human && !args.quiet {
                if total_errors > 0 || total_warnings > 0 {
                    eprintln!(
                        "Found {} error(s), {} warning(s) in {} file(s)",
                        total_errors,
                        total_warnings,
                        files.len()
                    );
                } else {
                    eprintln!("All {} file(s) parsed without errors", files.len());
                }
            }

            Ok(total_errors > 0)
        }

        Command::Parse {
            file,
            json,
            expand: with_regions,
        } => {
            let content = read(&file)?;
            let tree = dialect.parse(&content, &options).into_diagnostic()?;
            let expanded = if with_regions {
                expand_regions(&tree, &dialects, &options)?
            } else {
                Vec::new()
            };
            let has_errors = tree.has_errors() || expanded.iter().any(|(_, t)| t.has_errors());

            if json {
                let regions: Vec<serde_json::Value> = expanded
                    .iter()
                    .map(|(language, tree)| serde_json::json!({ "language": language, "tree": tree }))
                    .collect();
                let output = serde_json::json!({
                    "file": file.display().to_string(),
                    "dialect": dialect.id(),
                    "tree": tree,
                    "regions": regions,
                });
                println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
                return Ok(has_errors);
            }

            print!("{}", tree.dump(dialect.registry()));
            for (language, region) in &expanded {
                let (line, column) = offset_to_line_col(&content, region.root.span.offset);
                println!("\n-- {} region at {}:{}", language, line, column);
                if let Some(region_dialect) = dialects.get(language) {
                    print!("{}", region.dump(region_dialect.registry()));
                }
            }

            let formatter = OutputFormatter::new(OutputFormat::Human, file.display().to_string());
            formatter.print_diagnostics(&tree.diagnostics, &content)?;
            for (_, region) in &expanded {
                formatter.print_diagnostics(&region.diagnostics, &content)?;
            }
            Ok(has_errors)
        }

        Command::Tokens { file, trivia } => {
            let content = read(&file)?;
            let lexed = dialect.lexer().tokenize(&content);
            let registry = dialect.registry();

            for token in &lexed.tokens {
                let token_type = registry.token_type(token.token_type);
                if token_type.is_trivia() && !trivia {
                    continue;
                }
                println!(
                    "{:>4}:{:<4} {:<26} {:<11} {:?}",
                    token.span.line,
                    token.span.column,
                    token_type.id,
                    token_type.category.name(),
                    token.text
                );
            }

            let formatter = OutputFormatter::new(OutputFormat::Human, file.display().to_string());
            formatter.print_diagnostics(&lexed.diagnostics, &content)?;
            Ok(!lexed.diagnostics.is_empty())
        }

        Command::Grammar { element } => {
            let grammar = dialect.grammar();
            let registry = grammar.registry();

            let Some(name) = element else {
                println!("Dialect {} ({}), root: {}", dialect.id(), dialect.name(), grammar.element(grammar.root()).name);
                for (name, id) in grammar.named_elements() {
                    let attributes: Vec<&str> = grammar.element(id).attributes.iter().map(|a| a.name()).collect();
                    println!("  {:<32} {}", name, attributes.join(", "));
                }
                for warning in grammar.warnings() {
                    println!("warning: {}", warning);
                }
                return Ok(false);
            };

            let id = grammar
                .named(&name)
                .ok_or_else(|| miette::miette!("no element named '{}' in dialect {}", name, dialect.id()))?;
            let element = grammar.element(id);
            let lookup = grammar.lookup();
            let list = |tokens: &TokenSet| registry.describe(tokens).join(" ");

            println!("{} ({})", element.name, element.kind.name());
            if let Some(description) = &element.description {
                println!("  {}", description);
            }
            if !element.attributes.is_empty() {
                let attributes: Vec<&str> = element.attributes.iter().map(|a| a.name()).collect();
                println!("attributes:      {}", attributes.join(", "));
            }
            println!("first possible:  {}", list(lookup.first_possible_tokens(id)));
            println!("first required:  {}", list(lookup.first_required_tokens(id)));
            println!("next possible:   {}", list(lookup.next_possible_tokens(id)));
            Ok(false)
        }
    }
}

/// Parse every chameleon region of `tree` with the dialect of its language
fn expand_regions(
    tree: &SyntaxTree,
    dialects: &DialectSet,
    options: &ParseOptions,
) -> Result<Vec<(String, SyntaxTree)>> {
    let mut expanded = Vec::new();
    for region in tree.chameleon_regions() {
        let Some(dialect) = dialects.for_language(region.language) else {
            warn!(language = %region.language, "No dialect for embedded region");
            continue;
        };
        let subtree = expand(&region, dialect, options).into_diagnostic()?;
        expanded.push((dialect.id().to_string(), subtree));
    }
    Ok(expanded)
}
