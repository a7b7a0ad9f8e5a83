//! Output formatting

use miette::{IntoDiagnostic, Result};
use sqlgrammar_core::{Diagnostic, Severity};

use crate::args::OutputFormat;

/// Output formatter for diagnostics
pub struct OutputFormatter {
    format: OutputFormat,
    file_name: String,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, file_name: String) -> Self {
        Self { format, file_name }
    }

    /// Print diagnostics in the configured format
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic], source: &str) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                self.print_human(diagnostics, source);
                Ok(())
            }
            OutputFormat::Json => self.print_json(diagnostics, source),
            OutputFormat::Sarif => self.print_sarif(diagnostics, source),
        }
    }

    fn print_human(&self, diagnostics: &[Diagnostic], source: &str) {
        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "\x1b[31merror\x1b[0m",
                Severity::Warning => "\x1b[33mwarning\x1b[0m",
                Severity::Info => "\x1b[34minfo\x1b[0m",
            };

            eprintln!("{}[{}]: {}", severity_str, diag.code(), diag.message);

            if let Some(span) = &diag.span {
                let (line, col) = offset_to_line_col(source, span.offset);
                eprintln!("  --> {}:{}:{}", self.file_name, line, col);

                if let Some(source_line) = get_source_line(source, line) {
                    eprintln!("   |");
                    eprintln!("{:>3} | {}", line, source_line);

                    // Zero-width spans point at the insertion position
                    let padding = " ".repeat(col.saturating_sub(1));
                    let remaining = source_line.chars().count().saturating_sub(col - 1);
                    let underline = "^".repeat(span.length.min(remaining).max(1));
                    eprintln!("   | {}{}", padding, underline);
                }
            }

            for label in &diag.labels {
                let (line, col) = offset_to_line_col(source, label.span.offset);
                eprintln!("   = note: {} ({}:{})", label.message, line, col);
            }

            if let Some(help) = &diag.help {
                eprintln!("   = help: {}", help);
            }

            eprintln!();
        }
    }

    fn print_json(&self, diagnostics: &[Diagnostic], source: &str) -> Result<()> {
        let entries: Vec<serde_json::Value> = diagnostics
            .iter()
            .map(|d| {
                let (line, column) = d
                    .span
                    .map(|s| offset_to_line_col(source, s.offset))
                    .unwrap_or((0, 0));
                serde_json::json!({
                    "code": d.code(),
                    "kind": d.kind.name(),
                    "severity": d.severity,
                    "message": d.message,
                    "help": d.help,
                    "span": d.span,
                    "line": line,
                    "column": column,
                })
            })
            .collect();
        let output = serde_json::json!({
            "file": self.file_name,
            "diagnostics": entries
        });
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
        Ok(())
    }

    fn print_sarif(&self, diagnostics: &[Diagnostic], source: &str) -> Result<()> {
        let results: Vec<serde_json::Value> = diagnostics
            .iter()
            .map(|d| {
                let mut location = serde_json::json!({
                    "physicalLocation": {
                        "artifactLocation": {
                            "uri": self.file_name
                        }
                    }
                });
                if let Some(span) = d.span {
                    let (start_line, start_column) = offset_to_line_col(source, span.offset);
                    let (end_line, end_column) = offset_to_line_col(source, span.end());
                    location["physicalLocation"]["region"] = serde_json::json!({
                        "startLine": start_line,
                        "startColumn": start_column,
                        "endLine": end_line,
                        "endColumn": end_column,
                    });
                }
                serde_json::json!({
                    "ruleId": d.code(),
                    "level": match d.severity {
                        Severity::Error => "error",
                        Severity::Warning => "warning",
                        Severity::Info => "note",
                    },
                    "message": {
                        "text": d.message
                    },
                    "locations": [location]
                })
            })
            .collect();

        let sarif = serde_json::json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "sqlgrammar",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                },
                "results": results
            }]
        });

        println!("{}", serde_json::to_string_pretty(&sarif).into_diagnostic()?);
        Ok(())
    }
}

/// Convert byte offset to line and column (1-indexed)
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Get a specific line from source (1-indexed)
fn get_source_line(source: &str, line: usize) -> Option<&str> {
    source.lines().nth(line.saturating_sub(1))
}
