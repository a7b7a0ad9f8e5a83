//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sqlgrammar")]
#[command(author, version, about = "Grammar driven SQL and PL/pgSQL parser")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Dialect id: sql, psql or one added in the configuration file
    #[arg(short, long, global = true, env = "SQLGRAMMAR_DIALECT")]
    pub dialect: Option<String>,

    /// Database version grammar edges are gated against
    #[arg(long = "db-version", global = true, value_name = "VERSION")]
    pub db_version: Option<f64>,

    /// Active dialect branch, e.g. `postgres` or `oracle@12.1` (repeatable)
    #[arg(short, long = "branch", global = true, value_name = "BRANCH")]
    pub branches: Vec<String>,

    /// Abandon statements nested deeper than this many elements
    #[arg(long, global = true, value_name = "DEPTH")]
    pub max_depth: Option<usize>,

    /// Configuration file (default: sqlgrammar.toml in the current or a parent directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check SQL files for syntax errors
    Check {
        /// SQL files to check (supports glob patterns)
        files: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Diagnostic codes to ignore (e.g. E1002)
        #[arg(long, value_name = "CODE")]
        disable: Vec<String>,
    },

    /// Parse a file and print its syntax tree
    Parse {
        /// SQL file to parse
        file: PathBuf,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,

        /// Also parse embedded procedural regions with their own dialect
        #[arg(long)]
        expand: bool,
    },

    /// Print the classified token stream of a file
    Tokens {
        /// SQL file to tokenize
        file: PathBuf,

        /// Include whitespace and comments
        #[arg(long)]
        trivia: bool,
    },

    /// List the named grammar elements, or show the lookup sets of one
    Grammar {
        /// Named element to inspect
        element: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
    /// SARIF output (for GitHub Code Scanning)
    Sarif,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}
