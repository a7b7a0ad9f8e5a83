//! Configuration file handling

use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use sqlgrammar_core::{Branch, Dialect, DialectSet, ParseOptions};
use tracing::debug;

use crate::args::{Args, OutputFormat};

pub const CONFIG_FILE: &str = "sqlgrammar.toml";

const DEFAULT_DIALECT: &str = "sql";

/// Configuration for sqlgrammar
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Dialect id used to parse files
    #[serde(default)]
    pub dialect: Option<String>,

    /// Database version grammar edges are gated against
    #[serde(default)]
    pub version: Option<f64>,

    /// Branches active in addition to the dialect's own
    #[serde(default)]
    pub branches: Vec<String>,

    /// File patterns to check
    #[serde(default)]
    pub files: Vec<String>,

    /// Output format (human, json, sarif)
    #[serde(default)]
    pub format: Option<String>,

    /// Diagnostic codes to ignore (e.g., ["E1002"])
    #[serde(default)]
    pub disable: Vec<String>,

    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Additional dialect definitions
    #[serde(default)]
    pub dialects: Vec<DialectEntry>,

    /// Directory of the file the configuration was read from
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// A `[[dialects]]` entry pointing at a `dialect.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialectEntry {
    pub path: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .into_diagnostic()
            .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Try to find and load sqlgrammar.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Load the file named on the command line, or look for one
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::find_and_load()?.unwrap_or_default()),
        }
    }

    /// Merge global CLI arguments into configuration.
    /// CLI arguments take precedence over config file values.
    pub fn merge_with_args(mut self, args: &Args) -> Self {
        if args.dialect.is_some() {
            self.dialect = args.dialect.clone();
        }

        if args.db_version.is_some() {
            self.version = args.db_version;
        }

        if !args.branches.is_empty() {
            self.branches = args.branches.clone();
        }

        if args.max_depth.is_some() {
            self.max_depth = args.max_depth;
        }

        self
    }

    /// Merge the arguments of the `check` command
    pub fn merge_with_check(
        mut self,
        files: &[String],
        format: Option<OutputFormat>,
        disable: &[String],
    ) -> Self {
        if !files.is_empty() {
            self.files = files.to_vec();
        }

        if let Some(fmt) = format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }

        if !disable.is_empty() {
            self.disable = disable.to_vec();
        }

        self
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        match &self.format {
            Some(format) => format
                .parse()
                .map_err(|e: String| miette::miette!("invalid output format '{}': {}", format, e)),
            None => Ok(OutputFormat::Human),
        }
    }

    /// Bundled dialects plus the ones listed in `[[dialects]]`
    pub fn dialects(&self) -> Result<DialectSet> {
        let mut set = DialectSet::builtin().into_diagnostic()?;
        for entry in &self.dialects {
            let path = match &self.base_dir {
                Some(base) if entry.path.is_relative() => base.join(&entry.path),
                _ => entry.path.clone(),
            };
            let dialect = Dialect::from_definition_file(&path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to load dialect {}", path.display()))?;
            debug!(dialect = %dialect.id(), path = %path.display(), "Dialect added");
            set.insert(dialect);
        }
        Ok(set)
    }

    /// Configured dialect out of `set`
    pub fn select<'a>(&self, set: &'a DialectSet) -> Result<&'a Dialect> {
        let id = self.dialect.as_deref().unwrap_or(DEFAULT_DIALECT);
        set.get(id).ok_or_else(|| {
            let known: Vec<&str> = set.ids().collect();
            miette::miette!("unknown dialect '{}' (available: {})", id, known.join(", "))
        })
    }

    pub fn parse_options(&self) -> Result<ParseOptions> {
        let mut options = ParseOptions::default();
        if let Some(version) = self.version {
            options = options.with_version(version);
        }
        for branch in &self.branches {
            let branch: Branch = branch
                .parse()
                .map_err(|e: String| miette::miette!("invalid branch '{}': {}", branch, e))?;
            options = options.with_branch(branch);
        }
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        Ok(options)
    }
}
