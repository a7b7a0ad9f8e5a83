//! Serde model of grammar definition files
//!
//! The model is deliberately loose: every attribute is optional here and the
//! loader validates which ones each element kind requires.

use serde::{Deserialize, Serialize};

/// A grammar definition document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrammarDefinition {
    pub language: Option<String>,
    #[serde(default)]
    pub elements: Vec<ElementDefinition>,
}

/// One element of the definition tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ElementDefinition {
    /// Element kind; absent on top-level named elements
    pub kind: Option<String>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub attributes: Option<String>,
    pub branch: Option<String>,
    pub virtual_object: Option<String>,

    #[serde(default)]
    pub optional: bool,
    pub version: Option<f64>,
    pub branch_check: Option<String>,
    #[serde(default)]
    pub exit: bool,

    pub ref_id: Option<String>,
    pub type_id: Option<String>,
    pub text: Option<String>,
    pub tokens: Option<String>,
    pub separator: Option<String>,
    pub elements_count: Option<String>,
    pub min_iterations: Option<usize>,
    pub template: Option<String>,
    pub begin_token: Option<String>,
    pub end_token: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    pub object_type: Option<String>,
    pub language: Option<String>,

    #[serde(default)]
    pub children: Vec<ElementDefinition>,
}

impl ElementDefinition {
    /// Kind name used in error messages
    pub fn kind_name(&self) -> &str {
        self.kind.as_deref().unwrap_or("element-def")
    }
}
