//! Branch and version gating of grammar edges

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version used when the caller does not pin a database version
pub const LATEST_VERSION: f64 = f64::INFINITY;

/// A dialect branch tag, optionally versioned (`oracle@12.1`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub version: f64,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0.0,
        }
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => {
                let version = version
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("invalid branch version '{}'", version))?;
                (name.trim(), version)
            }
            None => (s, 0.0),
        };
        if name.is_empty() {
            return Err(format!("empty branch name in '{}'", s));
        }
        Ok(Branch {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version > 0.0 {
            write!(f, "{}@{}", self.name, self.version)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchCheckKind {
    Allowed,
    Forbidden,
}

/// `+branch`, `-branch` or `branch@version` check attached to an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCheck {
    pub kind: BranchCheckKind,
    pub branch: Branch,
}

impl BranchCheck {
    /// Whether an active branch satisfies the name and minimum version of
    /// this check
    pub fn matches(&self, active: &Branch) -> bool {
        self.branch.name.eq_ignore_ascii_case(&active.name) && active.version >= self.branch.version
    }

    /// Parse a space or comma separated list of checks
    pub fn parse_list(def: &str) -> Result<Vec<BranchCheck>, String> {
        def.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for BranchCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = match s.trim().strip_prefix('-') {
            Some(rest) => (BranchCheckKind::Forbidden, rest),
            None => (
                BranchCheckKind::Allowed,
                s.trim().strip_prefix('+').unwrap_or(s.trim()),
            ),
        };
        Ok(BranchCheck {
            kind,
            branch: rest.parse()?,
        })
    }
}

/// Predicate attached uniformly to every grammar edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub branch_checks: Vec<BranchCheck>,
    pub min_version: f64,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            branch_checks: Vec::new(),
            min_version: 0.0,
        }
    }
}

impl Gate {
    /// Whether the edge is open for the given active branches and version
    pub fn allows<'a, I>(&self, branches: I, version: f64) -> bool
    where
        I: IntoIterator<Item = &'a Branch>,
        I::IntoIter: Clone,
    {
        if version < self.min_version {
            return false;
        }
        let branches = branches.into_iter();
        self.branch_checks.iter().all(|check| {
            let mut active = branches.clone();
            match check.kind {
                BranchCheckKind::Forbidden => !active.any(|b| check.matches(b)),
                BranchCheckKind::Allowed => active.any(|b| check.matches(b)),
            }
        })
    }

    /// Gate without any condition
    pub fn is_open(&self) -> bool {
        self.branch_checks.is_empty() && self.min_version <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [Branch; 0] = [];

    fn branch(def: &str) -> Branch {
        def.parse().unwrap()
    }

    #[test]
    fn test_parse_branch() {
        let branch: Branch = "oracle@12.1".parse().unwrap();
        assert_eq!(branch.name, "oracle");
        assert_eq!(branch.version, 12.1);
        assert_eq!(branch.to_string(), "oracle@12.1");
        assert_eq!("mysql".parse::<Branch>().unwrap(), Branch::new("mysql"));
        assert!("@3".parse::<Branch>().is_err());
        assert!("oracle@x".parse::<Branch>().is_err());
    }

    #[test]
    fn test_parse_checks() {
        let checks = BranchCheck::parse_list("-oracle +mysql@8, postgres").unwrap();
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0].kind, BranchCheckKind::Forbidden);
        assert_eq!(checks[1].kind, BranchCheckKind::Allowed);
        assert_eq!(checks[1].branch.version, 8.0);
        assert_eq!(checks[2].branch.name, "postgres");
    }

    #[test]
    fn test_forbidden_check() {
        let gate = Gate {
            branch_checks: BranchCheck::parse_list("-oracle").unwrap(),
            min_version: 0.0,
        };
        let oracle = [Branch::new("oracle")];
        let mysql = [Branch::new("mysql")];
        assert!(!gate.allows(&oracle, LATEST_VERSION));
        assert!(gate.allows(&mysql, LATEST_VERSION));
        assert!(gate.allows(&NONE, LATEST_VERSION));
    }

    #[test]
    fn test_allowed_check_requires_active_branch() {
        let gate = Gate {
            branch_checks: BranchCheck::parse_list("+oracle@12").unwrap(),
            min_version: 0.0,
        };
        assert!(!gate.allows(&NONE, LATEST_VERSION));
        assert!(!gate.allows(&[branch("oracle@11")], LATEST_VERSION));
        assert!(gate.allows(&[branch("ORACLE@12")], LATEST_VERSION));
    }

    #[test]
    fn test_version_gate() {
        let gate = Gate {
            branch_checks: Vec::new(),
            min_version: 12.0,
        };
        assert!(gate.allows(&NONE, 12.0));
        assert!(gate.allows(&NONE, 13.0));
        assert!(gate.allows(&NONE, LATEST_VERSION));
        assert!(!gate.allows(&NONE, 11.0));
        assert!(!gate.is_open());
        assert!(Gate::default().is_open());
    }
}
