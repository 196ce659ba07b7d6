//! Artifact coordinates and dependency scopes.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dependency scope. `Test` includes everything `Compile` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Compile,
    Test,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Test => "test",
        }
    }

    /// Whether a dependency declared with `declared` is visible in this scope.
    pub fn includes(&self, declared: Scope) -> bool {
        match self {
            Scope::Compile => declared == Scope::Compile,
            Scope::Test => true,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile" => Ok(Scope::Compile),
            "test" => Ok(Scope::Test),
            _ => Err(format!("invalid scope '{}'; expected 'compile' or 'test'", s)),
        }
    }
}

/// `group:artifact:version` coordinates of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl Coordinates {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Coordinates {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// `group:artifact`, the key used by ordering and exclusion rules.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// Directory of this version inside a repository root.
    pub fn repository_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for part in self.group_id.split('.') {
            path.push(part);
        }
        path.push(&self.artifact_id);
        path.push(&self.version);
        path
    }

    /// File name of an attached archive with `classifier`.
    pub fn nar_file_name(&self, classifier: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            self.artifact_id,
            self.version,
            classifier,
            crate::layout::NAR_EXTENSION
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// A declared (not yet resolved) dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub scope: Scope,
}

impl DependencySpec {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(&self.group, &self.name, &self.version)
    }
}
