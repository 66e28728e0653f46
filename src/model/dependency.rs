use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Pip,
    Maven,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Pip => "pip",
            Ecosystem::Maven => "maven",
        }
    }

    /// Ecosystem name as understood by OSV.dev.
    pub fn osv_name(&self) -> &'static str {
        match self {
            Ecosystem::Pip => "PyPI",
            Ecosystem::Maven => "Maven",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A package reference extracted from a manifest.
///
/// Two dependencies are the same dependency when name, version and
/// ecosystem all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem,
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.version, self.ecosystem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_includes_ecosystem() {
        let mut seen = HashSet::new();
        assert!(seen.insert(Dependency::new("guava", "31.0", Ecosystem::Maven)));
        assert!(seen.insert(Dependency::new("guava", "31.0", Ecosystem::Pip)));
        assert!(!seen.insert(Dependency::new("guava", "31.0", Ecosystem::Maven)));
    }

    #[test]
    fn test_osv_names() {
        assert_eq!(Ecosystem::Pip.osv_name(), "PyPI");
        assert_eq!(Ecosystem::Maven.osv_name(), "Maven");
    }

    #[test]
    fn test_ecosystem_serializes_lowercase() {
        let json = serde_json::to_string(&Ecosystem::Maven).unwrap();
        assert_eq!(json, "\"maven\"");
    }
}
