//! Dependency manifest parsers.
//!
//! Each supported manifest kind maps to a stateless parse function with the
//! same signature. Parsers only emit dependencies with a non-empty name and
//! an exact version, since advisories are matched per version.
//!
//! | Kind | File names | Ecosystem |
//! |------|------------|-----------|
//! | [`ManifestKind::Requirements`] | `requirements.txt`, `requirements-*.txt` | PyPI |
//! | [`ManifestKind::Pom`] | `pom.xml` | Maven |

mod pom;
mod requirements;

use crate::error::ParseError;
use crate::model::{Dependency, Ecosystem};
use std::path::Path;
use tracing::debug;

pub type ParseFn = fn(&str) -> Result<Vec<Dependency>, ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Requirements,
    Pom,
}

impl ManifestKind {
    /// Detects the manifest kind from a path's file name.
    pub fn detect(path: &Path) -> Result<Self, ParseError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ParseError::UnknownManifest(path.display().to_string()))?;

        if file_name == "pom.xml" {
            return Ok(ManifestKind::Pom);
        }
        if file_name.starts_with("requirements") && file_name.ends_with(".txt") {
            return Ok(ManifestKind::Requirements);
        }

        Err(ParseError::UnknownManifest(file_name.to_string()))
    }

    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            ManifestKind::Requirements => Ecosystem::Pip,
            ManifestKind::Pom => Ecosystem::Maven,
        }
    }

    pub fn parser(&self) -> ParseFn {
        match self {
            ManifestKind::Requirements => requirements::parse,
            ManifestKind::Pom => pom::parse,
        }
    }

    pub fn parse(&self, content: &str) -> Result<Vec<Dependency>, ParseError> {
        (self.parser())(content)
    }
}

/// Detects, reads and parses a manifest file.
pub fn parse_file(path: &Path) -> Result<Vec<Dependency>, ParseError> {
    let kind = ManifestKind::detect(path)?;
    let content = std::fs::read_to_string(path)?;
    let dependencies = kind.parse(&content)?;

    debug!(
        path = %path.display(),
        kind = ?kind,
        dependencies = dependencies.len(),
        "parsed manifest"
    );

    Ok(dependencies)
}

/// PEP 503 name normalization: lowercase, with runs of `-`, `_` and `.`
/// collapsed to a single `-`.
pub fn normalize_pypi_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
            }
            in_separator = true;
        } else {
            normalized.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect() {
        assert_eq!(
            ManifestKind::detect(&PathBuf::from("app/requirements.txt")).unwrap(),
            ManifestKind::Requirements
        );
        assert_eq!(
            ManifestKind::detect(&PathBuf::from("requirements-dev.txt")).unwrap(),
            ManifestKind::Requirements
        );
        assert_eq!(
            ManifestKind::detect(&PathBuf::from("/src/service/pom.xml")).unwrap(),
            ManifestKind::Pom
        );
        assert!(matches!(
            ManifestKind::detect(&PathBuf::from("package.json")),
            Err(ParseError::UnknownManifest(name)) if name == "package.json"
        ));
    }

    #[test]
    fn test_ecosystem_per_kind() {
        assert_eq!(ManifestKind::Requirements.ecosystem(), Ecosystem::Pip);
        assert_eq!(ManifestKind::Pom.ecosystem(), Ecosystem::Maven);
    }

    #[test]
    fn test_normalize_pypi_name() {
        assert_eq!(normalize_pypi_name("Django"), "django");
        assert_eq!(normalize_pypi_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_pypi_name("Foo__Bar-.baz"), "foo-bar-baz");
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "requests==2.25.0\n").unwrap();

        let deps = parse_file(&path).unwrap();
        assert_eq!(deps, vec![Dependency::new("requests", "2.25.0", Ecosystem::Pip)]);
    }

    #[test]
    fn test_parse_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pom.xml");
        assert!(matches!(parse_file(&path), Err(ParseError::Io(_))));
    }
}
