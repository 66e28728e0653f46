use super::normalize_pypi_name;
use crate::error::ParseError;
use crate::model::{Dependency, Ecosystem};
use tracing::debug;

const COMPARATORS: &[char] = &['<', '>', '!', '~', '=', ','];

/// Parses a pip requirements file. Only exactly pinned requirements
/// (`==` or `===`) are returned.
pub fn parse(content: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut dependencies = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }

        // Environment markers
        let spec = line.split(';').next().unwrap_or_default().trim();

        if spec.contains("://") || spec.contains(" @ ") {
            debug!(line = index + 1, requirement = spec, "skipping URL requirement");
            continue;
        }

        let Some((name, version)) = split_pin(spec) else {
            debug!(line = index + 1, requirement = spec, "skipping unpinned requirement");
            continue;
        };

        let name = strip_extras(name).trim();
        let version = version.trim();
        if name.contains(COMPARATORS) || version.contains(COMPARATORS) {
            debug!(line = index + 1, requirement = spec, "skipping compound requirement");
            continue;
        }
        if name.is_empty() || version.is_empty() {
            return Err(ParseError::InvalidLine {
                line: index + 1,
                content: raw.trim().to_string(),
            });
        }

        dependencies.push(Dependency::new(
            normalize_pypi_name(name),
            version,
            Ecosystem::Pip,
        ));
    }

    Ok(dependencies)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn split_pin(spec: &str) -> Option<(&str, &str)> {
    let (name, rest) = spec.split_once("==")?;
    Some((name, rest.strip_prefix('=').unwrap_or(rest)))
}

fn strip_extras(name: &str) -> &str {
    match name.find('[') {
        Some(pos) => &name[..pos],
        None => name,
    }
}
