use crate::error::ParseError;
use crate::model::{Dependency, Ecosystem};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;

/// Property references resolve through at most this many substitutions.
const MAX_PROPERTY_DEPTH: usize = 8;

#[derive(Debug, Default)]
struct RawDependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
}

/// Parses a Maven `pom.xml`, returning `groupId:artifactId` dependencies
/// whose version is explicit or resolvable through `<properties>`.
pub fn parse(content: &str) -> Result<Vec<Dependency>, ParseError> {
    let mut reader = Reader::from_str(content);
    let mut path: Vec<String> = Vec::new();
    let mut properties: HashMap<String, String> = HashMap::new();
    let mut raw: Vec<RawDependency> = Vec::new();
    let mut current: Option<RawDependency> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "dependency" && path.last().map(String::as_str) == Some("dependencies")
                {
                    current = Some(RawDependency::default());
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                if path.last().map(String::as_str) == Some("dependency") {
                    if let Some(dep) = current.take() {
                        raw.push(dep);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                let text = text.trim();
                if !text.is_empty() {
                    record_text(&path, text, &mut properties, current.as_mut());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(ParseError::Xml(format!("unclosed element <{}>", path.join("/"))));
    }

    if !properties.contains_key("project.version") {
        if let Some(parent) = properties.get("project.parent.version").cloned() {
            properties.insert("project.version".to_string(), parent);
        }
    }

    Ok(raw
        .into_iter()
        .filter_map(|dep| resolve(dep, &properties))
        .collect())
}

fn record_text(
    path: &[String],
    text: &str,
    properties: &mut HashMap<String, String>,
    current: Option<&mut RawDependency>,
) {
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();

    match segments.as_slice() {
        ["project", "properties", key] => {
            properties.insert(key.to_string(), text.to_string());
        }
        ["project", field @ ("groupId" | "artifactId" | "version")] => {
            properties.insert(format!("project.{}", field), text.to_string());
        }
        ["project", "parent", field @ ("groupId" | "version")] => {
            properties.insert(format!("project.parent.{}", field), text.to_string());
        }
        [.., "dependency", field] => {
            if let Some(dep) = current {
                let value = Some(text.to_string());
                match *field {
                    "groupId" => dep.group_id = value,
                    "artifactId" => dep.artifact_id = value,
                    "version" => dep.version = value,
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn resolve(dep: RawDependency, properties: &HashMap<String, String>) -> Option<Dependency> {
    let group_id = substitute(dep.group_id.as_deref()?, properties)?;
    let artifact_id = dep.artifact_id?;
    let name = format!("{}:{}", group_id, artifact_id);

    let Some(version) = dep.version else {
        debug!(dependency = %name, "skipping dependency without version");
        return None;
    };
    let Some(version) = substitute(&version, properties) else {
        debug!(dependency = %name, version = %version, "skipping unresolved version property");
        return None;
    };
    if version.starts_with('[') || version.starts_with('(') {
        debug!(dependency = %name, version = %version, "skipping version range");
        return None;
    }

    Some(Dependency::new(name, version, Ecosystem::Maven))
}

/// Expands `${name}` references. Returns `None` if any reference is unknown.
fn substitute(value: &str, properties: &HashMap<String, String>) -> Option<String> {
    let mut value = value.to_string();
    for _ in 0..MAX_PROPERTY_DEPTH {
        let Some(start) = value.find("${") else {
            return Some(value);
        };
        let end = start + value[start..].find('}')?;
        let key = &value[start + 2..end];
        let replacement = properties.get(key)?;
        value = format!("{}{}{}", &value[..start], replacement, &value[end + 1..]);
    }
    if value.contains("${") {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(name: &str, version: &str) -> Dependency {
        Dependency::new(name, version, Ecosystem::Maven)
    }

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <modelVersion>4.0.0</modelVersion>
    <groupId>com.example</groupId>
    <artifactId>demo</artifactId>
    <version>1.2.0</version>

    <properties>
        <log4j.version>2.14.1</log4j.version>
        <jackson.version>2.9.8</jackson.version>
    </properties>

    <dependencies>
        <dependency>
            <groupId>org.apache.logging.log4j</groupId>
            <artifactId>log4j-core</artifactId>
            <version>${log4j.version}</version>
            <exclusions>
                <exclusion>
                    <groupId>org.ignored</groupId>
                    <artifactId>ignored</artifactId>
                </exclusion>
            </exclusions>
        </dependency>
        <dependency>
            <groupId>com.fasterxml.jackson.core</groupId>
            <artifactId>jackson-databind</artifactId>
            <version>${jackson.version}</version>
        </dependency>
        <dependency>
            <groupId>${project.groupId}</groupId>
            <artifactId>demo-common</artifactId>
            <version>${project.version}</version>
        </dependency>
        <dependency>
            <groupId>junit</groupId>
            <artifactId>junit</artifactId>
            <version>4.12</version>
            <scope>test</scope>
        </dependency>
    </dependencies>
</project>
"#;

    #[test]
    fn test_parse_dependencies_with_properties() {
        let deps = parse(POM).unwrap();
        assert_eq!(
            deps,
            vec![
                dep("org.apache.logging.log4j:log4j-core", "2.14.1"),
                dep("com.fasterxml.jackson.core:jackson-databind", "2.9.8"),
                dep("com.example:demo-common", "1.2.0"),
                dep("junit:junit", "4.12"),
            ]
        );
    }

    #[test]
    fn test_skips_managed_and_unresolved_versions() {
        let pom = r#"<project>
    <dependencies>
        <dependency>
            <groupId>org.springframework</groupId>
            <artifactId>spring-core</artifactId>
        </dependency>
        <dependency>
            <groupId>org.x</groupId>
            <artifactId>y</artifactId>
            <version>${undefined.version}</version>
        </dependency>
        <dependency>
            <groupId>org.x</groupId>
            <artifactId>z</artifactId>
            <version>[1.0,2.0)</version>
        </dependency>
    </dependencies>
</project>"#;
        assert!(parse(pom).unwrap().is_empty());
    }

    #[test]
    fn test_parent_version_fallback() {
        let pom = r#"<project>
    <parent>
        <groupId>com.example</groupId>
        <version>3.0.1</version>
    </parent>
    <artifactId>child</artifactId>
    <dependencies>
        <dependency>
            <groupId>com.example</groupId>
            <artifactId>sibling</artifactId>
            <version>${project.version}</version>
        </dependency>
    </dependencies>
</project>"#;
        assert_eq!(parse(pom).unwrap(), vec![dep("com.example:sibling", "3.0.1")]);
    }

    #[test]
    fn test_plugin_dependencies_outside_dependencies_block_ignored() {
        let pom = r#"<project>
    <build>
        <plugins>
            <plugin>
                <groupId>org.apache.maven.plugins</groupId>
                <artifactId>maven-compiler-plugin</artifactId>
                <version>3.8.1</version>
            </plugin>
        </plugins>
    </build>
</project>"#;
        assert!(parse(pom).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse("<project><dependencies></project>").unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    #[test]
    fn test_substitute_nested() {
        let mut props = HashMap::new();
        props.insert("a".to_string(), "${b}".to_string());
        props.insert("b".to_string(), "1.0".to_string());
        assert_eq!(substitute("${a}-final", &props).as_deref(), Some("1.0-final"));
        assert_eq!(substitute("${missing}", &props), None);
    }
}
