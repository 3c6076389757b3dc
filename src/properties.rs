//! Reader and writer for the server's `server.properties` file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub const PROPERTIES_FILE: &str = "server.properties";

#[derive(Debug, thiserror::Error)]
pub enum PropertiesError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("value for {key} should be {expected:?} like type")]
    KindMismatch { key: String, expected: PropertyKind },
}

/// Value kind inferred from a property's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    String,
}

impl PropertyKind {
    pub fn infer(value: &str) -> Self {
        if value == "true" || value == "false" {
            PropertyKind::Bool
        } else if value.parse::<i64>().is_ok() {
            PropertyKind::Int
        } else if value.parse::<f64>().is_ok() {
            PropertyKind::Float
        } else {
            PropertyKind::String
        }
    }

    /// Check if `value` can be stored in a property of this kind
    pub fn accepts(self, value: &str) -> bool {
        match self {
            PropertyKind::Bool => value == "true" || value == "false",
            PropertyKind::Int => value.parse::<i64>().is_ok(),
            PropertyKind::Float => value.parse::<f64>().is_ok(),
            PropertyKind::String => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
    pub kind: PropertyKind,
}

/// In-memory copy of a `server.properties` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerProperties {
    values: BTreeMap<String, String>,
}

impl ServerProperties {
    /// Path of the properties file inside a server directory
    pub fn path_in(directory: &Path) -> PathBuf {
        directory.join(PROPERTIES_FILE)
    }

    /// Parse properties text
    ///
    /// Comments and blank lines are skipped, as are lines without `=`.
    pub fn parse(raw: &str) -> Self {
        let values = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    /// Load from `path`; a missing file yields no properties
    pub fn load(path: &Path) -> Result<Self, PropertiesError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(Self::parse(&raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(PropertiesError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Render with the two-line header, keys sorted
    pub fn render(&self) -> String {
        let mut out = String::from("#Minecraft server properties\n");
        let _ = writeln!(
            out,
            "#{}",
            chrono::Local::now().format("%a %b %e %H:%M:%S %Z %Y")
        );
        for (key, value) in &self.values {
            let _ = writeln!(out, "{key}={value}");
        }
        out
    }

    /// Overwrite `path` with [`ServerProperties::render`]
    pub fn save(&self, path: &Path) -> Result<(), PropertiesError> {
        std::fs::write(path, self.render()).map_err(|source| PropertiesError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Raw value of `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set `key`, requiring the new value to match the existing value's kind
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PropertiesError> {
        if let Some(current) = self.values.get(key) {
            let expected = PropertyKind::infer(current);
            if !expected.accepts(value) {
                return Err(PropertiesError::KindMismatch {
                    key: key.to_string(),
                    expected,
                });
            }
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Every property with its inferred kind, sorted by key
    pub fn entries(&self) -> Vec<PropertyEntry> {
        self.values
            .iter()
            .map(|(key, value)| PropertyEntry {
                key: key.clone(),
                value: value.clone(),
                kind: PropertyKind::infer(value),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = "#Minecraft server properties\n\
#Sun Oct 19 12:00:00 UTC 2026\n\
motd=A Minecraft Server\n\
max-players=20\n\
\n\
pvp=true\n\
spawn-protection=16\n\
broken line\n\
level-seed=\n";

    #[rstest]
    #[case("true", PropertyKind::Bool)]
    #[case("false", PropertyKind::Bool)]
    #[case("20", PropertyKind::Int)]
    #[case("-3", PropertyKind::Int)]
    #[case("0.5", PropertyKind::Float)]
    #[case("survival", PropertyKind::String)]
    #[case("", PropertyKind::String)]
    fn property_kind_infer_classifies_value(#[case] value: &str, #[case] expected: PropertyKind) {
        assert_eq!(PropertyKind::infer(value), expected);
    }

    #[test]
    fn server_properties_parse_skips_comments_and_malformed_lines() {
        let props = ServerProperties::parse(SAMPLE);

        assert_eq!(props.get("motd"), Some("A Minecraft Server"));
        assert_eq!(props.get("max-players"), Some("20"));
        assert_eq!(props.get("level-seed"), Some(""));
        assert_eq!(props.get("broken line"), None);
        assert_eq!(props.entries().len(), 5);
    }

    #[test]
    fn server_properties_set_enforces_existing_kind() {
        let mut props = ServerProperties::parse(SAMPLE);

        let err = props.set("max-players", "lots").unwrap_err();
        assert!(matches!(
            err,
            PropertiesError::KindMismatch {
                expected: PropertyKind::Int,
                ..
            }
        ));
        assert!(props.set("pvp", "yes").is_err());

        props.set("max-players", "50").unwrap();
        props.set("motd", "Welcome").unwrap();
        props.set("new-key", "anything").unwrap();
        assert_eq!(props.get("max-players"), Some("50"));
        assert_eq!(props.get("new-key"), Some("anything"));
    }

    #[test]
    fn server_properties_save_writes_header_and_sorted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = ServerProperties::path_in(dir.path());
        let props = ServerProperties::parse("pvp=true\nmotd=hi\n");

        props.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines[0], "#Minecraft server properties");
        assert!(lines[1].starts_with('#'));
        assert_eq!(&lines[2..], &["motd=hi", "pvp=true"]);
        assert_eq!(ServerProperties::load(&path).unwrap(), props);
    }

    #[test]
    fn server_properties_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let props = ServerProperties::load(&dir.path().join("nope.properties")).unwrap();
        assert!(props.entries().is_empty());
    }
}
