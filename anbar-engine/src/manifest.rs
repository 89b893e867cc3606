//! Declarative installation manifests.
//!
//! A manifest is a TOML file selecting components from the catalog of a
//! consuming application:
//!
//! ```toml
//! [[component]]
//! key = "mailer"
//!
//! [[component]]
//! key = "audit-log"
//! lifestyle = "transient"
//! enabled = false
//! ```
//!
//! The engine only parses the file; matching keys against actual
//! registrations is the caller's job. `lifestyle` is optional and kept as
//! raw text here so an unrecognized value surfaces as
//! [`EngineError::InvalidLifestyle`](crate::EngineError::InvalidLifestyle)
//! during installation, not as a parse error.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Parsed installation manifest.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    /// Component entries, in file order.
    #[serde(default, rename = "component")]
    pub components: Vec<ManifestEntry>,
}

/// One `[[component]]` table.
#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    /// Catalog key of the component to install.
    pub key: String,
    /// Optional lifestyle override, raw text.
    #[serde(default)]
    pub lifestyle: Option<String>,
    /// Disabled entries are skipped at installation time.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Reads and parses a manifest file.
pub fn load(path: &Path) -> Result<Manifest> {
    let text = fs::read_to_string(path).map_err(|source| EngineError::ManifestIo {
        path: path.to_owned(),
        source,
    })?;
    parse(&text, path)
}

/// Parses manifest text; `path` is only used in error context.
pub fn parse(text: &str, path: &Path) -> Result<Manifest> {
    toml::from_str(text).map_err(|source| EngineError::ManifestParse {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn parse_full_entry() {
        let manifest = parse(
            r#"
            [[component]]
            key = "mailer"
            lifestyle = "transient"
            enabled = false
            "#,
            &PathBuf::from("test.toml"),
        )
        .unwrap();

        assert_eq!(manifest.components.len(), 1);
        let entry = &manifest.components[0];
        assert_eq!(entry.key, "mailer");
        assert_eq!(entry.lifestyle.as_deref(), Some("transient"));
        assert!(!entry.enabled);
    }

    #[test]
    fn enabled_defaults_to_true_and_lifestyle_to_none() {
        let manifest = parse(
            r#"
            [[component]]
            key = "mailer"
            "#,
            &PathBuf::from("test.toml"),
        )
        .unwrap();

        let entry = &manifest.components[0];
        assert!(entry.enabled);
        assert!(entry.lifestyle.is_none());
    }

    #[test]
    fn empty_manifest_has_no_components() {
        let manifest = parse("", &PathBuf::from("test.toml")).unwrap();
        assert!(manifest.components.is_empty());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = parse("[[component]\nkey = ", &PathBuf::from("bad.toml"));
        match result.unwrap_err() {
            EngineError::ManifestParse { path, .. } => {
                assert_eq!(path, PathBuf::from("bad.toml"));
            }
            other => panic!("Expected ManifestParse, got: {other:?}"),
        }
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[component]]\nkey = \"mailer\"").unwrap();

        let manifest = load(file.path()).unwrap();
        assert_eq!(manifest.components[0].key, "mailer");
    }

    #[test]
    fn load_missing_file_is_an_io_error() {
        let result = load(Path::new("/nonexistent/anbar-manifest.toml"));
        assert!(matches!(
            result.unwrap_err(),
            EngineError::ManifestIo { .. }
        ));
    }
}
