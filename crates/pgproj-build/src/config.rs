//! Configuration loading.

use camino::{Utf8Path, Utf8PathBuf};
use msbuild_diagnostics::DedupKey;
use serde::Deserialize;
use std::fs;
use thiserror::Error;

/// Name of the workspace configuration file.
pub const CONFIG_FILE: &str = "pgproj.config.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Workspace build configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// Lowest project SDK version that may be built.
    pub min_supported_sdk: String,

    /// Highest project SDK version that may be built.
    pub max_supported_sdk: String,

    /// Minimum `dotnet --version` required, if any.
    pub required_dotnet_sdk: Option<String>,

    /// MSBuild verbosity passed as `-v`.
    pub verbosity: String,

    /// How diagnostics for one file are deduplicated.
    pub dedup: DedupKey,

    /// Glob patterns excluded from project discovery.
    pub exclude: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            min_supported_sdk: "0.1.0".to_string(),
            max_supported_sdk: "0.1.0".to_string(),
            required_dotnet_sdk: Some("2.1.0".to_string()),
            verbosity: "n".to_string(),
            dedup: DedupKey::Message,
            exclude: Vec::new(),
        }
    }
}

impl BuildConfig {
    /// Loads `pgproj.config.json` from the workspace root.
    ///
    /// A missing file yields the defaults. A file that cannot be read or
    /// parsed is reported and also falls back to the defaults.
    pub fn load(workspace: &Utf8Path) -> Self {
        let path = workspace.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }

        match Self::read(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{e}; using default configuration");
                Self::default()
            }
        }
    }

    /// Reads and parses a configuration file.
    pub fn read(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(&remove_json_comments(content))
    }
}

/// Removes single-line and multi-line comments from JSON.
fn remove_json_comments(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut chars = json.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '"' {
                in_string = false;
            } else if c == '\\' {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            }
        } else if c == '"' {
            result.push(c);
            in_string = true;
        } else if c == '/' {
            match chars.peek() {
                Some('/') => {
                    chars.next();
                    while let Some(&next) = chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        chars.next();
                    }
                }
                Some('*') => {
                    chars.next();
                    while let Some(next) = chars.next() {
                        if next == '*' && chars.peek() == Some(&'/') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workspace() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_remove_comments() {
        let json = r#"{
            // This is a comment
            "key": "value" /* inline comment */
        }"#;

        let cleaned = remove_json_comments(json);
        assert!(!cleaned.contains("//"));
        assert!(!cleaned.contains("/*"));
        assert!(cleaned.contains("\"key\""));
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let cleaned = remove_json_comments(r#"{"exclude": ["legacy//**"]}"#);
        assert_eq!(cleaned, r#"{"exclude": ["legacy//**"]}"#);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (_dir, root) = workspace();
        assert_eq!(BuildConfig::load(&root), BuildConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = BuildConfig::parse(
            r#"{
                // widen the supported range
                "maxSupportedSdk": "0.3.0",
                "dedup": "location",
                "exclude": ["legacy/**"]
            }"#,
        )
        .unwrap();

        assert_eq!(config.min_supported_sdk, "0.1.0");
        assert_eq!(config.max_supported_sdk, "0.3.0");
        assert_eq!(config.verbosity, "n");
        assert_eq!(config.dedup, DedupKey::Location);
        assert_eq!(config.exclude, vec!["legacy/**"]);
    }

    #[test]
    fn test_load_from_workspace() {
        let (_dir, root) = workspace();
        fs::write(
            root.join(CONFIG_FILE),
            r#"{"verbosity": "minimal", "requiredDotnetSdk": null}"#,
        )
        .unwrap();

        let config = BuildConfig::load(&root);
        assert_eq!(config.verbosity, "minimal");
        assert_eq!(config.required_dotnet_sdk, None);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let (_dir, root) = workspace();
        let path = root.join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            BuildConfig::read(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(BuildConfig::load(&root), BuildConfig::default());
    }
}
