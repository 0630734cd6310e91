//! Project SDK version validation.

use camino::{Utf8Path, Utf8PathBuf};
use dotnet_runner::{parse_version, version_in_range};
use regex::Regex;
use semver::Version;
use std::sync::OnceLock;
use thiserror::Error;

/// The SDK every PostgreSQL database project references.
pub const SDK_NAME: &str = "Microsoft.DataTools.Schema.Tasks.PostgreSql.Sdk";

/// Validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A project file could not be read.
    #[error("failed to read project {path}: {source}")]
    ReadFailed {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured SDK range is not made of versions.
    #[error("invalid supported SDK range [{min}, {max}]")]
    InvalidRange { min: String, max: String },
}

/// The inclusive range of supported project SDK versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkRange {
    pub min: String,
    pub max: String,
}

impl SdkRange {
    /// Creates a new range.
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    fn bounds(&self) -> Result<(Version, Version), ValidationError> {
        match (parse_version(&self.min), parse_version(&self.max)) {
            (Some(min), Some(max)) => Ok((min, max)),
            _ => Err(ValidationError::InvalidRange {
                min: self.min.clone(),
                max: self.max.clone(),
            }),
        }
    }
}

/// How a project file references the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkReference {
    /// `<Project Sdk="Name/Version">`
    Attribute,
    /// `<Sdk Name="Name" Version="Version" />`
    Element,
}

/// A project whose SDK version is outside the supported range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedProject {
    pub path: Utf8PathBuf,
    pub sdk_version: String,
    pub reference: SdkReference,
}

/// Decides which projects may be handed to the toolchain.
#[allow(async_fn_in_trait)]
pub trait ProjectValidator {
    /// Returns the projects whose SDK version lies outside `range`.
    async fn check_project_version(
        &self,
        range: &SdkRange,
        projects: &[Utf8PathBuf],
    ) -> Result<Vec<UnsupportedProject>, ValidationError>;
}

/// Reads `.pgproj` files and checks their PostgreSQL SDK reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkValidator;

impl ProjectValidator for SdkValidator {
    async fn check_project_version(
        &self,
        range: &SdkRange,
        projects: &[Utf8PathBuf],
    ) -> Result<Vec<UnsupportedProject>, ValidationError> {
        let (min, max) = range.bounds()?;
        let mut unsupported = Vec::new();

        for project in projects {
            let text = tokio::fs::read_to_string(project)
                .await
                .map_err(|source| ValidationError::ReadFailed {
                    path: project.clone(),
                    source,
                })?;

            let Some((version, reference)) = read_sdk_version(&text) else {
                tracing::debug!(%project, "no PostgreSQL SDK reference found");
                continue;
            };

            let supported = parse_version(&version)
                .map(|v| version_in_range(&v, &min, &max))
                .unwrap_or(false);
            if !supported {
                unsupported.push(UnsupportedProject {
                    path: project.clone(),
                    sdk_version: version,
                    reference,
                });
            }
        }

        Ok(unsupported)
    }
}

fn project_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Project\b[^>]*>").expect("project tag pattern is valid"))
}

fn sdk_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Sdk\b[^>]*>").expect("sdk tag pattern is valid"))
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?P<name>[A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
            .expect("attribute pattern is valid")
    })
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    attribute_regex()
        .captures_iter(tag)
        .find(|caps| &caps["name"] == name)
        .and_then(|caps| caps.name("dq").or_else(|| caps.name("sq")))
        .map(|m| m.as_str())
}

/// Extracts the PostgreSQL SDK version from project file text.
pub fn read_sdk_version(text: &str) -> Option<(String, SdkReference)> {
    let project_tag = project_tag_regex().find(text)?.as_str();

    if let Some(sdk) = attribute(project_tag, "Sdk") {
        let (name, version) = sdk.split_once('/')?;
        if name.trim().eq_ignore_ascii_case(SDK_NAME) && !version.contains('/') {
            return Some((version.trim().to_string(), SdkReference::Attribute));
        }
        return None;
    }

    let sdk_tag = sdk_tag_regex().find(text)?.as_str();
    let name = attribute(sdk_tag, "Name")?;
    let version = attribute(sdk_tag, "Version")?;
    if name.trim().eq_ignore_ascii_case(SDK_NAME) {
        return Some((version.trim().to_string(), SdkReference::Element));
    }

    None
}

/// Formats the transcript message for a skipped project.
pub fn unsupported_message(project: &UnsupportedProject, range: &SdkRange) -> String {
    format!(
        "Failed to build project {} with SDK Version {}.\nInstalled pgproj-build only supports SDK version between {} and {}.\n",
        project.path, project.sdk_version, range.min, range.max
    )
}

/// Returns true if `path` names a PostgreSQL database project.
pub fn is_project_file(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pgproj"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const ATTRIBUTE_PROJECT: &str = r#"<Project Sdk="Microsoft.DataTools.Schema.Tasks.PostgreSql.Sdk/0.1.0">
  <PropertyGroup>
    <Name>db</Name>
  </PropertyGroup>
</Project>"#;

    fn element_project(version: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build">
  <Sdk Name="microsoft.datatools.schema.tasks.postgresql.sdk" Version="{version}" />
</Project>"#
        )
    }

    #[test]
    fn test_read_attribute_form() {
        assert_eq!(
            read_sdk_version(ATTRIBUTE_PROJECT),
            Some(("0.1.0".to_string(), SdkReference::Attribute))
        );
    }

    #[test]
    fn test_read_element_form() {
        assert_eq!(
            read_sdk_version(&element_project("0.2.0")),
            Some(("0.2.0".to_string(), SdkReference::Element))
        );
    }

    #[test]
    fn test_read_other_sdk() {
        let text = r#"<Project Sdk="Microsoft.NET.Sdk/8.0.100"></Project>"#;
        assert_eq!(read_sdk_version(text), None);
        assert_eq!(read_sdk_version("<Project></Project>"), None);
        assert_eq!(read_sdk_version("not xml"), None);
    }

    #[test]
    fn test_is_project_file() {
        assert!(is_project_file(Utf8Path::new("db/db.pgproj")));
        assert!(is_project_file(Utf8Path::new("db/DB.PGPROJ")));
        assert!(!is_project_file(Utf8Path::new("db/db.sqlproj")));
    }

    #[tokio::test]
    async fn test_check_project_version() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let supported = root.join("ok.pgproj");
        let too_new = root.join("new.pgproj");
        let unknown = root.join("plain.pgproj");
        fs::write(&supported, ATTRIBUTE_PROJECT).unwrap();
        fs::write(&too_new, element_project("9.0.0")).unwrap();
        fs::write(&unknown, "<Project></Project>").unwrap();

        let range = SdkRange::new("0.1.0", "0.5.0");
        let projects = vec![supported, too_new.clone(), unknown];
        let result = SdkValidator
            .check_project_version(&range, &projects)
            .await
            .unwrap();

        assert_eq!(
            result,
            vec![UnsupportedProject {
                path: too_new,
                sdk_version: "9.0.0".to_string(),
                reference: SdkReference::Element,
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_project_is_an_error() {
        let range = SdkRange::new("0.1.0", "0.5.0");
        let err = SdkValidator
            .check_project_version(&range, &[Utf8PathBuf::from("/nonexistent/x.pgproj")])
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let range = SdkRange::new("latest", "0.5.0");
        let err = SdkValidator
            .check_project_version(&range, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }
}
